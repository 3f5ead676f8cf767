//! Seat reservation engine.
//!
//! Owns every mutation of seat state. A reservation is an all-or-nothing
//! commit of a seat set: either every requested seat flips to booked and the
//! show's counter drops by the same amount, or nothing changes. Concurrent
//! callers fighting over a seat are serialized by the storage backend; the
//! first committer wins and everyone else observes `SeatsUnavailable`.

use tracing::info;

use crate::error::BookingError;
use crate::models::Seat;
use crate::store::{SeatCommit, SeatStore};

#[derive(Clone)]
pub struct ReservationEngine<S: SeatStore> {
    store: S,
}

impl<S: SeatStore> ReservationEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Commit `seat_ids` of `show_id` from available to booked.
    ///
    /// Terminal failures: `SeatsNotFound` when an id does not resolve to a
    /// seat of the show, `SeatsUnavailable` when any seat is already booked
    /// (including replays of a commit that already went through). `Storage`
    /// failures left nothing mutated and are safe to retry.
    pub async fn reserve(&self, show_id: i64, seat_ids: &[i64]) -> Result<SeatCommit, BookingError> {
        if show_id <= 0 {
            return Err(BookingError::InvalidRequest("showId must be > 0".to_string()));
        }
        if seat_ids.is_empty() {
            return Err(BookingError::InvalidRequest("No seats selected".to_string()));
        }
        if seat_ids.iter().any(|id| *id <= 0) {
            return Err(BookingError::InvalidRequest("Seat ids must be > 0".to_string()));
        }

        let mut ids = seat_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let commit = self.store.commit_seats(show_id, &ids).await?;
        info!(
            show_id,
            seats = ?commit.seat_ids,
            version = commit.version,
            "seats committed"
        );
        Ok(commit)
    }

    /// Current seat map of a show, booked flags included.
    pub async fn seats(&self, show_id: i64) -> Result<Vec<Seat>, BookingError> {
        self.store.seats_for_show(show_id).await
    }

    /// Advisory availability check used before creating a payment order.
    /// The binding check happens inside [`Self::reserve`] at commit time.
    pub async fn check_available(&self, show_id: i64, seat_ids: &[i64]) -> Result<(), BookingError> {
        if seat_ids.is_empty() {
            return Err(BookingError::InvalidRequest("No seats selected".to_string()));
        }
        let seats = self.store.seats_for_show(show_id).await?;
        for id in seat_ids {
            match seats.iter().find(|s| s.seat_id == *id) {
                None => return Err(BookingError::SeatsNotFound),
                Some(seat) if seat.is_booked => return Err(BookingError::SeatsUnavailable),
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CatalogStore, MemoryStore};

    async fn engine_with_show(labels: &[&str]) -> (ReservationEngine<MemoryStore>, MemoryStore, Vec<i64>) {
        let store = MemoryStore::new();
        let ids = store.seed_show(1, "Inception", "PVR Phoenix", "7:30 PM", labels).await;
        (ReservationEngine::new(store.clone()), store, ids)
    }

    #[tokio::test]
    async fn empty_selection_is_rejected_before_touching_storage() {
        let (engine, _, _) = engine_with_show(&["A1"]).await;
        let err = engine.reserve(1, &[]).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn commit_flips_flags_and_decrements_the_counter() {
        let (engine, store, ids) = engine_with_show(&["A1", "A2", "A3"]).await;

        let commit = engine.reserve(1, &[ids[0], ids[1]]).await.unwrap();
        assert_eq!(commit.seat_ids, vec![ids[0], ids[1]]);
        assert_eq!(commit.version, 1);

        let seats = engine.seats(1).await.unwrap();
        assert!(seats.iter().find(|s| s.seat_id == ids[0]).unwrap().is_booked);
        assert!(seats.iter().find(|s| s.seat_id == ids[1]).unwrap().is_booked);
        assert!(!seats.iter().find(|s| s.seat_id == ids[2]).unwrap().is_booked);

        let summary = store.show_summary(1).await.unwrap().unwrap();
        assert_eq!(summary.available_seats, 1);
    }

    #[tokio::test]
    async fn unknown_seat_fails_the_whole_request() {
        let (engine, store, ids) = engine_with_show(&["A1", "A2"]).await;
        let err = engine.reserve(1, &[ids[0], 999]).await.unwrap_err();
        assert!(matches!(err, BookingError::SeatsNotFound));

        // No partial commit.
        let seats = engine.seats(1).await.unwrap();
        assert!(seats.iter().all(|s| !s.is_booked));
        assert_eq!(store.show_summary(1).await.unwrap().unwrap().available_seats, 2);
    }

    #[tokio::test]
    async fn seat_of_another_show_is_not_found() {
        let store = MemoryStore::new();
        let ids_a = store.seed_show(1, "Inception", "PVR Phoenix", "7:30 PM", &["A1"]).await;
        let ids_b = store.seed_show(2, "Dune", "INOX Forum", "9:00 PM", &["B1"]).await;
        let engine = ReservationEngine::new(store);

        let err = engine.reserve(1, &[ids_a[0], ids_b[0]]).await.unwrap_err();
        assert!(matches!(err, BookingError::SeatsNotFound));
    }

    #[tokio::test]
    async fn replaying_a_committed_set_is_unavailable_and_never_double_decrements() {
        let (engine, store, ids) = engine_with_show(&["A1", "A2", "A3"]).await;

        engine.reserve(1, &[ids[0], ids[1]]).await.unwrap();
        let err = engine.reserve(1, &[ids[0], ids[1]]).await.unwrap_err();
        assert!(matches!(err, BookingError::SeatsUnavailable));

        let summary = store.show_summary(1).await.unwrap().unwrap();
        assert_eq!(summary.available_seats, 1);
    }

    #[tokio::test]
    async fn duplicate_ids_in_one_request_count_once() {
        let (engine, store, ids) = engine_with_show(&["A1", "A2"]).await;
        let commit = engine.reserve(1, &[ids[0], ids[0]]).await.unwrap();
        assert_eq!(commit.seat_ids, vec![ids[0]]);
        assert_eq!(store.show_summary(1).await.unwrap().unwrap().available_seats, 1);
    }

    #[tokio::test]
    async fn overlapping_concurrent_requests_commit_exactly_once() {
        let (engine, store, ids) = engine_with_show(&["A1", "A2", "A3"]).await;
        let other = engine.clone();

        let req_a = [ids[0], ids[1]];
        let req_b = [ids[1], ids[2]];
        let (first, second) = tokio::join!(
            engine.reserve(1, &req_a),
            other.reserve(1, &req_b),
        );

        let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        let loser = if first.is_ok() { second } else { first };
        assert!(matches!(loser.unwrap_err(), BookingError::SeatsUnavailable));

        // The contested seat is booked exactly once and the counter reflects
        // only the winning commit.
        let seats = engine.seats(1).await.unwrap();
        let booked = seats.iter().filter(|s| s.is_booked).count();
        assert_eq!(booked, 2);
        assert_eq!(store.show_summary(1).await.unwrap().unwrap().available_seats, 1);
    }

    #[tokio::test]
    async fn disjoint_concurrent_requests_both_commit() {
        let (engine, store, ids) = engine_with_show(&["A1", "A2", "A3", "A4"]).await;
        let other = engine.clone();

        let req_a = [ids[0], ids[1]];
        let req_b = [ids[2], ids[3]];
        let (first, second) = tokio::join!(
            engine.reserve(1, &req_a),
            other.reserve(1, &req_b),
        );

        assert!(first.is_ok() && second.is_ok());
        let summary = store.show_summary(1).await.unwrap().unwrap();
        assert_eq!(summary.available_seats, 0);
        // Two commits, two version bumps, distinct versions.
        let mut versions = [first.unwrap().version, second.unwrap().version];
        versions.sort_unstable();
        assert_eq!(versions, [1, 2]);
    }

    #[tokio::test]
    async fn check_available_reports_booked_and_missing_seats() {
        let (engine, _, ids) = engine_with_show(&["A1", "A2"]).await;
        engine.reserve(1, &[ids[0]]).await.unwrap();

        assert!(matches!(
            engine.check_available(1, &[ids[0], ids[1]]).await.unwrap_err(),
            BookingError::SeatsUnavailable
        ));
        assert!(matches!(
            engine.check_available(1, &[777]).await.unwrap_err(),
            BookingError::SeatsNotFound
        ));
        engine.check_available(1, &[ids[1]]).await.unwrap();
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            /// Any partition of the seat set into two disjoint halves can be
            /// committed concurrently and the counter drops by the total.
            #[test]
            fn disjoint_partitions_always_both_commit(split in 1usize..7, total in 8usize..12) {
                let rt = tokio::runtime::Runtime::new().unwrap();
                rt.block_on(async move {
                    let labels: Vec<String> = (0..total).map(|i| format!("A{i}")).collect();
                    let label_refs: Vec<&str> = labels.iter().map(|s| s.as_str()).collect();
                    let store = MemoryStore::new();
                    let ids = store.seed_show(1, "Dune", "INOX Forum", "9:00 PM", &label_refs).await;
                    let engine = ReservationEngine::new(store.clone());
                    let other = engine.clone();

                    let (left, right) = ids.split_at(split);
                    let (a, b) = tokio::join!(
                        engine.reserve(1, left),
                        other.reserve(1, right),
                    );
                    prop_assert!(a.is_ok() && b.is_ok());
                    let summary = store.show_summary(1).await.unwrap().unwrap();
                    prop_assert_eq!(summary.available_seats, 0);
                    Ok(())
                })?;
            }
        }
    }
}
