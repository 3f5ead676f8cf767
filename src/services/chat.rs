//! Rule-based chat assistant.
//!
//! Booking-ish questions are answered from the catalog; everything else is
//! forwarded to a text-generation backend behind [`AnswerGenerator`], so the
//! handler can run with a fake generator in tests and with no generator at
//! all when the API key is absent.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::database::Database;
use crate::error::BookingError;
use crate::models::Movie;

const MOVIE_KEYWORDS: &[&str] = &[
    "movie", "book", "ticket", "show", "theater", "theatre", "cinema", "film",
];
const ACTION_KEYWORDS: &[&str] = &[
    "book", "reserve", "available", "timings", "shows", "theaters", "theatres",
];

const FALLBACK_REPLY: &str =
    "I can help with movies, theaters and show timings. Try asking 'What movies are available?'";

/// Free-text answer capability for questions the rules do not cover.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate_answer(&self, prompt: &str) -> Result<String, BookingError>;
}

/// Gemini-style text-generation HTTP client.
pub struct GeminiClient {
    api_key: String,
    url: String,
    http_client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: String, url: String) -> Self {
        Self {
            api_key,
            url,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AnswerGenerator for GeminiClient {
    async fn generate_answer(&self, prompt: &str) -> Result<String, BookingError> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response: serde_json::Value = self
            .http_client
            .post(format!("{}?key={}", self.url, self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| BookingError::GatewayUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| BookingError::GatewayUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| BookingError::GatewayUnavailable(e.to_string()))?;

        let text = response["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or(FALLBACK_REPLY)
            .to_string();
        Ok(text)
    }
}

/// What the matcher decided to do with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatIntent {
    MovieList,
    MovieDetails(String),
    TheatersInCity(String),
    General,
}

/// Keyword/substring routing, mirroring what users actually type; anything
/// unmatched goes to the generator.
pub fn classify(input: &str, known_titles: &[String]) -> ChatIntent {
    let input = input.to_lowercase();

    let mentioned_title = known_titles
        .iter()
        .find(|t| input.contains(&t.to_lowercase()))
        .cloned();

    let has_movie_kw = MOVIE_KEYWORDS.iter().any(|k| input.contains(k));
    let has_action_kw = ACTION_KEYWORDS.iter().any(|k| input.contains(k));
    if !(has_movie_kw || has_action_kw || mentioned_title.is_some()) {
        return ChatIntent::General;
    }

    if let Some(city) = extract_city(&input) {
        if input.contains("theater") || input.contains("theatre") || input.contains("cinema") {
            return ChatIntent::TheatersInCity(city);
        }
    }
    if let Some(title) = mentioned_title {
        return ChatIntent::MovieDetails(title);
    }
    if input.contains("list") || input.contains("available") || input.contains("show me") {
        return ChatIntent::MovieList;
    }
    ChatIntent::MovieList
}

/// Pull a city name out of "... in <city>" phrasing.
fn extract_city(input: &str) -> Option<String> {
    let idx = input.rfind(" in ")?;
    let city = input[idx + 4..]
        .trim()
        .trim_end_matches(['?', '!', '.'])
        .trim();
    if city.is_empty() {
        None
    } else {
        Some(city.to_string())
    }
}

pub fn format_movie_list(movies: &[Movie]) -> String {
    if movies.is_empty() {
        return "Sorry, no movies are currently available for booking.".to_string();
    }
    let mut response = String::from("Here are the available movies:\n\n");
    for movie in movies.iter().take(10) {
        response.push_str(&format!("- {}", movie.title));
        if let Some(genre) = movie.genre.as_deref().filter(|g| !g.trim().is_empty()) {
            response.push_str(&format!(" ({genre})"));
        }
        if movie.duration_minutes > 0 {
            response.push_str(&format!(" - {} mins", movie.duration_minutes));
        }
        if let Some(lang) = movie.language.as_deref().filter(|l| !l.trim().is_empty()) {
            response.push_str(&format!(" [{lang}]"));
        }
        response.push('\n');
    }
    response.push_str("\nTo book tickets, ask: 'Show theaters for [movie name] in [city name]'");
    response
}

pub fn format_movie_details(movie: &Movie, showings: &[(String, String, String)]) -> String {
    let mut response = format!("{} details:\n", movie.title);
    if let Some(genre) = movie.genre.as_deref().filter(|g| !g.trim().is_empty()) {
        response.push_str(&format!("Genre: {genre}\n"));
    }
    if let Some(lang) = movie.language.as_deref().filter(|l| !l.trim().is_empty()) {
        response.push_str(&format!("Language: {lang}\n"));
    }
    if movie.duration_minutes > 0 {
        response.push_str(&format!("Duration: {} mins\n", movie.duration_minutes));
    }
    if showings.is_empty() {
        response.push_str("\nCurrently no scheduled shows. Please check back later!");
        return response;
    }
    response.push_str("\nShowing at:\n");
    for (theater, city, timing) in showings.iter().take(10) {
        response.push_str(&format!("- {theater}, {city} at {timing}\n"));
    }
    response
}

pub fn format_theaters(city: &str, theaters: &[String]) -> String {
    if theaters.is_empty() {
        return format!("Sorry, I couldn't find any theaters in {city}.");
    }
    let mut response = format!("Theaters in {city}:\n");
    for name in theaters {
        response.push_str(&format!("- {name}\n"));
    }
    response
}

/// WebSocket-facing chat service: catalog-backed answers for booking
/// questions, generator fallback for the rest.
#[derive(Clone)]
pub struct ChatService {
    db: Database,
    generator: Option<Arc<dyn AnswerGenerator>>,
}

impl ChatService {
    pub fn new(db: Database, generator: Option<Arc<dyn AnswerGenerator>>) -> Self {
        Self { db, generator }
    }

    pub async fn respond(&self, input: &str) -> String {
        let titles = self.movie_titles().await;
        debug!(input, "chat message");

        match classify(input, &titles) {
            ChatIntent::MovieList => format_movie_list(&self.movies().await),
            ChatIntent::MovieDetails(title) => {
                let movies = self.movies().await;
                match movies.iter().find(|m| m.title == title) {
                    Some(movie) => {
                        format_movie_details(movie, &self.showings_for(movie.movie_id).await)
                    }
                    None => FALLBACK_REPLY.to_string(),
                }
            }
            ChatIntent::TheatersInCity(city) => {
                format_theaters(&city, &self.theaters_in(&city).await)
            }
            ChatIntent::General => match &self.generator {
                Some(generator) => generator
                    .generate_answer(input)
                    .await
                    .unwrap_or_else(|e| {
                        error!("answer generation failed: {e:?}");
                        FALLBACK_REPLY.to_string()
                    }),
                None => FALLBACK_REPLY.to_string(),
            },
        }
    }

    async fn movies(&self) -> Vec<Movie> {
        sqlx::query_as::<_, Movie>(
            "SELECT movie_id, title, genre, language, duration_minutes FROM movies ORDER BY movie_id",
        )
        .fetch_all(&self.db.pool)
        .await
        .unwrap_or_default()
    }

    async fn movie_titles(&self) -> Vec<String> {
        sqlx::query_scalar::<_, String>("SELECT title FROM movies")
            .fetch_all(&self.db.pool)
            .await
            .unwrap_or_default()
    }

    async fn showings_for(&self, movie_id: i64) -> Vec<(String, String, String)> {
        sqlx::query_as::<_, (String, String, String)>(
            "SELECT t.name, t.city, s.timing
             FROM shows s
             JOIN theaters t ON t.theater_id = s.theater_id
             WHERE s.movie_id = $1
             ORDER BY t.city, s.timing",
        )
        .bind(movie_id)
        .fetch_all(&self.db.pool)
        .await
        .unwrap_or_default()
    }

    async fn theaters_in(&self, city: &str) -> Vec<String> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT name FROM theaters WHERE LOWER(city) = LOWER($1) ORDER BY name",
        )
        .bind(city)
        .fetch_all(&self.db.pool)
        .await
        .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles() -> Vec<String> {
        vec!["Inception".to_string(), "Dune".to_string()]
    }

    #[test]
    fn booking_phrases_route_to_the_catalog() {
        assert_eq!(classify("what movies are available?", &titles()), ChatIntent::MovieList);
        assert_eq!(classify("show me the movie list", &titles()), ChatIntent::MovieList);
        assert_eq!(
            classify("theaters in Mumbai", &titles()),
            ChatIntent::TheatersInCity("mumbai".to_string())
        );
        assert_eq!(
            classify("tell me about Inception", &titles()),
            ChatIntent::MovieDetails("Inception".to_string())
        );
    }

    #[test]
    fn off_topic_messages_go_to_the_generator() {
        assert_eq!(classify("what's the weather today", &titles()), ChatIntent::General);
        assert_eq!(classify("hello!", &titles()), ChatIntent::General);
    }

    #[test]
    fn city_extraction_strips_trailing_punctuation() {
        assert_eq!(extract_city("theaters in pune?"), Some("pune".to_string()));
        assert_eq!(extract_city("nothing here"), None);
    }

    #[test]
    fn movie_list_formatting_includes_the_metadata() {
        let movies = vec![Movie {
            movie_id: 1,
            title: "Inception".to_string(),
            genre: Some("Sci-Fi".to_string()),
            language: Some("English".to_string()),
            duration_minutes: 148,
        }];
        let text = format_movie_list(&movies);
        assert!(text.contains("Inception (Sci-Fi) - 148 mins [English]"));
    }

    #[test]
    fn empty_catalog_has_a_friendly_answer() {
        assert!(format_movie_list(&[]).contains("no movies"));
        assert!(format_theaters("pune", &[]).contains("couldn't find"));
    }
}
