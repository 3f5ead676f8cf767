use crate::cache::CacheService;
use crate::models::Movie;
use redis::AsyncCommands;

const MOVIES_TTL_SECONDS: u64 = 3600;

impl CacheService {
    // Movie catalog, cache first
    pub async fn get_movies(&self) -> Vec<Movie> {
        if let Ok(movies) = self.get_movies_from_cache().await {
            return movies;
        }

        // Cache miss or Redis down - fall through to the database
        if let Ok(movies) = self.load_movies_from_db().await {
            let _ = self.save_movies_to_cache(&movies).await;
            return movies;
        }

        vec![]
    }

    async fn load_movies_from_db(&self) -> Result<Vec<Movie>, sqlx::Error> {
        sqlx::query_as::<_, Movie>(
            "SELECT movie_id, title, genre, language, duration_minutes
             FROM movies
             ORDER BY movie_id",
        )
        .fetch_all(&self.db.pool)
        .await
    }

    async fn get_movies_from_cache(&self) -> Result<Vec<Movie>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let data: String = conn.get("movies").await?;
        let movies: Vec<Movie> = serde_json::from_str(&data).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error"))
        })?;
        Ok(movies)
    }

    async fn save_movies_to_cache(&self, movies: &[Movie]) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(movies).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = self.redis.conn.clone();
        conn.set_ex("movies", data, MOVIES_TTL_SECONDS).await
    }
}
