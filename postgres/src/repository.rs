//! SQL implementation of [`RatingRepository`].

use crate::PoolSettings;
use chrono::{DateTime, Utc};
use ratings_core::error::StoreError;
use ratings_core::repository::{RatingRepository, RepositoryFuture};
use ratings_core::types::{BookId, BookRatingStats, Rating, RatingId, Score, UserId};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use uuid::Uuid;

/// `PostgreSQL`-backed rating repository.
///
/// Cloning is cheap: clones share the same connection pool.
#[derive(Clone, Debug)]
pub struct PostgresRatingRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct RatingRow {
    id: Uuid,
    book_id: Uuid,
    user_id: Uuid,
    rating: i16,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RatingRow> for Rating {
    type Error = StoreError;

    fn try_from(row: RatingRow) -> Result<Self, Self::Error> {
        let rating = Score::new(i64::from(row.rating)).map_err(|e| {
            StoreError::Database(format!("stored rating {} is corrupt: {e}", row.id))
        })?;

        Ok(Self {
            id: RatingId::from_uuid(row.id),
            book_id: BookId::from_uuid(row.book_id),
            user_id: UserId::from_uuid(row.user_id),
            rating,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    book_id: Uuid,
    average_rating: f64,
    rating_count: i64,
}

impl From<StatsRow> for BookRatingStats {
    fn from(row: StatsRow) -> Self {
        Self {
            book_id: BookId::from_uuid(row.book_id),
            average_rating: row.average_rating,
            rating_count: row.rating_count,
        }
    }
}

/// Map a driver error, surfacing constraint violations as their own variant.
fn store_error(context: &str, err: &sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = err {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation(
                db_err
                    .constraint()
                    .unwrap_or("ratings_book_user_key")
                    .to_string(),
            );
        }
    }
    StoreError::Database(format!("{context}: {err}"))
}

impl PostgresRatingRepository {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool with the given settings.
    ///
    /// Every session gets a server-side `statement_timeout` so that a stuck
    /// query cannot hold a pooled connection indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the URL is invalid or the database
    /// cannot be reached within the connect timeout.
    pub async fn connect(settings: &PoolSettings) -> Result<Self, StoreError> {
        let options: PgConnectOptions = settings
            .url
            .parse()
            .map_err(|e| StoreError::Database(format!("Invalid database URL: {e}")))?;
        let options = options.options([(
            "statement_timeout",
            format!("{}ms", settings.statement_timeout.as_millis()),
        )]);

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;

        tracing::info!(
            max_connections = settings.max_connections,
            "Connected to rating store"
        );

        Ok(Self::from_pool(pool))
    }

    /// Run database migrations.
    ///
    /// Creates the `ratings` and `rated_books` tables and the
    /// `book_average_ratings` view if they don't already exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

const RATING_COLUMNS: &str = "id, book_id, user_id, rating, comment, created_at";

impl RatingRepository for PostgresRatingRepository {
    fn create(&self, rating: Rating) -> RepositoryFuture<'_, Rating> {
        Box::pin(async move {
            let id = if rating.id.is_nil() {
                RatingId::new()
            } else {
                rating.id
            };

            let row: RatingRow = sqlx::query_as(&format!(
                r"
                INSERT INTO ratings (id, book_id, user_id, rating, comment, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {RATING_COLUMNS}
                "
            ))
            .bind(*id.as_uuid())
            .bind(*rating.book_id.as_uuid())
            .bind(*rating.user_id.as_uuid())
            .bind(rating.rating.value())
            .bind(rating.comment.as_deref())
            .bind(rating.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("Failed to create rating", &e))?;

            tracing::debug!(rating_id = %id, book_id = %rating.book_id, "Rating inserted");

            Rating::try_from(row)
        })
    }

    fn update(
        &self,
        book_id: BookId,
        user_id: UserId,
        score: Score,
        comment: Option<String>,
    ) -> RepositoryFuture<'_, Rating> {
        Box::pin(async move {
            let row: Option<RatingRow> = sqlx::query_as(&format!(
                r"
                UPDATE ratings
                SET rating = $3, comment = $4
                WHERE book_id = $1 AND user_id = $2
                RETURNING {RATING_COLUMNS}
                "
            ))
            .bind(*book_id.as_uuid())
            .bind(*user_id.as_uuid())
            .bind(score.value())
            .bind(comment.as_deref())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("Failed to update rating", &e))?;

            row.ok_or_else(|| StoreError::NotFound("rating".to_string()))?
                .try_into()
        })
    }

    fn get_by_id(&self, id: RatingId) -> RepositoryFuture<'_, Rating> {
        Box::pin(async move {
            let row: Option<RatingRow> =
                sqlx::query_as(&format!("SELECT {RATING_COLUMNS} FROM ratings WHERE id = $1"))
                    .bind(*id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| store_error("Failed to get rating", &e))?;

            row.ok_or_else(|| StoreError::NotFound("rating".to_string()))?
                .try_into()
        })
    }

    fn get_by_book_and_user(
        &self,
        book_id: BookId,
        user_id: UserId,
    ) -> RepositoryFuture<'_, Rating> {
        Box::pin(async move {
            let row: Option<RatingRow> = sqlx::query_as(&format!(
                "SELECT {RATING_COLUMNS} FROM ratings WHERE book_id = $1 AND user_id = $2"
            ))
            .bind(*book_id.as_uuid())
            .bind(*user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("Failed to get rating", &e))?;

            row.ok_or_else(|| StoreError::NotFound("rating".to_string()))?
                .try_into()
        })
    }

    fn get_by_book_id(&self, book_id: BookId) -> RepositoryFuture<'_, Vec<Rating>> {
        Box::pin(async move {
            let rows: Vec<RatingRow> = sqlx::query_as(&format!(
                "SELECT {RATING_COLUMNS} FROM ratings WHERE book_id = $1 ORDER BY rating DESC"
            ))
            .bind(*book_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("Failed to get book ratings", &e))?;

            rows.into_iter().map(Rating::try_from).collect()
        })
    }

    fn get_book_stats(&self, book_id: BookId) -> RepositoryFuture<'_, BookRatingStats> {
        Box::pin(async move {
            let row: Option<StatsRow> = sqlx::query_as(
                r"
                SELECT book_id, average_rating, rating_count
                FROM book_average_ratings
                WHERE book_id = $1
                ",
            )
            .bind(*book_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("Failed to get book stats", &e))?;

            row.map(BookRatingStats::from)
                .ok_or_else(|| StoreError::NotFound("book stats".to_string()))
        })
    }

    fn get_all_book_stats(&self) -> RepositoryFuture<'_, Vec<BookRatingStats>> {
        Box::pin(async move {
            let rows: Vec<StatsRow> = sqlx::query_as(
                r"
                SELECT book_id, average_rating, rating_count
                FROM book_average_ratings
                ORDER BY average_rating DESC
                ",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("Failed to get all book stats", &e))?;

            Ok(rows.into_iter().map(BookRatingStats::from).collect())
        })
    }

    fn delete(&self, book_id: BookId, user_id: UserId) -> RepositoryFuture<'_, ()> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM ratings WHERE book_id = $1 AND user_id = $2")
                .bind(*book_id.as_uuid())
                .bind(*user_id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(|e| store_error("Failed to delete rating", &e))?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound("rating".to_string()));
            }

            Ok(())
        })
    }

    fn init_empty_rating(&self, book_id: BookId) -> RepositoryFuture<'_, ()> {
        Box::pin(async move {
            let result = sqlx::query(
                "INSERT INTO rated_books (book_id) VALUES ($1) ON CONFLICT (book_id) DO NOTHING",
            )
            .bind(*book_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("Failed to register book", &e))?;

            tracing::debug!(
                book_id = %book_id,
                newly_registered = result.rows_affected() > 0,
                "Book registered for rating stats"
            );

            Ok(())
        })
    }

    fn health_check(&self) -> RepositoryFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| store_error("Health check failed", &e))?;
            Ok(())
        })
    }
}
