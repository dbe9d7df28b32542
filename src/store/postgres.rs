//! Postgres-backed [`ScheduleStore`] built on sqlx.
//!
//! All timestamps are `timestamptz`, so rows come back as
//! `DateTime<Utc>` without any local-offset handling. The `update` path
//! is a single compare-and-swap statement on the version column, which
//! keeps the read-modify-write of rating application lost-update free.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::config::StoreConfig;
use crate::error::{Result, ScheduleError};
use crate::model::{CardSchedule, CardState, CardType, Flashcard};
use crate::store::{DueCard, NewSchedule, ScheduleStore};

const SCHEDULE_COLUMNS: &str = r#"
    id, user_id, flashcard_id, due, stability, difficulty,
    elapsed_days, scheduled_days, reps, lapses, state, step,
    last_review, version
"#;

#[derive(Clone)]
pub struct PgScheduleStore {
    pool: PgPool,
}

impl PgScheduleStore {
    /// Connect a pool using the given configuration.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        tracing::info!(
            max_connections = config.max_connections,
            "connecting schedule store pool"
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool (e.g. one shared with the embedding app).
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the crate's migrations (flashcards, users, cardschedule).
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| ScheduleError::StoreUnavailable(err.into()))?;
        Ok(())
    }
}

#[async_trait]
impl ScheduleStore for PgScheduleStore {
    async fn get_schedule(
        &self,
        user_id: i64,
        flashcard_id: i64,
    ) -> Result<Option<CardSchedule>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SCHEDULE_COLUMNS}
            FROM cardschedule
            WHERE user_id = $1 AND flashcard_id = $2
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(flashcard_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| map_schedule_row(&row)).transpose()
    }

    async fn get_last_enrolled(&self, user_id: i64) -> Result<Option<CardSchedule>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SCHEDULE_COLUMNS}
            FROM cardschedule
            WHERE user_id = $1
            ORDER BY flashcard_id DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| map_schedule_row(&row)).transpose()
    }

    async fn get_lowest_unenrolled_flashcard_id(&self, user_id: i64) -> Result<Option<i64>> {
        let row = sqlx::query(
            r#"
            SELECT MIN(id) AS id
            FROM flashcards
            WHERE id > COALESCE(
                (SELECT MAX(flashcard_id) FROM cardschedule WHERE user_id = $1),
                0
            )
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get::<Option<i64>, _>("id")?)
    }

    async fn list_due_for_user(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<DueCard>> {
        let rows = sqlx::query(
            r#"
            SELECT
              cs.id, cs.user_id, cs.flashcard_id, cs.due, cs.stability,
              cs.difficulty, cs.elapsed_days, cs.scheduled_days, cs.reps,
              cs.lapses, cs.state, cs.step, cs.last_review, cs.version,
              f.level, f.card_type, f.fields
            FROM cardschedule cs
            JOIN flashcards f ON f.id = cs.flashcard_id
            WHERE cs.user_id = $1 AND cs.due <= $2
            ORDER BY cs.due ASC
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let schedule = map_schedule_row(row)?;
                let flashcard = map_flashcard_row(row, schedule.flashcard_id)?;
                Ok(DueCard {
                    schedule,
                    flashcard,
                })
            })
            .collect()
    }

    async fn insert(&self, schedule: NewSchedule) -> Result<CardSchedule> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO cardschedule (user_id, flashcard_id, due, state)
            VALUES ($1, $2, $3, 'NEW')
            RETURNING {SCHEDULE_COLUMNS}
            "#
        ))
        .bind(schedule.user_id)
        .bind(schedule.flashcard_id)
        .bind(schedule.due)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => map_schedule_row(&row),
            Err(err) if is_unique_violation(&err) => Err(ScheduleError::DuplicateSchedule),
            Err(err) => Err(err.into()),
        }
    }

    async fn update(
        &self,
        schedule: &CardSchedule,
        expected_version: i64,
    ) -> Result<CardSchedule> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE cardschedule SET
              due = $1, stability = $2, difficulty = $3, elapsed_days = $4,
              scheduled_days = $5, reps = $6, lapses = $7, state = $8,
              step = $9, last_review = $10, version = version + 1
            WHERE id = $11 AND version = $12
            RETURNING {SCHEDULE_COLUMNS}
            "#
        ))
        .bind(schedule.due)
        .bind(schedule.stability)
        .bind(schedule.difficulty)
        .bind(schedule.elapsed_days)
        .bind(schedule.scheduled_days)
        .bind(schedule.reps)
        .bind(schedule.lapses)
        .bind(schedule.state.as_str())
        .bind(schedule.step)
        .bind(schedule.last_review)
        .bind(schedule.id)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => map_schedule_row(&row),
            None => {
                // Zero rows: either the row vanished or the version moved.
                let exists = sqlx::query("SELECT 1 FROM cardschedule WHERE id = $1")
                    .bind(schedule.id)
                    .fetch_optional(&self.pool)
                    .await?
                    .is_some();
                if exists {
                    Err(ScheduleError::Conflict)
                } else {
                    Err(ScheduleError::ScheduleNotFound)
                }
            }
        }
    }
}

fn map_schedule_row(row: &PgRow) -> Result<CardSchedule> {
    let state_raw: String = row.try_get("state")?;
    let state = CardState::from_str(&state_raw)
        .ok_or_else(|| ScheduleError::InvalidState(state_raw.clone()))?;

    Ok(CardSchedule {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        flashcard_id: row.try_get("flashcard_id")?,
        due: row.try_get("due")?,
        stability: row.try_get("stability")?,
        difficulty: row.try_get("difficulty")?,
        elapsed_days: row.try_get("elapsed_days")?,
        scheduled_days: row.try_get("scheduled_days")?,
        reps: row.try_get("reps")?,
        lapses: row.try_get("lapses")?,
        state,
        step: row.try_get("step")?,
        last_review: row.try_get("last_review")?,
        version: row.try_get("version")?,
    })
}

fn map_flashcard_row(row: &PgRow, flashcard_id: i64) -> Result<Flashcard> {
    let type_raw: String = row.try_get("card_type")?;
    let card_type = CardType::from_str(&type_raw)
        .ok_or_else(|| ScheduleError::InvalidState(format!("card type {type_raw}")))?;

    Ok(Flashcard {
        id: flashcard_id,
        level: row.try_get("level")?,
        card_type,
        fields: row.try_get("fields")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}
