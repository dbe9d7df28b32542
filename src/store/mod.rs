//! Persistence boundary for per-(user, card) schedule rows.
//!
//! The scheduler and service never touch a database directly; they go
//! through [`ScheduleStore`]. Two implementations ship with the crate:
//! [`postgres::PgScheduleStore`] for production and
//! [`memory::MemoryScheduleStore`] for tests and DB-less embedding.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::model::{CardSchedule, Flashcard};

pub use memory::MemoryScheduleStore;
pub use postgres::PgScheduleStore;

/// Input for creating a freshly enrolled schedule row. The store assigns
/// the id and initializes the memory state (state New, zeroed counters,
/// no last_review).
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub user_id: i64,
    pub flashcard_id: i64,
    /// Enrollment instant; the card is immediately reviewable.
    pub due: DateTime<Utc>,
}

/// A due schedule joined with its flashcard content, ready for the caller
/// to present.
#[derive(Debug, Clone, Serialize)]
pub struct DueCard {
    pub schedule: CardSchedule,
    pub flashcard: Flashcard,
}

/// Minimal persistence contract consumed by the scheduling service.
///
/// Implementations must normalize timestamps to UTC at this boundary and
/// apply `update` atomically (full row, all-or-nothing).
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Fetch one schedule by (user, flashcard).
    async fn get_schedule(&self, user_id: i64, flashcard_id: i64)
        -> Result<Option<CardSchedule>>;

    /// The user's most recently enrolled schedule, by flashcard id
    /// descending. `None` for a fresh user.
    async fn get_last_enrolled(&self, user_id: i64) -> Result<Option<CardSchedule>>;

    /// Lowest flashcard id strictly greater than the user's last enrolled
    /// flashcard id (or the lowest id system-wide for a fresh user).
    /// `None` when the deck is exhausted in id order.
    async fn get_lowest_unenrolled_flashcard_id(&self, user_id: i64) -> Result<Option<i64>>;

    /// All of the user's schedules with `due <= now`, ascending by due,
    /// joined with flashcard content. Empty when nothing is due.
    async fn list_due_for_user(&self, user_id: i64, now: DateTime<Utc>) -> Result<Vec<DueCard>>;

    /// Insert a freshly enrolled row. Fails with
    /// [`crate::ScheduleError::DuplicateSchedule`] when the (user,
    /// flashcard) pair already exists.
    async fn insert(&self, schedule: NewSchedule) -> Result<CardSchedule>;

    /// Persist the full new state of an existing row, compare-and-swap on
    /// the version counter. Fails with [`crate::ScheduleError::Conflict`]
    /// when `expected_version` no longer matches, and with
    /// [`crate::ScheduleError::ScheduleNotFound`] when the row is gone.
    async fn update(&self, schedule: &CardSchedule, expected_version: i64)
        -> Result<CardSchedule>;
}
