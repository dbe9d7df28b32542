use thiserror::Error;

/// Error taxonomy for the scheduling core.
///
/// The first two variants are data-integrity or programmer errors and are
/// never retried. `ScheduleNotFound` and `NoMoreCards` are expected
/// business conditions surfaced to the caller. `DuplicateSchedule` and
/// `Conflict` are concurrency outcomes that the caller may retry after a
/// reload. `StoreUnavailable` is a transient infrastructure failure.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid rating value: {0}")]
    InvalidRating(u8),

    #[error("invalid card state: {0}")]
    InvalidState(String),

    #[error("schedule not found for this user and flashcard")]
    ScheduleNotFound,

    #[error("no more cards available to enroll")]
    NoMoreCards,

    #[error("schedule already exists for this user and flashcard")]
    DuplicateSchedule,

    #[error("schedule was modified concurrently")]
    Conflict,

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),
}

impl ScheduleError {
    /// Whether the caller may retry the operation after reloading state.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::DuplicateSchedule | Self::Conflict | Self::StoreUnavailable(_)
        )
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ScheduleError>;
