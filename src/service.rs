//! Orchestration layer: the three operations callers are given.
//!
//! The service composes the pure [`Scheduler`] with a [`ScheduleStore`]
//! and a [`Clock`], and owns the per-user invariants: idempotent
//! ascending-id enrollment, and lost-update-free rating application via
//! the store's version compare-and-swap.

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, ScheduleError};
use crate::model::{CardSchedule, Rating};
use crate::scheduler::Scheduler;
use crate::store::{DueCard, NewSchedule, ScheduleStore};

/// Bounded retries for the enroll race: two requests picking "the next
/// card" at once collide on the unique (user, flashcard) index, and the
/// loser reloads and tries the following card.
const ENROLL_RETRY_ATTEMPTS: u32 = 3;

pub struct SchedulingService<S> {
    store: S,
    scheduler: Scheduler,
    clock: Box<dyn Clock>,
}

impl<S: ScheduleStore> SchedulingService<S> {
    pub fn new(store: S, scheduler: Scheduler) -> Self {
        Self::with_clock(store, scheduler, SystemClock)
    }

    /// Construct with an injected clock; tests pass a
    /// [`crate::FixedClock`] and advance it explicitly.
    pub fn with_clock(store: S, scheduler: Scheduler, clock: impl Clock + 'static) -> Self {
        Self {
            store,
            scheduler,
            clock: Box::new(clock),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Enroll the user's next card, in strict ascending flashcard-id
    /// order: the lowest id for a fresh user, otherwise the lowest id
    /// greater than the last enrolled one. The new schedule starts in
    /// state New with zeroed counters and is immediately reviewable.
    ///
    /// Fails with [`ScheduleError::NoMoreCards`] once the deck is
    /// exhausted in id order. A concurrent enrollment for the same user
    /// surfaces as a duplicate insert; the service reloads and retries a
    /// bounded number of times before giving up.
    pub async fn enroll_next(&self, user_id: i64) -> Result<CardSchedule> {
        for attempt in 1..=ENROLL_RETRY_ATTEMPTS {
            let Some(flashcard_id) = self
                .store
                .get_lowest_unenrolled_flashcard_id(user_id)
                .await?
            else {
                tracing::info!(user_id, "no more cards to enroll");
                return Err(ScheduleError::NoMoreCards);
            };

            tracing::debug!(user_id, flashcard_id, attempt, "enrolling next card");

            let new_schedule = NewSchedule {
                user_id,
                flashcard_id,
                due: self.clock.now(),
            };
            match self.store.insert(new_schedule).await {
                Ok(schedule) => return Ok(schedule),
                Err(ScheduleError::DuplicateSchedule) => {
                    tracing::warn!(
                        user_id,
                        flashcard_id,
                        attempt,
                        "concurrent enrollment detected, retrying"
                    );
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        Err(ScheduleError::DuplicateSchedule)
    }

    /// All of the user's cards with `due <= now`, ascending by due,
    /// joined with flashcard content. An empty list is a normal outcome,
    /// not an error. Read-only: never mutates any schedule.
    pub async fn list_due(&self, user_id: i64) -> Result<Vec<DueCard>> {
        self.store.list_due_for_user(user_id, self.clock.now()).await
    }

    /// Apply one review outcome to an enrolled card and persist the
    /// successor state.
    ///
    /// The read-modify-write is guarded by the store's version
    /// compare-and-swap: a concurrent rating for the same pair makes the
    /// slower write fail with [`ScheduleError::Conflict`] instead of
    /// clobbering the faster one. Rating conflicts are not retried here;
    /// the caller reloads and decides.
    pub async fn apply_rating(
        &self,
        user_id: i64,
        flashcard_id: i64,
        rating: Rating,
    ) -> Result<CardSchedule> {
        let current = self
            .store
            .get_schedule(user_id, flashcard_id)
            .await?
            .ok_or(ScheduleError::ScheduleNotFound)?;

        let now = self.clock.now();
        let next = self.scheduler.transition(&current, rating, now);
        let persisted = self.store.update(&next, current.version).await?;

        tracing::debug!(
            user_id,
            flashcard_id,
            state = persisted.state.as_str(),
            scheduled_days = persisted.scheduled_days,
            "rating applied"
        );
        Ok(persisted)
    }
}
