//! In-memory [`ScheduleStore`] for tests and DB-less embedding.
//!
//! Behaviorally equivalent to the Postgres store, including the version
//! compare-and-swap and duplicate detection, so service-level tests
//! exercise the same semantics the production store enforces.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{Result, ScheduleError};
use crate::model::{CardSchedule, CardState, Flashcard};
use crate::store::{DueCard, NewSchedule, ScheduleStore};

#[derive(Default)]
struct Inner {
    flashcards: BTreeMap<i64, Flashcard>,
    schedules: HashMap<(i64, i64), CardSchedule>,
    next_id: i64,
}

#[derive(Default)]
pub struct MemoryScheduleStore {
    inner: RwLock<Inner>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the content deck. Flashcards are keyed by id; re-adding an id
    /// replaces the card.
    pub async fn add_flashcard(&self, flashcard: Flashcard) {
        let mut inner = self.inner.write().await;
        inner.flashcards.insert(flashcard.id, flashcard);
    }

    pub async fn add_flashcards(&self, flashcards: impl IntoIterator<Item = Flashcard>) {
        let mut inner = self.inner.write().await;
        for flashcard in flashcards {
            inner.flashcards.insert(flashcard.id, flashcard);
        }
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn get_schedule(
        &self,
        user_id: i64,
        flashcard_id: i64,
    ) -> Result<Option<CardSchedule>> {
        let inner = self.inner.read().await;
        Ok(inner.schedules.get(&(user_id, flashcard_id)).cloned())
    }

    async fn get_last_enrolled(&self, user_id: i64) -> Result<Option<CardSchedule>> {
        let inner = self.inner.read().await;
        Ok(inner
            .schedules
            .values()
            .filter(|schedule| schedule.user_id == user_id)
            .max_by_key(|schedule| schedule.flashcard_id)
            .cloned())
    }

    async fn get_lowest_unenrolled_flashcard_id(&self, user_id: i64) -> Result<Option<i64>> {
        let inner = self.inner.read().await;
        let last_enrolled = inner
            .schedules
            .values()
            .filter(|schedule| schedule.user_id == user_id)
            .map(|schedule| schedule.flashcard_id)
            .max();

        let candidate = match last_enrolled {
            Some(last) => inner.flashcards.range(last + 1..).next(),
            None => inner.flashcards.iter().next(),
        };
        Ok(candidate.map(|(&id, _)| id))
    }

    async fn list_due_for_user(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<DueCard>> {
        let inner = self.inner.read().await;
        let mut due: Vec<DueCard> = inner
            .schedules
            .values()
            .filter(|schedule| schedule.user_id == user_id && schedule.due <= now)
            .map(|schedule| {
                let flashcard = inner
                    .flashcards
                    .get(&schedule.flashcard_id)
                    .cloned()
                    .ok_or_else(|| {
                        ScheduleError::InvalidState(format!(
                            "flashcard {} missing for schedule {}",
                            schedule.flashcard_id, schedule.id
                        ))
                    })?;
                Ok(DueCard {
                    schedule: schedule.clone(),
                    flashcard,
                })
            })
            .collect::<Result<_>>()?;

        due.sort_by_key(|card| card.schedule.due);
        Ok(due)
    }

    async fn insert(&self, schedule: NewSchedule) -> Result<CardSchedule> {
        let mut inner = self.inner.write().await;
        let key = (schedule.user_id, schedule.flashcard_id);
        if inner.schedules.contains_key(&key) {
            return Err(ScheduleError::DuplicateSchedule);
        }
        // Mirror the Postgres foreign key: no row without its flashcard.
        if !inner.flashcards.contains_key(&schedule.flashcard_id) {
            return Err(ScheduleError::InvalidState(format!(
                "flashcard {} does not exist",
                schedule.flashcard_id
            )));
        }

        inner.next_id += 1;
        let row = CardSchedule {
            id: inner.next_id,
            user_id: schedule.user_id,
            flashcard_id: schedule.flashcard_id,
            due: schedule.due,
            stability: 0.0,
            difficulty: 0.0,
            elapsed_days: 0,
            scheduled_days: 0,
            reps: 0,
            lapses: 0,
            state: CardState::New,
            step: 0,
            last_review: None,
            version: 0,
        };
        inner.schedules.insert(key, row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        schedule: &CardSchedule,
        expected_version: i64,
    ) -> Result<CardSchedule> {
        let mut inner = self.inner.write().await;
        let key = (schedule.user_id, schedule.flashcard_id);
        let Some(existing) = inner.schedules.get_mut(&key) else {
            return Err(ScheduleError::ScheduleNotFound);
        };
        if existing.version != expected_version {
            return Err(ScheduleError::Conflict);
        }

        let mut updated = schedule.clone();
        updated.id = existing.id;
        updated.version = expected_version + 1;
        *existing = updated.clone();
        Ok(updated)
    }
}
