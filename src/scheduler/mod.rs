//! Per-card state machine and review transition.
//!
//! [`Scheduler::transition`] is a pure function: given the same schedule,
//! rating and instant it produces bit-identical output. All I/O lives in
//! the store; the scheduler only computes.

pub mod memory;

use chrono::{DateTime, Duration, Utc};

use crate::config::SchedulerConfig;
use crate::model::{CardSchedule, CardState, Rating};

pub use memory::MemoryParams;

/// Stateless scheduling engine. Cheap to construct and safe to share;
/// it holds only configuration.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Apply one review outcome and produce the successor schedule.
    ///
    /// State machine:
    /// - `New --(any rating)--> Learning`
    /// - `Learning --(Good|Easy, all steps done)--> Review`, `--(Again)-->`
    ///   restart the steps, `--(Hard)-->` repeat the current step
    /// - `Review --(Again)--> Relearning` with `lapses += 1`
    /// - `Relearning --(Good|Easy, steps done)--> Review`
    ///
    /// `reps` increments on every non-Again review; `last_review` always
    /// becomes `now`. Learning/Relearning intervals are minute-based
    /// steps; Review intervals are whole days derived from stability and
    /// the target retention.
    pub fn transition(
        &self,
        schedule: &CardSchedule,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> CardSchedule {
        let elapsed = self.elapsed_days(schedule, now);
        let grade = rating as i32;
        let params = &self.config.params;

        let mut next = schedule.clone();
        next.elapsed_days = elapsed as i32;
        next.last_review = Some(now);
        if rating.is_success() {
            next.reps += 1;
        }

        match schedule.state {
            CardState::New => {
                next.stability = memory::initial_stability(params, grade);
                next.difficulty = memory::initial_difficulty(params, grade);
                next.state = CardState::Learning;
                next.step = if matches!(rating, Rating::Good | Rating::Easy) {
                    1
                } else {
                    0
                };
                self.schedule_step(&mut next, now, &self.config.learning_steps_minutes);
            }
            CardState::Learning => {
                self.update_memory(&mut next, schedule, rating, elapsed);
                self.advance_steps(&mut next, rating, now, &self.config.learning_steps_minutes);
            }
            CardState::Relearning => {
                self.update_memory(&mut next, schedule, rating, elapsed);
                self.advance_steps(&mut next, rating, now, &self.config.relearning_steps_minutes);
            }
            CardState::Review => {
                self.update_memory(&mut next, schedule, rating, elapsed);
                if rating == Rating::Again {
                    next.state = CardState::Relearning;
                    next.lapses += 1;
                    next.step = 0;
                    next.scheduled_days = 0;
                    next.due =
                        now + Duration::minutes(self.first_step(&self.config.relearning_steps_minutes));
                } else {
                    next.step = 0;
                    self.schedule_review_interval(&mut next, now);
                }
            }
        }

        next
    }

    /// Current recall-probability estimate for a schedule, for callers
    /// that want to surface it (e.g. sorting a review queue).
    pub fn retrievability(&self, schedule: &CardSchedule, now: DateTime<Utc>) -> f64 {
        let Some(last_review) = schedule.last_review else {
            return 1.0;
        };
        let elapsed_days = (now - last_review).num_seconds().max(0) as f64 / 86_400.0;
        memory::retrievability(schedule.stability, elapsed_days)
    }

    /// Whole days since the previous review, or since enrollment for a
    /// card that has never been reviewed (enrollment sets `due` to the
    /// enrollment instant). Negative elapsed means clock skew or an
    /// out-of-order review; clamp to zero and warn rather than fail.
    fn elapsed_days(&self, schedule: &CardSchedule, now: DateTime<Utc>) -> i64 {
        let reference = schedule.last_review.unwrap_or(schedule.due);
        let days = (now - reference).num_days();
        if days < 0 {
            tracing::warn!(
                schedule_id = schedule.id,
                user_id = schedule.user_id,
                flashcard_id = schedule.flashcard_id,
                days,
                "negative elapsed days, clamping to 0"
            );
            return 0;
        }
        days
    }

    fn update_memory(
        &self,
        next: &mut CardSchedule,
        prior: &CardSchedule,
        rating: Rating,
        elapsed: i64,
    ) {
        let params = &self.config.params;
        let grade = rating as i32;
        let recall = memory::retrievability(prior.stability, elapsed as f64);

        next.difficulty = memory::next_difficulty(params, prior.difficulty, grade);
        next.stability = if rating == Rating::Again {
            memory::next_forget_stability(params, prior.difficulty, prior.stability, recall)
        } else {
            memory::next_recall_stability(params, prior.difficulty, prior.stability, recall, grade)
        };
    }

    /// Step mechanics shared by Learning and Relearning: Again restarts,
    /// Hard repeats the current step, Good/Easy advance and graduate to
    /// Review once every step has been passed.
    fn advance_steps(
        &self,
        next: &mut CardSchedule,
        rating: Rating,
        now: DateTime<Utc>,
        steps: &[i64],
    ) {
        match rating {
            Rating::Again => {
                next.step = 0;
                self.schedule_step(next, now, steps);
            }
            Rating::Hard => {
                self.schedule_step(next, now, steps);
            }
            Rating::Good | Rating::Easy => {
                next.step += 1;
                if next.step as usize >= steps.len() {
                    next.state = CardState::Review;
                    next.step = 0;
                    self.schedule_review_interval(next, now);
                } else {
                    self.schedule_step(next, now, steps);
                }
            }
        }
    }

    fn schedule_step(&self, next: &mut CardSchedule, now: DateTime<Utc>, steps: &[i64]) {
        let index = (next.step as usize).min(steps.len().saturating_sub(1));
        let minutes = steps.get(index).copied().unwrap_or(1);
        next.scheduled_days = 0;
        next.due = now + Duration::minutes(minutes);
    }

    fn schedule_review_interval(&self, next: &mut CardSchedule, now: DateTime<Utc>) {
        let interval =
            memory::next_interval(next.stability, self.config.desired_retention).round() as i64;
        next.scheduled_days = interval as i32;
        next.due = now + Duration::days(interval);
    }

    fn first_step(&self, steps: &[i64]) -> i64 {
        steps.first().copied().unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn enrolled(now: DateTime<Utc>) -> CardSchedule {
        CardSchedule {
            id: 1,
            user_id: 7,
            flashcard_id: 42,
            due: now,
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
        }
    }

    #[test]
    fn new_card_enters_learning_on_any_rating() {
        let scheduler = Scheduler::default();
        for rating in [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy] {
            let next = scheduler.transition(&enrolled(t0()), rating, t0());
            assert_eq!(next.state, CardState::Learning, "rating {rating:?}");
            assert!(next.stability > 0.0);
            assert!((1.0..=10.0).contains(&next.difficulty));
            assert_eq!(next.last_review, Some(t0()));
        }
    }

    #[test]
    fn two_goods_graduate_to_review_with_growing_interval() {
        let scheduler = Scheduler::default();
        let first = scheduler.transition(&enrolled(t0()), Rating::Good, t0());
        assert_eq!(first.state, CardState::Learning);
        assert_eq!(first.scheduled_days, 0);
        assert!(first.due > t0());

        let later = first.due;
        let second = scheduler.transition(&first, Rating::Good, later);
        assert_eq!(second.state, CardState::Review);
        assert!(second.scheduled_days > first.scheduled_days);
        assert!(second.scheduled_days >= 1);
        assert_eq!(second.due, later + Duration::days(second.scheduled_days as i64));
        assert_eq!(second.reps, 2);
    }

    #[test]
    fn again_in_learning_restarts_steps_without_lapse() {
        let scheduler = Scheduler::default();
        let first = scheduler.transition(&enrolled(t0()), Rating::Good, t0());
        assert_eq!(first.step, 1);

        let second = scheduler.transition(&first, Rating::Again, first.due);
        assert_eq!(second.state, CardState::Learning);
        assert_eq!(second.step, 0);
        assert_eq!(second.lapses, 0);
        assert_eq!(second.reps, first.reps);
    }

    #[test]
    fn hard_in_learning_repeats_current_step() {
        let scheduler = Scheduler::default();
        let first = scheduler.transition(&enrolled(t0()), Rating::Good, t0());
        let second = scheduler.transition(&first, Rating::Hard, first.due);
        assert_eq!(second.state, CardState::Learning);
        assert_eq!(second.step, first.step);
        assert_eq!(second.reps, first.reps + 1);
    }

    fn review_card(scheduler: &Scheduler) -> CardSchedule {
        let first = scheduler.transition(&enrolled(t0()), Rating::Good, t0());
        scheduler.transition(&first, Rating::Good, first.due)
    }

    #[test]
    fn review_again_lapses_into_relearning_and_drops_stability() {
        let scheduler = Scheduler::default();
        let review = review_card(&scheduler);
        assert_eq!(review.state, CardState::Review);

        let lapsed = scheduler.transition(&review, Rating::Again, review.due);
        assert_eq!(lapsed.state, CardState::Relearning);
        assert_eq!(lapsed.lapses, review.lapses + 1);
        assert!(lapsed.stability < review.stability);
        assert_eq!(lapsed.scheduled_days, 0);
        assert!(lapsed.due > lapsed.last_review.unwrap());
    }

    #[test]
    fn relearning_good_returns_to_review() {
        let scheduler = Scheduler::default();
        let review = review_card(&scheduler);
        let lapsed = scheduler.transition(&review, Rating::Again, review.due);

        let recovered = scheduler.transition(&lapsed, Rating::Good, lapsed.due);
        assert_eq!(recovered.state, CardState::Review);
        assert!(recovered.scheduled_days >= 1);
    }

    #[test]
    fn review_success_grows_interval() {
        let scheduler = Scheduler::default();
        let review = review_card(&scheduler);
        let next = scheduler.transition(&review, Rating::Good, review.due);
        assert_eq!(next.state, CardState::Review);
        assert!(next.stability > review.stability);
        assert!(next.scheduled_days >= review.scheduled_days);
    }

    #[test]
    fn negative_elapsed_clamps_to_zero() {
        let scheduler = Scheduler::default();
        let review = review_card(&scheduler);
        // Review arrives before the previous last_review (clock skew).
        let skewed = review.last_review.unwrap() - Duration::days(2);
        let next = scheduler.transition(&review, Rating::Good, skewed);
        assert_eq!(next.elapsed_days, 0);
    }

    #[test]
    fn transition_is_deterministic() {
        let scheduler = Scheduler::default();
        let review = review_card(&scheduler);
        let now = review.due + Duration::days(3);
        let a = scheduler.transition(&review, Rating::Hard, now);
        let b = scheduler.transition(&review, Rating::Hard, now);
        assert_eq!(a, b);
    }

    #[test]
    fn retrievability_is_one_right_after_enrollment() {
        let scheduler = Scheduler::default();
        let card = enrolled(t0());
        assert_eq!(scheduler.retrievability(&card, t0()), 1.0);

        let review = review_card(&scheduler);
        let just_after = review.last_review.unwrap();
        assert!(scheduler.retrievability(&review, just_after) > 0.99);
        let much_later = just_after + Duration::days(365);
        assert!(
            scheduler.retrievability(&review, much_later)
                < scheduler.retrievability(&review, just_after)
        );
    }

    proptest! {
        /// Counters never decrease and cards never come due in the past,
        /// over arbitrary rating sequences reviewed exactly when due.
        #[test]
        fn counters_monotone_and_due_in_future(ratings in prop::collection::vec(1u8..=4, 1..30)) {
            let scheduler = Scheduler::default();
            let mut card = enrolled(t0());
            let mut now = t0();

            for value in ratings {
                let rating = Rating::from_u8(value).unwrap();
                let next = scheduler.transition(&card, rating, now);

                prop_assert!(next.reps >= card.reps);
                prop_assert!(next.lapses >= card.lapses);
                prop_assert!(next.due > now);
                prop_assert!(next.stability > 0.0);
                prop_assert!((1.0..=10.0).contains(&next.difficulty));
                prop_assert_eq!(next.last_review, Some(now));

                now = next.due;
                card = next;
            }
        }
    }
}
