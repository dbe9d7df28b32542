//! # kioku-srs
//!
//! Spaced-repetition scheduling core. Decides, for a given learner and a
//! given flashcard, when that card is next due for review, based on the
//! review-quality rating the learner supplies.
//!
//! The crate is split along three seams:
//!
//! - [`scheduler`] - the pure memory model and per-card state machine.
//!   `transition` is a deterministic function of (schedule, rating, now);
//!   no I/O, no hidden state.
//! - [`store`] - persistence for per-(user, card) schedule rows, behind
//!   the [`store::ScheduleStore`] trait. Ships a Postgres implementation
//!   and an in-memory one for tests and DB-less embedding.
//! - [`service`] - the orchestration layer callers talk to: enroll the
//!   next card, list due cards, apply a rating.
//!
//! All timestamps are UTC `chrono::DateTime<Utc>`; implementations
//! normalize at the store boundary so scheduler arithmetic never sees a
//! local offset.

pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod scheduler;
pub mod service;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{SchedulerConfig, StoreConfig};
pub use error::ScheduleError;
pub use model::{CardSchedule, CardState, CardType, Flashcard, Rating};
pub use scheduler::Scheduler;
pub use service::SchedulingService;
pub use store::{DueCard, NewSchedule, ScheduleStore};
