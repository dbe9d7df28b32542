use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of flashcard categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Kanji,
    Vocab,
    Radical,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Kanji => "kanji",
            CardType::Vocab => "vocab",
            CardType::Radical => "radical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "kanji" => Some(CardType::Kanji),
            "vocab" => Some(CardType::Vocab),
            "radical" => Some(CardType::Radical),
            _ => None,
        }
    }
}

/// Immutable content record. Created by content import, never mutated by
/// the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: i64,
    /// Difficulty tier the card belongs to.
    pub level: i32,
    pub card_type: CardType,
    /// Opaque front/back content; the scheduler never looks inside.
    pub fields: String,
}

/// Review-quality rating supplied by the learner. Ordinal: Again is the
/// worst outcome, Easy the best. Consumed immediately, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    /// Decode a wire value. `None` outside 1..=4; callers map that to
    /// [`crate::ScheduleError::InvalidRating`].
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Rating::Again),
            2 => Some(Rating::Hard),
            3 => Some(Rating::Good),
            4 => Some(Rating::Easy),
            _ => None,
        }
    }

    /// Everything except Again counts as a successful review.
    pub fn is_success(&self) -> bool {
        !matches!(self, Rating::Again)
    }
}

/// Lifecycle state of a card within one learner's schedule.
///
/// `New -> Learning -> Review`, with `Review -> Relearning -> Review` on
/// lapse. No terminal state; cards cycle indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardState {
    New,
    Learning,
    Review,
    Relearning,
}

impl CardState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardState::New => "NEW",
            CardState::Learning => "LEARNING",
            CardState::Review => "REVIEW",
            CardState::Relearning => "RELEARNING",
        }
    }

    /// Decode the persisted string form. `None` for unrecognized values;
    /// the store maps that to [`crate::ScheduleError::InvalidState`].
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(CardState::New),
            "LEARNING" => Some(CardState::Learning),
            "REVIEW" => Some(CardState::Review),
            "RELEARNING" => Some(CardState::Relearning),
            _ => None,
        }
    }
}

/// Per-(user, flashcard) memory-state row. One row per pair, unique on
/// the pair. Mutated only by applying a rating; reads never change it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardSchedule {
    pub id: i64,
    pub user_id: i64,
    pub flashcard_id: i64,
    /// When the card next becomes eligible for review. Always set, even
    /// for New cards (enrollment sets it to the enrollment instant).
    pub due: DateTime<Utc>,
    /// Estimated days until recall probability decays to the reference
    /// threshold. Non-negative.
    pub stability: f64,
    /// Intrinsic hardness in [1, 10], adjusted by each review.
    pub difficulty: f64,
    /// Whole days since the previous review, captured at review time.
    pub elapsed_days: i32,
    /// Length of the previously scheduled interval, in whole days.
    /// Zero while the card is on minute-based learning steps.
    pub scheduled_days: i32,
    /// Total successful (non-Again) reviews. Never decreases.
    pub reps: i32,
    /// Total forgotten reviews. Never decreases.
    pub lapses: i32,
    pub state: CardState,
    /// Successful steps completed in the current Learning/Relearning
    /// episode. Reset by Again; meaningless in Review.
    pub step: i32,
    pub last_review: Option<DateTime<Utc>>,
    /// Optimistic-concurrency counter, bumped by every store update.
    pub version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_from_u8_round_trip() {
        for value in 1u8..=4 {
            let rating = Rating::from_u8(value).unwrap();
            assert_eq!(rating as u8, value);
        }
        assert!(Rating::from_u8(0).is_none());
        assert!(Rating::from_u8(5).is_none());
    }

    #[test]
    fn rating_success_split() {
        assert!(!Rating::Again.is_success());
        assert!(Rating::Hard.is_success());
        assert!(Rating::Good.is_success());
        assert!(Rating::Easy.is_success());
    }

    #[test]
    fn card_state_string_round_trip() {
        for state in [
            CardState::New,
            CardState::Learning,
            CardState::Review,
            CardState::Relearning,
        ] {
            assert_eq!(CardState::from_str(state.as_str()), Some(state));
        }
        assert!(CardState::from_str("MASTERED").is_none());
        assert!(CardState::from_str("new").is_none());
    }

    #[test]
    fn card_type_serde_matches_db_form() {
        let json = serde_json::to_string(&CardType::Kanji).unwrap();
        assert_eq!(json, "\"kanji\"");
        assert_eq!(CardType::Kanji.as_str(), "kanji");
        assert_eq!(CardType::from_str("radical"), Some(CardType::Radical));
        assert!(CardType::from_str("grammar").is_none());
    }
}
