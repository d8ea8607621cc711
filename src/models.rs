use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;

pub type CardId = String;
pub type TopicId = String;

/// Topics the learner has marked complete. Owned by the front end.
pub type CompletionSet = BTreeSet<TopicId>;

pub const DEFAULT_INTERVAL: u32 = 1;
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;

// Scheduling state for one flashcard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub interval: u32,
    pub ease_factor: f64,
    pub review_count: u32,
    pub last_review: Timestamp,
    pub next_review: Timestamp,
}

// Self-graded recall for one review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub fn quality(&self) -> u8 {
        match self {
            Rating::Again => 0,
            Rating::Hard => 3,
            Rating::Good => 4,
            Rating::Easy => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "again" | "a" | "1" => Some(Rating::Again),
            "hard" | "h" | "2" => Some(Rating::Hard),
            "good" | "g" | "3" => Some(Rating::Good),
            "easy" | "e" | "4" => Some(Rating::Easy),
            _ => None,
        }
    }

    /// Like [`Rating::from_str`], but anything unrecognised counts as `Good`.
    pub fn from_label(s: &str) -> Self {
        Self::from_str(s).unwrap_or_else(|| {
            log::warn!("Unrecognised rating '{}', treating it as 'good'", s);
            Rating::Good
        })
    }

    pub fn is_pass(&self) -> bool {
        self.quality() >= 3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Graduate,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
            Difficulty::Graduate => "graduate",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "beginner" => Some(Difficulty::Beginner),
            "intermediate" => Some(Difficulty::Intermediate),
            "advanced" => Some(Difficulty::Advanced),
            "graduate" => Some(Difficulty::Graduate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub category: String,
    pub front: String,
    pub back: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
}

// A course module grouping one or more topics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicNode {
    pub module_number: u32,
    pub title: String,
    pub description: String,
    pub topics: Vec<TopicId>,
    pub estimated_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyPath {
    pub key: String,
    pub name: String,
    pub description: String,
    pub sequence: Vec<TopicId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MasteryTime {
    pub reading: u32,
    pub practice: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyProgress {
    pub completed: usize,
    pub total: usize,
    pub percentage: u32,
    pub next_topic: Option<TopicId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSummary {
    pub total_minutes: u32,
    pub hours: u32,
    pub minutes: u32,
    pub formatted: String,
}

impl TimeSummary {
    pub fn from_minutes(total_minutes: u32) -> Self {
        let hours = total_minutes / 60;
        let minutes = total_minutes % 60;
        Self {
            total_minutes,
            hours,
            minutes,
            formatted: format!("{}h {}min", hours, minutes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    Completed,
    Available,
    Locked,
}

impl TopicStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicStatus::Completed => "completed",
            TopicStatus::Available => "available",
            TopicStatus::Locked => "locked",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TopicStatus::Completed => "[x]",
            TopicStatus::Available => "[ ]",
            TopicStatus::Locked => "[-]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub tracked: usize,
    pub total_reviews: u64,
    pub due: usize,
    pub mastered: usize,
    pub average_strength: f64,
}

// Running counts for one drill session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionTally {
    pub reviewed: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub skipped: u32,
}

impl SessionTally {
    /// `None` means the card was skipped without a rating.
    pub fn record(&mut self, rating: Option<Rating>) {
        self.reviewed += 1;
        match rating {
            Some(Rating::Good | Rating::Easy) => self.correct += 1,
            Some(Rating::Again | Rating::Hard) => self.incorrect += 1,
            None => self.skipped += 1,
        }
    }

    pub fn accuracy(&self) -> f64 {
        let graded = self.correct + self.incorrect;
        if graded == 0 {
            0.0
        } else {
            (self.correct as f64 / graded as f64) * 100.0
        }
    }
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
