use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    FirstTime,
    DevelopingTurns,
    LinkingTurns,
    ConfidentTurns,
    ConsistentBlue,
}

impl SkillLevel {
    /// Levels in progression order.
    pub const ALL: [SkillLevel; 5] = [
        SkillLevel::FirstTime,
        SkillLevel::DevelopingTurns,
        SkillLevel::LinkingTurns,
        SkillLevel::ConfidentTurns,
        SkillLevel::ConsistentBlue,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SkillLevel::FirstTime => "first_time",
            SkillLevel::DevelopingTurns => "developing_turns",
            SkillLevel::LinkingTurns => "linking_turns",
            SkillLevel::ConfidentTurns => "confident_turns",
            SkillLevel::ConsistentBlue => "consistent_blue",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|level| level.key() == raw)
    }

    fn position(&self) -> usize {
        Self::ALL
            .iter()
            .position(|level| level == self)
            .unwrap_or(0)
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// How a level string that matches no known key is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelPolicy {
    #[default]
    Fallback,
    Strict,
}

impl LevelPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fallback" => Some(LevelPolicy::Fallback),
            "strict" => Some(LevelPolicy::Strict),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgressionError {
    #[error("unknown skill level: {0:?}")]
    UnknownLevel(String),
}

pub fn level_info(level: SkillLevel) -> LevelInfo {
    match level {
        SkillLevel::FirstTime => LevelInfo {
            name: "First Time",
            description:
                "Never skied or ridden before. Gear, balance and stopping on the magic carpet.",
        },
        SkillLevel::DevelopingTurns => LevelInfo {
            name: "Developing Turns",
            description: "Can stop and make wedge turns on green runs with some hesitation.",
        },
        SkillLevel::LinkingTurns => LevelInfo {
            name: "Linking Turns",
            description: "Links turns in both directions on green runs and controls speed.",
        },
        SkillLevel::ConfidentTurns => LevelInfo {
            name: "Confident Turns",
            description: "Comfortable on all greens, starting to explore easier blue runs.",
        },
        SkillLevel::ConsistentBlue => LevelInfo {
            name: "Consistent Blue",
            description:
                "Rides blue runs with control in varied snow and is ready for new terrain.",
        },
    }
}

/// Metadata for a raw level key; unknown keys get the `first_time` entry.
pub fn level_info_for(raw: &str) -> LevelInfo {
    level_info(SkillLevel::parse(raw).unwrap_or(SkillLevel::FirstTime))
}

pub fn next_level(level: SkillLevel) -> SkillLevel {
    let last = SkillLevel::ALL.len() - 1;
    SkillLevel::ALL[(level.position() + 1).min(last)]
}

pub fn resolve_level(raw: &str, policy: LevelPolicy) -> Result<SkillLevel, ProgressionError> {
    match SkillLevel::parse(raw) {
        Some(level) => Ok(level),
        None => match policy {
            LevelPolicy::Fallback => {
                warn!(level = raw, "unknown skill level, falling back to first_time");
                Ok(SkillLevel::FirstTime)
            }
            LevelPolicy::Strict => Err(ProgressionError::UnknownLevel(raw.to_string())),
        },
    }
}

/// Share of lessons completed, always within `[0, 1]`.
///
/// A zero total is floored at 1 and an over-complete count is clamped to the
/// total.
pub fn progress_ratio(completed_lessons: usize, total_lessons: usize) -> f64 {
    let completed = if completed_lessons > total_lessons {
        warn!(
            completed_lessons,
            total_lessons, "completed lessons exceed total, clamping"
        );
        total_lessons
    } else {
        completed_lessons
    };

    completed as f64 / total_lessons.max(1) as f64
}
