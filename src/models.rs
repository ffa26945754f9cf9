use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::progression::{LevelInfo, SkillLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    Scheduled,
    Completed,
    Cancelled,
    Disputed,
}

impl LessonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonStatus::Scheduled => "scheduled",
            LessonStatus::Completed => "completed",
            LessonStatus::Cancelled => "cancelled",
            LessonStatus::Disputed => "disputed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "scheduled" => Some(LessonStatus::Scheduled),
            "completed" => Some(LessonStatus::Completed),
            "cancelled" => Some(LessonStatus::Cancelled),
            "disputed" => Some(LessonStatus::Disputed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LessonRecord {
    pub lesson_id: Uuid,
    pub student_id: Uuid,
    pub instructor_id: Uuid,
    pub instructor_name: String,
    pub status: LessonStatus,
    pub rating: Option<i32>,
    pub cost_cents: i64,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AchievementRecord {
    pub achievement_id: Uuid,
    pub student_id: Uuid,
    pub title: String,
    pub points: i64,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstructorFrequency {
    pub instructor_id: Uuid,
    pub instructor_name: String,
    pub lesson_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakGranularity {
    Day,
    Week,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Streak {
    pub count: u32,
    pub granularity: StreakGranularity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AchievementSummary {
    pub title: String,
    pub points: i64,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyActivity {
    pub year: i32,
    pub month: u32,
    pub lesson_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentStatistics {
    pub student_id: Uuid,
    pub total_lessons: usize,
    pub completed_lessons: usize,
    pub average_rating: f64,
    pub current_level: SkillLevel,
    pub total_achievements: usize,
    pub lessons_this_month: usize,
    pub favorite_instructors: Vec<InstructorFrequency>,
    pub total_spent_cents: i64,
    pub streak: Streak,
    pub total_points: i64,
    pub recent_achievements: Vec<AchievementSummary>,
    pub monthly_activity: Vec<MonthlyActivity>,
}

/// Raw counts as returned by the store, before sign checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformCounts {
    pub user_count: i64,
    pub lesson_count: i64,
    pub active_instructor_count: i64,
    pub disputed_lesson_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlatformStatistics {
    pub total_users: u64,
    pub total_lessons: u64,
    pub active_instructors: u64,
    pub disputed_lessons: u64,
}

/// Statistics joined with the level metadata shown beside them.
#[derive(Debug, Clone, Serialize)]
pub struct StudentDashboard {
    pub statistics: StudentStatistics,
    pub level: LevelInfo,
    pub next_level: SkillLevel,
    pub progress_ratio: f64,
}
