use tracing::warn;

use crate::models::{PlatformCounts, PlatformStatistics};

impl PlatformStatistics {
    pub fn from_counts(counts: PlatformCounts) -> Self {
        Self {
            total_users: non_negative("users", counts.user_count),
            total_lessons: non_negative("lessons", counts.lesson_count),
            active_instructors: non_negative(
                "active_instructors",
                counts.active_instructor_count,
            ),
            disputed_lessons: non_negative("disputed_lessons", counts.disputed_lesson_count),
        }
    }
}

fn non_negative(label: &str, value: i64) -> u64 {
    u64::try_from(value).unwrap_or_else(|_| {
        warn!(count = label, value, "store returned a negative count, using 0");
        0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_carry_through() {
        let stats = PlatformStatistics::from_counts(PlatformCounts {
            user_count: 120,
            lesson_count: 940,
            active_instructor_count: 14,
            disputed_lesson_count: 3,
        });

        assert_eq!(stats.total_users, 120);
        assert_eq!(stats.total_lessons, 940);
        assert_eq!(stats.active_instructors, 14);
        assert_eq!(stats.disputed_lessons, 3);
    }

    #[test]
    fn negative_counts_become_zero() {
        let stats = PlatformStatistics::from_counts(PlatformCounts {
            user_count: -1,
            ..PlatformCounts::default()
        });

        assert_eq!(stats.total_users, 0);
        assert_eq!(stats.total_lessons, 0);
    }
}
