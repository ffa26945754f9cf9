use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{PlatformStatistics, StreakGranularity, StudentDashboard};
use crate::progression::level_info;

pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}

fn streak_unit(granularity: StreakGranularity, count: u32) -> &'static str {
    match (granularity, count) {
        (StreakGranularity::Day, 1) => "day",
        (StreakGranularity::Day, _) => "days",
        (StreakGranularity::Week, 1) => "week",
        (StreakGranularity::Week, _) => "weeks",
    }
}

pub fn build_student_report(
    student_label: &str,
    generated_at: DateTime<Utc>,
    dashboard: &StudentDashboard,
) -> String {
    let mut output = String::new();
    let stats = &dashboard.statistics;
    let current = dashboard.level;
    let upcoming = dashboard.next_level;

    let _ = writeln!(output, "# Lesson Progress Report");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        student_label,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Level");
    let _ = writeln!(output, "- Current: {} ({})", current.name, current.description);
    if upcoming == stats.current_level {
        let _ = writeln!(output, "- Top of the progression, keep riding!");
    } else {
        let _ = writeln!(output, "- Next: {}", level_info(upcoming).name);
    }
    let _ = writeln!(
        output,
        "- Lessons completed: {} of {} ({:.0}%)",
        stats.completed_lessons,
        stats.total_lessons,
        dashboard.progress_ratio * 100.0
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Activity");
    let _ = writeln!(output, "- Lessons this month: {}", stats.lessons_this_month);
    let _ = writeln!(
        output,
        "- Current streak: {} {}",
        stats.streak.count,
        streak_unit(stats.streak.granularity, stats.streak.count)
    );
    let _ = writeln!(output, "- Average rating: {:.1}", stats.average_rating);
    let _ = writeln!(output, "- Total spent: {}", format_cents(stats.total_spent_cents));
    let _ = writeln!(
        output,
        "- Achievements: {} ({} points)",
        stats.total_achievements, stats.total_points
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Favorite Instructors");

    if stats.favorite_instructors.is_empty() {
        let _ = writeln!(output, "No completed lessons yet.");
    } else {
        for favorite in stats.favorite_instructors.iter() {
            let _ = writeln!(
                output,
                "- {}: {} lessons",
                favorite.instructor_name, favorite.lesson_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Achievements");

    if stats.recent_achievements.is_empty() {
        let _ = writeln!(output, "No achievements yet.");
    } else {
        for achievement in stats.recent_achievements.iter() {
            let _ = writeln!(
                output,
                "- {} (+{} points) on {}",
                achievement.title,
                achievement.points,
                achievement.awarded_at.date_naive()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Activity");

    if stats.monthly_activity.is_empty() {
        let _ = writeln!(output, "No lessons recorded.");
    } else {
        for month in stats.monthly_activity.iter() {
            let _ = writeln!(
                output,
                "- {}-{:02}: {} lessons",
                month.year, month.month, month.lesson_count
            );
        }
    }

    output
}

pub fn build_platform_summary(stats: &PlatformStatistics, active_window_days: i64) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Platform overview:");
    let _ = writeln!(output, "- Users: {}", stats.total_users);
    let _ = writeln!(output, "- Lessons: {}", stats.total_lessons);
    let _ = writeln!(
        output,
        "- Active instructors (last {} days): {}",
        active_window_days, stats.active_instructors
    );
    let _ = writeln!(output, "- Disputed lessons: {}", stats.disputed_lessons);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AchievementSummary, InstructorFrequency, MonthlyActivity, Streak, StudentStatistics,
    };
    use crate::progression::SkillLevel;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn sample_dashboard(level: SkillLevel) -> StudentDashboard {
        StudentDashboard::from_statistics(StudentStatistics {
            student_id: Uuid::nil(),
            total_lessons: 4,
            completed_lessons: 3,
            average_rating: 4.5,
            current_level: level,
            total_achievements: 2,
            lessons_this_month: 1,
            favorite_instructors: vec![InstructorFrequency {
                instructor_id: Uuid::nil(),
                instructor_name: "Marta Ruiz".to_string(),
                lesson_count: 3,
            }],
            total_spent_cents: 33_550,
            streak: Streak {
                count: 1,
                granularity: StreakGranularity::Week,
            },
            total_points: 170,
            recent_achievements: vec![AchievementSummary {
                title: "Linked ten turns".to_string(),
                points: 120,
                awarded_at: Utc.with_ymd_and_hms(2026, 2, 1, 15, 0, 0).unwrap(),
            }],
            monthly_activity: vec![MonthlyActivity {
                year: 2026,
                month: 2,
                lesson_count: 4,
            }],
        })
    }

    #[test]
    fn cents_render_as_dollars() {
        assert_eq!(format_cents(18_000), "$180.00");
        assert_eq!(format_cents(5), "$0.05");
        assert_eq!(format_cents(-250), "-$2.50");
    }

    #[test]
    fn report_includes_level_progress_and_favorites() {
        let generated = Utc.with_ymd_and_hms(2026, 2, 15, 12, 0, 0).unwrap();
        let report = build_student_report(
            "Noah Fischer",
            generated,
            &sample_dashboard(SkillLevel::LinkingTurns),
        );

        assert!(report.contains("Generated for Noah Fischer on 2026-02-15 12:00 UTC"));
        assert!(report.contains("- Current: Linking Turns"));
        assert!(report.contains("- Next: Confident Turns"));
        assert!(report.contains("- Lessons completed: 3 of 4 (75%)"));
        assert!(report.contains("- Current streak: 1 week"));
        assert!(report.contains("- Total spent: $335.50"));
        assert!(report.contains("- Marta Ruiz: 3 lessons"));
        assert!(report.contains("- Linked ten turns (+120 points) on 2026-02-01"));
        assert!(report.contains("- 2026-02: 4 lessons"));
    }

    #[test]
    fn top_level_has_no_next_step() {
        let generated = Utc.with_ymd_and_hms(2026, 2, 15, 12, 0, 0).unwrap();
        let report = build_student_report(
            "Noah Fischer",
            generated,
            &sample_dashboard(SkillLevel::ConsistentBlue),
        );

        assert!(report.contains("Top of the progression"));
        assert!(!report.contains("- Next:"));
    }

    #[test]
    fn platform_summary_lists_every_count() {
        let summary = build_platform_summary(
            &PlatformStatistics {
                total_users: 12,
                total_lessons: 40,
                active_instructors: 3,
                disputed_lessons: 1,
            },
            30,
        );

        assert!(summary.contains("- Users: 12"));
        assert!(summary.contains("- Active instructors (last 30 days): 3"));
        assert!(summary.contains("- Disputed lessons: 1"));
    }
}
