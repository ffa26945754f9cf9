use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::models::{
    AchievementRecord, AchievementSummary, InstructorFrequency, LessonRecord, LessonStatus,
    MonthlyActivity, Streak, StreakGranularity, StudentDashboard, StudentStatistics,
};
use crate::progression::{
    level_info, next_level, progress_ratio, resolve_level, LevelPolicy, ProgressionError,
    SkillLevel,
};

pub const FAVORITE_INSTRUCTOR_LIMIT: usize = 3;
pub const RECENT_ACHIEVEMENT_LIMIT: usize = 3;

/// Clock and calendar settings an aggregation is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct Evaluation {
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
    pub granularity: StreakGranularity,
    pub level_policy: LevelPolicy,
}

impl Evaluation {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            offset: Utc.fix(),
            granularity: StreakGranularity::Day,
            level_policy: LevelPolicy::Fallback,
        }
    }

    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }
}

struct InstructorTally {
    name: String,
    count: usize,
    last_seen: DateTime<Utc>,
}

pub fn aggregate_student(
    student_id: Uuid,
    lessons: &[LessonRecord],
    achievements: &[AchievementRecord],
    raw_level: Option<&str>,
    eval: &Evaluation,
) -> Result<StudentStatistics, ProgressionError> {
    let current_level = match raw_level {
        Some(raw) => resolve_level(raw, eval.level_policy)?,
        None => SkillLevel::FirstTime,
    };

    let lessons: Vec<&LessonRecord> = lessons
        .iter()
        .filter(|lesson| {
            let owned = lesson.student_id == student_id;
            if !owned {
                warn!(lesson_id = %lesson.lesson_id, "lesson belongs to another student, skipping");
            }
            owned
        })
        .collect();
    let achievements: Vec<&AchievementRecord> = achievements
        .iter()
        .filter(|achievement| {
            let owned = achievement.student_id == student_id;
            if !owned {
                warn!(
                    achievement_id = %achievement.achievement_id,
                    "achievement belongs to another student, skipping"
                );
            }
            owned
        })
        .collect();

    let today = eval.local_date(eval.now);
    let mut completed_lessons = 0usize;
    let mut rating_total = 0i64;
    let mut rating_count = 0usize;
    let mut total_spent_cents = 0i64;
    let mut lessons_this_month = 0usize;
    let mut tallies: HashMap<Uuid, InstructorTally> = HashMap::new();
    let mut months: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    let mut periods: BTreeSet<NaiveDate> = BTreeSet::new();

    for lesson in &lessons {
        let date = eval.local_date(lesson.scheduled_at);
        if date.year() == today.year() && date.month() == today.month() {
            lessons_this_month += 1;
        }
        *months.entry((date.year(), date.month())).or_insert(0) += 1;

        if lesson.status != LessonStatus::Cancelled {
            total_spent_cents = total_spent_cents.saturating_add(lesson.cost_cents);
        }

        if lesson.status != LessonStatus::Completed {
            continue;
        }

        completed_lessons += 1;
        if let Some(rating) = lesson.rating {
            rating_total += i64::from(rating);
            rating_count += 1;
        }

        let tally = tallies
            .entry(lesson.instructor_id)
            .or_insert_with(|| InstructorTally {
                name: lesson.instructor_name.clone(),
                count: 0,
                last_seen: lesson.scheduled_at,
            });
        tally.count += 1;
        if lesson.scheduled_at > tally.last_seen {
            tally.last_seen = lesson.scheduled_at;
        }

        periods.insert(period_start(date, eval.granularity));
    }

    let average_rating = if rating_count == 0 {
        0.0
    } else {
        rating_total as f64 / rating_count as f64
    };

    let streak = Streak {
        count: streak_length(
            &periods,
            period_start(today, eval.granularity),
            eval.granularity,
        ),
        granularity: eval.granularity,
    };

    Ok(StudentStatistics {
        student_id,
        total_lessons: lessons.len(),
        completed_lessons,
        average_rating,
        current_level,
        total_achievements: achievements.len(),
        lessons_this_month,
        favorite_instructors: rank_instructors(tallies),
        total_spent_cents,
        streak,
        total_points: achievements
            .iter()
            .fold(0i64, |total, a| total.saturating_add(a.points)),
        recent_achievements: recent_achievements(&achievements),
        monthly_activity: months
            .into_iter()
            .map(|((year, month), lesson_count)| MonthlyActivity {
                year,
                month,
                lesson_count,
            })
            .collect(),
    })
}

impl StudentDashboard {
    pub fn from_statistics(statistics: StudentStatistics) -> Self {
        Self {
            level: level_info(statistics.current_level),
            next_level: next_level(statistics.current_level),
            progress_ratio: progress_ratio(
                statistics.completed_lessons,
                statistics.total_lessons,
            ),
            statistics,
        }
    }
}

fn recent_achievements(achievements: &[&AchievementRecord]) -> Vec<AchievementSummary> {
    let mut sorted = achievements.to_vec();
    sorted.sort_by(|a, b| b.awarded_at.cmp(&a.awarded_at));
    sorted
        .into_iter()
        .take(RECENT_ACHIEVEMENT_LIMIT)
        .map(|achievement| AchievementSummary {
            title: achievement.title.clone(),
            points: achievement.points,
            awarded_at: achievement.awarded_at,
        })
        .collect()
}

fn rank_instructors(tallies: HashMap<Uuid, InstructorTally>) -> Vec<InstructorFrequency> {
    let mut ranked: Vec<(Uuid, InstructorTally)> = tallies.into_iter().collect();
    ranked.sort_by(|(_, a), (_, b)| {
        b.count
            .cmp(&a.count)
            .then_with(|| b.last_seen.cmp(&a.last_seen))
            .then_with(|| a.name.cmp(&b.name))
    });

    ranked
        .into_iter()
        .take(FAVORITE_INSTRUCTOR_LIMIT)
        .map(|(instructor_id, tally)| InstructorFrequency {
            instructor_id,
            instructor_name: tally.name,
            lesson_count: tally.count,
        })
        .collect()
}

pub fn period_start(date: NaiveDate, granularity: StreakGranularity) -> NaiveDate {
    match granularity {
        StreakGranularity::Day => date,
        StreakGranularity::Week => {
            date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
        }
    }
}

fn period_step(granularity: StreakGranularity) -> Duration {
    match granularity {
        StreakGranularity::Day => Duration::days(1),
        StreakGranularity::Week => Duration::weeks(1),
    }
}

/// Consecutive periods ending at the latest one that is not in the future.
/// A latest period older than the previous one breaks the streak.
fn streak_length(
    periods: &BTreeSet<NaiveDate>,
    current: NaiveDate,
    granularity: StreakGranularity,
) -> u32 {
    let step = period_step(granularity);
    let Some(&latest) = periods.range(..=current).next_back() else {
        return 0;
    };

    if current - latest > step {
        return 0;
    }

    let mut count = 0;
    let mut cursor = latest;
    while periods.contains(&cursor) {
        count += 1;
        cursor = cursor - step;
    }
    count
}
