use anyhow::Context;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{AchievementRecord, LessonRecord, LessonStatus, PlatformCounts};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_student(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    email: &str,
    skill_level: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO slopesmaster.students (id, full_name, email, skill_level)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            skill_level = COALESCE(EXCLUDED.skill_level, slopesmaster.students.skill_level)
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(email)
    .bind(skill_level)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

async fn upsert_instructor(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    email: &str,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO slopesmaster.instructors (id, full_name, email)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(email)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

#[allow(clippy::too_many_arguments)]
async fn insert_lesson(
    pool: &PgPool,
    student_id: Uuid,
    instructor_id: Uuid,
    status: LessonStatus,
    rating: Option<i32>,
    cost_cents: i64,
    scheduled_at: DateTime<Utc>,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO slopesmaster.lessons
        (id, student_id, instructor_id, status, rating, cost_cents, scheduled_at, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(instructor_id)
    .bind(status.as_str())
    .bind(rating)
    .bind(cost_cents)
    .bind(scheduled_at)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn seed_time(month: u32, day: u32, hour: u32) -> anyhow::Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(2026, month, day, hour, 0, 0)
        .single()
        .context("invalid seed timestamp")
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let instructors = vec![
        (
            Uuid::parse_str("6b1e2f4a-8c3d-4e5f-9a0b-1c2d3e4f5a6b")?,
            "Marta Ruiz",
            "marta.ruiz@slopesmaster.com",
        ),
        (
            Uuid::parse_str("a7c8d9e0-1f2a-4b3c-8d4e-5f6a7b8c9d0e")?,
            "Tom Becker",
            "tom.becker@slopesmaster.com",
        ),
    ];

    for (id, name, email) in instructors {
        upsert_instructor(pool, id, name, email).await?;
    }

    let students = vec![
        (
            Uuid::parse_str("3f4e5d6c-7b8a-4901-9234-56789abcdef0")?,
            "Noah Fischer",
            "noah.fischer@example.com",
            "linking_turns",
        ),
        (
            Uuid::parse_str("9e8d7c6b-5a49-4382-a716-05f4e3d2c1b0")?,
            "Lena Sato",
            "lena.sato@example.com",
            "first_time",
        ),
    ];

    for (id, name, email, level) in students {
        upsert_student(pool, id, name, email, Some(level)).await?;
    }

    let lessons = vec![
        (
            "seed-001",
            "noah.fischer@example.com",
            "marta.ruiz@slopesmaster.com",
            LessonStatus::Completed,
            Some(5),
            12_000,
            seed_time(1, 18, 9)?,
        ),
        (
            "seed-002",
            "noah.fischer@example.com",
            "marta.ruiz@slopesmaster.com",
            LessonStatus::Completed,
            Some(4),
            12_000,
            seed_time(1, 25, 9)?,
        ),
        (
            "seed-003",
            "noah.fischer@example.com",
            "tom.becker@slopesmaster.com",
            LessonStatus::Completed,
            Some(4),
            9_500,
            seed_time(2, 1, 13)?,
        ),
        (
            "seed-004",
            "noah.fischer@example.com",
            "marta.ruiz@slopesmaster.com",
            LessonStatus::Scheduled,
            None,
            12_000,
            seed_time(2, 22, 9)?,
        ),
        (
            "seed-005",
            "lena.sato@example.com",
            "tom.becker@slopesmaster.com",
            LessonStatus::Completed,
            Some(3),
            9_500,
            seed_time(2, 3, 10)?,
        ),
        (
            "seed-006",
            "lena.sato@example.com",
            "tom.becker@slopesmaster.com",
            LessonStatus::Disputed,
            Some(1),
            9_500,
            seed_time(2, 7, 10)?,
        ),
        (
            "seed-007",
            "lena.sato@example.com",
            "marta.ruiz@slopesmaster.com",
            LessonStatus::Cancelled,
            None,
            12_000,
            seed_time(2, 8, 10)?,
        ),
    ];

    for (source_key, student_email, instructor_email, status, rating, cost_cents, scheduled_at) in
        lessons
    {
        let student_id = student_id_by_email(pool, student_email).await?;
        let instructor_id: Uuid =
            sqlx::query("SELECT id FROM slopesmaster.instructors WHERE email = $1")
                .bind(instructor_email)
                .fetch_one(pool)
                .await?
                .get("id");

        insert_lesson(
            pool,
            student_id,
            instructor_id,
            status,
            rating,
            cost_cents,
            scheduled_at,
            source_key,
        )
        .await?;
    }

    let achievements = vec![
        (
            "seed-ach-001",
            "noah.fischer@example.com",
            "First chairlift ride",
            50_i64,
            seed_time(1, 18, 12)?,
        ),
        (
            "seed-ach-002",
            "noah.fischer@example.com",
            "Linked ten turns",
            120_i64,
            seed_time(2, 1, 15)?,
        ),
        (
            "seed-ach-003",
            "lena.sato@example.com",
            "Stopped on the magic carpet",
            30_i64,
            seed_time(2, 3, 12)?,
        ),
    ];

    for (source_key, email, title, points, awarded_at) in achievements {
        let student_id = student_id_by_email(pool, email).await?;
        sqlx::query(
            r#"
            INSERT INTO slopesmaster.achievements
            (id, student_id, title, points, awarded_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(title)
        .bind(points)
        .bind(awarded_at)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn student_id_by_email(pool: &PgPool, email: &str) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query("SELECT id FROM slopesmaster.students WHERE email = $1")
        .bind(email)
        .fetch_one(pool)
        .await
        .with_context(|| format!("no student with email {email}"))?
        .get("id");

    Ok(id)
}

fn lesson_from_row(row: &PgRow) -> anyhow::Result<LessonRecord> {
    let raw_status: String = row.try_get("status")?;
    let status = LessonStatus::parse(&raw_status)
        .with_context(|| format!("unrecognised lesson status {raw_status:?}"))?;

    Ok(LessonRecord {
        lesson_id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        instructor_id: row.try_get("instructor_id")?,
        instructor_name: row.try_get("instructor_name")?,
        status,
        rating: row.try_get("rating")?,
        cost_cents: row.try_get("cost_cents")?,
        scheduled_at: row.try_get("scheduled_at")?,
    })
}

pub async fn fetch_lessons_for_student(
    pool: &PgPool,
    student_id: Uuid,
) -> anyhow::Result<Vec<LessonRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT l.id, l.student_id, l.instructor_id, i.full_name AS instructor_name,
               l.status, l.rating, l.cost_cents, l.scheduled_at
        FROM slopesmaster.lessons l
        JOIN slopesmaster.instructors i ON i.id = l.instructor_id
        WHERE l.student_id = $1
        ORDER BY l.scheduled_at
        "#,
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
    .context("failed to fetch lessons")?;

    rows.iter().map(lesson_from_row).collect()
}

pub async fn fetch_achievements_for_student(
    pool: &PgPool,
    student_id: Uuid,
) -> anyhow::Result<Vec<AchievementRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, student_id, title, points, awarded_at
        FROM slopesmaster.achievements
        WHERE student_id = $1
        ORDER BY awarded_at
        "#,
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
    .context("failed to fetch achievements")?;

    let mut achievements = Vec::new();
    for row in rows {
        achievements.push(AchievementRecord {
            achievement_id: row.get("id"),
            student_id: row.get("student_id"),
            title: row.get("title"),
            points: row.get("points"),
            awarded_at: row.get("awarded_at"),
        });
    }

    Ok(achievements)
}

/// Profile level of a student, `Ok(None)` when the profile has none.
/// A missing student is an error.
pub async fn fetch_student_level(
    pool: &PgPool,
    student_id: Uuid,
) -> anyhow::Result<Option<String>> {
    let row = sqlx::query("SELECT skill_level FROM slopesmaster.students WHERE id = $1")
        .bind(student_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch student profile")?
        .with_context(|| format!("no student with id {student_id}"))?;

    Ok(row.get("skill_level"))
}

/// Start of the trailing activity window, `None` when it falls outside the
/// representable date range.
pub fn active_since(now: DateTime<Utc>, window_days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(window_days.max(1)).and_then(|window| now.checked_sub_signed(window))
}

async fn count(pool: &PgPool, sql: &str, label: &str) -> anyhow::Result<i64> {
    let value: i64 = sqlx::query(sql)
        .fetch_one(pool)
        .await
        .with_context(|| format!("failed to count {label}"))?
        .get("count");

    Ok(value)
}

pub async fn fetch_platform_counts(
    pool: &PgPool,
    now: DateTime<Utc>,
    active_window_days: i64,
) -> anyhow::Result<PlatformCounts> {
    let user_count = count(
        pool,
        "SELECT (SELECT COUNT(*) FROM slopesmaster.students) \
         + (SELECT COUNT(*) FROM slopesmaster.instructors) AS count",
        "users",
    )
    .await?;
    let lesson_count = count(
        pool,
        "SELECT COUNT(*) AS count FROM slopesmaster.lessons",
        "lessons",
    )
    .await?;
    let disputed_lesson_count = count(
        pool,
        "SELECT COUNT(*) AS count FROM slopesmaster.lessons WHERE status = 'disputed'",
        "disputed lessons",
    )
    .await?;

    let since = active_since(now, active_window_days).with_context(|| {
        format!("active window of {active_window_days} days reaches past the supported range")
    })?;
    let active_instructor_count: i64 = sqlx::query(
        r#"
        SELECT COUNT(DISTINCT instructor_id) AS count
        FROM slopesmaster.lessons
        WHERE status <> 'cancelled'
          AND scheduled_at >= $1
          AND scheduled_at <= $2
        "#,
    )
    .bind(since)
    .bind(now)
    .fetch_one(pool)
    .await
    .context("failed to count active instructors")?
    .get("count");

    Ok(PlatformCounts {
        user_count,
        lesson_count,
        active_instructor_count,
        disputed_lesson_count,
    })
}

pub async fn import_lessons_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_name: String,
        student_email: String,
        skill_level: Option<String>,
        instructor_name: String,
        instructor_email: String,
        status: String,
        rating: Option<i32>,
        cost_cents: i64,
        scheduled_at: DateTime<Utc>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("malformed CSV record {}", index + 1))?;
        let status = LessonStatus::parse(&row.status)
            .with_context(|| format!("record {}: unknown status {:?}", index + 1, row.status))?;
        if let Some(rating) = row.rating {
            anyhow::ensure!(
                (1..=5).contains(&rating),
                "record {}: rating {rating} is outside 1..=5",
                index + 1
            );
        }

        let student_id = upsert_student(
            pool,
            Uuid::new_v4(),
            &row.student_name,
            &row.student_email,
            row.skill_level.as_deref().filter(|level| !level.is_empty()),
        )
        .await?;
        let instructor_id =
            upsert_instructor(pool, Uuid::new_v4(), &row.instructor_name, &row.instructor_email)
                .await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_lesson(
            pool,
            student_id,
            instructor_id,
            status,
            row.rating,
            row.cost_cents,
            row.scheduled_at,
            &source_key,
        )
        .await?
        {
            inserted += 1;
        }
    }

    Ok(inserted)
}
