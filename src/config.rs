use std::{env, fmt::Display, str::FromStr};

use anyhow::{anyhow, Context};
use chrono::{DateTime, FixedOffset, Utc};
use tracing::info;

use crate::db::active_since;
use crate::models::StreakGranularity;
use crate::progression::LevelPolicy;
use crate::stats::Evaluation;

#[derive(Debug, Clone)]
pub struct Config {
    database_url: Option<String>,
    pub level_policy: LevelPolicy,
    pub streak_granularity: StreakGranularity,
    pub utc_offset: FixedOffset,
    pub active_window_days: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").ok();
        let level_policy = parse_setting("SLOPES_LEVEL_POLICY", "fallback", |raw| {
            LevelPolicy::parse(raw).ok_or_else(|| anyhow!("expected fallback or strict"))
        })?;
        let streak_granularity = parse_setting("SLOPES_STREAK_GRANULARITY", "day", |raw| {
            parse_granularity(raw).ok_or_else(|| anyhow!("expected day or week"))
        })?;
        let offset_minutes: i32 = try_load("SLOPES_UTC_OFFSET_MINUTES", "0")?;
        let utc_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .with_context(|| format!("UTC offset of {offset_minutes} minutes is out of range"))?;
        let active_window_days =
            active_window_days(try_load("SLOPES_ACTIVE_WINDOW_DAYS", "30")?, Utc::now())?;

        Ok(Self {
            database_url,
            level_policy,
            streak_granularity,
            utc_offset,
            active_window_days,
        })
    }

    pub fn evaluation(&self, now: DateTime<Utc>) -> Evaluation {
        Evaluation {
            offset: self.utc_offset,
            granularity: self.streak_granularity,
            level_policy: self.level_policy,
            ..Evaluation::at(now)
        }
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}

pub fn parse_granularity(raw: &str) -> Option<StreakGranularity> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "day" | "daily" => Some(StreakGranularity::Day),
        "week" | "weekly" => Some(StreakGranularity::Week),
        _ => None,
    }
}

fn active_window_days(days: i64, now: DateTime<Utc>) -> anyhow::Result<i64> {
    let days = days.max(1);
    active_since(now, days).with_context(|| {
        format!("invalid SLOPES_ACTIVE_WINDOW_DAYS value {days}: window is out of range")
    })?;
    Ok(days)
}

fn var_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = var_or_default(key, default);
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("invalid {key} value {raw:?}: {e}"))
}

fn parse_setting<T>(
    key: &str,
    default: &str,
    parse: impl Fn(&str) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    let raw = var_or_default(key, default);
    parse(&raw).with_context(|| format!("invalid {key} value {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn granularity_accepts_both_spellings() {
        assert_eq!(parse_granularity("Week"), Some(StreakGranularity::Week));
        assert_eq!(parse_granularity("daily"), Some(StreakGranularity::Day));
        assert_eq!(parse_granularity("fortnight"), None);
    }

    #[test]
    fn parse_setting_reports_the_key() {
        let err = parse_setting("SLOPES_TEST_UNSET_POLICY_KEY", "sometimes", |raw| {
            LevelPolicy::parse(raw).ok_or_else(|| anyhow!("expected fallback or strict"))
        })
        .unwrap_err();
        assert!(err.to_string().contains("SLOPES_TEST_UNSET_POLICY_KEY"));
    }

    #[test]
    fn active_window_is_floored_and_bounded() {
        let now = Utc::now();
        assert_eq!(active_window_days(30, now).unwrap(), 30);
        assert_eq!(active_window_days(-5, now).unwrap(), 1);

        let err = active_window_days(10_000_000_000, now).unwrap_err();
        assert!(err.to_string().contains("SLOPES_ACTIVE_WINDOW_DAYS"));
    }

    #[test]
    fn try_load_uses_default_when_unset() {
        let days: i64 = try_load("SLOPES_TEST_UNSET_WINDOW_KEY", "30").unwrap();
        assert_eq!(days, 30);
    }
}
