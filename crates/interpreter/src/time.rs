//! Natural-language time phrase resolution.
//!
//! Turns phrases like "tomorrow 9am" or "in 5 minutes" into a concrete
//! [`TimeSpec`]. Times that already passed today roll forward one day unless
//! the phrase named a day explicitly.

use chrono::{DateTime, Duration, Local, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use webpilot_core_types::TimeSpec;

static RELATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bin\s+(\d+)\s*(seconds?|secs?|minutes?|mins?|hours?|hrs?)\b")
        .expect("relative time regex")
});

static HMS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2}):(\d{2}):(\d{2})\b").expect("hh:mm:ss regex"));

static HM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})\b").expect("hh:mm regex"));

static AMPM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").expect("am/pm regex")
});

static OCLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})\s*o'?clock\b").expect("o'clock regex"));

static HALF_PAST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bhalf\s+past\s+(\d{1,2})\b").expect("half past regex"));

static AT_HOUR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bat\s+(\d{1,2})\b").expect("at-hour regex"));

static NOW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bnow\b").expect("now regex"));

/// Resolves scheduling phrases against a clock.
pub struct TimeResolver;

impl TimeResolver {
    /// Resolve `text` against the current local time.
    pub fn resolve(text: &str) -> TimeSpec {
        Self::resolve_at(text, Local::now())
    }

    /// Resolve `text` against an explicit `now`. Returns an immediate spec
    /// when no time phrase is present.
    pub fn resolve_at(text: &str, now: DateTime<Local>) -> TimeSpec {
        let lower = text.to_lowercase();

        if lower.contains("immediately")
            || lower.contains("right away")
            || lower.contains("right now")
            || lower.contains("立即")
            || lower.contains("马上")
            || NOW_RE.is_match(&lower)
        {
            return TimeSpec::immediate(text);
        }

        if let Some(caps) = RELATIVE_RE.captures(&lower) {
            let amount: i64 = caps[1].parse().unwrap_or(0);
            let unit = caps[2].to_lowercase();
            let delta = if unit.starts_with("sec") {
                Duration::seconds(amount)
            } else if unit.starts_with("min") {
                Duration::minutes(amount)
            } else {
                Duration::hours(amount)
            };
            let at = now + delta;
            debug!(phrase = %text, at = %at, "resolved relative time");
            return TimeSpec::scheduled(at, text);
        }

        let day_offset = Self::day_offset(&lower);
        let parsed = Self::clock_time(&lower);

        match (day_offset, parsed) {
            (None, None) => TimeSpec::immediate(text),
            (offset, time) => {
                let offset_explicit = offset.is_some();
                let offset = offset.unwrap_or(0);
                // A bare day name means the start of that working day.
                let time = time.unwrap_or_else(|| {
                    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default()
                });
                let date = now.date_naive() + Duration::days(offset);
                let mut candidate = match date.and_time(time).and_local_timezone(Local) {
                    chrono::LocalResult::Single(dt) => dt,
                    chrono::LocalResult::Ambiguous(dt, _) => dt,
                    chrono::LocalResult::None => return TimeSpec::immediate(text),
                };
                if candidate <= now && !offset_explicit {
                    candidate += Duration::days(1);
                }
                debug!(phrase = %text, at = %candidate, "resolved scheduled time");
                TimeSpec::scheduled(candidate, text)
            }
        }
    }

    fn day_offset(lower: &str) -> Option<i64> {
        if lower.contains("day after tomorrow") || lower.contains("后天") {
            Some(2)
        } else if lower.contains("tomorrow") || lower.contains("明天") {
            Some(1)
        } else if lower.contains("today") || lower.contains("tonight") || lower.contains("今天")
        {
            Some(0)
        } else {
            None
        }
    }

    /// Extract a clock time from the phrase, most specific pattern first.
    fn clock_time(lower: &str) -> Option<NaiveTime> {
        let period_pm = lower.contains("afternoon")
            || lower.contains("evening")
            || lower.contains("下午")
            || lower.contains("晚上");

        if let Some(caps) = HMS_RE.captures(lower) {
            let (h, m, s) = (
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
                caps[3].parse().ok()?,
            );
            return NaiveTime::from_hms_opt(h, m, s);
        }
        if let Some(caps) = AMPM_RE.captures(lower) {
            let mut h: u32 = caps[1].parse().ok()?;
            let m: u32 = caps
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            let pm = caps[3].eq_ignore_ascii_case("pm");
            if pm && h < 12 {
                h += 12;
            } else if !pm && h == 12 {
                h = 0;
            }
            return NaiveTime::from_hms_opt(h, m, 0);
        }
        if let Some(caps) = HM_RE.captures(lower) {
            let mut h: u32 = caps[1].parse().ok()?;
            let m: u32 = caps[2].parse().ok()?;
            if period_pm && h < 12 {
                h += 12;
            }
            return NaiveTime::from_hms_opt(h, m, 0);
        }
        if let Some(caps) = HALF_PAST_RE.captures(lower) {
            let mut h: u32 = caps[1].parse().ok()?;
            if period_pm && h < 12 {
                h += 12;
            }
            return NaiveTime::from_hms_opt(h, 30, 0);
        }
        if let Some(caps) = OCLOCK_RE.captures(lower) {
            let mut h: u32 = caps[1].parse().ok()?;
            if period_pm && h < 12 {
                h += 12;
            }
            return NaiveTime::from_hms_opt(h, 0, 0);
        }
        if let Some(caps) = AT_HOUR_RE.captures(lower) {
            let mut h: u32 = caps[1].parse().ok()?;
            if h > 23 {
                return None;
            }
            if period_pm && h < 12 {
                h += 12;
            }
            return NaiveTime::from_hms_opt(h, 0, 0);
        }

        // Bare period words carry their own defaults.
        if lower.contains("midnight") || lower.contains("午夜") {
            return NaiveTime::from_hms_opt(0, 0, 0);
        }
        if lower.contains("noon") || lower.contains("中午") {
            return NaiveTime::from_hms_opt(12, 0, 0);
        }
        if lower.contains("morning") || lower.contains("早上") || lower.contains("上午") {
            return NaiveTime::from_hms_opt(9, 0, 0);
        }
        if lower.contains("afternoon") || lower.contains("下午") {
            return NaiveTime::from_hms_opt(14, 0, 0);
        }
        if lower.contains("evening") || lower.contains("tonight") || lower.contains("晚上") {
            return NaiveTime::from_hms_opt(19, 0, 0);
        }
        None
    }
}
