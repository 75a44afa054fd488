use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;
const ID_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LENGTH: usize = 9;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^A-Za-z0-9_\s-]").expect("valid regex");
    static ref SEPARATORS: Regex = Regex::new(r"[\s_-]+").expect("valid regex");
}

/// Converts a string into a URL-friendly slug.
///
/// ```
/// use synapse::utils::slugify;
///
/// assert_eq!(slugify("Hello World"), "hello-world");
/// assert_eq!(slugify("  TCP vs. UDP!  "), "tcp-vs-udp");
/// ```
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = NON_WORD.replace_all(lowered.trim(), "");
    let dashed = SEPARATORS.replace_all(&stripped, "-");

    dashed.trim_matches('-').to_string()
}

/// Random 9-character base-36 identifier for user-created content.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();

    (0..ID_LENGTH)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect()
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Calendar day (UTC) of a millisecond timestamp.
pub fn day_of(timestamp: i64) -> NaiveDate {
    DateTime::from_timestamp_millis(timestamp)
        .unwrap_or_default()
        .date_naive()
}

/// Renders a timestamp relative to `now`, e.g. "Yesterday" or "3 days ago".
///
/// Anything a week or older is printed as a date like "Jan 1, 2026".
pub fn format_time(timestamp: i64, now: i64) -> String {
    let days = (now - timestamp).max(0) / MILLIS_PER_DAY;

    match days {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        2..=6 => format!("{days} days ago"),
        _ => DateTime::from_timestamp_millis(timestamp)
            .unwrap_or_default()
            .format("%b %-d, %Y")
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JAN_1_2026: i64 = 1_767_225_600_000;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Docker Multi-Stage Builds"), "docker-multi-stage-builds");
        assert_eq!(slugify("JavaScript Promises vs Async/Await"), "javascript-promises-vs-asyncawait");
        assert_eq!(slugify("snake_case -- and  spaces"), "snake-case-and-spaces");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn generated_ids_are_base36() {
        let id = generate_id();
        assert_eq!(id.len(), 9);
        assert!(id.bytes().all(|b| ID_CHARSET.contains(&b)));
    }

    #[test]
    fn format_time_buckets() {
        assert_eq!(format_time(JAN_1_2026, JAN_1_2026 + 1000), "Today");
        assert_eq!(format_time(JAN_1_2026, JAN_1_2026 + MILLIS_PER_DAY), "Yesterday");
        assert_eq!(format_time(JAN_1_2026, JAN_1_2026 + 3 * MILLIS_PER_DAY), "3 days ago");
        assert_eq!(format_time(JAN_1_2026, JAN_1_2026 + 30 * MILLIS_PER_DAY), "Jan 1, 2026");
        assert_eq!(format_time(JAN_1_2026 + 5000, JAN_1_2026), "Today");
    }

    #[test]
    fn day_of_uses_utc_calendar() {
        assert_eq!(day_of(JAN_1_2026), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(
            day_of(JAN_1_2026 - 1),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        );
    }
}
