use crate::limits::MINUTES_PER_DAY;
use crate::model::Minutes;

use super::EngineError;

/// Parse a 24-hour `"HH:MM"` string. One or two hour digits are accepted,
/// minutes must be two digits.
pub fn time_to_minutes(text: &str) -> Result<Minutes, EngineError> {
    let bad = || EngineError::Format(format!("expected HH:MM, got {text:?}"));

    let (hours, minutes) = text.split_once(':').ok_or_else(bad)?;
    if hours.is_empty()
        || hours.len() > 2
        || minutes.len() != 2
        || !hours.bytes().all(|b| b.is_ascii_digit())
        || !minutes.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(bad());
    }
    let hours: Minutes = hours.parse().map_err(|_| bad())?;
    let minutes: Minutes = minutes.parse().map_err(|_| bad())?;
    if hours > 23 || minutes > 59 {
        return Err(EngineError::Format(format!("{text:?} is out of range")));
    }
    Ok(hours * 60 + minutes)
}

/// Zero-padded `"HH:MM"`.
pub fn minutes_to_time(minutes: Minutes) -> String {
    let minutes = minutes % MINUTES_PER_DAY;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// 12-hour display form, e.g. `"9:00 AM"`, `"12:30 PM"`.
pub fn format_time(minutes: Minutes) -> String {
    let minutes = minutes % MINUTES_PER_DAY;
    let hour = minutes / 60;
    let suffix = if hour >= 12 { "PM" } else { "AM" };
    let display_hour = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{display_hour}:{:02} {suffix}", minutes % 60)
}

/// `format_time` for `"HH:MM"` input.
pub fn format_time_text(text: &str) -> Result<String, EngineError> {
    time_to_minutes(text).map(format_time)
}
