use chrono::{Local, NaiveDate, Utc};

use crate::config::SalonConfig;
use crate::limits::*;
use crate::model::*;

use super::availability::available_slots;
use super::clock::{format_time_text, time_to_minutes};
use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    Utc::now().timestamp_millis()
}

/// The salon's local calendar date.
pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Requests are taken from tomorrow onward.
pub(crate) fn earliest_bookable(today: NaiveDate) -> NaiveDate {
    today.succ_opt().unwrap_or(today)
}

/// Trimmed, non-blank value of a required field.
fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::MissingField(field));
    }
    Ok(trimmed)
}

fn check_len(value: &str, max: usize, what: &'static str) -> Result<(), EngineError> {
    if value.len() > max {
        return Err(EngineError::LimitExceeded(what));
    }
    Ok(())
}

/// Blank optional text is treated as absent.
pub(crate) fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Check a form submission against the salon's rules. Returns the resolved
/// service and the requested start time.
pub(crate) fn validate_new_request(
    config: &SalonConfig,
    req: &NewRequest,
    today: NaiveDate,
) -> Result<(ServiceId, Minutes), EngineError> {
    let client_name = required(&req.client_name, "client_name")?;
    let phone = required(&req.phone, "phone")?;
    let service_id = required(&req.service, "service")?;
    let time = required(&req.time, "time")?;

    check_len(client_name, MAX_CLIENT_NAME_LEN, "client name too long")?;
    check_len(phone, MAX_PHONE_LEN, "phone number too long")?;
    if let Some(email) = optional(&req.email) {
        check_len(&email, MAX_EMAIL_LEN, "email too long")?;
    }
    if let Some(notes) = optional(&req.special_requests) {
        check_len(&notes, MAX_SPECIAL_REQUESTS_LEN, "special requests too long")?;
    }

    let earliest = earliest_bookable(today);
    if req.date < earliest {
        return Err(EngineError::DateNotBookable {
            date: req.date,
            earliest,
        });
    }

    let service = config
        .catalog
        .get(service_id)
        .ok_or_else(|| EngineError::UnknownService(service_id.to_string()))?;
    let start = time_to_minutes(time)?;

    let slots = available_slots(
        &config.schedule,
        &config.lunch_break,
        &config.catalog,
        req.date,
        service_id,
    )?;
    if slots.binary_search(&start).is_err() {
        return Err(EngineError::SlotUnavailable {
            date: req.date,
            time: format_time_text(time)?,
        });
    }

    Ok((service.id.clone(), start))
}
