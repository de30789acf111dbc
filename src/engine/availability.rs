use chrono::{Datelike, NaiveDate};

use crate::limits::MINUTES_PER_DAY;
use crate::model::*;

use super::EngineError;

/// Distance between candidate start times. Fixed regardless of service length
/// so start times stay on the :00/:30 grid.
pub const SLOT_STRIDE: Minutes = 30;

// ── Availability Algorithm ────────────────────────────────────────

/// Look up the opening hours for the weekday `date` falls on.
pub fn resolve_day_window(
    schedule: &WeeklySchedule,
    date: NaiveDate,
) -> Result<DayWindow, EngineError> {
    let day = date.weekday();
    schedule.get(day).copied().ok_or_else(|| {
        EngineError::Configuration(format!("no hours configured for {}", weekday_name(day)))
    })
}

/// Bookable start times for one day and one service, ascending.
///
/// The service id is checked before anything else, so an unknown id fails even
/// on a closed day.
pub fn available_slots(
    schedule: &WeeklySchedule,
    lunch: &Span,
    catalog: &ServiceCatalog,
    date: NaiveDate,
    service_id: &str,
) -> Result<Vec<Minutes>, EngineError> {
    let service = catalog
        .get(service_id)
        .ok_or_else(|| EngineError::UnknownService(service_id.to_string()))?;
    let window = resolve_day_window(schedule, date)?;
    Ok(generate_slots(&window, lunch, service.duration_minutes))
}

/// Walk the day on a fixed stride, keeping every start whose occupied span
/// `[start, start + duration)` ends by closing time and misses lunch.
pub fn generate_slots(window: &DayWindow, lunch: &Span, duration: Minutes) -> Vec<Minutes> {
    let mut slots = Vec::new();
    if window.closed || duration == 0 {
        return slots;
    }

    let close = window.close.min(MINUTES_PER_DAY);
    let mut cursor = window.open;
    // `<=`: a service that exactly fills the rest of the day still fits.
    while duration <= close.saturating_sub(cursor) {
        let occupied = Span::new(cursor, cursor + duration);
        if !occupied.overlaps(lunch) {
            slots.push(cursor);
        }
        cursor += SLOT_STRIDE;
    }
    slots
}
