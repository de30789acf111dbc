use chrono::{NaiveDate, Weekday};
use ulid::Ulid;

use crate::model::*;

use super::availability::{available_slots, resolve_day_window};
use super::{Engine, EngineError};

impl Engine {
    pub fn day_window(&self, date: NaiveDate) -> Result<DayWindow, EngineError> {
        resolve_day_window(&self.config().schedule, date)
    }

    /// Bookable start times for `service` on `date`, ascending. Empty when the
    /// salon is closed that day or nothing fits.
    pub fn available_slots(
        &self,
        date: NaiveDate,
        service: &str,
    ) -> Result<Vec<Minutes>, EngineError> {
        let config = self.config();
        let result = available_slots(
            &config.schedule,
            &config.lunch_break,
            &config.catalog,
            date,
            service,
        );
        let outcome = match &result {
            Ok(slots) if slots.is_empty() => "none",
            Ok(_) => "some",
            Err(_) => "error",
        };
        metrics::counter!(crate::observability::SLOT_QUERIES_TOTAL, "outcome" => outcome)
            .increment(1);
        result
    }

    /// Services in display order.
    pub fn services(&self) -> Vec<Service> {
        self.config().catalog.iter().cloned().collect()
    }

    pub fn service(&self, id: &str) -> Result<&Service, EngineError> {
        self.config()
            .catalog
            .get(id)
            .ok_or_else(|| EngineError::UnknownService(id.to_string()))
    }

    /// Opening hours, Monday first.
    pub fn weekly_hours(&self) -> Vec<(Weekday, DayWindow)> {
        self.config()
            .schedule
            .iter()
            .map(|(day, window)| (day, *window))
            .collect()
    }

    /// Stored requests ordered by id (creation time), optionally for one date.
    pub fn list_requests(&self, date: Option<NaiveDate>) -> Vec<AppointmentRequest> {
        let mut requests: Vec<AppointmentRequest> = self
            .requests
            .iter()
            .filter(|r| date.is_none_or(|d| r.date == d))
            .map(|r| r.value().clone())
            .collect();
        requests.sort_by_key(|r| r.id);
        requests
    }

    pub fn get_request(&self, id: &Ulid) -> Option<AppointmentRequest> {
        self.requests.get(id).map(|r| r.value().clone())
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }
}
