use std::collections::HashMap;
use std::fmt;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Minutes since midnight, `[0, 1440)`. All schedule arithmetic uses this unit.
pub type Minutes = u32;

/// Unix milliseconds. Only used for request timestamps.
pub type Ms = i64;

/// Half-open time-of-day interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Minutes,
    pub end: Minutes,
}

impl Span {
    pub fn new(start: Minutes, end: Minutes) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

// ── Weekly schedule ──────────────────────────────────────────────

/// Monday-first iteration order for display and config validation.
pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Parse one of the seven full English weekday names, ignoring case.
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    match name.trim().to_ascii_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Opening hours for one weekday. `open`/`close` are ignored when `closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWindow {
    pub open: Minutes,
    pub close: Minutes,
    pub closed: bool,
}

impl DayWindow {
    pub fn open_between(open: Minutes, close: Minutes) -> Self {
        Self {
            open,
            close,
            closed: false,
        }
    }

    pub fn closed() -> Self {
        Self {
            open: 0,
            close: 0,
            closed: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeeklySchedule {
    days: HashMap<Weekday, DayWindow>,
}

impl WeeklySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_day(mut self, day: Weekday, window: DayWindow) -> Self {
        self.set(day, window);
        self
    }

    pub fn set(&mut self, day: Weekday, window: DayWindow) {
        self.days.insert(day, window);
    }

    pub fn get(&self, day: Weekday) -> Option<&DayWindow> {
        self.days.get(&day)
    }

    /// Configured days in Monday-first order.
    pub fn iter(&self) -> impl Iterator<Item = (Weekday, &DayWindow)> {
        WEEKDAYS
            .iter()
            .filter_map(|day| self.days.get(day).map(|w| (*day, w)))
    }
}

// ── Service catalog ──────────────────────────────────────────────

/// Catalog key. Values come from a loaded catalog or from replayed requests
/// that were validated against one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    pub(crate) fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub duration_minutes: Minutes,
    pub price_cents: u64,
    pub description: String,
}

impl Service {
    pub fn new(
        id: &str,
        name: &str,
        duration_minutes: Minutes,
        price_cents: u64,
        description: &str,
    ) -> Self {
        Self {
            id: ServiceId::new(id),
            name: name.to_string(),
            duration_minutes,
            price_cents,
            description: description.to_string(),
        }
    }
}

/// Services in display order, looked up by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceCatalog {
    services: Vec<Service>,
}

impl ServiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service, replacing any existing entry with the same id.
    pub fn insert(&mut self, service: Service) {
        if let Some(existing) = self.services.iter_mut().find(|s| s.id == service.id) {
            *existing = service;
        } else {
            self.services.push(service);
        }
    }

    pub fn with(mut self, service: Service) -> Self {
        self.insert(service);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id.as_str() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Service> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

// ── Appointment requests ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Waiting for the owner to confirm.
    Pending,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
        }
    }
}

/// Raw form input, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequest {
    pub client_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub service: String,
    pub date: NaiveDate,
    /// `"HH:MM"`, must be one of the day's available slots.
    pub time: String,
    pub special_requests: Option<String>,
}

/// An accepted appointment request, as stored in the request log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentRequest {
    pub id: Ulid,
    pub client_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub service: ServiceId,
    pub date: NaiveDate,
    pub start: Minutes,
    pub special_requests: Option<String>,
    pub status: RequestStatus,
    pub created_at: Ms,
}

/// Request log record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RequestSubmitted { request: AppointmentRequest },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_overlap() {
        let lunch = Span::new(750, 810);
        assert!(lunch.overlaps(&Span::new(720, 780)));
        assert!(!lunch.overlaps(&Span::new(720, 750))); // ends as lunch starts
        assert!(!lunch.overlaps(&Span::new(810, 840))); // starts as lunch ends
    }

    #[test]
    fn weekday_names_case_insensitive() {
        assert_eq!(parse_weekday("Monday"), Some(Weekday::Mon));
        assert_eq!(parse_weekday("SUNDAY"), Some(Weekday::Sun));
        assert_eq!(parse_weekday(" friday "), Some(Weekday::Fri));
        assert_eq!(parse_weekday("mon"), None);
        assert_eq!(parse_weekday("funday"), None);
        for day in WEEKDAYS {
            assert_eq!(parse_weekday(weekday_name(day)), Some(day));
        }
    }

    #[test]
    fn schedule_iterates_monday_first() {
        let schedule = WeeklySchedule::new()
            .with_day(Weekday::Sun, DayWindow::closed())
            .with_day(Weekday::Mon, DayWindow::open_between(540, 1080));
        let days: Vec<_> = schedule.iter().map(|(d, _)| d).collect();
        assert_eq!(days, vec![Weekday::Mon, Weekday::Sun]);
    }

    #[test]
    fn catalog_lookup_and_replace() {
        let mut catalog = ServiceCatalog::new()
            .with(Service::new("manicure", "Classic Manicure", 30, 2500, ""))
            .with(Service::new("gel", "Gel Nails", 60, 4500, ""));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("gel").map(|s| s.duration_minutes), Some(60));
        assert!(catalog.get("Gel").is_none());

        catalog.insert(Service::new("gel", "Gel Nails", 75, 4500, ""));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("gel").map(|s| s.duration_minutes), Some(75));
        // Display order is insertion order.
        let ids: Vec<_> = catalog.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["manicure", "gel"]);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::RequestSubmitted {
            request: AppointmentRequest {
                id: Ulid::new(),
                client_name: "Ada".into(),
                phone: "5551234567".into(),
                email: None,
                service: ServiceId::new("manicure"),
                date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
                start: 540,
                special_requests: Some("French tips".into()),
                status: RequestStatus::Pending,
                created_at: 1_700_000_000_000,
            },
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
