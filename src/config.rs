//! Salon configuration: weekly hours, lunch break and service catalog.
//!
//! The defaults are the studio's published tables. A JSON file with the same
//! shape can replace them:
//!
//! ```json
//! {
//!   "name": "Kirra's Nail Studio",
//!   "working_hours": {
//!     "monday": { "start": "09:00", "end": "18:00", "closed": false },
//!     "sunday": { "start": "12:00", "end": "16:00", "closed": true }
//!   },
//!   "lunch_break": { "start": "12:30", "end": "13:30" },
//!   "services": [
//!     { "id": "manicure", "name": "Classic Manicure", "duration": 30,
//!       "price_cents": 2500, "description": "..." }
//!   ]
//! }
//! ```
//!
//! (All seven weekdays must be present.)

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::Weekday;
use serde::Deserialize;

use crate::engine::{time_to_minutes, EngineError};
use crate::limits::*;
use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalonConfig {
    pub name: String,
    pub schedule: WeeklySchedule,
    pub lunch_break: Span,
    pub catalog: ServiceCatalog,
}

const fn hm(hour: Minutes, minute: Minutes) -> Minutes {
    hour * 60 + minute
}

impl Default for SalonConfig {
    fn default() -> Self {
        let weekday = DayWindow::open_between(hm(9, 0), hm(18, 0));
        let schedule = WeeklySchedule::new()
            .with_day(Weekday::Mon, weekday)
            .with_day(Weekday::Tue, weekday)
            .with_day(Weekday::Wed, weekday)
            .with_day(Weekday::Thu, weekday)
            .with_day(Weekday::Fri, DayWindow::open_between(hm(9, 0), hm(19, 0)))
            .with_day(Weekday::Sat, DayWindow::open_between(hm(10, 0), hm(17, 0)))
            .with_day(
                Weekday::Sun,
                DayWindow {
                    open: hm(12, 0),
                    close: hm(16, 0),
                    closed: true,
                },
            );

        let catalog = ServiceCatalog::new()
            .with(Service::new(
                "manicure",
                "Classic Manicure",
                30,
                2500,
                "Professional nail care with cuticle work and polish application",
            ))
            .with(Service::new(
                "pedicure",
                "Pedicure",
                45,
                3500,
                "Relaxing foot spa treatment with nail care and polish",
            ))
            .with(Service::new(
                "gel",
                "Gel Nails",
                60,
                4500,
                "Long-lasting gel polish application for durability and shine",
            ))
            .with(Service::new(
                "acrylic",
                "Acrylic Set",
                75,
                5500,
                "Beautiful acrylic nail extensions with shape and design options",
            ))
            .with(Service::new(
                "nail-art",
                "Custom Nail Art",
                90,
                6500,
                "Unique artistic designs tailored to your personal style",
            ))
            .with(Service::new(
                "mushroom-design",
                "Mushroom Special",
                90,
                7000,
                "Our signature mushroom-themed nail art collection - exclusive design",
            ));

        Self {
            name: "Kirra's Nail Studio".to_string(),
            schedule,
            lunch_break: Span::new(hm(12, 30), hm(13, 30)),
            catalog,
        }
    }
}

// ── File format ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    name: Option<String>,
    working_hours: HashMap<String, RawDay>,
    lunch_break: RawSpan,
    services: Vec<RawService>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDay {
    start: String,
    end: String,
    #[serde(default)]
    closed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSpan {
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawService {
    id: String,
    name: String,
    duration: Minutes,
    price_cents: u64,
    #[serde(default)]
    description: String,
}

impl SalonConfig {
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, EngineError> {
        let raw: RawConfig = serde_json::from_str(text)
            .map_err(|e| EngineError::Configuration(format!("invalid salon config: {e}")))?;

        let mut schedule = WeeklySchedule::new();
        for (day_name, day) in &raw.working_hours {
            let weekday = parse_weekday(day_name).ok_or_else(|| {
                EngineError::Configuration(format!("unknown weekday: {day_name:?}"))
            })?;
            if schedule.get(weekday).is_some() {
                return Err(EngineError::Configuration(format!(
                    "{} listed more than once",
                    weekday_name(weekday)
                )));
            }
            schedule.set(
                weekday,
                DayWindow {
                    open: time_to_minutes(&day.start)?,
                    close: time_to_minutes(&day.end)?,
                    closed: day.closed,
                },
            );
        }

        let lunch_start = time_to_minutes(&raw.lunch_break.start)?;
        let lunch_end = time_to_minutes(&raw.lunch_break.end)?;
        if lunch_start >= lunch_end {
            return Err(EngineError::Configuration(
                "lunch break must end after it starts".into(),
            ));
        }

        let mut catalog = ServiceCatalog::new();
        for s in &raw.services {
            catalog.insert(Service::new(
                s.id.trim(),
                &s.name,
                s.duration,
                s.price_cents,
                &s.description,
            ));
        }
        // Duplicate ids collapse on insert; catch them before that hides them.
        let mut seen = HashSet::new();
        for s in &raw.services {
            if !seen.insert(s.id.trim()) {
                return Err(EngineError::Configuration(format!(
                    "duplicate service id: {}",
                    s.id
                )));
            }
        }

        let config = Self {
            name: raw.name.unwrap_or_else(|| Self::default().name),
            schedule,
            lunch_break: Span::new(lunch_start, lunch_end),
            catalog,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the availability engine relies on.
    pub fn validate(&self) -> Result<(), EngineError> {
        for day in WEEKDAYS {
            let window = self.schedule.get(day).ok_or_else(|| {
                EngineError::Configuration(format!("no hours for {}", weekday_name(day)))
            })?;
            if !window.closed && window.open >= window.close {
                return Err(EngineError::Configuration(format!(
                    "{}: opening time must be before closing time",
                    weekday_name(day)
                )));
            }
            if window.close > MINUTES_PER_DAY {
                return Err(EngineError::Configuration(format!(
                    "{}: closing time past midnight",
                    weekday_name(day)
                )));
            }
        }

        if self.lunch_break.start >= self.lunch_break.end {
            return Err(EngineError::Configuration(
                "lunch break must end after it starts".into(),
            ));
        }

        if self.catalog.is_empty() {
            return Err(EngineError::Configuration("service catalog is empty".into()));
        }
        if self.catalog.len() > MAX_SERVICES {
            return Err(EngineError::LimitExceeded("too many services"));
        }
        for service in self.catalog.iter() {
            let id = service.id.as_str();
            if id.is_empty() || id.len() > MAX_SERVICE_ID_LEN {
                return Err(EngineError::Configuration(format!("bad service id: {id:?}")));
            }
            if service.duration_minutes == 0 || service.duration_minutes >= MINUTES_PER_DAY {
                return Err(EngineError::Configuration(format!(
                    "{id}: duration must be between 1 and 1439 minutes"
                )));
            }
        }
        Ok(())
    }
}
