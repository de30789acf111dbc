use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub enum EngineError {
    /// Schedule or catalog is malformed or missing an entry.
    Configuration(String),
    UnknownService(String),
    /// Malformed `"HH:MM"` text.
    Format(String),
    MissingField(&'static str),
    DateNotBookable {
        date: NaiveDate,
        earliest: NaiveDate,
    },
    SlotUnavailable {
        date: NaiveDate,
        time: String,
    },
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            EngineError::UnknownService(id) => write!(f, "unknown service: {id}"),
            EngineError::Format(msg) => write!(f, "invalid time: {msg}"),
            EngineError::MissingField(field) => write!(f, "missing required field: {field}"),
            EngineError::DateNotBookable { date, earliest } => {
                write!(f, "date {date} is not bookable; earliest is {earliest}")
            }
            EngineError::SlotUnavailable { date, time } => {
                write!(f, "{time} on {date} is not an available time")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "request log error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
