use crate::model::Minutes;

pub const MINUTES_PER_DAY: Minutes = 1440;

pub const MAX_CLIENT_NAME_LEN: usize = 128;
pub const MAX_PHONE_LEN: usize = 32;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_SPECIAL_REQUESTS_LEN: usize = 2000;

/// Requests kept in memory (and replayed from the log).
pub const MAX_REQUESTS: usize = 100_000;

pub const MAX_SERVICES: usize = 256;
pub const MAX_SERVICE_ID_LEN: usize = 64;
