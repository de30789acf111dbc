use chrono::NaiveDate;
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::clock::minutes_to_time;
use super::validate::{now_ms, optional, today, validate_new_request};
use super::{Engine, EngineError};

impl Engine {
    /// Validate, record and publish a new appointment request.
    pub async fn submit_request(&self, req: NewRequest) -> Result<AppointmentRequest, EngineError> {
        self.submit_request_on(req, today()).await
    }

    /// `submit_request` with an explicit "today", which decides the earliest
    /// bookable date.
    pub async fn submit_request_on(
        &self,
        req: NewRequest,
        today: NaiveDate,
    ) -> Result<AppointmentRequest, EngineError> {
        let result = self.accept(req, today).await;
        match &result {
            Ok(request) => {
                metrics::counter!(crate::observability::REQUESTS_SUBMITTED_TOTAL).increment(1);
                info!(
                    "request {} accepted: {} on {} at {}",
                    request.id,
                    request.service,
                    request.date,
                    minutes_to_time(request.start)
                );
            }
            Err(e) => {
                metrics::counter!(
                    crate::observability::REQUESTS_REJECTED_TOTAL,
                    "reason" => rejection_label(e)
                )
                .increment(1);
                tracing::debug!("request rejected: {e}");
            }
        }
        result
    }

    async fn accept(
        &self,
        req: NewRequest,
        today: NaiveDate,
    ) -> Result<AppointmentRequest, EngineError> {
        if self.request_count() >= MAX_REQUESTS {
            return Err(EngineError::LimitExceeded("too many requests"));
        }
        let (service, start) = validate_new_request(self.config(), &req, today)?;

        let request = AppointmentRequest {
            id: Ulid::new(),
            client_name: req.client_name.trim().to_string(),
            phone: req.phone.trim().to_string(),
            email: optional(&req.email),
            service,
            date: req.date,
            start,
            special_requests: optional(&req.special_requests),
            status: RequestStatus::Pending,
            created_at: now_ms(),
        };
        let event = Event::RequestSubmitted {
            request: request.clone(),
        };
        self.persist_and_apply(&event).await?;
        Ok(request)
    }
}

fn rejection_label(e: &EngineError) -> &'static str {
    match e {
        EngineError::Configuration(_) => "configuration",
        EngineError::UnknownService(_) => "unknown_service",
        EngineError::Format(_) => "format",
        EngineError::MissingField(_) => "missing_field",
        EngineError::DateNotBookable { .. } => "date_not_bookable",
        EngineError::SlotUnavailable { .. } => "slot_unavailable",
        EngineError::LimitExceeded(_) => "limit_exceeded",
        EngineError::WalError(_) => "wal_error",
    }
}
