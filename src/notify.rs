use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::engine::format_time;
use crate::model::{AppointmentRequest, Event, Service, ServiceId};

const CHANNEL_CAPACITY: usize = 256;

/// Every accepted request is published here.
pub const REQUESTS_CHANNEL: &str = "requests";

/// Per-service channel name, e.g. `service_gel`.
pub fn service_channel(id: &ServiceId) -> String {
    format!("service_{id}")
}

/// Broadcast hub for request events, keyed by channel name.
pub struct NotifyHub {
    channels: DashMap<String, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a channel. Creates the channel if needed.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send on one channel. No-op if nobody is listening.
    pub fn send(&self, channel: &str, event: &Event) {
        if let Some(sender) = self.channels.get(channel) {
            let _ = sender.send(event.clone());
        }
    }

    /// Fan an event out to every channel it belongs on.
    pub fn publish(&self, event: &Event) {
        match event {
            Event::RequestSubmitted { request } => {
                self.send(REQUESTS_CHANNEL, event);
                self.send(&service_channel(&request.service), event);
            }
        }
    }
}

// ── Owner notification ───────────────────────────────────────────

/// What the owner receives for a new request: a full message for email and a
/// one-line version for SMS gateways.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerMessage {
    pub subject: String,
    pub body: String,
    pub sms: String,
}

/// `$25`, or `$25.50` when there are cents.
pub fn format_price(cents: u64) -> String {
    if cents % 100 == 0 {
        format!("${}", cents / 100)
    } else {
        format!("${}.{:02}", cents / 100, cents % 100)
    }
}

impl OwnerMessage {
    pub fn render(studio: &str, request: &AppointmentRequest, service: &Service) -> Self {
        let date = request.date.format("%-m/%-d/%Y").to_string();
        let time = format_time(request.start);

        let body = format!(
            "NEW APPOINTMENT REQUEST\n\
             \n\
             Client: {client}\n\
             Phone: {phone}\n\
             Email: {email}\n\
             Service: {service} ({price})\n\
             Date: {date}\n\
             Time: {time}\n\
             Special Requests: {notes}\n\
             \n\
             Please confirm within 24 hours.",
            client = request.client_name,
            phone = request.phone,
            email = request.email.as_deref().unwrap_or("Not provided"),
            service = service.name,
            price = format_price(service.price_cents),
            notes = request.special_requests.as_deref().unwrap_or("None"),
        );
        let sms = format!(
            "NEW BOOKING: {}, {}, {}, {date}, {time}",
            request.client_name, request.phone, service.name
        );

        Self {
            subject: format!("New Appointment Request - {studio}"),
            body,
            sms,
        }
    }
}

/// Outbound delivery of owner messages (email relay, SMS gateway, ...).
#[async_trait]
pub trait NotifySink: Send + Sync {
    async fn deliver(&self, message: &OwnerMessage) -> std::io::Result<()>;
}

/// Writes owner messages to the log.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotifySink for LogSink {
    async fn deliver(&self, message: &OwnerMessage) -> std::io::Result<()> {
        tracing::info!(subject = %message.subject, "{}", message.body);
        tracing::info!("sms: {}", message.sms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use ulid::Ulid;

    use super::*;
    use crate::model::RequestStatus;

    fn request(service: &str, email: Option<&str>, notes: Option<&str>) -> AppointmentRequest {
        AppointmentRequest {
            id: Ulid::new(),
            client_name: "Ada Lovelace".into(),
            phone: "5551234567".into(),
            email: email.map(str::to_string),
            service: ServiceId::new(service),
            date: NaiveDate::from_ymd_opt(2025, 6, 6).unwrap(),
            start: 1050,
            special_requests: notes.map(str::to_string),
            status: RequestStatus::Pending,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let mut all = hub.subscribe(REQUESTS_CHANNEL);
        let mut gel = hub.subscribe("service_gel");
        let mut art = hub.subscribe("service_nail-art");

        let event = Event::RequestSubmitted {
            request: request("gel", None, None),
        };
        hub.publish(&event);

        assert_eq!(all.recv().await.unwrap(), event);
        assert_eq!(gel.recv().await.unwrap(), event);
        assert!(art.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        hub.publish(&Event::RequestSubmitted {
            request: request("gel", None, None),
        });
    }

    #[test]
    fn price_formatting() {
        assert_eq!(format_price(2500), "$25");
        assert_eq!(format_price(2550), "$25.50");
        assert_eq!(format_price(5), "$0.05");
    }

    #[test]
    fn owner_message_with_defaults() {
        let service = Service::new("nail-art", "Custom Nail Art", 90, 6500, "");
        let msg = OwnerMessage::render("Studio", &request("nail-art", None, None), &service);
        assert_eq!(msg.subject, "New Appointment Request - Studio");
        assert!(msg.body.starts_with("NEW APPOINTMENT REQUEST\n\nClient: Ada Lovelace\n"));
        assert!(msg.body.contains("Email: Not provided\n"));
        assert!(msg.body.contains("Service: Custom Nail Art ($65)\n"));
        assert!(msg.body.contains("Date: 6/6/2025\n"));
        assert!(msg.body.contains("Time: 5:30 PM\n"));
        assert!(msg.body.contains("Special Requests: None\n"));
        assert!(msg.body.ends_with("Please confirm within 24 hours."));
        assert_eq!(
            msg.sms,
            "NEW BOOKING: Ada Lovelace, 5551234567, Custom Nail Art, 6/6/2025, 5:30 PM"
        );
    }

    #[test]
    fn owner_message_with_contact_details() {
        let service = Service::new("gel", "Gel Nails", 60, 4500, "");
        let req = request("gel", Some("ada@example.com"), Some("Short and square"));
        let msg = OwnerMessage::render("Studio", &req, &service);
        assert!(msg.body.contains("Email: ada@example.com\n"));
        assert!(msg.body.contains("Special Requests: Short and square\n"));
    }
}
