use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::engine::Engine;
use crate::model::Event;
use crate::notify::{NotifySink, OwnerMessage, REQUESTS_CHANNEL};

/// Background task that turns accepted requests into owner messages.
/// Runs until the requests channel closes.
pub async fn run_forwarder(engine: Arc<Engine>, sink: Arc<dyn NotifySink>) {
    let mut rx = engine.notify.subscribe(REQUESTS_CHANNEL);
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                warn!("notification forwarder lagged, {missed} requests not forwarded");
                metrics::counter!(crate::observability::NOTIFY_DELIVERIES_TOTAL, "status" => "lagged")
                    .increment(missed);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let Event::RequestSubmitted { request } = event;
        let service = match engine.service(request.service.as_str()) {
            Ok(service) => service,
            Err(e) => {
                warn!("request {}: {e}", request.id);
                continue;
            }
        };
        let message = OwnerMessage::render(&engine.config().name, &request, service);

        match sink.deliver(&message).await {
            Ok(()) => {
                info!("owner notified of request {}", request.id);
                metrics::counter!(crate::observability::NOTIFY_DELIVERIES_TOTAL, "status" => "ok")
                    .increment(1);
            }
            Err(e) => {
                warn!("owner notification for request {} failed: {e}", request.id);
                metrics::counter!(crate::observability::NOTIFY_DELIVERIES_TOTAL, "status" => "error")
                    .increment(1);
            }
        }
    }
}
