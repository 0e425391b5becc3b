pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::state::AppState;

/// What happened, in the vocabulary the admin frontend listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    NewBookingRequest,
    BookingApproved,
    BookingRejected,
    SlotUpdated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewBookingRequest => "new-booking-request",
            EventKind::BookingApproved => "booking-approved",
            EventKind::BookingRejected => "booking-rejected",
            EventKind::SlotUpdated => "slot-updated",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEvent {
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

/// Outbound side-channel for booking events. Strictly fire-and-forget: the
/// engine never awaits delivery on the request path and a sink failure never
/// fails the primary operation.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, event: &BookingEvent) -> anyhow::Result<()>;
}

/// Default sink: swallows everything.
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn publish(&self, _event: &BookingEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Emits one event: fans out to SSE subscribers and hands delivery to the
/// sink on a detached task.
pub fn emit(state: &Arc<AppState>, kind: EventKind, payload: serde_json::Value) {
    let event = BookingEvent { kind, payload };

    // Broadcast to SSE subscribers; ignore if no receivers
    let _ = state.events_tx.send(event.clone());

    let state = Arc::clone(state);
    tokio::spawn(async move {
        if let Err(e) = state.notifier.publish(&event).await {
            tracing::warn!(error = %e, kind = event.kind.as_str(), "notification delivery failed");
        }
    });
}
