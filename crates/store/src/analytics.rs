use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use shopmate_core::{Intent, TokenUsage};

/// One per-turn telemetry record. Emission is fire-and-forget; no sink
/// failure may affect the turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnEvent {
    pub session_id: String,
    pub site_id: String,
    pub intent: Intent,
    pub sentiment: f64,
    pub confidence: f64,
    pub latency_ms: u64,
    pub token_usage: TokenUsage,
    pub fallback: bool,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn emit(&self, event: TurnEvent);
}

/// Sink for deployments without a real analytics backend: every turn still
/// lands in the structured log stream.
#[derive(Default)]
pub struct TracingSink;

#[async_trait]
impl AnalyticsSink for TracingSink {
    async fn emit(&self, event: TurnEvent) {
        tracing::info!(
            event_name = "pipeline.turn.completed",
            session_id = %event.session_id,
            site_id = %event.site_id,
            intent = event.intent.as_str(),
            sentiment = event.sentiment,
            confidence = event.confidence,
            latency_ms = event.latency_ms,
            total_tokens = event.token_usage.total_tokens,
            fallback = event.fallback,
            "turn completed"
        );
    }
}

#[derive(Default)]
pub struct NoopSink;

#[async_trait]
impl AnalyticsSink for NoopSink {
    async fn emit(&self, _event: TurnEvent) {}
}

/// Test helper that captures emitted events.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TurnEvent>>,
}

impl RecordingSink {
    pub async fn events(&self) -> Vec<TurnEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AnalyticsSink for RecordingSink {
    async fn emit(&self, event: TurnEvent) {
        self.events.lock().await.push(event);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use shopmate_core::{Intent, TokenUsage};

    use super::{AnalyticsSink, RecordingSink, TurnEvent};

    #[tokio::test]
    async fn recording_sink_captures_events_in_order() {
        let sink = RecordingSink::default();
        for (n, intent) in [Intent::Greeting, Intent::Goodbye].into_iter().enumerate() {
            sink.emit(TurnEvent {
                session_id: format!("s-{n}"),
                site_id: "site".to_string(),
                intent,
                sentiment: 0.0,
                confidence: 0.5,
                latency_ms: 12,
                token_usage: TokenUsage::default(),
                fallback: false,
                timestamp: Utc::now(),
            })
            .await;
        }

        let events = sink.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].intent, Intent::Greeting);
        assert_eq!(events[1].intent, Intent::Goodbye);
    }
}
