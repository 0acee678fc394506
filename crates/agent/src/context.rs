use std::sync::Arc;
use std::time::Duration;

use shopmate_core::{ChatMessage, ConversationContext};
use shopmate_store::TtlCache;

use crate::pipeline::TurnRequest;

/// Read-through session state over the TTL cache.
///
/// Two concurrent turns for the same session race read-modify-write on the
/// cache entry with last-writer-wins; there is no per-session lock.
pub struct SessionContextStore {
    cache: Arc<dyn TtlCache>,
    ttl: Duration,
}

impl SessionContextStore {
    pub fn new(cache: Arc<dyn TtlCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    fn cache_key(site_id: &str, session_id: &str) -> String {
        format!("ctx:{site_id}:{session_id}")
    }

    /// Rebuilds the session context for this turn. The caller-supplied
    /// history, when non-empty, supersedes whatever the cache held: the
    /// caller is the source of truth for transcript continuity. A cache
    /// failure yields a freshly-initialized context; the turn proceeds
    /// without persistence.
    pub async fn build_context(&self, request: &TurnRequest) -> ConversationContext {
        let key = Self::cache_key(&request.site_id, &request.session_id);

        let mut context = match self.cache.get(&key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|error| {
                tracing::warn!(
                    event_name = "context.cache.decode_failed",
                    session_id = %request.session_id,
                    %error,
                    "cached context was undecodable; starting fresh"
                );
                ConversationContext::new(&request.session_id, &request.site_id)
            }),
            Ok(None) => ConversationContext::new(&request.session_id, &request.site_id),
            Err(error) => {
                tracing::warn!(
                    event_name = "context.cache.unavailable",
                    session_id = %request.session_id,
                    %error,
                    "context store unavailable; proceeding without persistence"
                );
                ConversationContext::new(&request.session_id, &request.site_id)
            }
        };

        if request.user_id.is_some() {
            context.user_id = request.user_id.clone();
        }
        if !request.history.is_empty() {
            context.previous_messages = request.history.clone();
        }
        context.refresh_derived_state();

        context
    }

    /// Writes the turn's final context back with the fixed TTL. Failures are
    /// logged and swallowed; the next turn simply starts fresh.
    pub async fn save(&self, context: &ConversationContext) {
        let key = Self::cache_key(&context.site_id, &context.session_id);
        let payload = match serde_json::to_string(context) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(
                    event_name = "context.cache.encode_failed",
                    session_id = %context.session_id,
                    %error,
                    "context could not be serialized; skipping persistence"
                );
                return;
            }
        };

        if let Err(error) = self.cache.set_with_ttl(&key, payload, self.ttl).await {
            tracing::warn!(
                event_name = "context.cache.write_failed",
                session_id = %context.session_id,
                %error,
                "context write failed; session state will not survive this turn"
            );
        }
    }

    /// Appends the turn's messages and sentiment before persistence.
    pub fn record_turn(
        context: &mut ConversationContext,
        user_message: &str,
        assistant_reply: &str,
        sentiment: f64,
    ) {
        context.previous_messages.push(ChatMessage::user(user_message));
        context.previous_messages.push(ChatMessage::assistant(assistant_reply));
        context.sentiment_history.push(sentiment);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use shopmate_core::ChatMessage;
    use shopmate_store::{InMemoryTtlCache, StoreError, TtlCache};

    use crate::pipeline::TurnRequest;

    use super::SessionContextStore;

    struct DownCache;

    #[async_trait]
    impl TtlCache for DownCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn set_with_ttl(
            &self,
            _key: &str,
            _value: String,
            _ttl: Duration,
        ) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    fn request(history: Vec<ChatMessage>) -> TurnRequest {
        TurnRequest {
            session_id: "sess-1".to_string(),
            user_id: Some("u-9".to_string()),
            site_id: "site-1".to_string(),
            message: "hello".to_string(),
            history,
        }
    }

    #[tokio::test]
    async fn first_turn_initializes_from_request() {
        let cache = Arc::new(InMemoryTtlCache::new());
        let store = SessionContextStore::new(cache, Duration::from_secs(60));

        let context = store.build_context(&request(Vec::new())).await;
        assert_eq!(context.session_id, "sess-1");
        assert_eq!(context.user_id.as_deref(), Some("u-9"));
        assert!(context.previous_messages.is_empty());
    }

    #[tokio::test]
    async fn caller_history_supersedes_cached_transcript() {
        let cache = Arc::new(InMemoryTtlCache::new());
        let store = SessionContextStore::new(cache, Duration::from_secs(60));

        let mut context = store.build_context(&request(Vec::new())).await;
        SessionContextStore::record_turn(&mut context, "old line", "old reply", 0.1);
        store.save(&context).await;

        let fresh_history = vec![ChatMessage::user("I want a gaming laptop")];
        let rebuilt = store.build_context(&request(fresh_history.clone())).await;
        assert_eq!(rebuilt.previous_messages, fresh_history);
        assert!(rebuilt.user_interests.contains("gaming"));
    }

    #[tokio::test]
    async fn cached_state_survives_when_request_has_no_history() {
        let cache = Arc::new(InMemoryTtlCache::new());
        let store = SessionContextStore::new(cache, Duration::from_secs(60));

        let mut context = store.build_context(&request(Vec::new())).await;
        SessionContextStore::record_turn(&mut context, "need headphones", "sure", -0.2);
        store.save(&context).await;

        let rebuilt = store.build_context(&request(Vec::new())).await;
        assert_eq!(rebuilt.previous_messages.len(), 2);
        assert_eq!(rebuilt.sentiment_history, vec![-0.2]);
        assert!(rebuilt.user_interests.contains("headphones"));
    }

    #[tokio::test]
    async fn store_outage_yields_fresh_context() {
        let store = SessionContextStore::new(Arc::new(DownCache), Duration::from_secs(60));
        let context = store.build_context(&request(Vec::new())).await;
        assert!(context.previous_messages.is_empty());

        // save must not panic or error the turn
        store.save(&context).await;
    }
}
