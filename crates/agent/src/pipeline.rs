use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::seq::SliceRandom;
use uuid::Uuid;

use shopmate_core::{
    AppConfig, ChatMessage, EnhancedResponse, Intent, PipelineError, ResponseMeta, TokenUsage,
};
use shopmate_store::{AnalyticsSink, CatalogStore, CouponIssuer, TtlCache, TurnEvent};

use crate::classifier::MessageClassifier;
use crate::context::SessionContextStore;
use crate::enhance::EnhancementPolicy;
use crate::invoker::CompletionInvoker;
use crate::llm::ChatModel;
use crate::retrieval::KnowledgeRetriever;

/// Generic re-engagement prompts for the boundary. None of them reference
/// the failure; diagnostics stay in metadata.
const FALLBACK_MESSAGES: &[&str] = &[
    "I'm sorry, I hit a snag on my end. Could you say that again?",
    "Apologies, something went wrong while I was thinking. What can I help you find today?",
    "I lost my train of thought there. Are you shopping for anything in particular?",
    "Sorry about that! Let's try again: what are you looking for?",
];

/// One inbound shopper message, as handed to the pipeline by the caller.
#[derive(Clone, Debug)]
pub struct TurnRequest {
    pub session_id: String,
    pub user_id: Option<String>,
    pub site_id: String,
    pub message: String,
    /// Caller-supplied transcript; when non-empty it supersedes the cached
    /// one.
    pub history: Vec<ChatMessage>,
}

/// The whole per-turn flow: context, classification, retrieval, generation,
/// enhancement, persistence, telemetry.
///
/// `handle_turn` is the outward contract: it always returns a well-formed
/// response, never an error. The only failure that reaches the boundary is
/// a completion-provider failure; it becomes a generic fallback reply with
/// the cause retained in metadata.
pub struct SalesPipeline {
    contexts: SessionContextStore,
    classifier: MessageClassifier,
    retriever: KnowledgeRetriever,
    invoker: CompletionInvoker,
    enhancer: EnhancementPolicy,
    response_cache: Arc<dyn TtlCache>,
    response_ttl: Duration,
    analytics: Arc<dyn AnalyticsSink>,
}

impl SalesPipeline {
    pub fn new(
        model: Arc<dyn ChatModel>,
        catalog: Arc<dyn CatalogStore>,
        coupons: Arc<dyn CouponIssuer>,
        cache: Arc<dyn TtlCache>,
        analytics: Arc<dyn AnalyticsSink>,
        config: &AppConfig,
    ) -> Self {
        Self {
            contexts: SessionContextStore::new(
                cache.clone(),
                Duration::from_secs(config.cache.context_ttl_secs),
            ),
            classifier: MessageClassifier::new(model.clone()),
            retriever: KnowledgeRetriever::new(
                catalog.clone(),
                cache.clone(),
                Duration::from_secs(config.cache.knowledge_ttl_secs),
            ),
            invoker: CompletionInvoker::new(
                model,
                catalog.clone(),
                coupons.clone(),
                config.pipeline.history_window,
                config.pipeline.coupon_max_discount_pct,
                config.pipeline.coupon_validity_days,
            ),
            enhancer: EnhancementPolicy::new(
                catalog,
                coupons,
                config.pipeline.coupon_max_discount_pct,
                config.pipeline.coupon_validity_days,
            ),
            response_cache: cache,
            response_ttl: Duration::from_secs(config.cache.response_ttl_secs),
            analytics,
        }
    }

    pub async fn handle_turn(&self, request: TurnRequest) -> EnhancedResponse {
        let started = Instant::now();
        let correlation_id = Uuid::new_v4();

        let response_key =
            response_cache_key(&request.site_id, &request.session_id, &request.message);
        if let Ok(Some(raw)) = self.response_cache.get(&response_key).await {
            if let Ok(mut cached) = serde_json::from_str::<EnhancedResponse>(&raw) {
                cached.meta.cached = true;
                tracing::debug!(
                    event_name = "pipeline.response.cache_hit",
                    session_id = %request.session_id,
                    correlation_id = %correlation_id,
                    "turn served from the response cache"
                );
                self.emit_event(&request, &cached, started).await;
                return cached;
            }
        }

        let mut context = self.contexts.build_context(&request).await;
        let analysis = self.classifier.analyze(&request.message, &context).await;
        context.current_intent = Some(analysis.intent);

        let knowledge = self.retriever.retrieve(&request.message, &request.site_id).await;

        let generated = match self
            .invoker
            .generate(&request.message, &context, &analysis, &knowledge)
            .await
        {
            Ok(generated) => generated,
            Err(error) => {
                tracing::error!(
                    event_name = "pipeline.generation.failed",
                    session_id = %request.session_id,
                    site_id = %request.site_id,
                    correlation_id = %correlation_id,
                    %error,
                    "generation failed; returning a fallback reply"
                );
                let response = fallback_response(&error);
                self.emit_event(&request, &response, started).await;
                return response;
            }
        };

        let response = self
            .enhancer
            .enhance(generated, &context, &analysis, &request.message, &knowledge)
            .await;

        SessionContextStore::record_turn(
            &mut context,
            &request.message,
            &response.message,
            analysis.sentiment,
        );
        self.contexts.save(&context).await;

        if let Ok(payload) = serde_json::to_string(&response) {
            if let Err(error) = self
                .response_cache
                .set_with_ttl(&response_key, payload, self.response_ttl)
                .await
            {
                tracing::debug!(
                    event_name = "pipeline.response.cache_write_failed",
                    session_id = %request.session_id,
                    %error,
                    "response cache write failed"
                );
            }
        }

        self.emit_event(&request, &response, started).await;
        response
    }

    async fn emit_event(
        &self,
        request: &TurnRequest,
        response: &EnhancedResponse,
        started: Instant,
    ) {
        self.analytics
            .emit(TurnEvent {
                session_id: request.session_id.clone(),
                site_id: request.site_id.clone(),
                intent: response.intent,
                sentiment: response.sentiment,
                confidence: response.confidence,
                latency_ms: started.elapsed().as_millis() as u64,
                token_usage: response.meta.token_usage,
                fallback: response.meta.fallback,
                timestamp: Utc::now(),
            })
            .await;
    }
}

fn response_cache_key(site_id: &str, session_id: &str, message: &str) -> String {
    let digest = blake3::hash(message.trim().to_lowercase().as_bytes());
    format!("resp:{site_id}:{session_id}:{}", &digest.to_hex().as_str()[..16])
}

fn fallback_response(error: &PipelineError) -> EnhancedResponse {
    let message = FALLBACK_MESSAGES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FALLBACK_MESSAGES[0]);

    EnhancedResponse {
        message: message.to_string(),
        intent: Intent::Unknown,
        confidence: 0.1,
        sentiment: 0.0,
        actions: Vec::new(),
        products: Vec::new(),
        product_total: None,
        coupons: Vec::new(),
        should_end_conversation: false,
        meta: ResponseMeta {
            model: String::new(),
            token_usage: TokenUsage::default(),
            cached: false,
            fallback: true,
            error: Some(error.to_string()),
        },
    }
}
