use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use shopmate_core::{
    ConversationContext, CouponSpec, DiscountType, DispatchedAction, KnowledgeNode,
    MessageAnalysis, PipelineError, ProductId, SearchFilters, TokenUsage,
};
use shopmate_store::{CatalogStore, CouponIssuer};

use crate::llm::{ChatCompletion, ChatModel, ChatRequest, FunctionInvocation};
use crate::prompt::PromptBuilder;

const GENERATION_TEMPERATURE: f32 = 0.7;
const GENERATION_MAX_TOKENS: u32 = 600;
const DEFAULT_TRANSFER_REASON: &str = "shopper asked for a human agent";

/// What one model turn produced: the reply text, the actions that actually
/// resolved to something, and the usage accounting.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedReply {
    pub text: String,
    pub actions: Vec<DispatchedAction>,
    pub usage: TokenUsage,
    pub model: String,
}

/// How actions travel to and from the provider. Chosen once at construction
/// from the model's capability flag, never by runtime type inspection.
trait CallProtocol: Send + Sync {
    fn prepare(&self, request: &mut ChatRequest);

    /// Splits a completion into the shopper-visible text and the raw
    /// invocations it implied, in detection order.
    fn decode(&self, completion: &ChatCompletion) -> (String, Vec<FunctionInvocation>);
}

/// Native function calling: the catalog rides in the request and the
/// provider returns at most one structured invocation.
struct StructuredCaller;

impl CallProtocol for StructuredCaller {
    fn prepare(&self, request: &mut ChatRequest) {
        request.functions = Some(PromptBuilder::function_catalog());
    }

    fn decode(&self, completion: &ChatCompletion) -> (String, Vec<FunctionInvocation>) {
        let invocations = completion.invocation.iter().cloned().collect();
        (completion.text.trim().to_string(), invocations)
    }
}

static SEARCH_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[search_products:\s*([^\]]+)\]").expect("search marker"));
static DETAILS_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[get_product_details:\s*([^\]]+)\]").expect("details marker"));
static COUPON_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[generate_coupon\]").expect("coupon marker"));
static TRANSFER_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[transfer_human:\s*([^\]]*)\]").expect("transfer marker"));
static COUPON_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:discount|coupon)\s+code\b|\bspecial\s+discount\b").expect("coupon phrase")
});
static TRANSFER_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:connect|transfer)(?:ing)?\s+you\s+(?:to|with)\s+(?:a\s+|our\s+)?(?:human|live\s+agent|representative|support\s+team)")
        .expect("transfer phrase")
});

/// Text-pattern calling for providers without native support: the action
/// catalog is appended to the system prompt as prose, and the free-text
/// reply is scanned for bracket markers plus a few natural phrasings.
struct TextPatternCaller;

impl CallProtocol for TextPatternCaller {
    fn prepare(&self, request: &mut ChatRequest) {
        request.system_prompt.push_str(PromptBuilder::action_appendix());
    }

    fn decode(&self, completion: &ChatCompletion) -> (String, Vec<FunctionInvocation>) {
        scan_text_actions(&completion.text)
    }
}

fn scan_text_actions(text: &str) -> (String, Vec<FunctionInvocation>) {
    let mut found: Vec<(usize, FunctionInvocation)> = Vec::new();

    for caps in SEARCH_MARKER.captures_iter(text) {
        if let (Some(whole), Some(query)) = (caps.get(0), caps.get(1)) {
            found.push((
                whole.start(),
                FunctionInvocation {
                    name: "search_products".to_string(),
                    arguments: json!({ "query": query.as_str().trim() }),
                },
            ));
        }
    }
    for caps in DETAILS_MARKER.captures_iter(text) {
        if let (Some(whole), Some(id)) = (caps.get(0), caps.get(1)) {
            found.push((
                whole.start(),
                FunctionInvocation {
                    name: "get_product_details".to_string(),
                    arguments: json!({ "product_id": id.as_str().trim() }),
                },
            ));
        }
    }
    for m in COUPON_MARKER.find_iter(text).chain(COUPON_PHRASE.find_iter(text)) {
        found.push((
            m.start(),
            FunctionInvocation { name: "generate_coupon".to_string(), arguments: json!({}) },
        ));
    }
    for caps in TRANSFER_MARKER.captures_iter(text) {
        if let Some(whole) = caps.get(0) {
            let reason = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            found.push((
                whole.start(),
                FunctionInvocation {
                    name: "request_human_transfer".to_string(),
                    arguments: json!({ "reason": reason }),
                },
            ));
        }
    }
    for m in TRANSFER_PHRASE.find_iter(text) {
        found.push((
            m.start(),
            FunctionInvocation {
                name: "request_human_transfer".to_string(),
                arguments: json!({ "reason": "" }),
            },
        ));
    }

    found.sort_by_key(|(position, _)| *position);
    let mut invocations: Vec<FunctionInvocation> = Vec::new();
    for (_, invocation) in found {
        if !invocations.iter().any(|seen| seen.name == invocation.name) {
            invocations.push(invocation);
        }
    }

    let mut cleaned = text.to_string();
    for marker in [&*SEARCH_MARKER, &*DETAILS_MARKER, &*COUPON_MARKER, &*TRANSFER_MARKER] {
        cleaned = marker.replace_all(&cleaned, "").into_owned();
    }
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    (cleaned, invocations)
}

/// Drives one model turn end to end: prompt assembly, the provider call,
/// invocation decoding, and action execution.
///
/// Action execution degrades per call (a search that finds nothing or a
/// declined coupon simply drops the action), but a provider failure
/// escalates: there is no safe text to substitute for an absent generation.
pub struct CompletionInvoker {
    model: Arc<dyn ChatModel>,
    catalog: Arc<dyn CatalogStore>,
    coupons: Arc<dyn CouponIssuer>,
    prompts: PromptBuilder,
    protocol: Box<dyn CallProtocol>,
    coupon_cap_pct: u8,
    coupon_validity_days: u32,
}

impl CompletionInvoker {
    pub fn new(
        model: Arc<dyn ChatModel>,
        catalog: Arc<dyn CatalogStore>,
        coupons: Arc<dyn CouponIssuer>,
        history_window: usize,
        coupon_cap_pct: u8,
        coupon_validity_days: u32,
    ) -> Self {
        let protocol: Box<dyn CallProtocol> = if model.supports_native_functions() {
            Box::new(StructuredCaller)
        } else {
            Box::new(TextPatternCaller)
        };
        Self {
            model,
            catalog,
            coupons,
            prompts: PromptBuilder::new(history_window),
            protocol,
            coupon_cap_pct,
            coupon_validity_days,
        }
    }

    pub async fn generate(
        &self,
        message: &str,
        context: &ConversationContext,
        analysis: &MessageAnalysis,
        knowledge: &[KnowledgeNode],
    ) -> Result<GeneratedReply, PipelineError> {
        let mut request = ChatRequest {
            system_prompt: self.prompts.system_prompt(context, analysis, knowledge),
            turns: self.prompts.dialogue_turns(context, message),
            temperature: GENERATION_TEMPERATURE,
            max_tokens: GENERATION_MAX_TOKENS,
            functions: None,
        };
        self.protocol.prepare(&mut request);

        let completion = self
            .model
            .complete(request)
            .await
            .map_err(|error| PipelineError::Completion(error.to_string()))?;

        let (text, invocations) = self.protocol.decode(&completion);
        let actions = self.execute(&invocations, context).await;

        // An invocation-only completion still needs shopper-visible text.
        let text = if text.is_empty() {
            if actions.is_empty() {
                return Err(PipelineError::Completion(
                    "provider returned an empty completion".to_string(),
                ));
            }
            "Here's what I found for you.".to_string()
        } else {
            text
        };

        Ok(GeneratedReply {
            text,
            actions,
            usage: completion.usage,
            model: self.model.model_id().to_string(),
        })
    }

    async fn execute(
        &self,
        invocations: &[FunctionInvocation],
        context: &ConversationContext,
    ) -> Vec<DispatchedAction> {
        let mut actions = Vec::new();
        for invocation in invocations {
            let action = match invocation.name.as_str() {
                "search_products" => self.run_search(&invocation.arguments, context).await,
                "get_product_details" => self.run_lookup(&invocation.arguments, context).await,
                "generate_coupon" => self.run_coupon(&invocation.arguments, context).await,
                "request_human_transfer" => Some(DispatchedAction::TransferHuman {
                    reason: match invocation.arguments.get("reason").and_then(Value::as_str) {
                        Some(reason) if !reason.trim().is_empty() => reason.trim().to_string(),
                        _ => DEFAULT_TRANSFER_REASON.to_string(),
                    },
                }),
                other => {
                    tracing::debug!(
                        event_name = "invoker.action.unknown",
                        action = other,
                        "model invoked an action outside the catalog; ignoring"
                    );
                    None
                }
            };
            if let Some(action) = action {
                actions.push(action);
            }
        }
        actions
    }

    async fn run_search(
        &self,
        arguments: &Value,
        context: &ConversationContext,
    ) -> Option<DispatchedAction> {
        let query = arguments.get("query").and_then(Value::as_str)?.trim();
        if query.is_empty() {
            return None;
        }

        let filters = SearchFilters {
            category: arguments
                .get("category")
                .and_then(Value::as_str)
                .map(str::to_string),
            min_price: arguments
                .get("min_price")
                .and_then(Value::as_f64)
                .and_then(|v| Decimal::try_from(v).ok()),
            max_price: arguments
                .get("max_price")
                .and_then(Value::as_f64)
                .and_then(|v| Decimal::try_from(v).ok()),
            ..SearchFilters::default()
        };

        match self.catalog.search(&context.site_id, query, &filters).await {
            Ok(products) if !products.is_empty() => Some(DispatchedAction::ShowProducts {
                product_ids: products.into_iter().map(|p| p.id).collect(),
            }),
            Ok(_) => None,
            Err(error) => {
                tracing::warn!(
                    event_name = "invoker.search.failed",
                    site_id = %context.site_id,
                    %error,
                    "action search failed; dropping the action"
                );
                None
            }
        }
    }

    async fn run_lookup(
        &self,
        arguments: &Value,
        context: &ConversationContext,
    ) -> Option<DispatchedAction> {
        let id = ProductId(arguments.get("product_id").and_then(Value::as_str)?.trim().to_string());
        match self.catalog.find_by_id(&context.site_id, &id).await {
            Ok(Some(product)) => {
                Some(DispatchedAction::ShowProducts { product_ids: vec![product.id] })
            }
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(
                    event_name = "invoker.lookup.failed",
                    site_id = %context.site_id,
                    %error,
                    "product lookup failed; dropping the action"
                );
                None
            }
        }
    }

    async fn run_coupon(
        &self,
        arguments: &Value,
        context: &ConversationContext,
    ) -> Option<DispatchedAction> {
        let eligibility = match self
            .coupons
            .check_eligibility(&context.session_id, &context.site_id, context.user_id.as_deref())
            .await
        {
            Ok(eligibility) => eligibility,
            Err(error) => {
                tracing::warn!(
                    event_name = "invoker.coupon.failed",
                    session_id = %context.session_id,
                    %error,
                    "eligibility check failed; dropping the action"
                );
                return None;
            }
        };
        if !eligibility.eligible {
            return None;
        }

        let requested = arguments
            .get("discount_pct")
            .and_then(Value::as_f64)
            .map(|pct| pct as u8)
            .unwrap_or(self.coupon_cap_pct);
        let pct = requested.min(self.coupon_cap_pct).min(eligibility.max_discount_pct);

        let spec = CouponSpec {
            discount_type: DiscountType::Percentage,
            amount: Decimal::from(pct),
            validity_days: self.coupon_validity_days,
        };
        match self.coupons.issue(&context.session_id, &context.site_id, spec).await {
            Ok(Some(coupon)) => Some(DispatchedAction::GenerateCoupon { coupon }),
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(
                    event_name = "invoker.coupon.failed",
                    session_id = %context.session_id,
                    %error,
                    "coupon issuance failed; dropping the action"
                );
                None
            }
        }
    }
}
