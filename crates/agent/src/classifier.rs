use std::sync::Arc;

use shopmate_core::{fallback_analysis, ConversationContext, MessageAnalysis};

use crate::llm::{ChatModel, ChatRequest, ChatTurn};
use shopmate_core::ChatRole;

const ANALYSIS_TEMPERATURE: f32 = 0.1;
const ANALYSIS_MAX_TOKENS: u32 = 300;

/// Intent/sentiment classification with a model-backed primary path and a
/// deterministic fallback. `analyze` never fails: every classification
/// error is recovered here and never propagates.
pub struct MessageClassifier {
    model: Arc<dyn ChatModel>,
}

impl MessageClassifier {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn analyze(
        &self,
        message: &str,
        context: &ConversationContext,
    ) -> MessageAnalysis {
        let request = ChatRequest {
            system_prompt: analysis_prompt(context),
            turns: vec![ChatTurn { role: ChatRole::User, text: message.to_string() }],
            temperature: ANALYSIS_TEMPERATURE,
            max_tokens: ANALYSIS_MAX_TOKENS,
            functions: None,
        };

        match self.model.complete(request).await {
            Ok(completion) => match parse_analysis(&completion.text) {
                Some(analysis) => analysis,
                None => {
                    tracing::debug!(
                        event_name = "classifier.fallback",
                        session_id = %context.session_id,
                        reason = "unparseable_json",
                        "classifier output was not valid JSON; using deterministic fallback"
                    );
                    fallback_analysis(message)
                }
            },
            Err(error) => {
                tracing::debug!(
                    event_name = "classifier.fallback",
                    session_id = %context.session_id,
                    reason = "completion_error",
                    %error,
                    "classifier completion failed; using deterministic fallback"
                );
                fallback_analysis(message)
            }
        }
    }
}

fn analysis_prompt(context: &ConversationContext) -> String {
    let interests = if context.user_interests.is_empty() {
        "none".to_string()
    } else {
        context.user_interests.iter().cloned().collect::<Vec<_>>().join(", ")
    };
    let current_intent =
        context.current_intent.map(|intent| intent.as_str()).unwrap_or("none");

    format!(
        "You classify a shopper's message for an e-commerce assistant.\n\
         Known interests: {interests}\n\
         Prior messages in conversation: {}\n\
         Current intent: {current_intent}\n\
         Respond with a single JSON object and nothing else, using these keys:\n\
         intent (greeting|product_inquiry|price_question|comparison|purchase_intent|complaint|goodbye|unknown),\n\
         sentiment (number in [-1,1]), confidence (number in [0,1]),\n\
         entities (object with products, categories, price_mentions arrays),\n\
         urgency (low|medium|high), purchase_readiness (researching|considering|ready_to_buy).",
        context.previous_messages.len()
    )
}

/// Tolerant parse: strips code fences, finds the outermost object, and lets
/// serde defaults fill any missing field. Returns `None` only when no JSON
/// object can be recovered at all.
fn parse_analysis(text: &str) -> Option<MessageAnalysis> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end_matches("```"))
        .unwrap_or(trimmed)
        .trim();

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    serde_json::from_str::<MessageAnalysis>(&unfenced[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use shopmate_core::{ConversationContext, Intent, PurchaseReadiness, TokenUsage};

    use crate::llm::{ChatCompletion, ChatModel, ChatRequest};

    use super::{parse_analysis, MessageClassifier};

    struct CannedModel {
        reply: Result<String, String>,
    }

    #[async_trait]
    impl ChatModel for CannedModel {
        fn model_id(&self) -> &str {
            "canned"
        }

        fn supports_native_functions(&self) -> bool {
            false
        }

        async fn complete(&self, _request: ChatRequest) -> Result<ChatCompletion> {
            match &self.reply {
                Ok(text) => Ok(ChatCompletion {
                    text: text.clone(),
                    invocation: None,
                    usage: TokenUsage::default(),
                }),
                Err(message) => Err(anyhow!(message.clone())),
            }
        }
    }

    fn context() -> ConversationContext {
        ConversationContext::new("sess", "site")
    }

    #[tokio::test]
    async fn well_formed_json_is_used_directly() {
        let classifier = MessageClassifier::new(Arc::new(CannedModel {
            reply: Ok(r#"{"intent":"purchase_intent","confidence":0.9,"purchase_readiness":"ready_to_buy"}"#.to_string()),
        }));

        let analysis = classifier.analyze("I'll take the laptop", &context()).await;
        assert_eq!(analysis.intent, Intent::PurchaseIntent);
        assert_eq!(analysis.confidence, 0.9);
        assert_eq!(analysis.purchase_readiness, PurchaseReadiness::ReadyToBuy);
    }

    #[tokio::test]
    async fn completion_failure_takes_fallback_path() {
        let classifier = MessageClassifier::new(Arc::new(CannedModel {
            reply: Err("provider timeout".to_string()),
        }));

        let analysis = classifier.analyze("bye", &context()).await;
        assert_eq!(analysis.intent, Intent::Goodbye);
        assert_eq!(analysis.confidence, 0.3);
    }

    #[tokio::test]
    async fn non_json_reply_takes_fallback_path() {
        let classifier = MessageClassifier::new(Arc::new(CannedModel {
            reply: Ok("Sure! The intent seems friendly.".to_string()),
        }));

        let analysis = classifier.analyze("this is broken and terrible", &context()).await;
        assert!(analysis.sentiment < 0.0);
        assert_eq!(analysis.confidence, 0.3);
    }

    #[test]
    fn parse_strips_code_fences() {
        let fenced = "```json\n{\"intent\":\"greeting\"}\n```";
        let analysis = parse_analysis(fenced).expect("parse");
        assert_eq!(analysis.intent, Intent::Greeting);
    }

    #[test]
    fn parse_rejects_plain_prose() {
        assert!(parse_analysis("no json here").is_none());
    }
}
