use serde_json::json;

use shopmate_core::{ConversationContext, KnowledgeNode, MessageAnalysis};

use crate::llm::{ChatTurn, FunctionCatalog, FunctionSpec};

/// Assembles the generation prompt: role statement, the classifier's read on
/// the shopper, retrieved knowledge verbatim, and the sales guidelines. The
/// dialogue history is bounded to the most recent `history_window` turns.
pub struct PromptBuilder {
    history_window: usize,
}

impl PromptBuilder {
    pub fn new(history_window: usize) -> Self {
        Self { history_window }
    }

    pub fn system_prompt(
        &self,
        context: &ConversationContext,
        analysis: &MessageAnalysis,
        knowledge: &[KnowledgeNode],
    ) -> String {
        let mut prompt = String::from(
            "You are a friendly, knowledgeable sales assistant for an online store. \
             Help the shopper find the right product and move naturally toward a purchase.\n\n",
        );

        prompt.push_str(&format!(
            "Shopper read: intent={}, sentiment={:.2}, urgency={:?}, readiness={:?}.\n",
            analysis.intent.as_str(),
            analysis.sentiment,
            analysis.urgency,
            analysis.purchase_readiness,
        ));
        if !context.user_interests.is_empty() {
            let interests: Vec<&str> =
                context.user_interests.iter().map(String::as_str).collect();
            prompt.push_str(&format!("Known interests: {}.\n", interests.join(", ")));
        }

        if !knowledge.is_empty() {
            prompt.push_str("\nStore knowledge:\n");
            for node in knowledge {
                prompt.push_str("- ");
                prompt.push_str(node.summary());
                prompt.push('\n');
            }
        }

        prompt.push_str(
            "\nGuidelines:\n\
             - Build rapport before recommending; understand the need first.\n\
             - Recommend only products you actually know about from the store knowledge.\n\
             - Be honest about stock status; never promise unavailable items.\n\
             - Keep replies concise and conversational.\n",
        );

        prompt
    }

    /// The prior transcript, capped to the window, followed by the current
    /// user message.
    pub fn dialogue_turns(&self, context: &ConversationContext, message: &str) -> Vec<ChatTurn> {
        let skip = context.previous_messages.len().saturating_sub(self.history_window);
        let mut turns: Vec<ChatTurn> = context
            .previous_messages
            .iter()
            .skip(skip)
            .map(|m| ChatTurn { role: m.role, text: m.text.clone() })
            .collect();
        turns.push(ChatTurn {
            role: shopmate_core::ChatRole::User,
            text: message.to_string(),
        });
        turns
    }

    /// The action catalog in its structured rendering, for providers with
    /// native function calling.
    pub fn function_catalog() -> FunctionCatalog {
        FunctionCatalog {
            functions: vec![
                FunctionSpec {
                    name: "search_products".to_string(),
                    description: "Search the store catalog for products matching the shopper's request".to_string(),
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "query": { "type": "string", "description": "Free-text search terms" },
                            "category": { "type": "string" },
                            "min_price": { "type": "number" },
                            "max_price": { "type": "number" }
                        },
                        "required": ["query"]
                    }),
                },
                FunctionSpec {
                    name: "get_product_details".to_string(),
                    description: "Look up one product by its identifier".to_string(),
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "product_id": { "type": "string" }
                        },
                        "required": ["product_id"]
                    }),
                },
                FunctionSpec {
                    name: "generate_coupon".to_string(),
                    description: "Offer the shopper a discount coupon when they are ready to buy".to_string(),
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "discount_pct": { "type": "number", "description": "Requested percentage discount" }
                        }
                    }),
                },
                FunctionSpec {
                    name: "request_human_transfer".to_string(),
                    description: "Hand the conversation to a human agent".to_string(),
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "reason": { "type": "string" }
                        },
                        "required": ["reason"]
                    }),
                },
            ],
        }
    }

    /// The same catalog rendered as text, for providers without native
    /// function calling. The bracket markers here are what the text-pattern
    /// scan looks for after generation.
    pub fn action_appendix() -> &'static str {
        "\nYou can take actions by including a marker in your reply:\n\
         - [search_products: <search terms>] to show matching products\n\
         - [get_product_details: <product id>] to show one specific product\n\
         - [generate_coupon] to offer a discount when the shopper is ready to buy\n\
         - [transfer_human: <reason>] to hand off to a human agent\n\
         Use at most the markers you need; the marker text is removed before \
         the shopper sees your reply.\n"
    }
}
