use std::sync::Arc;

use rust_decimal::Decimal;

use shopmate_core::ranking;
use shopmate_core::{
    CatalogProduct, ConversationContext, CouponSpec, DiscountType, DispatchedAction,
    EnhancedResponse, Intent, KnowledgeNode, MessageAnalysis, PipelineError, PurchaseReadiness,
    QueryShape, ResponseMeta,
};
use shopmate_store::{CatalogStore, CouponIssuer};

use crate::invoker::GeneratedReply;

/// Post-generation policy: decides what rides along with the reply,
/// products, a total count, coupons, the end-of-conversation flag.
///
/// Never fails the turn: any internal fault returns the generated reply
/// without enhancement.
pub struct EnhancementPolicy {
    catalog: Arc<dyn CatalogStore>,
    coupons: Arc<dyn CouponIssuer>,
    coupon_cap_pct: u8,
    coupon_validity_days: u32,
}

impl EnhancementPolicy {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        coupons: Arc<dyn CouponIssuer>,
        coupon_cap_pct: u8,
        coupon_validity_days: u32,
    ) -> Self {
        Self { catalog, coupons, coupon_cap_pct, coupon_validity_days }
    }

    pub async fn enhance(
        &self,
        generated: GeneratedReply,
        context: &ConversationContext,
        analysis: &MessageAnalysis,
        original_query: &str,
        knowledge: &[KnowledgeNode],
    ) -> EnhancedResponse {
        let base = base_response(&generated, analysis);

        match self.apply(base.clone(), context, analysis, original_query, knowledge).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(
                    event_name = "enhance.degraded",
                    session_id = %context.session_id,
                    %error,
                    "enhancement failed; returning the unenhanced reply"
                );
                base
            }
        }
    }

    async fn apply(
        &self,
        mut response: EnhancedResponse,
        context: &ConversationContext,
        analysis: &MessageAnalysis,
        original_query: &str,
        knowledge: &[KnowledgeNode],
    ) -> Result<EnhancedResponse, PipelineError> {
        let shape = QueryShape::classify(original_query);

        // A counting question gets a number, never a product grid.
        if shape == QueryShape::InventoryCount {
            let total = self
                .catalog
                .count_published(&context.site_id)
                .await
                .map_err(|error| PipelineError::Enhancement(error.to_string()))?;
            response.product_total = Some(total);
            return Ok(response);
        }

        let knowledge_has_products = knowledge.iter().any(|node| node.product_id().is_some());
        let include_products = shape.requests_products()
            || knowledge_has_products
            || analysis.intent.is_product_seeking();

        if include_products {
            let candidates = self
                .source_candidates(context, analysis, original_query, knowledge)
                .await
                .map_err(|error| PipelineError::Enhancement(error.to_string()))?;

            let mut ranked = ranking::rank_products(candidates);
            ranked.truncate(shape.product_cap());
            response.products = ranked.iter().map(ranking::to_card).collect();
        }

        // Coupons already issued during generation ride along as-is.
        for action in &response.actions {
            if let DispatchedAction::GenerateCoupon { coupon } = action {
                response.coupons.push(coupon.clone());
            }
        }

        if response.coupons.is_empty()
            && analysis.intent == Intent::PurchaseIntent
            && analysis.purchase_readiness == PurchaseReadiness::ReadyToBuy
        {
            if let Some(coupon) = self.try_issue_coupon(context).await {
                response.coupons.push(coupon);
            }
        }

        response.should_end_conversation = analysis.intent == Intent::Goodbye
            || (analysis.intent == Intent::PurchaseIntent && !response.coupons.is_empty());

        Ok(response)
    }

    /// Candidate sourcing cascade: knowledge ids, then an entity/interest
    /// driven search, then the raw query, then the whole published catalog.
    async fn source_candidates(
        &self,
        context: &ConversationContext,
        analysis: &MessageAnalysis,
        original_query: &str,
        knowledge: &[KnowledgeNode],
    ) -> Result<Vec<CatalogProduct>, shopmate_store::StoreError> {
        let known_ids: Vec<_> = knowledge.iter().filter_map(|node| node.product_id()).collect();
        if !known_ids.is_empty() {
            let mut products = Vec::with_capacity(known_ids.len());
            for id in known_ids {
                if let Some(product) = self.catalog.find_by_id(&context.site_id, id).await? {
                    products.push(product);
                }
            }
            if !products.is_empty() {
                return Ok(products);
            }
        }

        let mut terms: Vec<&str> = analysis
            .entities
            .products
            .iter()
            .chain(analysis.entities.categories.iter())
            .map(String::as_str)
            .collect();
        terms.extend(context.user_interests.iter().map(String::as_str));
        if !terms.is_empty() {
            let products = self
                .catalog
                .search(&context.site_id, &terms.join(" "), &Default::default())
                .await?;
            if !products.is_empty() {
                return Ok(products);
            }
        }

        let products = self
            .catalog
            .search(&context.site_id, original_query, &Default::default())
            .await?;
        if !products.is_empty() {
            return Ok(products);
        }

        self.catalog.all_published(&context.site_id, true).await
    }

    async fn try_issue_coupon(
        &self,
        context: &ConversationContext,
    ) -> Option<shopmate_core::IssuedCoupon> {
        let eligibility = match self
            .coupons
            .check_eligibility(&context.session_id, &context.site_id, context.user_id.as_deref())
            .await
        {
            Ok(eligibility) => eligibility,
            Err(error) => {
                tracing::warn!(
                    event_name = "enhance.coupon.failed",
                    session_id = %context.session_id,
                    %error,
                    "eligibility check failed; skipping coupon"
                );
                return None;
            }
        };
        if !eligibility.eligible {
            return None;
        }

        let pct = self.coupon_cap_pct.min(eligibility.max_discount_pct);
        let spec = CouponSpec {
            discount_type: DiscountType::Percentage,
            amount: Decimal::from(pct),
            validity_days: self.coupon_validity_days,
        };
        match self.coupons.issue(&context.session_id, &context.site_id, spec).await {
            Ok(issued) => issued,
            Err(error) => {
                tracing::warn!(
                    event_name = "enhance.coupon.failed",
                    session_id = %context.session_id,
                    %error,
                    "coupon issuance failed; skipping coupon"
                );
                None
            }
        }
    }
}

fn base_response(generated: &GeneratedReply, analysis: &MessageAnalysis) -> EnhancedResponse {
    EnhancedResponse {
        message: generated.text.clone(),
        intent: analysis.intent,
        confidence: analysis.confidence,
        sentiment: analysis.sentiment,
        actions: generated.actions.clone(),
        products: Vec::new(),
        product_total: None,
        coupons: Vec::new(),
        should_end_conversation: false,
        meta: ResponseMeta {
            model: generated.model.clone(),
            token_usage: generated.usage,
            cached: false,
            fallback: false,
            error: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use shopmate_core::{
        CatalogProduct, ConversationContext, Intent, KnowledgeNode, MessageAnalysis,
        ProductId, PurchaseReadiness, SearchFilters, TokenUsage,
    };
    use shopmate_store::{CatalogStore, InMemoryCatalog, InMemoryCouponIssuer, StoreError};

    use crate::invoker::GeneratedReply;

    use super::EnhancementPolicy;

    fn product(id: u32, in_stock: bool) -> CatalogProduct {
        CatalogProduct {
            id: ProductId(format!("p{id:02}")),
            name: format!("Product {id}"),
            description: "a product people search for".to_string(),
            regular_price: Decimal::new(9_999, 2),
            sale_price: None,
            currency: "USD".to_string(),
            categories: vec!["gadgets".to_string()],
            rating: 3.0 + f64::from(id % 3) * 0.5,
            review_count: id * 7,
            in_stock,
            image_url: None,
            permalink: None,
            published: true,
        }
    }

    async fn catalog_of(total: u32, out_of_stock: u32) -> Arc<InMemoryCatalog> {
        let catalog = InMemoryCatalog::new();
        for id in 0..total {
            catalog.insert("s1", product(id, id >= out_of_stock)).await;
        }
        Arc::new(catalog)
    }

    fn policy(catalog: Arc<dyn CatalogStore>, issuer: InMemoryCouponIssuer) -> EnhancementPolicy {
        EnhancementPolicy::new(catalog, Arc::new(issuer), 15, 7)
    }

    fn generated(text: &str) -> GeneratedReply {
        GeneratedReply {
            text: text.to_string(),
            actions: Vec::new(),
            usage: TokenUsage::default(),
            model: "stub".to_string(),
        }
    }

    fn analysis(intent: Intent) -> MessageAnalysis {
        MessageAnalysis { intent, ..MessageAnalysis::default() }
    }

    fn context() -> ConversationContext {
        ConversationContext::new("sess", "s1")
    }

    #[tokio::test]
    async fn inventory_count_attaches_a_total_and_no_products() {
        let catalog = catalog_of(20, 5).await;
        let policy = policy(catalog, InMemoryCouponIssuer::default());

        let response = policy
            .enhance(
                generated("We carry quite a range!"),
                &context(),
                &analysis(Intent::ProductInquiry),
                "how many products do you have",
                &[],
            )
            .await;
        assert_eq!(response.product_total, Some(20));
        assert!(response.products.is_empty());
    }

    #[tokio::test]
    async fn show_all_caps_at_twelve_with_in_stock_first() {
        let catalog = catalog_of(20, 5).await;
        let policy = policy(catalog, InMemoryCouponIssuer::default());

        let response = policy
            .enhance(
                generated("Here is everything."),
                &context(),
                &analysis(Intent::ProductInquiry),
                "show me all products",
                &[],
            )
            .await;
        assert_eq!(response.products.len(), 12);
        let first_out_of_stock = response.products.iter().position(|p| !p.in_stock);
        if let Some(boundary) = first_out_of_stock {
            assert!(
                response.products[boundary..].iter().all(|p| !p.in_stock),
                "in-stock items must precede out-of-stock ones"
            );
        }
    }

    #[tokio::test]
    async fn small_talk_attaches_nothing() {
        let catalog = catalog_of(5, 0).await;
        let policy = policy(catalog, InMemoryCouponIssuer::default());

        let response = policy
            .enhance(
                generated("Sorry to hear that!"),
                &context(),
                &analysis(Intent::Complaint),
                "my order arrived late",
                &[],
            )
            .await;
        assert!(response.products.is_empty());
        assert!(response.coupons.is_empty());
        assert_eq!(response.product_total, None);
    }

    #[tokio::test]
    async fn knowledge_product_ids_are_fetched_as_full_records() {
        let catalog = catalog_of(5, 0).await;
        let policy = policy(catalog, InMemoryCouponIssuer::default());
        let knowledge = vec![KnowledgeNode::Product {
            id: ProductId("p03".to_string()),
            summary: "Product 3".to_string(),
        }];

        let response = policy
            .enhance(
                generated("This one fits."),
                &context(),
                &analysis(Intent::Unknown),
                "hmm",
                &knowledge,
            )
            .await;
        assert_eq!(response.products.len(), 1);
        assert_eq!(response.products[0].id.0, "p03");
    }

    #[tokio::test]
    async fn coupon_requires_ready_to_buy_and_eligibility() {
        let catalog = catalog_of(3, 0).await;

        let ready = MessageAnalysis {
            intent: Intent::PurchaseIntent,
            purchase_readiness: PurchaseReadiness::ReadyToBuy,
            ..MessageAnalysis::default()
        };

        let eligible = policy(catalog.clone(), InMemoryCouponIssuer::default());
        let response = eligible
            .enhance(generated("Deal!"), &context(), &ready, "I'll take it", &[])
            .await;
        assert_eq!(response.coupons.len(), 1);
        assert_eq!(response.coupons[0].amount, Decimal::from(15u8));
        assert!(response.should_end_conversation, "purchase plus coupon ends the conversation");

        let researching = analysis(Intent::PurchaseIntent);
        let response = policy(catalog.clone(), InMemoryCouponIssuer::default())
            .enhance(generated("Deal!"), &context(), &researching, "I'll take it", &[])
            .await;
        assert!(response.coupons.is_empty());

        let ineligible = policy(catalog, InMemoryCouponIssuer::new(false, 0));
        let response = ineligible
            .enhance(generated("Deal!"), &context(), &ready, "I'll take it", &[])
            .await;
        assert!(response.coupons.is_empty());
        assert!(!response.should_end_conversation);
    }

    #[tokio::test]
    async fn goodbye_ends_the_conversation() {
        let catalog = catalog_of(3, 0).await;
        let policy = policy(catalog, InMemoryCouponIssuer::default());

        let response = policy
            .enhance(
                generated("Thanks for stopping by!"),
                &context(),
                &analysis(Intent::Goodbye),
                "goodbye, thanks",
                &[],
            )
            .await;
        assert!(response.should_end_conversation);
    }

    struct BrokenCatalog;

    #[async_trait]
    impl CatalogStore for BrokenCatalog {
        async fn search(
            &self,
            _: &str,
            _: &str,
            _: &SearchFilters,
        ) -> Result<Vec<CatalogProduct>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn find_by_id(
            &self,
            _: &str,
            _: &ProductId,
        ) -> Result<Option<CatalogProduct>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn all_published(&self, _: &str, _: bool) -> Result<Vec<CatalogProduct>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn in_category(&self, _: &str, _: &str) -> Result<Vec<CatalogProduct>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn count_published(&self, _: &str) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
    }

    #[tokio::test]
    async fn internal_failure_returns_the_unenhanced_reply() {
        let policy = policy(Arc::new(BrokenCatalog), InMemoryCouponIssuer::default());

        let response = policy
            .enhance(
                generated("Let me show you."),
                &context(),
                &analysis(Intent::ProductInquiry),
                "show me all products",
                &[],
            )
            .await;
        assert_eq!(response.message, "Let me show you.");
        assert!(response.products.is_empty());
        assert_eq!(response.product_total, None);
    }
}
