use std::sync::Arc;
use std::time::Duration;

use shopmate_core::{KnowledgeNode, QueryShape, SearchFilters};
use shopmate_store::{CatalogStore, TtlCache};

/// Longest query prefix that participates in the cache fingerprint.
const FINGERPRINT_QUERY_LIMIT: usize = 120;

/// Catalog knowledge retrieval, cached by `(site, query-fingerprint)`.
///
/// Never returns an error and never caps the result set: truncation is the
/// enhancement policy's job, and a failed lookup degrades to an empty list.
pub struct KnowledgeRetriever {
    catalog: Arc<dyn CatalogStore>,
    cache: Arc<dyn TtlCache>,
    ttl: Duration,
}

impl KnowledgeRetriever {
    pub fn new(catalog: Arc<dyn CatalogStore>, cache: Arc<dyn TtlCache>, ttl: Duration) -> Self {
        Self { catalog, cache, ttl }
    }

    pub fn cache_key(site_id: &str, query: &str) -> String {
        let normalized: String = query
            .trim()
            .to_lowercase()
            .chars()
            .take(FINGERPRINT_QUERY_LIMIT)
            .collect();
        let digest = blake3::hash(normalized.as_bytes());
        format!("kn:{site_id}:{}", &digest.to_hex().as_str()[..16])
    }

    pub async fn retrieve(&self, query: &str, site_id: &str) -> Vec<KnowledgeNode> {
        let key = Self::cache_key(site_id, query);

        if let Ok(Some(raw)) = self.cache.get(&key).await {
            if let Ok(nodes) = serde_json::from_str::<Vec<KnowledgeNode>>(&raw) {
                tracing::debug!(
                    event_name = "retrieval.cache.hit",
                    site_id = %site_id,
                    nodes = nodes.len(),
                    "knowledge served from cache"
                );
                return nodes;
            }
        }

        let nodes = match self.fetch(query, site_id).await {
            Ok(nodes) => nodes,
            Err(error) => {
                tracing::warn!(
                    event_name = "retrieval.catalog.failed",
                    site_id = %site_id,
                    %error,
                    "catalog retrieval failed; continuing with no knowledge"
                );
                return Vec::new();
            }
        };

        if let Ok(payload) = serde_json::to_string(&nodes) {
            if let Err(error) = self.cache.set_with_ttl(&key, payload, self.ttl).await {
                tracing::debug!(
                    event_name = "retrieval.cache.write_failed",
                    site_id = %site_id,
                    %error,
                    "knowledge cache write failed"
                );
            }
        }

        nodes
    }

    async fn fetch(
        &self,
        query: &str,
        site_id: &str,
    ) -> Result<Vec<KnowledgeNode>, shopmate_store::StoreError> {
        // An explicit whole-inventory ask skips ranked search entirely and
        // includes out-of-stock items.
        let products = if QueryShape::classify(query) == QueryShape::ShowAll {
            self.catalog.all_published(site_id, true).await?
        } else {
            let hits = self.catalog.search(site_id, query, &SearchFilters::default()).await?;
            if hits.is_empty() {
                // Search found nothing; surface the whole published catalog
                // rather than silently returning no knowledge.
                self.catalog.all_published(site_id, true).await?
            } else {
                hits
            }
        };

        let mut nodes: Vec<KnowledgeNode> =
            products.iter().map(KnowledgeNode::from_product).collect();

        let mut seen_categories = Vec::new();
        for product in &products {
            for category in &product.categories {
                if !seen_categories.contains(category) {
                    seen_categories.push(category.clone());
                }
            }
        }
        nodes.extend(seen_categories.iter().map(|name| KnowledgeNode::from_category(name)));

        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use shopmate_core::{CatalogProduct, KnowledgeNode, ProductId, SearchFilters};
    use shopmate_store::{CatalogStore, InMemoryCatalog, InMemoryTtlCache, StoreError};

    use super::KnowledgeRetriever;

    fn product(id: &str, name: &str, categories: &[&str], in_stock: bool) -> CatalogProduct {
        CatalogProduct {
            id: ProductId(id.to_string()),
            name: name.to_string(),
            description: format!("{name} description"),
            regular_price: rust_decimal::Decimal::new(10_000, 2),
            sale_price: None,
            currency: "USD".to_string(),
            categories: categories.iter().map(|c| (*c).to_string()).collect(),
            rating: 4.0,
            review_count: 10,
            in_stock,
            image_url: None,
            permalink: None,
            published: true,
        }
    }

    /// Counts catalog calls so cache behavior is observable.
    struct CountingCatalog {
        inner: InMemoryCatalog,
        calls: AtomicUsize,
    }

    impl CountingCatalog {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CatalogStore for CountingCatalog {
        async fn search(
            &self,
            site_id: &str,
            query: &str,
            filters: &SearchFilters,
        ) -> Result<Vec<CatalogProduct>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.search(site_id, query, filters).await
        }

        async fn find_by_id(
            &self,
            site_id: &str,
            id: &ProductId,
        ) -> Result<Option<CatalogProduct>, StoreError> {
            self.inner.find_by_id(site_id, id).await
        }

        async fn all_published(
            &self,
            site_id: &str,
            include_out_of_stock: bool,
        ) -> Result<Vec<CatalogProduct>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.all_published(site_id, include_out_of_stock).await
        }

        async fn in_category(
            &self,
            site_id: &str,
            category: &str,
        ) -> Result<Vec<CatalogProduct>, StoreError> {
            self.inner.in_category(site_id, category).await
        }

        async fn count_published(&self, site_id: &str) -> Result<u64, StoreError> {
            self.inner.count_published(site_id).await
        }
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
            Err(StoreError::Unavailable("db gone".to_string()))
        }

        async fn find_by_id(
            &self,
            _: &str,
            _: &ProductId,
        ) -> Result<Option<CatalogProduct>, StoreError> {
            Err(StoreError::Unavailable("db gone".to_string()))
        }

        async fn all_published(
            &self,
            _: &str,
            _: bool,
        ) -> Result<Vec<CatalogProduct>, StoreError> {
            Err(StoreError::Unavailable("db gone".to_string()))
        }

        async fn in_category(&self, _: &str, _: &str) -> Result<Vec<CatalogProduct>, StoreError> {
            Err(StoreError::Unavailable("db gone".to_string()))
        }

        async fn count_published(&self, _: &str) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("db gone".to_string()))
        }
    }

    async fn counting_catalog() -> Arc<CountingCatalog> {
        let inner = InMemoryCatalog::new();
        inner.insert("s1", product("p1", "Aero Laptop", &["laptops"], true)).await;
        inner.insert("s1", product("p2", "Drift Headphones", &["headphones"], false)).await;
        Arc::new(CountingCatalog { inner, calls: AtomicUsize::new(0) })
    }

    #[tokio::test]
    async fn second_identical_query_is_served_from_cache() {
        let catalog = counting_catalog().await;
        let retriever = KnowledgeRetriever::new(
            catalog.clone(),
            Arc::new(InMemoryTtlCache::new()),
            Duration::from_secs(60),
        );

        let first = retriever.retrieve("laptop", "s1").await;
        assert!(!first.is_empty());
        let calls_after_first = catalog.calls();

        let second = retriever.retrieve("laptop", "s1").await;
        assert_eq!(first, second);
        assert_eq!(catalog.calls(), calls_after_first, "cache hit must not touch the catalog");
    }

    #[tokio::test]
    async fn distinct_sites_use_distinct_cache_keys() {
        assert_ne!(
            KnowledgeRetriever::cache_key("s1", "laptop"),
            KnowledgeRetriever::cache_key("s2", "laptop")
        );
        // Case and surrounding whitespace do not fragment the cache.
        assert_eq!(
            KnowledgeRetriever::cache_key("s1", " Laptop "),
            KnowledgeRetriever::cache_key("s1", "laptop")
        );
    }

    #[tokio::test]
    async fn empty_search_falls_back_to_full_catalog() {
        let catalog = counting_catalog().await;
        let retriever = KnowledgeRetriever::new(
            catalog,
            Arc::new(InMemoryTtlCache::new()),
            Duration::from_secs(60),
        );

        let nodes = retriever.retrieve("zzz-unmatched-term", "s1").await;
        let products = nodes.iter().filter(|n| n.product_id().is_some()).count();
        assert_eq!(products, 2, "fallback must surface the full published catalog");
    }

    #[tokio::test]
    async fn show_all_query_includes_out_of_stock() {
        let catalog = counting_catalog().await;
        let retriever = KnowledgeRetriever::new(
            catalog,
            Arc::new(InMemoryTtlCache::new()),
            Duration::from_secs(60),
        );

        let nodes = retriever.retrieve("show me all products", "s1").await;
        let product_nodes: Vec<_> = nodes.iter().filter(|n| n.product_id().is_some()).collect();
        assert_eq!(product_nodes.len(), 2);

        let categories: Vec<_> = nodes
            .iter()
            .filter_map(|n| match n {
                KnowledgeNode::Category { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(categories, vec!["laptops", "headphones"]);
    }

    #[tokio::test]
    async fn catalog_failure_degrades_to_empty_list() {
        let retriever = KnowledgeRetriever::new(
            Arc::new(BrokenCatalog),
            Arc::new(InMemoryTtlCache::new()),
            Duration::from_secs(60),
        );
        assert!(retriever.retrieve("laptop", "s1").await.is_empty());
    }
}
