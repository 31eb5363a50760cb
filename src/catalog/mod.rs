// catalog/mod.rs — product catalog: loading and category filtering.
//
// The catalog is a static, read-only resource shaped `{"products": [...]}`.
// It is loaded once at startup from a filesystem path or an HTTP(S) URL and
// never mutated afterwards; product identity is the numeric `id`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AdvisorError;

/// One purchasable product as authored in the catalog resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub description: String,
    /// Image URL. Display-only — never forwarded to the relay.
    #[serde(default)]
    pub image: String,
}

/// The `{id, name, brand, category, description}` subset sent to the relay
/// as structured product context. The image URL is deliberately excluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: i64,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub description: String,
}

impl From<&Product> for ProductSummary {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            brand: p.brand.clone(),
            category: p.category.clone(),
            description: p.description.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    products: Vec<Product>,
}

/// The loaded product catalog. `Default` is the empty catalog, used as the
/// placeholder when loading fails.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    /// Load the catalog from `source` — an HTTP(S) URL or a filesystem path.
    ///
    /// Fails with [`AdvisorError::CatalogLoad`] on any network, I/O, or parse
    /// error. Callers keep whatever catalog they already had; this function
    /// never returns a partially parsed result.
    pub async fn load(http: &reqwest::Client, source: &str) -> Result<Self, AdvisorError> {
        let raw = if source.starts_with("http://") || source.starts_with("https://") {
            http.get(source)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| AdvisorError::CatalogLoad(format!("{source}: {e}")))?
                .text()
                .await
                .map_err(|e| AdvisorError::CatalogLoad(format!("{source}: {e}")))?
        } else {
            tokio::fs::read_to_string(source)
                .await
                .map_err(|e| AdvisorError::CatalogLoad(format!("{source}: {e}")))?
        };
        let catalog = Self::from_json(&raw)?;
        debug!(source, products = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    /// Parse a catalog from raw JSON text.
    pub fn from_json(raw: &str) -> Result<Self, AdvisorError> {
        let file: CatalogFile =
            serde_json::from_str(raw).map_err(|e| AdvisorError::CatalogLoad(e.to_string()))?;
        Ok(Self {
            products: file.products,
        })
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn get(&self, id: i64) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.get(id).is_some()
    }

    /// Products whose category equals `category` exactly. An unmatched
    /// category yields an empty vec (rendered as an empty state, not an
    /// error).
    pub fn filter_by_category(&self, category: &str) -> Vec<&Product> {
        self.products
            .iter()
            .filter(|p| p.category == category)
            .collect()
    }

    /// Distinct category names in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for p in &self.products {
            if !seen.contains(&p.category.as_str()) {
                seen.push(p.category.as_str());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "products": [
            {"id": 1, "name": "Hydra Serum", "brand": "Lumen", "category": "skincare",
             "description": "Lightweight hydrating serum", "image": "https://img.example/1.png"},
            {"id": 3, "name": "Silk Shampoo", "brand": "Aria", "category": "haircare",
             "description": "Gentle daily shampoo", "image": "https://img.example/3.png"},
            {"id": 7, "name": "Glow Cream", "brand": "Lumen", "category": "skincare",
             "description": "Rich night cream", "image": "https://img.example/7.png"}
        ]
    }"#;

    #[test]
    fn filter_returns_only_matching_category() {
        let catalog = Catalog::from_json(SAMPLE).unwrap();
        let skincare = catalog.filter_by_category("skincare");
        assert_eq!(skincare.len(), 2);
        assert!(skincare.iter().all(|p| p.category == "skincare"));
    }

    #[test]
    fn filter_unmatched_category_is_empty() {
        let catalog = Catalog::from_json(SAMPLE).unwrap();
        assert!(catalog.filter_by_category("fragrance").is_empty());
    }

    #[test]
    fn categories_are_distinct_in_first_seen_order() {
        let catalog = Catalog::from_json(SAMPLE).unwrap();
        assert_eq!(catalog.categories(), vec!["skincare", "haircare"]);
    }

    #[test]
    fn summary_excludes_image() {
        let catalog = Catalog::from_json(SAMPLE).unwrap();
        let summary = ProductSummary::from(catalog.get(1).unwrap());
        let v = serde_json::to_value(&summary).unwrap();
        assert!(v.get("image").is_none());
        assert_eq!(v["name"], "Hydra Serum");
    }

    #[test]
    fn malformed_json_is_a_catalog_load_error() {
        let err = Catalog::from_json("{not json").unwrap_err();
        assert!(matches!(err, AdvisorError::CatalogLoad(_)));
    }
}
