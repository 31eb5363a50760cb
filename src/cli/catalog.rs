// SPDX-License-Identifier: MIT
// cli/catalog.rs — read-only catalog inspection from the terminal.

use anyhow::Result;

use crate::catalog::Catalog;
use crate::config::GlowdConfig;

/// `glowd catalog categories` — print the distinct categories.
pub async fn run_categories(config: &GlowdConfig) -> Result<()> {
    let catalog = load(config).await?;
    for category in catalog.categories() {
        println!("{category}");
    }
    Ok(())
}

/// `glowd catalog list [--category <c>]` — print products, optionally
/// filtered. An unmatched category prints an empty-state line, not an error.
pub async fn run_list(config: &GlowdConfig, category: Option<&str>) -> Result<()> {
    let catalog = load(config).await?;
    let products: Vec<_> = match category {
        Some(c) => catalog.filter_by_category(c),
        None => catalog.products().iter().collect(),
    };

    if products.is_empty() {
        println!("(no products{})", match category {
            Some(c) => format!(" in category '{c}'"),
            None => String::new(),
        });
        return Ok(());
    }

    for p in products {
        println!("[{id}] {name} — {brand} ({category})", id = p.id, name = p.name, brand = p.brand, category = p.category);
    }
    Ok(())
}

async fn load(config: &GlowdConfig) -> Result<Catalog> {
    let http = reqwest::Client::new();
    Ok(Catalog::load(&http, &config.catalog_source).await?)
}
