use shopmate_store::demo_catalog;

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let products = demo_catalog();
    let lines: Vec<String> = products
        .iter()
        .map(|product| {
            let stock = if product.in_stock { "in stock" } else { "out of stock" };
            format!(
                "  - {}: {} — {} {} ({}, rating {:.1}, {stock})",
                product.id.0,
                product.name,
                product.display_price(),
                product.currency,
                product.categories.join("/"),
                product.rating,
            )
        })
        .collect();

    CommandResult::success(
        "seed",
        format!("demo catalog ({} products):\n{}", products.len(), lines.join("\n")),
    )
}
