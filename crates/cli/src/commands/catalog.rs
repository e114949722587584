//! Catalog listing commands.

use bynona_client::BynonaClient;
use bynona_client::api::{Product, ProductFilter, SearchResultPage};
use bynona_core::{BrandId, CategoryId};

use super::CommandError;

/// # Errors
///
/// Returns an error if the request fails.
#[allow(clippy::print_stdout)]
pub async fn brands(client: &BynonaClient) -> Result<(), CommandError> {
    for brand in client.brands().await?.iter() {
        println!("{:>6}  {}", brand.id, brand.name);
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the request fails.
#[allow(clippy::print_stdout)]
pub async fn categories(client: &BynonaClient) -> Result<(), CommandError> {
    for category in client.categories().await?.iter() {
        println!("{:>6}  {}", category.id, category.name);
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the request fails.
pub async fn products(
    client: &BynonaClient,
    sort: Option<String>,
    page: Option<u32>,
    brand: Option<BrandId>,
    category: Option<CategoryId>,
) -> Result<(), CommandError> {
    let filter = ProductFilter {
        sort,
        page,
        brand,
        category,
    };
    print_products(&client.filter_products(&filter).await?);
    Ok(())
}

/// # Errors
///
/// Returns an error if the request fails.
pub async fn offers(client: &BynonaClient) -> Result<(), CommandError> {
    print_products(&client.offers().await?);
    Ok(())
}

/// # Errors
///
/// Returns an error if the request fails.
pub async fn search(client: &BynonaClient, text: &str, page: u32) -> Result<(), CommandError> {
    print_page(&client.search(text, page).await?);
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn print_page(page: &SearchResultPage) {
    print_products(&page.items);
    if page.is_paginated() {
        println!("-- page {} of {} --", page.page, page.last_page);
    }
}

#[allow(clippy::print_stdout)]
pub fn print_products(products: &[Product]) {
    if products.is_empty() {
        println!("No products found");
        return;
    }
    for product in products {
        println!("{}", product_line(product));
    }
}

fn product_line(product: &Product) -> String {
    let price = if product.has_offer() {
        format!(
            "{} (was {}, -{})",
            product.final_price(),
            product.base_price(),
            product.discount_percent()
        )
    } else {
        product.final_price().to_string()
    };
    format!("{:>6}  {:<40}  {price}", product.id, product.name)
}
