//! schema.org `Product`/`Offer` data embedded as JSON-LD.
//!
//! Used as a fallback when no CSS selector finds a price, and as the primary
//! path when a storefront answers with a JSON document instead of HTML.

use serde_json::Value;

/// Offer fields pulled out of a schema.org product node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Offer {
    /// Raw price as written (number or string).
    pub price: Option<String>,
    pub currency: Option<String>,
    /// `Some(false)` for OutOfStock/SoldOut/Discontinued.
    pub available: Option<bool>,
    pub name: Option<String>,
}

/// Finds the first product offer in any of the given JSON documents.
///
/// Documents that fail to parse are skipped.
pub fn find_offer<'a>(documents: impl IntoIterator<Item = &'a str>) -> Option<Offer> {
    documents
        .into_iter()
        .filter_map(|doc| serde_json::from_str::<Value>(doc.trim()).ok())
        .find_map(|value| offer_in(&value))
}

fn offer_in(value: &Value) -> Option<Offer> {
    match value {
        Value::Array(items) => items.iter().find_map(offer_in),
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                if let Some(offer) = offer_in(graph) {
                    return Some(offer);
                }
            }
            if !is_product(value) {
                return None;
            }
            let offers = map.get("offers")?;
            let node = match offers {
                Value::Array(list) => list.first()?,
                other => other,
            };

            let price = node
                .get("price")
                .or_else(|| node.get("lowPrice"))
                .and_then(scalar_to_string);

            Some(Offer {
                price,
                currency: node.get("priceCurrency").and_then(Value::as_str).map(String::from),
                available: node.get("availability").and_then(Value::as_str).map(is_in_stock),
                name: map.get("name").and_then(Value::as_str).map(|s| s.trim().to_string()),
            })
        }
        _ => None,
    }
}

fn is_product(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t == "Product",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("Product")),
        _ => false,
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_in_stock(availability: &str) -> bool {
    let lower = availability.to_lowercase();
    !(lower.contains("outofstock") || lower.contains("soldout") || lower.contains("discontinued"))
}
