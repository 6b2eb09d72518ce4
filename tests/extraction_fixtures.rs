//! Extraction against captured storefront pages.

use pricewatch::extract::{ExtractionError, ExtractorRegistry, Field};
use pricewatch::platform::{Platform, Region};
use rust_decimal::Decimal;
use std::str::FromStr;

const AMAZON_PRODUCT: &str = include_str!("fixtures/amazon_product.html");
const AMAZON_UNAVAILABLE_DE: &str = include_str!("fixtures/amazon_unavailable_de.html");
const AMAZON_CAPTCHA: &str = include_str!("fixtures/amazon_captcha.html");
const EBAY_ITEM: &str = include_str!("fixtures/ebay_item.html");
const EBAY_JSONLD_ONLY: &str = include_str!("fixtures/ebay_jsonld_only.html");

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[test]
fn test_amazon_product_page() {
    let registry = ExtractorRegistry::new();
    let extracted = registry.extract(Platform::Amazon, Region::Us, AMAZON_PRODUCT).unwrap();

    // Price to pay, not the list price further down.
    assert_eq!(extracted.price, dec("99.99"));
    assert_eq!(extracted.currency, "USD");
    assert!(extracted.available);
    assert_eq!(
        extracted.title.as_deref(),
        Some("Logitech MX Master 3S - Wireless Performance Mouse, Graphite")
    );
    assert_eq!(extracted.checksum.len(), 64);
}

#[test]
fn test_amazon_de_unavailable() {
    let registry = ExtractorRegistry::new();
    let extracted = registry.extract(Platform::Amazon, Region::De, AMAZON_UNAVAILABLE_DE).unwrap();

    assert_eq!(extracted.price, dec("1249.00"));
    assert_eq!(extracted.currency, "EUR");
    assert!(!extracted.available);
}

#[test]
fn test_amazon_captcha_is_blocked() {
    let registry = ExtractorRegistry::new();
    let err = registry.extract(Platform::Amazon, Region::Us, AMAZON_CAPTCHA).unwrap_err();
    assert_eq!(err, ExtractionError::Blocked);
}

#[test]
fn test_ebay_item_page() {
    let registry = ExtractorRegistry::new();
    let extracted = registry.extract(Platform::Ebay, Region::Uk, EBAY_ITEM).unwrap();

    assert_eq!(extracted.price, dec("89.00"));
    assert_eq!(extracted.currency, "GBP");
    assert!(extracted.available);
    assert_eq!(extracted.title.as_deref(), Some("Canon EF 50mm f/1.8 STM Lens"));
}

#[test]
fn test_ebay_jsonld_fallback() {
    let registry = ExtractorRegistry::new();
    let extracted = registry.extract(Platform::Ebay, Region::Us, EBAY_JSONLD_ONLY).unwrap();

    assert_eq!(extracted.price, dec("245.5"));
    assert!(!extracted.available);
    assert_eq!(extracted.title.as_deref(), Some("Vintage Polaroid SX-70"));
}

#[test]
fn test_same_bytes_same_checksum() {
    let registry = ExtractorRegistry::new();
    let a = registry.extract(Platform::Amazon, Region::Us, AMAZON_PRODUCT).unwrap();
    let b = registry.extract(Platform::Amazon, Region::Us, AMAZON_PRODUCT).unwrap();
    assert_eq!(a, b);

    let other = registry.extract(Platform::Ebay, Region::Uk, EBAY_ITEM).unwrap();
    assert_ne!(a.checksum, other.checksum);
}

#[test]
fn test_jsonld_currency_must_match_marketplace() {
    let registry = ExtractorRegistry::new();
    // No Amazon selector matches eBay markup; the JSON-LD offer is used.
    let extracted = registry.extract(Platform::Amazon, Region::Uk, EBAY_ITEM).unwrap();
    assert_eq!(extracted.price, dec("89.00"));

    let err = registry.extract(Platform::Amazon, Region::Us, EBAY_ITEM).unwrap_err();
    assert_eq!(
        err,
        ExtractionError::MalformedValue { field: Field::Currency, value: "GBP".to_string() }
    );
}
