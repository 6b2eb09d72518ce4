//! CSS selectors for reading product pages.
//!
//! Storefronts change their markup often. Each list below is ordered by
//! preference: the first selector that matches anything wins, regardless of
//! where its match sits in the document.
//!
//! **Update process**: when extraction starts failing with a missing field,
//! capture the page, add the new selector at the front of the list and add a
//! fixture under `tests/fixtures/`.

use scraper::Selector;
use std::sync::LazyLock;

fn compile(list: &[&str]) -> Vec<Selector> {
    list.iter().map(|s| Selector::parse(s).unwrap()).collect()
}

/// Amazon product detail pages (`/dp/<ASIN>`).
pub mod amazon {
    use super::*;

    /// Current price, most specific first.
    pub static PRICE: LazyLock<Vec<Selector>> = LazyLock::new(|| {
        compile(&[
            "#corePrice_feature_div .a-price .a-offscreen",
            "#corePriceDisplay_desktop_feature_div .a-price .a-offscreen",
            "#priceblock_ourprice",
            "#priceblock_dealprice",
            ".a-price .a-offscreen",
            ".a-size-medium.a-color-price",
        ])
    });

    pub static TITLE: LazyLock<Vec<Selector>> =
        LazyLock::new(|| compile(&["#productTitle", "#title span"]));

    pub static AVAILABILITY: LazyLock<Vec<Selector>> =
        LazyLock::new(|| compile(&["#availability span", "#availability", "#outOfStock span"]));
}

/// eBay item pages (`/itm/<id>`).
pub mod ebay {
    use super::*;

    pub static PRICE: LazyLock<Vec<Selector>> = LazyLock::new(|| {
        compile(&[
            ".x-price-primary span.ux-textspans",
            "div.x-price-primary",
            "#prcIsum",
            "span[itemprop='price']",
            "span.notranslate",
        ])
    });

    pub static TITLE: LazyLock<Vec<Selector>> = LazyLock::new(|| {
        compile(&[
            "h1.x-item-title__mainTitle span",
            "h1.x-item-title__mainTitle",
            "#itemTitle",
            "h1",
        ])
    });

    pub static AVAILABILITY: LazyLock<Vec<Selector>> = LazyLock::new(|| {
        compile(&[".d-quantity__availability", ".x-quantity__availability", "#qtySubTxt"])
    });
}

/// Markup shared by every platform.
pub mod common {
    use super::*;

    /// Embedded schema.org product data.
    pub static JSON_LD: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("script[type='application/ld+json']").unwrap());

    /// CAPTCHA challenge served instead of the page.
    pub static CAPTCHA: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse("form[action*='validateCaptcha'], img[src*='captcha']").unwrap()
    });

    /// Amazon's "dogs" 503 error page.
    pub static DOG_PAGE: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse("a[href='/ref=cs_503_link'], img[alt^='Sorry! Something went wrong']")
            .unwrap()
    });
}
