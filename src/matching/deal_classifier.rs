use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::product_matcher::{Product, ProductMatcher};

/// Width of the band above `max_price` that still counts as a near-good deal.
pub const NEAR_DEAL_MARGIN: f64 = 100.0;

static PRICE_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+").expect("price pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DealClassification {
    pub is_good_deal: bool,
    pub near_good_deal: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchResult {
    pub product_name: Option<String>,
    pub is_good_deal: bool,
    pub near_good_deal: bool,
    pub preferred: bool,
}

impl MatchResult {
    pub fn unmatched() -> Self {
        Self::default()
    }
}

/// First run of decimal digits in the raw price text. `"$1,200"` parses as
/// `1`; text without digits yields `None`.
pub fn parse_price(price_text: &str) -> Option<f64> {
    PRICE_DIGITS
        .find(price_text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

pub struct DealClassifier;

impl DealClassifier {
    /// Only `max_price` gates the decision; `min_price` is not consulted.
    pub fn classify(price_text: &str, product: &Product) -> DealClassification {
        let Some(price) = parse_price(price_text) else {
            return DealClassification::default();
        };

        let is_good_deal = price < product.max_price;
        let near_good_deal = !is_good_deal
            && price >= product.max_price
            && price <= product.max_price + NEAR_DEAL_MARGIN;

        DealClassification {
            is_good_deal,
            near_good_deal,
        }
    }
}

/// Match a listing against the catalog and classify its price.
pub fn check_product(title: &str, price_text: &str, products: &[Product]) -> MatchResult {
    check_with_matcher(title, price_text, &ProductMatcher::new(products))
}

pub(crate) fn check_with_matcher(
    title: &str,
    price_text: &str,
    matcher: &ProductMatcher<'_>,
) -> MatchResult {
    let Some(product) = matcher.find_best_match(title) else {
        return MatchResult::unmatched();
    };

    let deal = DealClassifier::classify(price_text, product);

    MatchResult {
        product_name: Some(product.name.clone()),
        is_good_deal: deal.is_good_deal,
        near_good_deal: deal.near_good_deal,
        preferred: product.preferred,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Product {
        Product::new("iPhone 11 Pro Max", 100.0, 300.0, true)
    }

    #[test]
    fn test_parse_price_takes_first_digit_run() {
        assert_eq!(parse_price("$150"), Some(150.0));
        assert_eq!(parse_price("150 EUR"), Some(150.0));
        assert_eq!(parse_price("A$1,200"), Some(1.0));
        assert_eq!(parse_price("Free"), None);
        assert_eq!(parse_price(""), None);
        assert_eq!(
            parse_price("$99999999999999999999999"),
            Some(99999999999999999999999.0)
        );
    }

    #[test]
    fn test_deal_boundaries() {
        let p = product();

        let c = DealClassifier::classify("$299", &p);
        assert!(c.is_good_deal && !c.near_good_deal);

        let c = DealClassifier::classify("$300", &p);
        assert!(!c.is_good_deal && c.near_good_deal);

        let c = DealClassifier::classify("$400", &p);
        assert!(!c.is_good_deal && c.near_good_deal);

        let c = DealClassifier::classify("$401", &p);
        assert!(!c.is_good_deal && !c.near_good_deal);
    }

    #[test]
    fn test_huge_price_is_no_deal() {
        let c = DealClassifier::classify("$99999999999999999999999", &product());
        assert_eq!(c, DealClassification::default());
    }

    #[test]
    fn test_unparseable_price_is_no_deal() {
        let c = DealClassifier::classify("Contact seller", &product());
        assert_eq!(c, DealClassification::default());
    }

    #[test]
    fn test_min_price_does_not_gate() {
        let c = DealClassifier::classify("$5", &product());
        assert!(c.is_good_deal);
    }

    #[test]
    fn test_check_product_carries_preferred_and_name() {
        let products = vec![
            Product::new("iPhone 11", 100.0, 200.0, false),
            product(),
        ];
        let result = check_product("iPhone 11 Pro Max 64GB", "$250", &products);
        assert_eq!(result.product_name.as_deref(), Some("iPhone 11 Pro Max"));
        assert!(result.is_good_deal);
        assert!(result.preferred);
    }

    #[test]
    fn test_check_product_unmatched() {
        assert_eq!(check_product("Nintendo Switch", "$100", &[product()]), MatchResult::unmatched());
        assert_eq!(check_product("iPhone 11 Pro Max", "$100", &[]), MatchResult::unmatched());
    }
}
