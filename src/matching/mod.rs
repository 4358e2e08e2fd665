pub mod deal_classifier;
pub mod normalizer;
pub mod product_matcher;

pub use deal_classifier::{check_product, parse_price, DealClassification, DealClassifier, MatchResult};
pub use normalizer::normalize;
pub use product_matcher::{
    edit_distance, find_best_match, find_close_matches, similarity_ratio, Product, ProductMatcher,
};
