use serde::{Deserialize, Serialize};

use super::normalizer::normalize;

/// Minimum similarity ratio for a fuzzy match to count.
pub const FUZZY_MATCH_CUTOFF: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(alias = "minPrice", default)]
    pub min_price: f64,
    #[serde(alias = "maxPrice")]
    pub max_price: f64,
    #[serde(default)]
    pub preferred: bool,
}

impl Product {
    pub fn new(name: impl Into<String>, min_price: f64, max_price: f64, preferred: bool) -> Self {
        Self {
            name: name.into(),
            min_price,
            max_price,
            preferred,
        }
    }
}

/// Matches listing titles against a product catalog.
///
/// Normalized product names are computed once per catalog. Exact containment
/// is tried first; only when no product name is a substring of the title does
/// the edit-distance fallback run. In both phases the longest normalized name
/// wins, and the earlier catalog entry wins a tie.
pub struct ProductMatcher<'a> {
    products: &'a [Product],
    normalized_names: Vec<String>,
}

impl<'a> ProductMatcher<'a> {
    pub fn new(products: &'a [Product]) -> Self {
        let normalized_names = products.iter().map(|p| normalize(&p.name)).collect();
        Self {
            products,
            normalized_names,
        }
    }

    pub fn find_best_match(&self, title: &str) -> Option<&'a Product> {
        let normalized_title = normalize(title);

        let exact = self.longest_where(|name| normalized_title.contains(name));
        if exact.is_some() {
            return exact;
        }

        self.longest_where(|name| similarity_ratio(&normalized_title, name) >= FUZZY_MATCH_CUTOFF)
    }

    fn longest_where<F>(&self, mut accept: F) -> Option<&'a Product>
    where
        F: FnMut(&str) -> bool,
    {
        let mut best: Option<(usize, usize)> = None;

        for (idx, name) in self.normalized_names.iter().enumerate() {
            if !accept(name) {
                continue;
            }
            match best {
                Some((_, best_len)) if name.len() <= best_len => {}
                _ => best = Some((idx, name.len())),
            }
        }

        best.map(|(idx, _)| &self.products[idx])
    }
}

pub fn find_best_match<'a>(title: &str, products: &'a [Product]) -> Option<&'a Product> {
    ProductMatcher::new(products).find_best_match(title)
}

/// Levenshtein distance over characters.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// `(max_len - distance) / max_len`, in `[0, 1]`; two empty strings are identical.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = edit_distance(a, b);
    (max_len - distance) as f64 / max_len as f64
}

/// Up to `n` candidates whose similarity to `word` is at least `cutoff`,
/// most similar first. Equal scores keep their input order.
pub fn find_close_matches<'a>(
    word: &str,
    candidates: &[&'a str],
    n: usize,
    cutoff: f64,
) -> Vec<&'a str> {
    let mut scored: Vec<(f64, &'a str)> = candidates
        .iter()
        .map(|c| (similarity_ratio(word, c), *c))
        .filter(|(score, _)| *score >= cutoff)
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(n).map(|(_, c)| c).collect()
}
