//! TF-IDF text vectorization over a bounded vocabulary.

use crate::config::VectorizerConfig;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

/// Sparse feature vector: `(feature index, weight)` pairs sorted by index.
pub type SparseVector = Vec<(usize, f64)>;

/// Split text into lower-cased word n-grams. Words shorter than two characters are dropped.
pub fn analyze(text: &str, ngram_max: usize) -> Vec<String> {
    let words: Vec<String> = text
        .unicode_words()
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= 2)
        .collect();

    let mut terms = words.clone();
    for n in 2..=ngram_max.max(1) {
        for window in words.windows(n) {
            terms.push(window.join(" "));
        }
    }
    terms
}

#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    cfg: VectorizerConfig,
    vocabulary: HashMap<String, usize>,
    terms: Vec<String>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Learn vocabulary and IDF weights from `texts`.
    ///
    /// The vocabulary keeps the `max_features` terms with the highest corpus
    /// frequency (ties broken by term order; `0` means unbounded), restricted to
    /// terms occurring in at least `min_df` documents. Feature indices follow
    /// lexical term order. IDF is smoothed: `ln((1 + n) / (1 + df)) + 1`.
    pub fn fit<S: AsRef<str>>(cfg: &VectorizerConfig, texts: &[S]) -> Self {
        let n_docs = texts.len();
        let mut term_freq: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for text in texts {
            let terms = analyze(text.as_ref(), cfg.ngram_max);
            let mut seen = HashSet::new();
            for term in terms {
                *term_freq.entry(term.clone()).or_insert(0) += 1;
                if seen.insert(term.clone()) {
                    *doc_freq.entry(term).or_insert(0) += 1;
                }
            }
        }

        let mut candidates: Vec<(String, usize)> = term_freq
            .into_iter()
            .filter(|(t, _)| doc_freq.get(t).copied().unwrap_or(0) >= cfg.min_df)
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if cfg.max_features > 0 {
            candidates.truncate(cfg.max_features);
        }

        let mut terms: Vec<String> = candidates.into_iter().map(|(t, _)| t).collect();
        terms.sort();

        let vocabulary: HashMap<String, usize> = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        let idf = terms
            .iter()
            .map(|t| {
                let df = doc_freq.get(t).copied().unwrap_or(0) as f64;
                ((1.0 + n_docs as f64) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        debug!(docs = n_docs, vocabulary = terms.len(), "fitted tf-idf vocabulary");
        Self {
            cfg: cfg.clone(),
            vocabulary,
            terms,
            idf,
        }
    }

    /// L2-normalised TF-IDF vector. Out-of-vocabulary terms are ignored.
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for term in analyze(text, self.cfg.ngram_max) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0) += 1;
            }
        }

        let mut row: SparseVector = counts
            .into_iter()
            .map(|(idx, count)| {
                let tf = if self.cfg.sublinear_tf {
                    1.0 + (count as f64).ln()
                } else {
                    count as f64
                };
                (idx, tf * self.idf[idx])
            })
            .collect();

        let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in row.iter_mut() {
                *w /= norm;
            }
        }
        row
    }

    pub fn transform_all<S: AsRef<str>>(&self, texts: &[S]) -> Vec<SparseVector> {
        texts.iter().map(|t| self.transform(t.as_ref())).collect()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.terms.len()
    }

    pub fn term(&self, index: usize) -> Option<&str> {
        self.terms.get(index).map(String::as_str)
    }

    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    pub fn idf(&self, index: usize) -> Option<f64> {
        self.idf.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> VectorizerConfig {
        VectorizerConfig::default()
    }

    #[test]
    fn analyze_lowercases_and_drops_short_words() {
        assert_eq!(
            analyze("A Cat, IS a mammal!", 1),
            vec!["cat", "is", "mammal"]
        );
    }

    #[test]
    fn analyze_adds_bigrams() {
        assert_eq!(
            analyze("cats are mammals", 2),
            vec!["cats", "are", "mammals", "cats are", "are mammals"]
        );
    }

    #[test]
    fn vocabulary_is_bounded_by_frequency() {
        let texts = ["apple apple apple pear", "apple pear plum", "kiwi"];
        let v = TfidfVectorizer::fit(
            &VectorizerConfig {
                max_features: 2,
                ..cfg()
            },
            &texts,
        );
        assert_eq!(v.vocabulary_size(), 2);
        assert!(v.index_of("apple").is_some());
        assert!(v.index_of("pear").is_some());
        assert!(v.index_of("kiwi").is_none());
    }

    #[test]
    fn min_df_filters_rare_terms() {
        let texts = ["apple pear", "apple plum"];
        let v = TfidfVectorizer::fit(
            &VectorizerConfig {
                min_df: 2,
                ..cfg()
            },
            &texts,
        );
        assert_eq!(v.vocabulary_size(), 1);
        assert_eq!(v.term(0), Some("apple"));
    }

    #[test]
    fn smoothed_idf_matches_formula() {
        let texts = ["apple pear", "apple"];
        let v = TfidfVectorizer::fit(&cfg(), &texts);
        let apple = v.index_of("apple").unwrap();
        let pear = v.index_of("pear").unwrap();
        assert!((v.idf(apple).unwrap() - 1.0).abs() < 1e-12);
        assert!((v.idf(pear).unwrap() - ((3.0f64 / 2.0).ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn rows_are_unit_length_and_ignore_unknown_terms() {
        let texts = ["apple pear", "plum"];
        let v = TfidfVectorizer::fit(&cfg(), &texts);
        let row = v.transform("apple pear banana");
        assert_eq!(row.len(), 2);
        let norm: f64 = row.iter().map(|(_, w)| w * w).sum();
        assert!((norm - 1.0).abs() < 1e-12);
        assert!(v.transform("banana cherry").is_empty());
    }

    #[test]
    fn sublinear_tf_dampens_repeats() {
        let texts = ["apple pear", "pear"];
        let linear = TfidfVectorizer::fit(&cfg(), &texts);
        let sub = TfidfVectorizer::fit(
            &VectorizerConfig {
                sublinear_tf: true,
                ..cfg()
            },
            &texts,
        );
        let apple = linear.index_of("apple").unwrap();
        let weight = |row: &SparseVector| row.iter().find(|(i, _)| *i == apple).unwrap().1;
        let text = "apple apple apple apple pear";
        assert!(weight(&sub.transform(text)) < weight(&linear.transform(text)));
    }
}
