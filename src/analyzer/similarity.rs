//! TF-IDF vectorization and cosine scoring of posts against the intent catalog.
//!
//! Posts and catalog sentences share one vector space fitted on their union,
//! so document frequencies reflect the whole comparison set.

use crate::catalog::IntentCatalog;
use crate::model::{AnalysisError, RawItem, SimilarityRow};
use crate::normalizer::normalize_text;
use std::collections::{HashMap, HashSet};

/// Score of any pairing that involves a document with no usable terms.
pub const NEUTRAL_SCORE: f64 = 0.0;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "it", "in", "on", "of", "to", "and", "or", "for", "with", "this",
    "that", "be", "are", "was", "were", "been", "being", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "can", "shall", "not", "no",
    "but", "if", "at", "by", "from", "as", "into", "about", "up", "out", "so", "its", "you",
    "your", "i", "my", "me", "we", "our", "us", "they", "them", "their", "he", "she", "his",
    "her", "what", "which", "who", "how", "just", "s", "t", "m", "re", "ve", "ll", "d",
];

/// A prepared document. Text that normalizes to nothing becomes a placeholder,
/// which counts towards the document total but carries no weighted terms.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Terms(Vec<String>),
    Placeholder,
}

impl Document {
    pub fn prepare(text: &str) -> Self {
        let terms: Vec<String> = normalize_text(text)
            .split_whitespace()
            .filter(|w| !STOP_WORDS.contains(w))
            .map(str::to_string)
            .collect();
        if terms.is_empty() {
            Document::Placeholder
        } else {
            Document::Terms(terms)
        }
    }

    fn terms(&self) -> &[String] {
        match self {
            Document::Terms(terms) => terms,
            Document::Placeholder => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct TfIdfVectorizer {
    /// term -> dimension, assigned in first-seen order
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfIdfVectorizer {
    /// Smoothed IDF: `ln((1 + n) / (1 + df)) + 1`.
    pub fn fit(documents: &[Document]) -> Self {
        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: Vec<usize> = Vec::new();

        for doc in documents {
            // token order, so dimension numbering is stable
            for term in doc.terms() {
                if !vocabulary.contains_key(term) {
                    vocabulary.insert(term.clone(), doc_freq.len());
                    doc_freq.push(0);
                }
            }
            let unique: HashSet<&str> = doc.terms().iter().map(String::as_str).collect();
            for term in unique {
                doc_freq[vocabulary[term]] += 1;
            }
        }

        let n = documents.len() as f64;
        let idf = doc_freq
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        Self { vocabulary, idf }
    }

    pub fn dimensions(&self) -> usize {
        self.idf.len()
    }

    /// L2-normalized TF-IDF vector; placeholders map to the zero vector.
    pub fn transform(&self, document: &Document) -> Vec<f64> {
        let mut vector = vec![0.0; self.dimensions()];
        for term in document.terms() {
            if let Some(&idx) = self.vocabulary.get(term) {
                vector[idx] += self.idf[idx];
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            for x in vector.iter_mut() {
                *x /= norm;
            }
        }
        vector
    }
}

/// Cosine similarity, `0.0` when either vector has zero norm.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    dot / denom
}

/// Scores every item against every catalog entry.
///
/// Rows follow item order. `best_label` is taken from the first column holding
/// the maximum, so the lowest catalog index wins ties.
pub fn score(items: &[RawItem], catalog: &IntentCatalog) -> Result<Vec<SimilarityRow>, AnalysisError> {
    if items.is_empty() || catalog.is_empty() {
        return Err(AnalysisError::DimensionMismatch {
            items: items.len(),
            entries: catalog.len(),
        });
    }

    let item_docs: Vec<Document> = items.iter().map(|i| Document::prepare(&i.text)).collect();
    let entry_docs: Vec<Document> = catalog
        .entries()
        .iter()
        .map(|e| Document::prepare(&e.reference_text))
        .collect();

    let joint: Vec<Document> = item_docs.iter().chain(entry_docs.iter()).cloned().collect();
    let vectorizer = TfIdfVectorizer::fit(&joint);

    let entry_vectors: Vec<Vec<f64>> = entry_docs.iter().map(|d| vectorizer.transform(d)).collect();

    let rows = item_docs
        .iter()
        .enumerate()
        .map(|(item_index, doc)| {
            let vector = vectorizer.transform(doc);
            let scores: Vec<f64> = entry_vectors
                .iter()
                .map(|ev| {
                    if matches!(doc, Document::Placeholder) {
                        NEUTRAL_SCORE
                    } else {
                        cosine_similarity(&vector, ev).clamp(0.0, 1.0)
                    }
                })
                .collect();
            build_row(item_index, scores, catalog)
        })
        .collect();

    Ok(rows)
}

fn build_row(item_index: usize, scores: Vec<f64>, catalog: &IntentCatalog) -> SimilarityRow {
    let mut best_index = 0;
    let mut best_score = scores[0];
    for (idx, &s) in scores.iter().enumerate().skip(1) {
        if s > best_score {
            best_index = idx;
            best_score = s;
        }
    }
    let mean_score = scores.iter().sum::<f64>() / scores.len() as f64;

    SimilarityRow {
        item_index,
        best_index,
        best_label: catalog.label(best_index).unwrap_or_default().to_string(),
        best_score,
        mean_score,
        per_catalog_scores: scores,
    }
}
