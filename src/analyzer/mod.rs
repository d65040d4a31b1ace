// Analyzer module: similarity scoring against the intent catalog plus ranking.

pub mod ranking;
pub mod similarity;

use crate::catalog::IntentCatalog;
use crate::model::{AnalysisError, RawItem, ReportStats, ScoredPost, SimilarityRow};

/// Trait defining the interface for a post analyzer.
pub trait Analyzer {
    fn score(&self, items: &[RawItem], catalog: &IntentCatalog) -> Result<Vec<SimilarityRow>, AnalysisError>;
    fn rank(&self, rows: &[SimilarityRow], items: &[RawItem]) -> Vec<ScoredPost>;
    fn select_for_engagement<'a>(
        &self,
        ranked: &'a [ScoredPost],
        threshold: f64,
        cap: usize,
    ) -> Vec<&'a ScoredPost>;
    fn calculate_stats(&self, query: &str, ranked: &[ScoredPost]) -> ReportStats;
}

/// TF-IDF / cosine implementation of the analyzer.
pub struct AnalyzerImpl;

impl AnalyzerImpl {
    pub fn new() -> Self {
        Self
    }
}

impl Analyzer for AnalyzerImpl {
    fn score(&self, items: &[RawItem], catalog: &IntentCatalog) -> Result<Vec<SimilarityRow>, AnalysisError> {
        similarity::score(items, catalog)
    }

    fn rank(&self, rows: &[SimilarityRow], items: &[RawItem]) -> Vec<ScoredPost> {
        ranking::rank(rows, items)
    }

    fn select_for_engagement<'a>(
        &self,
        ranked: &'a [ScoredPost],
        threshold: f64,
        cap: usize,
    ) -> Vec<&'a ScoredPost> {
        ranking::select_for_engagement(ranked, threshold, cap)
    }

    fn calculate_stats(&self, query: &str, ranked: &[ScoredPost]) -> ReportStats {
        ranking::calculate_stats(query, ranked)
    }
}
