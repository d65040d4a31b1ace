use crate::model::{RawItem, ReportStats, ScoredPost, SimilarityRow};
use chrono::Utc;
use std::cmp::Ordering;

/// Pairs rows with their items and sorts by mean score, highest first.
/// The sort is stable, so equal means keep discovery order.
pub fn rank(rows: &[SimilarityRow], items: &[RawItem]) -> Vec<ScoredPost> {
    let mut ranked: Vec<ScoredPost> = rows
        .iter()
        .filter_map(|row| {
            items.get(row.item_index).map(|item| ScoredPost {
                item: item.clone(),
                row: row.clone(),
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.row
            .mean_score
            .partial_cmp(&a.row.mean_score)
            .unwrap_or(Ordering::Equal)
    });
    ranked
}

/// Posts whose best score is strictly above `threshold`, in ranked order, at most `cap`.
pub fn select_for_engagement(ranked: &[ScoredPost], threshold: f64, cap: usize) -> Vec<&ScoredPost> {
    ranked
        .iter()
        .filter(|post| post.row.best_score > threshold)
        .take(cap)
        .collect()
}

/// Summary of one ranked report. The top label is the most frequent best
/// label, earliest-ranked label on equal counts.
pub fn calculate_stats(query: &str, ranked: &[ScoredPost]) -> ReportStats {
    let post_count = ranked.len();
    let mean_best_score = if post_count == 0 {
        0.0
    } else {
        ranked.iter().map(|p| p.row.best_score).sum::<f64>() / post_count as f64
    };

    let mut counts: Vec<(&str, usize)> = Vec::new();
    for post in ranked {
        match counts.iter_mut().find(|(label, _)| *label == post.row.best_label) {
            Some((_, n)) => *n += 1,
            None => counts.push((post.row.best_label.as_str(), 1)),
        }
    }
    let mut top: Option<(&str, usize)> = None;
    for (label, n) in counts {
        if top.is_none_or(|(_, best)| n > best) {
            top = Some((label, n));
        }
    }

    ReportStats {
        query: query.to_string(),
        post_count,
        mean_best_score,
        top_label: top.map(|(label, _)| label.to_string()),
        last_updated: Utc::now(),
    }
}
