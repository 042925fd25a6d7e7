//! Report rendering for the command line: JSON shaping and plain-text views.

use fallacy_core::analysis::{LengthStats, SanityReport};
use fallacy_core::models::{ClassificationReport, RetrievalReport};
use fallacy_core::pipeline::{EvaluatedOn, TrainingSummary};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub sanity: SanityReport,
    pub length_stats: BTreeMap<String, LengthStats>,
}

/// Keep only the named keys (case-insensitive) in each result object.
pub fn filter_fields(
    mut results: Vec<serde_json::Value>,
    fields: &[String],
) -> Vec<serde_json::Value> {
    if fields.is_empty() {
        return results;
    }
    let want: HashSet<String> = fields.iter().map(|s| s.to_lowercase()).collect();
    for r in results.iter_mut() {
        if let Some(obj) = r.as_object_mut() {
            obj.retain(|k, _| want.contains(&k.to_lowercase()));
        }
    }
    results
}

/// Search output: the query, the embedding model that ranked it and the
/// (optionally filtered) hits.
pub fn retrieval_json(
    report: &RetrievalReport,
    model: &str,
    fields: &[String],
) -> serde_json::Result<serde_json::Value> {
    let results = report
        .results
        .iter()
        .map(serde_json::to_value)
        .collect::<serde_json::Result<Vec<_>>>()?;
    Ok(serde_json::json!({
        "query": report.query,
        "model": model,
        "results": filter_fields(results, fields),
    }))
}

pub fn render_retrieval(report: &RetrievalReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "query: {}", report.query);
    if report.results.is_empty() {
        let _ = writeln!(out, "  (no results)");
    }
    for (rank, hit) in report.results.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}. {:.4}  [{}] {}",
            rank + 1,
            hit.score,
            hit.label,
            hit.text
        );
    }
    out
}

pub fn render_classification(report: &ClassificationReport) -> String {
    let mut out = String::new();
    for p in &report.predictions {
        let _ = writeln!(out, "{} ({:.3})  {}", p.predicted_label, p.confidence, p.text);
    }
    out
}

pub fn render_training(summary: &TrainingSummary, top_terms: &[(String, Vec<String>)]) -> String {
    let mut out = String::new();
    let fit = &summary.fit;
    let eval = &summary.evaluation;
    let _ = writeln!(
        out,
        "fitted on {} records, {} labels, vocabulary {} ({} iterations, loss {:.4})",
        fit.records,
        fit.labels.len(),
        fit.vocabulary_size,
        fit.iterations,
        fit.final_loss
    );
    let on = match summary.evaluated_on {
        EvaluatedOn::Holdout => "holdout",
        EvaluatedOn::Training => "training data",
    };
    let _ = writeln!(
        out,
        "accuracy on {}: {:.3} ({}/{})",
        on, eval.accuracy, eval.correct, eval.total
    );
    let width = eval.per_label.keys().map(String::len).max().unwrap_or(5).max(5);
    let _ = writeln!(
        out,
        "{:<width$}  precision  recall     f1  support",
        "label",
        width = width
    );
    for (label, m) in &eval.per_label {
        let _ = writeln!(
            out,
            "{:<width$}  {:>9.3}  {:>6.3}  {:>5.3}  {:>7}",
            label,
            m.precision,
            m.recall,
            m.f1,
            m.support,
            width = width
        );
    }
    for (label, terms) in top_terms {
        let _ = writeln!(out, "top terms for {}: {}", label, terms.join(", "));
    }
    out
}

pub fn render_inspect(report: &InspectReport) -> String {
    let mut out = String::new();
    let s = &report.sanity;
    let _ = writeln!(
        out,
        "{} examples (text key `{}`, label key `{}`)",
        s.num_examples, s.text_key, s.label_key
    );
    let _ = writeln!(
        out,
        "missing text: {}, empty text: {}, missing label: {}",
        s.missing_text_key, s.empty_text, s.missing_label_key
    );
    for (label, count) in &s.label_counts {
        match report.length_stats.get(label) {
            Some(st) => {
                let _ = writeln!(
                    out,
                    "  {}: {} examples, tokens mean {:.1} min {} max {}",
                    label, count, st.mean, st.min, st.max
                );
            }
            None => {
                let _ = writeln!(out, "  {}: {} examples", label, count);
            }
        }
    }
    out
}
