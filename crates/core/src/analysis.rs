//! Dataset inspection: schema inference, label counts, length stats, sanity report.

use crate::error::{PipelineError, Result};
use crate::loader::Example;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const TEXT_CANDIDATES: &[&str] = &["text", "sentence", "claim", "content", "premise"];
const LABEL_CANDIDATES: &[&str] = &["label", "fallacy", "class", "gold", "y"];

/// Label bucket used when an example has no label field.
pub const MISSING_LABEL: &str = "<missing>";

/// Which JSON keys hold the text and the label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub text_key: String,
    pub label_key: String,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            text_key: "text".to_string(),
            label_key: "label".to_string(),
        }
    }
}

impl Schema {
    /// Infer keys from the first non-empty example. Explicit keys always win.
    pub fn infer(
        examples: &[Example],
        text_key: Option<&str>,
        label_key: Option<&str>,
    ) -> Result<Schema> {
        if let (Some(t), Some(l)) = (text_key, label_key) {
            return Ok(Schema {
                text_key: t.to_string(),
                label_key: l.to_string(),
            });
        }

        let first = examples
            .iter()
            .find(|ex| !ex.fields.is_empty())
            .ok_or_else(|| PipelineError::Schema("no usable examples to infer schema from".into()))?;

        let pick = |candidates: &[&str]| {
            candidates
                .iter()
                .find(|k| first.fields.contains_key(**k))
                .map(|k| k.to_string())
        };

        let text_key = match text_key {
            Some(t) => t.to_string(),
            None => pick(TEXT_CANDIDATES).ok_or_else(|| {
                PipelineError::Schema(format!(
                    "could not infer text key, tried {:?}",
                    TEXT_CANDIDATES
                ))
            })?,
        };
        let label_key = match label_key {
            Some(l) => l.to_string(),
            None => pick(LABEL_CANDIDATES).ok_or_else(|| {
                PipelineError::Schema(format!(
                    "could not infer label key, tried {:?}",
                    LABEL_CANDIDATES
                ))
            })?,
        };
        Ok(Schema {
            text_key,
            label_key,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthStats {
    pub count: usize,
    pub mean: f64,
    pub min: usize,
    pub max: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanityReport {
    pub num_examples: usize,
    pub text_key: String,
    pub label_key: String,
    pub missing_text_key: usize,
    pub empty_text: usize,
    pub missing_label_key: usize,
    pub label_counts: BTreeMap<String, usize>,
}

pub fn label_counts(examples: &[Example], schema: &Schema) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for ex in examples {
        *counts.entry(label_of(ex, schema)).or_insert(0) += 1;
    }
    counts
}

/// Whitespace-token length statistics per label. Blank texts are skipped.
pub fn length_stats_by_label(
    examples: &[Example],
    schema: &Schema,
) -> BTreeMap<String, LengthStats> {
    let mut lengths: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for ex in examples {
        let text = text_of(ex, schema);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        lengths
            .entry(label_of(ex, schema))
            .or_default()
            .push(text.split_whitespace().count());
    }

    lengths
        .into_iter()
        .map(|(label, vals)| {
            let count = vals.len();
            let sum: usize = vals.iter().sum();
            let stats = LengthStats {
                count,
                mean: sum as f64 / count as f64,
                min: vals.iter().copied().min().unwrap_or(0),
                max: vals.iter().copied().max().unwrap_or(0),
            };
            (label, stats)
        })
        .collect()
}

pub fn sanity_report(examples: &[Example], schema: &Schema) -> SanityReport {
    let mut missing_text_key = 0;
    let mut empty_text = 0;
    let mut missing_label_key = 0;

    for ex in examples {
        if !ex.fields.contains_key(&schema.text_key) {
            missing_text_key += 1;
        } else if text_of(ex, schema).trim().is_empty() {
            empty_text += 1;
        }
        if !ex.fields.contains_key(&schema.label_key) {
            missing_label_key += 1;
        }
    }

    SanityReport {
        num_examples: examples.len(),
        text_key: schema.text_key.clone(),
        label_key: schema.label_key.clone(),
        missing_text_key,
        empty_text,
        missing_label_key,
        label_counts: label_counts(examples, schema),
    }
}

fn text_of(ex: &Example, schema: &Schema) -> String {
    match ex.fields.get(&schema.text_key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn label_of(ex: &Example, schema: &Schema) -> String {
    match ex.fields.get(&schema.label_key) {
        Some(Value::String(s)) => s.clone(),
        None => MISSING_LABEL.to_string(),
        Some(other) => other.to_string(),
    }
}
