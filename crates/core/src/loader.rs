//! JSONL dataset loading.

use crate::analysis::Schema;
use crate::error::{PipelineError, Result};
use crate::models::Record;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

pub type JsonObject = serde_json::Map<String, Value>;

/// A raw JSON object together with the 1-based line it came from.
#[derive(Debug, Clone)]
pub struct Example {
    pub line: usize,
    pub fields: JsonObject,
}

/// Load records using the default `text` / `label` keys.
pub fn load(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    load_with_schema(path, &Schema::default())
}

pub fn load_with_schema(path: impl AsRef<Path>, schema: &Schema) -> Result<Vec<Record>> {
    let examples = read_examples(path)?;
    to_records(&examples, schema)
}

/// Load records, inferring whichever keys are not given explicitly.
pub fn load_inferred(
    path: impl AsRef<Path>,
    text_key: Option<&str>,
    label_key: Option<&str>,
) -> Result<Vec<Record>> {
    let examples = read_examples(path)?;
    if examples.is_empty() {
        return Ok(Vec::new());
    }
    let schema = Schema::infer(&examples, text_key, label_key)?;
    to_records(&examples, &schema)
}

pub fn read_examples(path: impl AsRef<Path>) -> Result<Vec<Example>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let examples = parse_examples(BufReader::new(file))?;
    info!(path = %path.display(), count = examples.len(), "loaded examples");
    Ok(examples)
}

/// Parse one JSON object per non-blank line. Stops at the first malformed line.
pub fn parse_examples<R: BufRead>(reader: R) -> Result<Vec<Example>> {
    let mut examples = Vec::new();
    for (idx, raw) in reader.split(b'\n').enumerate() {
        let line_no = idx + 1;
        let line = String::from_utf8(raw?).map_err(|e| PipelineError::Parse {
            line: line_no,
            message: format!("invalid UTF-8: {}", e.utf8_error()),
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(trimmed).map_err(|e| PipelineError::Parse {
            line: line_no,
            message: e.to_string(),
        })?;
        match value {
            Value::Object(fields) => examples.push(Example {
                line: line_no,
                fields,
            }),
            other => {
                return Err(PipelineError::Parse {
                    line: line_no,
                    message: format!("expected a JSON object, found {}", json_kind(&other)),
                })
            }
        }
    }
    Ok(examples)
}

pub fn to_records(examples: &[Example], schema: &Schema) -> Result<Vec<Record>> {
    examples
        .iter()
        .map(|ex| {
            let text = match ex.fields.get(&schema.text_key) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => {
                    return Err(PipelineError::Parse {
                        line: ex.line,
                        message: format!(
                            "field `{}` must be a string, found {}",
                            schema.text_key,
                            json_kind(other)
                        ),
                    })
                }
                None => {
                    return Err(PipelineError::Parse {
                        line: ex.line,
                        message: format!("missing field `{}`", schema.text_key),
                    })
                }
            };
            let label = match ex.fields.get(&schema.label_key) {
                Some(Value::String(s)) => s.clone(),
                // Category codes are kept as their decimal form.
                Some(Value::Number(n)) => n.to_string(),
                Some(other) => {
                    return Err(PipelineError::Parse {
                        line: ex.line,
                        message: format!(
                            "field `{}` must be a string or number, found {}",
                            schema.label_key,
                            json_kind(other)
                        ),
                    })
                }
                None => {
                    return Err(PipelineError::Parse {
                        line: ex.line,
                        message: format!("missing field `{}`", schema.label_key),
                    })
                }
            };
            Ok(Record { text, label })
        })
        .collect()
}

/// Deterministic stratified split into `(train, holdout)`.
///
/// Within each label an evenly spaced subset of `round(n * ratio)` records is
/// held out; every label keeps at least one training record. Source order is
/// preserved in both halves.
pub fn stratified_split(records: &[Record], holdout_ratio: f64) -> (Vec<Record>, Vec<Record>) {
    if holdout_ratio <= 0.0 || records.is_empty() {
        return (records.to_vec(), Vec::new());
    }

    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, r) in records.iter().enumerate() {
        groups.entry(r.label.as_str()).or_default().push(i);
    }

    let mut held = vec![false; records.len()];
    for positions in groups.values() {
        let m = positions.len();
        let wanted = (m as f64 * holdout_ratio).round() as usize;
        let n_hold = wanted.min(m.saturating_sub(1));
        for (j, &pos) in positions.iter().enumerate() {
            if (j + 1) * n_hold / m > j * n_hold / m {
                held[pos] = true;
            }
        }
    }

    let mut train = Vec::new();
    let mut holdout = Vec::new();
    for (r, is_held) in records.iter().zip(held) {
        if is_held {
            holdout.push(r.clone());
        } else {
            train.push(r.clone());
        }
    }
    debug!(train = train.len(), holdout = holdout.len(), "stratified split");
    (train, holdout)
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
