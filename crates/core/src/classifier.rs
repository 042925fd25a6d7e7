//! TF-IDF + multinomial logistic regression classifier pipeline.

use crate::config::{AppConfig, ClassifierConfig, VectorizerConfig};
use crate::error::{PipelineError, Result};
use crate::models::{ClassificationReport, Evaluation, FitSummary, LabelMetrics, Prediction, Record};
use crate::vectorizer::{SparseVector, TfidfVectorizer};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Softmax linear model over sparse features.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    labels: Vec<String>,
    /// One weight row per label, `labels.len() x n_features`.
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
struct TrainStats {
    iterations: usize,
    final_loss: f64,
}

impl LogisticRegression {
    /// Full-batch gradient descent on mean cross-entropy plus an L2 penalty of
    /// `1 / (C * n)` on the weights (the bias is not penalised). Starts from
    /// zero, so training is deterministic.
    fn train(
        rows: &[SparseVector],
        targets: &[usize],
        labels: Vec<String>,
        n_features: usize,
        cfg: &ClassifierConfig,
    ) -> (Self, TrainStats) {
        let n = rows.len() as f64;
        let k = labels.len();
        let lambda = if cfg.c > 0.0 { 1.0 / (cfg.c * n) } else { 0.0 };

        let mut model = LogisticRegression {
            labels,
            weights: vec![vec![0.0; n_features]; k],
            bias: vec![0.0; k],
        };

        let mut prev_loss = f64::INFINITY;
        let mut stats = TrainStats {
            iterations: 0,
            final_loss: f64::INFINITY,
        };

        for iter in 1..=cfg.max_iter.max(1) {
            let mut grad_w = vec![vec![0.0; n_features]; k];
            let mut grad_b = vec![0.0; k];
            let mut loss = 0.0;

            for (row, &target) in rows.iter().zip(targets) {
                let probs = model.probabilities(row);
                loss -= probs[target].max(f64::MIN_POSITIVE).ln();
                for c in 0..k {
                    let delta = probs[c] - if c == target { 1.0 } else { 0.0 };
                    grad_b[c] += delta;
                    for &(j, x) in row {
                        grad_w[c][j] += delta * x;
                    }
                }
            }

            loss /= n;
            let penalty: f64 = model
                .weights
                .iter()
                .flat_map(|w| w.iter())
                .map(|w| w * w)
                .sum();
            loss += 0.5 * lambda * penalty;

            for c in 0..k {
                model.bias[c] -= cfg.learning_rate * grad_b[c] / n;
                for j in 0..n_features {
                    let g = grad_w[c][j] / n + lambda * model.weights[c][j];
                    model.weights[c][j] -= cfg.learning_rate * g;
                }
            }

            stats = TrainStats {
                iterations: iter,
                final_loss: loss,
            };
            if iter % 100 == 0 {
                debug!(iter, loss, "logistic regression progress");
            }
            if (prev_loss - loss).abs() < cfg.tolerance {
                break;
            }
            prev_loss = loss;
        }

        (model, stats)
    }

    /// Class probabilities for one feature row, in label order.
    pub fn probabilities(&self, row: &SparseVector) -> Vec<f64> {
        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(w, b)| b + row.iter().map(|&(j, x)| w[j] * x).sum::<f64>())
            .collect();
        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / total).collect()
    }

    /// Most probable label; ties go to the label that sorts first.
    pub fn predict(&self, row: &SparseVector) -> (&str, f64) {
        let probs = self.probabilities(row);
        let mut best = 0;
        for (i, p) in probs.iter().enumerate() {
            if *p > probs[best] {
                best = i;
            }
        }
        (self.labels[best].as_str(), probs[best])
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    vectorizer: TfidfVectorizer,
    model: LogisticRegression,
}

/// Owns a fitted vectorizer and classifier. Re-fitting replaces both.
#[derive(Debug, Clone)]
pub struct ClassifierPipeline {
    vectorizer_cfg: VectorizerConfig,
    classifier_cfg: ClassifierConfig,
    fitted: Option<Fitted>,
}

impl ClassifierPipeline {
    pub fn new(vectorizer_cfg: VectorizerConfig, classifier_cfg: ClassifierConfig) -> Self {
        Self {
            vectorizer_cfg,
            classifier_cfg,
            fitted: None,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(cfg.vectorizer.clone(), cfg.classifier.clone())
    }

    /// Fit vocabulary and weights on `records`. On error the previous fit is kept.
    pub fn fit(&mut self, records: &[Record]) -> Result<FitSummary> {
        let labels: Vec<String> = records
            .iter()
            .map(|r| r.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if labels.len() < 2 {
            return Err(PipelineError::InsufficientData {
                distinct_labels: labels.len(),
            });
        }

        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        let vectorizer = TfidfVectorizer::fit(&self.vectorizer_cfg, &texts);
        let rows = vectorizer.transform_all(&texts);
        let targets: Vec<usize> = records
            .iter()
            .map(|r| labels.binary_search(&r.label).unwrap_or(0))
            .collect();

        let (model, stats) = LogisticRegression::train(
            &rows,
            &targets,
            labels.clone(),
            vectorizer.vocabulary_size(),
            &self.classifier_cfg,
        );

        let summary = FitSummary {
            records: records.len(),
            labels,
            vocabulary_size: vectorizer.vocabulary_size(),
            iterations: stats.iterations,
            final_loss: stats.final_loss,
        };
        info!(
            records = summary.records,
            labels = summary.labels.len(),
            vocabulary = summary.vocabulary_size,
            iterations = summary.iterations,
            loss = summary.final_loss,
            "classifier fitted"
        );
        self.fitted = Some(Fitted { vectorizer, model });
        Ok(summary)
    }

    pub fn predict(&self, text: &str) -> Result<Prediction> {
        let fitted = self.fitted.as_ref().ok_or(PipelineError::NotFitted)?;
        let row = fitted.vectorizer.transform(text);
        let (label, confidence) = fitted.model.predict(&row);
        Ok(Prediction {
            text: text.to_string(),
            predicted_label: label.to_string(),
            confidence,
        })
    }

    pub fn classify<S: AsRef<str>>(&self, texts: &[S]) -> Result<ClassificationReport> {
        let predictions = texts
            .iter()
            .map(|t| self.predict(t.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(ClassificationReport { predictions })
    }

    /// Accuracy and per-label precision/recall against the records' labels.
    pub fn evaluate(&self, records: &[Record]) -> Result<Evaluation> {
        if self.fitted.is_none() {
            return Err(PipelineError::NotFitted);
        }

        #[derive(Default)]
        struct Tally {
            tp: usize,
            fp: usize,
            fn_: usize,
            support: usize,
        }

        let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();
        let mut correct = 0;
        for record in records {
            let predicted = self.predict(&record.text)?.predicted_label;
            tallies.entry(record.label.clone()).or_default().support += 1;
            if predicted == record.label {
                correct += 1;
                tallies.entry(predicted).or_default().tp += 1;
            } else {
                tallies.entry(record.label.clone()).or_default().fn_ += 1;
                tallies.entry(predicted).or_default().fp += 1;
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let per_label = tallies
            .into_iter()
            .map(|(label, t)| {
                let precision = ratio(t.tp, t.tp + t.fp);
                let recall = ratio(t.tp, t.tp + t.fn_);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                (
                    label,
                    LabelMetrics {
                        precision,
                        recall,
                        f1,
                        support: t.support,
                    },
                )
            })
            .collect();

        let total = records.len();
        let evaluation = Evaluation {
            total,
            correct,
            accuracy: ratio(correct, total),
            per_label,
        };
        info!(total, correct, accuracy = evaluation.accuracy, "evaluation complete");
        Ok(evaluation)
    }

    /// Highest-weighted vocabulary terms for `label`, strongest first.
    pub fn top_terms(&self, label: &str, n: usize) -> Result<Vec<(String, f64)>> {
        let fitted = self.fitted.as_ref().ok_or(PipelineError::NotFitted)?;
        let Some(class) = fitted.model.labels().iter().position(|l| l == label) else {
            return Ok(Vec::new());
        };
        let mut weighted: Vec<(usize, f64)> = fitted.model.weights[class]
            .iter()
            .copied()
            .enumerate()
            .collect();
        weighted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(weighted
            .into_iter()
            .take(n)
            .filter_map(|(idx, w)| fitted.vectorizer.term(idx).map(|t| (t.to_string(), w)))
            .collect())
    }

    pub fn labels(&self) -> Result<&[String]> {
        self.fitted
            .as_ref()
            .map(|f| f.model.labels())
            .ok_or(PipelineError::NotFitted)
    }
}
