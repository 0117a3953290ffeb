use std::fmt;

use crate::corpus::{ModelPredictions, Sample};
use crate::render::format_probability;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelStats {
    pub key: String,
    /// Steps where this model produced a ranked list.
    pub ranked: usize,
    pub errors: usize,
    /// The actual token was the model's first guess.
    pub top1: usize,
    /// The actual token appeared anywhere in the model's list.
    pub topk: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DatasetStats {
    pub samples: usize,
    pub empty_samples: usize,
    pub steps: usize,
    pub with_predictions: usize,
    pub models: Vec<ModelStats>,
}

pub fn dataset_stats(samples: &[Sample]) -> DatasetStats {
    let mut res = DatasetStats {
        samples: samples.len(),
        ..DatasetStats::default()
    };

    for sample in samples {
        if sample.steps.is_empty() {
            res.empty_samples += 1;
        }
        for step in &sample.steps {
            res.steps += 1;
            if step.has_predictions() {
                res.with_predictions += 1;
            }
            for key in step.predictions.model_keys() {
                let idx = match res.models.iter().position(|m| m.key == key) {
                    Some(idx) => idx,
                    None => {
                        res.models.push(ModelStats {
                            key: key.to_string(),
                            ..ModelStats::default()
                        });
                        res.models.len() - 1
                    }
                };
                let model = &mut res.models[idx];
                match step.predictions.for_model(key) {
                    Some(ModelPredictions::Ranked(cands)) => {
                        model.ranked += 1;
                        if cands.first().map(|c| &c.token) == Some(&step.next_actual_token) {
                            model.top1 += 1;
                        }
                        if cands.iter().any(|c| c.token == step.next_actual_token) {
                            model.topk += 1;
                        }
                    }
                    Some(ModelPredictions::ModelError(_)) => model.errors += 1,
                    None => {}
                }
            }
        }
    }
    res
}

fn rate(hits: usize, total: usize) -> String {
    if total == 0 {
        "-".to_string()
    } else {
        format_probability(hits as f64 / total as f64)
    }
}

impl fmt::Display for DatasetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} samples ({} empty), {} steps, {} with predictions",
            self.samples, self.empty_samples, self.steps, self.with_predictions
        )?;
        if self.models.is_empty() {
            return Ok(());
        }
        writeln!(f, "  {:<12} {:>6} {:>6} {:>7} {:>7}", "model", "ranked", "errors", "top-1", "top-k")?;
        for m in &self.models {
            writeln!(
                f,
                "  {:<12} {:>6} {:>6} {:>7} {:>7}",
                m.key,
                m.ranked,
                m.errors,
                rate(m.top1, m.ranked),
                rate(m.topk, m.ranked)
            )?;
        }
        Ok(())
    }
}

#[test]
fn hit_rates() {
    let data = crate::corpus::parse_dataset(
        r#"[
        {"steps": [
            {"prefix": "a", "next_actual_token": "x",
             "predictions": {"gpt2": [{"token": "x", "probability": 0.6}, {"token": "y", "probability": 0.3}],
                             "llama3": [{"error": "quota"}]}},
            {"prefix": "ax", "next_actual_token": "y",
             "predictions": {"gpt2": [{"token": "x", "probability": 0.6}, {"token": "y", "probability": 0.3}],
                             "llama3": [{"token": "z", "probability": 0.9}]}},
            {"prefix": "axy", "next_actual_token": "z"}
        ]},
        {"steps": []}
    ]"#,
    )
    .unwrap();

    let stats = dataset_stats(&data);
    assert_eq!(stats.samples, 2);
    assert_eq!(stats.empty_samples, 1);
    assert_eq!(stats.steps, 3);
    assert_eq!(stats.with_predictions, 2);
    assert_eq!(
        stats.models,
        vec![
            ModelStats {
                key: "gpt2".to_string(),
                ranked: 2,
                errors: 0,
                top1: 1,
                topk: 2,
            },
            ModelStats {
                key: "llama3".to_string(),
                ranked: 1,
                errors: 1,
                top1: 0,
                topk: 0,
            },
        ]
    );

    let text = stats.to_string();
    assert!(text.contains("2 samples (1 empty), 3 steps, 2 with predictions"));
    assert!(text.contains("50%"));
    assert!(text.contains("100%"));
}
