use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

/// One ranked guess from a model.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub token: String,
    pub probability: f64,
}

/// What a single model produced for a step.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelPredictions {
    Ranked(Vec<Candidate>),
    ModelError(String),
}

/// A step's prediction set. Model order follows the file.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Predictions {
    #[default]
    Unavailable,
    Available(Vec<(String, ModelPredictions)>),
}

impl Predictions {
    pub fn is_available(&self) -> bool {
        matches!(self, Predictions::Available(_))
    }

    pub fn for_model(&self, key: &str) -> Option<&ModelPredictions> {
        match self {
            Predictions::Unavailable => None,
            Predictions::Available(models) => models
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, preds)| preds),
        }
    }

    pub fn model_keys(&self) -> impl Iterator<Item = &str> {
        let models: &[(String, ModelPredictions)] = match self {
            Predictions::Unavailable => &[],
            Predictions::Available(models) => models.as_slice(),
        };
        models.iter().map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawStep")]
pub struct Step {
    pub prefix: String,
    pub next_actual_token: String,
    pub predictions: Predictions,
}

impl Step {
    pub fn has_predictions(&self) -> bool {
        self.predictions.is_available()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sample {
    #[serde(default)]
    pub article_title: Option<String>,
    // A sample without `steps` is malformed; it loads as empty and navigation skips it.
    #[serde(default)]
    pub steps: Vec<Step>,
}

pub type Dataset = Vec<Sample>;

#[derive(Deserialize)]
struct RawStep {
    prefix: String,
    next_actual_token: String,
    #[serde(default)]
    predictions: Option<serde_json::Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Candidate { token: String, probability: f64 },
    Error { error: String },
}

impl TryFrom<RawStep> for Step {
    type Error = String;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let predictions = match raw.predictions {
            None => Predictions::Unavailable,
            Some(models) => {
                let mut res = vec![];
                for (model, entries) in models {
                    let entries: Vec<RawEntry> = serde_json::from_value(entries)
                        .map_err(|e| format!("predictions for model \"{model}\": {e}"))?;
                    let preds = model_predictions(&model, entries);
                    res.push((model, preds));
                }
                Predictions::Available(res)
            }
        };

        Ok(Step {
            prefix: raw.prefix,
            next_actual_token: raw.next_actual_token,
            predictions,
        })
    }
}

fn model_predictions(model: &str, entries: Vec<RawEntry>) -> ModelPredictions {
    let mut candidates = vec![];
    let mut first_error = None;
    let mut errors = 0;
    for entry in entries {
        match entry {
            RawEntry::Candidate { token, probability } => {
                candidates.push(Candidate { token, probability })
            }
            RawEntry::Error { error } => {
                errors += 1;
                first_error.get_or_insert(error);
            }
        }
    }

    match first_error {
        Some(error) if candidates.is_empty() => ModelPredictions::ModelError(error),
        Some(_) => {
            tracing::warn!(
                model,
                errors,
                "dropping error entries mixed in with ranked predictions"
            );
            ModelPredictions::Ranked(candidates)
        }
        None => ModelPredictions::Ranked(candidates),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub fn parse_dataset(text: &str) -> Result<Dataset, serde_json::Error> {
    serde_json::from_str(text)
}

pub fn load_dataset(path: &Path) -> Result<Dataset, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_owned(),
        source,
    })?;
    parse_dataset(&text).map_err(|source| LoadError::Parse {
        path: path.to_owned(),
        source,
    })
}

/// Concatenates the top-level arrays of several dataset files, without validating samples.
/// Returns the combined samples and the inputs that were skipped for not being arrays.
pub fn combine_files(inputs: &[PathBuf]) -> Result<(Vec<Value>, Vec<PathBuf>), LoadError> {
    let mut combined = vec![];
    let mut skipped = vec![];
    for path in inputs {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let value: Value = serde_json::from_str(&text).map_err(|source| LoadError::Parse {
            path: path.clone(),
            source,
        })?;
        match value {
            Value::Array(samples) => combined.extend(samples),
            _ => {
                tracing::warn!(path = %path.display(), "does not contain a JSON array; skipping");
                skipped.push(path.clone());
            }
        }
    }
    return Ok((combined, skipped));
}

#[test]
fn prediction_variants() {
    let data = parse_dataset(
        r#"[{"article_title": "Cats", "steps": [
            {"prefix": "The cat sat on the", "next_actual_token": " mat",
             "predictions": {
                "llama3": [{"token": " mat", "probability": 0.5}, {"token": " floor", "probability": 0.2}],
                "gpt2": [{"error": "rate limited"}]
             }},
            {"prefix": "The cat sat on the mat", "next_actual_token": "."}
        ]}]"#,
    )
    .unwrap();

    assert_eq!(data.len(), 1);
    assert_eq!(data[0].article_title.as_deref(), Some("Cats"));
    let steps = &data[0].steps;
    assert!(steps[0].has_predictions());
    assert!(!steps[1].has_predictions());

    // File order is kept.
    let keys: Vec<&str> = steps[0].predictions.model_keys().collect();
    assert_eq!(keys, vec!["llama3", "gpt2"]);

    match steps[0].predictions.for_model("llama3") {
        Some(ModelPredictions::Ranked(cands)) => {
            assert_eq!(cands.len(), 2);
            assert_eq!(cands[0].token, " mat");
            assert_eq!(cands[1].probability, 0.2);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(
        steps[0].predictions.for_model("gpt2"),
        Some(&ModelPredictions::ModelError("rate limited".to_string()))
    );
    assert_eq!(steps[0].predictions.for_model("gpt4"), None);
    assert_eq!(steps[1].predictions, Predictions::Unavailable);
}

#[test]
fn null_predictions_and_missing_steps() {
    let data = parse_dataset(
        r#"[{"steps": [{"prefix": "1 + 1 =", "next_actual_token": " 2", "predictions": null}]},
            {"article_title": "broken"}]"#,
    )
    .unwrap();
    assert_eq!(data[0].article_title, None);
    assert!(!data[0].steps[0].has_predictions());
    assert!(data[1].steps.is_empty());
}

#[test]
fn mixed_entries_keep_candidates() {
    let data = parse_dataset(
        r#"[{"steps": [{"prefix": "a", "next_actual_token": "b",
            "predictions": {"gpt2": [{"token": "b", "probability": 0.9}, {"error": "oops"}]}}]}]"#,
    )
    .unwrap();
    assert_eq!(
        data[0].steps[0].predictions.for_model("gpt2"),
        Some(&ModelPredictions::Ranked(vec![Candidate {
            token: "b".to_string(),
            probability: 0.9
        }]))
    );
}

#[test]
fn bad_prediction_entry_is_a_parse_error() {
    let res = parse_dataset(
        r#"[{"steps": [{"prefix": "a", "next_actual_token": "b",
            "predictions": {"gpt2": [{"token": "b"}]}}]}]"#,
    );
    assert!(res.is_err());
}

#[test]
fn load_errors_name_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    let err = load_dataset(&missing).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
    assert!(err.to_string().contains("missing.json"));

    let garbled = dir.path().join("garbled.json");
    std::fs::write(&garbled, "[{\"steps\": ").unwrap();
    let err = load_dataset(&garbled).unwrap_err();
    assert!(matches!(err, LoadError::Parse { .. }));
}

#[test]
fn combine_skips_non_arrays() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.json");
    let b = dir.path().join("b.json");
    let c = dir.path().join("c.json");
    std::fs::write(&a, r#"[{"steps": []}, {"steps": []}]"#).unwrap();
    std::fs::write(&b, r#"{"steps": []}"#).unwrap();
    std::fs::write(&c, r#"[{"article_title": "x", "steps": []}]"#).unwrap();

    let (combined, skipped) = combine_files(&[a, b.clone(), c]).unwrap();
    assert_eq!(combined.len(), 3);
    assert_eq!(combined[2]["article_title"], "x");
    assert_eq!(skipped, vec![b]);
}
