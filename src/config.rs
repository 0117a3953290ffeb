use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetEntry {
    pub title: String,
    pub path: PathBuf,
}

/// Display metadata for a model whose predictions appear in the datasets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelInfo {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub subtitle: String,
}

/// Immutable startup configuration: which datasets exist, in selector order, and how to
/// label the models.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Registry {
    pub datasets: Vec<DatasetEntry>,
    #[serde(default = "default_models")]
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading registry {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing registry {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no datasets configured")]
    Empty,
    #[error("dataset title \"{0}\" is used more than once")]
    DuplicateTitle(String),
    #[error("bad dataset argument \"{0}\" (expected PATH or TITLE=PATH)")]
    BadSpec(String),
    #[error("start dataset {requested} is out of range (1..={count})")]
    BadStartDataset { requested: usize, count: usize },
}

pub fn default_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            key: "gpt2".to_string(),
            name: "GPT-2".to_string(),
            subtitle: "1.5B params, 2019".to_string(),
        },
        ModelInfo {
            key: "llama3".to_string(),
            name: "Llama 3.1".to_string(),
            subtitle: "405B params, 2024".to_string(),
        },
    ]
}

impl Registry {
    pub fn new(
        datasets: Vec<DatasetEntry>,
        models: Vec<ModelInfo>,
    ) -> Result<Registry, ConfigError> {
        let res = Registry { datasets, models };
        res.validate()?;
        Ok(res)
    }

    /// The four datasets the viewer ships with, looked up in the current directory.
    pub fn builtin() -> Registry {
        let datasets = [
            ("wikipedia", "wikipedia.json"),
            ("addition", "addition.json"),
            ("multiplication", "multiply.json"),
            ("specification gaming paper", "specification-gaming.json"),
        ]
        .into_iter()
        .map(|(title, path)| DatasetEntry {
            title: title.to_string(),
            path: PathBuf::from(path),
        })
        .collect();

        Registry {
            datasets,
            models: default_models(),
        }
    }

    /// Reads a JSON registry. Relative dataset paths are taken relative to the registry file.
    pub fn from_file(path: &Path) -> Result<Registry, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let mut res: Registry = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;

        if let Some(base) = path.parent() {
            for entry in &mut res.datasets {
                if entry.path.is_relative() {
                    entry.path = base.join(&entry.path);
                }
            }
        }
        res.validate()?;
        Ok(res)
    }

    /// Builds a registry from command-line dataset arguments (`PATH` or `TITLE=PATH`).
    pub fn from_args(specs: &[String]) -> Result<Registry, ConfigError> {
        let datasets = specs
            .iter()
            .map(|s| parse_dataset_arg(s))
            .collect::<Result<Vec<_>, _>>()?;
        Registry::new(datasets, default_models())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.datasets.is_empty() {
            return Err(ConfigError::Empty);
        }
        let mut seen = HashSet::new();
        for entry in &self.datasets {
            if !seen.insert(entry.title.as_str()) {
                return Err(ConfigError::DuplicateTitle(entry.title.clone()));
            }
        }
        Ok(())
    }

    pub fn position(&self, title: &str) -> Option<usize> {
        self.datasets.iter().position(|d| d.title == title)
    }

    pub fn model(&self, key: &str) -> Option<&ModelInfo> {
        self.models.iter().find(|m| m.key == key)
    }
}

fn parse_dataset_arg(spec: &str) -> Result<DatasetEntry, ConfigError> {
    if let Some((title, path)) = spec.split_once('=') {
        if title.trim().is_empty() || path.is_empty() {
            return Err(ConfigError::BadSpec(spec.to_string()));
        }
        return Ok(DatasetEntry {
            title: title.trim().to_string(),
            path: PathBuf::from(path),
        });
    }

    let path = PathBuf::from(spec);
    let title = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| ConfigError::BadSpec(spec.to_string()))?;
    Ok(DatasetEntry { title, path })
}

#[test]
fn dataset_args() {
    let reg = Registry::from_args(&[
        "data/wikipedia.json".to_string(),
        "sums=data/addition.json".to_string(),
    ])
    .unwrap();
    assert_eq!(reg.datasets[0].title, "wikipedia");
    assert_eq!(reg.datasets[0].path, PathBuf::from("data/wikipedia.json"));
    assert_eq!(reg.datasets[1].title, "sums");
    assert_eq!(reg.position("sums"), Some(1));
    assert_eq!(reg.position("nope"), None);
    assert_eq!(reg.model("gpt2").map(|m| m.name.as_str()), Some("GPT-2"));

    assert!(matches!(
        Registry::from_args(&["=x.json".to_string()]),
        Err(ConfigError::BadSpec(_))
    ));
    assert!(matches!(Registry::from_args(&[]), Err(ConfigError::Empty)));
    assert!(matches!(
        Registry::from_args(&["a.json".to_string(), "a=b.json".to_string()]),
        Err(ConfigError::DuplicateTitle(_))
    ));
}

#[test]
fn registry_file_resolves_relative_paths() {
    let dir = tempfile::tempdir().unwrap();
    let reg_path = dir.path().join("registry.json");
    std::fs::write(
        &reg_path,
        r#"{"datasets": [{"title": "wiki", "path": "wikipedia.json"}],
            "models": [{"key": "llama3", "name": "Llama 3.1"}]}"#,
    )
    .unwrap();

    let reg = Registry::from_file(&reg_path).unwrap();
    assert_eq!(reg.datasets[0].path, dir.path().join("wikipedia.json"));
    assert_eq!(reg.models.len(), 1);
    assert_eq!(reg.models[0].subtitle, "");
}

#[test]
fn registry_file_defaults_models() {
    let dir = tempfile::tempdir().unwrap();
    let reg_path = dir.path().join("registry.json");
    std::fs::write(&reg_path, r#"{"datasets": [{"title": "t", "path": "/abs/t.json"}]}"#).unwrap();

    let reg = Registry::from_file(&reg_path).unwrap();
    assert_eq!(reg.datasets[0].path, PathBuf::from("/abs/t.json"));
    assert_eq!(reg.models, default_models());
}

#[test]
fn builtin_registry_is_valid() {
    let reg = Registry::builtin();
    assert_eq!(reg.datasets.len(), 4);
    assert!(reg.validate().is_ok());
    assert_eq!(reg.position("multiplication"), Some(2));
}
