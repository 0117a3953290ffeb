use std::any::Any;

use crate::config::{DatasetEntry, Registry};
use crate::corpus::{self, Dataset, LoadError, Sample};

/// Read-only view of the loaded datasets, indexed in selector order.
pub trait DatasetSource {
    fn dataset_count(&self) -> usize;

    /// `None` both for out-of-range indices and for datasets that failed to load.
    fn dataset(&self, index: usize) -> Option<&[Sample]>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDataset {
    pub title: String,
    pub data: Option<Dataset>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Datasets {
    entries: Vec<LoadedDataset>,
}

impl Datasets {
    pub fn new(entries: Vec<LoadedDataset>) -> Datasets {
        Datasets { entries }
    }

    pub fn entries(&self) -> &[LoadedDataset] {
        &self.entries
    }

    pub fn title(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.title.as_str())
    }
}

impl DatasetSource for Datasets {
    fn dataset_count(&self) -> usize {
        self.entries.len()
    }

    fn dataset(&self, index: usize) -> Option<&[Sample]> {
        self.entries.get(index)?.data.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Loading,
    Loaded(Datasets),
    Failed(String),
}

impl LoadState {
    pub fn datasets(&self) -> Option<&Datasets> {
        match self {
            LoadState::Loaded(datasets) => Some(datasets),
            _ => None,
        }
    }
}

pub fn load_all(registry: &Registry) -> LoadState {
    load_all_with(registry, |entry| corpus::load_dataset(&entry.path))
}

/// Loads every registry entry concurrently and publishes the result in one step.
///
/// A dataset that fails to load is recorded as unavailable and does not affect its siblings.
/// Only a worker panic fails the whole batch.
pub fn load_all_with<F>(registry: &Registry, load: F) -> LoadState
where
    F: Fn(&DatasetEntry) -> Result<Dataset, LoadError> + Sync,
{
    let load = &load;
    let joined: Vec<std::thread::Result<LoadedDataset>> = std::thread::scope(|scope| {
        let handles: Vec<_> = registry
            .datasets
            .iter()
            .map(|entry| {
                scope.spawn(move || {
                    let data = match load(entry) {
                        Ok(data) => {
                            tracing::info!(title = %entry.title, samples = data.len(), "loaded dataset");
                            Some(data)
                        }
                        Err(e) => {
                            tracing::error!(title = %entry.title, "{e}");
                            None
                        }
                    };
                    LoadedDataset {
                        title: entry.title.clone(),
                        data,
                    }
                })
            })
            .collect();

        // Join everything before looking at results, so no panicked worker is left unjoined.
        handles.into_iter().map(|h| h.join()).collect()
    });

    match joined.into_iter().collect::<Result<Vec<_>, _>>() {
        Ok(entries) => LoadState::Loaded(Datasets::new(entries)),
        Err(payload) => {
            let msg = format!("Failed to load datasets: {}", panic_message(payload.as_ref()));
            tracing::error!("{msg}");
            LoadState::Failed(msg)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "loader panicked".to_string()
    }
}

#[cfg(test)]
fn test_registry(titles: &[&str]) -> Registry {
    Registry::new(
        titles
            .iter()
            .map(|t| DatasetEntry {
                title: t.to_string(),
                path: std::path::PathBuf::from(format!("{t}.json")),
            })
            .collect(),
        crate::config::default_models(),
    )
    .unwrap()
}

#[test]
fn failed_datasets_do_not_affect_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.json");
    let bad = dir.path().join("bad.json");
    std::fs::write(
        &good,
        r#"[{"steps": [{"prefix": "2 + 2 =", "next_actual_token": " 4"}]}]"#,
    )
    .unwrap();
    std::fs::write(&bad, "not json").unwrap();

    let registry = Registry::from_args(&[
        format!("good={}", good.display()),
        format!("bad={}", bad.display()),
        format!("missing={}", dir.path().join("missing.json").display()),
    ])
    .unwrap();

    let state = load_all(&registry);
    let datasets = state.datasets().unwrap();
    assert_eq!(datasets.dataset_count(), 3);
    assert_eq!(datasets.title(0), Some("good"));
    assert_eq!(datasets.dataset(0).map(|d| d.len()), Some(1));
    assert!(datasets.dataset(1).is_none());
    assert!(datasets.dataset(2).is_none());
    assert!(datasets.dataset(3).is_none());
}

#[test]
fn results_keep_registry_order() {
    let registry = test_registry(&["a", "b", "c", "d"]);
    let state = load_all_with(&registry, |entry| {
        // Finish in reverse order.
        let delay = match entry.title.as_str() {
            "a" => 30,
            "b" => 20,
            "c" => 10,
            _ => 0,
        };
        std::thread::sleep(std::time::Duration::from_millis(delay));
        Ok(vec![])
    });
    let titles: Vec<&str> = state
        .datasets()
        .unwrap()
        .entries()
        .iter()
        .map(|e| e.title.as_str())
        .collect();
    assert_eq!(titles, vec!["a", "b", "c", "d"]);
}

#[test]
fn worker_panic_fails_the_batch() {
    let registry = test_registry(&["fine", "boom"]);
    let state = load_all_with(&registry, |entry| {
        if entry.title == "boom" {
            panic!("loader bug");
        }
        Ok(vec![])
    });
    match state {
        LoadState::Failed(msg) => assert!(msg.contains("loader bug")),
        other => panic!("unexpected {other:?}"),
    }
}
