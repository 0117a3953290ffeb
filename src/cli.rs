use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigError, Registry};

/// Step through fill-in-the-blank examples and compare model predictions against the real
/// next token.
#[derive(Parser, Debug)]
#[command(name = "blank-viewer", version, about)]
pub struct Args {
    /// Dataset files, as PATH or TITLE=PATH. Defaults to the built-in dataset list.
    pub datasets: Vec<String>,

    /// JSON registry of datasets and model labels
    #[arg(short, long, conflicts_with = "datasets")]
    pub registry: Option<PathBuf>,

    /// Dataset to start on (1-based)
    #[arg(short, long, default_value_t = 1)]
    pub start_dataset: usize,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn registry(&self) -> Result<Registry, ConfigError> {
        if let Some(path) = &self.registry {
            Registry::from_file(path)
        } else if self.datasets.is_empty() {
            Ok(Registry::builtin())
        } else {
            Registry::from_args(&self.datasets)
        }
    }

    /// Zero-based index of `--start-dataset` within `registry`.
    pub fn start_index(&self, registry: &Registry) -> Result<usize, ConfigError> {
        let count = registry.datasets.len();
        if self.start_dataset == 0 || self.start_dataset > count {
            return Err(ConfigError::BadStartDataset {
                requested: self.start_dataset,
                count,
            });
        }
        Ok(self.start_dataset - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_verify() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_to_builtin_registry() {
        let args = Args::parse_from(["blank-viewer"]);
        assert_eq!(args.start_dataset, 1);
        assert_eq!(args.verbose, 0);
        assert_eq!(args.registry().unwrap(), Registry::builtin());
    }

    #[test]
    fn dataset_arguments() {
        let args = Args::parse_from(["blank-viewer", "-vv", "-s", "2", "a.json", "sums=b.json"]);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.start_dataset, 2);
        let reg = args.registry().unwrap();
        assert_eq!(reg.position("a"), Some(0));
        assert_eq!(reg.position("sums"), Some(1));
    }

    #[test]
    fn start_dataset_must_exist() {
        let reg = Registry::builtin();
        let args = Args::parse_from(["blank-viewer", "-s", "4"]);
        assert_eq!(args.start_index(&reg).unwrap(), 3);
        assert_eq!(Args::parse_from(["blank-viewer"]).start_index(&reg).unwrap(), 0);

        for bad in ["0", "5"] {
            let args = Args::parse_from(["blank-viewer", "-s", bad]);
            assert!(matches!(
                args.start_index(&reg),
                Err(ConfigError::BadStartDataset { count: 4, .. })
            ));
        }
    }

    #[test]
    fn registry_conflicts_with_datasets() {
        assert!(Args::try_parse_from(["blank-viewer", "-r", "reg.json", "a.json"]).is_err());
    }
}
