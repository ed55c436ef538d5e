use crate::error::{DetectorError, Result};
use crate::schema::{DEFAULT_BODY_ALIASES, DEFAULT_LABEL_ALIASES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "phishing-detector.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Directory holding the raw labeled CSV files.
    pub data_dir: PathBuf,
    /// Where `clean-data` writes the `*_cleaned.csv` files.
    pub cleaned_dir: PathBuf,
    /// Directory holding the persisted vectorizer/classifier pair.
    pub model_dir: PathBuf,
    pub training: TrainingConfig,
    pub corpus: CorpusConfig,
    /// One stopword per line. The bundled English list is used when unset.
    pub stopwords_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub smoothing_alpha: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub parallel: bool,
    pub body_aliases: Vec<String>,
    pub label_aliases: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            cleaned_dir: PathBuf::from("data/cleaned"),
            model_dir: PathBuf::from("model"),
            training: TrainingConfig::default(),
            corpus: CorpusConfig::default(),
            stopwords_file: None,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            smoothing_alpha: 1.0,
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            body_aliases: DEFAULT_BODY_ALIASES.iter().map(|s| s.to_string()).collect(),
            label_aliases: DEFAULT_LABEL_ALIASES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl DetectorConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DetectorConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Loads `path` if it exists, otherwise falls back to the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "Configuration file '{}' not found, using default configuration",
                path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fraction = self.training.test_fraction;
        if !(0.0..1.0).contains(&fraction) {
            return Err(DetectorError::InvalidConfig(format!(
                "test_fraction must be in [0, 1), got {fraction}"
            )));
        }
        let alpha = self.training.smoothing_alpha;
        if alpha.is_nan() || alpha <= 0.0 {
            return Err(DetectorError::InvalidConfig(format!(
                "smoothing_alpha must be positive, got {alpha}"
            )));
        }
        if self.corpus.body_aliases.is_empty() || self.corpus.label_aliases.is_empty() {
            return Err(DetectorError::InvalidConfig(
                "body_aliases and label_aliases must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
