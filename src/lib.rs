pub mod classifier;
pub mod config;
pub mod corpus;
pub mod error;
pub mod evaluation;
pub mod inference;
pub mod label;
pub mod normalization;
pub mod persistence;
pub mod schema;
pub mod stopwords;
pub mod training;
pub mod vectorizer;

pub use config::DetectorConfig;
pub use corpus::{BuildReport, CorpusBuilder, CorpusSource, DirectorySource, LabeledCorpus};
pub use error::{DetectorError, Result};
pub use inference::{PhishingDetector, PredictionResult};
pub use label::Label;
pub use normalization::TextNormalizer;
pub use stopwords::StopwordSet;
pub use training::{TrainingPipeline, TrainingSummary};
