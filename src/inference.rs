use crate::classifier::ModelParams;
use crate::error::{DetectorError, Result};
use crate::label::Label;
use crate::normalization::TextNormalizer;
use crate::persistence;
use crate::vectorizer::TfIdfVectorizer;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub predicted_label: Label,
    /// Probability per class; the two values sum to one.
    pub confidence: BTreeMap<Label, f64>,
    /// The text the vectorizer actually saw.
    pub normalized_text: String,
}

impl PredictionResult {
    pub fn confidence_for(&self, label: Label) -> f64 {
        self.confidence.get(&label).copied().unwrap_or(0.0)
    }
}

/// Scores one document with an already loaded vectorizer and model.
pub fn classify(
    input_text: &str,
    normalizer: &TextNormalizer,
    vectorizer: &TfIdfVectorizer,
    model: &ModelParams,
) -> PredictionResult {
    let normalized_text = normalizer.preprocess(input_text);
    let features = vectorizer.transform(&normalized_text);
    let prediction = model.predict(&features);

    PredictionResult {
        predicted_label: prediction.label,
        confidence: Label::ALL
            .into_iter()
            .map(|label| (label, prediction.probability(label)))
            .collect(),
        normalized_text,
    }
}

/// Fails with `InputNotFound` unless `path` is an existing regular file.
pub fn ensure_input_file(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.is_file() {
        Ok(())
    } else {
        Err(DetectorError::InputNotFound {
            path: path.to_path_buf(),
        })
    }
}

/// Read-only scoring engine over a persisted model pair.
///
/// Holds no mutable state, so one instance can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct PhishingDetector {
    normalizer: TextNormalizer,
    vectorizer: TfIdfVectorizer,
    model: ModelParams,
    artifact_tag: Option<String>,
}

impl PhishingDetector {
    pub fn new(normalizer: TextNormalizer, vectorizer: TfIdfVectorizer, model: ModelParams) -> Self {
        Self {
            normalizer,
            vectorizer,
            model,
            artifact_tag: None,
        }
    }

    /// Loads the persisted pair and rebuilds the normalizer from the stopword
    /// set stored with it.
    pub fn load(model_dir: impl AsRef<Path>) -> Result<Self> {
        let bundle = persistence::load(model_dir)?;
        Ok(Self {
            normalizer: TextNormalizer::new(bundle.stopwords),
            vectorizer: TfIdfVectorizer::from_state(bundle.vocab),
            model: bundle.model,
            artifact_tag: Some(bundle.artifact_tag),
        })
    }

    /// Like `load`, but with a caller-supplied normalizer that must match the
    /// one the model was trained with.
    pub fn load_with_normalizer(
        model_dir: impl AsRef<Path>,
        normalizer: TextNormalizer,
    ) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        let detector = Self::load(model_dir)?;
        if detector.normalizer.stopwords() != normalizer.stopwords() {
            return Err(DetectorError::model_unavailable(
                model_dir,
                format!(
                    "configured stopwords ({} words) differ from the {} the model was trained with",
                    normalizer.stopwords().len(),
                    detector.normalizer.stopwords().len()
                ),
            ));
        }
        Ok(Self {
            normalizer,
            ..detector
        })
    }

    pub fn classify(&self, input_text: &str) -> PredictionResult {
        classify(input_text, &self.normalizer, &self.vectorizer, &self.model)
    }

    /// Reads a UTF-8 email body from disk and classifies it.
    pub fn classify_file(&self, path: impl AsRef<Path>) -> Result<PredictionResult> {
        let path = path.as_ref();
        ensure_input_file(path)?;
        let content = std::fs::read_to_string(path)?;
        Ok(self.classify(&content))
    }

    pub fn artifact_tag(&self) -> Option<&str> {
        self.artifact_tag.as_deref()
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vectorizer.dimension()
    }
}
