use crate::classifier::ModelParams;
use crate::error::{DetectorError, Result};
use crate::stopwords::StopwordSet;
use crate::vectorizer::VocabState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 2;
pub const VECTORIZER_FILE: &str = "vectorizer.json";
pub const CLASSIFIER_FILE: &str = "classifier.json";

const VECTORIZER_KIND: &str = "tfidf-vectorizer";
const CLASSIFIER_KIND: &str = "multinomial-naive-bayes";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    format_version: u32,
    kind: String,
    artifact_tag: String,
    payload: T,
}

/// The vectorizer artifact carries the stopword set the vocabulary was
/// fitted against, so preprocessing is pinned to the model.
#[derive(Debug, Serialize, Deserialize)]
struct VectorizerArtifact<V, S> {
    stopwords: S,
    vocab: V,
}

/// A vectorizer/classifier pair known to come from the same training run.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBundle {
    pub vocab: VocabState,
    pub stopwords: StopwordSet,
    pub model: ModelParams,
    pub artifact_tag: String,
}

/// SHA-256 over the format version and both serialized payloads.
fn compute_tag(vectorizer_json: &[u8], model_json: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(FORMAT_VERSION.to_le_bytes());
    hasher.update((vectorizer_json.len() as u64).to_le_bytes());
    hasher.update(vectorizer_json);
    hasher.update((model_json.len() as u64).to_le_bytes());
    hasher.update(model_json);
    hex::encode(hasher.finalize())
}

/// Writes both artifacts into `dir` and returns their shared tag.
///
/// Each file is written to a temporary sibling and renamed into place; a
/// reader that races a save sees mismatched tags and refuses the pair.
/// Temporary files are removed if any step fails.
pub fn save(
    vocab: &VocabState,
    stopwords: &StopwordSet,
    model: &ModelParams,
    dir: impl AsRef<Path>,
) -> Result<String> {
    let dir = dir.as_ref();
    if model.n_features != vocab.len() {
        return Err(DetectorError::InvalidTrainingData(format!(
            "classifier expects {} features but the vocabulary has {} terms",
            model.n_features,
            vocab.len()
        )));
    }

    fs::create_dir_all(dir)?;

    let vectorizer = VectorizerArtifact { stopwords, vocab };
    let vectorizer_json = serde_json::to_vec(&vectorizer)?;
    let model_json = serde_json::to_vec(model)?;
    let artifact_tag = compute_tag(&vectorizer_json, &model_json);

    let vectorizer_tmp = temp_path(dir, VECTORIZER_FILE);
    let classifier_tmp = temp_path(dir, CLASSIFIER_FILE);

    let written = write_envelope(&vectorizer_tmp, VECTORIZER_KIND, &artifact_tag, &vectorizer)
        .and_then(|()| write_envelope(&classifier_tmp, CLASSIFIER_KIND, &artifact_tag, model))
        .and_then(|()| {
            fs::rename(&vectorizer_tmp, dir.join(VECTORIZER_FILE)).map_err(DetectorError::from)
        })
        .and_then(|()| {
            fs::rename(&classifier_tmp, dir.join(CLASSIFIER_FILE)).map_err(DetectorError::from)
        });

    if let Err(e) = written {
        for tmp in [&vectorizer_tmp, &classifier_tmp] {
            if tmp.exists() {
                let _ = fs::remove_file(tmp);
            }
        }
        return Err(e);
    }

    log::info!(
        "Model and vectorizer saved to '{}' (tag {})",
        dir.display(),
        &artifact_tag[..12]
    );
    Ok(artifact_tag)
}

fn temp_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!(".{name}.tmp"))
}

fn write_envelope<T: Serialize>(
    path: &Path,
    kind: &str,
    artifact_tag: &str,
    payload: &T,
) -> Result<()> {
    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        kind: kind.to_string(),
        artifact_tag: artifact_tag.to_string(),
        payload,
    };
    fs::write(path, serde_json::to_vec_pretty(&envelope)?)?;
    Ok(())
}

/// Loads the pair from `dir`, failing with `ModelUnavailable` unless both
/// artifacts are present, well-formed and tagged as the same training run.
pub fn load(dir: impl AsRef<Path>) -> Result<ModelBundle> {
    let dir = dir.as_ref();

    let vectorizer: Envelope<VectorizerArtifact<VocabState, StopwordSet>> =
        read_envelope(dir, VECTORIZER_FILE, VECTORIZER_KIND)?;
    let classifier: Envelope<ModelParams> = read_envelope(dir, CLASSIFIER_FILE, CLASSIFIER_KIND)?;

    if vectorizer.artifact_tag != classifier.artifact_tag {
        return Err(DetectorError::model_unavailable(
            dir,
            format!(
                "{VECTORIZER_FILE} and {CLASSIFIER_FILE} come from different training runs"
            ),
        ));
    }

    let VectorizerArtifact { stopwords, vocab } = vectorizer.payload;
    let model = classifier.payload;
    if model.n_features != vocab.len()
        || model.feature_log_prob.iter().any(|row| row.len() != vocab.len())
    {
        return Err(DetectorError::model_unavailable(
            dir,
            format!(
                "classifier expects {} features but the vocabulary has {} terms",
                model.n_features,
                vocab.len()
            ),
        ));
    }

    log::debug!(
        "Loaded model pair from '{}' ({} terms, {} stopwords)",
        dir.display(),
        vocab.len(),
        stopwords.len()
    );

    Ok(ModelBundle {
        vocab,
        stopwords,
        model,
        artifact_tag: vectorizer.artifact_tag,
    })
}

fn read_envelope<T: DeserializeOwned>(dir: &Path, name: &str, kind: &str) -> Result<Envelope<T>> {
    let path = dir.join(name);
    let data = fs::read(&path).map_err(|e| {
        DetectorError::model_unavailable(dir, format!("cannot read {name}: {e}"))
    })?;

    // Check version and kind before the payload, so older artifacts report
    // their version instead of a parse error.
    let header: Envelope<serde::de::IgnoredAny> = serde_json::from_slice(&data)
        .map_err(|e| DetectorError::model_unavailable(dir, format!("{name} is corrupt: {e}")))?;
    if header.format_version != FORMAT_VERSION {
        return Err(DetectorError::model_unavailable(
            dir,
            format!(
                "{name} has format version {}, expected {FORMAT_VERSION}",
                header.format_version
            ),
        ));
    }
    if header.kind != kind {
        return Err(DetectorError::model_unavailable(
            dir,
            format!("{name} holds a '{}' artifact, expected '{kind}'", header.kind),
        ));
    }

    serde_json::from_slice(&data)
        .map_err(|e| DetectorError::model_unavailable(dir, format!("{name} is corrupt: {e}")))
}
