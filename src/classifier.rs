use crate::error::{DetectorError, Result};
use crate::label::Label;
use crate::vectorizer::SparseVector;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

/// Deterministic shuffled split of `0..n` into `(train, test)` indices.
///
/// The test side holds `ceil(n * test_fraction)` rows, capped so that at
/// least one row stays in training.
pub fn split_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));

    let wanted = (n as f64 * test_fraction.clamp(0.0, 1.0) - 1e-9).ceil().max(0.0) as usize;
    let test_len = wanted.min(n.saturating_sub(1));

    let train = indices.split_off(test_len);
    (train, indices)
}

/// Per-class `split_indices` over `labels`, returning `(train, test)` row
/// indices. Every class present keeps at least one row on the training side.
pub fn stratified_split(
    labels: &[Label],
    test_fraction: f64,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for class in Label::ALL {
        let rows: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == class)
            .map(|(row, _)| row)
            .collect();
        let (class_train, class_test) = split_indices(rows.len(), test_fraction, seed);
        train.extend(class_train.into_iter().map(|i| rows[i]));
        test.extend(class_test.into_iter().map(|i| rows[i]));
    }

    (train, test)
}

/// Learned multinomial Naive Bayes parameters. Arrays are indexed by `Label::index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub alpha: f64,
    pub n_features: usize,
    pub class_count: [usize; 2],
    pub class_log_prior: [f64; 2],
    pub feature_log_prob: [Vec<f64>; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: Label,
    /// Joint log likelihood per class.
    pub scores: [f64; 2],
    /// Softmax of `scores`; sums to one.
    pub probabilities: [f64; 2],
}

impl Prediction {
    pub fn probability(&self, label: Label) -> f64 {
        self.probabilities[label.index()]
    }
}

/// Multinomial Naive Bayes trainer with additive smoothing.
#[derive(Debug, Clone)]
pub struct NaiveBayes {
    alpha: f64,
}

impl NaiveBayes {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    /// `P(t|c) = (mass(t, c) + alpha) / (mass(c) + alpha * n_features)` where
    /// mass is the summed feature value of class-c documents.
    pub fn fit(
        &self,
        features: &[SparseVector],
        labels: &[Label],
        n_features: usize,
    ) -> Result<ModelParams> {
        if features.len() != labels.len() {
            return Err(DetectorError::InvalidTrainingData(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if features.is_empty() {
            return Err(DetectorError::EmptyCorpus);
        }
        if self.alpha.is_nan() || self.alpha <= 0.0 {
            return Err(DetectorError::InvalidTrainingData(format!(
                "smoothing alpha must be positive, got {}",
                self.alpha
            )));
        }

        let mut class_count = [0usize; 2];
        let mut feature_mass = [vec![0.0f64; n_features], vec![0.0f64; n_features]];

        for (row, label) in features.iter().zip(labels) {
            if row.dim() != n_features {
                return Err(DetectorError::InvalidTrainingData(format!(
                    "feature row has dimension {} but the model expects {n_features}",
                    row.dim()
                )));
            }
            let class = label.index();
            class_count[class] += 1;
            for &(column, value) in row.entries() {
                feature_mass[class][column] += value;
            }
        }

        if let Some(present) = single_class(&class_count) {
            return Err(DetectorError::SingleClass {
                label: present.to_string(),
            });
        }

        let total = features.len() as f64;
        let class_log_prior = class_count.map(|count| (count as f64 / total).ln());

        let feature_log_prob = feature_mass.map(|mass| {
            let denominator = (mass.iter().sum::<f64>() + self.alpha * n_features as f64).ln();
            mass.iter()
                .map(|m| (m + self.alpha).ln() - denominator)
                .collect::<Vec<f64>>()
        });

        log::debug!(
            "Fitted naive bayes over {n_features} features: {} phishing, {} safe",
            class_count[Label::Phishing.index()],
            class_count[Label::Safe.index()]
        );

        Ok(ModelParams {
            alpha: self.alpha,
            n_features,
            class_count,
            class_log_prior,
            feature_log_prob,
        })
    }
}

impl Default for NaiveBayes {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// The only class with a non-zero count, if exactly one is present.
pub(crate) fn single_class(class_count: &[usize; 2]) -> Option<Label> {
    let present: Vec<Label> = Label::ALL
        .into_iter()
        .filter(|label| class_count[label.index()] > 0)
        .collect();
    match present.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

impl ModelParams {
    pub fn joint_log_likelihood(&self, x: &SparseVector) -> [f64; 2] {
        let mut scores = self.class_log_prior;
        for &(column, value) in x.entries() {
            if column >= self.n_features {
                continue;
            }
            for (class, score) in scores.iter_mut().enumerate() {
                *score += value * self.feature_log_prob[class][column];
            }
        }
        scores
    }

    /// Argmax label (ties go to phishing) with softmax-normalized confidences.
    pub fn predict(&self, x: &SparseVector) -> Prediction {
        let scores = self.joint_log_likelihood(x);

        let max = scores[0].max(scores[1]);
        let exp = scores.map(|s| (s - max).exp());
        let sum: f64 = exp.iter().sum();
        let probabilities = exp.map(|e| e / sum);

        let label = if scores[Label::Safe.index()] > scores[Label::Phishing.index()] {
            Label::Safe
        } else {
            Label::Phishing
        };

        Prediction {
            label,
            scores,
            probabilities,
        }
    }

    pub fn predict_all(&self, rows: &[SparseVector]) -> Vec<Label> {
        rows.iter().map(|row| self.predict(row).label).collect()
    }
}
