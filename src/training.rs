use crate::classifier::{single_class, stratified_split, ModelParams, NaiveBayes};
use crate::config::{DetectorConfig, TrainingConfig};
use crate::corpus::{BuildReport, CorpusBuilder, CorpusSource, LabeledCorpus};
use crate::error::{DetectorError, Result};
use crate::evaluation::{evaluate, ClassificationReport};
use crate::inference::PhishingDetector;
use crate::label::Label;
use crate::normalization::TextNormalizer;
use crate::persistence;
use crate::schema::SchemaMapper;
use crate::stopwords::StopwordSet;
use crate::vectorizer::TfIdfVectorizer;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub build: BuildReport,
    pub corpus_size: usize,
    pub phishing_count: usize,
    pub safe_count: usize,
    pub vocabulary_size: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub evaluation: ClassificationReport,
    pub artifact_tag: Option<String>,
}

/// Output of a training run kept in memory.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub vectorizer: TfIdfVectorizer,
    pub model: ModelParams,
    pub summary: TrainingSummary,
}

impl TrainedModel {
    pub fn into_detector(self, normalizer: TextNormalizer) -> PhishingDetector {
        PhishingDetector::new(normalizer, self.vectorizer, self.model)
    }
}

/// End-to-end training: corpus build, TF-IDF fit, seeded split, Naive Bayes
/// fit and held-out evaluation.
pub struct TrainingPipeline {
    builder: CorpusBuilder,
    settings: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(builder: CorpusBuilder, settings: TrainingConfig) -> Self {
        Self { builder, settings }
    }

    pub fn from_config(config: &DetectorConfig) -> Result<Self> {
        config.validate()?;
        let stopwords = StopwordSet::resolve(config.stopwords_file.as_deref())?;
        let mapper = SchemaMapper::new(&config.corpus.body_aliases, &config.corpus.label_aliases);
        let builder = CorpusBuilder::new(mapper, TextNormalizer::new(stopwords))
            .parallel(config.corpus.parallel);
        Ok(Self::new(builder, config.training.clone()))
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        self.builder.normalizer()
    }

    pub fn train(&self, source: &dyn CorpusSource) -> Result<TrainedModel> {
        let (corpus, build) = self.builder.build(source)?;
        self.train_corpus(&corpus, build)
    }

    /// Trains and persists; nothing is written if any step before saving fails.
    pub fn train_and_save(
        &self,
        source: &dyn CorpusSource,
        model_dir: impl AsRef<Path>,
    ) -> Result<TrainedModel> {
        let mut trained = self.train(source)?;
        let tag = persistence::save(
            trained.vectorizer.vocab(),
            self.normalizer().stopwords(),
            &trained.model,
            model_dir,
        )?;
        trained.summary.artifact_tag = Some(tag);
        Ok(trained)
    }

    pub fn train_corpus(&self, corpus: &LabeledCorpus, build: BuildReport) -> Result<TrainedModel> {
        let counts = corpus.class_counts();
        if let Some(only) = single_class(&counts) {
            return Err(DetectorError::SingleClass {
                label: only.to_string(),
            });
        }

        let normalizer = self.builder.normalizer();
        let documents: Vec<String> = corpus
            .records()
            .iter()
            .map(|record| normalizer.remove_stopwords(&record.body_clean))
            .collect();
        let labels = corpus.labels();

        let vectorizer = TfIdfVectorizer::fit(&documents)?;
        let features = vectorizer.transform_all(&documents);

        let (train_idx, test_idx) =
            stratified_split(&labels, self.settings.test_fraction, self.settings.seed);
        let pick = |indices: &[usize]| {
            (
                indices.iter().map(|&i| features[i].clone()).collect::<Vec<_>>(),
                indices.iter().map(|&i| labels[i]).collect::<Vec<_>>(),
            )
        };
        let (train_x, train_y) = pick(&train_idx);
        let (test_x, test_y) = pick(&test_idx);

        log::info!(
            "Training on {} rows, evaluating on {} rows ({} terms)",
            train_x.len(),
            test_x.len(),
            vectorizer.dimension()
        );

        let model = NaiveBayes::new(self.settings.smoothing_alpha).fit(
            &train_x,
            &train_y,
            vectorizer.dimension(),
        )?;
        let evaluation = evaluate(&model, &test_x, &test_y);

        let summary = TrainingSummary {
            build,
            corpus_size: corpus.len(),
            phishing_count: counts[Label::Phishing.index()],
            safe_count: counts[Label::Safe.index()],
            vocabulary_size: vectorizer.dimension(),
            train_size: train_x.len(),
            test_size: test_x.len(),
            evaluation,
            artifact_tag: None,
        };

        Ok(TrainedModel {
            vectorizer,
            model,
            summary,
        })
    }
}

impl Default for TrainingPipeline {
    fn default() -> Self {
        Self::new(CorpusBuilder::default(), TrainingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::MemorySource;
    use crate::persistence::{CLASSIFIER_FILE, VECTORIZER_FILE};

    fn synthetic_csv() -> String {
        let mut csv = String::from("Email Text,Email Type\n");
        let safe = [
            "Agenda for the team meeting on Monday",
            "Invoice 1043 attached for your records",
            "Can we move the meeting to Thursday",
            "The invoice was paid yesterday",
            "Notes from the meeting are in the shared folder",
            "Please review the attached invoice",
            "Meeting room booked for the quarterly review",
            "Invoice totals look correct to me",
            "Reminder: project meeting after lunch",
            "Updated invoice with the new address",
        ];
        let phishing = [
            "Urgent: verify your password immediately",
            "Your account is locked, verify your password",
            "Urgent action required to verify billing",
            "Verify your identity or lose access, urgent",
            "Password expired, urgent reset needed",
            "We detected unusual activity, verify now",
            "Urgent security alert: confirm your password",
            "Final notice: verify your account urgently",
            "Your password will be disabled, verify today",
            "Urgent: update password at http://login.example",
        ];
        for text in safe {
            csv.push_str(&format!("\"{text}\",Safe Email\n"));
        }
        for text in phishing {
            csv.push_str(&format!("\"{text}\",Phishing Email\n"));
        }
        csv
    }

    fn pipeline() -> TrainingPipeline {
        let settings = TrainingConfig {
            test_fraction: 0.2,
            seed: 42,
            smoothing_alpha: 1.0,
        };
        TrainingPipeline::new(CorpusBuilder::default(), settings)
    }

    #[test]
    fn test_trained_model_flags_phishing() {
        let source = MemorySource::new().with_file("emails.csv", synthetic_csv());
        let trained = pipeline().train(&source).unwrap();

        assert_eq!(trained.summary.corpus_size, 20);
        assert_eq!(trained.summary.phishing_count, 10);
        assert_eq!(trained.summary.safe_count, 10);
        assert_eq!(trained.summary.test_size, 4);
        assert_eq!(trained.summary.train_size, 16);
        assert_eq!(trained.summary.evaluation.support(), 4);

        let detector = trained.into_detector(TextNormalizer::default());
        let result = detector.classify("urgent verify your password now");
        assert_eq!(result.predicted_label, Label::Phishing);
        assert!(result.confidence_for(Label::Phishing) > 0.5);

        let result = detector.classify("the meeting invoice is attached");
        assert_eq!(result.predicted_label, Label::Safe);
    }

    #[test]
    fn test_training_is_reproducible() {
        let source = MemorySource::new().with_file("emails.csv", synthetic_csv());
        let first = pipeline().train(&source).unwrap();
        let second = pipeline().train(&source).unwrap();
        assert_eq!(first.model, second.model);
        assert_eq!(first.summary.evaluation, second.summary.evaluation);
    }

    #[test]
    fn test_empty_corpus_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("model");
        let source = MemorySource::new().with_file("bad.csv", "subject,sender\nhi,me\n");

        let result = pipeline().train_and_save(&source, &model_dir);
        assert!(matches!(result, Err(DetectorError::EmptyCorpus)));
        assert!(!model_dir.exists());
    }

    #[test]
    fn test_single_class_corpus_fails() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("model");
        let source = MemorySource::new().with_file(
            "phish.csv",
            "body,label\nverify your password,1\nurgent account notice,1\nclick to unlock,1\n",
        );

        let result = pipeline().train_and_save(&source, &model_dir);
        match result {
            Err(DetectorError::SingleClass { label }) => assert_eq!(label, "phishing"),
            other => panic!("expected single-class error, got {:?}", other.map(|t| t.summary)),
        }
        assert!(!model_dir.exists());
    }

    #[test]
    fn test_two_row_corpus_trains() {
        let source = MemorySource::new()
            .with_file("tiny.csv", "body,label\nverify password,1\nmeeting agenda,0\n");

        let trained = pipeline().train(&source).unwrap();
        assert_eq!(trained.summary.train_size, 2);
        assert_eq!(trained.summary.test_size, 0);
        assert_eq!(trained.model.class_count, [1, 1]);
    }

    #[test]
    fn test_rare_class_stays_in_training() {
        let mut csv = String::from("body,label\n");
        for i in 0..9 {
            csv.push_str(&format!("urgent verify password {i},1\n"));
        }
        csv.push_str("meeting agenda attached,0\n");
        let source = MemorySource::new().with_file("skewed.csv", csv);

        for seed in 0..10 {
            let settings = TrainingConfig {
                test_fraction: 0.5,
                seed,
                smoothing_alpha: 1.0,
            };
            let pipeline = TrainingPipeline::new(CorpusBuilder::default(), settings);
            let trained = pipeline.train(&source).unwrap();
            assert_eq!(trained.model.class_count[Label::Safe.index()], 1);
        }
    }

    #[test]
    fn test_persisted_model_keeps_training_stopwords() {
        let dir = tempfile::tempdir().unwrap();
        let stopwords = dir.path().join("stopwords.txt");
        std::fs::write(&stopwords, "zzz\n").unwrap();
        let model_dir = dir.path().join("model");

        let config = DetectorConfig {
            stopwords_file: Some(stopwords),
            ..DetectorConfig::default()
        };
        let pipeline = TrainingPipeline::from_config(&config).unwrap();
        let source = MemorySource::new().with_file("emails.csv", synthetic_csv());
        let trained = pipeline.train_and_save(&source, &model_dir).unwrap();
        let in_memory = trained.into_detector(pipeline.normalizer().clone());

        let loaded = PhishingDetector::load(&model_dir).unwrap();
        let text = "your your meeting";
        assert_eq!(loaded.classify(text), in_memory.classify(text));
        assert_eq!(loaded.classify(text).normalized_text, "your your meeting");

        let mismatched =
            PhishingDetector::load_with_normalizer(&model_dir, TextNormalizer::default());
        assert!(matches!(mismatched, Err(DetectorError::ModelUnavailable { .. })));
    }

    #[test]
    fn test_train_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemorySource::new().with_file("emails.csv", synthetic_csv());

        let trained = pipeline().train_and_save(&source, dir.path()).unwrap();
        assert!(dir.path().join(VECTORIZER_FILE).exists());
        assert!(dir.path().join(CLASSIFIER_FILE).exists());
        let tag = trained.summary.artifact_tag.clone().unwrap();

        let loaded = PhishingDetector::load(dir.path()).unwrap();
        assert_eq!(loaded.artifact_tag(), Some(tag.as_str()));

        let in_memory = trained.into_detector(TextNormalizer::default());
        for probe in [
            "urgent verify your password now",
            "meeting notes attached",
            "",
            "completely unrelated gardening tips",
        ] {
            let a = in_memory.classify(probe);
            let b = loaded.classify(probe);
            assert_eq!(a.predicted_label, b.predicted_label);
            for label in Label::ALL {
                assert_eq!(
                    a.confidence_for(label).to_bits(),
                    b.confidence_for(label).to_bits()
                );
            }
        }
    }

    #[test]
    fn test_from_config_uses_custom_stopwords() {
        let dir = tempfile::tempdir().unwrap();
        let stopwords = dir.path().join("stopwords.txt");
        std::fs::write(&stopwords, "meeting\n").unwrap();

        let config = DetectorConfig {
            stopwords_file: Some(stopwords),
            ..DetectorConfig::default()
        };
        let pipeline = TrainingPipeline::from_config(&config).unwrap();
        assert_eq!(pipeline.normalizer().preprocess("the meeting"), "the");
    }
}
