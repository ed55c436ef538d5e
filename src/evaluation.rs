use crate::classifier::ModelParams;
use crate::label::Label;
use crate::vectorizer::SparseVector;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Held-out evaluation of a trained model. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    /// Indexed by `Label::index`.
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
    /// `confusion[actual][predicted]`
    pub confusion: [[usize; 2]; 2],
}

impl ClassificationReport {
    pub fn from_predictions(actual: &[Label], predicted: &[Label]) -> Self {
        let mut confusion = [[0usize; 2]; 2];
        for (a, p) in actual.iter().zip(predicted) {
            confusion[a.index()][p.index()] += 1;
        }

        let classes = Label::ALL.map(|label| {
            let i = label.index();
            let true_positive = confusion[i][i] as f64;
            let predicted_total = (confusion[0][i] + confusion[1][i]) as f64;
            let support = confusion[i][0] + confusion[i][1];

            let precision = ratio(true_positive, predicted_total);
            let recall = ratio(true_positive, support as f64);
            let f1 = ratio(2.0 * precision * recall, precision + recall);
            ClassMetrics {
                precision,
                recall,
                f1,
                support,
            }
        });

        let total: usize = classes.iter().map(|c| c.support).sum();
        let correct = confusion[0][0] + confusion[1][1];

        let macro_avg = ClassMetrics {
            precision: (classes[0].precision + classes[1].precision) / 2.0,
            recall: (classes[0].recall + classes[1].recall) / 2.0,
            f1: (classes[0].f1 + classes[1].f1) / 2.0,
            support: total,
        };
        let weight = |f: fn(&ClassMetrics) -> f64| {
            ratio(
                classes.iter().map(|c| f(c) * c.support as f64).sum(),
                total as f64,
            )
        };
        let weighted_avg = ClassMetrics {
            precision: weight(|c| c.precision),
            recall: weight(|c| c.recall),
            f1: weight(|c| c.f1),
            support: total,
        };

        Self {
            classes,
            accuracy: ratio(correct as f64, total as f64),
            macro_avg,
            weighted_avg,
            confusion,
        }
    }

    pub fn class(&self, label: Label) -> &ClassMetrics {
        &self.classes[label.index()]
    }

    pub fn support(&self) -> usize {
        self.macro_avg.support
    }
}

/// Scores `model` on held-out rows.
pub fn evaluate(model: &ModelParams, features: &[SparseVector], labels: &[Label]) -> ClassificationReport {
    let predicted = model.predict_all(features);
    ClassificationReport::from_predictions(labels, &predicted)
}

/// Zero when the denominator is zero, the usual convention for undefined metrics.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for label in Label::ALL {
            let m = self.class(label);
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                label.as_str(),
                m.precision,
                m.recall,
                m.f1,
                m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.support()
        )?;
        for (name, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label::{Phishing as P, Safe as S};

    #[test]
    fn test_metrics() {
        let actual = [P, P, P, P, S, S, S, S, S, S];
        let predicted = [P, P, P, S, S, S, S, S, P, P];
        let report = ClassificationReport::from_predictions(&actual, &predicted);

        let phishing = report.class(P);
        assert!((phishing.precision - 0.6).abs() < 1e-12);
        assert!((phishing.recall - 0.75).abs() < 1e-12);
        assert!((phishing.f1 - 2.0 * 0.6 * 0.75 / 1.35).abs() < 1e-12);
        assert_eq!(phishing.support, 4);

        let safe = report.class(S);
        assert!((safe.precision - 0.8).abs() < 1e-12);
        assert!((safe.recall - 4.0 / 6.0).abs() < 1e-12);
        assert_eq!(safe.support, 6);

        assert!((report.accuracy - 0.7).abs() < 1e-12);
        assert_eq!(report.confusion, [[3, 1], [2, 4]]);
        assert_eq!(report.support(), 10);
        assert!((report.macro_avg.precision - 0.7).abs() < 1e-12);
        assert!((report.weighted_avg.recall - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_empty_test_set() {
        let report = ClassificationReport::from_predictions(&[], &[]);
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.support(), 0);
        assert_eq!(report.class(P).f1, 0.0);
    }

    #[test]
    fn test_display_table() {
        let report = ClassificationReport::from_predictions(&[P, S], &[P, S]);
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("    phishing      1.00      1.00      1.00         1"));
        assert!(text.contains("accuracy"));
        assert!(text.contains("weighted avg"));
    }
}
