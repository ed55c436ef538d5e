use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Phishing,
    Safe,
}

impl Label {
    /// Fixed class order used for every per-class array in the model.
    pub const ALL: [Label; 2] = [Label::Phishing, Label::Safe];

    pub fn index(self) -> usize {
        match self {
            Label::Phishing => 0,
            Label::Safe => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Label> {
        Label::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Phishing => "phishing",
            Label::Safe => "safe",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps the label spellings found across source files onto the two classes.
///
/// Returns `None` for anything outside the alias table; callers drop the row.
pub fn normalize_label(raw: &str) -> Option<Label> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "phishing email" | "phishing" => Some(Label::Phishing),
        "0" | "safe email" | "safe" => Some(Label::Safe),
        _ => None,
    }
}
