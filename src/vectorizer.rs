use crate::error::{DetectorError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Splits text into lowercased word tokens of two or more word characters.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    word_regex: Regex,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            word_regex: Regex::new(r"\b\w\w+\b").unwrap(),
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.word_regex
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Sparse document vector; entries are sorted by column and never exceed `dim`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseVector {
    dim: usize,
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn get(&self, column: usize) -> f64 {
        self.entries
            .binary_search_by_key(&column, |(c, _)| *c)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt()
    }
}

/// Learned vocabulary and smoothed IDF weights.
///
/// Columns are assigned in lexicographic term order, so the same corpus
/// always produces the same layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "VocabData", into = "VocabData")]
pub struct VocabState {
    terms: Vec<String>,
    idf: Vec<f64>,
    index: HashMap<String, usize>,
    n_documents: usize,
}

#[derive(Serialize, Deserialize)]
struct VocabData {
    n_documents: usize,
    terms: Vec<String>,
    idf: Vec<f64>,
}

impl TryFrom<VocabData> for VocabState {
    type Error = String;

    fn try_from(data: VocabData) -> std::result::Result<Self, Self::Error> {
        if data.terms.len() != data.idf.len() {
            return Err(format!(
                "vocabulary has {} terms but {} idf weights",
                data.terms.len(),
                data.idf.len()
            ));
        }
        let index: HashMap<String, usize> = data
            .terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();
        if index.len() != data.terms.len() {
            return Err("vocabulary contains duplicate terms".to_string());
        }
        Ok(VocabState {
            terms: data.terms,
            idf: data.idf,
            index,
            n_documents: data.n_documents,
        })
    }
}

impl From<VocabState> for VocabData {
    fn from(state: VocabState) -> Self {
        VocabData {
            n_documents: state.n_documents,
            terms: state.terms,
            idf: state.idf,
        }
    }
}

impl VocabState {
    /// Learns the vocabulary and `idf(t) = ln((1 + N) / (1 + df(t))) + 1`.
    pub fn fit<S: AsRef<str>>(documents: &[S], tokenizer: &Tokenizer) -> Result<Self> {
        if documents.is_empty() {
            return Err(DetectorError::EmptyCorpus);
        }

        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for doc in documents {
            let unique: HashSet<String> = tokenizer.tokenize(doc.as_ref()).into_iter().collect();
            for term in unique {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        if document_frequency.is_empty() {
            return Err(DetectorError::EmptyVocabulary);
        }

        let n = documents.len() as f64;
        let mut terms = Vec::with_capacity(document_frequency.len());
        let mut idf = Vec::with_capacity(document_frequency.len());
        let mut index = HashMap::with_capacity(document_frequency.len());
        for (column, (term, df)) in document_frequency.into_iter().enumerate() {
            idf.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
            index.insert(term.clone(), column);
            terms.push(term);
        }

        Ok(Self {
            terms,
            idf,
            index,
            n_documents: documents.len(),
        })
    }

    /// TF-IDF vector of `text`, L2-normalized. Unknown terms are ignored.
    pub fn transform(&self, tokenizer: &Tokenizer, text: &str) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for token in tokenizer.tokenize(text) {
            if let Some(&column) = self.index.get(&token) {
                *counts.entry(column).or_insert(0.0) += 1.0;
            }
        }

        let mut entries: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(column, tf)| (column, tf * self.idf[column]))
            .collect();
        entries.sort_by_key(|(column, _)| *column);

        let norm = entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, value) in &mut entries {
                *value /= norm;
            }
        }

        SparseVector {
            dim: self.terms.len(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn n_documents(&self) -> usize {
        self.n_documents
    }

    pub fn column(&self, term: &str) -> Option<usize> {
        self.index.get(term).copied()
    }

    pub fn term(&self, column: usize) -> Option<&str> {
        self.terms.get(column).map(String::as_str)
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.column(term).map(|column| self.idf[column])
    }
}

/// A fitted vocabulary paired with the tokenizer that produced it.
#[derive(Debug, Clone)]
pub struct TfIdfVectorizer {
    tokenizer: Tokenizer,
    vocab: VocabState,
}

impl TfIdfVectorizer {
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Result<Self> {
        let tokenizer = Tokenizer::new();
        let vocab = VocabState::fit(documents, &tokenizer)?;
        log::debug!(
            "Fitted vocabulary of {} terms over {} documents",
            vocab.len(),
            vocab.n_documents()
        );
        Ok(Self { tokenizer, vocab })
    }

    pub fn from_state(vocab: VocabState) -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            vocab,
        }
    }

    pub fn transform(&self, text: &str) -> SparseVector {
        self.vocab.transform(&self.tokenizer, text)
    }

    pub fn transform_all<S: AsRef<str>>(&self, documents: &[S]) -> Vec<SparseVector> {
        documents.iter().map(|d| self.transform(d.as_ref())).collect()
    }

    pub fn dimension(&self) -> usize {
        self.vocab.len()
    }

    pub fn vocab(&self) -> &VocabState {
        &self.vocab
    }

    pub fn into_state(self) -> VocabState {
        self.vocab
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCS: [&str; 3] = [
        "verify your password urgent",
        "meeting invoice attached",
        "urgent meeting today",
    ];

    #[test]
    fn test_tokenizer() {
        let tokenizer = Tokenizer::new();
        assert_eq!(
            tokenizer.tokenize("Hello, WORLD! a b c9 x_y 42"),
            vec!["hello", "world", "c9", "x_y", "42"]
        );
        assert!(tokenizer.tokenize("").is_empty());
    }

    #[test]
    fn test_fit_vocabulary_and_idf() {
        let vectorizer = TfIdfVectorizer::fit(&DOCS).unwrap();
        let vocab = vectorizer.vocab();

        assert_eq!(vocab.len(), 8);
        assert_eq!(vocab.n_documents(), 3);
        assert_eq!(vocab.term(0), Some("attached"));
        assert_eq!(vocab.column("your"), Some(7));

        // df("urgent") = 2, df("password") = 1
        let expected_urgent = (4.0f64 / 3.0).ln() + 1.0;
        let expected_password = (4.0f64 / 2.0).ln() + 1.0;
        assert!((vocab.idf("urgent").unwrap() - expected_urgent).abs() < 1e-12);
        assert!((vocab.idf("password").unwrap() - expected_password).abs() < 1e-12);
    }

    #[test]
    fn test_transform_is_l2_normalized() {
        let vectorizer = TfIdfVectorizer::fit(&DOCS).unwrap();
        let vector = vectorizer.transform("urgent urgent password");
        assert_eq!(vector.dim(), 8);
        assert_eq!(vector.nnz(), 2);
        assert!((vector.norm() - 1.0).abs() < 1e-12);

        let idf_urgent = vectorizer.vocab().idf("urgent").unwrap();
        let idf_password = vectorizer.vocab().idf("password").unwrap();
        let ratio = vector.get(vectorizer.vocab().column("urgent").unwrap())
            / vector.get(vectorizer.vocab().column("password").unwrap());
        assert!((ratio - 2.0 * idf_urgent / idf_password).abs() < 1e-12);
    }

    #[test]
    fn test_unseen_terms_do_not_change_dimension() {
        let vectorizer = TfIdfVectorizer::fit(&DOCS).unwrap();
        let before = vectorizer.dimension();

        let unseen = vectorizer.transform("completely novel vocabulary here");
        assert_eq!(unseen.dim(), before);
        assert_eq!(unseen.nnz(), 0);
        assert_eq!(unseen.norm(), 0.0);

        let mixed = vectorizer.transform("novel urgent");
        assert_eq!(mixed.nnz(), 1);
        assert_eq!(vectorizer.dimension(), before);
        assert!(vectorizer.vocab().column("novel").is_none());
    }

    #[test]
    fn test_fit_errors() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            TfIdfVectorizer::fit(&empty),
            Err(DetectorError::EmptyCorpus)
        ));
        assert!(matches!(
            TfIdfVectorizer::fit(&["", "a b"]),
            Err(DetectorError::EmptyVocabulary)
        ));
    }

    #[test]
    fn test_state_serde_rebuilds_index() {
        let vectorizer = TfIdfVectorizer::fit(&DOCS).unwrap();
        let json = serde_json::to_string(vectorizer.vocab()).unwrap();
        let restored: VocabState = serde_json::from_str(&json).unwrap();
        assert_eq!(&restored, vectorizer.vocab());

        let reloaded = TfIdfVectorizer::from_state(restored);
        assert_eq!(
            reloaded.transform("urgent meeting"),
            vectorizer.transform("urgent meeting")
        );
    }

    #[test]
    fn test_state_rejects_inconsistent_data() {
        let json = r#"{"n_documents":1,"terms":["a","b"],"idf":[1.0]}"#;
        assert!(serde_json::from_str::<VocabState>(json).is_err());
        let json = r#"{"n_documents":1,"terms":["aa","aa"],"idf":[1.0,1.0]}"#;
        assert!(serde_json::from_str::<VocabState>(json).is_err());
    }
}
