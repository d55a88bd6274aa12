//! Genre label codec
//!
//! Maps genre names to dense class indices and back. Position `i` of the
//! model's output vector is the probability of `classes()[i]`, so the codec
//! saved with a model is the only valid interpretation of its outputs.

use crate::error::{GenreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bidirectional `genre <-> index` mapping in lexicographic order
///
/// Serializes as the ordered list of class names; deserializing rebuilds the
/// identical mapping and rejects duplicate entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelCodec {
    classes: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelCodec {
    /// Fit over a label sequence: distinct labels sorted, indexed `0..K`
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classes: Vec<String> = labels.into_iter().map(|l| l.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        Self::from_sorted_unique(classes)
    }

    fn from_sorted_unique(classes: Vec<String>) -> Self {
        let index = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self { classes, index }
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.index
            .get(label)
            .copied()
            .ok_or_else(|| GenreError::UnknownLabel(label.to_string()))
    }

    pub fn decode(&self, index: usize) -> Result<&str> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(GenreError::IndexOutOfRange {
                index,
                len: self.classes.len(),
            })
    }

    /// All known labels, in index order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl TryFrom<Vec<String>> for LabelCodec {
    type Error = String;

    fn try_from(classes: Vec<String>) -> std::result::Result<Self, Self::Error> {
        let codec = Self::from_sorted_unique(classes);
        if codec.index.len() != codec.classes.len() {
            return Err("duplicate class names in label codec".to_string());
        }
        Ok(codec)
    }
}

impl From<LabelCodec> for Vec<String> {
    fn from(codec: LabelCodec) -> Self {
        codec.classes
    }
}
