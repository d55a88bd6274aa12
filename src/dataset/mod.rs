//! Labeled training data
//!
//! A [`Dataset`] is an ordered list of spectral features paired with their
//! genre label. It only exists for the duration of a training run.

pub mod builder;

pub use builder::{build, BuildOptions, DatasetBuild, SkippedTrack};

use crate::features::SpectralFeature;
use std::collections::HashMap;
use tracing::info;

/// Minimum examples a genre needs to survive into a stratified split
pub const MIN_EXAMPLES_PER_GENRE: usize = 2;

/// One training example
#[derive(Debug, Clone)]
pub struct LabeledExample {
    /// Catalog id the feature was extracted from
    pub track_id: u32,
    pub feature: SpectralFeature,
    pub label: String,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    examples: Vec<LabeledExample>,
}

impl Dataset {
    pub fn new(examples: Vec<LabeledExample>) -> Self {
        Self { examples }
    }

    pub fn push(&mut self, example: LabeledExample) {
        self.examples.push(example);
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn examples(&self) -> &[LabeledExample] {
        &self.examples
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.examples.iter().map(|e| e.label.as_str())
    }

    /// Distinct labels in the order they first appear
    pub fn labels_in_order(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for label in self.labels() {
            if !seen.iter().any(|s: &String| s == label) {
                seen.push(label.to_string());
            }
        }
        seen
    }

    /// Example count per label
    pub fn label_counts(&self) -> HashMap<&str, usize> {
        let mut counts = HashMap::new();
        for label in self.labels() {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    /// Drop every example whose label has fewer than `min_examples` examples
    ///
    /// Returns the dropped labels, sorted.
    pub fn retain_min_examples(&mut self, min_examples: usize) -> Vec<String> {
        let mut dropped: Vec<String> = self
            .label_counts()
            .into_iter()
            .filter(|&(_, count)| count < min_examples)
            .map(|(label, _)| label.to_string())
            .collect();
        dropped.sort();

        if !dropped.is_empty() {
            let before = self.examples.len();
            self.examples.retain(|e| !dropped.contains(&e.label));
            info!(
                "Dropped {} examples from {} genres with fewer than {} examples: {}",
                before - self.examples.len(),
                dropped.len(),
                min_examples,
                dropped.join(", ")
            );
        }

        dropped
    }
}
