//! Stratified train/validation split

use crate::error::{GenreError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Example indices assigned to each side of the split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Split example indices so every class keeps its proportion on both sides
///
/// Each class with `n` examples sends `round(n * validation_fraction)` of
/// them to validation, clamped to `[1, n - 1]`. Classes with fewer than two
/// examples cannot be split and are an error.
pub fn stratified_split(labels: &[usize], validation_fraction: f64, seed: u64) -> Result<Split> {
    if !(validation_fraction > 0.0 && validation_fraction < 1.0) {
        return Err(GenreError::TrainingError(format!(
            "validation fraction must be in (0, 1), got {}",
            validation_fraction
        )));
    }

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut split = Split {
        train: Vec::with_capacity(labels.len()),
        validation: Vec::new(),
    };

    for (class, mut members) in by_class {
        let n = members.len();
        if n < 2 {
            return Err(GenreError::TrainingError(format!(
                "class {} has {} example(s); stratified split needs at least 2",
                class, n
            )));
        }

        let n_val = ((n as f64 * validation_fraction).round() as usize).clamp(1, n - 1);
        members.shuffle(&mut rng);
        split.validation.extend_from_slice(&members[..n_val]);
        split.train.extend_from_slice(&members[n_val..]);
    }

    split.train.sort_unstable();
    split.validation.sort_unstable();
    Ok(split)
}
