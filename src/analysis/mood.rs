//! Mood derived from community tags

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Sad,
    Happy,
    Energetic,
    Calm,
    Neutral,
}

/// Tag keywords per mood, checked in this order
const MOOD_KEYWORDS: [(Mood, [&str; 3]); 4] = [
    (Mood::Sad, ["sad", "depressing", "melancholic"]),
    (Mood::Happy, ["happy", "joyful", "uplifting"]),
    (Mood::Energetic, ["energetic", "party", "dance"]),
    (Mood::Calm, ["calm", "relaxing", "peaceful"]),
];

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Sad => "sad",
            Mood::Happy => "happy",
            Mood::Energetic => "energetic",
            Mood::Calm => "calm",
            Mood::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First mood with a keyword among `tags` (whole-tag, case-insensitive match)
pub fn mood_from_tags<S: AsRef<str>>(tags: &[S]) -> Mood {
    let normalized: Vec<String> = tags
        .iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .collect();

    MOOD_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| normalized.iter().any(|t| t == k)))
        .map(|(mood, _)| *mood)
        .unwrap_or(Mood::Neutral)
}
