//! Landmark guesses from recognized text

use crate::landmark::{DetectedLandmark, Provenance};

/// Confidence assigned to text-derived candidates
pub const TEXT_HEURISTIC_CONFIDENCE: f64 = 50.0;

const MAX_NAME_LEN: usize = 80;

const LANDMARK_WORDS: &[&str] = &[
    "temple",
    "fort",
    "palace",
    "sanctuary",
    "cathedral",
    "church",
    "mosque",
    "monastery",
    "stupa",
    "shrine",
    "pagoda",
    "basilica",
    "castle",
    "tower",
    "monument",
    "memorial",
    "museum",
    "gate",
    "bridge",
    "national park",
];

fn has_landmark_word(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .any(|word| LANDMARK_WORDS.contains(&word))
        || lower.contains("national park")
}

/// Build a coordinate-less candidate from the first line of `text` that
/// names a kind of landmark
pub fn landmark_from_text(text: &str) -> Option<DetectedLandmark> {
    let line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && has_landmark_word(line))?;

    let name: String = line.chars().take(MAX_NAME_LEN).collect();
    Some(DetectedLandmark::new(
        name,
        TEXT_HEURISTIC_CONFIDENCE,
        None,
        Provenance::TextHeuristic,
    ))
}
