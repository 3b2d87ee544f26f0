//! Lexical keyword scorer. Maps free text to a bounded adjustment used by
//! both the local sentiment heuristic and the NPS predictor.

const POSITIVE_KEYWORDS: &[&str] = &[
    "excellent",
    "amazing",
    "great",
    "wonderful",
    "fantastic",
    "love",
    "perfect",
    "outstanding",
    "brilliant",
    "superb",
    "exceptional",
    "satisfied",
    "happy",
    "pleased",
    "impressed",
    "recommend",
    "best",
    "awesome",
    "incredible",
];

const NEGATIVE_KEYWORDS: &[&str] = &[
    "terrible",
    "awful",
    "horrible",
    "disappointed",
    "frustrated",
    "angry",
    "hate",
    "worst",
    "bad",
    "poor",
    "unacceptable",
    "disgusted",
    "annoyed",
    "upset",
    "displeased",
    "unsatisfied",
    "broken",
    "failed",
    "useless",
];

/// Score the message content in [-2.0, 2.0]: +0.5 per positive keyword
/// present, -0.5 per negative keyword, clamped.
///
/// Matching is plain substring containment with no word boundaries, so
/// e.g. "dissatisfied" also matches "satisfied". That imprecision is a
/// deliberate part of the contract, not something to fix here.
pub fn content_adjustment(text: &str) -> f64 {
    let lower = text.to_lowercase();

    let mut adjustment: f64 = 0.0;
    for keyword in POSITIVE_KEYWORDS {
        if lower.contains(keyword) {
            adjustment += 0.5;
        }
    }
    for keyword in NEGATIVE_KEYWORDS {
        if lower.contains(keyword) {
            adjustment -= 0.5;
        }
    }

    adjustment.clamp(-2.0, 2.0)
}
