//! Lexicon-based financial sentiment scoring. Pure and deterministic for
//! identical input, so scores can be cached by content hash.

use crate::domain::values::sentiment::Sentiment;

/// Weighted financial lexicon. Weights are on a [-2.5, 2.5] scale and get
/// normalized into polarity at scoring time. Bigrams are matched before
/// unigrams so "buy the dip" never scores as a bare "dip".
const LEXICON: &[(&str, f64)] = &[
    ("bullish", 2.0),
    ("bearish", -2.0),
    ("rally", 1.5),
    ("crash", -2.5),
    ("surge", 1.5),
    ("plunge", -2.0),
    ("beat", 1.5),
    ("miss", -1.5),
    ("upgrade", 1.5),
    ("downgrade", -1.5),
    ("breakout", 1.5),
    ("selloff", -1.5),
    ("oversold", 1.0),
    ("overbought", -1.0),
    ("bounce", 1.0),
    ("rejection", -1.5),
    ("hawkish", -1.5),
    ("dovish", 1.5),
    ("tightening", -1.0),
    ("accommodative", 1.0),
    ("easing", 1.5),
    ("strong", 1.0),
    ("weak", -1.0),
    ("growth", 1.0),
    ("recession", -2.0),
    ("default", -2.0),
    ("bankruptcy", -2.5),
    ("dividend", 0.5),
    ("buyback", 1.0),
    ("layoffs", -1.5),
];

const BIGRAMS: &[(&str, f64)] = &[
    ("buy the dip", 1.5),
    ("sell off", -1.5),
    ("to the moon", 2.5),
    ("all time high", 1.5),
    ("all time low", -1.5),
    ("earnings beat", 2.0),
    ("earnings miss", -2.0),
    ("guidance cut", -2.0),
    ("guidance raise", 2.0),
];

const MAX_WEIGHT: f64 = 2.5;

/// Score text polarity and confidence. Empty or non-lexical input scores
/// `(0, 0)`; this never fails.
pub fn score(text: &str) -> Sentiment {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        return Sentiment::neutral();
    }

    let mut total = 0.0;
    let mut hits = 0usize;

    for (phrase, weight) in BIGRAMS {
        if lowered.contains(phrase) {
            total += weight;
            hits += 1;
        }
    }

    for token in &tokens {
        if let Some((_, weight)) = LEXICON.iter().find(|(term, _)| term == token) {
            total += weight;
            hits += 1;
        }
    }

    if hits == 0 {
        return Sentiment::neutral();
    }

    let polarity = (total / (hits as f64 * MAX_WEIGHT)).clamp(-1.0, 1.0);
    // Confidence grows with lexicon-hit density, saturating at 3 hits.
    let confidence = ((hits as f64) / 3.0).min(1.0);

    Sentiment { polarity, confidence }
}
