//! Language utilities for ISO language tags
//!
//! Validates the source and target tags from the configuration and resolves
//! them to English names for translation prompts. Accepts ISO 639-1,
//! ISO 639-2/T, ISO 639-2/B and region-qualified tags such as `en-US`.

use anyhow::{Result, anyhow};
use isolang::Language;

/// ISO 639-2/B codes that differ from their ISO 639-2/T counterpart
const PART2B_TO_PART2T: &[(&str, &str)] = &[
    ("tib", "bod"), // Tibetan
    ("chi", "zho"), // Chinese
    ("fre", "fra"), // French
    ("ger", "deu"), // German
    ("dut", "nld"), // Dutch
    ("gre", "ell"), // Greek
    ("cze", "ces"), // Czech
    ("ice", "isl"), // Icelandic
    ("arm", "hye"), // Armenian
    ("bur", "mya"), // Burmese
    ("per", "fas"), // Persian
    ("geo", "kat"), // Georgian
    ("may", "msa"), // Malay
    ("rum", "ron"), // Romanian
    ("slo", "slk"), // Slovak
    ("wel", "cym"), // Welsh
];

/// Strip a region or script subtag (`en-US` -> `en`, `zh_Hant` -> `zh`)
fn primary_subtag(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Normalize a language tag to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let primary = primary_subtag(code);

    match primary.len() {
        2 => Language::from_639_1(&primary)
            .map(|lang| lang.to_639_3().to_string())
            .ok_or_else(|| anyhow!("Invalid language code: {}", code)),
        3 => {
            let part2t = PART2B_TO_PART2T
                .iter()
                .find(|(b, _)| *b == primary)
                .map(|(_, t)| *t)
                .unwrap_or(primary.as_str());

            Language::from_639_3(part2t)
                .map(|lang| lang.to_639_3().to_string())
                .ok_or_else(|| anyhow!("Invalid language code: {}", code))
        }
        _ => Err(anyhow!("Invalid language code: {}", code)),
    }
}

/// Validate a language tag
pub fn validate_language_code(code: &str) -> Result<()> {
    normalize_to_part2t(code).map(|_| ())
}

/// Check if two language tags represent the same language
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (normalize_to_part2t(code1), normalize_to_part2t(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the English language name for a tag
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_to_part2t(code)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}
