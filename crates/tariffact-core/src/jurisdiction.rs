//! Per-jurisdiction product-code rules.
//!
//! Issuing authorities cite product codes at different granularities and in
//! different surface shapes, so code validation and document-text scanning
//! are strategy methods rather than one global pattern. Everything else in
//! the pipeline is jurisdiction-independent.

use std::sync::LazyLock;

use regex::Regex;

/// Code handling for one issuing jurisdiction.
pub trait Jurisdiction: Send + Sync {
    /// Canonical display name, also persisted as `issuing_jurisdiction`.
    fn name(&self) -> &'static str;

    /// Validate and canonicalize a single extracted code, or reject it.
    fn validate_code(&self, raw: &str) -> Option<String>;

    /// Scan raw document text for every code citation, in reading order,
    /// first occurrence only.
    fn scan_codes(&self, text: &str) -> Vec<String>;

    /// Whether discovered codes multiply extracted records combinatorially.
    /// Jurisdictions whose notices pair codes with rulings inline do not
    /// expand.
    fn expands_codes(&self) -> bool {
        false
    }

    /// Jurisdiction-specific guidance appended to the extraction request.
    fn extraction_hint(&self) -> &'static str {
        ""
    }
}

/// Scan `text` with `pattern`, keep codes that validate, drop repeats.
fn scan_with(j: &dyn Jurisdiction, pattern: &Regex, text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for m in pattern.find_iter(text) {
        if let Some(code) = j.validate_code(m.as_str())
            && seen.insert(code.clone())
        {
            out.push(code);
        }
    }
    out
}

// ── United States ──

/// HTSUS citations: chapter 72/73 only, 4.2-digit stem plus a 2-to-4-digit
/// statistical suffix. Bare six-digit sub-headers are too coarse to name a
/// dutiable product and reject.
pub struct UnitedStates;

static US_SCAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b7[23]\d{2}\.\d{2}\.\d{2,4}\b").unwrap());
static US_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}\.\d{2}\.\d{2,4}$").unwrap());

impl Jurisdiction for UnitedStates {
    fn name(&self) -> &'static str {
        "United States"
    }

    fn validate_code(&self, raw: &str) -> Option<String> {
        let code = raw.trim();
        if code.chars().any(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        if !(code.starts_with("72") || code.starts_with("73")) {
            return None;
        }
        US_SHAPE.is_match(code).then(|| code.to_string())
    }

    fn scan_codes(&self, text: &str) -> Vec<String> {
        scan_with(self, &US_SCAN, text)
    }

    fn expands_codes(&self) -> bool {
        true
    }

    fn extraction_hint(&self) -> &'static str {
        "Federal Register notices list HTSUS subheadings separately from the \
         per-company rate tables; extract company rates even when no code \
         appears on the same page."
    }
}

// ── European Union ──

/// CN codes: eight digits, cited with dot or space group separators.
pub struct EuropeanUnion;

static EU_SCAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}[ .]?\d{2}[ .]?\d{2}\b").unwrap());

impl Jurisdiction for EuropeanUnion {
    fn name(&self) -> &'static str {
        "EU"
    }

    fn validate_code(&self, raw: &str) -> Option<String> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.len() == 8 && raw.chars().all(|c| c.is_ascii_digit() || c == ' ' || c == '.') {
            Some(digits)
        } else {
            None
        }
    }

    fn scan_codes(&self, text: &str) -> Vec<String> {
        scan_with(self, &EU_SCAN, text)
    }

    fn extraction_hint(&self) -> &'static str {
        "Implementing regulations pair CN codes and TARIC additional codes \
         with each company row; keep that pairing."
    }
}

// ── Malaysia ──

/// Malaysian gazette codes: `NNNN.NN.NN` with an optional space-separated
/// national suffix, steel chapters only.
pub struct Malaysia;

static MY_SCAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b7[23]\d{2}\.\d{2}\.\d{2}(?: \d{2})?\b").unwrap());
static MY_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}\.\d{2}\.\d{2}(?: \d{2})?$").unwrap());

impl Jurisdiction for Malaysia {
    fn name(&self) -> &'static str {
        "Malaysia"
    }

    fn validate_code(&self, raw: &str) -> Option<String> {
        let code = raw.trim();
        if !(code.starts_with("72") || code.starts_with("73")) {
            return None;
        }
        MY_SHAPE.is_match(code).then(|| code.to_string())
    }

    fn scan_codes(&self, text: &str) -> Vec<String> {
        scan_with(self, &MY_SCAN, text)
    }

    fn expands_codes(&self) -> bool {
        true
    }

    fn extraction_hint(&self) -> &'static str {
        "Gazette orders list affected tariff codes in a schedule and duty \
         rates per exporter in a separate table."
    }
}

// ── Fallback ──

/// Any jurisdiction without bespoke rules: accept plausibly shaped HS codes
/// of six to ten digits and leave expansion off.
pub struct Generic;

static GENERIC_SCAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}\.\d{2}(?:\.\d{2,4})?\b").unwrap());

impl Jurisdiction for Generic {
    fn name(&self) -> &'static str {
        "Generic"
    }

    fn validate_code(&self, raw: &str) -> Option<String> {
        let code = raw.trim();
        if code.chars().any(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        let digits = code.chars().filter(char::is_ascii_digit).count();
        let shape_ok = code.chars().all(|c| c.is_ascii_digit() || c == '.');
        ((6..=10).contains(&digits) && shape_ok).then(|| code.to_string())
    }

    fn scan_codes(&self, text: &str) -> Vec<String> {
        scan_with(self, &GENERIC_SCAN, text)
    }
}

// ── Selection ──

static UNITED_STATES: UnitedStates = UnitedStates;
static EUROPEAN_UNION: EuropeanUnion = EuropeanUnion;
static MALAYSIA: Malaysia = Malaysia;
static GENERIC: Generic = Generic;

/// Jurisdiction prefixes recognized in source file names. The first match
/// wins; anything else falls back to [`Generic`].
const PREFIXES: &[(&str, &str)] = &[
    ("usa", "United States"),
    ("us", "United States"),
    ("eu", "EU"),
    ("malaysia", "Malaysia"),
    ("brazil", "Brazil"),
    ("australia", "Australia"),
    ("pakistan", "Pakistan"),
    ("india", "India"),
    ("turkey", "Turkey"),
    ("canada", "Canada"),
    ("thailand", "Thailand"),
    ("vietnam", "Vietnam"),
];

/// Pick the code strategy for a document from its file name.
pub fn detect(file_name: &str) -> &'static dyn Jurisdiction {
    match issuing_jurisdiction(file_name) {
        Some("United States") => &UNITED_STATES,
        Some("EU") => &EUROPEAN_UNION,
        Some("Malaysia") => &MALAYSIA,
        _ => &GENERIC,
    }
}

/// Resolve the issuing jurisdiction name from a file-name prefix, e.g.
/// `USA_Plate_A-580-881_F_2022.pdf` issues from the United States.
pub fn issuing_jurisdiction(file_name: &str) -> Option<&'static str> {
    let stem = file_name.rsplit('/').next().unwrap_or(file_name);
    let prefix = stem.split(['_', '-', '.', ' ']).next()?.to_lowercase();
    PREFIXES
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, name)| *name)
}

static FILENAME_CASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]-\d{3}-\d{3}").unwrap());

/// Extract a case identifier embedded in a file name, if any.
pub fn case_number_from_filename(file_name: &str) -> Option<String> {
    FILENAME_CASE
        .find(file_name)
        .map(|m| m.as_str().to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn us_accepts_steel_chapters_only() {
        let j = UnitedStates;
        assert_eq!(j.validate_code("7210.49.0030").as_deref(), Some("7210.49.0030"));
        assert_eq!(j.validate_code("7306.30.10").as_deref(), Some("7306.30.10"));
        assert_eq!(j.validate_code("8501.10.20"), None);
        assert_eq!(j.validate_code("7210.49"), None);
        assert_eq!(j.validate_code("CORE products"), None);
    }

    #[test]
    fn us_scan_orders_and_dedups() {
        let j = UnitedStates;
        let text = "subheadings 7210.49.0030, 7210.49.0091, and 7210.49.0030 \
                    of the HTSUS, sub-header 7210.49 alone, also 8501.10.20 (motors)";
        assert_eq!(
            j.scan_codes(text),
            vec!["7210.49.0030".to_string(), "7210.49.0091".to_string()]
        );
    }

    #[test]
    fn eu_canonicalizes_separators() {
        let j = EuropeanUnion;
        assert_eq!(j.validate_code("7208 51 20").as_deref(), Some("72085120"));
        assert_eq!(j.validate_code("7208.51.20").as_deref(), Some("72085120"));
        assert_eq!(j.validate_code("7208 51"), None);
    }

    #[test]
    fn malaysia_keeps_national_suffix() {
        let j = Malaysia;
        assert_eq!(j.validate_code("7210.61.11 00").as_deref(), Some("7210.61.11 00"));
        assert_eq!(j.validate_code("7210.61.11").as_deref(), Some("7210.61.11"));
        assert_eq!(j.validate_code("2523.29.10"), None);
    }

    #[test]
    fn generic_rejects_free_text() {
        let j = Generic;
        assert_eq!(j.validate_code("7210.49.11").as_deref(), Some("7210.49.11"));
        assert_eq!(j.validate_code("Chapter 72"), None);
        assert_eq!(j.validate_code("72"), None);
    }

    #[test]
    fn detect_by_filename_prefix() {
        assert_eq!(detect("USA_Plate_A-580-881_F_2022.pdf").name(), "United States");
        assert_eq!(detect("EU_HRC_2023.pdf").name(), "EU");
        assert_eq!(detect("Malaysia_Gazette_2021.pdf").name(), "Malaysia");
        assert_eq!(detect("Brazil_Rebar.pdf").name(), "Generic");
        assert_eq!(detect("notes.txt").name(), "Generic");
    }

    #[test]
    fn issuing_name_covers_non_strategy_jurisdictions() {
        assert_eq!(issuing_jurisdiction("Brazil_Rebar.pdf"), Some("Brazil"));
        assert_eq!(issuing_jurisdiction("turkey_hrc_2020.pdf"), Some("Turkey"));
        assert_eq!(issuing_jurisdiction("notes.txt"), None);
    }

    #[test]
    fn case_number_from_filename_finds_embedded_id() {
        assert_eq!(
            case_number_from_filename("USA_Plate_a-580-881_F_2022.pdf").as_deref(),
            Some("A-580-881")
        );
        assert_eq!(case_number_from_filename("EU_HRC_2023.pdf"), None);
    }

    #[test]
    fn expansion_flags() {
        assert!(UnitedStates.expands_codes());
        assert!(Malaysia.expands_codes());
        assert!(!EuropeanUnion.expands_codes());
        assert!(!Generic.expands_codes());
    }
}
