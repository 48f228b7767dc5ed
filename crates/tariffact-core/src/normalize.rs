//! Scalar field canonicalization for candidate records.
//!
//! Normalization is idempotent: running it over an already-normalized record
//! is a no-op. Fields that fail canonicalization are rejected to null (and
//! reported), never the whole record.

use chrono::NaiveDate;

use crate::jurisdiction::Jurisdiction;
use crate::record::{CandidateRecord, DutyRate};

/// Country-name synonym table: formal treaty names, alternate spellings,
/// and abbreviations map to one canonical short name per country.
const COUNTRY_SYNONYMS: &[(&str, &str)] = &[
    ("republic of korea", "South Korea"),
    ("korea", "South Korea"),
    ("rep. of korea", "South Korea"),
    ("rok", "South Korea"),
    ("people's republic of china", "China"),
    ("p.r.c", "China"),
    ("prc", "China"),
    ("socialist republic of viet nam", "Vietnam"),
    ("socialist republic of vietnam", "Vietnam"),
    ("republik sosialis viet nam", "Vietnam"),
    ("viet nam", "Vietnam"),
    ("chinese taipei", "Taiwan"),
    ("republic of china", "Taiwan"),
    ("kingdom of thailand", "Thailand"),
    ("republic of indonesia", "Indonesia"),
    ("republik indonesia", "Indonesia"),
    ("european union", "EU"),
    ("republic of turkey", "Turkey"),
    ("türkiye", "Turkey"),
    ("russian federation", "Russia"),
    ("united states of america", "USA"),
    ("united states", "USA"),
    ("u.s.a", "USA"),
    ("republic of india", "India"),
    ("federative republic of brazil", "Brazil"),
    ("commonwealth of australia", "Australia"),
    ("united kingdom", "UK"),
    ("great britain", "UK"),
    ("netherlands", "Netherlands"),
];

/// Extraction-noise placeholders that reject to null rather than persist.
const COUNTRY_PLACEHOLDERS: &[&str] = &["country name", "single country name only", "unknown"];

/// Fields rejected to null during normalization, for caller-side logging.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub rejected_codes: Vec<String>,
    pub rejected_case_numbers: Vec<String>,
    pub rejected_countries: Vec<String>,
}

impl NormalizeReport {
    pub fn is_clean(&self) -> bool {
        self.rejected_codes.is_empty()
            && self.rejected_case_numbers.is_empty()
            && self.rejected_countries.is_empty()
    }
}

/// Canonicalize one candidate record in place, using the owning document's
/// jurisdiction for product-code validation.
pub fn normalize_record(
    rec: &mut CandidateRecord,
    jurisdiction: &dyn Jurisdiction,
) -> NormalizeReport {
    let mut report = NormalizeReport::default();

    for field in [
        &mut rec.duty_type,
        &mut rec.effective_from,
        &mut rec.effective_to,
        &mut rec.period_from,
        &mut rec.period_to,
        &mut rec.basis_law,
        &mut rec.company,
        &mut rec.product_description,
        &mut rec.note,
    ] {
        clear_null_markers(field);
    }
    clear_null_markers(&mut rec.country);
    clear_null_markers(&mut rec.hs_code);
    clear_null_markers(&mut rec.case_number);

    if let Some(raw) = rec.country.take() {
        match normalize_country(&raw) {
            Some(canonical) => rec.country = Some(canonical),
            None => report.rejected_countries.push(raw),
        }
    }

    if let Some(raw) = rec.case_number.take() {
        match normalize_case_number(&raw) {
            Some(canonical) => rec.case_number = Some(canonical),
            None => report.rejected_case_numbers.push(raw),
        }
    }

    if let Some(raw) = rec.hs_code.take() {
        match jurisdiction.validate_code(&raw) {
            Some(canonical) => rec.hs_code = Some(canonical),
            None => report.rejected_codes.push(raw),
        }
    }

    if let Some(rate) = rec.duty_rate.take() {
        let (rate, sentinel_text) = normalize_rate(rate);
        rec.duty_rate = Some(rate);
        // Preserve the descriptive text of a non-numeric rate rather than
        // losing it, but never clobber an existing note.
        if let Some(text) = sentinel_text
            && rec.note.is_none()
        {
            rec.note = Some(text);
        }
    }

    for field in [
        &mut rec.effective_from,
        &mut rec.effective_to,
        &mut rec.period_from,
        &mut rec.period_to,
    ] {
        if let Some(raw) = field.as_deref() {
            *field = Some(normalize_date(raw));
        }
    }

    report
}

/// Drop empty strings and literal "null" markers the service sometimes emits.
fn clear_null_markers(field: &mut Option<String>) {
    let Some(v) = field.take() else { return };
    let trimmed = v.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return;
    }
    *field = if trimmed.len() == v.len() {
        Some(v)
    } else {
        Some(trimmed.to_string())
    };
}

/// Map a country name through the synonym table. Unmapped values pass
/// through unchanged; placeholders reject to `None`.
pub fn normalize_country(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let lookup = trimmed
        .to_lowercase()
        .strip_prefix("the ")
        .map(str::to_string)
        .unwrap_or_else(|| trimmed.to_lowercase());

    if COUNTRY_PLACEHOLDERS.contains(&lookup.as_str()) {
        return None;
    }
    for (synonym, canonical) in COUNTRY_SYNONYMS {
        if lookup == *synonym {
            return Some((*canonical).to_string());
        }
    }
    Some(trimmed.to_string())
}

/// Canonicalize a case identifier to `{LETTER}-{3 digits}-{3 digits}`.
///
/// En/em dashes become plain hyphens, spaces are removed, and only the
/// first of a comma/semicolon-joined list is kept. Values that do not match
/// the pattern are rejected to `None`; court and docket numbers like
/// `22-00122` share the surface shape but not the format.
pub fn normalize_case_number(raw: &str) -> Option<String> {
    let mut s = raw.trim().replace(['\u{2013}', '\u{2014}'], "-");
    if let Some(first) = s.split([',', ';']).next() {
        s = first.trim().to_string();
    }
    s.retain(|c| c != ' ');
    let s = s.to_ascii_uppercase();

    let b = s.as_bytes();
    let valid = b.len() == 9
        && b[0].is_ascii_uppercase()
        && b[1] == b'-'
        && b[2..5].iter().all(u8::is_ascii_digit)
        && b[5] == b'-'
        && b[6..9].iter().all(u8::is_ascii_digit);
    valid.then_some(s)
}

/// Coerce a rate to numeric form where possible.
///
/// Returns the normalized rate plus, for sentinels, the descriptive text to
/// surface in the note field.
pub fn normalize_rate(rate: DutyRate) -> (DutyRate, Option<String>) {
    match rate {
        DutyRate::Percent(v) => (DutyRate::Percent(v), None),
        DutyRate::Sentinel(s) => {
            let trimmed = s.trim();
            if trimmed.eq_ignore_ascii_case("nil") {
                return (DutyRate::Percent(0.0), None);
            }
            match parse_numeric_rate(trimmed) {
                Some(v) => (DutyRate::Percent(v), None),
                None => (DutyRate::Sentinel(trimmed.to_string()), Some(trimmed.to_string())),
            }
        }
    }
}

/// Parse numeric rate strings: percent signs, surrounding whitespace, and
/// comma decimal separators ("7,73") are tolerated.
fn parse_numeric_rate(s: &str) -> Option<f64> {
    let cleaned = s.trim().trim_end_matches('%').trim();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(v) = cleaned.parse::<f64>() {
        return Some(v);
    }
    // Comma as decimal separator, but only when unambiguous.
    if cleaned.matches(',').count() == 1 && !cleaned.contains('.') {
        return cleaned.replace(',', ".").parse::<f64>().ok();
    }
    None
}

/// Re-render a date string as `YYYY-MM-DD` when one of the known input
/// formats matches; otherwise pass it through unchanged.
pub fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    const FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%d/%m/%Y",
        "%m/%d/%Y",
        "%d.%m.%Y",
        "%B %d, %Y",
        "%d %B %Y",
    ];
    for fmt in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jurisdiction;

    fn us() -> &'static dyn Jurisdiction {
        jurisdiction::detect("USA_Plate_A-580-881_F_2022.txt")
    }

    #[test]
    fn country_synonyms_map_to_canonical() {
        assert_eq!(normalize_country("Republic of Korea").as_deref(), Some("South Korea"));
        assert_eq!(normalize_country("The Republic of Korea").as_deref(), Some("South Korea"));
        assert_eq!(normalize_country("PRC").as_deref(), Some("China"));
        assert_eq!(normalize_country("Viet Nam").as_deref(), Some("Vietnam"));
        assert_eq!(normalize_country("Russian Federation").as_deref(), Some("Russia"));
    }

    #[test]
    fn unmapped_country_passes_through() {
        assert_eq!(normalize_country("Kazakhstan").as_deref(), Some("Kazakhstan"));
    }

    #[test]
    fn placeholder_country_rejects() {
        assert_eq!(normalize_country("Country name"), None);
        assert_eq!(normalize_country("Unknown"), None);
    }

    #[test]
    fn case_number_dash_variants() {
        assert_eq!(normalize_case_number("A\u{2013}580\u{2013}881").as_deref(), Some("A-580-881"));
        assert_eq!(normalize_case_number("a-580-881").as_deref(), Some("A-580-881"));
        assert_eq!(normalize_case_number("C - 580 - 888").as_deref(), Some("C-580-888"));
    }

    #[test]
    fn case_number_keeps_first_of_list() {
        assert_eq!(
            normalize_case_number("A-580-881, C-580-888").as_deref(),
            Some("A-580-881")
        );
    }

    #[test]
    fn court_numbers_reject() {
        assert_eq!(normalize_case_number("22-00122"), None);
        assert_eq!(normalize_case_number("Court No. 23-00045"), None);
        assert_eq!(normalize_case_number("A-58-881"), None);
    }

    #[test]
    fn rate_coercion() {
        assert_eq!(
            normalize_rate(DutyRate::Sentinel("5.5%".into())),
            (DutyRate::Percent(5.5), None)
        );
        assert_eq!(
            normalize_rate(DutyRate::Sentinel("7,73".into())),
            (DutyRate::Percent(7.73), None)
        );
        assert_eq!(
            normalize_rate(DutyRate::Sentinel("Nil".into())),
            (DutyRate::Percent(0.0), None)
        );
        let (rate, note) = normalize_rate(DutyRate::Sentinel("minimum import price".into()));
        assert_eq!(rate, DutyRate::Sentinel("minimum import price".into()));
        assert_eq!(note.as_deref(), Some("minimum import price"));
    }

    #[test]
    fn date_formats() {
        assert_eq!(normalize_date("2023-01-15"), "2023-01-15");
        assert_eq!(normalize_date("15/01/2023"), "2023-01-15");
        assert_eq!(normalize_date("January 15, 2023"), "2023-01-15");
        assert_eq!(normalize_date("Q1 2023"), "Q1 2023");
    }

    #[test]
    fn record_normalization_end_to_end() {
        let mut rec = CandidateRecord {
            country: Some("Republic of Korea".into()),
            hs_code: Some("7210.49.0030".into()),
            case_number: Some("A\u{2013}580\u{2013}881".into()),
            duty_rate: Some(DutyRate::Sentinel("5.5%".into())),
            effective_from: Some("January 15, 2023".into()),
            company: Some("  Acme Steel  ".into()),
            note: Some("null".into()),
            ..Default::default()
        };
        let report = normalize_record(&mut rec, us());
        assert!(report.is_clean());
        assert_eq!(rec.country.as_deref(), Some("South Korea"));
        assert_eq!(rec.hs_code.as_deref(), Some("7210.49.0030"));
        assert_eq!(rec.case_number.as_deref(), Some("A-580-881"));
        assert_eq!(rec.duty_rate, Some(DutyRate::Percent(5.5)));
        assert_eq!(rec.effective_from.as_deref(), Some("2023-01-15"));
        assert_eq!(rec.company.as_deref(), Some("Acme Steel"));
        assert!(rec.note.is_none());
    }

    #[test]
    fn invalid_code_rejects_to_null_record_survives() {
        let mut rec = CandidateRecord {
            country: Some("Brazil".into()),
            hs_code: Some("CORE, Truck and Bus".into()),
            ..Default::default()
        };
        let report = normalize_record(&mut rec, us());
        assert!(rec.hs_code.is_none());
        assert_eq!(report.rejected_codes, vec!["CORE, Truck and Bus".to_string()]);
        assert_eq!(rec.country.as_deref(), Some("Brazil"));
    }

    #[test]
    fn sentinel_rate_text_moves_to_empty_note_only() {
        let mut rec = CandidateRecord {
            duty_rate: Some(DutyRate::Sentinel("minimum import price".into())),
            note: Some("existing note".into()),
            ..Default::default()
        };
        normalize_record(&mut rec, us());
        assert_eq!(rec.note.as_deref(), Some("existing note"));

        let mut rec = CandidateRecord {
            duty_rate: Some(DutyRate::Sentinel("minimum import price".into())),
            ..Default::default()
        };
        normalize_record(&mut rec, us());
        assert_eq!(rec.note.as_deref(), Some("minimum import price"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut rec = CandidateRecord {
            country: Some("Korea".into()),
            hs_code: Some("7210.49.11".into()),
            case_number: Some("a-580-881".into()),
            duty_rate: Some(DutyRate::Sentinel("7,73%".into())),
            effective_from: Some("15/01/2023".into()),
            ..Default::default()
        };
        normalize_record(&mut rec, us());
        let once = rec.clone();
        let report = normalize_record(&mut rec, us());
        assert!(report.is_clean());
        assert_eq!(rec, once);
    }
}
