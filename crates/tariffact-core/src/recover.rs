//! Best-effort recovery of candidate records from malformed payloads.
//!
//! The inference service returns one serialized object with an `items` list,
//! but the payload is routinely wrapped in markdown fences, truncated
//! mid-record, or littered with trailing commas and control characters. A
//! single malformed record must not void the batch, so parsing degrades in
//! stages: strict parse, mechanical repair, then per-object salvage. This
//! never errors; the worst case is an empty list.

use serde_json::Value;
use tracing::debug;

use crate::record::CandidateRecord;

/// How much repair the payload needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseQuality {
    /// Strict parse succeeded after fence/whitespace stripping only.
    Clean,
    /// Trailing-comma, control-character, or bracket-balance repair was
    /// required before the payload parsed.
    Repaired,
    /// Strict parsing failed even after repair; individual object spans were
    /// recovered from the `items` list and the rest discarded.
    Salvaged,
    /// Nothing recoverable.
    Empty,
}

impl ParseQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Repaired => "repaired",
            Self::Salvaged => "salvaged",
            Self::Empty => "empty",
        }
    }
}

/// Recover an ordered list of candidate records from a raw payload.
pub fn recover_items(raw: &str) -> (Vec<CandidateRecord>, ParseQuality) {
    let stripped = strip_fences(raw);
    if stripped.trim().is_empty() {
        return (Vec::new(), ParseQuality::Empty);
    }

    if let Some(items) = parse_items(&stripped) {
        return (items, ParseQuality::Clean);
    }

    let repaired = repair(&stripped);
    if let Some(items) = parse_items(&repaired) {
        return (items, ParseQuality::Repaired);
    }

    let items = salvage_items(&repaired);
    if items.is_empty() {
        (items, ParseQuality::Empty)
    } else {
        (items, ParseQuality::Salvaged)
    }
}

/// Drop a surrounding markdown code fence (```json ... ```), if present.
fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    lines.remove(0);
    if let Some(last) = lines.last()
        && last.trim() == "```"
    {
        lines.pop();
    }
    lines.join("\n")
}

/// Strict parse of `{"items": [...]}`. Items that fail record
/// deserialization individually (wrong value shapes) are skipped rather
/// than failing the batch.
fn parse_items(text: &str) -> Option<Vec<CandidateRecord>> {
    let value: Value = serde_json::from_str(text).ok()?;
    let items = value.get("items")?.as_array()?;
    let mut records = Vec::with_capacity(items.len());
    let mut skipped = 0usize;
    for item in items {
        match serde_json::from_value::<CandidateRecord>(item.clone()) {
            Ok(rec) => records.push(rec),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "discarded items with unusable shapes");
    }
    Some(records)
}

/// Mechanical repair: strip stray control characters, trim leading prose
/// before the first `{`, remove trailing commas, and append the deficit of
/// closing brackets/braces implied by counting openers vs. closers.
fn repair(text: &str) -> String {
    let mut cleaned: String = text
        .chars()
        .filter(|&c| c >= ' ' || c == '\n' || c == '\t' || c == '\r')
        .collect();

    if let Some(pos) = cleaned.find('{') {
        cleaned.drain(..pos);
    }

    cleaned = strip_trailing_commas(&cleaned);

    if !cleaned.trim_end().ends_with('}') {
        let open_braces = cleaned.matches('{').count();
        let close_braces = cleaned.matches('}').count();
        let open_brackets = cleaned.matches('[').count();
        let close_brackets = cleaned.matches(']').count();
        for _ in close_brackets..open_brackets {
            cleaned.push(']');
        }
        for _ in close_braces..open_braces {
            cleaned.push('}');
        }
    }

    cleaned
}

/// Remove commas that directly precede a closing `}` or `]`, outside of
/// string values.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escape_next = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if escape_next {
            escape_next = false;
            out.push(c);
            i += 1;
            continue;
        }
        if in_string && c == '\\' {
            escape_next = true;
            out.push(c);
            i += 1;
            continue;
        }
        if c == '"' {
            in_string = !in_string;
        }
        if c == ',' && !in_string {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                i += 1;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Structural salvage: locate the `items` array and emit every balanced
/// top-level object span that parses in isolation, respecting string
/// quoting and escape state while tracking brace depth.
fn salvage_items(text: &str) -> Vec<CandidateRecord> {
    let Some(start) = items_array_start(text) else {
        return Vec::new();
    };

    let mut records = Vec::new();
    let mut discarded = 0usize;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;
    let mut current = String::new();

    for c in text[start..].chars() {
        if escape_next {
            current.push(c);
            escape_next = false;
            continue;
        }
        if c == '\\' {
            escape_next = true;
            current.push(c);
            continue;
        }
        if c == '"' {
            in_string = !in_string;
        }
        if !in_string {
            match c {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                ']' if depth == 0 => break,
                _ => {}
            }
        }
        if depth > 0 || c == '}' {
            current.push(c);
        }
        if depth == 0 && current.trim_end().ends_with('}') {
            match serde_json::from_str::<CandidateRecord>(current.trim().trim_end_matches(',')) {
                Ok(rec) => records.push(rec),
                Err(_) => discarded += 1,
            }
            current.clear();
        }
    }

    if discarded > 0 {
        debug!(
            recovered = records.len(),
            discarded, "salvaged partial items list"
        );
    }
    records
}

/// Byte offset just past the `[` that opens the `items` array, or the first
/// `[` in the payload when no `items` key is present.
fn items_array_start(text: &str) -> Option<usize> {
    if let Some(key) = text.find("\"items\"") {
        let rest = &text[key + 7..];
        let bracket = rest.find('[')?;
        return Some(key + 7 + bracket + 1);
    }
    text.find('[').map(|p| p + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_payload() {
        let raw = r#"{"items": [{"country": "Brazil", "tariff_rate": 9.6}]}"#;
        let (items, quality) = recover_items(raw);
        assert_eq!(quality, ParseQuality::Clean);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].country.as_deref(), Some("Brazil"));
    }

    #[test]
    fn fenced_payload_is_still_clean() {
        let raw = "```json\n{\"items\": [{\"country\": \"India\"}]}\n```";
        let (items, quality) = recover_items(raw);
        assert_eq!(quality, ParseQuality::Clean);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn trailing_comma_is_repaired() {
        let raw = r#"{"items": [{"country":"Korea","hs_code":"7210.49.11","company":"Acme","tariff_rate":"5.5%"},]}"#;
        let (items, quality) = recover_items(raw);
        assert_eq!(quality, ParseQuality::Repaired);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].hs_code.as_deref(), Some("7210.49.11"));
    }

    #[test]
    fn repair_preserves_multibyte_text() {
        let raw = r#"{"items": [{"country": "Türkiye", "company": "Çelik A.Ş.", "tariff_rate": 9.0},]}"#;
        let (items, quality) = recover_items(raw);
        assert_eq!(quality, ParseQuality::Repaired);
        assert_eq!(items[0].country.as_deref(), Some("Türkiye"));
        assert_eq!(items[0].company.as_deref(), Some("Çelik A.Ş."));
    }

    #[test]
    fn comma_before_brace_inside_string_is_kept() {
        let raw = r#"{"items": [{"country": "India", "note": "rates: {5, }"},]}"#;
        let (items, quality) = recover_items(raw);
        assert_eq!(quality, ParseQuality::Repaired);
        assert_eq!(items[0].note.as_deref(), Some("rates: {5, }"));
    }

    #[test]
    fn missing_final_brace_gets_appended() {
        let raw = r#"{"items": [{"country": "Peru", "tariff_rate": 4.2}]"#;
        let (items, quality) = recover_items(raw);
        assert_eq!(quality, ParseQuality::Repaired);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].country.as_deref(), Some("Peru"));
    }

    #[test]
    fn truncation_mid_record_recovers_preceding_records() {
        let raw = r#"{"items": [{"country": "Turkey", "tariff_rate": 9.0}, {"country": "Mex"#;
        let (items, quality) = recover_items(raw);
        assert_eq!(quality, ParseQuality::Salvaged);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].country.as_deref(), Some("Turkey"));
    }

    #[test]
    fn leading_prose_is_trimmed() {
        let raw = "Here is the extracted data:\n{\"items\": [{\"country\": \"Japan\"}]}";
        let (items, quality) = recover_items(raw);
        assert_eq!(quality, ParseQuality::Repaired);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn control_characters_are_stripped() {
        let raw = "{\"items\": [{\"country\": \"Japan\"}\u{0000}]}";
        let (items, _) = recover_items(raw);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn salvage_skips_broken_record_keeps_valid_ones() {
        // Middle record is irreparably broken; neighbours survive.
        let raw = r#"{"items": [
            {"country": "Korea", "tariff_rate": 5.5},
            {"country": Korea2,},
            {"country": "Vietnam", "tariff_rate": 12.0}
        ]}"#;
        let (items, quality) = recover_items(raw);
        assert_eq!(quality, ParseQuality::Salvaged);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].country.as_deref(), Some("Korea"));
        assert_eq!(items[1].country.as_deref(), Some("Vietnam"));
    }

    #[test]
    fn salvage_respects_escaped_quotes_and_nested_braces() {
        let raw = r##"{"items": [
            {"company": "Acme \"Steel\" Co", "note": "uses {braces}", "tariff_rate": 3.1},
            {"country": "#broken
        ]}"##;
        let (items, quality) = recover_items(raw);
        assert_eq!(quality, ParseQuality::Salvaged);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].company.as_deref(), Some("Acme \"Steel\" Co"));
    }

    #[test]
    fn empty_and_garbage_payloads_yield_empty() {
        assert_eq!(recover_items("").1, ParseQuality::Empty);
        assert_eq!(recover_items("   \n  ").1, ParseQuality::Empty);
        let (items, quality) = recover_items("no json here at all");
        assert!(items.is_empty());
        assert_eq!(quality, ParseQuality::Empty);
    }

    #[test]
    fn salvage_never_loses_valid_records() {
        // n valid among j invalid yields at least n recovered.
        let raw = r#"{"items": [
            {"country": "A1"}, {"bad": }, {"country": "A2"}, {"": broken}, {"country": "A3"}
        ]}"#;
        let (items, _) = recover_items(raw);
        let countries: Vec<_> = items.iter().filter_map(|r| r.country.as_deref()).collect();
        assert!(countries.contains(&"A1"));
        assert!(countries.contains(&"A2"));
        assert!(countries.contains(&"A3"));
    }
}
