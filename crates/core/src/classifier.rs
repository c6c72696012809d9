//! Document Classifier (§4.2): text + filename -> doc_type, brand hint,
//! revision date. Rule-based over case-insensitive text markers.

use chrono::{Datelike, NaiveDate, Utc};

use crate::types::DocType;

/// Deterministic priority order from §4.2.
pub fn classify_doc_type(text: &str) -> DocType {
    let lower = text.to_lowercase();
    if lower.contains("cutsheet") || lower.contains("cut sheet") {
        return DocType::CutSheet;
    }
    let has_performance_section = lower.contains("performance");
    let has_performance_markers = lower.contains("probe") || lower.contains("uniformity") || lower.contains("stability");
    if has_performance_section && has_performance_markers {
        return DocType::PerformanceDataSheet;
    }
    if lower.contains("product data sheet") && has_structured_sections(&lower) {
        return DocType::ProductDataSheet;
    }
    if has_feature_bullet_list(text) {
        return DocType::FeatureList;
    }
    if has_dimensional_callouts_only(&lower) {
        return DocType::DimensionalDrawing;
    }
    DocType::Other
}

fn has_structured_sections(lower: &str) -> bool {
    ["features", "specifications", "dimensions", "electrical"]
        .iter()
        .filter(|marker| lower.contains(**marker))
        .count()
        >= 2
}

fn has_feature_bullet_list(text: &str) -> bool {
    text.lines()
        .filter(|l| {
            let t = l.trim_start();
            t.starts_with('-') || t.starts_with('•') || t.starts_with('*')
        })
        .count()
        >= 3
}

fn has_dimensional_callouts_only(lower: &str) -> bool {
    let dims = ["width", "depth", "height", "overall dimensions"];
    dims.iter().any(|d| lower.contains(d)) && !lower.contains("specifications") && !lower.contains("features")
}

/// Brand detection (§4.2): scans for brand codes and known product-line
/// tokens; ties broken by earliest position in the text.
pub fn detect_brand(text: &str, known_brand_codes: &[&str]) -> Option<String> {
    let lower = text.to_lowercase();
    let mut best: Option<(usize, String)> = None;
    for code in known_brand_codes {
        if let Some(pos) = lower.find(&code.to_lowercase()) {
            match &best {
                Some((best_pos, _)) if *best_pos <= pos => {}
                _ => best = Some((pos, code.to_string())),
            }
        }
    }
    best.map(|(_, code)| code)
}

/// Revision extraction (§4.2): `Rev[_\s\-]?MM[.\-/]DD[.\-/]YY(YY)?`,
/// normalized to an ISO date string. Two-digit years assume the current or
/// prior century, whichever yields a date not in the future.
pub fn extract_revision(text: &str) -> Option<String> {
    extract_revision_at(text, Utc::now().naive_utc().date())
}

fn extract_revision_at(text: &str, today: NaiveDate) -> Option<String> {
    let re = regex::Regex::new(r"(?i)rev[_\s\-]?(\d{1,2})[.\-/](\d{1,2})[.\-/](\d{2}|\d{4})").ok()?;
    let caps = re.captures(text)?;
    let month: u32 = caps.get(1)?.as_str().parse().ok()?;
    let day: u32 = caps.get(2)?.as_str().parse().ok()?;
    let year_raw = caps.get(3)?.as_str();
    let year = resolve_year(year_raw, today)?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn resolve_year(raw: &str, today: NaiveDate) -> Option<i32> {
    if raw.len() == 4 {
        return raw.parse().ok();
    }
    let two_digit: i32 = raw.parse().ok()?;
    let current_century = (today.year() / 100) * 100;
    let this_century = current_century + two_digit;
    let prior_century = current_century - 100 + two_digit;
    // pick whichever candidate is closer to "now", preferring not-in-the-future
    if this_century <= today.year() {
        Some(this_century)
    } else {
        Some(prior_century)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutsheet_header_wins_priority() {
        assert_eq!(classify_doc_type("CUTSHEET\nSpecifications\nFeatures"), DocType::CutSheet);
    }

    #[test]
    fn performance_requires_both_section_and_markers() {
        let text = "Performance\nTemperature uniformity and stability with probe data";
        assert_eq!(classify_doc_type(text), DocType::PerformanceDataSheet);
        assert_eq!(classify_doc_type("Performance overview, no technical markers here"), DocType::Other);
    }

    #[test]
    fn brand_ties_break_by_earliest_position() {
        let text = "The HelmerScientific model follows the ABS line guidance.";
        let brand = detect_brand(text, &["ABS", "HelmerScientific"]);
        assert_eq!(brand, Some("HelmerScientific".to_string()));
    }

    #[test]
    fn revision_normalizes_to_iso_date() {
        assert_eq!(extract_revision("Rev_03.18.25"), extract_revision_at("Rev_03.18.25", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()));
        assert_eq!(
            extract_revision_at("Rev_03.18.25", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()),
            Some("2025-03-18".to_string())
        );
    }

    #[test]
    fn two_digit_year_prefers_non_future_century() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        // "99" should resolve to 1999, not 2099
        assert_eq!(extract_revision_at("Rev-01-05-99", today), Some("1999-01-05".to_string()));
    }
}
