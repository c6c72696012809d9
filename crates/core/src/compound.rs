//! Compound Parser (§4.5): a small suite of pure functions, one per
//! compound field, each failing soft into a raw-string/`parse_failed` tag
//! rather than an error.

use regex::Regex;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub enum DoorType {
    Solid,
    Glass,
    GlassSliding,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DoorHinge {
    Left,
    Right,
    Both,
}

#[derive(Debug, Clone)]
pub struct DoorConfig {
    pub door_count: i32,
    pub door_type: DoorType,
    pub door_hinge: Option<DoorHinge>,
    pub door_features: BTreeSet<String>,
}

/// §4.5 door config parser. Fails soft: returns `None` when no door count
/// can be recognized.
pub fn parse_door_config(raw: &str) -> Option<DoorConfig> {
    let lower = raw.to_lowercase();
    let door_count = word_to_count(&lower)?;

    let door_type = if lower.contains("glass sliding") || lower.contains("sliding glass") {
        DoorType::GlassSliding
    } else if lower.contains("glass") {
        DoorType::Glass
    } else {
        DoorType::Solid
    };

    let has_left = lower.contains("left hinged") || lower.contains("left-hinged") || lower.contains("left hinge");
    let has_right = lower.contains("right hinged") || lower.contains("right-hinged") || lower.contains("right hinge");
    let door_hinge = match (has_left, has_right) {
        (true, true) => Some(DoorHinge::Both),
        (true, false) => Some(DoorHinge::Left),
        (false, true) => Some(DoorHinge::Right),
        (false, false) => None,
    };

    let mut door_features = BTreeSet::new();
    for feature in ["self-closing", "self closing", "lockable", "heated"] {
        if lower.contains(feature) {
            door_features.insert(feature.replace(' ', "_").replace('-', "_"));
        }
    }

    Some(DoorConfig { door_count, door_type, door_hinge, door_features })
}

fn word_to_count(lower: &str) -> Option<i32> {
    for (word, n) in [("one", 1), ("two", 2), ("three", 3), ("four", 4)] {
        if lower.contains(word) {
            return Some(n);
        }
    }
    let re = Regex::new(r"(\d+)\s*(swing|solid|glass)?\s*door").ok()?;
    re.captures(lower).and_then(|c| c.get(1)).and_then(|m| m.as_str().parse().ok())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShelfType {
    Adjustable,
    Fixed,
    Mixed,
}

#[derive(Debug, Clone)]
pub struct ShelfConfig {
    pub shelf_count: i32,
    pub shelf_type: ShelfType,
    pub shelf_adjustment_increment: Option<f64>,
}

/// §4.5 shelf config parser, including unicode-fraction normalization.
pub fn parse_shelf_config(raw: &str) -> Option<ShelfConfig> {
    let lower = raw.to_lowercase();
    let shelf_count = word_to_count_shelves(&lower)?;

    let has_adjustable = lower.contains("adjustable");
    let has_fixed = lower.contains("fixed");
    let shelf_type = match (has_adjustable, has_fixed) {
        (true, true) => ShelfType::Mixed,
        (true, false) => ShelfType::Adjustable,
        (false, true) => ShelfType::Fixed,
        (false, false) => ShelfType::Adjustable,
    };

    let shelf_adjustment_increment = extract_fractional_dimension(&lower);

    Some(ShelfConfig { shelf_count, shelf_type, shelf_adjustment_increment })
}

fn word_to_count_shelves(lower: &str) -> Option<i32> {
    for (word, n) in [("one", 1), ("two", 2), ("three", 3), ("four", 4), ("five", 5), ("six", 6)] {
        if lower.contains(word) {
            return Some(n);
        }
    }
    let re = Regex::new(r"(\d+)\s*(adjustable|fixed)?\s*shel").ok()?;
    re.captures(lower).and_then(|c| c.get(1)).and_then(|m| m.as_str().parse().ok())
}

#[derive(Debug, Clone, Default)]
pub struct TemperatureRange {
    pub temp_range_min_c: Option<f64>,
    pub temp_range_max_c: Option<f64>,
}

/// §4.5 temperature range parser. Fahrenheit inputs convert with rounding to
/// one decimal; a single bound leaves the other `None`.
pub fn parse_temperature_range(raw: &str) -> TemperatureRange {
    let re_pair =
        Regex::new(r"(?i)(-?\d+(?:\.\d+)?)\s*°?\s*([cf])?\s*(?:to|[-–])\s*(-?\d+(?:\.\d+)?)\s*°?\s*([cf])?").unwrap();
    let re_single = Regex::new(r"(?i)(-?\d+(?:\.\d+)?)\s*°?\s*([cf])").unwrap();

    if let Some(caps) = re_pair.captures(raw) {
        let unit = unit_from_caps(&caps, &[2, 4]);
        let min = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
        let max = caps.get(3).and_then(|m| m.as_str().parse::<f64>().ok());
        let to_c = |v: Option<f64>| v.map(|v| to_celsius(v, unit));
        return TemperatureRange { temp_range_min_c: to_c(min), temp_range_max_c: to_c(max) };
    }
    if let Some(caps) = re_single.captures(raw) {
        let unit = caps.get(2).map(|m| m.as_str()).unwrap_or("c");
        let value = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
        return TemperatureRange { temp_range_min_c: value.map(|v| to_celsius(v, unit)), temp_range_max_c: None };
    }
    TemperatureRange::default()
}

fn unit_from_caps<'a>(caps: &regex::Captures<'a>, groups: &[usize]) -> &'a str {
    for &g in groups {
        if let Some(m) = caps.get(g) {
            return m.as_str();
        }
    }
    "c"
}

fn to_celsius(value: f64, unit: &str) -> f64 {
    let celsius = if unit.eq_ignore_ascii_case("f") { (value - 32.0) / 1.8 } else { value };
    (celsius * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Default)]
pub struct Electrical {
    pub voltage_v: Option<f64>,
    pub voltage_min: Option<f64>,
    pub voltage_max: Option<f64>,
    pub frequency_hz: Option<f64>,
    pub amperage: Option<f64>,
    pub horsepower: Option<f64>,
}

/// §4.5 electrical parser: handles both a single voltage and a range
/// (`"110-120V"` -> midpoint plus min/max).
pub fn parse_electrical(raw: &str) -> Electrical {
    let mut out = Electrical::default();

    let re_range = Regex::new(r"(\d+(?:\.\d+)?)\s*[-–]\s*(\d+(?:\.\d+)?)\s*v").unwrap();
    if let Some(caps) = re_range.captures(&raw.to_lowercase()) {
        let min: f64 = caps[1].parse().unwrap_or(0.0);
        let max: f64 = caps[2].parse().unwrap_or(0.0);
        out.voltage_min = Some(min);
        out.voltage_max = Some(max);
        out.voltage_v = Some((min + max) / 2.0);
    } else {
        let re_v = Regex::new(r"(\d+(?:\.\d+)?)\s*v\b").unwrap();
        if let Some(caps) = re_v.captures(&raw.to_lowercase()) {
            out.voltage_v = caps[1].parse().ok();
        }
    }

    let re_hz = Regex::new(r"(\d+(?:\.\d+)?)\s*hz").unwrap();
    if let Some(caps) = re_hz.captures(&raw.to_lowercase()) {
        out.frequency_hz = caps[1].parse().ok();
    }

    let re_amp = Regex::new(r"(\d+(?:\.\d+)?)\s*amp").unwrap();
    if let Some(caps) = re_amp.captures(&raw.to_lowercase()) {
        out.amperage = caps[1].parse().ok();
    }

    let re_hp_fraction = Regex::new(r"(\d+)\s*/\s*(\d+)\s*hp").unwrap();
    if let Some(caps) = re_hp_fraction.captures(&raw.to_lowercase()) {
        let num: f64 = caps[1].parse().unwrap_or(1.0);
        let den: f64 = caps[2].parse().unwrap_or(1.0);
        if den != 0.0 {
            out.horsepower = Some(num / den);
        }
    } else {
        let re_hp = Regex::new(r"(\d+(?:\.\d+)?)\s*hp").unwrap();
        if let Some(caps) = re_hp.captures(&raw.to_lowercase()) {
            out.horsepower = caps[1].parse().ok();
        }
    }

    out
}

/// §4.5 refrigerant parser: first `R\d{3}[a-z]?` token.
pub fn parse_refrigerant(raw: &str) -> Option<String> {
    let re = Regex::new(r"(?i)\bR\d{3}[a-z]?\b").unwrap();
    re.find(raw).map(|m| m.as_str().to_uppercase())
}

/// §4.5 certifications parser: recognizes known tokens from free text
/// (tolerant of `,`/`/`-separated and whitespace/hyphen variants), returns a
/// de-duplicated, first-seen-ordered list.
pub fn parse_certifications(raw: &str) -> Vec<String> {
    const KNOWN: &[&str] = &[
        "C-ETL",
        "ETL",
        "UL471",
        "ENERGY_STAR",
        "NSF/ANSI 456",
        "EPA_SNAP",
        "UL_60335-1",
        "CSA_C22.2_NO120",
    ];

    fn normalize(s: &str) -> String {
        s.to_uppercase().replace(['-', ' ', '_'], "")
    }

    let normalized_text = normalize(raw);
    let mut hits: Vec<(usize, &str)> = Vec::new();
    for known in KNOWN {
        let needle = normalize(known);
        if let Some(pos) = normalized_text.find(&needle) {
            hits.push((pos, known));
        }
    }
    hits.sort_by_key(|(pos, _)| *pos);

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for (_, known) in hits {
        if seen.insert(known.to_string()) {
            out.push(known.to_string());
        }
    }
    out
}

/// §4.5 fractional dimension parser: `"23 ¾"` -> 23.75, `"48 5⁄8"` -> 48.625.
pub fn parse_fractional_dimension(raw: &str) -> Option<f64> {
    extract_fractional_dimension(&raw.to_lowercase())
}

fn extract_fractional_dimension(raw: &str) -> Option<f64> {
    let unicode_fraction = |c: char| -> Option<f64> {
        match c {
            '¼' => Some(0.25),
            '½' => Some(0.5),
            '¾' => Some(0.75),
            '⅛' => Some(0.125),
            '⅜' => Some(0.375),
            '⅝' => Some(0.625),
            '⅞' => Some(0.875),
            _ => None,
        }
    };

    for c in raw.chars() {
        if let Some(frac) = unicode_fraction(c) {
            let whole_re = Regex::new(r"(\d+)\s*$").unwrap();
            let prefix_end = raw.find(c).unwrap_or(0);
            let prefix = &raw[..prefix_end];
            let whole: f64 = whole_re.captures(prefix).and_then(|c| c[1].parse().ok()).unwrap_or(0.0);
            return Some(whole + frac);
        }
    }

    // ascii fraction: "48 5/8" or "48 5⁄8"
    let re = Regex::new(r"(\d+)\s+(\d+)\s*[/⁄]\s*(\d+)").unwrap();
    if let Some(caps) = re.captures(raw) {
        let whole: f64 = caps[1].parse().ok()?;
        let num: f64 = caps[2].parse().ok()?;
        let den: f64 = caps[3].parse().ok()?;
        if den != 0.0 {
            return Some(whole + num / den);
        }
    }
    let re_plain = Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*$").unwrap();
    if let Some(caps) = re_plain.captures(raw) {
        return caps[1].parse().ok();
    }
    None
}

/// Fail-soft wrapper: any compound parser that returns `None` becomes a
/// tagged raw string the Conflict Engine treats as `text` data (§4.5).
pub struct ParseFailed {
    pub raw: String,
}

impl ParseFailed {
    pub fn tag(raw: &str) -> Self {
        Self { raw: raw.to_string() }
    }

    /// The tagged representation itself: plain `Text` rather than a
    /// fabricated `Numeric`, so the Conflict Engine's type-mismatch path
    /// (raise a conflict) runs instead of silently comparing it as a number.
    pub fn into_spec_value(self) -> crate::types::SpecValue {
        crate::types::SpecValue::Text(self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn door_config_parses_example_from_spec() {
        let cfg = parse_door_config("One swing solid door, self-closing, right hinged").unwrap();
        assert_eq!(cfg.door_count, 1);
        assert_eq!(cfg.door_type, DoorType::Solid);
        assert_eq!(cfg.door_hinge, Some(DoorHinge::Right));
        assert!(cfg.door_features.contains("self_closing"));
    }

    #[test]
    fn door_config_both_hinges_when_both_keywords_present() {
        let cfg = parse_door_config("Two glass doors, left hinged and right hinged").unwrap();
        assert_eq!(cfg.door_hinge, Some(DoorHinge::Both));
        assert_eq!(cfg.door_type, DoorType::Glass);
    }

    #[test]
    fn shelf_config_parses_example_from_spec() {
        let cfg = parse_shelf_config("Four adjustable shelves (adjustable in ½ increments)").unwrap();
        assert_eq!(cfg.shelf_count, 4);
        assert_eq!(cfg.shelf_type, ShelfType::Adjustable);
        assert_eq!(cfg.shelf_adjustment_increment, Some(0.5));
    }

    #[test]
    fn temperature_range_converts_fahrenheit_and_rounds() {
        let range = parse_temperature_range("33.8°F to 50°F");
        assert_eq!(range.temp_range_min_c, Some(1.0));
        assert_eq!(range.temp_range_max_c, Some(10.0));
    }

    #[test]
    fn temperature_range_single_bound_leaves_other_null() {
        let range = parse_temperature_range("1°C");
        assert_eq!(range.temp_range_min_c, Some(1.0));
        assert_eq!(range.temp_range_max_c, None);
    }

    #[test]
    fn electrical_parses_example_from_spec() {
        let e = parse_electrical("115V, 60 Hz, 3 Amps, 1/5 HP");
        assert_eq!(e.voltage_v, Some(115.0));
        assert_eq!(e.frequency_hz, Some(60.0));
        assert_eq!(e.amperage, Some(3.0));
        assert_eq!(e.horsepower, Some(0.2));
    }

    #[test]
    fn electrical_parses_voltage_range_as_midpoint() {
        let e = parse_electrical("110-120V");
        assert_eq!(e.voltage_min, Some(110.0));
        assert_eq!(e.voltage_max, Some(120.0));
        assert_eq!(e.voltage_v, Some(115.0));
    }

    #[test]
    fn refrigerant_extracts_first_token() {
        assert_eq!(parse_refrigerant("Uses R290 hydrocarbon refrigerant"), Some("R290".to_string()));
    }

    #[test]
    fn certifications_recognizes_known_tokens() {
        let certs = parse_certifications("ETL, UL471, NSF/ANSI 456");
        assert!(certs.contains(&"ETL".to_string()));
        assert!(certs.contains(&"UL471".to_string()));
    }

    #[test]
    fn fractional_dimension_examples_from_spec() {
        assert_eq!(parse_fractional_dimension("23 ¾"), Some(23.75));
        assert_eq!(parse_fractional_dimension("48 5/8"), Some(48.625));
    }

    #[test]
    fn door_config_fails_soft_on_ungrammatical_input() {
        assert!(parse_door_config("completely unrelated marketing copy").is_none());
    }
}
