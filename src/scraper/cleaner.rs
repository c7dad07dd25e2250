use crate::models::{FieldRow, FieldTable};

// ── Numbers ───────────────────────────────────────────────────────────────────

/// Parse a scraped figure: strip thousands separators.
/// "1,234.56" → 1234.56 | "-12.5" → -12.5 | "N/A" → None
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim().replace(',', "");
    if s.is_empty() || s == "-" || s == "—" {
        return None;
    }
    s.parse().ok()
}

/// "12.5%" → 12.5
pub fn parse_percent(s: &str) -> Option<f64> {
    parse_number(s.trim().trim_end_matches('%'))
}

// ── Statement rows ────────────────────────────────────────────────────────────

/// True when a statement value carries no vowel.
///
/// Figures ("1,234", "-5.6", "12%") pass; narrative cells ("N/A",
/// "Annual", "Restated") are rejected. Vowels are matched in either case.
pub fn is_figure(value: &str) -> bool {
    !value
        .chars()
        .any(|c| matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u'))
}

/// Drop statement rows whose value is text rather than a figure.
pub fn retain_figures(mut table: FieldTable) -> FieldTable {
    table.retain(|row: &FieldRow| is_figure(&row.value));
    table
}

// ── Names ─────────────────────────────────────────────────────────────────────

/// Company name as typed into search boxes: "top-glove" → "top glove".
pub fn search_name(code: &str) -> String {
    code.replace('-', " ")
}

/// URL slug used by the beta site: "Nestle (Malaysia) Bhd." → "Nestle-(Malaysia)-Bhd-".
pub fn beta_slug(name: &str) -> String {
    let mut slug = name.replace(' ', "-").replace('.', "");
    slug.push('-');
    slug
}

// ── Tests ─────────────────────────────────────────────────────────────────────
