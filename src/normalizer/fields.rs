use once_cell::sync::Lazy;
use regex::Regex;

use super::segment::DayBlock;
use super::token::Token;
use super::Emitter;

/// Per-day field vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldLabel {
    Start,
    End,
    Distance,
    ElevationGainLoss,
    Elevation,
    Terrain,
    Difficulty,
    Highlights,
    Lunch,
    Accommodation,
    WaterSources,
    Tips,
}

impl FieldLabel {
    pub const ALL: [FieldLabel; 12] = [
        FieldLabel::Start,
        FieldLabel::End,
        FieldLabel::Distance,
        FieldLabel::ElevationGainLoss,
        FieldLabel::Elevation,
        FieldLabel::Terrain,
        FieldLabel::Difficulty,
        FieldLabel::Highlights,
        FieldLabel::Lunch,
        FieldLabel::Accommodation,
        FieldLabel::WaterSources,
        FieldLabel::Tips,
    ];

    /// Canonical spelling used in normalized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldLabel::Start => "Start",
            FieldLabel::End => "End",
            FieldLabel::Distance => "Distance",
            FieldLabel::ElevationGainLoss => "Elevation gain/loss",
            FieldLabel::Elevation => "Elevation",
            FieldLabel::Terrain => "Terrain",
            FieldLabel::Difficulty => "Difficulty",
            FieldLabel::Highlights => "Highlights",
            FieldLabel::Lunch => "Lunch",
            FieldLabel::Accommodation => "Accommodation",
            FieldLabel::WaterSources => "Water sources",
            FieldLabel::Tips => "Tips",
        }
    }

    fn from_match(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        if lower.starts_with("elevation") && lower.contains("gain") {
            return Some(FieldLabel::ElevationGainLoss);
        }
        FieldLabel::ALL
            .iter()
            .copied()
            .find(|label| label.as_str().to_lowercase() == lower)
    }
}

// Longer labels come first so "Elevation gain/loss" wins over "Elevation".
static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\*{1,2})?\b(elevation gain\s*/\s*loss|water sources|accommodation|difficulty|highlights|elevation|distance|terrain|start|lunch|tips|end)\b(\s*\([^)\n]*\))?\s*:(?:\*{1,2})?",
    )
    .unwrap()
});

/// A label occurrence inside one line.
struct LabelMatch<'a> {
    start: usize,
    end: usize,
    label: FieldLabel,
    qualifier: &'a str,
}

fn label_matches(text: &str) -> Vec<LabelMatch<'_>> {
    FIELD_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = FieldLabel::from_match(caps.get(1)?.as_str())?;
            Some(LabelMatch {
                start: whole.start(),
                end: whole.end(),
                label,
                qualifier: caps.get(2).map(|m| m.as_str().trim()).unwrap_or(""),
            })
        })
        .collect()
}

/// The field label a piece of text opens with, if any.
pub(crate) fn leading_label(text: &str) -> Option<FieldLabel> {
    label_matches(text)
        .into_iter()
        .next()
        .filter(|m| m.start == 0)
        .map(|m| m.label)
}

/// Split one line into its leading prose and `- Label: value` lines.
///
/// Only labels not yet in `seen` start a new field; a consumed label stays
/// inside the preceding value. Returns `None` when nothing was extracted.
fn split_fields(text: &str, seen: &mut Vec<FieldLabel>) -> Option<(String, Vec<String>)> {
    let mut picked: Vec<LabelMatch<'_>> = Vec::new();
    for m in label_matches(text) {
        if !seen.contains(&m.label) {
            seen.push(m.label);
            picked.push(m);
        }
    }
    let first = picked.first()?;
    let lead = text[..first.start].trim_end().to_string();

    let mut fields = Vec::with_capacity(picked.len());
    for (i, m) in picked.iter().enumerate() {
        let value_end = picked.get(i + 1).map(|next| next.start).unwrap_or(text.len());
        fields.push(format_field(m.label, m.qualifier, text[m.end..value_end].trim()));
    }
    Some((lead, fields))
}

fn format_field(label: FieldLabel, qualifier: &str, value: &str) -> String {
    let mut line = format!("- {}", label.as_str());
    if !qualifier.is_empty() {
        line.push(' ');
        line.push_str(qualifier);
    }
    line.push(':');
    if !value.is_empty() {
        line.push(' ');
        line.push_str(value);
    }
    line
}

/// Whether the day body already carries a bulleted `Start:` line, in which
/// case the block is treated as already normalized.
fn has_bulleted_start(day: &DayBlock<'_>) -> bool {
    day.body.iter().any(|t| {
        matches!(
            t,
            Token::FieldLine {
                label: FieldLabel::Start,
                ..
            }
        )
    })
}

/// Emit a day block with its heading canonicalized and its fields bulleted.
pub(crate) fn render_day(day: &DayBlock<'_>, out: &mut Emitter) {
    if has_bulleted_start(day) {
        out.push(day.heading(day.title));
        for token in &day.body {
            out.push(token.raw());
        }
        return;
    }

    let mut seen: Vec<FieldLabel> = Vec::new();

    match split_fields(day.title, &mut seen) {
        Some((title, fields)) => {
            out.push(day.heading(&title));
            for field in fields {
                out.push(field);
            }
        }
        None => out.push(day.heading(day.title)),
    }

    for token in &day.body {
        match *token {
            Token::FieldLine { raw, label } => {
                if !seen.contains(&label) {
                    seen.push(label);
                }
                out.push(raw);
            }
            Token::Plain(raw) => match split_fields(raw, &mut seen) {
                Some((lead, fields)) => {
                    if !lead.trim().is_empty() {
                        out.push(lead);
                    }
                    for field in fields {
                        out.push(field);
                    }
                }
                None => out.push(raw),
            },
            other => out.push(other.raw()),
        }
    }
}

/// Normalize the fields of a single day body given as text.
///
/// Convenience wrapper over the block renderer for callers that already
/// split a reply into days.
pub fn extract_fields(body: &str) -> String {
    let day = DayBlock {
        number: "",
        title: "",
        body: super::token::tokenize(body),
    };
    let mut out = Emitter::default();
    render_day(&day, &mut out);
    // Drop the synthetic heading line.
    out.lines.remove(0);
    out.finish(body.ends_with('\n'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_lookup_is_case_insensitive() {
        assert_eq!(FieldLabel::from_match("WATER SOURCES"), Some(FieldLabel::WaterSources));
        assert_eq!(
            FieldLabel::from_match("elevation gain / loss"),
            Some(FieldLabel::ElevationGainLoss)
        );
        assert_eq!(FieldLabel::from_match("sunrise"), None);
    }

    #[test]
    fn elevation_gain_loss_beats_elevation() {
        assert_eq!(
            leading_label("Elevation gain/loss: +600 m / -200 m"),
            Some(FieldLabel::ElevationGainLoss)
        );
        assert_eq!(leading_label("Elevation: 2,100 m"), Some(FieldLabel::Elevation));
    }

    #[test]
    fn label_must_be_a_whole_word() {
        assert_eq!(leading_label("Endpoint: somewhere"), None);
        assert_eq!(leading_label("Weekend: busy"), None);
    }

    #[test]
    fn splits_several_fields_on_one_line() {
        let mut seen = Vec::new();
        let (lead, fields) = split_fields("Start: Trailhead End: Camp", &mut seen).unwrap();
        assert_eq!(lead, "");
        assert_eq!(fields, vec!["- Start: Trailhead", "- End: Camp"]);
    }

    #[test]
    fn keeps_leading_prose() {
        let mut seen = Vec::new();
        let (lead, fields) = split_fields("Great views today. Tips: bring water", &mut seen).unwrap();
        assert_eq!(lead, "Great views today.");
        assert_eq!(fields, vec!["- Tips: bring water"]);
    }

    #[test]
    fn consumed_label_stays_in_value() {
        let mut seen = vec![FieldLabel::End];
        let (_, fields) = split_fields("Start: Trailhead End: Camp", &mut seen).unwrap();
        assert_eq!(fields, vec!["- Start: Trailhead End: Camp"]);
    }

    #[test]
    fn qualifier_and_emphasis_are_handled() {
        let mut seen = Vec::new();
        let (_, fields) = split_fields("**Distance (approx):** 7 km", &mut seen).unwrap();
        assert_eq!(fields, vec!["- Distance (approx): 7 km"]);
    }

    #[test]
    fn empty_value_has_no_trailing_space() {
        let mut seen = Vec::new();
        let (_, fields) = split_fields("Lunch:", &mut seen).unwrap();
        assert_eq!(fields, vec!["- Lunch:"]);
    }

    #[test]
    fn extract_fields_on_body_text() {
        let body = "Distance: 7 km (4.3 miles)\nA lovely walk.\nTerrain: forest trail\n";
        assert_eq!(
            extract_fields(body),
            "- Distance: 7 km (4.3 miles)\nA lovely walk.\n- Terrain: forest trail\n"
        );
    }

    #[test]
    fn second_occurrence_of_a_label_is_left_alone() {
        let body = "Tips: start early\nTips: carry cash";
        assert_eq!(extract_fields(body), "- Tips: start early\nTips: carry cash");
    }

    #[test]
    fn bulleted_start_disables_extraction() {
        let body = "- Start: Lukla\nDistance: 9 km";
        assert_eq!(extract_fields(body), "- Start: Lukla\nDistance: 9 km");
    }
}
