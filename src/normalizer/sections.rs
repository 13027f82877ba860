use super::token::{classify, tokenize, Token};
use super::Emitter;

/// Top-level sections of an itinerary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    PackingList,
    LocalInsights,
    PracticalInformation,
}

impl Section {
    pub const ALL: [Section; 3] = [
        Section::PackingList,
        Section::LocalInsights,
        Section::PracticalInformation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Section::PackingList => "Packing List",
            Section::LocalInsights => "Local Insights",
            Section::PracticalInformation => "Practical Information",
        }
    }

    /// Canonical heading line, e.g. `### Packing List`.
    pub fn heading(&self) -> &'static str {
        match self {
            Section::PackingList => "### Packing List",
            Section::LocalInsights => "### Local Insights",
            Section::PracticalInformation => "### Practical Information",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Section::ALL
            .iter()
            .copied()
            .find(|s| s.name().eq_ignore_ascii_case(label.trim()))
    }
}

/// Resolve bare section labels into headings.
///
/// A section that already has its canonical heading anywhere in the reply is
/// left alone. Otherwise the first line opening with its name becomes the
/// heading, and whatever followed the name on that line becomes the first
/// line of the section. Labels that are not promoted fall back to ordinary
/// lines.
pub(crate) fn promote_section_labels(tokens: Vec<Token<'_>>) -> Vec<Token<'_>> {
    let mut has_heading: Vec<Section> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::SectionHeading { section, .. } => Some(*section),
            _ => None,
        })
        .collect();

    let mut out = Vec::with_capacity(tokens.len() + 1);
    for token in tokens {
        match token {
            Token::SectionLabel { raw, section, rest } => {
                if has_heading.contains(&section) {
                    out.push(demote(raw));
                    continue;
                }
                has_heading.push(section);
                out.push(Token::SectionHeading { raw, section });
                if !rest.is_empty() {
                    out.push(demote(rest));
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Give every detected section its canonical heading, leaving other lines
/// alone. Returns the text unchanged when no section is found.
pub fn normalize_section_headers(text: &str) -> String {
    let tokens = promote_section_labels(tokenize(text));
    if !tokens.iter().any(|t| matches!(t, Token::SectionHeading { .. })) {
        return text.to_string();
    }

    let mut out = Emitter::default();
    for token in &tokens {
        match token {
            Token::SectionHeading { section, .. } => {
                out.blank_separator();
                out.push(section.heading());
            }
            other => out.push(other.raw()),
        }
    }
    out.finish(text.ends_with('\n'))
}

/// Re-read a line with section detection switched off.
fn demote(line: &str) -> Token<'_> {
    match classify(line) {
        Token::SectionLabel { raw, .. } | Token::SectionHeading { raw, .. } => {
            if raw.trim_start().starts_with('#') {
                Token::OtherHeading(raw)
            } else {
                Token::Plain(raw)
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headings(tokens: &[Token<'_>]) -> Vec<Section> {
        tokens
            .iter()
            .filter_map(|t| match t {
                Token::SectionHeading { section, .. } => Some(*section),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn first_bare_label_is_promoted_once() {
        let tokens = promote_section_labels(tokenize("Packing List\nboots\npacking list\nmap"));
        assert_eq!(headings(&tokens), vec![Section::PackingList]);
        assert!(matches!(tokens[2], Token::Plain("packing list")));
    }

    #[test]
    fn existing_heading_blocks_promotion() {
        let tokens =
            promote_section_labels(tokenize("Packing List: early\n\n### Packing List\n- boots"));
        assert_eq!(headings(&tokens), vec![Section::PackingList]);
        assert!(matches!(tokens[0], Token::Plain("Packing List: early")));
    }

    #[test]
    fn trailing_text_becomes_first_line() {
        let tokens = promote_section_labels(tokenize("3. Local Insights: greet with namaste"));
        assert_eq!(headings(&tokens), vec![Section::LocalInsights]);
        assert!(matches!(tokens[1], Token::Plain("greet with namaste")));
    }

    #[test]
    fn never_fabricates_sections() {
        let tokens = promote_section_labels(tokenize("Day 1: Arrival\nStart: Lukla"));
        assert!(headings(&tokens).is_empty());
    }

    #[test]
    fn headers_get_a_blank_line_before_them() {
        assert_eq!(
            normalize_section_headers("Day 1: A\nwalk\n**Packing List:**\nboots\n"),
            "Day 1: A\nwalk\n\n### Packing List\nboots\n"
        );
        assert_eq!(normalize_section_headers("no sections"), "no sections");
    }

    #[test]
    fn from_label_ignores_case() {
        assert_eq!(
            Section::from_label("PRACTICAL INFORMATION"),
            Some(Section::PracticalInformation)
        );
        assert_eq!(Section::from_label("Itinerary"), None);
    }
}
