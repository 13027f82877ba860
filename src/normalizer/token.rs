use once_cell::sync::Lazy;
use regex::Regex;

use super::fields::{self, FieldLabel};
use super::sections::Section;

/// One classified line of a completion reply.
///
/// Every variant keeps the raw line so untouched lines can be emitted
/// byte-for-byte.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Token<'a> {
    DayHeading {
        raw: &'a str,
        number: &'a str,
        title: &'a str,
    },
    /// A section heading already in canonical `### <Name>` form.
    SectionHeading { raw: &'a str, section: Section },
    /// A line that starts with a bare section name. Only the first one per
    /// section is promoted to a heading; the rest are demoted.
    SectionLabel {
        raw: &'a str,
        section: Section,
        rest: &'a str,
    },
    OtherHeading(&'a str),
    /// `*Label:*` inside a section.
    SubsectionLabel(&'a str),
    /// A bulleted line whose content starts with a known field label.
    FieldLine { raw: &'a str, label: FieldLabel },
    BulletLine(&'a str),
    Blank(&'a str),
    Plain(&'a str),
}

impl<'a> Token<'a> {
    pub fn raw(&self) -> &'a str {
        match *self {
            Token::DayHeading { raw, .. }
            | Token::SectionHeading { raw, .. }
            | Token::SectionLabel { raw, .. }
            | Token::FieldLine { raw, .. } => raw,
            Token::OtherHeading(raw)
            | Token::SubsectionLabel(raw)
            | Token::BulletLine(raw)
            | Token::Blank(raw)
            | Token::Plain(raw) => raw,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Token::Blank(_))
    }
}

static DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:#{1,6}\s*)?(?:\*\*)?Day\s+(\d+)\s*:(.*)$").unwrap()
});

static SECTION_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:#{1,6}\s*)?(?:\d+[.)]\s*)?(?:\*\*)?(packing list|local insights|practical information)\b(?:\*\*)?\s*:?\s*(?:\*\*)?\s*(.*)$",
    )
    .unwrap()
});

static SUBSECTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\*[^*]+:\*$").unwrap());

/// Split text into lines and classify each one.
pub(crate) fn tokenize(text: &str) -> Vec<Token<'_>> {
    text.lines().map(classify).collect()
}

pub(crate) fn classify(line: &str) -> Token<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Token::Blank(line);
    }

    if let Some(caps) = DAY_RE.captures(line) {
        let number = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let title = caps
            .get(2)
            .map(|m| m.as_str())
            .unwrap_or("")
            .trim()
            .trim_start_matches("**")
            .trim_end_matches("**")
            .trim();
        return Token::DayHeading {
            raw: line,
            number,
            title,
        };
    }

    if let Some(section) = Section::ALL.iter().find(|s| trimmed == s.heading()) {
        return Token::SectionHeading {
            raw: line,
            section: *section,
        };
    }

    if let Some(caps) = SECTION_LABEL_RE.captures(line) {
        let section = caps.get(1).and_then(|m| Section::from_label(m.as_str()));
        if let Some(section) = section {
            let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("").trim_end();
            return Token::SectionLabel {
                raw: line,
                section,
                rest,
            };
        }
    }

    if trimmed.starts_with('#') {
        return Token::OtherHeading(line);
    }

    if SUBSECTION_RE.is_match(trimmed) {
        return Token::SubsectionLabel(line);
    }

    if let Some(content) = bullet_content(trimmed) {
        return match fields::leading_label(content) {
            Some(label) => Token::FieldLine { raw: line, label },
            None => Token::BulletLine(line),
        };
    }

    Token::Plain(line)
}

/// Text after the bullet marker, if the line is bulleted.
fn bullet_content(trimmed: &str) -> Option<&str> {
    for marker in ['-', '+', '•'] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            return Some(rest.trim_start());
        }
    }
    trimmed
        .strip_prefix("* ")
        .or_else(|| trimmed.strip_prefix("*\t"))
        .map(str::trim_start)
}
