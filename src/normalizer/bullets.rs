use super::segment::{segment, Block, SectionBlock};
use super::token::{tokenize, Token};
use super::Emitter;

/// Bullet one section content line unless it is already structural.
fn bullet_line(token: &Token<'_>) -> String {
    if token.is_blank() {
        return String::new();
    }
    match *token {
        Token::Plain(raw) | Token::SectionLabel { raw, .. } => {
            let trimmed = raw.trim();
            if trimmed.starts_with('*') {
                raw.to_string()
            } else {
                format!("- {}", trimmed)
            }
        }
        other => other.raw().to_string(),
    }
}

/// Emit a section with its canonical heading and every content line bulleted.
pub(crate) fn render_section(section: &SectionBlock<'_>, out: &mut Emitter) {
    let mut body: Vec<String> = section.intro.iter().map(bullet_line).collect();
    for sub in &section.subsections {
        body.push(sub.label.to_string());
        body.extend(sub.lines.iter().map(bullet_line));
    }

    let start = body.iter().position(|l| !l.is_empty()).unwrap_or(body.len());
    let end = body.iter().rposition(|l| !l.is_empty()).map_or(start, |i| i + 1);

    out.blank_separator();
    out.push(section.section.heading());
    for line in &body[start..end] {
        out.push(line.as_str());
    }
    out.push("");
}

/// Bullet the content of every canonical section, leaving the rest alone.
pub fn bulletize_sections(text: &str) -> String {
    let blocks = segment(tokenize(text));
    if !blocks.iter().any(|b| matches!(b, Block::Section(_))) {
        return text.to_string();
    }

    let mut out = Emitter::default();
    for block in &blocks {
        match block {
            Block::Section(section) => render_section(section, &mut out),
            Block::Day(day) => {
                out.push(day.heading(day.title));
                for token in &day.body {
                    out.push(token.raw());
                }
            }
            Block::Loose(lines) => {
                for token in lines {
                    out.push(token.raw());
                }
            }
        }
    }
    out.finish(text.ends_with('\n'))
}
