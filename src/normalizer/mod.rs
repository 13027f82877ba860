//! Itinerary text normalizer.
//!
//! Completion replies come back loosely structured. This module rewrites
//! them into the layout the front-end renderer expects:
//!
//! - `### Day N: Title` headings, one per day
//! - per-day fields as `- Label: value` bullets
//! - `### Packing List`, `### Local Insights` and `### Practical Information`
//!   headings, each present at most once
//! - bulleted content inside those sections, `*Label:*` subsections kept
//!
//! Lines are classified once, grouped into day and section blocks,
//! and each block is rendered by its stage. Output fed back in comes out the
//! same.

mod bullets;
mod fields;
mod sections;
mod segment;
mod token;

pub use bullets::bulletize_sections;
pub use fields::{extract_fields, FieldLabel};
pub use sections::{normalize_section_headers, Section};
pub use segment::{split_days, DaySplit};

use segment::Block;

/// Output buffer shared by the stage renderers.
#[derive(Debug, Default)]
pub(crate) struct Emitter {
    pub(crate) lines: Vec<String>,
}

impl Emitter {
    pub(crate) fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Leave exactly one blank line before the next line, unless at the top.
    pub(crate) fn blank_separator(&mut self) {
        while self.lines.last().map_or(false, |l| l.trim().is_empty()) {
            self.lines.pop();
        }
        if !self.lines.is_empty() {
            self.lines.push(String::new());
        }
    }

    pub(crate) fn finish(mut self, trailing_newline: bool) -> String {
        while self.lines.last().map_or(false, |l| l.trim().is_empty()) {
            self.lines.pop();
        }
        let mut text = self.lines.join("\n");
        if trailing_newline && !text.is_empty() {
            text.push('\n');
        }
        text
    }
}

/// Normalize a completion reply into canonical itinerary markdown.
///
/// Never fails. Text with no day heading and no recognizable section is
/// returned unchanged.
pub fn normalize_itinerary(input: &str) -> String {
    let tokens = sections::promote_section_labels(token::tokenize(input));
    let blocks = segment::segment(tokens);

    if !blocks
        .iter()
        .any(|b| matches!(b, Block::Day(_) | Block::Section(_)))
    {
        return input.to_string();
    }

    let mut out = Emitter::default();
    for block in &blocks {
        match block {
            Block::Loose(lines) => {
                for token in lines {
                    out.push(token.raw());
                }
            }
            Block::Day(day) => fields::render_day(day, &mut out),
            Block::Section(section) => bullets::render_section(section, &mut out),
        }
    }
    out.finish(input.ends_with('\n'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_stable(input: &str) -> String {
        let once = normalize_itinerary(input);
        let twice = normalize_itinerary(&once);
        assert_eq!(once, twice, "second pass changed the output of {:?}", input);
        once
    }

    #[test]
    fn end_to_end_reply() {
        let out = assert_stable(
            "Day 1: Start Start: Trailhead End: Camp\nPacking List\nBring boots\nBring a map",
        );
        assert_eq!(
            out,
            "### Day 1: Start\n- Start: Trailhead\n- End: Camp\n\n### Packing List\n- Bring boots\n- Bring a map"
        );
    }

    #[test]
    fn unprefixed_day_heading_is_canonicalized() {
        let out = assert_stable("Day 3: Ridge Walk\nA long day.");
        assert!(out.lines().any(|l| l == "### Day 3: Ridge Walk"));
    }

    #[test]
    fn loose_field_is_bulleted() {
        let out = assert_stable("Day 1: Out\nDistance: 7 km (4.3 miles)\n");
        assert!(out.lines().any(|l| l == "- Distance: 7 km (4.3 miles)"));
        assert!(!out.lines().any(|l| l == "Distance: 7 km (4.3 miles)"));
    }

    #[test]
    fn bare_section_gets_exactly_one_heading() {
        let out = assert_stable("Day 1: A\nwalk\nPacking List\nboots\nPacking list again\nmap");
        assert_eq!(out.matches("### Packing List").count(), 1);
    }

    #[test]
    fn existing_heading_is_not_duplicated() {
        let out = assert_stable("### Packing List\n- boots\n\nPacking List: also socks");
        assert_eq!(out.matches("### Packing List").count(), 1);
        assert!(out.contains("- Packing List: also socks"));
    }

    #[test]
    fn day_without_fields_only_changes_heading() {
        let out = assert_stable("**Day 2: Rest**\nSleep in.\n\nRead a book.\n");
        assert_eq!(out, "### Day 2: Rest\nSleep in.\n\nRead a book.\n");
    }

    #[test]
    fn fields_keep_source_order() {
        let out = assert_stable("Day 1: A\nTips: go early. Start: Lukla Distance: 9 km");
        assert_eq!(
            out,
            "### Day 1: A\n- Tips: go early.\n- Start: Lukla\n- Distance: 9 km"
        );
    }

    #[test]
    fn unstructured_text_is_returned_as_is() {
        let input = "Sorry, I can't help with that.\r\n";
        assert_eq!(normalize_itinerary(input), input);
        assert_eq!(normalize_itinerary(""), "");
    }

    #[test]
    fn crlf_is_normalized_when_rewriting() {
        let out = normalize_itinerary("Day 1: A\r\nEnd: Camp\r\n");
        assert_eq!(out, "### Day 1: A\n- End: Camp\n");
    }

    #[test]
    fn full_reply_is_stable() {
        let reply = "Here is your trek!\n\n\
            ## Day 1: Lukla to Phakding\n\
            Start: Lukla (2,860 m) End: Phakding Distance: 8 km\n\
            Elevation gain/loss: +200 m / -400 m\n\
            Lunch: dal bhat\n\n\
            Day 2: Phakding to Namche\n\
            - Start: Phakding\n\
            - Distance: 10 km\n\n\
            1. Packing List:\n\
            *Clothing:*\n\
            Down jacket\n\
            - Rain shell\n\n\
            Local Insights\n\
            Greet people with namaste\n\n\
            ### Practical Information\n\
            Permits: TIMS card\n";
        let out = assert_stable(reply);
        assert!(out.starts_with("Here is your trek!\n\n### Day 1: Lukla to Phakding\n"));
        assert!(out.contains("- Start: Lukla (2,860 m)\n- End: Phakding\n- Distance: 8 km\n"));
        assert!(out.contains("- Elevation gain/loss: +200 m / -400 m\n- Lunch: dal bhat\n"));
        assert!(out.contains("### Day 2: Phakding to Namche\n- Start: Phakding\n- Distance: 10 km\n"));
        assert!(out.contains("\n\n### Packing List\n*Clothing:*\n- Down jacket\n- Rain shell\n\n### Local Insights\n"));
        assert!(out.contains("- Greet people with namaste"));
        assert!(out.ends_with("### Practical Information\n- Permits: TIMS card\n"));
    }
}
