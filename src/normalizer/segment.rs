use super::sections::{promote_section_labels, Section};
use super::token::{tokenize, Token};

/// A `Day N: Title` heading and the lines up to the next day or section.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DayBlock<'a> {
    pub number: &'a str,
    pub title: &'a str,
    pub body: Vec<Token<'a>>,
}

impl<'a> DayBlock<'a> {
    pub fn heading(&self, title: &str) -> String {
        if title.is_empty() {
            format!("### Day {}:", self.number)
        } else {
            format!("### Day {}: {}", self.number, title)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Subsection<'a> {
    pub label: &'a str,
    pub lines: Vec<Token<'a>>,
}

/// A top-level section running to the next heading of any kind.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SectionBlock<'a> {
    pub section: Section,
    pub intro: Vec<Token<'a>>,
    pub subsections: Vec<Subsection<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Block<'a> {
    /// Lines outside any day or section, emitted as-is.
    Loose(Vec<Token<'a>>),
    Day(DayBlock<'a>),
    Section(SectionBlock<'a>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    InDay,
    InSection,
    InSubsection,
}

/// Group classified lines into blocks.
pub(crate) fn segment<'a>(tokens: Vec<Token<'a>>) -> Vec<Block<'a>> {
    let mut blocks: Vec<Block<'a>> = Vec::new();
    let mut state = State::Preamble;

    for token in tokens {
        match token {
            Token::DayHeading { number, title, .. } => {
                blocks.push(Block::Day(DayBlock {
                    number,
                    title,
                    body: Vec::new(),
                }));
                state = State::InDay;
            }
            Token::SectionHeading { section, .. } => {
                blocks.push(Block::Section(SectionBlock {
                    section,
                    intro: Vec::new(),
                    subsections: Vec::new(),
                }));
                state = State::InSection;
            }
            Token::OtherHeading(_) if matches!(state, State::InSection | State::InSubsection) => {
                blocks.push(Block::Loose(vec![token]));
                state = State::Preamble;
            }
            Token::SubsectionLabel(label)
                if matches!(state, State::InSection | State::InSubsection) =>
            {
                if let Some(Block::Section(section)) = blocks.last_mut() {
                    section.subsections.push(Subsection {
                        label,
                        lines: Vec::new(),
                    });
                }
                state = State::InSubsection;
            }
            _ => match (state, blocks.last_mut()) {
                (State::InDay, Some(Block::Day(day))) => day.body.push(token),
                (State::InSection, Some(Block::Section(section))) => section.intro.push(token),
                (State::InSubsection, Some(Block::Section(section))) => {
                    if let Some(sub) = section.subsections.last_mut() {
                        sub.lines.push(token);
                    }
                }
                (_, Some(Block::Loose(lines))) => lines.push(token),
                _ => blocks.push(Block::Loose(vec![token])),
            },
        }
    }
    blocks
}

/// A reply split at its day headings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DaySplit {
    /// Text before the first day heading.
    pub preamble: String,
    /// Canonical heading line and body text of each day.
    pub days: Vec<(String, String)>,
}

/// Split a reply into its preamble and days.
///
/// A day body stops at the next day heading or at the first top-level
/// section. Lines after a section are not part of any day.
pub fn split_days(text: &str) -> DaySplit {
    let blocks = segment(promote_section_labels(tokenize(text)));
    let mut split = DaySplit::default();
    let mut seen_day = false;

    for block in &blocks {
        match block {
            Block::Day(day) => {
                seen_day = true;
                let body: Vec<&str> = day.body.iter().map(|t| t.raw()).collect();
                split.days.push((day.heading(day.title), body.join("\n")));
            }
            Block::Loose(lines) if !seen_day => {
                for token in lines {
                    split.preamble.push_str(token.raw());
                    split.preamble.push('\n');
                }
            }
            _ => {}
        }
    }
    split
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(blocks: &[Block<'_>]) -> Vec<&'static str> {
        blocks
            .iter()
            .map(|b| match b {
                Block::Loose(_) => "loose",
                Block::Day(_) => "day",
                Block::Section(_) => "section",
            })
            .collect()
    }

    #[test]
    fn days_end_at_next_day_or_section() {
        let text = "Intro\nDay 1: A\nwalk\nDay 2: B\nclimb\n### Packing List\n- boots";
        let blocks = segment(tokenize(text));
        assert_eq!(kinds(&blocks), vec!["loose", "day", "day", "section"]);
        match &blocks[2] {
            Block::Day(day) => {
                assert_eq!(day.number, "2");
                assert_eq!(day.body, vec![Token::Plain("climb")]);
            }
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn other_heading_stays_in_day_but_ends_section() {
        let text = "Day 1: A\n#### Morning\nwalk\n### Local Insights\ntea\n### Notes\nbye";
        let blocks = segment(tokenize(text));
        assert_eq!(kinds(&blocks), vec!["day", "section", "loose"]);
        match &blocks[0] {
            Block::Day(day) => assert_eq!(day.body.len(), 2),
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn subsections_collect_their_lines() {
        let text = "### Local Insights\nintro\n*Food:*\ndal bhat\n*Customs:*\nremove shoes";
        let blocks = segment(tokenize(text));
        match &blocks[0] {
            Block::Section(section) => {
                assert_eq!(section.intro, vec![Token::Plain("intro")]);
                assert_eq!(section.subsections.len(), 2);
                assert_eq!(section.subsections[1].label, "*Customs:*");
                assert_eq!(section.subsections[1].lines, vec![Token::Plain("remove shoes")]);
            }
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn split_days_canonicalizes_headings() {
        let split = split_days("Welcome!\n\nDay 1: Arrival\nrest\n**Day 2: Hike**\nwalk\nPacking List\nboots");
        assert_eq!(split.preamble, "Welcome!\n\n");
        assert_eq!(
            split.days,
            vec![
                ("### Day 1: Arrival".to_string(), "rest".to_string()),
                ("### Day 2: Hike".to_string(), "walk".to_string()),
            ]
        );
    }

    #[test]
    fn split_days_without_headings() {
        let split = split_days("just prose");
        assert!(split.days.is_empty());
        assert_eq!(split.preamble, "just prose\n");
    }
}
