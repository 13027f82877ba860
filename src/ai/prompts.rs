use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::itinerary::Filters;

static DAY_COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)[\s-]*(day|night)").expect("day count regex"));

/// System prompt for the intro exchange
pub fn intro_system() -> String {
    "You are a trekking guide assistant. Ask helpful follow-up questions to personalize the trek."
        .to_string()
}

/// Opening user message for a location
pub fn intro_prompt(location: &str) -> String {
    format!("I'm interested in trekking in {}.", location)
}

/// "N-day" when the location text names a trip length, e.g. "6 day trek in Nepal".
pub fn day_hint(location: &str) -> Option<String> {
    DAY_COUNT_RE
        .captures(location)
        .map(|c| format!("{}-day", &c[1]))
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let value = value.trim();
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

/// One line per preference, as the model sees them.
pub fn filter_summary(location: &str, filters: &Filters, comments: &str) -> String {
    format!(
        "Location: {}\n\
         Accommodation: {}\n\
         Difficulty: {}\n\
         Altitude: {}\n\
         Technical: {}\n\
         User Notes: {}",
        location.trim(),
        or_default(&filters.accommodation, "Not specified"),
        or_default(&filters.difficulty, "Not specified"),
        or_default(&filters.altitude, "Not specified"),
        or_default(&filters.technical, "Not specified"),
        or_default(comments, "None"),
    )
}

/// User message for a full itinerary
pub fn finalize_prompt(location: &str, filters: &Filters, comments: &str) -> String {
    let length = match day_hint(location) {
        Some(hint) => format!("Plan a {} trek with exactly that many day entries.\n\n", hint),
        None => String::new(),
    };
    format!(
        "Here are the trek preferences:\n\n{}\n\n\
         {}\
         If the user specifies a number of days (e.g. \"6-day trek\", \"10 days in Nepal\", etc), \
         generate that number of individual day entries.\n\n\
         Each day MUST follow the exact format specified, with special attention to:\n\
         1. Providing SPECIFIC locations, landmarks, and points of interest by name\n\
         2. Including practical details about terrain, water sources, and trail conditions\n\
         3. Mentioning actual local food specialties and accommodation options\n\
         4. Adding region-specific cultural and safety information\n\n\
         For {}, include authentic local knowledge about the trails, culture, and environment.\n\
         Make this itinerary highly specific to the region rather than generic trekking advice.\n\n\
         Please generate the full itinerary with proper formatting for each day, plus the enhanced sections.",
        filter_summary(location, filters, comments),
        length,
        location.trim()
    )
}

/// System prompt fixing the itinerary layout the normalizer expects
pub fn trek_system() -> String {
    TREK_SYSTEM.trim().to_string()
}

const TREK_SYSTEM: &str = r####"
You are an expert trekking guide AI specializing in creating detailed, practical itineraries with rich local knowledge.

Your response MUST follow this EXACT format with these enhanced sections:

1. A compelling intro paragraph (2-3 sentences) that captures the essence of the trek and highlights a unique feature.

2. Day-by-day itinerary using this exact format for EACH day:
### Day X: [Descriptive Title with Notable Feature]
- Start: [location, with altitude if relevant]
- End: [location, with altitude if relevant]
- Distance: [X km (X miles)] - mention if it's mostly uphill/downhill/flat
- Elevation gain/loss: [X m (X ft)]
- Terrain: [brief description e.g., rocky paths, forest trails, alpine meadows, etc.]
- Difficulty: [Easy/Moderate/Challenging] with brief explanation why
- Highlights: [2-3 specific points of interest, landmarks, or views]
- Lunch: [specific recommendation with local specialties if applicable]
- Accommodation: [specific name if known, with brief description]
- Water sources: [information about water availability on trail]
- Tips: [practical advice specific to this day's trek]

3. A detailed packing list section with categories:
### Packing List
*Essentials:*
- [item with brief explanation if needed]
- [item]

*Clothing:*
- [specific clothing recommendations for this trek's conditions]
- [item]

*Trek-Specific Gear:*
- [items particularly important for this region/trek]
- [item]

*Documentation:*
- [permits, maps, or documentation needed]
- [item]

4. A comprehensive local insights section:
### Local Insights
*Cultural Considerations:*
- [specific cultural practices or etiquette for the region]
- [insight]

*Safety Information:*
- [region-specific safety tips, wildlife awareness, weather patterns]
- [insight]

*Local Food & Specialties:*
- [regional dishes or foods worth trying]
- [insight]

*Language Tips:*
- [2-3 useful phrases in local language if relevant]
- [insight]

5. A practical information section:
### Practical Information
*Best Time to Visit:*
- [specific months or seasons with brief weather patterns]

*Getting There:*
- [practical transportation options to starting point]

*Permits & Regulations:*
- [any required permits, fees, or regulations]

*Emergency Contacts:*
- [nearest medical facilities or emergency numbers]

CRITICAL FORMATTING RULES:
- Use "### Day X:" format for EVERY day header
- Use bullet points (single hyphen) for ALL data points within each day
- ALWAYS include ALL sections (intro, all days, packing list, local insights, practical info)
- Use the EXACT format shown above including all field names
- ALWAYS include all fields for every day, with specific, actionable information
- Focus on providing SPECIFIC details rather than generic advice
- Include regional specialties, cultural insights, and location-specific information
- Mention actual place names, trail features, and local terminology when possible
"####;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_hint_reads_days_and_nights() {
        assert_eq!(day_hint("6-day trek in Nepal").as_deref(), Some("6-day"));
        assert_eq!(day_hint("6 day trek in Nepal").as_deref(), Some("6-day"));
        assert_eq!(day_hint("10 Days in Patagonia").as_deref(), Some("10-day"));
        assert_eq!(day_hint("3nights on Kilimanjaro").as_deref(), Some("3-day"));
        assert_eq!(day_hint("Tour du Mont Blanc"), None);
    }

    #[test]
    fn summary_fills_blanks() {
        let filters = Filters {
            accommodation: "camping".into(),
            difficulty: String::new(),
            technical: "none".into(),
            altitude: " ".into(),
        };
        let summary = filter_summary(" Nepal ", &filters, "");
        assert_eq!(
            summary,
            "Location: Nepal\n\
             Accommodation: camping\n\
             Difficulty: Not specified\n\
             Altitude: Not specified\n\
             Technical: none\n\
             User Notes: None"
        );
    }

    #[test]
    fn finalize_prompt_mentions_length_only_when_given() {
        let filters = Filters::default();
        let with_days = finalize_prompt("5 days in Peru", &filters, "vegetarian");
        assert!(with_days.contains("Plan a 5-day trek"));
        assert!(with_days.contains("User Notes: vegetarian"));
        assert!(with_days.contains("For 5 days in Peru, include"));

        let without = finalize_prompt("Peru", &filters, "");
        assert!(!without.contains("Plan a"));
        assert!(without.starts_with("Here are the trek preferences:\n\nLocation: Peru\n"));
    }

    #[test]
    fn system_prompt_names_every_section() {
        let system = trek_system();
        for heading in ["### Packing List", "### Local Insights", "### Practical Information"] {
            assert!(system.contains(heading), "{}", heading);
        }
        assert!(system.starts_with("You are an expert trekking guide"));
        assert!(system.ends_with("local terminology when possible"));
    }
}
