//! Deterministic text mining over encyclopedia extracts
//!
//! Every function here is pure. Fields are only produced when a matching
//! sentence or keyword exists; nothing is invented.

const SHORT_DESCRIPTION_SENTENCES: usize = 2;
const SHORT_DESCRIPTION_MAX_CHARS: usize = 200;
const MAX_SENTENCES_PER_FIELD: usize = 2;

// A trailing `*` means prefix match, otherwise the whole word (or its plural)
const CULTURAL_KEYWORDS: &[&str] = &[
    "religio*",
    "sacred",
    "pilgrim*",
    "worship*",
    "ritual*",
    "heritage",
    "unesco",
    "festival*",
    "spiritual*",
    "deity",
    "deities",
    "holy",
    "tradition*",
    "shrine",
];

const HISTORICAL_KEYWORDS: &[&str] = &[
    "built",
    "construct*",
    "founded",
    "established",
    "century",
    "centuries",
    "dynasty",
    "dynasties",
    "empire",
    "era",
    "ancient",
    "historic*",
    "reign*",
    "commissioned",
    "ruler*",
];

const VISIT_KEYWORDS: &[&str] = &[
    "best time",
    "season*",
    "winter",
    "summer",
    "monsoon",
    "spring",
    "autumn",
    "climate",
    "weather",
];

const ACCESS_KEYWORDS: &[&str] = &[
    "accessib*",
    "wheelchair",
    "railway",
    "airport",
    "bus",
    "road",
    "station",
    "reach*",
    "km from",
    "kilometres from",
    "kilometers from",
    "open to the public",
    "entry fee",
    "opening hours",
];

/// Category fragment to activities it implies
const CATEGORY_ACTIVITIES: &[(&str, &[&str])] = &[
    ("national park", &["Hiking", "Wildlife viewing"]),
    ("wildlife sanctuar", &["Wildlife viewing", "Bird watching"]),
    ("temple", &["Pilgrimage", "Architecture tour"]),
    ("religious building", &["Pilgrimage", "Architecture tour"]),
    ("church", &["Architecture tour"]),
    ("mosque", &["Architecture tour"]),
    ("fort", &["Heritage walk", "Photography"]),
    ("castle", &["Heritage walk", "Photography"]),
    ("palace", &["Heritage walk", "Photography"]),
    ("museum", &["Museum visit"]),
    ("beach", &["Swimming", "Sunbathing"]),
    ("mountain", &["Trekking", "Sightseeing"]),
    ("hill station", &["Trekking", "Sightseeing"]),
    ("lake", &["Boating"]),
    ("waterfall", &["Photography"]),
];

/// Text keyword to the activity it implies
const TEXT_ACTIVITIES: &[(&str, &str)] = &[
    ("trek*", "Trekking"),
    ("hike", "Hiking"),
    ("hiking", "Hiking"),
    ("boat*", "Boating"),
    ("safari*", "Safari"),
    ("bird*", "Bird watching"),
    ("photograph*", "Photography"),
    ("pilgrim*", "Pilgrimage"),
    ("camping", "Camping"),
    ("rafting", "River rafting"),
    ("skiing", "Skiing"),
    ("snorkel*", "Snorkeling"),
    ("diving", "Scuba diving"),
];

/// Split prose into sentences, keeping the terminating punctuation
pub fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
            if at_boundary {
                let end = idx + c.len_utf8();
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    out.push(sentence);
                }
                start = end;
            }
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}

fn words(lower: &str) -> impl Iterator<Item = &str> {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
}

fn matches_keyword(lower: &str, keyword: &str) -> bool {
    if keyword.contains(' ') {
        return lower.contains(keyword);
    }
    match keyword.strip_suffix('*') {
        Some(stem) => words(lower).any(|word| word.starts_with(stem)),
        None => words(lower).any(|word| {
            word == keyword || word.strip_suffix('s').is_some_and(|singular| singular == keyword)
        }),
    }
}

fn matches_any(text: &str, keywords: &[&str]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|keyword| matches_keyword(&lower, keyword))
}

fn matching_sentences(text: &str, keywords: &[&str]) -> Option<String> {
    let found: Vec<&str> = sentences(text)
        .into_iter()
        .filter(|sentence| matches_any(sentence, keywords))
        .take(MAX_SENTENCES_PER_FIELD)
        .collect();

    if found.is_empty() {
        None
    } else {
        Some(found.join(" "))
    }
}

/// First two sentences, hard-truncated to 200 characters with an ellipsis
pub fn short_description(extract: &str) -> String {
    let lead = sentences(extract)
        .into_iter()
        .take(SHORT_DESCRIPTION_SENTENCES)
        .collect::<Vec<_>>()
        .join(" ");

    if lead.chars().count() <= SHORT_DESCRIPTION_MAX_CHARS {
        return lead;
    }
    let truncated: String = lead.chars().take(SHORT_DESCRIPTION_MAX_CHARS - 3).collect();
    format!("{}...", truncated.trim_end())
}

pub fn cultural_significance(text: &str) -> Option<String> {
    matching_sentences(text, CULTURAL_KEYWORDS)
}

pub fn historical_context(text: &str) -> Option<String> {
    matching_sentences(text, HISTORICAL_KEYWORDS)
}

pub fn best_time_to_visit(text: &str) -> Option<String> {
    matching_sentences(text, VISIT_KEYWORDS)
}

pub fn accessibility(text: &str) -> Option<String> {
    matching_sentences(text, ACCESS_KEYWORDS)
}

/// Activities implied by page categories and by keywords in the text
pub fn activities(categories: &[String], text: &str) -> Option<Vec<String>> {
    let mut found: Vec<String> = Vec::new();
    let mut push = |activity: &str| {
        if !found.iter().any(|existing| existing == activity) {
            found.push(activity.to_string());
        }
    };

    for category in categories {
        let lower = category.to_lowercase();
        for (fragment, implied) in CATEGORY_ACTIVITIES {
            if lower.contains(*fragment) {
                implied.iter().for_each(|activity| push(activity));
            }
        }
    }

    let lower = text.to_lowercase();
    for (keyword, activity) in TEXT_ACTIVITIES {
        if matches_keyword(&lower, keyword) {
            push(activity);
        }
    }

    if found.is_empty() { None } else { Some(found) }
}
