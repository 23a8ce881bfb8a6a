use regex::Regex;
use std::sync::OnceLock;

const MAX_TITLE_CHARS: usize = 40;

/// Words that end a place name inside a sentence ("Sevilla y comer jamón").
const CONNECTORS: &[&str] = &[
    "y", "e", "para", "por", "en", "con", "de", "del", "durante", "que", "el", "la", "los",
    "las", "un", "una",
];

fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)quiero ir a\s+([A-Za-zÀ-ÿ\s]+)",
            r"(?i)viaje a\s+([A-Za-zÀ-ÿ\s]+)",
            r"(?i)voy a\s+([A-Za-zÀ-ÿ\s]+)",
            r"a\s+([A-Za-zÀ-ÿ\s]+)\s+por\s+",
            r"(?i)a\s+([A-Za-zÀ-ÿ\s]+)\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static regex"))
        .collect()
    })
}

/// Best-effort place name from free text, e.g. "Quiero ir a Sevilla" → "Sevilla".
pub fn extract_title(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    for pattern in patterns() {
        let Some(captured) = pattern.captures(text).and_then(|c| c.get(1)) else {
            continue;
        };
        let candidate = trim_candidate(captured.as_str());
        let len = candidate.chars().count();
        if len > 0 && len < MAX_TITLE_CHARS {
            return Some(capitalize(&candidate));
        }
    }
    None
}

fn trim_candidate(raw: &str) -> String {
    let sentence = raw
        .split(|c| matches!(c, '.' | ',' | '\n'))
        .next()
        .unwrap_or("");
    sentence
        .split_whitespace()
        .take_while(|word| !CONNECTORS.contains(&word.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
