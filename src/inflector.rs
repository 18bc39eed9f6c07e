//! Naming conventions used to derive table names, foreign keys and labels.
//!
//! English-centric and deliberately small: regular plurals, a few irregular
//! nouns and the uncountables that show up in schema names.

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("goose", "geese"),
];

const UNCOUNTABLE: &[&str] = &["data", "equipment", "information", "media", "news", "series", "species"];

/// Plural form of `name`, applied to the last `_`-separated word
pub fn plural(name: &str) -> String {
    let (head, word) = split_last_word(name);
    let lower = word.to_ascii_lowercase();
    if UNCOUNTABLE.contains(&lower.as_str()) {
        return name.to_string();
    }
    if let Some((_, many)) = IRREGULAR.iter().find(|(one, _)| *one == lower) {
        return format!("{head}{many}");
    }
    let word = if lower.ends_with('y') && !ends_with_any(&lower, &["ay", "ey", "iy", "oy", "uy"]) {
        format!("{}ies", &word[..word.len() - 1])
    } else if ends_with_any(&lower, &["s", "sh", "ch", "x", "z"]) {
        format!("{word}es")
    } else {
        format!("{word}s")
    };
    format!("{head}{word}")
}

/// Singular form of `name`, applied to the last `_`-separated word
pub fn singular(name: &str) -> String {
    let (head, word) = split_last_word(name);
    let lower = word.to_ascii_lowercase();
    if UNCOUNTABLE.contains(&lower.as_str()) {
        return name.to_string();
    }
    if let Some((one, _)) = IRREGULAR.iter().find(|(_, many)| *many == lower) {
        return format!("{head}{one}");
    }
    let word = if lower.ends_with("ies") && word.len() > 3 {
        format!("{}y", &word[..word.len() - 3])
    } else if ends_with_any(&lower, &["sses", "ches", "shes", "xes", "zes"]) {
        word[..word.len() - 2].to_string()
    } else if lower.ends_with('s') && !lower.ends_with("ss") && word.len() > 1 {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    };
    format!("{head}{word}")
}

/// `"blog_post-title"` -> `"blog post title"`
pub fn humanize(name: &str) -> String {
    name.trim()
        .split(['_', '-'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Uppercase the first character
pub fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn split_last_word(name: &str) -> (&str, &str) {
    match name.rfind('_') {
        Some(idx) => (&name[..=idx], &name[idx + 1..]),
        None => ("", name),
    }
}

fn ends_with_any(word: &str, suffixes: &[&str]) -> bool {
    suffixes.iter().any(|suffix| word.ends_with(suffix))
}
