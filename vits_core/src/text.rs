//! Text normalization: raw text + language -> symbol id sequence.
//!
//! Language-specific cleaners (romanization, g2p) are outside this crate;
//! cleaning here only unwraps language-tagged segments, lower-cases English
//! and collapses whitespace. Characters missing from the model's symbol
//! table are dropped.

use std::{collections::HashMap, fmt, str::FromStr};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::ModelError;

static LANG_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\[(JA|ZH|EN|KO)\](.*?)\[(?:JA|ZH|EN|KO)\]").expect("valid language segment regex")
});
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

const RAW_PREFIX: &str = "<raw>";

/// Languages offered to users, with the tags the cleaners expect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Language {
    /// Japanese without tags; the text is passed to the cleaners as-is.
    Japanese,
    /// Japanese wrapped in `[JA]` tags.
    #[default]
    JapaneseTagged,
    Chinese,
    English,
    Mix,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Japanese,
        Language::JapaneseTagged,
        Language::Chinese,
        Language::English,
        Language::Mix,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Language::Japanese => "Japanese",
            Language::JapaneseTagged => "日本語",
            Language::Chinese => "简体中文",
            Language::English => "English",
            Language::Mix => "Mix",
        }
    }

    pub fn mark(&self) -> &'static str {
        match self {
            Language::JapaneseTagged => "[JA]",
            Language::Chinese => "[ZH]",
            Language::English => "[EN]",
            Language::Japanese | Language::Mix => "",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Language {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|l| l.label() == s)
            .ok_or_else(|| ModelError::UnsupportedLanguage(s.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct TextNormalizer {
    symbol_ids: HashMap<char, i64>,
    cleaners: Vec<String>,
    add_blank: bool,
}

impl TextNormalizer {
    /// Multi-character symbols cannot appear in a char stream and are skipped,
    /// but still occupy their id.
    pub fn new(symbols: &[String], cleaners: Vec<String>, add_blank: bool) -> Self {
        let symbol_ids = symbols
            .iter()
            .enumerate()
            .filter_map(|(id, s)| {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some((c, id as i64)),
                    _ => None,
                }
            })
            .collect();
        Self {
            symbol_ids,
            cleaners,
            add_blank,
        }
    }

    pub fn normalize(&self, text: &str, language: Language) -> Vec<i64> {
        if let Some(raw) = text.strip_prefix(RAW_PREFIX) {
            return self.to_sequence(raw);
        }
        let mark = language.mark();
        let tagged = format!("{mark}{text}{mark}");
        let cleaned = if self.cleaners.is_empty() {
            tagged
        } else {
            clean(&tagged)
        };
        self.to_sequence(&cleaned)
    }

    fn to_sequence(&self, cleaned: &str) -> Vec<i64> {
        let seq: Vec<i64> = cleaned
            .chars()
            .filter_map(|c| self.symbol_ids.get(&c).copied())
            .collect();
        if self.add_blank {
            intersperse(&seq, 0)
        } else {
            seq
        }
    }
}

fn clean(text: &str) -> String {
    let unwrapped = LANG_SEGMENT.replace_all(text, |caps: &Captures| {
        let body = caps[2].trim();
        if &caps[1] == "EN" {
            format!("{} ", body.to_lowercase())
        } else {
            format!("{body} ")
        }
    });
    WHITESPACE.replace_all(&unwrapped, " ").trim().to_string()
}

/// `[a, b]` -> `[blank, a, blank, b, blank]`
pub fn intersperse(seq: &[i64], blank: i64) -> Vec<i64> {
    let mut out = Vec::with_capacity(seq.len() * 2 + 1);
    out.push(blank);
    for &id in seq {
        out.push(id);
        out.push(blank);
    }
    out
}
