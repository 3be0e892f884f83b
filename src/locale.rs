//! Game language preferences.

use serde::{Deserialize, Serialize};

/// Languages the scoreboard can be rendered in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "en_NA")]
    EnglishNA,
    #[serde(rename = "en_UK")]
    EnglishUK,
    #[serde(untagged)]
    Other(String),
}

impl Language {
    /// Directory name used for per-language assets.
    pub fn code(&self) -> &str {
        match self {
            Language::Japanese => "ja",
            Language::EnglishNA => "en_NA",
            Language::EnglishUK => "en_UK",
            Language::Other(code) => code,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
