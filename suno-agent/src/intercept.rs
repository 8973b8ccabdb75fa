//! Questions answered locally without calling the provider

use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use suno_core::config::InterceptConfig;
use suno_core::utils::Clock;

const DATE_FORMAT: &str = "%A, %d %B %Y";

// Anything that is not a letter, digit, combining mark, apostrophe or space
static PUNCTUATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^\p{L}\p{N}\p{M}'\s]+").expect("punctuation pattern is valid")
});

/// Lower-case, strip punctuation (apostrophes survive) and collapse whitespace.
///
/// Only used for matching; the user's original text is what gets stored.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'");
    let stripped = PUNCTUATION.replace_all(&lowered, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Zone used when rendering today's date
#[derive(Debug, Clone, Copy)]
pub enum DateZone {
    Local,
    Named(Tz),
}

impl DateZone {
    pub fn parse(name: &str) -> suno_core::Result<Self> {
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case("local") {
            return Ok(DateZone::Local);
        }
        name.parse::<Tz>()
            .map(DateZone::Named)
            .map_err(|_| suno_core::Error::Config(format!("unknown time zone '{}'", name)))
    }

    /// Render `now` as e.g. `Saturday, 13 July 2025`
    pub fn format_date(&self, now: DateTime<Utc>) -> String {
        match self {
            DateZone::Local => now.with_timezone(&Local).format(DATE_FORMAT).to_string(),
            DateZone::Named(tz) => now.with_timezone(tz).format(DATE_FORMAT).to_string(),
        }
    }
}

/// Answers "what is today's date" style questions from the local clock
#[derive(Debug, Clone)]
pub struct DateIntercept {
    enabled: bool,
    zone: DateZone,
    keywords: Vec<String>,
}

impl DateIntercept {
    pub fn new(zone: DateZone, keywords: impl IntoIterator<Item = String>) -> Self {
        let keywords = keywords
            .into_iter()
            .map(|k| normalize(&k))
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            enabled: true,
            zone,
            keywords,
        }
    }

    pub fn from_config(config: &InterceptConfig) -> suno_core::Result<Self> {
        let mut intercept = Self::new(
            DateZone::parse(&config.timezone)?,
            config.date_keywords.iter().cloned(),
        );
        intercept.enabled = config.enabled;
        Ok(intercept)
    }

    /// An intercept that never matches
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            zone: DateZone::Local,
            keywords: Vec::new(),
        }
    }

    /// Whether `text` contains one of the date phrases on word boundaries
    pub fn matches(&self, text: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let padded = format!(" {} ", normalize(text));
        self.keywords
            .iter()
            .any(|k| padded.contains(&format!(" {} ", k)))
    }

    pub fn answer(&self, now: DateTime<Utc>) -> String {
        format!("Today is {}.", self.zone.format_date(now))
    }

    /// The local reply for `text`, if it is a date question
    pub fn try_answer(&self, text: &str, clock: &dyn Clock) -> Option<String> {
        self.matches(text).then(|| self.answer(clock.now()))
    }
}
