use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::Serialize;

/// Medal tiers, ordered from worst to best so `Ord` compares quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Medal {
    None,
    Bronze,
    Silver,
    Gold,
    Author,
}

/// Per-map target times in milliseconds. Lower is better, so a well-formed map
/// has `author <= gold <= silver <= bronze`; the remote source is trusted on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub author: i64,
    pub gold: i64,
    pub silver: i64,
    pub bronze: i64,
}

/// First matching tier wins; a score equal to a threshold earns that tier.
pub fn classify(score: i64, thresholds: &Thresholds) -> Medal {
    if score <= thresholds.author {
        Medal::Author
    } else if score <= thresholds.gold {
        Medal::Gold
    } else if score <= thresholds.silver {
        Medal::Silver
    } else if score <= thresholds.bronze {
        Medal::Bronze
    } else {
        Medal::None
    }
}

impl Medal {
    pub const ALL: [Medal; 5] = [
        Medal::Author,
        Medal::Gold,
        Medal::Silver,
        Medal::Bronze,
        Medal::None,
    ];

    pub fn weight(self) -> u32 {
        match self {
            Medal::Author => 4,
            Medal::Gold => 3,
            Medal::Silver => 2,
            Medal::Bronze => 1,
            Medal::None => 0,
        }
    }

    pub fn is_medal(self) -> bool {
        self != Medal::None
    }

    /// The threshold this tier was earned against.
    pub fn threshold_in(self, thresholds: &Thresholds) -> Option<i64> {
        match self {
            Medal::Author => Some(thresholds.author),
            Medal::Gold => Some(thresholds.gold),
            Medal::Silver => Some(thresholds.silver),
            Medal::Bronze => Some(thresholds.bronze),
            Medal::None => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Medal::Author => "author",
            Medal::Gold => "gold",
            Medal::Silver => "silver",
            Medal::Bronze => "bronze",
            Medal::None => "none",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Medal::Author => "🏎️",
            Medal::Gold => "🥇",
            Medal::Silver => "🥈",
            Medal::Bronze => "🥉",
            Medal::None => "💩",
        }
    }
}

impl fmt::Display for Medal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Medal {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "author" => Ok(Medal::Author),
            "gold" => Ok(Medal::Gold),
            "silver" => Ok(Medal::Silver),
            "bronze" => Ok(Medal::Bronze),
            "none" => Ok(Medal::None),
            other => Err(anyhow!("unknown medal tier {other:?}")),
        }
    }
}

/// Formats a millisecond time as `s.mmms` below a minute, `m:ss.mmm` above.
pub fn format_time(ms: i64) -> String {
    let sign = if ms < 0 { "-" } else { "" };
    let ms = ms.unsigned_abs();
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    if minutes == 0 {
        format!("{sign}{seconds}.{millis:03}s")
    } else {
        format!("{sign}{minutes}:{seconds:02}.{millis:03}")
    }
}
