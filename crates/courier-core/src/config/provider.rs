//! Mail provider families with distinct quota policies

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Provider family whose quota policy applies to a resource key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gmail,
    Outlook,
    Yahoo,
    #[serde(rename = "icloud")]
    ICloud,
    /// Fallback for anything unrecognized
    Other,
}

impl Provider {
    /// Every provider variant, in display order
    pub const ALL: [Provider; 5] = [
        Provider::Gmail,
        Provider::Outlook,
        Provider::Yahoo,
        Provider::ICloud,
        Provider::Other,
    ];

    /// Parse a provider name, applying aliases. Never fails.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "gmail" | "google" | "googlemail" => Provider::Gmail,
            "outlook" | "microsoft" | "office365" | "hotmail" | "live" | "msn" | "exchange"
            | "ews" => Provider::Outlook,
            "yahoo" | "ymail" => Provider::Yahoo,
            "icloud" | "apple" | "me" | "mac" => Provider::ICloud,
            _ => Provider::Other,
        }
    }

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gmail => "gmail",
            Provider::Outlook => "outlook",
            Provider::Yahoo => "yahoo",
            Provider::ICloud => "icloud",
            Provider::Other => "other",
        }
    }

    /// Segment used in override keys, e.g. `GMAIL`
    pub fn env_segment(&self) -> &'static str {
        match self {
            Provider::Gmail => "GMAIL",
            Provider::Outlook => "OUTLOOK",
            Provider::Yahoo => "YAHOO",
            Provider::ICloud => "ICLOUD",
            Provider::Other => "OTHER",
        }
    }
}

impl Default for Provider {
    fn default() -> Self {
        Provider::Other
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Provider::parse(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_names() {
        for provider in Provider::ALL {
            assert_eq!(Provider::parse(provider.as_str()), provider);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Provider::parse("  GMail "), Provider::Gmail);
        assert_eq!(Provider::parse("ICLOUD"), Provider::ICloud);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Provider::parse("google"), Provider::Gmail);
        assert_eq!(Provider::parse("office365"), Provider::Outlook);
        assert_eq!(Provider::parse("hotmail"), Provider::Outlook);
        assert_eq!(Provider::parse("ymail"), Provider::Yahoo);
        assert_eq!(Provider::parse("apple"), Provider::ICloud);
    }

    #[test]
    fn test_unknown_falls_back_to_other() {
        assert_eq!(Provider::parse("fastmail"), Provider::Other);
        assert_eq!(Provider::parse(""), Provider::Other);
        assert_eq!("imap".parse::<Provider>().unwrap(), Provider::Other);
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Provider::ICloud).unwrap();
        assert_eq!(json, "\"icloud\"");
        let parsed: Provider = serde_json::from_str("\"outlook\"").unwrap();
        assert_eq!(parsed, Provider::Outlook);
    }
}
