//! Import configuration.
//!
//! Everything an import pass needs is carried in an explicit
//! [`ImportConfig`] value passed into the call; the core reads no ambient
//! or global settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default local-identity aliases. The stable client records anonymous
/// local plays under "Guest" or an empty name.
const DEFAULT_ALIASES: &[&str] = &["Guest"];

/// Configuration for one import pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Local identity aliases. Empty means: infer the local player where
    /// the source allows it, otherwise accept only the default aliases.
    pub aliases: Vec<String>,
    /// Directory holding the stable client's beatmap files, used to
    /// resolve a catalog entry to an on-disk `.osu` path.
    pub songs_dir: Option<PathBuf>,
}

impl ImportConfig {
    pub fn with_aliases<S: Into<String>>(aliases: impl IntoIterator<Item = S>) -> Self {
        Self {
            aliases: aliases.into_iter().map(Into::into).collect(),
            songs_dir: None,
        }
    }

    /// Alias filter for the ledger reader: configured aliases plus the
    /// defaults.
    pub fn alias_filter(&self) -> AliasFilter {
        AliasFilter::with_defaults(&self.aliases)
    }

    /// True when no explicit aliases were configured, which lets the
    /// dynamic reader fall back to frequency-based identity inference.
    pub fn aliases_configured(&self) -> bool {
        !self.aliases.is_empty()
    }
}

/// Case-insensitive local-identity allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasFilter {
    /// Accept every player name.
    Open,
    /// Accept only the listed names (lowercased) and blank names.
    Names(Vec<String>),
}

impl AliasFilter {
    pub fn open() -> Self {
        AliasFilter::Open
    }

    /// Filter over exactly the given names.
    pub fn exact<S: AsRef<str>>(names: &[S]) -> Self {
        AliasFilter::Names(
            names
                .iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .collect(),
        )
    }

    /// Filter over the given names plus the default aliases.
    pub fn with_defaults<S: AsRef<str>>(names: &[S]) -> Self {
        let mut lowered: Vec<String> = names
            .iter()
            .map(|n| n.as_ref().trim().to_lowercase())
            .collect();
        for default in DEFAULT_ALIASES {
            let default = default.to_lowercase();
            if !lowered.contains(&default) {
                lowered.push(default);
            }
        }
        AliasFilter::Names(lowered)
    }

    /// Case-insensitive exact match. Blank names always match: the stable
    /// client leaves the player name empty for local profiles.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            AliasFilter::Open => true,
            AliasFilter::Names(names) => {
                let trimmed = name.trim();
                trimmed.is_empty() || names.iter().any(|n| n == &trimmed.to_lowercase())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_accept_guest_and_blank() {
        let filter = ImportConfig::default().alias_filter();
        assert!(filter.matches("Guest"));
        assert!(filter.matches("guest"));
        assert!(filter.matches(""));
        assert!(filter.matches("   "));
        assert!(!filter.matches("SomeoneElse"));
    }

    #[test]
    fn test_configured_alias_case_insensitive() {
        let config = ImportConfig::with_aliases(["Player One"]);
        let filter = config.alias_filter();
        assert!(filter.matches("player one"));
        assert!(filter.matches("PLAYER ONE"));
        assert!(!filter.matches("player two"));
    }

    #[test]
    fn test_open_filter_matches_everything() {
        assert!(AliasFilter::open().matches("anyone"));
    }
}
