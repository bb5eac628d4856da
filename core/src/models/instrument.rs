use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque feed symbol of a tradable instrument, e.g. `R_100`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(String);

impl Instrument {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// Accepts either a raw symbol (`R_50`) or a selector label
    /// (`Volatility 50`), which maps to the matching `R_` symbol.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if let Some(rest) = trimmed.strip_prefix("Volatility ") {
            let n = rest.trim_end_matches(" Index").trim();
            if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) {
                return Self(format!("R_{n}"));
            }
        }
        Self(trimmed.to_string())
    }

    pub fn symbol(&self) -> &str {
        &self.0
    }

    /// Name used in announcements.
    ///
    /// `R_<n>` is `Volatility <n> Index`, `1HZ<n>V` is
    /// `Volatility <n> (1s) Index`, anything else is the symbol itself.
    pub fn display_name(&self) -> String {
        if let Some(n) = self.0.strip_prefix("R_") {
            if is_number(n) {
                return format!("Volatility {n} Index");
            }
        }
        if let Some(n) = self.0.strip_prefix("1HZ").and_then(|s| s.strip_suffix('V')) {
            if is_number(n) {
                return format!("Volatility {n} (1s) Index");
            }
        }
        self.0.clone()
    }
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Instrument {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
