//! Which CSV cells load as SQL NULL

use serde::{Serialize, Deserialize};

/// Missing-value markers; cells are trimmed before matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NullConfig {
    pub tokens: Vec<String>,
    pub case_sensitive: bool,
}

impl Default for NullConfig {
    fn default() -> Self {
        Self {
            tokens: ["", "NA", "N/A", "null", "NaN"].iter().map(|t| t.to_string()).collect(),
            case_sensitive: false,
        }
    }
}

impl NullConfig {
    pub fn is_null(&self, cell: &str) -> bool {
        let cell = cell.trim();
        self.tokens.iter().any(|token| match self.case_sensitive {
            true => cell == token,
            false => cell.eq_ignore_ascii_case(token),
        })
    }
}
