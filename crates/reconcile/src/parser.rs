//! Fact extraction from command output.
//!
//! Only two facts are extracted: principal names and secret values. Lines
//! that do not start with the declaration keyword are ignored, and a keyword
//! without a following token is skipped rather than treated as an error.
//! Results are deduplicated in first-seen order.

use crate::dialect::Dialect;
use crate::error::SetupError;
use devicekit::Record;
use regex::Regex;
use std::collections::HashSet;

/// Extracts principals and secrets using a dialect's keywords.
#[derive(Debug, Clone)]
pub struct FactParser {
    principal: Regex,
    secret: Regex,
    secret_fields: Vec<String>,
}

impl FactParser {
    /// Compile matchers for a dialect.
    pub fn new(dialect: &Dialect) -> Result<Self, SetupError> {
        Ok(Self {
            principal: declaration_regex(&dialect.principal_keyword)?,
            secret: declaration_regex(&dialect.secret_keyword)?,
            secret_fields: dialect.secret_fields.clone(),
        })
    }

    /// Principal names declared in `raw`.
    pub fn parse_principals(&self, raw: &str) -> Vec<String> {
        extract(&self.principal, raw)
    }

    /// Secret values declared in `raw`.
    pub fn parse_secrets(&self, raw: &str) -> Vec<String> {
        extract(&self.secret, raw)
    }

    /// Secret values from structured records.
    ///
    /// Each record contributes the first non-empty accepted field.
    pub fn parse_secret_records(&self, records: &[Record]) -> Vec<String> {
        let mut seen = HashSet::new();
        records
            .iter()
            .filter_map(|record| {
                self.secret_fields
                    .iter()
                    .filter_map(|field| record.get(field))
                    .map(|value| value.trim())
                    .find(|value| !value.is_empty())
            })
            .filter(|value| seen.insert(*value))
            .map(str::to_string)
            .collect()
    }
}

/// `^\s*<keyword words separated by \s+>\s+(\S+)`
fn declaration_regex(keyword: &str) -> Result<Regex, SetupError> {
    let words: Vec<String> = keyword.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        return Err(SetupError::InvalidPolicy(
            "dialect keywords must not be empty".to_string(),
        ));
    }
    let pattern = format!(r"^\s*{}\s+(\S+)", words.join(r"\s+"));
    Regex::new(&pattern).map_err(|source| SetupError::InvalidKeyword {
        keyword: keyword.to_string(),
        source,
    })
}

fn extract(re: &Regex, raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.lines()
        .filter_map(|line| re.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|token| seen.insert(*token))
        .map(str::to_string)
        .collect()
}
