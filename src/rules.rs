use crate::config::DEFAULT_TAG_TYPE;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// Street suffixes accepted as-is. Curated by hand from audit output.
pub const EXPECTED_STREET_TYPES: &[&str] = &[
    "Street", "Avenue", "Boulevard", "Drive", "Court", "Place", "Lane", "Road", "Heights",
    "Parkway", "Terrace", "Alley", "Corner", "Cove", "Circle", "Highway", "Park", "Trace",
    "Trail", "View", "Village", "Randch", "Way", "Walk", "Loop", "Bayou", "Hollow", "Hill",
    "Ridge", "North", "West", "East",
];

/// Abbreviation to full-form replacements for street suffixes.
pub const STREET_MAPPING: &[(&str, &str)] = &[
    ("St", "Street"),
    ("St.", "Street"),
    ("Ave", "Avenue"),
    ("Rd.", "Road"),
    ("Pky", "Parkway"),
    ("Villa", "Village"),
    ("Lp", "Loop"),
];

static LOWER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([a-z]|_)*$").unwrap());

static LOWER_COLON_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z]|_)*:([a-z]|_)*$").unwrap());

static NAMESPACED_KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z]|_)+:([a-z]|_)+").unwrap());

static PROBLEM_CHARS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[=\+/&<>;'"\?%#$@\,\. \t\r\n]"#).unwrap());

static STREET_TYPE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b\S+\.?$").unwrap());

/// Tables and patterns that drive auditing and shaping.
///
/// Passed explicitly to every function that needs it so callers (and tests)
/// can swap in alternate tables.
#[derive(Debug, Clone)]
pub struct CleaningRules {
    expected: FxHashSet<String>,
    mapping: FxHashMap<String, String>,
    pub lower: Regex,
    pub lower_colon: Regex,
    pub namespaced_key: Regex,
    pub problem_chars: Regex,
    pub street_type: Regex,
    pub default_tag_type: String,
}

/// On-disk override for the street tables. Missing fields keep the defaults.
#[derive(Debug, Default, Deserialize)]
struct RulesFile {
    expected: Option<Vec<String>>,
    mapping: Option<FxHashMap<String, String>>,
}

impl Default for CleaningRules {
    fn default() -> Self {
        Self::new(
            EXPECTED_STREET_TYPES.iter().map(|s| s.to_string()),
            STREET_MAPPING
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }
}

impl CleaningRules {
    pub fn new<E, M>(expected: E, mapping: M) -> Self
    where
        E: IntoIterator<Item = String>,
        M: IntoIterator<Item = (String, String)>,
    {
        Self {
            expected: expected.into_iter().collect(),
            mapping: mapping.into_iter().collect(),
            lower: LOWER_REGEX.clone(),
            lower_colon: LOWER_COLON_REGEX.clone(),
            namespaced_key: NAMESPACED_KEY_REGEX.clone(),
            problem_chars: PROBLEM_CHARS_REGEX.clone(),
            street_type: STREET_TYPE_REGEX.clone(),
            default_tag_type: DEFAULT_TAG_TYPE.to_string(),
        }
    }

    /// Loads street tables from a JSON file of the form
    /// `{"expected": [...], "mapping": {"St": "Street"}}`.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file: {:?}", path))?;
        let file: RulesFile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse rules file: {:?}", path))?;

        let defaults = Self::default();
        let rules = Self {
            expected: file
                .expected
                .map(|e| e.into_iter().collect())
                .unwrap_or(defaults.expected),
            mapping: file
                .mapping
                .map(|m| m.into_iter().collect())
                .unwrap_or(defaults.mapping),
            ..Self::default()
        };

        info!(
            expected = rules.expected.len(),
            mappings = rules.mapping.len(),
            path = ?path,
            "Loaded cleaning rules"
        );
        Ok(rules)
    }

    pub fn is_expected(&self, street_type: &str) -> bool {
        self.expected.contains(street_type)
    }

    pub fn full_form(&self, abbreviation: &str) -> Option<&str> {
        self.mapping.get(abbreviation).map(String::as_str)
    }
}
