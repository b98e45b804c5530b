use crate::config::{SHAPED_TAGS, STREET_KEY};
use crate::models::OsmElement;
use crate::parser::OsmReader;
use crate::rules::CleaningRules;
use crate::street::{street_type, update_name};
use anyhow::Result;
use indicatif::ProgressBar;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

/// Unexpected street suffix mapped to every distinct full name seen with it.
pub type StreetTypes = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    Lower,
    LowerColon,
    ProblemChars,
    Other,
}

/// Buckets a tag key by character class, checked in declaration order.
pub fn classify_key(key: &str, rules: &CleaningRules) -> KeyType {
    if rules.lower.is_match(key) {
        KeyType::Lower
    } else if rules.lower_colon.is_match(key) {
        KeyType::LowerColon
    } else if rules.problem_chars.is_match(key) {
        KeyType::ProblemChars
    } else {
        KeyType::Other
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct KeyTypeCounts {
    pub lower: u64,
    pub lower_colon: u64,
    pub problemchars: u64,
    pub other: u64,
}

impl KeyTypeCounts {
    pub fn add(&mut self, key_type: KeyType) {
        match key_type {
            KeyType::Lower => self.lower += 1,
            KeyType::LowerColon => self.lower_colon += 1,
            KeyType::ProblemChars => self.problemchars += 1,
            KeyType::Other => self.other += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.lower + self.lower_colon + self.problemchars + self.other
    }
}

/// Files `name` under its trailing token when that token is not an expected suffix.
pub fn audit_street(street_types: &mut StreetTypes, name: &str, rules: &CleaningRules) {
    if let Some(m) = street_type(name, rules) {
        let suffix = m.as_str();
        if !rules.is_expected(suffix) {
            street_types
                .entry(suffix.to_string())
                .or_default()
                .insert(name.to_string());
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    /// Element names within top-level elements, with frequencies
    pub element_counts: BTreeMap<String, u64>,
    pub key_types: KeyTypeCounts,
    pub street_types: StreetTypes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposedUpdate {
    pub street_type: String,
    pub name: String,
    pub better_name: String,
}

impl AuditReport {
    /// Folds one top-level element and its descendants into the report.
    pub fn observe(&mut self, element: &OsmElement, rules: &CleaningRules) {
        let check_streets = SHAPED_TAGS.contains(&element.name.as_str());
        let mut counts: FxHashMap<&str, u64> = FxHashMap::default();

        for el in element.descendants() {
            *counts.entry(el.name.as_str()).or_insert(0) += 1;
            if el.name != "tag" {
                continue;
            }
            let Some(key) = el.attr("k") else {
                continue;
            };
            self.key_types.add(classify_key(key, rules));
            if check_streets && key == STREET_KEY {
                if let Some(value) = el.attr("v") {
                    audit_street(&mut self.street_types, value, rules);
                }
            }
        }

        for (name, count) in counts {
            *self.element_counts.entry(name.to_string()).or_insert(0) += count;
        }
    }

    /// What the normalizer would make of every audited name.
    pub fn proposed_updates(&self, rules: &CleaningRules) -> Vec<ProposedUpdate> {
        self.street_types
            .iter()
            .flat_map(|(street_type, names)| {
                names.iter().map(move |name| ProposedUpdate {
                    street_type: street_type.clone(),
                    name: name.clone(),
                    better_name: update_name(name, rules).into_owned(),
                })
            })
            .collect()
    }
}

pub fn audit_elements<I>(elements: I, rules: &CleaningRules) -> Result<AuditReport>
where
    I: IntoIterator<Item = Result<OsmElement>>,
{
    let mut report = AuditReport::default();
    for element in elements {
        report.observe(&element?, rules);
    }
    Ok(report)
}

/// Audits tag keys and street names of every node, way and relation in a dump.
pub fn audit_file<P: AsRef<Path>>(path: P, rules: &CleaningRules) -> Result<AuditReport> {
    let path = path.as_ref();
    info!(path = ?path, "Auditing OSM file");

    let pb = ProgressBar::new_spinner();
    let reader = OsmReader::open(path)?.inspect(|_| pb.inc(1));
    let report = audit_elements(reader, rules)?;
    pb.finish_and_clear();

    info!(
        tags = report.key_types.total(),
        problem_keys = report.key_types.problemchars,
        unexpected_street_types = report.street_types.len(),
        "Audit complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(k: &str, v: &str) -> OsmElement {
        OsmElement::new("tag").with_attr("k", k).with_attr("v", v)
    }

    #[test]
    fn classify_keys() {
        let rules = CleaningRules::default();
        assert_eq!(classify_key("highway", &rules), KeyType::Lower);
        assert_eq!(classify_key("addr:street", &rules), KeyType::LowerColon);
        assert_eq!(classify_key("created by", &rules), KeyType::ProblemChars);
        assert_eq!(classify_key("FIXME", &rules), KeyType::Other);
        assert_eq!(classify_key("addr:street:name", &rules), KeyType::Other);
        assert_eq!(classify_key("", &rules), KeyType::Lower);
    }

    #[test]
    fn audit_street_skips_expected() {
        let rules = CleaningRules::default();
        let mut types = StreetTypes::new();
        audit_street(&mut types, "Canal Street", &rules);
        audit_street(&mut types, "Magazine St", &rules);
        audit_street(&mut types, "Canal St", &rules);
        audit_street(&mut types, "Canal St", &rules);
        audit_street(&mut types, "Airline Hwy", &rules);

        assert_eq!(types.len(), 2);
        let st: Vec<_> = types["St"].iter().map(String::as_str).collect();
        assert_eq!(st, vec!["Canal St", "Magazine St"]);
        assert!(types["Hwy"].contains("Airline Hwy"));
    }

    #[test]
    fn observe_counts_and_streets() {
        let rules = CleaningRules::default();
        let node = OsmElement::new("node")
            .with_child(tag("addr:street", "Decatur St"))
            .with_child(tag("amenity", "bar"))
            .with_child(tag("name:en", "x"));
        let way = OsmElement::new("way")
            .with_child(OsmElement::new("nd").with_attr("ref", "1"))
            .with_child(tag("addr:street", "Royal Street"))
            .with_child(tag("created by", "x"));
        let relation = OsmElement::new("relation").with_child(tag("addr:street", "Bourbon St"));

        let report =
            audit_elements(vec![Ok(node), Ok(way), Ok(relation)], &rules).unwrap();

        assert_eq!(report.element_counts["tag"], 6);
        assert_eq!(report.element_counts["nd"], 1);
        assert_eq!(report.element_counts["relation"], 1);
        assert_eq!(
            report.key_types,
            KeyTypeCounts {
                lower: 1,
                lower_colon: 4,
                problemchars: 1,
                other: 0,
            }
        );
        // relations are not street-audited
        assert_eq!(report.street_types.len(), 1);
        assert!(report.street_types["St"].contains("Decatur St"));
    }

    #[test]
    fn proposed_updates_apply_mapping() {
        let rules = CleaningRules::default();
        let mut report = AuditReport::default();
        audit_street(&mut report.street_types, "Esplanade Ave", &rules);
        audit_street(&mut report.street_types, "Esplanade Blvd", &rules);

        let updates = report.proposed_updates(&rules);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].name, "Esplanade Ave");
        assert_eq!(updates[0].better_name, "Esplanade Avenue");
        assert_eq!(updates[1].better_name, "Esplanade Blvd");
    }
}
