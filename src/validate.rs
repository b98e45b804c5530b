use crate::models::{NodeRow, Shaped, TagRow, WayNodeRow, WayRow};
use anyhow::{bail, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
    Text,
}

impl FieldKind {
    fn check(self, value: &str) -> Option<&'static str> {
        match self {
            FieldKind::Integer if value.parse::<i64>().is_err() => Some("must be of integer type"),
            FieldKind::Float if value.parse::<f64>().is_err() => Some("must be of float type"),
            _ => None,
        }
    }
}

pub const NODE_SCHEMA: &[(&str, FieldKind)] = &[
    ("id", FieldKind::Integer),
    ("lat", FieldKind::Float),
    ("lon", FieldKind::Float),
    ("user", FieldKind::Text),
    ("uid", FieldKind::Integer),
    ("version", FieldKind::Text),
    ("changeset", FieldKind::Integer),
    ("timestamp", FieldKind::Text),
];

pub const WAY_SCHEMA: &[(&str, FieldKind)] = &[
    ("id", FieldKind::Integer),
    ("user", FieldKind::Text),
    ("uid", FieldKind::Integer),
    ("version", FieldKind::Text),
    ("changeset", FieldKind::Integer),
    ("timestamp", FieldKind::Text),
];

pub const TAG_SCHEMA: &[(&str, FieldKind)] = &[
    ("id", FieldKind::Integer),
    ("key", FieldKind::Text),
    ("value", FieldKind::Text),
    ("type", FieldKind::Text),
];

pub const WAY_NODE_SCHEMA: &[(&str, FieldKind)] = &[
    ("id", FieldKind::Integer),
    ("node_id", FieldKind::Integer),
    ("position", FieldKind::Integer),
];

/// Field-level problems found in one group, as `(field, message)`.
type FieldErrors = Vec<(&'static str, &'static str)>;

fn check_fields(schema: &[(&'static str, FieldKind)], values: &[Option<&str>]) -> FieldErrors {
    schema
        .iter()
        .zip(values)
        .filter_map(|(&(field, kind), value)| match value {
            None => Some((field, "required field")),
            Some("") if kind != FieldKind::Text => Some((field, "empty values not allowed")),
            Some(v) => kind.check(v).map(|msg| (field, msg)),
        })
        .collect()
}

fn node_values(row: &NodeRow) -> [Option<&str>; 8] {
    [
        row.id.as_deref(),
        row.lat.as_deref(),
        row.lon.as_deref(),
        row.user.as_deref(),
        row.uid.as_deref(),
        row.version.as_deref(),
        row.changeset.as_deref(),
        row.timestamp.as_deref(),
    ]
}

fn way_values(row: &WayRow) -> [Option<&str>; 6] {
    [
        row.id.as_deref(),
        row.user.as_deref(),
        row.uid.as_deref(),
        row.version.as_deref(),
        row.changeset.as_deref(),
        row.timestamp.as_deref(),
    ]
}

fn tag_errors(tags: &[TagRow]) -> Vec<(usize, FieldErrors)> {
    tags.iter()
        .enumerate()
        .map(|(i, t)| {
            let values = [
                Some(t.id.as_str()),
                Some(t.key.as_str()),
                Some(t.value.as_str()),
                Some(t.tag_type.as_str()),
            ];
            (i, check_fields(TAG_SCHEMA, &values))
        })
        .filter(|(_, errs)| !errs.is_empty())
        .collect()
}

fn way_node_errors(nodes: &[WayNodeRow]) -> Vec<(usize, FieldErrors)> {
    nodes
        .iter()
        .enumerate()
        .map(|(i, n)| {
            let position = n.position.to_string();
            let values = [
                Some(n.id.as_str()),
                Some(n.node_id.as_str()),
                Some(position.as_str()),
            ];
            (i, check_fields(WAY_NODE_SCHEMA, &values))
        })
        .filter(|(_, errs)| !errs.is_empty())
        .collect()
}

fn fail_single(group: &str, errors: &FieldErrors) -> Result<()> {
    let lines: Vec<String> = errors
        .iter()
        .map(|(field, msg)| format!("  {}: {}", field, msg))
        .collect();
    bail!(
        "Element of type '{}' has the following errors:\n{}",
        group,
        lines.join("\n")
    )
}

fn fail_rows(group: &str, rows: &[(usize, FieldErrors)]) -> Result<()> {
    let lines: Vec<String> = rows
        .iter()
        .flat_map(|(i, errs)| {
            errs.iter()
                .map(move |(field, msg)| format!("  [{}] {}: {}", i, field, msg))
        })
        .collect();
    bail!(
        "Element of type '{}' has the following errors:\n{}",
        group,
        lines.join("\n")
    )
}

/// Checks shaped rows against the fixed table schema.
///
/// Fails on the first field group with problems, naming the group and every
/// offending field in it.
pub fn validate_shaped(shaped: &Shaped) -> Result<()> {
    match shaped {
        Shaped::Node { node, tags } => {
            let errors = check_fields(NODE_SCHEMA, &node_values(node));
            if !errors.is_empty() {
                return fail_single("node", &errors);
            }
            let errors = tag_errors(tags);
            if !errors.is_empty() {
                return fail_rows("node_tags", &errors);
            }
        }
        Shaped::Way { way, nodes, tags } => {
            let errors = check_fields(WAY_SCHEMA, &way_values(way));
            if !errors.is_empty() {
                return fail_single("way", &errors);
            }
            let errors = way_node_errors(nodes);
            if !errors.is_empty() {
                return fail_rows("way_nodes", &errors);
            }
            let errors = tag_errors(tags);
            if !errors.is_empty() {
                return fail_rows("way_tags", &errors);
            }
        }
    }
    Ok(())
}
