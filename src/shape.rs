use crate::config::STREET_KEY;
use crate::models::{NodeRow, OsmElement, Shaped, TagRow, WayNodeRow, WayRow};
use crate::rules::CleaningRules;
use crate::street::update_name;
use anyhow::{Context, Result};

/// Turns a `node` or `way` element into its table rows.
///
/// Returns `Ok(None)` for any other element. Tags with problem characters in
/// their key are dropped; `nd` children of a way become way-node rows
/// numbered from 0 in document order.
pub fn shape_element(element: &OsmElement, rules: &CleaningRules) -> Result<Option<Shaped>> {
    match element.name.as_str() {
        "node" => {
            let tags = shape_tags(element, rules)?;
            Ok(Some(Shaped::Node {
                node: node_row(element),
                tags,
            }))
        }
        "way" => {
            let tags = shape_tags(element, rules)?;
            let nodes = shape_way_nodes(element)?;
            Ok(Some(Shaped::Way {
                way: way_row(element),
                nodes,
                tags,
            }))
        }
        _ => Ok(None),
    }
}

fn owned_attr(element: &OsmElement, key: &str) -> Option<String> {
    element.attr(key).map(str::to_string)
}

fn node_row(element: &OsmElement) -> NodeRow {
    NodeRow {
        id: owned_attr(element, "id"),
        lat: owned_attr(element, "lat"),
        lon: owned_attr(element, "lon"),
        user: owned_attr(element, "user"),
        uid: owned_attr(element, "uid"),
        version: owned_attr(element, "version"),
        changeset: owned_attr(element, "changeset"),
        timestamp: owned_attr(element, "timestamp"),
    }
}

fn way_row(element: &OsmElement) -> WayRow {
    WayRow {
        id: owned_attr(element, "id"),
        user: owned_attr(element, "user"),
        uid: owned_attr(element, "uid"),
        version: owned_attr(element, "version"),
        changeset: owned_attr(element, "changeset"),
        timestamp: owned_attr(element, "timestamp"),
    }
}

fn element_id(element: &OsmElement) -> Result<&str> {
    element
        .attr("id")
        .with_context(|| format!("<{}> element has no id attribute", element.name))
}

fn shape_tags(element: &OsmElement, rules: &CleaningRules) -> Result<Vec<TagRow>> {
    let mut tags = Vec::new();
    for child in element.children.iter().filter(|c| c.name == "tag") {
        let id = element_id(element)?;
        let key = child
            .attr("k")
            .with_context(|| format!("<tag> under {} {} has no k attribute", element.name, id))?;
        let value = child
            .attr("v")
            .with_context(|| format!("<tag> {:?} under {} {} has no v attribute", key, element.name, id))?;

        if let Some(row) = shape_tag(id, key, value, rules) {
            tags.push(row);
        }
    }
    Ok(tags)
}

/// Classifies a single `k`/`v` pair. `None` means the key is dropped.
pub fn shape_tag(id: &str, key: &str, value: &str, rules: &CleaningRules) -> Option<TagRow> {
    if rules.namespaced_key.is_match(key) {
        let (tag_type, sub_key) = key.split_once(':')?;
        let value = if key == STREET_KEY {
            update_name(value, rules).into_owned()
        } else {
            value.to_string()
        };
        return Some(TagRow {
            id: id.to_string(),
            key: sub_key.to_string(),
            value,
            tag_type: tag_type.to_string(),
        });
    }

    if rules.problem_chars.is_match(key) {
        return None;
    }

    Some(TagRow {
        id: id.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        tag_type: rules.default_tag_type.clone(),
    })
}

fn shape_way_nodes(element: &OsmElement) -> Result<Vec<WayNodeRow>> {
    let mut nodes = Vec::new();
    let mut position = 0u32;
    for child in element.children.iter().filter(|c| c.name == "nd") {
        let id = element_id(element)?;
        let node_id = child
            .attr("ref")
            .with_context(|| format!("<nd> at position {} of way {} has no ref", position, id))?;
        nodes.push(WayNodeRow {
            id: id.to_string(),
            node_id: node_id.to_string(),
            position,
        });
        position += 1;
    }
    Ok(nodes)
}
