use crate::models::Shaped;
use serde::Serialize;

/// Counters collected while exporting an OSM file to CSV
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    pub elements_seen: u64,
    pub nodes: u64,
    pub ways: u64,
    pub node_tags: u64,
    pub way_tags: u64,
    pub way_nodes: u64,
    pub dropped_tags: u64,
    pub streets_updated: u64,
}

impl ExportStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_seen(&mut self) {
        self.elements_seen += 1;
    }

    /// Records one shaped element. `tag_children` is the number of `tag`
    /// children the element had before problem keys were dropped.
    pub fn record(&mut self, shaped: &Shaped, tag_children: usize) {
        match shaped {
            Shaped::Node { tags, .. } => {
                self.nodes += 1;
                self.node_tags += tags.len() as u64;
            }
            Shaped::Way { nodes, tags, .. } => {
                self.ways += 1;
                self.way_tags += tags.len() as u64;
                self.way_nodes += nodes.len() as u64;
            }
        }
        self.dropped_tags += tag_children.saturating_sub(shaped.tags().len()) as u64;
    }

    pub fn add_streets_updated(&mut self, count: u64) {
        self.streets_updated += count;
    }

    pub fn tag_rows(&self) -> u64 {
        self.node_tags + self.way_tags
    }
}
