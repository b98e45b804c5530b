use serde::Serialize;

/// A detached XML element with ordered attributes and its nested children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OsmElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<OsmElement>,
}

impl OsmElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: OsmElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// This element and all of its descendants, depth first, in document order.
    pub fn descendants(&self) -> Vec<&OsmElement> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.descendants());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NodeRow {
    pub id: Option<String>,
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub user: Option<String>,
    pub uid: Option<String>,
    pub version: Option<String>,
    pub changeset: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WayRow {
    pub id: Option<String>,
    pub user: Option<String>,
    pub uid: Option<String>,
    pub version: Option<String>,
    pub changeset: Option<String>,
    pub timestamp: Option<String>,
}

/// A secondary `tag` of a node or way. Shared by `nodes_tags` and `ways_tags`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagRow {
    pub id: String,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub tag_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WayNodeRow {
    pub id: String,
    pub node_id: String,
    pub position: u32,
}

/// Rows derived from one `node` or `way` element.
#[derive(Debug, Clone, PartialEq)]
pub enum Shaped {
    Node {
        node: NodeRow,
        tags: Vec<TagRow>,
    },
    Way {
        way: WayRow,
        nodes: Vec<WayNodeRow>,
        tags: Vec<TagRow>,
    },
}

impl Shaped {
    pub fn tags(&self) -> &[TagRow] {
        match self {
            Shaped::Node { tags, .. } | Shaped::Way { tags, .. } => tags,
        }
    }
}
