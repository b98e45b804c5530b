/// Keep every k-th top-level element when sampling
pub const DEFAULT_SAMPLE_STRIDE: usize = 20;

/// Progress update interval (tick every N elements)
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Buffer size for each CSV writer
pub const CSV_BUFFER_CAPACITY: usize = 128 * 1024;

/// Tag type assigned to keys without a namespace prefix
pub const DEFAULT_TAG_TYPE: &str = "regular";

/// Tag key whose value goes through the street-name normalizer
pub const STREET_KEY: &str = "addr:street";

pub const NODES_PATH: &str = "nodes.csv";
pub const NODE_TAGS_PATH: &str = "nodes_tags.csv";
pub const WAYS_PATH: &str = "ways.csv";
pub const WAY_NODES_PATH: &str = "ways_nodes.csv";
pub const WAY_TAGS_PATH: &str = "ways_tags.csv";

// Column order must match the SQL table schema the CSVs are loaded into.
pub const NODE_FIELDS: &[&str] = &[
    "id",
    "lat",
    "lon",
    "user",
    "uid",
    "version",
    "changeset",
    "timestamp",
];
pub const NODE_TAGS_FIELDS: &[&str] = &["id", "key", "value", "type"];
pub const WAY_FIELDS: &[&str] = &["id", "user", "uid", "version", "changeset", "timestamp"];
pub const WAY_TAGS_FIELDS: &[&str] = &["id", "key", "value", "type"];
pub const WAY_NODES_FIELDS: &[&str] = &["id", "node_id", "position"];

/// Top-level elements read from a dump by default
pub const TOP_LEVEL_TAGS: &[&str] = &["node", "way", "relation"];

/// Elements that the shaper turns into rows
pub const SHAPED_TAGS: &[&str] = &["node", "way"];
