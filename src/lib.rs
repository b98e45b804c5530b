//! osmwrangle: OpenStreetMap XML cleaning and CSV export pipeline
//!
//! This crate turns a raw OSM XML export into five flat tables ready to be
//! loaded into a relational database, and explores the loaded result:
//!
//! 1. **Sample** -- Keep every k-th top-level element so the rest of the
//!    pipeline can be iterated on quickly
//! 2. **Audit** -- Classify tag keys by character class and collect street
//!    suffixes missing from the expected list, to curate the abbreviation table
//! 3. **Export** -- Shape each `node` and `way` into rows for `nodes`,
//!    `nodes_tags`, `ways`, `ways_nodes` and `ways_tags`, normalizing
//!    `addr:street` values on the way, and write them as CSV
//! 4. **Report** -- Run canned read-only aggregate queries against a SQLite
//!    database loaded from those CSVs
//!
//! Every stage is a single synchronous pass over a file. Stages share nothing
//! but the files they write.
//!
//! # Key Modules
//!
//! - [`parser`] -- Streaming XML reader with optional BZ2 decompression
//! - [`sample`] -- Every-k-th element sampler
//! - [`audit`] -- Tag key classification and street suffix audit
//! - [`shape`] -- Element to row mapping
//! - [`street`] -- Street-name suffix normalizer
//! - [`validate`] -- Optional schema check on shaped rows
//! - [`writer`] -- CSV output and the export pass
//! - [`report`] -- Read-only SQLite exploration queries
//! - [`rules`] -- Cleaning tables and patterns, passed explicitly
//! - [`models`] -- XML element and row types
//! - [`stats`] -- Export counters
//! - [`config`] -- Constants for file names, columns and defaults
//!
//! # Example Usage
//!
//! ```bash
//! # Sample every 20th element
//! osmwrangle sample -i new-orleans_louisiana.osm -o sample.osm -k 20
//!
//! # Look for street suffixes that need a mapping
//! osmwrangle audit -i sample.osm
//!
//! # Write the five CSV tables, checking every element against the schema
//! osmwrangle export -i sample.osm -o csv/ --validate
//!
//! # Explore the database loaded from the CSVs
//! osmwrangle report --db osm.db
//! ```

pub mod audit;
pub mod config;
pub mod models;
pub mod parser;
pub mod report;
pub mod rules;
pub mod sample;
pub mod shape;
pub mod stats;
pub mod street;
pub mod validate;
pub mod writer;
