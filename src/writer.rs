use crate::config::{
    CSV_BUFFER_CAPACITY, NODES_PATH, NODE_FIELDS, NODE_TAGS_FIELDS, NODE_TAGS_PATH,
    PROGRESS_INTERVAL, SHAPED_TAGS, STREET_KEY, WAYS_PATH, WAY_FIELDS, WAY_NODES_FIELDS,
    WAY_NODES_PATH, WAY_TAGS_FIELDS, WAY_TAGS_PATH,
};
use crate::models::{OsmElement, Shaped};
use crate::parser::OsmReader;
use crate::rules::CleaningRules;
use crate::shape::shape_element;
use crate::stats::ExportStats;
use crate::street::update_name;
use crate::validate::validate_shaped;
use anyhow::{Context, Result};
use csv::{Writer, WriterBuilder};
use indicatif::ProgressBar;
use serde::Serialize;
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

type CsvFile = Writer<BufWriter<File>>;

fn csv_writer<W: Write>(out: W, columns: &[&str]) -> Result<Writer<W>> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(out);
    writer.write_record(columns)?;
    Ok(writer)
}

/// Writes a header row followed by one line per row. Row fields must be in column order.
pub fn write_rows<W, T, I>(out: W, columns: &[&str], rows: I) -> Result<u64>
where
    W: Write,
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv_writer(out, columns)?;
    let mut count = 0;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

/// The five output tables, each opened with its header already written.
pub struct CsvSink {
    nodes: CsvFile,
    node_tags: CsvFile,
    ways: CsvFile,
    way_nodes: CsvFile,
    way_tags: CsvFile,
}

impl CsvSink {
    pub fn create<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let dir = output_dir.as_ref();
        let open = |name: &str, columns: &[&str]| -> Result<CsvFile> {
            let path = dir.join(name);
            let file = File::create(&path)
                .with_context(|| format!("Failed to create CSV file: {:?}", path))?;
            csv_writer(BufWriter::with_capacity(CSV_BUFFER_CAPACITY, file), columns)
        };

        Ok(Self {
            nodes: open(NODES_PATH, NODE_FIELDS)?,
            node_tags: open(NODE_TAGS_PATH, NODE_TAGS_FIELDS)?,
            ways: open(WAYS_PATH, WAY_FIELDS)?,
            way_nodes: open(WAY_NODES_PATH, WAY_NODES_FIELDS)?,
            way_tags: open(WAY_TAGS_PATH, WAY_TAGS_FIELDS)?,
        })
    }

    pub fn write(&mut self, shaped: &Shaped) -> Result<()> {
        match shaped {
            Shaped::Node { node, tags } => {
                self.nodes.serialize(node)?;
                for tag in tags {
                    self.node_tags.serialize(tag)?;
                }
            }
            Shaped::Way { way, nodes, tags } => {
                self.ways.serialize(way)?;
                for node in nodes {
                    self.way_nodes.serialize(node)?;
                }
                for tag in tags {
                    self.way_tags.serialize(tag)?;
                }
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        for writer in [
            &mut self.nodes,
            &mut self.node_tags,
            &mut self.ways,
            &mut self.way_nodes,
            &mut self.way_tags,
        ] {
            writer.flush().context("Failed to flush CSV output")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExportOptions {
    /// Check every shaped element against the table schema
    pub validate: bool,
    /// Stop after this many node/way elements
    pub limit: Option<u64>,
    /// Shape (and validate) without writing any files
    pub dry_run: bool,
}

/// Streams nodes and ways from `input` into the five CSV tables under `output_dir`.
pub fn export<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output_dir: Q,
    rules: &CleaningRules,
    options: ExportOptions,
) -> Result<ExportStats> {
    let (input, output_dir) = (input.as_ref(), output_dir.as_ref());
    let reader = OsmReader::open(input)?.with_tags(SHAPED_TAGS);

    let mut sink = if options.dry_run {
        None
    } else {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;
        Some(CsvSink::create(output_dir)?)
    };

    info!(
        input = ?input,
        output = ?output_dir,
        validate = options.validate,
        dry_run = options.dry_run,
        "Exporting OSM elements to CSV"
    );

    let stats = export_elements(reader, sink.as_mut(), rules, options)?;

    if let Some(sink) = sink {
        sink.finish()?;
    }

    info!(
        nodes = stats.nodes,
        ways = stats.ways,
        tags = stats.tag_rows(),
        way_nodes = stats.way_nodes,
        dropped_tags = stats.dropped_tags,
        "Export complete"
    );
    Ok(stats)
}

/// Shapes, validates and writes each element. The first failure stops the run.
pub fn export_elements<I>(
    elements: I,
    mut sink: Option<&mut CsvSink>,
    rules: &CleaningRules,
    options: ExportOptions,
) -> Result<ExportStats>
where
    I: IntoIterator<Item = Result<OsmElement>>,
{
    let mut stats = ExportStats::new();
    let pb = ProgressBar::new_spinner();

    for element in elements {
        if options.limit.is_some_and(|limit| stats.elements_seen >= limit) {
            debug!(limit = ?options.limit, "Element limit reached");
            break;
        }

        let element = element?;
        stats.inc_seen();

        let Some(shaped) = shape_element(&element, rules)? else {
            continue;
        };

        if options.validate {
            validate_shaped(&shaped).with_context(|| {
                format!(
                    "Validation failed for {} {}",
                    element.name,
                    element.attr("id").unwrap_or("?")
                )
            })?;
        }

        stats.record(&shaped, count_tag_children(&element));
        stats.add_streets_updated(count_street_updates(&element, rules));

        if let Some(sink) = sink.as_deref_mut() {
            sink.write(&shaped)?;
        }

        if stats.elements_seen % PROGRESS_INTERVAL == 0 {
            pb.tick();
        }
    }

    pb.finish_and_clear();
    Ok(stats)
}

fn count_tag_children(element: &OsmElement) -> usize {
    element.children.iter().filter(|c| c.name == "tag").count()
}

fn count_street_updates(element: &OsmElement, rules: &CleaningRules) -> u64 {
    element
        .children
        .iter()
        .filter(|c| c.name == "tag" && c.attr("k") == Some(STREET_KEY))
        .filter_map(|c| c.attr("v"))
        .filter(|v| matches!(update_name(v, rules), Cow::Owned(_)))
        .count() as u64
}
