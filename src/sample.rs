use crate::models::OsmElement;
use crate::parser::OsmReader;
use anyhow::{bail, Context, Result};
use indicatif::ProgressBar;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::writer::Writer;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleStats {
    pub seen: u64,
    pub written: u64,
}

/// Writes every `stride`-th top-level element of `input` into a new document at `output`.
pub fn sample_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    stride: usize,
) -> Result<SampleStats> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let reader = OsmReader::open(input)?;
    let file = File::create(output)
        .with_context(|| format!("Failed to create sample file: {:?}", output))?;

    info!(input = ?input, output = ?output, stride, "Sampling OSM file");

    let pb = ProgressBar::new_spinner();
    let elements = reader.inspect(|_| pb.inc(1));

    let stats = write_sample(elements, BufWriter::new(file), stride)?;
    pb.finish_and_clear();

    info!(seen = stats.seen, written = stats.written, "Sample written");
    Ok(stats)
}

/// Wraps every element whose zero-based index is a multiple of `stride` in a single `<osm>` root.
pub fn write_sample<I, W>(elements: I, out: W, stride: usize) -> Result<SampleStats>
where
    I: IntoIterator<Item = Result<OsmElement>>,
    W: Write,
{
    if stride == 0 {
        bail!("Sample stride must be at least 1");
    }

    let mut writer = Writer::new_with_indent(out, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("osm")))?;

    let mut stats = SampleStats::default();
    for (i, element) in elements.into_iter().enumerate() {
        let element = element?;
        stats.seen += 1;
        if i % stride == 0 {
            write_element(&mut writer, &element)?;
            stats.written += 1;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("osm")))?;
    writer
        .into_inner()
        .flush()
        .context("Failed to flush sample output")?;
    Ok(stats)
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &OsmElement) -> Result<()> {
    let start = BytesStart::new(element.name.as_str()).with_attributes(
        element
            .attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str())),
    );

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}
