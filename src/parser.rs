use crate::config::TOP_LEVEL_TAGS;
use crate::models::OsmElement;
use anyhow::{bail, Context, Result};
use bzip2::read::MultiBzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

const READ_BUFFER_CAPACITY: usize = 256 * 1024;

/// Opens a dump for reading, decompressing on the fly when the name ends in `.bz2`.
pub fn open_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open OSM file: {:?}", path))?;

    let compressed = path.extension().is_some_and(|ext| ext == "bz2");
    debug!(path = ?path, compressed, "Opened input");

    if compressed {
        let decoder = MultiBzDecoder::new(BufReader::new(file));
        Ok(Box::new(BufReader::with_capacity(
            READ_BUFFER_CAPACITY,
            decoder,
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(READ_BUFFER_CAPACITY, file)))
    }
}

/// Streams the top-level elements of an OSM XML document.
///
/// Only children of the root whose name is in the selected set are yielded,
/// each as a fully detached [`OsmElement`]. Nothing else is kept in memory.
pub struct OsmReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    tags: Vec<String>,
    depth: usize,
    stack: Vec<OsmElement>,
    done: bool,
}

impl OsmReader<Box<dyn BufRead>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_reader(open_input(path)?))
    }
}

impl<R: BufRead> OsmReader<R> {
    pub fn from_reader(inner: R) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            tags: TOP_LEVEL_TAGS.iter().map(|t| t.to_string()).collect(),
            depth: 0,
            stack: Vec::new(),
            done: false,
        }
    }

    /// Restricts iteration to top-level elements with one of these names.
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    fn next_element(&mut self) -> Result<Option<OsmElement>> {
        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .with_context(|| {
                    format!("Malformed XML at byte {}", self.reader.buffer_position())
                })?;

            match event {
                Event::Start(e) => {
                    self.depth += 1;
                    if !self.stack.is_empty() {
                        self.stack.push(element_from(&e)?);
                    } else if self.depth == 2 && is_selected(&self.tags, e.name().as_ref()) {
                        self.stack.push(element_from(&e)?);
                    }
                }
                Event::Empty(e) => {
                    if let Some(parent) = self.stack.last_mut() {
                        parent.children.push(element_from(&e)?);
                    } else if self.depth == 1 && is_selected(&self.tags, e.name().as_ref()) {
                        return Ok(Some(element_from(&e)?));
                    }
                }
                Event::End(_) => {
                    self.depth = self.depth.saturating_sub(1);
                    if let Some(finished) = self.stack.pop() {
                        match self.stack.last_mut() {
                            Some(parent) => parent.children.push(finished),
                            None => return Ok(Some(finished)),
                        }
                    }
                }
                Event::Eof => {
                    if !self.stack.is_empty() {
                        bail!("Unexpected end of document inside <{}>", self.stack[0].name);
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for OsmReader<R> {
    type Item = Result<OsmElement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_element() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn is_selected(tags: &[String], name: &[u8]) -> bool {
    tags.iter().any(|t| t.as_bytes() == name)
}

fn element_from(start: &BytesStart) -> Result<OsmElement> {
    let name = std::str::from_utf8(start.name().as_ref())
        .context("Element name is not valid UTF-8")?
        .to_string();

    let mut element = OsmElement::new(name);
    for attr in start.attributes() {
        let attr = attr.with_context(|| format!("Bad attribute on <{}>", element.name))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .context("Attribute name is not valid UTF-8")?
            .to_string();
        let value = attr
            .unescape_value()
            .with_context(|| format!("Bad value for attribute {:?}", key))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

/// Counts every element name in the document, root and children included.
pub fn count_tags<R: BufRead>(inner: R) -> Result<BTreeMap<String, u64>> {
    let mut reader = Reader::from_reader(inner);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut counts = BTreeMap::new();

    loop {
        buf.clear();
        let event = reader
            .read_event_into(&mut buf)
            .with_context(|| format!("Malformed XML at byte {}", reader.buffer_position()))?;
        match event {
            Event::Start(e) | Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                *counts.entry(name).or_insert(0) += 1;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(counts)
}
