#![allow(clippy::single_match)]

use std::{borrow::Cow, path::Path};

use anyhow::{bail, Result};
use log::{debug, info};
use logging_timer::time;
use quick_xml::{events::Event, Reader};

use crate::model::GpxTrack;

use trackpoint::{parse_trackpoint, trackpoint_from_empty};
use waypoint::{parse_waypoint, waypoint_from_empty};

mod attributes;
mod trackpoint;
mod waypoint;

/// The XSD, which defines the format of a GPX file, is at https://www.topografix.com/GPX/1/1/gpx.xsd
/// Only 'trkpt' and 'wpt' elements are extracted, wherever they appear in the
/// document, but the whole document must be well-formed XML.
#[time]
pub fn read_gpx_from_file<P: AsRef<Path>>(input_file: P) -> Result<GpxTrack> {
    let input_file = input_file.as_ref();
    info!("Reading GPX file {:?}", input_file);
    let contents = std::fs::read(input_file)?;
    let mut track = read_gpx_from_slice(&contents)?;
    track.filename = Some(input_file.to_owned());
    Ok(track)
}

pub fn read_gpx_from_slice(data: &[u8]) -> Result<GpxTrack> {
    let xml_reader = Reader::from_reader(data);
    read_gpx_from_reader(xml_reader)
}

pub fn read_gpx_from_str(xml: &str) -> Result<GpxTrack> {
    read_gpx_from_slice(xml.as_bytes())
}

#[time]
pub fn read_gpx_from_reader(mut xml_reader: Reader<&[u8]>) -> Result<GpxTrack> {
    let mut track = GpxTrack::default();
    // quick-xml verifies that end tags match their start tags, but it does not
    // complain about elements that are still open at EOF, so we keep count.
    let mut depth = 0_usize;
    let mut seen_root = false;
    let mut dropped_points = 0_usize;
    let mut dropped_waypoints = 0_usize;

    loop {
        match xml_reader.read_event() {
            Ok(Event::Start(e)) => {
                check_single_root(depth, &mut seen_root, &xml_reader)?;
                match e.local_name().as_ref() {
                    b"trkpt" => match parse_trackpoint(&e, &mut xml_reader)? {
                        Some(point) => track.points.push(point),
                        None => dropped_points += 1,
                    },
                    b"wpt" => match parse_waypoint(&e, &mut xml_reader)? {
                        Some(waypoint) => track.waypoints.push(waypoint),
                        None => dropped_waypoints += 1,
                    },
                    _ => depth += 1,
                }
            }
            Ok(Event::Empty(e)) => {
                check_single_root(depth, &mut seen_root, &xml_reader)?;
                match e.local_name().as_ref() {
                    b"trkpt" => match trackpoint_from_empty(&e, &xml_reader)? {
                        Some(point) => track.points.push(point),
                        None => dropped_points += 1,
                    },
                    b"wpt" => match waypoint_from_empty(&e, &xml_reader)? {
                        Some(waypoint) => track.waypoints.push(waypoint),
                        None => dropped_waypoints += 1,
                    },
                    _ => (),
                }
            }
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => {
                if depth > 0 {
                    bail!("Reached EOF with {depth} unclosed element(s). File is probably corrupt.");
                }
                if !seen_root {
                    bail!("Did not find a root element. File is probably corrupt.");
                }

                if dropped_points > 0 || dropped_waypoints > 0 {
                    debug!(
                        "Dropped {dropped_points} trackpoint(s) and {dropped_waypoints} waypoint(s) with unusable coordinates"
                    );
                }
                info!(
                    "Read {} trackpoints and {} waypoints",
                    track.points.len(),
                    track.waypoints.len()
                );
                return Ok(track);
            }
            Err(e) => bail!("Error at position {}: {:?}", xml_reader.error_position(), e),
            _ => (),
        }
    }
}

fn check_single_root(depth: usize, seen_root: &mut bool, xml_reader: &Reader<&[u8]>) -> Result<()> {
    if depth == 0 {
        if *seen_root {
            bail!(
                "Found a second root element at position {}",
                xml_reader.buffer_position()
            );
        }
        *seen_root = true;
    }
    Ok(())
}

pub(crate) trait XmlReaderConversions {
    fn bytes_to_cow<'a, 'b>(&'a self, bytes: &'b [u8]) -> Result<Cow<'b, str>>;
    fn bytes_to_string(&self, bytes: &[u8]) -> Result<String>;
}

impl<R> XmlReaderConversions for Reader<R> {
    #[inline]
    fn bytes_to_cow<'a, 'b>(&'a self, bytes: &'b [u8]) -> Result<Cow<'b, str>> {
        Ok(self.decoder().decode(bytes)?)
    }

    #[inline]
    fn bytes_to_string(&self, bytes: &[u8]) -> Result<String> {
        // Ensure everything goes through decode().
        Ok(self.bytes_to_cow(bytes)?.into())
    }
}

pub(crate) trait XmlReaderExtensions {
    fn read_text_content(&mut self, element: &str) -> Result<String>;
}

impl XmlReaderExtensions for Reader<&[u8]> {
    /// Reads the text content of the element whose Start tag was just
    /// consumed, the same way the DOM 'textContent' property does: the text
    /// of all descendants is concatenated. Entities are unescaped and CDATA
    /// is included. The result is trimmed.
    fn read_text_content(&mut self, element: &str) -> Result<String> {
        let mut text = String::new();
        let mut depth = 0_usize;

        loop {
            match self.read_event() {
                Ok(Event::Text(t)) => text.push_str(&t.unescape()?),
                Ok(Event::CData(c)) => {
                    let raw = c.into_inner();
                    text.push_str(&self.bytes_to_cow(&raw)?);
                }
                Ok(Event::Start(_)) => depth += 1,
                Ok(Event::End(_)) => {
                    if depth == 0 {
                        return Ok(text.trim().to_string());
                    }
                    depth -= 1;
                }
                Ok(Event::Eof) => bail!("Reached EOF inside <{element}>. File is probably corrupt."),
                Err(e) => bail!("Error at position {}: {:?}", self.error_position(), e),
                _ => (),
            }
        }
    }
}
