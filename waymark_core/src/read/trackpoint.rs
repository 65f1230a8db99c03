use anyhow::{bail, Result};
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use time::{format_description::well_known, OffsetDateTime};

use crate::model::GpxPoint;

use super::{attributes::Attributes, XmlReaderExtensions};

/// Parses a 'trkpt' element and its children. Called after receiving
/// Event::Start for the element. The whole element is always consumed, even
/// when the coordinates turn out to be unusable, in which case None is
/// returned and the point is dropped.
pub(crate) fn parse_trackpoint(
    start: &BytesStart<'_>,
    xml_reader: &mut Reader<&[u8]>,
) -> Result<Option<GpxPoint>> {
    let lat_lon = Attributes::new(start, xml_reader)?.lat_lon();
    let mut ele: Option<String> = None;
    let mut time: Option<String> = None;
    let mut depth = 0_usize;

    // Like the DOM's getElementsByTagName(), the first <ele> or <time> at any
    // depth wins, so values nested inside <extensions> are found too.
    loop {
        match xml_reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"ele" if ele.is_none() => ele = Some(xml_reader.read_text_content("ele")?),
                b"time" if time.is_none() => time = Some(xml_reader.read_text_content("time")?),
                _ => depth += 1,
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"ele" if ele.is_none() => ele = Some(String::new()),
                b"time" if time.is_none() => time = Some(String::new()),
                _ => (),
            },
            Ok(Event::End(_)) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Ok(Event::Eof) => bail!("Reached EOF inside <trkpt>. File is probably corrupt."),
            Err(e) => bail!("Error at position {}: {:?}", xml_reader.error_position(), e),
            _ => (),
        }
    }

    let Some((lat, lon)) = lat_lon else {
        return Ok(None);
    };

    let mut point = GpxPoint::with_lat_lon(lat, lon);
    point.elevation = ele.as_deref().and_then(parse_elevation);
    point.time = time.as_deref().and_then(parse_time);
    Ok(Some(point))
}

/// Handles the self-closing form, <trkpt lat=".." lon=".."/>, which
/// has no elevation or time.
pub(crate) fn trackpoint_from_empty(
    tag: &BytesStart<'_>,
    xml_reader: &Reader<&[u8]>,
) -> Result<Option<GpxPoint>> {
    Ok(Attributes::new(tag, xml_reader)?
        .lat_lon()
        .map(|(lat, lon)| GpxPoint::with_lat_lon(lat, lon)))
}

fn parse_elevation(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|e| e.is_finite())
}

/// Reads a <time>2024-09-21T06:59:46.000Z</time> value. GPX requires RFC 3339
/// but other ISO 8601 forms turn up in the wild, so those are accepted too.
/// An unreadable time is treated as absent.
pub(crate) fn parse_time(text: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(text, &well_known::Rfc3339)
        .or_else(|_| OffsetDateTime::parse(text, &well_known::Iso8601::DEFAULT))
        .ok()
}
