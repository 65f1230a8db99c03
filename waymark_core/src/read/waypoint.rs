use anyhow::{bail, Result};
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

use crate::model::{GpxWaypoint, WaypointIcon};

use super::{attributes::Attributes, XmlReaderExtensions};

/// Parses a 'wpt' element. Called after receiving Event::Start for the
/// element. As with trackpoints, the element is always consumed and None is
/// returned if the coordinates are unusable.
pub(crate) fn parse_waypoint(
    start: &BytesStart<'_>,
    xml_reader: &mut Reader<&[u8]>,
) -> Result<Option<GpxWaypoint>> {
    let lat_lon = Attributes::new(start, xml_reader)?.lat_lon();
    let mut name = None;
    let mut desc = None;
    let mut sym = None;
    let mut depth = 0_usize;

    loop {
        match xml_reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"name" if name.is_none() => name = Some(xml_reader.read_text_content("name")?),
                b"desc" if desc.is_none() => desc = Some(xml_reader.read_text_content("desc")?),
                b"sym" if sym.is_none() => sym = Some(xml_reader.read_text_content("sym")?),
                _ => depth += 1,
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"name" if name.is_none() => name = Some(String::new()),
                b"desc" if desc.is_none() => desc = Some(String::new()),
                b"sym" if sym.is_none() => sym = Some(String::new()),
                _ => (),
            },
            Ok(Event::End(_)) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Ok(Event::Eof) => bail!("Reached EOF inside <wpt>. File is probably corrupt."),
            Err(e) => bail!("Error at position {}: {:?}", xml_reader.error_position(), e),
            _ => (),
        }
    }

    let Some((lat, lon)) = lat_lon else {
        return Ok(None);
    };

    let mut waypoint = GpxWaypoint::with_lat_lon(lat, lon);
    // The hint is the first of sym, name, desc that is present at all. An
    // empty <sym/> still counts as present and yields no icon.
    waypoint.icon = sym
        .as_deref()
        .or(name.as_deref())
        .or(desc.as_deref())
        .filter(|hint| !hint.is_empty())
        .map(WaypointIcon::classify);
    waypoint.name = name;
    waypoint.description = desc;
    Ok(Some(waypoint))
}

/// Handles <wpt lat=".." lon=".."/>.
pub(crate) fn waypoint_from_empty(
    tag: &BytesStart<'_>,
    xml_reader: &Reader<&[u8]>,
) -> Result<Option<GpxWaypoint>> {
    Ok(Attributes::new(tag, xml_reader)?
        .lat_lon()
        .map(|(lat, lon)| GpxWaypoint::with_lat_lon(lat, lon)))
}

#[cfg(test)]
mod tests {
    use crate::read::read_gpx_from_str;

    use super::*;

    fn waypoints(body: &str) -> Vec<GpxWaypoint> {
        read_gpx_from_str(&format!("<gpx>{body}</gpx>")).unwrap().waypoints
    }

    #[test]
    fn symbol_takes_priority_over_name() {
        let wpts = waypoints(r#"<wpt lat="1" lon="2"><name>Summit</name><sym>Drinking Water</sym></wpt>"#);
        assert_eq!(wpts[0].icon, Some(WaypointIcon::Water));
        assert_eq!(wpts[0].name.as_deref(), Some("Summit"));
    }

    #[test]
    fn name_then_description_are_used_as_hints() {
        let wpts = waypoints(
            r#"<wpt lat="1" lon="2"><name>Lunch meal</name></wpt>
               <wpt lat="1" lon="2"><desc>Base camp</desc></wpt>
               <wpt lat="1" lon="2"><name>Old barn</name></wpt>
               <wpt lat="1" lon="2"/>"#,
        );
        let icons: Vec<_> = wpts.iter().map(|w| w.icon).collect();
        assert_eq!(
            icons,
            vec![
                Some(WaypointIcon::Food),
                Some(WaypointIcon::Rest),
                Some(WaypointIcon::Pin),
                None
            ]
        );
    }

    #[test]
    fn waypoint_with_bad_coordinates_is_dropped() {
        let wpts = waypoints(r#"<wpt lat="x" lon="2"><name>Lost</name></wpt><wpt lat="5" lon="6"/>"#);
        assert_eq!(wpts.len(), 1);
        assert_eq!((wpts[0].lat, wpts[0].lon), (5.0, 6.0));
    }
}
