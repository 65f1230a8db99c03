use std::collections::HashMap;

use anyhow::Result;
use quick_xml::{events::BytesStart, Reader};

use super::XmlReaderConversions;

#[derive(Debug)]
pub(crate) struct Attributes {
    data: HashMap<String, String>,
}

impl Attributes {
    /// Creates a new Attributes object by parsing out all the attributes of the
    /// specified tag. A syntactically broken attribute is an error, because
    /// it means the document is not well-formed.
    pub(crate) fn new<R>(tag: &BytesStart<'_>, xml_reader: &Reader<R>) -> Result<Self> {
        let mut data = HashMap::new();

        for attr in tag.attributes() {
            let attr = attr?;
            let key = xml_reader.bytes_to_string(attr.key.local_name().into_inner())?;
            let value = attr.unescape_value()?.into_owned();
            data.insert(key, value);
        }

        Ok(Self { data })
    }

    /// Gets a coordinate attribute such as 'lat' or 'lon'. Missing, empty or
    /// non-numeric values all come back as None; it is up to the caller to
    /// decide what to do with the element.
    pub(crate) fn coordinate(&self, key: &str) -> Option<f64> {
        self.data
            .get(key)
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite())
    }

    /// Gets both 'lat' and 'lon', or None if either is unusable.
    pub(crate) fn lat_lon(&self) -> Option<(f64, f64)> {
        Some((self.coordinate("lat")?, self.coordinate("lon")?))
    }
}
