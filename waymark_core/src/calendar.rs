//! "Add to calendar" exports for an event: an ICS file, the same file as a
//! data URI, and links that open the Google and Outlook web calendars with
//! the event filled in.
//!
//! Every builder normalizes the dates itself with
//! [`normalize_event_dates`], so all of them agree on the instants.

use anyhow::{bail, Context, Result};
use log::debug;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime, PrimitiveDateTime};

use crate::events::{normalize_event_dates, EventDateInput};

pub const GOOGLE_CALENDAR_URL: &str = "https://www.google.com/calendar/render";
pub const OUTLOOK_CALENDAR_URL: &str = "https://outlook.live.com/calendar/0/deeplink/compose";
pub const ICS_DATA_URI_PREFIX: &str = "data:text/calendar;charset=utf-8,";

/// An event as it is exported to calendars.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    #[serde(flatten)]
    pub dates: EventDateInput,
}

impl CalendarEvent {
    pub fn new(title: impl Into<String>, dates: EventDateInput) -> Self {
        Self {
            title: title.into(),
            dates,
            ..Default::default()
        }
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref().filter(|s| !s.is_empty())
    }

    fn location(&self) -> Option<&str> {
        self.location.as_deref().filter(|s| !s.is_empty())
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|s| !s.is_empty())
    }

    /// The description followed by the URL, separated by a blank line.
    fn details(&self) -> Option<String> {
        let parts: Vec<&str> = [self.description(), self.url()].into_iter().flatten().collect();
        (!parts.is_empty()).then(|| parts.join("\n\n"))
    }
}

/// Settings for the generated ICS text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarOptions {
    /// The PRODID line, identifying who produced the file.
    pub product_id: String,
}

impl Default for CalendarOptions {
    fn default() -> Self {
        Self {
            product_id: "-//Waymark//Events//EN".to_string(),
        }
    }
}

/// The instants every export needs, or an error if the event's dates could
/// not be parsed.
struct CalendarDates {
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
    is_all_day: bool,
}

impl CalendarDates {
    fn of(event: &CalendarEvent) -> Result<Self> {
        let dates = normalize_event_dates(&event.dates);
        let (Some(start), Some(end)) = (dates.start, dates.end_calendar) else {
            bail!("Event '{}' does not have a valid date: {:?}", event.title, event.dates);
        };

        Ok(Self {
            start,
            end,
            is_all_day: dates.is_all_day,
        })
    }

    /// "20240601" for all-day events, "20240601T140000" otherwise.
    fn compact(&self, instant: PrimitiveDateTime) -> Result<String> {
        if self.is_all_day {
            format_ics_date(instant)
        } else {
            format_ics_date_time(instant)
        }
    }
}

/// 20240601
fn format_ics_date(instant: PrimitiveDateTime) -> Result<String> {
    Ok(instant.format(format_description!("[year][month][day]"))?)
}

/// 20240601T140000
fn format_ics_date_time(instant: PrimitiveDateTime) -> Result<String> {
    Ok(instant.format(format_description!("[year][month][day]T[hour][minute][second]"))?)
}

/// Escapes text for an ICS property value as RFC 5545 requires.
pub fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ',' => escaped.push_str("\\,"),
            ';' => escaped.push_str("\\;"),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// The wall-clock time now, used for DTSTAMP. Falls back to UTC if the
/// local offset cannot be determined, which is common in multi-threaded
/// programs on Unix.
fn local_now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| {
        debug!("Local offset is not available, using UTC for DTSTAMP");
        OffsetDateTime::now_utc()
    });
    PrimitiveDateTime::new(now.date(), now.time())
}

/// Builds an ICS file for the event with the default options, stamped with
/// the current time.
pub fn build_ics_content(event: &CalendarEvent) -> Result<String> {
    build_ics_content_with(event, &CalendarOptions::default())
}

/// As 'build_ics_content', with the given options.
pub fn build_ics_content_with(event: &CalendarEvent, options: &CalendarOptions) -> Result<String> {
    build_ics_content_at(event, options, local_now())
}

/// Builds an ICS file for the event. Lines are separated by CRLF and empty
/// optional fields are left out.
pub fn build_ics_content_at(
    event: &CalendarEvent,
    options: &CalendarOptions,
    stamp: PrimitiveDateTime,
) -> Result<String> {
    let dates = CalendarDates::of(event)?;

    let (dt_start, dt_end) = if dates.is_all_day {
        (
            format!("DTSTART;VALUE=DATE:{}", format_ics_date(dates.start)?),
            format!("DTEND;VALUE=DATE:{}", format_ics_date(dates.end)?),
        )
    } else {
        (
            format!("DTSTART:{}", format_ics_date_time(dates.start)?),
            format!("DTEND:{}", format_ics_date_time(dates.end)?),
        )
    };

    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{}", options.product_id),
        "CALSCALE:GREGORIAN".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("DTSTAMP:{}", format_ics_date_time(stamp)?),
        dt_start,
        dt_end,
    ];

    if !event.title.is_empty() {
        lines.push(format!("SUMMARY:{}", escape_text(&event.title)));
    }
    if let Some(description) = event.description() {
        lines.push(format!("DESCRIPTION:{}", escape_text(description)));
    }
    if let Some(location) = event.location() {
        lines.push(format!("LOCATION:{}", escape_text(location)));
    }
    if let Some(url) = event.url() {
        lines.push(format!("URL:{}", escape_text(url)));
    }

    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());

    Ok(lines.join("\r\n"))
}

/// The ICS file as a data URI, suitable for a download link.
pub fn build_ics_data_uri(event: &CalendarEvent) -> Result<String> {
    build_ics_data_uri_with(event, &CalendarOptions::default())
}

/// As 'build_ics_data_uri', with the given options.
pub fn build_ics_data_uri_with(event: &CalendarEvent, options: &CalendarOptions) -> Result<String> {
    let content = build_ics_content_with(event, options)?;
    Ok(format!("{ICS_DATA_URI_PREFIX}{}", encode_uri_component(&content)))
}

/// A link that opens Google Calendar with the event ready to save.
pub fn build_google_calendar_link(event: &CalendarEvent) -> Result<String> {
    let dates = CalendarDates::of(event)?;
    let span = format!("{}/{}", dates.compact(dates.start)?, dates.compact(dates.end)?);

    let mut params = vec![
        ("action", "TEMPLATE".to_string()),
        ("text", event.title.clone()),
        ("dates", span),
    ];
    if let Some(details) = event.details() {
        params.push(("details", details));
    }
    if let Some(location) = event.location() {
        params.push(("location", location.to_string()));
    }

    let url = Url::parse_with_params(GOOGLE_CALENDAR_URL, &params)
        .context("Could not build the Google Calendar link")?;
    Ok(url.to_string())
}

/// A link that opens the Outlook web calendar with the event ready to save.
pub fn build_outlook_calendar_link(event: &CalendarEvent) -> Result<String> {
    let dates = CalendarDates::of(event)?;
    let (start, end) = if dates.is_all_day {
        let fmt = format_description!("[year]-[month]-[day]");
        (dates.start.format(fmt)?, dates.end.format(fmt)?)
    } else {
        let fmt = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
        (dates.start.format(fmt)?, dates.end.format(fmt)?)
    };

    let mut params = vec![
        ("path", "/calendar/action/compose".to_string()),
        ("rru", "addevent".to_string()),
        ("subject", event.title.clone()),
        ("startdt", start),
        ("enddt", end),
        ("allday", dates.is_all_day.to_string()),
    ];
    if let Some(details) = event.details() {
        params.push(("body", details));
    }
    if let Some(location) = event.location() {
        params.push(("location", location.to_string()));
    }

    let url = Url::parse_with_params(OUTLOOK_CALENDAR_URL, &params)
        .context("Could not build the Outlook link")?;
    Ok(url.to_string())
}

/// Percent-encodes everything except the characters JavaScript's
/// encodeURIComponent leaves alone, so the result is safe anywhere in a URI.
pub fn encode_uri_component(value: &str) -> String {
    const UNRESERVED: &[u8] = b"-_.!~*'()";

    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || UNRESERVED.contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}
