//! Turning the loosely written date fields of an event into one consistent
//! model, and from that into the strings shown on event pages.
//!
//! Everything here is a local wall-clock time. No time zone is attached to
//! an event and none is assumed.

use log::debug;
use serde::{Deserialize, Serialize};
use time::{macros::format_description, Date, Duration, PrimitiveDateTime, Time};

/// Shown in place of a date that could not be parsed.
pub const INVALID_DATE: &str = "Invalid Date";

/// The date fields of an event, as written by hand in front matter. Only
/// 'date' is required. Empty strings are treated the same as missing fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateInput {
    /// "2024-06-01". Anything after a 'T' is ignored.
    pub date: String,
    pub end_date: Option<String>,
    /// "14", "14:30" or "14:30:15".
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl EventDateInput {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            ..Default::default()
        }
    }

    pub fn with_end_date(mut self, end_date: impl Into<String>) -> Self {
        self.end_date = Some(end_date.into());
        self
    }

    pub fn with_start_time(mut self, start_time: impl Into<String>) -> Self {
        self.start_time = Some(start_time.into());
        self
    }

    pub fn with_end_time(mut self, end_time: impl Into<String>) -> Self {
        self.end_time = Some(end_time.into());
        self
    }

    fn end_date(&self) -> Option<&str> {
        non_empty(&self.end_date)
    }

    fn start_time(&self) -> Option<&str> {
        non_empty(&self.start_time)
    }

    fn end_time(&self) -> Option<&str> {
        non_empty(&self.end_time)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// The canonical form of an event's dates. A None instant means the input
/// could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedEventDates {
    pub start: Option<PrimitiveDateTime>,
    /// The last moment shown to readers. For all-day events this is the
    /// midnight at the start of the last day.
    pub end_display: Option<PrimitiveDateTime>,
    /// The end as calendars want it: exclusive, so one day after
    /// 'end_display' for all-day events.
    pub end_calendar: Option<PrimitiveDateTime>,
    pub is_all_day: bool,
    /// True if the input gave an end date or an end time.
    pub has_explicit_end: bool,
}

/// Expands a shorthand time to HH:MM:SS. "9" and "09" become 09:00:00,
/// "14:30" becomes 14:30:00. Anything else is returned unchanged.
pub fn normalize_time(time: Option<&str>) -> String {
    let Some(time) = time.map(str::trim).filter(|t| !t.is_empty()) else {
        return "00:00:00".to_string();
    };

    let is_digits = |s: &str, min: usize, max: usize| {
        (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
    };

    match time.split_once(':') {
        None if is_digits(time, 1, 2) => format!("{time:0>2}:00:00"),
        Some((hour, minute)) if is_digits(hour, 1, 2) && is_digits(minute, 2, 2) => {
            format!("{hour:0>2}:{minute}:00")
        }
        _ => time.to_string(),
    }
}

/// Returns the date part of "2024-06-01T10:00", or the whole string if it
/// has no time part.
fn extract_date_part(value: &str) -> &str {
    value.split('T').next().unwrap_or(value).trim()
}

fn parse_date(date: &str) -> Option<Date> {
    Date::parse(extract_date_part(date), format_description!("[year]-[month]-[day]")).ok()
}

fn parse_time(time: &str) -> Option<Time> {
    Time::parse(time, format_description!("[hour]:[minute]:[second]"))
        .or_else(|_| Time::parse(time, format_description!("[hour]:[minute]:[second].[subsecond]")))
        .ok()
}

fn make_date_time(date: &str, time: Option<&str>) -> Option<PrimitiveDateTime> {
    let date = parse_date(date)?;
    let time = parse_time(&normalize_time(time))?;
    Some(PrimitiveDateTime::new(date, time))
}

fn add(instant: Option<PrimitiveDateTime>, duration: Duration) -> Option<PrimitiveDateTime> {
    instant?.checked_add(duration)
}

/// The end as written, unless it falls before the start, in which case the
/// event is given 'fallback' from its start instead.
fn ordered_end(
    start: Option<PrimitiveDateTime>,
    end: Option<PrimitiveDateTime>,
    fallback: Duration,
) -> Option<PrimitiveDateTime> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => {
            debug!("Event ends at {end} before it starts at {start}, using {fallback} from the start");
            start.checked_add(fallback)
        }
        _ => end,
    }
}

/// Works out the start, displayed end and calendar end of an event.
///
/// An event is timed if it has a start or an end time, otherwise it is all
/// day. This never fails: dates that do not parse come back as None.
pub fn normalize_event_dates(input: &EventDateInput) -> NormalizedEventDates {
    let start_time = input.start_time();
    let end_time = input.end_time();
    let end_date = input.end_date();

    let start = make_date_time(&input.date, start_time);

    if start_time.is_some() || end_time.is_some() {
        let has_explicit_end = end_time.is_some() || end_date.is_some();
        if !has_explicit_end {
            return NormalizedEventDates {
                start,
                end_display: start,
                end_calendar: add(start, Duration::HOUR),
                is_all_day: false,
                has_explicit_end,
            };
        }

        let end = make_date_time(end_date.unwrap_or(&input.date), end_time.or(start_time));
        return NormalizedEventDates {
            start,
            end_display: end,
            end_calendar: ordered_end(start, end, Duration::HOUR),
            is_all_day: false,
            has_explicit_end,
        };
    }

    let end_display = make_date_time(end_date.unwrap_or(&input.date), None);
    NormalizedEventDates {
        start,
        end_display,
        end_calendar: add(ordered_end(start, end_display, Duration::ZERO), Duration::DAY),
        is_all_day: true,
        has_explicit_end: end_date.is_some(),
    }
}

/// "Jun 01, 2024"
fn format_date(instant: Option<PrimitiveDateTime>) -> String {
    instant
        .and_then(|dt| dt.format(format_description!("[month repr:short] [day], [year]")).ok())
        .unwrap_or_else(|| INVALID_DATE.to_string())
}

/// "2:00 PM"
fn format_time(instant: Option<PrimitiveDateTime>) -> String {
    instant
        .and_then(|dt| {
            dt.format(format_description!("[hour repr:12 padding:none]:[minute] [period]"))
                .ok()
        })
        .unwrap_or_else(|| INVALID_DATE.to_string())
}

/// Formats the dates of an event for readers, for example
///
/// * "Jun 01, 2024"
/// * "Jun 01, 2024 · 2:00 PM – 4:30 PM"
/// * "Jun 01, 2024 – Jun 03, 2024"
/// * "Jun 01, 2024 2:00 PM – Jun 02, 2024 11:00 AM"
pub fn format_event_date_range(input: &EventDateInput) -> String {
    let dates = normalize_event_dates(input);
    let Some(start) = dates.start else {
        return INVALID_DATE.to_string();
    };

    let same_day =
        !dates.has_explicit_end || dates.end_display.map(|end| end.date()) == Some(start.date());

    if same_day {
        let date = format_date(dates.start);
        if dates.is_all_day {
            return date;
        }
        if !dates.has_explicit_end {
            return format!("{date} · {}", format_time(dates.start));
        }
        return format!(
            "{date} · {} – {}",
            format_time(dates.start),
            format_time(dates.end_display)
        );
    }

    if dates.is_all_day {
        return format!("{} – {}", format_date(dates.start), format_date(dates.end_display));
    }

    format!(
        "{} {} – {} {}",
        format_date(dates.start),
        format_time(dates.start),
        format_date(dates.end_display),
        format_time(dates.end_display)
    )
}

/// The start date alone, e.g. "Jun 01, 2024", for lists and cards.
pub fn format_event_primary_date(input: &EventDateInput) -> String {
    format_date(normalize_event_dates(input).start)
}
