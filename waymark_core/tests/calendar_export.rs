use reqwest::Url;
use time::macros::datetime;
use waymark_core::calendar::{
    build_google_calendar_link, build_ics_content_at, build_ics_data_uri, CalendarEvent,
    CalendarOptions,
};
use waymark_core::events::{format_event_date_range, normalize_event_dates, EventDateInput};

fn google_dates(event: &CalendarEvent) -> (String, String) {
    let link = build_google_calendar_link(event).unwrap();
    let dates = Url::parse(&link)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "dates")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    let (start, end) = dates.split_once('/').unwrap();
    (start.to_string(), end.to_string())
}

fn ics_value(ics: &str, property: &str) -> String {
    ics.split("\r\n")
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            (name.split(';').next() == Some(property)).then(|| value.to_string())
        })
        .unwrap()
}

fn ics_text(event: &CalendarEvent) -> String {
    build_ics_content_at(event, &CalendarOptions::default(), datetime!(2024-01-01 12:00)).unwrap()
}

#[test]
fn ics_and_google_agree_on_every_kind_of_event() {
    let inputs = [
        EventDateInput::new("2024-06-01"),
        EventDateInput::new("2024-06-01").with_end_date("2024-06-03"),
        EventDateInput::new("2024-06-01").with_start_time("14"),
        EventDateInput::new("2024-06-01")
            .with_start_time("14:00")
            .with_end_time("16:30"),
        EventDateInput::new("2024-06-01")
            .with_end_date("2024-06-02")
            .with_start_time("14:00")
            .with_end_time("11:00"),
    ];

    for input in inputs {
        let event = CalendarEvent::new("Hike", input.clone());
        let ics = ics_text(&event);
        let (start, end) = google_dates(&event);
        assert_eq!(ics_value(&ics, "DTSTART"), start, "{input:?}");
        assert_eq!(ics_value(&ics, "DTEND"), end, "{input:?}");
    }
}

#[test]
fn calendar_end_is_never_before_start() {
    let inputs = [
        EventDateInput::new("2024-06-01"),
        EventDateInput::new("2024-06-01").with_start_time("23:30"),
        EventDateInput::new("2024-12-31").with_end_date("2025-01-02"),
        EventDateInput::new("2024-06-01")
            .with_start_time("14")
            .with_end_time("10"),
        EventDateInput::new("2024-06-05").with_end_date("2024-06-03"),
        EventDateInput::new("2024-06-05")
            .with_end_date("2024-06-03")
            .with_start_time("09:00"),
    ];

    for input in inputs {
        let dates = normalize_event_dates(&input);
        assert!(dates.end_calendar >= dates.start, "{input:?}");

        let ics = ics_text(&CalendarEvent::new("Hike", input.clone()));
        let (start, end) = google_dates(&CalendarEvent::new("Hike", input.clone()));
        assert!(end >= start, "{input:?}");
        assert_eq!(ics_value(&ics, "DTEND"), end, "{input:?}");
    }
}

#[test]
fn examples_from_event_pages() {
    let all_day = EventDateInput::new("2024-06-01");
    assert_eq!(format_event_date_range(&all_day), "Jun 01, 2024");
    let event = CalendarEvent::new("Open day", all_day);
    let ics = ics_text(&event);
    assert!(ics.contains("DTSTART;VALUE=DATE:20240601\r\n"));
    assert!(ics.contains("DTEND;VALUE=DATE:20240602\r\n"));

    let timed = EventDateInput::new("2024-06-01").with_start_time("14");
    assert_eq!(format_event_date_range(&timed), "Jun 01, 2024 · 2:00 PM");
    let ics = ics_text(&CalendarEvent::new("Talk", timed));
    assert!(ics.contains("DTSTART:20240601T140000\r\n"));
    assert!(ics.contains("DTEND:20240601T150000\r\n"));
}

#[test]
fn data_uri_wraps_the_ics_text() {
    let mut event = CalendarEvent::new("Hike, then lunch", EventDateInput::new("2024-06-01"));
    event.location = Some("Lake; north shore".into());

    let uri = build_ics_data_uri(&event).unwrap();
    assert!(uri.starts_with("data:text/calendar;charset=utf-8,BEGIN%3AVCALENDAR%0D%0A"));
    // The ICS escapes come first, then the percent-encoding.
    assert!(uri.contains("SUMMARY%3AHike%5C%2C%20then%20lunch"));
    assert!(uri.contains("LOCATION%3ALake%5C%3B%20north%20shore"));
    assert!(uri.ends_with("END%3AVCALENDAR"));
}
