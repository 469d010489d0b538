//! Deterministic RFC5545 feed encoder.
//!
//! Encoding is a pure function of (entries, options, domain, timestamp):
//! the caller supplies the generation timestamp, so the same inputs always
//! produce byte-identical output. Calendar clients rely on that for
//! deduplication across subscription refreshes, which is also why event UIDs
//! are derived from content rather than generated.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::schedule::ScheduleEntry;

pub const DEFAULT_CALENDAR_NAME: &str = "Bin Collections";
pub const DEFAULT_REMINDER: &str = "19:00";

/// Physical lines longer than this are folded (75-octet limit less CRLF).
const FOLD_LIMIT: usize = 73;

/// Decorative icon per bin type, matched case-insensitively by substring.
/// Order is contract: the first matching row wins.
const TYPE_ICONS: [(&str, &str); 12] = [
    ("refuse", "🗑️"),
    ("recycling", "♻️"),
    ("garden", "🌿"),
    ("food", "🍎"),
    ("glass", "🫙"),
    ("paper", "📄"),
    ("plastic", "🥤"),
    ("general", "🗑️"),
    ("black", "🗑️"),
    ("green", "🌿"),
    ("blue", "♻️"),
    ("brown", "🍂"),
];
const DEFAULT_ICON: &str = "🗑️";

/// Europe/London with its usual GMT/BST transitions, emitted once per feed.
const TIMEZONE_BLOCK: [&str; 17] = [
    "BEGIN:VTIMEZONE",
    "TZID:Europe/London",
    "BEGIN:DAYLIGHT",
    "TZOFFSETFROM:+0000",
    "TZOFFSETTO:+0100",
    "TZNAME:BST",
    "DTSTART:19700329T010000",
    "RRULE:FREQ=YEARLY;BYMONTH=3;BYDAY=-1SU",
    "END:DAYLIGHT",
    "BEGIN:STANDARD",
    "TZOFFSETFROM:+0100",
    "TZOFFSETTO:+0000",
    "TZNAME:GMT",
    "DTSTART:19701025T020000",
    "RRULE:FREQ=YEARLY;BYMONTH=10;BYDAY=-1SU",
    "END:STANDARD",
    "END:VTIMEZONE",
];

/// A validated evening reminder time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderTime {
    hour: u32,
    minute: u32,
}

impl ReminderTime {
    /// Parse `"HH:MM"`; out-of-range fields are rejected.
    pub fn parse(text: &str) -> Option<Self> {
        let (hour, minute) = text.split_once(':')?;
        let hour: u32 = hour.parse().ok()?;
        let minute: u32 = minute.parse().ok()?;
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    /// Duration of the alarm trigger before the event's midnight start.
    ///
    /// `hours = 24 - HH`, `minutes = 60 - MM`; a 60-minute remainder is not
    /// legal on the wire and is carried into one extra hour, which leaves the
    /// firing instant unchanged (`5H60M` and `6H0M` are the same duration).
    fn trigger(&self) -> (u32, u32) {
        let mut hours = 24 - self.hour;
        let mut minutes = 60 - self.minute;
        if minutes == 60 {
            hours += 1;
            minutes = 0;
        }
        (hours, minutes)
    }
}

/// Per-request feed shaping options. Never persisted.
#[derive(Debug, Clone)]
pub struct FeedOptions {
    pub calendar_name: String,
    pub reminder: Option<ReminderTime>,
    pub group_same_day: bool,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            calendar_name: DEFAULT_CALENDAR_NAME.to_string(),
            reminder: ReminderTime::parse(DEFAULT_REMINDER),
            group_same_day: true,
        }
    }
}

fn icon_for(collection_type: &str) -> &'static str {
    let lower = collection_type.to_lowercase();
    TYPE_ICONS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, icon)| *icon)
        .unwrap_or(DEFAULT_ICON)
}

/// Escape TEXT values per RFC5545 §3.3.11.
fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

/// Fold one content line into ≤73-octet physical lines.
///
/// Continuations carry exactly one leading space. Cuts back off to char
/// boundaries, so a multi-byte icon is never split; every physical line
/// still stays within the octet limit.
fn fold_line(line: &str) -> String {
    if line.len() <= FOLD_LIMIT {
        return line.to_string();
    }
    let mut parts = Vec::new();
    let mut rest = line;
    let mut first = true;
    while !rest.is_empty() {
        let budget = if first { FOLD_LIMIT } else { FOLD_LIMIT - 1 };
        if rest.len() <= budget {
            parts.push(if first {
                rest.to_string()
            } else {
                format!(" {rest}")
            });
            break;
        }
        let mut cut = budget;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let (head, tail) = rest.split_at(cut);
        parts.push(if first {
            head.to_string()
        } else {
            format!(" {head}")
        });
        rest = tail;
        first = false;
    }
    parts.join("\r\n")
}

/// Deterministic event UID.
///
/// Changing this derivation breaks deduplication for every subscriber!
fn uid(date: NaiveDate, key: &str, domain: &str) -> String {
    let slug: String = key
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("{date}-{slug}@{domain}")
}

struct Event<'a> {
    date: NaiveDate,
    uid_key: &'a str,
    summary: &'a str,
    description: &'a str,
    alarm_description: &'a str,
}

fn push_event(
    lines: &mut Vec<String>,
    event: &Event<'_>,
    options: &FeedOptions,
    domain: &str,
    dtstamp: &str,
) {
    lines.push("BEGIN:VEVENT".to_string());
    lines.push(format!("UID:{}", uid(event.date, event.uid_key, domain)));
    lines.push(format!("DTSTAMP:{dtstamp}"));
    lines.push(format!("DTSTART;VALUE=DATE:{}", event.date.format("%Y%m%d")));
    lines.push(format!("SUMMARY:{}", escape_text(event.summary)));
    lines.push(format!("DESCRIPTION:{}", escape_text(event.description)));
    lines.push("TRANSP:TRANSPARENT".to_string());
    if let Some(reminder) = options.reminder {
        let (hours, minutes) = reminder.trigger();
        lines.push("BEGIN:VALARM".to_string());
        lines.push(format!("TRIGGER:-P0DT{hours}H{minutes}M"));
        lines.push("ACTION:DISPLAY".to_string());
        lines.push(format!("DESCRIPTION:{}", escape_text(event.alarm_description)));
        lines.push("END:VALARM".to_string());
    }
    lines.push("END:VEVENT".to_string());
}

/// Encode a schedule as an iCalendar feed.
///
/// With `group_same_day`, one all-day event aggregates every type collected
/// on a date (ascending date order); otherwise each (date, type) entry gets
/// its own event in input order.
pub fn encode(
    entries: &[ScheduleEntry],
    options: &FeedOptions,
    domain: &str,
    generated_at: DateTime<Utc>,
) -> String {
    let dtstamp = generated_at.format("%Y%m%dT%H%M%SZ").to_string();
    let mut lines: Vec<String> = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:-//Bin Collection Service//{domain}//EN"),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        format!("X-WR-CALNAME:{}", escape_text(&options.calendar_name)),
        "X-WR-TIMEZONE:Europe/London".to_string(),
        "REFRESH-INTERVAL;VALUE=DURATION:P1D".to_string(),
    ];
    lines.extend(TIMEZONE_BLOCK.iter().map(|s| s.to_string()));

    if options.group_same_day {
        let mut by_date: BTreeMap<NaiveDate, Vec<&str>> = BTreeMap::new();
        for entry in entries {
            by_date
                .entry(entry.date)
                .or_default()
                .push(entry.collection_type.as_str());
        }
        for (date, types) in &by_date {
            let icons: Vec<&str> = types.iter().map(|t| icon_for(t)).collect();
            let summary = format!("{} Bin Collection", icons.join(" "));
            let description = format!("Put out: {}", types.join(", "));
            let alarm_description = format!("Bin collection tomorrow: {}", types.join(", "));
            push_event(
                &mut lines,
                &Event {
                    date: *date,
                    uid_key: &types.join("-"),
                    summary: &summary,
                    description: &description,
                    alarm_description: &alarm_description,
                },
                options,
                domain,
                &dtstamp,
            );
        }
    } else {
        for entry in entries {
            let summary = format!("{} {}", icon_for(&entry.collection_type), entry.collection_type);
            let description = format!("Put out: {}", entry.collection_type);
            let alarm_description = format!("{} collection tomorrow", entry.collection_type);
            push_event(
                &mut lines,
                &Event {
                    date: entry.date,
                    uid_key: &entry.collection_type,
                    summary: &summary,
                    description: &description,
                    alarm_description: &alarm_description,
                },
                options,
                domain,
                &dtstamp,
            );
        }
    }

    lines.push("END:VCALENDAR".to_string());
    lines
        .iter()
        .map(|line| fold_line(line))
        .collect::<Vec<_>>()
        .join("\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{BufReader, Cursor};

    use ical::IcalParser;

    fn entry(collection_type: &str, date: &str) -> ScheduleEntry {
        ScheduleEntry {
            collection_type: collection_type.to_string(),
            date: date.parse::<NaiveDate>().unwrap(),
        }
    }

    fn frozen_now() -> DateTime<Utc> {
        "2025-01-10T08:30:00Z".parse().unwrap()
    }

    fn sample_entries() -> Vec<ScheduleEntry> {
        vec![
            entry("Refuse", "2025-01-15"),
            entry("Recycling", "2025-01-15"),
            entry("Garden", "2025-01-22"),
        ]
    }

    fn parse_events(feed: &str) -> Vec<ical::parser::ical::component::IcalEvent> {
        let mut parser = IcalParser::new(BufReader::new(Cursor::new(feed.to_string())));
        let calendar = parser.next().expect("one calendar").expect("parseable feed");
        assert!(parser.next().is_none());
        calendar.events
    }

    fn property<'a>(
        event: &'a ical::parser::ical::component::IcalEvent,
        name: &str,
    ) -> Option<&'a String> {
        event
            .properties
            .iter()
            .find(|property| property.name == name)
            .and_then(|property| property.value.as_ref())
    }

    #[test]
    fn test_container_markers_are_balanced() {
        let feed = encode(
            &sample_entries(),
            &FeedOptions::default(),
            "bins.example.org",
            frozen_now(),
        );
        assert_eq!(feed.matches("BEGIN:VCALENDAR").count(), 1);
        assert_eq!(feed.matches("END:VCALENDAR").count(), 1);
        assert_eq!(
            feed.matches("BEGIN:VEVENT").count(),
            feed.matches("END:VEVENT").count()
        );
        // The ical parser enforces block nesting on top of the raw counts.
        parse_events(&feed);
    }

    #[test]
    fn test_grouping_yields_one_event_per_date() {
        let feed = encode(
            &sample_entries(),
            &FeedOptions::default(),
            "bins.example.org",
            frozen_now(),
        );
        let events = parse_events(&feed);
        assert_eq!(events.len(), 2);
        assert_eq!(
            property(&events[0], "DTSTART").unwrap(),
            "20250115"
        );
        let description = property(&events[0], "DESCRIPTION").unwrap();
        assert!(description.contains("Refuse"));
        assert!(description.contains("Recycling"));
    }

    #[test]
    fn test_ungrouped_yields_one_event_per_entry() {
        let options = FeedOptions {
            group_same_day: false,
            ..FeedOptions::default()
        };
        let feed = encode(&sample_entries(), &options, "bins.example.org", frozen_now());
        assert_eq!(parse_events(&feed).len(), 3);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let first = encode(
            &sample_entries(),
            &FeedOptions::default(),
            "bins.example.org",
            frozen_now(),
        );
        let second = encode(
            &sample_entries(),
            &FeedOptions::default(),
            "bins.example.org",
            frozen_now(),
        );
        assert_eq!(first, second);
    }

    #[test]
    fn test_uids_are_stable_and_domain_scoped() {
        let feed = encode(
            &sample_entries(),
            &FeedOptions::default(),
            "bins.example.org",
            frozen_now(),
        );
        let events = parse_events(&feed);
        assert_eq!(
            property(&events[0], "UID").unwrap(),
            "2025-01-15-refuse-recycling@bins.example.org"
        );
        assert_eq!(
            property(&events[1], "UID").unwrap(),
            "2025-01-22-garden@bins.example.org"
        );
    }

    #[test]
    fn test_lines_fold_at_73_octets() {
        let options = FeedOptions {
            calendar_name: "A very long calendar name ".repeat(8),
            ..FeedOptions::default()
        };
        let feed = encode(&sample_entries(), &options, "bins.example.org", frozen_now());
        let mut saw_continuation = false;
        for line in feed.split("\r\n") {
            assert!(line.len() <= 73, "line exceeds 73 octets: {line:?}");
            if line.starts_with(' ') {
                saw_continuation = true;
            }
        }
        assert!(saw_continuation, "expected at least one folded line");
    }

    #[test]
    fn test_folding_never_splits_multibyte_icons() {
        // Enough same-day types to push the summary's icon run past the limit.
        let entries: Vec<ScheduleEntry> = (0..30)
            .map(|i| entry(&format!("Recycling {i}"), "2025-01-15"))
            .collect();
        let feed = encode(
            &entries,
            &FeedOptions::default(),
            "bins.example.org",
            frozen_now(),
        );
        for line in feed.split("\r\n") {
            assert!(line.len() <= 73);
        }
        // Splitting mid-char would have produced invalid UTF-8 and panicked
        // inside encode; reaching here with parseable output is the check.
        parse_events(&feed);
    }

    #[test]
    fn test_text_values_are_escaped() {
        let options = FeedOptions {
            calendar_name: "Bins; home, back\\yard".to_string(),
            ..FeedOptions::default()
        };
        let feed = encode(&sample_entries(), &options, "bins.example.org", frozen_now());
        assert!(feed.contains(r"X-WR-CALNAME:Bins\; home\, back\\yard"));
    }

    #[test]
    fn test_reminder_trigger_values() {
        assert_eq!(ReminderTime::parse("19:30").unwrap().trigger(), (5, 30));
        // MM=0 leaves a 60-minute remainder, carried into one extra hour.
        assert_eq!(ReminderTime::parse("19:00").unwrap().trigger(), (6, 0));
        assert_eq!(ReminderTime::parse("07:00").unwrap().trigger(), (18, 0));
    }

    #[test]
    fn test_reminder_parse_rejects_invalid_input() {
        assert_eq!(ReminderTime::parse("25:00"), None);
        assert_eq!(ReminderTime::parse("19:60"), None);
        assert_eq!(ReminderTime::parse("19"), None);
        assert_eq!(ReminderTime::parse("soon"), None);
    }

    #[test]
    fn test_alarm_block_is_emitted_per_event() {
        let options = FeedOptions {
            reminder: ReminderTime::parse("19:30"),
            ..FeedOptions::default()
        };
        let feed = encode(&sample_entries(), &options, "bins.example.org", frozen_now());
        assert_eq!(feed.matches("BEGIN:VALARM").count(), 2);
        assert!(feed.contains("TRIGGER:-P0DT5H30M"));
        assert!(feed.contains("ACTION:DISPLAY"));
    }

    #[test]
    fn test_disabled_reminder_emits_no_alarms() {
        let options = FeedOptions {
            reminder: None,
            ..FeedOptions::default()
        };
        let feed = encode(&sample_entries(), &options, "bins.example.org", frozen_now());
        assert_eq!(feed.matches("BEGIN:VALARM").count(), 0);
    }

    #[test]
    fn test_icon_table_order_is_contract() {
        // "recycling" precedes "black" in the table, so it wins here.
        assert_eq!(icon_for("Black recycling box"), "♻️");
        assert_eq!(icon_for("Garden waste"), "🌿");
        assert_eq!(icon_for("GLASS"), "🫙");
        assert_eq!(icon_for("Mystery container"), DEFAULT_ICON);
    }

    #[test]
    fn test_timezone_block_is_always_present() {
        let feed = encode(&[], &FeedOptions::default(), "bins.example.org", frozen_now());
        assert_eq!(feed.matches("BEGIN:VTIMEZONE").count(), 1);
        assert!(feed.contains("TZID:Europe/London"));
        assert!(feed.contains("TZNAME:BST"));
        assert!(feed.contains("TZNAME:GMT"));
    }
}
