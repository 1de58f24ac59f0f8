use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A time of day with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockTime {
    minutes: u16,
}

impl ClockTime {
    pub fn new(hour: u16, minute: u16) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self {
            minutes: hour * 60 + minute,
        })
    }

    pub fn minute_of_day(self) -> u16 {
        self.minutes
    }

    pub fn hour(self) -> u16 {
        self.minutes / 60
    }

    pub fn minute(self) -> u16 {
        self.minutes % 60
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// When a stop happens.
///
/// Generated itineraries carry free-form times ("9:00 AM", "9:00 AM - 10:30 AM",
/// "around noon"), manually added stops carry strict `HH:MM`. The text is kept
/// exactly as given and is what gets displayed and persisted. Text that starts
/// with a clock time also carries the parsed minute, which is all ordering
/// looks at; text without one sorts after every clock time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StopTime {
    text: String,
    clock: Option<ClockTime>,
}

impl StopTime {
    pub fn parse(raw: &str) -> Self {
        Self {
            text: raw.to_string(),
            clock: parse_clock(raw),
        }
    }

    pub fn at(hour: u16, minute: u16) -> Option<Self> {
        ClockTime::new(hour, minute).map(|clock| Self {
            text: clock.to_string(),
            clock: Some(clock),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn clock(&self) -> Option<ClockTime> {
        self.clock
    }

    pub fn minute_of_day(&self) -> Option<u16> {
        self.clock.map(ClockTime::minute_of_day)
    }

    pub fn is_unparsed(&self) -> bool {
        self.clock.is_none()
    }

    /// Chronological order; unparsed times compare equal to each other and
    /// after every clock time. The display text plays no part.
    pub fn chronological_cmp(&self, other: &Self) -> Ordering {
        match (self.minute_of_day(), other.minute_of_day()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    pub fn is_later_than(&self, other: &Self) -> bool {
        self.chronological_cmp(other) == Ordering::Greater
    }
}

impl fmt::Display for StopTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for StopTime {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl Serialize for StopTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for StopTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Accepts `H:MM`, `HH:MM` and the 12-hour forms `H:MM AM`, `H AM`, `H:MMpm`.
/// Only the leading time counts for ordering ("9:00 AM - 10:30 AM" is 09:00).
fn parse_clock(raw: &str) -> Option<ClockTime> {
    let s = raw.trim();
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits > 2 {
        return None;
    }
    let hour: u16 = s[..digits].parse().ok()?;
    let mut rest = &s[digits..];

    let mut minute = None;
    if let Some(after) = rest.strip_prefix(':').or_else(|| rest.strip_prefix('.')) {
        let mdigits = after.bytes().take_while(u8::is_ascii_digit).count();
        if mdigits != 2 {
            return None;
        }
        minute = Some(after[..2].parse::<u16>().ok()?);
        rest = &after[2..];
    }

    match meridiem(rest) {
        Some(pm) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            let hour = match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, false) => h,
                (h, true) => h + 12,
            };
            ClockTime::new(hour, minute.unwrap_or(0))
        }
        None => {
            let minute = minute?;
            if rest.starts_with(|c: char| c.is_ascii_alphanumeric()) {
                return None;
            }
            ClockTime::new(hour, minute)
        }
    }
}

/// `Some(true)` for PM, `Some(false)` for AM.
fn meridiem(rest: &str) -> Option<bool> {
    let lower = rest.trim_start().to_ascii_lowercase();
    let lower = lower.replace('.', "");
    let pm = if lower.starts_with("pm") {
        true
    } else if lower.starts_with("am") {
        false
    } else {
        return None;
    };
    let tail = &lower[2..];
    if tail.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(pm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(raw: &str) -> Option<u16> {
        StopTime::parse(raw).minute_of_day()
    }

    #[test]
    fn parses_24_hour_times() {
        assert_eq!(minutes("09:00"), Some(540));
        assert_eq!(minutes("9:05"), Some(545));
        assert_eq!(minutes("23:59"), Some(23 * 60 + 59));
        assert_eq!(minutes("00:00"), Some(0));
    }

    #[test]
    fn parses_12_hour_times() {
        assert_eq!(minutes("9:00 AM"), Some(540));
        assert_eq!(minutes("1:30 PM"), Some(13 * 60 + 30));
        assert_eq!(minutes("12:00 PM"), Some(720));
        assert_eq!(minutes("12:15 am"), Some(15));
        assert_eq!(minutes("8 p.m."), Some(20 * 60));
        assert_eq!(minutes("7pm"), Some(19 * 60));
    }

    #[test]
    fn ignores_trailing_range() {
        assert_eq!(minutes("9:00 AM - 10:30 AM"), Some(540));
        assert_eq!(minutes("14:00-15:00"), Some(14 * 60));
    }

    #[test]
    fn rejects_non_times() {
        assert!(StopTime::parse("Adjust time").is_unparsed());
        assert!(StopTime::parse("around noon").is_unparsed());
        assert!(StopTime::parse("25:00").is_unparsed());
        assert!(StopTime::parse("10:7").is_unparsed());
        assert!(StopTime::parse("13 PM").is_unparsed());
        assert!(StopTime::parse("10 mins").is_unparsed());
        assert!(StopTime::parse("").is_unparsed());
    }

    #[test]
    fn unparsed_sorts_after_clock_times() {
        let late = StopTime::parse("23:59");
        let unknown = StopTime::parse("Adjust time");
        assert!(unknown.is_later_than(&late));
        assert!(!late.is_later_than(&unknown));
        assert_eq!(
            unknown.chronological_cmp(&StopTime::parse("whenever")),
            Ordering::Equal
        );
    }

    #[test]
    fn serializes_as_plain_string() {
        let clock = StopTime::parse("1:30 PM");
        assert_eq!(serde_json::to_string(&clock).unwrap(), "\"1:30 PM\"");
        assert_eq!(clock.minute_of_day(), Some(13 * 60 + 30));

        let free: StopTime = serde_json::from_str("\"Adjust time\"").unwrap();
        assert!(free.is_unparsed());
        assert_eq!(serde_json::to_string(&free).unwrap(), "\"Adjust time\"");
    }

    #[test]
    fn display_text_survives_a_round_trip() {
        for raw in ["9:00 AM - 10:30 AM", "14:00-15:00", "8 p.m. (sunset)", "around noon"] {
            let json = serde_json::to_string(raw).unwrap();
            let time: StopTime = serde_json::from_str(&json).unwrap();
            assert_eq!(time.to_string(), raw);
            assert_eq!(serde_json::to_string(&time).unwrap(), json);
        }
        assert_eq!(StopTime::parse("9:00 AM - 10:30 AM").minute_of_day(), Some(540));
    }

    #[test]
    fn ordering_ignores_display_text() {
        let range = StopTime::parse("9:00 AM - 10:30 AM");
        let plain = StopTime::parse("09:00");
        assert_ne!(range, plain);
        assert_eq!(range.chronological_cmp(&plain), Ordering::Equal);
        assert!(StopTime::parse("9:30").is_later_than(&range));
    }

    #[test]
    fn at_formats_as_24_hour() {
        assert_eq!(StopTime::at(8, 5).unwrap().as_str(), "08:05");
        assert!(StopTime::at(24, 0).is_none());
    }
}
