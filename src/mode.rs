//! Display modes and the hourly schedule that picks between them.
//!
//! The schedule is sparse: an entry marks the hour a mode starts, and the
//! mode persists until the next entry. Hours before the first entry of the
//! day inherit the last entry of the previous day.
//!
//! ```text
//! {9: normal, 18: dark, 1: off}
//!   01:00-08:59 off
//!   09:00-17:59 normal
//!   18:00-00:59 dark
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// What the panel is doing this hour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Normal,
    Dark,
    Off,
}

impl DisplayMode {
    /// Day/night category scenes are built for; `None` while the panel is off.
    pub fn category(self) -> Option<ModeCategory> {
        match self {
            DisplayMode::Normal => Some(ModeCategory::Day),
            DisplayMode::Dark => Some(ModeCategory::Night),
            DisplayMode::Off => None,
        }
    }
}

impl FromStr for DisplayMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(DisplayMode::Normal),
            "dark" => Ok(DisplayMode::Dark),
            "off" => Ok(DisplayMode::Off),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DisplayMode::Normal => "normal",
            DisplayMode::Dark => "dark",
            DisplayMode::Off => "off",
        };
        f.write_str(name)
    }
}

/// The visual policy a scene is constructed under.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeCategory {
    #[default]
    Day,
    Night,
}

/// Which modes a configured scene may run in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Affinity {
    #[default]
    #[serde(alias = "none", alias = "both")]
    Any,
    Day,
    Night,
}

impl Affinity {
    /// Whether a scene with this affinity is a candidate in `mode`.
    pub fn allows(self, mode: DisplayMode) -> bool {
        match (self, mode.category()) {
            (_, None) => false,
            (Affinity::Any, Some(_)) => true,
            (Affinity::Day, Some(category)) => category == ModeCategory::Day,
            (Affinity::Night, Some(category)) => category == ModeCategory::Night,
        }
    }
}

/// Resolve the mode in effect at `hour` from a raw schedule.
///
/// Returns the value of the greatest key ≤ `hour`, or the greatest key
/// overall when the hour comes before the first entry (wrap across midnight).
pub fn current_mode(
    hour: u32,
    schedule: &BTreeMap<u32, DisplayMode>,
) -> Result<DisplayMode, ConfigError> {
    if hour > 23 {
        return Err(ConfigError::InvalidHour(hour.to_string()));
    }
    lookup(hour, schedule).ok_or(ConfigError::EmptySchedule)
}

fn lookup(hour: u32, schedule: &BTreeMap<u32, DisplayMode>) -> Option<DisplayMode> {
    schedule
        .range(..=hour)
        .next_back()
        .or_else(|| schedule.iter().next_back())
        .map(|(_, &mode)| mode)
}

/// A validated, non-empty hour → mode schedule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeSchedule {
    entries: BTreeMap<u32, DisplayMode>,
}

impl ModeSchedule {
    pub fn new(entries: BTreeMap<u32, DisplayMode>) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::EmptySchedule);
        }
        if let Some(&hour) = entries.keys().find(|&&h| h > 23) {
            return Err(ConfigError::InvalidHour(hour.to_string()));
        }
        Ok(Self { entries })
    }

    /// Build from the string form used in config files (`{"9": "normal"}`).
    pub fn parse(raw: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut entries = BTreeMap::new();
        for (hour, mode) in raw {
            let hour: u32 = hour
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidHour(hour.clone()))?;
            if entries.insert(hour, mode.parse()?).is_some() {
                return Err(ConfigError::DuplicateHour(hour));
            }
        }
        Self::new(entries)
    }

    /// Mode in effect at `hour`; hours past 23 wrap.
    pub fn mode_at(&self, hour: u32) -> DisplayMode {
        // Non-empty by construction, so the fallback never fires.
        lookup(hour % 24, &self.entries).unwrap_or(DisplayMode::Normal)
    }

    pub fn entries(&self) -> &BTreeMap<u32, DisplayMode> {
        &self.entries
    }
}

impl Default for ModeSchedule {
    fn default() -> Self {
        Self {
            entries: BTreeMap::from([
                (9, DisplayMode::Normal),
                (17, DisplayMode::Dark),
                (23, DisplayMode::Off),
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn evening_schedule() -> BTreeMap<u32, DisplayMode> {
        BTreeMap::from([
            (9, DisplayMode::Normal),
            (18, DisplayMode::Dark),
            (1, DisplayMode::Off),
        ])
    }

    #[rstest]
    #[case(0, DisplayMode::Dark)] // before the first entry: wraps to 18
    #[case(1, DisplayMode::Off)]
    #[case(8, DisplayMode::Off)]
    #[case(9, DisplayMode::Normal)]
    #[case(17, DisplayMode::Normal)]
    #[case(18, DisplayMode::Dark)]
    #[case(23, DisplayMode::Dark)]
    fn current_mode_follows_latest_entry(#[case] hour: u32, #[case] expected: DisplayMode) {
        assert_eq!(current_mode(hour, &evening_schedule()).unwrap(), expected);
    }

    #[test]
    fn current_mode_matches_greatest_key_for_every_hour() {
        let schedule = evening_schedule();
        for hour in 0..24 {
            let expected = schedule
                .iter()
                .filter(|(k, _)| **k <= hour)
                .max_by_key(|(k, _)| **k)
                .or_else(|| schedule.iter().max_by_key(|(k, _)| **k))
                .map(|(_, m)| *m)
                .unwrap();
            assert_eq!(current_mode(hour, &schedule).unwrap(), expected, "hour {hour}");
        }
    }

    #[test]
    fn current_mode_rejects_empty_schedule() {
        assert!(matches!(
            current_mode(12, &BTreeMap::new()),
            Err(ConfigError::EmptySchedule)
        ));
    }

    #[test]
    fn current_mode_rejects_hour_out_of_range() {
        assert!(matches!(
            current_mode(24, &evening_schedule()),
            Err(ConfigError::InvalidHour(_))
        ));
    }

    #[test]
    fn single_entry_schedule_applies_all_day() {
        let schedule = BTreeMap::from([(12, DisplayMode::Dark)]);
        for hour in 0..24 {
            assert_eq!(current_mode(hour, &schedule).unwrap(), DisplayMode::Dark);
        }
    }

    #[test]
    fn schedule_parse_accepts_string_keys() {
        let raw = BTreeMap::from([
            ("9".to_string(), "normal".to_string()),
            ("18".to_string(), "dark".to_string()),
        ]);
        let schedule = ModeSchedule::parse(&raw).unwrap();
        assert_eq!(schedule.mode_at(10), DisplayMode::Normal);
        assert_eq!(schedule.mode_at(3), DisplayMode::Dark);
    }

    #[rstest]
    #[case("25", "normal")]
    #[case("nine", "normal")]
    #[case("-1", "normal")]
    fn schedule_parse_rejects_bad_hours(#[case] hour: &str, #[case] mode: &str) {
        let raw = BTreeMap::from([(hour.to_string(), mode.to_string())]);
        assert!(matches!(
            ModeSchedule::parse(&raw),
            Err(ConfigError::InvalidHour(_))
        ));
    }

    #[rstest]
    #[case("9", "09", 9)]
    #[case("0", " 0", 0)]
    fn schedule_parse_rejects_same_hour_twice(
        #[case] first: &str,
        #[case] second: &str,
        #[case] hour: u32,
    ) {
        let raw = BTreeMap::from([
            (first.to_string(), "normal".to_string()),
            (second.to_string(), "dark".to_string()),
        ]);
        assert!(matches!(
            ModeSchedule::parse(&raw),
            Err(ConfigError::DuplicateHour(h)) if h == hour
        ));
    }

    #[test]
    fn schedule_parse_rejects_unknown_mode() {
        let raw = BTreeMap::from([("9".to_string(), "dim".to_string())]);
        assert!(matches!(
            ModeSchedule::parse(&raw),
            Err(ConfigError::InvalidMode(m)) if m == "dim"
        ));
    }

    #[test]
    fn schedule_new_rejects_empty() {
        assert!(matches!(
            ModeSchedule::new(BTreeMap::new()),
            Err(ConfigError::EmptySchedule)
        ));
    }

    #[test]
    fn default_schedule_matches_reference_clock() {
        let schedule = ModeSchedule::default();
        assert_eq!(schedule.mode_at(8), DisplayMode::Off);
        assert_eq!(schedule.mode_at(12), DisplayMode::Normal);
        assert_eq!(schedule.mode_at(20), DisplayMode::Dark);
        assert_eq!(schedule.mode_at(23), DisplayMode::Off);
    }

    #[rstest]
    #[case(Affinity::Any, DisplayMode::Normal, true)]
    #[case(Affinity::Any, DisplayMode::Dark, true)]
    #[case(Affinity::Any, DisplayMode::Off, false)]
    #[case(Affinity::Day, DisplayMode::Normal, true)]
    #[case(Affinity::Day, DisplayMode::Dark, false)]
    #[case(Affinity::Night, DisplayMode::Dark, true)]
    #[case(Affinity::Night, DisplayMode::Normal, false)]
    #[case(Affinity::Night, DisplayMode::Off, false)]
    fn affinity_allows(
        #[case] affinity: Affinity,
        #[case] mode: DisplayMode,
        #[case] expected: bool,
    ) {
        assert_eq!(affinity.allows(mode), expected);
    }

    #[test]
    fn affinity_deserializes_aliases() {
        let a: Affinity = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(a, Affinity::Any);
        let a: Affinity = serde_json::from_str("\"night\"").unwrap();
        assert_eq!(a, Affinity::Night);
    }
}
