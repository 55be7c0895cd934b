//! Channel map tables and channel lists
//!
//! Each channel map describes a regional frequency plan as a list of
//! contiguous ranges. A [`ChannelList`] expands one or more maps into
//! individual channels sorted by frequency. Frequencies are rounded to the
//! 125 kHz resolution the tuner accepts.

use thiserror::Error;

/// Tuning resolution in Hz
pub const FREQUENCY_RESOLUTION: u32 = 125_000;

/// Channel map errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Unknown channel map: {0}")]
    UnknownChannelMap(String),
}

/// A run of equally spaced channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMapRange {
    pub channel_start: u16,
    pub channel_end: u16,
    /// Frequency of `channel_start` in Hz
    pub frequency: u32,
    /// Spacing between consecutive channels in Hz
    pub spacing: u32,
}

const fn range(channel_start: u16, channel_end: u16, frequency: u32, spacing: u32) -> ChannelMapRange {
    ChannelMapRange {
        channel_start,
        channel_end,
        frequency,
        spacing,
    }
}

/// A named frequency plan
#[derive(Debug, Clone, Copy)]
pub struct ChannelMapRecord {
    pub name: &'static str,
    pub ranges: &'static [ChannelMapRange],
    /// Maps scanned together with this one (space separated)
    pub scan_group: &'static str,
    /// Country codes this map applies to (space separated); `None` = default for its source
    pub country_codes: Option<&'static str>,
}

// AU antenna channels. Channels {6, 7, 8, 9, 9A} are numbered {5, 6, 7, 8, 9}.
const RANGE_AU_BCAST: &[ChannelMapRange] = &[
    range(5, 12, 177_500_000, 7_000_000),
    range(21, 69, 480_500_000, 7_000_000),
];

const RANGE_EU_BCAST: &[ChannelMapRange] = &[
    range(2, 4, 50_500_000, 7_000_000),
    range(5, 12, 177_500_000, 7_000_000),
    range(21, 69, 474_000_000, 8_000_000),
];

// Cable channels here have no standard numbering; the device uses its own.
const RANGE_EU_CABLE: &[ChannelMapRange] = &[
    range(6, 7, 113_000_000, 8_000_000),
    range(9, 100, 138_000_000, 8_000_000),
];

const RANGE_US_BCAST: &[ChannelMapRange] = &[
    range(2, 4, 57_000_000, 6_000_000),
    range(5, 6, 79_000_000, 6_000_000),
    range(7, 13, 177_000_000, 6_000_000),
    range(14, 69, 473_000_000, 6_000_000),
];

const RANGE_US_CABLE: &[ChannelMapRange] = &[
    range(2, 4, 57_000_000, 6_000_000),
    range(5, 6, 79_000_000, 6_000_000),
    range(7, 13, 177_000_000, 6_000_000),
    range(14, 22, 123_000_000, 6_000_000),
    range(23, 94, 219_000_000, 6_000_000),
    range(95, 99, 93_000_000, 6_000_000),
    range(100, 158, 651_000_000, 6_000_000),
];

const RANGE_US_HRC: &[ChannelMapRange] = &[
    range(2, 4, 55_752_700, 6_000_300),
    range(5, 6, 79_753_900, 6_000_300),
    range(7, 13, 175_758_700, 6_000_300),
    range(14, 22, 121_756_000, 6_000_300),
    range(23, 94, 217_760_800, 6_000_300),
    range(95, 99, 91_754_800, 6_000_300),
    range(100, 158, 649_782_400, 6_000_300),
];

const RANGE_US_IRC: &[ChannelMapRange] = &[
    range(2, 4, 57_012_500, 6_000_000),
    range(5, 6, 81_012_500, 6_000_000),
    range(7, 13, 177_012_500, 6_000_000),
    range(14, 22, 123_012_500, 6_000_000),
    range(23, 41, 219_012_500, 6_000_000),
    range(42, 42, 333_025_000, 6_000_000),
    range(43, 94, 339_012_500, 6_000_000),
    range(95, 97, 93_012_500, 6_000_000),
    range(98, 99, 111_025_000, 6_000_000),
    range(100, 158, 651_012_500, 6_000_000),
];

const RANGE_KR_CABLE: &[ChannelMapRange] = &[
    range(2, 4, 57_000_000, 6_000_000),
    range(5, 6, 79_000_000, 6_000_000),
    range(7, 13, 177_000_000, 6_000_000),
    range(14, 22, 123_000_000, 6_000_000),
    range(23, 153, 219_000_000, 6_000_000),
];

const fn record(
    name: &'static str,
    ranges: &'static [ChannelMapRange],
    scan_group: &'static str,
    country_codes: Option<&'static str>,
) -> ChannelMapRecord {
    ChannelMapRecord {
        name,
        ranges,
        scan_group,
        country_codes,
    }
}

/// All supported channel maps
pub static CHANNEL_MAP_TABLE: &[ChannelMapRecord] = &[
    record("au-bcast", RANGE_AU_BCAST, "au-bcast", Some("AU")),
    record("au-cable", RANGE_EU_CABLE, "au-cable", Some("AU")),
    record("eu-bcast", RANGE_EU_BCAST, "eu-bcast", None),
    record("eu-cable", RANGE_EU_CABLE, "eu-cable", None),
    record("tw-bcast", RANGE_US_BCAST, "tw-bcast", Some("TW")),
    record("tw-cable", RANGE_US_CABLE, "tw-cable", Some("TW")),
    record("kr-bcast", RANGE_US_BCAST, "kr-bcast", Some("KR")),
    record("kr-cable", RANGE_KR_CABLE, "kr-cable", Some("KR")),
    record("us-bcast", RANGE_US_BCAST, "us-bcast", Some("CA US")),
    record("us-cable", RANGE_US_CABLE, "us-cable us-hrc us-irc", Some("CA PA US")),
    record("us-hrc", RANGE_US_HRC, "us-cable us-hrc us-irc", Some("CA PA US")),
    record("us-irc", RANGE_US_IRC, "us-cable us-hrc us-irc", Some("CA PA US")),
];

/// Look up a channel map by name
pub fn channelmap_record(name: &str) -> Option<&'static ChannelMapRecord> {
    CHANNEL_MAP_TABLE.iter().find(|r| r.name == name)
}

/// Maps that should be scanned together with `name`
pub fn channelmap_scan_group(name: &str) -> Option<&'static str> {
    channelmap_record(name).map(|r| r.scan_group)
}

/// Pick a channel map for a country and signal source
///
/// `source` is matched against the map name (e.g. "bcast", "cable") and
/// `supported` is the device's list of channel maps. A map with no country
/// codes is used when no country-specific map matches.
pub fn channelmap_from_country_source(
    country_code: &str,
    source: &str,
    supported: &str,
) -> Option<&'static str> {
    let mut default_result = None;

    for record in CHANNEL_MAP_TABLE {
        if !record.name.contains(source) {
            continue;
        }
        if !supported.split_whitespace().any(|s| s == record.name) {
            continue;
        }
        match record.country_codes {
            None => default_result = Some(record.name),
            Some(codes) => {
                if codes.split_whitespace().any(|c| c == country_code) {
                    return Some(record.name);
                }
            }
        }
    }

    default_result
}

/// Round a frequency to the nearest multiple of `resolution`
pub fn frequency_round(frequency: u32, resolution: u32) -> u32 {
    let frequency = frequency + resolution / 2;
    (frequency / resolution) * resolution
}

/// Round a frequency to the tuner's resolution
pub fn frequency_round_normal(frequency: u32) -> u32 {
    frequency_round(frequency, FREQUENCY_RESOLUTION)
}

/// A single channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEntry {
    pub number: u16,
    /// Frequency in Hz, rounded to [`FREQUENCY_RESOLUTION`]
    pub frequency: u32,
    /// "<channel map>:<number>"
    pub name: String,
}

/// Channels of one or more maps ordered by ascending frequency
///
/// Entries sharing a frequency keep the order in which their maps were
/// listed and are always adjacent. Positions are plain indices, so a scan
/// can walk the list in either direction.
#[derive(Debug, Clone, Default)]
pub struct ChannelList {
    entries: Vec<ChannelEntry>,
}

impl ChannelList {
    /// Build the list for every map named in `channelmap` (space separated)
    pub fn new(channelmap: &str) -> Result<Self, ChannelError> {
        let names: Vec<&str> = channelmap.split_whitespace().collect();
        let mut entries = Vec::new();

        for record in CHANNEL_MAP_TABLE.iter().filter(|r| names.contains(&r.name)) {
            for range in record.ranges {
                for number in range.channel_start..=range.channel_end {
                    let offset = (number - range.channel_start) as u32 * range.spacing;
                    entries.push(ChannelEntry {
                        number,
                        frequency: frequency_round_normal(range.frequency + offset),
                        name: format!("{}:{}", record.name, number),
                    });
                }
            }
        }

        if entries.is_empty() {
            return Err(ChannelError::UnknownChannelMap(channelmap.to_string()));
        }

        // Stable: equal frequencies stay in insertion order
        entries.sort_by_key(|e| e.frequency);

        Ok(ChannelList { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ChannelEntry> {
        self.entries.get(index)
    }

    pub fn first(&self) -> Option<usize> {
        if self.entries.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    pub fn last(&self) -> Option<usize> {
        self.entries.len().checked_sub(1)
    }

    pub fn next(&self, index: usize) -> Option<usize> {
        let next = index + 1;
        if next < self.entries.len() {
            Some(next)
        } else {
            None
        }
    }

    pub fn prev(&self, index: usize) -> Option<usize> {
        index.checked_sub(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelEntry> {
        self.entries.iter()
    }

    /// Number of distinct frequencies
    pub fn frequency_count(&self) -> usize {
        let mut count = 0;
        let mut last = None;
        for entry in &self.entries {
            if last != Some(entry.frequency) {
                count += 1;
                last = Some(entry.frequency);
            }
        }
        count
    }

    /// Channel number tuned by `frequency`, or 0 if none
    pub fn frequency_to_number(&self, frequency: u32) -> u16 {
        let frequency = frequency_round_normal(frequency);
        for entry in &self.entries {
            if entry.frequency == frequency {
                return entry.number;
            }
            if entry.frequency > frequency {
                return 0;
            }
        }
        0
    }

    /// Frequency of the first channel numbered `number`, or 0 if none
    pub fn number_to_frequency(&self, number: u16) -> u32 {
        self.entries
            .iter()
            .find(|e| e.number == number)
            .map(|e| e.frequency)
            .unwrap_or(0)
    }
}
