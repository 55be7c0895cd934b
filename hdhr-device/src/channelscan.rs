//! Channel scan
//!
//! Walks a channel map from the highest frequency down. Channels that share
//! a frequency (e.g. the same carrier in several cable maps) are tuned once.
//! For each frequency the tuner is set to `auto:<frequency>`, given time to
//! lock, and then polled for the program list in `streaminfo`.
//!
//! When a lock is found, lower channels closer than 5.5 MHz are skipped:
//! they overlap the channel just found.

use crate::device::Device;
use hdhr_control::Outcome;
use hdhr_io::{sleep_minimum, Clock, Deadline, Logger, SystemClock};
use hdhr_protocol::channels::{channelmap_scan_group, ChannelError, ChannelList};
use hdhr_protocol::status::TunerStatus;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Most programs recorded per frequency
pub const MAX_PROGRAM_COUNT: usize = 64;

/// Channels within this distance below a locked one are not scanned
const OVERLAP_SKIP_HZ: u32 = 5_500_000;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const LOCK_SETTLE: Duration = Duration::from_millis(250);
const LOCK_TIMEOUT: Duration = Duration::from_millis(2500);
const SYMBOL_QUALITY_TIMEOUT: Duration = Duration::from_secs(5);
const PROGRAM_TIMEOUT_ATSC: Duration = Duration::from_secs(4);
const PROGRAM_TIMEOUT: Duration = Duration::from_secs(10);
const PROGRAM_COMPLETE_DELAY: Duration = Duration::from_secs(1);

/// Scan errors
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Unknown channel map: {0}")]
    UnknownChannelMap(String),
}

impl From<ChannelError> for ScanError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::UnknownChannelMap(name) => ScanError::UnknownChannelMap(name),
        }
    }
}

/// The tuner operations a scan needs
pub trait ScanTuner {
    fn set_channel(&mut self, channel: &str) -> Outcome<String>;
    fn status(&mut self) -> Outcome<TunerStatus>;
    fn streaminfo(&mut self) -> Outcome<String>;
    fn model(&mut self) -> Outcome<String>;
}

impl ScanTuner for Device {
    fn set_channel(&mut self, channel: &str) -> Outcome<String> {
        self.set_tuner_channel(channel)
    }

    fn status(&mut self) -> Outcome<TunerStatus> {
        self.get_tuner_status().map(|(_, status)| status)
    }

    fn streaminfo(&mut self) -> Outcome<String> {
        self.get_tuner_streaminfo()
    }

    fn model(&mut self) -> Outcome<String> {
        self.get_model()
    }
}

/// Wait for the tuner to lock after a channel change
///
/// Waits at least 250 ms for the signal strength reading to settle, then
/// polls for up to 2.5 s. Stops early on no signal or on any lock verdict.
pub fn wait_for_lock(tuner: &mut dyn ScanTuner, clock: &dyn Clock) -> Outcome<TunerStatus> {
    sleep_minimum(clock, LOCK_SETTLE);

    let deadline = Deadline::after(clock, LOCK_TIMEOUT);
    loop {
        let status = match tuner.status() {
            Outcome::Ok(status) => status,
            Outcome::Rejected(msg) => return Outcome::Rejected(msg),
            Outcome::Failure(e) => return Outcome::Failure(e),
        };

        if !status.signal_present || status.lock_supported || status.lock_unsupported {
            return Outcome::Ok(status);
        }
        if deadline.expired(clock) {
            return Outcome::Ok(status);
        }

        clock.sleep(POLL_INTERVAL);
    }
}

/// Kind of program found on a frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgramType {
    #[default]
    Normal,
    NoData,
    Control,
    Encrypted,
}

/// One program line from `streaminfo`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanProgram {
    /// The line as reported
    pub program_str: String,
    pub program_number: u16,
    pub virtual_major: u16,
    pub virtual_minor: u16,
    pub program_type: ProgramType,
    pub name: String,
}

/// Leading decimal number of `text` and the remainder
fn leading_number(text: &str) -> Option<(u16, &str)> {
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let value = text[..end].parse().ok()?;
    Some((value, &text[end..]))
}

impl ScanProgram {
    /// Parse `<number>: <major>[.<minor>] [<name>] [(<flags>)]`
    pub fn parse(line: &str) -> Option<Self> {
        let (program_number, rest) = leading_number(line.trim_start())?;
        let rest = rest.strip_prefix(':')?;
        let (virtual_major, rest) = leading_number(rest.trim_start())?;
        let virtual_minor = match rest.strip_prefix('.') {
            Some(minor) => leading_number(minor).map_or(0, |(minor, _)| minor),
            None => 0,
        };

        let program_type = if line.contains("(control)") {
            ProgramType::Control
        } else if line.contains("(encrypted)") {
            ProgramType::Encrypted
        } else if line.contains("(no data)") {
            ProgramType::NoData
        } else {
            ProgramType::Normal
        };

        Some(ScanProgram {
            program_str: line.to_string(),
            program_number,
            virtual_major,
            virtual_minor,
            program_type,
            name: Self::extract_name(line),
        })
    }

    /// Text after the second space, up to " (" or the end of the line
    fn extract_name(line: &str) -> String {
        let mut spaces = line.match_indices(' ');
        let start = match (spaces.next(), spaces.next()) {
            (Some(_), Some((idx, _))) => idx + 1,
            _ => return String::new(),
        };
        let rest = &line[start..];
        let end = rest.find(" (").unwrap_or(rest.len());
        rest[..end].to_string()
    }

    /// True if the device is still working out this program's details
    pub fn is_incomplete(&self) -> bool {
        match self.program_type {
            ProgramType::NoData => true,
            ProgramType::Normal => self.virtual_major == 0 || self.name.is_empty(),
            ProgramType::Control | ProgramType::Encrypted => false,
        }
    }
}

/// What was found on one frequency
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Names of every channel on this frequency, comma separated
    pub channel_str: String,
    pub frequency: u32,
    pub status: TunerStatus,
    pub transport_stream_id: Option<u16>,
    pub programs: Vec<ScanProgram>,
}

impl ScanResult {
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Merge a `streaminfo` reply; returns `(changed, incomplete)`
    ///
    /// Only newline-terminated lines are considered.
    pub fn update_programs(&mut self, streaminfo: &str) -> (bool, bool) {
        let mut changed = false;
        let mut incomplete = false;
        let mut count = 0;

        let complete = match streaminfo.rfind('\n') {
            Some(idx) => &streaminfo[..idx],
            None => "",
        };

        for line in complete.split('\n').filter(|_| !complete.is_empty()) {
            if let Some(hex) = line.strip_prefix("tsid=0x") {
                let end = hex
                    .find(|c: char| !c.is_ascii_hexdigit())
                    .unwrap_or(hex.len());
                if let Ok(tsid) = u16::from_str_radix(&hex[..end], 16) {
                    self.transport_stream_id = Some(tsid);
                    continue;
                }
            }

            if count >= MAX_PROGRAM_COUNT {
                continue;
            }
            let Some(program) = ScanProgram::parse(line) else {
                continue;
            };

            if program.is_incomplete() {
                incomplete = true;
            }

            match self.programs.get_mut(count) {
                Some(existing) if *existing == program => {}
                Some(existing) => {
                    *existing = program;
                    changed = true;
                }
                None => {
                    self.programs.push(program);
                    changed = true;
                }
            }
            count += 1;
        }

        if count == 0 {
            incomplete = true;
        }
        if self.programs.len() != count {
            self.programs.truncate(count);
            changed = true;
        }

        (changed, incomplete)
    }
}

/// Channel scan state
pub struct ChannelScan {
    channel_list: ChannelList,
    /// Next entry to scan; `None` once the list is exhausted
    next_channel: Option<usize>,
    scanned_channels: u32,
    clock: Arc<dyn Clock>,
    logger: Logger,
}

impl ChannelScan {
    /// Scan every map in `channelmap`'s scan group
    pub fn new(channelmap: &str, logger: Logger) -> Result<Self, ScanError> {
        Self::with_clock(channelmap, Arc::new(SystemClock), logger)
    }

    pub fn with_clock(
        channelmap: &str,
        clock: Arc<dyn Clock>,
        logger: Logger,
    ) -> Result<Self, ScanError> {
        let scan_group = channelmap_scan_group(channelmap)
            .ok_or_else(|| ScanError::UnknownChannelMap(channelmap.to_string()))?;
        let channel_list = ChannelList::new(scan_group)?;
        let next_channel = channel_list.last();

        Ok(ChannelScan {
            channel_list,
            next_channel,
            scanned_channels: 0,
            clock,
            logger: logger.with_prefix("channelscan"),
        })
    }

    pub fn channel_list(&self) -> &ChannelList {
        &self.channel_list
    }

    pub fn scanned_channels(&self) -> u32 {
        self.scanned_channels
    }

    /// Move to the next frequency, or `None` when the scan is done
    pub fn advance(&mut self) -> Option<ScanResult> {
        let index = self.next_channel?;
        let entry = self.channel_list.get(index)?;

        let mut result = ScanResult {
            channel_str: entry.name.clone(),
            frequency: entry.frequency,
            ..ScanResult::default()
        };

        let mut cursor = self.channel_list.prev(index);
        while let Some(prev) = cursor {
            let Some(entry) = self.channel_list.get(prev) else {
                break;
            };
            if entry.frequency != result.frequency {
                break;
            }
            result.channel_str.push_str(", ");
            result.channel_str.push_str(&entry.name);
            cursor = self.channel_list.prev(prev);
        }
        self.next_channel = cursor;

        Some(result)
    }

    /// Tune the frequency in `result` and fill in status and programs
    ///
    /// `Ok` covers "nothing there"; only a control failure or refusal is
    /// reported otherwise.
    pub fn detect(&mut self, tuner: &mut dyn ScanTuner, result: &mut ScanResult) -> Outcome<()> {
        self.scanned_channels += 1;

        match self.find_lock(tuner, result) {
            Outcome::Ok(()) => {}
            other => return other,
        }
        if !result.status.lock_supported {
            return Outcome::Ok(());
        }

        let is_atsc = match tuner.model() {
            Outcome::Ok(model) => model.contains("atsc"),
            _ => false,
        };
        let timeout = if is_atsc {
            PROGRAM_TIMEOUT_ATSC
        } else {
            PROGRAM_TIMEOUT
        };

        let clock = self.clock.as_ref();
        let deadline = Deadline::after(clock, timeout);
        let mut complete = Deadline::after(clock, PROGRAM_COMPLETE_DELAY);

        result.programs.clear();
        loop {
            let streaminfo = match tuner.streaminfo() {
                Outcome::Ok(streaminfo) => streaminfo,
                Outcome::Rejected(msg) => return Outcome::Rejected(msg),
                Outcome::Failure(e) => return Outcome::Failure(e),
            };

            let (changed, incomplete) = result.update_programs(&streaminfo);
            if changed {
                complete.reset(clock, PROGRAM_COMPLETE_DELAY);
            }
            if !incomplete && complete.expired(clock) {
                break;
            }
            if deadline.expired(clock) {
                self.logger.debug(format_args!(
                    "{}: program detection timed out",
                    result.frequency
                ));
                break;
            }

            clock.sleep(POLL_INTERVAL);
        }

        self.skip_overlapping(result.frequency);
        Outcome::Ok(())
    }

    fn find_lock(&mut self, tuner: &mut dyn ScanTuner, result: &mut ScanResult) -> Outcome<()> {
        let channel = format!("auto:{}", result.frequency);
        match tuner.set_channel(&channel) {
            Outcome::Ok(_) => {}
            Outcome::Rejected(msg) => return Outcome::Rejected(msg),
            Outcome::Failure(e) => return Outcome::Failure(e),
        }

        result.status = match wait_for_lock(tuner, self.clock.as_ref()) {
            Outcome::Ok(status) => status,
            Outcome::Rejected(msg) => return Outcome::Rejected(msg),
            Outcome::Failure(e) => return Outcome::Failure(e),
        };
        if !result.status.lock_supported {
            return Outcome::Ok(());
        }

        let clock = self.clock.as_ref();
        let deadline = Deadline::after(clock, SYMBOL_QUALITY_TIMEOUT);
        loop {
            result.status = match tuner.status() {
                Outcome::Ok(status) => status,
                Outcome::Rejected(msg) => return Outcome::Rejected(msg),
                Outcome::Failure(e) => return Outcome::Failure(e),
            };
            if result.status.symbol_error_quality == 100 || deadline.expired(clock) {
                return Outcome::Ok(());
            }
            clock.sleep(POLL_INTERVAL);
        }
    }

    fn skip_overlapping(&mut self, frequency: u32) {
        let max_next_frequency = frequency.saturating_sub(OVERLAP_SKIP_HZ);
        while let Some(index) = self.next_channel {
            match self.channel_list.get(index) {
                Some(entry) if entry.frequency > max_next_frequency => {
                    self.next_channel = self.channel_list.prev(index);
                }
                _ => break,
            }
        }
    }

    /// Percentage of frequencies scanned so far
    pub fn progress(&self) -> u8 {
        let Some(mut index) = self.next_channel else {
            return 100;
        };
        let Some(entry) = self.channel_list.get(index) else {
            return 100;
        };

        let mut remaining: u32 = 1;
        let mut frequency = entry.frequency;
        while let Some(prev) = self.channel_list.prev(index) {
            index = prev;
            if let Some(entry) = self.channel_list.get(index) {
                if entry.frequency != frequency {
                    remaining += 1;
                    frequency = entry.frequency;
                }
            }
        }

        (self.scanned_channels * 100 / (self.scanned_channels + remaining)) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdhr_io::SimulatedClock;

    /// Tuner that locks on a fixed set of frequencies
    struct MockTuner {
        locked: Vec<u32>,
        streaminfo: String,
        model: String,
        current: u32,
        tuned: Vec<String>,
        reject_tune: bool,
    }

    impl MockTuner {
        fn new(locked: Vec<u32>, streaminfo: &str) -> Self {
            MockTuner {
                locked,
                streaminfo: streaminfo.to_string(),
                model: "hdhomerun4_atsc".to_string(),
                current: 0,
                tuned: Vec::new(),
                reject_tune: false,
            }
        }
    }

    impl ScanTuner for MockTuner {
        fn set_channel(&mut self, channel: &str) -> Outcome<String> {
            if self.reject_tune {
                return Outcome::Rejected("ERROR: resource locked".to_string());
            }
            self.tuned.push(channel.to_string());
            self.current = channel
                .trim_start_matches("auto:")
                .parse()
                .unwrap_or(0);
            Outcome::Ok(channel.to_string())
        }

        fn status(&mut self) -> Outcome<TunerStatus> {
            let line = if self.locked.contains(&self.current) {
                format!("ch=auto:{} lock=8vsb ss=90 snq=85 seq=100", self.current)
            } else {
                format!("ch=auto:{} lock=none ss=0 snq=0 seq=0", self.current)
            };
            Outcome::Ok(TunerStatus::parse(&line))
        }

        fn streaminfo(&mut self) -> Outcome<String> {
            if self.locked.contains(&self.current) {
                Outcome::Ok(self.streaminfo.clone())
            } else {
                Outcome::Ok("none\n".to_string())
            }
        }

        fn model(&mut self) -> Outcome<String> {
            Outcome::Ok(self.model.clone())
        }
    }

    fn scan(channelmap: &str) -> (ChannelScan, Arc<SimulatedClock>) {
        let clock = Arc::new(SimulatedClock::new());
        let scan = ChannelScan::with_clock(channelmap, clock.clone(), Logger::default()).unwrap();
        (scan, clock)
    }

    #[test]
    fn test_unknown_channelmap() {
        assert!(matches!(
            ChannelScan::new("xx-bcast", Logger::default()),
            Err(ScanError::UnknownChannelMap(_))
        ));
    }

    #[test]
    fn test_advance_walks_down() {
        let (mut scan, _) = scan("us-bcast");
        let first = scan.advance().unwrap();
        assert_eq!(first.frequency, 803_000_000);
        assert_eq!(first.channel_str, "us-bcast:69");
        let second = scan.advance().unwrap();
        assert_eq!(second.frequency, 797_000_000);
        assert_eq!(second.channel_str, "us-bcast:68");
    }

    #[test]
    fn test_advance_combines_shared_frequency() {
        let (mut scan, _) = scan("us-cable");
        let result = scan.advance().unwrap();
        assert_eq!(result.frequency, 999_000_000);
        assert_eq!(result.channel_str, "us-irc:158, us-cable:158");

        let result = scan.advance().unwrap();
        assert_eq!(result.frequency, 997_750_000);
        assert_eq!(result.channel_str, "us-hrc:158");
    }

    #[test]
    fn test_detect_no_signal() {
        let (mut scan, clock) = scan("us-bcast");
        let mut tuner = MockTuner::new(vec![], "");

        let mut result = scan.advance().unwrap();
        assert!(scan.detect(&mut tuner, &mut result).is_ok());
        assert_eq!(tuner.tuned, vec!["auto:803000000"]);
        assert!(!result.status.lock_supported);
        assert!(result.programs.is_empty());
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
        assert_eq!(scan.scanned_channels(), 1);

        // No lock: nothing skipped
        assert_eq!(scan.advance().unwrap().frequency, 797_000_000);
    }

    #[test]
    fn test_detect_programs_and_skip_overlap() {
        let (mut scan, _) = scan("us-cable");
        let streaminfo = "tsid=0x0815\n1: 7.1 KATU (encrypted)\n2: 7.2 MeTV\n";
        let mut tuner = MockTuner::new(vec![999_000_000], streaminfo);

        let mut result = scan.advance().unwrap();
        assert!(scan.detect(&mut tuner, &mut result).is_ok());

        assert!(result.status.lock_supported);
        assert_eq!(result.transport_stream_id, Some(0x0815));
        assert_eq!(result.program_count(), 2);
        assert_eq!(result.programs[0].program_type, ProgramType::Encrypted);
        assert_eq!(result.programs[0].name, "KATU");
        assert_eq!(result.programs[1].virtual_major, 7);
        assert_eq!(result.programs[1].virtual_minor, 2);
        assert_eq!(result.programs[1].name, "MeTV");

        // 997.75 MHz overlaps and is skipped
        let next = scan.advance().unwrap();
        assert_eq!(next.frequency, 993_000_000);
        assert_eq!(next.channel_str, "us-irc:157, us-cable:157");
    }

    #[test]
    fn test_incomplete_programs_time_out() {
        let (mut scan, clock) = scan("us-bcast");
        let mut tuner = MockTuner::new(vec![803_000_000], "1: 0 (no data)\n");

        let mut result = scan.advance().unwrap();
        assert!(scan.detect(&mut tuner, &mut result).is_ok());
        assert_eq!(result.programs[0].program_type, ProgramType::NoData);
        // Settle delay plus the ATSC program timeout
        assert_eq!(clock.elapsed(), Duration::from_millis(4250));

        let (mut scan, clock) = self::scan("us-bcast");
        tuner.model = "hdhomerun3_dvbt".to_string();
        let mut result = scan.advance().unwrap();
        assert!(scan.detect(&mut tuner, &mut result).is_ok());
        assert_eq!(clock.elapsed(), Duration::from_millis(10_250));
    }

    #[test]
    fn test_complete_programs_finish_after_quiet_second() {
        let (mut scan, clock) = scan("us-bcast");
        let mut tuner = MockTuner::new(vec![803_000_000], "1: 7.1 KATU\n");

        let mut result = scan.advance().unwrap();
        assert!(scan.detect(&mut tuner, &mut result).is_ok());
        assert_eq!(result.program_count(), 1);
        assert_eq!(clock.elapsed(), Duration::from_millis(1250));
    }

    #[test]
    fn test_detect_rejected_tune() {
        let (mut scan, _) = scan("us-bcast");
        let mut tuner = MockTuner::new(vec![], "");
        tuner.reject_tune = true;

        let mut result = scan.advance().unwrap();
        assert!(scan.detect(&mut tuner, &mut result).is_rejected());
    }

    #[test]
    fn test_progress() {
        let (mut scan, _) = scan("us-bcast");
        let mut tuner = MockTuner::new(vec![], "");
        assert_eq!(scan.progress(), 0);

        let mut result = scan.advance().unwrap();
        scan.detect(&mut tuner, &mut result);
        // 1 scanned, 67 left
        assert_eq!(scan.progress(), 1);

        let mut frequencies = 1;
        while let Some(mut result) = scan.advance() {
            scan.detect(&mut tuner, &mut result);
            frequencies += 1;
        }
        assert_eq!(frequencies, 68);
        assert_eq!(scan.progress(), 100);
    }

    #[test]
    fn test_program_parse() {
        let program = ScanProgram::parse("3: 5.1 KXYZ-HD").unwrap();
        assert_eq!(program.program_number, 3);
        assert_eq!((program.virtual_major, program.virtual_minor), (5, 1));
        assert_eq!(program.name, "KXYZ-HD");
        assert_eq!(program.program_type, ProgramType::Normal);
        assert!(!program.is_incomplete());

        let program = ScanProgram::parse("4: 12 Local").unwrap();
        assert_eq!((program.virtual_major, program.virtual_minor), (12, 0));
        assert_eq!(program.name, "Local");

        let program = ScanProgram::parse("5: 0").unwrap();
        assert!(program.name.is_empty());
        assert!(program.is_incomplete());

        let program = ScanProgram::parse("6: 9.1 Guide (control)").unwrap();
        assert_eq!(program.program_type, ProgramType::Control);
        assert!(!program.is_incomplete());

        assert!(ScanProgram::parse("none").is_none());
        assert!(ScanProgram::parse("7 9.1 NoColon").is_none());
    }

    #[test]
    fn test_update_programs_change_tracking() {
        let mut result = ScanResult::default();

        assert_eq!(result.update_programs("1: 7.1 A\n2: 7.2 B\n"), (true, false));
        assert_eq!(result.update_programs("1: 7.1 A\n2: 7.2 B\n"), (false, false));
        assert_eq!(result.update_programs("1: 7.1 A\n"), (true, false));
        assert_eq!(result.program_count(), 1);

        // Unterminated last line is ignored
        assert_eq!(result.update_programs("1: 7.1 A\n2: 7.2 B"), (false, false));

        assert_eq!(result.update_programs("none\n"), (true, true));
        assert_eq!(result.program_count(), 0);
    }

    #[test]
    fn test_update_programs_caps_count() {
        let mut result = ScanResult::default();
        let streaminfo: String = (1..=80).map(|n| format!("{}: {}.1 P{}\n", n, n, n)).collect();
        result.update_programs(&streaminfo);
        assert_eq!(result.program_count(), MAX_PROGRAM_COUNT);
    }

    #[test]
    fn test_wait_for_lock_unsupported_stops() {
        struct Unsupported;
        impl ScanTuner for Unsupported {
            fn set_channel(&mut self, channel: &str) -> Outcome<String> {
                Outcome::Ok(channel.to_string())
            }
            fn status(&mut self) -> Outcome<TunerStatus> {
                Outcome::Ok(TunerStatus::parse("ch=auto:1 lock=(qam256) ss=80"))
            }
            fn streaminfo(&mut self) -> Outcome<String> {
                Outcome::Ok(String::new())
            }
            fn model(&mut self) -> Outcome<String> {
                Outcome::Ok(String::new())
            }
        }

        let clock = SimulatedClock::new();
        let status = wait_for_lock(&mut Unsupported, &clock).ok().unwrap();
        assert!(status.lock_unsupported);
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
    }

    #[test]
    fn test_wait_for_lock_times_out() {
        struct Searching;
        impl ScanTuner for Searching {
            fn set_channel(&mut self, channel: &str) -> Outcome<String> {
                Outcome::Ok(channel.to_string())
            }
            fn status(&mut self) -> Outcome<TunerStatus> {
                Outcome::Ok(TunerStatus::parse("ch=auto:1 lock=none ss=60"))
            }
            fn streaminfo(&mut self) -> Outcome<String> {
                Outcome::Ok(String::new())
            }
            fn model(&mut self) -> Outcome<String> {
                Outcome::Ok(String::new())
            }
        }

        let clock = SimulatedClock::new();
        let status = wait_for_lock(&mut Searching, &clock).ok().unwrap();
        assert!(status.signal_present);
        assert!(!status.lock_supported);
        assert_eq!(clock.elapsed(), Duration::from_millis(2750));
    }
}
