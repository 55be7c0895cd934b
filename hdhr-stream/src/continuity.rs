//! Per-PID continuity counter tracking
//!
//! Every transport stream packet carries a 4-bit continuity counter per
//! PID. A counter that neither repeats nor increments by one means packets
//! were lost somewhere between the tuner and us.

use hdhr_protocol::types::TS_PACKET_SIZE;

/// Number of distinct PIDs (13 bits)
pub const PID_COUNT: usize = 8192;

/// Null packet PID, never checked
pub const PID_NULL: u16 = 0x1FFF;

/// Table value for "no previous counter"
const CC_UNKNOWN: u8 = 0xFF;

/// Result of checking one transport stream packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TsCheck {
    Ok,
    /// Null packet
    Ignored,
    /// Transport error indicator was set
    TransportError,
    /// Continuity counter jumped
    SequenceError,
}

/// Last continuity counter seen for every PID
pub struct ContinuityTable {
    state: Box<[u8; PID_COUNT]>,
}

impl Default for ContinuityTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ContinuityTable {
    pub fn new() -> Self {
        ContinuityTable {
            state: Box::new([CC_UNKNOWN; PID_COUNT]),
        }
    }

    /// Forget every PID
    pub fn reset(&mut self) {
        self.state.fill(CC_UNKNOWN);
    }

    /// Last counter recorded for `pid`, `None` if unknown
    pub fn counter(&self, pid: u16) -> Option<u8> {
        match self.state[pid as usize & (PID_COUNT - 1)] {
            CC_UNKNOWN => None,
            cc => Some(cc),
        }
    }

    /// Check one 188-byte packet and update the table
    pub fn check_packet(&mut self, packet: &[u8]) -> TsCheck {
        debug_assert!(packet.len() >= TS_PACKET_SIZE);

        let pid = (((packet[1] & 0x1F) as u16) << 8) | packet[2] as u16;
        if pid == PID_NULL {
            return TsCheck::Ignored;
        }

        let slot = &mut self.state[pid as usize];

        if packet[1] & 0x80 != 0 {
            *slot = CC_UNKNOWN;
            return TsCheck::TransportError;
        }

        let cc = packet[3] & 0x0F;
        let previous = std::mem::replace(slot, cc);

        if previous == CC_UNKNOWN || cc == ((previous + 1) & 0x0F) || cc == previous {
            TsCheck::Ok
        } else {
            TsCheck::SequenceError
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts_packet(pid: u16, cc: u8, tei: bool) -> [u8; TS_PACKET_SIZE] {
        let mut packet = [0xFFu8; TS_PACKET_SIZE];
        packet[0] = 0x47;
        packet[1] = ((pid >> 8) as u8 & 0x1F) | if tei { 0x80 } else { 0 };
        packet[2] = pid as u8;
        packet[3] = 0x10 | (cc & 0x0F);
        packet
    }

    #[test]
    fn test_in_order_counters_wrap() {
        let mut table = ContinuityTable::new();
        for cc in (0..16).chain(0..2) {
            assert_eq!(table.check_packet(&ts_packet(0x100, cc, false)), TsCheck::Ok);
        }
        assert_eq!(table.counter(0x100), Some(1));
    }

    #[test]
    fn test_jump_is_sequence_error() {
        let mut table = ContinuityTable::new();
        assert_eq!(table.check_packet(&ts_packet(0x31, 3, false)), TsCheck::Ok);
        assert_eq!(
            table.check_packet(&ts_packet(0x31, 7, false)),
            TsCheck::SequenceError
        );
        // Resynchronises on the new value
        assert_eq!(table.check_packet(&ts_packet(0x31, 8, false)), TsCheck::Ok);
    }

    #[test]
    fn test_repeat_is_accepted() {
        let mut table = ContinuityTable::new();
        table.check_packet(&ts_packet(0x44, 5, false));
        assert_eq!(table.check_packet(&ts_packet(0x44, 5, false)), TsCheck::Ok);
    }

    #[test]
    fn test_null_pid_ignored() {
        let mut table = ContinuityTable::new();
        assert_eq!(
            table.check_packet(&ts_packet(PID_NULL, 0, true)),
            TsCheck::Ignored
        );
        assert_eq!(table.counter(PID_NULL), None);
    }

    #[test]
    fn test_transport_error_resets_pid() {
        let mut table = ContinuityTable::new();
        table.check_packet(&ts_packet(0x200, 4, false));
        assert_eq!(
            table.check_packet(&ts_packet(0x200, 9, true)),
            TsCheck::TransportError
        );
        assert_eq!(table.counter(0x200), None);
        // Anything is accepted after the reset
        assert_eq!(table.check_packet(&ts_packet(0x200, 12, false)), TsCheck::Ok);
    }

    #[test]
    fn test_pids_are_independent() {
        let mut table = ContinuityTable::new();
        table.check_packet(&ts_packet(1, 0, false));
        table.check_packet(&ts_packet(2, 9, false));
        assert_eq!(table.check_packet(&ts_packet(1, 1, false)), TsCheck::Ok);
        assert_eq!(table.check_packet(&ts_packet(2, 10, false)), TsCheck::Ok);

        table.reset();
        assert_eq!(table.counter(1), None);
        assert_eq!(table.counter(2), None);
    }
}
