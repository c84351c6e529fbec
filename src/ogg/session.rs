// Per-stream lifecycle bookkeeping
//
// The demuxer and the writer each keep their own `StreamSession` per serial
// number. Both apply the same transitions: the first accepted page marks the
// stream as begun, every accepted page advances the sequence number by one,
// and nothing is accepted after the stream has been closed.

use crate::error::{OggError, Result};
use crate::ogg::NO_GRANULE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSession {
    serial: u32,
    expected_sequence: u32,
    bos_seen: bool,
    eos_seen: bool,
    last_granule_position: i64,
}

impl StreamSession {
    pub fn new(serial: u32) -> Self {
        StreamSession {
            serial,
            expected_sequence: 0,
            bos_seen: false,
            eos_seen: false,
            last_granule_position: NO_GRANULE,
        }
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Sequence number the next page must carry (reader) or will carry (writer)
    pub fn expected_sequence(&self) -> u32 {
        self.expected_sequence
    }

    pub fn bos_seen(&self) -> bool {
        self.bos_seen
    }

    pub fn eos_seen(&self) -> bool {
        self.eos_seen
    }

    /// Last granule position other than `-1` seen on an accepted page
    pub fn last_granule_position(&self) -> i64 {
        self.last_granule_position
    }

    /// Fails with `StreamReopened` once the stream has been closed.
    pub fn ensure_open(&self) -> Result<()> {
        if self.eos_seen {
            return Err(OggError::StreamReopened { serial: self.serial });
        }
        Ok(())
    }

    /// Compare a page's sequence number with the expected one.
    ///
    /// Any mismatch, forward gap or going backwards, is reported as
    /// `PageLoss`; the caller decides what to discard.
    pub fn check_sequence(&self, found: u32) -> Result<()> {
        if found != self.expected_sequence {
            return Err(OggError::PageLoss {
                serial: self.serial,
                expected: self.expected_sequence,
                found,
            });
        }
        Ok(())
    }

    /// Record an accepted page.
    ///
    /// The expected sequence moves to one past `sequence`, so reading resumes
    /// in step after a reported gap.
    pub fn accept_page(&mut self, sequence: u32, granule_position: i64) {
        self.bos_seen = true;
        self.expected_sequence = sequence.wrapping_add(1);
        if granule_position != NO_GRANULE {
            self.last_granule_position = granule_position;
        }
    }

    pub fn close(&mut self) {
        self.eos_seen = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session() {
        let session = StreamSession::new(42);
        assert_eq!(session.serial(), 42);
        assert_eq!(session.expected_sequence(), 0);
        assert!(!session.bos_seen());
        assert!(!session.eos_seen());
        assert_eq!(session.last_granule_position(), -1);
    }

    #[test]
    fn test_accept_advances_by_one() {
        let mut session = StreamSession::new(1);
        session.check_sequence(0).unwrap();
        session.accept_page(0, -1);
        assert!(session.bos_seen());
        assert_eq!(session.expected_sequence(), 1);
        session.accept_page(1, 960);
        session.accept_page(2, -1);
        assert_eq!(session.expected_sequence(), 3);
        assert_eq!(session.last_granule_position(), 960);
    }

    #[test]
    fn test_gap_reports_page_loss() {
        let mut session = StreamSession::new(5);
        session.accept_page(0, 0);
        match session.check_sequence(3) {
            Err(OggError::PageLoss { serial, expected, found }) => {
                assert_eq!((serial, expected, found), (5, 1, 3));
            }
            other => panic!("unexpected result {:?}", other),
        }
        session.accept_page(3, 0);
        assert!(session.check_sequence(4).is_ok());
    }

    #[test]
    fn test_sequence_wraps() {
        let mut session = StreamSession::new(1);
        session.accept_page(u32::MAX, 0);
        assert_eq!(session.expected_sequence(), 0);
    }

    #[test]
    fn test_closed_session_rejects() {
        let mut session = StreamSession::new(8);
        assert!(session.ensure_open().is_ok());
        session.close();
        assert!(matches!(session.ensure_open(), Err(OggError::StreamReopened { serial: 8 })));
    }
}
