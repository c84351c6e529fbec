// Packet reassembly for a single logical stream
//
// Segments are appended to an in-progress buffer in table order. A segment of
// 255 bytes means the packet goes on; anything shorter (including 0) ends it.
// The buffer survives across pages, which is how packets span pages.

use crate::error::OggError;
use crate::ogg::packet::Packet;
use crate::ogg::page::Page;
use crate::ogg::MAX_SEGMENT_LEN;

/// Packets and errors produced by one page, each in page order.
///
/// Errors always concern data that precedes the packets: a dropped partial
/// packet or a dropped leading fragment.
#[derive(Debug, Default)]
pub struct Reassembled {
    pub packets: Vec<Packet>,
    pub errors: Vec<OggError>,
}

#[derive(Debug, Default)]
pub struct Reassembler {
    partial: Option<Vec<u8>>,
    /// Drop the leading fragment of the next continued page without reporting
    skipping: bool,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a packet is waiting for its continuation
    pub fn has_partial(&self) -> bool {
        self.partial.is_some()
    }

    pub fn partial_len(&self) -> usize {
        self.partial.as_ref().map_or(0, Vec::len)
    }

    /// Throw away the in-flight packet after data was provably lost.
    ///
    /// The continuation of the lost packet on a later page is dropped quietly,
    /// since the loss has already been reported. Returns the number of bytes
    /// discarded.
    pub fn discard(&mut self) -> usize {
        self.skipping = true;
        self.partial.take().map_or(0, |p| p.len())
    }

    /// Feed one page of this stream.
    pub fn push_page(&mut self, page: &Page) -> Reassembled {
        let mut out = Reassembled::default();
        let serial = page.serial_number;
        let sequence = page.sequence_number;

        let mut skip_leading = false;
        if page.is_continued() {
            if self.partial.is_none() {
                if !self.skipping {
                    out.errors.push(OggError::MissingContinuation { serial, sequence });
                }
                skip_leading = true;
            }
        } else if let Some(stale) = self.partial.take() {
            out.errors.push(OggError::UnexpectedDiscontinuity {
                serial,
                sequence,
                discarded: stale.len(),
            });
        }
        self.skipping = false;

        let mut cursor = 0;
        for &len in &page.segment_table {
            let segment = &page.payload[cursor..cursor + len as usize];
            cursor += len as usize;

            if skip_leading {
                if len < MAX_SEGMENT_LEN {
                    skip_leading = false;
                }
                continue;
            }

            self.partial
                .get_or_insert_with(Vec::new)
                .extend_from_slice(segment);

            if len < MAX_SEGMENT_LEN {
                let data = self.partial.take().unwrap_or_default();
                let mut packet = Packet::new(serial, data);
                packet.first_in_page = out.packets.is_empty();
                packet.page_checksum = page.checksum;
                out.packets.push(packet);
            }
        }

        // The fragment being dropped runs on past this page
        if skip_leading {
            self.skipping = true;
        }

        if let Some(last) = out.packets.last_mut() {
            last.granule_position = page.granule_position;
            last.last_in_page = true;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ogg::OGG_HEADER_TYPE_CONTINUATION;

    fn page(sequence: u32, continued: bool, granule: i64, table: Vec<u8>) -> Page {
        let size: usize = table.iter().map(|&x| x as usize).sum();
        let payload = (0..size).map(|i| (i % 256) as u8).collect();
        let flags = if continued { OGG_HEADER_TYPE_CONTINUATION } else { 0 };
        Page::new(77, sequence, flags, granule, table, payload)
    }

    #[test]
    fn test_multiple_packets_on_one_page() {
        let mut r = Reassembler::new();
        let out = r.push_page(&page(0, false, 1234, vec![3, 0, 255, 10]));
        assert!(out.errors.is_empty());
        let lens: Vec<usize> = out.packets.iter().map(Packet::len).collect();
        assert_eq!(lens, vec![3, 0, 265]);
        assert_eq!(out.packets[0].data, vec![0, 1, 2]);
        assert!(out.packets[0].first_in_page);
        assert!(!out.packets[1].first_in_page);
        // Only the last packet ending on the page carries the granule
        assert_eq!(out.packets[0].granule_position, -1);
        assert_eq!(out.packets[1].granule_position, -1);
        assert_eq!(out.packets[2].granule_position, 1234);
        assert!(out.packets[2].last_in_page);
        assert!(!r.has_partial());
    }

    #[test]
    fn test_packet_spanning_pages() {
        let mut r = Reassembler::new();
        let first = r.push_page(&page(0, false, -1, vec![255, 255]));
        assert!(first.packets.is_empty());
        assert_eq!(r.partial_len(), 510);

        let second = r.push_page(&page(1, true, 88, vec![255, 0, 5]));
        assert!(second.errors.is_empty());
        assert_eq!(second.packets.len(), 2);
        assert_eq!(second.packets[0].len(), 765);
        assert_eq!(second.packets[0].granule_position, -1);
        assert_eq!(second.packets[1].len(), 5);
        assert_eq!(second.packets[1].granule_position, 88);
    }

    #[test]
    fn test_missing_continuation() {
        let mut r = Reassembler::new();
        let out = r.push_page(&page(4, true, 10, vec![255, 20, 7]));
        assert!(matches!(
            out.errors.as_slice(),
            [OggError::MissingContinuation { serial: 77, sequence: 4 }]
        ));
        // The orphaned leading fragment is dropped, the next packet survives
        assert_eq!(out.packets.len(), 1);
        assert_eq!(out.packets[0].len(), 7);
        assert_eq!(out.packets[0].granule_position, 10);
    }

    #[test]
    fn test_missing_continuation_over_several_pages() {
        let mut r = Reassembler::new();
        let first = r.push_page(&page(4, true, -1, vec![255, 255]));
        assert_eq!(first.errors.len(), 1);
        let second = r.push_page(&page(5, true, 3, vec![1, 2]));
        assert!(second.errors.is_empty());
        assert_eq!(second.packets.len(), 1);
        assert_eq!(second.packets[0].len(), 2);
    }

    #[test]
    fn test_unexpected_discontinuity() {
        let mut r = Reassembler::new();
        r.push_page(&page(0, false, -1, vec![255]));
        let out = r.push_page(&page(1, false, 2, vec![4]));
        assert!(matches!(
            out.errors.as_slice(),
            [OggError::UnexpectedDiscontinuity { discarded: 255, .. }]
        ));
        assert_eq!(out.packets.len(), 1);
        assert_eq!(out.packets[0].len(), 4);
    }

    #[test]
    fn test_discard_swallows_continuation_quietly() {
        let mut r = Reassembler::new();
        r.push_page(&page(0, false, -1, vec![255]));
        assert_eq!(r.discard(), 255);
        let out = r.push_page(&page(2, true, 9, vec![255, 1, 6]));
        assert!(out.errors.is_empty());
        assert_eq!(out.packets.len(), 1);
        assert_eq!(out.packets[0].len(), 6);
    }

    #[test]
    fn test_discard_before_fresh_page() {
        let mut r = Reassembler::new();
        r.discard();
        let out = r.push_page(&page(3, false, 1, vec![2]));
        assert!(out.errors.is_empty());
        assert_eq!(out.packets.len(), 1);
    }
}
