use crate::ogg::NO_GRANULE;

/// A complete logical unit of codec data, reassembled from one or more pages.
///
/// The payload is opaque to this crate. Packets are handed to the caller by
/// value; the demuxer keeps no reference to them once delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Serial number of the logical stream the packet belongs to
    pub stream_serial: u32,
    pub data: Vec<u8>,
    /// First packet of its logical stream
    pub is_bos: bool,
    /// Last packet of its logical stream
    pub is_eos: bool,
    /// Granule position of the page this packet ended on, or `-1` when a later
    /// packet also ended on that page.
    pub granule_position: i64,
    /// First packet to end on its page
    pub first_in_page: bool,
    /// Last packet to end on its page
    pub last_in_page: bool,
    /// Stored checksum of the page the packet ended on
    pub page_checksum: u32,
}

impl Packet {
    pub fn new(stream_serial: u32, data: Vec<u8>) -> Self {
        Packet {
            stream_serial,
            data,
            is_bos: false,
            is_eos: false,
            granule_position: NO_GRANULE,
            first_in_page: false,
            last_in_page: false,
            page_checksum: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the packet carries a meaningful granule position
    pub fn has_granule(&self) -> bool {
        self.granule_position != NO_GRANULE
    }
}
