// Ogg container engine
//
// OGG Page Layout (27-byte fixed header):
// - Capture Pattern: "OggS" (4 bytes)
// - Version: 0 (1 byte)
// - Header Type: 1=continuation, 2=bos, 4=eos (1 byte)
// - Granule Position (8 bytes, signed LE)
// - Bitstream Serial Number (4 bytes LE)
// - Page Sequence Number (4 bytes LE)
// - CRC Checksum (4 bytes LE)
// - Number of Page Segments (1 byte)
// - Segment Table (variable)
// - Payload (sum of the segment table)
//
// Reading:  bytes -> PageReader -> Demuxer -> Reassembler (per serial) -> Packet
// Writing:  Packet -> PacketWriter (segmenter) -> Page::encode -> bytes

pub mod crc;
pub mod demux;
pub mod packet;
pub mod page;
pub mod reassembler;
pub mod session;
pub mod writer;

pub use demux::{DemuxStats, Demuxer, StreamPackets};
pub use packet::Packet;
pub use page::{Page, PageReader};
pub use reassembler::{Reassembled, Reassembler};
pub use session::StreamSession;
pub use writer::{segment_lengths, PacketWriteEndInfo, PacketWriter, WriterConfig};

// OGG signature
pub const OGG_SIGNATURE: &[u8; 4] = b"OggS";

// OGG page header types
pub const OGG_HEADER_TYPE_CONTINUATION: u8 = 0x01;
pub const OGG_HEADER_TYPE_BOS: u8 = 0x02; // Beginning of Stream
pub const OGG_HEADER_TYPE_EOS: u8 = 0x04; // End of Stream

/// Size of the fixed part of a page header
pub const PAGE_HEADER_LEN: usize = 27;

/// Byte offset of the checksum field inside the header
pub const CHECKSUM_OFFSET: usize = 22;

/// Largest number of entries a segment table can hold
pub const MAX_SEGMENTS: usize = 255;

/// Segment length that marks "packet continues"
pub const MAX_SEGMENT_LEN: u8 = 255;

/// Granule position of a page on which no packet completes
pub const NO_GRANULE: i64 = -1;
