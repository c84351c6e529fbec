//! oggplex - Ogg container engine
//!
//! Splits an Ogg bitstream into the packets of its interleaved logical
//! streams, and multiplexes packets back into pages. Packet payloads are
//! opaque: codec headers and audio/video data are left to the caller.
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use oggplex::{Demuxer, PacketWriteEndInfo, PacketWriter};
//!
//! # fn main() -> oggplex::Result<()> {
//! let input = BufReader::new(File::open("in.ogg")?);
//! let mut writer = PacketWriter::new(File::create("out.ogg")?);
//! for item in Demuxer::new(input) {
//!     let packet = match item {
//!         Ok(packet) => packet,
//!         Err(e) if e.is_recoverable() => continue,
//!         Err(e) => return Err(e),
//!     };
//!     let end = if packet.is_eos {
//!         PacketWriteEndInfo::EndStream
//!     } else {
//!         PacketWriteEndInfo::NormalPacket
//!     };
//!     writer.write_packet(packet.stream_serial, &packet.data, packet.granule_position, end)?;
//! }
//! writer.into_inner()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod ogg;
mod utils;

pub use error::{OggError, Result};
pub use ogg::{
    segment_lengths, DemuxStats, Demuxer, Packet, PacketWriteEndInfo, PacketWriter, Page,
    PageReader, Reassembled, Reassembler, StreamPackets, StreamSession, WriterConfig,
    OGG_SIGNATURE,
};
