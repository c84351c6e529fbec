// Packet segmenter and page writer
//
// Packets are cut into 255-byte segments and collected into one pending page
// per stream. A pending page goes out when it cannot take another segment,
// when the caller asks for it, or when the stream ends.

use std::collections::HashMap;
use std::io::Write;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::ogg::page::Page;
use crate::ogg::session::StreamSession;
use crate::ogg::{
    MAX_SEGMENTS, MAX_SEGMENT_LEN, NO_GRANULE, OGG_HEADER_TYPE_BOS, OGG_HEADER_TYPE_CONTINUATION,
    OGG_HEADER_TYPE_EOS,
};

/// What to do after a packet has been queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketWriteEndInfo {
    /// Keep filling the current page
    NormalPacket,
    /// Emit the page this packet ended on
    EndPage,
    /// Last packet of the stream: emit its page flagged end-of-stream
    EndStream,
}

/// Page writer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Upper bound on segments per page, 1 to 255. Lower values produce more,
    /// smaller pages.
    pub max_segments_per_page: u8,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            max_segments_per_page: MAX_SEGMENTS as u8,
        }
    }
}

impl WriterConfig {
    fn segment_limit(&self) -> usize {
        usize::from(self.max_segments_per_page.max(1))
    }
}

/// Segment table entries for a packet of `len` bytes.
///
/// Every segment but the last is 255 bytes. The last is `len % 255`, which is
/// a 0-length terminator when `len` is a multiple of 255.
pub fn segment_lengths(len: usize) -> Vec<u8> {
    let full = len / MAX_SEGMENT_LEN as usize;
    let mut table = vec![MAX_SEGMENT_LEN; full];
    table.push((len % MAX_SEGMENT_LEN as usize) as u8);
    table
}

struct PendingPage {
    segment_table: Vec<u8>,
    payload: Vec<u8>,
    granule_position: i64,
    continued: bool,
}

impl PendingPage {
    fn new(continued: bool) -> Self {
        PendingPage {
            segment_table: Vec::new(),
            payload: Vec::new(),
            granule_position: NO_GRANULE,
            continued,
        }
    }
}

struct WriteStream {
    session: StreamSession,
    pending: PendingPage,
}

impl WriteStream {
    /// Build the page for the pending data without touching any state.
    fn build_page(&self, eos: bool) -> Page {
        let mut header_type = 0;
        if self.pending.continued {
            header_type |= OGG_HEADER_TYPE_CONTINUATION;
        }
        if !self.session.bos_seen() {
            header_type |= OGG_HEADER_TYPE_BOS;
        }
        if eos {
            header_type |= OGG_HEADER_TYPE_EOS;
        }

        Page::new(
            self.session.serial(),
            self.session.expected_sequence(),
            header_type,
            self.pending.granule_position,
            self.pending.segment_table.clone(),
            self.pending.payload.clone(),
        )
    }

    /// Write the pending page, then advance the session and start a new one.
    ///
    /// On a sink error nothing changes, so the page can be flushed again.
    fn emit<W: Write>(
        &mut self,
        sink: &mut W,
        pages_written: &mut u64,
        eos: bool,
        next_continued: bool,
    ) -> Result<()> {
        let page = self.build_page(eos);
        write_page(sink, &page, pages_written)?;

        self.session
            .accept_page(page.sequence_number, page.granule_position);
        if eos {
            self.session.close();
        }
        self.pending = PendingPage::new(next_continued);
        Ok(())
    }
}

/// Multiplexes packets of one or more logical streams into an Ogg bitstream.
///
/// Pending pages are not written on drop; call [`PacketWriter::into_inner`]
/// or [`PacketWriter::flush_all`] to push them out.
pub struct PacketWriter<W: Write> {
    sink: W,
    config: WriterConfig,
    streams: HashMap<u32, WriteStream>,
    pages_written: u64,
}

impl<W: Write> PacketWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_config(sink, WriterConfig::default())
    }

    pub fn with_config(sink: W, config: WriterConfig) -> Self {
        PacketWriter {
            sink,
            config,
            streams: HashMap::new(),
            pages_written: 0,
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn pages_written(&self) -> u64 {
        self.pages_written
    }

    pub fn session(&self, serial: u32) -> Option<&StreamSession> {
        self.streams.get(&serial).map(|s| &s.session)
    }

    /// Queue one packet for stream `serial`.
    ///
    /// The first packet written for a serial opens the stream. Writing to a
    /// stream that was ended with [`PacketWriteEndInfo::EndStream`] fails with
    /// `StreamReopened`.
    ///
    /// If the sink fails, the page being written stays pending and the
    /// sequence number does not advance. A packet split across pages may
    /// then be only partly queued, so the stream should not be continued.
    pub fn write_packet(
        &mut self,
        serial: u32,
        data: &[u8],
        granule_position: i64,
        end_info: PacketWriteEndInfo,
    ) -> Result<()> {
        let limit = self.config.segment_limit();
        let stream = self.streams.entry(serial).or_insert_with(|| WriteStream {
            session: StreamSession::new(serial),
            pending: PendingPage::new(false),
        });
        stream.session.ensure_open()?;

        let mut offset = 0;
        for (index, len) in segment_lengths(data.len()).into_iter().enumerate() {
            if stream.pending.segment_table.len() >= limit {
                stream.emit(&mut self.sink, &mut self.pages_written, false, index > 0)?;
            }
            let end = offset + len as usize;
            stream.pending.segment_table.push(len);
            stream.pending.payload.extend_from_slice(&data[offset..end]);
            offset = end;
        }
        stream.pending.granule_position = granule_position;

        match end_info {
            PacketWriteEndInfo::NormalPacket => {}
            PacketWriteEndInfo::EndPage => {
                stream.emit(&mut self.sink, &mut self.pages_written, false, false)?;
            }
            PacketWriteEndInfo::EndStream => {
                stream.emit(&mut self.sink, &mut self.pages_written, true, false)?;
                debug!(serial, "stream ended");
            }
        }
        Ok(())
    }

    /// Emit the pending page of one stream, if it holds anything.
    pub fn flush_stream(&mut self, serial: u32) -> Result<()> {
        if let Some(stream) = self.streams.get_mut(&serial) {
            // write_packet always completes its packet, so no continuation
            if !stream.pending.segment_table.is_empty() {
                stream.emit(&mut self.sink, &mut self.pages_written, false, false)?;
            }
        }
        Ok(())
    }

    /// Emit every pending page, in ascending serial order, and flush the sink.
    pub fn flush_all(&mut self) -> Result<()> {
        let mut serials: Vec<u32> = self.streams.keys().copied().collect();
        serials.sort_unstable();
        for serial in serials {
            self.flush_stream(serial)?;
        }
        self.sink.flush()?;
        Ok(())
    }

    /// Flush everything and hand back the sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush_all()?;
        Ok(self.sink)
    }
}

fn write_page<W: Write>(sink: &mut W, page: &Page, pages_written: &mut u64) -> Result<()> {
    let bytes = page.encode();
    sink.write_all(&bytes)?;
    *pages_written += 1;
    debug!(
        serial = page.serial_number,
        sequence = page.sequence_number,
        granule = page.granule_position,
        segments = page.segment_table.len(),
        bytes = bytes.len(),
        "wrote page"
    );
    Ok(())
}
