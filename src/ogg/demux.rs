// Stream demultiplexer
//
// Pulls pages from a byte source, routes them by serial number and queues the
// resulting packets per stream. Every queued item carries an arrival index so
// `next_packet_any_stream` can hand packets out in physical page order even
// when `next_packet` has been draining individual streams.

use std::collections::{HashMap, VecDeque};
use std::io::Read;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{OggError, Result};
use crate::ogg::packet::Packet;
use crate::ogg::page::{Page, PageReader};
use crate::ogg::reassembler::Reassembler;
use crate::ogg::session::StreamSession;

/// Counters collected while demultiplexing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DemuxStats {
    pub pages: u64,
    pub packets: u64,
    pub bytes_skipped: u64,
    pub checksum_failures: u64,
    pub lost_pages: u64,
    pub orphan_pages: u64,
}

struct StreamRecord {
    session: StreamSession,
    reassembler: Reassembler,
    queue: VecDeque<(u64, Result<Packet>)>,
    packets_emitted: u64,
}

impl StreamRecord {
    fn new(serial: u32) -> Self {
        StreamRecord {
            session: StreamSession::new(serial),
            reassembler: Reassembler::new(),
            queue: VecDeque::new(),
            packets_emitted: 0,
        }
    }

    /// Start a new logical stream on a reused serial, keeping undelivered items
    fn restart(&mut self) {
        self.session = StreamSession::new(self.session.serial());
        self.reassembler = Reassembler::new();
        self.packets_emitted = 0;
    }
}

/// Splits a physical Ogg bitstream into per-stream packet sequences.
///
/// Reading is lazy: a page is pulled from the source only when no queued item
/// can satisfy the request. Recoverable problems are returned as `Err` items
/// and reading continues afterwards; fatal ones end the sequence. The
/// sequence is forward-only; build a new `Demuxer` to read again.
pub struct Demuxer<R> {
    reader: PageReader<R>,
    streams: HashMap<u32, StreamRecord>,
    /// Errors not tied to a known stream (sync, checksum, orphans, fatal)
    stray_errors: VecDeque<(u64, OggError)>,
    arrival: u64,
    stats: DemuxStats,
    exhausted: bool,
}

impl<R: Read> Demuxer<R> {
    pub fn new(source: R) -> Self {
        Demuxer {
            reader: PageReader::new(source),
            streams: HashMap::new(),
            stray_errors: VecDeque::new(),
            arrival: 0,
            stats: DemuxStats::default(),
            exhausted: false,
        }
    }

    pub fn stats(&self) -> &DemuxStats {
        &self.stats
    }

    /// Serial numbers seen so far, in ascending order
    pub fn serials(&self) -> Vec<u32> {
        let mut serials: Vec<u32> = self.streams.keys().copied().collect();
        serials.sort_unstable();
        serials
    }

    pub fn session(&self, serial: u32) -> Option<&StreamSession> {
        self.streams.get(&serial).map(|r| &r.session)
    }

    /// Whether the source is used up (or failed fatally)
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    /// Next packet of the given stream.
    ///
    /// Errors that belong to no particular stream are returned from here too,
    /// as soon as they are found. Returns `None` once the stream has ended and
    /// been drained, or the input is exhausted.
    pub fn next_packet(&mut self, serial: u32) -> Option<Result<Packet>> {
        loop {
            if let Some((_, e)) = self.stray_errors.pop_front() {
                return Some(Err(e));
            }
            if let Some(record) = self.streams.get_mut(&serial) {
                if let Some((_, item)) = record.queue.pop_front() {
                    return Some(item);
                }
                if record.session.eos_seen() {
                    return None;
                }
            }
            if self.exhausted {
                return None;
            }
            self.pump();
        }
    }

    /// Next packet or error from any stream, in page arrival order.
    pub fn next_packet_any_stream(&mut self) -> Option<Result<Packet>> {
        loop {
            if let Some(item) = self.pop_oldest() {
                return Some(item);
            }
            if self.exhausted {
                return None;
            }
            self.pump();
        }
    }

    /// Iterator over one stream's packets
    pub fn packets(&mut self, serial: u32) -> StreamPackets<'_, R> {
        StreamPackets { demuxer: self, serial }
    }

    fn pop_oldest(&mut self) -> Option<Result<Packet>> {
        let stray = self.stray_errors.front().map(|(index, _)| *index);
        let stream = self
            .streams
            .iter()
            .filter_map(|(serial, r)| r.queue.front().map(|(index, _)| (*index, *serial)))
            .min();

        match (stray, stream) {
            (Some(s), Some((index, _))) if s < index => {
                self.stray_errors.pop_front().map(|(_, e)| Err(e))
            }
            (_, Some((_, serial))) => self
                .streams
                .get_mut(&serial)
                .and_then(|r| r.queue.pop_front())
                .map(|(_, item)| item),
            (Some(_), None) => self.stray_errors.pop_front().map(|(_, e)| Err(e)),
            (None, None) => None,
        }
    }

    fn next_index(&mut self) -> u64 {
        let index = self.arrival;
        self.arrival += 1;
        index
    }

    fn push_stray(&mut self, error: OggError) {
        let index = self.next_index();
        self.stray_errors.push_back((index, error));
    }

    fn push_stream_error(&mut self, serial: u32, error: OggError) {
        warn!(serial, "{}", error);
        let index = self.next_index();
        if let Some(record) = self.streams.get_mut(&serial) {
            record.queue.push_back((index, Err(error)));
        }
    }

    /// Read one page (or hit one error) and route the result.
    fn pump(&mut self) {
        match self.reader.read_page() {
            Ok(Some(page)) => self.route_page(page),
            Ok(None) => self.finish(),
            Err(OggError::Sync { offset }) => {
                match self.reader.resync() {
                    Ok(skipped) => self.stats.bytes_skipped += skipped,
                    Err(e) => {
                        self.push_stray(e);
                        self.finish();
                        return;
                    }
                }
                warn!(offset, "lost sync");
                self.push_stray(OggError::Sync { offset });
            }
            Err(e @ OggError::Checksum { .. }) => {
                warn!("{}", e);
                self.stats.checksum_failures += 1;
                self.push_stray(e);
            }
            Err(e) => {
                warn!("fatal read error: {}", e);
                self.push_stray(e);
                self.finish();
            }
        }
    }

    fn route_page(&mut self, page: Page) {
        self.stats.pages += 1;
        let serial = page.serial_number;

        match self.streams.get_mut(&serial) {
            None if !page.is_bos() => {
                warn!(serial, sequence = page.sequence_number, "page for unknown stream");
                self.stats.orphan_pages += 1;
                self.push_stray(OggError::OrphanStream { serial });
                return;
            }
            None => {
                debug!(serial, "new logical stream");
                self.streams.insert(serial, StreamRecord::new(serial));
            }
            Some(record) if record.session.eos_seen() => {
                if !page.is_bos() {
                    self.push_stream_error(serial, OggError::StreamReopened { serial });
                    return;
                }
                debug!(serial, "serial reused by a new logical stream");
                record.restart();
            }
            Some(_) if page.is_bos() => {
                self.push_stream_error(serial, OggError::DuplicateBeginOfStream { serial });
                return;
            }
            Some(_) => {}
        }

        let mut errors = Vec::new();
        let reassembled = match self.streams.get_mut(&serial) {
            Some(record) => {
                if let Err(e) = record.session.check_sequence(page.sequence_number) {
                    let gap = page.sequence_number.wrapping_sub(record.session.expected_sequence());
                    if (gap as i32) < 0 {
                        // Duplicated or replayed page, its packets were already delivered
                        debug!(serial, sequence = page.sequence_number, "stale page skipped");
                        self.push_stream_error(serial, e);
                        return;
                    }
                    self.stats.lost_pages += u64::from(gap);
                    record.reassembler.discard();
                    errors.push(e);
                }
                record
                    .session
                    .accept_page(page.sequence_number, page.granule_position);
                record.reassembler.push_page(&page)
            }
            None => return,
        };
        errors.extend(reassembled.errors);
        for e in errors {
            self.push_stream_error(serial, e);
        }

        let mut packets = reassembled.packets;
        // An EOS page without a completed packet closes the stream but has
        // nothing to flag; the previous packet may already be delivered.
        if page.is_eos() {
            if let Some(last) = packets.last_mut() {
                last.is_eos = true;
            }
        }

        for mut packet in packets {
            let index = self.next_index();
            if let Some(record) = self.streams.get_mut(&serial) {
                packet.is_bos = record.packets_emitted == 0;
                record.packets_emitted += 1;
                record.queue.push_back((index, Ok(packet)));
                self.stats.packets += 1;
            }
        }

        if page.is_eos() {
            let mut unterminated = 0;
            if let Some(record) = self.streams.get_mut(&serial) {
                unterminated = record.reassembler.discard();
                record.session.close();
            }
            if unterminated > 0 {
                self.push_stream_error(
                    serial,
                    OggError::UnterminatedPacket { serial, discarded: unterminated },
                );
            }
            debug!(serial, "stream closed");
        }
    }

    /// End of input, clean or not: report packets cut off mid-flight, then
    /// stop.
    fn finish(&mut self) {
        self.exhausted = true;
        for serial in self.serials() {
            let discarded = match self.streams.get_mut(&serial) {
                Some(record) if record.reassembler.has_partial() => record.reassembler.discard(),
                _ => continue,
            };
            self.push_stream_error(serial, OggError::UnterminatedPacket { serial, discarded });
        }
        debug!(pages = self.stats.pages, packets = self.stats.packets, "end of input");
    }
}

impl<R: Read> Iterator for Demuxer<R> {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet_any_stream()
    }
}

/// Packets of one logical stream, see [`Demuxer::packets`]
pub struct StreamPackets<'a, R> {
    demuxer: &'a mut Demuxer<R>,
    serial: u32,
}

impl<'a, R: Read> Iterator for StreamPackets<'a, R> {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        self.demuxer.next_packet(self.serial)
    }
}
