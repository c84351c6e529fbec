use std::io::Read;

use tracing::{debug, warn};

use crate::error::{OggError, Result};
use crate::ogg::crc::crc32;
use crate::ogg::{
    CHECKSUM_OFFSET, MAX_SEGMENTS, MAX_SEGMENT_LEN, OGG_HEADER_TYPE_BOS,
    OGG_HEADER_TYPE_CONTINUATION, OGG_HEADER_TYPE_EOS, OGG_SIGNATURE, PAGE_HEADER_LEN,
};
use crate::utils::io::{le_i64, le_u32, read_up_to, skip_to_signature, PushbackReader};

/// OGG Page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub version: u8,
    pub header_type: u8,
    pub granule_position: i64,
    pub serial_number: u32,
    pub sequence_number: u32,
    /// Checksum as stored on the wire. Ignored by [`Page::encode`].
    pub checksum: u32,
    pub segment_table: Vec<u8>,
    pub payload: Vec<u8>,
}

impl Page {
    /// Build a version 0 page. The checksum is filled in by [`Page::encode`].
    pub fn new(
        serial_number: u32,
        sequence_number: u32,
        header_type: u8,
        granule_position: i64,
        segment_table: Vec<u8>,
        payload: Vec<u8>,
    ) -> Self {
        Page {
            version: 0,
            header_type,
            granule_position,
            serial_number,
            sequence_number,
            checksum: 0,
            segment_table,
            payload,
        }
    }

    pub fn is_continued(&self) -> bool {
        self.header_type & OGG_HEADER_TYPE_CONTINUATION != 0
    }

    pub fn is_bos(&self) -> bool {
        self.header_type & OGG_HEADER_TYPE_BOS != 0
    }

    pub fn is_eos(&self) -> bool {
        self.header_type & OGG_HEADER_TYPE_EOS != 0
    }

    /// Calculate total page data size from segment table
    pub fn data_size(&self) -> usize {
        self.segment_table.iter().map(|&x| x as usize).sum()
    }

    /// Encoded size of the page in bytes
    pub fn encoded_len(&self) -> usize {
        PAGE_HEADER_LEN + self.segment_table.len() + self.payload.len()
    }

    /// Number of packets whose last segment lies on this page
    pub fn completed_packets(&self) -> usize {
        self.segment_table
            .iter()
            .filter(|&&len| len < MAX_SEGMENT_LEN)
            .count()
    }

    /// Whether the final packet on this page continues onto the next page
    pub fn ends_with_partial_packet(&self) -> bool {
        self.segment_table.last() == Some(&MAX_SEGMENT_LEN)
    }

    /// Decode one page from the start of `bytes`.
    ///
    /// Returns the page and the number of bytes it occupied; trailing bytes are
    /// left alone so a buffer of back-to-back pages can be walked.
    pub fn decode(bytes: &[u8]) -> Result<(Page, usize)> {
        Self::decode_at(bytes, 0)
    }

    /// Same as [`Page::decode`], with `offset` reported in errors as the
    /// position of `bytes[0]` in the surrounding stream.
    pub fn decode_at(bytes: &[u8], offset: u64) -> Result<(Page, usize)> {
        if bytes.len() < OGG_SIGNATURE.len() || &bytes[0..4] != OGG_SIGNATURE {
            return Err(OggError::Sync { offset });
        }
        if bytes.len() < PAGE_HEADER_LEN {
            return Err(OggError::Truncated {
                needed: PAGE_HEADER_LEN,
                available: bytes.len(),
            });
        }

        let version = bytes[4];
        let header_type = bytes[5];
        let granule_position = le_i64(bytes, 6);
        let serial_number = le_u32(bytes, 14);
        let sequence_number = le_u32(bytes, 18);
        let checksum = le_u32(bytes, CHECKSUM_OFFSET);
        let segment_count = bytes[26] as usize;

        let table_end = PAGE_HEADER_LEN + segment_count;
        if bytes.len() < table_end {
            return Err(OggError::Truncated {
                needed: table_end,
                available: bytes.len(),
            });
        }
        let segment_table = bytes[PAGE_HEADER_LEN..table_end].to_vec();

        let data_size: usize = segment_table.iter().map(|&x| x as usize).sum();
        let page_end = table_end + data_size;
        if bytes.len() < page_end {
            return Err(OggError::Truncated {
                needed: page_end,
                available: bytes.len(),
            });
        }

        let mut scratch = bytes[..page_end].to_vec();
        scratch[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].fill(0);
        let computed = crc32(&scratch);
        if computed != checksum {
            return Err(OggError::Checksum {
                serial: serial_number,
                sequence: sequence_number,
                stored: checksum,
                computed,
            });
        }
        // Checked after the CRC so a damaged version byte stays recoverable
        if version != 0 {
            return Err(OggError::UnsupportedVersion { version, offset });
        }

        let page = Page {
            version,
            header_type,
            granule_position,
            serial_number,
            sequence_number,
            checksum,
            segment_table,
            payload: bytes[table_end..page_end].to_vec(),
        };
        Ok((page, page_end))
    }

    /// Serialize the page, computing its checksum.
    ///
    /// # Panics
    ///
    /// If the segment table has more than 255 entries or the payload length
    /// differs from the segment table sum. Both mean the caller built an
    /// invalid page.
    pub fn encode(&self) -> Vec<u8> {
        assert!(
            self.segment_table.len() <= MAX_SEGMENTS,
            "segment table has {} entries, at most {} allowed",
            self.segment_table.len(),
            MAX_SEGMENTS
        );
        assert_eq!(
            self.data_size(),
            self.payload.len(),
            "payload length disagrees with segment table"
        );

        let mut bytes = Vec::with_capacity(self.encoded_len());
        bytes.extend_from_slice(OGG_SIGNATURE);
        bytes.push(self.version);
        bytes.push(self.header_type);
        bytes.extend_from_slice(&self.granule_position.to_le_bytes());
        bytes.extend_from_slice(&self.serial_number.to_le_bytes());
        bytes.extend_from_slice(&self.sequence_number.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 4]);
        bytes.push(self.segment_table.len() as u8);
        bytes.extend_from_slice(&self.segment_table);
        bytes.extend_from_slice(&self.payload);

        let crc = crc32(&bytes);
        bytes[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
        bytes
    }
}

/// Reads pages one at a time from a byte source.
///
/// When the capture pattern is missing, [`PageReader::read_page`] reports
/// [`OggError::Sync`]. The caller then either calls [`PageReader::resync`] to
/// scan forward, or simply reads again, which resyncs implicitly.
///
/// A page that fails its checksum may have a damaged length field, so its
/// bytes after the capture pattern are searched again for the next page.
pub struct PageReader<R> {
    inner: PushbackReader<R>,
    offset: u64,
    /// Bytes consumed while looking for a capture pattern that did not match
    lost_sync: Option<Vec<u8>>,
    /// A resync scan already consumed the next page's capture pattern
    capture_consumed: bool,
}

impl<R: Read> PageReader<R> {
    pub fn new(inner: R) -> Self {
        PageReader {
            inner: PushbackReader::new(inner),
            offset: 0,
            lost_sync: None,
            capture_consumed: false,
        }
    }

    /// Number of bytes consumed from the source so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Return the byte source. Bytes held back for rescanning a damaged
    /// page are lost.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    /// Read the next page. `Ok(None)` marks a clean end of input.
    pub fn read_page(&mut self) -> Result<Option<Page>> {
        if self.lost_sync.is_some() {
            let skipped = self.resync()?;
            debug!(skipped, "implicit resync before reading page");
        }

        let mut raw = vec![0u8; PAGE_HEADER_LEN];
        let page_start;
        if self.capture_consumed {
            self.capture_consumed = false;
            page_start = self.offset - OGG_SIGNATURE.len() as u64;
            raw[..4].copy_from_slice(OGG_SIGNATURE);
        } else {
            page_start = self.offset;
            let n = read_up_to(&mut self.inner, &mut raw[..4])?;
            self.offset += n as u64;
            if n == 0 {
                return Ok(None);
            }
            if n < 4 || &raw[..4] != OGG_SIGNATURE {
                self.lost_sync = Some(raw[..n].to_vec());
                return Err(OggError::Sync { offset: page_start });
            }
        }

        self.fill(&mut raw, 4)?;
        let segment_count = raw[26] as usize;
        raw.resize(PAGE_HEADER_LEN + segment_count, 0);
        self.fill(&mut raw, PAGE_HEADER_LEN)?;

        let data_size: usize = raw[PAGE_HEADER_LEN..].iter().map(|&x| x as usize).sum();
        let table_end = raw.len();
        raw.resize(table_end + data_size, 0);
        self.fill(&mut raw, table_end)?;

        let page = match Page::decode_at(&raw, page_start) {
            Ok((page, _)) => page,
            Err(e @ OggError::Checksum { .. }) => {
                let tail = &raw[OGG_SIGNATURE.len()..];
                self.inner.unread(tail);
                self.offset -= tail.len() as u64;
                self.lost_sync = Some(Vec::new());
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        debug!(
            serial = page.serial_number,
            sequence = page.sequence_number,
            granule = page.granule_position,
            segments = page.segment_table.len(),
            offset = page_start,
            "read page"
        );
        Ok(Some(page))
    }

    /// Scan forward to the next capture pattern.
    ///
    /// Returns how many bytes were discarded. After a successful scan the next
    /// [`PageReader::read_page`] starts at the found page; if the input ends
    /// first it returns `Ok(None)`.
    pub fn resync(&mut self) -> Result<u64> {
        if self.capture_consumed {
            return Ok(0);
        }
        let window = self.lost_sync.take().unwrap_or_default();
        let (found, skipped) = skip_to_signature(&mut self.inner, &window, OGG_SIGNATURE)?;
        let scanned = if found {
            skipped + OGG_SIGNATURE.len() as u64
        } else {
            skipped
        };
        self.offset += scanned.saturating_sub(window.len() as u64);
        self.capture_consumed = found;
        if skipped > 0 {
            warn!(skipped, offset = self.offset, found, "skipped bytes looking for capture pattern");
        }
        Ok(skipped)
    }

    fn fill(&mut self, raw: &mut [u8], from: usize) -> Result<()> {
        let n = read_up_to(&mut self.inner, &mut raw[from..])?;
        self.offset += n as u64;
        if from + n < raw.len() {
            return Err(OggError::Truncated {
                needed: raw.len(),
                available: from + n,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_page() -> Page {
        let payload: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();
        Page::new(0xDEAD_BEEF, 3, OGG_HEADER_TYPE_BOS, 4096, vec![255, 45], payload)
    }

    #[test]
    fn test_encode_layout() {
        let bytes = sample_page().encode();
        assert_eq!(&bytes[0..4], b"OggS");
        assert_eq!(bytes[4], 0);
        assert_eq!(bytes[5], OGG_HEADER_TYPE_BOS);
        assert_eq!(le_i64(&bytes, 6), 4096);
        assert_eq!(le_u32(&bytes, 14), 0xDEAD_BEEF);
        assert_eq!(le_u32(&bytes, 18), 3);
        assert_eq!(bytes[26], 2);
        assert_eq!(&bytes[27..29], &[255, 45]);
        assert_eq!(bytes.len(), 27 + 2 + 300);
    }

    #[test]
    fn test_decode_reads_back_fields() {
        let page = sample_page();
        let bytes = page.encode();
        let (decoded, used) = Page::decode(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(decoded.serial_number, page.serial_number);
        assert_eq!(decoded.sequence_number, 3);
        assert_eq!(decoded.granule_position, 4096);
        assert!(decoded.is_bos());
        assert!(!decoded.is_eos());
        assert!(!decoded.is_continued());
        assert_eq!(decoded.payload, page.payload);
        assert_eq!(decoded.checksum, le_u32(&bytes, CHECKSUM_OFFSET));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut bytes = sample_page().encode();
        let len = bytes.len();
        bytes.extend_from_slice(b"OggS...");
        let (_, used) = Page::decode(&bytes).unwrap();
        assert_eq!(used, len);
    }

    #[test]
    fn test_negative_granule() {
        let page = Page::new(1, 0, 0, -1, vec![10], vec![7; 10]);
        let (decoded, _) = Page::decode(&page.encode()).unwrap();
        assert_eq!(decoded.granule_position, -1);
    }

    #[test]
    fn test_bad_capture_pattern() {
        let mut bytes = sample_page().encode();
        bytes[0] = b'o';
        assert!(matches!(Page::decode_at(&bytes, 40), Err(OggError::Sync { offset: 40 })));
    }

    #[test]
    fn test_unsupported_version() {
        let mut page = sample_page();
        page.version = 1;
        let bytes = page.encode();
        assert!(matches!(
            Page::decode(&bytes),
            Err(OggError::UnsupportedVersion { version: 1, .. })
        ));
    }

    #[test]
    fn test_checksum_detects_every_bit_flip() {
        let page = Page::new(7, 1, OGG_HEADER_TYPE_CONTINUATION, 99, vec![12, 3], b"hello world!abc".to_vec());
        let bytes = page.encode();
        for byte in 0..bytes.len() {
            // Capture pattern damage is a sync failure and the checksum field
            // itself is excluded from the computation.
            if byte < 4 || (CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4).contains(&byte) {
                continue;
            }
            // Flips in the lengths can change the page size
            if (26..29).contains(&byte) {
                continue;
            }
            for bit in 0..8 {
                let mut corrupt = bytes.clone();
                corrupt[byte] ^= 1 << bit;
                assert!(
                    matches!(Page::decode(&corrupt), Err(OggError::Checksum { .. })),
                    "flip of bit {} in byte {} went unnoticed",
                    bit,
                    byte
                );
            }
        }
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = sample_page().encode();
        assert!(matches!(
            Page::decode(&bytes[..bytes.len() - 1]),
            Err(OggError::Truncated { .. })
        ));
        assert!(matches!(Page::decode(&bytes[..10]), Err(OggError::Truncated { needed: 27, .. })));
    }

    #[test]
    #[should_panic(expected = "payload length disagrees")]
    fn test_encode_rejects_length_mismatch() {
        Page::new(1, 0, 0, 0, vec![10], vec![0; 9]).encode();
    }

    #[test]
    #[should_panic(expected = "segment table has 256 entries")]
    fn test_encode_rejects_oversized_table() {
        Page::new(1, 0, 0, 0, vec![0; 256], Vec::new()).encode();
    }

    #[test]
    fn test_packet_counting_helpers() {
        let page = Page::new(1, 0, 0, 0, vec![255, 10, 0, 255], vec![0; 520]);
        assert_eq!(page.completed_packets(), 2);
        assert!(page.ends_with_partial_packet());
    }

    #[test]
    fn test_reader_walks_pages() {
        let mut stream = Vec::new();
        stream.extend(Page::new(1, 0, OGG_HEADER_TYPE_BOS, 0, vec![3], vec![1, 2, 3]).encode());
        stream.extend(Page::new(1, 1, 0, 5, vec![0], Vec::new()).encode());

        let mut reader = PageReader::new(Cursor::new(stream.clone()));
        let first = reader.read_page().unwrap().unwrap();
        assert_eq!(first.payload, vec![1, 2, 3]);
        let second = reader.read_page().unwrap().unwrap();
        assert_eq!(second.sequence_number, 1);
        assert!(reader.read_page().unwrap().is_none());
        assert_eq!(reader.offset(), stream.len() as u64);
    }

    #[test]
    fn test_reader_resyncs_over_garbage() {
        let page = Page::new(9, 0, OGG_HEADER_TYPE_BOS, 0, vec![4], b"data".to_vec());
        let mut stream = b"junkOgg".to_vec();
        stream.extend(page.encode());

        let mut reader = PageReader::new(Cursor::new(stream.clone()));
        assert!(matches!(reader.read_page(), Err(OggError::Sync { offset: 0 })));
        assert_eq!(reader.resync().unwrap(), 7);
        let found = reader.read_page().unwrap().unwrap();
        assert_eq!(found, Page { checksum: found.checksum, ..page });
        assert_eq!(reader.offset(), stream.len() as u64);
    }

    #[test]
    fn test_reader_implicit_resync() {
        let page = Page::new(9, 0, OGG_HEADER_TYPE_BOS, 0, vec![1], b"x".to_vec());
        let mut stream = b"zz".to_vec();
        stream.extend(page.encode());

        let mut reader = PageReader::new(Cursor::new(stream));
        assert!(matches!(reader.read_page(), Err(OggError::Sync { .. })));
        assert_eq!(reader.read_page().unwrap().unwrap().payload, b"x".to_vec());
    }

    #[test]
    fn test_reader_trailing_garbage_ends_cleanly() {
        let mut stream = Page::new(2, 0, OGG_HEADER_TYPE_BOS, 0, vec![1], b"a".to_vec()).encode();
        stream.extend_from_slice(b"tail");

        let mut reader = PageReader::new(Cursor::new(stream));
        assert!(reader.read_page().unwrap().is_some());
        assert!(matches!(reader.read_page(), Err(OggError::Sync { .. })));
        assert!(reader.read_page().unwrap().is_none());
    }

    #[test]
    fn test_reader_rescans_page_with_damaged_length() {
        let mut stream = Page::new(1, 0, OGG_HEADER_TYPE_BOS, 0, vec![5], b"hello".to_vec()).encode();
        // Three table entries [5, 'h', 'e'] claim 210 bytes, reaching into the next page
        stream[26] = 3;
        let next = Page::new(1, 1, 0, 0, vec![255], vec![7; 255]);
        stream.extend(next.encode());

        let mut reader = PageReader::new(Cursor::new(stream.clone()));
        assert!(matches!(reader.read_page(), Err(OggError::Checksum { sequence: 0, .. })));
        let found = reader.read_page().unwrap().unwrap();
        assert_eq!(found.sequence_number, 1);
        assert_eq!(found.payload, next.payload);
        assert!(reader.read_page().unwrap().is_none());
        assert_eq!(reader.offset(), stream.len() as u64);
    }

    #[test]
    fn test_reader_truncated_page() {
        let bytes = sample_page().encode();
        let mut reader = PageReader::new(Cursor::new(bytes[..bytes.len() - 20].to_vec()));
        assert!(matches!(reader.read_page(), Err(OggError::Truncated { .. })));
    }
}
