// I/O utilities for reading Ogg bitstreams

use std::io::{self, Read};

/// Read little-endian 32-bit integer at `offset`
pub fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buffer = [0u8; 4];
    buffer.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buffer)
}

/// Read little-endian signed 64-bit integer at `offset`
pub fn le_i64(bytes: &[u8], offset: usize) -> i64 {
    let mut buffer = [0u8; 8];
    buffer.copy_from_slice(&bytes[offset..offset + 8]);
    i64::from_le_bytes(buffer)
}

/// Fill as much of `buffer` as the reader can provide.
///
/// Unlike `read_exact`, hitting end of input is not an error: the number of
/// bytes actually read is returned so the caller can tell a clean end of
/// stream (0) from a truncated record.
pub fn read_up_to<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Reader with a pushback buffer served before the wrapped source.
pub struct PushbackReader<R> {
    inner: R,
    buffer: Vec<u8>,
    pos: usize,
}

impl<R: Read> PushbackReader<R> {
    pub fn new(inner: R) -> Self {
        PushbackReader {
            inner,
            buffer: Vec::new(),
            pos: 0,
        }
    }

    /// Put `bytes` back so they are read again before anything else
    pub fn unread(&mut self, bytes: &[u8]) {
        let mut buffer = Vec::with_capacity(bytes.len() + self.buffer.len() - self.pos);
        buffer.extend_from_slice(bytes);
        buffer.extend_from_slice(&self.buffer[self.pos..]);
        self.buffer = buffer;
        self.pos = 0;
    }

    /// Drop any pushed-back bytes and return the wrapped source
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for PushbackReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.buffer.len() {
            let n = buf.len().min(self.buffer.len() - self.pos);
            buf[..n].copy_from_slice(&self.buffer[self.pos..self.pos + n]);
            self.pos += n;
            if self.pos == self.buffer.len() {
                self.buffer.clear();
                self.pos = 0;
            }
            return Ok(n);
        }
        self.inner.read(buf)
    }
}

/// Scan forward one byte at a time until `signature` has been consumed.
///
/// `window` holds bytes already taken from the reader that must be searched
/// first (for instance a capture pattern that failed to match). Returns
/// whether the signature was found and how many bytes were skipped before it.
pub fn skip_to_signature<R: Read>(
    reader: &mut R,
    window: &[u8],
    signature: &[u8],
) -> io::Result<(bool, u64)> {
    let mut recent: Vec<u8> = Vec::with_capacity(signature.len());
    let mut skipped = 0u64;
    let mut pending = window.iter().copied();
    let mut byte = [0u8; 1];

    loop {
        let next = match pending.next() {
            Some(b) => b,
            None => {
                if read_up_to(reader, &mut byte)? == 0 {
                    return Ok((false, skipped + recent.len() as u64));
                }
                byte[0]
            }
        };

        if recent.len() == signature.len() {
            recent.remove(0);
            skipped += 1;
        }
        recent.push(next);

        if recent.as_slice() == signature {
            return Ok((true, skipped));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_le_helpers() {
        let bytes = [0xAAu8, 0x78, 0x56, 0x34, 0x12, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(le_u32(&bytes, 1), 0x1234_5678);
        assert_eq!(le_i64(&[0xFF; 8], 0), -1);
    }

    #[test]
    fn test_read_up_to_short_input() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3]);
        let mut buffer = [0u8; 8];
        assert_eq!(read_up_to(&mut cursor, &mut buffer).unwrap(), 3);
        assert_eq!(&buffer[..3], &[1, 2, 3]);
        assert_eq!(read_up_to(&mut cursor, &mut buffer).unwrap(), 0);
    }

    #[test]
    fn test_skip_to_signature_in_reader() {
        let mut cursor = Cursor::new(b"garbageOggSrest".to_vec());
        let (found, skipped) = skip_to_signature(&mut cursor, &[], b"OggS").unwrap();
        assert!(found);
        assert_eq!(skipped, 7);
        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"rest");
    }

    #[test]
    fn test_skip_to_signature_spanning_window() {
        // Pattern starts inside the bytes the caller already consumed
        let mut cursor = Cursor::new(b"gSxx".to_vec());
        let (found, skipped) = skip_to_signature(&mut cursor, b"xOg", b"OggS").unwrap();
        assert!(found);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_pushback_reader_replays_before_source() {
        let mut reader = PushbackReader::new(Cursor::new(b"cdef".to_vec()));
        let mut two = [0u8; 2];
        read_up_to(&mut reader, &mut two).unwrap();
        assert_eq!(&two, b"cd");
        reader.unread(b"ab");
        reader.unread(b"_");

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"_abef");
    }

    #[test]
    fn test_skip_to_signature_not_found() {
        let mut cursor = Cursor::new(b"nothing here".to_vec());
        let (found, skipped) = skip_to_signature(&mut cursor, b"Og", b"OggS").unwrap();
        assert!(!found);
        assert_eq!(skipped, 14);
    }
}
