//! Byte cursor and callback-driven box reader.

use std::collections::HashMap;

use tracing::trace;

use super::{Atom, AtomType};
use crate::{Error, Result};

/// Big-endian cursor over a byte slice.
///
/// Every read is bounds-checked and fails with
/// [`Error::BufferReadOutOfBounds`] instead of panicking.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn has_more(&self) -> bool {
        self.pos < self.data.len()
    }

    /// Take the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::out_of_bounds(len, self.remaining()));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Look at the next byte without consuming it.
    pub fn peek_u8(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| Error::out_of_bounds(1, 0))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }
}

/// A box handed to a registered callback.
#[derive(Debug)]
pub struct ParsedBox<'a> {
    /// Header of the box.
    pub header: Atom,
    /// Cursor over the payload, positioned after the (full) box header.
    pub reader: ByteReader<'a>,
    stop: bool,
}

impl ParsedBox<'_> {
    /// Stop parsing once this callback returns.
    pub fn stop(&mut self) {
        self.stop = true;
    }
}

type BoxCallback<'h> = Box<dyn FnMut(&mut ParsedBox<'_>) -> Result<()> + 'h>;

/// Box reader dispatching full boxes to per-type callbacks.
///
/// Only top-level boxes are visited. Boxes without a registered callback are
/// skipped by size.
#[derive(Default)]
pub struct BoxReader<'h> {
    handlers: HashMap<AtomType, BoxCallback<'h>>,
}

impl<'h> BoxReader<'h> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a callback for a full box; version and flags are read first.
    pub fn on_full_box<F>(mut self, atom_type: AtomType, callback: F) -> Self
    where
        F: FnMut(&mut ParsedBox<'_>) -> Result<()> + 'h,
    {
        self.handlers.insert(atom_type, Box::new(callback));
        self
    }

    /// Parse `data`, invoking callbacks in file order until one stops.
    pub fn parse(&mut self, data: &[u8]) -> Result<()> {
        let mut reader = ByteReader::new(data);

        while reader.remaining() >= 8 {
            let start = reader.position();
            let size32 = reader.read_u32()?;
            let atom_type = AtomType::from_bytes(reader.read_array::<4>()?);

            let (size, header_size) = match size32 {
                1 => (reader.read_u64()?, 16u8),
                0 => ((data.len() - start) as u64, 8u8),
                n => (n as u64, 8u8),
            };

            if size < header_size as u64 {
                trace!("Box {} declares size {} smaller than its header", atom_type, size);
                break;
            }

            let end = usize::try_from(size)
                .map(|size| start.saturating_add(size))
                .unwrap_or(usize::MAX)
                .min(data.len());
            let payload_start = start + header_size as usize;
            if payload_start > end {
                return Err(Error::out_of_bounds(payload_start, end));
            }

            if let Some(callback) = self.handlers.get_mut(&atom_type) {
                let mut payload = ByteReader::new(&data[payload_start..end]);
                let word = payload.read_u32()?;

                let mut parsed = ParsedBox {
                    header: Atom {
                        atom_type,
                        start: start as u64,
                        size,
                        header_size: header_size + 4,
                        version: Some((word >> 24) as u8),
                        flags: Some(word & 0x00FF_FFFF),
                    },
                    reader: payload,
                    stop: false,
                };
                callback(&mut parsed)?;
                if parsed.stop {
                    return Ok(());
                }
            } else {
                trace!("Skipping {} box of {} bytes", atom_type, size);
            }

            reader.skip(end - reader.position())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_byte_reader_big_endian() {
        let data = [0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0xff];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u16().unwrap(), 1);
        assert_eq!(reader.read_u32().unwrap(), 2);
        assert_eq!(reader.read_u8().unwrap(), 0xff);
        assert!(!reader.has_more());
    }

    #[test]
    fn test_byte_reader_out_of_bounds() {
        let mut reader = ByteReader::new(&[0x00, 0x01]);
        let err = reader.read_u32().unwrap_err();
        assert!(matches!(err, Error::BufferReadOutOfBounds { need: 4, have: 2 }));
    }

    #[test]
    fn test_skips_unregistered_boxes() {
        let mut data = plain_box(b"free", &[0; 4]);
        data.extend(plain_box(b"sidx", &[0, 0, 0, 0, 1, 2, 3]));

        let mut seen = Vec::new();
        BoxReader::new()
            .on_full_box(AtomType::SIDX, |parsed| {
                seen.push((parsed.header.start, parsed.reader.remaining()));
                Ok(())
            })
            .parse(&data)
            .unwrap();
        assert_eq!(seen, vec![(12, 3)]);
    }

    #[test]
    fn test_full_box_header() {
        let data = plain_box(b"sidx", &[1, 0, 0, 7, 0xaa]);
        let mut header = None;
        BoxReader::new()
            .on_full_box(AtomType::SIDX, |parsed| {
                header = Some(parsed.header);
                assert_eq!(parsed.reader.read_u8()?, 0xaa);
                Ok(())
            })
            .parse(&data)
            .unwrap();
        let header = header.unwrap();
        assert_eq!(header.version, Some(1));
        assert_eq!(header.flags, Some(7));
        assert_eq!(header.header_size, 12);
    }

    #[test]
    fn test_oversized_box_is_clamped() {
        let mut data = 0xFFFF_FFF0u32.to_be_bytes().to_vec();
        data.extend_from_slice(b"sidx");
        data.extend_from_slice(&[0, 0, 0, 0, 5]);

        let mut remaining = None;
        BoxReader::new()
            .on_full_box(AtomType::SIDX, |parsed| {
                remaining = Some(parsed.reader.remaining());
                Ok(())
            })
            .parse(&data)
            .unwrap();
        assert_eq!(remaining, Some(1));
    }

    #[test]
    fn test_stop() {
        let mut data = plain_box(b"sidx", &[0; 4]);
        data.extend(plain_box(b"sidx", &[0; 4]));
        let mut count = 0;
        BoxReader::new()
            .on_full_box(AtomType::SIDX, |parsed| {
                count += 1;
                parsed.stop();
                Ok(())
            })
            .parse(&data)
            .unwrap();
        assert_eq!(count, 1);
    }
}
