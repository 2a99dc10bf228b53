//! Minimal EBML element parser.
//!
//! Element IDs keep their length-marker bits (so `0x1A45DFA3` is the EBML
//! header), sizes have the marker removed, and an all-ones size means the
//! element runs to the end of the enclosing data.

use crate::mp4::ByteReader;
use crate::{Error, Result};

/// A parsed element: its ID and a view of its payload.
#[derive(Debug, Clone, Copy)]
pub struct EbmlElement<'a> {
    pub id: u32,
    data: &'a [u8],
    offset: u64,
}

impl<'a> EbmlElement<'a> {
    /// Offset of the payload from the start of the top-level parser's data.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Parser over the element's children.
    pub fn children(&self) -> EbmlParser<'a> {
        EbmlParser::with_base(self.data, self.offset)
    }

    /// Interpret the payload as a big-endian unsigned integer.
    pub fn as_uint(&self) -> Result<u64> {
        if self.data.len() > 8 {
            return Err(Error::EbmlOverflow {
                size: self.data.len(),
            });
        }
        Ok(self
            .data
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | *byte as u64))
    }

    /// Interpret the payload as a 4- or 8-byte IEEE float.
    pub fn as_float(&self) -> Result<f64> {
        match self.data.len() {
            4 => {
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(self.data);
                Ok(f32::from_be_bytes(bytes) as f64)
            }
            8 => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(self.data);
                Ok(f64::from_be_bytes(bytes))
            }
            size => Err(Error::EbmlBadFloatingPointSize { size }),
        }
    }
}

/// Sequential reader of sibling EBML elements.
#[derive(Debug, Clone)]
pub struct EbmlParser<'a> {
    reader: ByteReader<'a>,
    base: u64,
}

impl<'a> EbmlParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    fn with_base(data: &'a [u8], base: u64) -> Self {
        Self {
            reader: ByteReader::new(data),
            base,
        }
    }

    pub fn has_more_data(&self) -> bool {
        self.reader.has_more()
    }

    /// Parse the next element.
    pub fn parse_element(&mut self) -> Result<EbmlElement<'a>> {
        let id = self.read_id()?;
        let size = match self.read_size()? {
            Some(size) => usize::try_from(size).map_err(|_| Error::EbmlOverflow { size: 8 })?,
            None => self.reader.remaining(),
        };

        let offset = self.base + self.reader.position() as u64;
        let data = self.reader.read_bytes(size)?;
        Ok(EbmlElement { id, data, offset })
    }

    fn read_vint(&mut self) -> Result<&'a [u8]> {
        let first = self.reader.peek_u8()?;
        let width = first.leading_zeros() as usize + 1;
        if width > 8 {
            return Err(Error::EbmlOverflow { size: width });
        }
        self.reader.read_bytes(width)
    }

    fn read_id(&mut self) -> Result<u32> {
        let bytes = self.read_vint()?;
        if bytes.len() > 4 {
            return Err(Error::EbmlOverflow { size: bytes.len() });
        }
        Ok(bytes.iter().fold(0u32, |acc, byte| (acc << 8) | *byte as u32))
    }

    /// `None` for the reserved unknown-size value.
    fn read_size(&mut self) -> Result<Option<u64>> {
        let bytes = self.read_vint()?;
        let width = bytes.len();
        let mask = (0xFFu16 >> width) as u8;
        let value = bytes[1..]
            .iter()
            .fold((bytes[0] & mask) as u64, |acc, byte| (acc << 8) | *byte as u64);

        let all_ones = (1u64 << (7 * width)) - 1;
        if value == all_ones {
            Ok(None)
        } else {
            Ok(Some(value))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encode an element with a minimal-width size.
    pub(crate) fn element(id: u32, payload: &[u8]) -> Vec<u8> {
        let id_bytes = id.to_be_bytes();
        let skip = id_bytes.iter().take_while(|b| **b == 0).count();
        let mut out = id_bytes[skip..].to_vec();
        if payload.len() < 0x7F {
            out.push(0x80 | payload.len() as u8);
        } else {
            out.push(0x01);
            out.extend_from_slice(&(payload.len() as u64).to_be_bytes()[1..]);
        }
        out.extend_from_slice(payload);
        out
    }

    pub(crate) fn uint_element(id: u32, value: u64) -> Vec<u8> {
        let bytes = value.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
        element(id, &bytes[skip..])
    }

    #[test]
    fn test_parse_uint_element() {
        let data = uint_element(0x2AD7B1, 1_000_000);
        let mut parser = EbmlParser::new(&data);
        let elem = parser.parse_element().unwrap();
        assert_eq!(elem.id, 0x2AD7B1);
        assert_eq!(elem.as_uint().unwrap(), 1_000_000);
        assert_eq!(elem.offset(), 4);
        assert!(!parser.has_more_data());
    }

    #[test]
    fn test_parse_float_element() {
        let data = element(0x4489, &2500.0f64.to_be_bytes());
        let elem = EbmlParser::new(&data).parse_element().unwrap();
        assert_eq!(elem.as_float().unwrap(), 2500.0);

        let data = element(0x4489, &1.5f32.to_be_bytes());
        let elem = EbmlParser::new(&data).parse_element().unwrap();
        assert_eq!(elem.as_float().unwrap(), 1.5);
    }

    #[test]
    fn test_bad_float_size() {
        let data = element(0x4489, &[0, 0, 0]);
        let elem = EbmlParser::new(&data).parse_element().unwrap();
        assert!(matches!(
            elem.as_float(),
            Err(Error::EbmlBadFloatingPointSize { size: 3 })
        ));
    }

    #[test]
    fn test_uint_overflow() {
        let data = element(0xB3, &[1; 9]);
        let elem = EbmlParser::new(&data).parse_element().unwrap();
        assert!(matches!(elem.as_uint(), Err(Error::EbmlOverflow { size: 9 })));
    }

    #[test]
    fn test_unknown_size_runs_to_end() {
        let mut data = vec![0x18, 0x53, 0x80, 0x67, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        data.extend_from_slice(&[1, 2, 3]);
        let elem = EbmlParser::new(&data).parse_element().unwrap();
        assert_eq!(elem.id, 0x18538067);
        assert_eq!(elem.data(), &[1, 2, 3]);
    }

    #[test]
    fn test_zero_leading_byte_overflows() {
        let data = [0x00, 0x81, 0x00];
        assert!(matches!(
            EbmlParser::new(&data).parse_element(),
            Err(Error::EbmlOverflow { .. })
        ));
    }

    #[test]
    fn test_children_offsets_are_absolute() {
        let child = uint_element(0xF1, 7);
        let mut data = element(0xBF, &[0xAA]);
        data.extend(element(0xB7, &child));

        let mut parser = EbmlParser::new(&data);
        parser.parse_element().unwrap();
        let outer = parser.parse_element().unwrap();
        let inner = outer.children().parse_element().unwrap();
        assert_eq!(inner.offset(), outer.offset() + 2);
        assert_eq!(inner.as_uint().unwrap(), 7);
    }
}
