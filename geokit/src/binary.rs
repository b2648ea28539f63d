//! Endian-aware readers and writers of binary primitives.
//!
//! Both binary formats of the crate mix byte orders: Shapefile headers are big-endian while geometry records are
//! little-endian, and every WKB geometry declares its own byte order with a leading flag.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::GeoKitError;

/// Order of bytes of multi-byte values.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Big endian, also known as XDR.
    BigEndian,
    /// Little endian, also known as NDR.
    LittleEndian,
}

impl ByteOrder {
    /// Byte order from the WKB byte order flag (`0` for XDR, `1` for NDR).
    pub fn from_flag(flag: u8) -> Result<Self, GeoKitError> {
        match flag {
            0 => Ok(Self::BigEndian),
            1 => Ok(Self::LittleEndian),
            v => Err(GeoKitError::Format(format!("invalid byte order flag {v}"))),
        }
    }

    /// WKB byte order flag.
    pub fn flag(&self) -> u8 {
        match self {
            Self::BigEndian => 0,
            Self::LittleEndian => 1,
        }
    }
}

macro_rules! read_value {
    ($name:ident, $ty:ty, $be:ident, $le:ident) => {
        #[doc = concat!("Reads `", stringify!($ty), "` value with the given byte order.")]
        pub fn $name(&mut self, order: ByteOrder) -> Result<$ty, GeoKitError> {
            self.ensure(std::mem::size_of::<$ty>())?;
            self.position += std::mem::size_of::<$ty>();
            Ok(match order {
                ByteOrder::BigEndian => self.buf.$be(),
                ByteOrder::LittleEndian => self.buf.$le(),
            })
        }
    };
}

/// Reads binary primitives from a buffer, failing instead of panicking when the buffer is exhausted.
#[derive(Debug)]
pub struct BinaryReader<B> {
    buf: B,
    position: usize,
}

impl<B: Buf> BinaryReader<B> {
    /// Creates a reader.
    pub fn new(buf: B) -> Self {
        Self { buf, position: 0 }
    }

    /// Number of bytes read so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of bytes left in the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Returns true if there are no bytes left.
    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    fn ensure(&self, count: usize) -> Result<(), GeoKitError> {
        if self.buf.remaining() < count {
            return Err(GeoKitError::Format(format!(
                "unexpected end of data at byte {}: {count} more bytes expected, {} available",
                self.position,
                self.buf.remaining()
            )));
        }

        Ok(())
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> Result<u8, GeoKitError> {
        self.ensure(1)?;
        self.position += 1;
        Ok(self.buf.get_u8())
    }

    read_value!(read_i16, i16, get_i16, get_i16_le);
    read_value!(read_u16, u16, get_u16, get_u16_le);
    read_value!(read_i32, i32, get_i32, get_i32_le);
    read_value!(read_u32, u32, get_u32, get_u32_le);
    read_value!(read_i64, i64, get_i64, get_i64_le);
    read_value!(read_f64, f64, get_f64, get_f64_le);

    /// Reads `count` bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<Bytes, GeoKitError> {
        self.ensure(count)?;
        self.position += count;
        Ok(self.buf.copy_to_bytes(count))
    }

    /// Skips `count` bytes.
    pub fn skip(&mut self, count: usize) -> Result<(), GeoKitError> {
        self.ensure(count)?;
        self.position += count;
        self.buf.advance(count);
        Ok(())
    }
}

macro_rules! write_value {
    ($name:ident, $ty:ty, $be:ident, $le:ident) => {
        #[doc = concat!("Writes `", stringify!($ty), "` value with the given byte order.")]
        pub fn $name(&mut self, value: $ty, order: ByteOrder) {
            match order {
                ByteOrder::BigEndian => self.buf.$be(value),
                ByteOrder::LittleEndian => self.buf.$le(value),
            }
        }
    };
}

/// Writes binary primitives into a growing buffer.
#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: BytesMut,
}

impl BinaryWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing was written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    write_value!(write_i16, i16, put_i16, put_i16_le);
    write_value!(write_i32, i32, put_i32, put_i32_le);
    write_value!(write_u32, u32, put_u32, put_u32_le);
    write_value!(write_i64, i64, put_i64, put_i64_le);
    write_value!(write_f64, f64, put_f64, put_f64_le);

    /// Writes raw bytes.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.buf.put_slice(value);
    }

    /// Returns written bytes.
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn mixed_byte_order() {
        let mut writer = BinaryWriter::new();
        writer.write_i32(9994, ByteOrder::BigEndian);
        writer.write_i32(5, ByteOrder::LittleEndian);
        writer.write_f64(-12.5, ByteOrder::LittleEndian);
        writer.write_f64(3.25, ByteOrder::BigEndian);

        let bytes = writer.into_bytes();
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x27, 0x0A]);
        assert_eq!(&bytes[4..8], &[0x05, 0x00, 0x00, 0x00]);

        let mut reader = BinaryReader::new(bytes);
        assert_eq!(reader.read_i32(ByteOrder::BigEndian).unwrap(), 9994);
        assert_eq!(reader.read_i32(ByteOrder::LittleEndian).unwrap(), 5);
        assert_eq!(reader.read_f64(ByteOrder::LittleEndian).unwrap(), -12.5);
        assert_eq!(reader.read_f64(ByteOrder::BigEndian).unwrap(), 3.25);
        assert_eq!(reader.position(), 24);
        assert!(reader.is_empty());
    }

    #[test]
    fn exhausted_buffer() {
        let mut reader = BinaryReader::new(&[1u8, 2, 3][..]);
        assert_matches!(reader.read_i32(ByteOrder::LittleEndian), Err(GeoKitError::Format(_)));
        assert_eq!(reader.read_u8().unwrap(), 1);
        assert_eq!(reader.remaining(), 2);
    }

    #[test]
    fn byte_order_flags() {
        assert_eq!(ByteOrder::from_flag(0).unwrap(), ByteOrder::BigEndian);
        assert_eq!(ByteOrder::from_flag(1).unwrap(), ByteOrder::LittleEndian);
        assert!(ByteOrder::from_flag(2).is_err());
        assert_eq!(ByteOrder::LittleEndian.flag(), 1);
    }
}
