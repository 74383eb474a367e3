//! Length-checked cursor over an in-memory byte sequence.
//!
//! Every read either yields exactly the number of bytes requested
//! or fails with [`Error::Truncated`],
//! so that the parsing stages built on top of it
//! never have to check bounds themselves.
use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use snafu::{Backtrace, OptionExt, Snafu};

/// Error type for reads beyond the end of the byte source.
#[derive(Debug, Snafu)]
pub enum Error {
    /// The source ended before the requested number of bytes.
    #[snafu(display(
        "Unexpected end of data at byte {}: needed {} bytes, but only {} remain",
        position,
        requested,
        available
    ))]
    Truncated {
        position: usize,
        requested: usize,
        available: usize,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A forward-only reader over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct ByteSource<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteSource<'a> {
    /// Create a new byte source positioned at the first byte.
    pub fn new(data: &'a [u8]) -> Self {
        ByteSource { data, position: 0 }
    }

    /// The number of bytes consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// The number of bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Whether all bytes have been consumed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Look at the next `n` bytes without consuming them.
    pub fn peek_exact(&self, n: usize) -> Result<&'a [u8]> {
        let data = self.data;
        let position = self.position;
        let end = position.checked_add(n).filter(|end| *end <= data.len());
        end.map(|end| &data[position..end])
            .context(TruncatedSnafu {
                position,
                requested: n,
                available: data.len() - position,
            })
    }

    /// Read exactly `n` bytes, advancing the cursor.
    pub fn read_exact(&mut self, n: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_exact(n)?;
        self.position += n;
        Ok(bytes)
    }

    /// Consume all remaining bytes.
    pub fn read_to_end(&mut self) -> &'a [u8] {
        let rest = &self.data[self.position..];
        self.position = self.data.len();
        rest
    }

    /// Read an unsigned 16-bit integer in the given byte order.
    pub fn read_u16(&mut self, order: Endianness) -> Result<u16> {
        let bytes = self.read_exact(2)?;
        Ok(match order {
            Endianness::Little => LittleEndian::read_u16(bytes),
            Endianness::Big => BigEndian::read_u16(bytes),
        })
    }

    /// Read an unsigned 32-bit integer in the given byte order.
    pub fn read_u32(&mut self, order: Endianness) -> Result<u32> {
        let bytes = self.read_exact(4)?;
        Ok(match order {
            Endianness::Little => LittleEndian::read_u32(bytes),
            Endianness::Big => BigEndian::read_u32(bytes),
        })
    }

    /// Skip `n` bytes without decoding them.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_exact(n).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::{ByteSource, Error};
    use byteordered::Endianness;

    const DATA: &[u8] = &[0x28, 0x00, 0x10, 0x00, 0x00, 0x02, 0x00, 0x00];

    #[test]
    fn reads_advance_the_cursor() {
        let mut source = ByteSource::new(DATA);
        assert_eq!(source.remaining(), 8);

        assert_eq!(source.read_u16(Endianness::Little).unwrap(), 0x0028);
        assert_eq!(source.read_u16(Endianness::Little).unwrap(), 0x0010);
        assert_eq!(source.position(), 4);
        assert_eq!(source.read_u32(Endianness::Little).unwrap(), 0x0200);
        assert!(source.is_empty());
    }

    #[test]
    fn reads_in_big_endian() {
        let mut source = ByteSource::new(DATA);
        assert_eq!(source.read_u16(Endianness::Big).unwrap(), 0x2800);
        assert_eq!(source.read_u16(Endianness::Big).unwrap(), 0x1000);
        assert_eq!(source.read_u32(Endianness::Big).unwrap(), 0x0002_0000);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut source = ByteSource::new(DATA);
        source.skip(2).unwrap();
        assert_eq!(source.peek_exact(2).unwrap(), &[0x10, 0x00]);
        assert_eq!(source.position(), 2);
        assert_eq!(source.read_exact(2).unwrap(), &[0x10, 0x00]);
        assert_eq!(source.position(), 4);
    }

    #[test]
    fn read_to_end_consumes_the_rest() {
        let mut source = ByteSource::new(DATA);
        source.skip(6).unwrap();
        assert_eq!(source.read_to_end(), &[0x00, 0x00]);
        assert!(source.is_empty());
        assert_eq!(source.position(), 8);
        assert_eq!(source.read_to_end(), &[] as &[u8]);
    }

    #[test]
    fn truncated_reads_fail_without_consuming() {
        let mut source = ByteSource::new(&DATA[..3]);
        source.skip(2).unwrap();

        match source.read_u16(Endianness::Little) {
            Err(Error::Truncated {
                position,
                requested,
                available,
                ..
            }) => {
                assert_eq!(position, 2);
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(source.position(), 2);
        assert!(source.read_u32(Endianness::Little).is_err());
        assert!(source.skip(usize::MAX).is_err());
        assert_eq!(source.read_exact(1).unwrap(), &[0x10]);
    }
}
