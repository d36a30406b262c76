//! Bounds-checked buffer access
//!
//! Every field extraction in this crate goes through these helpers: a read
//! which would run past the end of the input fails with an
//! [`std::io::ErrorKind::UnexpectedEof`] error instead of yielding garbage

use std::io::{self, Read};

/// Returns the region of `buf` starting at `offset`
///
/// Fails when `offset` lies past the end of the buffer
pub fn slice_at(buf: &[u8], offset: u64) -> Result<&[u8], io::Error> {
    usize::try_from(offset)
        .ok()
        .filter(|o| *o <= buf.len())
        .map(|o| &buf[o..])
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Offset {offset} lies past the end of the input ({} bytes)",
                    buf.len()
                ),
            )
        })
}

/// Single byte `u8` reader
#[inline]
pub fn rdu8<R: Read>(r: &mut R) -> Result<u8, io::Error> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Little endian `u16` reader
#[inline]
pub fn rdu16le<R: Read>(r: &mut R) -> Result<u16, io::Error> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

/// Little endian `i16` reader
#[inline]
pub fn rdi16le<R: Read>(r: &mut R) -> Result<i16, io::Error> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(i16::from_le_bytes(buf))
}

/// Little endian `u32` reader
#[inline]
pub fn rdu32le<R: Read>(r: &mut R) -> Result<u32, io::Error> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Little endian `u64` reader
#[inline]
pub fn rdu64le<R: Read>(r: &mut R) -> Result<u64, io::Error> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn le_readers() {
        let data = [0x01u8, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let r = &mut data.as_slice();
        assert_eq!(rdu16le(r).unwrap(), 0x0201);
        assert_eq!(rdu32le(r).unwrap(), 0x06050403);
        assert!(rdu32le(r).is_err());
    }

    #[test]
    fn slice_bounds() {
        let data = [0u8; 8];
        assert_eq!(slice_at(&data, 0).unwrap().len(), 8);
        assert_eq!(slice_at(&data, 8).unwrap().len(), 0);
        assert!(slice_at(&data, 9).is_err());
        assert!(slice_at(&data, u64::MAX).is_err());
    }
}
