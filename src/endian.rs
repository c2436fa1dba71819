//! Big-endian primitives for the handful of places that fall outside a
//! `binrw`-derived struct: WBFS/NFS lookup tables and hash-tree offset math.
//!
//! Styled after `ReadEx`/`WriteEx` extension traits (blanket impl over any
//! `Read`/`Write`), but built on `to_be_bytes`/`from_be_bytes` directly since
//! nothing else in this crate's dependency stack pulls in `byteorder`.

use std::io::{self, Read, Write};

/// Extension trait for reading big-endian integers directly off a stream.
pub trait ReadBe: Read {
    fn read_u16_be(&mut self) -> io::Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn read_u32_be(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn read_u64_be(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    fn read_i32_be(&mut self) -> io::Result<i32> {
        Ok(self.read_u32_be()? as i32)
    }
}

impl<T: ?Sized + Read> ReadBe for T {}

/// Extension trait for writing big-endian integers directly to a stream.
pub trait WriteBe: Write {
    fn write_u16_be(&mut self, value: u16) -> io::Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    fn write_u32_be(&mut self, value: u32) -> io::Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    fn write_u64_be(&mut self, value: u64) -> io::Result<()> {
        self.write_all(&value.to_be_bytes())
    }
}

impl<T: ?Sized + Write> WriteBe for T {}

/// Rounds `value` up to the next multiple of `align` (`align` must be a power of two).
pub fn align_next(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (value + (align - 1)) & !(align - 1)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_be() {
        let mut buf = Cursor::new(Vec::new());
        buf.write_u16_be(0x1234).unwrap();
        buf.write_u32_be(0xDEAD_BEEF).unwrap();
        buf.write_u64_be(0x0102_0304_0506_0708).unwrap();

        let mut cur = Cursor::new(buf.into_inner());
        assert_eq!(cur.read_u16_be().unwrap(), 0x1234);
        assert_eq!(cur.read_u32_be().unwrap(), 0xDEAD_BEEF);
        assert_eq!(cur.read_u64_be().unwrap(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn align_next_rounds_up() {
        assert_eq!(align_next(0, 0x20), 0);
        assert_eq!(align_next(1, 0x20), 0x20);
        assert_eq!(align_next(0x20, 0x20), 0x20);
        assert_eq!(align_next(0x21, 0x20), 0x40);
    }
}
