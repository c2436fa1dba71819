//! A bounded view into an underlying stream, used to keep partition writers
//! (and GameCube's single unencrypted "partition") from ever touching bytes
//! outside the region they own.

use std::io::{self, Read, Seek, SeekFrom, Write};

pub struct IOWindow<'a, S> {
    inner: &'a mut S,
    base: u64,
    position: u64,
}

impl<'a, S: Seek> IOWindow<'a, S> {
    /// Opens a window starting at `base` in `inner`, seeking `inner` there immediately.
    pub fn new(inner: &'a mut S, base: u64) -> io::Result<Self> {
        inner.seek(SeekFrom::Start(base))?;
        Ok(IOWindow { inner, base, position: 0 })
    }

    pub fn base(&self) -> u64 {
        self.base
    }
}

impl<'a, S: Read + Seek> Read for IOWindow<'a, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.seek(SeekFrom::Start(self.base + self.position))?;
        let read = self.inner.read(buf)?;
        self.position += read as u64;
        Ok(read)
    }
}

impl<'a, S: Write + Seek> Write for IOWindow<'a, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.seek(SeekFrom::Start(self.base + self.position))?;
        let written = self.inner.write(buf)?;
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<'a, S: Seek> Seek for IOWindow<'a, S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(off) => off as i64,
            SeekFrom::Current(off) => self.position as i64 + off,
            SeekFrom::End(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "seek from end is not supported on a bounded window",
                ))
            }
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative position",
            ));
        }
        self.position = new_pos as u64;
        Ok(self.position)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_and_writes_relative_to_base() {
        let mut backing = vec![0u8; 0x100];
        let mut cursor = Cursor::new(&mut backing);
        {
            let mut window = IOWindow::new(&mut cursor, 0x40).unwrap();
            window.write_all(&[1, 2, 3, 4]).unwrap();
            window.seek(SeekFrom::Start(0)).unwrap();
            let mut buf = [0u8; 4];
            window.read_exact(&mut buf).unwrap();
            assert_eq!(buf, [1, 2, 3, 4]);
        }
        assert_eq!(&backing[0x40..0x44], &[1, 2, 3, 4]);
        assert_eq!(backing[0x3F], 0);
    }
}
