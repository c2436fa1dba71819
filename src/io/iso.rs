//! Plain ISO container: an identity mapping onto a host file. Grounded in
//! `original_source/lib/DiscIOISO.cpp`, which is a thin wrapper around
//! `fopen`/`fread`/`fwrite` with no sector remapping.

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
};

/// A disc image stored byte-for-byte in a single host file.
pub struct IsoContainer {
    file: File,
}

impl IsoContainer {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(IsoContainer { file: File::open(path)? })
    }

    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(IsoContainer {
            file: File::options().create(true).truncate(true).read(true).write(true).open(path)?,
        })
    }
}

impl Read for IsoContainer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for IsoContainer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for IsoContainer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}
