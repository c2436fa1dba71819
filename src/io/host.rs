//! Host file adapter used as the write side of every builder: plain
//! `std::fs::File` I/O, with an optional capacity cap so a GameCube or
//! Wii builder can catch an overflowing layout before it silently grows a
//! file past the real disc's size.

use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
};

use crate::error::Error;

pub struct HostFile {
    file: File,
    capacity: Option<u64>,
}

impl HostFile {
    pub fn create(path: &Path, capacity: Option<u64>) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| Error::HostIo { path: path.to_path_buf(), source })?;
        Ok(HostFile { file, capacity })
    }

    pub fn open_existing(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| Error::HostIo { path: path.to_path_buf(), source })?;
        Ok(HostFile { file, capacity: None })
    }
}

impl Read for HostFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for HostFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(capacity) = self.capacity {
            let pos = self.file.stream_position()?;
            if pos + buf.len() as u64 > capacity {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("write would exceed disc capacity of {capacity:#x} bytes"),
                ));
            }
        }
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for HostFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}
