//! Container backends a disc image can be stored in. Kept as a tagged enum
//! rather than a `dyn Read + Seek` trait object: there are exactly three
//! container kinds, each with different capabilities (NFS and WBFS are
//! read-only sources; only ISO is ever a build target), and matching on a
//! concrete variant lets the compiler check that a builder never tries to
//! write through a read-only container.

pub mod host;
pub mod iso;
pub mod nfs;
pub mod wbfs;

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::Path,
};

pub use host::HostFile;
pub use iso::IsoContainer;
pub use nfs::NfsContainer;
pub use wbfs::WbfsContainer;

use crate::error::Error;

/// A read-only source container, chosen by sniffing the path/magic. This is
/// what [`crate::disc::Disc::open`] hands back before any GCN/Wii-specific
/// parsing happens.
pub enum SourceContainer {
    Iso(IsoContainer),
    Wbfs(WbfsContainer<File>),
    Nfs(NfsContainer),
}

impl SourceContainer {
    /// Opens `path`, detecting WBFS by its `WBFS` magic and NFS by its
    /// `hif_NNNNNN.nfs` naming convention; anything else is treated as a
    /// plain ISO.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if file_name.starts_with("hif_") && file_name.ends_with(".nfs") {
            return Ok(SourceContainer::Nfs(NfsContainer::open(path)?));
        }
        let mut magic = [0u8; 4];
        let opened = File::open(path).map_err(|source| Error::HostIo { path: path.to_path_buf(), source })?;
        let mut probe = opened.try_clone().map_err(|source| Error::HostIo { path: path.to_path_buf(), source })?;
        if probe.read_exact(&mut magic).is_ok() && &magic == b"WBFS" {
            return Ok(SourceContainer::Wbfs(WbfsContainer::open(opened)?));
        }
        Ok(SourceContainer::Iso(IsoContainer::open(path)?))
    }
}

impl Read for SourceContainer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            SourceContainer::Iso(c) => c.read(buf),
            SourceContainer::Wbfs(c) => c.read(buf),
            SourceContainer::Nfs(c) => c.read(buf),
        }
    }
}

impl Seek for SourceContainer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            SourceContainer::Iso(c) => c.seek(pos),
            SourceContainer::Wbfs(c) => c.seek(pos),
            SourceContainer::Nfs(c) => c.seek(pos),
        }
    }
}
