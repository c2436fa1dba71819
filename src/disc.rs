//! Disc opener and dispatcher: sniffs a host path's container kind and disc
//! kind, then hands back a uniform [`Disc`] over the resulting reader.
//! Grounded in `original_source/lib/DiscBase.cpp`'s `NewDiscBase`, which
//! reads the two magics at fixed offsets before picking a `PartitionGCN` or
//! `PartitionWii` implementation.

use std::{
    io::{Read, Seek, SeekFrom},
    path::Path,
};

use crate::{
    error::Error,
    gcn::GcnDiscReader,
    io::SourceContainer,
    reader::WiiIsoReader,
    structs::{DiscHeader, WiiPartType},
    GROUP_SIZE,
};

/// Read-time knobs, the counterpart to [`crate::builder`]'s `BuildOptions`.
#[derive(Clone, Copy, Debug)]
pub struct OpenOptions {
    /// Re-reads and hash-verifies every group of the Wii Data partition at
    /// open time (`decrypt_verify_group` in `reader_writer.rs`), instead of
    /// trusting sectors lazily as they're read. Ignored for GCN discs, which
    /// carry no hash tree.
    pub validate_hashes: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions { validate_hashes: false }
    }
}

/// An opened disc image, GameCube or Wii, over any [`SourceContainer`].
pub enum Disc {
    Gcn(GcnDiscReader<SourceContainer>),
    Wii(WiiIsoReader<SourceContainer>),
}

impl Disc {
    /// Opens `path` with default options (no eager hash validation).
    pub fn open(path: &Path) -> Result<Self, Error> {
        Self::open_with(path, OpenOptions::default())
    }

    /// Opens `path`, sniffing WBFS/NFS/ISO container and GCN/Wii disc kind.
    ///
    /// Per spec: read the u32 at 0x18 (Wii magic) and 0x1C (GCN magic) of the
    /// logical disc stream; a WBFS or NFS container only ever wraps a Wii
    /// disc, but since both still expose the real disc bytes at those
    /// offsets through their `Read`/`Seek` impls, no special-casing by
    /// container kind is needed here.
    pub fn open_with(path: &Path, options: OpenOptions) -> Result<Self, Error> {
        let mut container = SourceContainer::open(path)?;
        container.seek(SeekFrom::Start(0x18))?;
        let mut magics = [0u8; 8];
        container.read_exact(&mut magics)?;
        let wii_magic = u32::from_be_bytes(magics[0..4].try_into().unwrap());
        let gcn_magic = u32::from_be_bytes(magics[4..8].try_into().unwrap());
        container.seek(SeekFrom::Start(0))?;

        if wii_magic == DiscHeader::WII_MAGIC {
            let mut reader = WiiIsoReader::create(container)?;
            if options.validate_hashes {
                validate_wii_hashes(&mut reader)?;
            }
            Ok(Disc::Wii(reader))
        } else if gcn_magic == DiscHeader::GCN_MAGIC {
            Ok(Disc::Gcn(GcnDiscReader::create(container)?))
        } else {
            Err(Error::invalid_format(format!(
                "unrecognised disc magic (wii={wii_magic:#010x}, gcn={gcn_magic:#010x})"
            )))
        }
    }

    pub fn header(&self) -> &DiscHeader {
        match self {
            Disc::Gcn(reader) => reader.get_header(),
            Disc::Wii(reader) => reader.get_header(),
        }
    }

    /// Shorthand for locating the Wii Data partition; returns `None` for GCN discs.
    pub fn is_wii(&self) -> bool {
        matches!(self, Disc::Wii(_))
    }
}

fn validate_wii_hashes<RS: Read + Seek>(reader: &mut WiiIsoReader<RS>) -> Result<(), Error> {
    let mut part = reader.open_partition_stream(&WiiPartType::Data)?;
    let h3 = part.read_h3()?;
    let h3_table: [u8; 0x18000] = h3
        .as_slice()
        .try_into()
        .map_err(|_| Error::invalid_format("h3 table has unexpected size"))?;
    // `data_size` is the on-disc (encrypted) size, `groupCount*0x200000`.
    let data_size = *part.get_partition_header().data_size;
    let groups = (data_size + GROUP_SIZE - 1) / GROUP_SIZE;
    let mut stream = part.open_encryption_reader();
    for group in 0..groups {
        stream.verify_group(group, &h3_table)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn rejects_bad_magic() {
        let mut container = vec![0u8; 0x100];
        container[0x18..0x1C].copy_from_slice(&0u32.to_be_bytes());
        container[0x1C..0x20].copy_from_slice(&0u32.to_be_bytes());
        let mut cur = Cursor::new(container);
        cur.seek(SeekFrom::Start(0x18)).unwrap();
        let mut magics = [0u8; 8];
        cur.read_exact(&mut magics).unwrap();
        let wii_magic = u32::from_be_bytes(magics[0..4].try_into().unwrap());
        let gcn_magic = u32::from_be_bytes(magics[4..8].try_into().unwrap());
        assert_ne!(wii_magic, DiscHeader::WII_MAGIC);
        assert_ne!(gcn_magic, DiscHeader::GCN_MAGIC);
    }
}
