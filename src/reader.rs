//! Outer Wii disc reader: parses the disc-wide partition table and header,
//! and hands out a [`PartitionReader`] for any partition a caller names.
//! Per-partition ticket/TMD/cert/crypto access lives one layer down in
//! `partition_rw.rs`; this module only knows about the outer table.

use std::io::{Read, Seek, SeekFrom};

use binrw::BinReaderExt;

use crate::{
    partition_rw::PartitionReader,
    structs::{read_parts, DiscHeader, WiiPartTableEntry, WiiPartType},
};

pub struct WiiIsoReader<RS: Read + Seek> {
    pub file: RS,
    // TODO: proper structs
    header: DiscHeader,
    region: [u8; 32],
    partitions: Vec<WiiPartTableEntry>,
}

impl<RS: Read + Seek> WiiIsoReader<RS> {
    pub fn create(mut rs: RS) -> binrw::BinResult<Self> {
        rs.seek(SeekFrom::Start(0))?;
        let header: DiscHeader = rs.read_be()?;
        let partitions = read_parts(&mut rs)?;
        let mut region = [0u8; 32];
        rs.seek(SeekFrom::Start(0x4E000))?;
        rs.read_exact(&mut region)?;
        Ok(WiiIsoReader {
            file: rs,
            header,
            region,
            partitions,
        })
    }

    pub fn partitions(&self) -> &Vec<WiiPartTableEntry> {
        &self.partitions
    }

    pub fn get_header(&self) -> &DiscHeader {
        &self.header
    }

    pub fn get_region(&self) -> &[u8; 32] {
        &self.region
    }

    /// Looks up `part_type` in the outer partition table and opens it,
    /// decrypting its title key and parsing its [`WiiPartitionHeader`].
    pub fn open_partition_stream<'a>(
        &'a mut self,
        part_type: &WiiPartType,
    ) -> Result<PartitionReader<'a, RS>, crate::error::Error> {
        let partition = self
            .partitions
            .iter()
            .find(|p| p.part_type == *part_type)
            .cloned()
            .ok_or_else(|| crate::error::Error::invalid_format(format!("no {part_type:?} partition present")))?;
        Ok(PartitionReader::open_partition(self, *partition.part_data_off)?)
    }
}
