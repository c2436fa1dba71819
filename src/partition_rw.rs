//! Ticket/TMD/certificate access and encrypted-stream opening for a single
//! Wii partition, sitting above [`crate::reader::WiiIsoReader`]'s raw block
//! access.

use std::io::{Read, Seek, SeekFrom};

use binrw::BinReaderExt;

use crate::{
    common_key,
    reader::WiiIsoReader,
    reader_writer::WiiEncryptedReadWriteStream,
    structs::{Certificate, Ticket, WiiPartitionHeader, TMD},
    GROUP_SIZE,
};

/// A partition located and header-parsed, ready to read its ticket/TMD/certs
/// or open its decrypted data stream.
pub struct PartitionReader<'a, RS: Read + Seek> {
    iso_reader: &'a mut WiiIsoReader<RS>,
    data_offset: u64,
    partition_header: WiiPartitionHeader,
}

impl<'a, RS: Read + Seek> PartitionReader<'a, RS> {
    pub fn open_partition(
        iso_reader: &'a mut WiiIsoReader<RS>,
        data_offset: u64,
    ) -> binrw::BinResult<Self> {
        iso_reader.file.seek(SeekFrom::Start(data_offset))?;
        let mut partition_header: WiiPartitionHeader = iso_reader.file.read_be()?;
        let title_key = common_key::decrypt_title_key(&partition_header.ticket)
            .map_err(|e| binrw::Error::Custom { pos: data_offset, err: Box::new(e.to_string()) })?;
        partition_header.ticket.title_key = title_key;
        Ok(PartitionReader { iso_reader, data_offset, partition_header })
    }

    pub fn get_partition_header(&self) -> &WiiPartitionHeader {
        &self.partition_header
    }

    pub fn read_tmd(&mut self) -> binrw::BinResult<TMD> {
        self.iso_reader
            .file
            .seek(SeekFrom::Start(self.data_offset + *self.partition_header.tmd_off))?;
        self.iso_reader.file.read_be()
    }

    pub fn read_certificates(&mut self) -> binrw::BinResult<[Certificate; 3]> {
        self.iso_reader.file.seek(SeekFrom::Start(
            self.data_offset + *self.partition_header.cert_chain_off,
        ))?;
        self.iso_reader.file.read_be()
    }

    pub fn read_h3(&mut self) -> std::io::Result<Vec<u8>> {
        self.iso_reader.file.seek(SeekFrom::Start(
            self.data_offset + *self.partition_header.global_hash_table_off,
        ))?;
        let mut buf = vec![0; 0x18000];
        self.iso_reader.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Re-reads the ticket fresh (without the plaintext title-key substitution).
    pub fn read_ticket(&mut self) -> binrw::BinResult<Ticket> {
        self.iso_reader.file.seek(SeekFrom::Start(self.data_offset))?;
        self.iso_reader.file.read_be()
    }

    /// Reads this partition's raw head bytes verbatim, from its start up to
    /// `global_hash_table_off`: the still-encrypted ticket, TMD and cert
    /// chain exactly as they sit on disc. Used by extraction's
    /// `partition_head.bin` dump, which is meant to be fed back in as a
    /// `makewiisl`/`makewiidl` partition-head template later - re-serializing
    /// the parsed [`WiiPartitionHeader`] instead would bake in the plaintext
    /// title key this reader substituted in [`Self::open_partition`].
    pub fn read_head_bytes(&mut self) -> std::io::Result<Vec<u8>> {
        let len = *self.partition_header.global_hash_table_off;
        let mut buf = vec![0u8; len as usize];
        self.iso_reader.file.seek(SeekFrom::Start(self.data_offset))?;
        self.iso_reader.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Opens a read-only decrypting view over this partition's data region.
    pub fn open_encryption_reader(&mut self) -> WiiEncryptedReadWriteStream<'_, RS> {
        // `data_size` is the on-disc (encrypted) size, `groupCount*0x200000`
        // per spec, not the plaintext size.
        let data_size = *self.partition_header.data_size;
        let max_group = (data_size + GROUP_SIZE - 1) / GROUP_SIZE;
        WiiEncryptedReadWriteStream::create_readonly(
            &mut self.iso_reader.file,
            self.data_offset + *self.partition_header.data_off,
            self.partition_header.ticket.title_key,
            max_group,
        )
    }
}
