//! On-disc binary layouts, read and written with `binrw`.
//!
//! Two integer wrappers carry the crate's two different "offset on disc"
//! conventions side by side with their natural `u64` value:
//! [`U32Offset`] is a plain widened `u32` (used by `DiscHeader`'s own
//! offsets, which Nintendo stores unshifted), while [`ShiftedOffset`]
//! divides by 4 on write and multiplies back on read (used by the
//! partition table and partition header, which Nintendo packs that way to
//! address a 32-bit-offset space up to 16 GiB).

use std::ops::Deref;

use binrw::{binrw, BinRead, BinReaderExt, BinResult, BinWrite, Endian};
use std::io::{Read, Seek, SeekFrom, Write};

/// A `u32` disc offset, stored and read back verbatim, exposed as `u64`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct U32Offset(u64);

impl Deref for U32Offset {
    type Target = u64;
    fn deref(&self) -> &u64 {
        &self.0
    }
}

impl From<u64> for U32Offset {
    fn from(value: u64) -> Self {
        U32Offset(value)
    }
}

impl BinRead for U32Offset {
    type Args<'a> = ();
    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let raw = u32::read_options(reader, endian, ())?;
        Ok(U32Offset(raw as u64))
    }
}

impl BinWrite for U32Offset {
    type Args<'a> = ();
    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        (self.0 as u32).write_options(writer, endian, ())
    }
}

/// A `u32` disc offset stored divided by 4, exposed as the real `u64` byte offset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShiftedOffset(u64);

impl Deref for ShiftedOffset {
    type Target = u64;
    fn deref(&self) -> &u64 {
        &self.0
    }
}

impl From<u64> for ShiftedOffset {
    fn from(value: u64) -> Self {
        ShiftedOffset(value)
    }
}

impl BinRead for ShiftedOffset {
    type Args<'a> = ();
    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let raw = u32::read_options(reader, endian, ())?;
        Ok(ShiftedOffset(raw as u64 * 4))
    }
}

impl BinWrite for ShiftedOffset {
    type Args<'a> = ();
    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        debug_assert_eq!(self.0 % 4, 0, "shifted offset not 4-aligned: {:#x}", self.0);
        ((self.0 / 4) as u32).write_options(writer, endian, ())
    }
}

/// `boot.bin`: identical layout for GameCube discs and the inside of a Wii partition.
#[binrw]
#[brw(big)]
#[derive(Clone, Debug)]
pub struct DiscHeader {
    pub game_code: [u8; 4],
    pub maker_code: [u8; 2],
    pub disc_number: u8,
    pub disc_version: u8,
    pub audio_streaming: u8,
    pub stream_buffer_size: u8,
    pub unused0: [u8; 14],
    pub wii_magic: u32,
    pub gcn_magic: u32,
    pub game_title_a: [u8; 0x40],
    pub disable_hash_verification: u8,
    pub disable_disc_enc: u8,
    pub game_title_b: [u8; 0x400 - 0x62],
    pub debug_monitor_off: u32,
    pub debug_load_addr: u32,
    pub padding0: [u8; 0x18],
    pub dol_off: U32Offset,
    pub fst_off: U32Offset,
    pub fst_sz: U32Offset,
    pub fst_max_sz: U32Offset,
    pub fst_memory_address: u32,
    pub user_position: u32,
    pub user_length: u32,
    pub unused1: u32,
}

impl DiscHeader {
    pub const WII_MAGIC: u32 = 0x5D1C_9EA3;
    pub const GCN_MAGIC: u32 = 0xC233_9F3D;

    /// Builds a zeroed header with `game_id`'s first 4 bytes as the game code
    /// and next 2 as the maker code (Nintendo's 6-byte id convention), and
    /// `game_title` copied into the first title field. Neither magic is set;
    /// callers pick [`DiscHeader::new_gcn`] or [`DiscHeader::new_wii`].
    fn blank(game_id: &str, game_title: &str) -> Self {
        let id_bytes = game_id.as_bytes();
        let mut game_code = [0u8; 4];
        let code_len = id_bytes.len().min(4);
        game_code[..code_len].copy_from_slice(&id_bytes[..code_len]);
        let mut maker_code = [0u8; 2];
        if id_bytes.len() > 4 {
            let maker_len = (id_bytes.len() - 4).min(2);
            maker_code[..maker_len].copy_from_slice(&id_bytes[4..4 + maker_len]);
        }

        let title_bytes = game_title.as_bytes();
        let mut game_title_a = [0u8; 0x40];
        let title_len = title_bytes.len().min(0x40);
        game_title_a[..title_len].copy_from_slice(&title_bytes[..title_len]);

        DiscHeader {
            game_code,
            maker_code,
            disc_number: 0,
            disc_version: 0,
            audio_streaming: 0,
            stream_buffer_size: 0,
            unused0: [0; 14],
            wii_magic: 0,
            gcn_magic: 0,
            game_title_a,
            disable_hash_verification: 0,
            disable_disc_enc: 0,
            game_title_b: [0; 0x400 - 0x62],
            debug_monitor_off: 0,
            debug_load_addr: 0,
            padding0: [0; 0x18],
            dol_off: 0u64.into(),
            fst_off: 0u64.into(),
            fst_sz: 0u64.into(),
            fst_max_sz: 0u64.into(),
            fst_memory_address: 0,
            user_position: 0,
            user_length: 0,
            unused1: 0,
        }
    }

    /// Fresh header for a new GameCube build: `gcn_magic` set, `wii_magic` left zero.
    pub fn new_gcn(game_id: &str, game_title: &str) -> Self {
        let mut header = Self::blank(game_id, game_title);
        header.gcn_magic = Self::GCN_MAGIC;
        header
    }

    /// Fresh header for a new Wii build: `wii_magic` set, `gcn_magic` left zero.
    pub fn new_wii(game_id: &str, game_title: &str) -> Self {
        let mut header = Self::blank(game_id, game_title);
        header.wii_magic = Self::WII_MAGIC;
        header
    }
}

/// Builds the 32-byte region-info block written at `0x4E000` for a fresh
/// Wii build: country byte derived from the game code's region letter
/// (`P` -> 2, `J` -> 0, anything else -> 1), followed by the all-`0x80`
/// rating block at offset `0x10`.
pub fn default_wii_region(game_code: &[u8; 4]) -> [u8; 32] {
    let region_letter = game_code[3];
    let country = match region_letter {
        b'P' => 2u32,
        b'J' => 0u32,
        _ => 1u32,
    };
    let mut region = [0u8; 32];
    region[0..4].copy_from_slice(&country.to_be_bytes());
    region[0x10..0x20].fill(0x80);
    region
}

/// `apploader.img` header, 32 bytes, followed by `size1 + size2` bytes of code.
#[binrw]
#[brw(big)]
#[derive(Clone, Debug)]
pub struct ApploaderHeader {
    pub date: [u8; 10],
    pub padding0: [u8; 2],
    pub entry_point: u32,
    pub size1: u32,
    pub size2: u32,
    pub padding1: [u8; 8],
}

/// `main.dol` header: 7 text + 11 data sections, each with offset/address/size.
#[binrw]
#[brw(big)]
#[derive(Clone, Debug)]
pub struct DOLHeader {
    pub text_off: [u32; 7],
    pub data_off: [u32; 11],
    pub text_address: [u32; 7],
    pub data_address: [u32; 11],
    pub text_sizes: [u32; 7],
    pub data_sizes: [u32; 11],
    pub bss_address: u32,
    pub bss_size: u32,
    pub entry_point: u32,
    pub padding: [u8; 0x1C],
}

/// One `TimeLimit` entry inside a [`Ticket`]: limit kind and associated value.
#[binrw]
#[brw(big)]
#[derive(Clone, Copy, Debug, Default)]
pub struct TimeLimit {
    pub kind: u32,
    pub value: u32,
}

/// A signed title ticket: holds the encrypted title key and the common-key index
/// used to unwrap it. Signature and certificate-chain fields are kept but never
/// interpreted, matching the rest of this crate's "treat signatures as opaque"
/// stance (nothing here verifies Nintendo's RSA signatures).
#[binrw]
#[brw(big)]
#[derive(Clone, Debug)]
pub struct Ticket {
    pub signature_type: u32,
    pub signature: [u8; 256],
    pub sig_padding: [u8; 60],
    pub issuer: [u8; 64],
    pub ecdh_data: [u8; 60],
    pub unused0: u8,
    /// The key Nintendo stores here is AES-encrypted under a common key; callers must
    /// run [`crate::common_key::decrypt_title_key`] once after reading before using it
    /// to decrypt partition data, then typically overwrite this field with the plaintext.
    pub title_key: [u8; 16],
    pub unknown0: u8,
    pub ticket_id: u64,
    pub console_id: u32,
    pub title_id: u64,
    pub unknown1: u16,
    pub ticket_title_version: u16,
    pub permitted_title_mask: u32,
    pub permitted_title_id: u32,
    pub title_export_allowed: u8,
    pub common_key_index: u8,
    pub unknown2: [u8; 48],
    pub content_access_permissions: [u8; 64],
    pub padding2: u16,
    pub reserved3: u16,
    pub limits: [TimeLimit; 8],
}

/// One content entry in a [`TMD`]'s content table.
#[binrw]
#[brw(big)]
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentRecord {
    pub content_id: u32,
    pub index: u16,
    pub content_type: u16,
    pub size: u64,
    pub hash: [u8; 20],
}

/// Title metadata. The signature block (first 0x140 bytes) and the "fake
/// sign" filler at 0x19A are patched directly as raw bytes by the builder's
/// brute-force pass (see `builder.rs`), not through these typed fields -
/// this struct exists for read access and for producing the initial layout.
#[binrw]
#[brw(big)]
#[derive(Clone, Debug)]
pub struct TMD {
    pub signature_type: u32,
    pub signature: [u8; 256],
    pub signature_padding: [u8; 60],
    pub issuer: [u8; 64],
    pub version: u8,
    pub ca_crl_version: u8,
    pub signer_crl_version: u8,
    pub is_vwii: u8,
    pub system_version: u64,
    pub title_id: u64,
    pub title_type: u32,
    pub group_id: u16,
    pub fake_sign: [u8; 8],
    pub region: u16,
    pub ratings: [u8; 16],
    pub reserved1: [u8; 12],
    pub ipc_mask: [u8; 12],
    pub reserved2: [u8; 14],
    pub access_rights: u32,
    pub title_version: u16,
    pub num_contents: u16,
    pub boot_index: u16,
    #[br(parse_with = binrw::helpers::until_eof)]
    pub contents: Vec<ContentRecord>,
}

/// A certificate from the disc's cert chain. Bodies are never parsed beyond
/// their signature-type-determined length: nothing in this crate verifies
/// Nintendo's signing chain, so certificates are read and written back
/// verbatim (grounded in `DiscWii.cpp`'s `Certificate::read`, which does the
/// same thing - it sizes the read but never inspects the public key).
#[derive(Clone, Debug)]
pub struct Certificate {
    pub raw: Vec<u8>,
}

impl Certificate {
    const RSA4096_SIZE: usize = 0x400;
    const RSA2048_SIZE: usize = 0x300;
    const ECDSA_SIZE: usize = 0x180;
}

impl BinRead for Certificate {
    type Args<'a> = ();
    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;
        let sig_type = u32::read_options(reader, endian, ())?;
        let total = match sig_type {
            0x10000 => Self::RSA4096_SIZE,
            0x10001 => Self::RSA2048_SIZE,
            0x10002 => Self::ECDSA_SIZE,
            other => {
                return Err(binrw::Error::Custom {
                    pos,
                    err: Box::new(format!("unknown certificate signature type {other:#x}")),
                })
            }
        };
        let mut raw = vec![0u8; total];
        raw[..4].copy_from_slice(&sig_type.to_be_bytes());
        reader.read_exact(&mut raw[4..])?;
        Ok(Certificate { raw })
    }
}

impl BinWrite for Certificate {
    type Args<'a> = ();
    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        writer.write_all(&self.raw)?;
        Ok(())
    }
}

/// Known Wii partition kinds. Anything else is kept around verbatim so
/// listing a partition table never fails on an unrecognised group id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WiiPartType {
    Data,
    Update,
    Channel,
    Other(u32),
}

impl BinRead for WiiPartType {
    type Args<'a> = ();
    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let raw = u32::read_options(reader, endian, ())?;
        Ok(match raw {
            0 => WiiPartType::Data,
            1 => WiiPartType::Update,
            2 => WiiPartType::Channel,
            other => WiiPartType::Other(other),
        })
    }
}

impl BinWrite for WiiPartType {
    type Args<'a> = ();
    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        let raw = match self {
            WiiPartType::Data => 0u32,
            WiiPartType::Update => 1,
            WiiPartType::Channel => 2,
            WiiPartType::Other(v) => *v,
        };
        raw.write_options(writer, endian, ())
    }
}

/// One entry of the disc-wide partition table at `0x40000`.
#[binrw]
#[brw(big)]
#[derive(Clone, Debug)]
pub struct WiiPartTableEntry {
    pub part_data_off: ShiftedOffset,
    pub part_type: WiiPartType,
}

/// The fixed-size header at the start of every Wii partition (0x2C0 bytes).
#[binrw]
#[brw(big)]
#[derive(Clone, Debug)]
pub struct WiiPartitionHeader {
    pub ticket: Ticket,
    pub tmd_size: u32,
    pub tmd_off: ShiftedOffset,
    pub cert_chain_size: u32,
    pub cert_chain_off: ShiftedOffset,
    pub global_hash_table_off: ShiftedOffset,
    pub data_off: ShiftedOffset,
    pub data_size: ShiftedOffset,
}

/// Reads the disc-wide partition table at `0x40000`: a count and a shifted
/// offset to the table itself, followed by that many [`WiiPartTableEntry`].
pub fn read_parts<R: Read + Seek>(reader: &mut R) -> BinResult<Vec<WiiPartTableEntry>> {
    reader.seek(SeekFrom::Start(0x40000))?;
    let count: u32 = reader.read_be()?;
    let table_off: u32 = reader.read_be()?;
    reader.seek(SeekFrom::Start(table_off as u64 * 4))?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        entries.push(reader.read_be()?);
    }
    Ok(entries)
}

#[cfg(test)]
mod test {
    use super::*;
    use binrw::{BinReaderExt, BinWriterExt};
    use std::io::Cursor;

    #[test]
    fn shifted_offset_roundtrip() {
        let mut buf = Cursor::new(Vec::new());
        let off: ShiftedOffset = 0x20000u64.into();
        buf.write_be(&off).unwrap();
        let mut cur = Cursor::new(buf.into_inner());
        let read_back: ShiftedOffset = cur.read_be().unwrap();
        assert_eq!(*read_back, 0x20000);
    }

    #[test]
    fn u32_offset_roundtrip() {
        let mut buf = Cursor::new(Vec::new());
        let off: U32Offset = 0x1234u64.into();
        buf.write_be(&off).unwrap();
        let mut cur = Cursor::new(buf.into_inner());
        let read_back: U32Offset = cur.read_be().unwrap();
        assert_eq!(*read_back, 0x1234);
    }

    #[test]
    fn certificate_sizes_by_signature_type() {
        let mut rsa2048 = vec![0u8; Certificate::RSA2048_SIZE];
        rsa2048[..4].copy_from_slice(&0x10001u32.to_be_bytes());
        let mut cur = Cursor::new(rsa2048);
        let cert: Certificate = cur.read_be().unwrap();
        assert_eq!(cert.raw.len(), Certificate::RSA2048_SIZE);
    }
}
