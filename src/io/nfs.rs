//! NFS container: the encrypted, multi-file image format Wii U Virtual
//! Console used to distribute Wii discs. Grounded in
//! `original_source/lib/DiscIONFS.cpp`: an `hif_NNNNNN.nfs` series of files,
//! each holding up to 8000 encrypted 0x8000-byte blocks, addressed through a
//! sparse logical-block-address range table and decrypted with AES-128-CBC
//! keyed by `htk.bin`, IV = the big-endian logical block number.

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use aes::{
    cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit},
    Aes128,
};

use crate::error::Error;

type Aes128CbcDec = cbc::Decryptor<Aes128>;

const BLOCK_SIZE: u64 = 0x8000;
const BLOCKS_PER_FILE: u32 = 8000;
const FIRST_FILE_HEADER_SIZE: u64 = 0x200;

struct LbaRange {
    start_block: u32,
    num_blocks: u32,
}

/// A physical block address: which file, which block within that file, the
/// originating logical block (needed for the IV), and a byte offset.
#[derive(Clone, Copy, PartialEq, Eq)]
struct Fbo {
    file: Option<u32>,
    block: u32,
    logical_block: u32,
    offset: u32,
}

pub struct NfsContainer {
    files: Vec<PathBuf>,
    key: [u8; 16],
    lba_ranges: Vec<LbaRange>,
    position: u64,
    cur_addr: Option<Fbo>,
    decrypted: [u8; BLOCK_SIZE as usize],
}

impl NfsContainer {
    /// `first_file` is the `hif_000000.nfs` path; the key is read from
    /// `<dir>/../code/htk.bin`, falling back to `<dir>/htk.bin`.
    pub fn open(first_file: &Path) -> Result<Self, Error> {
        let file_name = first_file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::invalid_format("nfs path has no file name"))?;
        if !file_name.starts_with("hif_") || !file_name.ends_with(".nfs") {
            return Err(Error::invalid_format(
                "nfs image must be named hif_NNNNNN.nfs",
            ));
        }
        let dir = first_file.parent().unwrap_or_else(|| Path::new("."));

        let key = read_key(dir)?;

        let mut f = File::open(first_file).map_err(|e| host_io(first_file, e))?;
        let mut header = [0u8; FIRST_FILE_HEADER_SIZE as usize];
        f.read_exact(&mut header).map_err(|e| host_io(first_file, e))?;
        if &header[0..4] != b"EGGS" {
            return Err(Error::invalid_format("missing NFS EGGS magic"));
        }
        let range_count = u32::from_be_bytes(header[8..12].try_into().unwrap());
        if range_count > 61 {
            return Err(Error::invalid_format("nfs lba range count out of bounds"));
        }
        let mut lba_ranges = Vec::with_capacity(range_count as usize);
        let mut total_blocks = 0u64;
        for i in 0..range_count as usize {
            let base = 12 + i * 8;
            let start_block = u32::from_be_bytes(header[base..base + 4].try_into().unwrap());
            let num_blocks = u32::from_be_bytes(header[base + 4..base + 8].try_into().unwrap());
            total_blocks += num_blocks as u64;
            lba_ranges.push(LbaRange { start_block, num_blocks });
        }

        let num_files = (total_blocks * BLOCK_SIZE + 0x200 + 0xF9F_FFFF) / 0xFA0_0000;
        let mut files = vec![first_file.to_path_buf()];
        for i in 1..num_files.max(1) {
            let path = dir.join(format!("hif_{i:06}.nfs"));
            if !path.is_file() {
                return Err(Error::NotFound(path));
            }
            files.push(path);
        }

        Ok(NfsContainer {
            files,
            key,
            lba_ranges,
            position: 0,
            cur_addr: None,
            decrypted: [0u8; BLOCK_SIZE as usize],
        })
    }

    fn logical_to_fbo(&self, offset: u64) -> Fbo {
        let block = (offset / BLOCK_SIZE) as u32;
        let byte_offset = (offset % BLOCK_SIZE) as u32;
        let mut physical_block = 0u32;
        for range in &self.lba_ranges {
            if block >= range.start_block && block - range.start_block < range.num_blocks {
                let b = physical_block + (block - range.start_block);
                return Fbo {
                    file: Some(b / BLOCKS_PER_FILE),
                    block: b % BLOCKS_PER_FILE,
                    logical_block: block,
                    offset: byte_offset,
                };
            }
            physical_block += range.num_blocks;
        }
        Fbo { file: None, block: 0, logical_block: block, offset: byte_offset }
    }

    fn load_block(&mut self, addr: Fbo) -> io::Result<()> {
        let Some(file_idx) = addr.file else {
            self.decrypted.fill(0);
            return Ok(());
        };
        let mut enc = [0u8; BLOCK_SIZE as usize];
        if addr.block == BLOCKS_PER_FILE - 1 {
            let tail = (BLOCKS_PER_FILE as u64 - 1) * BLOCK_SIZE + FIRST_FILE_HEADER_SIZE;
            let mut f = self.open_file(file_idx)?;
            f.seek(SeekFrom::Start(tail))?;
            f.read_exact(&mut enc[..0x7E00])?;
            let mut next = self.open_file(file_idx + 1)?;
            next.read_exact(&mut enc[0x7E00..])?;
        } else {
            let mut f = self.open_file(file_idx)?;
            f.seek(SeekFrom::Start(addr.block as u64 * BLOCK_SIZE + FIRST_FILE_HEADER_SIZE))?;
            f.read_exact(&mut enc)?;
        }
        let mut iv = [0u8; 16];
        iv[12..].copy_from_slice(&addr.logical_block.to_be_bytes());
        let cipher = Aes128CbcDec::new(self.key.as_ref().into(), iv.as_ref().into());
        self.decrypted.copy_from_slice(&enc);
        cipher
            .decrypt_padded_mut::<NoPadding>(&mut self.decrypted)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "nfs block decryption failed"))?;
        Ok(())
    }

    fn open_file(&self, index: u32) -> io::Result<File> {
        let path = self
            .files
            .get(index as usize)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "nfs block past last file"))?;
        File::open(path)
    }

    fn ensure_loaded(&mut self) -> io::Result<()> {
        let addr = self.logical_to_fbo(self.position);
        let needs_reload = match self.cur_addr {
            Some(prev) => prev.file != addr.file || prev.block != addr.block,
            None => true,
        };
        if needs_reload {
            self.load_block(addr)?;
        }
        self.cur_addr = Some(addr);
        Ok(())
    }
}

fn read_key(dir: &Path) -> Result<[u8; 16], Error> {
    for candidate in [dir.join("..").join("code").join("htk.bin"), dir.join("htk.bin")] {
        if let Ok(mut f) = File::open(&candidate) {
            let mut key = [0u8; 16];
            f.read_exact(&mut key).map_err(|e| host_io(&candidate, e))?;
            return Ok(key);
        }
    }
    Err(Error::NotFound(dir.join("htk.bin")))
}

fn host_io(path: &Path, source: io::Error) -> Error {
    Error::HostIo { path: path.to_path_buf(), source }
}

impl Read for NfsContainer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            self.ensure_loaded()?;
            let addr = self.cur_addr.unwrap();
            let chunk = ((BLOCK_SIZE as usize) - addr.offset as usize).min(buf.len() - written);
            buf[written..written + chunk]
                .copy_from_slice(&self.decrypted[addr.offset as usize..][..chunk]);
            self.position += chunk as u64;
            written += chunk;
        }
        Ok(written)
    }
}

impl Seek for NfsContainer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = match pos {
            SeekFrom::Start(off) => off,
            SeekFrom::Current(off) => (self.position as i64 + off) as u64,
            SeekFrom::End(_) => {
                return Err(io::Error::new(io::ErrorKind::Unsupported, "nfs containers have no fixed end"))
            }
        };
        Ok(self.position)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use aes::cipher::BlockEncryptMut;

    type Aes128CbcEnc = cbc::Encryptor<Aes128>;

    fn encrypt_block(key: &[u8; 16], logical_block: u32, plaintext: &[u8; BLOCK_SIZE as usize]) -> Vec<u8> {
        let mut iv = [0u8; 16];
        iv[12..].copy_from_slice(&logical_block.to_be_bytes());
        let mut buf = plaintext.to_vec();
        Aes128CbcEnc::new(key.into(), iv.as_ref().into())
            .encrypt_padded_mut::<NoPadding>(&mut buf, BLOCK_SIZE as usize)
            .unwrap();
        buf
    }

    #[test]
    fn decrypts_mapped_block_and_zero_fills_unmapped() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let key = [0x42u8; 16];
        std::fs::write(dir.join("htk.bin"), key).unwrap();

        let mut header = vec![0u8; FIRST_FILE_HEADER_SIZE as usize];
        header[0..4].copy_from_slice(b"EGGS");
        header[8..12].copy_from_slice(&1u32.to_be_bytes());
        header[12..16].copy_from_slice(&0u32.to_be_bytes());
        header[16..20].copy_from_slice(&10u32.to_be_bytes());

        let plaintext = [0xABu8; BLOCK_SIZE as usize];
        let ciphertext = encrypt_block(&key, 0, &plaintext);

        let mut file_bytes = header;
        file_bytes.extend_from_slice(&ciphertext);
        file_bytes.resize(FIRST_FILE_HEADER_SIZE as usize + 10 * BLOCK_SIZE as usize, 0);
        std::fs::write(dir.join("hif_000000.nfs"), &file_bytes).unwrap();

        let mut container = NfsContainer::open(&dir.join("hif_000000.nfs")).unwrap();
        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        container.read_exact(&mut buf).unwrap();
        assert_eq!(buf, plaintext.to_vec());

        container.seek(SeekFrom::Start(10 * BLOCK_SIZE)).unwrap();
        let mut buf2 = vec![0u8; 16];
        container.read_exact(&mut buf2).unwrap();
        assert_eq!(buf2, vec![0u8; 16]);
    }

    #[test]
    fn rejects_misnamed_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("disc.nfs");
        std::fs::write(&path, b"EGGS").unwrap();
        assert!(NfsContainer::open(&path).is_err());
    }
}
