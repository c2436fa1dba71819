//! Extraction orchestrator: walks an opened disc's FST and streams every
//! file into a host directory tree, laid out the way [`crate::builder`]'s
//! `DirPartitionBuilder` reads it back (`sys/` + `files/`). Grounded in
//! `original_source/lib/DiscBase.cpp`'s `Partition::extractToDirectory`.

use std::{
    fs,
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};

use crate::{
    error::Error,
    fst::{Fst, FstNode},
    gcn::GcnDiscReader,
    structs::WiiPartType,
    BLOCK_DATA_SIZE,
};

/// `-f`/`-v` extraction flags.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtractOptions {
    /// Overwrite files that already exist at the destination. Without this,
    /// existing files are left untouched and reported as zero bytes copied.
    pub force: bool,
    /// Whether the caller wants a progress callback invoked per file; purely
    /// advisory, the callback is always invoked, this just lets a CLI decide
    /// whether to print it.
    pub verbose: bool,
}

/// Invoked once per file with `(progress fraction in [0,1], file name, bytes copied)`.
pub type ProgressCallback<'a> = dyn FnMut(f64, &str, u64) + 'a;

fn count_files(fst: &Fst) -> usize {
    let mut total = 0usize;
    fst.callback_all_files::<std::convert::Infallible, _>(&mut |_, node| {
        if matches!(node, FstNode::File { .. }) {
            total += 1;
        }
        Ok(())
    })
    .unwrap();
    total
}

/// Copies `length` bytes from `offset` in `src` into `dest_path`, using an
/// `0x7C00`-byte bounce buffer (spec §4.7), tolerating an existing file only
/// under `force`.
fn copy_file<R: Read + Seek>(
    src: &mut R,
    offset: u64,
    length: u64,
    dest_path: &Path,
    force: bool,
) -> Result<u64, Error> {
    if dest_path.exists() && !force {
        return Ok(0);
    }
    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::HostIo { path: parent.to_path_buf(), source })?;
    }
    let mut out = fs::File::create(dest_path)
        .map_err(|source| Error::HostIo { path: dest_path.to_path_buf(), source })?;
    src.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; BLOCK_DATA_SIZE as usize];
    let mut remaining = length;
    let mut copied = 0u64;
    while remaining > 0 {
        let n = remaining.min(buf.len() as u64) as usize;
        src.read_exact(&mut buf[..n])?;
        out.write_all(&buf[..n]).map_err(|source| Error::HostIo { path: dest_path.to_path_buf(), source })?;
        remaining -= n as u64;
        copied += n as u64;
    }
    Ok(copied)
}

fn extract_tree<R: Read + Seek>(
    src: &mut R,
    fst: &Fst,
    files_dir: &Path,
    opts: &ExtractOptions,
    progress: &mut ProgressCallback,
) -> Result<(), Error> {
    let total_files = count_files(fst).max(1);
    let mut processed = 0usize;
    fst.callback_all_files::<Error, _>(&mut |path, node| {
        let mut dest_path = files_dir.to_path_buf();
        dest_path.extend(path);
        match node {
            FstNode::Directory { .. } => {
                fs::create_dir_all(&dest_path)
                    .map_err(|source| Error::HostIo { path: dest_path.clone(), source })?;
            }
            FstNode::File { offset, length, .. } => {
                let copied = copy_file(src, *offset, *length as u64, &dest_path, opts.force)?;
                processed += 1;
                progress(processed as f64 / total_files as f64, node.get_name(), copied);
            }
        }
        Ok(())
    })
}

/// Extracts a GameCube disc's system files and file tree into `dest_dir`.
pub fn extract_gcn<RS: Read + Seek>(
    reader: &mut GcnDiscReader<RS>,
    dest_dir: &Path,
    opts: &ExtractOptions,
    progress: &mut ProgressCallback,
) -> Result<(), Error> {
    fs::create_dir_all(dest_dir).map_err(|source| Error::HostIo { path: dest_dir.to_path_buf(), source })?;
    reader
        .extract_system_files(dest_dir)
        .map_err(|source| Error::HostIo { path: dest_dir.to_path_buf(), source })?;
    let fst = reader.read_fst()?;
    let mut files_dir = dest_dir.to_path_buf();
    files_dir.push("files");
    extract_tree(reader.get_inner(), &fst, &files_dir, opts, progress)
}

/// Extracts a Wii disc's `part_type` partition: optionally dumps the raw
/// partition-head template to `partition_head.bin`, then the decrypted
/// system files and file tree, matching `DirPartitionBuilder`'s input layout
/// under `dest_dir/DATA`.
pub fn extract_wii<RS: Read + Seek>(
    reader: &mut crate::reader::WiiIsoReader<RS>,
    dest_dir: &Path,
    part_type: &WiiPartType,
    dump_partition_head: bool,
    opts: &ExtractOptions,
    progress: &mut ProgressCallback,
) -> Result<(), Error> {
    let mut part = reader.open_partition_stream(part_type)?;

    if dump_partition_head {
        let head = part.read_head_bytes()?;
        fs::create_dir_all(dest_dir).map_err(|source| Error::HostIo { path: dest_dir.to_path_buf(), source })?;
        let head_path = dest_dir.join("partition_head.bin");
        fs::write(&head_path, &head).map_err(|source| Error::HostIo { path: head_path, source })?;
    }

    let mut data_dir = dest_dir.to_path_buf();
    data_dir.push("DATA");
    fs::create_dir_all(&data_dir).map_err(|source| Error::HostIo { path: data_dir.clone(), source })?;

    let mut crypto = part.open_encryption_reader();
    crypto.extract_system_files(&data_dir)?;
    let disc_header = crypto.read_disc_header()?;
    let fst = Fst::read(&mut crypto, *disc_header.fst_off)?;
    let mut files_dir = data_dir.clone();
    files_dir.push("files");
    extract_tree(&mut crypto, &fst, &files_dir, opts, progress)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{builder::DirPartitionBuilder, dir_reader};
    use std::io::Cursor;

    #[test]
    fn extracts_gcn_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("sys")).unwrap();
        std::fs::create_dir_all(root.join("files").join("sub")).unwrap();
        std::fs::write(root.join("sys").join("boot.bin"), vec![0u8; 0x440]).unwrap();
        std::fs::write(root.join("sys").join("bi2.bin"), vec![0u8; 0x2000]).unwrap();
        std::fs::write(root.join("sys").join("apploader.img"), vec![0x22u8; 0x400]).unwrap();
        std::fs::write(root.join("sys").join("main.dol"), vec![0x11u8; 0x800]).unwrap();
        std::fs::write(root.join("files").join("a.bin"), vec![0xAAu8; 0x4000]).unwrap();
        std::fs::write(root.join("files").join("sub").join("b.bin"), vec![0x55u8; 0x1000]).unwrap();

        let mut header: crate::structs::DiscHeader = {
            let mut f = std::fs::File::open(root.join("sys").join("boot.bin")).unwrap();
            use binrw::BinReaderExt;
            f.read_be().unwrap()
        };
        header.gcn_magic = crate::structs::DiscHeader::GCN_MAGIC;
        std::fs::write(
            root.join("sys").join("boot.bin"),
            {
                let mut buf = Vec::new();
                use binrw::BinWriterExt;
                Cursor::new(&mut buf).write_be(&header).unwrap();
                buf
            },
        )
        .unwrap();

        let fst = dir_reader::build_fst_from_directory_tree(&root.join("files")).unwrap();
        let mut source = DirPartitionBuilder::new(root.to_path_buf(), fst);
        let mut image = Cursor::new(Vec::new());
        crate::gcn::build::<_, _, dir_reader::BuildDirError>(&mut image, &mut source).unwrap();

        let mut reader = GcnDiscReader::create(Cursor::new(image.into_inner())).unwrap();
        let out_dir = tmp.path().join("out");
        let mut seen = Vec::new();
        extract_gcn(&mut reader, &out_dir, &ExtractOptions::default(), &mut |frac, name, bytes| {
            seen.push((frac, name.to_string(), bytes));
        })
        .unwrap();

        let a = std::fs::read(out_dir.join("files").join("a.bin")).unwrap();
        assert_eq!(a, vec![0xAAu8; 0x4000]);
        let b = std::fs::read(out_dir.join("files").join("sub").join("b.bin")).unwrap();
        assert_eq!(b, vec![0x55u8; 0x1000]);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn skips_existing_files_without_force() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("x.bin");
        std::fs::write(&dest, b"keep me").unwrap();
        let mut src = Cursor::new(vec![0xFFu8; 16]);
        let copied = copy_file(&mut src, 0, 16, &dest, false).unwrap();
        assert_eq!(copied, 0);
        assert_eq!(std::fs::read(&dest).unwrap(), b"keep me");
    }
}
