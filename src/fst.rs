//! The File String Table: the flat directory tree every disc image stores
//! right after its apploader/DOL, mapping host-style paths to byte ranges.
//!
//! On disc this is a flat array of 12-byte entries (`kind`, 24-bit name
//! offset, `offset`, `length`) followed by a null-terminated string table.
//! A directory entry's `offset` holds its parent's index and `length` holds
//! the index one past its last descendant; this is what lets a linear scan
//! reconstruct nesting without a separate pointer.

use std::io::{Read, Seek, SeekFrom, Write};

use binrw::{binrw, BinReaderExt, BinWriterExt};
use encoding_rs::SHIFT_JIS;
use thiserror::Error;

#[binrw]
#[brw(big)]
#[derive(Clone, Copy, Debug)]
struct RawEntry {
    kind: u8,
    name_offset: [u8; 3],
    offset: u32,
    length: u32,
}

impl RawEntry {
    fn name_offset(&self) -> u32 {
        u32::from_be_bytes([0, self.name_offset[0], self.name_offset[1], self.name_offset[2]])
    }

    fn set_name_offset(&mut self, value: u32) {
        let bytes = value.to_be_bytes();
        self.name_offset = [bytes[1], bytes[2], bytes[3]];
    }
}

/// A node in the in-memory file tree: either a leaf file or a directory full of more nodes.
#[derive(Clone, Debug)]
pub enum FstNode {
    File { name: String, offset: u64, length: u32 },
    Directory { name: String, files: Vec<FstNode> },
}

impl FstNode {
    pub fn get_name(&self) -> &str {
        match self {
            FstNode::File { name, .. } => name,
            FstNode::Directory { name, .. } => name,
        }
    }
}

/// The parsed file tree of a single partition (or a GameCube disc, which has
/// exactly one implicit partition).
#[derive(Clone, Debug, Default)]
pub struct Fst {
    pub root: Vec<FstNode>,
}

fn decode_name(strings: &[u8], offset: u32) -> String {
    let start = offset as usize;
    let end = strings[start..]
        .iter()
        .position(|&b| b == 0)
        .map(|p| start + p)
        .unwrap_or(strings.len());
    let (cow, _, _) = SHIFT_JIS.decode(&strings[start..end]);
    cow.into_owned()
}

fn parse_children(
    entries: &[RawEntry],
    start: usize,
    end: usize,
    strings: &[u8],
    shifted: bool,
) -> Vec<FstNode> {
    let mut children = Vec::new();
    let mut i = start;
    while i < end {
        let entry = entries[i];
        let name = decode_name(strings, entry.name_offset());
        if entry.kind == 1 {
            let dir_end = entry.length as usize;
            let sub = parse_children(entries, i + 1, dir_end, strings, shifted);
            children.push(FstNode::Directory { name, files: sub });
            i = dir_end;
        } else {
            let offset = if shifted {
                entry.offset as u64 * 4
            } else {
                entry.offset as u64
            };
            children.push(FstNode::File { name, offset, length: entry.length });
            i += 1;
        }
    }
    children
}

impl Fst {
    /// Reads a Wii partition's FST, whose file offsets are stored right-shifted by 2.
    pub fn read<R: Read + Seek>(reader: &mut R, fst_off: u64) -> binrw::BinResult<Self> {
        Self::read_inner(reader, fst_off, true)
    }

    /// Reads a GameCube disc's FST, whose file offsets are stored unshifted.
    pub fn read_gcn<R: Read + Seek>(reader: &mut R, fst_off: u64) -> binrw::BinResult<Self> {
        Self::read_inner(reader, fst_off, false)
    }

    fn read_inner<R: Read + Seek>(
        reader: &mut R,
        fst_off: u64,
        shifted: bool,
    ) -> binrw::BinResult<Self> {
        reader.seek(SeekFrom::Start(fst_off))?;
        let root_entry: RawEntry = reader.read_be()?;
        let total = root_entry.length as usize;
        let mut entries = Vec::with_capacity(total);
        entries.push(root_entry);
        for _ in 1..total {
            entries.push(reader.read_be()?);
        }
        let string_table_off = fst_off + (total as u64) * 12;
        reader.seek(SeekFrom::Start(string_table_off))?;
        let mut strings = Vec::new();
        reader.read_to_end(&mut strings)?;
        let root = parse_children(&entries, 1, total, &strings, shifted);
        Ok(Fst { root })
    }

    /// Finds a node by full path, splitting on `/`.
    pub fn find_node_iter<'a>(&self, path: impl Iterator<Item = &'a str>) -> Option<&FstNode> {
        let mut current = &self.root;
        let mut found = None;
        for segment in path {
            let node = current.iter().find(|n| n.get_name() == segment)?;
            found = Some(node);
            if let FstNode::Directory { files, .. } = node {
                current = files;
            }
        }
        found
    }

    /// Finds a top-level-anchored node by a `/`-joined path, for mutation.
    pub fn find_node_path_mut(&mut self, path: &str) -> Option<&mut FstNode> {
        let mut segments = path.split('/');
        let first = segments.next()?;
        let mut current = &mut self.root;
        let mut node = current.iter_mut().find(|n| n.get_name() == first)?;
        for segment in segments {
            match node {
                FstNode::Directory { files, .. } => {
                    current = files;
                    node = current.iter_mut().find(|n| n.get_name() == segment)?;
                }
                FstNode::File { .. } => return None,
            }
        }
        Some(node)
    }

    /// Invokes `cb` for every node (files and directories), with its full path segments.
    pub fn callback_all_files<E, F: FnMut(&Vec<String>, &FstNode) -> Result<(), E>>(
        &self,
        cb: &mut F,
    ) -> Result<(), E> {
        let mut path = Vec::new();
        Self::walk(&self.root, &mut path, cb)
    }

    fn walk<E, F: FnMut(&Vec<String>, &FstNode) -> Result<(), E>>(
        nodes: &[FstNode],
        path: &mut Vec<String>,
        cb: &mut F,
    ) -> Result<(), E> {
        for node in nodes {
            path.push(node.get_name().to_string());
            cb(path, node)?;
            if let FstNode::Directory { files, .. } = node {
                Self::walk(files, path, cb)?;
            }
            path.pop();
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum FstToBytesError {
    #[error("name offset {0:#x} exceeds the 24-bit string table address space")]
    StringTableTooLarge(u64),
}

struct FstEntryBuf {
    is_dir: bool,
    name: String,
    name_offset: u32,
    /// directory: parent index. file: byte offset.
    field_a: u64,
    /// directory: end index (one past last descendant). file: byte length.
    field_b: u32,
}

/// A flattened, on-disc-ready copy of an [`Fst`], with file offsets/lengths
/// left as placeholders until the builder fills them in while writing data.
pub struct FstToBytes {
    entries: Vec<FstEntryBuf>,
    string_table: Vec<u8>,
    shifted: bool,
}

fn push_name(strings: &mut Vec<u8>, name: &str) -> Result<u32, FstToBytesError> {
    let offset = strings.len() as u64;
    if offset > 0xFF_FFFF {
        return Err(FstToBytesError::StringTableTooLarge(offset));
    }
    let (encoded, _, _) = SHIFT_JIS.encode(name);
    strings.extend_from_slice(&encoded);
    strings.push(0);
    Ok(offset as u32)
}

fn flatten(
    nodes: &[FstNode],
    parent_index: u32,
    entries: &mut Vec<FstEntryBuf>,
    strings: &mut Vec<u8>,
) -> Result<(), FstToBytesError> {
    for node in nodes {
        match node {
            FstNode::Directory { name, files } => {
                let name_offset = push_name(strings, name)?;
                let idx = entries.len();
                entries.push(FstEntryBuf {
                    is_dir: true,
                    name: name.clone(),
                    name_offset,
                    field_a: parent_index as u64,
                    field_b: 0,
                });
                flatten(files, idx as u32, entries, strings)?;
                let end = entries.len() as u32;
                entries[idx].field_b = end;
            }
            FstNode::File { name, offset, length } => {
                let name_offset = push_name(strings, name)?;
                entries.push(FstEntryBuf {
                    is_dir: false,
                    name: name.clone(),
                    name_offset,
                    field_a: *offset,
                    field_b: *length,
                });
            }
        }
    }
    Ok(())
}

impl FstToBytes {
    fn build(fst: &Fst, shifted: bool) -> Result<Self, FstToBytesError> {
        let mut entries = Vec::new();
        let mut string_table = Vec::new();
        // root: name offset 0 (empty string), parent index unused.
        string_table.push(0);
        entries.push(FstEntryBuf {
            is_dir: true,
            name: String::new(),
            name_offset: 0,
            field_a: 0,
            field_b: 0,
        });
        flatten(&fst.root, 0, &mut entries, &mut string_table)?;
        let total = entries.len() as u32;
        entries[0].field_b = total;
        Ok(FstToBytes { entries, string_table, shifted })
    }

    /// Wii path: file offsets are written right-shifted by 2.
    pub fn try_from_wii(fst: &Fst) -> Result<Self, FstToBytesError> {
        Self::build(fst, true)
    }

    /// GameCube path: file offsets are written unshifted.
    pub fn try_from_gcn(fst: &Fst) -> Result<Self, FstToBytesError> {
        Self::build(fst, false)
    }

    /// Invokes `cb` for every file entry with its full path, handing back mutable
    /// access to the offset/length that will be serialized by [`Self::write_to`].
    pub fn callback_all_files_mut<E, F: FnMut(&Vec<String>, &mut u64, &mut u32) -> Result<(), E>>(
        &mut self,
        cb: &mut F,
    ) -> Result<(), E> {
        let mut path: Vec<String> = Vec::new();
        let mut end_stack: Vec<usize> = Vec::new();
        let mut i = 1; // skip synthetic root
        while i < self.entries.len() {
            while let Some(&end) = end_stack.last() {
                if i >= end {
                    end_stack.pop();
                    path.pop();
                } else {
                    break;
                }
            }
            let is_dir = self.entries[i].is_dir;
            let name = self.entries[i].name.clone();
            if is_dir {
                path.push(name);
                end_stack.push(self.entries[i].field_b as usize);
                i += 1;
            } else {
                path.push(name);
                let entry = &mut self.entries[i];
                let mut offset = entry.field_a;
                let mut length = entry.field_b;
                cb(&path, &mut offset, &mut length)?;
                entry.field_a = offset;
                entry.field_b = length;
                path.pop();
                i += 1;
            }
        }
        Ok(())
    }

    pub fn write_to<W: Write + Seek>(&self, writer: &mut W) -> binrw::BinResult<()> {
        for entry in &self.entries {
            let mut raw = RawEntry {
                kind: if entry.is_dir { 1 } else { 0 },
                name_offset: [0; 3],
                offset: 0,
                length: entry.field_b,
            };
            raw.set_name_offset(entry.name_offset);
            raw.offset = if entry.is_dir {
                entry.field_a as u32
            } else if self.shifted {
                (entry.field_a / 4) as u32
            } else {
                entry.field_a as u32
            };
            writer.write_be(&raw)?;
        }
        writer.write_all(&self.string_table)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn sample_fst() -> Fst {
        Fst {
            root: vec![
                FstNode::Directory {
                    name: "files".into(),
                    files: vec![FstNode::File { name: "a.bin".into(), offset: 0, length: 10 }],
                },
                FstNode::File { name: "b.bin".into(), offset: 0, length: 20 },
            ],
        }
    }

    #[test]
    fn roundtrip_through_bytes() {
        let fst = sample_fst();
        let mut to_bytes = FstToBytes::try_from_wii(&fst).unwrap();
        let mut next_offset = 0x40u64;
        to_bytes
            .callback_all_files_mut::<std::convert::Infallible, _>(&mut |_path, offset, _length| {
                *offset = next_offset;
                next_offset += 0x40;
                Ok(())
            })
            .unwrap();

        let mut buf = Cursor::new(Vec::new());
        to_bytes.write_to(&mut buf).unwrap();

        let mut cur = Cursor::new(buf.into_inner());
        let parsed = Fst::read(&mut cur, 0).unwrap();
        assert_eq!(parsed.root.len(), 2);
        match &parsed.root[0] {
            FstNode::Directory { name, files } => {
                assert_eq!(name, "files");
                assert_eq!(files.len(), 1);
            }
            _ => panic!("expected directory"),
        }
    }

    #[test]
    fn find_node_path_mut_locates_top_level_dir() {
        let mut fst = sample_fst();
        let node = fst.find_node_path_mut("files").unwrap();
        assert_eq!(node.get_name(), "files");
    }
}
