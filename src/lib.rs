//! Read, build, and merge GameCube and Wii optical disc images.
//!
//! [`disc::Disc`] is the usual entry point for reading: it sniffs a host
//! path (plain ISO, WBFS, or NFS) and parses the GCN or Wii disc header
//! underneath. Building starts from [`gcn::build_from_directory`] or
//! [`builder::build_from_directory`] depending on console, and both
//! support merging new contents over an existing source image via
//! `merge_gcn`/`merge_wii`.

pub mod builder;
pub mod common_key;
pub mod dir_reader;
pub mod disc;
pub mod endian;
pub mod error;
pub mod extract;
pub mod fst;
pub mod gcn;
pub mod io;
pub mod layout;
pub mod partition_rw;
pub mod reader;
pub mod reader_writer;
pub mod structs;
pub mod window;

pub use error::{Error, Result};
pub use fst::{Fst, FstNode, FstToBytes};
pub use reader::WiiIsoReader;
pub use window::IOWindow;

/// Size of a single encrypted disc block, hash data included.
pub const BLOCK_SIZE: u64 = 0x8000;
/// Offset within a block where the 0x7c00 bytes of real user data start,
/// after the H0/H1/H2 hash tree.
pub const BLOCK_DATA_OFFSET: u64 = 0x400;
/// Usable data bytes per block.
pub const BLOCK_DATA_SIZE: u64 = BLOCK_SIZE - BLOCK_DATA_OFFSET;
/// A group is 64 blocks, the unit the H3 hash table and cluster invalidation
/// operate on.
pub const GROUP_SIZE: u64 = BLOCK_SIZE * 64;
/// Usable data bytes per group.
pub const GROUP_DATA_SIZE: u64 = BLOCK_DATA_SIZE * 64;
