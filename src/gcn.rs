//! GameCube disc reading and building: the same boot.bin/apploader/DOL/FST
//! layout as a Wii partition, minus the encryption and hash-tree wrapper.
//! Grounded in `original_source/lib/DiscGCN.cpp`, whose `PartitionGCN` reads
//! straight from absolute disc offsets and whose `PartitionBuilderGCN`
//! allocates file data top-down from the fixed 0x5705_8000 capacity.

use std::{
    borrow::Cow,
    error::Error as StdError,
    fs::File,
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
};

use binrw::{BinReaderExt, BinWriterExt};

use crate::{
    builder::{DirPartitionBuilder, PartitionAddError, WiiPartitionDefinition},
    dir_reader,
    fst::{Fst, FstToBytes},
    layout::{align_next, TopDownAllocator, APPLOADER_OFFSET, GCN_CAPACITY, USER_LOW_WATERMARK},
    structs::{ApploaderHeader, DOLHeader, DiscHeader},
};

pub type GcnBuildError<E> = PartitionAddError<E>;

/// Reads a GameCube disc image, which is always exactly one unencrypted
/// "partition" spanning the whole file.
pub struct GcnDiscReader<RS: Read + Seek> {
    file: RS,
    header: DiscHeader,
}

impl<RS: Read + Seek> GcnDiscReader<RS> {
    pub fn create(mut rs: RS) -> binrw::BinResult<Self> {
        rs.seek(SeekFrom::Start(0))?;
        let header: DiscHeader = rs.read_be()?;
        Ok(GcnDiscReader { file: rs, header })
    }

    pub fn get_header(&self) -> &DiscHeader {
        &self.header
    }

    /// Direct access to the underlying container stream, for extraction's
    /// bounce-buffer file copies.
    pub fn get_inner(&mut self) -> &mut RS {
        &mut self.file
    }

    pub fn read_into_vec(&mut self, offset: u64, length: u64, buf: &mut Vec<u8>) -> io::Result<()> {
        buf.clear();
        buf.resize(length as usize, 0);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)
    }

    pub fn read_apploader(&mut self) -> binrw::BinResult<Vec<u8>> {
        self.file.seek(SeekFrom::Start(APPLOADER_OFFSET))?;
        let header: ApploaderHeader = self.file.read_be()?;
        let fullsize = 32 + header.size1 + header.size2;
        let mut buf = Vec::new();
        self.read_into_vec(APPLOADER_OFFSET, fullsize as u64, &mut buf)?;
        Ok(buf)
    }

    pub fn read_dol(&mut self) -> binrw::BinResult<Vec<u8>> {
        let dol_offset = *self.header.dol_off;
        self.file.seek(SeekFrom::Start(dol_offset))?;
        let dol_header: DOLHeader = self.file.read_be()?;
        let mut dol_size = dol_header.text_off[0];
        dol_size = dol_size.saturating_add(
            dol_header
                .text_sizes
                .iter()
                .chain(dol_header.data_sizes.iter())
                .cloned()
                .reduce(|a, b| a.saturating_add(b))
                .unwrap_or(0),
        );
        let mut buf = Vec::new();
        self.read_into_vec(dol_offset, dol_size as u64, &mut buf)?;
        Ok(buf)
    }

    pub fn read_fst(&mut self) -> binrw::BinResult<Fst> {
        Fst::read_gcn(&mut self.file, *self.header.fst_off)
    }

    pub fn extract_system_files(&mut self, path: &Path) -> io::Result<()> {
        let mut sys = path.to_path_buf();
        sys.push("sys");
        std::fs::create_dir_all(&sys)?;
        self.file.seek(SeekFrom::Start(0))?;
        let mut header_buf = vec![0u8; 0x440];
        self.file.read_exact(&mut header_buf)?;
        std::fs::write(sys.join("boot.bin"), &header_buf)?;
        let mut bi2 = vec![0u8; 0x2000];
        self.file.seek(SeekFrom::Start(0x440))?;
        self.file.read_exact(&mut bi2)?;
        std::fs::write(sys.join("bi2.bin"), &bi2)?;
        let apploader = self
            .read_apploader()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(sys.join("apploader.img"), &apploader)?;
        let dol = self
            .read_dol()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(sys.join("main.dol"), &dol)?;
        let mut fst_buf = Vec::new();
        self.read_into_vec(*self.header.fst_off, *self.header.fst_sz as u64, &mut fst_buf)?;
        std::fs::write(sys.join("fst.bin"), &fst_buf)?;
        Ok(())
    }
}

/// Builds a GameCube disc image from anything implementing
/// [`WiiPartitionDefinition`] (the trait does not itself mention tickets or
/// crypto, so `DirPartitionBuilder`/`CopyBuilder` work unmodified here).
pub fn build<WS, P, E>(dest: &mut WS, source: &mut P) -> Result<(), GcnBuildError<E>>
where
    WS: Read + Write + Seek,
    P: WiiPartitionDefinition<E>,
    E: StdError,
{
    let mut disc_header = source.get_disc_header()?;
    dest.seek(SeekFrom::Start(0x440))?;
    dest.write_all(&source.get_bi2()?)?;

    dest.seek(SeekFrom::Start(APPLOADER_OFFSET))?;
    dest.write_all(&source.get_apploader()?)?;

    disc_header.dol_off = align_next(dest.stream_position()?, 0x20).into();
    dest.seek(SeekFrom::Start(*disc_header.dol_off))?;
    dest.write_all(&source.get_dol()?)?;
    disc_header.fst_off = align_next(dest.stream_position()?, 0x20).into();

    let source_fst = source.get_fst()?;
    let mut fst = FstToBytes::try_from_gcn(&source_fst)?;

    let mut total_files = 0usize;
    source_fst
        .callback_all_files::<std::convert::Infallible, _>(&mut |_, node| {
            if matches!(node, crate::fst::FstNode::File { .. }) {
                total_files += 1;
            }
            Ok(())
        })
        .unwrap();

    let mut allocator = TopDownAllocator::new(GCN_CAPACITY);
    let mut processed = 0usize;
    fst.callback_all_files_mut::<GcnBuildError<E>, _>(&mut |path, offset, size| {
        source.progress_callback(processed, total_files);
        processed += 1;
        let (data, _padding) = source.get_file_data(path)?;
        let start = allocator.allocate(data.len() as u64)?;
        dest.seek(SeekFrom::Start(start))?;
        dest.write_all(data.as_ref())?;
        *offset = start;
        *size = data.len() as u32;
        Ok(())
    })?;

    if allocator.remaining() < USER_LOW_WATERMARK {
        tracing::warn!("gcn disc user area nearly exhausted");
    }

    // fst sits just after the dol; fst_off was captured before the top-down
    // file allocation loop moved the stream position around
    let mut fst_bytes = Vec::new();
    fst.write_to(&mut std::io::Cursor::new(&mut fst_bytes))?;
    let fst_end = *disc_header.fst_off + fst_bytes.len() as u64;
    let lowest_user_offset = allocator.remaining() + USER_LOW_WATERMARK;
    if fst_end >= lowest_user_offset {
        return Err(PartitionAddError::Layout(crate::error::Error::disk_full(format!(
            "FST flows into user area (one or the other is too big): fst ends at {fst_end:#x}, lowest file at {lowest_user_offset:#x}"
        ))));
    }
    dest.seek(SeekFrom::Start(*disc_header.fst_off))?;
    dest.write_all(&fst_bytes)?;
    disc_header.fst_sz = (fst_bytes.len() as u64).into();
    disc_header.fst_max_sz = disc_header.fst_sz;

    dest.seek(SeekFrom::Start(0))?;
    dest.write_be(&disc_header)?;
    dest.flush()?;
    crate::layout::pad_to_capacity(dest, GCN_CAPACITY, 0x00)?;
    Ok(())
}

pub fn build_from_directory<WS: Read + Write + Seek>(
    dir: &Path,
    dest: &mut WS,
) -> Result<(), GcnBuildError<dir_reader::BuildDirError>> {
    let mut files_dir = dir.to_path_buf();
    files_dir.push("files");
    let fst = dir_reader::build_fst_from_directory_tree(&files_dir).map_err(PartitionAddError::Custom)?;
    let mut source = DirPartitionBuilder::new(dir.to_path_buf(), fst);
    build(dest, &mut source)
}

/// Builds a GameCube disc image from explicit CLI inputs - the `makegcn`
/// counterpart to [`build_from_directory`]'s `sys/`+`files/` convention.
pub fn build_gcn_image<WS: Read + Write + Seek>(
    dest: &mut WS,
    disc_header: DiscHeader,
    dol_path: std::path::PathBuf,
    apploader_path: std::path::PathBuf,
    fsroot: std::path::PathBuf,
    progress: Option<Box<dyn FnMut(usize, usize)>>,
) -> Result<(), GcnBuildError<dir_reader::BuildDirError>> {
    let mut source = crate::builder::HostFilesSource::new(disc_header, dol_path, apploader_path, fsroot)?;
    if let Some(cb) = progress {
        source = source.with_progress(cb);
    }
    build(dest, &mut source)
}

/// Rebuilds a GameCube disc from a source image's header/apploader/DOL/FST,
/// optionally substituting individual files from a host directory.
pub fn merge_gcn<RS: Read + Seek, WS: Read + Write + Seek>(
    src: &mut GcnDiscReader<RS>,
    dest: &mut WS,
    overrides_dir: Option<&Path>,
) -> Result<(), GcnBuildError<std::convert::Infallible>> {
    let disc_header = src.get_header().clone();
    let mut bi2 = vec![0u8; 0x2000];
    src.read_into_vec(0x440, 0x2000, &mut bi2)?;
    let apploader = src.read_apploader()?;
    let dol = src.read_dol()?;
    let fst = src.read_fst()?;
    let mut source = GcnCopySource {
        disc_header,
        bi2,
        apploader,
        dol,
        fst,
        reader: src,
        buffer: Vec::new(),
        overrides_dir: overrides_dir.map(Path::to_path_buf),
    };
    build(dest, &mut source)
}

struct GcnCopySource<'a, RS: Read + Seek> {
    disc_header: DiscHeader,
    bi2: Vec<u8>,
    apploader: Vec<u8>,
    dol: Vec<u8>,
    fst: Fst,
    reader: &'a mut GcnDiscReader<RS>,
    buffer: Vec<u8>,
    overrides_dir: Option<std::path::PathBuf>,
}

type GcnCopyErr = PartitionAddError<std::convert::Infallible>;

impl<'a, RS: Read + Seek> WiiPartitionDefinition<std::convert::Infallible> for GcnCopySource<'a, RS> {
    fn get_disc_header(&mut self) -> Result<DiscHeader, GcnCopyErr> {
        Ok(self.disc_header.clone())
    }

    fn get_bi2<'b>(&'b mut self) -> Result<Cow<'b, [u8]>, GcnCopyErr> {
        Ok(Cow::Borrowed(&self.bi2))
    }

    fn get_apploader<'b>(&'b mut self) -> Result<Cow<'b, [u8]>, GcnCopyErr> {
        Ok(Cow::Borrowed(&self.apploader))
    }

    fn get_fst(&mut self) -> Result<Fst, GcnCopyErr> {
        Ok(self.fst.clone())
    }

    fn get_dol<'b>(&'b mut self) -> Result<Cow<'b, [u8]>, GcnCopyErr> {
        Ok(Cow::Borrowed(&self.dol))
    }

    fn get_file_data<'b>(&'b mut self, path: &Vec<String>) -> Result<(Cow<'b, [u8]>, u32), GcnCopyErr> {
        if let Some(overrides_dir) = &self.overrides_dir {
            let mut host_path = overrides_dir.clone();
            host_path.extend(path);
            if host_path.is_file() {
                self.buffer.clear();
                File::open(&host_path)?.read_to_end(&mut self.buffer)?;
                return Ok((Cow::Borrowed(&self.buffer), 0));
            }
        }
        use std::borrow::Borrow;
        match self.fst.find_node_iter(path.iter().map(Borrow::borrow)) {
            Some(crate::fst::FstNode::File { offset, length, .. }) => {
                self.reader.read_into_vec(*offset, *length as u64, &mut self.buffer)?;
                Ok((Cow::Borrowed(&self.buffer), 0))
            }
            _ => Err(PartitionAddError::MissingSourceFile(path.clone())),
        }
    }
}
