//! Builds an in-memory [`Fst`] by walking a host directory tree, the
//! mirror image of what the builders do when copying files back out.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::fst::{Fst, FstNode};

#[derive(thiserror::Error, Debug)]
pub enum BuildDirError {
    #[error("required path not found: {0}")]
    NotFound(PathBuf),
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("entry name is not valid unicode: {0}")]
    InvalidName(PathBuf),
}

fn build_children(dir: &Path) -> Result<Vec<FstNode>, BuildDirError> {
    let mut entries: Vec<_> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| BuildDirError::Io {
            path: e.path().unwrap_or(dir).to_path_buf(),
            source: e.into_io_error().unwrap_or_else(|| std::io::ErrorKind::Other.into()),
        })?;
    // disc FSTs are written in a stable, case-insensitive order so rebuilds are deterministic
    // and match the source image's own directory sort (original_source reads entries straight
    // off the host filesystem but relies on case-insensitive comparison when diffing trees).
    entries.sort_by_key(|e| e.file_name().to_string_lossy().to_lowercase());

    let mut nodes = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = entry.path();
        let name = entry
            .file_name()
            .to_os_string()
            .into_string()
            .map_err(|_| BuildDirError::InvalidName(path.to_path_buf()))?;
        if entry.file_type().is_dir() {
            let files = build_children(path)?;
            nodes.push(FstNode::Directory { name, files });
        } else {
            let metadata = entry
                .metadata()
                .map_err(|e| BuildDirError::Io {
                    path: path.to_path_buf(),
                    source: e.into_io_error().unwrap_or_else(|| std::io::ErrorKind::Other.into()),
                })?;
            nodes.push(FstNode::File { name, offset: 0, length: metadata.len() as u32 });
        }
    }
    Ok(nodes)
}

/// Walks `files_dir` and produces an [`Fst`] whose file offsets are
/// placeholders, to be filled in by a builder as it writes out data.
pub fn build_fst_from_directory_tree(files_dir: &Path) -> Result<Fst, BuildDirError> {
    if !files_dir.is_dir() {
        return Err(BuildDirError::NotFound(files_dir.to_path_buf()));
    }
    Ok(Fst { root: build_children(files_dir)? })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_directory_is_reported() {
        let err = build_fst_from_directory_tree(Path::new("/nonexistent/definitely/not/here"));
        assert!(matches!(err, Err(BuildDirError::NotFound(_))));
    }

    #[test]
    fn walks_nested_directories() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("a.bin"), b"hello").unwrap();
        std::fs::write(tmp.path().join("sub").join("b.bin"), b"world!").unwrap();

        let fst = build_fst_from_directory_tree(tmp.path()).unwrap();
        assert_eq!(fst.root.len(), 2);
        let dir_node = fst.root.iter().find(|n| n.get_name() == "sub").unwrap();
        match dir_node {
            FstNode::Directory { files, .. } => assert_eq!(files.len(), 1),
            _ => panic!("expected directory"),
        }
    }
}
