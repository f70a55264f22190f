//! Filesystem primitives shared across stages.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

/// Copy a file or a directory tree to `dst`, replacing existing files.
///
/// A directory's contents land inside `dst`; a file is written at `dst`.
/// Returns every destination file written.
pub fn copy_path(src: &Path, dst: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let meta =
        fs::metadata(src).with_context(|| format!("Failed to stat source: {}", src.display()))?;
    if meta.is_dir() {
        fs::create_dir_all(dst)
            .with_context(|| format!("Failed to create directory: {}", dst.display()))?;
        let mut written = Vec::new();
        copy_tree(src, dst, &mut written)?;
        Ok(written)
    } else {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        copy_file(src, dst)?;
        Ok(vec![dst.to_path_buf()])
    }
}

fn copy_tree(src: &Path, dst: &Path, written: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read dir: {}", src.display()))?
    {
        let entry =
            entry.with_context(|| format!("Failed to read dir entry: {}", src.display()))?;
        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat dir entry: {}", entry.path().display()))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());

        if ty.is_dir() {
            fs::create_dir_all(&to)
                .with_context(|| format!("Failed to create directory: {}", to.display()))?;
            copy_tree(&from, &to, written)?;
        } else if ty.is_file() {
            copy_file(&from, &to)?;
            written.push(to);
        } else {
            anyhow::bail!("Unsupported filesystem entry type at {}", from.display());
        }
    }
    Ok(())
}

fn copy_file(from: &Path, to: &Path) -> anyhow::Result<()> {
    fs::copy(from, to).with_context(|| {
        format!(
            "Failed to copy file from {} to {}",
            from.display(),
            to.display()
        )
    })?;
    Ok(())
}

/// Every regular file under `dir`, as sorted paths relative to `dir`.
pub fn list_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_files(dir, Path::new(""), &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files(dir: &Path, prefix: &Path, files: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to read dir: {}", dir.display()))?
    {
        let entry =
            entry.with_context(|| format!("Failed to read dir entry: {}", dir.display()))?;
        let relative = prefix.join(entry.file_name());
        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat dir entry: {}", entry.path().display()))?;
        if ty.is_dir() {
            collect_files(&entry.path(), &relative, files)?;
        } else if ty.is_file() {
            files.push(relative);
        }
    }
    Ok(())
}

/// Final path component, kept byte-for-byte.
pub fn base_name(path: &Path) -> anyhow::Result<OsString> {
    path.file_name()
        .map(OsStr::to_os_string)
        .ok_or_else(|| anyhow::anyhow!("Path has no file name: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_path_copies_nested_tree() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("classes")).expect("create_dir_all");
        fs::write(src.join("classes").join("A.cls"), "a").expect("write");
        fs::write(src.join("top.txt"), "t").expect("write");

        let dst = tmp.path().join("dst");
        let written = copy_path(&src, &dst).expect("copy should succeed");

        assert_eq!(written.len(), 2);
        assert_eq!(
            fs::read_to_string(dst.join("classes").join("A.cls")).expect("read"),
            "a"
        );
    }

    #[test]
    fn copy_path_creates_parent_for_single_file() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let src = tmp.path().join("A.cls");
        fs::write(&src, "a").expect("write");

        let dst = tmp.path().join("deep").join("er").join("A.cls");
        copy_path(&src, &dst).expect("copy should succeed");

        assert!(dst.is_file());
    }

    #[test]
    fn copy_path_replaces_existing_file() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let src = tmp.path().join("A.cls");
        let dst = tmp.path().join("B.cls");
        fs::write(&src, "new").expect("write");
        fs::write(&dst, "old").expect("write");

        copy_path(&src, &dst).expect("copy should succeed");
        assert_eq!(fs::read_to_string(&dst).expect("read"), "new");
    }

    #[test]
    fn copy_path_missing_source_fails() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let result = copy_path(&tmp.path().join("missing"), &tmp.path().join("dst"));
        assert!(result.is_err());
    }

    #[test]
    fn list_files_is_relative_and_recursive() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        fs::create_dir_all(tmp.path().join("a").join("b")).expect("create_dir_all");
        fs::write(tmp.path().join("a").join("b").join("x.txt"), "x").expect("write");
        fs::write(tmp.path().join("y.txt"), "y").expect("write");

        let mut files = list_files(tmp.path()).expect("list should succeed");
        files.sort();
        assert_eq!(
            files,
            vec![PathBuf::from("a/b/x.txt"), PathBuf::from("y.txt")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn base_name_keeps_raw_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let name = OsStr::from_bytes(b"metadataPackage_\xff");
        let path = Path::new("/tmp").join(name);

        assert_eq!(base_name(&path).expect("has a name"), name.to_os_string());
        assert!(base_name(Path::new("/")).is_err());
    }
}
