//! Unpacking downloaded artifacts
//!
//! Archives are recognised by content, not by file name: zip by its local
//! header magic, tar by the `ustar` marker. Anything else is a bare executable
//! and only gets its permissions fixed.

use crate::error::{DartsHubError, Result};
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
const TAR_MAGIC: &[u8; 5] = b"ustar";
const TAR_MAGIC_OFFSET: u64 = 257;

/// Kind of a downloaded artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Zip archive
    Zip,
    /// Uncompressed tar archive
    Tar,
    /// Anything else, treated as the executable itself
    Binary,
}

/// Inspect the first bytes of `path`
pub fn detect(path: &Path) -> Result<ArtifactKind> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_ok() && magic == ZIP_MAGIC {
        return Ok(ArtifactKind::Zip);
    }

    let mut ustar = [0u8; 5];
    if file.seek(SeekFrom::Start(TAR_MAGIC_OFFSET)).is_ok()
        && file.read_exact(&mut ustar).is_ok()
        && &ustar == TAR_MAGIC
    {
        return Ok(ArtifactKind::Tar);
    }
    Ok(ArtifactKind::Binary)
}

/// Unpack `artifact` into `target_dir`
///
/// Archives are removed after extraction and the extracted file paths are
/// returned. A bare binary stays where it is, is marked executable and is
/// returned as the only path.
pub fn unpack(artifact: &Path, target_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(target_dir)?;
    let kind = detect(artifact)?;
    debug!("Unpacking {} as {kind:?}", artifact.display());

    let files = match kind {
        ArtifactKind::Zip => {
            let files = extract_zip(artifact, target_dir)?;
            fs::remove_file(artifact)?;
            files
        }
        ArtifactKind::Tar => {
            let files = extract_tar(artifact, target_dir)?;
            fs::remove_file(artifact)?;
            files
        }
        ArtifactKind::Binary => {
            make_executable(artifact)?;
            vec![artifact.to_path_buf()]
        }
    };

    info!(
        "Unpacked {} file(s) from {}",
        files.len(),
        artifact.display()
    );
    Ok(files)
}

fn extract_zip(artifact: &Path, target_dir: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(artifact)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut extracted = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            debug!("Skipping unsafe zip entry {}", entry.name());
            continue;
        };
        let out_path = target_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out_file = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out_file)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))?;
        }

        extracted.push(out_path);
    }
    Ok(extracted)
}

fn extract_tar(artifact: &Path, target_dir: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(artifact)?;
    let mut archive = tar::Archive::new(file);
    archive.set_preserve_permissions(true);
    let mut extracted = Vec::new();

    let entries = archive.entries().map_err(|e| extract_error(artifact, &e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| extract_error(artifact, &e))?;
        let relative = entry
            .path()
            .map_err(|e| extract_error(artifact, &e))?
            .into_owned();
        // unpack_in refuses entries escaping target_dir and returns false for them
        if entry
            .unpack_in(target_dir)
            .map_err(|e| extract_error(artifact, &e))?
            && entry.header().entry_type().is_file()
        {
            extracted.push(target_dir.join(relative));
        }
    }
    Ok(extracted)
}

fn extract_error(artifact: &Path, e: &std::io::Error) -> DartsHubError {
    DartsHubError::Extract {
        path: artifact.display().to_string(),
        reason: e.to_string(),
    }
}

/// Mark a file executable for its owner, group and others (unix only)
pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let mut permissions = fs::metadata(path)?.permissions();
        permissions.set_mode(permissions.mode() | 0o755);
        fs::set_permissions(path, permissions)?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Remove `dir` with all content and create it empty again
pub fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default().unix_permissions(0o755);
        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }

    fn write_tar(path: &Path, name: &str, content: &[u8]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(file);
        let mut header = tar::Header::new_ustar();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, name, content).unwrap();
        builder.finish().unwrap();
    }

    #[test]
    fn test_detect_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("a.bin");
        write_zip(&zip_path, &[("x", b"1")]);
        assert_eq!(detect(&zip_path).unwrap(), ArtifactKind::Zip);

        let tar_path = dir.path().join("b.bin");
        write_tar(&tar_path, "x", b"1");
        assert_eq!(detect(&tar_path).unwrap(), ArtifactKind::Tar);

        let bin_path = dir.path().join("c.bin");
        fs::write(&bin_path, b"MZ\x90\x00").unwrap();
        assert_eq!(detect(&bin_path).unwrap(), ArtifactKind::Binary);
    }

    #[test]
    fn test_unpack_zip_removes_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("darts-wled.zip");
        write_zip(
            &archive,
            &[("darts-wled", b"#!/bin/sh\n"), ("effects/readme.txt", b"hi")],
        );

        let target = dir.path().join("out");
        let files = unpack(&archive, &target).unwrap();
        assert_eq!(files.len(), 2);
        assert!(target.join("darts-wled").exists());
        assert_eq!(
            fs::read_to_string(target.join("effects/readme.txt")).unwrap(),
            "hi"
        );
        assert!(!archive.exists());
    }

    #[test]
    fn test_unpack_tar() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("autodarts.tar");
        write_tar(&archive, "autodarts", b"binary");

        let target = dir.path().join("out");
        let files = unpack(&archive, &target).unwrap();
        assert_eq!(files, vec![target.join("autodarts")]);
        assert_eq!(fs::read(target.join("autodarts")).unwrap(), b"binary");
    }

    #[test]
    #[cfg(unix)]
    fn test_unpack_binary_marks_executable() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("darts-caller");
        fs::write(&binary, b"\x7fELF").unwrap();
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o644)).unwrap();

        let files = unpack(&binary, dir.path()).unwrap();
        assert_eq!(files, vec![binary.clone()]);
        let mode = fs::metadata(&binary).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn test_recreate_dir_clears_content() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        fs::create_dir_all(staging.join("old")).unwrap();
        fs::write(staging.join("old/file"), b"x").unwrap();

        recreate_dir(&staging).unwrap();
        assert!(staging.exists());
        assert_eq!(fs::read_dir(&staging).unwrap().count(), 0);
    }
}
