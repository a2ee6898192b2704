//! XDG trash relocation.
//!
//! A trashed file moves into `$XDG_DATA_HOME/Trash/files/` and gets a
//! matching `Trash/info/<name>.trashinfo` record holding its original
//! path and deletion time.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::debug;

use crate::{BackendKind, MufsError};

/// The trash directory of the current user, if the platform has one.
pub(crate) fn trash_dir() -> Option<PathBuf> {
    if cfg!(unix) && !cfg!(target_os = "macos") {
        dirs::data_dir().map(|d| d.join("Trash"))
    } else {
        None
    }
}

/// Move `path` into the trash rooted at `trash`.
pub(crate) fn move_to_trash(path: &Path, trash: &Path) -> Result<PathBuf, MufsError> {
    let original = path.display().to_string();
    let files = trash.join("files");
    let info = trash.join("info");
    fs::create_dir_all(&files).map_err(|e| MufsError::io("move_to_trash", &original, e))?;
    fs::create_dir_all(&info).map_err(|e| MufsError::io("move_to_trash", &original, e))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| MufsError::not_supported("move_to_trash", BackendKind::Filesystem))?;

    // Reserve the info record first; its name decides the trashed name.
    let (trashed_name, mut record) = reserve_info(&info, &files, &name)
        .map_err(|e| MufsError::io("move_to_trash", &original, e))?;
    let contents = format!(
        "[Trash Info]\nPath={}\nDeletionDate={}\n",
        path.display(),
        Local::now().format("%Y-%m-%dT%H:%M:%S")
    );
    let info_path = info.join(format!("{trashed_name}.trashinfo"));
    if let Err(e) = record.write_all(contents.as_bytes()) {
        let _ = fs::remove_file(&info_path);
        return Err(MufsError::io("move_to_trash", &original, e));
    }

    let destination = files.join(&trashed_name);
    if let Err(e) = fs::rename(path, &destination) {
        let _ = fs::remove_file(&info_path);
        return Err(MufsError::io("move_to_trash", &original, e));
    }
    debug!(from = %original, to = %destination.display(), "moved to trash");
    Ok(destination)
}

/// Create `info/<name>.trashinfo` exclusively, adding a counter while
/// either the record or `files/<name>` is taken.
fn reserve_info(info: &Path, files: &Path, name: &str) -> std::io::Result<(String, fs::File)> {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (name, String::new()),
    };
    let mut counter = 0u32;
    loop {
        let candidate = if counter == 0 {
            name.to_string()
        } else {
            format!("{stem}_{counter}{ext}")
        };
        if files.join(&candidate).exists() {
            counter += 1;
            continue;
        }
        let record = info.join(format!("{candidate}.trashinfo"));
        match fs::OpenOptions::new().write(true).create_new(true).open(&record) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => counter += 1,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_info_record_and_moves_file() {
        let home = tempfile::tempdir().unwrap();
        let trash = home.path().join("Trash");
        let victim = home.path().join("notes.txt");
        fs::write(&victim, b"bye").unwrap();

        let moved = move_to_trash(&victim, &trash).unwrap();
        assert!(!victim.exists());
        assert_eq!(fs::read(&moved).unwrap(), b"bye");

        let record = fs::read_to_string(trash.join("info/notes.txt.trashinfo")).unwrap();
        assert!(record.starts_with("[Trash Info]\n"));
        assert!(record.contains(&format!("Path={}", victim.display())));
        assert!(record.contains("DeletionDate="));
    }

    #[test]
    fn name_collisions_get_a_counter() {
        let home = tempfile::tempdir().unwrap();
        let trash = home.path().join("Trash");
        for _ in 0..2 {
            let victim = home.path().join("a.txt");
            fs::write(&victim, b"x").unwrap();
            move_to_trash(&victim, &trash).unwrap();
        }
        assert!(trash.join("files/a.txt").exists());
        assert!(trash.join("files/a_1.txt").exists());
        assert!(trash.join("info/a_1.txt.trashinfo").exists());
    }
}
