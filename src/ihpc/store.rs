//! Reading and atomically rewriting the SSH client configuration file.
//!
//! A missing file reads as empty text. Writes go to a temp file next to the
//! target which is then renamed over it, so a crash mid-write never leaves a
//! truncated config behind. A symlinked config is written through to the file
//! it points at, and an existing file keeps its mode.

use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, info};

use super::error::IhpcError;

/// Mode of a config file this tool creates.
const NEW_FILE_MODE: u32 = 0o600;
/// Mode of a `.ssh` directory this tool creates.
const NEW_DIR_MODE: u32 = 0o700;

pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full config text, or an empty string when the file does not exist.
    pub async fn load(&self) -> Result<String, IhpcError> {
        match fs::read_to_string(&self.path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} does not exist, starting empty", self.path.display());
                Ok(String::new())
            }
            Err(source) => Err(IhpcError::ConfigRead {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Replace the config with `text`.
    pub async fn save(&self, text: &str) -> Result<(), IhpcError> {
        let write_error = |source| IhpcError::ConfigWrite {
            path: self.path.clone(),
            source,
        };

        let target = resolve_target(&self.path).await.map_err(write_error)?;
        if target != self.path {
            debug!("{} is a link to {}", self.path.display(), target.display());
        }

        let contents = text.to_string();
        tokio::task::spawn_blocking(move || write_atomic(&target, &contents))
            .await
            .map_err(io::Error::other)
            .and_then(|result| result)
            .map_err(write_error)?;

        info!("Wrote {} ({} bytes)", self.path.display(), text.len());
        Ok(())
    }
}

/// The file a write to `path` should replace: the link target when `path`
/// is a symlink, otherwise `path` itself.
async fn resolve_target(path: &Path) -> io::Result<PathBuf> {
    match fs::symlink_metadata(path).await {
        Ok(meta) if meta.file_type().is_symlink() => match fs::canonicalize(path).await {
            Ok(real) => Ok(real),
            // Dangling link: create the file it names.
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let link = fs::read_link(path).await?;
                Ok(match path.parent() {
                    Some(dir) => dir.join(link),
                    None => link,
                })
            }
            Err(e) => Err(e),
        },
        _ => Ok(path.to_path_buf()),
    }
}

fn write_atomic(target: &Path, text: &str) -> io::Result<()> {
    let dir = match target.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_mode(&dir, NEW_DIR_MODE)?;
    }

    let mode = existing_mode(target).unwrap_or(NEW_FILE_MODE);
    let mut temp = NamedTempFile::new_in(&dir)?;
    temp.write_all(text.as_bytes())?;
    temp.as_file().sync_all()?;
    set_mode(temp.path(), mode)?;
    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn existing_mode(path: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .ok()
        .map(|meta| meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn existing_mode(_path: &Path) -> Option<u32> {
    None
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config"));
        assert_eq!(store.load().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config"));
        store.save("Host uts\n  User alice\n").await.unwrap();
        assert_eq!(store.load().await.unwrap(), "Host uts\n  User alice\n");
    }

    #[tokio::test]
    async fn test_save_replaces_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config"));
        store.save("a much longer first version\n").await.unwrap();
        store.save("short\n").await.unwrap();
        assert_eq!(store.load().await.unwrap(), "short\n");
    }

    #[tokio::test]
    async fn test_save_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".ssh").join("config");
        let store = ConfigStore::new(&path);
        store.save("Host x\n").await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config"));
        store.save("Host x\n").await.unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("config")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        ConfigStore::new(&path).save("Host x\n").await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_existing_mode_kept() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, "Host old\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        ConfigStore::new(&path).save("Host new\n").await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_config_written_through() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("dotfiles_config");
        let link = dir.path().join("config");
        std::fs::write(&real, "Host old\n").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let store = ConfigStore::new(&link);
        store.save("Host new\n").await.unwrap();

        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_to_string(&real).unwrap(), "Host new\n");
        assert_eq!(store.load().await.unwrap(), "Host new\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink_creates_target() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("dotfiles_config");
        let link = dir.path().join("config");
        std::os::unix::fs::symlink("dotfiles_config", &link).unwrap();

        ConfigStore::new(&link).save("Host new\n").await.unwrap();

        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_to_string(&real).unwrap(), "Host new\n");
    }

    #[tokio::test]
    async fn test_directory_path_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        assert!(matches!(
            store.load().await,
            Err(IhpcError::ConfigRead { .. })
        ));
    }
}
