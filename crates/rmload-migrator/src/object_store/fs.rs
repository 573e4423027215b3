use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use rmload_shared::{IngestError, ObjectStore};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use super::VisibilityWait;

/// Copies in flight carry this suffix until they are renamed into place.
const PARTIAL_SUFFIX: &str = ".rmload-partial";

/// Map an object key onto a path under `base`.
///
/// Keys are relative, `/`-separated paths. Anything that would leave the
/// base directory is rejected.
fn key_to_path(base: &Path, key: &str) -> Result<PathBuf, IngestError> {
    let invalid = || IngestError::NotFound(format!("invalid object key: {:?}", key));

    if key.is_empty() || key.ends_with('/') || key.ends_with(PARTIAL_SUFFIX) {
        return Err(invalid());
    }

    let mut resolved = base.to_path_buf();
    for component in Path::new(key).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(invalid());
            }
        }
    }
    if resolved == base {
        return Err(invalid());
    }
    Ok(resolved)
}

fn io_error(op: &str, key: &str, err: std::io::Error) -> IngestError {
    if err.kind() == std::io::ErrorKind::NotFound {
        IngestError::NotFound(format!("{} {}: {}", op, key, err))
    } else {
        IngestError::TransientIo(format!("{} {}: {}", op, key, err))
    }
}

async fn path_exists(path: PathBuf) -> Result<bool, IngestError> {
    fs::try_exists(&path)
        .await
        .map_err(|e| IngestError::TransientIo(format!("stat {}: {}", path.display(), e)))
}

/// Object store over a local directory, one file per key.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    base_path: PathBuf,
    wait: VisibilityWait,
}

impl FsObjectStore {
    pub async fn new(base_path: &Path, wait: VisibilityWait) -> Result<Self, IngestError> {
        fs::create_dir_all(base_path).await.map_err(|e| {
            IngestError::TransientIo(format!(
                "Failed to create store directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(Self {
            base_path: base_path.to_path_buf(),
            wait,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Store `data` under `key`, creating parent directories.
    #[cfg(test)]
    pub async fn put(&self, key: &str, data: &[u8]) -> Result<(), IngestError> {
        let path = key_to_path(&self.base_path, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("mkdir", key, e))?;
        }
        fs::write(&path, data)
            .await
            .map_err(|e| io_error("write", key, e))
    }

    #[cfg(test)]
    pub async fn exists(&self, key: &str) -> Result<bool, IngestError> {
        path_exists(key_to_path(&self.base_path, key)?).await
    }

    /// Directory to start listing from: the deepest directory fully named by
    /// `prefix`.
    fn listing_root(&self, prefix: &str) -> PathBuf {
        match prefix.rfind('/') {
            Some(idx) => key_to_path(&self.base_path, &prefix[..idx])
                .unwrap_or_else(|_| self.base_path.clone()),
            None => self.base_path.clone(),
        }
    }

    fn path_to_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
        Some(parts?.join("/"))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, IngestError> {
        let mut keys = Vec::new();
        let mut pending = vec![self.listing_root(prefix)];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(io_error("list", prefix, e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| io_error("list", prefix, e))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| io_error("list", prefix, e))?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Some(key) = self.path_to_key(&path) {
                    if key.starts_with(prefix) && !key.ends_with(PARTIAL_SUFFIX) {
                        keys.push(key);
                    }
                }
            }
        }

        debug!(prefix, count = keys.len(), "Listed objects");
        Ok(keys)
    }

    async fn read(&self, key: &str) -> Result<Bytes, IngestError> {
        let path = key_to_path(&self.base_path, key)?;
        let data = fs::read(&path).await.map_err(|e| io_error("read", key, e))?;
        debug!(key, size = data.len(), "Read object");
        Ok(Bytes::from(data))
    }

    async fn relocate(&self, src: &str, dst: &str) -> Result<(), IngestError> {
        let src_path = key_to_path(&self.base_path, src)?;
        let dst_path = key_to_path(&self.base_path, dst)?;

        if !path_exists(src_path.clone()).await? {
            return Err(IngestError::NotFound(format!("relocate source {}", src)));
        }

        if let Some(parent) = dst_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| IngestError::TransientIo(format!("copy {} -> {}: {}", src, dst, e)))?;
        }

        // Copy beside the destination and rename, so `dst` never exists half-written.
        let partial = dst_path.with_file_name(format!(
            ".{}{}",
            Uuid::new_v4(),
            PARTIAL_SUFFIX
        ));
        if let Err(e) = fs::copy(&src_path, &partial).await {
            let _ = fs::remove_file(&partial).await;
            return Err(IngestError::TransientIo(format!("copy {} -> {}: {}", src, dst, e)));
        }
        if let Err(e) = fs::rename(&partial, &dst_path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(IngestError::TransientIo(format!("copy {} -> {}: {}", src, dst, e)));
        }

        let copied = dst_path.clone();
        self.wait
            .until(&format!("{} to appear", dst), true, || path_exists(copied.clone()))
            .await?;

        fs::remove_file(&src_path).await.map_err(|e| {
            IngestError::TransientIo(format!(
                "{} copied to {} but delete failed, both keys present: {}",
                src, dst, e
            ))
        })?;

        self.wait
            .until(&format!("{} to disappear", src), false, || path_exists(src_path.clone()))
            .await?;

        debug!(src, dst, "Relocated object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    async fn test_store() -> (FsObjectStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path(), VisibilityWait::new(Duration::from_millis(1), 3))
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_put_and_read() {
        let (store, _dir) = test_store().await;
        store.put("a/messages/1", b"{}").await.unwrap();

        let data = store.read("a/messages/1").await.unwrap();
        assert_eq!(&data[..], b"{}");
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (store, _dir) = test_store().await;
        let err = store.read("a/messages/404").await.unwrap_err();
        assert!(matches!(err, IngestError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let (store, _dir) = test_store().await;
        store.put("a/messages/1", b"1").await.unwrap();
        store.put("a/messages/sub/2", b"2").await.unwrap();
        store.put("a/messages-old/3", b"3").await.unwrap();
        store.put("a/users/4", b"4").await.unwrap();
        store.put("processed/a/messages/5", b"5").await.unwrap();

        let mut keys = store.list("a/messages/").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a/messages/1", "a/messages/sub/2"]);

        // Plain string prefix, as S3 does it.
        let mut keys = store.list("a/messages").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a/messages-old/3", "a/messages/1", "a/messages/sub/2"]);

        assert!(store.list("nothing/here").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_relocate_moves_object() {
        let (store, _dir) = test_store().await;
        store.put("a/messages/1", b"payload").await.unwrap();

        store
            .relocate("a/messages/1", "processed/a/messages/1")
            .await
            .unwrap();

        assert!(!store.exists("a/messages/1").await.unwrap());
        assert!(store.exists("processed/a/messages/1").await.unwrap());
        let data = store.read("processed/a/messages/1").await.unwrap();
        assert_eq!(&data[..], b"payload");
        assert!(store.list("a/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_copy_leaves_source_only() {
        let (store, _dir) = test_store().await;
        store.put("a/users/1", b"payload").await.unwrap();
        // A file where the destination directory should be makes the copy fail.
        store.put("processed", b"in the way").await.unwrap();

        let err = store
            .relocate("a/users/1", "processed/a/users/1")
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::TransientIo(_)));
        assert!(store.exists("a/users/1").await.unwrap());
        assert!(!store.exists("processed/a/users/1").await.unwrap_or(false));
    }

    #[tokio::test]
    async fn test_relocate_missing_source() {
        let (store, _dir) = test_store().await;
        let err = store.relocate("a/1", "processed/a/1").await.unwrap_err();
        assert!(matches!(err, IngestError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let (store, _dir) = test_store().await;
        assert!(store.read("../etc/passwd").await.is_err());
        assert!(store.put("/abs/key", b"x").await.is_err());
        assert!(store.put("", b"x").await.is_err());
    }
}
