use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

// ── Trait ────────────────────────────────────────────────────────────

/// Object storage for document bytes. Keys are opaque handles persisted on
/// the Document row; stored bytes are written once and never mutated.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store bytes under a fresh key scoped to the application.
    /// Returns the opaque storage key.
    async fn put(
        &self,
        application_id: Uuid,
        filename: &str,
        bytes: &[u8],
    ) -> Result<String, String>;

    /// Read back stored bytes.
    async fn get(&self, key: &str) -> Result<Vec<u8>, String>;

    /// Delete an object. Missing objects are not an error.
    async fn delete(&self, key: &str) -> Result<(), String>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> bool;
}

// ── Local disk implementation ───────────────────────────────────────

/// Filesystem-backed store rooted at `UPLOAD_ROOT`.
/// Layout: `{root}/{application_id}/{uuid}_{safe_filename}`.
pub struct LocalDiskStore {
    root: PathBuf,
}

impl LocalDiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Strip any path components from a client-supplied filename.
    fn safe_name(filename: &str) -> String {
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.is_empty() {
            "uploaded-document".to_string()
        } else {
            name
        }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, String> {
        // Keys are produced by `put` and contain no traversal segments;
        // reject anything else that claims otherwise.
        if key.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(format!("invalid storage key: {key}"));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl DocumentStore for LocalDiskStore {
    async fn put(
        &self,
        application_id: Uuid,
        filename: &str,
        bytes: &[u8],
    ) -> Result<String, String> {
        let key = format!(
            "{}/{}_{}",
            application_id,
            Uuid::new_v4(),
            Self::safe_name(filename)
        );
        let path = self.resolve(&key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("failed to create storage dir: {e}"))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| format!("failed to write document bytes: {e}"))?;
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, String> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| format!("failed to read stored document: {e}"))
    }

    async fn delete(&self, key: &str) -> Result<(), String> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(format!("failed to delete stored document: {e}")),
        }
    }

    async fn exists(&self, key: &str) -> bool {
        match self.resolve(key) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

// ── In-memory implementation (tests) ────────────────────────────────

/// Map-backed store for tests; same key layout as the disk store.
#[derive(Default)]
pub struct MemoryStore {
    objects: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn put(
        &self,
        application_id: Uuid,
        filename: &str,
        bytes: &[u8],
    ) -> Result<String, String> {
        let key = format!(
            "{}/{}_{}",
            application_id,
            Uuid::new_v4(),
            LocalDiskStore::safe_name(filename)
        );
        self.objects
            .lock()
            .unwrap()
            .insert(key.clone(), bytes.to_vec());
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| format!("no such object: {key}"))
    }

    async fn delete(&self, key: &str) -> Result<(), String> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_name_strips_path_components() {
        assert_eq!(LocalDiskStore::safe_name("passport.pdf"), "passport.pdf");
        assert_eq!(LocalDiskStore::safe_name("../../etc/passwd"), "passwd");
        assert_eq!(LocalDiskStore::safe_name("dir/nested/scan.png"), "scan.png");
        assert_eq!(LocalDiskStore::safe_name(""), "uploaded-document");
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        let app_id = Uuid::new_v4();
        let key = store.put(app_id, "doc.pdf", b"hello").await.unwrap();
        assert!(key.starts_with(&app_id.to_string()));
        assert!(store.exists(&key).await);
        assert_eq!(store.get(&key).await.unwrap(), b"hello");
        store.delete(&key).await.unwrap();
        assert!(!store.exists(&key).await);
    }

    #[tokio::test]
    async fn disk_store_roundtrip() {
        let root = std::env::temp_dir().join(format!("medborger-store-{}", Uuid::new_v4()));
        let store = LocalDiskStore::new(&root);
        let app_id = Uuid::new_v4();
        let key = store.put(app_id, "scan.png", b"bytes").await.unwrap();
        assert!(store.exists(&key).await);
        assert_eq!(store.get(&key).await.unwrap(), b"bytes");
        store.delete(&key).await.unwrap();
        assert!(!store.exists(&key).await);
        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn disk_store_rejects_traversal_keys() {
        let store = LocalDiskStore::new("/tmp/medborger-never-used");
        assert!(store.get("../outside").await.is_err());
        assert!(!store.exists("../outside").await);
    }
}
