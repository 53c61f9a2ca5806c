use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;

/// Public URL prefix under which stored recipe images are served.
pub const PUBLIC_PREFIX: &str = "/uploads/receitas";

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;

    fn public_path(&self, key: &str) -> String {
        format!("{}/{}", PUBLIC_PREFIX, key)
    }
}

/// Maps a public path produced by [`ImageStore::public_path`] back to its key.
pub fn key_from_public_path(path: &str) -> Option<&str> {
    let key = path.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
    (!key.is_empty() && !key.contains('/') && key != "..").then_some(key)
}

/// Images written to a directory that is served statically.
#[derive(Clone)]
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub async fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create upload dir {}", root.display()))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        let rel = Path::new(key);
        let single = rel.components().count() == 1
            && matches!(rel.components().next(), Some(Component::Normal(_)));
        anyhow::ensure!(single, "invalid object key {:?}", key);
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn put_object(&self, key: &str, body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("remove {}", path.display()))?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_path_round_trips_to_key() {
        assert_eq!(key_from_public_path("/uploads/receitas/1-2.png"), Some("1-2.png"));
        assert_eq!(key_from_public_path("/uploads/receitas/"), None);
        assert_eq!(key_from_public_path("/uploads/receitas/../x"), None);
        assert_eq!(key_from_public_path("https://cdn.example/img.png"), None);
    }

    #[tokio::test]
    async fn local_store_writes_and_removes_files() {
        let dir = std::env::temp_dir().join(format!("receitas-store-{}", rand::random::<u32>()));
        let store = LocalImageStore::new(&dir).await.expect("create store");

        store
            .put_object("a.png", Bytes::from_static(b"png"), "image/png")
            .await
            .expect("put");
        assert_eq!(tokio::fs::read(dir.join("a.png")).await.unwrap(), b"png");

        store.delete_object("a.png").await.expect("delete");
        assert!(!dir.join("a.png").exists());

        assert!(store.put_object("../escape.png", Bytes::new(), "image/png").await.is_err());
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
