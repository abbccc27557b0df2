//! Filesystem blob store for product pictures.
//!
//! One JPEG per product, named `{product_id}.jpg` under the configured image
//! directory. File names are formatted from parsed UUIDs, never from raw
//! client input, so no traversal is possible.

use std::{
  io,
  path::{Path, PathBuf},
};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

/// Largest accepted picture payload. Matches the request body cap.
pub const MAX_PICTURE_BYTES: usize = 10_000_000;

#[derive(Debug, Clone)]
pub struct ImageStore {
  base_dir: PathBuf,
}

impl ImageStore {
  /// Create the image directory if needed and return a handle to it.
  pub async fn open(base_dir: PathBuf) -> io::Result<Self> {
    fs::create_dir_all(&base_dir).await?;
    info!(path = %base_dir.display(), "image store initialised");
    Ok(Self { base_dir })
  }

  pub fn base_dir(&self) -> &Path { &self.base_dir }

  /// Write (or replace) the primary picture for `product_id`.
  pub async fn put(&self, product_id: Uuid, bytes: &[u8]) -> io::Result<()> {
    let path = self.path_for(product_id);
    fs::write(&path, bytes).await?;
    debug!(product = %product_id, size = bytes.len(), "stored picture");
    Ok(())
  }

  /// Read the picture for `product_id`, or `None` when there is none.
  pub async fn get(&self, product_id: Uuid) -> io::Result<Option<Vec<u8>>> {
    match fs::read(self.path_for(product_id)).await {
      Ok(bytes) => Ok(Some(bytes)),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e),
    }
  }

  /// Remove the picture for `product_id`. Missing files are fine — not
  /// every product has one.
  pub async fn delete(&self, product_id: Uuid) -> io::Result<()> {
    match fs::remove_file(self.path_for(product_id)).await {
      Ok(()) => {
        debug!(product = %product_id, "deleted picture");
        Ok(())
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e),
    }
  }

  fn path_for(&self, product_id: Uuid) -> PathBuf {
    self.base_dir.join(format!("{product_id}.jpg"))
  }
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  async fn store() -> (ImageStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = ImageStore::open(dir.path().to_path_buf()).await.unwrap();
    (store, dir)
  }

  #[tokio::test]
  async fn put_then_get_round_trips() {
    let (store, _dir) = store().await;
    let id = Uuid::new_v4();

    store.put(id, b"jpeg-bytes").await.unwrap();
    let read = store.get(id).await.unwrap();
    assert_eq!(read.as_deref(), Some(&b"jpeg-bytes"[..]));
  }

  #[tokio::test]
  async fn get_missing_is_none() {
    let (store, _dir) = store().await;
    assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn delete_is_idempotent() {
    let (store, _dir) = store().await;
    let id = Uuid::new_v4();
    store.put(id, b"x").await.unwrap();

    store.delete(id).await.unwrap();
    assert!(store.get(id).await.unwrap().is_none());
    // Deleting again (or a product that never had a picture) is fine.
    store.delete(id).await.unwrap();
  }
}
