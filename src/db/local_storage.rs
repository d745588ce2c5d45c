// src/db/local_storage.rs

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::db::{backend::BlobStorage, query::BackendError};

/// Armazenamento de termos em disco. Não assina URLs: quem consome cai na URL pública.
pub struct LocalBlobStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, BackendError> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || path.is_empty() {
            return Err(BackendError::new(None, Some(400), format!("caminho inválido: {path}")));
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(e: std::io::Error) -> BackendError {
    let status = match e.kind() {
        std::io::ErrorKind::AlreadyExists => 409,
        std::io::ErrorKind::NotFound => 404,
        _ => 500,
    };
    BackendError::new(None, Some(status), e.to_string())
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<(), BackendError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        // Sem upsert: um arquivo já existente é erro.
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .map_err(io_error)?;
        file.write_all(bytes).await.map_err(io_error)?;
        file.flush().await.map_err(io_error)?;
        tracing::debug!(path, size = bytes.len(), "termo gravado");
        Ok(())
    }

    async fn create_signed_url(&self, _path: &str, _ttl_secs: u64) -> Result<String, BackendError> {
        Err(BackendError::new(None, Some(501), "armazenamento local não assina URLs"))
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_once_and_refuses_traversal() {
        let root = std::env::temp_dir().join(format!("medlux-storage-{}", uuid::Uuid::new_v4()));
        let storage = LocalBlobStorage::new(&root, "http://localhost:3000/files/");

        storage.upload("termos/OB-1/LX-1/1_termo.pdf", b"%PDF").await.unwrap();
        assert_eq!(tokio::fs::read(root.join("termos/OB-1/LX-1/1_termo.pdf")).await.unwrap(), b"%PDF");

        let again = storage.upload("termos/OB-1/LX-1/1_termo.pdf", b"x").await.unwrap_err();
        assert_eq!(again.status, Some(409));
        assert!(storage.upload("../fora.pdf", b"x").await.is_err());

        assert!(storage.create_signed_url("termos/x.pdf", 600).await.is_err());
        assert_eq!(storage.public_url("termos/x.pdf"), "http://localhost:3000/files/termos/x.pdf");

        let _ = tokio::fs::remove_dir_all(root).await;
    }
}
