// src/db/backend.rs

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::db::query::{BackendError, Query};

/// A "capacidade de consulta filtrada" do backend gerenciado.
/// Toda linha volta como objeto JSON com os nomes de coluna do banco.
#[async_trait]
pub trait QueryBackend: Send + Sync + 'static {
    async fn execute(&self, query: &Query) -> Result<Vec<Value>, BackendError>;

    /// Procedimento remoto `set_current_org`: alinha as políticas do servidor com a
    /// organização resolvida no cliente.
    async fn set_current_org(&self, org_id: Uuid) -> Result<(), BackendError>;
}

/// Armazenamento de arquivos (termos de vínculo).
#[async_trait]
pub trait BlobStorage: Send + Sync + 'static {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<(), BackendError>;

    async fn create_signed_url(&self, path: &str, ttl_secs: u64) -> Result<String, BackendError>;

    fn public_url(&self, path: &str) -> String;
}
