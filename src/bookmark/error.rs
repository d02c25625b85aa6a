//! Tipos de erro do armazenamento de bookmarks.
//!
//! Define [`StoreError`] com variantes para falhas de I/O, de serialização,
//! de bookmark gravado para outro job e de indisponibilidade do serviço.
//! Usa `thiserror` para derivar `Display` e `Error` a partir dos atributos
//! `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao ler, gravar ou apagar um bookmark.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Falha de I/O no sistema de arquivos subjacente.
    #[error("bookmark I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// O bookmark gravado não é um JSON válido.
    #[error("bookmark is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// O arquivo lido pertence a outro job.
    #[error("bookmark belongs to job {found}, expected {expected}")]
    JobMismatch { expected: String, found: String },

    /// O serviço de persistência recusou ou não atendeu a chamada.
    #[error("bookmark store unavailable: {0}")]
    Unavailable(String),
}
