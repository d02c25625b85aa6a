//! Configuração do etljob carregada a partir de `etljob.toml`.
//!
//! A struct [`EtlConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `ETLJOB_BOOKMARK_DIR` tem precedência sobre o arquivo.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::args::{JOB_NAME, LOCAL_FLAG};

pub const DEFAULT_CONFIG_FILE: &str = "etljob.toml";
pub const BOOKMARK_DIR_ENV: &str = "ETLJOB_BOOKMARK_DIR";

/// Configuração de nível superior carregada de `etljob.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct EtlConfig {
    /// Diretório onde os bookmarks dos jobs são gravados.
    #[serde(default = "default_bookmark_dir")]
    pub bookmark_dir: PathBuf,

    /// Argumentos que todo job precisa receber.
    #[serde(default = "default_required_keys")]
    pub required_keys: Vec<String>,

    /// Token que, quando presente, indica execução local.
    #[serde(default = "default_local_flag")]
    pub local_flag: String,

    /// Master do engine usado em modo gerenciado.
    #[serde(default = "default_engine_master")]
    pub engine_master: String,

    /// Nível de log quando `RUST_LOG` não está definido.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Valor padrão para o diretório de bookmarks: ".etljob/bookmarks".
fn default_bookmark_dir() -> PathBuf {
    PathBuf::from(".etljob").join("bookmarks")
}

// Valor padrão para os argumentos obrigatórios: apenas JOB_NAME.
fn default_required_keys() -> Vec<String> {
    vec![JOB_NAME.to_string()]
}

fn default_local_flag() -> String {
    LOCAL_FLAG.to_string()
}

fn default_engine_master() -> String {
    "yarn".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            bookmark_dir: default_bookmark_dir(),
            required_keys: default_required_keys(),
            local_flag: default_local_flag(),
            engine_master: default_engine_master(),
            log_level: default_log_level(),
        }
    }
}

impl EtlConfig {
    /// Carrega a configuração de `path`, ou de `etljob.toml` no diretório atual.
    ///
    /// Um caminho explícito precisa existir; o arquivo padrão é opcional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                Self::from_toml_str(&contents)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    let contents = std::fs::read_to_string(path)?;
                    Self::from_toml_str(&contents)?
                } else {
                    Self::default()
                }
            }
        };

        // Variável de ambiente tem precedência sobre o arquivo de configuração.
        Ok(config.with_bookmark_dir_override(std::env::var(BOOKMARK_DIR_ENV).ok()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EtlConfig = toml::from_str(contents)?;
        Ok(config.normalized())
    }

    pub fn with_bookmark_dir_override(mut self, dir: Option<String>) -> Self {
        if let Some(dir) = dir.filter(|d| !d.trim().is_empty()) {
            self.bookmark_dir = PathBuf::from(dir);
        }
        self
    }

    // JOB_NAME é sempre obrigatório: a identidade do job depende dele.
    fn normalized(mut self) -> Self {
        if !self.required_keys.iter().any(|k| k == JOB_NAME) {
            self.required_keys.insert(0, JOB_NAME.to_string());
        }
        self
    }
}
