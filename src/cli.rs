//! Interface de linha de comando do etljob baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, show, reset)
//! e flags globais (--config, --verbose).
//!
//! Em `run`, tudo o que vem depois do subcomando pertence ao job: as flags
//! globais precisam aparecer antes de `run` (`etljob --verbose run ...`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// etljob — ciclo de vida e commit de bookmarks para jobs ETL incrementais.
#[derive(Debug, Parser)]
#[command(name = "etljob", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho para o arquivo de configuração (padrão: ./etljob.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Executa um job com os argumentos fornecidos (ex.: --JOB_NAME daily_etl --LOCAL).
    ///
    /// Flags globais vão antes de `run`; depois dele são argumentos do job.
    #[command(after_help = "Global flags must come before `run`: etljob --verbose run --JOB_NAME daily_etl")]
    Run {
        /// Argumentos do job, repassados sem alteração (inclusive --verbose/--config).
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Mostra o bookmark gravado de um job.
    Show {
        /// Nome do job.
        job_name: String,
    },

    /// Apaga o bookmark de um job; a próxima execução reprocessa tudo.
    Reset {
        /// Nome do job.
        job_name: String,
    },
}
