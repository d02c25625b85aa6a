//! Interface de terminal do etljob — spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`RunProgress`] acompanha visualmente
//! a execução de um job no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::bookmark::Bookmark;
use crate::lifecycle::{CommitOutcome, JobState, RunRecord};
use crate::runner::JobRun;

/// Indicador visual de progresso para a execução de um job no terminal.
///
/// Exibe um spinner animado durante o processamento e mensagens
/// coloridas para commit (verde), falha (vermelho) e bookmark mantido (amarelo).
pub struct RunProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para avisos.
    yellow: Style,
}

impl RunProgress {
    /// Inicia o spinner com a descrição da execução.
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(description.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner e exibe o resultado da execução.
    pub fn complete(&self, run: &JobRun) {
        self.pb.finish_and_clear();
        match &run.outcome {
            Ok(CommitOutcome::Persisted(bookmark)) => {
                println!(
                    "  {} Job committed, bookmark advanced to run {}",
                    self.green.apply_to("✓"),
                    bookmark.run
                );
            }
            Ok(CommitOutcome::Skipped(option)) => {
                println!(
                    "  {} Job committed, bookmark unchanged ({option})",
                    self.yellow.apply_to("✓")
                );
            }
            Err(e) => {
                println!("  {} Job failed [{}]: {e}", self.red.apply_to("✗"), e.kind());
            }
        }
    }

    /// Imprime o registro da execução formatado em JSON com estilo colorido.
    pub fn print_record(&self, record: &RunRecord) {
        let status_style = match record.state {
            JobState::Committed => &self.green,
            JobState::Failed => &self.red,
            _ => &self.yellow,
        };
        println!();
        println!("{}", status_style.apply_to("─── Run Record ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(record).unwrap_or_default()
        );
    }
}

/// Imprime um bookmark gravado, ou um aviso quando o job não tem nenhum.
pub fn print_bookmark(job_name: &str, bookmark: Option<&Bookmark>) {
    match bookmark {
        Some(bookmark) => println!(
            "{}",
            serde_json::to_string_pretty(bookmark).unwrap_or_default()
        ),
        None => println!(
            "  {} No bookmark stored for job {job_name}",
            Style::new().yellow().apply_to("•")
        ),
    }
}
