//! Interface de terminal — spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`JobProgress`] acompanha visualmente
//! um job remoto enquanto ele é submetido e consultado.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::dashboard::ExportReport;
use crate::orchestrator::RunObserver;
use crate::remote::{DecodedPayload, JobError};
use crate::state_machine::{JobReport, JobState};

/// Indicador visual de progresso para um job no terminal.
///
/// Exibe um spinner animado durante a espera e mensagens coloridas para
/// sucesso (verde), falha (vermelho) e retentativa (amarelo).
pub struct JobProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    description: String,
    green: Style,
    red: Style,
    yellow: Style,
}

impl JobProgress {
    /// Inicia o spinner com a descrição do job.
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("{}: {description}", JobState::Submitted));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            description: description.to_string(),
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner e exibe o resultado do job.
    pub fn complete(&self, result: &Result<DecodedPayload, JobError>) {
        self.pb.finish_and_clear();
        match result {
            Ok(payload) if payload.is_undecoded() => {
                println!(
                    "  {} Job completed, payload left undecoded ({})",
                    self.yellow.apply_to("!"),
                    payload.content_type()
                );
            }
            Ok(payload) => {
                println!(
                    "  {} Job completed ({})",
                    self.green.apply_to("✓"),
                    payload.content_type()
                );
            }
            Err(err) => {
                println!("  {} Job failed: {err}", self.red.apply_to("✗"));
            }
        }
    }

    /// Imprime o registro de auditoria formatado em JSON.
    pub fn print_report(&self, report: &JobReport) {
        let style = match report.final_state {
            JobState::Completed => &self.green,
            JobState::Rejected | JobState::InvalidHandle => &self.red,
            _ => &self.yellow,
        };
        println!();
        println!("{}", style.apply_to("─── Job Report ───"));
        println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
    }
}

/// Resume o que foi exportado para o painel.
pub fn print_export(report: &ExportReport) {
    let green = Style::new().green().bold();
    let yellow = Style::new().yellow();
    if let Some(reason) = &report.fallback_reason {
        println!("  {} Placeholder data used: {reason}", yellow.apply_to("↻"));
    }
    println!(
        "  {} Exported {} frames ({:?})",
        green.apply_to("✓"),
        report.frames,
        report.source
    );
    for file in &report.files {
        println!("    {}", file.display());
    }
}

impl RunObserver for JobProgress {
    fn on_state(&self, state: JobState) {
        self.pb.set_message(format!("{state}: {}", self.description));
    }

    fn on_retry(&self, attempt: u32, max: u32, reason: &JobError) {
        self.pb.println(format!(
            "  {} Retry {attempt}/{max}: {reason}",
            self.yellow.apply_to("↻")
        ));
    }
}
