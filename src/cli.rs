//! Interface de linha de comando baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, status, demo)
//! e flags globais que sobrescrevem valores de `forecast.toml`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ForecastConfig;

/// Submete previsões ao serviço de inferência e exporta os dados do painel.
#[derive(Debug, Parser)]
#[command(name = "forecast-relay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho alternativo para o arquivo de configuração.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Diretório de saída dos metadados.
    #[arg(long, short, global = true)]
    pub output: Option<PathBuf>,

    /// Segundos entre consultas de status.
    #[arg(long, global = true)]
    pub poll_interval: Option<u64>,

    /// Número máximo de retentativas após falhas transitórias.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submete um job de previsão, aguarda o resultado e exporta o painel.
    Run {
        /// Seletor da condição inicial.
        #[arg(long, default_value = "0")]
        input: String,

        /// Número de amostras do ensemble.
        #[arg(long, default_value_t = 1)]
        samples: u32,

        /// Número de passos de previsão.
        #[arg(long, default_value_t = 12)]
        steps: u32,
    },

    /// Consulta uma única vez o status de um job já submetido.
    Status {
        /// Identificador devolvido pelo serviço.
        job_id: String,
    },

    /// Gera o painel apenas com dados sintéticos, sem chamar o serviço.
    Demo {
        /// Número de passos de previsão.
        #[arg(long, default_value_t = 12)]
        steps: u32,
    },
}

impl Cli {
    /// Aplica as flags da linha de comando sobre a configuração carregada.
    pub fn apply(&self, config: &mut ForecastConfig) {
        if let Some(dir) = &self.output {
            config.output_dir = dir.clone();
        }
        if let Some(secs) = self.poll_interval {
            config.remote.poll_interval_seconds = secs;
        }
        if let Some(retries) = self.max_retries {
            config.remote.max_retries = retries;
        }
    }
}
