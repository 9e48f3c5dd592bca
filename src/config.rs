//! Configuração carregada a partir de `forecast.toml`.
//!
//! [`ForecastConfig`] reúne os parâmetros da execução e a tabela `[remote]`
//! ([`RemoteConfig`]) usada pelo cliente de jobs. Valores ausentes no arquivo
//! usam defaults sensíveis. As variáveis de ambiente `FORECAST_API_KEY` e
//! `FORECAST_ENDPOINT` têm precedência sobre o arquivo.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::state_machine::RetryPolicy;

/// Arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "forecast.toml";

/// Parâmetros do serviço de inferência remoto.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// URL do endpoint de submissão.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Token bearer. Normalmente vem de `FORECAST_API_KEY`.
    #[serde(default)]
    pub credential: String,

    /// Base das URLs de status; `{endpoint}/status` quando ausente.
    #[serde(default)]
    pub status_endpoint: Option<String>,

    /// Cabeçalho da resposta 202 que carrega o id do job.
    #[serde(default = "default_job_id_header")]
    pub job_id_header: String,

    /// Intervalo entre consultas de status, em segundos.
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,

    /// Retentativas após falhas transitórias (total de tentativas = 1 + max_retries).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pausa entre retentativas, em segundos.
    #[serde(default = "default_retry_cooldown_seconds")]
    pub retry_cooldown_seconds: u64,

    /// Limite de consultas de status antes de desistir de esperar.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    /// Timeout de cada requisição HTTP, em segundos.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8000/v1/infer".to_string()
}

fn default_job_id_header() -> String {
    "x-job-id".to_string()
}

fn default_poll_interval_seconds() -> u64 {
    30
}

// Três submissões no total.
fn default_max_retries() -> u32 {
    2
}

fn default_retry_cooldown_seconds() -> u64 {
    10
}

fn default_max_polls() -> u32 {
    120
}

fn default_request_timeout_seconds() -> u64 {
    300
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            credential: String::new(),
            status_endpoint: None,
            job_id_header: default_job_id_header(),
            poll_interval_seconds: default_poll_interval_seconds(),
            max_retries: default_max_retries(),
            retry_cooldown_seconds: default_retry_cooldown_seconds(),
            max_polls: default_max_polls(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl RemoteConfig {
    /// Base das URLs de status, sem barra final.
    pub fn status_endpoint(&self) -> String {
        match &self.status_endpoint {
            Some(base) if !base.trim().is_empty() => base.trim_end_matches('/').to_string(),
            _ => format!("{}/status", self.endpoint.trim_end_matches('/')),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            cooldown: Duration::from_secs(self.retry_cooldown_seconds),
        }
    }
}

/// Configuração de nível superior carregada de `forecast.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    /// Diretório onde metadados e payloads são gravados.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Recorte geográfico `[lon_min, lon_max, lat_min, lat_max]`.
    #[serde(default = "default_extent")]
    pub extent: [f64; 4],

    /// Horas entre passos de previsão.
    #[serde(default = "default_step_hours")]
    pub step_hours: u32,

    /// Linhas da grade dos tensores retornados pelo serviço.
    #[serde(default = "default_grid_rows")]
    pub grid_rows: usize,

    /// Colunas da grade dos tensores retornados pelo serviço.
    #[serde(default = "default_grid_cols")]
    pub grid_cols: usize,

    #[serde(default)]
    pub remote: RemoteConfig,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("images")
}

fn default_extent() -> [f64; 4] {
    [-89.0, -75.0, 33.0, 40.0]
}

fn default_step_hours() -> u32 {
    3
}

// Grade global de 0,25°.
fn default_grid_rows() -> usize {
    721
}

fn default_grid_cols() -> usize {
    1440
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            extent: default_extent(),
            step_hours: default_step_hours(),
            grid_rows: default_grid_rows(),
            grid_cols: default_grid_cols(),
            remote: RemoteConfig::default(),
        }
    }
}

impl ForecastConfig {
    /// Carrega a configuração de `forecast.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de um caminho explícito, aplicando o ambiente por cima.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<ForecastConfig>(&contents)?
        } else {
            Self::default()
        };

        config.apply_env(
            std::env::var("FORECAST_API_KEY").ok(),
            std::env::var("FORECAST_ENDPOINT").ok(),
        );
        Ok(config)
    }

    // Variáveis de ambiente não vazias substituem os valores do arquivo.
    fn apply_env(&mut self, api_key: Option<String>, endpoint: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.remote.credential = key;
        }
        if let Some(url) = endpoint.filter(|u| !u.trim().is_empty()) {
            self.remote.endpoint = url;
        }
    }
}
