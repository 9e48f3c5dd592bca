//! Tipos de dados trocados com o serviço de inferência remoto.
//!
//! [`JobRequest`] é serializado como corpo JSON da submissão. As respostas
//! são reduzidas a [`SubmitOutcome`] e [`PollOutcome`], que expressam
//! explicitamente os resultados possíveis de cada chamada.

use serde::{Deserialize, Serialize};

use super::error::JobError;

/// Parâmetros de uma requisição de previsão.
///
/// O campo `input_selector` é serializado como `"input_id"`, nome esperado
/// pelo endpoint de inferência.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Seletor da condição inicial (ex.: índice ou data do ciclo).
    #[serde(rename = "input_id")]
    pub input_selector: String,
    /// Número de amostras do ensemble.
    pub samples: u32,
    /// Número de passos de previsão.
    pub steps: u32,
}

impl JobRequest {
    pub fn new(input_selector: impl Into<String>, samples: u32, steps: u32) -> Self {
        Self {
            input_selector: input_selector.into(),
            samples,
            steps,
        }
    }

    /// Valida a requisição antes do envio: seletor não vazio e contagens positivas.
    pub fn validate(&self) -> Result<(), JobError> {
        if self.input_selector.trim().is_empty() {
            return Err(JobError::InvalidRequest(
                "input selector must not be empty".into(),
            ));
        }
        if self.samples == 0 {
            return Err(JobError::InvalidRequest("samples must be positive".into()));
        }
        if self.steps == 0 {
            return Err(JobError::InvalidRequest("steps must be positive".into()));
        }
        Ok(())
    }
}

/// Identificador opaco de um job em andamento no serviço.
///
/// Carrega tudo o que é necessário para retomar o polling: o id devolvido
/// pelo serviço e a URL de status derivada dele.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
    pub status_url: String,
}

/// Corpo bruto de um job concluído, com o content type declarado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResult {
    pub bytes: Vec<u8>,
    /// Valor do cabeçalho `Content-Type`; vazio quando ausente.
    pub content_type: String,
}

impl RawResult {
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }
}

/// Recusa do serviço (resposta 4xx) com o corpo da resposta como mensagem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: u16,
    pub message: String,
}

impl From<Rejection> for JobError {
    fn from(r: Rejection) -> Self {
        JobError::Rejected {
            status: r.status,
            message: r.message,
        }
    }
}

/// Resultado de uma submissão. Exatamente uma variante é produzida.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// O serviço adiou o trabalho; o handle deve ser consultado.
    Accepted(JobHandle),
    /// O serviço concluiu de forma síncrona.
    Completed(RawResult),
    /// O serviço recusou a requisição.
    Rejected(Rejection),
}

/// Resultado de uma consulta de status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Pending,
    Completed(RawResult),
    Rejected(Rejection),
}
