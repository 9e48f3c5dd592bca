//! Tipos de erro para o cliente de jobs remotos.
//!
//! Define [`JobError`], a taxonomia de falhas de um job: configuração,
//! rejeição pelo serviço, falhas transitórias, handle inválido e
//! cancelamento. Um payload não decodificável **não** é erro: ele vira
//! [`DecodedPayload::Undecoded`](super::decode::DecodedPayload::Undecoded).

use thiserror::Error;

use crate::state_machine::JobState;

/// Erros que podem ocorrer ao submeter ou acompanhar um job remoto.
#[derive(Debug, Error)]
pub enum JobError {
    /// Configuração inválida (ex.: credencial ausente). Nenhuma requisição é feita.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A requisição falhou na validação local antes de ser enviada.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// O serviço recusou a requisição (4xx). Não é retentado.
    #[error("rejected by service (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Falha do lado do servidor (5xx) ou de rede. Pode ser retentada.
    /// `status` é `None` quando a falha ocorreu antes de haver resposta HTTP.
    #[error("transient failure{}: {message}", fmt_status(.status))]
    Transient { status: Option<u16>, message: String },

    /// Todas as tentativas permitidas falharam de forma transitória.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<JobError> },

    /// O serviço não reconhece mais o handle (expirado ou desconhecido).
    /// O job precisa ser submetido novamente.
    #[error("invalid job handle: {0}")]
    InvalidHandle(String),

    /// O laço de polling atingiu o limite configurado. O handle continua válido.
    #[error("job {id} still pending after {polls} polls")]
    PollLimitExceeded { id: String, polls: u32 },

    /// O chamador cancelou o job.
    #[error("job cancelled")]
    Cancelled,

    /// Resposta fora do contrato (ex.: 202 sem identificador de job).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Transição proibida na máquina de estados do job.
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition { from: JobState, to: JobState },
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}

impl JobError {
    /// Indica se a falha deve consumir o orçamento de retentativas.
    pub fn is_transient(&self) -> bool {
        matches!(self, JobError::Transient { .. })
    }
}

impl From<reqwest::Error> for JobError {
    fn from(err: reqwest::Error) -> Self {
        // Um pedido que nem chegou a ser montado não melhora com retentativas.
        if err.is_builder() {
            return JobError::Configuration(err.to_string());
        }
        JobError::Transient {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_display() {
        let err = JobError::Rejected {
            status: 401,
            message: "Invalid API key".into(),
        };
        assert_eq!(
            err.to_string(),
            "rejected by service (status 401): Invalid API key"
        );
    }

    #[test]
    fn transient_display_with_and_without_status() {
        let err = JobError::Transient {
            status: Some(503),
            message: "unavailable".into(),
        };
        assert_eq!(err.to_string(), "transient failure (status 503): unavailable");

        let err = JobError::Transient {
            status: None,
            message: "connection refused".into(),
        };
        assert_eq!(err.to_string(), "transient failure: connection refused");
    }

    #[test]
    fn retries_exhausted_wraps_last_error() {
        let err = JobError::RetriesExhausted {
            attempts: 3,
            last: Box::new(JobError::Transient {
                status: Some(500),
                message: "boom".into(),
            }),
        };
        assert_eq!(
            err.to_string(),
            "gave up after 3 attempts: transient failure (status 500): boom"
        );
    }

    #[test]
    fn only_transient_is_retryable() {
        assert!(
            JobError::Transient {
                status: None,
                message: String::new()
            }
            .is_transient()
        );
        assert!(!JobError::InvalidHandle("abc".into()).is_transient());
        assert!(!JobError::Cancelled.is_transient());
    }

    #[test]
    fn builder_failure_is_configuration_not_transient() {
        let err = reqwest::Client::new().get("not a url").build().unwrap_err();
        assert!(err.is_builder());

        let err = JobError::from(err);
        assert!(matches!(err, JobError::Configuration(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<JobError>();
    }
}
