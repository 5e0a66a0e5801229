use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoachError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP error! status: {status}{}", body_suffix(.body))]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("repository error: {0}")]
    Repository(String),

    #[error(transparent)]
    Core(#[from] dt_core::DtError),
}

fn body_suffix(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}
