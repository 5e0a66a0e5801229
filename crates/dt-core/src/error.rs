use thiserror::Error;

#[derive(Debug, Error)]
pub enum DtError {
    #[error("not initialized: run 'dt init'")]
    NotInitialized,

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("no current project: run 'dt project new <name>'")]
    NoCurrentProject,

    #[error("invalid stage: {0}")]
    InvalidStage(String),

    #[error("invalid coach: {0}")]
    InvalidCoach(String),

    #[error("invalid artifact kind: {0}")]
    InvalidArtifactKind(String),

    #[error("{kind} not found: {id}")]
    ArtifactNotFound { kind: String, id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DtError>;
