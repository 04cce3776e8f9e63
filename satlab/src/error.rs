use fleet_rs::deploy::DeployError;
use fleet_rs::dut::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid arguments: {0}")]
    Validation(#[from] ValidationError),

    #[error("cannot determine the satlab ID: {0}")]
    IdentityUnknown(String),

    #[error("{0} must not be empty")]
    EmptyInput(&'static str),

    #[error("`{command}` against container {container} failed: {message}")]
    ContainerExec {
        container: String,
        command: String,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("`{command}` failed: {message}")]
    Inventory { command: String, message: String },

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("rollback failed: {0}")]
    Rollback(#[source] Box<Error>),

    /// Several failures, the primary one first.
    #[error("{}", render_all(.0))]
    Aggregate(Vec<Error>),

    #[error("{stage}: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },
}

fn render_all(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Label `source` with the step it failed in.
    pub fn stage(stage: &'static str, source: impl Into<Error>) -> Self {
        Error::Stage {
            stage,
            source: Box::new(source.into()),
        }
    }

    /// Combine `errors`, keeping their order. A single error is returned as
    /// is.
    pub fn aggregate(mut errors: Vec<Error>) -> Self {
        if errors.len() == 1 {
            if let Some(e) = errors.pop() {
                return e;
            }
        }
        Error::Aggregate(errors)
    }

    /// The error that caused this one, looking through stage labels and
    /// aggregates.
    pub fn primary(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.primary(),
            Error::Aggregate(errors) => errors.first().map_or(self, Error::primary),
            e => e,
        }
    }

    pub fn is_rollback(&self) -> bool {
        matches!(self, Error::Rollback(_))
    }
}
