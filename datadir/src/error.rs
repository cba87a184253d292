use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot list {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Cannot parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Expected a {expected} but {path} holds a {found}")]
    UnexpectedKind {
        path: PathBuf,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{kind} '{name}' already exists")]
    Duplicate { kind: &'static str, name: String },

    #[error("{kind} '{name}' has an unresolved {reference} reference")]
    UnresolvedReference {
        kind: &'static str,
        name: String,
        reference: &'static str,
    },

    #[error("{kind} '{name}' rejected: {reason}")]
    Rejected {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("Cannot build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("Worker {worker} panicked: {message}")]
    WorkerPanic { worker: String, message: String },

    #[error("Loader has already been disposed")]
    Disposed,

    #[error("{0} has already been loaded by this loader")]
    AlreadyLoaded(&'static str),
}

impl Error {
    /// Fatal errors abort a whole load; everything else is isolated to one entity.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Walk { .. }
                | Error::Pattern(_)
                | Error::Pool(_)
                | Error::WorkerPanic { .. }
                | Error::Disposed
                | Error::AlreadyLoaded(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
