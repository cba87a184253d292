use thiserror::Error;

/// Environment variable holding the operator's parallelism override.
pub const PARALLELISM_ENV: &str = "DATADIR_LOAD_PARALLELISM";

/// Upper bound of the computed pool size; only an explicit override goes past it.
pub const MAX_DEFAULT_PARALLELISM: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid parallelism '{0}': expected an integer greater than 0")]
pub struct InvalidParallelism(pub String);

/// Inputs of a [`DataDirectoryLoader`](super::DataDirectoryLoader), read once
/// when it is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Raw override, validated when the pool is sized.
    pub parallelism: Option<String>,
}

impl LoaderOptions {
    pub fn from_env() -> Self {
        LoaderOptions {
            parallelism: std::env::var(PARALLELISM_ENV).ok(),
        }
    }

    pub fn with_parallelism(mut self, value: impl Into<String>) -> Self {
        self.parallelism = Some(value.into());
        self
    }

    /// Pool size: the override when valid, otherwise [`default_parallelism`].
    pub fn parallelism(&self) -> usize {
        resolve_parallelism(self.parallelism.as_deref(), default_parallelism())
    }
}

/// `min(available cores, 16)`.
pub fn default_parallelism() -> usize {
    num_cpus::get().clamp(1, MAX_DEFAULT_PARALLELISM)
}

pub fn parse_parallelism(value: &str) -> Result<usize, InvalidParallelism> {
    match value.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(InvalidParallelism(value.to_string())),
    }
}

pub fn resolve_parallelism(override_value: Option<&str>, default: usize) -> usize {
    let Some(value) = override_value else {
        return default;
    };
    match parse_parallelism(value) {
        Ok(n) => {
            log::info!("Using parallelism {n} from {PARALLELISM_ENV}");
            n
        }
        Err(e) => {
            log::warn!("{e}; using the default of {default}");
            default
        }
    }
}
