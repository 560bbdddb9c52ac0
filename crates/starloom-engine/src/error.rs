//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that stops the engine before it
//! can do its job, so `main` can propagate with `?` and map the result to
//! an exit code.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The command line could not be understood.
    #[error("{message}\n\n{usage}", usage = crate::cli::USAGE)]
    Usage {
        /// What was wrong with the arguments.
        message: String,
    },

    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: starloom_core::ConfigError,
    },

    /// Plugin directories could not be listed.
    #[error("plugin discovery failed: {source}")]
    Discovery {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Game content could not be loaded.
    #[error("content error: {source}")]
    Universe {
        /// The underlying load error.
        #[from]
        source: starloom_universe::UniverseError,
    },

    /// The saved game could not be loaded.
    #[error("save error: {source}")]
    Save {
        /// The underlying save error.
        #[from]
        source: starloom_player::SaveError,
    },
}
