//! Engine location.
//!
//! Copyright (c) 2025 Posit, PBC

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use sass_bridge::{Engine, EngineError, EngineLocator};

use crate::cli_engine::CliEngine;
use crate::grass_engine::GrassEngine;

/// Default executable name looked up on `PATH`.
pub const DEFAULT_BINARY_NAME: &str = "sass";

/// Environment variable overriding the executable name.
pub const BINARY_NAME_VAR: &str = "SASS_BINARY_NAME";

/// Environment variable pointing at the executable directly.
pub const BINARY_PATH_VAR: &str = "SASS_BINARY_PATH";

/// Where to find the `sass` executable.
///
/// An explicit path wins over an explicit name; explicit settings win over
/// the environment, and the environment wins over the default name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryConfig {
    pub name: Option<String>,
    pub path: Option<PathBuf>,
}

impl BinaryConfig {
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            path: None,
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            path: Some(path.into()),
        }
    }

    /// Fill unset fields from the process environment.
    pub fn or_env(self) -> Self {
        self.or_vars(|key| std::env::var(key).ok())
    }

    /// Fill unset fields from `lookup`.
    pub fn or_vars(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if self.name.is_some() || self.path.is_some() {
            return self;
        }
        Self {
            name: non_empty(BINARY_NAME_VAR),
            path: non_empty(BINARY_PATH_VAR).map(PathBuf::from),
        }
    }

    /// The executable name used for lookup and in messages.
    pub fn binary_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_BINARY_NAME)
    }

    /// Resolve to an executable path.
    pub fn resolve(&self) -> Result<PathBuf, EngineError> {
        if let Some(path) = &self.path {
            if path.is_file() {
                return Ok(path.clone());
            }
            tracing::debug!(path = %path.display(), "Configured sass path is not a file");
            return Err(self.missing());
        }

        which::which(self.binary_name()).map_err(|e| {
            tracing::debug!(name = self.binary_name(), error = %e, "sass not found on PATH");
            self.missing()
        })
    }

    fn missing(&self) -> EngineError {
        EngineError::Missing(format!(
            "`{}` binary not found. Try reinstalling it, or point {} at an existing executable.",
            self.binary_name(),
            BINARY_PATH_VAR
        ))
    }
}

/// Locates the external executable once and reuses the result.
#[derive(Debug, Default)]
pub struct BinaryLocator {
    config: BinaryConfig,
    resolved: OnceLock<Result<Arc<CliEngine>, EngineError>>,
}

impl BinaryLocator {
    pub fn new(config: BinaryConfig) -> Self {
        Self {
            config,
            resolved: OnceLock::new(),
        }
    }

    /// A locator configured from the process environment.
    pub fn from_env() -> Self {
        Self::new(BinaryConfig::default().or_env())
    }

    pub fn config(&self) -> &BinaryConfig {
        &self.config
    }
}

impl EngineLocator for BinaryLocator {
    fn locate(&self) -> Result<Arc<dyn Engine>, EngineError> {
        let resolved = self.resolved.get_or_init(|| {
            let path = self.config.resolve()?;
            CliEngine::new(path).map(Arc::new)
        });
        match resolved {
            Ok(engine) => Ok(engine.clone() as Arc<dyn Engine>),
            Err(e) => Err(e.clone()),
        }
    }
}

/// Always yields the in-process grass engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrassLocator;

impl EngineLocator for GrassLocator {
    fn locate(&self) -> Result<Arc<dyn Engine>, EngineError> {
        Ok(Arc::new(GrassEngine::new()))
    }
}
