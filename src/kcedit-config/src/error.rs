use std::io::Error as IoError;
use std::path::PathBuf;

use serde_yaml::Error as SerdeYamlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
    #[error("Yaml error: {0}")]
    SerdeError(#[from] SerdeYamlError),
    #[error("File {} not found", .0.display())]
    FileNotFound(PathBuf),
    #[error("Context '{name}' not found{}", in_file(.file))]
    ContextNotFound {
        name: String,
        file: Option<PathBuf>,
    },
    #[error("Unable to determine home directory")]
    NoHomeDir,
}

fn in_file(file: &Option<PathBuf>) -> String {
    match file {
        Some(path) => format!(" in {}", path.display()),
        None => String::new(),
    }
}

impl ConfigError {
    pub fn context_not_found(name: impl Into<String>) -> Self {
        Self::ContextNotFound {
            name: name.into(),
            file: None,
        }
    }

    /// Missing files and contexts are reported to the user but are not fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::FileNotFound(_) | Self::ContextNotFound { .. })
    }
}
