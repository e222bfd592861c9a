// src/lang/mod.rs

//! Supported languages and their execution adapters.
//!
//! An adapter knows everything language-specific about a run: which
//! interpreter to spawn, which wrapper program to hand it, how the script
//! files are named, and how to synthesize the save fragment appended to
//! the user's code.

pub mod python;
pub mod r;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::classify::OutputSpec;
use crate::config::Runtime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    R,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::R => "r",
        }
    }

    /// Guess from a file extension (`vizexec run`).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "py" => Some(Language::Python),
            "r" => Some(Language::R),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported language: {0:?}")]
pub struct UnsupportedLanguage(pub String);

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" => Ok(Language::Python),
            "r" => Ok(Language::R),
            _ => Err(UnsupportedLanguage(s.to_string())),
        }
    }
}

/// Language-specific half of an execution.
pub trait LanguageAdapter: Send + Sync {
    fn language(&self) -> Language;

    /// Interpreter binary, resolved through `PATH` when not absolute.
    fn interpreter(&self) -> &str;

    /// Raw user code as submitted, kept for later inspection.
    fn source_name(&self) -> &'static str;

    /// User code plus the save fragment; this is what the wrapper runs.
    fn script_name(&self) -> &'static str;

    fn wrapper_name(&self) -> &'static str;

    fn wrapper_source(&self) -> &'static str;

    /// Code appended after the user's script that writes the artifact to
    /// `output_dir/output_file`. Must never raise.
    fn save_code(&self, spec: &OutputSpec) -> String;

    /// Extra environment for the child process.
    fn env(&self) -> Vec<(&'static str, &'static str)> {
        Vec::new()
    }
}

pub fn adapter_for(language: Language, runtime: &Runtime) -> Box<dyn LanguageAdapter> {
    match language {
        Language::Python => Box::new(python::PythonAdapter::new(runtime.python.clone())),
        Language::R => Box::new(r::RAdapter::new(runtime.r.clone())),
    }
}
