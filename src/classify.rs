// src/classify.rs

//! Artifact classification.
//!
//! Guesses what a script will draw from the libraries it mentions. This is a
//! heuristic scan, not a parse: it never fails, and the first matching rule
//! in a language's table wins. The language default sits last.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::lang::Language;

pub const STATIC_FILENAME: &str = "visualization.png";
pub const INTERACTIVE_FILENAME: &str = "visualization.html";
pub const SCENE_3D_FILENAME: &str = "visualization_3d.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputKind {
    StaticImage,
    InteractiveDocument,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::StaticImage => "static-image",
            OutputKind::InteractiveDocument => "interactive-document",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub kind: OutputKind,
    pub filename: String,
}

impl OutputSpec {
    pub fn new(kind: OutputKind, filename: impl Into<String>) -> Self {
        Self {
            kind,
            filename: filename.into(),
        }
    }

    pub fn static_image() -> Self {
        Self::new(OutputKind::StaticImage, STATIC_FILENAME)
    }

    #[cfg(test)]
    pub fn interactive() -> Self {
        Self::new(OutputKind::InteractiveDocument, INTERACTIVE_FILENAME)
    }
}

/// One row of a classification table.
struct Rule {
    name: &'static str,
    pattern: Regex,
    kind: OutputKind,
    filename: &'static str,
}

type RuleRow = (&'static str, &'static str, OutputKind, &'static str);

/// Patterns are plain substrings: `plotly_express`, `ggplotly(` and
/// `rglwidget()` all count as evidence for their library.
const PYTHON_RULES: &[RuleRow] = &[
    ("plotly", "plotly", OutputKind::InteractiveDocument, INTERACTIVE_FILENAME),
    ("bokeh", "bokeh", OutputKind::InteractiveDocument, INTERACTIVE_FILENAME),
    ("matplotlib", "matplotlib|seaborn", OutputKind::StaticImage, STATIC_FILENAME),
];

const R_RULES: &[RuleRow] = &[
    ("plotly", "plotly|plot_ly", OutputKind::InteractiveDocument, INTERACTIVE_FILENAME),
    ("rgl", "rgl", OutputKind::InteractiveDocument, SCENE_3D_FILENAME),
    ("ggplot2", "ggplot|lattice", OutputKind::StaticImage, STATIC_FILENAME),
];

fn compile(rows: &[RuleRow]) -> Vec<Rule> {
    rows.iter()
        .filter_map(|&(name, pattern, kind, filename)| match Regex::new(pattern) {
            Ok(pattern) => Some(Rule {
                name,
                pattern,
                kind,
                filename,
            }),
            Err(e) => {
                tracing::error!(rule = name, error = %e, "skipping classification rule");
                None
            }
        })
        .collect()
}

fn python_rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| compile(PYTHON_RULES))
}

fn r_rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| compile(R_RULES))
}

fn rules_for(language: Language) -> &'static [Rule] {
    match language {
        Language::Python => python_rules(),
        Language::R => r_rules(),
    }
}

/// Infer the artifact kind and filename for `code`.
pub fn classify(code: &str, language: Language) -> OutputSpec {
    match rules_for(language).iter().find(|rule| rule.pattern.is_match(code)) {
        Some(rule) => {
            tracing::debug!(%language, rule = rule.name, "classification rule matched");
            OutputSpec::new(rule.kind, rule.filename)
        }
        None => OutputSpec::static_image(),
    }
}
