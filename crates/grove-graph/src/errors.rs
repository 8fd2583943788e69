use crate::Diagnostic;
use grove_config::ConfigError;
use std::fmt;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Resolution,
    Validation,
    Structural,
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("input error: {0}")]
    Input(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("resolution failed with {0}")]
    Resolution(DiagnosticReport),
    #[error("validation failed with {0}")]
    Validation(DiagnosticReport),
    #[error("invalid graph structure, {0}")]
    Structural(DiagnosticReport),
    #[error("{builder}: {step}: {source}")]
    Step {
        builder: String,
        step: String,
        #[source]
        source: Box<GraphError>,
    },
}

impl GraphError {
    pub fn structural(diagnostic: Diagnostic) -> Self {
        Self::Structural(DiagnosticReport::new(vec![diagnostic]))
    }

    pub fn step(builder: impl Into<String>, step: impl Into<String>, source: GraphError) -> Self {
        Self::Step {
            builder: builder.into(),
            step: step.into(),
            source: Box::new(source),
        }
    }

    /// Kind of the underlying cause, looking through step wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Input(_) | Self::Config(_) => ErrorKind::Input,
            Self::Resolution(_) => ErrorKind::Resolution,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Structural(_) => ErrorKind::Structural,
            Self::Step { source, .. } => source.kind(),
        }
    }

    /// Diagnostics carried by the underlying cause, if any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Resolution(report) | Self::Validation(report) | Self::Structural(report) => {
                report.diagnostics.as_slice()
            }
            Self::Step { source, .. } => source.diagnostics(),
            Self::Input(_) | Self::Config(_) => &[],
        }
    }
}

/// Every problem a step found, surfaced together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticReport {
    pub diagnostics: Vec<Diagnostic>,
    pub errors_count: usize,
}

impl DiagnosticReport {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        let errors_count = diagnostics.iter().filter(|d| d.is_error()).count();
        Self {
            diagnostics,
            errors_count,
        }
    }
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s):", self.errors_count)?;
        for diagnostic in self.diagnostics.iter().filter(|d| d.is_error()) {
            write!(f, "\n  * {diagnostic}")?;
        }
        Ok(())
    }
}
