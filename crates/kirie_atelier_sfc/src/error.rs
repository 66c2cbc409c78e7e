//! Error taxonomy for component compilation.

use std::fmt;

/// Why a `src=` reference on a block could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SrcResolutionReason {
    /// The block has both a `src` attribute and inline content.
    CombinedSource,
    /// The reference resolved to a bundler-virtual module.
    VirtualModule { id: String },
    /// Nothing on disk answers to the reference.
    NotFound,
}

impl fmt::Display for SrcResolutionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CombinedSource => f.write_str("block declares both `src` and inline content"),
            Self::VirtualModule { id } => {
                write!(f, "resolves to virtual module `{}`, which has no file content", id)
            }
            Self::NotFound => f.write_str("file not found"),
        }
    }
}

/// Errors raised while compiling one component file.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Malformed block structure, or a script that does not parse.
    #[error("{filename}:{line}:{column}: {message}")]
    SfcParse {
        filename: String,
        message: String,
        line: usize,
        column: usize,
    },

    /// A compile-time macro used in the wrong place or with the wrong shape.
    #[error("{filename}: invalid use of {macro_name}(): {message}")]
    MacroUsage {
        filename: String,
        macro_name: String,
        message: String,
    },

    /// A config block or config macro argument failed to evaluate.
    #[error("{filename}: failed to evaluate {origin}: {message}")]
    ConfigEvaluation {
        filename: String,
        origin: String,
        message: String,
    },

    /// A `src=` reference on a block could not be resolved.
    #[error("{filename}: <{block}> src=\"{src}\" {reason}")]
    StyleResolution {
        filename: String,
        block: String,
        src: String,
        reason: SrcResolutionReason,
    },

    /// An imported component could not be traced back to a component file.
    #[error("{filename}: cannot resolve component <{tag}> imported from \"{specifier}\": {message}")]
    UsingComponentResolution {
        filename: String,
        tag: String,
        specifier: String,
        message: String,
    },

    /// I/O failure while reading sources.
    #[error("{filename}: {source}")]
    Io {
        filename: String,
        #[source]
        source: std::io::Error,
    },
}

impl CompileError {
    /// The component file the error belongs to.
    pub fn filename(&self) -> &str {
        match self {
            Self::SfcParse { filename, .. }
            | Self::MacroUsage { filename, .. }
            | Self::ConfigEvaluation { filename, .. }
            | Self::StyleResolution { filename, .. }
            | Self::UsingComponentResolution { filename, .. }
            | Self::Io { filename, .. } => filename,
        }
    }

    pub fn macro_usage(
        filename: impl Into<String>,
        macro_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MacroUsage {
            filename: filename.into(),
            macro_name: macro_name.into(),
            message: message.into(),
        }
    }

    pub fn config_evaluation(
        filename: impl Into<String>,
        origin: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ConfigEvaluation {
            filename: filename.into(),
            origin: origin.into(),
            message: message.into(),
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_location() {
        let err = CompileError::SfcParse {
            filename: "Card.vue".into(),
            message: "Element <template> is missing end tag".into(),
            line: 3,
            column: 1,
        };
        assert_eq!(
            err.to_string(),
            "Card.vue:3:1: Element <template> is missing end tag"
        );
        assert_eq!(err.filename(), "Card.vue");
    }

    #[test]
    fn test_src_reason_display() {
        let err = CompileError::StyleResolution {
            filename: "a.vue".into(),
            block: "style".into(),
            src: "./a.css".into(),
            reason: SrcResolutionReason::CombinedSource,
        };
        assert!(err.to_string().contains("both `src` and inline content"));
    }
}
