//! Position-tagged decode failures and their rendering.

use std::{
    error::Error,
    fmt::{self, Display},
    ops::Deref,
};

use miette::{GraphicalReportHandler, GraphicalTheme, LabeledSpan, NamedSource, SourceCode};

use crate::{
    schema::FieldKind,
    span::{Position, Span},
};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Severity {
    /// Decoding failed.
    Error,
}

/// What went wrong, for callers that match on failures rather than messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DiagnosticKind {
    /// An attribute name was given twice.
    DuplicateAttribute,
    /// An attribute name is not in the schema.
    UnrecognizedAttribute,
    /// An attribute statement names a block field.
    AttributeIsBlock,
    /// A block name is not in the schema.
    UnrecognizedBlock,
    /// A block statement names an attribute field.
    BlockIsAttribute,
    /// A fixed-size block field got the wrong number of blocks.
    ArityMismatch {
        /// Declared length of the field.
        expected: usize,
        /// Number of blocks in the source.
        actual: usize,
    },
    /// A singular block field was given more than once.
    DuplicateBlock,
    /// A required field never appeared.
    MissingRequired(FieldKind),
    /// A record rejected its decoded contents.
    Validation,
    /// The source uses a construct that has no attribute/block meaning.
    Syntax,
    /// Evaluating an expression failed (accumulating mode only).
    Evaluation,
    /// Converting a value into its field failed (accumulating mode only).
    Conversion,
}

/// A single decode failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Classification.
    pub kind: DiagnosticKind,
    /// Start of the offending source.
    pub start_pos: Position,
    /// End of the offending source.
    pub end_pos: Position,
    /// Human readable message.
    pub message: String,
}

impl Diagnostic {
    /// An error-severity diagnostic covering `span`.
    pub fn error(kind: DiagnosticKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            start_pos: span.start,
            end_pos: span.end,
            message: message.into(),
        }
    }

    /// The covered source range.
    pub fn span(&self) -> Span {
        Span::new(self.start_pos, self.end_pos)
    }

    pub(crate) fn duplicate_attribute(name: &str, span: Span) -> Self {
        Self::error(
            DiagnosticKind::DuplicateAttribute,
            span,
            format!("attribute {name:?} may only be provided once"),
        )
    }

    pub(crate) fn unrecognized_attribute(name: &str, span: Span) -> Self {
        Self::error(
            DiagnosticKind::UnrecognizedAttribute,
            span,
            format!("unrecognized attribute name {name:?}"),
        )
    }

    pub(crate) fn attribute_is_block(name: &str, span: Span) -> Self {
        Self::error(
            DiagnosticKind::AttributeIsBlock,
            span,
            format!("{name:?} must be a block, but is used as an attribute"),
        )
    }

    pub(crate) fn unrecognized_block(name: &str, span: Span) -> Self {
        Self::error(
            DiagnosticKind::UnrecognizedBlock,
            span,
            format!("unrecognized block name {name:?}"),
        )
    }

    pub(crate) fn block_is_attribute(name: &str, span: Span) -> Self {
        Self::error(
            DiagnosticKind::BlockIsAttribute,
            span,
            format!("{name:?} must be an attribute, but is used as a block"),
        )
    }

    pub(crate) fn arity_mismatch(name: &str, expected: usize, actual: usize, span: Span) -> Self {
        Self::error(
            DiagnosticKind::ArityMismatch { expected, actual },
            span,
            format!(
                "block {name:?} must be specified exactly {expected} times, but was specified {actual} times"
            ),
        )
    }

    pub(crate) fn duplicate_block(name: &str, span: Span) -> Self {
        Self::error(
            DiagnosticKind::DuplicateBlock,
            span,
            format!("block {name:?} may only be specified once"),
        )
    }

    pub(crate) fn missing_required(name: &str, kind: FieldKind, span: Span) -> Self {
        Self::error(
            DiagnosticKind::MissingRequired(kind),
            span,
            format!("missing required {kind} {name:?}"),
        )
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_pos.is_known() {
            write!(f, "{}: {}", self.start_pos, self.message)
        } else {
            f.write_str(&self.message)
        }
    }
}

/// One or more diagnostics from a single decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    /// Renders every diagnostic inline against `source`, the way miette prints
    /// reports (unicode, no colors).
    pub fn render(&self, name: &str, source: &str) -> Result<String, fmt::Error> {
        let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
        let source = NamedSource::new(name, source.to_string());

        let mut output = String::new();
        for diagnostic in &self.0 {
            let report = SourceReport {
                source: &source,
                diagnostic,
            };
            handler.render_report(&mut output, &report)?;
        }
        Ok(output)
    }

    /// Consumes the list.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl Deref for Diagnostics {
    type Target = [Diagnostic];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Self(vec![diagnostic])
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Self(diagnostics)
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

impl Error for Diagnostics {}

/// Pairs a diagnostic with its source so miette can draw labels.
#[derive(Debug)]
struct SourceReport<'a> {
    source: &'a NamedSource<String>,
    diagnostic: &'a Diagnostic,
}

impl Display for SourceReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.diagnostic.message)
    }
}

impl Error for SourceReport<'_> {}

impl miette::Diagnostic for SourceReport<'_> {
    fn severity(&self) -> Option<miette::Severity> {
        match self.diagnostic.severity {
            Severity::Error => Some(miette::Severity::Error),
        }
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(self.source)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(LabeledSpan::at(
            self.diagnostic.span(),
            "here",
        ))))
    }
}
