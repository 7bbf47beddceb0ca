#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

use std::{
    error::Error,
    fmt::{self, Display},
};

use kdl::KdlError as KdlParseError;

pub mod ast;
mod decoder;
mod diag;
mod eval;
mod options;
mod parse;
mod schema;
mod span;
mod value;

pub use diag::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use eval::{EvalError, Evaluator, Scope};
pub use options::{DecodeOptions, ErrorMode};
pub use parse::parse;
pub use schema::{
    Block, BlockSeq, DecodeBody, Field, FieldKind, FieldRef, GrowableBlockSeq, Schema,
    SchemaBuilder,
};
pub use span::{LineIndex, Position, Span};
pub use value::{DecodeValue, FromValue, Value, ValueError, ValueType};

/// Error type for decoding.
#[derive(Debug)]
pub struct DecodeError {
    kind: DecodeErrorKind,
}

impl DecodeError {
    /// Returns a reference to the error kind for detailed error inspection.
    pub fn kind(&self) -> &DecodeErrorKind {
        &self.kind
    }

    /// Consumes the error, returning its kind.
    pub fn into_kind(self) -> DecodeErrorKind {
        self.kind
    }

    /// The diagnostics, if this error carries any.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match &self.kind {
            DecodeErrorKind::Diagnostics(diagnostics) => Some(diagnostics),
            _ => None,
        }
    }

    /// Converts any error into diagnostics. Errors that carry no position of
    /// their own are attributed to `span`.
    pub fn into_diagnostics(self, span: Span) -> Diagnostics {
        match self.kind {
            DecodeErrorKind::Diagnostics(diagnostics) => diagnostics,
            DecodeErrorKind::Eval(err) => {
                Diagnostic::error(DiagnosticKind::Evaluation, err.span(), err.to_string()).into()
            }
            DecodeErrorKind::Value(err) => {
                Diagnostic::error(DiagnosticKind::Conversion, span, err.to_string()).into()
            }
            DecodeErrorKind::Parse(err) => {
                Diagnostic::error(DiagnosticKind::Syntax, span, err.to_string()).into()
            }
        }
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> fmt::Result {
        let kind = &self.kind;
        write!(f, "{kind}")
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            DecodeErrorKind::Parse(err) => Some(err),
            DecodeErrorKind::Diagnostics(diagnostics) => Some(diagnostics),
            DecodeErrorKind::Eval(err) => Some(err),
            DecodeErrorKind::Value(err) => Some(err),
        }
    }
}

impl<K: Into<DecodeErrorKind>> From<K> for DecodeError {
    fn from(value: K) -> Self {
        let kind = value.into();
        DecodeError { kind }
    }
}

/// Detailed classification of decode errors.
#[derive(Debug)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// The source is not valid KDL.
    Parse(KdlParseError),
    /// The tree does not fit the schema.
    Diagnostics(Diagnostics),
    /// An attribute's expression could not be evaluated.
    Eval(EvalError),
    /// An attribute's value could not be converted into its field.
    Value(ValueError),
}

impl Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::Parse(kdl_error) => write!(f, "{kdl_error}"),
            DecodeErrorKind::Diagnostics(diagnostics) => write!(f, "{diagnostics}"),
            DecodeErrorKind::Eval(eval_error) => write!(f, "{eval_error}"),
            DecodeErrorKind::Value(value_error) => write!(f, "{value_error}"),
        }
    }
}

impl From<KdlParseError> for DecodeErrorKind {
    fn from(value: KdlParseError) -> Self {
        Self::Parse(value)
    }
}

impl From<Diagnostics> for DecodeErrorKind {
    fn from(value: Diagnostics) -> Self {
        Self::Diagnostics(value)
    }
}

impl From<Diagnostic> for DecodeErrorKind {
    fn from(value: Diagnostic) -> Self {
        Self::Diagnostics(value.into())
    }
}

impl From<EvalError> for DecodeErrorKind {
    fn from(value: EvalError) -> Self {
        Self::Eval(value)
    }
}

impl From<ValueError> for DecodeErrorKind {
    fn from(value: ValueError) -> Self {
        Self::Value(value)
    }
}

type Result<T> = std::result::Result<T, DecodeError>;

/// Deserialize a value of type `T` from a KDL string.
///
/// Returns a [`DecodeError`] if the input KDL is invalid or doesn't match `T`.
///
/// # Example
/// ```
/// use kdl_decode::{Block, Schema, static_schema};
///
/// #[derive(Debug, Default)]
/// struct Config {
///     name: String,
///     rules: Vec<Rule>,
/// }
///
/// #[derive(Debug, Default)]
/// struct Rule {
///     action: String,
/// }
///
/// impl Block for Config {
///     fn schema() -> &'static Schema<Self> {
///         static_schema!(Config, |schema| schema
///             .attr("name", |c| &mut c.name)
///             .blocks("rule", |c| &mut c.rules)
///             .optional())
///     }
/// }
///
/// impl Block for Rule {
///     fn schema() -> &'static Schema<Self> {
///         static_schema!(Rule, |schema| schema.attr("action", |r| &mut r.action))
///     }
/// }
///
/// # fn main() -> Result<(), kdl_decode::DecodeError> {
/// let config: Config = kdl_decode::from_str(r#"
///     name "relabel"
///     rule { action "keep" }
///     rule { action "drop" }
/// "#)?;
/// assert_eq!(config.rules.len(), 2);
/// assert_eq!(config.rules[1].action, "drop");
/// # Ok(())
/// # }
/// ```
pub fn from_str<T: Block + Default>(kdl: &str) -> Result<T> {
    log::trace!("Entering `from_str` function");

    from_str_with(kdl, &Scope::new(), DecodeOptions::default())
}

/// Like [`from_str`], with variables for `(ref)` values and explicit options.
pub fn from_str_with<T: Block + Default>(
    kdl: &str,
    scope: &Scope,
    options: DecodeOptions,
) -> Result<T> {
    let body = parse(kdl)?;
    let mut target = T::default();
    Evaluator::new(scope)
        .with_options(options)
        .decode_body(&body, &mut target)?;
    Ok(target)
}

/// Decodes an already parsed `body` into `target` with an empty scope and
/// default options.
///
/// On failure `target` may be partially written.
pub fn decode<T: Block>(body: &ast::Body, target: &mut T) -> Result<()> {
    Evaluator::new(&Scope::new()).decode_body(body, target)
}
