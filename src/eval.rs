//! Expression evaluation and the recursive entry point for nested bodies.

use std::{
    collections::BTreeMap,
    error::Error,
    fmt::{self, Display},
};

use crate::{
    DecodeError,
    ast::{BlockStmt, Body, Expr},
    decoder::Decoder,
    diag::{Diagnostic, DiagnosticKind},
    options::DecodeOptions,
    schema::{Block, DecodeBody},
    span::Span,
    value::Value,
};

/// Variables visible to expressions.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    variables: BTreeMap<String, Value>,
}

impl Scope {
    /// An empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable, builder style.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets (or replaces) a variable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Looks a variable up.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }
}

/// Evaluating an expression failed.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EvalError {
    /// The expression refers to a variable that is not in scope.
    UndefinedVariable {
        /// Variable name.
        name: String,
        /// Where it was referenced.
        span: Span,
    },
}

impl EvalError {
    /// Where the failing expression was written.
    pub fn span(&self) -> Span {
        match self {
            EvalError::UndefinedVariable { span, .. } => *span,
        }
    }
}

impl Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UndefinedVariable { name, .. } => {
                write!(f, "identifier {name:?} does not exist")
            }
        }
    }
}

impl Error for EvalError {}

/// Evaluates expressions against a [`Scope`] and decodes bodies into records.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'s> {
    scope: &'s Scope,
    options: DecodeOptions,
}

impl<'s> Evaluator<'s> {
    /// An evaluator with default options.
    pub fn new(scope: &'s Scope) -> Self {
        Self {
            scope,
            options: DecodeOptions::default(),
        }
    }

    /// Replaces the options.
    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    /// Options in effect.
    pub fn options(&self) -> DecodeOptions {
        self.options
    }

    /// Evaluates `expr` into a generic value.
    pub fn evaluate(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal { value, .. } => Ok(value.clone()),
            Expr::Variable { name, span } => {
                self.scope
                    .get(name)
                    .cloned()
                    .ok_or_else(|| EvalError::UndefinedVariable {
                        name: name.clone(),
                        span: *span,
                    })
            }
            Expr::Array { elements, .. } => elements
                .iter()
                .map(|element| self.evaluate(element))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }

    /// Decodes the body of `block` into `target`.
    pub fn evaluate_block(
        &self,
        block: &BlockStmt,
        target: &mut dyn DecodeBody,
    ) -> Result<(), DecodeError> {
        log::trace!("Evaluating block {}", block.full_name());
        target.decode_body(&block.body, self)
    }

    /// Decodes `body` into `target`, running its default and validation hooks.
    pub fn decode_body<T: Block>(&self, body: &Body, target: &mut T) -> Result<(), DecodeError> {
        target.set_to_default();
        Decoder::new(self).decode(body, target)?;

        if let Err(message) = target.validate() {
            log::debug!("Validation failed: {message}");
            return Err(Diagnostic::error(DiagnosticKind::Validation, body.span, message).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_and_arrays() {
        let scope = Scope::new();
        let evaluator = Evaluator::new(&scope);
        let expr = Expr::Array {
            elements: vec![Expr::literal(1i64), Expr::literal("two")],
            span: Span::default(),
        };
        assert_eq!(
            evaluator.evaluate(&expr),
            Ok(Value::Array(vec![Value::Integer(1), Value::from("two")]))
        );
    }

    #[test]
    fn variables_resolve_in_scope() {
        let scope = Scope::new().with_variable("port", 9090i64);
        let evaluator = Evaluator::new(&scope);
        assert_eq!(
            evaluator.evaluate(&Expr::variable("port")),
            Ok(Value::Integer(9090))
        );

        let err = evaluator.evaluate(&Expr::variable("host")).unwrap_err();
        assert_eq!(err.to_string(), r#"identifier "host" does not exist"#);
    }
}
