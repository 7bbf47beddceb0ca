//! The attribute/block tree the decoder walks.
//!
//! Trees usually come from [`crate::parse`], but they can be assembled by hand
//! with the constructors below; hand-built nodes carry unknown spans.

use crate::{span::Span, value::Value};

/// A list of statements, e.g. a document or the contents of a block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    /// Statements in source order.
    pub stmts: Vec<Stmt>,
    /// Span of the whole body.
    pub span: Span,
}

impl Body {
    /// Creates a body with an unknown span.
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self {
            stmts,
            span: Span::default(),
        }
    }

    /// Attaches a span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// A single statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `name = value`
    Attribute(AttributeStmt),
    /// `name { ... }`
    Block(BlockStmt),
}

impl Stmt {
    /// Span of the statement.
    pub fn span(&self) -> Span {
        match self {
            Stmt::Attribute(attr) => attr.span,
            Stmt::Block(block) => block.span,
        }
    }
}

impl From<AttributeStmt> for Stmt {
    fn from(attr: AttributeStmt) -> Self {
        Stmt::Attribute(attr)
    }
}

impl From<BlockStmt> for Stmt {
    fn from(block: BlockStmt) -> Self {
        Stmt::Block(block)
    }
}

/// An identifier with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    /// The identifier text.
    pub name: String,
    /// Where it was written.
    pub span: Span,
}

/// Assigns the value of an expression to a name.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeStmt {
    /// Attribute name.
    pub name: Ident,
    /// Expression producing the value.
    pub value: Expr,
    /// Span of the whole statement.
    pub span: Span,
}

impl AttributeStmt {
    /// Creates an attribute with unknown spans.
    pub fn new(name: impl Into<String>, value: Expr) -> Self {
        Self {
            name: Ident {
                name: name.into(),
                span: Span::default(),
            },
            value,
            span: Span::default(),
        }
    }
}

/// A named group of nested statements.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStmt {
    /// Name path; `prometheus.relabel` is `["prometheus", "relabel"]`.
    pub name: Vec<String>,
    /// Nested statements.
    pub body: Body,
    /// Span of the whole statement.
    pub span: Span,
}

impl BlockStmt {
    /// Creates a block from a dotted name, with unknown spans.
    pub fn new(name: &str, stmts: Vec<Stmt>) -> Self {
        Self {
            name: name.split('.').map(str::to_string).collect(),
            body: Body::new(stmts),
            span: Span::default(),
        }
    }

    /// The dot-joined name.
    pub fn full_name(&self) -> String {
        self.name.join(".")
    }
}

/// An expression producing an attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value.
    Literal {
        /// The value.
        value: Value,
        /// Where it was written.
        span: Span,
    },
    /// A reference to a variable in scope.
    Variable {
        /// Variable name.
        name: String,
        /// Where it was written.
        span: Span,
    },
    /// A list of expressions.
    Array {
        /// Elements in order.
        elements: Vec<Expr>,
        /// Span covering all elements.
        span: Span,
    },
}

impl Expr {
    /// A literal with an unknown span.
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal {
            value: value.into(),
            span: Span::default(),
        }
    }

    /// A variable reference with an unknown span.
    pub fn variable(name: impl Into<String>) -> Self {
        Expr::Variable {
            name: name.into(),
            span: Span::default(),
        }
    }

    /// Span of the expression.
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. } | Expr::Variable { span, .. } | Expr::Array { span, .. } => {
                *span
            }
        }
    }
}
