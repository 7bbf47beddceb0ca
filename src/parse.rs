//! Lowers KDL documents into the attribute/block tree.
//!
//! Mapping rules:
//!
//! - `name value` (positional arguments, no children) is an attribute. Several
//!   arguments form an array: `ports 80 443`.
//! - `name { ... }`, or a node without positional arguments, is a block. The
//!   name is split on `.` into its path. Properties on a block node become
//!   attributes of its body, so `endpoint url="x"` equals `endpoint { url "x" }`.
//! - A string annotated with `(ref)` refers to a variable: `password (ref)"secret"`.

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};

use crate::{
    DecodeError,
    ast::{AttributeStmt, BlockStmt, Body, Expr, Ident, Stmt},
    diag::{Diagnostic, DiagnosticKind, Diagnostics},
    span::{LineIndex, Span},
    value::Value,
};

/// Parses KDL source into a [`Body`].
///
/// Syntax errors are reported as [`DecodeErrorKind::Parse`](crate::DecodeErrorKind::Parse);
/// valid KDL that has no attribute/block meaning is reported as diagnostics.
pub fn parse(source: &str) -> Result<Body, DecodeError> {
    log::trace!("Entering `parse`");

    let document: KdlDocument = source.parse()?;
    log::trace!("KDL parsed");

    let mut lowerer = Lowerer {
        index: LineIndex::new(source),
        diagnostics: Diagnostics::new(),
    };
    let stmts = lowerer.lower_nodes(&document);
    let body = Body {
        stmts,
        span: lowerer.index.full_span(),
    };

    if lowerer.diagnostics.is_empty() {
        Ok(body)
    } else {
        Err(lowerer.diagnostics.into())
    }
}

struct Lowerer {
    index: LineIndex,
    diagnostics: Diagnostics,
}

impl Lowerer {
    fn syntax(&mut self, span: Span, message: String) {
        log::debug!("Rejecting KDL construct at {}: {message}", span.start);
        self.diagnostics
            .push(Diagnostic::error(DiagnosticKind::Syntax, span, message));
    }

    fn lower_nodes(&mut self, document: &KdlDocument) -> Vec<Stmt> {
        document
            .nodes()
            .iter()
            .filter_map(|node| self.lower_node(node))
            .collect()
    }

    // Starts at the node name so leading trivia is not highlighted.
    fn node_span(&self, node: &KdlNode) -> Span {
        let start = node.name().span().offset();
        let end = node.span().offset() + node.span().len();
        Span::new(self.index.position(start), self.index.position(end.max(start)))
    }

    fn lower_node(&mut self, node: &KdlNode) -> Option<Stmt> {
        let name = node.name().value();
        let span = self.node_span(node);

        if let Some(ty) = node.ty() {
            self.syntax(
                span,
                format!("type annotation ({}) on {name:?} is not supported", ty.value()),
            );
            return None;
        }

        let (arguments, properties): (Vec<&KdlEntry>, Vec<&KdlEntry>) =
            node.entries().iter().partition(|entry| entry.name().is_none());

        if node.children().is_none() && !arguments.is_empty() {
            if !properties.is_empty() {
                self.syntax(span, format!("attribute {name:?} cannot have properties"));
                return None;
            }
            let value = self.lower_arguments(&arguments)?;
            return Some(Stmt::Attribute(AttributeStmt {
                name: Ident {
                    name: name.to_string(),
                    span: self.index.span(node.name().span()),
                },
                value,
                span,
            }));
        }

        if !arguments.is_empty() {
            self.syntax(span, format!("block {name:?} does not accept arguments"));
            return None;
        }

        let mut stmts = Vec::new();
        for property in properties {
            let Some(key) = property.name() else {
                continue;
            };
            if let Some(value) = self.lower_entry(property) {
                stmts.push(Stmt::Attribute(AttributeStmt {
                    name: Ident {
                        name: key.value().to_string(),
                        span: self.index.span(key.span()),
                    },
                    value,
                    span: self.index.span(property.span()),
                }));
            }
        }

        let body_span = match node.children() {
            Some(children) => {
                stmts.extend(self.lower_nodes(children));
                self.index.span(children.span())
            }
            None => span,
        };

        Some(Stmt::Block(BlockStmt {
            name: name.split('.').map(str::to_string).collect(),
            body: Body {
                stmts,
                span: body_span,
            },
            span,
        }))
    }

    fn lower_arguments(&mut self, arguments: &[&KdlEntry]) -> Option<Expr> {
        if let [single] = arguments {
            return self.lower_entry(single);
        }

        let elements: Vec<Option<Expr>> = arguments
            .iter()
            .map(|entry| self.lower_entry(entry))
            .collect();
        let elements: Vec<Expr> = elements.into_iter().collect::<Option<_>>()?;

        let span = match (elements.first(), elements.last()) {
            (Some(first), Some(last)) => Span::new(first.span().start, last.span().end),
            _ => Span::default(),
        };
        Some(Expr::Array { elements, span })
    }

    fn lower_entry(&mut self, entry: &KdlEntry) -> Option<Expr> {
        let span = self.index.span(entry.span());
        match entry.ty().map(|ty| ty.value()) {
            None => Some(Expr::Literal {
                value: lower_value(entry.value()),
                span,
            }),
            Some("ref") => match entry.value() {
                KdlValue::String(name) => Some(Expr::Variable {
                    name: name.clone(),
                    span,
                }),
                _ => {
                    self.syntax(span, "(ref) may only annotate a string".to_string());
                    None
                }
            },
            Some(other) => {
                self.syntax(span, format!("unsupported type annotation ({other})"));
                None
            }
        }
    }
}

fn lower_value(value: &KdlValue) -> Value {
    match value {
        KdlValue::String(string) => Value::String(string.clone()),
        KdlValue::Integer(integer) => Value::Integer(*integer),
        KdlValue::Float(float) => Value::Float(*float),
        KdlValue::Bool(bool) => Value::Bool(*bool),
        KdlValue::Null => Value::Null,
    }
}
