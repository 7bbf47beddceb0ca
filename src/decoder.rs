//! Applies a statement list to a record according to the record's schema.

use std::collections::{HashMap, HashSet};

use crate::{
    DecodeError,
    ast::{AttributeStmt, BlockStmt, Body, Stmt},
    diag::{Diagnostic, Diagnostics},
    eval::Evaluator,
    options::ErrorMode,
    schema::{Block, FieldKind, FieldRef, Schema},
    span::Span,
};

type Result<T> = std::result::Result<T, DecodeError>;

/// Bookkeeping for one statement list. Nested bodies get their own.
struct TraversalState {
    seen_attrs: HashSet<String>,
    seen_blocks: HashSet<String>,
    /// Names whose block failure was already reported once (accumulating mode).
    failed_blocks: HashSet<String>,

    // `block_count` sizes the target of a repeated block, `block_index` says
    // which element a given statement fills. Indices are relative to the full
    // name: the first `rule` and the first `endpoint` are both index 0.
    //
    // `block_index` is keyed by statement position in the list; attribute
    // statements hold `None`.
    block_count: HashMap<String, usize>,
    block_index: Vec<Option<usize>>,
}

impl TraversalState {
    fn new(stmts: &[Stmt]) -> Self {
        let mut block_count: HashMap<String, usize> = HashMap::new();
        let block_index = stmts
            .iter()
            .map(|stmt| match stmt {
                Stmt::Block(block) => {
                    let count = block_count.entry(block.full_name()).or_default();
                    let index = *count;
                    *count += 1;
                    Some(index)
                }
                Stmt::Attribute(_) => None,
            })
            .collect();

        Self {
            seen_attrs: HashSet::new(),
            seen_blocks: HashSet::new(),
            failed_blocks: HashSet::new(),
            block_count,
            block_index,
        }
    }

    fn count(&self, full_name: &str) -> usize {
        self.block_count.get(full_name).copied().unwrap_or_default()
    }

    fn index(&self, position: usize) -> usize {
        match self.block_index.get(position).copied().flatten() {
            Some(index) => index,
            None => unreachable!("block not found in index lookup table"),
        }
    }
}

/// Collects failures according to the [`ErrorMode`].
struct DiagnosticSink {
    mode: ErrorMode,
    diagnostics: Diagnostics,
}

impl DiagnosticSink {
    fn new(mode: ErrorMode) -> Self {
        Self {
            mode,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Returns the error straight back when aborting, otherwise records it.
    fn record(&mut self, err: DecodeError, span: Span) -> Result<()> {
        match self.mode {
            ErrorMode::AbortOnFirst => Err(err),
            ErrorMode::Accumulate => {
                self.diagnostics.extend(err.into_diagnostics(span));
                Ok(())
            }
        }
    }

    fn finish(self) -> Result<()> {
        if self.diagnostics.is_empty() {
            Ok(())
        } else {
            Err(self.diagnostics.into())
        }
    }
}

/// Decodes one statement list into one record.
pub(crate) struct Decoder<'e, 's> {
    evaluator: &'e Evaluator<'s>,
}

impl<'e, 's> Decoder<'e, 's> {
    pub(crate) fn new(evaluator: &'e Evaluator<'s>) -> Self {
        Self { evaluator }
    }

    /// Applies `body` to `target`, then checks that every required field was
    /// provided. `target` may be partially written when this fails.
    pub(crate) fn decode<R: Block>(&self, body: &Body, target: &mut R) -> Result<()> {
        log::trace!("Entering `decode` with {} statements", body.stmts.len());

        let schema = R::schema();
        let mut state = TraversalState::new(&body.stmts);
        let mut sink = DiagnosticSink::new(self.evaluator.options().error_mode);

        for (position, stmt) in body.stmts.iter().enumerate() {
            let result = match stmt {
                Stmt::Attribute(attr) => self.decode_attr(attr, target, schema, &mut state),
                Stmt::Block(block) => {
                    self.decode_block(position, block, target, schema, &mut state)
                }
            };
            if let Err(err) = result {
                log::debug!("Statement at {} failed: {err}", stmt.span().start);
                sink.record(err, stmt.span())?;
            }
        }

        for field in schema.fields().filter(|field| !field.is_optional()) {
            let consumed = match field.kind() {
                FieldKind::Attribute => state.seen_attrs.contains(field.name()),
                FieldKind::Block => state.seen_blocks.contains(field.name()),
            };
            if !consumed {
                log::debug!("Missing required {} {}", field.kind(), field.name());
                let diagnostic =
                    Diagnostic::missing_required(field.name(), field.kind(), body.span);
                sink.record(diagnostic.into(), body.span)?;
            }
        }

        log::trace!("Exiting `decode`");
        sink.finish()
    }

    fn decode_attr<R: Block>(
        &self,
        attr: &AttributeStmt,
        target: &mut R,
        schema: &Schema<R>,
        state: &mut TraversalState,
    ) -> Result<()> {
        let name = attr.name.name.as_str();
        log::trace!("Decoding attribute {name}");

        if !state.seen_attrs.insert(name.to_string()) {
            return Err(Diagnostic::duplicate_attribute(name, attr.span).into());
        }

        let field = schema
            .get(name)
            .ok_or_else(|| Diagnostic::unrecognized_attribute(name, attr.span))?;
        if field.kind() == FieldKind::Block {
            return Err(Diagnostic::attribute_is_block(name, attr.span).into());
        }

        let value = self.evaluator.evaluate(&attr.value)?;
        match field.resolve(target) {
            FieldRef::Attribute(slot) => slot.decode_value(value)?,
            _ => unreachable!("attribute field {name:?} resolved to a block slot"),
        }
        Ok(())
    }

    fn decode_block<R: Block>(
        &self,
        position: usize,
        block: &BlockStmt,
        target: &mut R,
        schema: &Schema<R>,
        state: &mut TraversalState,
    ) -> Result<()> {
        let full_name = block.full_name();
        log::trace!("Decoding block {full_name}");

        let field = schema
            .get(&full_name)
            .ok_or_else(|| Diagnostic::unrecognized_block(&full_name, block.span))?;
        if field.kind() == FieldKind::Attribute {
            return Err(Diagnostic::block_is_attribute(&full_name, block.span).into());
        }

        // The same cardinality failure would repeat for every sibling.
        if state.failed_blocks.contains(&full_name) {
            return Ok(());
        }

        let count = state.count(&full_name);
        let first_occurrence = state.seen_blocks.insert(full_name.clone());

        match field.resolve(target) {
            FieldRef::Growable(seq) => {
                if first_occurrence {
                    seq.reset(count);
                }
                let index = state.index(position);
                let element = seq
                    .element(index)
                    .unwrap_or_else(|| unreachable!("block index {index} out of bounds"));
                self.evaluator.evaluate_block(block, element)
            }
            FieldRef::Fixed(seq) => {
                if seq.len() != count {
                    state.failed_blocks.insert(full_name.clone());
                    return Err(
                        Diagnostic::arity_mismatch(&full_name, seq.len(), count, block.span).into(),
                    );
                }
                let index = state.index(position);
                let element = seq
                    .element(index)
                    .unwrap_or_else(|| unreachable!("block index {index} out of bounds"));
                self.evaluator.evaluate_block(block, element)
            }
            FieldRef::Singular(slot) => {
                if count > 1 {
                    state.failed_blocks.insert(full_name.clone());
                    return Err(Diagnostic::duplicate_block(&full_name, block.span).into());
                }
                self.evaluator.evaluate_block(block, slot)
            }
            FieldRef::Attribute(_) => {
                unreachable!("block field {full_name:?} resolved to an attribute slot")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;

    #[test]
    fn block_indices_follow_source_order_per_name() {
        let stmts: Vec<Stmt> = vec![
            BlockStmt::new("rule", vec![]).into(),
            BlockStmt::new("endpoint", vec![]).into(),
            AttributeStmt::new("name", Expr::literal("x")).into(),
            BlockStmt::new("rule", vec![]).into(),
            BlockStmt::new("a.b", vec![]).into(),
            BlockStmt::new("rule", vec![]).into(),
        ];
        let state = TraversalState::new(&stmts);

        assert_eq!(
            state.block_index,
            [Some(0), Some(0), None, Some(1), Some(0), Some(2)]
        );
        assert_eq!(state.count("rule"), 3);
        assert_eq!(state.count("endpoint"), 1);
        assert_eq!(state.count("a.b"), 1);
        assert_eq!(state.count("missing"), 0);
    }

    #[test]
    #[should_panic(expected = "block not found in index lookup table")]
    fn attribute_positions_have_no_block_index() {
        let stmts: Vec<Stmt> = vec![AttributeStmt::new("name", Expr::literal("x")).into()];
        TraversalState::new(&stmts).index(0);
    }
}
