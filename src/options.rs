//! Knobs controlling a decode.

/// What the decoder does when a statement fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorMode {
    /// Stop at the first failure and return it unchanged.
    #[default]
    AbortOnFirst,
    /// Keep going and report every diagnostic of the whole tree at once.
    ///
    /// Evaluation and conversion failures are turned into diagnostics at the
    /// span of the statement that produced them.
    Accumulate,
}

/// Options for a decode. Nested blocks inherit the options of their parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Failure handling.
    pub error_mode: ErrorMode,
}

impl DecodeOptions {
    /// Default options: abort on the first failure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the error mode.
    pub fn with_error_mode(mut self, error_mode: ErrorMode) -> Self {
        self.error_mode = error_mode;
        self
    }
}
