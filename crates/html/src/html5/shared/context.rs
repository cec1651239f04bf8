//! Document-level parse context (shared resources).

use super::{AtomTable, Counters, ParseError, ParseErrorCode};

/// Document-level parse context shared by tokenizer and tree builder.
///
/// Owns document-lifetime resources such as atom tables and metrics.
#[derive(Debug, Default)]
pub struct DocumentParseContext {
    pub atoms: AtomTable,
    pub counters: Counters,
    pub errors: Vec<ParseError>,
}

impl DocumentParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_error(&mut self, code: ParseErrorCode, line: u32) {
        self.counters.parse_errors = self.counters.parse_errors.saturating_add(1);
        self.errors.push(ParseError { code, line });
    }
}
