//! Shared types for the HTML5 parsing path.
//!
//! This module is `pub(crate)`; downstream consumers must import these types via
//! `html::html5::{Token, InputStream, ParseError, ...}`.

mod atom;
mod context;
mod counters;
mod error;
mod input;
mod token;

pub use atom::{AtomId, AtomTable};
pub use context::DocumentParseContext;
pub use counters::Counters;
pub use error::{ParseError, ParseErrorCode};
pub use input::{ByteStreamDecoder, InputStream};
pub use token::{Attribute, Token, attribute_value};
