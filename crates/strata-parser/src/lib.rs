//! Strata source reader
//!
//! Reads Java-like compilation units into the source layer of a
//! [`strata_model::CodeModel`]. The [`CharScanner`] walks the text, the
//! [`LowLevelReader`] handles comments, annotations, modifiers, and
//! expressions, the [`Parser`] builds a syntax tree of the unit, and the
//! [`SourceCodeReader`] turns that tree into model nodes.
//!
//! Loaders ([`InMemorySourceLoader`], [`DirectorySourceLoader`]) plug the
//! reader into a model so main layer types pick up their source lazily.

#![warn(missing_docs)]

pub mod ast;
pub mod error;
pub mod guards;
pub mod loader;
pub mod lowlevel;
pub mod parser;
pub mod reader;
pub mod report;
pub mod scanner;

pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use loader::{DirectorySourceLoader, InMemorySourceLoader};
pub use lowlevel::LowLevelReader;
pub use parser::{parse_compilation_unit, Parser};
pub use reader::{read_compilation_unit, SourceCodeReader};
pub use report::{emit_diagnostics, emit_parse_error, render_diagnostics, render_parse_error};
pub use scanner::{CharScanner, Span};
