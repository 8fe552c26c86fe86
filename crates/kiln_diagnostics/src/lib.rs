//! Structured diagnostics for the Kiln builder.
//!
//! Every user-facing problem (a malformed definition, a missing import, a
//! cycle, a duplicate operation name) becomes a [`Diagnostic`] with a stable
//! [`DiagnosticCode`], a [`Location`] naming the file and in-file path, and
//! optional help text and related files. Diagnostics are accumulated in a
//! thread-safe [`DiagnosticSink`] and rendered for terminals or as JSON.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod location;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use location::Location;
pub use renderer::{DiagnosticRenderer, JsonRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
