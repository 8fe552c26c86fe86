//! Diagnostic rendering backends for human-readable and machine-readable output.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use kiln_source::SourceDb;

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic, source_db: &SourceDb) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// error[GRAPH_MISSING_IMPORT]: `src/query.ts` imports `missingFragment` from `./user`, which does not export it
///   --> src/query.ts:3:10 (GetUser)
///    |
///  3 | import { missingFragment } from "./user";
///    |          ^^^^^^^^^^^^^^^
///    = related: src/user.ts
///    = help: check the export list of the target module
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, text: &str, ansi: &str) -> String {
        if self.color {
            format!("\x1b[{ansi}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic, source_db: &SourceDb) -> String {
        let mut out = String::new();

        let color = match diag.severity {
            Severity::Error => "1;31",
            Severity::Warning => "1;33",
        };
        let header = format!("{}[{}]", diag.severity, diag.code);
        out.push_str(&format!("{}: {}\n", self.paint(&header, color), diag.message));

        if let Some(location) = &diag.location {
            let suffix = location
                .ast_path
                .as_ref()
                .map(|p| format!(" ({p})"))
                .unwrap_or_default();
            let resolved = location
                .span
                .and_then(|span| source_db.resolve_span(&location.file_path, span).map(|r| (span, r)));
            match resolved {
                Some((span, resolved)) => {
                    out.push_str(&format!("  --> {resolved}{suffix}\n"));
                    let line_num = resolved.start_line.to_string();
                    let padding = " ".repeat(line_num.len());
                    let line_text = source_db
                        .file_by_path(&location.file_path)
                        .and_then(|f| f.line_text(resolved.start_line))
                        .unwrap_or("");
                    out.push_str(&format!("{padding} |\n"));
                    out.push_str(&format!("{line_num} | {line_text}\n"));
                    let width = if resolved.end_line == resolved.start_line {
                        (resolved.end_col + 1).saturating_sub(resolved.start_col).max(1)
                    } else {
                        span.len().max(1)
                    };
                    let carets = "^".repeat(width as usize);
                    let col_padding = " ".repeat((resolved.start_col as usize).saturating_sub(1));
                    out.push_str(&format!("{padding} | {col_padding}{}\n", self.paint(&carets, color)));
                }
                None => out.push_str(&format!("  --> {}{suffix}\n", location.file_path)),
            }
        }

        for file in &diag.related {
            out.push_str(&format!("   = related: {file}\n"));
        }
        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }

        out
    }
}

/// Renders each diagnostic as one line of JSON.
pub struct JsonRenderer;

impl DiagnosticRenderer for JsonRenderer {
    fn render(&self, diag: &Diagnostic, _source_db: &SourceDb) -> String {
        match serde_json::to_string(diag) {
            Ok(json) => format!("{json}\n"),
            Err(e) => format!("{{\"code\":\"INTERNAL_INVARIANT\",\"message\":\"{e}\"}}\n"),
        }
    }
}
