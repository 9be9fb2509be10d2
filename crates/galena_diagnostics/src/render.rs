//! Terminal rendering of diagnostics.

use crate::diagnostic::Diagnostic;
use galena_source::SourceDb;

/// Renders one diagnostic in rustc style:
///
/// ```text
/// error[E101]: expected ';', found 'endmodule'
///   --> adder.sv:4:1
///    = note: ...
/// ```
///
/// The source line itself is not echoed; failures print a single-line
/// summary plus a location.
pub fn render_terminal(diag: &Diagnostic, sources: &SourceDb) -> String {
    let mut out = format!("{}[{}]: {}\n", diag.severity, diag.code, diag.message);
    if !diag.span.is_none() {
        let loc = sources.resolve(diag.span);
        out.push_str(&format!("  --> {loc}\n"));
    }
    for note in &diag.notes {
        out.push_str(&format!("   = note: {note}\n"));
    }
    out
}
