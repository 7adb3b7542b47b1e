//! Text rendering of diagnostics in compact and full modes.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use std::io::Write;
use veld_source::SourceDb;

/// How much detail the renderer produces per diagnostic.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RenderMode {
    /// One line per diagnostic: `severity: message`.
    Compact,
    /// Multi-line rendering with file, location, and hint lines.
    Full,
}

/// Renders diagnostics to a writer.
///
/// Colors follow the severity and are suppressed when the `NO_COLOR`
/// environment variable is set or when disabled explicitly.
pub struct Renderer {
    mode: RenderMode,
    color: bool,
}

impl Renderer {
    /// Creates a renderer in the given mode, honoring `NO_COLOR`.
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            color: std::env::var_os("NO_COLOR").is_none(),
        }
    }

    /// Creates a renderer with colors forced on or off.
    pub fn with_color(mode: RenderMode, color: bool) -> Self {
        Self { mode, color }
    }

    fn color_code(severity: Severity) -> &'static str {
        match severity {
            Severity::Note => "\x1b[36m",
            Severity::Warning => "\x1b[33m",
            Severity::Error | Severity::Fatal => "\x1b[31m",
        }
    }

    /// Renders one diagnostic to `out`.
    pub fn render(
        &self,
        diag: &Diagnostic,
        sources: &SourceDb,
        out: &mut impl Write,
    ) -> std::io::Result<()> {
        let (tint, reset) = if self.color {
            (Self::color_code(diag.severity), "\x1b[0m")
        } else {
            ("", "")
        };

        match self.mode {
            RenderMode::Compact => {
                writeln!(out, "{tint}{}{reset}: {}", diag.severity, diag.message)?;
            }
            RenderMode::Full => {
                if let Some(loc) = diag.loc.filter(|l| !l.is_dummy()) {
                    let file = sources
                        .path(loc.file)
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "<unknown>".to_string());
                    writeln!(
                        out,
                        "{tint}{}{reset}: {} ({file}:{}:{})",
                        diag.severity, diag.message, loc.line, loc.column
                    )?;
                } else {
                    writeln!(out, "{tint}{}{reset}: {}", diag.severity, diag.message)?;
                }
                for hint in &diag.hints {
                    writeln!(out, "   | {hint}")?;
                }
            }
        }
        Ok(())
    }

    /// Renders a batch of diagnostics to `out`.
    pub fn render_all(
        &self,
        diags: &[Diagnostic],
        sources: &SourceDb,
        out: &mut impl Write,
    ) -> std::io::Result<()> {
        for diag in diags {
            self.render(diag, sources, out)?;
        }
        Ok(())
    }
}
