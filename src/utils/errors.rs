use crate::lexer::token::Span;
use ariadne::{Color, Config, Label, Report, ReportKind, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    severity: DiagnosticSeverity,
    source_id: String,
    span: Span,
    message: String,
    suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new<S: Into<String>>(
        severity: DiagnosticSeverity,
        source_id: S,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            source_id: source_id.into(),
            span,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn severity(&self) -> DiagnosticSeverity {
        self.severity
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    pub fn report_kind(&self) -> ReportKind<'_> {
        match self.severity {
            DiagnosticSeverity::Error => ReportKind::Error,
            DiagnosticSeverity::Warning => ReportKind::Warning,
        }
    }

    fn report(&self, colored: bool) -> Report<'_, (String, std::ops::Range<usize>)> {
        let color = match self.severity {
            DiagnosticSeverity::Error => Color::Red,
            DiagnosticSeverity::Warning => Color::Yellow,
        };

        let span: std::ops::Range<usize> = self.span().into();
        let mut report = Report::build(self.report_kind(), self.source_id().to_string(), span.start)
            .with_config(Config::default().with_color(colored))
            .with_message(self.message())
            .with_label(Label::new((self.source_id().to_string(), span)).with_color(color));

        if let Some(suggestion) = self.suggestion() {
            report = report.with_note(format!("Suggestion: {suggestion}"));
        }

        report.finish()
    }
}

pub fn emit_diagnostics(diagnostics: &[Diagnostic], source: &str) {
    for diagnostic in diagnostics {
        let _ = diagnostic
            .report(true)
            .eprint((diagnostic.source_id().to_string(), Source::from(source)));
    }
}

/// Renders diagnostics without color so they can be attached to log records.
pub fn render_diagnostics(diagnostics: &[Diagnostic], source: &str) -> String {
    let mut buffer = Vec::new();
    for diagnostic in diagnostics {
        let report = diagnostic.report(false);
        let _ = report.write(
            (diagnostic.source_id().to_string(), Source::from(source)),
            &mut buffer,
        );
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
