//! Diagnostics for YAML configuration files

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// YAML error pointing at a location in the source file
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(navtree::yaml::syntax))]
pub struct YamlSyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    message: String,
}

impl YamlSyntaxError {
    /// Wrap a serde_yml parse error, keeping its location
    pub fn from_serde_error(err: &serde_yml::Error, source: &str, filename: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));
        let message = err.to_string();
        let help = suggest(&message);
        Self::at_location(message, source, filename, line, column, help)
    }

    /// An error at a 1-based line and column
    pub fn at_location(
        message: impl Into<String>,
        source: &str,
        filename: &str,
        line: usize,
        column: usize,
        help: Option<String>,
    ) -> Self {
        let offset = offset_of(source, line, column);
        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..offset.saturating_add(1)),
            help,
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Byte offset of the labelled location
    pub fn offset(&self) -> usize {
        self.span.offset()
    }
}

/// Failure to load a YAML file
#[derive(Debug, Error, Diagnostic)]
pub enum YamlError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] YamlSyntaxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte offset of a 1-based line/column, clamped to the end of that line
fn offset_of(source: &str, line: usize, column: usize) -> usize {
    let mut line_start = 0;
    for (n, text) in source.split_inclusive('\n').enumerate() {
        if n + 1 == line {
            let body = text.trim_end_matches('\n');
            let within = body
                .char_indices()
                .nth(column.saturating_sub(1))
                .map(|(i, _)| i)
                .unwrap_or(body.len());
            return line_start + within;
        }
        line_start += text.len();
    }
    source.len().saturating_sub(1)
}

fn suggest(message: &str) -> Option<String> {
    let msg = message.to_lowercase();

    if msg.contains("unknown field") {
        return Some(
            "Known keys are author, database, busy_timeout_ms and families".to_string(),
        );
    }
    if msg.contains("tab") {
        return Some("Indent with spaces; YAML does not allow tabs".to_string());
    }
    if msg.contains("duplicate") {
        return Some("Each key may appear only once".to_string());
    }
    if msg.contains("invalid type") {
        return Some(
            "Family policies are maps like `{ base: 1, step: 1 }`; busy_timeout_ms is milliseconds"
                .to_string(),
        );
    }
    if msg.contains("mapping values are not allowed") {
        return Some("Add a space after ':' or check the indentation".to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_of() {
        let source = "author: a\nfamilies:\n  menu: 1\n";
        assert_eq!(offset_of(source, 1, 1), 0);
        assert_eq!(offset_of(source, 2, 1), 10);
        assert_eq!(offset_of(source, 3, 3), 22);
        // past the end of a line clamps to its newline
        assert_eq!(offset_of(source, 1, 80), 9);
    }

    #[test]
    fn test_suggestions() {
        assert!(suggest("unknown field `autor`, expected one of ...").is_some());
        assert!(suggest("found character that cannot start any token (tab)").is_some());
        assert!(suggest("something else entirely").is_none());
    }

    #[test]
    fn test_from_serde_error_keeps_message() {
        let source = "author: [unclosed\n";
        let err = serde_yml::from_str::<serde_yml::Value>(source).unwrap_err();
        let diag = YamlSyntaxError::from_serde_error(&err, source, "config.yaml");
        assert_eq!(diag.message(), err.to_string());
        assert!(diag.offset() <= source.len());
    }
}
