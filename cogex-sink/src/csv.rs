use std::borrow::Cow;

use cogex_core::Cell;

/// Quotes a field when it contains a delimiter, quote or line break.
pub fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// One CSV line, newline-terminated.
pub fn line(cells: &[Cell]) -> String {
    let mut out = cells
        .iter()
        .map(|c| escape(&c.to_string()).into_owned())
        .collect::<Vec<_>>()
        .join(",");
    out.push('\n');
    out
}
