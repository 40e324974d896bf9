//! Upload part metadata.
//!
//! The host hands over the headers of the multipart section that carries
//! the file. [`UploadMeta::from_headers`] extracts the pieces the consumer
//! cares about: form field name, client filename, content type and the
//! declared length (when the client sent one).

use serde::Serialize;

/// A part header as a name-value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartHeader {
    pub name: String,
    pub value: String,
}

/// Ordered headers of one multipart section.
///
/// Lookups are case-insensitive and return the first match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartHeaders {
    entries: Vec<PartHeader>,
}

impl PartHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push(PartHeader {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for PartHeaders {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// What is known about an upload before its body is read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadMeta {
    /// Form field the file was sent under.
    pub field_name: Option<String>,
    /// Filename as supplied by the client. Never trusted as a path.
    pub filename: Option<String>,
    pub content_type: Option<String>,
    /// Length the client declared for this part, if any.
    pub declared_len: Option<u64>,
}

impl UploadMeta {
    /// Build metadata from the section's `Content-Disposition`,
    /// `Content-Type` and `Content-Length` headers.
    ///
    /// Malformed or missing headers leave the corresponding field empty.
    pub fn from_headers(headers: &PartHeaders) -> Self {
        let (field_name, filename) = headers
            .get("content-disposition")
            .map(parse_disposition)
            .unwrap_or_default();

        Self {
            field_name,
            filename,
            content_type: headers
                .get("content-type")
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            declared_len: headers
                .get("content-length")
                .and_then(|v| v.trim().parse().ok()),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_declared_len(mut self, len: u64) -> Self {
        self.declared_len = Some(len);
        self
    }
}

/// Extract `name` and `filename` parameters from a `Content-Disposition` value.
fn parse_disposition(value: &str) -> (Option<String>, Option<String>) {
    let mut name = None;
    let mut filename = None;

    for param in split_params(value).into_iter().skip(1) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let val = unquote(raw.trim());
        if key.eq_ignore_ascii_case("name") {
            name = Some(val);
        } else if key.eq_ignore_ascii_case("filename") {
            filename = Some(val);
        }
    }

    (name, filename)
}

/// Split on `;` outside of double quotes.
fn split_params(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                parts.push(value[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(value[start..].trim());
    parts
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_headers_case_insensitive_first_match() {
        let mut headers = PartHeaders::new();
        headers.insert("Content-Type", "text/plain");
        headers.insert("content-type", "application/json");

        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("x-missing"), None);
    }

    #[test]
    fn meta_from_typical_file_part() {
        let headers: PartHeaders = [
            (
                "Content-Disposition",
                r#"form-data; name="file"; filename="report.pdf""#,
            ),
            ("Content-Type", "application/pdf"),
            ("Content-Length", "2048"),
        ]
        .into_iter()
        .collect();

        let meta = UploadMeta::from_headers(&headers);
        assert_eq!(meta.field_name.as_deref(), Some("file"));
        assert_eq!(meta.filename.as_deref(), Some("report.pdf"));
        assert_eq!(meta.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(meta.declared_len, Some(2048));
    }

    #[test]
    fn meta_filename_with_semicolon_and_escaped_quote() {
        let headers: PartHeaders = [(
            "content-disposition",
            r#"form-data; filename="a;b \"c\".txt"; name=upload"#,
        )]
        .into_iter()
        .collect();

        let meta = UploadMeta::from_headers(&headers);
        assert_eq!(meta.filename.as_deref(), Some(r#"a;b "c".txt"#));
        assert_eq!(meta.field_name.as_deref(), Some("upload"));
    }

    #[test]
    fn meta_ignores_malformed_values() {
        let headers: PartHeaders = [
            ("Content-Disposition", "form-data; garbage"),
            ("Content-Type", "  "),
            ("Content-Length", "lots"),
        ]
        .into_iter()
        .collect();

        assert_eq!(UploadMeta::from_headers(&headers), UploadMeta::default());
    }

    #[test]
    fn meta_from_empty_headers() {
        assert_eq!(
            UploadMeta::from_headers(&PartHeaders::new()),
            UploadMeta::default()
        );
    }

    #[test]
    fn meta_builders() {
        let meta = UploadMeta::default()
            .with_filename("x.bin")
            .with_content_type("application/octet-stream")
            .with_declared_len(7);
        assert_eq!(meta.filename.as_deref(), Some("x.bin"));
        assert_eq!(meta.declared_len, Some(7));
    }
}
