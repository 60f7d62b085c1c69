//! Draft messages and their plain-text scratch format
//!
//! `Key: Value` header lines, a blank line, then the body. Folded header
//! lines (starting with whitespace) continue the previous header.

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mail {
    headers: Vec<(String, String)>,
    body: String,
}

impl Mail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Self {
        let mut headers: Vec<(String, String)> = Vec::new();
        let mut lines = text.lines();
        let mut body_lines: Vec<&str> = Vec::new();

        for line in lines.by_ref() {
            if line.trim().is_empty() {
                break;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = headers.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                    continue;
                }
            }
            match line.split_once(':') {
                Some((key, value)) if is_header_name(key) => {
                    headers.push((key.to_string(), value.trim().to_string()));
                }
                _ => {
                    // not a header: the draft has no blank separator line
                    body_lines.push(line);
                    break;
                }
            }
        }
        body_lines.extend(lines);

        let mut body = body_lines.join("\n");
        if text.ends_with('\n') && !body.is_empty() {
            body.push('\n');
        }
        Self { headers, body }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Replace the first header named `key`, or append it
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some((_, v)) => *v = value,
            None => self.headers.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.headers {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out
    }
}

impl fmt::Display for Mail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn is_header_name(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_graphic() && c != ':')
}

/// Address part of `Name <addr>`, or the trimmed input
pub fn parse_address(value: &str) -> String {
    let value = value.trim();
    match (value.rfind('<'), value.rfind('>')) {
        (Some(start), Some(end)) if start < end => value[start + 1..end].trim().to_string(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers_and_body() {
        let mail = Mail::parse("From: Me <me@example.org>\nTo: you@example.org\n\nhello\nthere\n");
        assert_eq!(mail.get("from"), Some("Me <me@example.org>"));
        assert_eq!(mail.get("To"), Some("you@example.org"));
        assert_eq!(mail.body(), "hello\nthere\n");
    }

    #[test]
    fn test_folded_header_continues_previous() {
        let mail = Mail::parse("Subject: a very\n  long subject\n\nbody");
        assert_eq!(mail.get("Subject"), Some("a very long subject"));
        assert_eq!(mail.body(), "body");
    }

    #[test]
    fn test_missing_separator_starts_body() {
        let mail = Mail::parse("To: x@example.org\nthis is the body\nsecond line");
        assert_eq!(mail.get("To"), Some("x@example.org"));
        assert_eq!(mail.body(), "this is the body\nsecond line");
    }

    #[test]
    fn test_set_replaces_first_match() {
        let mut mail = Mail::new();
        mail.set("To", "a@example.org");
        mail.set("to", "b@example.org");
        assert_eq!(mail.headers().count(), 1);
        assert_eq!(mail.get("TO"), Some("b@example.org"));
        mail.remove("To");
        assert!(!mail.contains("To"));
    }

    #[test]
    fn test_render_is_readable_by_parse() {
        let mut mail = Mail::new();
        mail.set("From", "Me <me@example.org>");
        mail.set("Subject", "hi");
        mail.set_body("text\n");
        assert_eq!(mail.render(), "From: Me <me@example.org>\nSubject: hi\n\ntext\n");
        assert_eq!(Mail::parse(&mail.render()), mail);
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("Me <me@example.org>"), "me@example.org");
        assert_eq!(parse_address(" me@example.org "), "me@example.org");
    }
}
