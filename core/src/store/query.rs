//! Query language of the in-memory index
//!
//! `tag:`, `thread:`, `from:`, `subject:` terms, bare words (subject
//! match), `*`, `AND`/`OR`/`NOT` and parentheses. Adjacent terms are ANDed.

use crate::error::{NotchError, Result};
use crate::store::TagSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    All,
    Tag(String),
    Thread(String),
    From(String),
    Subject(String),
    And(Box<Query>, Box<Query>),
    Or(Box<Query>, Box<Query>),
    Not(Box<Query>),
}

/// Fields of one message a query is evaluated against
pub struct MessageFields<'a> {
    pub thread: &'a str,
    pub subject: &'a str,
    pub from: &'a str,
    pub tags: &'a TagSet,
}

impl Query {
    pub fn matches(&self, msg: &MessageFields<'_>) -> bool {
        match self {
            Query::All => true,
            Query::Tag(tag) => msg.tags.contains(tag),
            Query::Thread(id) => msg.thread == id,
            Query::From(needle) => contains_ci(msg.from, needle),
            Query::Subject(needle) => contains_ci(msg.subject, needle),
            Query::And(a, b) => a.matches(msg) && b.matches(msg),
            Query::Or(a, b) => a.matches(msg) || b.matches(msg),
            Query::Not(q) => !q.matches(msg),
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Word(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            _ => {
                let mut word = String::new();
                let mut quoted = false;
                while let Some(&c) = chars.peek() {
                    if c == '"' {
                        quoted = !quoted;
                        chars.next();
                        continue;
                    }
                    if !quoted && (c.is_whitespace() || c == '(' || c == ')') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                if quoted {
                    return Err(parse_error(input, "unterminated quote"));
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

fn parse_error(query: &str, reason: impl Into<String>) -> NotchError {
    NotchError::Parse {
        query: query.to_string(),
        reason: reason.into(),
    }
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w == keyword)
    }

    fn or_expr(&mut self) -> Result<Query> {
        let mut left = self.and_expr()?;
        while self.peek_keyword("OR") {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Query::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Query> {
        let mut left = self.unary()?;
        loop {
            if self.peek_keyword("AND") {
                self.pos += 1;
            } else if self.peek_keyword("OR") || matches!(self.peek(), None | Some(Token::Close)) {
                break;
            }
            let right = self.unary()?;
            left = Query::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Query> {
        if self.peek_keyword("NOT") {
            self.pos += 1;
            return Ok(Query::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Query> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| parse_error(self.input, "unexpected end of query"))?;
        self.pos += 1;
        match token {
            Token::Open => {
                let inner = self.or_expr()?;
                match self.peek() {
                    Some(Token::Close) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(parse_error(self.input, "missing ')'")),
                }
            }
            Token::Close => Err(parse_error(self.input, "unexpected ')'")),
            Token::Word(word) => term(self.input, &word),
        }
    }
}

fn term(input: &str, word: &str) -> Result<Query> {
    if word == "*" {
        return Ok(Query::All);
    }
    let Some((prefix, value)) = word.split_once(':') else {
        return Ok(Query::Subject(word.to_string()));
    };
    if value.is_empty() {
        return Err(parse_error(input, format!("empty value for '{}:'", prefix)));
    }
    let value = value.to_string();
    match prefix {
        "tag" => Ok(Query::Tag(value)),
        "thread" => Ok(Query::Thread(value)),
        "from" => Ok(Query::From(value)),
        "subject" => Ok(Query::Subject(value)),
        other => Err(parse_error(input, format!("unknown prefix '{}:'", other))),
    }
}

pub fn parse(input: &str) -> Result<Query> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(parse_error(input, "empty query"));
    }
    let mut parser = Parser {
        input,
        tokens,
        pos: 0,
    };
    let query = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(parse_error(input, "trailing input"));
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tag_set;

    fn msg<'a>(thread: &'a str, tags: &'a TagSet) -> MessageFields<'a> {
        MessageFields {
            thread,
            subject: "Weekly report",
            from: "Alice <alice@example.org>",
            tags,
        }
    }

    #[test]
    fn test_implicit_and_binds_tighter_than_or() {
        let q = parse("tag:a tag:b OR tag:c").unwrap();
        let tags = tag_set(["c"]);
        assert!(q.matches(&msg("t1", &tags)));
        let tags = tag_set(["a"]);
        assert!(!q.matches(&msg("t1", &tags)));
    }

    #[test]
    fn test_reconciliation_query_shape() {
        let q = parse("(tag:inbox AND NOT tag:killed) AND thread:t1").unwrap();
        let tags = tag_set(["inbox"]);
        assert!(q.matches(&msg("t1", &tags)));
        assert!(!q.matches(&msg("t2", &tags)));
        let tags = tag_set(["inbox", "killed"]);
        assert!(!q.matches(&msg("t1", &tags)));
    }

    #[test]
    fn test_field_terms_are_case_insensitive() {
        let tags = TagSet::new();
        assert!(parse("from:ALICE").unwrap().matches(&msg("t", &tags)));
        assert!(parse("report").unwrap().matches(&msg("t", &tags)));
        assert!(parse("subject:\"weekly report\"").unwrap().matches(&msg("t", &tags)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").is_err());
        assert!(parse("(tag:a").is_err());
        assert!(parse("tag:").is_err());
        assert!(parse("bogus:x").is_err());
        assert!(parse("tag:a )").is_err());
    }
}
