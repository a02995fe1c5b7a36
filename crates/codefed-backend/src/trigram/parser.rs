//! Parser for line expressions.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr   := and ("or" and)*
//! and    := unary+
//! unary  := "-" unary | "(" expr ")" | term
//! term   := [field ":"] (bare | "quoted")
//! field  := file | f | content | c | repo | r | case
//! ```
//!
//! `case:yes|no|auto` sets case sensitivity for the whole expression and
//! produces no node. Text terms without a field come back unscoped (neither
//! file name nor content) so the caller can decide where they apply.

use regex::Regex;

use super::native::{NativeQuery, TextMatch};
use crate::error::QueryError;

const COMPONENT: &str = "line";
const REGEX_META: &str = r"\.+*?()|[]{}^$";

/// Deepest nesting of groups and negations accepted.
const MAX_NESTING: usize = 256;

/// `case:` setting found in an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    Yes,
    No,
    /// Case sensitive only when the pattern has an upper-case letter
    Auto,
}

impl CaseMode {
    /// Resolve for one pattern.
    pub fn is_sensitive(self, pattern: &str) -> bool {
        match self {
            Self::Yes => true,
            Self::No => false,
            Self::Auto => pattern.chars().any(char::is_uppercase),
        }
    }
}

/// A parsed line expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub query: NativeQuery,
    pub case: Option<CaseMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Any,
    File,
    Content,
    Repo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Negate,
    Or,
    Term { field: Field, text: String },
}

const FIELDS: &[(&str, Option<Field>)] = &[
    ("file:", Some(Field::File)),
    ("f:", Some(Field::File)),
    ("content:", Some(Field::Content)),
    ("c:", Some(Field::Content)),
    ("repo:", Some(Field::Repo)),
    ("r:", Some(Field::Repo)),
    ("case:", None),
];

/// Parse a line expression.
pub fn parse_line(input: &str) -> Result<ParsedLine, QueryError> {
    let lexed = Lexer::new(input).run()?;
    if lexed.tokens.is_empty() {
        return Err(QueryError::Empty(input.to_string()));
    }

    let mut parser = Parser {
        tokens: lexed.tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
    };
    let query = parser.expr()?;
    if let Some((offset, _)) = parser.peek() {
        return Err(QueryError::parse(offset, "unbalanced ')'"));
    }

    Ok(ParsedLine {
        query,
        case: lexed.case,
    })
}

/// Build a text leaf, choosing `Substring` for plain text and `Regexp`
/// otherwise. The pattern must compile.
pub fn text_leaf(component: &'static str, pattern: &str) -> Result<NativeQuery, QueryError> {
    Regex::new(pattern).map_err(|e| QueryError::invalid_regex(component, pattern, &e))?;

    let text = TextMatch::new(pattern);
    if is_literal(pattern) {
        Ok(NativeQuery::Substring(text))
    } else {
        Ok(NativeQuery::Regexp(text))
    }
}

fn is_literal(pattern: &str) -> bool {
    !pattern.chars().any(|c| REGEX_META.contains(c))
}

/// Build a repository leaf. The pattern must compile.
pub fn repo_leaf(component: &'static str, pattern: &str) -> Result<NativeQuery, QueryError> {
    Regex::new(pattern).map_err(|e| QueryError::invalid_regex(component, pattern, &e))?;
    Ok(NativeQuery::RepoRegexp(pattern.to_string()))
}

struct Lexed {
    tokens: Vec<(usize, Token)>,
    case: Option<CaseMode>,
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn run(mut self) -> Result<Lexed, QueryError> {
        let mut tokens = Vec::new();
        let mut case = None;

        loop {
            let trimmed = self.rest().trim_start();
            self.pos = self.input.len() - trimmed.len();
            let start = self.pos;

            let Some(c) = self.peek_char() else { break };
            match c {
                '(' => {
                    self.pos += 1;
                    tokens.push((start, Token::Open));
                }
                ')' => {
                    self.pos += 1;
                    tokens.push((start, Token::Close));
                }
                '-' => {
                    self.pos += 1;
                    match self.peek_char() {
                        Some(next) if !next.is_whitespace() && next != ')' => {
                            tokens.push((start, Token::Negate));
                        }
                        _ => return Err(QueryError::parse(start, "dangling '-'")),
                    }
                }
                _ => {
                    let field = self.field();
                    let value_start = self.pos;
                    let (text, quoted) = self.value()?;

                    match field {
                        None => {
                            case = Some(parse_case(value_start, &text)?);
                        }
                        Some(field) => {
                            if text.is_empty() && !quoted {
                                return Err(QueryError::parse(
                                    value_start,
                                    "missing value after field",
                                ));
                            }
                            if field == Field::Any && !quoted && text == "or" {
                                tokens.push((start, Token::Or));
                            } else {
                                tokens.push((start, Token::Term { field, text }));
                            }
                        }
                    }
                }
            }
        }

        Ok(Lexed { tokens, case })
    }

    /// Consume a field prefix. `None` stands for `case:`.
    fn field(&mut self) -> Option<Field> {
        for (prefix, field) in FIELDS {
            if self.rest().starts_with(prefix) {
                self.pos += prefix.len();
                return *field;
            }
        }
        Some(Field::Any)
    }

    fn value(&mut self) -> Result<(String, bool), QueryError> {
        if self.peek_char() == Some('"') {
            return self.quoted().map(|s| (s, true));
        }
        Ok((self.bare(), false))
    }

    /// A bare word ends at whitespace or at a `)` that closes nothing
    /// inside the word.
    fn bare(&mut self) -> String {
        let start = self.pos;
        let mut depth = 0usize;
        for (i, c) in self.rest().char_indices() {
            match c {
                c if c.is_whitespace() && depth == 0 => {
                    self.pos = start + i;
                    return self.input[start..self.pos].to_string();
                }
                '(' => depth += 1,
                ')' if depth == 0 => {
                    self.pos = start + i;
                    return self.input[start..self.pos].to_string();
                }
                ')' => depth -= 1,
                _ => {}
            }
        }
        self.pos = self.input.len();
        self.input[start..].to_string()
    }

    /// `\"` and `\\` are unescaped; other backslashes are kept for the regex.
    fn quoted(&mut self) -> Result<String, QueryError> {
        let start = self.pos;
        let mut out = String::new();
        let mut chars = self.rest().char_indices().skip(1);

        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos = start + i + 1;
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, e @ ('"' | '\\'))) => out.push(e),
                    Some((_, e)) => {
                        out.push('\\');
                        out.push(e);
                    }
                    None => break,
                },
                c => out.push(c),
            }
        }
        Err(QueryError::parse(start, "unterminated quoted string"))
    }
}

fn parse_case(offset: usize, value: &str) -> Result<CaseMode, QueryError> {
    match value {
        "yes" => Ok(CaseMode::Yes),
        "no" => Ok(CaseMode::No),
        "auto" => Ok(CaseMode::Auto),
        other => Err(QueryError::parse(
            offset,
            format!("unknown case value '{other}', expected yes, no or auto"),
        )),
    }
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<(usize, &Token)> {
        self.tokens.get(self.pos).map(|(o, t)| (*o, t))
    }

    fn offset(&self) -> usize {
        self.peek().map(|(o, _)| o).unwrap_or(self.end)
    }

    fn expr(&mut self) -> Result<NativeQuery, QueryError> {
        let mut alternatives = vec![self.and()?];
        while let Some((_, Token::Or)) = self.peek() {
            self.pos += 1;
            alternatives.push(self.and()?);
        }
        Ok(collapse(alternatives, NativeQuery::Or))
    }

    fn and(&mut self) -> Result<NativeQuery, QueryError> {
        let mut terms = Vec::new();
        while let Some((_, token)) = self.peek() {
            if matches!(token, Token::Close | Token::Or) {
                break;
            }
            terms.push(self.unary()?);
        }

        if terms.is_empty() {
            let message = match self.peek() {
                Some((_, Token::Close)) => "empty group",
                Some((_, Token::Or)) | None if self.pos > 0 => "dangling 'or'",
                _ => "expected a term",
            };
            return Err(QueryError::parse(self.offset(), message));
        }
        Ok(collapse(terms, NativeQuery::And))
    }

    fn unary(&mut self) -> Result<NativeQuery, QueryError> {
        if self.depth >= MAX_NESTING {
            return Err(QueryError::parse(self.offset(), "expression nested too deeply"));
        }
        self.depth += 1;
        let result = self.primary();
        self.depth -= 1;
        result
    }

    fn primary(&mut self) -> Result<NativeQuery, QueryError> {
        let Some((offset, token)) = self.peek() else {
            return Err(QueryError::parse(self.end, "expected a term"));
        };

        match token.clone() {
            Token::Negate => {
                self.pos += 1;
                match self.peek() {
                    Some((_, Token::Close | Token::Or)) | None => {
                        Err(QueryError::parse(offset, "dangling '-'"))
                    }
                    _ => Ok(NativeQuery::not(self.unary()?)),
                }
            }
            Token::Open => {
                self.pos += 1;
                let inner = self.expr()?;
                match self.peek() {
                    Some((_, Token::Close)) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(QueryError::parse(offset, "unbalanced '('")),
                }
            }
            Token::Term { field, text } => {
                self.pos += 1;
                match field {
                    Field::Repo => repo_leaf(COMPONENT, &text),
                    Field::Any => text_leaf(COMPONENT, &text),
                    Field::File => {
                        text_leaf(COMPONENT, &text).map(|q| scoped(q, TextMatch::file_name_only))
                    }
                    Field::Content => {
                        text_leaf(COMPONENT, &text).map(|q| scoped(q, TextMatch::content_only))
                    }
                }
            }
            Token::Close | Token::Or => Err(QueryError::parse(offset, "expected a term")),
        }
    }
}

fn scoped(leaf: NativeQuery, scope: fn(TextMatch) -> TextMatch) -> NativeQuery {
    match leaf {
        NativeQuery::Substring(t) => NativeQuery::Substring(scope(t)),
        NativeQuery::Regexp(t) => NativeQuery::Regexp(scope(t)),
        other => other,
    }
}

fn collapse(mut items: Vec<NativeQuery>, wrap: fn(Vec<NativeQuery>) -> NativeQuery) -> NativeQuery {
    if items.len() == 1 {
        items.remove(0)
    } else {
        wrap(items)
    }
}
