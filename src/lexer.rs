//! Lexical analysis: splitting a line into a command and its arguments, and
//! tokenizing a single argument into typed tokens.

use crate::error::LexError;

/// Characters that form single-character operator tokens.
pub const OPERATORS: &[char] = &['+', '-', '/', '*', '(', ')', '|', '&', '^'];

/// The kind of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `$name`; the token value is the name without the `$`.
    Variable,
    /// An unsigned decimal integer literal.
    Number,
    /// A double-quoted literal with escapes already resolved.
    String,
    /// One of [`OPERATORS`].
    Operator,
}

/// A single token of an argument expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub kind: TokenKind,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }

    pub fn is_operator(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Operator && self.value == symbol
    }
}

/// Split a trimmed source line into its command word and the rest of the line.
///
/// The command is returned as written; callers fold it to lowercase.
pub fn split_line(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    }
}

/// Split an argument string on commas that are outside quoted and parenthesized spans.
///
/// Inside quotes a backslash keeps the following character verbatim. A parenthesized
/// span runs to the first `)` regardless of nesting. Spans that never close run to the
/// end of the input; the tokenizer reports them afterwards.
pub fn split_args(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = args.chars();

    while let Some(ch) = chars.next() {
        match ch {
            ',' => out.push(std::mem::take(&mut current).trim().to_string()),
            '"' => {
                current.push(ch);
                while let Some(next) = chars.next() {
                    current.push(next);
                    match next {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '(' => {
                current.push(ch);
                for next in chars.by_ref() {
                    current.push(next);
                    if next == ')' {
                        break;
                    }
                }
            }
            c => current.push(c),
        }
    }

    out.push(current.trim().to_string());
    out
}

struct Tokenizer {
    input: Vec<char>,
    pos: usize,
}

impl Tokenizer {
    fn new(arg: &str) -> Self {
        Tokenizer {
            input: arg.chars().collect(),
            pos: 0,
        }
    }

    fn make_tokens(&mut self) -> Result<Vec<Token>, LexError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match ch {
                c if c.is_whitespace() => {}
                '"' => out.push(Token::new(TokenKind::String, self.read_string()?)),
                '$' => {
                    let name = self.read_while(is_name_char);
                    if name.is_empty() {
                        return Err(LexError::EmptyVariableName);
                    }
                    out.push(Token::new(TokenKind::Variable, name));
                }
                c if c.is_ascii_digit() => {
                    let mut digits = c.to_string();
                    digits.push_str(&self.read_while(|c| c.is_ascii_digit()));
                    out.push(Token::new(TokenKind::Number, digits));
                }
                c if OPERATORS.contains(&c) => out.push(Token::new(TokenKind::Operator, c)),
                c => return Err(LexError::UnexpectedCharacter(c)),
            }
        }

        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn read_while(&mut self, accept: impl Fn(char) -> bool) -> String {
        let mut s = String::new();
        while let Some(ch) = self.peek_char() {
            if !accept(ch) {
                break;
            }
            s.push(ch);
            self.pos += 1;
        }
        s
    }

    /// Reads the body of a string literal; the opening quote is already consumed.
    fn read_string(&mut self) -> Result<String, LexError> {
        let mut s = String::new();
        while let Some(ch) = self.read_char() {
            match ch {
                '"' => return Ok(s),
                '\\' => match self.read_char() {
                    Some('"') => s.push('"'),
                    Some('\\') => s.push('\\'),
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(other) => return Err(LexError::UnknownEscape(other)),
                    None => break,
                },
                c => s.push(c),
            }
        }
        Err(LexError::UnterminatedString)
    }
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Tokenize one argument string.
pub fn tokenize(arg: &str) -> Result<Vec<Token>, LexError> {
    Tokenizer::new(arg).make_tokens()
}

/// Render a string as a literal that [`tokenize`] reads back unchanged.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
