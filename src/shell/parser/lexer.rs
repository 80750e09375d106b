use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

use once_cell::sync::Lazy;

use super::token::{Token, TokenKind};
use crate::shell::error::TokenizeError;

/// Escape codes recognised after a backslash. Anything else stands for itself.
/// `\e` yields the digit `3`, not ESC.
static ESCAPES: Lazy<HashMap<char, char>> = Lazy::new(|| {
    HashMap::from([
        ('a', '\x07'),
        ('e', '\x33'),
        ('n', '\n'),
        ('r', '\r'),
        ('t', '\t'),
    ])
});

fn unescape(c: char) -> char {
    ESCAPES.get(&c).copied().unwrap_or(c)
}

fn is_operator(c: char) -> bool {
    matches!(c, '#' | ';' | '&' | '|' | '<' | '>' | '(' | ')')
}

/// Turns command text into tokens.
///
/// The tokenizer remembers whether the text ended inside an escape, a quote
/// or an open scope, so the read loop can ask for continuation lines and
/// tokenize the accumulated text again.
pub struct Tokenizer<'a> {
    input: Peekable<Chars<'a>>,
    tokens: Vec<Token>,
    in_escape: bool,
    in_quote: bool,
    scope_depth: i32,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
            tokens: Vec::new(),
            in_escape: false,
            in_quote: false,
            scope_depth: 0,
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    pub fn in_escape(&self) -> bool {
        self.in_escape
    }

    pub fn in_quote(&self) -> bool {
        self.in_quote
    }

    /// Whether more `(` than `)` have been seen. A surplus of `)` is not a
    /// continuation condition; the parser reports it.
    pub fn in_scope(&self) -> bool {
        self.scope_depth > 0
    }

    pub fn is_valid(&self) -> bool {
        !(self.in_escape || self.in_quote || self.in_scope())
    }

    /// Extracts tokens until the input is exhausted.
    pub fn apply(&mut self) -> Result<&[Token], TokenizeError> {
        while let Some(token) = self.next_token()? {
            self.tokens.push(token);
        }
        Ok(&self.tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, TokenizeError> {
        loop {
            self.skip_whitespace();
            if !self.ignore_comment() {
                break;
            }
        }

        let Some(c) = self.peek_char() else {
            return Ok(None);
        };

        let token = match c {
            ';' => self.single(TokenKind::Sequence),
            '&' => {
                self.read_char();
                if !self.next_if('&') {
                    return Err(TokenizeError::Unexpected('&'));
                }
                Token::new(TokenKind::Conjunction, "&&")
            }
            '|' => {
                self.read_char();
                if self.next_if('|') {
                    Token::new(TokenKind::Disjunction, "||")
                } else {
                    Token::new(TokenKind::Pipe, "|")
                }
            }
            '<' => self.single(TokenKind::InputRedirect),
            '>' => {
                self.read_char();
                if self.next_if('>') {
                    Token::new(TokenKind::AppendRedirect, ">>")
                } else {
                    Token::new(TokenKind::OutputRedirect, ">")
                }
            }
            '(' => {
                self.scope_depth += 1;
                self.single(TokenKind::OpenScope)
            }
            ')' => {
                self.scope_depth -= 1;
                self.single(TokenKind::CloseScope)
            }
            _ => return Ok(self.read_word()),
        };

        Ok(Some(token))
    }

    fn read_char(&mut self) -> Option<char> {
        self.input.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    fn next_if(&mut self, expected: char) -> bool {
        self.input.next_if_eq(&expected).is_some()
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let text = self.read_char().map(String::from).unwrap_or_default();
        Token::new(kind, text)
    }

    fn skip_whitespace(&mut self) {
        while self.input.next_if(|c| c.is_whitespace()).is_some() {}
    }

    /// Skips a `#` comment through the end of its line.
    fn ignore_comment(&mut self) -> bool {
        if self.peek_char() != Some('#') {
            return false;
        }
        for c in self.input.by_ref() {
            if c == '\n' {
                break;
            }
        }
        true
    }

    /// A word is any run of direct and quoted segments, e.g. `a"b c"d`.
    fn read_word(&mut self) -> Option<Token> {
        let mut text = String::new();
        let mut found = false;
        while self.read_direct(&mut text) || self.read_quoted(&mut text) {
            found = true;
        }
        found.then(|| Token::word(text))
    }

    fn is_direct(&self, c: char) -> bool {
        if c == '"' {
            return false;
        }
        self.in_quote || !(c.is_whitespace() || is_operator(c))
    }

    fn read_direct(&mut self, text: &mut String) -> bool {
        let mut count = 0;
        while let Some(c) = self.peek_char() {
            if !self.is_direct(c) {
                break;
            }
            self.read_char();

            if c == '\\' {
                self.in_escape = true;
                let Some(escaped) = self.read_char() else {
                    return false;
                };
                text.push(unescape(escaped));
                self.in_escape = false;
            } else {
                text.push(c);
            }
            count += 1;
        }
        count > 0
    }

    fn read_quoted(&mut self, text: &mut String) -> bool {
        if self.peek_char() != Some('"') {
            return false;
        }
        self.in_quote = true;
        self.read_char();

        self.read_direct(text);

        if self.peek_char() != Some('"') {
            return false;
        }
        self.in_quote = false;
        self.read_char();
        true
    }
}

/// Tokenizes a complete piece of text.
pub fn tokenize(text: &str) -> Result<Tokenizer<'_>, TokenizeError> {
    let mut tokenizer = Tokenizer::new(text);
    tokenizer.apply()?;
    Ok(tokenizer)
}
