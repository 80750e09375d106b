use std::fmt;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenKind {
    Word,
    Sequence,       // ;
    Conjunction,    // &&
    Disjunction,    // ||
    Pipe,           // |
    InputRedirect,  // <
    OutputRedirect, // >
    AppendRedirect, // >>
    OpenScope,      // (
    CloseScope,     // )
}

/// A lexical token. The end of the stream is signalled by the tokenizer
/// returning `None`, so no terminator token is ever stored.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn word(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Word, text)
    }

    pub fn is_connective(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Sequence | TokenKind::Conjunction | TokenKind::Disjunction | TokenKind::Pipe
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Word => write!(f, "{:?}", self.text),
            _ => write!(f, "{}", self.text),
        }
    }
}
