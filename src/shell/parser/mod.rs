pub mod ast;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;
pub mod token;

pub use ast::{Builtin, Command};
pub use lexer::tokenize;
pub use parser::parse;
pub use token::{Token, TokenKind};
