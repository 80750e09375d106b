use log::trace;

use super::ast::Command;
use super::token::{Token, TokenKind};
use crate::shell::error::ParseError;

type SlotId = usize;

const ROOT: SlotId = 0;

/// Deepest tree accepted. Building and executing a tree both recurse once
/// per level.
const MAX_DEPTH: usize = 1000;

#[derive(Debug, Clone, Copy)]
enum Connective {
    Conjunction,
    Disjunction,
    Pipe,
}

impl Connective {
    fn name(self) -> &'static str {
        match self {
            Connective::Conjunction => "conjunction",
            Connective::Disjunction => "disjunction",
            Connective::Pipe => "pipe",
        }
    }

    fn join(self, primary: Command, secondary: Command) -> Command {
        let primary = Box::new(primary);
        let secondary = Box::new(secondary);
        match self {
            Connective::Conjunction => Command::Conjunctive { primary, secondary },
            Connective::Disjunction => Command::Disjunctive { primary, secondary },
            Connective::Pipe => Command::Pipe { primary, secondary },
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Redirect {
    Input,
    Output,
    Append,
}

impl Redirect {
    fn wrap(self, primary: Command, path: String) -> Command {
        let primary = Box::new(primary);
        match self {
            Redirect::Input => Command::InputRedirection { primary, path },
            Redirect::Output => Command::OutputRedirection { primary, path },
            Redirect::Append => Command::AppendRedirection { primary, path },
        }
    }
}

/// Partially built node. Children are referred to by slot, so a slot can be
/// refilled (wrapped by a connective) without touching its parent.
#[derive(Debug)]
enum Draft {
    Simple(Command),
    Sequence { items: Vec<SlotId>, scoped: bool },
    Binary {
        connective: Connective,
        primary: SlotId,
        secondary: SlotId,
    },
    Redirection {
        redirect: Redirect,
        primary: SlotId,
        path: Option<String>,
    },
}

#[derive(Debug)]
struct Scope {
    sequence: SlotId,
    restore: SlotId,
}

/// Single-pass parser building a [`Command`] tree from tokens.
///
/// The parser keeps a "current slot": the position in the tree where the
/// next command goes. Words fill it, connectives push its content down into
/// a new binary node and move on to the right-hand slot, and scopes save the
/// slot to come back to on `)`.
pub struct Parser<'a> {
    tokens: &'a [Token],
    slots: Vec<Option<Draft>>,
    current: SlotId,
    scopes: Vec<Scope>,
    root_sequence: bool,
    pending_path: Option<SlotId>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            slots: vec![None],
            current: ROOT,
            scopes: Vec::new(),
            root_sequence: false,
            pending_path: None,
        }
    }

    /// Parses every token. An empty token sequence yields no tree.
    pub fn apply(mut self) -> Result<Option<Command>, ParseError> {
        for token in self.tokens {
            trace!("parsing token {}", token);
            match token.kind {
                TokenKind::Word => self.parse_word(&token.text)?,
                TokenKind::Sequence => self.parse_sequence()?,
                TokenKind::Conjunction => self.parse_connective(Connective::Conjunction)?,
                TokenKind::Disjunction => self.parse_connective(Connective::Disjunction)?,
                TokenKind::Pipe => self.parse_connective(Connective::Pipe)?,
                TokenKind::InputRedirect => self.parse_redirection(Redirect::Input)?,
                TokenKind::OutputRedirect => self.parse_redirection(Redirect::Output)?,
                TokenKind::AppendRedirect => self.parse_redirection(Redirect::Append)?,
                TokenKind::OpenScope => self.parse_open_scope()?,
                TokenKind::CloseScope => self.parse_close_scope()?,
            }
        }
        self.finish()
    }

    fn alloc(&mut self, draft: Option<Draft>) -> SlotId {
        self.slots.push(draft);
        self.slots.len() - 1
    }

    fn expect_no_pending_path(&self) -> Result<(), ParseError> {
        match self.pending_path {
            Some(_) => Err(ParseError::RedirectionWithoutPath),
            None => Ok(()),
        }
    }

    fn parse_word(&mut self, text: &str) -> Result<(), ParseError> {
        // The word right after a redirection operator is its path
        if let Some(id) = self.pending_path.take() {
            if let Some(Draft::Redirection { path, .. }) = &mut self.slots[id] {
                *path = Some(text.to_string());
            }
            return Ok(());
        }

        let slot = &mut self.slots[self.current];
        match slot {
            None => *slot = Some(Draft::Simple(Command::from_program(text))),
            Some(Draft::Simple(command)) => match command.arguments_mut() {
                Some(arguments) => arguments.push(text.to_string()),
                None => return Err(ParseError::WordInInvalidPosition(text.to_string())),
            },
            Some(_) => return Err(ParseError::WordInInvalidPosition(text.to_string())),
        }
        Ok(())
    }

    fn parse_sequence(&mut self) -> Result<(), ParseError> {
        self.expect_no_pending_path()?;

        // Outside of any scope the root itself turns into a sequence, with
        // whatever was parsed so far as its first element
        if self.scopes.is_empty() {
            let mut items = Vec::new();
            if let Some(existing) = self.slots[ROOT].take() {
                items.push(self.alloc(Some(existing)));
            }
            self.slots[ROOT] = Some(Draft::Sequence {
                items,
                scoped: false,
            });
            self.scopes.push(Scope {
                sequence: ROOT,
                restore: self.current,
            });
            self.root_sequence = true;
        }

        let sequence = self.scopes.last().map_or(ROOT, |scope| scope.sequence);
        let next = self.alloc(None);
        if let Some(Draft::Sequence { items, .. }) = &mut self.slots[sequence] {
            items.push(next);
        }
        self.current = next;
        Ok(())
    }

    fn parse_connective(&mut self, connective: Connective) -> Result<(), ParseError> {
        self.expect_no_pending_path()?;

        let Some(existing) = self.slots[self.current].take() else {
            return Err(ParseError::ConnectiveWithoutCommand(connective.name()));
        };
        let primary = self.alloc(Some(existing));
        let secondary = self.alloc(None);
        self.slots[self.current] = Some(Draft::Binary {
            connective,
            primary,
            secondary,
        });
        self.current = secondary;
        Ok(())
    }

    fn parse_redirection(&mut self, redirect: Redirect) -> Result<(), ParseError> {
        self.expect_no_pending_path()?;

        let Some(existing) = self.slots[self.current].take() else {
            return Err(ParseError::RedirectionWithoutCommand);
        };
        let primary = self.alloc(Some(existing));
        self.slots[self.current] = Some(Draft::Redirection {
            redirect,
            primary,
            path: None,
        });
        self.pending_path = Some(self.current);
        Ok(())
    }

    fn parse_open_scope(&mut self) -> Result<(), ParseError> {
        self.expect_no_pending_path()?;
        if self.slots[self.current].is_some() {
            return Err(ParseError::ScopeAfterCommand);
        }

        let inner = self.alloc(None);
        self.slots[self.current] = Some(Draft::Sequence {
            items: vec![inner],
            scoped: true,
        });
        self.scopes.push(Scope {
            sequence: self.current,
            restore: self.current,
        });
        self.current = inner;
        Ok(())
    }

    fn parse_close_scope(&mut self) -> Result<(), ParseError> {
        self.expect_no_pending_path()?;

        let only_root_left = self.scopes.len() == 1 && self.root_sequence;
        if only_root_left {
            return Err(ParseError::UnbalancedClose);
        }
        let Some(scope) = self.scopes.pop() else {
            return Err(ParseError::UnbalancedClose);
        };
        self.current = scope.restore;
        Ok(())
    }

    fn finish(mut self) -> Result<Option<Command>, ParseError> {
        self.expect_no_pending_path()?;
        if self.scopes.len() > usize::from(self.root_sequence) {
            return Err(ParseError::UnbalancedOpen);
        }
        self.check_depth()?;
        self.build(ROOT)
    }

    fn check_depth(&self) -> Result<(), ParseError> {
        let mut pending = vec![(ROOT, 0)];
        while let Some((id, depth)) = pending.pop() {
            if depth > MAX_DEPTH {
                return Err(ParseError::NestingTooDeep(MAX_DEPTH));
            }
            match &self.slots[id] {
                None | Some(Draft::Simple(_)) => {}
                Some(Draft::Sequence { items, .. }) => {
                    pending.extend(items.iter().map(|&item| (item, depth + 1)));
                }
                Some(Draft::Binary {
                    primary, secondary, ..
                }) => {
                    pending.push((*primary, depth + 1));
                    pending.push((*secondary, depth + 1));
                }
                Some(Draft::Redirection { primary, .. }) => pending.push((*primary, depth + 1)),
            }
        }
        Ok(())
    }

    fn build(&mut self, id: SlotId) -> Result<Option<Command>, ParseError> {
        let Some(draft) = self.slots[id].take() else {
            return Ok(None);
        };

        let command = match draft {
            Draft::Simple(command) => command,
            Draft::Sequence { items, scoped } => {
                // Empty elements come from trailing or repeated separators
                let mut children = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(child) = self.build(item)? {
                        children.push(child);
                    }
                }
                match (children.is_empty(), scoped) {
                    (true, true) => return Err(ParseError::EmptyScope),
                    (true, false) => return Ok(None),
                    (false, _) => Command::Sequential(children),
                }
            }
            Draft::Binary {
                connective,
                primary,
                secondary,
            } => {
                let primary = self
                    .build(primary)?
                    .ok_or(ParseError::ConnectiveWithoutCommand(connective.name()))?;
                let secondary = self
                    .build(secondary)?
                    .ok_or(ParseError::ConnectiveWithoutOperand(connective.name()))?;
                connective.join(primary, secondary)
            }
            Draft::Redirection {
                redirect,
                primary,
                path,
            } => {
                let primary = self
                    .build(primary)?
                    .ok_or(ParseError::RedirectionWithoutCommand)?;
                let path = path.ok_or(ParseError::RedirectionWithoutPath)?;
                redirect.wrap(primary, path)
            }
        };
        Ok(Some(command))
    }
}

/// Parses a token sequence into a command tree.
pub fn parse(tokens: &[Token]) -> Result<Option<Command>, ParseError> {
    Parser::new(tokens).apply()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::parser::ast::Builtin;
    use crate::shell::parser::lexer::tokenize;

    fn parse_text(text: &str) -> Result<Option<Command>, ParseError> {
        match tokenize(text) {
            Ok(tokenizer) => parse(tokenizer.tokens()),
            Err(e) => panic!("tokenize failed: {}", e),
        }
    }

    #[allow(clippy::unwrap_used)]
    fn tree(text: &str) -> Command {
        parse_text(text).unwrap().unwrap()
    }

    fn exe(program: &str, arguments: &[&str]) -> Command {
        Command::Executable {
            program: program.to_string(),
            arguments: arguments.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn boxed(command: Command) -> Box<Command> {
        Box::new(command)
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse(&[]), Ok(None));
        assert_eq!(parse_text("# nothing here"), Ok(None));
        assert_eq!(parse_text(";"), Ok(None));
    }

    #[test]
    fn test_simple_command() {
        assert_eq!(tree("ls -l /tmp"), exe("ls", &["-l", "/tmp"]));
    }

    #[test]
    fn test_builtins() {
        assert_eq!(
            tree("exit 3"),
            Command::Builtin(Builtin::Exit {
                arguments: vec!["3".to_string()]
            })
        );
        assert_eq!(
            tree("[ -e /tmp ]"),
            Command::Builtin(Builtin::Test {
                bracket: true,
                arguments: vec!["-e".to_string(), "/tmp".to_string(), "]".to_string()]
            })
        );
        assert_eq!(
            tree("test /tmp"),
            Command::Builtin(Builtin::Test {
                bracket: false,
                arguments: vec!["/tmp".to_string()]
            })
        );
    }

    #[test]
    fn test_sequence() {
        assert_eq!(
            tree("a; b 1; c"),
            Command::Sequential(vec![exe("a", &[]), exe("b", &["1"]), exe("c", &[])])
        );
        assert_eq!(tree("a;"), Command::Sequential(vec![exe("a", &[])]));
        assert_eq!(
            tree("a;; b"),
            Command::Sequential(vec![exe("a", &[]), exe("b", &[])])
        );
    }

    #[test]
    fn test_connectives_bind_to_the_current_slot() {
        assert_eq!(
            tree("a && b"),
            Command::Conjunctive {
                primary: boxed(exe("a", &[])),
                secondary: boxed(exe("b", &[])),
            }
        );
        assert_eq!(
            tree("a && b || c"),
            Command::Conjunctive {
                primary: boxed(exe("a", &[])),
                secondary: boxed(Command::Disjunctive {
                    primary: boxed(exe("b", &[])),
                    secondary: boxed(exe("c", &[])),
                }),
            }
        );
    }

    #[test]
    fn test_sequence_splits_connectives() {
        assert_eq!(
            tree("a && b; c"),
            Command::Sequential(vec![
                Command::Conjunctive {
                    primary: boxed(exe("a", &[])),
                    secondary: boxed(exe("b", &[])),
                },
                exe("c", &[]),
            ])
        );
    }

    #[test]
    fn test_pipe_chain() {
        assert_eq!(
            tree("a | b | c"),
            Command::Pipe {
                primary: boxed(exe("a", &[])),
                secondary: boxed(Command::Pipe {
                    primary: boxed(exe("b", &[])),
                    secondary: boxed(exe("c", &[])),
                }),
            }
        );
    }

    #[test]
    fn test_redirections() {
        assert_eq!(
            tree("echo hi > out.txt"),
            Command::OutputRedirection {
                primary: boxed(exe("echo", &["hi"])),
                path: "out.txt".to_string(),
            }
        );
        assert_eq!(
            tree("cat < in | wc -l >> log"),
            Command::Pipe {
                primary: boxed(Command::InputRedirection {
                    primary: boxed(exe("cat", &[])),
                    path: "in".to_string(),
                }),
                secondary: boxed(Command::AppendRedirection {
                    primary: boxed(exe("wc", &["-l"])),
                    path: "log".to_string(),
                }),
            }
        );
    }

    #[test]
    fn test_scopes() {
        assert_eq!(
            tree("(a; b) && c"),
            Command::Conjunctive {
                primary: boxed(Command::Sequential(vec![exe("a", &[]), exe("b", &[])])),
                secondary: boxed(exe("c", &[])),
            }
        );
        assert_eq!(
            tree("a || (b)"),
            Command::Disjunctive {
                primary: boxed(exe("a", &[])),
                secondary: boxed(Command::Sequential(vec![exe("b", &[])])),
            }
        );
        assert_eq!(
            tree("x; ((y)); z"),
            Command::Sequential(vec![
                exe("x", &[]),
                Command::Sequential(vec![Command::Sequential(vec![exe("y", &[])])]),
                exe("z", &[]),
            ])
        );
        assert_eq!(
            tree("(a) > out"),
            Command::OutputRedirection {
                primary: boxed(Command::Sequential(vec![exe("a", &[])])),
                path: "out".to_string(),
            }
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse_text("&& a"),
            Err(ParseError::ConnectiveWithoutCommand("conjunction"))
        );
        assert_eq!(
            parse_text("a; || b"),
            Err(ParseError::ConnectiveWithoutCommand("disjunction"))
        );
        assert_eq!(
            parse_text("| b"),
            Err(ParseError::ConnectiveWithoutCommand("pipe"))
        );
        assert_eq!(
            parse_text("a &&"),
            Err(ParseError::ConnectiveWithoutOperand("conjunction"))
        );
        assert_eq!(parse_text("a (b)"), Err(ParseError::ScopeAfterCommand));
        assert_eq!(parse_text("a)"), Err(ParseError::UnbalancedClose));
        assert_eq!(parse_text("a; b)"), Err(ParseError::UnbalancedClose));
        assert_eq!(parse_text("(a"), Err(ParseError::UnbalancedOpen));
        assert_eq!(parse_text("()"), Err(ParseError::EmptyScope));
        assert_eq!(parse_text("a >"), Err(ParseError::RedirectionWithoutPath));
        assert_eq!(parse_text("a > ; b"), Err(ParseError::RedirectionWithoutPath));
        assert_eq!(parse_text("> f"), Err(ParseError::RedirectionWithoutCommand));
        assert_eq!(
            parse_text("(a) b"),
            Err(ParseError::WordInInvalidPosition("b".to_string()))
        );
        assert_eq!(
            parse_text("a > f b"),
            Err(ParseError::WordInInvalidPosition("b".to_string()))
        );
    }

    #[test]
    fn test_long_chains_are_capped() {
        let chain = |length: usize| format!("true{}", " && true".repeat(length));
        assert_eq!(
            parse_text(&chain(20000)),
            Err(ParseError::NestingTooDeep(MAX_DEPTH))
        );
        assert_eq!(
            parse_text(&chain(MAX_DEPTH + 1)),
            Err(ParseError::NestingTooDeep(MAX_DEPTH))
        );
        assert!(matches!(
            parse_text(&chain(200)),
            Ok(Some(Command::Conjunctive { .. }))
        ));

        let nested = format!("{}a{}", "(".repeat(20000), ")".repeat(20000));
        assert_eq!(
            parse_text(&nested),
            Err(ParseError::NestingTooDeep(MAX_DEPTH))
        );
    }

    #[test]
    fn test_long_sequences_are_flat() {
        let text = "a; ".repeat(20000);
        match parse_text(&text) {
            Ok(Some(Command::Sequential(children))) => assert_eq!(children.len(), 20000),
            other => panic!("unexpected parse {:?}", other),
        }
    }
}
