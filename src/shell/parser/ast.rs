/// A parsed command line. Every node owns its children, so the whole tree
/// has a single root and is dropped in one piece after execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Executable {
        program: String,
        arguments: Vec<String>,
    },
    Builtin(Builtin),
    Sequential(Vec<Command>),
    Conjunctive {
        primary: Box<Command>,
        secondary: Box<Command>,
    },
    Disjunctive {
        primary: Box<Command>,
        secondary: Box<Command>,
    },
    Pipe {
        primary: Box<Command>,
        secondary: Box<Command>,
    },
    InputRedirection {
        primary: Box<Command>,
        path: String,
    },
    OutputRedirection {
        primary: Box<Command>,
        path: String,
    },
    AppendRedirection {
        primary: Box<Command>,
        path: String,
    },
}

/// Commands evaluated inside the interpreter. Arguments are kept raw and
/// validated when the builtin runs, like an external program would.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Builtin {
    /// `exit [code]`
    Exit { arguments: Vec<String> },
    /// `test [-e|-f|-d] path` or `[ [-e|-f|-d] path ]`
    Test {
        bracket: bool,
        arguments: Vec<String>,
    },
}

impl Command {
    /// Classifies a command word: `exit`, `test` and `[` are builtins.
    pub fn from_program(program: &str) -> Self {
        match program {
            "exit" => Command::Builtin(Builtin::Exit {
                arguments: Vec::new(),
            }),
            "test" | "[" => Command::Builtin(Builtin::Test {
                bracket: program == "[",
                arguments: Vec::new(),
            }),
            _ => Command::Executable {
                program: program.to_string(),
                arguments: Vec::new(),
            },
        }
    }

    /// Argument list of a node that still accepts words.
    pub fn arguments_mut(&mut self) -> Option<&mut Vec<String>> {
        match self {
            Command::Executable { arguments, .. }
            | Command::Builtin(Builtin::Exit { arguments })
            | Command::Builtin(Builtin::Test { arguments, .. }) => Some(arguments),
            _ => None,
        }
    }

    /// Whether running the node involves more than one command.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            Command::Sequential(_)
                | Command::Conjunctive { .. }
                | Command::Disjunctive { .. }
                | Command::Pipe { .. }
        )
    }

    /// Flattens a right-nested chain of pipes into its stages.
    pub fn pipeline_stages(&self) -> Vec<&Command> {
        let mut stages = Vec::new();
        let mut current = self;
        while let Command::Pipe { primary, secondary } = current {
            stages.push(primary.as_ref());
            current = secondary.as_ref();
        }
        stages.push(current);
        stages
    }
}
