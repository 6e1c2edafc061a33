//! A small POSIX shell parser, sufficient to introspect the function bodies held in build
//! metadata: which commands they run and which functions they define.  Nothing here executes
//! anything; words keep their structure (quoting and command substitution) so a walker can
//! recurse into `$(...)` and backquoted script without guessing at quoting rules.

mod lex;
mod parse;


use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShellError {
    /// The input is not shell, as far as this grammar is concerned.
    #[error("shell syntax error: {0}")]
    Syntax(String),
    /// The input ended inside an open construct (quote, substitution, heredoc, compound
    /// command); more input could still make it valid.
    #[error("unexpected end of shell input")]
    NeedMore,
}

/// One parsed command.  Compound commands with trailing redirects are wrapped in
/// [RedirectList](Command::RedirectList); simple commands carry their redirects inline.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Simple(SimpleCommand),
    /// `a | b | c`, possibly `!`-negated.  Single unnegated commands are not wrapped.
    Pipeline {
        negated: bool,
        commands: Vec<Command>,
    },
    AndOr {
        op: AndOrOp,
        left: Box<Command>,
        right: Box<Command>,
    },
    If {
        /// The `if`/`elif` arms in order.
        arms: Vec<GuardedBody>,
        else_body: Vec<Command>,
    },
    While {
        guard: Vec<Command>,
        body: Vec<Command>,
    },
    Until {
        guard: Vec<Command>,
        body: Vec<Command>,
    },
    For {
        var: String,
        items: Vec<Word>,
        body: Vec<Command>,
    },
    Case {
        subject: Word,
        arms: Vec<CaseArm>,
    },
    FunctionDef {
        name: String,
        body: Box<Command>,
    },
    BraceGroup(Vec<Command>),
    Subshell(Vec<Command>),
    Async(Box<Command>),
    RedirectList {
        command: Box<Command>,
        redirects: Vec<Redirect>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AndOrOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardedBody {
    pub guard: Vec<Command>,
    pub body: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseArm {
    pub patterns: Vec<Word>,
    pub body: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleCommand {
    /// Leading `name=value` words; the first word not of that shape starts the command proper.
    pub assigns: Vec<Assign>,
    pub words: Vec<Word>,
    pub redirects: Vec<Redirect>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub name: String,
    pub value: Word,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    pub fd: Option<u32>,
    pub op: RedirectOp,
    /// The filename, dup target or heredoc delimiter.
    pub target: Word,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectOp {
    /// `<`
    In,
    /// `>`
    Out,
    /// `>>`
    Append,
    /// `<>`
    ReadWrite,
    /// `>|`
    Clobber,
    /// `<&`
    DupIn,
    /// `>&`
    DupOut,
    /// `<<` and `<<-`; the body is consumed and discarded at parse time.
    HereDoc,
}

/// A word as a sequence of differently-quoted parts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Word(pub Vec<WordPart>);

#[derive(Debug, Clone, PartialEq)]
pub enum WordPart {
    /// Unquoted text, including `$name` and `${name}` expansions kept verbatim.
    Plain(String),
    SingleQuoted(String),
    DoubleQuoted(Vec<WordPart>),
    /// The raw script inside `$(...)`.
    CommandSubst(String),
    /// The raw script inside backquotes.
    Backquote(String),
}

impl Word {
    /// The visible text of the word with quoting removed; substitutions render by their raw
    /// spelling.
    pub fn text(&self) -> String {
        fn push(parts: &[WordPart], out: &mut String) {
            for part in parts {
                match part {
                    WordPart::Plain(text) | WordPart::SingleQuoted(text) => out.push_str(text),
                    WordPart::DoubleQuoted(inner) => push(inner, out),
                    WordPart::CommandSubst(script) => {
                        out.push_str("$(");
                        out.push_str(script);
                        out.push(')');
                    }
                    WordPart::Backquote(script) => {
                        out.push('`');
                        out.push_str(script);
                        out.push('`');
                    }
                }
            }
        }
        let mut out = String::new();
        push(&self.0, &mut out);
        out
    }

    /// Whether the word contains command substitution at any quoting depth.
    pub fn has_subst(&self) -> bool {
        fn any(parts: &[WordPart]) -> bool {
            parts.iter().any(|part| match part {
                WordPart::CommandSubst(_) | WordPart::Backquote(_) => true,
                WordPart::DoubleQuoted(inner) => any(inner),
                _ => false,
            })
        }
        any(&self.0)
    }

    /// The word's text when it is a lone unquoted literal, which is how reserved words and
    /// function names must be spelled.
    pub(crate) fn as_plain(&self) -> Option<&str> {
        match self.0.as_slice() {
            [WordPart::Plain(text)] => Some(text),
            _ => None,
        }
    }
}

/// Parse a script into its top-level commands.
pub fn parse(script: &str) -> Result<Vec<Command>, ShellError> {
    parse::program(script)
}
