use crate::shell::{self, CaseArm, Command, GuardedBody, ShellError, SimpleCommand, Word, WordPart};
use std::collections::BTreeSet;

/// Accumulates what a piece of shell script would execute: the commands named in command
/// position and the functions the script itself defines.  The caller subtracts one from the
/// other; a function called before its definition is still not external.
#[derive(Default)]
pub(crate) struct ShellScan {
    pub(crate) execs: BTreeSet<String>,
    pub(crate) funcdefs: BTreeSet<String>,
}

impl ShellScan {
    pub(crate) fn script(&mut self, text: &str) -> Result<(), ShellError> {
        let commands = shell::parse(text)?;
        self.commands(&commands)
    }

    fn commands(&mut self, commands: &[Command]) -> Result<(), ShellError> {
        for command in commands {
            self.command(command)?;
        }
        Ok(())
    }

    fn command(&mut self, command: &Command) -> Result<(), ShellError> {
        match command {
            Command::Simple(simple) => self.simple(simple),
            Command::Pipeline { commands, .. } => self.commands(commands),
            Command::AndOr { left, right, .. } => {
                self.command(left)?;
                self.command(right)
            }
            Command::If { arms, else_body } => {
                for GuardedBody { guard, body } in arms {
                    self.commands(guard)?;
                    self.commands(body)?;
                }
                self.commands(else_body)
            }
            Command::While { guard, body } | Command::Until { guard, body } => {
                self.commands(guard)?;
                self.commands(body)
            }
            Command::For { items, body, .. } => {
                self.words(items)?;
                self.commands(body)
            }
            Command::Case { subject, arms } => {
                self.substitutions(subject)?;
                for CaseArm { patterns, body } in arms {
                    self.words(patterns)?;
                    self.commands(body)?;
                }
                Ok(())
            }
            Command::FunctionDef { name, body } => {
                self.funcdefs.insert(name.clone());
                self.command(body)
            }
            Command::BraceGroup(commands) | Command::Subshell(commands) => {
                self.commands(commands)
            }
            Command::Async(command) => self.command(command),
            Command::RedirectList { command, redirects } => {
                for redirect in redirects {
                    self.substitutions(&redirect.target)?;
                }
                self.command(command)
            }
        }
    }

    fn simple(&mut self, command: &SimpleCommand) -> Result<(), ShellError> {
        for assign in &command.assigns {
            self.substitutions(&assign.value)?;
        }
        for redirect in &command.redirects {
            self.substitutions(&redirect.target)?;
        }

        // a word containing command substitution is consumed by the substitution: the inner
        // script is scanned, and the word no longer counts as the command or one of its
        // arguments
        let mut remaining: Vec<&Word> = Vec::new();
        for word in &command.words {
            if word.has_subst() {
                self.substitutions(word)?;
            } else {
                remaining.push(word);
            }
        }
        let Some((head, rest)) = remaining.split_first() else {
            return Ok(());
        };
        let name = head.text();
        if name.starts_with('$') {
            log::debug!("execution of non-literal command '{}'", name);
        } else if name == "eval" {
            let script = rest
                .iter()
                .map(|word| word.text())
                .collect::<Vec<_>>()
                .join(" ");
            self.script(&script)?;
        } else if !name.is_empty() {
            self.execs.insert(name);
        }
        Ok(())
    }

    /// Words in non-command position are only mined for command substitutions.
    fn words(&mut self, words: &[Word]) -> Result<(), ShellError> {
        for word in words {
            self.substitutions(word)?;
        }
        Ok(())
    }

    fn substitutions(&mut self, word: &Word) -> Result<(), ShellError> {
        self.parts(&word.0)
    }

    fn parts(&mut self, parts: &[WordPart]) -> Result<(), ShellError> {
        for part in parts {
            match part {
                WordPart::CommandSubst(script) | WordPart::Backquote(script) => {
                    self.script(script)?;
                }
                WordPart::DoubleQuoted(inner) => self.parts(inner)?,
                WordPart::Plain(_) | WordPart::SingleQuoted(_) => {}
            }
        }
        Ok(())
    }
}
