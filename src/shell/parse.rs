use super::lex::{tokens, Tok};
use super::{
    AndOrOp, Assign, CaseArm, Command, GuardedBody, Redirect, ShellError, SimpleCommand, Word,
    WordPart,
};
use once_cell::sync::Lazy;
use regex::Regex;

static ASSIGNMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*=").unwrap());

/// Reserved words that terminate a nested command list.
const LIST_ENDERS: [&str; 8] = ["then", "else", "elif", "fi", "do", "done", "esac", "}"];

pub(crate) fn program(script: &str) -> Result<Vec<Command>, ShellError> {
    let mut parser = Parser {
        tokens: tokens(script)?,
        pos: 0,
    };
    let commands = parser.compound_list()?;
    match parser.peek() {
        None => Ok(commands),
        Some(tok) => Err(ShellError::Syntax(format!("unexpected {:?}", tok))),
    }
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Tok> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// The current token's text when it is a lone unquoted word, the only spelling in which
    /// reserved words are recognized.
    fn peek_reserved(&self) -> Option<&str> {
        match self.peek() {
            Some(Tok::Word(word)) => word.as_plain(),
            _ => None,
        }
    }

    fn eat_reserved(&mut self, reserved: &str) -> bool {
        if self.peek_reserved() == Some(reserved) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn expect_reserved(&mut self, reserved: &str) -> Result<(), ShellError> {
        if self.eat_reserved(reserved) {
            return Ok(());
        }
        match self.peek() {
            None => Err(ShellError::NeedMore),
            Some(tok) => Err(ShellError::Syntax(format!(
                "expected '{}', found {:?}",
                reserved, tok
            ))),
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Some(Tok::Newline)) {
            self.pos += 1;
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(Tok::Newline | Tok::Semi)) {
            self.pos += 1;
        }
    }

    fn at_list_end(&self) -> bool {
        match self.peek() {
            None | Some(Tok::RParen | Tok::DSemi) => true,
            _ => self
                .peek_reserved()
                .map_or(false, |word| LIST_ENDERS.contains(&word)),
        }
    }

    /// A sequence of and-or lists separated by `;`, `&` or newlines, ending at end of input, a
    /// closing `)`, a `;;`, or a reserved terminator left for the caller.
    fn compound_list(&mut self) -> Result<Vec<Command>, ShellError> {
        let mut commands = Vec::new();
        loop {
            self.skip_separators();
            if self.at_list_end() {
                return Ok(commands);
            }
            let command = self.and_or()?;
            match self.peek() {
                Some(Tok::Amp) => {
                    self.pos += 1;
                    commands.push(Command::Async(Box::new(command)));
                }
                Some(Tok::Semi | Tok::Newline) => {
                    self.pos += 1;
                    commands.push(command);
                }
                _ => {
                    commands.push(command);
                    return Ok(commands);
                }
            }
        }
    }

    fn and_or(&mut self) -> Result<Command, ShellError> {
        let mut left = self.pipeline()?;
        loop {
            let op = match self.peek() {
                Some(Tok::AndIf) => AndOrOp::And,
                Some(Tok::OrIf) => AndOrOp::Or,
                _ => return Ok(left),
            };
            self.pos += 1;
            self.skip_newlines();
            let right = self.pipeline()?;
            left = Command::AndOr {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn pipeline(&mut self) -> Result<Command, ShellError> {
        let negated = self.eat_reserved("!");
        let mut commands = vec![self.command()?];
        while matches!(self.peek(), Some(Tok::Pipe)) {
            self.pos += 1;
            self.skip_newlines();
            commands.push(self.command()?);
        }
        if commands.len() == 1 && !negated {
            return Ok(commands.pop().unwrap());
        }
        Ok(Command::Pipeline { negated, commands })
    }

    fn command(&mut self) -> Result<Command, ShellError> {
        let command = match self.peek() {
            Some(Tok::LParen) => {
                self.pos += 1;
                let body = self.compound_list()?;
                match self.next() {
                    Some(Tok::RParen) => Command::Subshell(body),
                    None => return Err(ShellError::NeedMore),
                    Some(tok) => {
                        return Err(ShellError::Syntax(format!("expected ')', found {:?}", tok)))
                    }
                }
            }
            _ => match self.peek_reserved() {
                Some("{") => {
                    self.pos += 1;
                    let body = self.compound_list()?;
                    self.expect_reserved("}")?;
                    Command::BraceGroup(body)
                }
                Some("if") => self.if_clause()?,
                Some("while") => {
                    self.pos += 1;
                    let (guard, body) = self.guarded_loop()?;
                    Command::While { guard, body }
                }
                Some("until") => {
                    self.pos += 1;
                    let (guard, body) = self.guarded_loop()?;
                    Command::Until { guard, body }
                }
                Some("for") => self.for_clause()?,
                Some("case") => self.case_clause()?,
                _ => return self.function_or_simple(),
            },
        };
        self.with_redirects(command)
    }

    /// Trailing redirects after a compound command.
    fn with_redirects(&mut self, command: Command) -> Result<Command, ShellError> {
        let mut redirects = Vec::new();
        while let Some(Tok::Redirect { .. }) = self.peek() {
            redirects.push(self.redirect()?);
        }
        if redirects.is_empty() {
            return Ok(command);
        }
        Ok(Command::RedirectList {
            command: Box::new(command),
            redirects,
        })
    }

    fn redirect(&mut self) -> Result<Redirect, ShellError> {
        let Some(Tok::Redirect { fd, op }) = self.next() else {
            unreachable!("redirect() is only entered on a redirect token");
        };
        match self.next() {
            Some(Tok::Word(target)) => Ok(Redirect { fd, op, target }),
            None => Err(ShellError::NeedMore),
            Some(tok) => Err(ShellError::Syntax(format!(
                "expected a redirect target, found {:?}",
                tok
            ))),
        }
    }

    fn function_or_simple(&mut self) -> Result<Command, ShellError> {
        if let Some(Tok::Word(word)) = self.peek() {
            if let Some(name) = word.as_plain() {
                if !name.contains('=')
                    && matches!(self.peek_at(1), Some(Tok::LParen))
                    && matches!(self.peek_at(2), Some(Tok::RParen))
                {
                    let name = name.to_string();
                    self.pos += 3;
                    self.skip_newlines();
                    let body = self.command()?;
                    return Ok(Command::FunctionDef {
                        name,
                        body: Box::new(body),
                    });
                }
            }
        }
        self.simple_command()
    }

    fn simple_command(&mut self) -> Result<Command, ShellError> {
        let mut assigns = Vec::new();
        let mut words: Vec<Word> = Vec::new();
        let mut redirects = Vec::new();
        loop {
            match self.peek() {
                Some(Tok::Word(_)) => {
                    let Some(Tok::Word(word)) = self.next() else {
                        unreachable!()
                    };
                    match assignment(&word) {
                        Some(assign) if words.is_empty() => assigns.push(assign),
                        _ => words.push(word),
                    }
                }
                Some(Tok::Redirect { .. }) => redirects.push(self.redirect()?),
                _ => break,
            }
        }
        if assigns.is_empty() && words.is_empty() && redirects.is_empty() {
            return match self.peek() {
                None => Err(ShellError::NeedMore),
                Some(tok) => Err(ShellError::Syntax(format!(
                    "expected a command, found {:?}",
                    tok
                ))),
            };
        }
        Ok(Command::Simple(SimpleCommand {
            assigns,
            words,
            redirects,
        }))
    }

    fn if_clause(&mut self) -> Result<Command, ShellError> {
        self.pos += 1; // if
        let mut arms = Vec::new();
        let guard = self.compound_list()?;
        self.expect_reserved("then")?;
        let body = self.compound_list()?;
        arms.push(GuardedBody { guard, body });
        loop {
            if self.eat_reserved("elif") {
                let guard = self.compound_list()?;
                self.expect_reserved("then")?;
                let body = self.compound_list()?;
                arms.push(GuardedBody { guard, body });
                continue;
            }
            break;
        }
        let else_body = if self.eat_reserved("else") {
            self.compound_list()?
        } else {
            Vec::new()
        };
        self.expect_reserved("fi")?;
        Ok(Command::If { arms, else_body })
    }

    fn guarded_loop(&mut self) -> Result<(Vec<Command>, Vec<Command>), ShellError> {
        let guard = self.compound_list()?;
        self.expect_reserved("do")?;
        let body = self.compound_list()?;
        self.expect_reserved("done")?;
        Ok((guard, body))
    }

    fn for_clause(&mut self) -> Result<Command, ShellError> {
        self.pos += 1; // for
        let var = match self.next() {
            Some(Tok::Word(word)) => match word.as_plain() {
                Some(name) => name.to_string(),
                None => {
                    return Err(ShellError::Syntax(
                        "for loop variable must be a plain name".to_string(),
                    ))
                }
            },
            None => return Err(ShellError::NeedMore),
            Some(tok) => {
                return Err(ShellError::Syntax(format!(
                    "expected a for loop variable, found {:?}",
                    tok
                )))
            }
        };
        self.skip_newlines();
        let mut items = Vec::new();
        if self.eat_reserved("in") {
            while let Some(Tok::Word(_)) = self.peek() {
                let Some(Tok::Word(word)) = self.next() else {
                    unreachable!()
                };
                items.push(word);
            }
        }
        self.skip_separators();
        self.expect_reserved("do")?;
        let body = self.compound_list()?;
        self.expect_reserved("done")?;
        Ok(Command::For { var, items, body })
    }

    fn case_clause(&mut self) -> Result<Command, ShellError> {
        self.pos += 1; // case
        let subject = match self.next() {
            Some(Tok::Word(word)) => word,
            None => return Err(ShellError::NeedMore),
            Some(tok) => {
                return Err(ShellError::Syntax(format!(
                    "expected a case subject, found {:?}",
                    tok
                )))
            }
        };
        self.skip_newlines();
        self.expect_reserved("in")?;
        self.skip_newlines();
        let mut arms = Vec::new();
        loop {
            if self.eat_reserved("esac") {
                return Ok(Command::Case { subject, arms });
            }
            if self.peek().is_none() {
                return Err(ShellError::NeedMore);
            }
            if matches!(self.peek(), Some(Tok::LParen)) {
                self.pos += 1;
            }
            let mut patterns = Vec::new();
            loop {
                match self.next() {
                    Some(Tok::Word(word)) => patterns.push(word),
                    None => return Err(ShellError::NeedMore),
                    Some(tok) => {
                        return Err(ShellError::Syntax(format!(
                            "expected a case pattern, found {:?}",
                            tok
                        )))
                    }
                }
                match self.next() {
                    Some(Tok::Pipe) => continue,
                    Some(Tok::RParen) => break,
                    None => return Err(ShellError::NeedMore),
                    Some(tok) => {
                        return Err(ShellError::Syntax(format!(
                            "expected '|' or ')' in case pattern, found {:?}",
                            tok
                        )))
                    }
                }
            }
            let body = self.compound_list()?;
            if matches!(self.peek(), Some(Tok::DSemi)) {
                self.pos += 1;
            }
            self.skip_newlines();
            arms.push(CaseArm { patterns, body });
        }
    }
}

/// Split a leading `name=value` word into an assignment.
fn assignment(word: &Word) -> Option<Assign> {
    let WordPart::Plain(first) = word.0.first()? else {
        return None;
    };
    let matched = ASSIGNMENT.find(first)?;
    let name = first[..matched.end() - 1].to_string();
    let mut value = Vec::new();
    if matched.end() < first.len() {
        value.push(WordPart::Plain(first[matched.end()..].to_string()));
    }
    value.extend(word.0.iter().skip(1).cloned());
    Some(Assign {
        name,
        value: Word(value),
    })
}
