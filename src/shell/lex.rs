use super::{RedirectOp, ShellError, Word, WordPart};

/// Lexer output.  Redirect operators carry their optional io-number; the target (or heredoc
/// delimiter) follows as the next word token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    Word(Word),
    Redirect { fd: Option<u32>, op: RedirectOp },
    Semi,
    DSemi,
    Amp,
    AndIf,
    Pipe,
    OrIf,
    LParen,
    RParen,
    Newline,
}

/// Tokenize a whole script.  Heredoc bodies are consumed (and discarded) here, when the newline
/// after their redirect is reached, so the parser never sees them.
pub(crate) fn tokens(script: &str) -> Result<Vec<Tok>, ShellError> {
    Lexer {
        chars: script.chars().collect(),
        pos: 0,
        pending_heredocs: Vec::new(),
        out: Vec::new(),
    }
    .run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    /// Delimiters of heredocs opened on the current line: `(delimiter, strip_tabs)`.
    pending_heredocs: Vec<(String, bool)>,
    out: Vec<Tok>,
}

impl Lexer {
    fn run(mut self) -> Result<Vec<Tok>, ShellError> {
        loop {
            self.skip_blanks();
            match self.peek() {
                None => break,
                Some('\n') => {
                    self.pos += 1;
                    self.heredoc_bodies()?;
                    self.out.push(Tok::Newline);
                }
                Some('#') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.pos += 1;
                    }
                }
                Some(c) if c.is_ascii_digit() => {
                    let mut digits = String::new();
                    while let Some(d) = self.peek().filter(char::is_ascii_digit) {
                        digits.push(d);
                        self.pos += 1;
                    }
                    if matches!(self.peek(), Some('<') | Some('>')) {
                        self.operator(digits.parse().ok())?;
                    } else {
                        let word = self.word(digits)?;
                        self.out.push(Tok::Word(word));
                    }
                }
                Some(';' | '&' | '|' | '(' | ')' | '<' | '>') => self.operator(None)?,
                Some(_) => {
                    let word = self.word(String::new())?;
                    self.out.push(Tok::Word(word));
                }
            }
        }
        if !self.pending_heredocs.is_empty() {
            return Err(ShellError::NeedMore);
        }
        Ok(self.out)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_blanks(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => self.pos += 1,
                Some('\\') if self.peek_at(1) == Some('\n') => self.pos += 2,
                _ => break,
            }
        }
    }

    fn operator(&mut self, fd: Option<u32>) -> Result<(), ShellError> {
        let tok = match (self.peek(), self.peek_at(1)) {
            (Some(';'), Some(';')) => {
                self.pos += 2;
                Tok::DSemi
            }
            (Some(';'), _) => {
                self.pos += 1;
                Tok::Semi
            }
            (Some('&'), Some('&')) => {
                self.pos += 2;
                Tok::AndIf
            }
            (Some('&'), _) => {
                self.pos += 1;
                Tok::Amp
            }
            (Some('|'), Some('|')) => {
                self.pos += 2;
                Tok::OrIf
            }
            (Some('|'), _) => {
                self.pos += 1;
                Tok::Pipe
            }
            (Some('('), _) => {
                self.pos += 1;
                Tok::LParen
            }
            (Some(')'), _) => {
                self.pos += 1;
                Tok::RParen
            }
            (Some('<'), Some('<')) => {
                let strip = self.peek_at(2) == Some('-');
                self.pos += if strip { 3 } else { 2 };
                return self.heredoc_opener(fd, strip);
            }
            (Some('<'), Some('&')) => {
                self.pos += 2;
                Tok::Redirect {
                    fd,
                    op: RedirectOp::DupIn,
                }
            }
            (Some('<'), Some('>')) => {
                self.pos += 2;
                Tok::Redirect {
                    fd,
                    op: RedirectOp::ReadWrite,
                }
            }
            (Some('<'), _) => {
                self.pos += 1;
                Tok::Redirect {
                    fd,
                    op: RedirectOp::In,
                }
            }
            (Some('>'), Some('>')) => {
                self.pos += 2;
                Tok::Redirect {
                    fd,
                    op: RedirectOp::Append,
                }
            }
            (Some('>'), Some('&')) => {
                self.pos += 2;
                Tok::Redirect {
                    fd,
                    op: RedirectOp::DupOut,
                }
            }
            (Some('>'), Some('|')) => {
                self.pos += 2;
                Tok::Redirect {
                    fd,
                    op: RedirectOp::Clobber,
                }
            }
            (Some('>'), _) => {
                self.pos += 1;
                Tok::Redirect {
                    fd,
                    op: RedirectOp::Out,
                }
            }
            (c, _) => {
                return Err(ShellError::Syntax(format!(
                    "unexpected operator character {:?}",
                    c
                )))
            }
        };
        self.out.push(tok);
        Ok(())
    }

    /// `<<`/`<<-`: the delimiter word follows the operator; the body follows the next newline.
    fn heredoc_opener(&mut self, fd: Option<u32>, strip: bool) -> Result<(), ShellError> {
        self.skip_blanks();
        if matches!(self.peek(), None | Some('\n')) {
            return Err(ShellError::Syntax("missing heredoc delimiter".to_string()));
        }
        let delimiter = self.word(String::new())?;
        self.pending_heredocs.push((delimiter.text(), strip));
        self.out.push(Tok::Redirect {
            fd,
            op: RedirectOp::HereDoc,
        });
        self.out.push(Tok::Word(delimiter));
        Ok(())
    }

    /// Swallow the bodies of every heredoc opened on the line just ended.
    fn heredoc_bodies(&mut self) -> Result<(), ShellError> {
        for (delimiter, strip) in std::mem::take(&mut self.pending_heredocs) {
            loop {
                if self.peek().is_none() {
                    return Err(ShellError::NeedMore);
                }
                let mut line = String::new();
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    if c == '\n' {
                        break;
                    }
                    line.push(c);
                }
                let line = if strip {
                    line.trim_start_matches('\t')
                } else {
                    line.as_str()
                };
                if line == delimiter {
                    break;
                }
            }
        }
        Ok(())
    }

    fn word(&mut self, initial: String) -> Result<Word, ShellError> {
        let mut parts: Vec<WordPart> = Vec::new();
        let mut plain = initial;
        loop {
            match self.peek() {
                None | Some(' ' | '\t' | '\r' | '\n' | ';' | '&' | '|' | '(' | ')' | '<' | '>') => {
                    break
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        None => plain.push('\\'),
                        Some('\n') => self.pos += 1,
                        Some(c) => {
                            plain.push(c);
                            self.pos += 1;
                        }
                    }
                }
                Some('\'') => {
                    flush(&mut parts, &mut plain);
                    parts.push(WordPart::SingleQuoted(self.single_quoted()?));
                }
                Some('"') => {
                    flush(&mut parts, &mut plain);
                    parts.push(self.double_quoted()?);
                }
                Some('`') => {
                    flush(&mut parts, &mut plain);
                    parts.push(WordPart::Backquote(self.backquoted()?));
                }
                Some('$') => self.dollar(&mut parts, &mut plain)?,
                Some(c) => {
                    plain.push(c);
                    self.pos += 1;
                }
            }
        }
        flush(&mut parts, &mut plain);
        Ok(Word(parts))
    }

    fn single_quoted(&mut self) -> Result<String, ShellError> {
        self.pos += 1;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(ShellError::NeedMore),
                Some('\'') => {
                    self.pos += 1;
                    return Ok(text);
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn double_quoted(&mut self) -> Result<WordPart, ShellError> {
        self.pos += 1;
        let mut inner: Vec<WordPart> = Vec::new();
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(ShellError::NeedMore),
                Some('"') => {
                    self.pos += 1;
                    flush(&mut inner, &mut text);
                    return Ok(WordPart::DoubleQuoted(inner));
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        None => return Err(ShellError::NeedMore),
                        Some('\n') => self.pos += 1,
                        Some(c @ ('"' | '$' | '`' | '\\')) => {
                            text.push(c);
                            self.pos += 1;
                        }
                        Some(c) => {
                            text.push('\\');
                            text.push(c);
                            self.pos += 1;
                        }
                    }
                }
                Some('`') => {
                    flush(&mut inner, &mut text);
                    inner.push(WordPart::Backquote(self.backquoted()?));
                }
                Some('$') => self.dollar(&mut inner, &mut text)?,
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn backquoted(&mut self) -> Result<String, ShellError> {
        self.pos += 1;
        let mut script = String::new();
        loop {
            match self.peek() {
                None => return Err(ShellError::NeedMore),
                Some('`') => {
                    self.pos += 1;
                    return Ok(script);
                }
                Some('\\') => match self.peek_at(1) {
                    Some(c @ ('`' | '\\' | '$')) => {
                        script.push(c);
                        self.pos += 2;
                    }
                    _ => {
                        script.push('\\');
                        self.pos += 1;
                    }
                },
                Some(c) => {
                    script.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    /// Dispatch on what follows a `$`: command substitution becomes its own part, arithmetic and
    /// `${...}` parameter expansion stay verbatim text, anything else is a plain dollar.
    fn dollar(&mut self, parts: &mut Vec<WordPart>, plain: &mut String) -> Result<(), ShellError> {
        match (self.peek_at(1), self.peek_at(2)) {
            (Some('('), Some('(')) => {
                let arithmetic = self.arithmetic()?;
                plain.push_str(&arithmetic);
            }
            (Some('('), _) => {
                flush(parts, plain);
                self.pos += 2;
                parts.push(WordPart::CommandSubst(self.balanced_subst()?));
            }
            (Some('{'), _) => {
                let expansion = self.braced()?;
                plain.push_str(&expansion);
            }
            _ => {
                plain.push('$');
                self.pos += 1;
            }
        }
        Ok(())
    }

    /// `$(( ... ))`, collected verbatim; arithmetic runs no commands.
    fn arithmetic(&mut self) -> Result<String, ShellError> {
        let mut text = String::from("$((");
        self.pos += 3;
        let mut depth = 2;
        loop {
            match self.peek() {
                None => return Err(ShellError::NeedMore),
                Some(c) => {
                    if c == '(' {
                        depth += 1;
                    } else if c == ')' {
                        depth -= 1;
                    }
                    text.push(c);
                    self.pos += 1;
                    if depth == 0 {
                        return Ok(text);
                    }
                }
            }
        }
    }

    /// `${ ... }` parameter expansion, collected verbatim with nested braces balanced.
    fn braced(&mut self) -> Result<String, ShellError> {
        let mut text = String::from("${");
        self.pos += 2;
        let mut depth = 1;
        loop {
            match self.peek() {
                None => return Err(ShellError::NeedMore),
                Some(c) => {
                    if c == '{' {
                        depth += 1;
                    } else if c == '}' {
                        depth -= 1;
                    }
                    text.push(c);
                    self.pos += 1;
                    if depth == 0 {
                        return Ok(text);
                    }
                }
            }
        }
    }

    /// The interior of `$(...)`, with quoting and nesting honored but kept verbatim; the walker
    /// re-parses it as script when it cares.
    fn balanced_subst(&mut self) -> Result<String, ShellError> {
        let mut script = String::new();
        let mut depth = 1;
        loop {
            match self.peek() {
                None => return Err(ShellError::NeedMore),
                Some('(') => {
                    depth += 1;
                    script.push('(');
                    self.pos += 1;
                }
                Some(')') => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return Ok(script);
                    }
                    script.push(')');
                }
                Some('\\') => {
                    script.push('\\');
                    self.pos += 1;
                    if let Some(c) = self.peek() {
                        script.push(c);
                        self.pos += 1;
                    }
                }
                Some('\'') => {
                    script.push('\'');
                    script.push_str(&self.single_quoted()?);
                    script.push('\'');
                }
                Some('`') => {
                    script.push('`');
                    script.push_str(&self.backquoted()?);
                    script.push('`');
                }
                Some('"') => {
                    // copy the quoted span verbatim so parentheses inside it do not count
                    script.push('"');
                    self.pos += 1;
                    loop {
                        match self.peek() {
                            None => return Err(ShellError::NeedMore),
                            Some('\\') => {
                                script.push('\\');
                                self.pos += 1;
                                if let Some(c) = self.peek() {
                                    script.push(c);
                                    self.pos += 1;
                                }
                            }
                            Some('"') => {
                                script.push('"');
                                self.pos += 1;
                                break;
                            }
                            Some(c) => {
                                script.push(c);
                                self.pos += 1;
                            }
                        }
                    }
                }
                Some(c) => {
                    script.push(c);
                    self.pos += 1;
                }
            }
        }
    }
}

fn flush(parts: &mut Vec<WordPart>, plain: &mut String) {
    if !plain.is_empty() {
        parts.push(WordPart::Plain(std::mem::take(plain)));
    }
}
