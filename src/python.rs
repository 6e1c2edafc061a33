//! A tolerant scanner for the python code embedded in metadata values.  It understands just
//! enough of the language's lexical structure (strings in all their spellings, comments,
//! nesting) to locate call expressions, reconstruct their dotted names and classify their
//! arguments; everything else passes through unexamined.  Running the code is someone else's
//! concern.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("python syntax error: {message}")]
pub struct PythonSyntaxError {
    pub message: String,
}

impl PythonSyntaxError {
    fn new(message: impl Into<String>) -> Self {
        PythonSyntaxError {
            message: message.into(),
        }
    }
}

/// A call expression, with its head reconstructed in dotted form when the attribute chain ends
/// in a plain name.  Chains hanging off other expressions (`f().strip()`) are not reconstructed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PyCall {
    pub name: String,
    pub args: Vec<PyArg>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PyArg {
    /// The argument is exactly a string literal (adjacent literals concatenate).
    Str(String),
    /// The argument starts with a call; the call's own arguments are reported separately.
    Call(String),
    Other,
}

/// Every call expression in the code, in scan order, nested calls included.
pub(crate) fn calls_in(code: &str) -> Result<Vec<PyCall>, PythonSyntaxError> {
    let mut scanner = Scanner {
        toks: lex(code)?,
        pos: 0,
        out: Vec::new(),
    };
    scanner.region(None)?;
    Ok(scanner.out)
}

/// Words that read like call heads but are statement syntax.
const KEYWORDS: [&str; 31] = [
    "and", "as", "assert", "break", "class", "continue", "def", "del", "elif", "else", "except",
    "exec", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "not", "or",
    "pass", "print", "raise", "return", "try", "while", "with", "yield",
];

#[derive(Debug, Clone, PartialEq)]
enum PyTok {
    Name(String),
    Str(String),
    Open(char),
    Close(char),
    Comma,
    Dot,
    Other(char),
}

struct Scanner {
    toks: Vec<PyTok>,
    pos: usize,
    out: Vec<PyCall>,
}

impl Scanner {
    fn peek(&self) -> Option<&PyTok> {
        self.toks.get(self.pos)
    }

    /// Walk tokens up to the matching closer (or end of input at the top level), recording every
    /// call encountered along the way.
    fn region(&mut self, closer: Option<char>) -> Result<(), PythonSyntaxError> {
        loop {
            match self.peek() {
                None => {
                    return match closer {
                        None => Ok(()),
                        Some(c) => Err(PythonSyntaxError::new(format!(
                            "unexpected end of input, expected '{}'",
                            c
                        ))),
                    }
                }
                Some(PyTok::Close(c)) if Some(*c) == closer => return Ok(()),
                Some(PyTok::Close(c)) => {
                    return Err(PythonSyntaxError::new(format!("unmatched '{}'", c)))
                }
                Some(PyTok::Open(c)) => {
                    let closing = closing(*c);
                    self.pos += 1;
                    self.region(Some(closing))?;
                    self.pos += 1;
                }
                Some(PyTok::Name(name)) if name == "def" || name == "class" => {
                    // the definition's name is not a call; its header parens scan generically
                    self.pos += 1;
                    if matches!(self.peek(), Some(PyTok::Name(_))) {
                        self.pos += 1;
                    }
                }
                Some(PyTok::Name(_)) => {
                    self.dotted_or_call()?;
                }
                Some(PyTok::Dot) => {
                    // attribute access off an expression, not a qualified name
                    self.pos += 1;
                    if matches!(self.peek(), Some(PyTok::Name(_))) {
                        self.pos += 1;
                    }
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    /// At a name: collect the dotted chain and, when a call follows, record it.  Returns the
    /// call's name when one was recorded.
    fn dotted_or_call(&mut self) -> Result<Option<String>, PythonSyntaxError> {
        let Some(PyTok::Name(first)) = self.peek() else {
            unreachable!("dotted_or_call is only entered on a name");
        };
        let mut name = first.clone();
        self.pos += 1;
        while matches!(self.peek(), Some(PyTok::Dot)) {
            match self.toks.get(self.pos + 1) {
                Some(PyTok::Name(part)) => {
                    name.push('.');
                    name.push_str(part);
                    self.pos += 2;
                }
                _ => break,
            }
        }
        if !matches!(self.peek(), Some(PyTok::Open('('))) {
            return Ok(None);
        }
        self.pos += 1;
        let args = self.arguments()?;
        if KEYWORDS.contains(&name.as_str()) {
            return Ok(None);
        }
        self.out.push(PyCall {
            name: name.clone(),
            args,
        });
        Ok(Some(name))
    }

    /// The argument list of a call, consuming through the closing parenthesis.
    fn arguments(&mut self) -> Result<Vec<PyArg>, PythonSyntaxError> {
        let mut args = Vec::new();
        loop {
            match self.peek() {
                None => return Err(PythonSyntaxError::new("unexpected end of argument list")),
                Some(PyTok::Close(')')) => {
                    self.pos += 1;
                    return Ok(args);
                }
                _ => {}
            }
            args.push(self.argument()?);
            match self.peek() {
                Some(PyTok::Comma) => self.pos += 1,
                _ => {}
            }
        }
    }

    /// One argument: scanned for nested calls, classified for the caller.
    fn argument(&mut self) -> Result<PyArg, PythonSyntaxError> {
        let mut first = true;
        let mut strings: Vec<String> = Vec::new();
        let mut only_strings = true;
        let mut leading_call: Option<String> = None;
        loop {
            match self.peek() {
                None => return Err(PythonSyntaxError::new("unexpected end of argument")),
                Some(PyTok::Comma | PyTok::Close(')')) => break,
                Some(PyTok::Close(c)) => {
                    return Err(PythonSyntaxError::new(format!("unmatched '{}'", c)))
                }
                Some(PyTok::Open(c)) => {
                    let closing = closing(*c);
                    self.pos += 1;
                    self.region(Some(closing))?;
                    self.pos += 1;
                    only_strings = false;
                }
                Some(PyTok::Str(text)) => {
                    strings.push(text.clone());
                    self.pos += 1;
                }
                Some(PyTok::Name(_)) => {
                    let call = self.dotted_or_call()?;
                    if first {
                        leading_call = call;
                    }
                    only_strings = false;
                }
                Some(PyTok::Dot) => {
                    self.pos += 1;
                    if matches!(self.peek(), Some(PyTok::Name(_))) {
                        self.pos += 1;
                    }
                    only_strings = false;
                }
                Some(_) => {
                    self.pos += 1;
                    only_strings = false;
                }
            }
            first = false;
        }
        if only_strings && !strings.is_empty() {
            return Ok(PyArg::Str(strings.concat()));
        }
        if let Some(name) = leading_call {
            return Ok(PyArg::Call(name));
        }
        Ok(PyArg::Other)
    }
}

fn closing(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

fn lex(code: &str) -> Result<Vec<PyTok>, PythonSyntaxError> {
    let chars: Vec<char> = code.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() || c == '\\' {
            i += 1;
        } else if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c.is_alphabetic() || c == '_' {
            let mut name = String::new();
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                name.push(chars[i]);
                i += 1;
            }
            if matches!(chars.get(i).copied(), Some('\'' | '"')) && is_string_prefix(&name) {
                let raw = name.chars().any(|p| p == 'r' || p == 'R');
                toks.push(PyTok::Str(lex_string(&chars, &mut i, raw)?));
            } else {
                toks.push(PyTok::Name(name));
            }
        } else if c == '\'' || c == '"' {
            toks.push(PyTok::Str(lex_string(&chars, &mut i, false)?));
        } else if c.is_ascii_digit() {
            while i < chars.len()
                && (chars[i].is_alphanumeric()
                    || chars[i] == '_'
                    || (chars[i] == '.'
                        && matches!(chars.get(i + 1), Some(d) if d.is_ascii_digit())))
            {
                i += 1;
            }
            toks.push(PyTok::Other('0'));
        } else {
            toks.push(match c {
                '(' | '[' | '{' => PyTok::Open(c),
                ')' | ']' | '}' => PyTok::Close(c),
                ',' => PyTok::Comma,
                '.' => PyTok::Dot,
                other => PyTok::Other(other),
            });
            i += 1;
        }
    }
    Ok(toks)
}

fn is_string_prefix(name: &str) -> bool {
    name.len() <= 2
        && name
            .chars()
            .all(|c| matches!(c, 'r' | 'R' | 'b' | 'B' | 'u' | 'U' | 'f' | 'F'))
}

fn lex_string(chars: &[char], i: &mut usize, raw: bool) -> Result<String, PythonSyntaxError> {
    let quote = chars[*i];
    let triple = chars.get(*i + 1) == Some(&quote) && chars.get(*i + 2) == Some(&quote);
    *i += if triple { 3 } else { 1 };
    let mut out = String::new();
    loop {
        let Some(&c) = chars.get(*i) else {
            return Err(PythonSyntaxError::new("unterminated string literal"));
        };
        if c == '\\' {
            let Some(&escaped) = chars.get(*i + 1) else {
                return Err(PythonSyntaxError::new("unterminated string literal"));
            };
            if raw {
                out.push('\\');
                out.push(escaped);
            } else {
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '\\' | '\'' | '"' => out.push(escaped),
                    '\n' => {}
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            *i += 2;
        } else if c == quote {
            if !triple {
                *i += 1;
                return Ok(out);
            }
            if chars.get(*i + 1) == Some(&quote) && chars.get(*i + 2) == Some(&quote) {
                *i += 3;
                return Ok(out);
            }
            out.push(c);
            *i += 1;
        } else if c == '\n' && !triple {
            return Err(PythonSyntaxError::new("unterminated string literal"));
        } else {
            out.push(c);
            *i += 1;
        }
    }
}
