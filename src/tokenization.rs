use once_cell::sync::Lazy;
use regex::Regex;

/// The three markers of the value language.  Everything between markers is opaque text; the
/// alternation lists `${@` first so the snippet opener is never split into `${` + `@`.
static MARKERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{@|\$\{|\}").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'s> {
    /// `${`
    Open,
    /// `${@`
    OpenPython,
    /// `}`
    Close,
    /// Text between markers, never empty.
    Text(&'s str),
}

impl Token<'_> {
    /// The marker's own spelling, for re-emitting an opener as a literal on recovery.
    pub(crate) fn marker(&self) -> &'static str {
        match self {
            Token::Open => "${",
            Token::OpenPython => "${@",
            Token::Close => "}",
            Token::Text(_) => unreachable!("text tokens have no marker form"),
        }
    }
}

/// Splits a raw value on the markers, keeping the markers as their own tokens and discarding
/// empty fragments between adjacent markers.  No lookahead beyond the current token.
pub(crate) struct Tokenizer<'s> {
    tokens: Vec<Token<'s>>,
    position: usize,
}

impl<'s> Tokenizer<'s> {
    pub(crate) fn new(raw: &'s str) -> Self {
        let mut tokens = Vec::new();
        let mut last = 0;
        for found in MARKERS.find_iter(raw) {
            if found.start() > last {
                tokens.push(Token::Text(&raw[last..found.start()]));
            }
            tokens.push(match found.as_str() {
                "${" => Token::Open,
                "${@" => Token::OpenPython,
                _ => Token::Close,
            });
            last = found.end();
        }
        if last < raw.len() {
            tokens.push(Token::Text(&raw[last..]));
        }
        Tokenizer {
            tokens,
            position: 0,
        }
    }

    pub(crate) fn current(&self) -> Option<Token<'s>> {
        self.tokens.get(self.position).copied()
    }

    pub(crate) fn advance(&mut self) {
        self.position += 1;
    }
}
