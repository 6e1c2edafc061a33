//! Shared fixtures: a little python expression evaluator covering the subset the test metadata
//! uses (string/int literals, `+`, `*`, `**`, parentheses, `d.getVar`, `int()`, and bare
//! variable names looked up through the bindings).

use crate::{Bindings, IEvaluator};
use std::collections::BTreeSet;
use std::rc::Rc;

pub(crate) fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

pub(crate) fn evaluator() -> Rc<dyn IEvaluator> {
    Rc::new(
        |code: &str, bindings: &Bindings<'_>| -> Result<String, Box<dyn std::error::Error>> {
            pyeval(code, bindings)
        },
    )
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i64),
    Str(String),
}

impl Value {
    fn render(self) -> String {
        match self {
            Value::Int(value) => value.to_string(),
            Value::Str(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Int(i64),
    Str(String),
    Ident(String),
    Plus,
    Star,
    DoubleStar,
    Open,
    Close,
    Comma,
    Dot,
    Other(char),
}

fn pyeval(code: &str, bindings: &Bindings<'_>) -> Result<String, Box<dyn std::error::Error>> {
    let toks = tokenize(code)?;
    let mut pos = 0;
    let value = expr(&toks, &mut pos, bindings)?;
    if pos != toks.len() {
        return Err("invalid syntax".into());
    }
    Ok(value.render())
}

fn tokenize(code: &str) -> Result<Vec<Tok>, Box<dyn std::error::Error>> {
    let chars: Vec<char> = code.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let mut digits = String::new();
            while i < chars.len() && chars[i].is_ascii_digit() {
                digits.push(chars[i]);
                i += 1;
            }
            toks.push(Tok::Int(digits.parse()?));
        } else if c == '\'' || c == '"' {
            let mut text = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err("unterminated string".into()),
                    Some('\\') => {
                        if let Some(&escaped) = chars.get(i + 1) {
                            text.push(escaped);
                        }
                        i += 2;
                    }
                    Some(&q) if q == c => {
                        i += 1;
                        break;
                    }
                    Some(&other) => {
                        text.push(other);
                        i += 1;
                    }
                }
            }
            toks.push(Tok::Str(text));
        } else if c.is_alphabetic() || c == '_' {
            let mut name = String::new();
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                name.push(chars[i]);
                i += 1;
            }
            toks.push(Tok::Ident(name));
        } else {
            toks.push(match c {
                '+' => Tok::Plus,
                '*' if chars.get(i + 1) == Some(&'*') => {
                    i += 1;
                    Tok::DoubleStar
                }
                '*' => Tok::Star,
                '(' => Tok::Open,
                ')' => Tok::Close,
                ',' => Tok::Comma,
                '.' => Tok::Dot,
                other => Tok::Other(other),
            });
            i += 1;
        }
    }
    Ok(toks)
}

fn expr(
    toks: &[Tok],
    pos: &mut usize,
    bindings: &Bindings<'_>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut left = term(toks, pos, bindings)?;
    while toks.get(*pos) == Some(&Tok::Plus) {
        *pos += 1;
        let right = term(toks, pos, bindings)?;
        left = match (left, right) {
            (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
            (Value::Str(a), Value::Str(b)) => Value::Str(a + &b),
            _ => return Err("unsupported operand types for +".into()),
        };
    }
    Ok(left)
}

fn term(
    toks: &[Tok],
    pos: &mut usize,
    bindings: &Bindings<'_>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut left = power(toks, pos, bindings)?;
    while toks.get(*pos) == Some(&Tok::Star) {
        *pos += 1;
        let right = power(toks, pos, bindings)?;
        left = match (left, right) {
            (Value::Int(a), Value::Int(b)) => Value::Int(a * b),
            _ => return Err("unsupported operand types for *".into()),
        };
    }
    Ok(left)
}

fn power(
    toks: &[Tok],
    pos: &mut usize,
    bindings: &Bindings<'_>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let base = atom(toks, pos, bindings)?;
    if toks.get(*pos) == Some(&Tok::DoubleStar) {
        *pos += 1;
        let exponent = power(toks, pos, bindings)?;
        return match (base, exponent) {
            (Value::Int(a), Value::Int(b)) if b >= 0 => Ok(Value::Int(a.pow(b as u32))),
            _ => Err("unsupported operand types for **".into()),
        };
    }
    Ok(base)
}

fn atom(
    toks: &[Tok],
    pos: &mut usize,
    bindings: &Bindings<'_>,
) -> Result<Value, Box<dyn std::error::Error>> {
    match toks.get(*pos) {
        Some(Tok::Int(value)) => {
            *pos += 1;
            Ok(Value::Int(*value))
        }
        Some(Tok::Str(value)) => {
            *pos += 1;
            Ok(Value::Str(value.clone()))
        }
        Some(Tok::Open) => {
            *pos += 1;
            let value = expr(toks, pos, bindings)?;
            expect(toks, pos, &Tok::Close)?;
            Ok(value)
        }
        Some(Tok::Ident(first)) => {
            let mut name = first.clone();
            *pos += 1;
            while toks.get(*pos) == Some(&Tok::Dot) {
                match toks.get(*pos + 1) {
                    Some(Tok::Ident(part)) => {
                        name.push('.');
                        name.push_str(part);
                        *pos += 2;
                    }
                    _ => return Err("invalid syntax".into()),
                }
            }
            if toks.get(*pos) == Some(&Tok::Open) {
                return call(&name, toks, pos, bindings);
            }
            match name.as_str() {
                "True" => Ok(Value::Int(1)),
                "False" => Ok(Value::Int(0)),
                "None" => Ok(Value::Str(String::new())),
                _ => match bindings.get(&name) {
                    Some(value) => Ok(Value::Str(value)),
                    None => Err(format!("NameError: name '{}' is not defined", name).into()),
                },
            }
        }
        _ => Err("invalid syntax".into()),
    }
}

fn call(
    name: &str,
    toks: &[Tok],
    pos: &mut usize,
    bindings: &Bindings<'_>,
) -> Result<Value, Box<dyn std::error::Error>> {
    *pos += 1; // the opening parenthesis
    match name {
        "int" => {
            let argument = expr(toks, pos, bindings)?;
            expect(toks, pos, &Tok::Close)?;
            match argument {
                Value::Int(value) => Ok(Value::Int(value)),
                Value::Str(text) => match text.trim().parse() {
                    Ok(value) => Ok(Value::Int(value)),
                    Err(_) => Err(format!(
                        "ValueError: invalid literal for int() with base 10: '{}'",
                        text
                    )
                    .into()),
                },
            }
        }
        "d.getVar" | "bb.data.getVar" | "data.getVar" => {
            let variable = match expr(toks, pos, bindings)? {
                Value::Str(variable) => variable,
                _ => return Err("getVar needs a string variable name".into()),
            };
            while toks.get(*pos) == Some(&Tok::Comma) {
                *pos += 1;
                expr(toks, pos, bindings)?; // expand/default arguments
            }
            expect(toks, pos, &Tok::Close)?;
            match bindings.get(&variable) {
                Some(value) => Ok(Value::Str(value)),
                None => Err(format!("KeyError: '{}'", variable).into()),
            }
        }
        other => Err(format!("NameError: name '{}' is not defined", other).into()),
    }
}

fn expect(toks: &[Tok], pos: &mut usize, tok: &Tok) -> Result<(), Box<dyn std::error::Error>> {
    if toks.get(*pos) == Some(tok) {
        *pos += 1;
        return Ok(());
    }
    Err("invalid syntax".into())
}
