//! Hand-written lexer and recursive-descent parser for the surface
//! syntax described in the reader contract: the external, non-normative
//! front end that turns text into an `Expr` tree for the core to evaluate.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::rc::Rc;
use std::slice::Iter;

use num_bigint::BigInt;

use crate::error::{PolyError, Result};
use crate::expr::Expr;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    LSquare,
    RSquare,
    LBrace,
    RBrace,
    Dot,
    Under,
    Quote,
    Ident(String),
    Symbol(String),
    Int(BigInt),
    Float(f64),
    Str(String),
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || "_+-*/<>=!?".contains(c)
}

fn is_ident_cont(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_+-*/<>=!?".contains(c)
}

fn unescape_backticks(body: &str) -> String {
    body.replace("\\`", "`")
}

fn unescape_string(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn read_backtick_body(chars: &mut Peekable<std::str::Chars<'_>>) -> Option<String> {
    let mut body = String::new();
    loop {
        match chars.next()? {
            '\\' => {
                body.push('\\');
                body.push(chars.next()?);
            }
            '`' => return Some(body),
            c => body.push(c),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() || c == ',' => {
                chars.next();
            }
            ';' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LSquare);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RSquare);
            }
            '{' => {
                chars.next();
                tokens.push(Token::LBrace);
            }
            '}' => {
                chars.next();
                tokens.push(Token::RBrace);
            }
            '\'' => {
                chars.next();
                tokens.push(Token::Quote);
            }
            '"' => {
                chars.next();
                let mut body = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    if c == '"' {
                        closed = true;
                        break;
                    } else if c == '\\' {
                        body.push('\\');
                        match chars.next() {
                            Some(next) => body.push(next),
                            None => return Err(PolyError::Reader(input.to_string())),
                        }
                    } else {
                        body.push(c);
                    }
                }
                if !closed {
                    return Err(PolyError::Reader(input.to_string()));
                }
                tokens.push(Token::Str(unescape_string(&body)));
            }
            '#' => {
                chars.next();
                if chars.peek() == Some(&'`') {
                    chars.next();
                    let body = read_backtick_body(&mut chars)
                        .ok_or_else(|| PolyError::Reader(input.to_string()))?;
                    tokens.push(Token::Symbol(unescape_backticks(&body)));
                } else {
                    let mut name = String::new();
                    while let Some(&c) = chars.peek() {
                        if is_ident_cont(c) {
                            name.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if name.is_empty() {
                        return Err(PolyError::Reader(input.to_string()));
                    }
                    tokens.push(Token::Symbol(name));
                }
            }
            '`' => {
                chars.next();
                let body = read_backtick_body(&mut chars)
                    .ok_or_else(|| PolyError::Reader(input.to_string()))?;
                tokens.push(Token::Ident(unescape_backticks(&body)));
            }
            c if c.is_ascii_digit() => {
                let mut text = String::new();
                if c == '0' {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    if lookahead.peek() == Some(&'x') {
                        chars.next();
                        chars.next();
                        let mut hex = String::new();
                        while let Some(&c) = chars.peek() {
                            if c.is_ascii_hexdigit() {
                                hex.push(c);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        let n = BigInt::parse_bytes(hex.as_bytes(), 16)
                            .ok_or_else(|| PolyError::Reader(input.to_string()))?;
                        tokens.push(Token::Int(n));
                        continue;
                    }
                }
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let mut is_float = false;
                if chars.peek() == Some(&'.') {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    if lookahead.peek().is_some_and(|c| c.is_ascii_digit()) {
                        is_float = true;
                        text.push('.');
                        chars.next();
                        while let Some(&c) = chars.peek() {
                            if c.is_ascii_digit() {
                                text.push(c);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                    }
                }
                if is_float {
                    let f: f64 = text
                        .parse()
                        .map_err(|_| PolyError::Reader(input.to_string()))?;
                    tokens.push(Token::Float(f));
                } else {
                    let n = text
                        .parse::<BigInt>()
                        .map_err(|_| PolyError::Reader(input.to_string()))?;
                    tokens.push(Token::Int(n));
                }
            }
            c if is_ident_start(c) => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if is_ident_cont(c) {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name == "_" {
                    tokens.push(Token::Under);
                } else {
                    tokens.push(Token::Ident(name));
                }
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            _ => return Err(PolyError::Reader(input.to_string())),
        }
    }

    Ok(tokens)
}

type TokenIter<'a> = Peekable<Iter<'a, Token>>;

fn parse_expr(tokens: &mut TokenIter<'_>, source: &str) -> Result<Expr> {
    let token = tokens
        .next()
        .ok_or_else(|| PolyError::Reader(source.to_string()))?;
    match token {
        Token::Under => Ok(Expr::Blank),
        Token::Ident(name) => Ok(Expr::var(name.clone())),
        Token::Symbol(name) => Ok(Expr::symbol(name.clone())),
        Token::Int(n) => Ok(Expr::Int(n.clone())),
        Token::Float(f) => Ok(Expr::Float(*f)),
        Token::Str(s) => Ok(Expr::string(s.clone())),
        Token::Quote => {
            let inner = parse_expr(tokens, source)?;
            Ok(Expr::Quote(Rc::new(inner)))
        }
        Token::LParen => parse_list(tokens, source, Token::RParen),
        Token::LSquare => parse_list(tokens, source, Token::RSquare),
        Token::LBrace => parse_map(tokens, source),
        Token::RParen | Token::RSquare | Token::RBrace | Token::Dot => {
            Err(PolyError::Reader(source.to_string()))
        }
    }
}

fn parse_list(tokens: &mut TokenIter<'_>, source: &str, close: Token) -> Result<Expr> {
    let mut items = Vec::new();
    loop {
        match tokens.peek() {
            Some(t) if *t == &close => {
                tokens.next();
                return Ok(Expr::list(items, Expr::Nil));
            }
            Some(Token::Dot) => {
                tokens.next();
                let tail = parse_expr(tokens, source)?;
                match tokens.next() {
                    Some(t) if t == &close => return Ok(Expr::list(items, tail)),
                    _ => return Err(PolyError::Reader(source.to_string())),
                }
            }
            Some(_) => items.push(parse_expr(tokens, source)?),
            None => return Err(PolyError::Reader(source.to_string())),
        }
    }
}

fn parse_map(tokens: &mut TokenIter<'_>, source: &str) -> Result<Expr> {
    let mut map = BTreeMap::new();
    loop {
        match tokens.peek() {
            Some(Token::RBrace) => {
                tokens.next();
                return Ok(Expr::Map(Rc::new(map)));
            }
            Some(_) => {
                let key = parse_expr(tokens, source)?;
                let val = parse_expr(tokens, source)?;
                if map.insert(key.clone(), val).is_some() {
                    return Err(PolyError::duplicate_key(key));
                }
            }
            None => return Err(PolyError::Reader(source.to_string())),
        }
    }
}

/// Parses exactly one expression from `s`; trailing tokens are an error.
pub fn read_expr(s: &str) -> Result<Expr> {
    let tokens = tokenize(s)?;
    let mut iter = tokens.iter().peekable();
    let expr = parse_expr(&mut iter, s)?;
    if iter.next().is_some() {
        return Err(PolyError::Reader(s.to_string()));
    }
    Ok(expr)
}
