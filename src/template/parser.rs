//! Parser for `{{ ... }}` template actions
//!
//! The parser splits input text into literal segments and actions, tracking
//! the source line each action starts on plus the full text of that line
//! (used by the step reconstructor to show an action in context).

use crate::error::{TemplateError, TemplateResult};
use crate::template::ast::{Action, Chain, Node, Segment, Stage, Template};

/// Parse a template string.
pub fn parse(input: &str) -> TemplateResult<Template> {
    let mut segments = Vec::new();
    let mut rest = input;
    let mut consumed = 0;

    while let Some(open) = rest.find("{{") {
        if open > 0 {
            segments.push(Segment::Text(rest[..open].to_string()));
        }
        let after_open = &rest[open + 2..];
        let close = after_open
            .find("}}")
            .ok_or_else(|| TemplateError::Parse("unclosed action: missing }}".to_string()))?;
        let body = &after_open[..close];

        let action_start = consumed + open;
        let source_line = input[..action_start].matches('\n').count() + 1;
        let chain = parse_chain_str(body)?;
        segments.push(Segment::Action(Action {
            chain,
            source_line,
            line_text: line_of(input, action_start),
        }));

        consumed += open + 2 + close + 2;
        rest = &rest[open + 2 + close + 2..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }

    Ok(Template { segments })
}

/// Extract the full line of `input` containing byte offset `pos`.
fn line_of(input: &str, pos: usize) -> String {
    let start = input[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = input[pos..]
        .find('\n')
        .map(|i| pos + i)
        .unwrap_or(input.len());
    input[start..end].to_string()
}

/// Parse the body of one action into a chain.
fn parse_chain_str(body: &str) -> TemplateResult<Chain> {
    let tokens = tokenize(body)?;
    let mut pos = 0;
    let chain = parse_chain(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err(TemplateError::Parse(format!(
            "unexpected token {:?} in expression",
            tokens[pos]
        )));
    }
    Ok(chain)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(Vec<String>),
    Ident(String),
    Str(String),
    Int(i64),
    Bool(bool),
    Pipe,
    LParen,
    RParen,
}

fn tokenize(body: &str) -> TemplateResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = body.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '"' => {
                let (s, next) = scan_string(body, i)?;
                tokens.push(Token::Str(s));
                i = next;
            }
            '.' => {
                let (path, next) = scan_field(body, i)?;
                tokens.push(Token::Field(path));
                i = next;
            }
            '-' | '0'..='9' => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let text = &body[start..i];
                let n = text.parse::<i64>().map_err(|_| {
                    TemplateError::Parse(format!("invalid number literal {:?}", text))
                })?;
                tokens.push(Token::Int(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                let word = &body[start..i];
                match word {
                    "true" => tokens.push(Token::Bool(true)),
                    "false" => tokens.push(Token::Bool(false)),
                    _ => tokens.push(Token::Ident(word.to_string())),
                }
            }
            other => {
                return Err(TemplateError::Parse(format!(
                    "unexpected character {:?} in expression",
                    other
                )));
            }
        }
    }
    Ok(tokens)
}

/// Scan a double-quoted string literal starting at `start`, handling the
/// usual backslash escapes. Returns the unescaped content and the offset
/// just past the closing quote.
fn scan_string(body: &str, start: usize) -> TemplateResult<(String, usize)> {
    let bytes = body.as_bytes();
    let mut out = String::new();
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => return Ok((out, i + 1)),
            b'\\' => {
                i += 1;
                if i >= bytes.len() {
                    break;
                }
                match bytes[i] {
                    b'n' => out.push('\n'),
                    b't' => out.push('\t'),
                    b'r' => out.push('\r'),
                    b'"' => out.push('"'),
                    b'\\' => out.push('\\'),
                    other => {
                        return Err(TemplateError::Parse(format!(
                            "unknown escape sequence \\{}",
                            other as char
                        )));
                    }
                }
                i += 1;
            }
            _ => {
                // Multi-byte chars pass through untouched
                let ch_len = body[i..].chars().next().map(char::len_utf8).unwrap_or(1);
                out.push_str(&body[i..i + ch_len]);
                i += ch_len;
            }
        }
    }
    Err(TemplateError::Parse(
        "unterminated string literal".to_string(),
    ))
}

/// Scan a `.FIELD.SUB` reference starting at the leading dot.
fn scan_field(body: &str, start: usize) -> TemplateResult<(Vec<String>, usize)> {
    let bytes = body.as_bytes();
    let mut path = Vec::new();
    let mut i = start;
    while i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let seg_start = i;
        while i < bytes.len() && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_') {
            i += 1;
        }
        if i == seg_start {
            return Err(TemplateError::Parse(
                "expected field name after '.'".to_string(),
            ));
        }
        path.push(body[seg_start..i].to_string());
    }
    Ok((path, i))
}

fn parse_chain(tokens: &[Token], pos: &mut usize) -> TemplateResult<Chain> {
    let mut stages = Vec::new();
    loop {
        let stage = parse_stage(tokens, pos)?;
        stages.push(stage);
        if *pos < tokens.len() && tokens[*pos] == Token::Pipe {
            *pos += 1;
        } else {
            break;
        }
    }
    Ok(Chain { stages })
}

fn parse_stage(tokens: &[Token], pos: &mut usize) -> TemplateResult<Stage> {
    let mut nodes = Vec::new();
    while *pos < tokens.len() {
        match &tokens[*pos] {
            Token::Pipe | Token::RParen => break,
            Token::LParen => {
                *pos += 1;
                let sub = parse_chain(tokens, pos)?;
                if *pos >= tokens.len() || tokens[*pos] != Token::RParen {
                    return Err(TemplateError::Parse("missing closing ')'".to_string()));
                }
                *pos += 1;
                nodes.push(Node::SubChain(sub));
            }
            Token::Field(path) => {
                nodes.push(Node::Field(path.clone()));
                *pos += 1;
            }
            Token::Ident(name) => {
                nodes.push(Node::Ident(name.clone()));
                *pos += 1;
            }
            Token::Str(s) => {
                nodes.push(Node::Str(s.clone()));
                *pos += 1;
            }
            Token::Int(n) => {
                nodes.push(Node::Int(*n));
                *pos += 1;
            }
            Token::Bool(b) => {
                nodes.push(Node::Bool(*b));
                *pos += 1;
            }
        }
    }
    if nodes.is_empty() {
        return Err(TemplateError::Parse("empty pipeline stage".to_string()));
    }
    Ok(Stage { nodes })
}
