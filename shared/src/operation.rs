//! Lexer and display formatting for quick arithmetic in amount fields.
//!
//! A user can type `1000+20-3,5` into an amount field. The lexer turns that
//! into typed tokens and `format_operation_display` renders them back as
//! `1 000 + 20 - 3,5`.

use crate::number_format::{
    format_comma_number, format_input_number_display, to_number_loose, MAX_FRACTION_DIGITS,
};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Plus,
    Minus,
    Times,
    Divide,
    Power,
    OpenParen,
    CloseParen,
}

impl Operator {
    /// Recognize an operator, including the glyphs it is displayed with.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Plus),
            '-' | '−' => Some(Operator::Minus),
            '*' | '×' => Some(Operator::Times),
            '/' | '÷' => Some(Operator::Divide),
            '^' => Some(Operator::Power),
            '(' => Some(Operator::OpenParen),
            ')' => Some(Operator::CloseParen),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Times => "×",
            Operator::Divide => "÷",
            Operator::Power => "^",
            Operator::OpenParen => "(",
            Operator::CloseParen => ")",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A run of digits and decimal separators, as typed
    Number(String),
    Operator(Operator),
    /// Any other character, passed through untouched
    Literal(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(text) => f.write_str(&format_number_token(text)),
            Token::Operator(op) => f.write_str(op.symbol()),
            Token::Literal(c) => write!(f, "{}", c),
        }
    }
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.' || c == ','
}

/// Split an expression into tokens. Whitespace only separates tokens.
pub fn tokenize(raw: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if is_number_char(c) {
            let mut number = String::from(c);
            while let Some(&next) = chars.peek() {
                if !is_number_char(next) {
                    break;
                }
                number.push(next);
                chars.next();
            }
            tokens.push(Token::Number(number));
        } else if c.is_whitespace() {
            continue;
        } else if let Some(op) = Operator::from_char(c) {
            tokens.push(Token::Operator(op));
        } else {
            tokens.push(Token::Literal(c));
        }
    }

    tokens
}

// Numbers still being typed ("12," or "3,50") keep their characters, and so
// do decimals with more digits than rounding would keep ("0,125").
fn format_number_token(text: &str) -> String {
    let in_progress = match text.rfind(|c: char| c == '.' || c == ',') {
        Some(pos) => {
            let fraction_digits = text.len() - pos - 1;
            fraction_digits == 0 || text.ends_with('0') || fraction_digits > MAX_FRACTION_DIGITS
        }
        None => false,
    };
    if in_progress {
        return format_input_number_display(text);
    }

    match to_number_loose(text) {
        Some(n) => format_comma_number(n),
        None => format_input_number_display(text),
    }
}

/// Render an arithmetic expression for display.
pub fn format_operation_display(raw: &str) -> String {
    let joined = tokenize(raw)
        .iter()
        .map(Token::to_string)
        .collect::<Vec<_>>()
        .join(" ");

    joined
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("( ", "(")
        .replace(" )", ")")
}
