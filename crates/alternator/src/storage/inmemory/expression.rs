//! Condition and update expressions for the in-memory store.
//!
//! Supports the subset alternator issues and tests rely on:
//!
//! - conditions: `= <> < <= > >=`, `BETWEEN .. AND ..`, `IN (..)`, `AND`,
//!   `OR`, `NOT`, parentheses, `attribute_exists`, `attribute_not_exists`,
//!   `begins_with`, `contains`
//! - updates: `SET` (with `+`, `-`, `if_not_exists`, `list_append`) and
//!   `REMOVE`
//!
//! Paths are top-level attribute names only.

use std::cmp::Ordering;
use std::collections::HashMap;

use thiserror::Error;

use alternator_core::value::{Map, Value};
use alternator_core::StoreError;

const KEYWORDS: &[&str] = &["AND", "OR", "NOT", "BETWEEN", "IN", "SET", "REMOVE"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("Invalid expression \"{expression}\": {message}")]
    Syntax { expression: String, message: String },
    #[error("An expression attribute name used in the document path is not defined; attribute name: {0}")]
    MissingName(String),
    #[error("An expression attribute value used in expression is not defined; attribute value: {0}")]
    MissingValue(String),
    #[error("The provided expression refers to an attribute that does not exist in the item: {0}")]
    MissingAttribute(String),
    #[error("An operand in the update expression has an incorrect data type: {0}")]
    OperandType(String),
}

impl From<ExpressionError> for StoreError {
    fn from(err: ExpressionError) -> Self {
        StoreError::Validation(err.to_string())
    }
}

type Result<T> = std::result::Result<T, ExpressionError>;

// ============================================================================
// Syntax tree
// ============================================================================

/// An attribute path (`name` or `#placeholder`) or a value placeholder (`:v`).
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Path(String),
    Value(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare(Operand, Comparator, Operand),
    Between(Operand, Operand, Operand),
    In(Operand, Vec<Operand>),
    AttributeExists(Operand),
    AttributeNotExists(Operand),
    BeginsWith(Operand, Operand),
    Contains(Operand, Operand),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Operand(Operand),
    IfNotExists(Operand, Operand),
    ListAppend(Operand, Operand),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    Term(Term),
    Add(Term, Term),
    Subtract(Term, Term),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateExpression {
    pub set: Vec<(Operand, SetValue)>,
    pub remove: Vec<Operand>,
}

impl UpdateExpression {
    /// Every path written or removed by this update.
    pub fn paths(&self) -> impl Iterator<Item = &Operand> {
        self.set.iter().map(|(path, _)| path).chain(self.remove.iter())
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Name(String),
    Placeholder(String),
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '(' | ')' | ',' | '+' | '-' | '=' => {
                chars.next();
                match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    _ => Token::Eq,
                }
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some((_, '=')) => {
                        chars.next();
                        Token::Le
                    }
                    Some((_, '>')) => {
                        chars.next();
                        Token::Ne
                    }
                    _ => Token::Lt,
                }
            }
            '>' => {
                chars.next();
                match chars.peek() {
                    Some((_, '=')) => {
                        chars.next();
                        Token::Ge
                    }
                    _ => Token::Gt,
                }
            }
            '#' | ':' => {
                chars.next();
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !is_word_char(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                if word.is_empty() {
                    return Err(syntax(input, format!("empty placeholder at position {position}")));
                }
                if c == '#' {
                    Token::Name(format!("#{word}"))
                } else {
                    Token::Placeholder(format!(":{word}"))
                }
            }
            c if is_word_char(c) => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !is_word_char(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                Token::Ident(word)
            }
            other => {
                return Err(syntax(
                    input,
                    format!("unexpected character '{other}' at position {position}"),
                ))
            }
        };
        tokens.push(token);
    }

    Ok(tokens)
}

fn syntax(expression: &str, message: impl Into<String>) -> ExpressionError {
    ExpressionError::Syntax {
        expression: expression.to_string(),
        message: message.into(),
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    position: usize,
}

/// Parses a condition, key condition or filter expression.
pub fn parse_condition(input: &str) -> Result<Condition> {
    let mut parser = Parser::new(input)?;
    let condition = parser.condition()?;
    parser.finish()?;
    Ok(condition)
}

/// Parses an update expression.
pub fn parse_update(input: &str) -> Result<UpdateExpression> {
    let mut parser = Parser::new(input)?;
    let mut update = UpdateExpression::default();

    if parser.at_end() {
        return Err(syntax(input, "empty update expression"));
    }

    while !parser.at_end() {
        if parser.eat_keyword("SET") {
            loop {
                let path = parser.path()?;
                parser.expect(&Token::Eq)?;
                let value = parser.set_value()?;
                update.set.push((path, value));
                if !parser.eat(&Token::Comma) {
                    break;
                }
            }
        } else if parser.eat_keyword("REMOVE") {
            loop {
                update.remove.push(parser.path()?);
                if !parser.eat(&Token::Comma) {
                    break;
                }
            }
        } else {
            return Err(parser.error("expected SET or REMOVE"));
        }
    }

    Ok(update)
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self> {
        Ok(Self {
            input,
            tokens: tokenize(input)?,
            position: 0,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_second(&self) -> Option<&Token> {
        self.tokens.get(self.position + 1)
    }

    fn at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn error(&self, message: &str) -> ExpressionError {
        match self.peek() {
            Some(token) => syntax(self.input, format!("{message}, found {token:?}")),
            None => syntax(self.input, format!("{message}, found end of expression")),
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {token:?}")))
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn finish(&self) -> Result<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error("unexpected trailing input"))
        }
    }

    fn condition(&mut self) -> Result<Condition> {
        let mut left = self.conjunction()?;
        while self.eat_keyword("OR") {
            let right = self.conjunction()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn conjunction(&mut self) -> Result<Condition> {
        let mut left = self.negation()?;
        while self.eat_keyword("AND") {
            let right = self.negation()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn negation(&mut self) -> Result<Condition> {
        if self.eat_keyword("NOT") {
            Ok(Condition::Not(Box::new(self.negation()?)))
        } else {
            self.primary()
        }
    }

    fn primary(&mut self) -> Result<Condition> {
        if self.eat(&Token::LParen) {
            let condition = self.condition()?;
            self.expect(&Token::RParen)?;
            return Ok(condition);
        }

        if let (Some(Token::Ident(name)), Some(Token::LParen)) = (self.peek(), self.peek_second()) {
            let name = name.to_ascii_lowercase();
            self.position += 2;
            return self.function(&name);
        }

        let left = self.operand()?;

        if self.eat_keyword("BETWEEN") {
            let lower = self.operand()?;
            if !self.eat_keyword("AND") {
                return Err(self.error("expected AND in BETWEEN"));
            }
            let upper = self.operand()?;
            return Ok(Condition::Between(left, lower, upper));
        }

        if self.eat_keyword("IN") {
            self.expect(&Token::LParen)?;
            let mut candidates = vec![self.operand()?];
            while self.eat(&Token::Comma) {
                candidates.push(self.operand()?);
            }
            self.expect(&Token::RParen)?;
            return Ok(Condition::In(left, candidates));
        }

        let comparator = match self.peek() {
            Some(Token::Eq) => Comparator::Eq,
            Some(Token::Ne) => Comparator::Ne,
            Some(Token::Lt) => Comparator::Lt,
            Some(Token::Le) => Comparator::Le,
            Some(Token::Gt) => Comparator::Gt,
            Some(Token::Ge) => Comparator::Ge,
            _ => return Err(self.error("expected comparison")),
        };
        self.position += 1;

        Ok(Condition::Compare(left, comparator, self.operand()?))
    }

    /// Parses a function call after its opening parenthesis.
    fn function(&mut self, name: &str) -> Result<Condition> {
        let condition = match name {
            "attribute_exists" => Condition::AttributeExists(self.path()?),
            "attribute_not_exists" => Condition::AttributeNotExists(self.path()?),
            "begins_with" => {
                let path = self.path()?;
                self.expect(&Token::Comma)?;
                Condition::BeginsWith(path, self.operand()?)
            }
            "contains" => {
                let path = self.path()?;
                self.expect(&Token::Comma)?;
                Condition::Contains(path, self.operand()?)
            }
            other => return Err(syntax(self.input, format!("unsupported function '{other}'"))),
        };
        self.expect(&Token::RParen)?;
        Ok(condition)
    }

    fn operand(&mut self) -> Result<Operand> {
        match self.peek() {
            Some(Token::Ident(word))
                if !KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k)) =>
            {
                let word = word.clone();
                self.position += 1;
                Ok(Operand::Path(word))
            }
            Some(Token::Name(name)) => {
                let name = name.clone();
                self.position += 1;
                Ok(Operand::Path(name))
            }
            Some(Token::Placeholder(placeholder)) => {
                let placeholder = placeholder.clone();
                self.position += 1;
                Ok(Operand::Value(placeholder))
            }
            _ => Err(self.error("expected attribute or value")),
        }
    }

    fn path(&mut self) -> Result<Operand> {
        match self.operand()? {
            Operand::Value(placeholder) => Err(syntax(
                self.input,
                format!("expected attribute path, found value {placeholder}"),
            )),
            path => Ok(path),
        }
    }

    fn set_value(&mut self) -> Result<SetValue> {
        let left = self.term()?;
        if self.eat(&Token::Plus) {
            Ok(SetValue::Add(left, self.term()?))
        } else if self.eat(&Token::Minus) {
            Ok(SetValue::Subtract(left, self.term()?))
        } else {
            Ok(SetValue::Term(left))
        }
    }

    fn term(&mut self) -> Result<Term> {
        if let (Some(Token::Ident(name)), Some(Token::LParen)) = (self.peek(), self.peek_second()) {
            let name = name.to_ascii_lowercase();
            self.position += 2;
            let term = match name.as_str() {
                "if_not_exists" => {
                    let path = self.path()?;
                    self.expect(&Token::Comma)?;
                    Term::IfNotExists(path, self.operand()?)
                }
                "list_append" => {
                    let first = self.operand()?;
                    self.expect(&Token::Comma)?;
                    Term::ListAppend(first, self.operand()?)
                }
                other => {
                    return Err(syntax(self.input, format!("unsupported function '{other}'")))
                }
            };
            self.expect(&Token::RParen)?;
            return Ok(term);
        }

        Ok(Term::Operand(self.operand()?))
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Placeholder bindings for one request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope<'a> {
    pub names: Option<&'a HashMap<String, String>>,
    pub values: Option<&'a Map>,
}

impl<'a> Scope<'a> {
    pub fn new(names: Option<&'a HashMap<String, String>>, values: Option<&'a Map>) -> Self {
        Self { names, values }
    }

    /// Resolves a path operand to an attribute name.
    pub fn attribute_name(&self, path: &Operand) -> Result<String> {
        match path {
            Operand::Path(name) if name.starts_with('#') => self
                .names
                .and_then(|names| names.get(name))
                .cloned()
                .ok_or_else(|| ExpressionError::MissingName(name.clone())),
            Operand::Path(name) => Ok(name.clone()),
            Operand::Value(placeholder) => Err(ExpressionError::Syntax {
                expression: placeholder.clone(),
                message: "value used as attribute path".to_string(),
            }),
        }
    }

    fn operand(&self, operand: &Operand, item: &Map) -> Result<Option<Value>> {
        match operand {
            Operand::Path(_) => Ok(item.get(&self.attribute_name(operand)?).cloned()),
            Operand::Value(placeholder) => self
                .values
                .and_then(|values| values.get(placeholder))
                .cloned()
                .map(Some)
                .ok_or_else(|| ExpressionError::MissingValue(placeholder.clone())),
        }
    }

    /// Evaluates `condition` against `item`. Comparisons involving a missing
    /// attribute are false.
    pub fn evaluate(&self, condition: &Condition, item: &Map) -> Result<bool> {
        Ok(match condition {
            Condition::Compare(left, comparator, right) => {
                match (self.operand(left, item)?, self.operand(right, item)?) {
                    (Some(left), Some(right)) => compare(&left, *comparator, &right),
                    _ => false,
                }
            }
            Condition::Between(value, lower, upper) => match (
                self.operand(value, item)?,
                self.operand(lower, item)?,
                self.operand(upper, item)?,
            ) {
                (Some(value), Some(lower), Some(upper)) => {
                    compare(&value, Comparator::Ge, &lower) && compare(&value, Comparator::Le, &upper)
                }
                _ => false,
            },
            Condition::In(value, candidates) => match self.operand(value, item)? {
                Some(value) => {
                    let mut found = false;
                    for candidate in candidates {
                        if let Some(candidate) = self.operand(candidate, item)? {
                            found |= values_equal(&value, &candidate);
                        }
                    }
                    found
                }
                None => false,
            },
            Condition::AttributeExists(path) => item.contains_key(&self.attribute_name(path)?),
            Condition::AttributeNotExists(path) => !item.contains_key(&self.attribute_name(path)?),
            Condition::BeginsWith(path, prefix) => {
                match (self.operand(path, item)?, self.operand(prefix, item)?) {
                    (Some(Value::String(value)), Some(Value::String(prefix))) => {
                        value.starts_with(&prefix)
                    }
                    (Some(Value::Binary(value)), Some(Value::Binary(prefix))) => {
                        value.starts_with(&prefix)
                    }
                    _ => false,
                }
            }
            Condition::Contains(path, needle) => {
                match (self.operand(path, item)?, self.operand(needle, item)?) {
                    (Some(Value::String(value)), Some(Value::String(needle))) => {
                        value.contains(&needle)
                    }
                    (Some(Value::List(items)), Some(needle)) => {
                        items.iter().any(|item| values_equal(item, &needle))
                    }
                    _ => false,
                }
            }
            Condition::And(left, right) => self.evaluate(left, item)? && self.evaluate(right, item)?,
            Condition::Or(left, right) => self.evaluate(left, item)? || self.evaluate(right, item)?,
            Condition::Not(inner) => !self.evaluate(inner, item)?,
        })
    }

    /// Applies `update` to a copy of `item`. Right-hand sides read the item as
    /// it was before the update.
    pub fn apply(&self, update: &UpdateExpression, item: &Map) -> Result<Map> {
        let mut updated = item.clone();

        for (path, value) in &update.set {
            let name = self.attribute_name(path)?;
            let value = self.set_value(value, item)?;
            updated.insert(name, value);
        }

        for path in &update.remove {
            updated.remove(&self.attribute_name(path)?);
        }

        Ok(updated)
    }

    fn set_value(&self, value: &SetValue, item: &Map) -> Result<Value> {
        match value {
            SetValue::Term(term) => self.term(term, item),
            SetValue::Add(left, right) => {
                arithmetic(&self.term(left, item)?, &self.term(right, item)?, i64::checked_add, |l, r| l + r)
            }
            SetValue::Subtract(left, right) => {
                arithmetic(&self.term(left, item)?, &self.term(right, item)?, i64::checked_sub, |l, r| l - r)
            }
        }
    }

    fn term(&self, term: &Term, item: &Map) -> Result<Value> {
        match term {
            Term::Operand(operand) => self.required(operand, item),
            Term::IfNotExists(path, fallback) => match self.operand(path, item)? {
                Some(value) => Ok(value),
                None => self.required(fallback, item),
            },
            Term::ListAppend(first, second) => {
                match (self.required(first, item)?, self.required(second, item)?) {
                    (Value::List(mut first), Value::List(second)) => {
                        first.extend(second);
                        Ok(Value::List(first))
                    }
                    (first, second) => Err(ExpressionError::OperandType(format!(
                        "list_append expects lists, got {} and {}",
                        first.kind(),
                        second.kind()
                    ))),
                }
            }
        }
    }

    fn required(&self, operand: &Operand, item: &Map) -> Result<Value> {
        match self.operand(operand, item)? {
            Some(value) => Ok(value),
            None => Err(ExpressionError::MissingAttribute(self.attribute_name(operand)?)),
        }
    }
}

fn arithmetic(
    left: &Value,
    right: &Value,
    integer: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Result<Value> {
    match (left.as_number(), right.as_number()) {
        (Some(l), Some(r)) => {
            if let (Some(l), Some(r)) = (l.as_i64(), r.as_i64()) {
                if let Some(n) = integer(l, r) {
                    return Ok(Value::from(n));
                }
            }
            match (l.as_f64(), r.as_f64()) {
                (Some(l), Some(r)) => Ok(Value::from(float(l, r))),
                _ => Err(ExpressionError::OperandType("number out of range".to_string())),
            }
        }
        _ => Err(ExpressionError::OperandType(format!(
            "arithmetic expects numbers, got {} and {}",
            left.kind(),
            right.kind()
        ))),
    }
}

/// Equality with numbers compared by value, so `3` equals `3.0`.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => left.as_f64() == right.as_f64(),
        _ => left == right,
    }
}

/// Orders two scalar values of the same type. Values of different types are
/// unordered.
pub fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => left.as_f64()?.partial_cmp(&right.as_f64()?),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Binary(l), Value::Binary(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

fn compare(left: &Value, comparator: Comparator, right: &Value) -> bool {
    match comparator {
        Comparator::Eq => values_equal(left, right),
        Comparator::Ne => !values_equal(left, right),
        Comparator::Lt => order(left, right) == Some(Ordering::Less),
        Comparator::Le => matches!(order(left, right), Some(Ordering::Less | Ordering::Equal)),
        Comparator::Gt => order(left, right) == Some(Ordering::Greater),
        Comparator::Ge => matches!(order(left, right), Some(Ordering::Greater | Ordering::Equal)),
    }
}
