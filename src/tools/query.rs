//! Row filters for `query_csv`.
//!
//! A filter is a boolean expression over column names, string literals and
//! numbers:
//!
//! ```text
//! age > 25 and city == "New York"
//! `first name` in ['Ada', 'Grace'] or not (score <= 3.5)
//! ```
//!
//! Cells are compared as numbers when both sides are numeric and as text
//! otherwise. An empty cell is missing: it only satisfies `!=` and `not in`.

use std::cmp::Ordering;
use std::fmt;

use crate::errors::{ToolError, ToolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }

    fn is_equality(self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Ne)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Text(String),
    Number(f64),
    Compare(CompareOp),
    And,
    Or,
    Not,
    In,
    Minus,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Name(name) => write!(f, "name '{}'", name),
            Token::Text(text) => write!(f, "string {:?}", text),
            Token::Number(n) => write!(f, "number {}", n),
            Token::Compare(op) => write!(f, "'{}'", op),
            Token::And => f.write_str("'and'"),
            Token::Or => f.write_str("'or'"),
            Token::Not => f.write_str("'not'"),
            Token::In => f.write_str("'in'"),
            Token::Minus => f.write_str("'-'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

fn tokenize(query: &str) -> ToolResult<Vec<Token>> {
    let chars: Vec<char> = query.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' | ')' | '[' | ']' | ',' | '&' | '|' | '~' | '-' => {
                tokens.push(match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    ',' => Token::Comma,
                    '&' => Token::And,
                    '|' => Token::Or,
                    '~' => Token::Not,
                    _ => Token::Minus,
                });
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let followed_by_eq = chars.get(i + 1) == Some(&'=');
                let op = match (c, followed_by_eq) {
                    ('=', true) => CompareOp::Eq,
                    ('!', true) => CompareOp::Ne,
                    ('<', true) => CompareOp::Le,
                    ('>', true) => CompareOp::Ge,
                    ('<', false) => CompareOp::Lt,
                    ('>', false) => CompareOp::Gt,
                    _ => return Err(syntax(format!("unexpected '{}' at position {}", c, i))),
                };
                tokens.push(Token::Compare(op));
                i += if followed_by_eq { 2 } else { 1 };
            }
            '\'' | '"' => {
                let (text, next) = read_quoted(&chars, i)?;
                tokens.push(Token::Text(text));
                i = next;
            }
            '`' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == '`')
                    .map(|offset| start + offset)
                    .ok_or_else(|| syntax("unterminated backtick name".to_string()))?;
                tokens.push(Token::Name(chars[start..end].iter().collect()));
                i = end + 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_digit()
                        || chars[i] == '.'
                        || matches!(chars[i], 'e' | 'E')
                        || (matches!(chars[i], '+' | '-') && matches!(chars[i - 1], 'e' | 'E')))
                {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| syntax(format!("invalid number '{}'", literal)))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    _ => Token::Name(word),
                });
            }
            _ => return Err(syntax(format!("unexpected '{}' at position {}", c, i))),
        }
    }

    Ok(tokens)
}

/// Reads a quoted literal starting at `start`, returning it and the index
/// just past the closing quote. Backslash escapes the next character.
fn read_quoted(chars: &[char], start: usize) -> ToolResult<(String, usize)> {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                text.push(chars[i + 1]);
                i += 2;
            }
            c if c == quote => return Ok((text, i + 1)),
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    Err(syntax("unterminated string literal".to_string()))
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Column(usize),
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    Member {
        value: Operand,
        list: Vec<Operand>,
        negated: bool,
    },
    All(Vec<Expr>),
    Any(Vec<Expr>),
    Not(Box<Expr>),
}

/// Deepest nesting of parentheses and `not` a query may use.
const MAX_DEPTH: usize = 64;

struct Parser<'a> {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
    headers: &'a [String],
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.position + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> ToolResult<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(syntax(format!("expected {}, found {}", expected, token))),
            None => Err(syntax(format!("expected {}, found end of query", expected))),
        }
    }

    fn or_expr(&mut self) -> ToolResult<Expr> {
        let mut terms = vec![self.and_expr()?];
        while self.peek() == Some(&Token::Or) {
            self.next();
            terms.push(self.and_expr()?);
        }
        Ok(flatten(terms, Expr::Any))
    }

    fn and_expr(&mut self) -> ToolResult<Expr> {
        let mut terms = vec![self.not_expr()?];
        while self.peek() == Some(&Token::And) {
            self.next();
            terms.push(self.not_expr()?);
        }
        Ok(flatten(terms, Expr::All))
    }

    fn not_expr(&mut self) -> ToolResult<Expr> {
        if self.peek() == Some(&Token::Not) {
            self.next();
            let inner = self.nested(Self::not_expr)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> ToolResult<Expr> {
        if self.peek() == Some(&Token::LParen) {
            self.next();
            let expr = self.nested(Self::or_expr)?;
            self.expect(Token::RParen)?;
            return Ok(expr);
        }
        self.comparison()
    }

    fn nested(&mut self, parse: fn(&mut Self) -> ToolResult<Expr>) -> ToolResult<Expr> {
        if self.depth == MAX_DEPTH {
            return Err(syntax("expression nested too deeply".to_string()));
        }
        self.depth += 1;
        let expr = parse(self);
        self.depth -= 1;
        expr
    }

    fn comparison(&mut self) -> ToolResult<Expr> {
        let left = self.operand()?;

        match self.peek().cloned() {
            Some(Token::In) => {
                self.next();
                let list = self.list()?;
                return Ok(Expr::Member {
                    value: left,
                    list,
                    negated: false,
                });
            }
            Some(Token::Not) if self.peek_at(1) == Some(&Token::In) => {
                self.position += 2;
                let list = self.list()?;
                return Ok(Expr::Member {
                    value: left,
                    list,
                    negated: true,
                });
            }
            _ => {}
        }

        // `a < b < c` reads as `a < b and b < c`
        let mut links = Vec::new();
        let mut current = left;
        while let Some(Token::Compare(op)) = self.peek().cloned() {
            self.next();
            let right = self.operand()?;
            links.push(Expr::Compare {
                left: current,
                op,
                right: right.clone(),
            });
            current = right;
        }

        if links.is_empty() {
            return Err(match self.peek() {
                Some(token) => syntax(format!("expected a comparison, found {}", token)),
                None => syntax("expected a comparison, found end of query".to_string()),
            });
        }
        Ok(flatten(links, Expr::All))
    }

    fn operand(&mut self) -> ToolResult<Operand> {
        match self.next() {
            Some(Token::Name(name)) => self
                .headers
                .iter()
                .position(|header| *header == name)
                .map(Operand::Column)
                .ok_or_else(|| ToolError::ExecutionError(format!("name '{}' is not defined", name))),
            Some(Token::Text(text)) => Ok(Operand::Text(text)),
            Some(Token::Number(n)) => Ok(Operand::Number(n)),
            Some(Token::Minus) => match self.next() {
                Some(Token::Number(n)) => Ok(Operand::Number(-n)),
                _ => Err(syntax("'-' must be followed by a number".to_string())),
            },
            Some(token) => Err(syntax(format!("expected a value, found {}", token))),
            None => Err(syntax("expected a value, found end of query".to_string())),
        }
    }

    fn list(&mut self) -> ToolResult<Vec<Operand>> {
        self.expect(Token::LBracket)?;
        let mut items = Vec::new();
        if self.peek() == Some(&Token::RBracket) {
            self.next();
            return Ok(items);
        }
        loop {
            items.push(self.operand()?);
            match self.next() {
                Some(Token::Comma) if self.peek() == Some(&Token::RBracket) => {
                    self.next();
                    return Ok(items);
                }
                Some(Token::Comma) => {}
                Some(Token::RBracket) => return Ok(items),
                Some(token) => return Err(syntax(format!("expected ',' or ']', found {}", token))),
                None => return Err(syntax("unterminated list".to_string())),
            }
        }
    }
}

/// A value during evaluation. Cells carry their text and, when it parses, a
/// number; literals carry one or the other; missing cells carry neither.
#[derive(Debug, Clone, Copy)]
struct Scalar<'a> {
    text: Option<&'a str>,
    number: Option<f64>,
}

impl<'a> Scalar<'a> {
    fn cell(value: &'a str) -> Self {
        if value.is_empty() {
            return Self {
                text: None,
                number: None,
            };
        }
        Self {
            text: Some(value),
            number: value.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    fn is_missing(&self) -> bool {
        self.text.is_none() && self.number.is_none()
    }
}

fn compare(left: Scalar<'_>, op: CompareOp, right: Scalar<'_>) -> ToolResult<bool> {
    if left.is_missing() || right.is_missing() {
        return Ok(op == CompareOp::Ne);
    }
    if let (Some(a), Some(b)) = (left.number, right.number) {
        return Ok(a.partial_cmp(&b).map_or(false, |ordering| op.holds(ordering)));
    }
    match (left.text, right.text) {
        (Some(a), Some(b)) => Ok(op.holds(a.cmp(b))),
        // A bare number against text that is not numeric
        _ if op.is_equality() => Ok(op == CompareOp::Ne),
        _ => Err(ToolError::ExecutionError(format!(
            "'{}' not supported between a string and a number",
            op
        ))),
    }
}

/// A parsed `query_csv` filter, bound to a table's header row.
#[derive(Debug, Clone)]
pub struct Filter {
    expr: Expr,
}

impl Filter {
    pub fn parse(query: &str, headers: &[String]) -> ToolResult<Self> {
        let tokens = tokenize(query)?;
        if tokens.is_empty() {
            return Err(syntax("query is empty".to_string()));
        }
        let mut parser = Parser {
            tokens,
            position: 0,
            depth: 0,
            headers,
        };
        let expr = parser.or_expr()?;
        if let Some(token) = parser.peek() {
            return Err(syntax(format!("unexpected {}", token)));
        }
        Ok(Self { expr })
    }

    pub fn matches(&self, row: &[String]) -> ToolResult<bool> {
        eval(&self.expr, row)
    }

    /// Indices of the rows the filter keeps, in table order.
    pub fn select(&self, rows: &[Vec<String>]) -> ToolResult<Vec<usize>> {
        let mut selected = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if self.matches(row)? {
                selected.push(index);
            }
        }
        Ok(selected)
    }
}

fn eval(expr: &Expr, row: &[String]) -> ToolResult<bool> {
    match expr {
        Expr::Compare { left, op, right } => {
            compare(resolve(left, row), *op, resolve(right, row))
        }
        Expr::Member {
            value,
            list,
            negated,
        } => {
            let value = resolve(value, row);
            let mut found = false;
            for item in list {
                if compare(value, CompareOp::Eq, resolve(item, row))? {
                    found = true;
                    break;
                }
            }
            Ok(found != *negated)
        }
        Expr::All(terms) => {
            for term in terms {
                if !eval(term, row)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Expr::Any(terms) => {
            for term in terms {
                if eval(term, row)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Expr::Not(inner) => Ok(!eval(inner, row)?),
    }
}

fn flatten(mut terms: Vec<Expr>, group: fn(Vec<Expr>) -> Expr) -> Expr {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        group(terms)
    }
}

fn resolve<'a>(operand: &'a Operand, row: &'a [String]) -> Scalar<'a> {
    match operand {
        Operand::Column(index) => Scalar::cell(row.get(*index).map(String::as_str).unwrap_or("")),
        Operand::Text(text) => Scalar {
            text: Some(text.as_str()),
            number: None,
        },
        Operand::Number(n) => Scalar {
            text: None,
            number: Some(*n),
        },
    }
}

fn syntax(message: String) -> ToolError {
    ToolError::ExecutionError(format!("invalid query: {}", message))
}
