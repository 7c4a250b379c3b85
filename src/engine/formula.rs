//! Formula interpreter.
//!
//! Rule formulas are small arithmetic expressions over order fields:
//!
//! ```text
//! 10 + parseFloat(SomeDimension)
//! ([Select Door Height] - 2 * 0.75) / 2
//! Math.max(width, 24)
//! ```
//!
//! The pipeline is tokenize -> recursive descent -> tree walk:
//!
//! ```text
//! source ── Lexer ──▶ [Token] ── FormulaParser ──▶ Expr ── eval(order) ──▶ f64
//! ```
//!
//! An expression can only read fields of the `OrderRecord` it is evaluated
//! against and call the functions in [`Func`]. There is no other name lookup.
//!
//! ## Grammar
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | primary
//! primary := NUMBER | IDENT | '[' FIELD ']' | IDENT '(' args? ')' | '(' expr ')'
//! args    := expr (',' expr)*
//! ```
//!
//! Every operand is coerced with `Value::to_number`, so `"2" + 1` is `3`, an
//! unknown field is NaN and a boolean is 0 or 1.

use crate::error::{Error, FormulaError, Result};
use crate::{OrderRecord, Value, format_number};

/// Maximum nesting of parentheses, unary operators and calls.
pub(crate) const MAX_DEPTH: usize = 64;

/// Maximum number of tokens in one formula.
pub(crate) const MAX_TOKENS: usize = 1024;

// --- Tokens ------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Field(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", format_number(*n)),
            Token::Ident(name) => format!("name '{name}'"),
            Token::Field(name) => format!("field [{name}]"),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Comma => "','".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    offset: usize,
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer { src, chars: src.char_indices().peekable() }
    }

    fn tokenize(mut self) -> Result<Vec<Spanned>, FormulaError> {
        let mut tokens = Vec::new();
        while let Some(&(offset, ch)) = self.chars.peek() {
            let token = match ch {
                c if c.is_whitespace() => {
                    self.chars.next();
                    continue;
                }
                '0'..='9' | '.' => self.number(offset)?,
                c if is_ident_start(c) => self.ident(offset),
                '[' => self.field(offset)?,
                _ => {
                    self.chars.next();
                    match ch {
                        '+' => Token::Plus,
                        '-' => Token::Minus,
                        '*' => Token::Star,
                        '/' => Token::Slash,
                        '(' => Token::LParen,
                        ')' => Token::RParen,
                        ',' => Token::Comma,
                        _ => return Err(FormulaError::UnexpectedChar { ch, offset }),
                    }
                }
            };
            tokens.push(Spanned { token, offset });
        }
        Ok(tokens)
    }

    fn number(&mut self, start: usize) -> Result<Token, FormulaError> {
        let rest = &self.src[start..];
        let Some(m) = regex!(r"^(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?").find(rest) else {
            return Err(FormulaError::UnexpectedChar { ch: '.', offset: start });
        };
        let text = m.as_str();
        while self.chars.peek().is_some_and(|&(i, _)| i < start + text.len()) {
            self.chars.next();
        }
        text.parse::<f64>().map(Token::Number).map_err(|_| FormulaError::UnexpectedToken {
            found: format!("number '{text}'"),
            offset: start,
        })
    }

    fn ident(&mut self, start: usize) -> Token {
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            let dotted_part = c == '.' && self.src[i + 1..].chars().next().is_some_and(is_ident_start);
            if is_ident_continue(c) || dotted_part {
                end = i + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        Token::Ident(self.src[start..end].to_string())
    }

    fn field(&mut self, start: usize) -> Result<Token, FormulaError> {
        self.chars.next();
        let mut name = String::new();
        for (_, c) in self.chars.by_ref() {
            if c == ']' {
                return Ok(Token::Field(name));
            }
            name.push(c);
        }
        Err(FormulaError::UnterminatedField(start))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

// --- Syntax tree -------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// The functions a formula may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Func {
    ParseFloat,
    ParseInt,
    Number,
    Round,
    Floor,
    Ceil,
    Abs,
    Min,
    Max,
}

impl Func {
    fn lookup(name: &str) -> Option<Func> {
        Some(match name {
            "parseFloat" => Func::ParseFloat,
            "parseInt" => Func::ParseInt,
            "Number" => Func::Number,
            "Math.round" => Func::Round,
            "Math.floor" => Func::Floor,
            "Math.ceil" => Func::Ceil,
            "Math.abs" => Func::Abs,
            "Math.min" => Func::Min,
            "Math.max" => Func::Max,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Func::ParseFloat => "parseFloat",
            Func::ParseInt => "parseInt",
            Func::Number => "Number",
            Func::Round => "Math.round",
            Func::Floor => "Math.floor",
            Func::Ceil => "Math.ceil",
            Func::Abs => "Math.abs",
            Func::Min => "Math.min",
            Func::Max => "Math.max",
        }
    }

    fn check_arity(self, found: usize) -> Result<(), FormulaError> {
        let ok = match self {
            Func::Min | Func::Max => found >= 1,
            _ => found == 1,
        };
        if ok {
            return Ok(());
        }
        let expected = match self {
            Func::Min | Func::Max => "at least 1",
            _ => "exactly 1",
        };
        Err(FormulaError::Arity { name: self.name(), expected, found })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    Variable(String),
    Neg(Box<Expr>),
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Call { func: Func, args: Vec<Expr> },
}

// --- Parser ------------------------------------------------------------------

struct FormulaParser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl FormulaParser {
    fn parse(tokens: Vec<Spanned>) -> Result<Expr, FormulaError> {
        if tokens.is_empty() {
            return Err(FormulaError::Empty);
        }
        if tokens.len() > MAX_TOKENS {
            return Err(FormulaError::TooLong(MAX_TOKENS));
        }
        let mut parser = FormulaParser { tokens, pos: 0, depth: 0 };
        let expr = parser.expr()?;
        match parser.tokens.get(parser.pos) {
            None => Ok(expr),
            Some(extra) => Err(FormulaError::UnexpectedToken { found: extra.token.describe(), offset: extra.offset }),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let next = self.tokens.get(self.pos).cloned();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn expect(&mut self, want: Token) -> Result<(), FormulaError> {
        match self.advance() {
            Some(s) if s.token == want => Ok(()),
            Some(s) => Err(FormulaError::UnexpectedToken { found: s.token.describe(), offset: s.offset }),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH { Err(FormulaError::TooDeep(MAX_DEPTH)) } else { Ok(()) }
    }

    fn expr(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                self.descend()?;
                let inner = self.unary()?;
                self.depth -= 1;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Some(Token::Plus) => {
                // Unary plus is a numeric coercion: `+x` behaves like `Number(x)`.
                self.pos += 1;
                self.descend()?;
                let inner = self.unary()?;
                self.depth -= 1;
                Ok(Expr::Call { func: Func::Number, args: vec![inner] })
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let Some(Spanned { token, offset }) = self.advance() else {
            return Err(FormulaError::UnexpectedEnd);
        };
        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Field(name) => Ok(Expr::Variable(name)),
            Token::Ident(name) => {
                if self.peek() != Some(&Token::LParen) {
                    return Ok(Expr::Variable(name));
                }
                let func = Func::lookup(&name).ok_or(FormulaError::UnknownFunction(name))?;
                self.pos += 1;
                self.descend()?;
                let args = self.args()?;
                self.depth -= 1;
                func.check_arity(args.len())?;
                Ok(Expr::Call { func, args })
            }
            Token::LParen => {
                self.descend()?;
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                self.depth -= 1;
                Ok(inner)
            }
            other => Err(FormulaError::UnexpectedToken { found: other.describe(), offset }),
        }
    }

    // Called after '('; consumes through ')'.
    fn args(&mut self) -> Result<Vec<Expr>, FormulaError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            match self.advance() {
                Some(Spanned { token: Token::Comma, .. }) => continue,
                Some(Spanned { token: Token::RParen, .. }) => return Ok(args),
                Some(s) => return Err(FormulaError::UnexpectedToken { found: s.token.describe(), offset: s.offset }),
                None => return Err(FormulaError::UnexpectedEnd),
            }
        }
    }
}

// --- Evaluation --------------------------------------------------------------

/// An evaluated operand. Field references stay un-coerced so `parseFloat`
/// can see the original text.
enum Operand<'a> {
    Number(f64),
    Field(&'a Value),
    Missing,
}

impl Operand<'_> {
    fn number(&self) -> f64 {
        match self {
            Operand::Number(n) => *n,
            Operand::Field(v) => v.to_number(),
            Operand::Missing => f64::NAN,
        }
    }

    fn text(&self) -> String {
        match self {
            Operand::Number(n) => format_number(*n),
            Operand::Field(v) => v.to_text(),
            Operand::Missing => "undefined".to_string(),
        }
    }
}

fn eval<'a>(expr: &Expr, order: &'a OrderRecord) -> Operand<'a> {
    match expr {
        Expr::Number(n) => Operand::Number(*n),
        Expr::Variable(name) => match order.get(name) {
            Some(value) => Operand::Field(value),
            None => Operand::Missing,
        },
        Expr::Neg(inner) => Operand::Number(-eval(inner, order).number()),
        Expr::Binary { op, lhs, rhs } => {
            let a = eval(lhs, order).number();
            let b = eval(rhs, order).number();
            Operand::Number(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
            })
        }
        Expr::Call { func, args } => {
            let args: Vec<Operand> = args.iter().map(|a| eval(a, order)).collect();
            Operand::Number(call(*func, &args))
        }
    }
}

fn call(func: Func, args: &[Operand]) -> f64 {
    let first = || args.first().map(Operand::number).unwrap_or(f64::NAN);
    match func {
        Func::ParseFloat => parse_float_prefix(&args.first().map(Operand::text).unwrap_or_default()),
        Func::ParseInt => parse_int_prefix(&args.first().map(Operand::text).unwrap_or_default()),
        Func::Number => first(),
        Func::Round => round_half_up(first()),
        Func::Floor => first().floor(),
        Func::Ceil => first().ceil(),
        Func::Abs => first().abs(),
        Func::Min => args.iter().map(Operand::number).fold(f64::INFINITY, |acc, n| {
            if acc.is_nan() || n.is_nan() { f64::NAN } else { acc.min(n) }
        }),
        Func::Max => args.iter().map(Operand::number).fold(f64::NEG_INFINITY, |acc, n| {
            if acc.is_nan() || n.is_nan() { f64::NAN } else { acc.max(n) }
        }),
    }
}

/// Longest leading decimal literal of `s`, NaN when there is none.
fn parse_float_prefix(s: &str) -> f64 {
    let re = regex!(r"^\s*([+-]?(?:Infinity|(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?))");
    match re.captures(s) {
        Some(caps) => match &caps[1] {
            "Infinity" | "+Infinity" => f64::INFINITY,
            "-Infinity" => f64::NEG_INFINITY,
            num => num.parse().unwrap_or(f64::NAN),
        },
        None => f64::NAN,
    }
}

/// Leading base-10 integer of `s`, NaN when there is none.
fn parse_int_prefix(s: &str) -> f64 {
    match regex!(r"^\s*([+-]?[0-9]+)").captures(s) {
        Some(caps) => caps[1].parse().unwrap_or(f64::NAN),
        None => f64::NAN,
    }
}

fn round_half_up(x: f64) -> f64 {
    if !x.is_finite() || x.fract() == 0.0 { x } else { (x + 0.5).floor() }
}

// --- Public surface ----------------------------------------------------------

/// A parsed formula, ready to evaluate against any number of orders.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    /// Parse `source`. Fails with [`Error::FormulaEvaluation`] when the text is
    /// not a well-formed formula or calls a function outside the whitelist.
    pub fn parse(source: &str) -> Result<Self> {
        let expr = Lexer::new(source)
            .tokenize()
            .and_then(FormulaParser::parse)
            .map_err(|source_err| Error::FormulaEvaluation { formula: source.to_string(), source: source_err })?;
        Ok(Formula { source: source.to_string(), expr })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against `order`. Unknown fields and non-numeric text produce
    /// NaN rather than an error.
    pub fn evaluate(&self, order: &OrderRecord) -> f64 {
        eval(&self.expr, order).number()
    }
}

/// Parse and evaluate `formula` against `order` in one step.
///
/// # Example
/// ```
/// use cutsheet::{OrderRecord, evaluate_formula};
///
/// let order = OrderRecord::new().with("SomeDimension", "2");
/// assert_eq!(evaluate_formula("10 + parseFloat(SomeDimension)", &order).unwrap(), 12.0);
/// ```
pub fn evaluate_formula(formula: &str, order: &OrderRecord) -> Result<f64> {
    Ok(Formula::parse(formula)?.evaluate(order))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> OrderRecord {
        OrderRecord::new()
            .with("SomeDimension", "2")
            .with("Select Door Height", 94.625)
            .with("width", 29.75)
            .with("Flagged", true)
            .with("Style", "Provence")
            .with("Padded", " 3.5in ")
    }

    fn eval_str(src: &str) -> f64 {
        evaluate_formula(src, &order()).unwrap()
    }

    fn parse_err(src: &str) -> FormulaError {
        match Formula::parse(src) {
            Err(Error::FormulaEvaluation { source, .. }) => source,
            other => panic!("expected formula error for '{src}', got {other:?}"),
        }
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval_str("5"), 5.0);
        assert_eq!(eval_str("1 + 2 * 3"), 7.0);
        assert_eq!(eval_str("(1 + 2) * 3"), 9.0);
        assert_eq!(eval_str("10 - 4 - 3"), 3.0);
        assert_eq!(eval_str("12 / 4 / 3"), 1.0);
        assert_eq!(eval_str("-2 * -3"), 6.0);
        assert_eq!(eval_str("1.5e1 + .5"), 15.5);
    }

    #[test]
    fn variables_by_exact_name() {
        assert_eq!(eval_str("10 + parseFloat(SomeDimension)"), 12.0);
        assert_eq!(eval_str("width * 2"), 59.5);
        assert_eq!(eval_str("[Select Door Height] - 0.625"), 94.0);
        assert_eq!(eval_str("Flagged + 1"), 2.0);
    }

    #[test]
    fn strings_coerce_numerically_never_concatenate() {
        assert_eq!(eval_str("10 + SomeDimension"), 12.0);
        assert!(eval_str("Style * 2").is_nan());
    }

    #[test]
    fn unknown_variables_are_nan() {
        assert!(eval_str("missing + 1").is_nan());
        assert!(eval_str("parseFloat([No Such Field])").is_nan());
        assert!(eval_str("Width").is_nan());
    }

    #[test]
    fn whitelisted_functions() {
        assert_eq!(eval_str("parseFloat(Padded)"), 3.5);
        assert_eq!(eval_str("parseInt(Padded)"), 3.0);
        assert!(eval_str("parseFloat(Flagged)").is_nan());
        assert!(eval_str("parseFloat(Style)").is_nan());
        assert!(eval_str("Number(Padded)").is_nan());
        assert_eq!(eval_str("Number(SomeDimension)"), 2.0);
        assert_eq!(eval_str("Math.round(2.5)"), 3.0);
        assert_eq!(eval_str("Math.round(-2.5)"), -2.0);
        assert_eq!(eval_str("Math.floor(width)"), 29.0);
        assert_eq!(eval_str("Math.ceil(width)"), 30.0);
        assert_eq!(eval_str("Math.abs(-4)"), 4.0);
        assert_eq!(eval_str("Math.min(width, 24, 30)"), 24.0);
        assert_eq!(eval_str("Math.max(width, 24)"), 29.75);
        assert!(eval_str("Math.max(width, Style)").is_nan());
        assert_eq!(eval_str("+SomeDimension"), 2.0);
    }

    #[test]
    fn division_by_zero_is_not_an_error() {
        assert_eq!(eval_str("1 / 0"), f64::INFINITY);
    }

    #[test]
    fn host_access_is_rejected() {
        assert_eq!(parse_err("require(fs)"), FormulaError::UnknownFunction("require".to_string()));
        assert_eq!(parse_err("process.exit(1)"), FormulaError::UnknownFunction("process.exit".to_string()));
        assert_eq!(parse_err("eval(SomeDimension)"), FormulaError::UnknownFunction("eval".to_string()));
        assert!(matches!(parse_err("order[0]"), FormulaError::UnexpectedToken { .. }));
        assert!(matches!(parse_err("x = 1"), FormulaError::UnexpectedChar { ch: '=', .. }));
        assert!(matches!(parse_err("`rm -rf`"), FormulaError::UnexpectedChar { ch: '`', .. }));
    }

    #[test]
    fn malformed_formulas() {
        assert_eq!(parse_err(""), FormulaError::Empty);
        assert_eq!(parse_err("   "), FormulaError::Empty);
        assert_eq!(parse_err("1 +"), FormulaError::UnexpectedEnd);
        assert_eq!(parse_err("(1 + 2"), FormulaError::UnexpectedEnd);
        assert!(matches!(parse_err("1 + 2)"), FormulaError::UnexpectedToken { offset: 5, .. }));
        assert!(matches!(parse_err("2 3"), FormulaError::UnexpectedToken { .. }));
        assert_eq!(parse_err("[open"), FormulaError::UnterminatedField(0));
        assert!(matches!(parse_err("parseFloat(1, 2)"), FormulaError::Arity { name: "parseFloat", found: 2, .. }));
        assert!(matches!(parse_err("Math.min()"), FormulaError::Arity { name: "Math.min", found: 0, .. }));
        assert!(matches!(parse_err("."), FormulaError::UnexpectedChar { ch: '.', .. }));
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = format!("{}1{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert_eq!(parse_err(&deep), FormulaError::TooDeep(MAX_DEPTH));

        let ok = format!("{}1{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert_eq!(eval_str(&ok), 1.0);

        let long = vec!["1"; MAX_TOKENS].join("+");
        assert_eq!(parse_err(&long), FormulaError::TooLong(MAX_TOKENS));
    }

    #[test]
    fn parsed_formula_is_reusable() {
        let formula = Formula::parse("width / 2").unwrap();
        assert_eq!(formula.source(), "width / 2");
        assert_eq!(formula.evaluate(&order()), 14.875);
        assert!(formula.evaluate(&OrderRecord::new()).is_nan());
    }
}
