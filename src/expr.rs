//! Expression parser and evaluator.
//!
//! A backtick region holds exactly one expression. Parsing is a plain
//! recursive descent over the [`Scanner`]'s one-token lookahead and produces
//! a small AST whose nodes remember the byte offset they started at; a
//! tree-walking evaluator then reduces the AST to a [`Value`], calling back
//! into the [`Host`] for variable and function names.
//!
//! Operator precedence (lowest → highest):
//!   map `{…}` suffix  →  ternary  →  `&&`/`||`  →  relational  →
//!   additive  →  multiplicative  →  unary  →  atomic
//!
//! Three semantic choices worth knowing about:
//!
//! - `&&`, `||`, and `?:` evaluate **all** their operands; host calls on a
//!   discarded branch still happen, in source order.
//! - The only falsy operand of `&&`/`||` is the integer zero. `&&` yields 0
//!   when either side is `0`; `||` yields 0 only when both sides are `0`.
//! - All integer arithmetic wraps (two's complement), including negation.

use tracing::trace;

use crate::error::Error;
use crate::expand::Limits;
use crate::host::Host;
use crate::scanner::{is_ident_rest, location_from, Scanner, Tok};
use crate::value::Value;

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    /// `+x`: type assertion only, the value passes through.
    Plus,
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone)]
enum ListItem {
    One(Expr),
    /// `a..b`; endpoints are full expressions.
    Range(Expr, Expr),
}

#[derive(Debug, Clone)]
struct Expr {
    kind: ExprKind,
    /// Byte offset of the token that introduced this node, for diagnostics.
    pos: usize,
}

#[derive(Debug, Clone)]
enum ExprKind {
    Int(i32),
    Str(String),
    Dollar,
    Var(String),
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    List(Vec<ListItem>),
    /// `E { B }`: apply `B` to `E` (element-wise when `E` is a list).
    Map(Box<Expr>, Box<Expr>),
}

// ── Parser ────────────────────────────────────────────────────────────────────

fn is_string_escape(b: u8) -> bool {
    matches!(b, b'n' | b't' | b'r' | b'b' | b'"' | b'\\')
}

struct Parser<'a> {
    src: &'a str,
    sc: Scanner<'a>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, pos: usize) -> Self {
        Parser {
            src,
            sc: Scanner::new(src, pos),
        }
    }

    /// Byte offset of the first unconsumed token.
    fn offset(&self) -> usize {
        self.sc.offset()
    }

    fn err(&self, message: impl Into<String>) -> Error {
        let (line, col) = self.sc.location();
        Error::Interp {
            line,
            col,
            message: message.into(),
        }
    }

    fn node(&self, kind: ExprKind, pos: usize) -> Expr {
        Expr { kind, pos }
    }

    // Exp := PostExp ( '{' Exp '}' )?
    fn parse_expr(&mut self) -> Result<Expr, Error> {
        let head = self.parse_post_exp()?;
        if self.sc.peek().tok != Tok::LBrace {
            return Ok(head);
        }
        let pos = head.pos;
        self.sc.advance();
        let body = self.parse_expr()?;
        if self.sc.peek().tok != Tok::RBrace {
            return Err(self.err("expected '}' to close the map body"));
        }
        self.sc.advance();
        Ok(self.node(ExprKind::Map(Box::new(head), Box::new(body)), pos))
    }

    // PostExp := Ternary ( '?' Exp ':' Exp )?
    fn parse_post_exp(&mut self) -> Result<Expr, Error> {
        let cond = self.parse_logic()?;
        if self.sc.peek().tok != Tok::Question {
            return Ok(cond);
        }
        let pos = cond.pos;
        self.sc.advance();
        let then = self.parse_expr()?;
        if self.sc.peek().tok != Tok::Colon {
            return Err(self.err("expected ':' in ternary"));
        }
        self.sc.advance();
        let else_ = self.parse_expr()?;
        Ok(self.node(
            ExprKind::Ternary(Box::new(cond), Box::new(then), Box::new(else_)),
            pos,
        ))
    }

    // Ternary := Logic ( ('&&'|'||') Logic )*
    fn parse_logic(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.sc.peek().tok {
                Tok::And => BinOp::And,
                Tok::Or => BinOp::Or,
                _ => return Ok(lhs),
            };
            self.sc.advance();
            let rhs = self.parse_relational()?;
            let pos = lhs.pos;
            lhs = self.node(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), pos);
        }
    }

    // Logic := Comp ( ('<'|'<='|'>'|'>='|'=='|'!=') Comp )*
    fn parse_relational(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.sc.peek().tok {
                Tok::Lt => BinOp::Lt,
                Tok::Le => BinOp::Le,
                Tok::Gt => BinOp::Gt,
                Tok::Ge => BinOp::Ge,
                Tok::Eq => BinOp::Eq,
                Tok::Ne => BinOp::Ne,
                _ => return Ok(lhs),
            };
            self.sc.advance();
            let rhs = self.parse_additive()?;
            let pos = lhs.pos;
            lhs = self.node(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), pos);
        }
    }

    // Comp := Term ( ('+'|'-') Term )*
    fn parse_additive(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.sc.peek().tok {
                Tok::Add => BinOp::Add,
                Tok::Sub => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.sc.advance();
            let rhs = self.parse_multiplicative()?;
            let pos = lhs.pos;
            lhs = self.node(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), pos);
        }
    }

    // Term := Factor ( ('*'|'/') Factor )*
    fn parse_multiplicative(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.sc.peek().tok {
                Tok::Mul => BinOp::Mul,
                Tok::Div => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.sc.advance();
            let rhs = self.parse_factor()?;
            let pos = lhs.pos;
            lhs = self.node(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), pos);
        }
    }

    // Factor := ('+'|'-'|'!') Atomic | Atomic
    //
    // Unary operators do not nest: the operand is an Atomic, so `--1` is a
    // parse error rather than double negation.
    fn parse_factor(&mut self) -> Result<Expr, Error> {
        let op = match self.sc.peek().tok {
            Tok::Add => UnaryOp::Plus,
            Tok::Sub => UnaryOp::Neg,
            Tok::Not => UnaryOp::Not,
            _ => return self.parse_atomic(),
        };
        let pos = self.sc.offset();
        self.sc.advance();
        let operand = self.parse_atomic()?;
        Ok(self.node(ExprKind::Unary(op, Box::new(operand)), pos))
    }

    // Atomic := List | '$' | Var | Number | String | '(' Exp ')'
    fn parse_atomic(&mut self) -> Result<Expr, Error> {
        let pos = self.sc.offset();
        match self.sc.peek().tok {
            Tok::LBracket => self.parse_list(),
            Tok::Dollar => {
                self.sc.advance();
                Ok(self.node(ExprKind::Dollar, pos))
            }
            Tok::Var => {
                let name = self.parse_ident();
                if self.sc.peek().tok == Tok::LParen {
                    self.parse_call(name, pos)
                } else {
                    Ok(self.node(ExprKind::Var(name), pos))
                }
            }
            Tok::Num => self.parse_number(),
            Tok::Str => self.parse_string(),
            Tok::LParen => {
                self.sc.advance();
                let inner = self.parse_expr()?;
                if self.sc.peek().tok != Tok::RParen {
                    return Err(self.err("expected ')'"));
                }
                self.sc.advance();
                Ok(inner)
            }
            other => Err(self.err(format!("unexpected token: {}", other.name()))),
        }
    }

    // List := '[' Item (',' Item)* ']'  with  Item := Exp ( '..' Exp )?
    fn parse_list(&mut self) -> Result<Expr, Error> {
        let pos = self.sc.offset();
        self.sc.advance();
        if self.sc.peek().tok == Tok::RBracket {
            return Err(self.err("list literal may not be empty"));
        }
        let mut items = Vec::new();
        loop {
            let item = self.parse_expr()?;
            if self.sc.peek().tok == Tok::To {
                self.sc.advance();
                let to = self.parse_expr()?;
                items.push(ListItem::Range(item, to));
            } else {
                items.push(ListItem::One(item));
            }
            match self.sc.peek().tok {
                Tok::Comma => {
                    self.sc.advance();
                }
                Tok::RBracket => {
                    self.sc.advance();
                    return Ok(self.node(ExprKind::List(items), pos));
                }
                other => {
                    return Err(self.err(format!(
                        "unexpected token in list literal: {}",
                        other.name()
                    )));
                }
            }
        }
    }

    // ArgList := Exp (',' Exp)*   An empty argument list is not permitted;
    // a ')' right after '(' falls into parse_expr and reports it.
    fn parse_call(&mut self, name: String, pos: usize) -> Result<Expr, Error> {
        self.sc.advance();
        let mut args = Vec::new();
        loop {
            args.push(self.parse_expr()?);
            match self.sc.peek().tok {
                Tok::Comma => {
                    self.sc.advance();
                }
                Tok::RParen => {
                    self.sc.advance();
                    return Ok(self.node(ExprKind::Call(name, args), pos));
                }
                other => {
                    return Err(self.err(format!("unexpected token: {}", other.name())));
                }
            }
        }
    }

    /// Read an identifier payload and move the scanner past it.
    fn parse_ident(&mut self) -> String {
        let bytes = self.src.as_bytes();
        let start = self.sc.offset();
        let mut end = start + 1;
        while end < bytes.len() && is_ident_rest(bytes[end]) {
            end += 1;
        }
        let name = self.src[start..end].to_owned();
        self.sc.set(end);
        name
    }

    /// Read a base-10 number payload. The digits are parsed wide and
    /// truncated to 32 bits (wrapping); only a literal too large for an
    /// `i64` fails.
    fn parse_number(&mut self) -> Result<Expr, Error> {
        let bytes = self.src.as_bytes();
        let start = self.sc.offset();
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        let wide: i64 = self.src[start..end]
            .parse()
            .map_err(|_| self.err("number literal is out of range"))?;
        self.sc.set(end);
        Ok(self.node(ExprKind::Int(wide as i32), start))
    }

    /// Read a string payload. `\n \t \r \b \" \\` keep the second byte
    /// literally; any other `\X` keeps both bytes.
    fn parse_string(&mut self) -> Result<Expr, Error> {
        let bytes = self.src.as_bytes();
        let start = self.sc.offset();
        let mut buf = String::new();
        let mut run = start + 1;
        let mut i = start + 1;
        loop {
            if i >= bytes.len() {
                return Err(self.err("string literal is not terminated"));
            }
            match bytes[i] {
                b'\\' if i + 1 < bytes.len() && is_string_escape(bytes[i + 1]) => {
                    buf.push_str(&self.src[run..i]);
                    buf.push(bytes[i + 1] as char);
                    i += 2;
                    run = i;
                }
                b'"' => {
                    buf.push_str(&self.src[run..i]);
                    break;
                }
                _ => i += 1,
            }
        }
        self.sc.set(i + 1);
        Ok(self.node(ExprKind::Str(buf), start))
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

struct Evaluator<'a, 'h> {
    src: &'a [u8],
    /// Offset the expression region starts at; line/col count from here.
    start: usize,
    host: Option<&'h mut dyn Host>,
    dollar: Option<Value>,
    limits: &'a Limits,
}

impl<'a, 'h> Evaluator<'a, 'h> {
    fn err_at(&self, pos: usize, message: impl Into<String>) -> Error {
        let (line, col) = location_from(self.src, self.start, pos);
        Error::Interp {
            line,
            col,
            message: message.into(),
        }
    }

    fn eval(&mut self, e: &Expr) -> Result<Value, Error> {
        match &e.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),

            ExprKind::Dollar => self
                .dollar
                .clone()
                .ok_or_else(|| self.err_at(e.pos, "'$' has no bound value here")),

            ExprKind::Var(name) => match self.host.as_deref_mut() {
                None => Err(self.err_at(
                    e.pos,
                    format!("variable '{name}' cannot be resolved without a host"),
                )),
                Some(host) => host
                    .get_variable(name)
                    .ok_or_else(|| self.err_at(e.pos, format!("variable '{name}' is not defined"))),
            },

            ExprKind::Call(name, arg_exprs) => {
                let mut args = Vec::with_capacity(arg_exprs.len());
                for ae in arg_exprs {
                    args.push(self.eval(ae)?);
                }
                match self.host.as_deref_mut() {
                    None => Err(self.err_at(
                        e.pos,
                        format!("function '{name}' cannot be called without a host"),
                    )),
                    Some(host) => host
                        .exec_function(name, &args)
                        .map_err(|reason| {
                            self.err_at(e.pos, format!("function '{name}' failed: {reason}"))
                        }),
                }
            }

            ExprKind::Unary(op, inner) => {
                let v = self.eval(inner)?;
                match op {
                    UnaryOp::Plus => match v {
                        Value::Int(_) => Ok(v),
                        other => Err(self.err_at(
                            e.pos,
                            format!("'+' and '-' require a number operand, got {}", other.type_name()),
                        )),
                    },
                    UnaryOp::Neg => match v {
                        Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
                        other => Err(self.err_at(
                            e.pos,
                            format!("'+' and '-' require a number operand, got {}", other.type_name()),
                        )),
                    },
                    UnaryOp::Not => Ok(Value::Int(match v {
                        Value::Int(n) => i32::from(n == 0),
                        Value::Str(_) => 0,
                        // Lists are truthy elsewhere but negate to 1.
                        Value::Null | Value::List(_) => 1,
                    })),
                }
            }

            ExprKind::Binary(op, lhs, rhs) => {
                // Both sides are always evaluated, even for && and ||.
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                self.eval_binop(*op, l, r, e.pos)
            }

            ExprKind::Ternary(cond, then, else_) => {
                let c = self.eval(cond)?;
                let t = self.eval(then)?;
                let f = self.eval(else_)?;
                Ok(if c.truthy() { t } else { f })
            }

            ExprKind::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        ListItem::One(x) => out.push(self.eval(x)?),
                        ListItem::Range(from, to) => self.eval_range(from, to, &mut out)?,
                    }
                }
                Ok(Value::List(out))
            }

            ExprKind::Map(seed, body) => {
                let seed_val = self.eval(seed)?;
                let saved = self.dollar.take();
                let result = self.eval_map(seed_val, body);
                self.dollar = saved;
                result
            }
        }
    }

    fn eval_binop(&self, op: BinOp, l: Value, r: Value, pos: usize) -> Result<Value, Error> {
        match op {
            BinOp::Add | BinOp::Sub => {
                let (a, b) = self.int_operands(&l, &r, pos, "'+' and '-'")?;
                Ok(Value::Int(if op == BinOp::Add {
                    a.wrapping_add(b)
                } else {
                    a.wrapping_sub(b)
                }))
            }
            BinOp::Mul | BinOp::Div => {
                let (a, b) = self.int_operands(&l, &r, pos, "'*' and '/'")?;
                if op == BinOp::Mul {
                    Ok(Value::Int(a.wrapping_mul(b)))
                } else if b == 0 {
                    Err(self.err_at(pos, "divide by zero"))
                } else {
                    Ok(Value::Int(a.wrapping_div(b)))
                }
            }

            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Eq | BinOp::Ne => {
                let ord = match (&l, &r) {
                    (Value::Int(a), Value::Int(b)) => a.cmp(b),
                    (Value::Str(a), Value::Str(b)) => a.cmp(b),
                    (_, Value::Str(_)) => {
                        return Err(self.err_at(pos, "a string can only be compared to a string"));
                    }
                    (_, Value::Int(_)) => {
                        return Err(self.err_at(pos, "a number can only be compared to a number"));
                    }
                    _ => {
                        return Err(self.err_at(pos, "only numbers and strings can be compared"));
                    }
                };
                let hit = match op {
                    BinOp::Lt => ord.is_lt(),
                    BinOp::Le => ord.is_le(),
                    BinOp::Gt => ord.is_gt(),
                    BinOp::Ge => ord.is_ge(),
                    BinOp::Eq => ord.is_eq(),
                    BinOp::Ne => ord.is_ne(),
                    _ => unreachable!(),
                };
                Ok(Value::Int(i32::from(hit)))
            }

            // The only falsy operand is the integer zero: strings, lists, and
            // null never equal zero, so they count as true on both sides.
            BinOp::And | BinOp::Or => {
                let lz = matches!(l, Value::Int(0));
                let rz = matches!(r, Value::Int(0));
                let hit = if op == BinOp::And {
                    !lz && !rz
                } else {
                    !(lz && rz)
                };
                Ok(Value::Int(i32::from(hit)))
            }
        }
    }

    fn int_operands(
        &self,
        l: &Value,
        r: &Value,
        pos: usize,
        what: &str,
    ) -> Result<(i32, i32), Error> {
        match (l, r) {
            (Value::Int(a), Value::Int(b)) => Ok((*a, *b)),
            _ => Err(self.err_at(
                pos,
                format!(
                    "{what} require number operands, got {} and {}",
                    l.type_name(),
                    r.type_name()
                ),
            )),
        }
    }

    /// Expand `from..to` into `out` as the half-open integer range
    /// `[from, to)`. Both endpoints must be numbers with `from < to`.
    fn eval_range(&mut self, from: &Expr, to: &Expr, out: &mut Vec<Value>) -> Result<(), Error> {
        let fv = self.eval(from)?;
        let tv = self.eval(to)?;
        let (Some(a), Some(b)) = (fv.as_int(), tv.as_int()) else {
            return Err(self.err_at(from.pos, "'..' requires number endpoints"));
        };
        if a >= b {
            return Err(self.err_at(
                from.pos,
                "'..' requires its start to be strictly less than its end",
            ));
        }
        let count = (i64::from(b) - i64::from(a)) as usize;
        if count > self.limits.max_range {
            return Err(self.err_at(
                from.pos,
                format!(
                    "range expands to {count} elements, more than the configured limit of {}",
                    self.limits.max_range
                ),
            ));
        }
        out.reserve(count);
        for n in i64::from(a)..i64::from(b) {
            out.push(Value::Int(n as i32));
        }
        Ok(())
    }

    /// Apply a map body to the seed value. The caller has already saved the
    /// previous dollar binding and restores it afterwards.
    fn eval_map(&mut self, seed: Value, body: &Expr) -> Result<Value, Error> {
        match seed {
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    self.dollar = Some(item);
                    out.push(self.eval(body)?);
                }
                Ok(Value::List(out))
            }
            scalar => {
                self.dollar = Some(scalar);
                self.eval(body)
            }
        }
    }
}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Parse and evaluate one expression starting at byte offset `pos`.
///
/// Returns the value together with the offset of the first unconsumed byte
/// (trailing whitespace already skipped); the expander requires that byte
/// to be the closing backtick. Trailing input beyond the expression is the
/// caller's problem, not scanned here.
pub(crate) fn eval_region(
    src: &str,
    pos: usize,
    host: Option<&mut dyn Host>,
    limits: &Limits,
) -> Result<(Value, usize), Error> {
    let mut parser = Parser::new(src, pos);
    let expr = parser.parse_expr()?;
    let end = parser.offset();
    trace!(pos, end, "parsed expression region");
    let mut ev = Evaluator {
        src: src.as_bytes(),
        start: pos,
        host,
        dollar: None,
        limits,
    };
    let val = ev.eval(&expr)?;
    Ok((val, end))
}

/// Parse and evaluate `src` as a single standalone expression.
///
/// Bytes after the expression are ignored, mirroring how a backtick region
/// stops at the first token that cannot continue the expression.
pub fn eval_str(src: &str, host: Option<&mut dyn Host>) -> Result<Value, Error> {
    eval_region(src, 0, host, &Limits::default()).map(|(v, _)| v)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MapHost;

    fn eval(src: &str) -> Value {
        eval_str(src, None).expect("eval failed")
    }

    fn eval_err(src: &str) -> Error {
        eval_str(src, None).expect_err("eval unexpectedly succeeded")
    }

    fn ints(ns: &[i32]) -> Value {
        Value::List(ns.iter().map(|&n| Value::Int(n)).collect())
    }

    #[test]
    fn literals() {
        assert_eq!(eval("42"), Value::Int(42));
        assert_eq!(eval("\"hello\""), Value::Str("hello".into()));
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("2 + 3"), Value::Int(5));
        assert_eq!(eval("10 - 4"), Value::Int(6));
        assert_eq!(eval("3 * 4"), Value::Int(12));
        assert_eq!(eval("10 / 3"), Value::Int(3));
    }

    #[test]
    fn precedence() {
        assert_eq!(eval("2 + 3 * 4"), Value::Int(14));
        assert_eq!(eval("(2 + 3) * 4"), Value::Int(20));
        assert_eq!(eval("10 - 2 - 3"), Value::Int(5));
    }

    #[test]
    fn unary() {
        assert_eq!(eval("-5"), Value::Int(-5));
        assert_eq!(eval("+5"), Value::Int(5));
        assert_eq!(eval("-(3 + 2)"), Value::Int(-5));
        assert_eq!(eval("2 * -3"), Value::Int(-6));
    }

    #[test]
    fn unary_does_not_nest() {
        assert!(eval_str("--1", None).is_err());
    }

    #[test]
    fn unary_requires_number() {
        let e = eval_err("-\"x\"");
        assert!(e.message().contains("number operand"), "{e}");
    }

    #[test]
    fn logical_not() {
        assert_eq!(eval("!0"), Value::Int(1));
        assert_eq!(eval("!7"), Value::Int(0));
        assert_eq!(eval("!\"hello\""), Value::Int(0));
        assert_eq!(eval("![1,2]"), Value::Int(1));
    }

    #[test]
    fn comparison() {
        assert_eq!(eval("3 == 3"), Value::Int(1));
        assert_eq!(eval("3 != 4"), Value::Int(1));
        assert_eq!(eval("2 < 3"), Value::Int(1));
        assert_eq!(eval("3 <= 3"), Value::Int(1));
        assert_eq!(eval("3 > 3"), Value::Int(0));
        assert_eq!(eval("3 >= 3"), Value::Int(1));
    }

    #[test]
    fn string_comparison_is_bytewise() {
        assert_eq!(eval("\"abc\" < \"abd\""), Value::Int(1));
        assert_eq!(eval("\"abc\" == \"abc\""), Value::Int(1));
        assert_eq!(eval("\"B\" < \"a\""), Value::Int(1));
    }

    #[test]
    fn mixed_comparison_is_an_error() {
        assert!(eval_str("1 < \"a\"", None).is_err());
        assert!(eval_str("\"a\" < 1", None).is_err());
        assert!(eval_str("[1] == [1]", None).is_err());
    }

    #[test]
    fn logical_and_or() {
        assert_eq!(eval("1 && 1"), Value::Int(1));
        assert_eq!(eval("1 && 0"), Value::Int(0));
        assert_eq!(eval("0 && 1"), Value::Int(0));
        assert_eq!(eval("0 || 1"), Value::Int(1));
        assert_eq!(eval("0 || 0"), Value::Int(0));
    }

    #[test]
    fn only_integer_zero_is_falsy() {
        assert_eq!(eval("\"a\" && \"b\""), Value::Int(1));
        assert_eq!(eval("\"a\" && 0"), Value::Int(0));
        assert_eq!(eval("\"a\" || \"b\""), Value::Int(1));
        assert_eq!(eval("0 || \"a\""), Value::Int(1));
        assert_eq!(eval("[1,2] && 1"), Value::Int(1));
    }

    #[test]
    fn ternary() {
        assert_eq!(eval("1 ? 10 : 20"), Value::Int(10));
        assert_eq!(eval("0 ? 10 : 20"), Value::Int(20));
        assert_eq!(eval("\"s\" ? 10 : 20"), Value::Int(10));
        assert_eq!(eval("[0] ? 10 : 20"), Value::Int(10));
    }

    #[test]
    fn ternary_missing_colon() {
        let e = eval_err("1 ? 2 3");
        assert!(e.message().contains("':'"), "{e}");
    }

    #[test]
    fn divide_by_zero() {
        let e = eval_err("1 / 0");
        assert_eq!(e.message(), "divide by zero");
    }

    #[test]
    fn arithmetic_wraps() {
        assert_eq!(eval("2147483647 + 1"), Value::Int(i32::MIN));
        assert_eq!(eval("-2147483647 - 2"), Value::Int(i32::MAX));
        assert_eq!(eval("65536 * 65536"), Value::Int(0));
    }

    #[test]
    fn wide_literal_truncates() {
        // 2^32 + 5 truncated to 32 bits.
        assert_eq!(eval("4294967301"), Value::Int(5));
    }

    #[test]
    fn list_literal() {
        assert_eq!(eval("[1,2,3]"), ints(&[1, 2, 3]));
        assert_eq!(
            eval("[1,\"a\"]"),
            Value::List(vec![Value::Int(1), Value::Str("a".into())])
        );
    }

    #[test]
    fn empty_list_is_an_error() {
        let e = eval_err("[]");
        assert!(e.message().contains("empty"), "{e}");
    }

    #[test]
    fn range_expansion() {
        assert_eq!(eval("[1..4]"), ints(&[1, 2, 3]));
        assert_eq!(eval("[1..2]"), ints(&[1]));
        assert_eq!(eval("[-2..1]"), ints(&[-2, -1, 0]));
        assert_eq!(eval("[0, 2..4, 9]"), ints(&[0, 2, 3, 9]));
    }

    #[test]
    fn range_requires_increasing_numbers() {
        assert!(eval_str("[3..3]", None).is_err());
        assert!(eval_str("[4..1]", None).is_err());
        assert!(eval_str("[\"a\"..2]", None).is_err());
    }

    #[test]
    fn range_limit() {
        let limits = Limits {
            max_range: 10,
            ..Limits::default()
        };
        assert!(eval_region("[1..100]", 0, None, &limits).is_err());
        assert!(eval_region("[1..11]", 0, None, &limits).is_ok());
    }

    #[test]
    fn map_over_list() {
        assert_eq!(eval("[1,2,3]{$*10}"), ints(&[10, 20, 30]));
        assert_eq!(eval("[1..4]{$+1}"), ints(&[2, 3, 4]));
    }

    #[test]
    fn map_over_scalar() {
        assert_eq!(eval("5{$*2}"), Value::Int(10));
        assert_eq!(eval("\"x\"{$}"), Value::Str("x".into()));
    }

    #[test]
    fn map_nests_inside_body() {
        // The inner map binds $ to each element of [10,20]; the outer
        // binding is restored for the following iteration.
        assert_eq!(
            eval("[1,2]{[10,20]{$+1}}"),
            Value::List(vec![ints(&[11, 21]), ints(&[11, 21])])
        );
    }

    #[test]
    fn dollar_restored_after_nested_map() {
        // $ + 0 after the inner map still sees the outer element.
        assert_eq!(eval("[1,2]{ (3{$*100}) + $ }"), ints(&[301, 302]));
    }

    #[test]
    fn dollar_unbound_is_an_error() {
        let e = eval_err("$ + 1");
        assert!(e.message().contains("'$'"), "{e}");
    }

    #[test]
    fn map_body_must_close() {
        let e = eval_err("[1,2]{$*2");
        assert!(e.message().contains("'}'"), "{e}");
    }

    #[test]
    fn ternary_branches_are_full_expressions() {
        assert_eq!(eval("1 ? [1,2]{$*2} : 0"), ints(&[2, 4]));
    }

    #[test]
    fn variable_lookup() {
        let mut host = MapHost::new().var("abcd", 5);
        assert_eq!(eval_str("abcd", Some(&mut host)).unwrap(), Value::Int(5));
        assert_eq!(eval_str("abcd * 2", Some(&mut host)).unwrap(), Value::Int(10));
    }

    #[test]
    fn missing_variable() {
        let mut host = MapHost::new();
        let e = eval_str("nosuch", Some(&mut host)).unwrap_err();
        assert!(e.message().contains("not defined"), "{e}");
    }

    #[test]
    fn variable_without_host() {
        let e = eval_err("abcd");
        assert!(e.message().contains("host"), "{e}");
    }

    #[test]
    fn function_call() {
        let mut host = MapHost::new().func("succ", |args| match args[0] {
            Value::Int(n) => Ok(Value::Int(n + 1)),
            _ => Err("expected a number".into()),
        });
        assert_eq!(eval_str("succ(7)", Some(&mut host)).unwrap(), Value::Int(8));
    }

    #[test]
    fn function_failure_is_reported() {
        let mut host = MapHost::new().func("boom", |_| Err("no good".into()));
        let e = eval_str("boom(1)", Some(&mut host)).unwrap_err();
        assert!(e.message().contains("no good"), "{e}");
    }

    #[test]
    fn empty_argument_list_is_an_error() {
        let mut host = MapHost::new().func("f", |_| Ok(Value::Int(0)));
        assert!(eval_str("f()", Some(&mut host)).is_err());
    }

    #[test]
    fn both_sides_of_logic_always_evaluated() {
        use std::cell::Cell;
        use std::rc::Rc;

        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let mut host = MapHost::new().func("tick", move |_| {
            h.set(h.get() + 1);
            Ok(Value::Int(1))
        });
        assert_eq!(
            eval_str("0 && tick(1)", Some(&mut host)).unwrap(),
            Value::Int(0)
        );
        assert_eq!(hits.get(), 1);
        assert_eq!(
            eval_str("1 || tick(1)", Some(&mut host)).unwrap(),
            Value::Int(1)
        );
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn both_ternary_branches_always_evaluated() {
        use std::cell::Cell;
        use std::rc::Rc;

        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let mut host = MapHost::new().func("tick", move |args| {
            h.set(h.get() + 1);
            Ok(args[0].clone())
        });
        assert_eq!(
            eval_str("1 ? tick(10) : tick(20)", Some(&mut host)).unwrap(),
            Value::Int(10)
        );
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn string_escapes_keep_second_byte() {
        assert_eq!(eval("\"a\\nb\""), Value::Str("anb".into()));
        assert_eq!(eval("\"a\\\"b\""), Value::Str("a\"b".into()));
        assert_eq!(eval("\"a\\\\b\""), Value::Str("a\\b".into()));
        // Unrecognised escapes keep both bytes.
        assert_eq!(eval("\"a\\xb\""), Value::Str("a\\xb".into()));
    }

    #[test]
    fn unterminated_string() {
        let e = eval_err("\"abc");
        assert!(e.message().contains("terminated"), "{e}");
    }

    #[test]
    fn lone_prefix_bytes_are_rejected() {
        for src in ["1 = 2", "1 & 2", "1 | 2", "1 . 2"] {
            let (val, end) = eval_region(src, 0, None, &Limits::default()).unwrap();
            // The expression stops before the malformed operator; the
            // expander would then reject the trailing byte.
            assert_eq!(val, Value::Int(1), "src={src:?}");
            assert_eq!(end, 2, "src={src:?}");
        }
    }

    #[test]
    fn region_reports_end_offset() {
        let (val, end) = eval_region("1+2`rest", 0, None, &Limits::default()).unwrap();
        assert_eq!(val, Value::Int(3));
        assert_eq!(end, 3);

        // Trailing whitespace before the terminator is skipped.
        let (_, end) = eval_region("1+2  `x", 0, None, &Limits::default()).unwrap();
        assert_eq!(end, 5);
    }

    #[test]
    fn region_starts_mid_source() {
        let (val, end) = eval_region("ab`3*3`cd", 3, None, &Limits::default()).unwrap();
        assert_eq!(val, Value::Int(9));
        assert_eq!(end, 6);
    }

    #[test]
    fn diagnostics_carry_region_relative_location() {
        // The region starts at offset 3; the failing expression anchors its
        // diagnostic at its own first token, so the location is (1,1)
        // regardless of where the region sits in the template.
        let err = eval_region("xx`1 /\n0`", 3, None, &Limits::default()).unwrap_err();
        match err {
            Error::Interp { line, col, .. } => {
                assert_eq!((line, col), (1, 1));
            }
            other => unreachable!("{other:?}"),
        }
        // A parse error deeper in the region reports the scanner position.
        let err = eval_region("xx`1 +\n)`", 3, None, &Limits::default()).unwrap_err();
        match err {
            Error::Interp { line, col, .. } => {
                assert_eq!((line, col), (2, 1));
            }
            other => unreachable!("{other:?}"),
        }
    }

    #[test]
    fn ternary_range_and_map_in_one_list() {
        assert_eq!(
            eval("[ 1==1 ? 2:3 ..5 , 1{$*100}]"),
            ints(&[2, 3, 4, 100])
        );
    }
}
