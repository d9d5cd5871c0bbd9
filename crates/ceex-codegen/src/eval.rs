//! Host-expression evaluation and pattern matching.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use ceex_parser::ast::{
    BinaryOp, ExprKind, Expression, Pattern, PatternKind, StringPart, UnaryOp,
};

use crate::error::RenderError;
use crate::safe::Safe;
use crate::value::{range_items, Assigns, Value};

/// Local variables bound by generators and `:let`.
pub type Vars = BTreeMap<String, Value>;

/// Evaluation environment: the template assigns plus the variables in scope.
#[derive(Debug, Clone)]
pub struct Env {
    pub assigns: Arc<Assigns>,
    pub vars: Vars,
}

impl Env {
    pub fn new(assigns: Arc<Assigns>) -> Self {
        Self {
            assigns,
            vars: Vars::new(),
        }
    }

    /// Match `value` against `pattern`, returning the extended environment on success.
    pub fn bind(&self, pattern: &Pattern, value: &Value) -> Result<Option<Env>, RenderError> {
        let mut bound = Vars::new();
        if !match_pattern(&pattern.kind, value, &mut bound)? {
            return Ok(None);
        }
        let mut env = self.clone();
        env.vars.extend(bound);
        Ok(Some(env))
    }

    pub fn eval(&self, expr: &Expression) -> Result<Value, RenderError> {
        match &expr.kind {
            ExprKind::Nil => Ok(Value::Nil),
            ExprKind::Boolean(b) => Ok(Value::Bool(*b)),
            ExprKind::Integer(n) => Ok(Value::Int(*n)),
            ExprKind::Float(n) => Ok(Value::Float(*n)),
            ExprKind::String(s) => Ok(Value::Str(s.clone())),
            ExprKind::Atom(s) => Ok(Value::Atom(s.clone())),
            ExprKind::Interpolated(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        StringPart::Literal(s) => out.push_str(s),
                        StringPart::Code(code) => out.push_str(&self.eval(code)?.to_text()?),
                    }
                }
                Ok(Value::Str(out))
            }
            ExprKind::Assign(name) => self.assign(name),
            ExprKind::Variable(name) => {
                self.vars
                    .get(name)
                    .cloned()
                    .ok_or_else(|| RenderError::UndefinedVariable { name: name.clone() })
            }
            ExprKind::List(items) => Ok(Value::List(self.eval_all(items)?)),
            ExprKind::Tuple(items) => Ok(Value::Tuple(self.eval_all(items)?)),
            ExprKind::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    map.insert(self.eval(key)?.as_key()?, self.eval(value)?);
                }
                Ok(Value::Map(map))
            }
            ExprKind::Unary { op, operand } => unary(*op, self.eval(operand)?),
            ExprKind::Binary { left, op, right } => self.binary(left, *op, right),
            ExprKind::Field { object, field } => field_access(self.eval(object)?, field),
            ExprKind::Index { object, key } => index_access(self.eval(object)?, &self.eval(key)?),
            ExprKind::Call {
                function,
                arguments,
            } if function == "render_slot" => call(function, self.slot_arguments(arguments)?),
            ExprKind::Call {
                function,
                arguments,
            } => call(function, self.eval_all(arguments)?),
        }
    }

    /// A slot the caller never supplied is an empty slot, not a missing assign.
    fn slot_arguments(&self, arguments: &[Expression]) -> Result<Vec<Value>, RenderError> {
        if let Some(Expression {
            kind: ExprKind::Assign(name),
            ..
        }) = arguments.first()
        {
            if !self.assigns.contains_key(name) {
                return Err(RenderError::NoInnerBlock { slot: name.clone() });
            }
        }
        self.eval_all(arguments)
    }

    fn eval_all(&self, items: &[Expression]) -> Result<Vec<Value>, RenderError> {
        items.iter().map(|e| self.eval(e)).collect()
    }

    fn assign(&self, name: &str) -> Result<Value, RenderError> {
        match self.assigns.get(name) {
            Some(value) => Ok(value.clone()),
            None => {
                let keys: Vec<String> = self.assigns.keys().map(|k| format!(":{k}")).collect();
                Err(RenderError::MissingAssign {
                    name: name.to_string(),
                    available: format!("[{}]", keys.join(", ")),
                })
            }
        }
    }

    fn binary(
        &self,
        left: &Expression,
        op: BinaryOp,
        right: &Expression,
    ) -> Result<Value, RenderError> {
        let lhs = self.eval(left)?;

        match op {
            BinaryOp::And => {
                return if lhs.is_truthy() { self.eval(right) } else { Ok(lhs) };
            }
            BinaryOp::Or => {
                return if lhs.is_truthy() { Ok(lhs) } else { self.eval(right) };
            }
            BinaryOp::StrictAnd | BinaryOp::StrictOr => {
                let Value::Bool(b) = lhs else {
                    return Err(RenderError::bad_argument(format!(
                        "expected a boolean on left-side of \"{}\", got: {lhs}",
                        op.symbol()
                    )));
                };
                return match (op, b) {
                    (BinaryOp::StrictAnd, false) => Ok(Value::Bool(false)),
                    (BinaryOp::StrictOr, true) => Ok(Value::Bool(true)),
                    _ => self.eval(right),
                };
            }
            _ => {}
        }

        let rhs = self.eval(right)?;
        strict_binary(op, lhs, rhs)
    }
}

/// Operators that evaluate both operands.
fn strict_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, RenderError> {
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            arithmetic(op, &lhs, &rhs)
        }
        BinaryOp::Eq => Ok(Value::Bool(lhs.compare(&rhs) == Ordering::Equal)),
        BinaryOp::Neq => Ok(Value::Bool(lhs.compare(&rhs) != Ordering::Equal)),
        BinaryOp::StrictEq => Ok(Value::Bool(lhs.strict_eq(&rhs))),
        BinaryOp::StrictNeq => Ok(Value::Bool(!lhs.strict_eq(&rhs))),
        BinaryOp::Lt => Ok(Value::Bool(lhs.compare(&rhs) == Ordering::Less)),
        BinaryOp::Gt => Ok(Value::Bool(lhs.compare(&rhs) == Ordering::Greater)),
        BinaryOp::Lte => Ok(Value::Bool(lhs.compare(&rhs) != Ordering::Greater)),
        BinaryOp::Gte => Ok(Value::Bool(lhs.compare(&rhs) != Ordering::Less)),
        BinaryOp::Concat => match (lhs, rhs) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
            (a, b) => Err(RenderError::bad_argument(format!(
                "expected binary arguments for <>, got: {a} <> {b}"
            ))),
        },
        BinaryOp::ListConcat => match (lhs, rhs) {
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (a, b) => Err(RenderError::bad_argument(format!(
                "expected list arguments for ++, got: {a} ++ {b}"
            ))),
        },
        BinaryOp::Range => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Range(a, b)),
            (a, b) => Err(RenderError::bad_argument(format!(
                "ranges (first..last) expect both sides to be integers, got: {a}..{b}"
            ))),
        },
        BinaryOp::In => membership(&lhs, &rhs).map(Value::Bool),
        BinaryOp::And | BinaryOp::StrictAnd => Ok(if lhs.is_truthy() { rhs } else { lhs }),
        BinaryOp::Or | BinaryOp::StrictOr => Ok(if lhs.is_truthy() { lhs } else { rhs }),
    }
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, RenderError> {
    match (op, value) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::StrictNot, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::StrictNot, v) => Err(RenderError::bad_argument(format!(
            "argument error: not {v}, expected a boolean"
        ))),
        (UnaryOp::Neg, Value::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| RenderError::bad_argument("integer overflow in -/1")),
        (UnaryOp::Neg, Value::Float(n)) => Ok(Value::Float(-n)),
        (UnaryOp::Neg, v) => Err(RenderError::bad_argument(format!(
            "bad argument in arithmetic expression: -{v}"
        ))),
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, RenderError> {
    let bad = || {
        RenderError::bad_argument(format!(
            "bad argument in arithmetic expression: {lhs} {} {rhs}",
            op.symbol()
        ))
    };

    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) if op != BinaryOp::Div => {
            let result = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Sub => a.checked_sub(*b),
                _ => a.checked_mul(*b),
            };
            result.map(Value::Int).ok_or_else(bad)
        }
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (a, b) = (to_f64(lhs), to_f64(rhs));
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                _ if b == 0.0 => return Err(bad()),
                _ => a / b,
            };
            Ok(Value::Float(result))
        }
        _ => Err(bad()),
    }
}

fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Int(n) => *n as f64,
        Value::Float(n) => *n,
        _ => 0.0,
    }
}

fn membership(item: &Value, collection: &Value) -> Result<bool, RenderError> {
    match collection {
        Value::List(items) => Ok(items.iter().any(|v| v.strict_eq(item))),
        Value::Range(first, last) => Ok(match item {
            Value::Int(n) => (*first.min(last)..=*first.max(last)).contains(n),
            _ => false,
        }),
        Value::Map(map) => Ok(match item {
            Value::Tuple(pair) if pair.len() == 2 => pair[0]
                .as_key()
                .ok()
                .and_then(|k| map.get(&k))
                .is_some_and(|v| v.strict_eq(&pair[1])),
            _ => false,
        }),
        other => Err(RenderError::NotEnumerable {
            value: other.to_string(),
        }),
    }
}

fn field_access(object: Value, field: &str) -> Result<Value, RenderError> {
    let found = match &object {
        Value::Map(map) => map.get(field).cloned(),
        Value::SlotEntry(entry) => entry.attrs.get(field).cloned(),
        Value::Nil => None,
        other => {
            return Err(RenderError::bad_argument(format!(
                "cannot access field .{field} on {}: {other}",
                other.type_name()
            )))
        }
    };

    found.ok_or_else(|| RenderError::KeyNotFound {
        key: Value::atom(field).to_string(),
        value: object.to_string(),
    })
}

fn index_access(object: Value, key: &Value) -> Result<Value, RenderError> {
    match &object {
        Value::Nil => Ok(Value::Nil),
        Value::Map(map) => Ok(map.get(&key.as_key()?).cloned().unwrap_or(Value::Nil)),
        Value::SlotEntry(entry) => Ok(entry.attrs.get(&key.as_key()?).cloned().unwrap_or(Value::Nil)),
        Value::List(items) => Ok(items
            .iter()
            .find_map(|item| match item {
                Value::Tuple(pair) if pair.len() == 2 && pair[0].strict_eq(key) => {
                    Some(pair[1].clone())
                }
                _ => None,
            })
            .unwrap_or(Value::Nil)),
        other => Err(RenderError::bad_argument(format!(
            "cannot index {other} with {key}"
        ))),
    }
}

// =========================================================================
// Functions
// =========================================================================

fn call(function: &str, args: Vec<Value>) -> Result<Value, RenderError> {
    let undefined = || RenderError::UndefinedFunction {
        name: format!("{function}/{}", args.len()),
    };

    match (function, args.as_slice()) {
        ("rem" | "div", [a, b]) => integer_division(function, a, b),
        ("abs", [Value::Int(n)]) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| RenderError::bad_argument("integer overflow in abs/1")),
        ("abs", [Value::Float(n)]) => Ok(Value::Float(n.abs())),
        ("max", [a, b]) => Ok((if b.compare(a) == Ordering::Greater { b } else { a }).clone()),
        ("min", [a, b]) => Ok((if b.compare(a) == Ordering::Less { b } else { a }).clone()),
        ("length", [Value::List(items)]) => Ok(Value::Int(items.len() as i64)),
        ("length", [Value::Slot(slot)]) => Ok(Value::Int(slot.entries.len() as i64)),
        ("hd", [Value::List(items)]) if !items.is_empty() => Ok(items[0].clone()),
        ("tl", [Value::List(items)]) if !items.is_empty() => Ok(Value::List(items[1..].to_vec())),
        ("elem", [Value::Tuple(items), Value::Int(i)]) => usize::try_from(*i)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .ok_or_else(|| RenderError::bad_argument(format!("index {i} out of range in elem/2"))),
        ("is_nil", [v]) => Ok(Value::Bool(matches!(v, Value::Nil))),
        ("to_string", [v]) => Ok(Value::Str(v.to_text()?)),
        ("inspect", [v]) => Ok(Value::Str(v.to_string())),
        ("raw", [Value::Safe(s)]) => Ok(Value::Safe(s.clone())),
        ("raw", [v]) => Ok(Value::Safe(Safe::raw(v.to_text()?))),
        ("render_slot", [slot]) => render_slot(slot, Value::Nil),
        ("render_slot", [slot, arg]) => render_slot(slot, arg.clone()),

        ("String.upcase", [Value::Str(s)]) => Ok(Value::Str(s.to_uppercase())),
        ("String.downcase", [Value::Str(s)]) => Ok(Value::Str(s.to_lowercase())),
        ("String.trim", [Value::Str(s)]) => Ok(Value::Str(s.trim().to_string())),
        ("String.length", [Value::Str(s)]) => Ok(Value::Int(s.chars().count() as i64)),

        ("Enum.count", [v]) => Ok(Value::Int(enum_count(v)?)),
        ("Enum.join", [v]) => enum_join(v, ""),
        ("Enum.join", [v, Value::Str(sep)]) => enum_join(v, sep),
        ("Enum.reverse", [v]) => {
            let mut items = v.enumerate()?;
            items.reverse();
            Ok(Value::List(items))
        }
        ("Enum.sum", [v]) => v
            .enumerate()?
            .iter()
            .try_fold(Value::Int(0), |acc, item| arithmetic(BinaryOp::Add, &acc, item)),
        ("Enum.at", [v, Value::Int(i)]) => {
            let items = v.enumerate()?;
            let index = if *i < 0 { items.len() as i64 + i } else { *i };
            Ok(usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Nil))
        }

        ("Map.get", [map, key]) => map_get(map, key, Value::Nil),
        ("Map.get", [map, key, default]) => map_get(map, key, default.clone()),

        ("Integer.to_string", [Value::Int(n)]) => Ok(Value::Str(n.to_string())),

        (name, args) if is_builtin(name) => Err(RenderError::bad_argument(format!(
            "bad argument in {name}/{}: {}",
            args.len(),
            args.iter().map(Value::to_string).collect::<Vec<_>>().join(", ")
        ))),
        _ => Err(undefined()),
    }
}

const BUILTINS: &[(&str, &[usize])] = &[
    ("rem", &[2]),
    ("div", &[2]),
    ("abs", &[1]),
    ("max", &[2]),
    ("min", &[2]),
    ("length", &[1]),
    ("hd", &[1]),
    ("tl", &[1]),
    ("elem", &[2]),
    ("is_nil", &[1]),
    ("to_string", &[1]),
    ("inspect", &[1]),
    ("raw", &[1]),
    ("render_slot", &[1, 2]),
    ("String.upcase", &[1]),
    ("String.downcase", &[1]),
    ("String.trim", &[1]),
    ("String.length", &[1]),
    ("Enum.count", &[1]),
    ("Enum.join", &[1, 2]),
    ("Enum.reverse", &[1]),
    ("Enum.sum", &[1]),
    ("Enum.at", &[2]),
    ("Map.get", &[2, 3]),
    ("Integer.to_string", &[1]),
];

fn is_builtin(name: &str) -> bool {
    BUILTINS.iter().any(|(n, _)| *n == name)
}

fn integer_division(function: &str, a: &Value, b: &Value) -> Result<Value, RenderError> {
    let (Value::Int(a), Value::Int(b)) = (a, b) else {
        return Err(RenderError::bad_argument(format!(
            "bad argument in arithmetic expression: {function}({a}, {b})"
        )));
    };
    let result = if function == "rem" {
        a.checked_rem(*b)
    } else {
        a.checked_div(*b)
    };
    result.map(Value::Int).ok_or_else(|| {
        RenderError::bad_argument(format!(
            "bad argument in arithmetic expression: {function}({a}, {b})"
        ))
    })
}

fn enum_count(value: &Value) -> Result<i64, RenderError> {
    match value {
        Value::Range(first, last) => {
            let count = (i128::from(*first) - i128::from(*last)).unsigned_abs() + 1;
            i64::try_from(count).map_err(|_| {
                RenderError::bad_argument(format!(
                    "range {first}..{last} has too many elements to count"
                ))
            })
        }
        other => Ok(other.enumerate()?.len() as i64),
    }
}

fn enum_join(value: &Value, separator: &str) -> Result<Value, RenderError> {
    let parts = value
        .enumerate()?
        .iter()
        .map(Value::to_text)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Str(parts.join(separator)))
}

fn map_get(map: &Value, key: &Value, default: Value) -> Result<Value, RenderError> {
    match map {
        Value::Map(entries) => Ok(entries.get(&key.as_key()?).cloned().unwrap_or(default)),
        other => Err(RenderError::bad_argument(format!(
            "expected a map, got: {other}"
        ))),
    }
}

fn render_slot(slot: &Value, arg: Value) -> Result<Value, RenderError> {
    let rendered = match slot {
        Value::Nil => Safe::new(),
        Value::Slot(slot) => slot.render(arg)?,
        Value::SlotEntry(entry) => entry.render(arg)?,
        Value::List(items) => {
            let mut out = Safe::new();
            for item in items {
                match item {
                    Value::SlotEntry(entry) => out.append(entry.render(arg.clone())?),
                    other => {
                        return Err(RenderError::bad_argument(format!(
                            "render_slot/2 expects slot entries, got: {other}"
                        )))
                    }
                }
            }
            out
        }
        other => {
            return Err(RenderError::bad_argument(format!(
                "render_slot/2 expects a slot, got: {other}"
            )))
        }
    };
    Ok(Value::Safe(rendered))
}

// =========================================================================
// Patterns
// =========================================================================

/// Structural match. Variables bound twice in one pattern must agree.
fn match_pattern(pattern: &PatternKind, value: &Value, bound: &mut Vars) -> Result<bool, RenderError> {
    match (pattern, value) {
        (PatternKind::Wildcard, _) => Ok(true),
        (PatternKind::Variable(name), value) => match bound.get(name) {
            Some(existing) => Ok(existing.strict_eq(value)),
            None => {
                bound.insert(name.clone(), value.clone());
                Ok(true)
            }
        },
        (PatternKind::Literal(expr), value) => {
            let literal = Env::new(Arc::default()).eval(expr)?;
            Ok(literal.strict_eq(value))
        }
        (PatternKind::Tuple(patterns), Value::Tuple(items)) => {
            match_all(patterns, items, bound)
        }
        (PatternKind::List { items: patterns, tail }, Value::List(items)) => match tail {
            None => match_all(patterns, items, bound),
            Some(tail) if items.len() >= patterns.len() => {
                let (head, rest) = items.split_at(patterns.len());
                Ok(match_all(patterns, head, bound)?
                    && match_pattern(tail, &Value::List(rest.to_vec()), bound)?)
            }
            Some(_) => Ok(false),
        },
        (PatternKind::List { items, tail: None }, Value::Range(first, last)) => {
            let values: Vec<Value> = range_items(*first, *last)
                .take(items.len() + 1)
                .map(Value::Int)
                .collect();
            if values.len() != items.len() {
                return Ok(false);
            }
            match_all(items, &values, bound)
        }
        (PatternKind::Map(entries), Value::Map(map)) => {
            for (key, pattern) in entries {
                match map.get(key) {
                    Some(v) if match_pattern(pattern, v, bound)? => {}
                    _ => return Ok(false),
                }
            }
            Ok(true)
        }
        (PatternKind::Map(entries), Value::SlotEntry(entry)) => {
            for (key, pattern) in entries {
                match entry.attrs.get(key) {
                    Some(v) if match_pattern(pattern, v, bound)? => {}
                    _ => return Ok(false),
                }
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn match_all(patterns: &[PatternKind], items: &[Value], bound: &mut Vars) -> Result<bool, RenderError> {
    if patterns.len() != items.len() {
        return Ok(false);
    }
    for (pattern, item) in patterns.iter().zip(items) {
        if !match_pattern(pattern, item, bound)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ceex_lexer::Position;
    use ceex_parser::expr_parser::ExprParser;
    use pretty_assertions::assert_eq;

    fn env(assigns: &[(&str, Value)]) -> Env {
        let assigns: Assigns = assigns
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Env::new(Arc::new(assigns))
    }

    fn eval_in(env: &Env, source: &str) -> Result<Value, RenderError> {
        let expr = ExprParser::parse(source, Position::default()).unwrap();
        env.eval(&expr)
    }

    fn eval(source: &str) -> Value {
        eval_in(&env(&[]), source).unwrap()
    }

    fn pattern(source: &str) -> Pattern {
        ExprParser::parse_pattern(source, Position::default()).unwrap()
    }

    // =========================================================================
    // Operators
    // =========================================================================

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3"), Value::Int(7));
        assert_eq!(eval("7 / 2"), Value::Float(3.5));
        assert_eq!(eval("4 / 2"), Value::Float(2.0));
        assert_eq!(eval("1 + 0.5"), Value::Float(1.5));
        assert_eq!(eval("-3 + 1"), Value::Int(-2));
    }

    #[test]
    fn test_division_by_zero() {
        let err = eval_in(&env(&[]), "1 / 0").unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad argument in arithmetic expression: 1 / 0"
        );
    }

    #[test]
    fn test_comparison() {
        assert_eq!(eval("1 == 1.0"), Value::Bool(true));
        assert_eq!(eval("1 === 1.0"), Value::Bool(false));
        assert_eq!(eval("1 < :a"), Value::Bool(true));
        assert_eq!(eval("\"b\" >= \"a\""), Value::Bool(true));
    }

    #[test]
    fn test_short_circuit_returns_operand() {
        assert_eq!(eval("nil || \"x\""), Value::str("x"));
        assert_eq!(eval("1 && 2"), Value::Int(2));
        assert_eq!(eval("false && @missing"), Value::Bool(false));
    }

    #[test]
    fn test_strict_boolean_operators() {
        assert_eq!(eval("true and false"), Value::Bool(false));
        assert_eq!(eval("not true"), Value::Bool(false));
        assert!(eval_in(&env(&[]), "1 and true").is_err());
        assert!(eval_in(&env(&[]), "not nil").is_err());
    }

    #[test]
    fn test_concat_and_ranges() {
        assert_eq!(eval("\"a\" <> \"b\""), Value::str("ab"));
        assert_eq!(eval("[1] ++ [2]"), Value::from(vec![1i64, 2]));
        assert_eq!(eval("1..3"), Value::Range(1, 3));
        assert_eq!(eval("2 in 1..3"), Value::Bool(true));
        assert_eq!(eval(":b in [:a, :b]"), Value::Bool(true));
        assert_eq!(eval("1.0 in [1]"), Value::Bool(false));
    }

    #[test]
    fn test_interpolation() {
        let env = env(&[("name", Value::str("Ada")), ("n", Value::Int(3))]);
        assert_eq!(
            eval_in(&env, "\"#{@name} has #{@n}\"").unwrap(),
            Value::str("Ada has 3")
        );
    }

    // =========================================================================
    // Assigns, variables and access
    // =========================================================================

    #[test]
    fn test_missing_assign_lists_available() {
        let env = env(&[("b", Value::Nil), ("a", Value::Nil)]);
        assert_eq!(
            eval_in(&env, "@name").unwrap_err().to_string(),
            "assign @name not available in template. Available assigns: [:a, :b]"
        );
    }

    #[test]
    fn test_undefined_variable() {
        assert_eq!(
            eval_in(&env(&[]), "item").unwrap_err(),
            RenderError::UndefinedVariable {
                name: "item".into()
            }
        );
    }

    #[test]
    fn test_field_and_index_access() {
        let user = Value::Map(
            [("name".to_string(), Value::str("Ada"))]
                .into_iter()
                .collect(),
        );
        let env = env(&[("user", user), ("kw", eval("[id: 7]"))]);
        assert_eq!(eval_in(&env, "@user.name").unwrap(), Value::str("Ada"));
        assert_eq!(eval_in(&env, "@user[:name]").unwrap(), Value::str("Ada"));
        assert_eq!(eval_in(&env, "@user[\"age\"]").unwrap(), Value::Nil);
        assert_eq!(eval_in(&env, "@kw[:id]").unwrap(), Value::Int(7));
        assert_eq!(
            eval_in(&env, "@user.age").unwrap_err().to_string(),
            "key :age not found in: %{name: \"Ada\"}"
        );
    }

    #[test]
    fn test_map_literal_keys_collapse() {
        assert_eq!(eval("%{\"a\" => 1, a: 2}[:a]"), Value::Int(2));
    }

    // =========================================================================
    // Functions
    // =========================================================================

    #[test]
    fn test_kernel_functions() {
        assert_eq!(eval("rem(7, 2)"), Value::Int(1));
        assert_eq!(eval("div(7, 2)"), Value::Int(3));
        assert_eq!(eval("max(1, 3)"), Value::Int(3));
        assert_eq!(eval("length([1, 2])"), Value::Int(2));
        assert_eq!(eval("elem({:ok, 5}, 1)"), Value::Int(5));
        assert_eq!(eval("is_nil(nil)"), Value::Bool(true));
        assert_eq!(eval("to_string(1.0)"), Value::str("1.0"));
        assert_eq!(eval("inspect(:ok)"), Value::str(":ok"));
    }

    #[test]
    fn test_module_functions() {
        assert_eq!(eval("String.upcase(\"ab\")"), Value::str("AB"));
        assert_eq!(eval("Enum.join([1, 2, 3], \", \")"), Value::str("1, 2, 3"));
        assert_eq!(eval("Enum.count(1..10)"), Value::Int(10));
        assert_eq!(eval("Enum.sum([1, 2, 3])"), Value::Int(6));
        assert_eq!(eval("Enum.at([1, 2, 3], -1)"), Value::Int(3));
        assert_eq!(eval("Map.get(%{a: 1}, :b, 0)"), Value::Int(0));
        assert_eq!(eval("Integer.to_string(42)"), Value::str("42"));
    }

    #[test]
    fn test_count_of_wide_ranges() {
        assert_eq!(eval("Enum.count(3..-3)"), Value::Int(7));
        assert_eq!(
            eval("Enum.count(0..9223372036854775806)"),
            Value::Int(i64::MAX)
        );
        let err = eval_in(&env(&[]), "Enum.count(-9223372036854775807..9223372036854775807)")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "range -9223372036854775807..9223372036854775807 has too many elements to count"
        );
    }

    #[test]
    fn test_raw_is_not_escaped() {
        let Value::Safe(safe) = eval("raw(\"<b>\")") else {
            panic!("expected safe value");
        };
        assert_eq!(safe.to_string(), "<b>");
    }

    #[test]
    fn test_unknown_function_reports_arity() {
        assert_eq!(
            eval_in(&env(&[]), "frobnicate(1, 2)").unwrap_err(),
            RenderError::UndefinedFunction {
                name: "frobnicate/2".into()
            }
        );
        assert!(matches!(
            eval_in(&env(&[]), "rem(1)"),
            Err(RenderError::BadArgument { .. })
        ));
    }

    // =========================================================================
    // Patterns
    // =========================================================================

    #[test]
    fn test_bind_tuple() {
        let env = env(&[]);
        let value = Value::Tuple(vec![Value::Int(1), Value::str("a")]);
        let bound = env.bind(&pattern("{n, label}"), &value).unwrap().unwrap();
        assert_eq!(bound.vars.get("n"), Some(&Value::Int(1)));
        assert_eq!(bound.vars.get("label"), Some(&Value::str("a")));
    }

    #[test]
    fn test_bind_mismatch() {
        let env = env(&[]);
        assert!(env
            .bind(&pattern("{:ok, x}"), &Value::Tuple(vec![Value::atom("error"), Value::Nil]))
            .unwrap()
            .is_none());
        assert!(env.bind(&pattern("[a, b]"), &eval("[1]")).unwrap().is_none());
    }

    #[test]
    fn test_bind_list_tail_and_map() {
        let env = env(&[]);
        let bound = env.bind(&pattern("[h | t]"), &eval("[1, 2, 3]")).unwrap().unwrap();
        assert_eq!(bound.vars.get("t"), Some(&eval("[2, 3]")));

        let bound = env
            .bind(&pattern("%{name: n}"), &eval("%{name: \"x\", age: 1}"))
            .unwrap()
            .unwrap();
        assert_eq!(bound.vars.get("n"), Some(&Value::str("x")));
    }

    #[test]
    fn test_repeated_variable_must_agree() {
        let env = env(&[]);
        assert!(env.bind(&pattern("{x, x}"), &eval("{1, 1}")).unwrap().is_some());
        assert!(env.bind(&pattern("{x, x}"), &eval("{1, 2}")).unwrap().is_none());
    }
}
