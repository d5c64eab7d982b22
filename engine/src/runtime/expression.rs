//! Expression evaluation
//!
//! Expressions are compiled with variables resolved to binding slots.
//! Evaluation returns `None` when the expression is undefined for the given
//! bindings (type errors, integer overflow, division by zero); the runtime
//! drops such derivations.

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::value::{Value, ValueType};
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum CompiledExpr {
    Slot(usize),
    Const(Value),
    Binary(BinaryOp, Box<CompiledExpr>, Box<CompiledExpr>),
    Unary(UnaryOp, Box<CompiledExpr>),
}

impl CompiledExpr {
    /// Resolve variables through `slot_of`; `None` if a variable has no slot
    pub fn compile(expr: &Expr, slot_of: &mut impl FnMut(&str) -> Option<usize>) -> Option<Self> {
        Some(match expr {
            Expr::Var(name) => CompiledExpr::Slot(slot_of(name)?),
            Expr::Const(value) => CompiledExpr::Const(value.clone()),
            Expr::Binary(op, left, right) => CompiledExpr::Binary(
                *op,
                Box::new(Self::compile(left, slot_of)?),
                Box::new(Self::compile(right, slot_of)?),
            ),
            Expr::Unary(op, inner) => {
                CompiledExpr::Unary(*op, Box::new(Self::compile(inner, slot_of)?))
            }
        })
    }

    pub fn evaluate(&self, env: &[Option<Value>]) -> Option<Value> {
        match self {
            CompiledExpr::Slot(slot) => env.get(*slot).cloned().flatten(),
            CompiledExpr::Const(value) => Some(value.clone()),
            CompiledExpr::Binary(op, left, right) => {
                let l = left.evaluate(env)?;
                let r = right.evaluate(env)?;
                binary(*op, l, r)
            }
            CompiledExpr::Unary(op, inner) => unary(*op, inner.evaluate(env)?),
        }
    }
}

fn unary(op: UnaryOp, value: Value) -> Option<Value> {
    match (op, value) {
        (UnaryOp::Not, Value::Bool(b)) => Some(Value::Bool(!b)),
        (UnaryOp::Neg, Value::I32(i)) => i.checked_neg().map(Value::I32),
        (UnaryOp::Neg, Value::I64(i)) => i.checked_neg().map(Value::I64),
        (UnaryOp::Neg, Value::F32(f)) => Some(Value::F32(-f)),
        (UnaryOp::Neg, Value::F64(f)) => Some(Value::F64(-f)),
        _ => None,
    }
}

/// Bring two numeric operands to a common type.
///
/// Same-typed operands are untouched. Otherwise any float wins (`f64` over
/// `f32`), and mixed integers meet at `i64`.
fn promote(l: Value, r: Value) -> Option<(Value, Value)> {
    if l.value_type() == r.value_type() {
        return Some((l, r));
    }
    let (lt, rt) = (l.value_type(), r.value_type());
    let numeric = |t: ValueType| t.is_integer() || t.is_float();
    if !numeric(lt) || !numeric(rt) {
        return None;
    }
    if lt == ValueType::F64 || rt == ValueType::F64 {
        return Some((Value::F64(l.as_f64()?), Value::F64(r.as_f64()?)));
    }
    if lt == ValueType::F32 || rt == ValueType::F32 {
        return Some((Value::F32(l.as_f64()? as f32), Value::F32(r.as_f64()? as f32)));
    }
    let widen = |v: Value| match v {
        Value::I32(i) => Some(Value::I64(i as i64)),
        Value::I64(i) => Some(Value::I64(i)),
        Value::USize(u) => i64::try_from(u).ok().map(Value::I64),
        _ => None,
    };
    Some((widen(l)?, widen(r)?))
}

fn binary(op: BinaryOp, l: Value, r: Value) -> Option<Value> {
    match op {
        BinaryOp::And | BinaryOp::Or => match (l, r) {
            (Value::Bool(a), Value::Bool(b)) => Some(Value::Bool(if op == BinaryOp::And {
                a && b
            } else {
                a || b
            })),
            _ => None,
        },
        BinaryOp::Xor => match (l, r) {
            (Value::Bool(a), Value::Bool(b)) => Some(Value::Bool(a ^ b)),
            (l, r) => match promote(l, r)? {
                (Value::I32(a), Value::I32(b)) => Some(Value::I32(a ^ b)),
                (Value::I64(a), Value::I64(b)) => Some(Value::I64(a ^ b)),
                (Value::USize(a), Value::USize(b)) => Some(Value::USize(a ^ b)),
                _ => None,
            },
        },
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            compare(op, l, r)
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(op, l, r)
        }
    }
}

fn compare(op: BinaryOp, l: Value, r: Value) -> Option<Value> {
    let non_numeric = matches!(
        (&l, &r),
        (Value::String(_), Value::String(_))
            | (Value::Char(_), Value::Char(_))
            | (Value::Bool(_), Value::Bool(_))
    );
    let ordering = if non_numeric {
        l.cmp(&r)
    } else {
        match promote(l, r)? {
            (Value::F32(a), Value::F32(b)) => a.partial_cmp(&b)?,
            (Value::F64(a), Value::F64(b)) => a.partial_cmp(&b)?,
            (a, b) => a.cmp(&b),
        }
    };
    let result = match op {
        BinaryOp::Eq => ordering == Ordering::Equal,
        BinaryOp::Ne => ordering != Ordering::Equal,
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Le => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::Ge => ordering != Ordering::Less,
        _ => return None,
    };
    Some(Value::Bool(result))
}

macro_rules! int_arith {
    ($op:expr, $a:expr, $b:expr, $variant:path) => {
        match $op {
            BinaryOp::Add => $a.checked_add($b).map($variant),
            BinaryOp::Sub => $a.checked_sub($b).map($variant),
            BinaryOp::Mul => $a.checked_mul($b).map($variant),
            BinaryOp::Div => $a.checked_div($b).map($variant),
            BinaryOp::Mod => $a.checked_rem($b).map($variant),
            _ => None,
        }
    };
}

macro_rules! float_arith {
    ($op:expr, $a:expr, $b:expr, $variant:path) => {
        match $op {
            BinaryOp::Add => Some($variant($a + $b)),
            BinaryOp::Sub => Some($variant($a - $b)),
            BinaryOp::Mul => Some($variant($a * $b)),
            BinaryOp::Div => Some($variant($a / $b)),
            BinaryOp::Mod => Some($variant($a % $b)),
            _ => None,
        }
    };
}

fn arithmetic(op: BinaryOp, l: Value, r: Value) -> Option<Value> {
    if let (Value::String(a), Value::String(b)) = (&l, &r) {
        return (op == BinaryOp::Add).then(|| {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Value::String(Arc::from(joined))
        });
    }
    match promote(l, r)? {
        (Value::I32(a), Value::I32(b)) => int_arith!(op, a, b, Value::I32),
        (Value::I64(a), Value::I64(b)) => int_arith!(op, a, b, Value::I64),
        (Value::USize(a), Value::USize(b)) => int_arith!(op, a, b, Value::USize),
        (Value::F32(a), Value::F32(b)) => float_arith!(op, a, b, Value::F32),
        (Value::F64(a), Value::F64(b)) => float_arith!(op, a, b, Value::F64),
        _ => None,
    }
}
