use std::fmt::Display;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::Serialize;

use crate::{
    lex::Operator,
    parse::{Term, to_postfix},
    unit::{self, Unit, round2},
};

/// Largest magnitude that is still reported as an integer.
const INTEGER_LIMIT: f64 = 9.0e18;

/// An amount on the evaluator stack, tagged with its unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackValue {
    pub amount: f64,
    pub units: Option<Unit>,
    /// Set only on the direct result of an ml -> teaspoons conversion, which
    /// renders as two-decimal text. Any arithmetic clears it.
    pub(crate) teaspoon_text: bool,
}

impl StackValue {
    pub fn new(amount: f64, units: Option<Unit>) -> Self {
        StackValue {
            amount,
            units,
            teaspoon_text: false,
        }
    }

    pub fn plain(amount: f64) -> Self {
        StackValue::new(amount, None)
    }

    /// Reads a numeric literal. Only the leading numeric part counts, so
    /// `1.2.3` is `1.2` and a lone `.` is `0`.
    pub fn from_literal(raw: &str, units: Option<Unit>) -> Self {
        StackValue::new(leading_float(raw), units)
    }

    /// Turns a formatted line result back into an amount, so it can be stored
    /// as a variable. Dates become the timestamp of that day's midnight (UTC).
    pub fn from_result(value: &Value, units: Option<&Unit>) -> Self {
        let amount = match value {
            Value::Integer(n) => *n as f64,
            Value::Float(n) => *n,
            Value::Text(text) if units == Some(&Unit::Date) => {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
                    .map_or(0.0, |midnight| midnight.and_utc().timestamp() as f64)
            }
            Value::Text(text) => leading_float(&text.replace(',', "")),
        };
        StackValue::new(amount, units.cloned())
    }
}

/// The result of evaluating a line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    /// Currency amounts, dates and teaspoon quantities.
    Text(String),
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Text(text) => write!(f, "{text}"),
        }
    }
}

/// Evaluates substituted infix terms to a formatted result.
pub fn evaluate(terms: Vec<Term>) -> (Value, Option<Unit>) {
    if let Some(result) = reverse_percentage(&terms) {
        return result;
    }
    format_result(eval_postfix(to_postfix(terms)))
}

/// `X% of what is Y` evaluates to `Y / (X / 100)` in Y's units. X is the
/// first term of the line and Y the term right after the operator; anything
/// missing counts as zero.
fn reverse_percentage(terms: &[Term]) -> Option<(Value, Option<Unit>)> {
    let index = terms
        .iter()
        .position(|term| *term == Term::Op(Operator::OfWhatIs))?;

    let operand = |term: Option<&Term>| match term {
        Some(Term::Value(value)) => value.clone(),
        _ => StackValue::default(),
    };
    let percentage = operand(terms.first()).amount;
    let total = operand(terms.get(index + 1));

    if percentage == 0.0 {
        return Some((Value::Integer(0), total.units));
    }
    let answer = total.amount / (percentage / 100.0);
    let value = if is_integral(answer) {
        Value::Integer(answer as i64)
    } else {
        Value::Float(round2(answer))
    };
    Some((value, total.units))
}

/// Runs postfix terms over a value stack and returns the bottom-most value.
///
/// Operators that find too few operands are skipped; whatever they popped is
/// lost. An empty stack evaluates to a unitless zero.
pub fn eval_postfix(postfix: Vec<Term>) -> StackValue {
    let mut stack: Vec<StackValue> = Vec::new();

    for term in postfix {
        match term {
            Term::Value(value) => stack.push(value),
            Term::Op(Operator::Convert(target)) => {
                let Some(value) = stack.pop() else {
                    continue;
                };
                let (amount, units) = unit::convert(value.amount, value.units.as_ref(), &target);
                stack.push(StackValue {
                    amount,
                    teaspoon_text: units == Unit::Teaspoons,
                    units: Some(units),
                });
            }
            Term::Op(op) => {
                let (Some(rhs), Some(lhs)) = (stack.pop(), stack.pop()) else {
                    continue;
                };
                stack.push(apply(lhs, &op, rhs));
            }
            Term::LeftParen | Term::RightParen => {}
        }
    }

    stack.into_iter().next().unwrap_or_default()
}

fn apply(lhs: StackValue, op: &Operator, rhs: StackValue) -> StackValue {
    if lhs.units == Some(Unit::Date) && *op == Operator::Plus && rhs.units == Some(Unit::Days) {
        return StackValue::new(add_days(lhs.amount, rhs.amount), Some(Unit::Date));
    }

    // `a + b%` scales `a` instead of adding to it.
    if rhs.units == Some(Unit::Percent) && matches!(op, Operator::Plus | Operator::Minus) {
        let ratio = rhs.amount / 100.0;
        let factor = if *op == Operator::Plus {
            1.0 + ratio
        } else {
            1.0 - ratio
        };
        return StackValue::new(lhs.amount * factor, lhs.units);
    }

    let (a, b) = (lhs.amount, rhs.amount);
    let amount = match op {
        Operator::Plus => a + b,
        Operator::Minus => a - b,
        Operator::Star | Operator::Times | Operator::X | Operator::On => a * b,
        Operator::Slash if b == 0.0 => 0.0,
        Operator::Slash => a / b,
        Operator::Percent => floored_mod(a as i64, b as i64) as f64,
        Operator::Caret => a.powf(b),
        // never scheduled as binary operators
        Operator::Equal | Operator::Convert(_) | Operator::OfWhatIs => return lhs,
    };
    StackValue::new(amount, result_units(lhs.units, rhs.units))
}

/// Currency wins from either side, then the left unit, then the right one.
fn result_units(lhs: Option<Unit>, rhs: Option<Unit>) -> Option<Unit> {
    match (lhs, rhs) {
        (Some(lhs), _) if lhs.is_currency() => Some(lhs),
        (_, Some(rhs)) if rhs.is_currency() => Some(rhs),
        (Some(lhs), _) => Some(lhs),
        (None, rhs) => rhs,
    }
}

/// Modulo over floored division: a non-zero result takes the sign of the
/// divisor (`-7 mod 3 == 2`, `7 mod -3 == -2`). A zero divisor returns the
/// dividend unchanged.
pub fn floored_mod(dividend: i64, divisor: i64) -> i64 {
    if divisor == 0 {
        return dividend;
    }
    let rem = dividend.wrapping_rem(divisor);
    if rem != 0 && (rem < 0) != (divisor < 0) {
        rem + divisor
    } else {
        rem
    }
}

/// Advances a timestamp by whole days. Out-of-range dates are left as they are.
fn add_days(timestamp: f64, days: f64) -> f64 {
    DateTime::<Utc>::from_timestamp(timestamp as i64, 0)
        .zip(TimeDelta::try_days(days.trunc() as i64))
        .and_then(|(date, delta)| date.checked_add_signed(delta))
        .map_or(timestamp, |date| date.timestamp() as f64)
}

fn format_result(value: StackValue) -> (Value, Option<Unit>) {
    let amount = value.amount;
    let result = match &value.units {
        Some(Unit::Date) => Value::Text(format_date(amount)),
        Some(Unit::Currency(_)) => Value::Text(format_currency(amount)),
        Some(Unit::Teaspoons) if value.teaspoon_text => {
            let text = number_format(amount);
            if is_integral(amount) && !text.contains(',') {
                Value::Integer(amount as i64)
            } else {
                Value::Text(text)
            }
        }
        _ if is_integral(amount) => Value::Integer(amount as i64),
        _ => Value::Float(amount),
    };
    (result, value.units)
}

fn format_date(timestamp: f64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp as i64, 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .format("%Y-%m-%d")
        .to_string()
}

/// Integral amounts print without a fraction; others with at most 14
/// significant digits.
fn format_currency(amount: f64) -> String {
    if is_integral(amount) {
        return (amount as i64).to_string();
    }
    format!("{amount:.13e}")
        .parse::<f64>()
        .map_or_else(|_| amount.to_string(), |rounded| rounded.to_string())
}

/// Two decimals with `,` between thousands: `1,234.57`.
fn number_format(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut out = String::with_capacity(fixed.len() + whole.len() / 3 + 1);
    if round2(amount) < 0.0 {
        out.push('-');
    }
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out.push('.');
    out.push_str(fraction);
    out
}

fn is_integral(amount: f64) -> bool {
    amount.fract() == 0.0 && amount.abs() < INTEGER_LIMIT
}

fn leading_float(raw: &str) -> f64 {
    let raw = raw.trim();
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in raw.char_indices() {
        match c {
            '-' | '+' if i == 0 => {}
            '0'..='9' => {}
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    raw[..end].parse().unwrap_or(0.0)
}
