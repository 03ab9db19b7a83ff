use std::{
    collections::{BTreeMap, HashMap},
    fmt::Display,
};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    eval::{StackValue, Value, evaluate},
    lex::{Operator, Token, TokenKind, tokenize},
    parse::Term,
    unit::Unit,
};

/// Variables visible to a line. Lives for one block evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    values: HashMap<String, StackValue>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&StackValue> {
        self.values.get(name)
    }

    pub fn define(&mut self, name: impl Into<String>, value: StackValue) {
        self.values.insert(name.into(), value);
    }
}

impl FromIterator<(String, StackValue)> for Environment {
    fn from_iter<I: IntoIterator<Item = (String, StackValue)>>(iter: I) -> Self {
        Environment {
            values: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineEvaluation {
    pub expression: String,
    pub result: Value,
    pub result_units: Option<Unit>,
    pub assigned_variables: BTreeMap<String, Value>,
}

/// Plain form of a line, as handed to presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredLine {
    pub expression: String,
    pub result: Value,
    pub units: Option<Unit>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub assigned_variables: BTreeMap<String, Value>,
}

impl LineEvaluation {
    pub fn to_structured(&self) -> StructuredLine {
        StructuredLine {
            expression: self.expression.clone(),
            result: self.result.clone(),
            units: self.result_units.clone(),
            assigned_variables: self.assigned_variables.clone(),
        }
    }
}

impl Display for LineEvaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} => {}", self.expression, self.result)?;
        if let Some(units) = &self.result_units {
            write!(f, " {units}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockEvaluation {
    pub lines: Vec<LineEvaluation>,
}

impl BlockEvaluation {
    pub fn final_line(&self) -> Option<&LineEvaluation> {
        self.lines.last()
    }

    pub fn to_structured(&self) -> Vec<StructuredLine> {
        self.lines.iter().map(LineEvaluation::to_structured).collect()
    }
}

/// Evaluates one line against `variables`, reading the clock for `today`.
pub fn parse_line(line: &str, variables: &Environment) -> LineEvaluation {
    parse_line_at(line, variables, Utc::now())
}

/// Evaluates one line with `now` as the value of `today`.
///
/// `name = expr` evaluates `expr` and reports `name` in `assigned_variables`.
/// Unknown identifiers evaluate to a unitless zero.
pub fn parse_line_at(line: &str, variables: &Environment, now: DateTime<Utc>) -> LineEvaluation {
    let expression = line.trim();
    let (target, tokens) = split_assignment(tokenize(expression));
    let terms = substitute(tokens, variables, now);
    let (result, result_units) = evaluate(terms);

    let assigned_variables = target
        .map(|name| (name.to_string(), result.clone()))
        .into_iter()
        .collect();

    LineEvaluation {
        expression: expression.to_string(),
        result,
        result_units,
        assigned_variables,
    }
}

/// Evaluates a block top to bottom, skipping blank lines. Each assignment is
/// visible to the lines after it.
pub fn parse_block(text: &str) -> BlockEvaluation {
    parse_block_with(text, Utc::now)
}

/// Like [`parse_block`], calling `now` once per evaluated line.
pub fn parse_block_with(text: &str, mut now: impl FnMut() -> DateTime<Utc>) -> BlockEvaluation {
    let mut variables = Environment::new();
    let mut lines = Vec::new();

    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let evaluation = parse_line_at(line, &variables, now());
        for (name, value) in &evaluation.assigned_variables {
            variables.define(
                name.clone(),
                StackValue::from_result(value, evaluation.result_units.as_ref()),
            );
        }
        lines.push(evaluation);
    }

    BlockEvaluation { lines }
}

/// Finds the first `identifier =` pair and keeps only the tokens after it.
fn split_assignment<'de>(mut tokens: Vec<Token<'de>>) -> (Option<&'de str>, Vec<Token<'de>>) {
    let position = tokens.windows(2).position(|pair| {
        matches!(pair[0].kind, TokenKind::Ident { .. })
            && pair[1].kind == TokenKind::Operator(Operator::Equal)
    });
    match position {
        Some(index) => {
            let name = tokens[index].literal;
            let rest = tokens.split_off(index + 2);
            (Some(name), rest)
        }
        None => (None, tokens),
    }
}

/// Resolves identifiers to values. Error tokens carry no value and are dropped.
fn substitute(tokens: Vec<Token<'_>>, variables: &Environment, now: DateTime<Utc>) -> Vec<Term> {
    tokens
        .into_iter()
        .filter_map(|token| match token.kind {
            TokenKind::Number { units } => {
                Some(Term::Value(StackValue::from_literal(token.literal, units)))
            }
            TokenKind::Ident {
                units: Some(Unit::Date),
            } => Some(Term::Value(StackValue::new(
                now.timestamp() as f64,
                Some(Unit::Date),
            ))),
            TokenKind::Ident { .. } => Some(Term::Value(
                variables.get(token.literal).cloned().unwrap_or_default(),
            )),
            TokenKind::Operator(op) => Some(Term::Op(op)),
            TokenKind::LeftParen => Some(Term::LeftParen),
            TokenKind::RightParen => Some(Term::RightParen),
            TokenKind::Error { .. } => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::Currency;

    #[test]
    fn assignment_is_the_first_identifier_equals_pair() {
        let (target, rest) = split_assignment(tokenize("2 = x = y = 3"));
        assert_eq!(target, Some("x"));
        assert_eq!(rest.len(), 3);
        assert_eq!(rest[0].literal, "y");
    }

    #[test]
    fn no_assignment_keeps_every_token() {
        let (target, rest) = split_assignment(tokenize("= 4"));
        assert_eq!(target, None);
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn substitution_resolves_variables_today_and_unknowns() {
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).expect("valid timestamp");
        let usd = Some(Unit::Currency(Currency::Usd));
        let variables: Environment = [("price".to_string(), StackValue::new(4.0, usd.clone()))]
            .into_iter()
            .collect();

        let terms = substitute(tokenize("price + missing + today"), &variables, now);
        assert_eq!(
            terms,
            vec![
                Term::Value(StackValue::new(4.0, usd)),
                Term::Op(Operator::Plus),
                Term::Value(StackValue::default()),
                Term::Op(Operator::Plus),
                Term::Value(StackValue::new(1_700_000_000.0, Some(Unit::Date))),
            ]
        );
    }

    #[test]
    fn today_ignores_a_variable_of_the_same_name() {
        let now = DateTime::<Utc>::from_timestamp(0, 0).expect("valid timestamp");
        let variables: Environment = [("today".to_string(), StackValue::plain(5.0))]
            .into_iter()
            .collect();
        let line = parse_line_at("today", &variables, now);
        assert_eq!(line.result, Value::Text("1970-01-01".to_string()));
    }

    #[test]
    fn incomplete_of_what_is_leaves_what_as_an_assignment_target() {
        let (target, rest) = split_assignment(tokenize("of what = 5"));
        assert_eq!(target, Some("what"));
        assert_eq!(rest.len(), 1);

        let line = parse_line("of what = 5", &Environment::new());
        assert_eq!(line.result, Value::Integer(5));
        assert_eq!(
            line.assigned_variables.get("what"),
            Some(&Value::Integer(5))
        );
    }

    #[test]
    fn displays_result_with_units() {
        let env = Environment::new();
        assert_eq!(parse_line("$7 * 4", &env).to_string(), "$7 * 4 => 28 USD");
        assert_eq!(parse_line("2 + 2", &env).to_string(), "2 + 2 => 4");
    }
}
