use calcdown::{Unit, Value, parse_block, parse_block_with};
use chrono::{DateTime, Utc};

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

#[test]
fn variables_carry_value_and_units_to_later_lines() {
    let block = parse_block("price = $2 + 2\nprice + 8%");
    assert_eq!(block.lines.len(), 2);

    let first = &block.lines[0];
    assert_eq!(first.result, text("4"));
    assert_eq!(first.result_units, Some(Unit::from_label("USD")));
    assert_eq!(first.assigned_variables.get("price"), Some(&text("4")));

    let second = &block.lines[1];
    assert_eq!(second.result, text("4.32"));
    assert_eq!(second.result_units, Some(Unit::from_label("USD")));
    assert!(second.assigned_variables.is_empty());
}

#[test]
fn blank_lines_are_skipped() {
    let block = parse_block("2 + 2\n\n   \n5 * 3");
    let results: Vec<_> = block.lines.iter().map(|line| line.result.clone()).collect();
    assert_eq!(results, vec![Value::Integer(4), Value::Integer(15)]);
    assert_eq!(block.lines[1].expression, "5 * 3");
}

#[test]
fn modulo_between_variables() {
    let block = parse_block("a = 10\nb = 3\na % b");
    let results: Vec<_> = block.lines.iter().map(|line| line.result.clone()).collect();
    assert_eq!(
        results,
        vec![Value::Integer(10), Value::Integer(3), Value::Integer(1)]
    );
}

#[test]
fn running_totals() {
    let block = parse_block(
        "price = $8 times 3\n\
         tax = price + 15%\n\
         total = tax # incl. tax",
    );
    let final_line = block.final_line().expect("three lines");
    assert_eq!(final_line.result, text("27.6"));
    assert_eq!(final_line.assigned_variables.get("total"), Some(&text("27.6")));
}

#[test]
fn reassignment_overrides_earlier_value() {
    let block = parse_block("x = 2\nx = x * 10\nx + 1");
    assert_eq!(
        block.final_line().map(|line| line.result.clone()),
        Some(Value::Integer(21))
    );
}

#[test]
fn unknown_variables_are_zero() {
    let block = parse_block("y + 3\ny = 1");
    assert_eq!(block.lines[0].result, Value::Integer(3));
}

#[test]
fn teaspoon_and_date_variables_can_be_reused() {
    let now = DateTime::<Utc>::from_timestamp(1_709_251_200, 0).expect("2024-03-01");
    let block = parse_block_with(
        "dose = 40 ml in teaspoons\n\
         dose * 2\n\
         due = today + 10 days\n\
         due + 5 days",
        || now,
    );
    let results: Vec<_> = block.lines.iter().map(|line| line.result.clone()).collect();
    assert_eq!(
        results,
        vec![
            text("8.10"),
            Value::Float(16.2),
            text("2024-03-11"),
            text("2024-03-16"),
        ]
    );
    assert_eq!(block.lines[1].result_units, Some(Unit::Teaspoons));
}

#[test]
fn clock_is_sampled_per_line() {
    let mut calls = 0;
    let block = parse_block_with("today\n\ntoday\n1 + 1", || {
        calls += 1;
        DateTime::<Utc>::from_timestamp(calls * 86_400, 0).expect("valid timestamp")
    });
    assert_eq!(calls, 3);
    assert_eq!(block.lines[0].result, text("1970-01-02"));
    assert_eq!(block.lines[1].result, text("1970-01-03"));
}

#[test]
fn final_line_of_an_empty_block_is_none() {
    assert!(parse_block("").final_line().is_none());
    assert!(parse_block("\n  \n").final_line().is_none());
    assert_eq!(
        parse_block("2 + 2").final_line().map(|line| line.result.clone()),
        Some(Value::Integer(4))
    );
}

#[test]
fn structured_block() {
    let block = parse_block("price = $2 + 2\nprice + 8%");
    let json = serde_json::to_value(block.to_structured()).expect("serializable");
    assert_eq!(
        json,
        serde_json::json!([
            {
                "expression": "price = $2 + 2",
                "result": "4",
                "units": "USD",
                "assigned_variables": { "price": "4" }
            },
            { "expression": "price + 8%", "result": "4.32", "units": "USD" }
        ])
    );
}
