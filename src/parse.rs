use crate::{eval::StackValue, lex::Operator};

/// A token after variable substitution, ready for the shunting-yard pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Value(StackValue),
    Op(Operator),
    LeftParen,
    RightParen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assoc {
    Left,
    Right,
}

/// Operators without a binding power (`=`, `of what is`) never reach the output.
fn binding_power(op: &Operator) -> Option<(u8, Assoc)> {
    match op {
        Operator::Plus | Operator::Minus => Some((1, Assoc::Left)),
        Operator::Star
        | Operator::Slash
        | Operator::Percent
        | Operator::Times
        | Operator::X
        | Operator::On => Some((2, Assoc::Left)),
        Operator::Caret => Some((3, Assoc::Right)),
        Operator::Equal | Operator::Convert(_) | Operator::OfWhatIs => None,
    }
}

/// Reorders infix terms into postfix (RPN) order.
///
/// A conversion is written straight to the output, so it applies to whatever
/// the output holds at that point: `2 + 3 cm in m` converts only `3 cm`,
/// while `(2 + 3 cm) in m` converts the sum. Unbalanced parentheses are
/// tolerated and dropped.
pub fn to_postfix(terms: Vec<Term>) -> Vec<Term> {
    let mut output = Vec::with_capacity(terms.len());
    let mut stack: Vec<Term> = Vec::new();

    for term in terms {
        match term {
            Term::Value(_) | Term::Op(Operator::Convert(_)) => output.push(term),
            Term::Op(op) => {
                let Some((bp, assoc)) = binding_power(&op) else {
                    continue;
                };
                while let Some(Term::Op(top)) = stack.last() {
                    let Some((top_bp, _)) = binding_power(top) else {
                        break;
                    };
                    if top_bp > bp || (top_bp == bp && assoc == Assoc::Left) {
                        output.extend(stack.pop());
                    } else {
                        break;
                    }
                }
                stack.push(Term::Op(op));
            }
            Term::LeftParen => stack.push(Term::LeftParen),
            Term::RightParen => {
                while let Some(top) = stack.pop() {
                    if top == Term::LeftParen {
                        break;
                    }
                    output.push(top);
                }
            }
        }
    }

    output.extend(
        stack
            .into_iter()
            .rev()
            .filter(|term| *term != Term::LeftParen),
    );
    output
}
