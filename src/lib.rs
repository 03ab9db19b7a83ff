//! Calcdown: a line-oriented calculator with units, percentages, dates and
//! variables shared between the lines of a block.
//!
//! ```
//! let block = calcdown::parse_block("price = $2 + 2\nprice + 8%");
//! let last = block.final_line().unwrap();
//! assert_eq!(last.result.to_string(), "4.32");
//! assert_eq!(last.result_units.as_ref().map(|u| u.label()), Some("USD"));
//! ```

pub mod block;
pub mod eval;
pub mod lex;
pub mod parse;
pub mod unit;

pub use block::{
    BlockEvaluation, Environment, LineEvaluation, StructuredLine, parse_block, parse_block_with,
    parse_line, parse_line_at,
};
pub use eval::{StackValue, Value};
pub use lex::{Lexer, Token, TokenKind, tokenize};
pub use unit::Unit;
