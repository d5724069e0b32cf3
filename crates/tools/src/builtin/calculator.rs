//! `calculator(expression)`: arithmetic evaluation.
//!
//! Grammar: numbers, `+ - * / %`, right-associative `^`, unary minus and
//! parentheses. Evaluated by precedence climbing over a token list.

use ltm_core::error::ToolError;
use ltm_core::tool::SyncTool;

use super::string_arg;

pub struct Calculator;

impl SyncTool for Calculator {
    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports + - * / % ^ and parentheses."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "Expression to evaluate, e.g. '(2 + 3) ^ 2 / 5'"
                }
            },
            "required": ["expression"]
        })
    }

    fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let expression = string_arg(&arguments, "expression")?;
        let value = evaluate(expression).map_err(|reason| ToolError::ExecutionFailed {
            tool_name: "calculator".into(),
            reason,
        })?;
        if value.fract() == 0.0 && value.abs() < 9.0e15 {
            Ok(serde_json::json!(value as i64))
        } else {
            Ok(serde_json::json!(value))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tok {
    Num(f64),
    Op(char),
    Open,
    Close,
}

fn lex(input: &str) -> Result<Vec<Tok>, String> {
    let mut out = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some(&(at, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut end = at;
            while let Some(&(i, d)) = chars.peek() {
                if !(d.is_ascii_digit() || d == '.') {
                    break;
                }
                end = i + d.len_utf8();
                chars.next();
            }
            let text = &input[at..end];
            out.push(Tok::Num(text.parse().map_err(|_| format!("bad number '{text}'"))?));
        } else {
            chars.next();
            out.push(match c {
                '(' => Tok::Open,
                ')' => Tok::Close,
                '+' | '-' | '*' | '/' | '%' | '^' => Tok::Op(c),
                other => return Err(format!("unexpected '{other}' at {at}")),
            });
        }
    }
    Ok(out)
}

/// Binding power and right-associativity of a binary operator.
fn binding(op: char) -> (u8, bool) {
    match op {
        '+' | '-' => (1, false),
        '*' | '/' | '%' => (2, false),
        _ => (3, true),
    }
}

struct Eval {
    toks: Vec<Tok>,
    at: usize,
}

impl Eval {
    fn next(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.at).copied();
        self.at += 1;
        tok
    }

    fn expr(&mut self, min_power: u8) -> Result<f64, String> {
        let mut lhs = self.operand()?;
        while let Some(Tok::Op(op)) = self.toks.get(self.at).copied() {
            let (power, right_assoc) = binding(op);
            if power < min_power {
                break;
            }
            self.at += 1;
            let rhs = self.expr(if right_assoc { power } else { power + 1 })?;
            lhs = apply(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn operand(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Tok::Num(n)) => Ok(n),
            Some(Tok::Op('-')) => Ok(-self.expr(3)?),
            Some(Tok::Open) => {
                let inner = self.expr(1)?;
                match self.next() {
                    Some(Tok::Close) => Ok(inner),
                    _ => Err("missing ')'".into()),
                }
            }
            Some(tok) => Err(format!("unexpected {tok:?}")),
            None => Err("unexpected end of expression".into()),
        }
    }
}

fn apply(op: char, lhs: f64, rhs: f64) -> Result<f64, String> {
    Ok(match op {
        '+' => lhs + rhs,
        '-' => lhs - rhs,
        '*' => lhs * rhs,
        '/' if rhs == 0.0 => return Err("division by zero".into()),
        '/' => lhs / rhs,
        '%' if rhs == 0.0 => return Err("modulo by zero".into()),
        '%' => lhs % rhs,
        _ => lhs.powf(rhs),
    })
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expression: &str) -> Result<f64, String> {
    let mut eval = Eval {
        toks: lex(expression)?,
        at: 0,
    };
    let value = eval.expr(1)?;
    if eval.at < eval.toks.len() {
        return Err(format!("trailing input after token {}", eval.at));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_and_grouping() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
        assert_eq!(evaluate("-2 ^ 2").unwrap(), -4.0);
    }

    #[test]
    fn modulo_and_decimals() {
        assert_eq!(evaluate("17 % 5").unwrap(), 2.0);
        assert!((evaluate("0.1 + 0.2").unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn errors() {
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("1 2").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("2 $ 3").is_err());
    }

    #[test]
    fn tool_formats_integers() {
        let out = Calculator
            .call(serde_json::json!({"expression": "55 * 2"}))
            .unwrap();
        assert_eq!(out, serde_json::json!(110));
        let out = Calculator.call(serde_json::json!({"expression": "10 / 4"})).unwrap();
        assert_eq!(out, serde_json::json!(2.5));
    }

    #[test]
    fn tool_reports_bad_expression() {
        let err = Calculator.call(serde_json::json!({"expression": "1 / 0"})).unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
