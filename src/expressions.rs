//! Aperture macro variables and arithmetic expressions.
//!
//! Gerber macro expressions support `+`, `-`, `x`/`X` (multiply), `/`, parentheses, unary signs, decimal literals and
//! `$n` variable references. Undefined variables evaluate to 0.

use std::collections::HashMap;

use gerber_types::{MacroBoolean, MacroDecimal, MacroInteger};
use log::trace;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionEvaluationError {
    #[error("Unexpected character '{character}' at {position} in expression '{expression}'")]
    UnexpectedCharacter {
        expression: String,
        character: char,
        position: usize,
    },
    #[error("Unexpected end of expression '{0}'")]
    UnexpectedEnd(String),
    #[error("Unbalanced parentheses in expression '{0}'")]
    UnbalancedParentheses(String),
    #[error("Invalid number '{0}'")]
    InvalidNumber(String),
    #[error("Division by zero in expression '{0}'")]
    DivisionByZero(String),
    #[error("Invalid variable number: {0}, variables start at $1")]
    InvalidVariable(u32),
    #[error("Value {0} is not a valid non-negative integer")]
    InvalidInteger(f64),
}

#[derive(Debug, Default, Clone)]
pub struct MacroContext {
    variables: HashMap<u32, f64>,
}

impl MacroContext {
    pub fn put(&mut self, number: u32, value: f64) -> Result<(), ExpressionEvaluationError> {
        if number == 0 {
            return Err(ExpressionEvaluationError::InvalidVariable(number));
        }
        self.variables.insert(number, value);
        Ok(())
    }

    pub fn get(&self, number: &u32) -> f64 {
        self.variables
            .get(number)
            .copied()
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Variable(u32),
    Plus,
    Minus,
    Multiply,
    Divide,
    Open,
    Close,
}

fn tokenize(expression: &str) -> Result<Vec<Token>, ExpressionEvaluationError> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let character = chars[index];
        match character {
            ' ' | '\t' => {
                index += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                index += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                index += 1;
            }
            'x' | 'X' => {
                tokens.push(Token::Multiply);
                index += 1;
            }
            '/' => {
                tokens.push(Token::Divide);
                index += 1;
            }
            '(' => {
                tokens.push(Token::Open);
                index += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                index += 1;
            }
            '$' => {
                let start = index + 1;
                let mut end = start;
                while end < chars.len() && chars[end].is_ascii_digit() {
                    end += 1;
                }
                let digits: String = chars[start..end].iter().collect();
                let number = digits
                    .parse::<u32>()
                    .map_err(|_| ExpressionEvaluationError::InvalidNumber(format!("${}", digits)))?;
                tokens.push(Token::Variable(number));
                index = end;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = index;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_digit() || chars[end] == '.') {
                    end += 1;
                }
                let literal: String = chars[start..end].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| ExpressionEvaluationError::InvalidNumber(literal.clone()))?;
                tokens.push(Token::Number(value));
                index = end;
            }
            _ => {
                return Err(ExpressionEvaluationError::UnexpectedCharacter {
                    expression: expression.to_string(),
                    character,
                    position: index,
                })
            }
        }
    }

    Ok(tokens)
}

struct Evaluator<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    position: usize,
    context: &'a MacroContext,
}

impl Evaluator<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.position).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        self.position += 1;
        token
    }

    // sum := product (('+' | '-') product)*
    fn sum(&mut self) -> Result<f64, ExpressionEvaluationError> {
        let mut value = self.product()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.next();
                    value += self.product()?;
                }
                Some(Token::Minus) => {
                    self.next();
                    value -= self.product()?;
                }
                _ => return Ok(value),
            }
        }
    }

    // product := unary (('x' | '/') unary)*
    fn product(&mut self) -> Result<f64, ExpressionEvaluationError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Multiply) => {
                    self.next();
                    value *= self.unary()?;
                }
                Some(Token::Divide) => {
                    self.next();
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(ExpressionEvaluationError::DivisionByZero(self.expression.to_string()));
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, ExpressionEvaluationError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.next();
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.next();
                self.unary()
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<f64, ExpressionEvaluationError> {
        match self.next() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::Variable(number)) => Ok(self.context.get(&number)),
            Some(Token::Open) => {
                let value = self.sum()?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    _ => Err(ExpressionEvaluationError::UnbalancedParentheses(
                        self.expression.to_string(),
                    )),
                }
            }
            Some(Token::Close) => Err(ExpressionEvaluationError::UnbalancedParentheses(
                self.expression.to_string(),
            )),
            _ => Err(ExpressionEvaluationError::UnexpectedEnd(self.expression.to_string())),
        }
    }
}

pub fn evaluate_expression(expression: &str, context: &MacroContext) -> Result<f64, ExpressionEvaluationError> {
    let tokens = tokenize(expression)?;
    let mut evaluator = Evaluator {
        expression,
        tokens,
        position: 0,
        context,
    };
    let value = evaluator.sum()?;
    if evaluator.position < evaluator.tokens.len() {
        return Err(match evaluator.peek() {
            Some(Token::Close) => ExpressionEvaluationError::UnbalancedParentheses(expression.to_string()),
            _ => ExpressionEvaluationError::UnexpectedEnd(expression.to_string()),
        });
    }
    trace!("evaluated '{}' = {}", expression, value);
    Ok(value)
}

pub fn macro_decimal_to_f64(
    macro_decimal: &MacroDecimal,
    context: &MacroContext,
) -> Result<f64, ExpressionEvaluationError> {
    match macro_decimal {
        MacroDecimal::Value(value) => Ok(*value),
        MacroDecimal::Variable(variable) => Ok(context.get(variable)),
        MacroDecimal::Expression(expression) => evaluate_expression(expression, context),
    }
}

pub fn macro_decimal_pair_to_f64(
    pair: &(MacroDecimal, MacroDecimal),
    context: &MacroContext,
) -> Result<(f64, f64), ExpressionEvaluationError> {
    Ok((macro_decimal_to_f64(&pair.0, context)?, macro_decimal_to_f64(&pair.1, context)?))
}

pub fn macro_integer_to_u32(
    macro_integer: &MacroInteger,
    context: &MacroContext,
) -> Result<u32, ExpressionEvaluationError> {
    let value = match macro_integer {
        MacroInteger::Value(value) => return Ok(*value),
        MacroInteger::Variable(variable) => context.get(variable),
        MacroInteger::Expression(expression) => evaluate_expression(expression, context)?,
    };
    f64_to_u32(value)
}

pub fn macro_boolean_to_bool(
    macro_boolean: &MacroBoolean,
    context: &MacroContext,
) -> Result<bool, ExpressionEvaluationError> {
    match macro_boolean {
        MacroBoolean::Value(value) => Ok(*value),
        MacroBoolean::Variable(variable) => Ok(context.get(variable) != 0.0),
        MacroBoolean::Expression(expression) => Ok(evaluate_expression(expression, context)? != 0.0),
    }
}

fn f64_to_u32(value: f64) -> Result<u32, ExpressionEvaluationError> {
    let rounded = value.round();
    if !rounded.is_finite() || rounded < 0.0 || rounded > u32::MAX as f64 {
        return Err(ExpressionEvaluationError::InvalidInteger(value));
    }
    Ok(rounded as u32)
}
