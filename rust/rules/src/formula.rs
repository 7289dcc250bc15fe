// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cost and time formula language.
//!
//! Small arithmetic expressions over named variables:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := factor (('*' | '/') factor)*
//! factor  := number | call | ident | '(' expr ')' | '-' factor
//! call    := ident '(' expr (',' expr)* ')'
//! ```
//!
//! Functions: `min`, `max` (one or more arguments), `abs`, `ceil`, `floor`.
//! Formulas serialize as their source text.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit0, digit1, multispace0, one_of},
    combinator::{all_consuming, map, map_res, opt, recognize},
    multi::{fold_many0, many0_count, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::context::FormulaContext;
use crate::error::{Error, Result};

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Min,
    Max,
    Abs,
    Ceil,
    Floor,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "min" => Some(Function::Min),
            "max" => Some(Function::Max),
            "abs" => Some(Function::Abs),
            "ceil" => Some(Function::Ceil),
            "floor" => Some(Function::Floor),
            _ => None,
        }
    }

    fn accepts(self, arity: usize) -> bool {
        match self {
            Function::Min | Function::Max => arity >= 1,
            Function::Abs | Function::Ceil | Function::Floor => arity == 1,
        }
    }
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Var(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

impl Expr {
    fn eval(&self, ctx: &FormulaContext) -> Option<f64> {
        let value = match self {
            Expr::Number(n) => *n,
            Expr::Var(name) => ctx.get(name)?,
            Expr::Neg(inner) => -inner.eval(ctx)?,
            Expr::Add(a, b) => a.eval(ctx)? + b.eval(ctx)?,
            Expr::Sub(a, b) => a.eval(ctx)? - b.eval(ctx)?,
            Expr::Mul(a, b) => a.eval(ctx)? * b.eval(ctx)?,
            Expr::Div(a, b) => a.eval(ctx)? / b.eval(ctx)?,
            Expr::Call(function, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.eval(ctx)?);
                }
                match function {
                    Function::Min => values.into_iter().reduce(f64::min)?,
                    Function::Max => values.into_iter().reduce(f64::max)?,
                    Function::Abs => values[0].abs(),
                    Function::Ceil => values[0].ceil(),
                    Function::Floor => values[0].floor(),
                }
            }
        };
        value.is_finite().then_some(value)
    }

    fn collect_vars<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Var(name) => out.push(name),
            Expr::Neg(inner) => inner.collect_vars(out),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
            Expr::Call(_, args) => args.iter().for_each(|arg| arg.collect_vars(out)),
        }
    }
}

/// A compiled formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidFormula {
            formula: source.to_string(),
            reason,
        };
        let (_, expr) = all_consuming(delimited(multispace0, expr, multispace0))(source)
            .map_err(|e| invalid(e.to_string()))?;
        check_calls(&expr).map_err(invalid)?;
        Ok(Self {
            source: source.trim().to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate; `None` when a variable is unbound or the result is not finite.
    pub fn eval(&self, ctx: &FormulaContext) -> Option<f64> {
        self.expr.eval(ctx)
    }

    /// Variables referenced by the formula, sorted and deduplicated.
    pub fn variables(&self) -> Vec<&str> {
        let mut vars = Vec::new();
        self.expr.collect_vars(&mut vars);
        vars.sort_unstable();
        vars.dedup();
        vars
    }
}

impl TryFrom<String> for Formula {
    type Error = Error;

    fn try_from(source: String) -> Result<Self> {
        Formula::parse(&source)
    }
}

impl From<Formula> for String {
    fn from(formula: Formula) -> Self {
        formula.source
    }
}

fn check_calls(expr: &Expr) -> std::result::Result<(), String> {
    match expr {
        Expr::Number(_) | Expr::Var(_) => Ok(()),
        Expr::Neg(inner) => check_calls(inner),
        Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
            check_calls(a)?;
            check_calls(b)
        }
        Expr::Call(function, args) => {
            if !function.accepts(args.len()) {
                return Err(format!("{function:?} does not take {} argument(s)", args.len()));
            }
            args.iter().try_for_each(check_calls)
        }
    }
}

/// Skip surrounding whitespace
fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Parse number: 12, 0.5, 1.5e3
fn number(input: &str) -> IResult<&str, Expr> {
    map_res(
        recognize(tuple((
            digit1,
            opt(pair(char('.'), digit0)),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |s: &str| s.parse::<f64>().map(Expr::Number),
    )(input)
}

/// Parse identifier: labor_rate, volume_m3
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

/// Parse a variable or a function call
fn name_or_call(input: &str) -> IResult<&str, Expr> {
    let (rest, name) = identifier(input)?;
    let (rest, args) = opt(delimited(
        ws(char('(')),
        separated_list1(ws(char(',')), expr),
        char(')'),
    ))(rest)?;

    match args {
        None => Ok((rest, Expr::Var(name.to_string()))),
        Some(args) => match Function::lookup(name) {
            Some(function) => Ok((rest, Expr::Call(function, args))),
            None => Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Verify,
            ))),
        },
    }
}

fn factor(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        number,
        name_or_call,
        delimited(char('('), expr, char(')')),
        map(preceded(char('-'), factor), |e| Expr::Neg(Box::new(e))),
    )))(input)
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (input, first) = factor(input)?;
    fold_many0(
        pair(one_of("*/"), factor),
        move || first.clone(),
        |acc, (op, rhs)| match op {
            '*' => Expr::Mul(Box::new(acc), Box::new(rhs)),
            _ => Expr::Div(Box::new(acc), Box::new(rhs)),
        },
    )(input)
}

fn expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = term(input)?;
    fold_many0(
        pair(one_of("+-"), term),
        move || first.clone(),
        |acc, (op, rhs)| match op {
            '+' => Expr::Add(Box::new(acc), Box::new(rhs)),
            _ => Expr::Sub(Box::new(acc), Box::new(rhs)),
        },
    )(input)
}
