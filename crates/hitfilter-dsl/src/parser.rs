//! Constraint grammar.
//!
//! ```text
//! expr      := and_expr ("or" and_expr)*
//! and_expr  := primary ("and" primary)*
//! primary   := "(" expr ")" | set_call | comparison
//! set_call  := set_fn "(" operand "," "{" [literal ("," literal)*] "}" ")"
//! comparison:= operand cmp_op literal
//! operand   := ident "." ident | ident "(" ident ")"
//! cmp_op    := "==" | "!=" | "<=" | ">=" | "<" | ">" | "::=" | "!:"
//! literal   := "string" | 'c' | true | false | number
//! ```
//!
//! This is the same text `Expr`'s `Display` produces.

use crate::query::{CompareOp, Expr, Literal, Operand, SetFn};
use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, tag, take_while, take_while1};
use nom::character::complete::{anychar, char as pchar, digit0, digit1, multispace0, none_of, one_of, satisfy};
use nom::combinator::{all_consuming, map, not, opt, recognize, value};
use nom::multi::{many0, separated_list0};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to parse constraint: {message}")]
pub struct QueryParseError {
    pub message: String,
}

pub fn parse_constraint(input: &str) -> Result<Expr, QueryParseError> {
    all_consuming(ws(or_expr))(input)
        .map(|(_, expr)| expr)
        .map_err(|e| QueryParseError {
            message: format!("{e:?}"),
        })
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(ws(keyword("or")), and_expr))(input)?;
    Ok((input, fold(first, rest, Expr::Or)))
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = primary(input)?;
    let (input, rest) = many0(preceded(ws(keyword("and")), primary))(input)?;
    Ok((input, fold(first, rest, Expr::And)))
}

fn fold(first: Expr, rest: Vec<Expr>, combine: fn(Vec<Expr>) -> Expr) -> Expr {
    if rest.is_empty() {
        return first;
    }
    let mut parts = Vec::with_capacity(rest.len() + 1);
    parts.push(first);
    parts.extend(rest);
    combine(parts)
}

fn primary(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        delimited(pchar('('), ws(or_expr), pchar(')')),
        set_call,
        comparison,
    )))(input)
}

fn set_call(input: &str) -> IResult<&str, Expr> {
    let (input, func) = set_fn(input)?;
    let (input, _) = ws(pchar('('))(input)?;
    let (input, operand) = ws(operand)(input)?;
    let (input, _) = ws(pchar(','))(input)?;
    let (input, values) = delimited(
        ws(pchar('{')),
        separated_list0(ws(pchar(',')), ws(literal)),
        ws(pchar('}')),
    )(input)?;
    let (input, _) = ws(pchar(')'))(input)?;
    Ok((
        input,
        Expr::InSet {
            func,
            operand,
            values,
        },
    ))
}

fn set_fn(input: &str) -> IResult<&str, SetFn> {
    alt((
        value(SetFn::StrNotInSet, keyword("strNotInSet")),
        value(SetFn::StrInSet, keyword("strInSet")),
        value(SetFn::LongNotInSet, keyword("longNotInSet")),
        value(SetFn::LongInSet, keyword("longInSet")),
    ))(input)
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    map(
        tuple((ws(operand), ws(compare_op), ws(literal))),
        |(lhs, op, rhs)| Expr::Compare { lhs, op, rhs },
    )(input)
}

fn compare_op(input: &str) -> IResult<&str, CompareOp> {
    alt((
        value(CompareOp::Eq, tag("==")),
        value(CompareOp::Ne, tag("!=")),
        value(CompareOp::Le, tag("<=")),
        value(CompareOp::Ge, tag(">=")),
        value(CompareOp::Matches, tag("::=")),
        value(CompareOp::NotMatches, tag("!:")),
        value(CompareOp::Lt, tag("<")),
        value(CompareOp::Gt, tag(">")),
    ))(input)
}

fn operand(input: &str) -> IResult<&str, Operand> {
    let (input, head) = identifier(input)?;
    alt((
        map(preceded(pchar('.'), identifier), {
            let head = head.clone();
            move |attribute| Operand::Field {
                var: head.clone(),
                attribute,
            }
        }),
        map(
            delimited(ws(pchar('(')), identifier, ws(pchar(')'))),
            move |var| Operand::Call {
                function: head.clone(),
                var,
            },
        ),
    ))(input)
}

// =============================================================================
// Literals
// =============================================================================

fn literal(input: &str) -> IResult<&str, Literal> {
    alt((
        map(string_lit, Literal::Str),
        map(char_lit, Literal::Char),
        value(Literal::Bool(true), keyword("true")),
        value(Literal::Bool(false), keyword("false")),
        number,
    ))(input)
}

fn number(input: &str) -> IResult<&str, Literal> {
    let (rest, text) = recognize(tuple((
        opt(pchar('-')),
        digit1,
        opt(pair(pchar('.'), digit0)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;
    let parsed = if text.contains(|c: char| matches!(c, '.' | 'e' | 'E')) {
        text.parse::<f64>().ok().map(Literal::Double)
    } else {
        text.parse::<i64>().ok().map(Literal::Long)
    };
    match parsed {
        Some(lit) => Ok((rest, lit)),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn string_lit(input: &str) -> IResult<&str, String> {
    let esc = escaped_transform(
        is_not("\\\""),
        '\\',
        alt((
            map(tag("\\"), |_| "\\"),
            map(tag("\""), |_| "\""),
            map(tag("n"), |_| "\n"),
            map(tag("t"), |_| "\t"),
        )),
    );
    map(delimited(pchar('"'), opt(esc), pchar('"')), Option::unwrap_or_default)(input)
}

fn char_lit(input: &str) -> IResult<&str, char> {
    delimited(
        pchar('\''),
        alt((preceded(pchar('\\'), anychar), none_of("'\\"))),
        pchar('\''),
    )(input)
}

// =============================================================================
// Lexical helpers
// =============================================================================

fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(tuple((
            take_while1(is_ident_start),
            take_while(is_ident_continue),
        ))),
        |s: &str| s.to_string(),
    )(input)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(kw), not(satisfy(is_ident_continue)))
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}
