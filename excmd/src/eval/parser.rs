//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Expression grammar, from lowest to highest precedence:
//!
//! ```text
//! expr1  expr2 ? expr1 : expr1
//! expr2  expr3 || expr3 ..
//! expr3  expr4 && expr4 ..
//! expr4  expr5 {==,!=,>,>=,<,<=,=~,!~,is,isnot}[#?] expr5
//! expr5  expr6 {+,-,.,..} expr6 ..
//! expr6  expr7 {*,/,%} expr7 ..
//! expr7  {!,-,+} expr7
//! expr8  expr9 [expr1] | expr9 [expr1 : expr1] | expr9(args)
//! expr9  number "string" 'string' [list] &option $VAR @r (expr1) name
//! ```

use nom::IResult;

use crate::error::{e, parse_err, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Concat,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Match,
    NoMatch,
    Is,
    IsNot,
}

/// `#` forces case matching, `?` ignores case, nothing follows 'ignorecase'.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaseRule {
    Option,
    Match,
    Ignore,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(i64),
    Str(String),
    List(Vec<Expr>),
    /// A variable, possibly with a scope prefix such as `g:` or `s:`.
    Var(String),
    /// `&name`, `&l:name` or `&g:name`.
    Option { name: String, scope: Option<char> },
    Env(String),
    Register(char),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Plus(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Compare(CmpOp, CaseRule, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Slice(Box<Expr>, Option<Box<Expr>>, Option<Box<Expr>>),
    Call(String, Vec<Expr>),
}

fn ws(input: &str) -> &str {
    input.trim_start_matches([' ', '\t'])
}

fn tok<'a>(t: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input: &'a str| nom::bytes::complete::tag(t)(ws(input))
}

fn expr1(input: &str) -> IResult<&str, Expr> {
    let (rest, cond) = expr2(input)?;
    let after = ws(rest);
    if let Some(tail) = after.strip_prefix('?') {
        let (tail, then) = nom::combinator::cut(expr1)(tail)?;
        let (tail, _) = nom::combinator::cut(tok(":"))(tail)?;
        let (tail, other) = nom::combinator::cut(expr1)(tail)?;
        return Ok((
            tail,
            Expr::Ternary(Box::new(cond), Box::new(then), Box::new(other)),
        ));
    }
    Ok((rest, cond))
}

fn expr2(input: &str) -> IResult<&str, Expr> {
    let (mut rest, mut lhs) = expr3(input)?;
    while let Ok((tail, _)) = tok("||")(rest) {
        let (tail, rhs) = nom::combinator::cut(expr3)(tail)?;
        lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        rest = tail;
    }
    Ok((rest, lhs))
}

fn expr3(input: &str) -> IResult<&str, Expr> {
    let (mut rest, mut lhs) = expr4(input)?;
    while let Ok((tail, _)) = tok("&&")(rest) {
        let (tail, rhs) = nom::combinator::cut(expr4)(tail)?;
        lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        rest = tail;
    }
    Ok((rest, lhs))
}

fn cmp_op(input: &str) -> IResult<&str, CmpOp> {
    let input = ws(input);
    let (rest, op) = nom::branch::alt((
        nom::combinator::value(CmpOp::Eq, nom::bytes::complete::tag("==")),
        nom::combinator::value(CmpOp::Ne, nom::bytes::complete::tag("!=")),
        nom::combinator::value(CmpOp::Match, nom::bytes::complete::tag("=~")),
        nom::combinator::value(CmpOp::NoMatch, nom::bytes::complete::tag("!~")),
        nom::combinator::value(CmpOp::Ge, nom::bytes::complete::tag(">=")),
        nom::combinator::value(CmpOp::Le, nom::bytes::complete::tag("<=")),
        nom::combinator::value(CmpOp::Gt, nom::bytes::complete::tag(">")),
        nom::combinator::value(CmpOp::Lt, nom::bytes::complete::tag("<")),
        nom::combinator::value(CmpOp::IsNot, keyword("isnot")),
        nom::combinator::value(CmpOp::Is, keyword("is")),
    ))(input)?;
    Ok((rest, op))
}

/// A word operator that must not run into a following name character.
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input: &'a str| {
        let (rest, w) = nom::bytes::complete::tag(word)(input)?;
        match rest.chars().next() {
            Some(c) if c.is_alphanumeric() || c == '_' => Err(nom::Err::Error(
                nom::error::Error::new(input, nom::error::ErrorKind::Tag),
            )),
            _ => Ok((rest, w)),
        }
    }
}

fn expr4(input: &str) -> IResult<&str, Expr> {
    let (rest, lhs) = expr5(input)?;
    let Ok((tail, op)) = cmp_op(rest) else {
        return Ok((rest, lhs));
    };
    let (tail, case) = match tail.chars().next() {
        Some('#') => (&tail[1..], CaseRule::Match),
        Some('?') => (&tail[1..], CaseRule::Ignore),
        _ => (tail, CaseRule::Option),
    };
    let (tail, rhs) = nom::combinator::cut(expr5)(tail)?;
    Ok((tail, Expr::Compare(op, case, Box::new(lhs), Box::new(rhs))))
}

fn add_op(input: &str) -> IResult<&str, BinOp> {
    let input = ws(input);
    nom::branch::alt((
        nom::combinator::value(BinOp::Concat, nom::bytes::complete::tag("..")),
        // "+=" and "-=" belong to :let
        nom::combinator::value(
            BinOp::Add,
            nom::sequence::terminated(
                nom::bytes::complete::tag("+"),
                nom::combinator::not(nom::bytes::complete::tag("=")),
            ),
        ),
        nom::combinator::value(
            BinOp::Sub,
            nom::sequence::terminated(
                nom::bytes::complete::tag("-"),
                nom::combinator::not(nom::bytes::complete::tag("=")),
            ),
        ),
        nom::combinator::value(
            BinOp::Concat,
            nom::sequence::terminated(
                nom::bytes::complete::tag("."),
                nom::combinator::not(nom::bytes::complete::tag("=")),
            ),
        ),
    ))(input)
}

fn expr5(input: &str) -> IResult<&str, Expr> {
    let (mut rest, mut lhs) = expr6(input)?;
    while let Ok((tail, op)) = add_op(rest) {
        let (tail, rhs) = nom::combinator::cut(expr6)(tail)?;
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        rest = tail;
    }
    Ok((rest, lhs))
}

fn mul_op(input: &str) -> IResult<&str, BinOp> {
    let input = ws(input);
    nom::sequence::terminated(
        nom::branch::alt((
            nom::combinator::value(BinOp::Mul, nom::bytes::complete::tag("*")),
            nom::combinator::value(BinOp::Div, nom::bytes::complete::tag("/")),
            nom::combinator::value(BinOp::Mod, nom::bytes::complete::tag("%")),
        )),
        nom::combinator::not(nom::bytes::complete::tag("=")),
    )(input)
}

fn expr6(input: &str) -> IResult<&str, Expr> {
    let (mut rest, mut lhs) = expr7(input)?;
    while let Ok((tail, op)) = mul_op(rest) {
        let (tail, rhs) = nom::combinator::cut(expr7)(tail)?;
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        rest = tail;
    }
    Ok((rest, lhs))
}

fn expr7(input: &str) -> IResult<&str, Expr> {
    let input = ws(input);
    match input.chars().next() {
        Some('!') => {
            let (rest, inner) = expr7(&input[1..])?;
            Ok((rest, Expr::Not(Box::new(inner))))
        }
        Some('-') => {
            let (rest, inner) = expr7(&input[1..])?;
            Ok((rest, Expr::Neg(Box::new(inner))))
        }
        Some('+') => {
            let (rest, inner) = expr7(&input[1..])?;
            Ok((rest, Expr::Plus(Box::new(inner))))
        }
        _ => expr8(input),
    }
}

fn expr8(input: &str) -> IResult<&str, Expr> {
    let (mut rest, mut base) = expr9(input)?;
    // no white space is allowed before a subscript
    while rest.starts_with('[') {
        let tail = &rest[1..];
        if let Ok((after, _)) = tok(":")(tail) {
            let (after, hi) = nom::combinator::opt(expr1)(after)?;
            let (after, _) = nom::combinator::cut(tok("]"))(after)?;
            base = Expr::Slice(Box::new(base), None, hi.map(Box::new));
            rest = after;
            continue;
        }
        let (tail, idx) = nom::combinator::cut(expr1)(tail)?;
        if let Ok((after, _)) = tok(":")(tail) {
            let (after, hi) = nom::combinator::opt(expr1)(after)?;
            let (after, _) = nom::combinator::cut(tok("]"))(after)?;
            base = Expr::Slice(Box::new(base), Some(Box::new(idx)), hi.map(Box::new));
            rest = after;
        } else {
            let (after, _) = nom::combinator::cut(tok("]"))(tail)?;
            base = Expr::Index(Box::new(base), Box::new(idx));
            rest = after;
        }
    }
    Ok((rest, base))
}

fn number(input: &str) -> IResult<&str, Expr> {
    let (rest, digits) = nom::bytes::complete::take_while1(|c: char| c.is_ascii_alphanumeric())(input)?;
    if !digits.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        )));
    }
    match crate::charset::str2nr(digits, crate::charset::NumBases::ALL) {
        Some((n, len)) if len == digits.len() => Ok((rest, Expr::Number(n))),
        _ => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn double_quoted(input: &str) -> IResult<&str, Expr> {
    let (mut rest, _) = nom::bytes::complete::tag("\"")(input)?;
    let mut out = String::new();
    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Char,
                )))
            }
            Some('"') => return Ok((chars.as_str(), Expr::Str(out))),
            Some('\\') => {
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('e') => out.push('\x1b'),
                    Some('\\') => out.push('\\'),
                    Some('"') => out.push('"'),
                    Some(c) => out.push(c),
                    None => out.push('\\'),
                }
                rest = chars.as_str();
            }
            Some(c) => {
                out.push(c);
                rest = chars.as_str();
            }
        }
    }
}

fn single_quoted(input: &str) -> IResult<&str, Expr> {
    let (mut rest, _) = nom::bytes::complete::tag("'")(input)?;
    let mut out = String::new();
    loop {
        let Some(pos) = rest.find('\'') else {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Char,
            )));
        };
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 1..];
        if let Some(tail) = rest.strip_prefix('\'') {
            out.push('\'');
            rest = tail;
        } else {
            return Ok((rest, Expr::Str(out)));
        }
    }
}

fn list(input: &str) -> IResult<&str, Expr> {
    let (rest, _) = nom::bytes::complete::tag("[")(input)?;
    let (rest, items) = nom::multi::separated_list0(tok(","), expr1)(rest)?;
    let (rest, _) = nom::combinator::opt(tok(","))(rest)?;
    let (rest, _) = nom::combinator::cut(tok("]"))(rest)?;
    Ok((rest, Expr::List(items)))
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '#'
}

/// A variable or function name with an optional `x:` scope.
pub fn name(input: &str) -> IResult<&str, &str> {
    let start = input;
    let mut chars = input.char_indices().peekable();
    let mut end = 0;
    if let Some(&(_, c)) = chars.peek() {
        if !(c.is_ascii_alphabetic() || c == '_') {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Alpha,
            )));
        }
    } else {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Alpha,
        )));
    }
    let bytes = input.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && b"gslavbwt".contains(&bytes[0]) {
        end = 2;
        // "a:0", "a:000" and "a:1" are valid argument names
        while end < bytes.len() && (is_name_char(bytes[end] as char)) {
            end += 1;
        }
        return Ok((&start[end..], &start[..end]));
    }
    for (i, c) in chars {
        if is_name_char(c) {
            end = i + c.len_utf8();
        } else {
            break;
        }
    }
    Ok((&start[end..], &start[..end]))
}

fn call_or_var(input: &str) -> IResult<&str, Expr> {
    let (rest, n) = name(input)?;
    if let Some(args) = rest.strip_prefix('(') {
        let (args, list) = nom::multi::separated_list0(tok(","), expr1)(args)?;
        let (args, _) = nom::combinator::cut(tok(")"))(args)?;
        return Ok((args, Expr::Call(n.to_string(), list)));
    }
    Ok((rest, Expr::Var(n.to_string())))
}

fn option_ref(input: &str) -> IResult<&str, Expr> {
    let (rest, _) = nom::bytes::complete::tag("&")(input)?;
    let (rest, scope) = nom::combinator::opt(nom::sequence::terminated(
        nom::character::complete::one_of("lg"),
        nom::bytes::complete::tag(":"),
    ))(rest)?;
    let (rest, n) = nom::bytes::complete::take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(rest)?;
    Ok((
        rest,
        Expr::Option {
            name: n.to_string(),
            scope,
        },
    ))
}

fn env_ref(input: &str) -> IResult<&str, Expr> {
    let (rest, _) = nom::bytes::complete::tag("$")(input)?;
    let (rest, n) = nom::bytes::complete::take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(rest)?;
    Ok((rest, Expr::Env(n.to_string())))
}

fn register_ref(input: &str) -> IResult<&str, Expr> {
    let (rest, _) = nom::bytes::complete::tag("@")(input)?;
    let mut chars = rest.chars();
    let r = chars.next().unwrap_or('"');
    let rest = if r == '"' && rest.is_empty() { rest } else { chars.as_str() };
    Ok((rest, Expr::Register(r)))
}

fn paren(input: &str) -> IResult<&str, Expr> {
    let (rest, _) = nom::bytes::complete::tag("(")(input)?;
    let (rest, inner) = nom::combinator::cut(expr1)(rest)?;
    let (rest, _) = nom::combinator::cut(tok(")"))(rest)?;
    Ok((rest, inner))
}

fn expr9(input: &str) -> IResult<&str, Expr> {
    let input = ws(input);
    nom::branch::alt((
        number,
        double_quoted,
        single_quoted,
        list,
        option_ref,
        env_ref,
        register_ref,
        paren,
        call_or_var,
    ))(input)
}

/// Parse one expression from the start of `text`. Returns the expression
/// and the byte offset just past it, with trailing blanks skipped.
pub fn parse_expr(text: &str) -> Result<(Expr, usize)> {
    match expr1(text) {
        Ok((rest, expr)) => {
            let rest = ws(rest);
            Ok((expr, text.len() - rest.len()))
        }
        Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => {
            let at = err.input.trim();
            if at.is_empty() {
                Err(parse_err(format!("{}: {}", e::INVEXPR_STR, text.trim())))
            } else {
                Err(parse_err(format!("{}: {}", e::INVEXPR_STR, at)))
            }
        }
        Err(err @ nom::Err::Incomplete(_)) => Err(err.into()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn precedence() {
        let (e, n) = parse_expr("1 + 2 * 3 | echo").unwrap();
        assert_eq!(n, 10);
        assert_eq!(
            e,
            Expr::Binary(
                BinOp::Add,
                Box::new(Expr::Number(1)),
                Box::new(Expr::Binary(
                    BinOp::Mul,
                    Box::new(Expr::Number(2)),
                    Box::new(Expr::Number(3))
                ))
            )
        );
    }

    #[test]
    fn scoped_names_and_calls() {
        let (e, _) = parse_expr("s:n + len([1, 2])").unwrap();
        match e {
            Expr::Binary(BinOp::Add, lhs, rhs) => {
                assert_eq!(*lhs, Expr::Var("s:n".into()));
                assert!(matches!(*rhs, Expr::Call(ref f, ref a) if f == "len" && a.len() == 1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn comparison_case_suffix() {
        let (e, _) = parse_expr("'a' ==? 'A'").unwrap();
        assert!(matches!(e, Expr::Compare(CmpOp::Eq, CaseRule::Ignore, _, _)));
        let (e, _) = parse_expr("x isnot y").unwrap();
        assert!(matches!(e, Expr::Compare(CmpOp::IsNot, _, _, _)));
    }

    #[test]
    fn strings() {
        assert_eq!(parse_expr(r#""a\tb""#).unwrap().0, Expr::Str("a\tb".into()));
        assert_eq!(parse_expr("'it''s'").unwrap().0, Expr::Str("it's".into()));
        assert!(parse_expr("\"open").is_err());
    }

    #[test]
    fn slices_and_options() {
        assert!(matches!(parse_expr("l[1:]").unwrap().0, Expr::Slice(_, Some(_), None)));
        assert_eq!(
            parse_expr("&l:ts").unwrap().0,
            Expr::Option {
                name: "ts".into(),
                scope: Some('l')
            }
        );
    }

    #[test]
    fn stops_at_command_separator() {
        let (_, n) = parse_expr("\"x\" | let a = 1").unwrap();
        assert_eq!(n, 4);
    }
}
