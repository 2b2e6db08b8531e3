//! Parse field tag strings into descriptors using PEST.

use crate::expr::{ArithOp, LenExpr};
use crate::shape::FieldDescriptor;
use crate::stream::Endianness;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "tag.pest"]
struct TagParser;

/// Parse a raw tag string (e.g. `"len:CrossInCount,be"`) into a descriptor.
/// The empty string yields the all-default descriptor.
pub fn parse_tag(source: &str) -> Result<FieldDescriptor, String> {
    let pairs = TagParser::parse(Rule::tag, source).map_err(|e| format!("tag syntax: {}", e))?;
    let tag = pairs.into_iter().next().ok_or("empty tag parse")?;
    build_descriptor(tag)
}

fn build_descriptor(pair: Pair<Rule>) -> Result<FieldDescriptor, String> {
    let mut d = FieldDescriptor::default();
    for clause in pair.into_inner().filter(|p| p.as_rule() == Rule::clause) {
        let inner = clause.into_inner().next().ok_or("empty clause")?;
        match inner.as_rule() {
            Rule::ignore => {
                d.ignore = true;
            }
            Rule::length => {
                if d.length.is_some() {
                    return Err("duplicate len clause".to_string());
                }
                let expr = inner.into_inner().next().ok_or("len clause: missing expression")?;
                d.length = Some(build_expr(expr)?);
            }
            Rule::order => {
                if d.byte_order.is_some() {
                    return Err("duplicate byte-order clause".to_string());
                }
                d.byte_order = Some(match inner.as_str() {
                    "be" => Endianness::Big,
                    "le" => Endianness::Little,
                    other => return Err(format!("unknown byte order {:?}", other)),
                });
            }
            Rule::elem => {
                if d.element.is_some() {
                    return Err("duplicate element clause".to_string());
                }
                d.element = Some(Box::new(build_descriptor(inner)?));
            }
            Rule::func => {
                if d.function.is_some() {
                    return Err(format!(
                        "duplicate function name (already {:?})",
                        d.function.as_deref().unwrap_or("")
                    ));
                }
                d.function = Some(inner.as_str().to_string());
            }
            other => return Err(format!("unexpected clause {:?}", other)),
        }
    }
    if d.ignore
        && (d.length.is_some() || d.byte_order.is_some() || d.function.is_some() || d.element.is_some())
    {
        return Err("'-' may not combine with other clauses".to_string());
    }
    Ok(d)
}

fn build_expr(pair: Pair<Rule>) -> Result<LenExpr, String> {
    // expr and term share the shape: operand ~ (op ~ operand)*, left-associative.
    let rule = pair.as_rule();
    let mut inner = pair.into_inner();
    let first = inner.next().ok_or("length expression: missing operand")?;
    let mut acc = match rule {
        Rule::expr => build_expr(first)?,
        Rule::term => build_factor(first)?,
        other => return Err(format!("unexpected expression node {:?}", other)),
    };
    while let Some(op) = inner.next() {
        let rhs_pair = inner
            .next()
            .ok_or_else(|| format!("length expression: operator {:?} missing operand", op.as_str()))?;
        let rhs = match rule {
            Rule::expr => build_expr(rhs_pair)?,
            _ => build_factor(rhs_pair)?,
        };
        acc = LenExpr::Binary {
            op: build_op(op.as_str())?,
            lhs: Box::new(acc),
            rhs: Box::new(rhs),
        };
    }
    Ok(acc)
}

fn build_factor(pair: Pair<Rule>) -> Result<LenExpr, String> {
    match pair.as_rule() {
        Rule::factor => {
            let inner = pair.into_inner().next().ok_or("empty factor")?;
            build_factor(inner)
        }
        Rule::number => pair
            .as_str()
            .parse::<u64>()
            .map(LenExpr::Lit)
            .map_err(|e| format!("bad length literal {:?}: {}", pair.as_str(), e)),
        Rule::ident => Ok(LenExpr::Ref(pair.as_str().to_string())),
        other => Err(format!("unexpected expression node {:?}", other)),
    }
}

fn build_op(op: &str) -> Result<ArithOp, String> {
    Ok(match op {
        "+" => ArithOp::Add,
        "-" => ArithOp::Sub,
        "*" => ArithOp::Mul,
        "/" => ArithOp::Div,
        other => return Err(format!("unknown operator {:?}", other)),
    })
}
