use crate::ast::*;
use crate::error::{Result, ScriptError};
use crate::grammar::{Rule, ScriptParser};
use once_cell::sync::Lazy;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser as PestParser;
use std::num::NonZeroUsize;
use std::rc::Rc;
use std::sync::Once;
use tracing::debug;

/// Cumulative pest calls allowed for one parse. Pathological input fails
/// with a budget fault instead of parsing for minutes.
const PARSE_CALL_LIMIT: usize = 2_000_000;

static PARSE_LIMIT: Once = Once::new();

static PRATT: Lazy<PrattParser<Rule>> = Lazy::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::nullish, Assoc::Left))
        .op(Op::infix(Rule::or, Assoc::Left))
        .op(Op::infix(Rule::and, Assoc::Left))
        .op(Op::infix(Rule::strict_eq, Assoc::Left)
            | Op::infix(Rule::strict_ne, Assoc::Left)
            | Op::infix(Rule::loose_eq, Assoc::Left)
            | Op::infix(Rule::loose_ne, Assoc::Left))
        .op(Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::rem, Assoc::Left))
        .op(Op::infix(Rule::pow, Assoc::Right))
        .op(Op::prefix(Rule::not)
            | Op::prefix(Rule::neg)
            | Op::prefix(Rule::plus)
            | Op::prefix(Rule::typeof_op))
});

pub struct Parser;

impl Parser {
    pub fn parse_string(input: &str) -> Result<Program> {
        PARSE_LIMIT.call_once(|| pest::set_call_limit(NonZeroUsize::new(PARSE_CALL_LIMIT)));
        let mut pairs = ScriptParser::parse(Rule::program, input)?;
        let program = pairs
            .next()
            .ok_or_else(|| ScriptError::Syntax {
                line: 1,
                column: 1,
                message: "empty parse tree".into(),
            })?;

        let mut body = Vec::new();
        for pair in program.into_inner() {
            match pair.as_rule() {
                Rule::EOI => {}
                _ => body.push(Self::parse_statement(pair)?),
            }
        }

        debug!("Parsed script with {} top-level statements", body.len());
        Ok(Program { body })
    }

    fn parse_statement(pair: Pair<Rule>) -> Result<Stmt> {
        match pair.as_rule() {
            Rule::function_decl => Ok(Stmt::Function(Self::parse_function(pair)?)),
            Rule::declaration => Self::parse_declaration(pair),
            Rule::if_stmt => {
                let mut inner = pair.into_inner();
                let test = Self::parse_expr(next(&mut inner, "if condition")?)?;
                let consequent = Self::parse_statement(next(&mut inner, "if body")?)?;
                let alternate = match inner.next() {
                    Some(p) => Some(Box::new(Self::parse_statement(p)?)),
                    None => None,
                };
                Ok(Stmt::If {
                    test,
                    consequent: Box::new(consequent),
                    alternate,
                })
            }
            Rule::for_of_stmt => {
                let mut inner = pair.into_inner();
                let kind_pair = next(&mut inner, "declaration kind")?;
                let kind = decl_kind(&kind_pair)?;
                let binding = next(&mut inner, "loop binding")?.as_str().to_string();
                let iterable = Self::parse_expr(next(&mut inner, "loop iterable")?)?;
                let body = Self::parse_statement(next(&mut inner, "loop body")?)?;
                Ok(Stmt::ForOf {
                    kind,
                    binding,
                    iterable,
                    body: Box::new(body),
                })
            }
            Rule::for_stmt => {
                let mut inner = pair.into_inner();

                let init = match next(&mut inner, "for initializer")?.into_inner().next() {
                    Some(p) if p.as_rule() == Rule::declaration => {
                        Some(Box::new(Self::parse_declaration(p)?))
                    }
                    Some(p) => Some(Box::new(Stmt::Expr(Self::parse_expr(p)?))),
                    None => None,
                };
                let test = Self::parse_optional_expr(next(&mut inner, "for test")?)?;
                let update = Self::parse_optional_expr(next(&mut inner, "for update")?)?;
                let body = Self::parse_statement(next(&mut inner, "for body")?)?;

                Ok(Stmt::For {
                    init,
                    test,
                    update,
                    body: Box::new(body),
                })
            }
            Rule::while_stmt => {
                let mut inner = pair.into_inner();
                let test = Self::parse_expr(next(&mut inner, "while condition")?)?;
                let body = Self::parse_statement(next(&mut inner, "while body")?)?;
                Ok(Stmt::While {
                    test,
                    body: Box::new(body),
                })
            }
            Rule::return_stmt => {
                let value = match pair.into_inner().next() {
                    Some(p) => Some(Self::parse_expr(p)?),
                    None => None,
                };
                Ok(Stmt::Return(value))
            }
            Rule::break_stmt => Ok(Stmt::Break),
            Rule::continue_stmt => Ok(Stmt::Continue),
            Rule::throw_stmt => {
                let mut inner = pair.into_inner();
                Ok(Stmt::Throw(Self::parse_expr(next(&mut inner, "throw value")?)?))
            }
            Rule::try_stmt => Self::parse_try(pair),
            Rule::block => Ok(Stmt::Block(Self::parse_block(pair)?)),
            Rule::empty_stmt => Ok(Stmt::Empty),
            Rule::expr_stmt => {
                let mut inner = pair.into_inner();
                Ok(Stmt::Expr(Self::parse_expr(next(&mut inner, "expression")?)?))
            }
            other => Err(syntax(&pair, format!("unexpected statement: {:?}", other))),
        }
    }

    fn parse_block(pair: Pair<Rule>) -> Result<Vec<Stmt>> {
        pair.into_inner().map(Self::parse_statement).collect()
    }

    fn parse_declaration(pair: Pair<Rule>) -> Result<Stmt> {
        let mut inner = pair.into_inner();
        let kind_pair = next(&mut inner, "declaration kind")?;
        let kind = decl_kind(&kind_pair)?;

        let mut declarators = Vec::new();
        for declarator in inner {
            let mut parts = declarator.into_inner();
            let name = next(&mut parts, "variable name")?.as_str().to_string();
            let init = match parts.next() {
                Some(p) => Some(Self::parse_expr(p)?),
                None => None,
            };
            if init.is_none() && kind == DeclKind::Const {
                return Err(syntax(
                    &kind_pair,
                    format!("Missing initializer in const declaration '{}'", name),
                ));
            }
            declarators.push(Declarator { name, init });
        }

        Ok(Stmt::Declaration { kind, declarators })
    }

    fn parse_try(pair: Pair<Rule>) -> Result<Stmt> {
        let mut block = Vec::new();
        let mut param = None;
        let mut handler = None;
        let mut finalizer = None;

        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::block => block = Self::parse_block(part)?,
                Rule::catch_clause => {
                    for item in part.into_inner() {
                        match item.as_rule() {
                            Rule::ident => param = Some(item.as_str().to_string()),
                            Rule::block => handler = Some(Self::parse_block(item)?),
                            _ => {}
                        }
                    }
                }
                Rule::finally_clause => {
                    let mut inner = part.into_inner();
                    finalizer = Some(Self::parse_block(next(&mut inner, "finally block")?)?);
                }
                _ => {}
            }
        }

        Ok(Stmt::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    fn parse_function(pair: Pair<Rule>) -> Result<Rc<FunctionDef>> {
        let mut name = None;
        let mut params = Vec::new();
        let mut body = Vec::new();

        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::ident => name = Some(part.as_str().to_string()),
                Rule::params => params = Self::parse_params(part)?,
                Rule::block => body = Self::parse_block(part)?,
                _ => {}
            }
        }

        Ok(Rc::new(FunctionDef {
            name,
            params,
            body: FunctionBody::Block(body),
        }))
    }

    fn parse_params(pair: Pair<Rule>) -> Result<Vec<Param>> {
        let mut params = Vec::new();
        for param in pair.into_inner() {
            let mut inner = param.into_inner();
            let name = next(&mut inner, "parameter name")?.as_str().to_string();
            let default = match inner.next() {
                Some(p) => Some(Self::parse_expr(p)?),
                None => None,
            };
            params.push(Param { name, default });
        }
        Ok(params)
    }

    fn parse_optional_expr(pair: Pair<Rule>) -> Result<Option<Expr>> {
        match pair.into_inner().next() {
            Some(p) => Ok(Some(Self::parse_expr(p)?)),
            None => Ok(None),
        }
    }

    fn parse_expr(pair: Pair<Rule>) -> Result<Expr> {
        match pair.as_rule() {
            Rule::expr => {
                let mut inner = pair.into_inner();
                Self::parse_expr(next(&mut inner, "expression")?)
            }
            Rule::arrow_fn => Self::parse_arrow(pair),
            Rule::assign_expr => Self::parse_assign(pair),
            Rule::cond_expr => {
                let mut inner = pair.into_inner();
                let test = Self::parse_binary(next(&mut inner, "expression")?)?;
                match (inner.next(), inner.next()) {
                    (Some(consequent), Some(alternate)) => Ok(Expr::Conditional {
                        test: Box::new(test),
                        consequent: Box::new(Self::parse_expr(consequent)?),
                        alternate: Box::new(Self::parse_expr(alternate)?),
                    }),
                    _ => Ok(test),
                }
            }
            other => Err(syntax(&pair, format!("unexpected expression: {:?}", other))),
        }
    }

    fn parse_arrow(pair: Pair<Rule>) -> Result<Expr> {
        let mut inner = pair.into_inner();
        let params_pair = next(&mut inner, "arrow parameters")?;
        let params = match params_pair.into_inner().next() {
            Some(p) if p.as_rule() == Rule::ident => vec![Param {
                name: p.as_str().to_string(),
                default: None,
            }],
            Some(p) => Self::parse_params(p)?,
            None => Vec::new(),
        };

        let body_pair = next(&mut inner, "arrow body")?;
        let body = match body_pair.as_rule() {
            Rule::block => FunctionBody::Block(Self::parse_block(body_pair)?),
            _ => FunctionBody::Expr(Box::new(Self::parse_expr(body_pair)?)),
        };

        Ok(Expr::Function(Rc::new(FunctionDef {
            name: None,
            params,
            body,
        })))
    }

    fn parse_assign(pair: Pair<Rule>) -> Result<Expr> {
        let mut inner = pair.into_inner();

        let target_pair = next(&mut inner, "assignment target")?;
        let mut target_parts = target_pair.into_inner();
        let mut target = Expr::Ident(next(&mut target_parts, "identifier")?.as_str().to_string());
        for accessor in target_parts {
            target = Self::apply_accessor(target, accessor)?;
        }

        let op_pair = next(&mut inner, "assignment operator")?;
        let op = AssignOp::from_str(op_pair.as_str())
            .ok_or_else(|| syntax(&op_pair, format!("unknown operator '{}'", op_pair.as_str())))?;

        let value = Self::parse_expr(next(&mut inner, "assigned value")?)?;

        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_binary(pair: Pair<Rule>) -> Result<Expr> {
        PRATT
            .map_primary(Self::parse_postfix)
            .map_prefix(|op, operand| {
                let op = match op.as_rule() {
                    Rule::not => UnaryOp::Not,
                    Rule::neg => UnaryOp::Neg,
                    Rule::plus => UnaryOp::Plus,
                    Rule::typeof_op => UnaryOp::TypeOf,
                    other => return Err(syntax(&op, format!("unknown prefix {:?}", other))),
                };
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand?),
                })
            })
            .map_infix(|left, op, right| {
                let left = Box::new(left?);
                let right = Box::new(right?);
                let logical = match op.as_rule() {
                    Rule::and => Some(LogicalOp::And),
                    Rule::or => Some(LogicalOp::Or),
                    Rule::nullish => Some(LogicalOp::Nullish),
                    _ => None,
                };
                if let Some(op) = logical {
                    return Ok(Expr::Logical { op, left, right });
                }

                let op = match op.as_rule() {
                    Rule::add => BinaryOp::Add,
                    Rule::sub => BinaryOp::Sub,
                    Rule::mul => BinaryOp::Mul,
                    Rule::div => BinaryOp::Div,
                    Rule::rem => BinaryOp::Rem,
                    Rule::pow => BinaryOp::Pow,
                    Rule::strict_eq => BinaryOp::Eq,
                    Rule::strict_ne => BinaryOp::Ne,
                    Rule::loose_eq => BinaryOp::LooseEq,
                    Rule::loose_ne => BinaryOp::LooseNe,
                    Rule::lt => BinaryOp::Lt,
                    Rule::le => BinaryOp::Le,
                    Rule::gt => BinaryOp::Gt,
                    Rule::ge => BinaryOp::Ge,
                    other => return Err(syntax(&op, format!("unknown operator {:?}", other))),
                };
                Ok(Expr::Binary { op, left, right })
            })
            .parse(pair.into_inner())
    }

    fn parse_postfix(pair: Pair<Rule>) -> Result<Expr> {
        let mut inner = pair.into_inner();
        let mut expr = Self::parse_primary(next(&mut inner, "operand")?)?;

        for part in inner {
            if part.as_rule() == Rule::update_op {
                if !expr.is_assignable() {
                    return Err(syntax(
                        &part,
                        "Invalid left-hand side expression in postfix operation".into(),
                    ));
                }
                expr = Expr::Update {
                    increment: part.as_str() == "++",
                    target: Box::new(expr),
                };
            } else {
                expr = Self::apply_accessor(expr, part)?;
            }
        }

        Ok(expr)
    }

    fn apply_accessor(object: Expr, pair: Pair<Rule>) -> Result<Expr> {
        match pair.as_rule() {
            Rule::member => {
                let mut inner = pair.into_inner();
                let property = next(&mut inner, "property name")?.as_str().to_string();
                Ok(Expr::Member {
                    object: Box::new(object),
                    property,
                })
            }
            Rule::index => {
                let mut inner = pair.into_inner();
                let index = Self::parse_expr(next(&mut inner, "index")?)?;
                Ok(Expr::Index {
                    object: Box::new(object),
                    index: Box::new(index),
                })
            }
            Rule::call_args => Ok(Expr::Call {
                callee: Box::new(object),
                args: Self::parse_args(pair)?,
            }),
            other => Err(syntax(&pair, format!("unexpected accessor {:?}", other))),
        }
    }

    fn parse_args(pair: Pair<Rule>) -> Result<Vec<Expr>> {
        pair.into_inner().map(Self::parse_expr).collect()
    }

    fn parse_primary(pair: Pair<Rule>) -> Result<Expr> {
        match pair.as_rule() {
            Rule::number => pair
                .as_str()
                .parse::<f64>()
                .map(Expr::Number)
                .map_err(|e| syntax(&pair, format!("invalid number: {}", e))),
            Rule::string => {
                let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
                Ok(Expr::Str(unescape(raw)))
            }
            Rule::template => {
                let mut parts = Vec::new();
                for part in pair.into_inner() {
                    match part.as_rule() {
                        Rule::template_chunk => parts.push(TemplatePart::Text(unescape(part.as_str()))),
                        Rule::template_subst => {
                            let mut inner = part.into_inner();
                            parts.push(TemplatePart::Expr(Self::parse_expr(next(
                                &mut inner,
                                "template expression",
                            )?)?));
                        }
                        _ => {}
                    }
                }
                Ok(Expr::Template(parts))
            }
            Rule::boolean => Ok(Expr::Bool(pair.as_str() == "true")),
            Rule::null_lit => Ok(Expr::Null),
            Rule::undefined_lit => Ok(Expr::Undefined),
            Rule::ident => Ok(Expr::Ident(pair.as_str().to_string())),
            Rule::paren => {
                let mut inner = pair.into_inner();
                Self::parse_expr(next(&mut inner, "expression")?)
            }
            Rule::array_lit => Ok(Expr::Array(
                pair.into_inner()
                    .map(Self::parse_expr)
                    .collect::<Result<Vec<_>>>()?,
            )),
            Rule::object_lit => {
                let mut properties = Vec::new();
                for prop in pair.into_inner() {
                    match prop.as_rule() {
                        Rule::prop_pair => {
                            let mut inner = prop.into_inner();
                            let key_pair = next(&mut inner, "property key")?;
                            let key = match key_pair.as_rule() {
                                Rule::string => unescape(
                                    key_pair.into_inner().next().map(|p| p.as_str()).unwrap_or(""),
                                ),
                                _ => key_pair.as_str().to_string(),
                            };
                            let value = Self::parse_expr(next(&mut inner, "property value")?)?;
                            properties.push((key, value));
                        }
                        Rule::prop_short => {
                            let name = prop.as_str().trim().to_string();
                            properties.push((name.clone(), Expr::Ident(name)));
                        }
                        _ => {}
                    }
                }
                Ok(Expr::Object(properties))
            }
            Rule::new_expr => {
                let mut inner = pair.into_inner();
                let constructor = next(&mut inner, "constructor")?.as_str().to_string();
                let args = match inner.next() {
                    Some(p) => Self::parse_args(p)?,
                    None => Vec::new(),
                };
                Ok(Expr::New { constructor, args })
            }
            Rule::function_expr => Ok(Expr::Function(Self::parse_function(pair)?)),
            other => Err(syntax(&pair, format!("unexpected token {:?}", other))),
        }
    }
}

fn next<'i>(
    pairs: &mut pest::iterators::Pairs<'i, Rule>,
    what: &str,
) -> Result<Pair<'i, Rule>> {
    pairs.next().ok_or_else(|| ScriptError::Syntax {
        line: 0,
        column: 0,
        message: format!("missing {}", what),
    })
}

fn decl_kind(pair: &Pair<Rule>) -> Result<DeclKind> {
    DeclKind::from_str(pair.as_str())
        .ok_or_else(|| syntax(pair, format!("unknown declaration '{}'", pair.as_str())))
}

fn syntax(pair: &Pair<Rule>, message: String) -> ScriptError {
    let (line, column) = pair.line_col();
    ScriptError::Syntax {
        line,
        column,
        message,
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let program = Parser::parse_string("1 + 2 * 3;").unwrap();
        match &program.body[0] {
            Stmt::Expr(Expr::Binary { op, right, .. }) => {
                assert_eq!(*op, BinaryOp::Add);
                assert!(matches!(**right, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_arrow_and_defaults() {
        let program =
            Parser::parse_string("const f = (a, b = 2) => a + b;\nconst g = x => x * 2;").unwrap();
        assert_eq!(program.body.len(), 2);
        match &program.body[0] {
            Stmt::Declaration { kind, declarators } => {
                assert_eq!(*kind, DeclKind::Const);
                match &declarators[0].init {
                    Some(Expr::Function(def)) => {
                        assert_eq!(def.params.len(), 2);
                        assert!(def.params[1].default.is_some());
                        assert!(matches!(def.body, FunctionBody::Expr(_)));
                    }
                    other => panic!("expected arrow function, got {:?}", other),
                }
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_template_parts() {
        let program = Parser::parse_string("`a ${1 + 1} b`;").unwrap();
        match &program.body[0] {
            Stmt::Expr(Expr::Template(parts)) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[0], TemplatePart::Text("a ".into()));
                assert_eq!(parts[2], TemplatePart::Text(" b".into()));
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_string_escapes() {
        let program = Parser::parse_string(r#"'it\'s\nA';"#).unwrap();
        assert_eq!(program.body[0], Stmt::Expr(Expr::Str("it's\nA".into())));
    }

    #[test]
    fn test_const_requires_initializer() {
        let err = Parser::parse_string("const x;").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { .. }));
    }

    #[test]
    fn test_invalid_update_target() {
        assert!(Parser::parse_string("5++;").is_err());
    }

    #[test]
    fn test_syntax_error_location() {
        match Parser::parse_string("let a = ;").unwrap_err() {
            ScriptError::Syntax { line, .. } => assert_eq!(line, 1),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }
}
