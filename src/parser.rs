//! Expression parsing and statement construction.

use crate::error::{ParseError, ScriptError, ScriptResult};
use crate::lexer::{quote, split_args, split_line, tokenize, Token, TokenKind};
use std::collections::VecDeque;
use std::fmt;

/// A parsed argument expression: a strict binary tree over tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A literal or a variable reference.
    Leaf(Token),
    /// A binary operator applied to two subexpressions.
    Binary {
        op: Token,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// The variable name if this expression is a bare `$name`.
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Expr::Leaf(token) if token.kind == TokenKind::Variable => Some(&token.value),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Leaf(token) => match token.kind {
                TokenKind::Variable => write!(f, "${}", token.value),
                TokenKind::String => f.write_str(&quote(&token.value)),
                TokenKind::Number | TokenKind::Operator => f.write_str(&token.value),
            },
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op.value, right),
        }
    }
}

/// One parsed argument of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    /// 0-based position in the comma-separated list as written, counting skipped
    /// empty pieces.
    pub position: usize,
    pub expr: Expr,
}

/// One source line: a lowercase command name and its argument expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// 1-based line number in the source text.
    pub line: usize,
    pub command: String,
    pub args: Vec<Argument>,
}

/// Deepest expression tree accepted on one argument.
pub const MAX_EXPR_DEPTH: usize = 512;

/// Binding strength of a binary operator; lower binds tighter.
fn precedence(op: &str) -> u8 {
    match op {
        "*" | "/" => 1,
        "+" | "-" => 2,
        "&" => 3,
        "|" => 4,
        "^" => 5,
        _ => 0,
    }
}

/// Checks that operands and binary operators alternate, with parentheses only
/// where an operand may start or end.
fn check_alternation(tokens: &[Token]) -> Result<(), ParseError> {
    let mut expect_operand = true;
    let mut last_op: Option<&Token> = None;

    for token in tokens {
        let is_open = token.is_operator("(");
        let is_close = token.is_operator(")");
        if token.kind != TokenKind::Operator || is_open {
            if !expect_operand {
                return Err(ParseError::TrailingInput(token.value.clone()));
            }
            expect_operand = is_open;
            if !is_open {
                last_op = None;
            }
        } else if expect_operand {
            // a binary operator or `)` with nothing to its left
            return Err(match (is_close, last_op) {
                (false, _) => ParseError::MissingOperand(token.value.clone()),
                (true, Some(op)) => ParseError::MissingOperand(op.value.clone()),
                (true, None) => ParseError::Empty,
            });
        } else if !is_close {
            expect_operand = true;
            last_op = Some(token);
        }
    }

    match last_op {
        Some(op) if expect_operand => Err(ParseError::MissingOperand(op.value.clone())),
        _ => Ok(()),
    }
}

/// Reorders tokens into prefix order (every operator directly followed by its
/// left and then its right operand).
///
/// This is the shunting-yard pass run over the reversed input, so `)` opens a group
/// and `(` closes it. Equal precedence never pops, which keeps operators
/// left-associative once the output is reversed back.
fn to_prefix(tokens: Vec<Token>) -> Result<VecDeque<Token>, ParseError> {
    let mut stack: Vec<Token> = Vec::new();
    let mut output: Vec<Token> = Vec::with_capacity(tokens.len());

    for token in tokens.into_iter().rev() {
        if token.kind != TokenKind::Operator {
            output.push(token);
            continue;
        }
        match token.value.as_str() {
            ")" => stack.push(token),
            "(" => loop {
                match stack.pop() {
                    Some(top) if top.is_operator(")") => break,
                    Some(top) => output.push(top),
                    None => return Err(ParseError::ExpectedClose),
                }
            },
            op => {
                let incoming = precedence(op);
                while stack
                    .last()
                    .is_some_and(|top| !top.is_operator(")") && precedence(&top.value) < incoming)
                {
                    if let Some(top) = stack.pop() {
                        output.push(top);
                    }
                }
                stack.push(token);
            }
        }
    }

    while let Some(top) = stack.pop() {
        if top.is_operator(")") {
            return Err(ParseError::ExpectedOpen);
        }
        output.push(top);
    }

    output.reverse();
    Ok(output.into())
}

fn assemble(queue: &mut VecDeque<Token>, depth: usize) -> Result<Expr, ParseError> {
    let token = queue.pop_front().ok_or(ParseError::Empty)?;
    if token.kind != TokenKind::Operator {
        return Ok(Expr::Leaf(token));
    }
    if depth >= MAX_EXPR_DEPTH {
        return Err(ParseError::TooDeep(MAX_EXPR_DEPTH));
    }
    let left = assemble_operand(queue, &token, depth + 1)?;
    let right = assemble_operand(queue, &token, depth + 1)?;
    Ok(Expr::Binary {
        op: token,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn assemble_operand(
    queue: &mut VecDeque<Token>,
    op: &Token,
    depth: usize,
) -> Result<Expr, ParseError> {
    if queue.is_empty() {
        return Err(ParseError::MissingOperand(op.value.clone()));
    }
    assemble(queue, depth)
}

/// Parse the tokens of one argument into a single expression tree.
///
/// Trees deeper than [`MAX_EXPR_DEPTH`] are rejected so that evaluation never runs
/// out of stack.
pub fn parse_expression(tokens: Vec<Token>) -> Result<Expr, ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    check_alternation(&tokens)?;
    let mut queue = to_prefix(tokens)?;
    let expr = assemble(&mut queue, 0)?;
    match queue.front() {
        Some(extra) => Err(ParseError::TrailingInput(extra.value.clone())),
        None => Ok(expr),
    }
}

/// Parse a whole program into statements, one per non-blank, non-comment line.
pub fn parse_program(source: &str) -> ScriptResult<Vec<Statement>> {
    let mut out = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let (command, rest) = split_line(text);
        let mut args = Vec::new();
        for (arg, piece) in split_args(rest).iter().enumerate() {
            if piece.is_empty() {
                continue;
            }
            let tokens =
                tokenize(piece).map_err(|source| ScriptError::Lex { line, arg, source })?;
            let expr = parse_expression(tokens)
                .map_err(|source| ScriptError::Parse { line, arg, source })?;
            args.push(Argument {
                position: arg,
                expr,
            });
        }

        out.push(Statement {
            line,
            command: command.to_lowercase(),
            args,
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Result<Expr, ParseError> {
        parse_expression(tokenize(src).unwrap())
    }

    fn shape(src: &str) -> String {
        parse(src).unwrap().to_string()
    }

    #[test]
    fn test_multiplication_binds_tighter() {
        assert_eq!(shape("1+2*3"), "(1 + (2 * 3))");
        assert_eq!(shape("2*3+4*5"), "((2 * 3) + (4 * 5))");
    }

    #[test]
    fn test_parentheses_group() {
        assert_eq!(shape("(1+2)*3"), "((1 + 2) * 3)");
        assert_eq!(shape("((4))"), "4");
        assert_eq!(shape("2*(3+(4-1))"), "(2 * (3 + (4 - 1)))");
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(shape("5-2-1"), "((5 - 2) - 1)");
        assert_eq!(shape("8/4/2"), "((8 / 4) / 2)");
    }

    #[test]
    fn test_right_heavy_keeps_operand_order() {
        assert_eq!(shape("1-(2-3)"), "(1 - (2 - 3))");
        assert_eq!(shape("10 - 2 * 3"), "(10 - (2 * 3))");
    }

    #[test]
    fn test_bitwise_precedence_levels() {
        assert_eq!(shape("1 | 2 & 3"), "(1 | (2 & 3))");
        assert_eq!(shape("6 & 3 + 1"), "(6 & (3 + 1))");
        assert_eq!(shape("1 + 2 ^ 3 | 4"), "((1 + 2) ^ (3 | 4))");
        assert_eq!(shape("$a ^ $b & 1"), "($a ^ ($b & 1))");
    }

    #[test]
    fn test_leaves() {
        assert_eq!(parse("42").unwrap(), Expr::Leaf(Token::new(TokenKind::Number, "42")));
        assert_eq!(parse("$x").unwrap().as_variable(), Some("x"));
        assert_eq!(parse("\"s\"").unwrap().as_variable(), None);
    }

    #[test]
    fn test_mismatched_parentheses() {
        assert_eq!(parse("1+2)"), Err(ParseError::ExpectedOpen));
        assert_eq!(parse("(1+2"), Err(ParseError::ExpectedClose));
        assert_eq!(parse("(1))"), Err(ParseError::ExpectedOpen));
    }

    #[test]
    fn test_malformed_expressions() {
        assert_eq!(parse("1 +"), Err(ParseError::MissingOperand("+".into())));
        assert_eq!(parse("* 2"), Err(ParseError::MissingOperand("*".into())));
        assert_eq!(parse("1 2"), Err(ParseError::TrailingInput("2".into())));
        assert_eq!(parse("()"), Err(ParseError::Empty));
        assert_eq!(parse("(1 +)"), Err(ParseError::MissingOperand("+".into())));
    }

    #[test]
    fn test_operators_must_sit_between_operands() {
        assert_eq!(parse("1 2 +"), Err(ParseError::TrailingInput("2".into())));
        assert_eq!(parse("+ 1 2"), Err(ParseError::MissingOperand("+".into())));
        assert_eq!(parse("- 5 3"), Err(ParseError::MissingOperand("-".into())));
        assert_eq!(parse("* 2 3"), Err(ParseError::MissingOperand("*".into())));
        assert_eq!(parse("(1)(2)"), Err(ParseError::TrailingInput("(".into())));
        assert_eq!(parse("1 + * 2"), Err(ParseError::MissingOperand("*".into())));
        assert_eq!(parse("$a \"b\""), Err(ParseError::TrailingInput("b".into())));
    }

    #[test]
    fn test_deep_expressions_are_rejected() {
        let long = format!("1{}", "-1".repeat(100_000));
        assert_eq!(parse(&long), Err(ParseError::TooDeep(MAX_EXPR_DEPTH)));

        let nested = format!("{}1{}", "(".repeat(2_000), ")".repeat(2_000));
        assert_eq!(shape(&nested), "1");

        let fits = format!("1{}", "+1".repeat(MAX_EXPR_DEPTH));
        assert!(parse(&fits).is_ok());
        let too_many = format!("1{}", "+1".repeat(MAX_EXPR_DEPTH + 1));
        assert_eq!(parse(&too_many), Err(ParseError::TooDeep(MAX_EXPR_DEPTH)));
        assert_eq!(parse_expression(Vec::new()), Err(ParseError::Empty));
    }

    #[test]
    fn test_parse_program_skips_blank_and_comment_lines() {
        let src = "# header\n\nSTORE $x, 1 + 2\n   # indented comment\n  print $x\n";
        let statements = parse_program(src).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].line, 3);
        assert_eq!(statements[0].command, "store");
        assert_eq!(statements[0].args.len(), 2);
        assert_eq!(statements[0].args[1].expr.to_string(), "(1 + 2)");
        assert_eq!(statements[1].line, 5);
        assert_eq!(statements[1].command, "print");
    }

    #[test]
    fn test_parse_program_drops_empty_arguments() {
        let statements = parse_program("foo 1,,2").unwrap();
        assert_eq!(statements[0].args.len(), 2);
        assert_eq!(statements[0].args[0].position, 0);
        assert_eq!(statements[0].args[1].position, 2);
    }

    #[test]
    fn test_parse_program_reports_line_and_argument() {
        let err = parse_program("print 1\nstore $x, 2 % 3").unwrap_err();
        match err {
            ScriptError::Lex { line, arg, source } => {
                assert_eq!(line, 2);
                assert_eq!(arg, 1);
                assert_eq!(source, crate::error::LexError::UnexpectedCharacter('%'));
            }
            other => panic!("expected lex error, got {:?}", other),
        }

        let err = parse_program("\nprint (1 + 2").unwrap_err();
        assert!(matches!(
            err,
            ScriptError::Parse {
                line: 2,
                arg: 0,
                source: ParseError::ExpectedClose
            }
        ));
        assert_eq!(err.to_string(), "line 2, argument 1: ) expected");
    }
}
