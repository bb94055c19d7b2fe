//! Grouping of flat statements into the nested block tree that gets executed.

use crate::error::{BlockError, ScriptError, ScriptResult};
use crate::parser::Statement;

/// The command that closes the nearest open block.
pub const TERMINATOR: &str = "end";

/// Commands whose following statements form their body.
pub const BLOCK_OPENERS: &[&str] = &["foreach", "function", "if", "elif", "else"];

/// Block openers whose body also ends at an `elif` or `else` continuing the chain.
pub const CHAIN_OPENERS: &[&str] = &["if", "elif"];

const CHAIN_CONTINUATIONS: &[&str] = &["elif", "else"];

/// A statement together with its body, if the statement opens a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementNode {
    pub statement: Statement,
    /// `Some` exactly when the statement's command is one of [`BLOCK_OPENERS`].
    pub children: Option<Vec<StatementNode>>,
}

impl StatementNode {
    pub fn command(&self) -> &str {
        &self.statement.command
    }

    pub fn body(&self) -> &[StatementNode] {
        self.children.as_deref().unwrap_or_default()
    }
}

pub fn is_block_opener(command: &str) -> bool {
    BLOCK_OPENERS.contains(&command)
}

/// Build the nested statement tree for a whole program.
pub fn build_blocks(statements: &[Statement]) -> ScriptResult<Vec<StatementNode>> {
    let (nodes, stop) = build(statements, 0, false)?;
    match statements.get(stop) {
        Some(stray) => Err(ScriptError::Block {
            line: stray.line,
            source: BlockError::UnexpectedEnd,
        }),
        None => Ok(nodes),
    }
}

/// Builds sibling nodes starting at `start` and returns them with the index of the
/// first statement not consumed.
///
/// The scan stops at a terminator, which is left for the caller to skip. With
/// `in_chain` set it also stops at `elif`/`else`, which the caller then opens as the
/// next block of the same chain.
fn build(
    statements: &[Statement],
    start: usize,
    in_chain: bool,
) -> ScriptResult<(Vec<StatementNode>, usize)> {
    let mut nodes = Vec::new();
    let mut i = start;
    // set when a nested chain handed back a continuation that belongs to it
    let mut resume_chain = false;

    while let Some(statement) = statements.get(i) {
        let command = statement.command.as_str();

        if command == TERMINATOR {
            return Ok((nodes, i));
        }
        if in_chain && !resume_chain && CHAIN_CONTINUATIONS.contains(&command) {
            return Ok((nodes, i));
        }
        resume_chain = false;

        if !is_block_opener(command) {
            nodes.push(StatementNode {
                statement: statement.clone(),
                children: None,
            });
            i += 1;
            continue;
        }

        let (body, stop) = build(statements, i + 1, CHAIN_OPENERS.contains(&command))?;
        nodes.push(StatementNode {
            statement: statement.clone(),
            children: Some(body),
        });
        match statements.get(stop) {
            None => {
                return Err(ScriptError::Block {
                    line: statement.line,
                    source: BlockError::Unclosed {
                        command: command.to_string(),
                    },
                });
            }
            Some(next) if next.command == TERMINATOR => i = stop + 1,
            Some(_) => {
                i = stop;
                resume_chain = true;
            }
        }
    }

    Ok((nodes, i))
}
