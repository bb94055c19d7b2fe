use crate::block::{StatementNode, TERMINATOR};
use crate::env::Environment;
use crate::error::{RegistryError, ScriptError, ScriptResult};
use crate::interpreter::{evaluate, Executor};
use crate::parser::Argument;
use crate::value::Value;
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// Everything a command receives for one executed statement.
#[derive(Debug)]
pub struct Call<'a> {
    /// Command name as written in the statement (lowercase).
    pub name: &'a str,
    /// The accumulator produced by the previous statement.
    pub value: Value,
    pub args: &'a [Argument],
    /// 1-based source line of the statement.
    pub line: usize,
    /// The block body, present for block-opening commands.
    pub children: Option<&'a [StatementNode]>,
}

impl<'a> Call<'a> {
    /// Evaluate argument `index`, tagging failures with this statement's line and the
    /// argument's position as written.
    pub fn eval(&self, index: usize, env: &Environment) -> ScriptResult<Value> {
        let arg = self.args.get(index).ok_or_else(|| self.arity_error("more arguments"))?;
        evaluate(&arg.expr, env).map_err(|source| ScriptError::Eval {
            line: self.line,
            arg: arg.position,
            source,
        })
    }

    /// Evaluate argument `index` if it was supplied.
    pub fn eval_opt(&self, index: usize, env: &Environment) -> ScriptResult<Option<Value>> {
        if index < self.args.len() {
            self.eval(index, env).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Fail with an arity error unless the argument count is within `allowed`.
    pub fn expect_args(
        &self,
        allowed: RangeInclusive<usize>,
        expected: &'static str,
    ) -> ScriptResult<()> {
        if allowed.contains(&self.args.len()) {
            Ok(())
        } else {
            Err(self.arity_error(expected))
        }
    }

    /// Name of the variable written as argument `index` (`$name`).
    pub fn variable(&self, index: usize) -> ScriptResult<&'a str> {
        let arg = self.args.get(index);
        arg.and_then(|arg| arg.expr.as_variable())
            .ok_or(ScriptError::Reference {
                line: self.line,
                arg: arg.map_or(index, |arg| arg.position),
            })
    }

    /// The block body; empty for statements without one.
    pub fn body(&self) -> &'a [StatementNode] {
        self.children.unwrap_or_default()
    }

    pub fn type_error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::Type {
            line: self.line,
            message: format!("`{}`: {}", self.name, message.into()),
        }
    }

    fn arity_error(&self, expected: &'static str) -> ScriptError {
        ScriptError::Arity {
            line: self.line,
            command: self.name.to_string(),
            expected,
            found: self.args.len(),
        }
    }
}

/// A named handler the executor dispatches statements to.
///
/// The handler gets the accumulator and arguments through [`Call`] and returns the new
/// accumulator. It may mutate the environment and perform side effects. Block commands
/// re-enter execution for their body through `exec`.
pub trait Command {
    fn name(&self) -> &str;

    fn execute(
        &self,
        call: Call<'_>,
        env: &mut Environment,
        exec: &Executor,
    ) -> ScriptResult<Value>;
}

/// A command backed by a closure. See [`command_fn`].
pub struct FnCommand<F> {
    name: String,
    handler: F,
}

impl<F> Command for FnCommand<F>
where
    F: Fn(Call<'_>, &mut Environment, &Executor) -> ScriptResult<Value>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(
        &self,
        call: Call<'_>,
        env: &mut Environment,
        exec: &Executor,
    ) -> ScriptResult<Value> {
        (self.handler)(call, env, exec)
    }
}

/// Wrap a closure as a [`Command`] ready for [`CommandRegistry::register`].
pub fn command_fn<F>(name: impl Into<String>, handler: F) -> Box<dyn Command>
where
    F: Fn(Call<'_>, &mut Environment, &Executor) -> ScriptResult<Value> + 'static,
{
    Box::new(FnCommand {
        name: name.into(),
        handler,
    })
}

/// Name-keyed table of commands. Names are validated when a command is registered.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command. Fails for malformed names, the block terminator and duplicates.
    pub fn register(&mut self, command: Box<dyn Command>) -> Result<(), RegistryError> {
        let name = command.name().to_string();
        let well_formed = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !well_formed {
            return Err(RegistryError::InvalidName(name));
        }
        if name == TERMINATOR {
            return Err(RegistryError::Reserved(name));
        }
        if self.commands.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.commands.insert(name, command);
        Ok(())
    }

    /// A registry holding every command of the standard library.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for command in crate::builtin::builtins() {
            let name = command.name().to_string();
            registry.commands.insert(name, command);
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(|c| c.as_ref())
    }

    /// Registered names in alphabetical order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> Box<dyn Command> {
        command_fn(name, |call: Call<'_>, _: &mut Environment, _: &Executor| Ok(call.value))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = CommandRegistry::new();
        registry.register(noop("double_it")).unwrap();
        registry.register(noop("print2")).unwrap();
        assert!(registry.get("double_it").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["double_it", "print2"]);
    }

    #[test]
    fn test_register_rejects_bad_names() {
        let mut registry = CommandRegistry::new();
        assert_eq!(
            registry.register(noop("Print")),
            Err(RegistryError::InvalidName("Print".into()))
        );
        assert_eq!(
            registry.register(noop("two words")),
            Err(RegistryError::InvalidName("two words".into()))
        );
        assert_eq!(
            registry.register(noop("")),
            Err(RegistryError::InvalidName(String::new()))
        );
        assert_eq!(
            registry.register(noop("end")),
            Err(RegistryError::Reserved("end".into()))
        );
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = CommandRegistry::new();
        registry.register(noop("twice")).unwrap();
        assert_eq!(
            registry.register(noop("twice")),
            Err(RegistryError::Duplicate("twice".into()))
        );
    }

    #[test]
    fn test_call_helpers() {
        let statements = crate::parser::parse_program("cmd $name, 1 + 2, \"s\" - 1").unwrap();
        let statement = &statements[0];
        let env = Environment::new();
        let call = Call {
            name: &statement.command,
            value: Value::Nil,
            args: &statement.args,
            line: statement.line,
            children: None,
        };

        assert_eq!(call.variable(0).unwrap(), "name");
        assert!(matches!(
            call.variable(1),
            Err(ScriptError::Reference { line: 1, arg: 1 })
        ));
        assert_eq!(call.eval(1, &env).unwrap(), Value::Number(3));
        assert!(matches!(
            call.eval(2, &env),
            Err(ScriptError::Eval { line: 1, arg: 2, .. })
        ));
        assert_eq!(call.eval_opt(3, &env).unwrap(), None);
        assert!(call.expect_args(3..=3, "three arguments").is_ok());
        let err = call.expect_args(0..=1, "zero or one argument").unwrap_err();
        assert_eq!(
            err.to_string(),
            "line 1: command `cmd` expects zero or one argument, got 3"
        );
        assert!(call.body().is_empty());
    }

    #[test]
    fn test_call_errors_use_written_argument_position() {
        let statements = crate::parser::parse_program("cmd $x,, 1 + \"a\", 7").unwrap();
        let statement = &statements[0];
        let env = Environment::new();
        let call = Call {
            name: &statement.command,
            value: Value::Nil,
            args: &statement.args,
            line: statement.line,
            children: None,
        };

        let err = call.eval(1, &env).unwrap_err();
        assert!(matches!(err, ScriptError::Eval { arg: 2, .. }));
        assert!(err.to_string().starts_with("line 1, argument 3:"));
        assert!(matches!(
            call.variable(2),
            Err(ScriptError::Reference { arg: 3, .. })
        ));

        let parse_err = crate::parser::parse_program("cmd $x,, 1 + ").unwrap_err();
        assert!(parse_err.to_string().starts_with("line 1, argument 3:"));
    }
}
