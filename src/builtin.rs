use crate::command::{Call, Command};
use crate::env::Environment;
use crate::error::{BlockError, ScriptError, ScriptResult};
use crate::interpreter::{Executor, Factory};
use crate::value::Value;
use regex::RegexBuilder;
use std::fs;
use std::io::Write;
use std::rc::Rc;

/// Commands of the standard library, known at compile time.
///
/// Each one is a marker type; [`Factory`] wraps it into a registrable [`Command`].
pub(crate) trait BuiltinCommand {
    /// Canonical name of the command, e.g. "print" or "foreach".
    fn name() -> &'static str;

    /// Executes one statement and returns the new accumulator.
    fn execute(call: Call<'_>, env: &mut Environment, exec: &Executor) -> ScriptResult<Value>;
}

impl<T: BuiltinCommand> Command for Factory<T> {
    fn name(&self) -> &str {
        T::name()
    }

    fn execute(
        &self,
        call: Call<'_>,
        env: &mut Environment,
        exec: &Executor,
    ) -> ScriptResult<Value> {
        T::execute(call, env, exec)
    }
}

/// Every builtin, ready to be registered.
pub(crate) fn builtins() -> Vec<Box<dyn Command>> {
    vec![
        Box::new(Factory::<Use>::default()),
        Box::new(Factory::<Store>::default()),
        Box::new(Factory::<Set>::default()),
        Box::new(Factory::<Split>::default()),
        Box::new(Factory::<Join>::default()),
        Box::new(Factory::<Replace>::default()),
        Box::new(Factory::<Print>::default()),
        Box::new(Factory::<Grep>::default()),
        Box::new(Factory::<Foreach>::default()),
        Box::new(Factory::<If>::default()),
        Box::new(Factory::<Elif>::default()),
        Box::new(Factory::<Else>::default()),
        Box::new(Factory::<Function>::default()),
        Box::new(Factory::<CallFunction>::default()),
    ]
}

fn expect_string(call: &Call<'_>, value: Value, what: &str) -> ScriptResult<String> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(call.type_error(format!("{} must be a string, got {}", what, other.kind()))),
    }
}

fn dangling(call: &Call<'_>) -> ScriptError {
    ScriptError::Block {
        line: call.line,
        source: BlockError::DanglingBranch {
            command: call.name.to_string(),
        },
    }
}

/// Read a file into the accumulator.
pub struct Use;

impl BuiltinCommand for Use {
    fn name() -> &'static str {
        "use"
    }

    fn execute(call: Call<'_>, env: &mut Environment, _exec: &Executor) -> ScriptResult<Value> {
        call.expect_args(1..=1, "one argument")?;
        let file = expect_string(&call, call.eval(0, env)?, "path")?;
        let path = env.resolve(&file);
        let text = fs::read_to_string(&path).map_err(|source| ScriptError::Io {
            line: call.line,
            path,
            source,
        })?;
        Ok(Value::Str(text))
    }
}

/// `store $name` saves the accumulator, `store $name, expr` saves the expression.
/// The accumulator passes through unchanged.
pub struct Store;

impl BuiltinCommand for Store {
    fn name() -> &'static str {
        "store"
    }

    fn execute(call: Call<'_>, env: &mut Environment, _exec: &Executor) -> ScriptResult<Value> {
        call.expect_args(1..=2, "one or two arguments")?;
        let name = call.variable(0)?;
        let value = match call.eval_opt(1, env)? {
            Some(value) => value,
            None => call.value.clone(),
        };
        env.set_var(name, value);
        Ok(call.value)
    }
}

/// Replace the accumulator with an expression.
pub struct Set;

impl BuiltinCommand for Set {
    fn name() -> &'static str {
        "set"
    }

    fn execute(call: Call<'_>, env: &mut Environment, _exec: &Executor) -> ScriptResult<Value> {
        call.expect_args(1..=1, "one argument")?;
        call.eval(0, env)
    }
}

/// Split a string accumulator into a list. An empty separator splits into characters.
pub struct Split;

impl BuiltinCommand for Split {
    fn name() -> &'static str {
        "split"
    }

    fn execute(call: Call<'_>, env: &mut Environment, _exec: &Executor) -> ScriptResult<Value> {
        call.expect_args(1..=1, "one argument")?;
        let separator = expect_string(&call, call.eval(0, env)?, "separator")?;
        let text = match &call.value {
            Value::Str(text) => text,
            other => {
                return Err(call.type_error(format!(
                    "accumulator must be a string, got {}",
                    other.kind()
                )));
            }
        };

        let pieces: Vec<Value> = if separator.is_empty() {
            text.chars().map(|c| Value::Str(c.to_string())).collect()
        } else {
            text.split(separator.as_str()).map(Value::from).collect()
        };
        Ok(Value::List(pieces))
    }
}

/// Join a list accumulator into a string, with an optional separator.
pub struct Join;

impl BuiltinCommand for Join {
    fn name() -> &'static str {
        "join"
    }

    fn execute(call: Call<'_>, env: &mut Environment, _exec: &Executor) -> ScriptResult<Value> {
        call.expect_args(0..=1, "zero or one argument")?;
        let separator = match call.eval_opt(0, env)? {
            Some(value) => expect_string(&call, value, "separator")?,
            None => String::new(),
        };
        let items = match &call.value {
            Value::List(items) => items,
            other => {
                return Err(call.type_error(format!(
                    "accumulator must be a list, got {}",
                    other.kind()
                )));
            }
        };

        let parts: Vec<String> = items.iter().map(Value::to_string).collect();
        Ok(Value::Str(parts.join(&separator)))
    }
}

/// Swap the accumulator for a substitute when it equals the match value.
pub struct Replace;

impl BuiltinCommand for Replace {
    fn name() -> &'static str {
        "replace"
    }

    fn execute(call: Call<'_>, env: &mut Environment, _exec: &Executor) -> ScriptResult<Value> {
        call.expect_args(2..=2, "two arguments")?;
        let pattern = call.eval(0, env)?;
        let substitute = call.eval(1, env)?;
        if call.value == pattern {
            Ok(substitute)
        } else {
            Ok(call.value)
        }
    }
}

/// Write the accumulator, or the argument, followed by a newline.
pub struct Print;

impl BuiltinCommand for Print {
    fn name() -> &'static str {
        "print"
    }

    fn execute(call: Call<'_>, env: &mut Environment, _exec: &Executor) -> ScriptResult<Value> {
        call.expect_args(0..=1, "zero or one argument")?;
        let shown = call.eval_opt(0, env)?;
        let line = call.line;
        writeln!(env.out, "{}", shown.as_ref().unwrap_or(&call.value))
            .map_err(|source| ScriptError::Write { line, source })?;
        Ok(call.value)
    }
}

/// Keep the list elements (or the lines of a string) matching a regular expression.
/// A truthy second argument makes the match case-insensitive.
pub struct Grep;

impl BuiltinCommand for Grep {
    fn name() -> &'static str {
        "grep"
    }

    fn execute(call: Call<'_>, env: &mut Environment, _exec: &Executor) -> ScriptResult<Value> {
        call.expect_args(1..=2, "one or two arguments")?;
        let pattern = expect_string(&call, call.eval(0, env)?, "pattern")?;
        let ignore_case = call
            .eval_opt(1, env)?
            .is_some_and(|flag| flag.is_truthy());
        let re = RegexBuilder::new(&pattern)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|source| ScriptError::Pattern {
                line: call.line,
                source,
            })?;

        match call.value {
            Value::List(items) => Ok(Value::List(
                items
                    .into_iter()
                    .filter(|item| re.is_match(&item.to_string()))
                    .collect(),
            )),
            Value::Str(text) => Ok(Value::List(
                text.lines()
                    .filter(|line| re.is_match(line))
                    .map(Value::from)
                    .collect(),
            )),
            other => Err(ScriptError::Type {
                line: call.line,
                message: format!(
                    "`grep`: accumulator must be a list or a string, got {}",
                    other.kind()
                ),
            }),
        }
    }
}

/// Run the body once per list element, with the element as accumulator, and collect
/// the results in place.
pub struct Foreach;

impl BuiltinCommand for Foreach {
    fn name() -> &'static str {
        "foreach"
    }

    fn execute(call: Call<'_>, env: &mut Environment, exec: &Executor) -> ScriptResult<Value> {
        call.expect_args(0..=0, "no arguments")?;
        let body = call.body();
        let items = match call.value {
            Value::List(items) => items,
            other => {
                return Err(ScriptError::Type {
                    line: call.line,
                    message: format!("`foreach`: accumulator must be a list, got {}", other.kind()),
                });
            }
        };

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(exec.execute(body, item, env)?);
        }
        Ok(Value::List(out))
    }
}

/// Runs the branch body when the condition holds and records the outcome so a
/// following `elif`/`else` knows whether to run.
fn run_branch(
    call: Call<'_>,
    env: &mut Environment,
    exec: &Executor,
) -> ScriptResult<Value> {
    call.expect_args(0..=1, "zero or one argument")?;
    let condition = match call.eval_opt(0, env)? {
        Some(value) => value,
        None => call.value.clone(),
    };

    if condition.is_truthy() {
        let value = exec.execute(call.body(), call.value, env)?;
        env.chain = Some(true);
        Ok(value)
    } else {
        env.chain = Some(false);
        Ok(call.value)
    }
}

/// `if [cond]`; without an argument the accumulator is the condition.
pub struct If;

impl BuiltinCommand for If {
    fn name() -> &'static str {
        "if"
    }

    fn execute(call: Call<'_>, env: &mut Environment, exec: &Executor) -> ScriptResult<Value> {
        run_branch(call, env, exec)
    }
}

pub struct Elif;

impl BuiltinCommand for Elif {
    fn name() -> &'static str {
        "elif"
    }

    fn execute(call: Call<'_>, env: &mut Environment, exec: &Executor) -> ScriptResult<Value> {
        let chain = env.chain;
        match chain {
            None => Err(dangling(&call)),
            Some(true) => {
                call.expect_args(0..=1, "zero or one argument")?;
                Ok(call.value)
            }
            Some(false) => run_branch(call, env, exec),
        }
    }
}

pub struct Else;

impl BuiltinCommand for Else {
    fn name() -> &'static str {
        "else"
    }

    fn execute(call: Call<'_>, env: &mut Environment, exec: &Executor) -> ScriptResult<Value> {
        call.expect_args(0..=0, "no arguments")?;
        let taken = env.chain.take().ok_or_else(|| dangling(&call))?;
        if taken {
            Ok(call.value)
        } else {
            exec.execute(call.body(), call.value, env)
        }
    }
}

/// `function $name` keeps a copy of the body for later `call $name`.
pub struct Function;

impl BuiltinCommand for Function {
    fn name() -> &'static str {
        "function"
    }

    fn execute(call: Call<'_>, env: &mut Environment, _exec: &Executor) -> ScriptResult<Value> {
        call.expect_args(1..=1, "one argument")?;
        let name = call.variable(0)?;
        env.functions
            .insert(name.to_string(), Rc::from(call.body().to_vec()));
        Ok(call.value)
    }
}

/// `call $name` runs a function body with the current accumulator.
pub struct CallFunction;

impl BuiltinCommand for CallFunction {
    fn name() -> &'static str {
        "call"
    }

    fn execute(call: Call<'_>, env: &mut Environment, exec: &Executor) -> ScriptResult<Value> {
        call.expect_args(1..=1, "one argument")?;
        let name = call.variable(0)?;
        let body = env
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptError::UndefinedFunction {
                line: call.line,
                name: name.to_string(),
            })?;

        let limit = exec.config().max_depth;
        if env.depth >= limit {
            return Err(ScriptError::Recursion {
                line: call.line,
                limit,
            });
        }

        env.depth += 1;
        let result = exec.execute(&body, call.value, env);
        env.depth -= 1;
        result
    }
}
