use crate::block::{build_blocks, StatementNode};
use crate::command::{Call, CommandRegistry};
use crate::env::Environment;
use crate::error::{BlockError, EvalError, ScriptError, ScriptResult};
use crate::lexer::TokenKind;
use crate::parser::{parse_program, Expr};
use crate::value::Value;
use anyhow::Context;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;
use std::path::Path;

/// Factory turns a [`BuiltinCommand`](crate::builtin::BuiltinCommand) type into a
/// registrable [`Command`](crate::command::Command).
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Execution settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecConfig {
    /// Maximum number of nested `call`s before the run fails.
    pub max_depth: usize,
    /// Write `line N: command` to stderr for every dispatched statement.
    pub trace: bool,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            trace: false,
        }
    }
}

/// Evaluate an expression tree against the environment.
///
/// Undefined variables evaluate to [`Value::Nil`]. Operators are defined over numbers
/// only; `/` truncates toward zero.
pub fn evaluate(expr: &Expr, env: &Environment) -> Result<Value, EvalError> {
    match expr {
        Expr::Leaf(token) => match token.kind {
            TokenKind::String => Ok(Value::Str(token.value.clone())),
            TokenKind::Number => token
                .value
                .parse::<i64>()
                .map(Value::Number)
                .map_err(|_| EvalError::LiteralOutOfRange(token.value.clone())),
            TokenKind::Variable => Ok(env.get_var(&token.value)),
            TokenKind::Operator => Err(EvalError::UnknownOperator(token.value.clone())),
        },
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, env)?;
            let right = evaluate(right, env)?;
            apply(&op.value, &left, &right)
        }
    }
}

fn apply(op: &str, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let (a, b) = match (left, right) {
        (Value::Number(a), Value::Number(b)) => (*a, *b),
        _ => {
            return Err(EvalError::Type {
                op: op.to_string(),
                left: left.kind(),
                right: right.kind(),
            });
        }
    };

    let result = match op {
        "+" => a.checked_add(b),
        "-" => a.checked_sub(b),
        "*" => a.checked_mul(b),
        "/" if b == 0 => return Err(EvalError::DivisionByZero),
        "/" => a.checked_div(b),
        "&" => Some(a & b),
        "|" => Some(a | b),
        "^" => Some(a ^ b),
        other => return Err(EvalError::UnknownOperator(other.to_string())),
    };
    result
        .map(Value::Number)
        .ok_or_else(|| EvalError::Overflow(op.to_string()))
}

/// Parse source text and assemble its block tree.
pub fn compile(source: &str) -> ScriptResult<Vec<StatementNode>> {
    let statements = parse_program(source)?;
    build_blocks(&statements)
}

/// Walks statement trees, dispatching every statement to its registered command.
pub struct Executor {
    registry: CommandRegistry,
    config: ExecConfig,
}

impl Executor {
    pub fn new(registry: CommandRegistry, config: ExecConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// Run `nodes` in order, threading the accumulator from one statement to the next.
    ///
    /// Block commands call this again for their bodies. The first error stops the run.
    /// A conditional chain only spans siblings: the chain state of the caller is put
    /// aside while `nodes` run and restored afterwards.
    pub fn execute(
        &self,
        nodes: &[StatementNode],
        value: Value,
        env: &mut Environment,
    ) -> ScriptResult<Value> {
        let outer = env.chain.take();
        let result = self.execute_siblings(nodes, value, env);
        env.chain = outer;
        result
    }

    fn execute_siblings(
        &self,
        nodes: &[StatementNode],
        mut value: Value,
        env: &mut Environment,
    ) -> ScriptResult<Value> {
        for node in nodes {
            let statement = &node.statement;
            let command = self
                .registry
                .get(&statement.command)
                .ok_or_else(|| ScriptError::Lookup {
                    line: statement.line,
                    command: statement.command.clone(),
                })?;

            if !matches!(statement.command.as_str(), "elif" | "else") {
                env.chain = None;
            }
            if self.config.trace {
                eprintln!("line {}: {}", statement.line, statement.command);
            }

            let call = Call {
                name: &statement.command,
                value,
                args: &statement.args,
                line: statement.line,
                children: node.children.as_deref(),
            };
            value = command.execute(call, env, self)?;
        }
        Ok(value)
    }
}

/// Runs programs against one persistent [`Environment`].
///
/// Example
/// ```
/// use linescript::{Interpreter, Value};
/// let mut script = Interpreter::default();
/// let value = script.run("set 1 + 2 * 3\nstore $x").unwrap();
/// assert_eq!(value, Value::Number(7));
/// assert_eq!(script.env().get_var("x"), Value::Number(7));
/// ```
pub struct Interpreter {
    env: Environment,
    executor: Executor,
}

impl Interpreter {
    /// Create an interpreter with a custom command registry.
    pub fn new(registry: CommandRegistry) -> Self {
        Self {
            env: Environment::new(),
            executor: Executor::new(registry, ExecConfig::default()),
        }
    }

    pub fn with_config(mut self, config: ExecConfig) -> Self {
        self.executor.config = config;
        self
    }

    pub fn with_environment(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    /// Send `print` output to `out` instead of stdout.
    pub fn with_output(mut self, out: impl Write + 'static) -> Self {
        self.env.out = Box::new(out);
        self
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Run a whole program, starting from a nil accumulator.
    ///
    /// Returns the final accumulator.
    pub fn run(&mut self, source: &str) -> ScriptResult<Value> {
        self.resume(source, Value::Nil)
    }

    /// Run a program starting from an existing accumulator value.
    pub fn resume(&mut self, source: &str, value: Value) -> ScriptResult<Value> {
        let program = compile(source)?;
        self.env.chain = None;
        self.executor.execute(&program, value, &mut self.env)
    }

    /// Run a script file. Relative paths inside the script resolve against its directory.
    pub fn run_file(&mut self, path: impl AsRef<Path>) -> anyhow::Result<Value> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("can't read script {}", path.display()))?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            self.env.base_dir = self.env.resolve(dir);
        }
        Ok(self.run(&source)?)
    }

    /// Interactive session. The environment and the accumulator carry over between
    /// entries; while a block is open further lines are read before running.
    pub fn repl(&mut self) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;
        let mut pending = String::new();
        let mut value = Value::Nil;

        loop {
            let prompt = if pending.is_empty() { "> " } else { ". " };
            match rl.readline(prompt) {
                Ok(line) => {
                    rl.add_history_entry(line.as_str())?;
                    pending.push_str(&line);
                    pending.push('\n');

                    let program = match compile(&pending) {
                        Ok(program) => program,
                        Err(ScriptError::Block {
                            source: BlockError::Unclosed { .. },
                            ..
                        }) => continue,
                        Err(err) => {
                            eprintln!("error: {}", err);
                            pending.clear();
                            continue;
                        }
                    };
                    pending.clear();
                    self.env.chain = None;

                    match self.executor.execute(&program, value.clone(), &mut self.env) {
                        Ok(next) => {
                            if next != Value::Nil {
                                println!("=> {}", next.literal());
                            }
                            value = next;
                        }
                        Err(err) => eprintln!("error: {}", err),
                    }
                }
                Err(ReadlineError::Interrupted) if !pending.is_empty() => pending.clear(),
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the standard command library, writing to stdout.
    fn default() -> Self {
        Self::new(CommandRegistry::with_builtins())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::command_fn;
    use crate::io_adapters::MemWriter;
    use crate::lexer::tokenize;
    use crate::parser::parse_expression;
    use std::cell::Cell;
    use std::rc::Rc;

    fn eval_str(src: &str, env: &Environment) -> Result<Value, EvalError> {
        evaluate(&parse_expression(tokenize(src).unwrap()).unwrap(), env)
    }

    #[test]
    fn test_precedence_evaluates_correctly() {
        let env = Environment::new();
        assert_eq!(eval_str("1+2*3", &env), Ok(Value::Number(7)));
        assert_eq!(eval_str("(1+2)*3", &env), Ok(Value::Number(9)));
        assert_eq!(eval_str("10 - 4 - 3", &env), Ok(Value::Number(3)));
        assert_eq!(eval_str("100 / 10 / 5", &env), Ok(Value::Number(2)));
        assert_eq!(eval_str("7 / 2", &env), Ok(Value::Number(3)));
        assert_eq!(eval_str("2 - (10 - 3)", &env), Ok(Value::Number(-5)));
    }

    #[test]
    fn test_bitwise_mixed_with_arithmetic() {
        let env = Environment::new();
        assert_eq!(eval_str("1 | 2 & 3", &env), Ok(Value::Number(3)));
        assert_eq!(eval_str("6 & 3 + 1", &env), Ok(Value::Number(4)));
        assert_eq!(eval_str("1 + 2 ^ 3", &env), Ok(Value::Number(0)));
        assert_eq!(eval_str("12 ^ 10 | 1", &env), Ok(Value::Number(12 ^ 11)));
    }

    #[test]
    fn test_variables() {
        let mut env = Environment::new();
        env.set_var("x", Value::Number(5));
        env.set_var("s", Value::from("text"));
        assert_eq!(eval_str("$x * $x - 1", &env), Ok(Value::Number(24)));
        assert_eq!(eval_str("$s", &env), Ok(Value::from("text")));
        assert_eq!(eval_str("$missing", &env), Ok(Value::Nil));
    }

    #[test]
    fn test_type_and_arithmetic_errors() {
        let mut env = Environment::new();
        env.set_var("s", Value::from("text"));
        assert_eq!(
            eval_str("$s + 1", &env),
            Err(EvalError::Type {
                op: "+".into(),
                left: "string",
                right: "number"
            })
        );
        assert!(matches!(eval_str("1 & $nothing", &env), Err(EvalError::Type { .. })));
        assert_eq!(eval_str("1 / (2 - 2)", &env), Err(EvalError::DivisionByZero));
        assert_eq!(
            eval_str("9223372036854775807 + 1", &env),
            Err(EvalError::Overflow("+".into()))
        );
        assert_eq!(
            eval_str("99999999999999999999", &env),
            Err(EvalError::LiteralOutOfRange("99999999999999999999".into()))
        );
    }

    #[test]
    fn test_literals_round_trip() {
        let env = Environment::new();
        let values = [
            Value::Number(0),
            Value::Number(42),
            Value::Number(i64::MAX),
            Value::from(""),
            Value::from("plain"),
            Value::from("quote \" backslash \\ tab \t newline \n"),
        ];
        for value in values {
            assert_eq!(eval_str(&value.literal(), &env), Ok(value.clone()));
        }
    }

    #[test]
    fn test_unknown_command_stops_the_run() {
        let counter = Rc::new(Cell::new(0));
        let seen = counter.clone();
        let mut registry = CommandRegistry::with_builtins();
        registry
            .register(command_fn(
                "tick",
                move |call: Call<'_>, _: &mut Environment, _: &Executor| {
                    seen.set(seen.get() + 1);
                    Ok(call.value)
                },
            ))
            .unwrap();

        let mut interp = Interpreter::new(registry);
        let err = interp.run("tick\ntick\n\nfroble 1\ntick").unwrap_err();

        assert!(matches!(err, ScriptError::Lookup { line: 4, ref command } if command == "froble"));
        assert_eq!(err.to_string(), "line 4: command `froble` not found");
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_accumulator_threads_through_statements() {
        let mut registry = CommandRegistry::new();
        registry
            .register(command_fn(
                "inc",
                |call: Call<'_>, _: &mut Environment, _: &Executor| match &call.value {
                    Value::Nil => Ok(Value::Number(1)),
                    Value::Number(n) => Ok(Value::Number(n + 1)),
                    other => Err(call.type_error(format!("can't increment {}", other.kind()))),
                },
            ))
            .unwrap();
        let mut interp = Interpreter::new(registry);
        assert_eq!(interp.run("inc\ninc\ninc").unwrap(), Value::Number(3));

        let err = interp.resume("inc", Value::from("x")).unwrap_err();
        assert_eq!(err.to_string(), "line 1: `inc`: can't increment string");
    }

    #[test]
    fn test_output_capture_and_persistent_environment() {
        let (writer, handle) = MemWriter::with_handle();
        let mut interp = Interpreter::default().with_output(writer);

        interp.run("store $x, 40").unwrap();
        interp.run("print $x + 2").unwrap();

        assert_eq!(String::from_utf8(handle.borrow().clone()).unwrap(), "42\n");
    }

    #[test]
    fn test_resume_continues_from_accumulator() {
        let mut interp = Interpreter::default();
        let value = interp.resume("split \",\"", Value::from("a,b")).unwrap();
        assert_eq!(value, Value::from(vec!["a", "b"]));
    }

    #[test]
    fn test_chain_does_not_outlive_its_block() {
        let (writer, handle) = MemWriter::with_handle();
        let mut interp = Interpreter::default().with_output(writer);

        let src = "set \"a\"\nsplit \",\"\nforeach\nif 0\nend\nend\nelse\nprint \"leaked\"\nend";
        let err = interp.run(src).unwrap_err();
        assert!(matches!(
            err,
            ScriptError::Block {
                line: 7,
                source: BlockError::DanglingBranch { .. }
            }
        ));

        interp.run("if 0\nend").unwrap();
        assert_eq!(interp.env().chain, None);
        let err = interp.run("else\nprint \"stale\"\nend").unwrap_err();
        assert!(matches!(
            err,
            ScriptError::Block {
                line: 1,
                source: BlockError::DanglingBranch { .. }
            }
        ));
        assert!(handle.borrow().is_empty());
    }

    #[test]
    fn test_compile_reports_first_error() {
        assert!(matches!(compile("print 1 +"), Err(ScriptError::Parse { line: 1, .. })));
        assert!(matches!(compile("if 1\nprint"), Err(ScriptError::Block { line: 1, .. })));
        assert_eq!(compile("# nothing\n").unwrap(), Vec::new());
    }
}
