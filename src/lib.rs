//! A small line-oriented scripting language.
//!
//! A program is one command per line: `<command> <arg1>, <arg2>, ...`, where every
//! argument is an expression over numbers, strings and `$variables`. Statements are
//! grouped into blocks (`foreach`, `if`/`elif`/`else`, `function`, closed by `end`) and
//! executed in order, each command receiving the value the previous one produced.
//!
//! The main entry point is [`Interpreter`]. The public modules [`command`] and
//! [`env`] expose the traits and types needed to register your own commands.
//!
//! ```
//! let value = linescript::run("set \"a,b,c\"\nsplit \",\"\njoin \"+\"").unwrap();
//! assert_eq!(value, linescript::Value::from("a+b+c"));
//! ```

mod builtin;
pub mod block;
pub mod command;
pub mod env;
pub mod error;
mod interpreter;
pub mod io_adapters;
pub mod lexer;
pub mod parser;
mod value;

pub use error::{ScriptError, ScriptResult};
pub use interpreter::{compile, evaluate, ExecConfig, Executor, Interpreter};
pub use value::Value;

/// Run a program with the standard command library and return its final value.
///
/// `print` writes to stdout and relative paths resolve against the current directory.
pub fn run(source: &str) -> ScriptResult<Value> {
    Interpreter::default().run(source)
}
