use crate::block::StatementNode;
use crate::value::Value;
use std::collections::HashMap;
use std::env as stdenv;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Mutable state of one program run, passed by reference to every command.
///
/// The environment contains:
/// - `vars`: the global variables. There is no scoping; every block sees the same map.
/// - `functions`: bodies registered by `function`, copied out of the statement tree.
/// - `chain`: whether the current `if`/`elif` chain already ran a branch.
/// - `depth`: number of nested `call`s currently executing.
/// - `base_dir`: the directory relative paths (e.g. for `use`) resolve against.
/// - `out`: where `print` writes.
pub struct Environment {
    pub vars: HashMap<String, Value>,
    pub functions: HashMap<String, Rc<[StatementNode]>>,
    /// `None` outside a conditional chain, otherwise `Some(taken)`.
    pub chain: Option<bool>,
    pub depth: usize,
    pub base_dir: PathBuf,
    pub out: Box<dyn Write>,
}

impl Environment {
    /// Create an empty environment writing to stdout, rooted at the current directory.
    pub fn new() -> Self {
        let base_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars: HashMap::new(),
            functions: HashMap::new(),
            chain: None,
            depth: 0,
            base_dir,
            out: Box::new(std::io::stdout()),
        }
    }

    pub fn with_output(mut self, out: impl Write + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Value of a variable; undefined variables read as [`Value::Nil`].
    pub fn get_var(&self, name: &str) -> Value {
        self.vars.get(name).cloned().unwrap_or_default()
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Resolve `path` against [`Environment::base_dir`] unless it is absolute.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut functions: Vec<&String> = self.functions.keys().collect();
        functions.sort();
        f.debug_struct("Environment")
            .field("vars", &self.vars)
            .field("functions", &functions)
            .field("chain", &self.chain)
            .field("depth", &self.depth)
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}
