use anyhow::Result;
use argh::FromArgs;
use linescript::{ExecConfig, Interpreter};
use std::path::PathBuf;

#[derive(FromArgs)]
/// Run a linescript program, or start an interactive session when no script is given.
struct Args {
    #[argh(positional)]
    /// path of the script to run.
    script: Option<PathBuf>,

    #[argh(switch, short = 't')]
    /// print every executed statement to stderr.
    trace: bool,

    #[argh(switch, short = 'p')]
    /// print the final value of the script.
    print_result: bool,

    #[argh(option, default = "64")]
    /// maximum depth of nested function calls.
    max_depth: usize,
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    let mut interp = Interpreter::default().with_config(ExecConfig {
        max_depth: args.max_depth,
        trace: args.trace,
    });

    match &args.script {
        Some(path) => {
            let value = interp.run_file(path)?;
            if args.print_result {
                println!("{}", value.literal());
            }
        }
        None => interp.repl()?,
    }
    Ok(())
}
