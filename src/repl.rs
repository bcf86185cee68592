//! Interactive read-eval-print loop: prompt, read a line, evaluate,
//! pretty-print, and bind the last result to `$`. Lines starting with
//! `:` are host commands (`:q` / `:quit`); anything else is unrecognized.
//! This surface is illustrative, not normative (see the external
//! interfaces notes): any embedder that threads expressions in and
//! stringifies results out is conformant.

use colored::Colorize;
use log::warn;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::error::PolyError;
use crate::node::Node;
use crate::parser::read_expr;

const BANNER: &str = "Poly 0.0";
const PROMPT: &str = ">> ";

pub fn run(prelude: Option<&str>) -> crate::error::Result<()> {
    let node = Node::new("repl");
    if let Some(path) = prelude {
        if let Err(e) = node.load_module(path, Some("")) {
            print_error(&e);
        }
    }

    print_banner();

    let mut rl = DefaultEditor::new().map_err(|e| PolyError::Reader(e.to_string()))?;
    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if let Some(command) = line.strip_prefix(':') {
                    if matches!(command, "q" | "quit") {
                        break;
                    }
                    warn!("unrecognized command '{}'", command);
                    println!("{} unrecognized command '{}'", "Warning:".yellow(), command);
                    continue;
                }

                match read_expr(line) {
                    Ok(expr) => match node.eval(&expr) {
                        Ok(result) => {
                            println!("\n{} {}", PROMPT.blue(), result);
                            node.root_env_mut().set("$", result);
                        }
                        Err(e) => print_error(&e),
                    },
                    Err(e) => print_error(&e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                print_error(&PolyError::Reader(e.to_string()));
                break;
            }
        }
    }

    Ok(())
}

fn print_banner() {
    let line = "-".repeat(72);
    println!("{}\n{}\n{}\n", line, BANNER, line);
}

fn print_error(e: &PolyError) {
    println!("{} {}", "Error:".red(), e);
}
