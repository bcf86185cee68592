use clap::{App, Arg, SubCommand};
use env_logger::{Builder, Env};
use log::LevelFilter;

use poly::error::Result;

fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("rustyline", LevelFilter::Warn)
        .init();

    let matches = App::new("poly")
        .version("0.1")
        .about("Interpreter for a small homoiconic expression language")
        .subcommand(
            SubCommand::with_name("repl")
                .about("Start an interactive read-eval-print loop")
                .arg(
                    Arg::with_name("prelude")
                        .long("prelude")
                        .takes_value(true)
                        .help("Path to a module loaded into the root env before the prompt"),
                ),
        )
        .subcommand(
            SubCommand::with_name("serve")
                .about("Start the illustrative HTTP eval/completions server")
                .arg(
                    Arg::with_name("port")
                        .long("port")
                        .takes_value(true)
                        .default_value("8000")
                        .help("TCP port to listen on"),
                )
                .arg(
                    Arg::with_name("prelude")
                        .long("prelude")
                        .takes_value(true)
                        .help("Path to a module loaded into the root env before serving"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("serve", sub)) => {
            let port: u16 = sub
                .value_of("port")
                .unwrap()
                .parse()
                .expect("--port must be a valid TCP port number");
            poly::server::run(port, sub.value_of("prelude"))
        }
        _ => {
            let prelude = matches
                .subcommand_matches("repl")
                .and_then(|sub| sub.value_of("prelude"));
            poly::repl::run(prelude)
        }
    }
}
