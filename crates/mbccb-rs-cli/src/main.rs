// src/main.rs

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use mbccb_rs_cli::{Cli, run};

fn main() -> ExitCode {
    // Usage errors exit with code 2 from inside clap.
    let cli = Cli::parse();
    init_logger(&cli);

    let stdout = std::io::stdout();
    match run(&cli, &mut stdout.lock(), &mut std::io::stderr()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", cli.input.display(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_logger(cli: &Cli) {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli.default_log_filter()),
    )
    .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
    .init();
}
