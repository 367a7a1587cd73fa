#![forbid(unsafe_code)]

//! mhs — Mount Health Sentinel CLI entry point.

use clap::Parser;

mod cli_app;

fn main() {
    // Malformed invocations are UNKNOWN to the hosting monitoring system,
    // not clap's default exit code. Help and version stay on their normal
    // success path.
    let cli = match cli_app::Cli::try_parse() {
        Ok(cli) => cli,
        Err(error)
            if matches!(
                error.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) =>
        {
            let _ = error.print();
            std::process::exit(0);
        }
        Err(error) => {
            println!("UNKNOWN: {error}");
            std::process::exit(3);
        }
    };
    std::process::exit(cli_app::run(&cli));
}
