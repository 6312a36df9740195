use clap::Parser;
use eyre::WrapErr;

mod cli;
mod error_fmt;
mod logging;
mod ops;

use cli::{Cli, JSON_MODE};
use error_fmt::{exit_code_for_error, format_error_json, humanize};

fn load_config(cli: &Cli) -> eyre::Result<trak_config::Config> {
    let mut cfg = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("read config {}", path.display()))?;
            trak_config::load_toml(&text)
                .wrap_err_with(|| format!("parse config {}", path.display()))?
        }
        None => trak_config::Config::default(),
    };
    if let Some(port) = &cli.port {
        cfg.link.port = port.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}

fn run(cli: &Cli) -> eyre::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let cfg = load_config(cli)?;
    let level = cli
        .log_level
        .as_deref()
        .or(cfg.logging.level.as_deref())
        .unwrap_or("warn");
    let guard = logging::init_tracing(level, cli.json, &cfg.logging)?;
    tracing::debug!(port = %cfg.link.port, "config loaded");
    ops::execute(cli, &cfg).map(|()| guard)
}

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error hooks: {e}");
    }

    match run(&cli) {
        Ok(guard) => drop(guard),
        Err(e) => {
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            std::process::exit(exit_code_for_error(&e));
        }
    }
}
