mod config;
mod input;
mod util;

use std::{
    io::{self, Write as _},
    path::{Path, PathBuf},
    process,
};

use anyhow::Context;
use clap::Parser;
use colored::Colorize as _;
use hardfault_report::{
    analyze, Addr2LineTool, CachingSymbolizer, DebugInfoSymbolizer, Symbolizer,
};

use crate::{
    config::{Backend, Config},
    util::logging::{setup_logging, LevelFilter},
};

#[derive(clap::Parser, Debug)]
#[clap(
    name = "hardfault-report",
    about = "Symbolize and explain ARM Cortex-M hard-fault dumps",
    version
)]
struct Cli {
    /// Fault dump captured from the device. Read from stdin when omitted or `-`.
    dump: Option<PathBuf>,

    /// Firmware image (ELF with debug information) that produced the dump
    #[clap(long, short = 'e', value_name = "ELF")]
    image: Option<PathBuf>,
    /// How addresses are turned into functions and source locations
    #[clap(long, value_enum)]
    backend: Option<Backend>,
    /// addr2line compatible tool used by the external backend
    #[clap(long, value_name = "PATH")]
    addr2line: Option<PathBuf>,
    /// Show full source paths instead of file names
    #[clap(long)]
    full_paths: bool,
    /// Only report the innermost N backtrace frames
    #[clap(long, value_name = "N")]
    backtrace_limit: Option<usize>,
    /// Look up repeated addresses again instead of reusing earlier results
    #[clap(long)]
    no_cache: bool,

    #[clap(long, value_enum, help_heading = "LOG CONFIGURATION")]
    log_level: Option<LevelFilter>,
    /// Location for a JSON log file
    #[clap(long, help_heading = "LOG CONFIGURATION")]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Command line arguments take precedence over every configuration source.
    fn apply(&self, config: &mut Config) {
        if let Some(image) = &self.image {
            config.image = Some(image.clone());
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(addr2line) = &self.addr2line {
            config.addr2line = addr2line.clone();
        }
        if self.full_paths {
            config.full_paths = true;
        }
        if self.backtrace_limit.is_some() {
            config.backtrace_limit = self.backtrace_limit;
        }
        if self.no_cache {
            config.cache_symbols = false;
        }
        if self.log_level.is_some() {
            config.log_level = self.log_level;
        }
    }
}

fn main() {
    if let Err(e) = main_try() {
        eprintln!("{}: {:#}", "error".red().bold(), e);
        process::exit(1);
    }
}

fn main_try() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        config::load_config(&config::search_paths()).context("failed to load configuration")?;
    cli.apply(&mut config);

    let _log_guard = setup_logging(cli.log_file.as_deref(), config.log_level)?;
    tracing::debug!(?config, "effective configuration");

    let image = config.image.as_deref().context(
        "no firmware image given, pass `--image <ELF>` or set `image` in the configuration",
    )?;
    let symbolizer = open_symbolizer(&config, image)?;

    let dump = input::read_dump(cli.dump.as_deref())?;
    let report = analyze(&dump, &symbolizer, &config.report_options());

    let mut stdout = io::stdout().lock();
    write!(stdout, "{report}")?;
    stdout.flush()?;

    Ok(())
}

fn open_symbolizer(config: &Config, image: &Path) -> anyhow::Result<Box<dyn Symbolizer>> {
    let symbolizer: Box<dyn Symbolizer> = match config.backend {
        Backend::External => Box::new(Addr2LineTool::new(&config.addr2line, image)?),
        Backend::Builtin => Box::new(DebugInfoSymbolizer::new(image)?),
    };
    tracing::info!("symbolizing with the {:?} backend", config.backend);

    if config.cache_symbols {
        Ok(Box::new(CachingSymbolizer::new(symbolizer)))
    } else {
        Ok(symbolizer)
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn arguments_override_configuration() {
        let cli = Cli::parse_from([
            "hardfault-report",
            "-e",
            "fw.elf",
            "--backend",
            "builtin",
            "--full-paths",
            "--backtrace-limit",
            "2",
            "--no-cache",
            "--log-level",
            "TRACE",
            "fault.log",
        ]);
        let mut config = Config {
            image: Some(PathBuf::from("other.elf")),
            backtrace_limit: Some(10),
            ..Config::default()
        };

        cli.apply(&mut config);

        assert_eq!(cli.dump, Some(PathBuf::from("fault.log")));
        assert_eq!(
            config,
            Config {
                image: Some(PathBuf::from("fw.elf")),
                backend: Backend::Builtin,
                addr2line: PathBuf::from("arm-none-eabi-addr2line"),
                full_paths: true,
                backtrace_limit: Some(2),
                cache_symbols: false,
                log_level: Some(LevelFilter::Trace),
            }
        );
    }

    #[test]
    fn absent_arguments_keep_configuration() {
        let cli = Cli::parse_from(["hardfault-report"]);
        let configured = Config {
            image: Some(PathBuf::from("fw.elf")),
            backend: Backend::Builtin,
            full_paths: true,
            backtrace_limit: Some(3),
            ..Config::default()
        };
        let mut config = configured.clone();

        cli.apply(&mut config);

        assert_eq!(config, configured);
    }
}
