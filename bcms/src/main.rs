use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bassclef::check::check_paths;
use bassclef::error::{Chainable, Result};
use bassclef::postprocess::Postprocessor;
use bassclef::preprocess::preprocess;
use bassclef::{error, prereq, Settings};

mod flags;
mod logger;

use flags::BcmsCmd;

pub fn main() -> ExitCode {
    let flags = flags::Bcms::from_env_or_exit();
    logger::init(flags.verbose);
    tracing::debug!(command = ?flags.subcommand, "starting");

    let result = match flags.subcommand {
        BcmsCmd::Test(_) => test(),
        BcmsCmd::Init(cmd) => init(cmd),
        BcmsCmd::Preprocess(cmd) => run_preprocess(cmd),
        BcmsCmd::Postprocess(cmd) => run_postprocess(cmd),
        BcmsCmd::Check(cmd) => check(cmd),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn settings(config: Option<&Path>) -> Result<Settings> {
    match config {
        Some(path) => Settings::read(path),
        None => Settings::discover("."),
    }
}

fn test() -> Result<ExitCode> {
    let results = prereq::check_all();
    let mut stdout = io::stdout().lock();
    for (prereq, status) in &results {
        let kind = if prereq.required { "required" } else { "optional" };
        writeln!(stdout, "{:<12} {:<8} {status}", prereq.name, kind)
            .chain(error!("failed to write to stdout"))?;

        if !status.is_found() {
            writeln!(stdout, "{:<12} see {}", "", prereq.homepage)
                .chain(error!("failed to write to stdout"))?;

            if let Some(hint) = prereq.hint {
                writeln!(stdout, "{:<12} {hint}", "").chain(error!("failed to write to stdout"))?;
            }
        }
    }

    let satisfied = prereq::satisfied(&results);
    tracing::debug!(satisfied, "checked prerequisites");
    Ok(if satisfied { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn init(cmd: flags::Init) -> Result<ExitCode> {
    let dir = cmd.dir.unwrap_or_else(|| PathBuf::from("."));
    let path = Settings::init(&dir, cmd.force)?;
    println!("wrote {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn run_preprocess(cmd: flags::Preprocess) -> Result<ExitCode> {
    let text = std::fs::read_to_string(&cmd.path).chain_with(|| error! {
        "failed to read page",
        "path" => cmd.path.display(),
    })?;

    io::stdout().lock()
        .write_all(preprocess(&text).as_bytes())
        .chain(error!("failed to write to stdout"))?;

    Ok(ExitCode::SUCCESS)
}

fn run_postprocess(cmd: flags::Postprocess) -> Result<ExitCode> {
    let settings = settings(cmd.config.as_deref())?;
    Postprocessor::standard(&settings).run_io(io::stdin().lock(), io::stdout().lock())?;
    Ok(ExitCode::SUCCESS)
}

fn check(cmd: flags::Check) -> Result<ExitCode> {
    let settings = settings(cmd.config.as_deref())?;
    let paths = match cmd.paths.is_empty() {
        true => vec![settings.content.clone()],
        false => cmd.paths,
    };

    let report = check_paths(&paths, &settings)?;
    tracing::debug!(errors = report.errors, warnings = report.warnings, "check finished");
    match cmd.json {
        true => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{json}");
        }
        false => println!("{report}"),
    }

    Ok(if report.has_errors() { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}
