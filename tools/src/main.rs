//! crossing-runner: headless runner for the fiscal crossing engine.
//!
//! Usage:
//!   crossing-runner --db fiscal.db --company c-001 --period 10/2025
//!   crossing-runner --db fiscal.db --batch --period 10/2025
//!   crossing-runner --db fiscal.db --report --years 3
//!   crossing-runner --db fiscal.db --ipc-mode

use anyhow::{bail, Result};
use fiscal_crossing_core::{
    clock::CrossingClock, config::CrossingConfig, engine::CrossingEngine, store::FiscalStore,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// One JSON command per stdin line in IPC mode.
#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    RunAllChecks { company_id: String, period: String },
    CheckRevenue { company_id: String, period: String },
    CheckSublimits { company_id: String, year: i32 },
    CheckWithholding { company_id: String, period: String },
    DetectOmitted { period: String },
    DetectDelinquent { period: String },
    RunBatch { period: String },
    Report { years: u32 },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");
    let period = flag_value(&args, "--period");
    let company = flag_value(&args, "--company");
    let years = parse_arg(&args, "--years", 5u32);
    let has = |flag: &str| args.iter().any(|a| a == flag);

    let store = FiscalStore::open(db)?;
    store.migrate()?;
    let engine = CrossingEngine::build(store, load_config(data_dir)?, CrossingClock::system())?;

    if has("--ipc-mode") {
        return run_ipc_loop(&engine);
    }

    let output = if has("--report") {
        serde_json::to_value(engine.build_multi_year_report(years)?)?
    } else if has("--batch") {
        let Some(period) = period else {
            bail!("--batch needs --period MM/YYYY");
        };
        serde_json::to_value(engine.run_batch(period)?)?
    } else if let (Some(company), Some(period)) = (company, period) {
        serde_json::to_value(engine.run_all_checks(company, period)?)?
    } else {
        bail!("nothing to do: pass --company ID --period MM/YYYY, --batch --period MM/YYYY or --report [--years N]");
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// `{data_dir}/crossing/crossing_config.json` when present, defaults otherwise.
fn load_config(data_dir: &str) -> Result<CrossingConfig> {
    let path = Path::new(data_dir).join("crossing").join("crossing_config.json");
    if path.exists() {
        CrossingConfig::load(data_dir)
    } else {
        log::warn!("{} not found, using default configuration", path.display());
        Ok(CrossingConfig::default())
    }
}

fn run_ipc_loop(engine: &CrossingEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        if handle.read_line(&mut buffer)? == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<IpcCommand>(&buffer) {
            Ok(IpcCommand::Quit) => break,
            Ok(cmd) => handle_command(engine, cmd)
                .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() })),
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(engine: &CrossingEngine, cmd: IpcCommand) -> Result<serde_json::Value> {
    let value = match cmd {
        IpcCommand::RunAllChecks { company_id, period } => {
            serde_json::to_value(engine.run_all_checks(&company_id, &period)?)?
        }
        IpcCommand::CheckRevenue { company_id, period } => {
            serde_json::to_value(engine.check_revenue_vs_invoices(&company_id, &period)?)?
        }
        IpcCommand::CheckSublimits { company_id, year } => {
            serde_json::to_value(engine.check_sublimits(&company_id, year)?)?
        }
        IpcCommand::CheckWithholding { company_id, period } => {
            serde_json::to_value(engine.check_withholding(&company_id, &period)?)?
        }
        IpcCommand::DetectOmitted { period } => serde_json::to_value(engine.detect_omitted(&period)?)?,
        IpcCommand::DetectDelinquent { period } => serde_json::to_value(engine.detect_delinquent(&period)?)?,
        IpcCommand::RunBatch { period } => serde_json::to_value(engine.run_batch(&period)?)?,
        IpcCommand::Report { years } => serde_json::to_value(engine.build_multi_year_report(years)?)?,
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(value)
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
