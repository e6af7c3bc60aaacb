use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::info;
use requisition_fill::report::{misses_to_xlsx, write_misses_csv};
use requisition_fill::{transform, Config, Report};

pub fn make_app() -> Command {
    Command::new("requisition-fill")
        .about("Fill department requisition sheets from the latest pending detail sheet")
        .arg(
            Arg::new("input")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Workbook holding the pending detail sheet, roster and templates"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Where to write the filled workbook"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_parser(clap::value_parser!(PathBuf))
                .help("YAML file overriding sheet names, layout and policies"),
        )
        .arg(
            Arg::new("misses")
                .long("misses")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Write unplaced quantities to a .csv or .xlsx file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the report as JSON on stdout"),
        )
}

fn main() {
    // Load .env file if present (for local configuration)
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = make_app().get_matches();

    if let Err(e) = run(&matches) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;

    let input = matches
        .get_one::<PathBuf>("input")
        .context("input workbook is required")?;
    let bytes = std::fs::read(input)
        .with_context(|| format!("Failed to read '{}'", input.display()))?;

    let outcome = transform(&bytes, &config)
        .with_context(|| format!("Failed to process '{}'", input.display()))?;
    let report = &outcome.report;

    for diagnostic in &report.diagnostics {
        eprintln!("{}", diagnostic);
    }

    let output = output_path(matches, input, &config, &report.date);
    create_output_directory_for_path(&output)?;
    std::fs::write(&output, &outcome.workbook)
        .with_context(|| format!("Failed to write '{}'", output.display()))?;
    info!("wrote {}", output.display());

    if let Some(path) = matches.get_one::<PathBuf>("misses") {
        write_miss_report(path, report)?;
    }

    if matches.get_flag("json") {
        serde_json::to_writer_pretty(std::io::stdout(), report)?;
        println!();
    }

    Ok(())
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .or_else(|| std::env::var_os("REQFILL_CONFIG").map(PathBuf::from));

    match path {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config '{}'", path.display())),
        None => Ok(Config::default()),
    }
}

fn output_path(matches: &ArgMatches, input: &Path, config: &Config, date: &str) -> PathBuf {
    if let Some(path) = matches.get_one::<PathBuf>("output") {
        return path.clone();
    }

    let file_name = config.output_file.replace("{date}", date);
    let dir = std::env::var_os("REQFILL_OUTPUT_DIR")
        .map(PathBuf::from)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(file_name)
}

fn write_miss_report(path: &Path, report: &Report) -> Result<()> {
    create_output_directory_for_path(path)?;
    let is_xlsx = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));

    if is_xlsx {
        let bytes = misses_to_xlsx(&report.misses)?;
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
    } else {
        let file = File::create(path)
            .with_context(|| format!("Failed to create '{}'", path.display()))?;
        write_misses_csv(&report.misses, file)?;
    }

    info!("wrote {} misses to {}", report.misses.len(), path.display());
    Ok(())
}

fn create_output_directory_for_path(file_path: &Path) -> Result<()> {
    if let Some(parent_dir) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent_dir)
            .with_context(|| format!("Failed to create directory '{}'", parent_dir.display()))?;
    }
    Ok(())
}
