use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use planet_microbe_loader::app::{App, LoadOptions, ProgressSink};
use planet_microbe_loader::config::{ConfigLoader, ResolvedConfig};
use planet_microbe_loader::error::LoaderError;
use planet_microbe_loader::output::{JsonOutput, LogProgress, OutputMode, print_summary};
use planet_microbe_loader::store::{DiscardSink, EntitySink, JsonStore};
use planet_microbe_loader::units::UnitConversionTable;

#[derive(Parser)]
#[command(name = "pm-load")]
#[command(about = "Load oceanographic data packages into joined, typed sample records")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true, help = "Print results as JSON")]
    json: bool,

    #[arg(long, global = true, help = "Show debug messages")]
    debug: bool,

    #[arg(long, global = true, help = "Suppress all warnings")]
    nowarn: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Load one or more data packages")]
    Load(LoadArgs),
    #[command(about = "Inspect a unit conversion table")]
    Units(UnitsArgs),
}

#[derive(Args)]
struct LoadArgs {
    #[arg(required = true)]
    packages: Vec<Utf8PathBuf>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long, help = "Unit conversion table (TSV)")]
    units: Option<Utf8PathBuf>,

    #[arg(long, help = "Directory for loaded records")]
    output: Option<Utf8PathBuf>,

    #[arg(long, help = "Join and validate without writing records")]
    dry_run: bool,
}

#[derive(Args)]
struct UnitsArgs {
    table: Utf8PathBuf,

    #[arg(long, requires_all = ["unit", "value"])]
    quantity: Option<String>,

    #[arg(long)]
    unit: Option<String>,

    #[arg(long)]
    value: Option<f64>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<LoaderError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &LoaderError) -> u8 {
    if error.is_structural() {
        2
    } else if error.is_data() {
        3
    } else {
        1
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let level = if cli.nowarn {
        LevelFilter::ERROR
    } else if cli.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    match cli.command {
        Commands::Load(args) => run_load(args, output_mode),
        Commands::Units(args) => run_units(args, output_mode),
    }
}

fn run_load(args: LoadArgs, output_mode: OutputMode) -> miette::Result<()> {
    let mut config = ConfigLoader::resolve(args.config.as_deref())?;
    if let Some(units) = args.units {
        config.unit_conversions = units;
        config.unit_conversions_required = true;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }

    let units = load_units(&config)?;
    let options = LoadOptions {
        coordinate_tolerance: config.coordinate_tolerance,
    };

    if args.dry_run {
        let app = App::new(DiscardSink, units);
        load_all(app, &args.packages, &options, output_mode)
    } else {
        let store = JsonStore::new(config.output_dir.clone());
        info!(output = %store.root(), "writing records");
        let app = App::new(store, units);
        load_all(app, &args.packages, &options, output_mode)
    }
}

fn load_units(config: &ResolvedConfig) -> miette::Result<UnitConversionTable> {
    if !config.unit_conversions_required && !config.unit_conversions.as_std_path().exists() {
        warn!(
            path = %config.unit_conversions,
            "unit conversion table not found; values keep their original units"
        );
        return Ok(UnitConversionTable::default());
    }
    Ok(UnitConversionTable::load(config.unit_conversions.as_std_path())?)
}

fn load_all<S: EntitySink>(
    mut app: App<S>,
    packages: &[Utf8PathBuf],
    options: &LoadOptions,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let progress: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Human => &LogProgress,
    };

    let mut results = Vec::with_capacity(packages.len());
    for path in packages {
        let result = app.load_package(path, options, progress)?;
        if matches!(output_mode, OutputMode::Human) {
            print_summary(&result);
        }
        results.push(result);
    }

    if matches!(output_mode, OutputMode::Json) {
        JsonOutput::print_load(&results).into_diagnostic()?;
    }
    Ok(())
}

fn run_units(args: UnitsArgs, output_mode: OutputMode) -> miette::Result<()> {
    let table = UnitConversionTable::load(args.table.as_std_path())?;

    let (Some(quantity), Some(unit), Some(value)) = (args.quantity, args.unit, args.value) else {
        match output_mode {
            OutputMode::Json => {
                JsonOutput::print_json(&serde_json::json!({ "entries": table.len() }))
                    .into_diagnostic()?;
            }
            OutputMode::Human => println!("{}: {} conversions", args.table, table.len()),
        }
        return Ok(());
    };

    let (converted_unit, converted) = table.convert(&quantity, &unit, value);
    match output_mode {
        OutputMode::Json => JsonOutput::print_json(&serde_json::json!({
            "quantity": quantity,
            "unit": converted_unit,
            "value": converted,
        }))
        .into_diagnostic()?,
        OutputMode::Human => println!("{value} {unit} -> {converted} {converted_unit}"),
    }
    Ok(())
}
