//! HICP Shock CLI - Profile EU27 inflation from Eurostat HICP workbooks
//!
//! # Main Commands
//!
//! ```bash
//! hicp-shock run data/                       # Full analysis, JSON to stdout
//! hicp-shock run data/ --impute -o out.json  # Impute incomplete profiles
//! ```
//!
//! # Inspection Commands
//!
//! ```bash
//! hicp-shock sheets data/hicp_main_categories_eu.xlsx       # List summary entries
//! hicp-shock clean data/coicop_weights_eu.xlsx -l weights   # Cleaned long CSV
//! hicp-shock manifest                                       # Default manifest
//! hicp-shock validate manifest.json                         # Check a manifest
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use hicp_shock::config::parse_period;
use hicp_shock::{
    clean, load_source, load_summary, open_workbook, validate_manifest, AnalysisConfig, DatasetKind, LongTable,
    MissingPolicy, ProfileStatistic, SheetLayout, SourceManifest, Workbook,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "hicp-shock")]
#[command(about = "Load, clean and profile Eurostat HICP workbooks", long_about = None)]
struct Cli {
    /// Do not echo the run log to stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis over a data directory
    Run {
        /// Directory holding the source workbooks (default: HICP_DATA_DIR or ./data)
        data_dir: Option<PathBuf>,

        /// Source manifest JSON (default: the three Eurostat workbooks)
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// First month of the analysis window (YYYY-MM)
        #[arg(long)]
        window_start: Option<String>,

        /// Last month of the analysis window (YYYY-MM)
        #[arg(long)]
        window_end: Option<String>,

        /// Number of principal components
        #[arg(short, long)]
        components: Option<usize>,

        /// Minimum observed months per series in the window
        #[arg(long)]
        min_observations: Option<usize>,

        /// Window statistic used for the country profiles
        #[arg(long, value_enum, default_value = "mean")]
        statistic: ProfileStatistic,

        /// Impute incomplete profiles with the category mean instead of excluding them
        #[arg(long)]
        impute: bool,

        /// Write each cleaned long table as CSV into this directory
        #[arg(long)]
        export_dir: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the data sheets of a workbook's summary sheet
    Sheets {
        /// Workbook file or CSV sheet directory
        workbook: PathBuf,

        /// Layout of the workbook
        #[arg(short, long, value_enum, default_value = "main")]
        layout: LayoutArg,
    },

    /// Load and clean one workbook into a long CSV table
    Clean {
        /// Workbook file or CSV sheet directory
        workbook: PathBuf,

        /// Layout of the workbook
        #[arg(short, long, value_enum, default_value = "main")]
        layout: LayoutArg,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the default source manifest
    Manifest,

    /// Validate a source manifest against the schema
    Validate {
        /// Manifest JSON file
        input: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Main,
    Details,
    Weights,
}

impl From<LayoutArg> for DatasetKind {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Main => DatasetKind::Main,
            LayoutArg::Details => DatasetKind::Details,
            LayoutArg::Weights => DatasetKind::Weights,
        }
    }
}

struct RunArgs {
    data_dir: Option<PathBuf>,
    manifest: Option<PathBuf>,
    window_start: Option<String>,
    window_end: Option<String>,
    components: Option<usize>,
    min_observations: Option<usize>,
    statistic: ProfileStatistic,
    impute: bool,
    export_dir: Option<PathBuf>,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    hicp_shock::logs::RUN_LOG.set_quiet(cli.quiet);

    let result = match cli.command {
        Commands::Run {
            data_dir,
            manifest,
            window_start,
            window_end,
            components,
            min_observations,
            statistic,
            impute,
            export_dir,
            output,
        } => cmd_run(
            RunArgs {
                data_dir,
                manifest,
                window_start,
                window_end,
                components,
                min_observations,
                statistic,
                impute,
                export_dir,
            },
            output.as_deref(),
        ),

        Commands::Sheets { workbook, layout } => cmd_sheets(&workbook, layout.into()),

        Commands::Clean { workbook, layout, output } => cmd_clean(&workbook, layout.into(), output.as_deref()),

        Commands::Manifest => cmd_manifest(),

        Commands::Validate { input } => cmd_validate(&input),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(args: RunArgs, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AnalysisConfig::from_env()?;

    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(path) = args.manifest {
        eprintln!("📋 Manifest: {}", path.display());
        config.manifest = SourceManifest::from_file(&path)?;
    }
    let start = match args.window_start {
        Some(s) => parse_period(&s)?,
        None => config.window.start,
    };
    let end = match args.window_end {
        Some(s) => parse_period(&s)?,
        None => config.window.end,
    };
    config.set_window(start, end)?;
    if let Some(c) = args.components {
        config.components = c;
    }
    if let Some(n) = args.min_observations {
        config.min_observations = n;
    }
    config.statistic = args.statistic;
    if args.impute {
        config.missing_policy = MissingPolicy::ImputeMean;
    }
    config.export_dir = args.export_dir;

    eprintln!("📂 Data directory: {}", config.data_dir.display());
    let result = hicp_shock::run(&config)?;

    if let Some(ref error) = result.report.profile_error {
        eprintln!("⚠️  No embedding produced: {}", error);
    }

    let json = serde_json::to_string_pretty(&result)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_sheets(workbook: &Path, kind: DatasetKind) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Reading summary: {}", workbook.display());

    let layout = SheetLayout::for_dataset(kind);
    let mut wb = open_workbook(workbook)?;
    eprintln!("   Sheets: {}", wb.sheet_names().len());

    let entries = load_summary(wb.as_mut(), &layout)?;
    for entry in &entries {
        match entry.base {
            Some(ref base) => println!("{}\t{}\t{}", entry.sheet_name, base, entry.description),
            None => println!("{}\t{}", entry.sheet_name, entry.description),
        }
    }
    eprintln!("✅ {} data sheets listed", entries.len());
    Ok(())
}

fn cmd_clean(workbook: &Path, kind: DatasetKind, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🧹 Cleaning: {}", workbook.display());

    let loaded = load_source(workbook, &SheetLayout::for_dataset(kind), 0)?;
    let cleaned = clean(loaded.observations);
    eprintln!("   {}", cleaned.report.summary());

    let table = LongTable::from_observations(cleaned.observations);
    eprintln!("✅ {} records", table.len());

    match output {
        Some(p) => {
            table.write_csv_file(p)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => table.write_csv(std::io::stdout().lock())?,
    }
    Ok(())
}

fn cmd_manifest() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", SourceManifest::default().to_json()?);
    Ok(())
}

fn cmd_validate(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", input.display());

    let content = fs::read_to_string(input)?;
    let manifest: Value = serde_json::from_str(&content)?;

    match validate_manifest(&manifest) {
        Ok(()) => {
            let sources = manifest["sources"].as_array().map_or(0, |s| s.len());
            eprintln!("✅ Manifest valid ({} sources)", sources);
            Ok(())
        }
        Err(errors) => {
            eprintln!("\n❌ Manifest invalid:");
            for err in &errors {
                eprintln!("   - {}", err);
            }
            std::process::exit(1);
        }
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
