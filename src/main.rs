use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::{generate, Shell};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use tracing::info;

mod hla;
mod matching;
mod policy;
mod records;
mod registry;
mod report;
mod types;

use matching::MatchEvaluator;
use policy::MatchPolicy;
use registry::MatchRegistry;
use report::ReportGenerator;

/// Kidney donor-recipient compatibility matching tool
#[derive(Parser, Debug)]
#[command(
    name = "kidney-match",
    version,
    about = "Evaluate and rank kidney donors for a transplant candidate",
    long_about = r#"
A compatibility evaluation engine for kidney transplantation:
- Hard exclusions: unacceptable antigens, ABO/Rh blood type, positive
  crossmatch, donor-specific antibodies
- Per-locus HLA matching (A, B, C, DR, DQ, DP)
- Actual or virtual (PRA-based) crossmatch resolution
- 0-100 compatibility scoring with descending donor ranking

Reads donor and recipient records from JSON files and CSV/TSV rosters.
"#
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// ID of the recipient to evaluate donors against
    #[arg(short = 'R', long, value_name = "ID")]
    recipient: Option<String>,

    /// Record files or directories (space-separated)
    #[arg(short = 'd', long = "records", value_name = "PATHS", num_args = 1.., value_hint = ValueHint::AnyPath)]
    records: Vec<PathBuf>,

    /// Recursive search for record files
    #[arg(short, long, help = "Recursively search directories")]
    recursive: bool,

    /// Interactive mode with prompts for all parameters
    #[arg(short, long, help = "Interactive mode with default values")]
    interactive: bool,

    /// Number of threads (0 = auto-detect)
    #[arg(
        short,
        long,
        default_value = "0",
        help = "Number of threads (0 = auto)"
    )]
    threads: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "html")]
    format: OutputFormat,

    /// Output directory for reports
    #[arg(short, long, default_value = "./reports")]
    output: PathBuf,

    /// Match policy TOML file (thresholds; defaults to established policy)
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    policy: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Generate shell completions
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate shell completions
    Completions { shell: Shell },
    /// List supported record file formats
    Formats,
    /// Show the effective match policy thresholds
    Policy {
        /// Match policy TOML file to apply over the defaults
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Html,
    Csv,
    Json,
    Tsv,
    All,
}

impl From<OutputFormat> for report::ReportFormat {
    fn from(format: OutputFormat) -> report::ReportFormat {
        match format {
            OutputFormat::Html => report::ReportFormat::Html,
            OutputFormat::Csv => report::ReportFormat::Csv,
            OutputFormat::Json => report::ReportFormat::Json,
            OutputFormat::Tsv => report::ReportFormat::Tsv,
            OutputFormat::All => report::ReportFormat::All,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle shell completions
    if let Some(shell) = cli.completions {
        generate_completions(shell);
        return Ok(());
    }

    if let Some(Commands::Completions { shell }) = cli.command {
        generate_completions(shell);
        return Ok(());
    }

    if let Some(Commands::Formats) = cli.command {
        list_formats();
        return Ok(());
    }

    if let Some(Commands::Policy { ref file }) = cli.command {
        show_policy(file.as_deref())?;
        return Ok(());
    }

    // Initialize logging
    init_logging(cli.verbose);

    // Run interactive mode if requested
    let config = if cli.interactive {
        run_interactive_mode()?
    } else {
        AppConfig::from_cli(&cli)
    };

    // Initialize thread pool
    init_thread_pool(config.threads)?;

    info!("Starting kidney match evaluation...");
    info!("Using {} threads", rayon::current_num_threads());

    run_matching(config)?;

    Ok(())
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

fn list_formats() {
    println!("{}", style("Supported Record File Formats:").bold().cyan());
    println!();

    let formats = vec![
        (
            "JSON",
            "Record files (.json)",
            "Single donor/recipient object or an array mixing both",
        ),
        (
            "CSV",
            "Donor roster (.csv)",
            "One donor per row; id column required",
        ),
        (
            "TSV",
            "Donor roster (.tsv)",
            "Tab-separated donor roster; id column required",
        ),
    ];

    for (name, ext, desc) in formats {
        println!("  {} - {}", style(name).green().bold(), style(ext).yellow());
        println!("         {}", style(desc).dim());
    }
}

fn show_policy(file: Option<&std::path::Path>) -> Result<()> {
    let policy = match file {
        Some(path) => MatchPolicy::from_file(path)?,
        None => MatchPolicy::default(),
    };

    println!("{}", style("Effective Match Policy:").bold().cyan());
    println!();
    println!(
        "  {} {}",
        style("Minimum primary HLA matches (A, B, DR):").dim(),
        style(policy.min_primary_hla_matches).green()
    );
    println!(
        "  {} {}",
        style("Minimum compatibility score:").dim(),
        style(policy.min_compatibility_score).green()
    );
    println!(
        "  {} {}",
        style("Virtual crossmatch PRA threshold:").dim(),
        style(policy.virtual_crossmatch_pra_threshold).green()
    );
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("kidney_match={}", level))
        .init();
}

fn init_thread_pool(threads: usize) -> Result<()> {
    let num_threads = if threads == 0 {
        num_cpus::get()
    } else {
        threads
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .map_err(|e| anyhow::anyhow!("Failed to initialize thread pool: {}", e))?;

    Ok(())
}

fn run_interactive_mode() -> Result<AppConfig> {
    println!(
        "{}",
        style("╔══════════════════════════════════════════════════════════════╗").cyan()
    );
    println!(
        "{}",
        style("║        Kidney Match Evaluation - Interactive Mode            ║")
            .cyan()
            .bold()
    );
    println!(
        "{}",
        style("╚══════════════════════════════════════════════════════════════╝").cyan()
    );
    println!();

    let theme = ColorfulTheme::default();

    // Recipient selection
    let recipient: String = Input::with_theme(&theme)
        .with_prompt("Recipient ID")
        .interact_text()?;

    // Record files
    let records_input: String = Input::with_theme(&theme)
        .with_prompt("Record files/directories (space-separated)")
        .default("./records".to_string())
        .interact_text()?;

    let records: Vec<PathBuf> = records_input
        .split_whitespace()
        .map(PathBuf::from)
        .collect();

    // Recursive search
    let recursive = Confirm::with_theme(&theme)
        .with_prompt("Enable recursive directory search?")
        .default(true)
        .interact()?;

    // Output format
    let formats = vec!["HTML", "CSV", "JSON", "TSV", "All formats"];
    let format_idx = Select::with_theme(&theme)
        .with_prompt("Select output format")
        .default(0)
        .items(&formats)
        .interact()?;

    let format = match format_idx {
        0 => OutputFormat::Html,
        1 => OutputFormat::Csv,
        2 => OutputFormat::Json,
        3 => OutputFormat::Tsv,
        4 => OutputFormat::All,
        _ => OutputFormat::Html,
    };

    // Output directory
    let output: String = Input::with_theme(&theme)
        .with_prompt("Output directory")
        .default("./reports".to_string())
        .interact_text()?;

    // Threads
    let threads: usize = Input::with_theme(&theme)
        .with_prompt("Number of threads (0 = auto-detect)")
        .default(0)
        .interact_text()?;

    Ok(AppConfig {
        recipient: recipient.trim().to_string(),
        records,
        recursive,
        threads,
        format,
        output: PathBuf::from(output),
        policy: None,
    })
}

fn run_matching(config: AppConfig) -> Result<()> {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")?
            .progress_chars("#>-"),
    );

    // Step 1: Load the match policy
    let policy = match &config.policy {
        Some(path) => MatchPolicy::from_file(path)?,
        None => MatchPolicy::default(),
    };

    // Step 2: Load records
    pb.set_message("Loading donor and recipient records...");
    let registry = MatchRegistry::new();
    let summary = registry.load_paths(&config.records, config.recursive)?;
    pb.set_position(30);

    info!(
        "Loaded {} recipients and {} donors from {} files",
        summary.recipients, summary.donors, summary.files
    );

    // Step 3: Look up the recipient baseline
    pb.set_message("Looking up recipient...");
    let recipient = registry.recipient(&config.recipient)?;
    pb.set_position(40);

    // Step 4: Evaluate the available donor pool
    pb.set_message("Evaluating donor pool...");
    let donors = registry.available_donors();
    let evaluator = MatchEvaluator::with_policy(policy);
    let results = evaluator.evaluate(&recipient, &donors);
    pb.set_position(80);

    let compatible = results.iter().filter(|r| r.is_compatible).count();
    info!(
        "Evaluated {} donors, {} compatible",
        results.len(),
        compatible
    );

    // Step 5: Generate reports
    pb.set_message("Generating reports...");
    let generator = ReportGenerator::new(&config.output);
    generator.generate(&recipient, &results, config.format.into())?;
    pb.set_position(100);

    pb.finish_with_message("Evaluation complete!");

    println!(
        "\n{} {} of {} donors compatible with recipient {}",
        style("✓").green().bold(),
        style(compatible).green(),
        results.len(),
        style(&config.recipient).cyan()
    );

    for result in results.iter().take(5) {
        let verdict = if result.is_compatible {
            style("compatible").green()
        } else {
            style("incompatible").red()
        };
        println!(
            "  {:>3}  {}  {}",
            style(result.compatibility_score).bold(),
            result.donor.id,
            verdict
        );
    }

    println!(
        "\n{} Reports saved to: {}",
        style("✓").green().bold(),
        style(config.output.display()).cyan()
    );

    Ok(())
}

#[derive(Debug)]
struct AppConfig {
    recipient: String,
    records: Vec<PathBuf>,
    recursive: bool,
    threads: usize,
    format: OutputFormat,
    output: PathBuf,
    policy: Option<PathBuf>,
}

impl AppConfig {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            recipient: cli.recipient.clone().unwrap_or_default(),
            records: cli.records.clone(),
            recursive: cli.recursive,
            threads: cli.threads,
            format: cli.format,
            output: cli.output.clone(),
            policy: cli.policy.clone(),
        }
    }
}
