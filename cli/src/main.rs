//! pdfcompare CLI - PDF version comparison tool

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdfcompare::{
    AlignmentScope, CompareMode, CompareOptions, ComparisonReport, DirectionReport, JsonFormat,
    MovePolicy, PageSelection, PdfCompare, StaticVisionService, VisionInput,
};

#[derive(Parser)]
#[command(name = "pdfcompare")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Compare two PDF versions and highlight their differences", long_about = None)]
struct Cli {
    /// Original PDF (A)
    #[arg(value_name = "A")]
    a: Option<PathBuf>,

    /// Revised PDF (B)
    #[arg(value_name = "B")]
    b: Option<PathBuf>,

    /// Output directory for the annotated copies
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two PDFs and write annotated copies of both
    Compare(CompareArgs),

    /// Dump the words extracted from a PDF as JSON
    Words {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Page range (e.g., "1-10", "1,3,5")
        #[arg(long)]
        pages: Option<String>,

        /// Print plain text instead of JSON with word boxes
        #[arg(long)]
        text: bool,
    },

    /// Show version information
    Version,
}

#[derive(Args)]
struct CompareArgs {
    /// Original PDF (A)
    #[arg(value_name = "A")]
    a: PathBuf,

    /// Revised PDF (B)
    #[arg(value_name = "B")]
    b: PathBuf,

    /// Output directory for the annotated copies
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// JSON options file; flags below override its values
    #[arg(long, value_name = "FILE", env = "PDFCOMPARE_CONFIG")]
    config: Option<PathBuf>,

    /// Page range (e.g., "1-10", "1,3,5")
    #[arg(long)]
    pages: Option<String>,

    /// Alignment scope
    #[arg(long, value_enum)]
    scope: Option<Scope>,

    /// Move detection policy
    #[arg(long, value_enum)]
    moves: Option<Moves>,

    /// Minimum word length to highlight
    #[arg(long)]
    min_length: Option<usize>,

    /// Horizontal merge tolerance in points
    #[arg(long)]
    x_tolerance: Option<f32>,

    /// Vertical merge tolerance in points
    #[arg(long)]
    y_tolerance: Option<f32>,

    /// Do not add the missing-words note
    #[arg(long)]
    no_note: bool,

    /// Process directions and pages one at a time
    #[arg(long)]
    sequential: bool,

    /// Vision service response for the A→B direction
    #[arg(long, value_name = "FILE", requires = "vision_b_to_a")]
    vision_a_to_b: Option<PathBuf>,

    /// Vision service response for the B→A direction
    #[arg(long, value_name = "FILE", requires = "vision_a_to_b")]
    vision_b_to_a: Option<PathBuf>,

    /// Write the comparison report as JSON
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Output compact JSON
    #[arg(long)]
    compact: bool,
}

impl CompareArgs {
    fn new(a: PathBuf, b: PathBuf, output: Option<PathBuf>) -> Self {
        Self {
            a,
            b,
            output,
            config: None,
            pages: None,
            scope: None,
            moves: None,
            min_length: None,
            x_tolerance: None,
            y_tolerance: None,
            no_note: false,
            sequential: false,
            vision_a_to_b: None,
            vision_b_to_a: None,
            report: None,
            compact: false,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Scope {
    /// Align page i of A with page i of B
    Page,
    /// Align the whole documents
    Document,
}

impl From<Scope> for AlignmentScope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Page => AlignmentScope::Page,
            Scope::Document => AlignmentScope::Document,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Moves {
    /// Moved whenever the word occurs anywhere in the other document
    Presence,
    /// Each occurrence justifies one move
    Consume,
}

impl From<Moves> for MovePolicy {
    fn from(moves: Moves) -> Self {
        match moves {
            Moves::Presence => MovePolicy::Presence,
            Moves::Consume => MovePolicy::Consume,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Compare(args)) => cmd_compare(&args),
        Some(Commands::Words { input, pages, text }) => cmd_words(&input, pages.as_deref(), text),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            // Default behavior: compare with default options if both inputs are provided
            if let (Some(a), Some(b)) = (cli.a, cli.b) {
                cmd_compare(&CompareArgs::new(a, b, cli.output))
            } else {
                println!("{}", "Usage: pdfcompare <A> <B> [-o DIR]".yellow());
                println!("       pdfcompare --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn build_options(args: &CompareArgs) -> Result<CompareOptions, Box<dyn std::error::Error>> {
    let mut options = match &args.config {
        Some(path) => CompareOptions::from_json(&fs::read_to_string(path)?)?,
        None => CompareOptions::default(),
    };

    if let Some(p) = &args.pages {
        options = options
            .with_pages(PageSelection::parse(p).map_err(|e| format!("Invalid page range: {}", e))?);
    }
    if let Some(scope) = args.scope {
        options = options.with_scope(scope.into());
    }
    if let Some(moves) = args.moves {
        options = options.with_move_policy(moves.into());
    }
    if let Some(len) = args.min_length {
        options = options.with_min_word_length(len);
    }
    if args.x_tolerance.is_some() || args.y_tolerance.is_some() {
        let x = args.x_tolerance.unwrap_or(options.x_tolerance);
        let y = args.y_tolerance.unwrap_or(options.y_tolerance);
        options = options.with_tolerance(x, y);
    }
    if args.no_note {
        options = options.with_missing_note(false);
    }
    if args.sequential {
        options = options.sequential();
    }

    options.validate()?;
    Ok(options)
}

/// `<dir>/<stem>_annotated.pdf`, next to the input when no directory is given.
fn annotated_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let name = format!("{}_annotated.pdf", stem);
    match output_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

fn cmd_compare(args: &CompareArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = build_options(args)?;

    if let Some(dir) = &args.output {
        fs::create_dir_all(dir)?;
    }
    let out_a = annotated_path(&args.a, args.output.as_deref());
    let out_b = annotated_path(&args.b, args.output.as_deref());

    let mut compare = PdfCompare::new().with_options(options);
    if let (Some(forward), Some(reverse)) = (&args.vision_a_to_b, &args.vision_b_to_a) {
        let service = StaticVisionService::from_files(forward, reverse)?;
        compare = compare.with_vision(Arc::new(service), VisionInput::default());
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!(
        "Comparing {} with {}...",
        args.a.display(),
        args.b.display()
    ));

    let report = compare.compare(&args.a, &args.b, &out_a, &out_b);
    pb.finish_and_clear();
    let report = report?;

    print_summary(&report);

    println!("\n{}", "Output files:".green().bold());
    println!("  {} {}", "├─".dimmed(), out_a.display());
    println!("  {} {}", "└─".dimmed(), out_b.display());

    if let Some(path) = &args.report {
        let format = if args.compact {
            JsonFormat::Compact
        } else {
            JsonFormat::Pretty
        };
        fs::write(path, report.to_json(format)?)?;
        println!("{} {}", "Report saved to".green(), path.display());
    }

    Ok(())
}

fn print_summary(report: &ComparisonReport) {
    println!("{}", "Comparison".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {} / {}", "Pages (A / B)".bold(), report.pages_a, report.pages_b);
    println!("{}: {}", "Compared".bold(), report.compared_pages.len());
    if report.a_to_b.mode == CompareMode::Vision {
        println!("{}: vision", "Mode".bold());
    }

    print_direction("A → B (highlights in B)", &report.a_to_b);
    print_direction("B → A (highlights in A)", &report.b_to_a);

    let failures: Vec<_> = report.all_failures().collect();
    if !failures.is_empty() {
        println!();
        println!("{} ({})", "Failures".yellow().bold(), failures.len());
        for failure in failures {
            let page = failure
                .page
                .map(|p| format!(" page {}", p + 1))
                .unwrap_or_default();
            println!(
                "  {} {:?}{}: {}",
                "•".yellow(),
                failure.doc,
                page,
                failure.message
            );
        }
    }
    if report.cancelled {
        println!("{}", "Comparison was cancelled".yellow());
    }
}

fn print_direction(title: &str, direction: &DirectionReport) {
    println!();
    println!("{}", title.cyan().bold());
    println!(
        "  {}: {}",
        "Highlights".bold(),
        format!(
            "{} of {} written",
            direction.regions_written(),
            direction.region_count()
        )
    );
    println!(
        "  {}: {} added, {} moved, {} deleted, {} unchanged",
        "Words".bold(),
        direction.counts.added.to_string().green(),
        direction.counts.moved.to_string().blue(),
        direction.counts.deleted.to_string().red(),
        direction.counts.unchanged
    );
    for (_, entry) in direction.changes.iter().take(10) {
        println!(
            "  {} {} ← {}",
            "•".dimmed(),
            entry.new_text,
            entry.value.as_str()
        );
    }
    if direction.changes.len() > 10 {
        println!("  {} and {} more", "…".dimmed(), direction.changes.len() - 10);
    }
    if !direction.missing.is_empty() {
        println!("  {}: {}", "Missing".bold(), direction.missing.len());
    }
}

fn cmd_words(
    input: &Path,
    pages: Option<&str>,
    text: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let page_selection = if let Some(p) = pages {
        PageSelection::parse(p).map_err(|e| format!("Invalid page range: {}", e))?
    } else {
        PageSelection::All
    };

    let words = pdfcompare::extract_words(input)?;
    let selected: Vec<(usize, &Vec<pdfcompare::PageWord>)> = words
        .iter()
        .enumerate()
        .filter(|(i, _)| page_selection.includes_index(*i as u32))
        .collect();

    if !text {
        let pages: Vec<serde_json::Value> = selected
            .iter()
            .map(|(i, words)| {
                serde_json::json!({
                    "page": i + 1,
                    "words": words,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&pages)?);
        return Ok(());
    }

    for (i, words) in selected {
        println!("{}", format!("Page {}", i + 1).cyan().bold());
        let line: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        println!("{}", line.join(" "));
        println!();
    }

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "pdfcompare".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("PDF version comparison tool");
    println!();
    println!("Repository: {}", "https://github.com/iyulab/pdfcompare".dimmed());
    println!("License: MIT");
}
