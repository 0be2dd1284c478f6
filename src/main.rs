//! Citation Merger CLI
//!
//! Merges a document's index of summaries with its body of quoted sources.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_citation_merger::{
    config::Config,
    document::{SourceDocument, discover_documents},
    persistence::{SaveFormat, load_tree, suggested_filename, suggested_path, tree_exists, tree_size},
    pipeline::{CrossRefMerger, MergeOutcome},
    records::BlockKind,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Citation Merger - cross-reference an index of summaries with its sources
#[derive(Parser)]
#[command(name = "citation-merger")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge one document into a cross-referenced output
    Merge {
        /// Path to the document (.docx, .txt or .md)
        document: PathBuf,

        /// Output path (default: <stem>_merged.<ext> next to the document)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: json, bin, md or html
        #[arg(short, long)]
        format: Option<SaveFormat>,
    },

    /// Show how a document is segmented and parsed
    Inspect {
        /// Path to the document
        document: PathBuf,
    },

    /// Merge every document under a directory
    Batch {
        /// Directory to scan
        dir: PathBuf,

        /// Directory for merged outputs (default: next to each document)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: json, bin, md or html
        #[arg(short, long, default_value = "json")]
        format: SaveFormat,
    },

    /// Display a saved merged tree
    Show {
        /// Path to the tree file (.json or .bin)
        tree: PathBuf,

        /// Output as JSON instead of formatted tree
        #[arg(long)]
        json: bool,
    },

    /// Show information about a saved merged tree
    Info {
        /// Path to the tree file (.json or .bin)
        tree: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Merge {
            document,
            output,
            format,
        } => cmd_merge(config_path, document, output, format).await,
        Commands::Inspect { document } => cmd_inspect(config_path, document).await,
        Commands::Batch {
            dir,
            output,
            format,
        } => cmd_batch(config_path, dir, output, format).await,
        Commands::Show { tree, json } => cmd_show(tree, json),
        Commands::Info { tree } => cmd_info(tree),
        Commands::Config => cmd_config(config_path),
    }
}

fn load_merger(config_path: Option<&Path>) -> Result<CrossRefMerger> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    CrossRefMerger::new(&config).context("Invalid configuration")
}

fn print_outcome(outcome: &MergeOutcome) {
    let report = &outcome.report;
    println!("  Merged entries:     {}", report.merged_count);
    println!("  Books:              {}", report.group_count);
    println!("  Unmatched index:    {}", report.unmatched_index_count);
    println!("  Unmatched quotes:   {}", report.unmatched_quote_count);

    for record in &outcome.unmatched.unmatched_index {
        println!(
            "    index  #{:<4} {} (page {}): {}",
            record.source_position, record.book_name, record.page_ref, record.summary
        );
    }
    for record in &outcome.unmatched.unmatched_quote {
        let preview: String = record.text.chars().take(60).collect();
        println!(
            "    quote  #{:<4} {} (page {}): {}",
            record.source_position, record.book_name, record.page_ref, preview
        );
    }
}

async fn cmd_merge(
    config_path: Option<&Path>,
    document_path: PathBuf,
    output: Option<PathBuf>,
    format: Option<SaveFormat>,
) -> Result<()> {
    let merger = load_merger(config_path)?;

    let format = format.unwrap_or_else(|| {
        output
            .as_deref()
            .map(SaveFormat::from_path)
            .unwrap_or_default()
    });
    let output = output.unwrap_or_else(|| suggested_path(&document_path, format));

    println!("Merging document: {}", document_path.display());
    let start = Instant::now();

    let outcome = merger
        .merge_file(&document_path)
        .await
        .with_context(|| format!("Failed to merge '{}'", document_path.display()))?;

    let written = merger
        .write(&outcome.tree, &output, format)
        .await
        .context("Failed to write merged document")?;

    println!("\nMerge complete in {:.2?}:", start.elapsed());
    print_outcome(&outcome);

    if let Some(warning) = outcome.warning() {
        warn!("{}", warning);
    }

    println!("\nSaved to: {}", output.display());
    println!("  File size: {:.1} KB", written as f64 / 1024.0);

    Ok(())
}

async fn cmd_inspect(config_path: Option<&Path>, document_path: PathBuf) -> Result<()> {
    let merger = load_merger(config_path)?;
    let document: SourceDocument = merger
        .load_document(&document_path)
        .await
        .context("Failed to load document")?;

    println!(
        "Document: {} ({} paragraphs, {} headings)",
        document.name,
        document.paragraph_count(),
        document.heading_count()
    );
    println!("{}", "─".repeat(60));

    let inspection = merger
        .inspect(&document)
        .context("Failed to parse document structure")?;
    let segmented = &inspection.segmented;

    for block in &segmented.blocks {
        let marker = if block.ordinal_position == segmented.boundary_position {
            ">>"
        } else {
            "  "
        };
        let kind = match (block.kind, block.style_level) {
            (BlockKind::Heading, Some(level)) => format!("H{}", level),
            (BlockKind::Heading, None) => "H".to_string(),
            (BlockKind::Paragraph, _) => "P".to_string(),
        };
        let preview: String = block.text.chars().take(70).collect();
        println!("{} {:>4} {:<3} {}", marker, block.ordinal_position, kind, preview);
    }

    println!("{}", "─".repeat(60));
    println!("  Boundary at block:  {}", segmented.boundary_position);
    println!("  Index blocks:       {}", segmented.index_region().len());
    println!("  Quote blocks:       {}", segmented.quotes_region().len());
    println!("  Index records:      {}", inspection.index.len());
    println!("  Quote records:      {}", inspection.quotes.len());

    Ok(())
}

async fn cmd_batch(
    config_path: Option<&Path>,
    dir: PathBuf,
    output_dir: Option<PathBuf>,
    format: SaveFormat,
) -> Result<()> {
    let merger = load_merger(config_path)?;
    let documents = discover_documents(&dir).context("Failed to scan input directory")?;

    println!("Merging {} documents from {}", documents.len(), dir.display());
    let start = Instant::now();

    let mut succeeded = 0usize;
    let mut failed: Vec<(PathBuf, String)> = Vec::new();

    for path in &documents {
        let target = match &output_dir {
            Some(out) => {
                let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("document");
                out.join(suggested_filename(stem, format))
            }
            None => suggested_path(path, format),
        };

        let result = async {
            let outcome = merger.merge_file(path).await?;
            merger.write(&outcome.tree, &target, format).await?;
            Ok::<_, rust_citation_merger::CrossRefError>(outcome)
        }
        .await;

        match result {
            Ok(outcome) => {
                succeeded += 1;
                info!(document = %path.display(), output = %target.display(), "merged");
                println!("  ok     {} ({})", path.display(), outcome.report);
            }
            Err(err) => {
                warn!(document = %path.display(), error = %err, "merge failed");
                println!("  failed {}: {}", path.display(), err);
                failed.push((path.clone(), err.to_string()));
            }
        }
    }

    println!("{}", "─".repeat(60));
    println!(
        "{} merged, {} failed in {:.2?}",
        succeeded,
        failed.len(),
        start.elapsed()
    );

    if succeeded == 0 {
        anyhow::bail!("No document in '{}' could be merged", dir.display());
    }

    Ok(())
}

fn cmd_show(tree_path: PathBuf, json: bool) -> Result<()> {
    if !tree_exists(&tree_path) {
        anyhow::bail!(
            "Tree not found at '{}'. Run 'merge' command first.",
            tree_path.display()
        );
    }

    let tree = load_tree(&tree_path).context("Failed to load merged tree")?;

    if json {
        let json_str = tree.to_json().context("Failed to serialize tree")?;
        println!("{}", json_str);
    } else {
        println!("{}", tree.format());
    }

    Ok(())
}

fn cmd_info(tree_path: PathBuf) -> Result<()> {
    if !tree_exists(&tree_path) {
        anyhow::bail!(
            "Tree not found at '{}'. Run 'merge' command first.",
            tree_path.display()
        );
    }

    let tree = load_tree(&tree_path).context("Failed to load merged tree")?;
    let size = tree_size(&tree_path)?;

    println!("Merged Tree Information");
    println!("{}", "─".repeat(40));
    println!("  Title:        {}", tree.title);
    if let Some(source) = &tree.source {
        println!("  Source:       {}", source);
    }
    println!("  Entries:      {}", tree.entry_count);
    println!("  Books:        {}", tree.group_count);
    println!("  Nodes:        {}", tree.node_count());
    println!("  File size:    {:.1} KB", size as f64 / 1024.0);
    println!("  Tree path:    {}", tree_path.display());

    Ok(())
}

fn cmd_config(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path).context("Failed to load configuration")?;

    match config_path.map(Path::to_path_buf).or_else(Config::config_file_path) {
        Some(path) if path.exists() => println!("# Config file: {}", path.display()),
        Some(path) => println!("# Config file: {} (not present, using defaults)", path.display()),
        None => println!("# Config file: none"),
    }

    if let Err(e) = config.validate() {
        println!("# Configuration error: {}", e);
    }

    print!("{}", config.to_yaml().context("Failed to serialize configuration")?);
    Ok(())
}
