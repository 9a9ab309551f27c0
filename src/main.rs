use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use doc_patcher::config::{discover, Settings};
use doc_patcher::lifecycle::{ItemFailure, UpdateLifecycle};
use doc_patcher::matcher::Matcher;
use doc_patcher::safety::DocsGuard;
use doc_patcher::sections::{DocumentSection, KeywordRetriever, SectionIndex};
use doc_patcher::store::{Batch, BatchStatus, JsonStore};
use doc_patcher::suggest::QuarantinedSuggestion;
use doc_patcher::upstream::ResponseFileGenerator;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "doc-patcher")]
#[command(about = "Review, apply and revert suggested documentation patches", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to $DOC_PATCHER_CONFIG, then ./doc-patcher.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn a change request into a pending batch of suggestions
    Analyze {
        /// Free-text description of the documentation change
        query: String,

        /// Generator response (JSON) to read suggestions from
        #[arg(short, long)]
        response: PathBuf,

        /// Validate and show the suggestions without saving a batch
        #[arg(long)]
        dry_run: bool,
    },

    /// Show batches with pending suggestions
    Pending {
        /// Only show this batch
        #[arg(short, long)]
        batch: Option<String>,

        /// Show a diff of each suggestion
        #[arg(short, long)]
        diff: bool,
    },

    /// Apply suggestions from a batch
    Approve {
        #[arg(short, long)]
        batch: String,

        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Reject suggestions from a batch
    Reject {
        #[arg(short, long)]
        batch: String,

        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// List applied updates
    Applied,

    /// Show suggestion and batch counts
    Stats,

    /// Revert every applied update
    RevertAll,

    /// Revert one applied update
    Revert { update_id: String },

    /// List indexed documentation sections
    Sections {
        /// Only sections whose title or body contains this keyword
        #[arg(conflicts_with = "related")]
        keyword: Option<String>,

        /// List sections sharing key terms with this section id
        #[arg(long)]
        related: Option<String>,

        /// Maximum number of related sections
        #[arg(long, default_value_t = 5)]
        max: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let (settings, source) = discover(cli.config.as_deref())?;
    tracing::debug!(?source, docs_root = %settings.paths.docs_root.display(), "settings loaded");
    let json = cli.json;

    match cli.command {
        Commands::Analyze {
            query,
            response,
            dry_run,
        } => cmd_analyze(&settings, &query, response, dry_run, json),
        Commands::Pending { batch, diff } => cmd_pending(&settings, batch.as_deref(), diff, json),
        Commands::Approve { batch, ids } => cmd_approve(&settings, &batch, &ids, json),
        Commands::Reject { batch, ids } => cmd_reject(&settings, &batch, &ids, json),
        Commands::Applied => cmd_applied(&settings, json),
        Commands::Stats => cmd_stats(&settings, json),
        Commands::RevertAll => cmd_revert_all(&settings, json),
        Commands::Revert { update_id } => cmd_revert(&settings, &update_id, json),
        Commands::Sections {
            keyword,
            related,
            max,
        } => match related {
            Some(id) => cmd_related(&settings, &id, max, json),
            None => cmd_sections(&settings, keyword.as_deref(), json),
        },
    }
}

fn open_lifecycle(settings: &Settings) -> Result<UpdateLifecycle> {
    let paths = &settings.paths;
    let store = JsonStore::open(&paths.storage_dir)?;
    let guard = DocsGuard::new(&paths.docs_root, Some(&paths.storage_dir)).with_context(|| {
        format!(
            "documentation root {} is not accessible",
            paths.docs_root.display()
        )
    })?;
    let lifecycle = UpdateLifecycle::new(Arc::new(store), guard, Matcher::new(settings.matcher))?
        .with_upstream_limits(settings.upstream.timeout(), settings.upstream.max_sections);
    Ok(lifecycle)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_analyze(
    settings: &Settings,
    query: &str,
    response: PathBuf,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let index = SectionIndex::load(&settings.paths.docs_root)?;
    let lifecycle = open_lifecycle(settings)?.with_upstream(
        Arc::new(KeywordRetriever::new(index, settings.upstream.max_sections)),
        Arc::new(ResponseFileGenerator::new(response)),
    );

    if dry_run {
        let preview = lifecycle.analyze(query)?;
        if json {
            return print_json(&preview);
        }
        println!(
            "{} {} suggestion(s) for \"{}\" (not saved)",
            "●".cyan(),
            preview.suggestions.len(),
            query
        );
        for suggestion in &preview.suggestions {
            println!(
                "  {}  {}  [{}, {:.2}]",
                suggestion.file_path,
                suggestion.section_title,
                suggestion.change_type,
                suggestion.confidence_score
            );
            display_diff(
                &suggestion.file_path,
                &suggestion.original_content,
                &suggestion.suggested_content,
            );
        }
        display_quarantined(&preview.quarantined);
        return Ok(());
    }

    let report = lifecycle.analyze_and_save(query)?;
    if json {
        return print_json(&report);
    }

    println!(
        "{} Created {} with {} suggestion(s)",
        "✓".green(),
        report.batch.batch_id.bold(),
        report.batch.suggestions.len()
    );
    display_quarantined(&report.quarantined);
    Ok(())
}

fn display_quarantined(quarantined: &[QuarantinedSuggestion]) {
    for quarantined in quarantined {
        eprintln!(
            "{} Suggestion #{} ({}) held back: {}",
            "⊘".yellow(),
            quarantined.index,
            quarantined.section_id,
            quarantined.issues.join("; ")
        );
    }
}

fn cmd_pending(
    settings: &Settings,
    batch_id: Option<&str>,
    show_diff: bool,
    json: bool,
) -> Result<()> {
    let lifecycle = open_lifecycle(settings)?;
    let batches = lifecycle.get_pending_updates(batch_id)?;
    if json {
        let views: Vec<BatchView> = batches.iter().map(BatchView::from).collect();
        return print_json(&views);
    }

    if batches.is_empty() {
        println!("{}", "No pending suggestions".dimmed());
        return Ok(());
    }
    for batch in &batches {
        display_batch(batch, show_diff);
    }
    Ok(())
}

/// A batch as printed by `--json`, with its derived status.
#[derive(Serialize)]
struct BatchView<'a> {
    #[serde(flatten)]
    batch: &'a Batch,
    status: BatchStatus,
}

impl<'a> From<&'a Batch> for BatchView<'a> {
    fn from(batch: &'a Batch) -> Self {
        Self {
            batch,
            status: batch.status(),
        }
    }
}

fn display_batch(batch: &Batch, show_diff: bool) {
    println!(
        "{} {} ({}, {})",
        "Batch".bold(),
        batch.batch_id.bold(),
        batch.status(),
        batch.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  Query: {}", batch.query);
    for suggestion in &batch.suggestions {
        println!(
            "  {} {}  {}  [{}, {:.2}]",
            "●".cyan(),
            suggestion.suggestion_id,
            suggestion.file_path,
            suggestion.change_type,
            suggestion.confidence_score
        );
        println!("    Section: {}", suggestion.section_title);
        if !suggestion.reasoning.is_empty() {
            println!("    Reason: {}", suggestion.reasoning.dimmed());
        }
        if show_diff {
            display_diff(
                &suggestion.file_path,
                &suggestion.original_content,
                &suggestion.suggested_content,
            );
        }
    }
    println!();
}

/// Helper: Show unified diff between original and suggested content
fn display_diff(file: &str, original: &str, modified: &str) {
    println!("{}", format!("    --- {file} (original)").dimmed());
    println!("{}", format!("    +++ {file} (suggested)").dimmed());

    let diff = TextDiff::from_lines(original, modified);
    for change in diff.iter_all_changes() {
        let line = change.to_string();
        let line = line.trim_end_matches('\n');
        let sign = match change.tag() {
            ChangeTag::Delete => format!("    -{line}").red(),
            ChangeTag::Insert => format!("    +{line}").green(),
            ChangeTag::Equal => format!("     {line}").normal(),
        };
        println!("{sign}");
    }
}

fn display_failures(failures: &[ItemFailure]) {
    for failure in failures {
        eprintln!(
            "{} {}: {} - {}",
            "✗".red(),
            failure.suggestion_id,
            failure.kind.to_string().red(),
            failure.message
        );
    }
}

fn cmd_approve(settings: &Settings, batch_id: &str, ids: &[String], json: bool) -> Result<()> {
    let lifecycle = open_lifecycle(settings)?;
    let report = lifecycle.approve_suggestions(batch_id, ids)?;

    if json {
        print_json(&report)?;
    } else {
        for update in &report.succeeded {
            println!(
                "{} {}: Applied to {} ({} match, update {})",
                "✓".green(),
                update.suggestion_id,
                update.file_path,
                update.match_tier,
                update.update_id
            );
        }
        display_failures(&report.failures);

        println!();
        println!("{}", "Summary:".bold());
        println!("  {} applied", report.succeeded_count().to_string().green());
        println!("  {} failed", report.failed_count().to_string().red());
    }

    if report.failed_count() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_reject(settings: &Settings, batch_id: &str, ids: &[String], json: bool) -> Result<()> {
    let lifecycle = open_lifecycle(settings)?;
    let report = lifecycle.reject_suggestions(batch_id, ids)?;

    if json {
        print_json(&report)?;
    } else {
        for id in &report.succeeded {
            println!("{} {}: Rejected", "⊘".yellow(), id);
        }
        display_failures(&report.failures);

        println!();
        println!("{}", "Summary:".bold());
        println!("  {} rejected", report.succeeded_count().to_string().yellow());
        println!("  {} failed", report.failed_count().to_string().red());
    }

    if report.failed_count() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_applied(settings: &Settings, json: bool) -> Result<()> {
    let lifecycle = open_lifecycle(settings)?;
    let applied = lifecycle.get_applied_updates()?;
    if json {
        return print_json(&applied);
    }

    if applied.is_empty() {
        println!("{}", "No applied updates".dimmed());
        return Ok(());
    }
    for update in &applied {
        println!(
            "{} {}  {}  {} ({} match, {})",
            "✓".green(),
            update.update_id.bold(),
            update.file_path,
            update.suggestion_id,
            update.match_tier,
            update.applied_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

fn cmd_stats(settings: &Settings, json: bool) -> Result<()> {
    let lifecycle = open_lifecycle(settings)?;
    let stats = lifecycle.get_update_statistics()?;
    if json {
        return print_json(&stats);
    }

    println!("{}", "Suggestions:".bold());
    println!("  {} pending", stats.pending_suggestions.to_string().cyan());
    println!("  {} approved", stats.approved_suggestions.to_string().yellow());
    println!("  {} applied", stats.applied_suggestions.to_string().green());
    println!("  {} rejected", stats.rejected_suggestions.to_string().red());
    println!("  {} total", stats.total_suggestions);
    println!("{}", "Batches:".bold());
    println!("  {} pending", stats.pending_batches.to_string().cyan());
    println!("  {} with applied updates", stats.applied_batches.to_string().green());
    println!("  {} total", stats.total_batches);
    Ok(())
}

fn cmd_revert_all(settings: &Settings, json: bool) -> Result<()> {
    let lifecycle = open_lifecycle(settings)?;
    let summary = lifecycle.revert_all_updates()?;

    if json {
        print_json(&summary)?;
    } else {
        for failure in &summary.details {
            eprintln!(
                "{} {}: {} - {}",
                "✗".red(),
                failure.update_id,
                failure.kind.to_string().red(),
                failure.message
            );
            eprintln!("  File: {}", failure.file_path);
        }
        println!("{}", "Summary:".bold());
        println!(
            "  {} reverted",
            summary.reverted_and_removed_count.to_string().green()
        );
        println!(
            "  {} failed",
            summary.failed_to_revert_count.to_string().red()
        );
    }

    if summary.failed_to_revert_count > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_revert(settings: &Settings, update_id: &str, json: bool) -> Result<()> {
    let lifecycle = open_lifecycle(settings)?;
    let update = lifecycle.revert_update(update_id)?;
    if json {
        return print_json(&update);
    }
    println!(
        "{} {}: Reverted {} in {}",
        "✓".green(),
        update.update_id,
        update.suggestion_id,
        update.file_path
    );
    Ok(())
}

fn cmd_sections(settings: &Settings, keyword: Option<&str>, json: bool) -> Result<()> {
    let index = SectionIndex::load(&settings.paths.docs_root)?;
    let sections: Vec<&DocumentSection> = match keyword {
        Some(keyword) => index.find_by_keyword(keyword),
        None => index.sections().iter().collect(),
    };
    if json {
        return print_json(&sections);
    }

    for section in &sections {
        println!(
            "{}  {}  {} ({})",
            section.id.dimmed(),
            section.file_path,
            section.title.bold(),
            section.section_type
        );
    }
    println!("{} section(s)", sections.len());
    Ok(())
}

fn cmd_related(settings: &Settings, id: &str, max: usize, json: bool) -> Result<()> {
    let index = SectionIndex::load(&settings.paths.docs_root)?;
    let target = index
        .get(id)
        .ok_or_else(|| anyhow!("section not found: {id}"))?;
    let related = index.related(id, max).unwrap_or_default();
    if json {
        let sections: Vec<&DocumentSection> = related.iter().map(|(_, s)| *s).collect();
        return print_json(&sections);
    }

    println!("Related to {} ({})", target.title.bold(), target.file_path);
    for (score, section) in &related {
        println!(
            "  {:.2}  {}  {}  {}",
            score,
            section.id.dimmed(),
            section.file_path,
            section.title.bold()
        );
    }
    println!("{} related section(s)", related.len());
    Ok(())
}
