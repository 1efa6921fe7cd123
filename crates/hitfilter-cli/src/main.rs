//! Hitfilter CLI
//!
//! Command-line interface for:
//! - Listing the accessor catalogue
//! - Building, rendering and compiling saved filters
//! - Applying filters to search-result documents (JSON)
//! - Running raw structural queries against a document

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use hitfilter_dsl::{parse_constraint, EdgeKind, EntityKind, GraphQuery};
use hitfilter_filter::{FilterResultSummary, FilterSystem, FilterSystemConfig};
use hitfilter_graph::{BacktrackingEngine, DocumentGraph, Entity, QueryEngine, SrOutput};
use hitfilter_storage::{load_filter, save_filter};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "hitfilter")]
#[command(author, version, about = "Hitfilter: rule-based pruning of sequence search results")]
struct Cli {
    /// Filter system configuration (JSON): accessor groups and extra accessors.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered accessors.
    Accessors {
        /// Print the entries as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Apply a saved filter to one or more documents.
    Apply {
        #[arg(long)]
        filter: PathBuf,

        /// Search-result documents (JSON).
        #[arg(required = true)]
        documents: Vec<PathBuf>,

        /// Directory receiving `<stem>.filtered.json` for each matching document.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Job name recorded in the summary.
        #[arg(long, default_value = "hitfilter")]
        job: String,

        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the structural query a saved filter compiles to.
    Compile {
        #[arg(long)]
        filter: PathBuf,

        /// Compile for standalone feature tables.
        #[arg(long)]
        features: bool,
    },

    /// Print a saved filter in human-readable form.
    Render {
        #[arg(long)]
        filter: PathBuf,

        #[arg(long)]
        html: bool,
    },

    /// Run a raw constraint over a document.
    ///
    /// Variables: v1 Output, v2 Iteration, v3 Hit, v4 HSP, v5 Feature,
    /// v6 Qualifier. Feature and Qualifier are declared only when referenced.
    Query {
        #[arg(long)]
        constraint: String,

        #[arg(long)]
        distinct: bool,

        /// Comma-separated variables to return (default: all declared).
        #[arg(long = "return", value_delimiter = ',')]
        return_vars: Vec<String>,

        #[arg(long, default_value_t = 1000)]
        limit: usize,

        document: PathBuf,
    },

    /// Build and validate a filter from text rules, then save it.
    New {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,

        /// Combine rules with OR instead of AND.
        #[arg(long)]
        or: bool,

        /// `ACCESSOR|OPERATOR|VALUE`, e.g. `HSP alignment length|[]|50;150`.
        #[arg(long = "rule", required = true)]
        rules: Vec<String>,

        #[arg(long)]
        out: PathBuf,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::WARN,
        (false, 1) => LevelFilter::INFO,
        (false, 2) => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter_layer = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    let system = load_system(cli.config.as_deref())?;

    match cli.command {
        Commands::Accessors { json } => cmd_accessors(&system, json),
        Commands::Apply {
            filter,
            documents,
            out,
            job,
            json,
        } => cmd_apply(&system, &filter, &documents, out.as_deref(), &job, json),
        Commands::Compile { filter, features } => cmd_compile(&system, &filter, features),
        Commands::Render { filter, html } => cmd_render(&system, &filter, html),
        Commands::Query {
            constraint,
            distinct,
            return_vars,
            limit,
            document,
        } => cmd_query(&constraint, distinct, &return_vars, limit, &document),
        Commands::New {
            name,
            description,
            or,
            rules,
            out,
        } => cmd_new(&system, &name, description, or, &rules, &out),
    }
}

fn load_system(config: Option<&Path>) -> Result<FilterSystem> {
    let config = match config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str::<FilterSystemConfig>(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => FilterSystemConfig::default(),
    };
    Ok(FilterSystem::new(&config)?)
}

fn read_document(path: &Path) -> Result<SrOutput> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read document {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid document {}", path.display()))
}

// =============================================================================
// Commands
// =============================================================================

fn cmd_accessors(system: &FilterSystem, json: bool) -> Result<()> {
    if json {
        let entries: Vec<_> = system.registry().entries().collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    for entry in system.registry().entries() {
        println!(
            "{}  {} {}  [{}]",
            entry.visible_name.bold(),
            entry.entity.to_string().cyan(),
            entry.data_type.label().dimmed(),
            entry.operator_symbols().join(" ")
        );
        if let Some(help) = &entry.help {
            println!("    {}", help.dimmed());
        }
    }
    Ok(())
}

fn cmd_apply(
    system: &FilterSystem,
    filter_path: &Path,
    documents: &[PathBuf],
    out: Option<&Path>,
    job: &str,
    json: bool,
) -> Result<()> {
    let mut filter = load_filter(system, filter_path)
        .with_context(|| format!("failed to load filter {}", filter_path.display()))?;
    if let Some(dir) = out {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let mut summary = FilterResultSummary::new(job, filter.name());
    for (order, path) in documents.iter().enumerate() {
        let document = read_document(path)?;
        let filtered = filter
            .execute(&document)
            .with_context(|| format!("filter failed on {}", path.display()))?;
        summary.record(order, query_name(&document, path), filtered.as_ref());

        if let (Some(dir), Some(filtered)) = (out, &filtered) {
            let target = dir.join(format!("{}.filtered.json", file_stem(path)));
            fs::write(&target, serde_json::to_vec_pretty(filtered)?)
                .with_context(|| format!("failed to write {}", target.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), target.display().to_string().bold());
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!(
        "{} {} ({})",
        "filter".bold(),
        summary.filter_name,
        filter.txt_string().dimmed()
    );
    for atom in &summary.results {
        let status = if atom.matched() {
            "match".green().bold()
        } else {
            "none".yellow().bold()
        };
        println!(
            "{:>4}  {:<6} {}  hits={} hsps={}{}",
            atom.order + 1,
            status,
            atom.query_name,
            atom.hit_count,
            atom.hsp_count,
            atom.first_hit
                .as_deref()
                .map(|h| format!(" first={h}"))
                .unwrap_or_default()
        );
    }
    println!(
        "{} {}/{} documents matched, {} hits, {} HSPs",
        "ok".green().bold(),
        summary.matched_queries(),
        summary.results.len(),
        summary.total_hits(),
        summary.total_hsps()
    );
    Ok(())
}

fn cmd_compile(system: &FilterSystem, filter_path: &Path, features: bool) -> Result<()> {
    let mut filter = load_filter(system, filter_path)
        .with_context(|| format!("failed to load filter {}", filter_path.display()))?;
    if filter.is_empty() {
        bail!("filter `{}` has no rules", filter.name());
    }
    let query = if features {
        filter.compile_feature_table()?
    } else {
        filter.compile()?
    };
    println!("{query}");
    Ok(())
}

fn cmd_render(system: &FilterSystem, filter_path: &Path, html: bool) -> Result<()> {
    let filter = load_filter(system, filter_path)
        .with_context(|| format!("failed to load filter {}", filter_path.display()))?;
    if html {
        println!("{}", filter.html_string());
    } else {
        println!("{}: {}", filter.name().bold(), filter.description());
        println!("{}", filter.txt_string());
    }
    Ok(())
}

fn cmd_query(
    constraint: &str,
    distinct: bool,
    return_vars: &[String],
    limit: usize,
    document_path: &Path,
) -> Result<()> {
    let document = read_document(document_path)?;
    let query = build_query(constraint, distinct, return_vars)?;
    tracing::debug!(query = %query, "running raw query");

    let graph = DocumentGraph::build(&document);
    let result = BacktrackingEngine::with_max_rows(limit).execute(&graph, &query)?;
    for row in &result.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|(var, node)| {
                let label = graph.entity(*node).map(describe).unwrap_or_default();
                format!("{}={}", var.cyan(), label)
            })
            .collect();
        println!("{}", cells.join("  "));
    }
    eprintln!(
        "{} {} tuple(s){}",
        "ok".green().bold(),
        result.len(),
        if result.truncated { " (truncated)" } else { "" }
    );
    Ok(())
}

fn cmd_new(
    system: &FilterSystem,
    name: &str,
    description: Option<String>,
    or: bool,
    rules: &[String],
    out: &Path,
) -> Result<()> {
    let mut filter = system.create_filter(name)?;
    if let Some(description) = description {
        filter.set_description(description);
    }
    filter.set_exclusive(!or);
    for arg in rules {
        let (accessor, operator, value) = split_rule_arg(arg)?;
        let rule = system
            .rule_from_text(accessor, operator, value)
            .with_context(|| format!("invalid rule `{arg}`"))?;
        filter
            .add(rule)
            .with_context(|| format!("invalid rule `{arg}`"))?;
    }
    filter.compile()?;
    save_filter(&filter, out)?;
    eprintln!("{} {}", "wrote".green().bold(), out.display().to_string().bold());
    println!("{}", filter.txt_string());
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

fn split_rule_arg(arg: &str) -> Result<(&str, &str, &str)> {
    let mut parts = arg.splitn(3, '|');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(accessor), Some(operator), Some(value)) => Ok((accessor, operator, value)),
        _ => Err(anyhow!("rule `{arg}` must look like ACCESSOR|OPERATOR|VALUE")),
    }
}

fn build_query(constraint: &str, distinct: bool, return_vars: &[String]) -> Result<GraphQuery> {
    let expr = parse_constraint(constraint)?;
    let (needs_features, needs_qualifiers) = {
        let vars = expr.vars();
        let qualifiers = vars.contains("v6");
        (qualifiers || vars.contains("v5"), qualifiers)
    };

    let mut query = GraphQuery::new();
    query
        .declare_vertex("v1", EntityKind::Output)
        .declare_vertex("v2", EntityKind::Iteration)
        .declare_vertex("v3", EntityKind::Hit)
        .declare_vertex("v4", EntityKind::Hsp)
        .declare_edge("e1", EdgeKind::ContainsIteration, "v1", "v2")
        .declare_edge("e2", EdgeKind::ContainsHit, "v2", "v3")
        .declare_edge("e3", EdgeKind::ContainsHsp, "v3", "v4");
    if needs_features {
        query
            .declare_vertex("v5", EntityKind::Feature)
            .declare_edge("e4", EdgeKind::ContainsFeature, "v4", "v5");
    }
    if needs_qualifiers {
        query
            .declare_vertex("v6", EntityKind::Qualifier)
            .declare_edge("e5", EdgeKind::ContainsQualifier, "v5", "v6");
    }
    query.constrain(expr).set_distinct(distinct);
    if !return_vars.is_empty() {
        query.set_return_vars(return_vars.iter().map(|v| v.trim().to_string()));
    }
    Ok(query)
}

fn describe(entity: Entity<'_>) -> String {
    match entity {
        Entity::Output(o) => o.blast_type.clone(),
        Entity::Iteration(it) => format!("iteration#{}", it.iter_num),
        Entity::Hit(h) => format!("hit#{}:{}", h.hit_num, h.accession),
        Entity::Hsp(h) => format!("hsp#{}", h.hsp_num),
        Entity::FeatureTable(t) => format!("features[{}]", t.features.len()),
        Entity::Feature(f) => f.key.clone(),
        Entity::Qualifier(q) => format!("{}={}", q.name, q.value),
    }
}

/// First iteration's query definition, else the file stem.
fn query_name(document: &SrOutput, path: &Path) -> String {
    document
        .iterations
        .first()
        .and_then(|it| it.query_def.clone())
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| file_stem(path))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_rule_arg_keeps_separators_in_value() {
        assert_eq!(
            split_rule_arg("HSP alignment length|[]|50;150").unwrap(),
            ("HSP alignment length", "[]", "50;150")
        );
        assert_eq!(
            split_rule_arg("Hit definition|::=|a|b").unwrap(),
            ("Hit definition", "::=", "a|b")
        );
        assert!(split_rule_arg("Hit Accession|==").is_err());
    }

    #[test]
    fn test_build_query_declares_feature_levels_on_demand() {
        let q = build_query(r#"v3.accession == "1FQY-A""#, false, &[]).unwrap();
        assert_eq!(q.vertices().len(), 4);

        let q = build_query(r#"v6.qualName == "Clinical""#, true, &["v3".to_string()]).unwrap();
        assert_eq!(q.vertices().len(), 6);
        assert_eq!(q.edges().len(), 5);
        assert_eq!(q.return_vars(), vec!["v3"]);
        assert!(q.is_distinct());
    }

    #[test]
    fn test_query_name_prefers_query_definition() {
        use hitfilter_graph::SrIteration;

        let path = Path::new("runs/p12345.json");
        let mut doc = SrOutput {
            iterations: vec![SrIteration {
                iter_num: 1,
                query_def: Some("p12345 kinase".to_string()),
                ..SrIteration::default()
            }],
            ..SrOutput::default()
        };
        assert_eq!(query_name(&doc, path), "p12345 kinase");

        doc.iterations[0].query_def = Some(String::new());
        assert_eq!(query_name(&doc, path), "p12345");
        doc.iterations[0].query_def = None;
        assert_eq!(query_name(&doc, path), "p12345");
        assert_eq!(query_name(&SrOutput::default(), path), "p12345");
    }

    #[test]
    fn test_new_then_render_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.json");
        let system = FilterSystem::default();
        cmd_new(
            &system,
            "long",
            None,
            false,
            &["HSP alignment length|>=|100".to_string()],
            &path,
        )
        .unwrap();
        let filter = load_filter(&system, &path).unwrap();
        assert_eq!(filter.txt_string(), "HSP alignment length is greater than or equal to 100");
    }
}
