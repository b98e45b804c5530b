use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use osmwrangle::audit;
use osmwrangle::config::DEFAULT_SAMPLE_STRIDE;
use osmwrangle::parser::{count_tags, open_input};
use osmwrangle::report::{self, CANNED_QUERIES, DEFAULT_DATABASE, DEFAULT_USER};
use osmwrangle::rules::CleaningRules;
use osmwrangle::writer::{self, ExportOptions};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "osmwrangle")]
#[command(about = "Sample, audit and flatten OpenStreetMap XML into CSV tables")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write every k-th top-level element into a smaller OSM file
    Sample(SampleArgs),
    /// Report tag key classes and unexpected street suffixes
    Audit(AuditArgs),
    /// Shape nodes and ways into the five CSV tables
    Export(ExportArgs),
    /// Run read-only exploration queries against the loaded SQLite database
    Report(ReportArgs),
}

#[derive(Args)]
struct SampleArgs {
    /// Path to the OSM XML file (.osm or .osm.bz2)
    #[arg(short, long)]
    input: String,

    /// Path of the sampled file to write
    #[arg(short, long, default_value = "sample.osm")]
    output: String,

    /// Keep every k-th element
    #[arg(short = 'k', long, default_value_t = DEFAULT_SAMPLE_STRIDE)]
    stride: usize,
}

#[derive(Args)]
struct AuditArgs {
    /// Path to the OSM XML file (.osm or .osm.bz2)
    #[arg(short, long)]
    input: String,

    /// JSON file overriding the expected street suffixes and abbreviation mapping
    #[arg(long)]
    rules: Option<String>,

    /// Also count every element name in the whole document
    #[arg(long)]
    count_tags: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ExportArgs {
    /// Path to the OSM XML file (.osm or .osm.bz2)
    #[arg(short, long)]
    input: String,

    /// Output directory for the CSV files
    #[arg(short, long)]
    output: String,

    /// JSON file overriding the expected street suffixes and abbreviation mapping
    #[arg(long)]
    rules: Option<String>,

    /// Validate every shaped element against the table schema
    #[arg(long)]
    validate: bool,

    /// Limit number of elements to process (for testing)
    #[arg(long)]
    limit: Option<u64>,

    /// Dry run - don't write output files
    #[arg(long)]
    dry_run: bool,

    /// Print the run counters as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ReportArgs {
    /// SQLite database loaded from the exported CSV files [default: osm.db]
    #[arg(short, long)]
    db: Option<String>,

    /// Run only the named canned query (see --list)
    #[arg(short, long)]
    query: Option<String>,

    /// Run an ad-hoc read-only SQL statement instead of the canned queries
    #[arg(long, conflicts_with = "query")]
    sql: Option<String>,

    /// Contributor for the per-user query
    #[arg(long, default_value = DEFAULT_USER)]
    user: String,

    /// List the canned queries and exit
    #[arg(long)]
    list: bool,

    /// Also print the size of each data file in this directory
    #[arg(long)]
    sizes: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

fn load_rules(path: Option<&str>) -> Result<CleaningRules> {
    match path {
        Some(p) => CleaningRules::from_json_file(p),
        None => Ok(CleaningRules::default()),
    }
}

fn run_sample(args: SampleArgs) -> Result<()> {
    let start = Instant::now();
    let stats = osmwrangle::sample::sample_file(&args.input, &args.output, args.stride)?;

    println!();
    println!("=== Sample ===");
    println!("Elements seen:      {}", stats.seen);
    println!("Elements written:   {}", stats.written);
    println!("Output:             {}", args.output);
    println!("Time:               {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn run_audit(args: AuditArgs) -> Result<()> {
    let rules = load_rules(args.rules.as_deref())?;
    let report = audit::audit_file(&args.input, &rules)?;
    let updates = report.proposed_updates(&rules);
    let tag_counts = if args.count_tags {
        Some(count_tags(open_input(&args.input)?)?)
    } else {
        None
    };

    if args.json {
        let out = serde_json::json!({
            "audit": report,
            "proposed_updates": updates,
            "tag_counts": tag_counts,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if let Some(counts) = tag_counts {
        println!("=== Element counts ===");
        for (name, count) in &counts {
            println!("{:<20}{}", name, count);
        }
        println!();
    }

    println!("=== Tag keys ===");
    println!("lower:              {}", report.key_types.lower);
    println!("lower_colon:        {}", report.key_types.lower_colon);
    println!("problemchars:       {}", report.key_types.problemchars);
    println!("other:              {}", report.key_types.other);
    println!();
    println!("=== Unexpected street types ===");
    for (street_type, names) in &report.street_types {
        println!("{} ({})", street_type, names.len());
    }
    println!();
    println!("=== Proposed updates ===");
    for update in updates.iter().filter(|u| u.name != u.better_name) {
        println!("{} => {}", update.name, update.better_name);
    }
    Ok(())
}

fn run_export(args: ExportArgs) -> Result<()> {
    let rules = load_rules(args.rules.as_deref())?;
    let options = ExportOptions {
        validate: args.validate,
        limit: args.limit,
        dry_run: args.dry_run,
    };

    let start = Instant::now();
    let stats = writer::export(&args.input, &args.output, &rules, options)?;
    let duration = start.elapsed();
    info!(duration_secs = duration.as_secs_f64(), "Export finished");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!();
    println!("=== Summary ===");
    println!("Export time:        {:.2}s", duration.as_secs_f64());
    println!("Nodes:              {}", stats.nodes);
    println!("Node tags:          {}", stats.node_tags);
    println!("Ways:               {}", stats.ways);
    println!("Way tags:           {}", stats.way_tags);
    println!("Way nodes:          {}", stats.way_nodes);
    println!("Dropped tags:       {}", stats.dropped_tags);
    println!("Streets updated:    {}", stats.streets_updated);
    Ok(())
}

fn print_result(title: &str, result: &report::QueryResult, json: bool) -> Result<()> {
    if json {
        let out = serde_json::json!({ "title": title, "result": result });
        println!("{}", serde_json::to_string(&out)?);
    } else {
        println!("=== {} ===", title);
        println!("{}", report::render_table(result));
        println!();
    }
    Ok(())
}

/// The database to query, or `None` when only `--sizes` was asked for.
fn database_path(args: &ReportArgs) -> Option<&str> {
    let sizes_only =
        args.sizes.is_some() && args.db.is_none() && args.query.is_none() && args.sql.is_none();
    if sizes_only {
        None
    } else {
        Some(args.db.as_deref().unwrap_or(DEFAULT_DATABASE))
    }
}

fn run_report(args: ReportArgs) -> Result<()> {
    if args.list {
        for q in CANNED_QUERIES {
            println!("{:<20}{}", q.name, q.title);
        }
        return Ok(());
    }

    if let Some(dir) = &args.sizes {
        let sizes = report::file_sizes(dir)?;
        if args.json {
            println!("{}", serde_json::to_string(&sizes)?);
        } else {
            println!("=== File sizes ===");
            for size in &sizes {
                println!("{:<24}{:>8.1} MB", size.name, size.megabytes);
            }
            println!();
        }
    }

    let Some(db) = database_path(&args) else {
        return Ok(());
    };
    let conn = report::open_database(db)?;

    if let Some(sql) = &args.sql {
        let result = report::run_query(&conn, sql, &[])?;
        return print_result(sql, &result, args.json);
    }

    let queries: Vec<_> = match &args.query {
        Some(name) => vec![report::find_query(name)
            .with_context(|| format!("Unknown query: {} (use --list)", name))?],
        None => CANNED_QUERIES.iter().collect(),
    };

    for q in queries {
        let result = report::run_canned(&conn, q, &args.user)?;
        print_result(q.title, &result, args.json)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Sample(args) => run_sample(args),
        Commands::Audit(args) => run_audit(args),
        Commands::Export(args) => run_export(args),
        Commands::Report(args) => run_report(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
