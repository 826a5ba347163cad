//! clickpath CLI entry point

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use clickpath::{
    commands::{
        cmd_actions, cmd_create_collection, cmd_delete_collection, cmd_distances,
        cmd_edit_distances, cmd_encode_vectors, cmd_events, cmd_ingest, cmd_init,
        cmd_list_collections, cmd_list_rules, cmd_popularity, cmd_ranking, cmd_sessions,
        cmd_show_collection, cmd_show_rules, cmd_status, cmd_summary, cmd_tag, cmd_tag_counts,
        cmd_traces, cmd_upload_rules, print_collection_details, print_collections, print_counts,
        print_distance_report, print_ingest_stats, print_rule_set_details, print_rule_sets,
        print_session_report, print_status, print_summary, print_tag_stats, print_vector_report,
        write_events, EncodingInput, IngestOptions, Level, Ranking,
    },
    config::Config,
    encode::{Metric, Representation},
    error::{Error, Result},
    meta::MetaDb,
    parse::Normalizer,
    progress::LogWriterFactory,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "clickpath")]
#[command(
    version,
    about = "Turn web access logs into tagged sessions, behavioral traces and clustering features",
    long_about = None
)]
struct Cli {
    /// Path to config file (or its directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit log lines as JSON objects
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize clickpath configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Manage collections
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },

    /// Ingest access logs or CSV exports into a collection
    Ingest {
        #[command(subcommand)]
        input: IngestInput,
    },

    /// Manage tag rule sets
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// Tag every request of a collection, replacing previous tags
    Tag {
        #[command(flatten)]
        target: CollectionArg,

        /// Rule set name (defaults to the built-in cascade)
        #[arg(long)]
        rules: Option<String>,
    },

    /// Trace and session statistics
    Stats {
        #[command(subcommand)]
        query: StatsQuery,
    },

    /// Feature vectors and distance matrices for clustering
    Encode {
        #[command(subcommand)]
        output: EncodeOutput,
    },

    /// Export event rows (client, session, action, timestamp) for process mining
    Events {
        #[command(flatten)]
        target: CollectionArg,
    },

    /// Show system status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
struct CollectionArg {
    /// Collection name (defaults to the configured default collection)
    #[arg(long)]
    collection: Option<String>,
}

#[derive(Args)]
struct LevelArg {
    /// Count individual actions instead of whole traces
    #[arg(long)]
    actions: bool,
}

#[derive(Subcommand)]
enum CollectionAction {
    /// Create an empty collection
    Create { name: String },

    /// List collections
    List,

    /// Show a collection and its ingested files
    Show { name: String },

    /// Delete a collection and all its data
    Delete {
        name: String,

        /// Skip confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum IngestInput {
    /// Ingest raw access log files or directories
    Log {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        target: CollectionArg,

        /// Log format directives (e.g. '%h %l %u %t "%r" %>s %b')
        #[arg(long)]
        format: Option<String>,

        /// strftime-style format of the %t field
        #[arg(long)]
        timestamp_format: Option<String>,

        /// Seconds of inactivity that start a new session
        #[arg(long)]
        session_time_limit: Option<i64>,
    },

    /// Ingest CSV exports through a column mapping
    Csv {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        target: CollectionArg,

        /// Field separator (one ASCII character)
        #[arg(long)]
        separator: Option<String>,

        #[arg(long)]
        timestamp_column: Option<String>,

        #[arg(long)]
        timestamp_format: Option<String>,

        /// Column holding the requested URL
        #[arg(long)]
        action_column: Option<String>,

        /// Column identifying the client
        #[arg(long)]
        session_id_column: Option<String>,

        /// Seconds of inactivity that start a new session
        #[arg(long)]
        session_time_limit: Option<i64>,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    /// Validate and store a JSON rule set
    Upload { name: String, file: PathBuf },

    /// Show a rule set ('builtin' for the built-in cascade)
    Show { name: String },

    /// List rule sets
    List,
}

#[derive(Subcommand)]
enum StatsQuery {
    /// Print traces as client_id;tag,...,tag
    Traces {
        #[command(flatten)]
        target: CollectionArg,

        /// Only this client's traces
        #[arg(long)]
        client: Option<String>,
    },

    /// Occurrences of each distinct trace (or action)
    Popularity {
        #[command(flatten)]
        target: CollectionArg,
        #[command(flatten)]
        level: LevelArg,
    },

    /// Total and unique counts
    Unique {
        #[command(flatten)]
        target: CollectionArg,
        #[command(flatten)]
        level: LevelArg,
    },

    /// Total divided by unique
    Average {
        #[command(flatten)]
        target: CollectionArg,
        #[command(flatten)]
        level: LevelArg,
    },

    /// Total number of actions across traces
    Actions {
        #[command(flatten)]
        target: CollectionArg,
    },

    /// Most frequent traces (or actions)
    Top {
        #[command(flatten)]
        target: CollectionArg,
        #[command(flatten)]
        level: LevelArg,

        /// Number of entries (defaults to analytics.top_n)
        #[arg(short = 'n', long = "count")]
        n: Option<usize>,
    },

    /// Least frequent traces (or actions)
    Bottom {
        #[command(flatten)]
        target: CollectionArg,
        #[command(flatten)]
        level: LevelArg,

        /// Number of entries (defaults to analytics.top_n)
        #[arg(short = 'n', long = "count")]
        n: Option<usize>,
    },

    /// Per-client session counts, sizes and durations
    Sessions {
        #[command(flatten)]
        target: CollectionArg,

        #[arg(long)]
        client: Option<String>,
    },

    /// Requests per tag, Outliers included
    Tags {
        #[command(flatten)]
        target: CollectionArg,

        /// Only count this tag
        #[arg(long)]
        tag: Option<String>,
    },
}

#[derive(Args)]
struct TraceSourceArgs {
    /// Collection to read traces from
    #[arg(long, conflicts_with = "traces_file")]
    collection: Option<String>,

    /// File of client_id;tag,...,tag lines instead of a collection
    #[arg(long)]
    traces_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum EncodeOutput {
    /// One feature vector per trace
    Vectors {
        #[command(flatten)]
        source: TraceSourceArgs,

        /// binary, frequency, relative-frequency or fss
        #[arg(short, long)]
        representation: Representation,
    },

    /// Pairwise distances between feature vectors
    Distances {
        #[command(flatten)]
        source: TraceSourceArgs,

        /// binary, frequency, relative-frequency or fss
        #[arg(short, long)]
        representation: Representation,

        /// jaccard, hamming, cosine or euclidean (fss only)
        #[arg(short, long)]
        metric: Metric,
    },

    /// Pairwise Levenshtein distances between traces
    EditDistances {
        #[command(flatten)]
        source: TraceSourceArgs,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let json_layer = cli
        .log_json
        .then(|| fmt::layer().json().with_writer(LogWriterFactory::default()));
    let text_layer = (!cli.log_json).then(|| fmt::layer().with_writer(LogWriterFactory::default()));

    tracing_subscriber::registry()
        .with(json_layer)
        .with(text_layer)
        .with(filter)
        .init();

    // Init and completions do not need an existing config
    if let Commands::Init { force } = cli.command {
        return handle_init(cli.config, force).await;
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "clickpath", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let db = MetaDb::connect(&config).await?;
    let json = cli.json;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Collection { action } => handle_collection(&db, action, json).await?,

        Commands::Ingest { input } => handle_ingest(&config, &db, input, json).await?,

        Commands::Rules { action } => match action {
            RulesAction::Upload { name, file } => {
                let info = cmd_upload_rules(&db, &name, &file).await?;
                output(json, &info, |i| {
                    println!("✓ Stored rule set '{}' ({} rules)", i.name, i.rule_count)
                })?;
            }
            RulesAction::Show { name } => {
                let details = cmd_show_rules(&db, &name).await?;
                output(json, &details, print_rule_set_details)?;
            }
            RulesAction::List => {
                let rule_sets = cmd_list_rules(&db).await?;
                output(json, &rule_sets, |r| print_rule_sets(r))?;
            }
        },

        Commands::Tag { target, rules } => {
            let collection = target.resolve(&config);
            let stats = cmd_tag(&db, &collection, rules.as_deref()).await?;
            output(json, &stats, print_tag_stats)?;
        }

        Commands::Stats { query } => handle_stats(&config, &db, query, json).await?,

        Commands::Encode { output: kind } => handle_encode(&config, &db, kind, json).await?,

        Commands::Events { target } => {
            let events = cmd_events(&db, &target.resolve(&config)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else {
                write_events(&events, std::io::stdout().lock())?;
            }
        }

        Commands::Status => {
            let status = cmd_status(&config, &db).await?;
            output(json, &status, print_status)?;
        }
    }

    Ok(())
}

impl CollectionArg {
    fn resolve(&self, config: &Config) -> String {
        self.collection
            .clone()
            .unwrap_or_else(|| config.default_collection.clone())
    }
}

impl LevelArg {
    fn level(&self) -> Level {
        Level::from_actions_flag(self.actions)
    }
}

/// Print `value` as pretty JSON or through the human-readable printer
fn output<T: Serialize + ?Sized>(json: bool, value: &T, human: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

/// Resolve the config file path: a `.toml` file or a directory holding `config.toml`
fn config_file_path(path: Option<&Path>) -> PathBuf {
    match path {
        Some(p) if p.extension().is_some_and(|e| e == "toml") => p.to_path_buf(),
        Some(p) => p.join("config.toml"),
        None => Config::default_config_path(),
    }
}

async fn handle_init(path: Option<PathBuf>, force: bool) -> Result<()> {
    let config_path = config_file_path(path.as_deref());
    let base_dir = config_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_base_dir);

    let config = cmd_init(Some(base_dir), force).await?;

    println!("✓ clickpath initialized successfully");
    println!("  Config: {}", config.paths.config_file.display());
    println!("  Database: {}", config.paths.db_file.display());
    println!("\nNext steps:");
    println!("  1. Edit the config file to match your log format");
    println!("  2. Ingest logs: clickpath ingest log /path/to/access.log");
    println!("  3. Tag requests: clickpath tag");
    println!("  4. Explore: clickpath stats top");

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = config_file_path(path);
    if !config_path.exists() {
        return Err(Error::NotInitialized);
    }
    Config::load(&config_path)
}

async fn handle_collection(db: &MetaDb, action: CollectionAction, json: bool) -> Result<()> {
    match action {
        CollectionAction::Create { name } => {
            let collection = cmd_create_collection(db, &name).await?;
            output(json, &collection, |c| println!("✓ Created collection '{}'", c.name))?;
        }
        CollectionAction::List => {
            let collections = cmd_list_collections(db).await?;
            output(json, &collections, |c| print_collections(c))?;
        }
        CollectionAction::Show { name } => {
            let details = cmd_show_collection(db, &name).await?;
            output(json, &details, print_collection_details)?;
        }
        CollectionAction::Delete { name, yes } => {
            if !yes {
                return Err(Error::Config(format!(
                    "Deleting '{}' removes all its data. Run with --yes to confirm.",
                    name
                )));
            }
            let removed = cmd_delete_collection(db, &name).await?;
            output(json, &removed, |s| {
                println!("✓ Collection '{}' deleted", name);
                println!(
                    "  Removed {} file record(s), {} client(s), {} request(s)",
                    s.file_count, s.client_count, s.request_count
                );
            })?;
        }
    }
    Ok(())
}

async fn handle_ingest(config: &Config, db: &MetaDb, input: IngestInput, json: bool) -> Result<()> {
    let (paths, target, normalizer, session_time_limit) = match input {
        IngestInput::Log {
            paths,
            target,
            format,
            timestamp_format,
            session_time_limit,
        } => {
            let mut log = config.log.clone();
            if let Some(format) = format {
                log.format = format;
            }
            if let Some(ts) = timestamp_format {
                log.timestamp_format = ts;
            }
            (paths, target, Normalizer::access_log(&log)?, session_time_limit)
        }
        IngestInput::Csv {
            paths,
            target,
            separator,
            timestamp_column,
            timestamp_format,
            action_column,
            session_id_column,
            session_time_limit,
        } => {
            let mut overridden = config.clone();
            let csv = &mut overridden.csv;
            if let Some(v) = separator {
                csv.separator = v;
            }
            if let Some(v) = timestamp_column {
                csv.timestamp_column = v;
            }
            if let Some(v) = timestamp_format {
                csv.timestamp_format = v;
            }
            if let Some(v) = action_column {
                csv.action_column = v;
            }
            if let Some(v) = session_id_column {
                csv.session_id_column = v;
            }
            overridden.validate()?;
            (paths, target, Normalizer::csv(overridden.csv)?, session_time_limit)
        }
    };

    let options = IngestOptions {
        collection: target.resolve(config),
        time_limit_secs: session_time_limit.unwrap_or(config.session.time_limit_secs),
    };

    let stats = cmd_ingest(db, &normalizer, &paths, options).await?;
    output(json, &stats, print_ingest_stats)
}

async fn handle_stats(config: &Config, db: &MetaDb, query: StatsQuery, json: bool) -> Result<()> {
    match query {
        StatsQuery::Traces { target, client } => {
            let lines = cmd_traces(db, &target.resolve(config), client.as_deref()).await?;
            output(json, &lines, |lines| {
                for line in lines {
                    println!("{}", line);
                }
            })?;
        }
        StatsQuery::Popularity { target, level } => {
            let report = cmd_popularity(db, &target.resolve(config), level.level()).await?;
            output(json, &report, |r| print_counts("Popularity", &r.entries))?;
        }
        StatsQuery::Unique { target, level } => {
            let summary = cmd_summary(db, &target.resolve(config), level.level()).await?;
            output(json, &summary, |s| print_summary(level.level(), s))?;
        }
        StatsQuery::Average { target, level } => {
            let summary = cmd_summary(db, &target.resolve(config), level.level()).await?;
            output(json, &summary, |s| println!("{:.4}", s.average))?;
        }
        StatsQuery::Actions { target } => {
            let report = cmd_actions(db, &target.resolve(config)).await?;
            output(json, &report, |r| {
                println!("Actions: {}", r.action_number);
                println!("Distinct actions: {}", r.unique_actions);
                println!("Traces: {}", r.traces);
            })?;
        }
        StatsQuery::Top { target, level, n } => {
            let n = ranking_size(config, n)?;
            let report =
                cmd_ranking(db, &target.resolve(config), level.level(), Ranking::Top, n).await?;
            output(json, &report, |r| print_counts(&format!("Top {}", n), &r.entries))?;
        }
        StatsQuery::Bottom { target, level, n } => {
            let n = ranking_size(config, n)?;
            let report =
                cmd_ranking(db, &target.resolve(config), level.level(), Ranking::Bottom, n)
                    .await?;
            output(json, &report, |r| {
                print_counts(&format!("Bottom {}", n), &r.entries)
            })?;
        }
        StatsQuery::Sessions { target, client } => {
            let report = cmd_sessions(db, &target.resolve(config), client.as_deref()).await?;
            output(json, &report, print_session_report)?;
        }
        StatsQuery::Tags { target, tag } => {
            let counts = cmd_tag_counts(db, &target.resolve(config), tag.as_deref()).await?;
            output(json, &counts, |c| print_counts("Requests per tag", c))?;
        }
    }
    Ok(())
}

fn ranking_size(config: &Config, n: Option<usize>) -> Result<usize> {
    match n.unwrap_or(config.analytics.top_n) {
        0 => Err(Error::Config("-n must be at least 1".to_string())),
        n => Ok(n),
    }
}

async fn load_encoding_input(
    config: &Config,
    db: &MetaDb,
    source: TraceSourceArgs,
) -> Result<EncodingInput> {
    match source.traces_file {
        Some(path) => EncodingInput::from_file(&path).await,
        None => {
            let collection = source
                .collection
                .unwrap_or_else(|| config.default_collection.clone());
            EncodingInput::from_collection(db, &collection).await
        }
    }
}

async fn handle_encode(config: &Config, db: &MetaDb, kind: EncodeOutput, json: bool) -> Result<()> {
    match kind {
        EncodeOutput::Vectors {
            source,
            representation,
        } => {
            let input = load_encoding_input(config, db, source).await?;
            let report = cmd_encode_vectors(&input, representation, &config.encoding)?;
            output(json, &report, print_vector_report)?;
        }
        EncodeOutput::Distances {
            source,
            representation,
            metric,
        } => {
            let input = load_encoding_input(config, db, source).await?;
            let report = cmd_distances(&input, representation, metric, &config.encoding)?;
            output(json, &report, print_distance_report)?;
        }
        EncodeOutput::EditDistances { source } => {
            let input = load_encoding_input(config, db, source).await?;
            let report = cmd_edit_distances(&input);
            output(json, &report, print_distance_report)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_json_flag_is_global() {
        let cli = Cli::try_parse_from(["clickpath", "status", "--log-json"]).unwrap();
        assert!(cli.log_json);
        assert!(!cli.json);
        assert!(matches!(cli.command, Commands::Status));

        let cli = Cli::try_parse_from(["clickpath", "status"]).unwrap();
        assert!(!cli.log_json);
    }
}
