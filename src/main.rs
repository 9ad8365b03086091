use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use sessionize::{Event, ProductSummary, RawRecord, ResultMap, aggregator, normalizer};

use source::InputFormat;

mod config;
mod debug_log;
mod output;
mod source;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "sessionize")]
#[command(version)]
#[command(about = "Count product views before each product's last purchase")]
#[command(disable_help_subcommand = true)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Args)]
struct RunArgs {
    /// Event files or glob patterns; `-` or nothing reads standard input
    inputs: Vec<String>,

    /// Input format. CSV/TSV fields are split on the delimiter; quoting is not supported
    #[arg(long, value_enum)]
    format: Option<InputFormat>,

    /// Output JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Pretty-print JSON instead of a single line
    #[arg(long)]
    pretty: bool,

    /// Report per-product session detail instead of bare counts
    #[arg(long, conflicts_with = "include_unpurchased")]
    detailed: bool,

    /// Skip malformed records with a warning instead of aborting
    #[arg(long)]
    skip_malformed: bool,

    /// Also list products that were never purchased, with a count of 0
    #[arg(long)]
    include_unpurchased: bool,

    /// Use comma-separated number formatting
    #[arg(long)]
    number_comma: bool,

    /// Use human-readable number formatting (k, m, b, t)
    #[arg(short = 'H', long)]
    number_human: bool,

    /// Locale for number formatting (en, de, fr, es, it, ja, ko, zh)
    #[arg(long)]
    locale: Option<String>,

    /// Number of decimal places for human-readable formatting
    #[arg(long)]
    decimal_places: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    subcommand: ConfigSubcommands,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Create default configuration file
    Init {
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
    /// Show current configuration
    Show,
    /// Set configuration value
    Set {
        /// Configuration key (input-format, skip-malformed, json, pretty, detailed,
        /// include-unpurchased, number-comma, number-human, locale, decimal-places)
        key: String,
        /// Configuration value
        value: String,
    },
}

/// Config file defaults with CLI overrides applied.
struct RunSettings {
    inputs: Vec<String>,
    format: InputFormat,
    json: bool,
    pretty: bool,
    detailed: bool,
    skip_malformed: bool,
    include_unpurchased: bool,
    number_format: output::NumberFormatOptions,
}

impl RunSettings {
    fn merge(args: RunArgs, config: config::Config) -> Result<Self> {
        let detailed = args.detailed || config.output.detailed;
        let include_unpurchased = args.include_unpurchased || config.output.include_unpurchased;
        if detailed && include_unpurchased {
            anyhow::bail!("--detailed cannot be combined with --include-unpurchased");
        }

        Ok(Self {
            inputs: args.inputs,
            format: args.format.unwrap_or(config.input.format),
            json: args.json || config.output.json,
            pretty: args.pretty || config.output.pretty,
            detailed,
            skip_malformed: args.skip_malformed || config.input.skip_malformed,
            include_unpurchased,
            number_format: output::NumberFormatOptions {
                use_comma: args.number_comma || config.formatting.number_comma,
                use_human: args.number_human || config.formatting.number_human,
                locale: args.locale.unwrap_or(config.formatting.locale),
                decimal_places: args
                    .decimal_places
                    .unwrap_or(config.formatting.decimal_places),
            },
        })
    }
}

#[tokio::main]
async fn main() {
    debug_log::init();
    let cli = Cli::parse();

    match cli.command {
        None => {
            if let Err(e) = run(cli.run).await {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config(config_args)) => {
            handle_config_subcommand(config_args);
        }
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let config = match config::Config::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            output::warn_once(format!("⚠️  Ignoring config file: {e:#}"));
            config::Config::default()
        }
    };
    let settings = RunSettings::merge(args, config)?;

    let registry = source::discover_sources(&settings.inputs, settings.format)?;
    debug_log::log("PIPELINE", "SOURCES", &registry.len().to_string());
    let records = {
        let _timer = debug_log::StageTimer::new("read");
        registry.load_all().await?
    };

    let (report, skipped) = analyze(records, &settings)?;
    debug_log::log("PIPELINE", "SKIPPED", &skipped.to_string());
    let rendered = render(&report, &settings)?;

    print!("{rendered}");
    if settings.json {
        println!();
    }

    Ok(())
}

/// What a run reports: bare counts, or per-product detail with `--detailed`.
#[derive(Debug)]
enum Report {
    Counts(ResultMap),
    Summaries(BTreeMap<String, ProductSummary>),
}

/// Normalize, dropping and warning about malformed records when allowed.
/// Returns the events and the number of records skipped.
fn normalize_records(records: Vec<RawRecord>, skip_malformed: bool) -> Result<(Vec<Event>, usize)> {
    let _timer = debug_log::StageTimer::new("normalize");
    if !skip_malformed {
        let events = normalizer::normalize(records).context("Malformed input")?;
        return Ok((events, 0));
    }

    let total = records.len();
    let events: Vec<_> = normalizer::normalize_each(records)
        .filter_map(|result| match result {
            Ok(event) => Some(event),
            Err(e) => {
                output::warn_once(format!("⚠️  Skipping {e}"));
                None
            }
        })
        .collect();
    let skipped = total - events.len();
    if skipped > 0 {
        output::warn_once(format!("⚠️  Skipped {skipped} of {total} records"));
    }
    Ok((events, skipped))
}

/// Run the pipeline over already-loaded records.
fn analyze(records: Vec<RawRecord>, settings: &RunSettings) -> Result<(Report, usize)> {
    let (events, skipped) = normalize_records(records, settings.skip_malformed)?;
    debug_log::log("PIPELINE", "EVENTS", &events.len().to_string());

    let all_products = settings
        .include_unpurchased
        .then(|| aggregator::product_ids(&events));

    let sessions = {
        let _timer = debug_log::StageTimer::new("sessionize");
        sessionize::sessionize(events)
    };
    debug_log::log("PIPELINE", "SESSIONS", &sessions.len().to_string());

    let _timer = debug_log::StageTimer::new("aggregate");
    let report = if settings.detailed {
        Report::Summaries(aggregator::summarize(&sessions))
    } else {
        let mut result = aggregator::aggregate(&sessions);
        if let Some(products) = all_products {
            result = aggregator::with_unpurchased(result, products);
        }
        Report::Counts(result)
    };

    Ok((report, skipped))
}

fn render(report: &Report, settings: &RunSettings) -> Result<String> {
    match report {
        Report::Counts(result) if settings.json => output::to_json(result, settings.pretty),
        Report::Counts(result) => Ok(output::render_counts_table(result, &settings.number_format)),
        Report::Summaries(summaries) if settings.json => {
            output::to_json(summaries, settings.pretty)
        }
        Report::Summaries(summaries) => Ok(output::render_summary_table(
            summaries,
            &settings.number_format,
        )),
    }
}

fn handle_config_subcommand(config_args: ConfigArgs) {
    match config_args.subcommand {
        ConfigSubcommands::Init { overwrite } => {
            if let Err(e) = config::create_default_config(overwrite) {
                eprintln!("Error creating config: {e}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Show => {
            if let Err(e) = config::show_config() {
                eprintln!("Error showing config: {e}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Set { key, value } => {
            if let Err(e) = config::set_config_value(&key, &value) {
                eprintln!("Error setting config: {e}");
                std::process::exit(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sessionize").chain(args.iter().copied()))
            .expect("valid command line")
    }

    #[test]
    fn cli_flags_override_config() {
        let cli = parse(&["--format", "tsv", "-H", "--locale", "fr", "a.tsv", "b.tsv"]);
        let mut config = config::Config::default();
        config.output.json = true;
        config.formatting.decimal_places = 4;

        let settings = RunSettings::merge(cli.run, config).unwrap();
        assert_eq!(settings.inputs, vec!["a.tsv", "b.tsv"]);
        assert_eq!(settings.format, InputFormat::Tsv);
        assert!(settings.json);
        assert!(settings.number_format.use_human);
        assert_eq!(settings.number_format.locale, "fr");
        assert_eq!(settings.number_format.decimal_places, 4);
    }

    #[test]
    fn config_supplies_defaults() {
        let cli = parse(&[]);
        let mut config = config::Config::default();
        config.input.format = InputFormat::Json;
        config.input.skip_malformed = true;

        let settings = RunSettings::merge(cli.run, config).unwrap();
        assert!(settings.inputs.is_empty());
        assert_eq!(settings.format, InputFormat::Json);
        assert!(settings.skip_malformed);
        assert!(!settings.detailed);
    }

    #[test]
    fn detailed_conflicts_with_include_unpurchased() {
        let err = Cli::try_parse_from(["sessionize", "--detailed", "--include-unpurchased"]);
        assert!(err.is_err());

        let cli = parse(&["--detailed"]);
        let mut config = config::Config::default();
        config.output.include_unpurchased = true;
        assert!(RunSettings::merge(cli.run, config).is_err());
    }

    fn settings(args: &[&str]) -> RunSettings {
        RunSettings::merge(parse(args).run, config::Config::default()).unwrap()
    }

    fn records(rows: &[&[&str]]) -> Vec<RawRecord> {
        rows.iter().map(|row| RawRecord::new(row.iter().copied())).collect()
    }

    #[test]
    fn skip_malformed_keeps_good_records_after_bad_ones() {
        let input = records(&[
            &["VIEW", "1", "p1"],
            &["VIEW", "soon", "p1"],
            &["VIEW", "2"],
            &["VIEW", "3", "p1"],
            &["PURCHASE", "4", "p1"],
        ]);

        let (report, skipped) = analyze(input, &settings(&["--skip-malformed"])).unwrap();
        assert_eq!(skipped, 2);
        match report {
            Report::Counts(result) => assert_eq!(result["p1"], 2),
            other => panic!("expected counts, got {other:?}"),
        }
    }

    #[test]
    fn malformed_record_aborts_without_skip() {
        let input = records(&[&["VIEW", "1", "p1"], &["CLICK", "2", "p1"]]);

        let err = analyze(input, &settings(&[])).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("Malformed input"), "unexpected error message: {msg}");
        assert!(msg.contains("record 1"), "unexpected error message: {msg}");
    }

    #[test]
    fn include_unpurchased_renders_zero_rows_as_json() {
        let input = records(&[
            &["VIEW", "1", "p1"],
            &["PURCHASE", "2", "p1"],
            &["VIEW", "1", "p2"],
        ]);
        let settings = settings(&["--include-unpurchased", "--json"]);

        let (report, skipped) = analyze(input, &settings).unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(render(&report, &settings).unwrap(), r#"{"p1":1,"p2":0}"#);
    }

    #[test]
    fn include_unpurchased_renders_zero_rows_as_table() {
        let input = records(&[&["VIEW", "1", "p2"]]);
        let settings = settings(&["--include-unpurchased"]);

        let (report, _) = analyze(input, &settings).unwrap();
        let table = render(&report, &settings).unwrap();
        let row: Vec<&str> = table.lines().nth(2).unwrap().split_whitespace().collect();
        assert_eq!(row, vec!["p2", "0"]);
    }

    #[test]
    fn detailed_reports_summaries() {
        let input = records(&[
            &["VIEW", "1", "p1"],
            &["PURCHASE", "2", "p1"],
            &["VIEW", "3", "p1"],
        ]);
        let settings = settings(&["--detailed", "--json"]);

        let (report, _) = analyze(input, &settings).unwrap();
        let json = render(&report, &settings).unwrap();
        assert!(json.contains(r#""views_before_purchase":1"#), "unexpected json: {json}");
        assert!(json.contains(r#""discarded_events":1"#), "unexpected json: {json}");
    }

    #[test]
    fn format_help_mentions_quoting() {
        use clap::CommandFactory;

        let command = Cli::command();
        let help = command
            .get_arguments()
            .find(|arg| arg.get_id() == "format")
            .and_then(|arg| arg.get_help())
            .map(|help| help.to_string())
            .unwrap_or_default();
        assert!(help.contains("quoting is not supported"), "unexpected help: {help}");
    }

    #[test]
    fn config_subcommand_parses() {
        let cli = parse(&["config", "set", "locale", "de"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Config(ConfigArgs {
                subcommand: ConfigSubcommands::Set { .. }
            }))
        ));
    }
}
