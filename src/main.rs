use std::path::PathBuf;

use astragal::prelude::*;
use clap::Parser;
use unicode_width::UnicodeWidthStr;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Dice expressions to roll, e.g. "4d6dl1" or "2d20kh1+5"
    #[arg(value_name = "EXPR")]
    expressions: Vec<String>,

    /// Engine configuration JSON file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Times to roll each expression
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,

    /// Random seed for reproducibility (uses the deterministic generator)
    #[arg(long, default_value = None, conflicts_with = "secure")]
    seed: Option<u64>,

    /// Fail instead of falling back when secure randomness is unavailable
    #[arg(long, default_value_t = false)]
    secure: bool,

    /// Maximum extra dice per group from explosions
    #[arg(long)]
    explode_cap: Option<u32>,

    /// Print results as JSON lines
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Print the roll history after rolling
    #[arg(long, default_value_t = false)]
    history: bool,

    /// Write the roll history to this JSON file
    #[arg(long, value_name = "FILE")]
    history_out: Option<PathBuf>,

    /// Run a chi-square uniformity check on a die with this many sides
    #[arg(long, value_name = "SIDES")]
    validate: Option<u32>,

    /// Sample size for --validate
    #[arg(long, default_value_t = 10_000)]
    samples: u64,

    /// Log at debug level
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn load_config(args: &Args) -> anyhow::Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading engine config from {}", path.display());
            let file = std::fs::File::open(path)?;
            serde_json::from_reader(std::io::BufReader::new(file))?
        }
        None => EngineConfig::default(),
    };
    if args.secure {
        config.require_secure_randomness = true;
    }
    if let Some(cap) = args.explode_cap {
        config.explode_cap = cap;
    }
    config.validate()?;
    Ok(config)
}

fn print_history(engine: &DiceEngine) {
    let view = engine.query_history(HistoryQuery::new());
    let width = view
        .iter()
        .map(|e| e.result.expression.width())
        .max()
        .unwrap_or(0);

    for entry in &view {
        let expression = &entry.result.expression;
        let pad = width.saturating_sub(expression.width());
        println!(
            "{:>5}  {}{}  {:>6}  {}",
            entry.sequence,
            expression,
            " ".repeat(pad),
            entry.result.total,
            entry.result.timestamp_utc.to_rfc3339(),
        );
    }

    let stats = engine.history().stats();
    println!(
        "{} entries (~{} bytes), {} evicted",
        stats.entries, stats.bytes, stats.evicted
    );
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::builder()
        .format_timestamp_secs()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();
    log::debug!("Starting with args: {:?}", args);

    if args.expressions.is_empty() && args.validate.is_none() {
        anyhow::bail!("nothing to do: pass at least one expression or --validate");
    }

    let config = load_config(&args)?;
    let engine = match args.seed {
        Some(seed) => {
            log::info!("Using deterministic generator with seed {seed}");
            DiceEngine::seeded(config, seed)
        }
        None => DiceEngine::new(config),
    };

    if let Some(sides) = args.validate {
        log::info!("Validating d{} over {} rolls...", sides, args.samples);
        let report = engine.validate(sides, args.samples)?;
        if args.json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            let mut buf = String::new();
            report.pretty_print(&mut buf)?;
            print!("{buf}");
        }
    }

    for input in &args.expressions {
        for result in engine.roll_many(input, args.count)? {
            if args.json {
                println!("{}", serde_json::to_string(&result)?);
            } else {
                let mut buf = String::new();
                result.pretty_print(&mut buf)?;
                println!("{buf}");
            }
        }
    }

    if args.history {
        print_history(&engine);
    }

    if let Some(path) = &args.history_out {
        engine.history().save(path)?;
        log::info!("History written to {}", path.display());
    }

    Ok(())
}
