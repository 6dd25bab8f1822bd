use std::io::{self, BufRead, Write};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use kanadr::config::{Config, MAX_REPETITIONS, MIN_REPETITIONS};
use kanadr::engine::difficulty::Difficulty;
use kanadr::engine::shuffle::{self, SmallRngSource};
use kanadr::items::{CATEGORIES, ItemPack, PackItem};
use kanadr::session::{DrillSession, Phase, SessionMeta, SessionResult};
use kanadr::store::{JsonFileBackend, StatsStore};

const QUIT_COMMAND: &str = ":q";

#[derive(Parser)]
#[command(
    name = "kanadr",
    version,
    about = "Timed kana, kanji and vocabulary drills"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Play a drill session (the default)
    Play {
        #[arg(short, long, help = "hiragana, katakana, kanji, vocabulary or random")]
        category: Option<String>,
        #[arg(short, long, help = "easy, normal, hard or expert")]
        difficulty: Option<Difficulty>,
        #[arg(
            short,
            long,
            value_parser = clap::value_parser!(u32)
                .range(i64::from(MIN_REPETITIONS)..=i64::from(MAX_REPETITIONS)),
            help = "Times each item is asked (1-10)"
        )]
        repetitions: Option<u32>,
        #[arg(short, long, value_delimiter = ',', help = "Item groups, e.g. a-row,ka-row")]
        groups: Vec<String>,
    },
    /// Recent sessions, newest first
    History {
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Fastest completed sessions
    Leaderboard {
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        difficulty: Option<Difficulty>,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Lifetime totals for a category
    Stats {
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Erase all stored stats
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let command = cli.command.unwrap_or(Command::Play {
        category: None,
        difficulty: None,
        repetitions: None,
        groups: Vec::new(),
    });

    match command {
        Command::Play {
            category,
            difficulty,
            repetitions,
            groups,
        } => run_play(&config, category, difficulty, repetitions, groups),
        Command::History { category, limit } => {
            let category = category.unwrap_or_else(|| config.default_category.clone());
            let store = open_store(&config)?;
            for result in store.history(&category, limit) {
                println!("{}", summary_line(&result));
            }
            Ok(())
        }
        Command::Leaderboard {
            category,
            difficulty,
            limit,
        } => {
            let category = category.unwrap_or_else(|| config.default_category.clone());
            let store = open_store(&config)?;
            for (rank, result) in store
                .leaderboard(&category, difficulty, limit)
                .iter()
                .enumerate()
            {
                println!("{:>3}. {}", rank + 1, summary_line(result));
            }
            Ok(())
        }
        Command::Stats { category } => {
            let category = category.unwrap_or_else(|| config.default_category.clone());
            let store = open_store(&config)?;
            let overall = store.overall_stats(&category);
            let totals = overall.totals;
            println!("{category}");
            println!(
                "  sessions:    {} ({} completed)",
                totals.total_sessions, totals.completed_sessions
            );
            println!("  correct:     {}", totals.total_correct);
            println!("  wrong:       {}", totals.total_wrong);
            println!("  best streak: {}", totals.best_streak);
            match overall.fastest_time_ms {
                Some(ms) => println!("  fastest:     {}", format_ms(ms)),
                None => println!("  fastest:     -"),
            }
            Ok(())
        }
        Command::Clear => {
            open_store(&config)?.clear();
            println!("Stats cleared.");
            Ok(())
        }
    }
}

fn open_store(config: &Config) -> Result<StatsStore<JsonFileBackend>> {
    let backend = JsonFileBackend::with_base_dir(config.data_path())?;
    Ok(StatsStore::new(backend))
}

fn resolve_category(config: &Config, requested: Option<String>) -> Result<String> {
    match requested.as_deref() {
        Some("random") => {
            let mut rng = SmallRngSource::from_entropy();
            Ok(shuffle::pick_one(CATEGORIES, &mut rng)?.to_string())
        }
        Some(name) => Ok(name.to_string()),
        None => Ok(config.default_category.clone()),
    }
}

fn run_play(
    config: &Config,
    category: Option<String>,
    difficulty: Option<Difficulty>,
    repetitions: Option<u32>,
    groups: Vec<String>,
) -> Result<()> {
    let category = resolve_category(config, category)?;
    let difficulty = difficulty.unwrap_or(config.default_difficulty);
    let repetitions = repetitions.unwrap_or(config.default_repetitions);

    let pack = ItemPack::load(&category)?;
    let items = pack.select(&groups);
    if items.is_empty() {
        anyhow::bail!(
            "No items in groups [{}]; available: {}",
            groups.join(", "),
            pack.groups().join(", ")
        );
    }

    let meta = SessionMeta {
        category: category.clone(),
        game_mode: config.game_mode.clone(),
        selected_labels: groups,
    };
    let mut session =
        DrillSession::new(meta, PackItem::key).with_rules(config.difficulties.clone());
    session.start(&items, difficulty, repetitions)?;

    println!(
        "{category} / {difficulty} / {} items x{repetitions}. Type the reading, {QUIT_COMMAND} to quit.",
        items.len()
    );

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    while session.phase() == Phase::Active {
        let Some(entry) = session.current() else {
            break;
        };
        let item = entry.item.clone();
        let state = session.state();
        print!(
            "[{}] {:>3}/{} {} > ",
            lives_bar(state.lives, state.max_lives),
            state.correct_count,
            state.target_count,
            item.character
        );
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => {
                session.cancel()?;
                break;
            }
        };
        if line.trim() == QUIT_COMMAND {
            session.cancel()?;
            break;
        }

        let correct = item.accepts(&line);
        let outcome = session.submit_answer(correct)?;
        if !correct {
            println!("  x {} is \"{}\"", item.character, item.reading);
        }
        if outcome.life_gained {
            println!("  + life restored");
        }
    }

    let Some(result) = session.into_result() else {
        return Ok(());
    };
    print_result(&result);

    match open_store(config) {
        Ok(mut store) => {
            let saved = store.save(result);
            if saved.is_new_best {
                println!("New best time!");
            }
        }
        Err(e) => warn!(error = %e, "stats directory unavailable, session not saved"),
    }
    Ok(())
}

fn lives_bar(lives: u32, max_lives: u32) -> String {
    let mut bar = "♥".repeat(lives as usize);
    bar.push_str(&"♡".repeat(max_lives.saturating_sub(lives) as usize));
    bar
}

fn format_ms(ms: u64) -> String {
    let secs = ms as f64 / 1000.0;
    if secs >= 60.0 {
        format!("{}m {:04.1}s", (secs / 60.0) as u64, secs % 60.0)
    } else {
        format!("{secs:.1}s")
    }
}

fn summary_line(result: &SessionResult) -> String {
    format!(
        "{}  {:<8} x{}  {:>3}/{:<3} {:>5.1}%  {:>9}  {}",
        result.timestamp.format("%Y-%m-%d %H:%M"),
        result.difficulty,
        result.repetitions_per_item,
        result.correct_count,
        result.correct_count + result.wrong_count,
        result.accuracy * 100.0,
        format_ms(result.total_time_ms),
        if result.completed { "done" } else { "failed" }
    )
}

fn print_result(result: &SessionResult) {
    println!();
    println!(
        "{}",
        if result.completed {
            "Session complete"
        } else {
            "Session over"
        }
    );
    println!(
        "  accuracy:    {:.1}% ({} right, {} wrong)",
        result.accuracy * 100.0,
        result.correct_count,
        result.wrong_count
    );
    println!("  best streak: {}", result.best_streak);
    println!("  time:        {}", format_ms(result.total_time_ms));
    println!(
        "  answer time: avg {:.0}ms, fastest {:.0}ms, slowest {:.0}ms",
        result.average_latency_ms, result.fastest_latency_ms, result.slowest_latency_ms
    );
    println!(
        "  lives lost:  {} ({} regenerated)",
        result.lives_lost, result.lives_regenerated
    );
    let missed = result.missed_items();
    if !missed.is_empty() {
        let list: Vec<String> = missed
            .iter()
            .map(|(key, misses)| format!("{key} x{misses}"))
            .collect();
        println!("  missed:      {}", list.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_repetitions(args: &[&str]) -> Option<u32> {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Some(Command::Play { repetitions, .. }) => repetitions,
            _ => panic!("expected play"),
        }
    }

    #[test]
    fn test_repetitions_within_bounds() {
        assert_eq!(parse_repetitions(&["kanadr", "play", "-r", "1"]), Some(1));
        assert_eq!(parse_repetitions(&["kanadr", "play", "-r", "10"]), Some(10));
        assert_eq!(parse_repetitions(&["kanadr", "play"]), None);
    }

    #[test]
    fn test_repetitions_out_of_bounds_rejected() {
        for value in ["0", "11", "4000000000"] {
            let parsed = Cli::try_parse_from(["kanadr", "play", "--repetitions", value]);
            assert!(parsed.is_err(), "{value}");
        }
    }

    #[test]
    fn test_difficulty_parses_from_flag() {
        let cli = Cli::try_parse_from(["kanadr", "leaderboard", "-d", "expert"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Leaderboard {
                difficulty: Some(Difficulty::Expert),
                ..
            })
        ));
    }
}
