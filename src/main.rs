use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use dsa_study::catalog::{Curriculum, DEFAULT_PATH};
use dsa_study::clock::{format_timestamp, SystemClock};
use dsa_study::completion::{load_completed, set_completed};
use dsa_study::deck::Deck;
use dsa_study::models::{Card, Difficulty, JsonOutput, Rating, SessionTally, TopicStatus};
use dsa_study::progress;
use dsa_study::scheduler::ReviewScheduler;
use dsa_study::store::SqliteStore;

const DEFAULT_DB_NAME: &str = "progress.db";
const APP_DIR: &str = "dsa-study";
const DB_ENV: &str = "DSA_STUDY_DB";
const CARDS_ENV: &str = "DSA_STUDY_CARDS";

#[derive(Parser)]
#[command(name = "dsa-study")]
#[command(
    about = "Spaced-repetition flashcards and study-path progress for advanced data structures"
)]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to the progress database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON file with the card catalog (defaults to the bundled deck)
    #[arg(long, global = true)]
    cards: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Record a review for a flashcard
    Review {
        /// Card ID
        card: String,

        /// again/hard/good/easy (anything else counts as good)
        #[arg(long, short)]
        rating: String,
    },

    /// List cards due for review
    Due {
        /// Only cards in this category
        #[arg(long, short)]
        category: Option<String>,

        /// Only cards of this difficulty
        #[arg(long, short)]
        difficulty: Option<String>,
    },

    /// Review due cards interactively
    Drill {
        /// Only cards in this category
        #[arg(long, short)]
        category: Option<String>,

        /// Only cards of this difficulty
        #[arg(long, short)]
        difficulty: Option<String>,
    },

    /// Show a card's strength and schedule
    Strength {
        /// Card ID
        card: String,
    },

    /// Show review statistics
    Stats,

    /// Show progress along a study path
    Progress {
        /// Study path name
        #[arg(long, short, default_value = DEFAULT_PATH)]
        path: String,
    },

    /// List study paths
    Paths,

    /// List modules and topic status
    Topics,

    /// Show one topic's module, prerequisites and status
    Topic {
        /// Topic ID
        id: String,

        /// Study path used for the next topic
        #[arg(long, short, default_value = DEFAULT_PATH)]
        path: String,
    },

    /// Mark a topic as complete
    Complete {
        /// Topic ID
        id: String,
    },

    /// Mark a topic as not complete
    Uncomplete {
        /// Topic ID
        id: String,
    },
}

fn get_db_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }

    if let Ok(path) = std::env::var(DB_ENV) {
        return PathBuf::from(path);
    }

    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);

    std::fs::create_dir_all(&config_dir).ok();
    config_dir.join(DEFAULT_DB_NAME)
}

fn load_deck(flag: Option<PathBuf>) -> Result<Deck, Box<dyn std::error::Error>> {
    let path = flag.or_else(|| std::env::var(CARDS_ENV).ok().map(PathBuf::from));
    match path {
        Some(path) => Ok(Deck::from_file(path)?),
        None => Ok(Deck::builtin()),
    }
}

fn parse_difficulty(raw: Option<&str>) -> Result<Option<Difficulty>, String> {
    match raw {
        None => Ok(None),
        Some(s) => Difficulty::from_str(s).map(Some).ok_or_else(|| {
            format!(
                "Invalid difficulty '{}'. Use: beginner, intermediate, advanced, or graduate",
                s
            )
        }),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let db_path = get_db_path(cli.db);
    log::debug!("Using database at {}", db_path.display());
    let store = SqliteStore::open(&db_path)?;
    store.init()?;
    let curriculum = Curriculum::builtin();

    match cli.command {
        Commands::Init => {
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
            } else {
                println!("Database initialized at: {}", db_path.display());
            }
        }

        Commands::Review { card, rating } => {
            let deck = load_deck(cli.cards)?;
            if deck.get(&card).is_none() {
                log::warn!("Card '{}' is not in the current deck", card);
            }
            let rating = Rating::from_label(&rating);
            let mut scheduler = ReviewScheduler::load(&store, SystemClock)?;
            let record = scheduler.record_review(&card, rating)?;

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&record))?);
            } else {
                println!("Review recorded for card {} ({}).", card, rating.as_str());
                println!(
                    "Interval: {} day(s), ease factor {:.2}, reviews {}",
                    record.interval, record.ease_factor, record.review_count
                );
                println!("Next review scheduled: {}", format_timestamp(record.next_review));
            }
        }

        Commands::Due {
            category,
            difficulty,
        } => {
            let deck = load_deck(cli.cards)?;
            let difficulty = parse_difficulty(difficulty.as_deref())?;
            let cards = deck.filter(category.as_deref(), difficulty);
            let scheduler = ReviewScheduler::load(&store, SystemClock)?;
            let due = scheduler.cards_due_for_review(&cards);

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&due))?);
            } else if due.is_empty() {
                println!("No cards due for review.");
            } else {
                println!("{:<8} {:<14} {:<9} FRONT", "ID", "DIFFICULTY", "STRENGTH");
                println!("{}", "-".repeat(70));
                for card in due {
                    println!(
                        "{:<8} {:<14} {:<9} {}",
                        card.id,
                        card.difficulty.as_str(),
                        format!("{:.0}%", scheduler.card_strength(&card.id)),
                        truncate(&card.front, 38)
                    );
                }
            }
        }

        Commands::Drill {
            category,
            difficulty,
        } => {
            let deck = load_deck(cli.cards)?;
            let difficulty = parse_difficulty(difficulty.as_deref())?;
            let cards = deck.filter(category.as_deref(), difficulty);
            let mut scheduler = ReviewScheduler::load(&store, SystemClock)?;
            let due: Vec<Card> = scheduler
                .cards_due_for_review(&cards)
                .into_iter()
                .cloned()
                .collect();

            if due.is_empty() && !cli.json {
                println!("No cards due for review.");
                return Ok(());
            }

            let stdin = io::stdin();
            let mut input = stdin.lock();
            // Keep stdout for the JSON document alone.
            let tally = if cli.json {
                drill(&mut scheduler, &due, &mut input, &mut io::stderr())?
            } else {
                drill(&mut scheduler, &due, &mut input, &mut io::stdout())?
            };
            write_tally(&mut io::stdout(), &tally, cli.json)?;
        }

        Commands::Strength { card } => {
            let scheduler = ReviewScheduler::load(&store, SystemClock)?;
            let strength = scheduler.card_strength(&card);
            let record = scheduler.record(&card);

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "card": card,
                        "strength": strength,
                        "record": record,
                        "due": scheduler.is_due(&card)
                    })))?
                );
            } else {
                println!("Card: {}", card);
                println!("Strength: {:.0}%", strength);
                match record {
                    Some(r) => {
                        println!("Interval: {} day(s)", r.interval);
                        println!("Ease factor: {:.2}", r.ease_factor);
                        println!("Reviews: {}", r.review_count);
                        println!("Last reviewed: {}", format_timestamp(r.last_review));
                        println!("Next review: {}", format_timestamp(r.next_review));
                    }
                    None => println!("Never reviewed."),
                }
            }
        }

        Commands::Stats => {
            let deck = load_deck(cli.cards)?;
            let scheduler = ReviewScheduler::load(&store, SystemClock)?;
            let stats = scheduler.stats(deck.cards());

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&stats))?);
            } else {
                println!("=== Review Statistics ===");
                println!("Cards in deck: {}", deck.len());
                println!("Cards reviewed: {}", stats.tracked);
                println!("Total reviews: {}", stats.total_reviews);
                println!("Mastered (100% strength): {}", stats.mastered);
                println!("Due for review: {}", stats.due);
                println!("Average strength: {:.0}%", stats.average_strength);
            }
        }

        Commands::Progress { path } => {
            let completed = load_completed(&store)?;
            let remaining = progress::remaining_study_time(&curriculum, &completed);
            let Some(summary) = progress::study_progress(&curriculum, &completed, &path) else {
                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::<()>::err("Study path not found"))?
                    );
                } else {
                    println!("Study path '{}' not found.", path);
                }
                return Ok(());
            };

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "path": path,
                        "progress": summary,
                        "remaining": remaining
                    })))?
                );
            } else {
                println!("=== Study Progress ({}) ===", path);
                println!(
                    "Progress: {}% ({}/{} topics)",
                    summary.percentage, summary.completed, summary.total
                );
                println!("Time remaining: {}", remaining.formatted);
                println!(
                    "Next topic: {}",
                    summary.next_topic.as_deref().unwrap_or("Complete!")
                );
            }
        }

        Commands::Paths => {
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&curriculum.paths))?);
            } else {
                println!("{:<20} {:<24} TOPICS", "KEY", "NAME");
                println!("{}", "-".repeat(55));
                for path in &curriculum.paths {
                    println!("{:<20} {:<24} {}", path.key, path.name, path.sequence.len());
                }
            }
        }

        Commands::Topics => {
            let completed = load_completed(&store)?;
            let overview = progress::topic_overview(&curriculum, &completed);

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&overview))?);
            } else {
                for module in overview {
                    println!(
                        "Module {}: {} ({}/{})",
                        module.module.module_number,
                        module.module.title,
                        module.completed,
                        module.total
                    );
                    for topic in module.topics {
                        let weight = topic
                            .exam_weight
                            .map(|w| format!("{}%", w))
                            .unwrap_or_else(|| "-".to_string());
                        let minutes = topic
                            .mastery_minutes
                            .map(|m| format!("{} min", m))
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "  {} {:<20} {:<6} {}",
                            topic.status.symbol(),
                            topic.topic,
                            weight,
                            minutes
                        );
                    }
                }
            }
        }

        Commands::Topic { id, path } => {
            let completed = load_completed(&store)?;
            let module = progress::module_for_topic(&curriculum, &id);

            if module.is_none() {
                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::<()>::err("Topic not found"))?
                    );
                } else {
                    println!("Topic not found.");
                }
                return Ok(());
            }

            let status = progress::topic_status(&curriculum, &id, &completed);
            let prerequisites = curriculum.prerequisites(&id);
            let next = progress::next_topic(&curriculum, &id, &path);

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "topic": id,
                        "module": module,
                        "status": status,
                        "prerequisites": prerequisites,
                        "examWeight": curriculum.exam_weight(&id),
                        "masteryTime": curriculum.mastery_time(&id),
                        "nextTopic": next
                    })))?
                );
            } else {
                println!("Topic: {}", id);
                if let Some(m) = module {
                    println!("Module {}: {}", m.module_number, m.title);
                    println!("Description: {}", m.description);
                }
                println!("Status: {}", status.as_str());
                println!(
                    "Prerequisites: {}",
                    if prerequisites.is_empty() {
                        "-".to_string()
                    } else {
                        prerequisites
                            .iter()
                            .map(|p| {
                                let mark = if completed.contains(p) {
                                    TopicStatus::Completed.symbol()
                                } else {
                                    TopicStatus::Available.symbol()
                                };
                                format!("{} {}", mark, p)
                            })
                            .collect::<Vec<_>>()
                            .join(", ")
                    }
                );
                if let Some(w) = curriculum.exam_weight(&id) {
                    println!("Exam weight: {}%", w);
                }
                if let Some(t) = curriculum.mastery_time(&id) {
                    println!(
                        "Mastery time: {} min ({} reading, {} practice)",
                        t.total, t.reading, t.practice
                    );
                }
                println!("Next in {}: {}", path, next.map(String::as_str).unwrap_or("-"));
            }
        }

        Commands::Complete { id } | Commands::Uncomplete { id }
            if !curriculum.contains_topic(&id) =>
        {
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::<()>::err("Topic not found"))?
                );
            } else {
                println!("Topic not found.");
            }
        }

        Commands::Complete { id } => {
            let completed = set_completed(&store, &id, true)?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&completed))?);
            } else {
                println!("Marked {} as complete.", id);
                let summary = progress::study_progress(&curriculum, &completed, DEFAULT_PATH);
                if let Some(summary) = summary {
                    println!("Course progress: {}%", summary.percentage);
                }
            }
        }

        Commands::Uncomplete { id } => {
            let completed = set_completed(&store, &id, false)?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&completed))?);
            } else {
                println!("Marked {} as not complete.", id);
            }
        }
    }

    Ok(())
}

enum DrillAnswer {
    Rated(Rating),
    Skip,
    Quit,
}

fn parse_drill_answer(input: &str) -> Option<DrillAnswer> {
    match input.trim().to_lowercase().as_str() {
        "s" | "skip" => Some(DrillAnswer::Skip),
        "q" | "quit" => Some(DrillAnswer::Quit),
        other => Rating::from_str(other).map(DrillAnswer::Rated),
    }
}

fn drill<S, C, R>(
    scheduler: &mut ReviewScheduler<S, C>,
    cards: &[Card],
    input: &mut R,
    out: &mut dyn Write,
) -> Result<SessionTally, Box<dyn std::error::Error>>
where
    S: dsa_study::store::Store,
    C: dsa_study::clock::Clock,
    R: BufRead,
{
    let mut tally = SessionTally::default();
    let mut line = String::new();

    for (i, card) in cards.iter().enumerate() {
        writeln!(out)?;
        writeln!(
            out,
            "[{}/{}] {} ({})",
            i + 1,
            cards.len(),
            card.id,
            card.difficulty.as_str()
        )?;
        writeln!(out, "Q: {}", card.front)?;
        write!(out, "[press enter to reveal]")?;
        out.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        writeln!(out, "A: {}", card.back)?;

        let answer = loop {
            write!(out, "Rating (again/hard/good/easy, s = skip, q = quit): ")?;
            out.flush()?;
            line.clear();
            if input.read_line(&mut line)? == 0 {
                break DrillAnswer::Quit;
            }
            match parse_drill_answer(&line) {
                Some(answer) => break answer,
                None => writeln!(out, "Invalid input.")?,
            }
        };

        match answer {
            DrillAnswer::Rated(rating) => {
                let record = scheduler.record_review(&card.id, rating)?;
                tally.record(Some(rating));
                writeln!(out, "Next review in {} day(s).", record.interval)?;
            }
            DrillAnswer::Skip => tally.record(None),
            DrillAnswer::Quit => break,
        }
    }

    Ok(tally)
}

fn write_tally(
    out: &mut dyn Write,
    tally: &SessionTally,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        writeln!(out, "{}", serde_json::to_string(&JsonOutput::ok(tally))?)?;
    } else {
        writeln!(out)?;
        writeln!(out, "=== Session ===")?;
        writeln!(out, "Reviewed: {}", tally.reviewed)?;
        writeln!(out, "Correct: {}", tally.correct)?;
        writeln!(out, "Incorrect: {}", tally.incorrect)?;
        writeln!(out, "Skipped: {}", tally.skipped)?;
        writeln!(out, "Accuracy: {:.0}%", tally.accuracy())?;
    }
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
