mod app;
use knowledge_cards::*;

use anyhow::Context;
use app::{App, AppScreen, parse_command};
use config::AppConfig;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

const SAMPLE_CARDS: [(&str, Option<&str>, &str); 3] = [
    ("cześć", Some("Polish vocabulary"), "hello"),
    ("dziękuję", Some("Polish vocabulary"), "thank you"),
    (
        "Photosynthesis",
        None,
        "Plants convert light, water and carbon dioxide into glucose and oxygen.",
    ),
];

fn prompt(out: &mut impl Write, screen: AppScreen) -> io::Result<()> {
    match screen {
        AppScreen::Main => write!(out, "> ")?,
        AppScreen::Session => write!(out, "card> ")?,
    }
    out.flush()
}

fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    logging::init_tracing(&config.log_level);

    let store = SqliteStore::open(&config.database_path).with_context(|| {
        format!("failed to open database at {}", config.database_path.display())
    })?;
    let clock = match config.utc_offset {
        Some(offset) => SystemClock::with_offset(offset),
        None => SystemClock::new(),
    };

    let report = store.repair_schedules(&config.user_id, clock.now())?;
    if report.fixed_cards > 0 {
        println!("Repaired {} of {} card(s).", report.fixed_cards, report.total_cards);
    }

    if store.count_cards(&config.user_id)? == 0 {
        for (title, summary, content) in SAMPLE_CARDS {
            store.add_card(&config.user_id, title, summary, content, clock.now())?;
        }
        println!("Sample data created!");
    }
    println!(
        "Loaded {} card(s) for {}",
        store.count_cards(&config.user_id)?,
        config.user_id
    );

    let mut app = App::new(config, Arc::new(store), Arc::new(clock));
    println!("Type `review` to start, `help` for commands.");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    prompt(&mut stdout, app.screen())?;
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            prompt(&mut stdout, app.screen())?;
            continue;
        }
        let Some(command) = parse_command(&line) else {
            println!("Unknown command: {}", line.trim());
            prompt(&mut stdout, app.screen())?;
            continue;
        };
        match app.handle(command) {
            Some(output) => println!("{output}"),
            None => break,
        }
        prompt(&mut stdout, app.screen())?;
    }

    tracing::info!("bye");
    Ok(())
}
