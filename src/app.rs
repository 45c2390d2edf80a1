//! Terminal session host.
//! Turns typed commands into calls on a [`ReviewSession`] and renders what the user sees.

use knowledge_cards::clock::Clock;
use knowledge_cards::config::AppConfig;
use knowledge_cards::database::{CardStore, StreakStore};
use knowledge_cards::export::json::{DeckSnapshot, export_json_to_path, import_json};
use knowledge_cards::models::review_session::SessionSummary;
use knowledge_cards::models::{CardPhase, Rating, ReviewSession, SelectionMode};
use knowledge_cards::stats::streak_report;
use chrono::{DateTime, FixedOffset, Utc};
use std::path::PathBuf;
use std::sync::Arc;

/// Application screen states
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AppScreen {
    #[default]
    Main,
    Session,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start(SelectionMode),
    Reveal,
    Hint,
    Rate(u8),
    Retry,
    Abort,
    Stats,
    Export(PathBuf),
    Import(PathBuf),
    Help,
    Quit,
}

/// Parses one input line. Returns `None` for anything unrecognised.
pub fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let head = parts.next()?.to_ascii_lowercase();
    let command = match head.as_str() {
        "review" => Command::Start(SelectionMode::Due),
        "practice" => {
            let ids: Option<Vec<i64>> = parts.map(|p| p.parse().ok()).collect();
            match ids? {
                ids if ids.is_empty() => Command::Start(SelectionMode::RandomSample),
                ids => Command::Start(SelectionMode::Explicit(ids)),
            }
        }
        "r" | "reveal" | "show" => Command::Reveal,
        "h" | "hint" => Command::Hint,
        "retry" => Command::Retry,
        "q" | "abort" => Command::Abort,
        "stats" => Command::Stats,
        "export" => Command::Export(PathBuf::from(parts.next()?)),
        "import" => Command::Import(PathBuf::from(parts.next()?)),
        "help" | "?" => Command::Help,
        "exit" | "quit" => Command::Quit,
        other => Command::Rate(other.parse().ok()?),
    };
    Some(command)
}

/// Formats a timestamp as a YYYY-MM-DD date in the user's day.
fn format_date(time: DateTime<Utc>, offset: FixedOffset) -> String {
    time.with_timezone(&offset).format("%Y-%m-%d").to_string()
}

pub struct App<S, C> {
    config: AppConfig,
    store: Arc<S>,
    clock: Arc<C>,
    screen: AppScreen,
    session: Option<ReviewSession<S, C>>,
}

impl<S, C> App<S, C>
where
    S: CardStore + StreakStore,
    C: Clock,
{
    pub fn new(config: AppConfig, store: Arc<S>, clock: Arc<C>) -> Self {
        Self {
            config,
            store,
            clock,
            screen: AppScreen::Main,
            session: None,
        }
    }

    pub fn screen(&self) -> AppScreen {
        self.screen
    }

    /// Runs `command` and returns the text to print. `None` means the user asked to quit.
    pub fn handle(&mut self, command: Command) -> Option<String> {
        let output = match (self.screen, command) {
            (AppScreen::Session, Command::Quit) => match self.session.as_mut().map(|s| s.abort()) {
                Some(Err(err)) => format!("{err}"),
                _ => return None,
            },
            (_, Command::Quit) => return None,
            (_, Command::Help) => self.help(),
            (AppScreen::Main, Command::Start(mode)) => self.start_session(&mode),
            (AppScreen::Main, Command::Stats) => self.render_stats(),
            (AppScreen::Main, Command::Export(path)) => self.export(path),
            (AppScreen::Main, Command::Import(path)) => self.import(path),
            (AppScreen::Session, command) => self.handle_session(command),
            (AppScreen::Main, _) => "No session running. Type `review` to start.".to_string(),
        };
        Some(output)
    }

    fn help(&self) -> String {
        match self.screen {
            AppScreen::Main => {
                "review | practice [ids...] | stats | export <path> | import <path> | quit".to_string()
            }
            AppScreen::Session => {
                "r = reveal, h = hint, 0-5 = rate, retry = save again, q = abort".to_string()
            }
        }
    }

    fn start_session(&mut self, mode: &SelectionMode) -> String {
        let started = ReviewSession::start(
            &self.config.user_id,
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            mode,
            &self.config.session,
            self.config.scheduler.clone(),
        );
        match started {
            Ok(session) if session.is_finished() => {
                "Nothing to review right now. Come back later!".to_string()
            }
            Ok(session) => {
                self.session = Some(session);
                self.screen = AppScreen::Session;
                self.render_card()
            }
            Err(err) => format!("Could not load cards: {err}"),
        }
    }

    fn handle_session(&mut self, command: Command) -> String {
        let Some(session) = self.session.as_mut() else {
            self.screen = AppScreen::Main;
            return "No session running.".to_string();
        };

        let offset = self.clock.offset();
        let result = match command {
            Command::Reveal => session.reveal().map(|_| None),
            Command::Hint => session.request_hint().map(|_| None),
            Command::Rate(value) => session.rate_value(value).map(|outcome| {
                Some(format!(
                    "Next review in {} day(s) ({}), streak {} day(s).",
                    outcome.schedule.interval_days,
                    format_date(outcome.schedule.next_review_at, offset),
                    outcome.streak.current_streak
                ))
            }),
            Command::Retry => session.retry_pending().map(|_| Some("Saved.".to_string())),
            Command::Abort => match session.abort() {
                Ok(summary) => {
                    let summary = summary.clone();
                    return self.finish(summary);
                }
                Err(err) => Err(err),
            },
            _ => return "Finish or abort the session first.".to_string(),
        };

        match result {
            Ok(message) if session.is_finished() => {
                let summary = session.summary().clone();
                let finished = self.finish(summary);
                match message {
                    Some(message) => format!("{message}\n{finished}"),
                    None => finished,
                }
            }
            Ok(message) => {
                let card = self.render_card();
                match message {
                    Some(message) => format!("{message}\n\n{card}"),
                    None => card,
                }
            }
            Err(err) => format!("{err}"),
        }
    }

    fn finish(&mut self, summary: SessionSummary) -> String {
        self.session = None;
        self.screen = AppScreen::Main;
        format!(
            "Session complete: {} of {} card(s) reviewed, {} recalled, {}s total.",
            summary.reviewed,
            summary.cards_in_session,
            summary.successful,
            summary.total_time.as_secs()
        )
    }

    /// Renders the current card according to its phase.
    pub fn render_card(&self) -> String {
        let Some(session) = self.session.as_ref() else {
            return String::new();
        };
        let Some(card) = session.current_card() else {
            return String::new();
        };
        let (index, total) = session.position();

        let mut out = format!("[{}/{}] {}", index + 1, total, card.title);
        if let Some(summary) = &card.summary {
            out.push_str(&format!("\n  {summary}"));
        }
        match session.phase() {
            CardPhase::Hidden => out.push_str("\n(r = reveal, h = hint)"),
            CardPhase::Hinted => {
                out.push_str(&format!("\nHint: {}", session.hint().unwrap_or_default()));
                out.push_str("\n(r = reveal)");
            }
            CardPhase::Revealed => {
                out.push_str(&format!("\n---\n{}\n---", card.content));
                let labels: Vec<String> = (0..=5)
                    .filter_map(|v| Rating::new(v).ok())
                    .map(|r| r.to_string())
                    .collect();
                out.push_str(&format!("\nRate: {}", labels.join(", ")));
            }
            CardPhase::Rated => {
                if let Some(card_id) = session.pending_card_id() {
                    out.push_str(&format!("\nCard {card_id} was not saved. Type `retry`."));
                }
            }
        }
        out
    }

    fn render_stats(&self) -> String {
        match streak_report(
            &*self.store,
            &*self.clock,
            &self.config.user_id,
            self.config.session.daily_goal,
        ) {
            Ok(report) => {
                let mut out = format!(
                    "Streak: {} day(s){} (longest {}), {} review(s) total\nToday: {}/{} ({}%)",
                    report.streak.current_streak,
                    if report.streak_active { "" } else { " (broken)" },
                    report.streak.longest_streak,
                    report.streak.total_reviews,
                    report.progress.reviewed_today,
                    report.progress.daily_goal,
                    report.progress.completion_rate
                );
                for status in &report.achievements {
                    out.push_str(&format!(
                        "\n  [{}] {} - {}",
                        if status.unlocked { "x" } else { " " },
                        status.achievement.name(),
                        status.achievement.description()
                    ));
                }
                out
            }
            Err(err) => format!("Could not load stats: {err}"),
        }
    }

    fn export(&self, path: PathBuf) -> String {
        let snapshot = DeckSnapshot::capture(&*self.store, &self.config.user_id, self.clock.now());
        match snapshot.and_then(|s| export_json_to_path(&s, &path).map(|_| s.cards.len())) {
            Ok(count) => format!("Exported {count} card(s) to {}", path.display()),
            Err(err) => format!("Export failed: {err}"),
        }
    }

    fn import(&self, path: PathBuf) -> String {
        match import_json(&path).and_then(|s| s.restore(&*self.store, &self.config.user_id)) {
            Ok(ids) => format!("Imported {} card(s) from {}", ids.len(), path.display()),
            Err(err) => format!("Import failed: {err}"),
        }
    }
}
