use super::public_status::{fetch, page_lines, PageState};
use crate::app::App;
use anyhow::Result;
use chrono::Utc;
use colored::*;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{debug, warn};
use statuspage_client::{Invalidation, ResourceKind};
use std::io::{self, Write};
use tokio::time::{sleep, Duration, Instant};

const POLL_SLICE: Duration = Duration::from_millis(100);

enum LiveAction {
    Exit,
    Refresh,
    None,
}

/// Public status page redrawn every `interval` until q, Esc or Ctrl-C.
pub async fn run(app: &App, slug: &str, interval: Duration) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen, Hide) {
        let _ = disable_raw_mode();
        return Err(e.into());
    }

    let result = refresh_loop(app, slug, interval).await;

    let restored = execute!(stdout, Show, LeaveAlternateScreen);
    disable_raw_mode()?;
    restored?;
    result
}

async fn refresh_loop(app: &App, slug: &str, interval: Duration) -> Result<()> {
    let mut updates: u64 = 0;

    loop {
        // every tick is a real refetch
        app.store.cache().invalidate(&Invalidation::all(ResourceKind::PublicStatus)).await;
        let lines = match fetch(app, slug).await {
            Ok(PageState::Ready(page)) => page_lines(&page, Utc::now()),
            Ok(PageState::NotFound) => vec!["❌ Status page not found".red().to_string()],
            Ok(PageState::Loading) => vec!["Loading status page...".dimmed().to_string()],
            Err(e) => {
                warn!("live refresh of {} failed: {}", slug, e);
                vec![format!("{} {}", "❌ Failed to load status page:".red(), e)]
            }
        };
        updates += 1;
        draw(&lines, updates, interval)?;

        let deadline = Instant::now() + interval;
        while Instant::now() < deadline {
            if event::poll(POLL_SLICE)? {
                match handle_input(event::read()?) {
                    LiveAction::Exit => return Ok(()),
                    LiveAction::Refresh => break,
                    LiveAction::None => {}
                }
            }
            sleep(Duration::from_millis(10)).await;
        }
        debug!("live refresh #{} for {}", updates, slug);
    }
}

fn handle_input(event: Event) -> LiveAction {
    match event {
        Event::Key(KeyEvent { code, modifiers, .. }) => match code {
            KeyCode::Char('q') | KeyCode::Esc => LiveAction::Exit,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => LiveAction::Exit,
            KeyCode::Char('r') => LiveAction::Refresh,
            _ => LiveAction::None,
        },
        _ => LiveAction::None,
    }
}

fn draw(lines: &[String], updates: u64, interval: Duration) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, MoveTo(0, 0), Clear(ClearType::All))?;

    // raw mode: no implicit carriage return
    for line in lines {
        write!(stdout, "{}\r\n", line)?;
    }
    write!(
        stdout,
        "\r\n{}\r\n",
        format!(
            "Refreshing every {}s · update #{} · r refresh now · q quit",
            interval.as_secs(),
            updates
        )
        .dimmed()
    )?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent::new_with_kind(code, modifiers, KeyEventKind::Press))
    }

    #[test]
    fn quit_keys() {
        assert!(matches!(handle_input(key(KeyCode::Char('q'), KeyModifiers::NONE)), LiveAction::Exit));
        assert!(matches!(handle_input(key(KeyCode::Esc, KeyModifiers::NONE)), LiveAction::Exit));
        assert!(matches!(handle_input(key(KeyCode::Char('c'), KeyModifiers::CONTROL)), LiveAction::Exit));
        assert!(matches!(handle_input(key(KeyCode::Char('c'), KeyModifiers::NONE)), LiveAction::None));
        assert!(matches!(handle_input(key(KeyCode::Char('r'), KeyModifiers::NONE)), LiveAction::Refresh));
    }
}
