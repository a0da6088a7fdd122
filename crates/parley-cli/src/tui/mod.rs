pub mod app;
pub mod ui;

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use parley_core::SearchWorker;
use parley_realtime::RealtimeClient;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio_stream::StreamExt;

use crate::tui::app::App;

const TICK: Duration = Duration::from_secs(1);

/// Restore the terminal to its original state. Called on normal exit and
/// from the panic hook.
pub fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
}

pub async fn launch(
    app: &mut App,
    realtime: RealtimeClient,
    mut worker: SearchWorker,
) -> Result<(), Box<dyn std::error::Error>> {
    // Terminal setup
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let mut events = EventStream::new();
    let mut realtime = realtime;

    let result = run_loop(&mut terminal, app, &mut events, &mut realtime, &mut worker).await;
    worker.shutdown().await;
    realtime.close().await;

    restore_terminal();

    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &mut EventStream,
    realtime: &mut RealtimeClient,
    worker: &mut SearchWorker,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut tick = tokio::time::interval(TICK);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut realtime_open = true;
    let mut searches_open = true;

    loop {
        flush(app, realtime, worker);
        terminal.draw(|frame| ui::render(frame, app))?;

        if app.should_quit {
            break;
        }

        tokio::select! {
            Some(Ok(event)) = events.next() => {
                match event {
                    Event::Key(key) => {
                        app.handle_key(key);
                    }
                    Event::Mouse(mouse) => {
                        app.handle_mouse(mouse);
                    }
                    _ => {}
                }
            }

            event = realtime.next_event(), if realtime_open => {
                match event {
                    Some(event) => app.handle_server_event(event, Instant::now()),
                    None => {
                        realtime_open = false;
                        app.connection_lost();
                    }
                }
            }

            response = worker.recv(), if searches_open => {
                match response {
                    Some(response) => app.handle_search_response(response),
                    None => searches_open = false,
                }
            }

            _ = tick.tick() => {
                app.on_tick(Instant::now());
            }
        }
    }
    Ok(())
}

/// Hands queued work from the app to the background tasks.
fn flush(app: &mut App, realtime: &RealtimeClient, worker: &SearchWorker) {
    for request in app.take_search_requests() {
        worker.request(request);
    }

    for event in app.take_outgoing() {
        if let Err(err) = realtime.emit(&event) {
            tracing::warn!(event = event.name(), error = %err, "failed to send event");
            app.set_status(format!("could not send {}: {err}", event.name()));
        }
    }

    if app.take_bell() {
        let mut stdout = io::stdout();
        let _ = stdout.write_all(b"\x07");
        let _ = stdout.flush();
    }
}
