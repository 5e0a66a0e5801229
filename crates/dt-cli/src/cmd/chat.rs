use crate::output::print_json;
use anyhow::Context;
use coach_agent::{DebouncedSaver, HttpTransport, Outcome, Session, SkipReason, Turn};
use dt_core::config::{Config, WarnLevel};
use dt_core::types::Role;
use dt_core::{io, paths, store::LocalStore, ProjectState};
use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

pub fn run(
    root: &Path,
    message: Option<&str>,
    endpoint: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let (config, store) = super::open_store(root)?;
    let state = super::current_project(&store)?;
    let session = Session::new(transport(&config, endpoint)?);
    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    match message {
        Some(text) => rt.block_on(async {
            let turn = interruptible(&session, session.send_message(state, text)).await;
            finish(root, &store, turn, true, json)
        }),
        None => rt.block_on(interactive(root, &config, store, &session, state)),
    }
}

pub fn retry(root: &Path, text: &str, endpoint: Option<&str>, json: bool) -> anyhow::Result<()> {
    let (config, store) = super::open_store(root)?;
    let state = super::current_project(&store)?;
    let session = Session::new(transport(&config, endpoint)?);
    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    rt.block_on(async {
        let turn = interruptible(&session, session.retry_recording(state, text)).await;
        finish(root, &store, turn, false, json)
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn transport(config: &Config, endpoint: Option<&str>) -> anyhow::Result<HttpTransport> {
    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!("config: {}", w.message),
            WarnLevel::Error => tracing::error!("config: {}", w.message),
        }
    }
    let transport =
        HttpTransport::from_config(&config.coach).context("failed to build coach client")?;
    Ok(match endpoint {
        Some(e) => transport.with_endpoint(e),
        None => transport,
    })
}

/// Drive `turn` to completion, turning Ctrl-C into a cancel of the request.
async fn interruptible<F>(session: &Session<HttpTransport>, turn: F) -> Turn
where
    F: Future<Output = Turn>,
{
    tokio::pin!(turn);
    loop {
        tokio::select! {
            done = &mut turn => return done,
            _ = tokio::signal::ctrl_c() => {
                session.cancel();
            }
        }
    }
}

/// Keep the raw reply next to the store so it can be replayed with `dt ingest`.
fn keep_raw(root: &Path, state: &ProjectState, raw: &str) {
    let Some(msg) = state.chat_history.last().filter(|m| m.role == Role::Assistant) else {
        return;
    };
    let path = paths::response_path(root, &msg.id);
    if let Err(e) = io::atomic_write(&path, raw.as_bytes()) {
        tracing::warn!(path = %path.display(), error = %e, "failed to keep raw reply");
    }
}

/// Save the turn's state and report it. `reply_is_new` is false for recovery
/// turns, which never append to the chat history.
fn finish(
    root: &Path,
    store: &LocalStore,
    turn: Turn,
    reply_is_new: bool,
    json: bool,
) -> anyhow::Result<()> {
    let Turn { state, outcome } = turn;
    if let Outcome::Skipped(reason) = outcome {
        anyhow::bail!("{}", skip_message(reason));
    }
    let state = store.save(&state).context("failed to save project")?;

    match outcome {
        Outcome::Completed { directives, raw } => {
            if reply_is_new {
                keep_raw(root, &state, &raw);
            }
            if json {
                print_json(&serde_json::json!({
                    "reply": state.chat_history.last().map(|m| &m.content),
                    "directives": directives,
                    "current_stage": state.current_stage,
                    "active_coach": state.active_coach,
                }))?;
            } else if reply_is_new {
                print_reply(&state, &directives);
            } else {
                print_recorded(&directives);
            }
            Ok(())
        }
        Outcome::Cancelled => {
            println!("Request cancelled.");
            Ok(())
        }
        Outcome::Failed(e) => Err(e).context("coach request failed"),
        Outcome::Skipped(_) => Ok(()),
    }
}

fn skip_message(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::EmptyInput => "message is empty",
        SkipReason::Busy => "a request is already in flight",
        SkipReason::NotRecordable => "the active coach does not record artifacts",
    }
}

fn print_reply(state: &ProjectState, directives: &[dt_core::directive::Directive]) {
    if let Some(msg) = state.chat_history.last().filter(|m| m.role == Role::Assistant) {
        let who = msg
            .coach_type
            .map(|c| format!("{c} coach"))
            .unwrap_or_else(|| "coach".to_string());
        println!("{who}:");
        for line in msg.content.lines() {
            println!("  {line}");
        }
    }
    if !directives.is_empty() {
        print_recorded(directives);
    }
}

/// Recovery replies are not shown; only what they recorded.
fn print_recorded(directives: &[dt_core::directive::Directive]) {
    if directives.is_empty() {
        println!("  (nothing recorded)");
    }
    for d in directives {
        println!("  [recorded: {}]", d.kind());
    }
}

// ---------------------------------------------------------------------------
// Interactive loop
// ---------------------------------------------------------------------------

async fn interactive(
    root: &Path,
    config: &Config,
    store: LocalStore,
    session: &Session<HttpTransport>,
    mut state: ProjectState,
) -> anyhow::Result<()> {
    let saver = DebouncedSaver::spawn(store, Duration::from_millis(config.store.debounce_ms));
    println!(
        "{} | {} stage | {} coach. /retry <text> re-asks for a missed record, /quit exits.",
        state.name, state.current_stage, state.active_coach
    );

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read input")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "/quit" | "/exit") {
            break;
        }

        let stage = state.current_stage;
        let recovery = line.strip_prefix("/retry");
        let turn = match recovery {
            Some(rest) => interruptible(session, session.retry_recording(state, rest)).await,
            None => interruptible(session, session.send_message(state, line)).await,
        };
        state = turn.state;

        match turn.outcome {
            Outcome::Completed { directives, raw } => {
                if recovery.is_none() {
                    keep_raw(root, &state, &raw);
                    print_reply(&state, &directives);
                } else {
                    print_recorded(&directives);
                }
                if state.current_stage != stage {
                    println!("  [{} -> {}]", stage, state.current_stage);
                }
            }
            Outcome::Cancelled => println!("  (cancelled)"),
            Outcome::Failed(_) => {
                if let Some(err) = session.last_error() {
                    eprintln!("error: {err}");
                }
            }
            Outcome::Skipped(reason) => println!("  ({})", skip_message(reason)),
        }
        saver.schedule(state.clone());
    }

    saver.close().await;
    Ok(())
}
