use std::error::Error;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::api::Session;
use crate::cli::gateway_client;
use crate::core::config::Config;
use crate::core::terminal::{TerminalIntent, TerminalLabel, TerminalState, TerminalStore};

async fn start_store() -> Result<(TerminalStore, TerminalState), Box<dyn Error>> {
    let config = Config::load()?;
    let store = TerminalStore::spawn(Arc::new(gateway_client(&config, None)?));
    let state = store
        .subscribe_state()
        .wait_for(|state| !state.is_loading_sessions)
        .await?
        .clone();
    Ok((store, state))
}

/// Wait for the first label matching `predicate`; `None` once the store is gone.
async fn wait_for_label<F>(
    labels: &mut broadcast::Receiver<TerminalLabel>,
    predicate: F,
) -> Option<TerminalLabel>
where
    F: Fn(&TerminalLabel) -> bool,
{
    loop {
        match labels.recv().await {
            Ok(label) if predicate(&label) => return Some(label),
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

fn print_session(session: &Session, selected: bool) {
    let marker = if selected { "*" } else { " " };
    println!(
        "{marker} {:<24} {:<28} {:<12} updated {}",
        session.id,
        session.name,
        session.status.as_str(),
        session.updated_at.format("%Y-%m-%d %H:%M")
    );
}

pub async fn run_sessions(refresh: bool) -> Result<(), Box<dyn Error>> {
    let (store, mut state) = start_store().await?;

    if refresh {
        let mut labels = store.subscribe_labels();
        store.dispatch(TerminalIntent::RefreshSessions);
        wait_for_label(&mut labels, |label| {
            matches!(
                label,
                TerminalLabel::SessionsLoadCompleted | TerminalLabel::ErrorOccurred(_)
            )
        })
        .await;
        state = store.state();
    }
    store.dispose();

    if let Some(error) = &state.sessions_error {
        eprintln!("❌ {error}");
        if state.sessions.is_empty() {
            std::process::exit(1);
        }
        eprintln!("Showing the last known sessions.");
    }

    if state.sessions.is_empty() {
        println!("No terminal sessions.");
        return Ok(());
    }

    let mut sessions = state.sessions.clone();
    sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    for session in &sessions {
        print_session(session, state.is_selected(&session.id));
    }
    Ok(())
}

pub async fn run_session(id: String) -> Result<(), Box<dyn Error>> {
    let (store, _) = start_store().await?;

    let mut labels = store.subscribe_labels();
    store.dispatch(TerminalIntent::SelectSession(id.clone()));
    let label = wait_for_label(&mut labels, |label| match label {
        TerminalLabel::SessionSelectionCompleted(selected) => *selected == id,
        TerminalLabel::ErrorOccurred(_) => true,
        TerminalLabel::SessionsLoadCompleted => false,
    })
    .await;
    let state = store.state();
    store.dispose();

    match (label, state.selected_session) {
        (Some(TerminalLabel::SessionSelectionCompleted(_)), Some(session)) => {
            println!("id:      {}", session.id);
            println!("name:    {}", session.name);
            println!("status:  {}", session.status.as_str());
            println!("created: {}", session.created_at.to_rfc3339());
            println!("updated: {}", session.updated_at.to_rfc3339());
            Ok(())
        }
        (Some(TerminalLabel::ErrorOccurred(message)), _) => {
            eprintln!("❌ {message}");
            std::process::exit(1);
        }
        _ => Err(format!("Session {id} could not be selected").into()),
    }
}
