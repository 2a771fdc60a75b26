//! Non-interactive chat: send one message and stream the reply to stdout.

use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use tracing::debug;

use crate::cli::gateway_client;
use crate::core::chat::{ChatAction, ChatRuntime, ChatSession};
use crate::core::config::{Config, Preferences};

/// Prints new assistant text and task changes as the session advances.
#[derive(Default)]
struct ReplyPrinter {
    message_id: Option<String>,
    printed: usize,
    task: Option<String>,
}

impl ReplyPrinter {
    fn track(&mut self, message_id: Option<String>) {
        self.message_id = message_id;
        self.printed = 0;
    }

    fn flush(&mut self, session: &ChatSession) -> io::Result<()> {
        if session.messages.active_assistant_task != self.task {
            self.task = session.messages.active_assistant_task.clone();
            if let Some(task) = &self.task {
                eprintln!("\n⚙️  {task}");
            }
        }

        let Some(id) = self.message_id.as_deref() else {
            return Ok(());
        };
        let Some(message) = session.messages.find(id) else {
            return Ok(());
        };
        if let Some(fresh) = message.content.get(self.printed..) {
            if !fresh.is_empty() {
                let mut stdout = io::stdout();
                stdout.write_all(fresh.as_bytes())?;
                stdout.flush()?;
                self.printed = message.content.len();
            }
        }
        Ok(())
    }
}

pub async fn run_chat(
    message: Vec<String>,
    thread: Option<String>,
    new_thread: bool,
    model: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let prompt = message.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: chatline chat <message>");
        std::process::exit(1);
    }

    let config = Config::load()?;
    let prefs_path = Preferences::get_path()?;
    let prefs = Preferences::load_from_path(&prefs_path)?;
    let client = gateway_client(&config, model.or(prefs.selected_model))?;
    let model = client.config().model.clone();

    let thread = if new_thread {
        None
    } else {
        thread.or(prefs.last_thread_id)
    };

    let mut runtime = ChatRuntime::new(Arc::new(client), ChatSession::new(model, None))
        .with_preferences_path(prefs_path);

    if let Some(thread_id) = thread {
        debug!(%thread_id, "loading thread history");
        runtime.apply(ChatAction::SelectThread { thread_id });
        while runtime.is_busy() {
            runtime.step().await;
        }
        for notice in runtime.session_mut().take_notices() {
            eprintln!("⚠️  {notice}; starting a new thread");
        }
    }

    runtime.apply(ChatAction::SubmitMessage { content: prompt });
    let mut printer = ReplyPrinter::default();
    printer.track(runtime.session().messages.streaming_message_id.clone());

    let mut failed = false;
    while runtime.is_busy() {
        runtime.step().await;
        printer.flush(runtime.session())?;
        for notice in runtime.session_mut().take_notices() {
            eprintln!("\n❌ Error: {notice}");
            failed = true;
        }
    }
    println!();

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
