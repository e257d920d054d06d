use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use textgpt::auth::{AuthKind, AuthOutcome};
use textgpt::config::ClientConfig;
use textgpt::conversation::ConversationStore;
use textgpt::render::{LogView, MarkdownRenderer, Renderer};
use textgpt::session::{Route, SessionGate, View};
use textgpt::transport::{Credentials, HttpTransport};

enum Flow {
    Continue,
    Quit,
}

/// The conversation the terminal is currently showing
struct Attached {
    store: Arc<ConversationStore>,
    revisions: watch::Receiver<u64>,
    view: LogView,
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Logs go to stderr so they never interleave with the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "textgpt=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ClientConfig::from_env();
    tracing::info!("Starting textgpt against {}", config.api_url);

    let transport = match HttpTransport::new(&config.api_url) {
        Ok(transport) => Arc::new(transport),
        Err(e) => {
            eprintln!("Cannot start: {}", e);
            std::process::exit(1);
        }
    };

    let mut gate = SessionGate::new(transport, config.reply_ordering);
    println!("Checking session...");
    gate.check_session().await;

    let renderer = MarkdownRenderer::new();
    let mut attached = None;
    reattach(&gate, &mut attached);
    print_view(&gate);
    print_new_messages(&mut attached, &renderer);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("Failed to read stdin: {}", e);
                        break;
                    }
                };

                let before = gate.view();
                if let Flow::Quit = handle_line(&mut gate, &line).await {
                    break;
                }
                reattach(&gate, &mut attached);
                if gate.view() != before {
                    print_view(&gate);
                }
                print_new_messages(&mut attached, &renderer);
            }
            _ = log_changed(&mut attached) => {
                print_new_messages(&mut attached, &renderer);
            }
        }
    }
}

async fn handle_line(gate: &mut SessionGate, line: &str) -> Flow {
    if gate.view() == View::Conversation {
        match line.trim() {
            "/quit" => return Flow::Quit,
            "/logout" => {
                if let Err(e) = gate.logout().await {
                    tracing::warn!("Logout refused: {}", e);
                }
            }
            _ => {
                if let Some(chat) = gate.chat() {
                    chat.set_draft(line);
                    // The request is already running; its reply shows up
                    // through the store's revision channel
                    drop(chat.submit_draft());
                }
            }
        }
        return Flow::Continue;
    }

    let mut words = line.split_whitespace();
    match words.next() {
        Some("quit") => return Flow::Quit,
        Some("mode") => match words.next() {
            Some("login") => gate.set_auth_mode(AuthKind::Login),
            Some("signup") => gate.set_auth_mode(AuthKind::Signup),
            _ => println!("usage: mode login|signup"),
        },
        Some("chat") => {
            if gate.navigate(Route::Chat) != Route::Chat {
                println!("Please log in first.");
            }
        }
        Some(command @ ("login" | "signup")) => {
            let kind = if command == "login" {
                AuthKind::Login
            } else {
                AuthKind::Signup
            };
            let username = words.next().unwrap_or_default();
            let password = words.next().unwrap_or_default();

            gate.set_auth_mode(kind);
            match gate
                .submit_credentials(Credentials::new(username, password))
                .await
            {
                Ok(AuthOutcome::Accepted) => {}
                Ok(_) => {
                    if let Some(error) = gate.form(kind).error() {
                        println!("{}", error);
                    }
                }
                Err(e) => println!("{}", e),
            }
        }
        Some(other) => println!("Unknown command '{}'", other),
        None => {}
    }
    Flow::Continue
}

/// Follow the gate's current conversation, if any
fn reattach(gate: &SessionGate, attached: &mut Option<Attached>) {
    let current = gate.chat().map(|chat| chat.store().clone());
    let same = match (&current, attached.as_ref()) {
        (Some(store), Some(a)) => Arc::ptr_eq(store, &a.store),
        (None, None) => true,
        _ => false,
    };
    if same {
        return;
    }

    *attached = current.map(|store| Attached {
        revisions: store.subscribe(),
        store,
        view: LogView::new(),
    });
}

async fn log_changed(attached: &mut Option<Attached>) {
    match attached {
        Some(a) => {
            if a.revisions.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
        None => futures::future::pending::<()>().await,
    }
}

fn print_new_messages(attached: &mut Option<Attached>, renderer: &dyn Renderer) {
    let Some(a) = attached else {
        return;
    };
    a.revisions.borrow_and_update();
    for block in a.view.refresh(&a.store, renderer) {
        println!("{}:", block.label());
        println!("{}", block.body.trim_end());
    }
}

fn print_view(gate: &SessionGate) {
    match gate.view() {
        View::Pending => println!("Checking session..."),
        View::Conversation => {
            println!("== Text Based GPT ==");
            println!("Type a message and press Enter. /logout to log out, /quit to exit.");
        }
        View::AuthPrompt(kind) | View::AuthPage(kind) => {
            println!("== {} ==", kind.title());
            println!("Commands: login <user> <pass> | signup <user> <pass> | mode login|signup | quit");
        }
        View::Blank => println!("Commands: chat | login <user> <pass> | quit"),
    }
}
