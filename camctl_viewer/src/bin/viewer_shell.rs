use camctl_protocol::SettingValue;
use camctl_viewer::{
    run, PanelView, ViewerCommand, ViewerConfig, ViewerEvent, MAX_CONNECT_ATTEMPTS,
};
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Headless control-panel shell: attaches a text surface to a viewer
/// session and forwards stdin interactions to the server.
#[derive(Parser, Debug)]
#[command(name = "viewer_shell")]
struct Args {
    /// Control server websocket endpoint, e.g. ws://127.0.0.1:9870
    /// (falls back to CAMCTL_WS_URL).
    #[arg(long)]
    ws_url: Option<String>,

    #[arg(long, default_value_t = MAX_CONNECT_ATTEMPTS)]
    max_attempts: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let endpoint = args
        .ws_url
        .or_else(|| std::env::var("CAMCTL_WS_URL").ok());

    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (event_tx, mut event_rx) = mpsc::channel(64);

    let config = ViewerConfig {
        endpoint,
        max_attempts: args.max_attempts,
        fallback: None,
    };
    let actor = tokio::spawn(run(config, cmd_rx, event_tx));

    spawn_stdin_reader(cmd_tx);

    let mut view = PanelView::new();
    while let Some(event) = event_rx.recv().await {
        view.apply(&event);
        match &event {
            ViewerEvent::Status { phase, retry_count } => {
                tracing::info!(phase = phase.as_str(), retry_count = *retry_count, "session status");
            }
            ViewerEvent::PanelReady { .. } => {
                println!("{}", view.render_text());
            }
            ViewerEvent::SchemaRejected { reason } => {
                tracing::error!(%reason, "schema rejected");
            }
            ViewerEvent::Frame { .. } => {
                if view.frame_count() % 30 == 1 {
                    tracing::debug!(frames = view.frame_count(), "streaming");
                }
            }
        }
    }

    match actor.await? {
        Ok(()) => {
            println!("session closed");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn spawn_stdin_reader(tx: mpsc::Sender<ViewerCommand>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => {
                    let _ = tx.blocking_send(ViewerCommand::Shutdown);
                    return;
                }
                Ok(_) => {}
            }
            match parse_command(line.trim()) {
                Ok(Some(cmd)) => {
                    let quitting = cmd == ViewerCommand::Shutdown;
                    if tx.blocking_send(cmd).is_err() || quitting {
                        return;
                    }
                }
                Ok(None) => {}
                Err(usage) => eprintln!("{usage}"),
            }
        }
    });
}

fn parse_command(line: &str) -> Result<Option<ViewerCommand>, String> {
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(' ') {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    match word {
        "set" => {
            let Some((name, raw)) = rest.split_once(' ') else {
                return Err("usage: set <variable_name> <value>".to_string());
            };
            Ok(Some(ViewerCommand::UpdateControl {
                variable_name: name.to_string(),
                new_value: parse_value(raw.trim()),
            }))
        }
        // Window names may contain spaces ("Grid View").
        "display" if !rest.is_empty() => Ok(Some(ViewerCommand::SelectDisplay {
            window_name: rest.to_string(),
        })),
        "save" => Ok(Some(ViewerCommand::SaveSettings)),
        "quit" | "exit" => Ok(Some(ViewerCommand::Shutdown)),
        _ => Err("commands: set <name> <value> | display <window> | save | quit".to_string()),
    }
}

fn parse_value(raw: &str) -> SettingValue {
    if let Ok(v) = raw.parse::<bool>() {
        return SettingValue::Bool(v);
    }
    if let Ok(v) = raw.parse::<i64>() {
        return SettingValue::Int(v);
    }
    if let Ok(v) = raw.parse::<f64>() {
        return SettingValue::Float(v);
    }
    SettingValue::Text(raw.to_string())
}
