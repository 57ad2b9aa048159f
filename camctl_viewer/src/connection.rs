use crate::display::{build_display_entries, DisplayEntry};
use crate::error::{SchemaError, ViewerError};
use crate::frame::FrameSink;
use crate::panel::{build_panel, PanelGroup};
use crate::session::{SessionPhase, SessionState, MAX_CONNECT_ATTEMPTS};
use camctl_protocol::{ClientMessage, SchemaBundle, ServerMessage, SettingValue};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Session parameters handed over by the page collaborator at start.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Channel endpoint (ws:// or wss://). Absent or empty means the page
    /// could not name a server; the channel is never opened.
    pub endpoint: Option<String>,
    pub max_attempts: u32,
    /// Schema baked into the page, shown until the server's config arrives.
    pub fallback: Option<SchemaBundle>,
}

impl ViewerConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            max_attempts: MAX_CONNECT_ATTEMPTS,
            fallback: None,
        }
    }
}

/// Commands from the interactive surface into the session actor. Each
/// interaction maps to exactly one outbound message; nothing is batched or
/// debounced.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerCommand {
    UpdateControl {
        variable_name: String,
        new_value: SettingValue,
    },
    SelectDisplay {
        window_name: String,
    },
    /// Explicit user save action. Never emitted automatically.
    SaveSettings,
    Shutdown,
}

/// Events out of the session actor, for whatever surface is attached.
#[derive(Debug, Clone)]
pub enum ViewerEvent {
    Status {
        phase: SessionPhase,
        retry_count: u32,
    },
    /// A freshly materialized panel. Replaces any previous one wholesale.
    PanelReady {
        groups: Vec<PanelGroup>,
        displays: Vec<DisplayEntry>,
        initial_display: String,
        layout_row_col: (u32, u32),
    },
    SchemaRejected {
        reason: String,
    },
    Frame {
        image: String,
    },
}

/// Runs one viewer session to completion: bounded-retry connect loop, the
/// config/frame double request on every successful connect, then the select
/// loop over surface commands and inbound messages. Returns Ok on user
/// teardown, Err for configuration errors and retry exhaustion. The socket
/// is explicitly closed on every exit path.
pub async fn run(
    config: ViewerConfig,
    mut rx: mpsc::Receiver<ViewerCommand>,
    events: mpsc::Sender<ViewerEvent>,
) -> Result<(), ViewerError> {
    if let Some(bundle) = &config.fallback {
        if let Err(err) = materialize(bundle, &events).await {
            tracing::warn!(%err, "fallback schema rejected");
        }
    }

    let url = endpoint_url(&config)?;

    let mut session = SessionState::new(config.max_attempts);
    let mut frames = FrameSink::new();
    let mut backoff = Backoff::default();

    loop {
        session.begin_connect();
        emit_status(&events, &session).await;

        let mut socket = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((socket, _)) => socket,
            Err(err) => {
                tracing::warn!(%err, attempt = session.retry_count() + 1, "connect failed");
                if session.mark_connect_error() {
                    emit_status(&events, &session).await;
                    return Err(ViewerError::ConnectionFailed {
                        attempts: session.retry_count(),
                    });
                }
                emit_status(&events, &session).await;
                tokio::time::sleep(backoff.next_delay()).await;
                continue;
            }
        };

        session.mark_connected();
        backoff.reset();
        frames.reset_sequence();
        emit_status(&events, &session).await;

        // Exactly one config request and one frame request per successful
        // connection, config first. The server answers the config request
        // once, then enters its frame-push loop after the frame request with
        // no further prompting from us.
        let primed = send_message(&mut socket, &ClientMessage::ConfigRequest).await.is_ok()
            && send_message(&mut socket, &ClientMessage::FrameRequest).await.is_ok();

        let teardown = if primed {
            drive_session(&mut socket, &mut rx, &events, &mut session, &mut frames).await
        } else {
            false
        };

        // Release the channel deterministically rather than letting the
        // transport time out.
        let _ = socket.close(None).await;
        session.mark_disconnected();
        emit_status(&events, &session).await;

        if teardown {
            return Ok(());
        }
    }
}

/// Pumps one established connection. Returns true when the surface asked for
/// teardown (or went away), false when the transport dropped.
async fn drive_session(
    socket: &mut WsStream,
    rx: &mut mpsc::Receiver<ViewerCommand>,
    events: &mpsc::Sender<ViewerEvent>,
    session: &mut SessionState,
    frames: &mut FrameSink,
) -> bool {
    loop {
        tokio::select! {
            cmd = rx.recv() => {
                let Some(cmd) = cmd else { return true };
                let outbound = match cmd {
                    ViewerCommand::Shutdown => return true,
                    ViewerCommand::UpdateControl { variable_name, new_value } => {
                        ClientMessage::control_update(&variable_name, new_value)
                    }
                    ViewerCommand::SelectDisplay { window_name } => {
                        ClientMessage::display_request(&window_name)
                    }
                    ViewerCommand::SaveSettings => ClientMessage::SaveRequest,
                };
                if send_message(socket, &outbound).await.is_err() {
                    return false;
                }
            }
            incoming = socket.next() => {
                match incoming {
                    Some(Ok(msg)) => {
                        if let Ok(text) = msg.into_text() {
                            match serde_json::from_str::<ServerMessage>(&text) {
                                Ok(server_msg) => {
                                    handle_server_message(server_msg, session, frames, events).await;
                                }
                                Err(err) => {
                                    tracing::warn!(%err, "undecodable server message");
                                }
                            }
                        }
                    }
                    _ => return false,
                }
            }
        }
    }
}

async fn handle_server_message(
    msg: ServerMessage,
    session: &mut SessionState,
    frames: &mut FrameSink,
    events: &mpsc::Sender<ViewerEvent>,
) {
    match msg {
        ServerMessage::ConfigResponse {
            control,
            initial,
            display,
        } => {
            let bundle = SchemaBundle {
                control,
                initial,
                display,
            };
            match materialize(&bundle, events).await {
                Ok(()) => session.store_config(bundle),
                Err(err) => {
                    tracing::error!(%err, "rejecting control schema");
                    let _ = events
                        .send(ViewerEvent::SchemaRejected {
                            reason: err.to_string(),
                        })
                        .await;
                }
            }
        }
        ServerMessage::FrameResponse {
            frame,
            seq,
            stage_timing_ms,
        } => {
            if let Some(timing) = &stage_timing_ms {
                tracing::trace!(?timing, "frame stage timing");
            }
            if let Some(image) = frames.accept(frame, seq) {
                // Never queue frames behind a slow surface: the next payload
                // supersedes this one anyway.
                let _ = events.try_send(ViewerEvent::Frame {
                    image: image.to_string(),
                });
            }
        }
    }
}

/// Builds panel and display list from a schema bundle and hands the result
/// to the surface. Schema errors reject the whole bundle.
async fn materialize(
    bundle: &SchemaBundle,
    events: &mpsc::Sender<ViewerEvent>,
) -> Result<(), SchemaError> {
    let groups = build_panel(&bundle.control, &bundle.initial)?;
    let displays = build_display_entries(&bundle.display)?;
    let _ = events
        .send(ViewerEvent::PanelReady {
            groups,
            displays,
            initial_display: bundle.display.initial_display.clone(),
            layout_row_col: bundle.display.layout_row_col,
        })
        .await;
    Ok(())
}

fn endpoint_url(config: &ViewerConfig) -> Result<Url, ViewerError> {
    let raw = match config.endpoint.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Err(ViewerError::MissingEndpoint),
    };
    let url = Url::parse(raw).map_err(|err| ViewerError::InvalidEndpoint {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ViewerError::InvalidEndpoint {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

async fn emit_status(events: &mpsc::Sender<ViewerEvent>, session: &SessionState) {
    let _ = events
        .send(ViewerEvent::Status {
            phase: session.phase(),
            retry_count: session.retry_count(),
        })
        .await;
}

async fn send_message(socket: &mut WsStream, msg: &ClientMessage) -> Result<(), ()> {
    let payload = serde_json::to_string(msg).map_err(|_| ())?;
    socket
        .send(tokio_tungstenite::tungstenite::Message::Text(payload.into()))
        .await
        .map_err(|_| ())
}

#[derive(Default)]
struct Backoff {
    idx: usize,
}

impl Backoff {
    fn reset(&mut self) {
        self.idx = 0;
    }

    fn next_delay(&mut self) -> Duration {
        let delays = [1, 2, 5, 10];
        let secs = delays.get(self.idx).copied().unwrap_or(10);
        self.idx = (self.idx + 1).min(delays.len());
        Duration::from_secs(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_must_be_present_and_websocket() {
        let mut config = ViewerConfig {
            endpoint: None,
            max_attempts: MAX_CONNECT_ATTEMPTS,
            fallback: None,
        };
        assert!(matches!(
            endpoint_url(&config),
            Err(ViewerError::MissingEndpoint)
        ));

        config.endpoint = Some("   ".to_string());
        assert!(matches!(
            endpoint_url(&config),
            Err(ViewerError::MissingEndpoint)
        ));

        config.endpoint = Some("http://127.0.0.1:9870".to_string());
        assert!(matches!(
            endpoint_url(&config),
            Err(ViewerError::InvalidEndpoint { .. })
        ));

        config.endpoint = Some("ws://127.0.0.1:9870".to_string());
        assert!(endpoint_url(&config).is_ok());
    }

    #[test]
    fn backoff_is_staged_and_capped() {
        let mut backoff = Backoff::default();
        let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 5, 10, 10, 10]);
        backoff.reset();
        assert_eq!(backoff.next_delay().as_secs(), 1);
    }
}
