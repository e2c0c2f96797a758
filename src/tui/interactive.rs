//! Raw-mode interactive terminal
//!
//! Forwards keystrokes to a [`TerminalSession`] and writes its output to
//! stdout until the session closes or the user presses Ctrl-].

use crate::terminal::{InputError, SessionOutput, TerminalSession};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

pub const DETACH_BYTE: u8 = 0x1D; // Ctrl-]

/// How an interactive session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    /// User pressed Ctrl-]
    Detached,
    /// The session closed, with its reason
    Closed(String),
}

/// Restores cooked mode on drop, including on early return
pub struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    pub fn enter() -> std::io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self { active: true })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            let _ = disable_raw_mode();
            self.active = false;
        }
    }
}

/// Bytes a terminal would send for a key press
pub fn key_bytes(key: &KeyEvent) -> Option<Vec<u8>> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let bytes = match key.code {
        KeyCode::Char(c) if ctrl => {
            let upper = c.to_ascii_uppercase();
            if ('@'..='_').contains(&upper) {
                vec![(upper as u8) & 0x1f]
            } else {
                return None;
            }
        }
        KeyCode::Char(c) => c.to_string().into_bytes(),
        KeyCode::Enter => vec![b'\r'],
        KeyCode::Tab => vec![b'\t'],
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        KeyCode::Home => b"\x1b[H".to_vec(),
        KeyCode::End => b"\x1b[F".to_vec(),
        KeyCode::Delete => b"\x1b[3~".to_vec(),
        _ => return None,
    };
    Some(bytes)
}

/// Read keys on a blocking thread until `shutdown` is set
fn spawn_stdin_reader(tx: mpsc::Sender<Vec<u8>>, shutdown: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        while !shutdown.load(Ordering::Relaxed) {
            // Poll so the shutdown flag is checked regularly
            match event::poll(Duration::from_millis(100)) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(_) => break,
            }
            let bytes = match event::read() {
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => key_bytes(&key),
                Ok(Event::Paste(text)) => Some(text.into_bytes()),
                Ok(_) => None,
                Err(_) => break,
            };
            if let Some(bytes) = bytes {
                if tx.blocking_send(bytes).is_err() {
                    break;
                }
            }
        }
    });
}

fn write_out(bytes: &[u8]) {
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(bytes);
    let _ = stdout.flush();
}

/// Send `bytes` to the session. Rejected input is reported inline through
/// `report`; returns false once the session is closed.
fn forward(session: &TerminalSession, bytes: &[u8], mut report: impl FnMut(&[u8])) -> bool {
    match session.send_input(String::from_utf8_lossy(bytes).into_owned()) {
        Ok(_) => true,
        Err(InputError::Closed) => false,
        Err(e) => {
            tracing::debug!("Terminal input not sent: {}", e);
            report(format!("\r\n[k8slab: input not sent: {}]\r\n", e).as_bytes());
            true
        }
    }
}

/// Attach the local terminal to `session` until detach or close
pub async fn attach(session: &mut TerminalSession, label: &str) -> Result<AttachOutcome> {
    let guard = RawModeGuard::enter()?;
    write_out(format!("\r[k8slab: connecting to {} -- Ctrl-] to detach]\r\n", label).as_bytes());

    let (stdin_tx, mut stdin_rx) = mpsc::channel::<Vec<u8>>(64);
    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_stdin_reader(stdin_tx, shutdown.clone());

    let outcome = loop {
        tokio::select! {
            Some(data) = stdin_rx.recv() => {
                if let Some(pos) = data.iter().position(|&b| b == DETACH_BYTE) {
                    if pos > 0 {
                        forward(session, &data[..pos], write_out);
                    }
                    break AttachOutcome::Detached;
                }
                if !forward(session, &data, write_out) {
                    break AttachOutcome::Closed("session is closed".to_string());
                }
            }
            item = session.recv() => match item {
                Some(SessionOutput::Data(data)) => write_out(data.as_bytes()),
                Some(SessionOutput::Error(message)) => {
                    write_out(format!("\r\n[k8slab: {}]\r\n", message).as_bytes());
                }
                Some(SessionOutput::Closed(reason)) => break AttachOutcome::Closed(reason),
                None => break AttachOutcome::Closed("session ended".to_string()),
            }
        }
    };

    shutdown.store(true, Ordering::Relaxed);
    drop(guard);
    match &outcome {
        AttachOutcome::Detached => eprintln!("\r\n[k8slab: detached]"),
        AttachOutcome::Closed(reason) => eprintln!("\r\n[k8slab: {}]", reason),
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Endpoints;
    use crate::models::AuthToken;
    use crate::services::SubscriptionBinder;
    use crate::terminal::{SessionRouter, TerminalMode, TerminalMultiplexer};
    use crate::transport::{ConnectionConfig, FrameCodec, MemoryConnector, ReconnectPolicy};
    use crossterm::event::KeyEventState;
    use url::Url;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_ctrl_bracket_is_detach_byte() {
        let key = press(KeyCode::Char(']'), KeyModifiers::CONTROL);
        assert_eq!(key_bytes(&key), Some(vec![DETACH_BYTE]));
    }

    #[test]
    fn test_control_letters() {
        assert_eq!(
            key_bytes(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(vec![0x03])
        );
        assert_eq!(
            key_bytes(&press(KeyCode::Char('d'), KeyModifiers::CONTROL)),
            Some(vec![0x04])
        );
    }

    #[test]
    fn test_plain_keys() {
        assert_eq!(
            key_bytes(&press(KeyCode::Char('é'), KeyModifiers::NONE)),
            Some("é".as_bytes().to_vec())
        );
        assert_eq!(
            key_bytes(&press(KeyCode::Enter, KeyModifiers::NONE)),
            Some(vec![b'\r'])
        );
        assert_eq!(
            key_bytes(&press(KeyCode::Up, KeyModifiers::NONE)),
            Some(b"\x1b[A".to_vec())
        );
        assert_eq!(key_bytes(&press(KeyCode::F(5), KeyModifiers::NONE)), None);
    }

    #[tokio::test]
    async fn test_rejected_input_is_reported_inline() {
        let (connector, _remotes) = MemoryConnector::new();
        let connector = Arc::new(connector);
        let router = SessionRouter::new();
        let registered = router.clone();
        let binder = SubscriptionBinder::new(
            connector.clone(),
            ConnectionConfig {
                endpoint: Url::parse("ws://lab.test/ws").unwrap(),
                policy: ReconnectPolicy::default(),
                codec: FrameCodec::Envelope,
            },
            AuthToken::new("secret"),
            move |c| c.on_frame(registered.clone()),
        );
        let endpoints = Endpoints::new("http://lab.test", "/ws", "/ws/terminal").unwrap();
        let mux = TerminalMultiplexer::new(binder, router, connector, endpoints);
        let mut session = mux.start_session("c1", TerminalMode::Shared).unwrap();

        let mut shown = Vec::new();
        assert!(forward(&session, b"l", |b| shown.extend_from_slice(b)));
        assert!(shown.is_empty());

        // A second key before the session opens cannot be buffered
        assert!(forward(&session, b"s", |b| shown.extend_from_slice(b)));
        let shown = String::from_utf8(shown).unwrap();
        assert!(shown.contains("[k8slab: input not sent:"), "{}", shown);

        session.close();
        assert!(!forward(&session, b"x", |_| panic!("closed input is not reported")));
    }
}
