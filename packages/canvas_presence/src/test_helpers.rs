//! In-memory connector for driving the channel actor without sockets.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::transport::{Connector, Frame, Transport, TransportError};

type Inbound = mpsc::UnboundedSender<Result<Frame, TransportError>>;

#[derive(Default)]
struct RelayState {
    accept: bool,
    stall: bool,
    ready: bool,
    fail_sends: bool,
    attempts: Vec<tokio::time::Instant>,
    sent: Vec<String>,
    closed_links: usize,
    inbound: Option<Inbound>,
    /// When set, every read returns this text immediately.
    flood: Option<String>,
}

/// Test-side view of a fake relay. Clone it into the connector, keep it to
/// inspect what the channel did.
#[derive(Clone)]
pub struct FakeRelay {
    state: Arc<Mutex<RelayState>>,
}

impl FakeRelay {
    fn new(accept: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(RelayState {
                accept,
                ready: true,
                ..Default::default()
            })),
        }
    }

    pub fn accepting() -> Self {
        Self::new(true)
    }

    pub fn refusing() -> Self {
        Self::new(false)
    }

    /// Accepts the socket but never completes a handshake.
    pub fn stalling() -> Self {
        let relay = Self::new(false);
        relay.state.lock().unwrap().stall = true;
        relay
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector {
            state: self.state.clone(),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().unwrap().ready = ready;
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.state.lock().unwrap().fail_sends = fail;
    }

    pub fn attempts(&self) -> Vec<tokio::time::Instant> {
        self.state.lock().unwrap().attempts.clone()
    }

    pub fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn closed_links(&self) -> usize {
        self.state.lock().unwrap().closed_links
    }

    /// Deliver a text frame on the current link.
    pub fn push_text(&self, text: &str) {
        self.push(Ok(Frame::Text(text.to_string())));
    }

    /// Deliver a close frame on the current link.
    pub fn close_connection(&self, code: u16) {
        self.push(Ok(Frame::Close {
            code: Some(code),
            reason: "going away".to_string(),
        }));
    }

    /// Make every subsequent read on the link return `text` without waiting.
    pub fn flood(&self, text: &str) {
        self.state.lock().unwrap().flood = Some(text.to_string());
    }

    /// End the current link's stream without a close frame.
    pub fn end_stream(&self) {
        self.state.lock().unwrap().inbound = None;
    }

    fn push(&self, item: Result<Frame, TransportError>) {
        let state = self.state.lock().unwrap();
        let inbound = state.inbound.as_ref().expect("no live link");
        inbound.send(item).expect("link receiver alive");
    }
}

pub struct FakeConnector {
    state: Arc<Mutex<RelayState>>,
}

impl Connector for FakeConnector {
    type Transport = FakeLink;

    fn connect(&self, _endpoint: &str) -> BoxFuture<'static, Result<FakeLink, TransportError>> {
        let mut state = self.state.lock().unwrap();
        state.attempts.push(tokio::time::Instant::now());
        if state.stall {
            return futures::future::pending().boxed();
        }

        let result = if state.accept {
            let (tx, rx) = mpsc::unbounded_channel();
            state.inbound = Some(tx);
            Ok(FakeLink {
                state: self.state.clone(),
                inbound: rx,
                closed: false,
            })
        } else {
            Err(TransportError::Connect("connection refused".to_string()))
        };
        futures::future::ready(result).boxed()
    }
}

pub struct FakeLink {
    state: Arc<Mutex<RelayState>>,
    inbound: mpsc::UnboundedReceiver<Result<Frame, TransportError>>,
    closed: bool,
}

impl Transport for FakeLink {
    fn is_ready(&self) -> bool {
        !self.closed && self.state.lock().unwrap().ready
    }

    fn send_text(&mut self, text: String) -> BoxFuture<'_, Result<(), TransportError>> {
        let mut state = self.state.lock().unwrap();
        let result = if state.fail_sends {
            Err(TransportError::Send("rejected by fake relay".to_string()))
        } else {
            state.sent.push(text);
            Ok(())
        };
        futures::future::ready(result).boxed()
    }

    fn next_frame(&mut self) -> BoxFuture<'_, Option<Result<Frame, TransportError>>> {
        let flood = self.state.lock().unwrap().flood.clone();
        match flood {
            // ready like a socket with buffered bytes; only the coop budget yields
            Some(text) => async move {
                tokio::task::consume_budget().await;
                Some(Ok(Frame::Text(text)))
            }
            .boxed(),
            None => self.inbound.recv().boxed(),
        }
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        self.closed = true;
        self.state.lock().unwrap().closed_links += 1;
        futures::future::ready(()).boxed()
    }
}
