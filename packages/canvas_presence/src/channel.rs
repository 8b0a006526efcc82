//! Presence channel: the connection manager actor and its handle.
//!
//! One task owns the transport, the lifecycle state machine, the publisher
//! and the presence store. Everything that mutates them happens inside
//! that task's `select!` loop; the [`PresenceChannel`] handle only reads
//! watch channels and posts commands.

use futures::FutureExt;
use futures::future::BoxFuture;
use presence_core::{
    ConnectionLifecycle, ConnectionState, Directive, LocalPointer, OutboundMessage,
    PresenceSnapshot, TransportEvent,
};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ChannelConfig;
use crate::publisher::Publisher;
use crate::store::PresenceStore;
use crate::transport::{Connector, Frame, Transport, TransportError, WsConnector};

const COMMAND_CAPACITY: usize = 64;

/// Upper bound on the graceful close during teardown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Commands posted from the handle to the actor
#[derive(Debug)]
enum Command {
    ClickBox { index: u32 },
}

/// Handle to a running presence channel.
///
/// Dropping the handle cancels the actor; [`PresenceChannel::teardown`]
/// additionally waits for the transport to be closed.
pub struct PresenceChannel {
    commands: mpsc::Sender<Command>,
    pointer: watch::Sender<LocalPointer>,
    state_rx: watch::Receiver<ConnectionState>,
    sendable_rx: watch::Receiver<bool>,
    presence_rx: watch::Receiver<Arc<PresenceSnapshot>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PresenceChannel {
    /// Start a channel to the configured WebSocket endpoint.
    pub fn connect(config: ChannelConfig) -> Self {
        Self::init(config, WsConnector)
    }

    /// Start a channel over an arbitrary connector. Must be called inside a
    /// tokio runtime.
    pub fn init<C: Connector>(config: ChannelConfig, connector: C) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (pointer_tx, pointer_rx) = watch::channel(LocalPointer::default());
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (sendable_tx, sendable_rx) = watch::channel(false);
        let (presence_tx, presence_rx) = watch::channel(Arc::new(PresenceSnapshot::default()));
        let cancel = CancellationToken::new();

        let actor = ChannelActor {
            lifecycle: ConnectionLifecycle::new(config.reconnect_delay),
            publisher: Publisher::new(&config),
            store: PresenceStore::new(&config, presence_tx),
            config,
            connector,
            link: None,
            connecting: None,
            reconnect: None,
            pointer_rx,
            commands: command_rx,
            state_tx,
            sendable_tx,
        };

        let task = tokio::spawn(actor.run(cancel.clone()));

        Self {
            commands: command_tx,
            pointer: pointer_tx,
            state_rx,
            sendable_rx,
            presence_rx,
            cancel,
            task: Some(task),
        }
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Connected, and the transport itself reports it can take frames.
    ///
    /// Mirrored from the actor, which re-reads transport readiness on every
    /// connection event, send, and emission tick; a readiness flip shows up
    /// here within one emission interval.
    pub fn is_sendable(&self) -> bool {
        *self.sendable_rx.borrow()
    }

    /// Latest presence snapshot.
    pub fn presence(&self) -> Arc<PresenceSnapshot> {
        self.presence_rx.borrow().clone()
    }

    pub fn watch_presence(&self) -> watch::Receiver<Arc<PresenceSnapshot>> {
        self.presence_rx.clone()
    }

    /// Update the local pointer. Picked up by the next emission tick.
    pub fn move_pointer(&self, x: i32, y: i32) {
        self.pointer.send_replace(LocalPointer::new(x, y));
    }

    pub fn pointer(&self) -> LocalPointer {
        *self.pointer.borrow()
    }

    /// Publish a box toggle. Subject to the same send gate as pointer
    /// reports; returns false if the command could not be queued.
    pub fn click_box(&self, index: u32) -> bool {
        match self.commands.try_send(Command::ClickBox { index }) {
            Ok(()) => true,
            Err(e) => {
                warn!(index, error = %e, "dropping box click");
                false
            }
        }
    }

    /// Cancel timers, close the transport, and wait for the actor to exit.
    pub async fn teardown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "presence channel task failed");
            }
        }
    }
}

impl Drop for PresenceChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

type ConnectFuture<T> = BoxFuture<'static, Result<T, TransportError>>;

struct ChannelActor<C: Connector> {
    config: ChannelConfig,
    connector: C,
    lifecycle: ConnectionLifecycle,
    link: Option<C::Transport>,
    connecting: Option<ConnectFuture<C::Transport>>,
    /// The single reconnect timer; `Some` only while one is pending
    reconnect: Option<Pin<Box<Sleep>>>,
    publisher: Publisher,
    store: PresenceStore,
    pointer_rx: watch::Receiver<LocalPointer>,
    commands: mpsc::Receiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    sendable_tx: watch::Sender<bool>,
}

impl<C: Connector> ChannelActor<C> {
    async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.emit_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.start_connect();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                result = poll_connect(&mut self.connecting) => self.on_connect_result(result),

                _ = wait_reconnect(&mut self.reconnect) => {
                    self.reconnect = None;
                    self.start_connect();
                }

                _ = ticker.tick() => self.on_tick().await,

                command = self.commands.recv() => match command {
                    Some(Command::ClickBox { index }) => {
                        let message = self.publisher.box_click_message(index);
                        self.publish(message).await;
                    }
                    None => break,
                },

                // last, so a relay that always has frames ready cannot starve publishing
                frame = next_frame(&mut self.link) => self.on_frame(frame),
            }
        }

        self.shutdown().await;
    }

    fn start_connect(&mut self) {
        if !self.lifecycle.begin_connect() {
            return;
        }
        info!(
            endpoint = %self.config.endpoint,
            attempt = self.lifecycle.attempts(),
            "attempting to connect to relay"
        );
        let timeout = self.config.connect_timeout;
        let connect = self.connector.connect(&self.config.endpoint);
        self.connecting = Some(
            async move {
                match tokio::time::timeout(timeout, connect).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Connect(format!(
                        "timed out after {}ms",
                        timeout.as_millis()
                    ))),
                }
            }
            .boxed(),
        );
        self.sync_status();
    }

    fn on_connect_result(&mut self, result: Result<C::Transport, TransportError>) {
        self.connecting = None;
        let directive = match result {
            Ok(link) => {
                info!(endpoint = %self.config.endpoint, "connected to relay");
                self.link = Some(link);
                self.lifecycle.on_event(TransportEvent::Opened)
            }
            Err(e) => {
                warn!(endpoint = %self.config.endpoint, error = %e, "relay connection error");
                self.lifecycle.on_event(TransportEvent::Failed(e.to_string()))
            }
        };
        self.apply(directive);
        self.sync_status();
    }

    fn on_frame(&mut self, frame: Option<Result<Frame, TransportError>>) {
        let event = match frame {
            Some(Ok(Frame::Text(text))) => {
                self.store.apply_frame(&text, now());
                return;
            }
            Some(Ok(Frame::Other)) => return,
            Some(Ok(Frame::Close { code, reason })) => {
                info!(?code, %reason, "relay closed the connection");
                TransportEvent::Closed { code, reason }
            }
            Some(Err(e)) => {
                warn!(error = %e, "relay connection error");
                TransportEvent::Failed(e.to_string())
            }
            None => {
                info!("relay connection ended");
                TransportEvent::Closed {
                    code: None,
                    reason: String::new(),
                }
            }
        };

        self.link = None;
        let directive = self.lifecycle.on_event(event);
        self.apply(directive);
        self.sync_status();
    }

    async fn on_tick(&mut self) {
        // readiness can change without a frame or send to report it
        self.sync_status();
        let pointer = *self.pointer_rx.borrow_and_update();
        self.publisher.move_pointer(pointer);
        let message = self.publisher.pointer_message();
        self.publish(message).await;
        self.store.evict_stale(now());
    }

    async fn publish(&mut self, message: OutboundMessage) {
        let at = now();
        let sendable = self.is_sendable();
        let Some(text) = self.publisher.prepare(&message, sendable, at) else {
            return;
        };
        let Some(link) = self.link.as_mut() else {
            return;
        };

        match link.send_text(text).await {
            Ok(()) => self.publisher.sent(at),
            Err(e) => warn!(kind = message.kind(), error = %e, "error sending packet"),
        }
        self.sync_status();
    }

    fn apply(&mut self, directive: Directive) {
        match directive {
            Directive::ScheduleReconnect(delay) => {
                debug!(delay_ms = delay.as_millis() as u64, "reconnect scheduled");
                self.reconnect
                    .get_or_insert_with(|| Box::pin(tokio::time::sleep(delay)));
            }
            Directive::CancelReconnect => {
                if self.reconnect.take().is_some() {
                    debug!("reconnect cancelled");
                }
            }
            Directive::None => {}
        }
    }

    fn is_sendable(&self) -> bool {
        self.lifecycle.state() == ConnectionState::Connected
            && self.link.as_ref().is_some_and(|link| link.is_ready())
    }

    fn sync_status(&self) {
        let state = self.lifecycle.state();
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if changed {
            info!(%state, "connection state changed");
        }

        let sendable = self.is_sendable();
        self.sendable_tx.send_if_modified(|current| {
            if *current == sendable {
                return false;
            }
            *current = sendable;
            true
        });
    }

    async fn shutdown(&mut self) {
        let directive = self.lifecycle.teardown();
        self.apply(directive);
        self.connecting = None;

        if let Some(mut link) = self.link.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, link.close()).await.is_err() {
                warn!("timed out closing relay connection");
            }
        }

        self.sync_status();
        info!(
            sent = self.publisher.stats().sent,
            sources = self.store.table().len(),
            "presence channel torn down"
        );
    }
}

/// Wall-clock view of tokio's (possibly paused) clock.
fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

async fn poll_connect<T>(connecting: &mut Option<ConnectFuture<T>>) -> Result<T, TransportError> {
    match connecting.as_mut() {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_frame<T: Transport>(link: &mut Option<T>) -> Option<Result<Frame, TransportError>> {
    match link.as_mut() {
        Some(link) => link.next_frame().await,
        None => std::future::pending().await,
    }
}

async fn wait_reconnect(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
