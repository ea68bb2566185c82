use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::{HistoryLoader, HistoryPage};
use crate::common::frames::{self, InboundFrame, OutboundFrame};
use crate::common::{ChatCommand, ChatEvent, ChatMessage, ConnectionStatus};
use crate::config::AppConfig;
use crate::error::{ApiError, ChatError, TransportError};
use crate::session::SessionIdentity;

use super::transport::{Connector, Frame, FrameTransport};
use super::typing::TypingDebouncer;

const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 100;
const KEEPALIVE_PERIOD: Duration = Duration::from_secs(30);

/// Everything the network task needs to know about one chat session.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub ws_url: String,
    pub session_key: String,
    pub local_user_id: String,
    pub local_user_name: String,
    pub reconnect_delay: Duration,
    pub typing_debounce: Duration,
    pub history_page: HistoryPage,
    pub keepalive: Duration,
}

impl ClientSettings {
    pub fn new(identity: &SessionIdentity, ws_url: impl Into<String>, config: &AppConfig) -> Self {
        Self {
            ws_url: ws_url.into(),
            session_key: identity.session_key.clone(),
            local_user_id: identity.local_user_id.clone(),
            local_user_name: identity.local_user_name.clone(),
            reconnect_delay: config.reconnect_delay(),
            typing_debounce: config.typing_debounce(),
            history_page: HistoryPage::first(config.history_page_size),
            keepalive: KEEPALIVE_PERIOD,
        }
    }
}

type ConnectFuture<T> = BoxFuture<'static, (u64, Result<T, TransportError>)>;
type BacklogFuture = BoxFuture<'static, (u64, Result<Vec<ChatMessage>, ApiError>)>;

/// Owns the live socket for one session key and everything hanging off it:
/// the reconnect timer, the typing debounce timer and the in-flight backlog
/// fetch. Runs as a single task; all of those are handled from one
/// `select!` loop, so they never race each other.
pub struct ChatClient<C: Connector> {
    settings: ClientSettings,
    connector: Arc<C>,
    loader: Arc<dyn HistoryLoader>,
    event_sender: mpsc::Sender<ChatEvent>,
    command_receiver: mpsc::Receiver<ChatCommand>,
    status_sender: watch::Sender<ConnectionStatus>,
    cancel: CancellationToken,

    status: ConnectionStatus,
    /// Bumped for every connection attempt. Timers and fetches remember the
    /// epoch they were started for and are ignored once it moves on.
    epoch: u64,
    transport: Option<C::Transport>,
    connecting: Option<ConnectFuture<C::Transport>>,
    backlog: Option<BacklogFuture>,
    reconnect_at: Option<(Instant, u64)>,
    typing: TypingDebouncer,
}

impl<C: Connector> ChatClient<C> {
    /// Starts the network task. The returned handle tears the session down
    /// when dropped.
    pub fn spawn(
        settings: ClientSettings,
        connector: Arc<C>,
        loader: Arc<dyn HistoryLoader>,
    ) -> (ChatHandle, mpsc::Receiver<ChatEvent>) {
        let (command_sender, command_receiver) = mpsc::channel(COMMAND_BUFFER);
        let (event_sender, event_receiver) = mpsc::channel(EVENT_BUFFER);
        let (status_sender, status_receiver) = watch::channel(ConnectionStatus::Connecting);
        let cancel = CancellationToken::new();

        let client = Self {
            typing: TypingDebouncer::new(settings.typing_debounce),
            settings,
            connector,
            loader,
            event_sender,
            command_receiver,
            status_sender,
            cancel: cancel.clone(),
            status: ConnectionStatus::Connecting,
            epoch: 0,
            transport: None,
            connecting: None,
            backlog: None,
            reconnect_at: None,
        };
        let task = tokio::spawn(client.run());

        let handle = ChatHandle {
            command_sender,
            status: status_receiver,
            cancel,
            task: Some(task),
        };
        (handle, event_receiver)
    }

    async fn run(mut self) {
        log::info!(
            "Chat session {} started for user {}",
            self.settings.session_key,
            self.settings.local_user_id
        );
        let mut keepalive = keepalive_interval(self.settings.keepalive);
        self.begin_connect().await;

        loop {
            let reconnect_at = self.reconnect_at.map(|(at, _)| at);
            let typing_deadline = self.typing.deadline();
            let connected = self.transport.is_some();

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => break,
                    }
                }

                (epoch, result) = poll_slot(&mut self.connecting), if self.connecting.is_some() => {
                    self.connecting = None;
                    self.handle_connected(epoch, result, &mut keepalive).await;
                }

                frame = next_frame(&mut self.transport), if connected => {
                    self.handle_frame(frame).await;
                }

                (epoch, result) = poll_slot(&mut self.backlog), if self.backlog.is_some() => {
                    self.backlog = None;
                    self.handle_backlog(epoch, result).await;
                }

                _ = sleep_until_some(reconnect_at), if reconnect_at.is_some() => {
                    self.handle_reconnect_timer().await;
                }

                _ = sleep_until_some(typing_deadline), if typing_deadline.is_some() => {
                    if self.typing.expire(Instant::now()) {
                        self.send_typing(false).await;
                    }
                }

                _ = keepalive.tick(), if connected => {
                    if let Some(transport) = self.transport.as_mut() {
                        if let Err(err) = transport.send_ping().await {
                            log::debug!("Keepalive ping failed: {err}");
                        }
                    }
                }
            }
        }

        self.teardown().await;
    }

    async fn begin_connect(&mut self) {
        if self.transport.is_some() || self.connecting.is_some() {
            log::warn!("Connection attempt skipped: a socket is already open or opening");
            return;
        }
        self.epoch += 1;
        self.reconnect_at = None;
        self.set_status(ConnectionStatus::Connecting).await;

        let epoch = self.epoch;
        let connector = Arc::clone(&self.connector);
        let url = self.settings.ws_url.clone();
        log::info!("Connecting to {url} (attempt {epoch})");
        self.connecting = Some(Box::pin(async move { (epoch, connector.connect(&url).await) }));
    }

    async fn handle_connected(
        &mut self,
        epoch: u64,
        result: Result<C::Transport, TransportError>,
        keepalive: &mut Interval,
    ) {
        if epoch != self.epoch {
            log::debug!("Discarding stale connection attempt {epoch}");
            if let Ok(mut transport) = result {
                if let Err(err) = transport.close().await {
                    log::debug!("Error while closing stale chat socket: {err}");
                }
            }
            return;
        }

        match result {
            Ok(transport) => {
                log::info!("Chat socket connected for {}", self.settings.session_key);
                self.transport = Some(transport);
                keepalive.reset();
                self.set_status(ConnectionStatus::Connected).await;
                self.emit(ChatEvent::ErrorCleared).await;
                self.start_backlog_fetch();
            }
            Err(err) => {
                log::error!("Chat socket connection failed: {err}");
                self.emit(ChatEvent::Error("Connection failed, retrying...".to_string()))
                    .await;
                self.enter_disconnected().await;
            }
        }
    }

    fn start_backlog_fetch(&mut self) {
        let epoch = self.epoch;
        let loader = Arc::clone(&self.loader);
        let session_key = self.settings.session_key.clone();
        let page = self.settings.history_page;
        self.backlog = Some(Box::pin(async move {
            (epoch, loader.load_history(&session_key, page).await)
        }));
    }

    async fn handle_backlog(&mut self, epoch: u64, result: Result<Vec<ChatMessage>, ApiError>) {
        if epoch != self.epoch {
            log::debug!("Discarding backlog fetched for attempt {epoch}");
            return;
        }
        match result {
            Ok(messages) => {
                log::info!("Loaded {} history messages", messages.len());
                self.emit(ChatEvent::BacklogLoaded(messages)).await;
            }
            Err(err) => {
                log::error!("Failed to load chat history: {err}");
                let notice = if err.is_unauthorized() {
                    "Not allowed to read this chat's history".to_string()
                } else {
                    format!("Failed to load history: {err}")
                };
                self.emit(ChatEvent::Error(notice)).await;
            }
        }
    }

    async fn handle_frame(&mut self, frame: Option<Result<Frame, TransportError>>) {
        match frame {
            Some(Ok(Frame::Text(text))) => self.handle_text(&text).await,
            Some(Ok(Frame::Ignored)) => {}
            Some(Ok(Frame::Close)) | None => {
                log::info!("Chat socket closed");
                self.lose_connection().await;
            }
            Some(Err(err)) => {
                log::error!("Chat socket error: {err}");
                self.emit(ChatEvent::Error("Connection lost, reconnecting...".to_string()))
                    .await;
                self.lose_connection().await;
            }
        }
    }

    async fn handle_text(&mut self, text: &str) {
        let frame = match frames::parse_inbound(text) {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("Dropping malformed frame ({err}): {text}");
                return;
            }
        };
        log::debug!("Inbound frame: {frame:?}");

        let event = match frame {
            InboundFrame::Message(message) => ChatEvent::MessageReceived(message.into_message()),
            InboundFrame::System(notice) => ChatEvent::MessageReceived(notice.into_message()),
            InboundFrame::UserStatus(presence) => ChatEvent::PresenceChanged {
                user_id: presence.user_id,
                online: presence.is_online,
            },
            InboundFrame::Typing(typing) => ChatEvent::TypingChanged {
                user_id: typing.user_id,
                is_typing: typing.is_typing,
            },
        };
        self.emit(event).await;
    }

    async fn handle_reconnect_timer(&mut self) {
        let Some((_, epoch)) = self.reconnect_at.take() else {
            return;
        };
        // The timer only acts for the attempt that scheduled it.
        if epoch != self.epoch || self.status != ConnectionStatus::Disconnected {
            log::debug!("Ignoring stale reconnect timer for attempt {epoch}");
            return;
        }
        self.begin_connect().await;
    }

    async fn handle_command(&mut self, command: ChatCommand) {
        if !self.status.is_connected() || self.transport.is_none() {
            log::warn!("Dropping {command:?}: socket is {}", self.status.label());
            return;
        }

        match command {
            ChatCommand::SendMessage(content) => {
                let frame = OutboundFrame::Message {
                    content,
                    sender_id: self.settings.local_user_id.clone(),
                    sender_name: self.settings.local_user_name.clone(),
                    match_id: self.settings.session_key.clone(),
                    timestamp: frames::now_iso(),
                };
                if let Err(err) = self.send_frame(&frame).await {
                    log::error!("Failed to send message: {err}");
                    self.emit(ChatEvent::Error("Failed to send message".to_string()))
                        .await;
                }
            }
            ChatCommand::Keystroke => {
                if self.typing.keystroke(Instant::now()) {
                    self.send_typing(true).await;
                }
            }
            ChatCommand::SetTyping(is_typing) => {
                if is_typing {
                    self.typing.started();
                } else {
                    self.typing.stopped();
                }
                self.send_typing(is_typing).await;
            }
        }
    }

    async fn send_typing(&mut self, is_typing: bool) {
        let frame = OutboundFrame::Typing {
            is_typing,
            user_id: self.settings.local_user_id.clone(),
            match_id: self.settings.session_key.clone(),
        };
        if let Err(err) = self.send_frame(&frame).await {
            log::warn!("Failed to send typing state: {err}");
        }
    }

    async fn send_frame(&mut self, frame: &OutboundFrame) -> Result<(), TransportError> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(TransportError::Closed);
        };
        let text = frame
            .to_json()
            .map_err(|err| TransportError::Other(err.to_string()))?;
        transport.send_text(text).await
    }

    async fn lose_connection(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(err) = transport.close().await {
                log::debug!("Error while closing lost chat socket: {err}");
            }
        }
        self.enter_disconnected().await;
    }

    async fn enter_disconnected(&mut self) {
        self.backlog = None;
        self.typing.reset();
        self.set_status(ConnectionStatus::Disconnected).await;

        let at = Instant::now() + self.settings.reconnect_delay;
        self.reconnect_at = Some((at, self.epoch));
        log::info!(
            "Reconnecting in {}ms",
            self.settings.reconnect_delay.as_millis()
        );
    }

    async fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
        self.status_sender.send_replace(status);
        self.emit(ChatEvent::StatusChanged(status)).await;
    }

    async fn emit(&mut self, event: ChatEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {}
            result = self.event_sender.send(event) => {
                if let Err(err) = result {
                    log::debug!("Chat view is gone, dropping event: {err}");
                }
            }
        }
    }

    async fn teardown(&mut self) {
        self.reconnect_at = None;
        self.connecting = None;
        self.backlog = None;
        self.typing.reset();
        if let Some(mut transport) = self.transport.take() {
            if let Err(err) = transport.close().await {
                log::debug!("Error while closing chat socket: {err}");
            }
        }
        log::info!("Chat session {} closed", self.settings.session_key);
    }
}

/// The view's side of a running chat session. Dropping it tears the session
/// down; [`ChatHandle::shutdown`] does the same and waits for the socket to
/// close.
pub struct ChatHandle {
    command_sender: mpsc::Sender<ChatCommand>,
    status: watch::Receiver<ConnectionStatus>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ChatHandle {
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Sends a message over the socket. Rejected unless connected; nothing
    /// is queued for later delivery.
    pub fn send_message(&self, content: &str) -> Result<(), ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        self.command(ChatCommand::SendMessage(content.to_string()))
    }

    /// Reports a keystroke in the input box (debounced typing state).
    pub fn keystroke(&self) -> Result<(), ChatError> {
        self.command(ChatCommand::Keystroke)
    }

    pub fn set_typing(&self, is_typing: bool) -> Result<(), ChatError> {
        self.command(ChatCommand::SetTyping(is_typing))
    }

    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                log::error!("Chat task ended abnormally: {err}");
            }
        }
    }

    fn command(&self, command: ChatCommand) -> Result<(), ChatError> {
        if self.cancel.is_cancelled() {
            return Err(ChatError::Closed);
        }
        if !self.status().is_connected() {
            return Err(ChatError::NotConnected);
        }
        self.command_sender.try_send(command).map_err(|err| match err {
            mpsc::error::TrySendError::Full(command) => {
                log::warn!("Command queue full, dropping {command:?}");
                ChatError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => ChatError::Closed,
        })
    }
}

impl Drop for ChatHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn keepalive_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Awaits the future in `slot`; pends forever when the slot is empty.
async fn poll_slot<F>(slot: &mut Option<F>) -> F::Output
where
    F: Future + Unpin,
{
    match slot.as_mut() {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

async fn next_frame<T: FrameTransport>(
    transport: &mut Option<T>,
) -> Option<Result<Frame, TransportError>> {
    match transport.as_mut() {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_some(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
