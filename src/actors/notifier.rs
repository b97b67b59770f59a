//! NotifierActor - delivers transition events to owners
//!
//! Events arrive on an unbounded channel fed by the scheduler's ticks, so
//! a slow messaging API only ever delays other notifications, never a
//! probe.
//!
//! ## Message Flow
//!
//! ```text
//! tick ──► TransitionNotifier ──► [unbounded] ──► NotifierActor
//!                                                     │
//!                                   owner chat lookup (store)
//!                                                     │
//!                                     NotificationSink::deliver
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, warn};

use crate::notify::NotificationSink;
use crate::storage::StorageBackend;
use crate::transition::{TransitionEvent, TransitionNotifier};

use super::messages::{NotifierCommand, NotifierStats};

/// Actor that resolves owner chats and calls the sink
pub struct NotifierActor {
    store: Arc<dyn StorageBackend>,
    sink: Arc<dyn NotificationSink>,
    command_rx: mpsc::Receiver<NotifierCommand>,
    event_rx: mpsc::UnboundedReceiver<TransitionEvent>,
    stats: NotifierStats,
}

impl NotifierActor {
    pub fn new(
        store: Arc<dyn StorageBackend>,
        sink: Arc<dyn NotificationSink>,
        command_rx: mpsc::Receiver<NotifierCommand>,
        event_rx: mpsc::UnboundedReceiver<TransitionEvent>,
    ) -> Self {
        Self {
            store,
            sink,
            command_rx,
            event_rx,
            stats: NotifierStats::default(),
        }
    }

    /// Run the actor's main loop
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting notifier actor");

        loop {
            tokio::select! {
                Some(event) = self.event_rx.recv() => self.handle_event(event).await,

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        NotifierCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.stats);
                        }

                        NotifierCommand::Shutdown { respond_to } => {
                            debug!("received shutdown command, draining queued events");
                            while let Ok(event) = self.event_rx.try_recv() {
                                self.handle_event(event).await;
                            }
                            let _ = respond_to.send(());
                            break;
                        }
                    }
                }

                else => {
                    warn!("notifier channels closed, shutting down");
                    break;
                }
            }
        }

        debug!("notifier actor stopped");
    }

    #[instrument(skip(self, event), fields(target_id = event.target_id))]
    async fn handle_event(&mut self, event: TransitionEvent) {
        let chat_id = match self.store.owner_chat(event.owner_id).await {
            Ok(Some(chat_id)) => chat_id,
            Ok(None) => {
                warn!("owner {} has no registered chat, dropping notification", event.owner_id);
                self.stats.skipped += 1;
                return;
            }
            Err(e) => {
                warn!("failed to look up chat of owner {}: {e}", event.owner_id);
                self.stats.failed += 1;
                return;
            }
        };

        match self.sink.deliver(chat_id, &event).await {
            Ok(()) => self.stats.delivered += 1,
            Err(e) => {
                warn!("failed to deliver notification for {}: {e:#}", event.url);
                self.stats.failed += 1;
            }
        }
    }
}

/// Handle for controlling the NotifierActor
#[derive(Clone)]
pub struct NotifierHandle {
    sender: mpsc::Sender<NotifierCommand>,
    events: mpsc::UnboundedSender<TransitionEvent>,
}

impl NotifierHandle {
    /// Spawn a new notifier actor
    pub fn spawn(store: Arc<dyn StorageBackend>, sink: Arc<dyn NotificationSink>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(NotifierActor::new(store, sink, cmd_rx, event_rx).run());

        Self {
            sender: cmd_tx,
            events: event_tx,
        }
    }

    /// Emitter feeding this actor, to be handed to the scheduler
    pub fn transition_notifier(&self) -> TransitionNotifier {
        TransitionNotifier::new(self.events.clone())
    }

    pub async fn stats(&self) -> Option<NotifierStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(NotifierCommand::GetStats { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Deliver queued events and stop the actor
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(NotifierCommand::Shutdown { respond_to: tx })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}
