use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{events::ChangeEvent, handler::ChangeHandler};

/// Forwards one store change feed to a handler until shutdown
pub struct FeedSubscription<T> {
    feed_name: &'static str,
    receiver: mpsc::UnboundedReceiver<T>,
    handler: Arc<dyn ChangeHandler>,
    shutdown: watch::Receiver<bool>,
}

impl<T> FeedSubscription<T>
where
    T: Into<ChangeEvent> + Send + 'static,
{
    pub fn new(
        feed_name: &'static str,
        receiver: mpsc::UnboundedReceiver<T>,
        handler: Arc<dyn ChangeHandler>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            feed_name,
            receiver,
            handler,
            shutdown,
        }
    }

    /// Start the subscription - spawns a background task that drains the feed
    /// and routes every delivery to the handler
    pub fn start(self) -> JoinHandle<()> {
        let Self {
            feed_name,
            mut receiver,
            handler,
            mut shutdown,
        } = self;
        let handler_name = handler.handler_name();

        info!(
            feed = feed_name,
            handler = handler_name,
            "Starting feed subscription"
        );

        tokio::spawn(async move {
            while !*shutdown.borrow() {
                tokio::select! {
                    biased;

                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    delivery = receiver.recv() => {
                        let Some(delivery) = delivery else {
                            warn!(feed = feed_name, "Change feed closed by the store");
                            break;
                        };

                        let event: ChangeEvent = delivery.into();
                        debug!(
                            feed = feed_name,
                            handler = handler_name,
                            event_type = event.event_type(),
                            run_id = event.run_id().unwrap_or("-"),
                            "Received change event"
                        );

                        if let Err(e) = handler.handle_change(event).await {
                            warn!(
                                feed = feed_name,
                                handler = handler_name,
                                error = %e,
                                "Change handler failed"
                            );
                        }
                    }
                }
            }

            info!(
                feed = feed_name,
                handler = handler_name,
                "Feed subscription stopped"
            );
        })
    }
}
