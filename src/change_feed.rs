use std::{
    thread,
    sync::{Arc, Mutex, RwLock, PoisonError, mpsc},
    sync::atomic::{AtomicU64, Ordering},
};

use crate::backend::{
    ChangeCallback, ChangeEvent, ChangeFeed, EventMask, SubscriptionId,
};
use crate::error::{Error, Result};


struct Subscriber {
    id: SubscriptionId,
    table: String,
    mask: EventMask,
    callback: ChangeCallback,
}

impl Subscriber {
    fn wants(&self, event: &ChangeEvent) -> bool {
        self.table == event.table && self.mask.matches(event.kind)
    }
}


/// In-process change feed. Published events are delivered to subscribers on
/// a dedicated dispatcher thread, so publishers never run callbacks.
pub struct LocalFeed {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
    next_id: AtomicU64,
    sender: Mutex<Option<mpsc::Sender<ChangeEvent>>>,
}

impl LocalFeed {
    pub fn start() -> Arc<Self> {
        let subscribers = Arc::new(RwLock::new(Vec::<Subscriber>::new()));
        let (sender, receiver) = mpsc::channel::<ChangeEvent>();

        let t_subscribers = subscribers.clone();
        let spawned = thread::Builder::new()
            .name("change-feed".into())
            .spawn(move || {
                for event in receiver {
                    let subscribers = t_subscribers.read()
                        .unwrap_or_else(PoisonError::into_inner);

                    for sub in subscribers.iter().filter(|s| s.wants(&event)) {
                        (sub.callback)(&event);
                    }
                }

                info!("Change feed closed");
            });

        let sender = match spawned {
            Ok(_) => Some(sender),
            Err(err) => {
                error!("Fail to start change feed dispatcher: {}", err);
                None
            },
        };

        Arc::new(LocalFeed {
            subscribers,
            next_id: AtomicU64::new(1),
            sender: Mutex::new(sender),
        })
    }

    pub fn publish(&self, event: ChangeEvent) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);

        let delivered = sender.as_ref()
            .map(|tx| tx.send(event).is_ok())
            .unwrap_or(false);
        if !delivered {
            warn!("Change feed is not running; event dropped");
        }
    }

    /// Stops the dispatcher after it drains queued events.
    pub fn close(&self) {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl ChangeFeed for LocalFeed {
    fn subscribe(&self, table: &str, mask: EventMask, callback: ChangeCallback)
        -> Result<SubscriptionId> {

        if self.sender.lock().unwrap_or_else(PoisonError::into_inner).is_none() {
            return Err(Error::remote("Change feed is not running"));
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers.write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                id,
                table: table.to_owned(),
                mask,
                callback,
            });

        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|s| s.id != id);
    }
}
