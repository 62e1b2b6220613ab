use std::mem;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::{
    clients::provider::Provider,
    error::DispatchError,
    models::{
        flush_result::FlushResult,
        message::{Handle, Message},
    },
};

struct Registration {
    handle: Handle,
    provider: Box<dyn Provider>,
    pending: Vec<Message>,
}

/// Routes messages to the provider registered under their handle and drives
/// every provider through one delivery cycle per [`flush`](Dispatcher::flush).
#[derive(Default)]
pub struct Dispatcher {
    registrations: Vec<Registration>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `provider` to `handle`. The first registration of a handle wins;
    /// later ones are ignored and return `false`.
    pub fn register(&mut self, handle: impl Into<Handle>, provider: Box<dyn Provider>) -> bool {
        let handle = handle.into();
        if self.registrations.iter().any(|r| r.handle == handle) {
            debug!(handle = %handle, "Handle already registered, keeping first provider");
            return false;
        }

        info!(handle = %handle, provider = provider.name(), "Provider registered");
        self.registrations.push(Registration {
            handle,
            provider,
            pending: Vec::new(),
        });
        true
    }

    /// Queues `message` for its provider, splitting it per recipient when the
    /// provider cannot address several recipients at once. Messages without an
    /// identifier get a random non-zero one.
    pub fn enqueue(&mut self, mut message: Message) -> Result<(), DispatchError> {
        let Some(registration) = self
            .registrations
            .iter_mut()
            .find(|r| &r.handle == message.handle())
        else {
            return Err(DispatchError::UnroutableMessage {
                handle: message.handle().clone(),
                reason: "no provider registered for handle",
            });
        };

        if message.receivers().is_empty() {
            return Err(DispatchError::UnroutableMessage {
                handle: message.handle().clone(),
                reason: "message has no receivers",
            });
        }

        if message.identifier().is_none() {
            message.assign_identifier(rand::random_range(1..=u32::MAX));
        }

        if message.receivers().len() > 1 && !registration.provider.supports_multiple_recipients() {
            let clones = message.split();
            debug!(
                handle = %registration.handle,
                clones = clones.len(),
                "Split multi-recipient message"
            );
            registration.pending.extend(clones);
        } else {
            registration.pending.push(message);
        }

        Ok(())
    }

    /// Number of messages waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.registrations.iter().map(|r| r.pending.len()).sum()
    }

    /// Delivers every queued message and aggregates all providers' results in
    /// registration order.
    ///
    /// Providers run concurrently with each other; each one still sees its own
    /// batch strictly in enqueue order. Batches are cleared whatever the
    /// providers report.
    pub async fn flush(&mut self) -> FlushResult {
        let cycles = self
            .registrations
            .iter_mut()
            .filter(|r| !r.pending.is_empty())
            .map(|registration| {
                let batch = mem::take(&mut registration.pending);
                let handle = registration.handle.clone();
                let provider = registration.provider.as_mut();

                async move {
                    debug!(handle = %handle, messages = batch.len(), "Flushing provider");
                    provider.init();
                    for message in batch {
                        provider.send(message);
                    }
                    let result = provider.finalize().await;
                    if !result.is_clean() {
                        warn!(
                            handle = %handle,
                            failed = result.failed_messages.len(),
                            new_tokens = result.new_token_messages.len(),
                            "Provider reported delivery issues"
                        );
                    }
                    result
                }
            });

        let mut flushed = FlushResult::default();
        for result in join_all(cycles).await {
            flushed.extend(result);
        }

        info!(%flushed, "Flush complete");
        flushed
    }
}
