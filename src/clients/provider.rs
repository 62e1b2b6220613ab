use futures_util::future::BoxFuture;

use crate::models::{flush_result::FlushResult, message::Message};

/// A delivery engine bound to one gateway and one credential set.
///
/// The dispatcher drives every provider through the same lifecycle on each
/// flush: [`init`](Provider::init), one [`send`](Provider::send) per queued
/// message, then [`finalize`](Provider::finalize). Providers may batch in
/// `send` and transmit in `finalize`. The per-flush batch must be empty again
/// once `finalize` resolves.
pub trait Provider: Send {
    /// Name reported as the originating provider of failures.
    fn name(&self) -> &str;

    /// Whether one message may address several recipients at once.
    fn supports_multiple_recipients(&self) -> bool {
        false
    }

    fn init(&mut self) {}

    fn send(&mut self, message: Message);

    /// Transmits whatever is pending and reports per-message failures and
    /// token rotations. Delivery errors never escape as `Err`.
    fn finalize(&mut self) -> BoxFuture<'_, FlushResult>;
}
