use std::{mem, time::Duration};

use anyhow::{Error, Result};
use bytes::{Bytes, BytesMut};
use futures_util::future::BoxFuture;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, ErrorKind as IoErrorKind},
    time::timeout,
};
use tracing::{debug, error, info, warn};

use crate::{
    clients::{connector::GatewayConnector, provider::Provider},
    codec::{ERROR_REPLY_COMMAND, ERROR_REPLY_LEN, ErrorReply, encode_frame},
    error::CodecError,
    models::{
        flush_result::{FailedMessage, FlushResult},
        message::Message,
        status::ErrorKind,
    },
};

struct PendingFrame {
    message: Message,
    frame: Bytes,
}

/// Provider for the legacy binary gateway.
///
/// `send` only encodes and buffers frames. `finalize` streams the whole batch
/// over one session and recovers from the single error reply the gateway may
/// send before closing the connection:
///
/// 1. open a session and write every pending frame;
/// 2. wait up to `reply_timeout` for an error reply (none means delivered);
/// 3. on a reply, report the named message and keep only the messages queued
///    after it. Messages before it are assumed accepted and are neither
///    reported nor resent;
/// 4. close the session and repeat while anything is pending.
pub struct LegacyApnsProvider<C> {
    connector: C,
    reply_timeout: Duration,
    pending: Vec<PendingFrame>,
    rejected: Vec<FailedMessage>,
}

impl<C: GatewayConnector> LegacyApnsProvider<C> {
    pub const NAME: &'static str = "apns-legacy";

    pub fn new(connector: C, reply_timeout: Duration) -> Self {
        Self {
            connector,
            reply_timeout,
            pending: Vec::new(),
            rejected: Vec::new(),
        }
    }

    fn is_pending(&self, identifier: u32) -> bool {
        self.pending
            .iter()
            .any(|p| p.message.identifier() == Some(identifier))
    }

    fn unused_identifier(&self) -> u32 {
        loop {
            let candidate = rand::random_range(1..=u32::MAX);
            if !self.is_pending(candidate) {
                return candidate;
            }
        }
    }

    async fn deliver(&mut self) -> Result<FlushResult, Error> {
        let mut result = FlushResult::default();
        let mut attempt = 0u32;

        while !self.pending.is_empty() {
            attempt += 1;
            let mut session = self.connector.connect().await?;
            debug!(
                attempt,
                pending = self.pending.len(),
                "Binary gateway session opened"
            );

            let reply = self.exchange(&mut session).await;

            if let Err(e) = session.shutdown().await {
                debug!(error = %e, "Binary gateway session did not shut down cleanly");
            }
            drop(session);

            let Some(reply) = reply else {
                info!(
                    attempt,
                    delivered = self.pending.len(),
                    "No error reply from gateway, batch presumed delivered"
                );
                self.pending.clear();
                break;
            };

            let kind = ErrorKind::from_legacy_status(reply.status);
            match self
                .pending
                .iter()
                .position(|p| p.message.identifier() == Some(reply.identifier))
            {
                Some(index) => {
                    let remaining = self.pending.split_off(index + 1);
                    let skipped = index;
                    if let Some(failed) = self.pending.pop() {
                        warn!(
                            identifier = reply.identifier,
                            status = reply.status,
                            kind = %kind,
                            skipped,
                            remaining = remaining.len(),
                            "Gateway rejected message"
                        );
                        let receivers = failed.message.receivers().to_vec();
                        result.failed_messages.push(FailedMessage::new(
                            kind,
                            receivers,
                            failed.message,
                            Self::NAME,
                        ));
                    }
                    self.pending = remaining;
                }
                None => {
                    warn!(
                        identifier = reply.identifier,
                        status = reply.status,
                        discarded = self.pending.len(),
                        "Error reply names no pending message, discarding batch"
                    );
                    self.pending.clear();
                }
            }
        }

        Ok(result)
    }

    async fn exchange(&self, session: &mut C::Session) -> Option<ErrorReply> {
        let mut stream = BytesMut::new();
        for pending in &self.pending {
            stream.extend_from_slice(&pending.frame);
        }

        if let Err(e) = session.write_all(&stream).await {
            warn!(error = %e, "Write to binary gateway failed, awaiting error reply");
        } else if let Err(e) = session.flush().await {
            warn!(error = %e, "Flush to binary gateway failed, awaiting error reply");
        }

        let mut reply = [0u8; ERROR_REPLY_LEN];
        match timeout(self.reply_timeout, session.read_exact(&mut reply)).await {
            Ok(Ok(_)) => {
                let reply = ErrorReply::decode(reply);
                if reply.command == ERROR_REPLY_COMMAND {
                    Some(reply)
                } else {
                    warn!(
                        command = reply.command,
                        status = reply.status,
                        identifier = reply.identifier,
                        "Unrecognized reply from binary gateway, treating as no reply"
                    );
                    None
                }
            }
            Ok(Err(e)) if e.kind() == IoErrorKind::UnexpectedEof => {
                debug!("Binary gateway closed the session without an error reply");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to read binary gateway reply");
                None
            }
            Err(_) => None,
        }
    }
}

fn kind_for(error: &CodecError) -> ErrorKind {
    match error {
        CodecError::InvalidTokenLength { .. } | CodecError::InvalidTokenCharacter(_) => {
            ErrorKind::InvalidTokenSize
        }
        CodecError::PayloadTooLarge(_) => ErrorKind::PayloadTooLarge,
        CodecError::MalformedFrame(_) | CodecError::Serialize(_) => ErrorKind::Processing,
    }
}

impl<C: GatewayConnector> Provider for LegacyApnsProvider<C> {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn init(&mut self) {
        self.pending.clear();
        self.rejected.clear();
    }

    fn send(&mut self, mut message: Message) {
        let identifier = match message.identifier() {
            Some(id) if !self.is_pending(id) => id,
            _ => self.unused_identifier(),
        };
        message.assign_identifier(identifier);

        let Some(token) = message.receivers().first().cloned() else {
            warn!(identifier, "Message has no receiver, rejecting");
            self.rejected.push(FailedMessage::new(
                ErrorKind::MissingDeviceToken,
                Vec::new(),
                message,
                Self::NAME,
            ));
            return;
        };

        match encode_frame(&message, &token, chrono::Utc::now().timestamp()) {
            Ok(frame) => self.pending.push(PendingFrame { message, frame }),
            Err(e) => {
                warn!(identifier, error = %e, "Message cannot be encoded, rejecting");
                self.rejected.push(FailedMessage::new(
                    kind_for(&e),
                    vec![token],
                    message,
                    Self::NAME,
                ));
            }
        }
    }

    fn finalize(&mut self) -> BoxFuture<'_, FlushResult> {
        Box::pin(async move {
            let mut result = FlushResult {
                failed_messages: mem::take(&mut self.rejected),
                new_token_messages: Vec::new(),
            };

            match self.deliver().await {
                Ok(delivered) => result.extend(delivered),
                Err(e) => {
                    error!(
                        error = %e,
                        abandoned = self.pending.len(),
                        "Binary gateway session setup failed, aborting flush"
                    );
                }
            }

            self.pending.clear();
            result
        })
    }
}
