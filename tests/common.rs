use std::{
    collections::VecDeque,
    io,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use anyhow::{Error, Result, anyhow};
use futures_util::future::BoxFuture;
use push_dispatch::{
    ErrorKind, FailedMessage, FlushResult, Message, Provider,
    clients::connector::GatewayConnector,
    codec::{ErrorReply, decode_frames},
};
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// A 64 character hex device token made of the byte `n` repeated.
pub fn device_token(n: u8) -> String {
    format!("{:02x}", n).repeat(32)
}

pub fn payload(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[derive(Debug, Default)]
pub struct ProviderLog {
    pub inits: usize,
    pub finalizes: usize,
    pub sent: Vec<Message>,
}

/// Provider that records its lifecycle and optionally fails every message.
pub struct RecordingProvider {
    name: String,
    multiple_recipients: bool,
    fail_with: Option<ErrorKind>,
    batch: Vec<Message>,
    pub log: Arc<Mutex<ProviderLog>>,
}

impl RecordingProvider {
    pub fn new(name: &str, multiple_recipients: bool) -> Self {
        Self {
            name: name.to_string(),
            multiple_recipients,
            fail_with: None,
            batch: Vec::new(),
            log: Arc::new(Mutex::new(ProviderLog::default())),
        }
    }

    pub fn failing(mut self, kind: ErrorKind) -> Self {
        self.fail_with = Some(kind);
        self
    }
}

impl Provider for RecordingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_multiple_recipients(&self) -> bool {
        self.multiple_recipients
    }

    fn init(&mut self) {
        self.log.lock().unwrap().inits += 1;
    }

    fn send(&mut self, message: Message) {
        self.log.lock().unwrap().sent.push(message.clone());
        self.batch.push(message);
    }

    fn finalize(&mut self) -> BoxFuture<'_, FlushResult> {
        Box::pin(async move {
            self.log.lock().unwrap().finalizes += 1;
            let mut result = FlushResult::default();
            for message in std::mem::take(&mut self.batch) {
                if let Some(kind) = self.fail_with {
                    let receivers = message.receivers().to_vec();
                    result
                        .failed_messages
                        .push(FailedMessage::new(kind, receivers, message, &self.name));
                }
            }
            result
        })
    }
}

/// What the scripted gateway does after a session's frames are written.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Error(ErrorReply),
    Close,
    Hang,
}

#[derive(Debug, Default)]
pub struct GatewayState {
    pub replies: VecDeque<Reply>,
    pub sessions: Vec<Vec<u8>>,
    pub refuse_from: Option<usize>,
}

/// In-memory binary gateway handing out one scripted session per connect.
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    pub state: Arc<Mutex<GatewayState>>,
}

impl ScriptedGateway {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        let gateway = Self::default();
        gateway.state.lock().unwrap().replies = replies.into_iter().collect();
        gateway
    }

    pub fn refusing_from(self, session: usize) -> Self {
        self.state.lock().unwrap().refuse_from = Some(session);
        self
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    /// Identifiers of the frames written in each session, in order.
    pub fn identifiers_per_session(&self) -> Result<Vec<Vec<u32>>, Error> {
        let state = self.state.lock().unwrap();
        state
            .sessions
            .iter()
            .map(|bytes| -> Result<Vec<u32>, Error> {
                Ok(decode_frames(bytes)?
                    .into_iter()
                    .map(|frame| frame.identifier)
                    .collect())
            })
            .collect()
    }
}

impl GatewayConnector for ScriptedGateway {
    type Session = ScriptedSession;

    async fn connect(&self) -> Result<ScriptedSession, Error> {
        let mut state = self.state.lock().unwrap();
        let index = state.sessions.len();
        if state.refuse_from.is_some_and(|from| index >= from) {
            return Err(anyhow!("connection refused"));
        }

        let reply = state.replies.pop_front().unwrap_or(Reply::Close);
        state.sessions.push(Vec::new());

        let (bytes, hang) = match reply {
            Reply::Error(reply) => (reply.encode().to_vec(), false),
            Reply::Close => (Vec::new(), false),
            Reply::Hang => (Vec::new(), true),
        };

        Ok(ScriptedSession {
            index,
            state: Arc::clone(&self.state),
            reply: bytes,
            read_pos: 0,
            hang,
        })
    }
}

pub struct ScriptedSession {
    index: usize,
    state: Arc<Mutex<GatewayState>>,
    reply: Vec<u8>,
    read_pos: usize,
    hang: bool,
}

impl AsyncRead for ScriptedSession {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.read_pos < self.reply.len() {
            let n = buf.remaining().min(self.reply.len() - self.read_pos);
            let start = self.read_pos;
            buf.put_slice(&self.reply[start..start + n]);
            self.read_pos += n;
            return Poll::Ready(Ok(()));
        }

        if self.hang {
            Poll::Pending
        } else {
            Poll::Ready(Ok(()))
        }
    }
}

impl AsyncWrite for ScriptedSession {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.state.lock().unwrap().sessions[self.index].extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
