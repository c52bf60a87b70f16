//! Test helpers for integration tests
//!
//! A scripted transport that plays the server side of each connection,
//! in-memory fetch sources, and small waiting utilities.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use sync_core::{
    CredentialProvider, FetchError, FetchResult, Member, MemberQuery, MemberSource, Message,
    MessageQuery, MessageSource, Snowflake, User,
};
use sync_gateway::transport::{BoxedSink, BoxedStream};
use sync_gateway::{FrameSink, FrameStream, InboundFrame, Transport, TransportError};
use tokio::sync::{mpsc, Notify};

/// Upper bound for anything a test waits on
pub const WAIT: Duration = Duration::from_secs(2);

type ToClient = mpsc::UnboundedSender<Result<InboundFrame, TransportError>>;

// ============================================================================
// Scripted transport
// ============================================================================

/// Server side of one accepted connection
pub struct ServerEnd {
    to_client: ToClient,
    from_client: mpsc::UnboundedReceiver<String>,
    client_close: Arc<Mutex<Option<Option<u16>>>>,
}

impl ServerEnd {
    /// Queue a JSON frame for the client
    pub fn push(&self, frame: Value) {
        self.push_raw(&frame.to_string());
    }

    pub fn push_raw(&self, text: &str) {
        let _ = self.to_client.send(Ok(InboundFrame::Text(text.to_string())));
    }

    /// Close the connection from the server side
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.to_client.send(Ok(InboundFrame::Close {
            code: Some(code),
            reason: reason.to_string(),
        }));
    }

    /// Break the connection without a close frame
    pub fn fail(&self, error: &str) {
        let _ = self
            .to_client
            .send(Err(TransportError::Receive(error.to_string())));
    }

    /// Next frame the client sent
    pub async fn next_sent(&mut self) -> Result<Value> {
        let text = tokio::time::timeout(WAIT, self.from_client.recv())
            .await
            .context("timed out waiting for a client frame")?
            .ok_or_else(|| anyhow!("client sink dropped"))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Next client frame with the given op, skipping heartbeats and others
    pub async fn next_sent_op(&mut self, op: u64) -> Result<Value> {
        loop {
            let frame = self.next_sent().await?;
            if frame["op"].as_u64() == Some(op) {
                return Ok(frame);
            }
        }
    }

    /// Close code the client sent, if it closed
    pub fn client_close(&self) -> Option<Option<u16>> {
        *self.client_close.lock()
    }
}

struct ScriptedSink {
    to_server: mpsc::UnboundedSender<String>,
    to_client: ToClient,
    client_close: Arc<Mutex<Option<Option<u16>>>>,
}

#[async_trait]
impl FrameSink for ScriptedSink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.to_server
            .send(text)
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self, code: Option<u16>) -> Result<(), TransportError> {
        *self.client_close.lock() = Some(code);
        // the server answers a close with a close
        let _ = self.to_client.send(Ok(InboundFrame::Close {
            code,
            reason: "closed by client".to_string(),
        }));
        Ok(())
    }
}

struct ScriptedStream {
    from_server: mpsc::UnboundedReceiver<Result<InboundFrame, TransportError>>,
}

#[async_trait]
impl FrameStream for ScriptedStream {
    async fn next_frame(&mut self) -> Option<Result<InboundFrame, TransportError>> {
        self.from_server.recv().await
    }
}

enum Script {
    Refuse,
    Accept(ScriptedSink, ScriptedStream),
}

/// Transport whose connections are scripted in order.
/// A connect with no script left is refused.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    connects: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Next connect attempt fails
    pub fn refuse(&self) {
        self.scripts.lock().push_back(Script::Refuse);
    }

    /// Next connect attempt succeeds; frames pushed to the returned end are
    /// delivered once the client reads
    pub fn accept(&self) -> ServerEnd {
        let (to_client, from_server) = mpsc::unbounded_channel();
        let (to_server, from_client) = mpsc::unbounded_channel();
        let client_close = Arc::new(Mutex::new(None));

        let sink = ScriptedSink {
            to_server,
            to_client: to_client.clone(),
            client_close: client_close.clone(),
        };
        let stream = ScriptedStream { from_server };
        self.scripts.lock().push_back(Script::Accept(sink, stream));

        ServerEnd {
            to_client,
            from_client,
            client_close,
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, _url: &str) -> Result<(BoxedSink, BoxedStream), TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.scripts.lock().pop_front() {
            Some(Script::Accept(sink, stream)) => Ok((Box::new(sink), Box::new(stream))),
            Some(Script::Refuse) | None => Err(TransportError::Connect("refused".to_string())),
        }
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Fixed token that records when it is discarded
pub struct StaticCredentials {
    token: Mutex<Option<String>>,
    discards: AtomicUsize,
}

impl StaticCredentials {
    pub fn new(token: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            token: Mutex::new(token.map(str::to_string)),
            discards: AtomicUsize::new(0),
        })
    }

    pub fn current(&self) -> Option<String> {
        self.token.lock().clone()
    }

    pub fn discards(&self) -> usize {
        self.discards.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn token(&self) -> Option<String> {
        self.current()
    }

    async fn discard(&self) {
        self.discards.fetch_add(1, Ordering::SeqCst);
        self.token.lock().take();
    }
}

// ============================================================================
// Fetch sources
// ============================================================================

/// Message history per conversation, served newest-first like the server.
///
/// Fetches for older pages can be held on a gate to simulate slow requests.
#[derive(Default)]
pub struct InMemoryMessages {
    history: Mutex<HashMap<Snowflake, Vec<Message>>>,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    acks: Mutex<Vec<(Snowflake, Snowflake)>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl InMemoryMessages {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Give `conversation` `count` messages cycling through `authors` senders.
    /// Message `i` (1-based) has id [`message_id`]`(conversation, i)`.
    pub fn seed(&self, conversation: Snowflake, count: i64, authors: i64) {
        let messages = (1..=count)
            .map(|i| {
                let author = User::new(author_id(i % authors.max(1)), "author");
                Message::new(message_id(conversation, i), conversation, author, format!("message {i}"))
            })
            .collect();
        self.history.lock().insert(conversation, messages);
    }

    /// Hold every older-page fetch until the returned gate is notified
    pub fn hold_older_pages(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn acks(&self) -> Vec<(Snowflake, Snowflake)> {
        self.acks.lock().clone()
    }
}

#[async_trait]
impl MessageSource for InMemoryMessages {
    async fn fetch_messages(
        &self,
        conversation_id: Snowflake,
        query: MessageQuery,
    ) -> FetchResult<Vec<Message>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let gate = query.before.and_then(|_| self.gate.lock().clone());
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let history = self.history.lock();
        let all = history
            .get(&conversation_id)
            .ok_or(FetchError::ConversationNotFound(conversation_id))?;
        let mut page: Vec<Message> = match (query.before, query.after) {
            (Some(before), _) => {
                let older: Vec<&Message> = all.iter().filter(|m| m.id < before).collect();
                older[older.len().saturating_sub(query.limit)..]
                    .iter()
                    .map(|m| (*m).clone())
                    .collect()
            }
            (None, Some(after)) => all
                .iter()
                .filter(|m| m.id > after)
                .take(query.limit)
                .cloned()
                .collect(),
            (None, None) => all[all.len().saturating_sub(query.limit)..].to_vec(),
        };
        page.reverse();
        Ok(page)
    }

    async fn acknowledge(&self, conversation_id: Snowflake, message_id: Snowflake) -> FetchResult<()> {
        self.acks.lock().push((conversation_id, message_id));
        Ok(())
    }
}

/// Fixed member list, paged by user id
#[derive(Default)]
pub struct InMemoryMembers {
    members: Vec<Member>,
}

impl InMemoryMembers {
    pub fn new(members: Vec<Member>) -> Arc<Self> {
        Arc::new(Self { members })
    }
}

#[async_trait]
impl MemberSource for InMemoryMembers {
    async fn fetch_members(&self, _room_id: Snowflake, query: MemberQuery) -> FetchResult<Vec<Member>> {
        Ok(self
            .members
            .iter()
            .filter(|m| query.after.map_or(true, |after| m.id() > after))
            .take(query.limit)
            .cloned()
            .collect())
    }
}

/// Id of message `i` of a seeded conversation
pub fn message_id(conversation: Snowflake, i: i64) -> Snowflake {
    Snowflake::new(conversation.into_inner() * 10_000 + i)
}

/// Id of seeded author `n`
pub fn author_id(n: i64) -> Snowflake {
    Snowflake::new(500 + n)
}

// ============================================================================
// Waiting
// ============================================================================

/// Poll `condition` until it holds or [`WAIT`] elapses
pub async fn wait_until<F>(condition: F) -> bool
where
    F: Fn() -> bool,
{
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

/// Next item from an event channel, or an error after [`WAIT`]
pub async fn next_event<E>(rx: &mut mpsc::UnboundedReceiver<E>) -> Result<E> {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .context("timed out waiting for an event")?
        .ok_or_else(|| anyhow!("event channel closed"))
}
