//! Topic-based message broker abstraction and an in-process implementation.
//!
//! A consumer is configured with one [`TopicConfig`] per topic: the broker
//! addresses, the topic, the consumer group and a [`Handler`] invoked with
//! the key and value of every delivered message. A handler error rejects
//! the message; what happens to rejected messages is up to the broker.
//!
//! [`ChannelBroker`] delivers over a bounded `tokio::sync::mpsc` channel,
//! dispatching one message at a time in arrival order, and keeps rejected
//! messages as [`DeadLetter`]s.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ServiceError, ServiceResult};

/// Callback run for each delivered message, given its key and value.
pub type Handler = Arc<dyn Fn(Bytes, Bytes) -> BoxFuture<'static, ServiceResult<()>> + Send + Sync>;

/// Subscription of one handler to one topic.
#[derive(Clone)]
pub struct TopicConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub group_id: String,
    pub handler: Handler,
}

impl fmt::Debug for TopicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicConfig")
            .field("brokers", &self.brokers)
            .field("topic", &self.topic)
            .field("group_id", &self.group_id)
            .finish_non_exhaustive()
    }
}

/// Receiving side of a broker.
pub trait BrokerConsumer: Send {
    /// Attach `config.handler` to `config.topic`. A later registration for
    /// the same topic replaces the earlier one.
    fn register_consumer(&mut self, config: TopicConfig);

    /// Deliver messages to registered handlers until `cancel` fires or the
    /// message source ends. The message in flight when `cancel` fires is
    /// finished first.
    fn run(&mut self, cancel: CancellationToken) -> impl Future<Output = ServiceResult<()>> + Send;

    /// Stop accepting messages and release broker resources.
    fn close(&mut self) -> impl Future<Output = ServiceResult<()>> + Send;
}

/// Sending side of a broker.
pub trait BrokerProducer: Send + Sync {
    /// JSON-encode `content` and publish it on `topic` under `key`.
    fn produce_content<T>(
        &self,
        topic: &str,
        key: &str,
        content: &T,
    ) -> impl Future<Output = ServiceResult<()>> + Send
    where
        T: Serialize + Sync;

    /// Release the producer. Consumers see the end of the stream once every
    /// producer is closed.
    fn close(self) -> impl Future<Output = ServiceResult<()>> + Send
    where
        Self: Sized;
}

/// A message in transit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub key: Bytes,
    pub value: Bytes,
}

/// A message its handler rejected, with the rejection reason.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub message: Message,
    pub error: String,
}

/// In-process broker backed by a bounded channel.
pub struct ChannelBroker {
    receiver: mpsc::Receiver<Message>,
    consumers: HashMap<String, TopicConfig>,
    dead_letters: Vec<DeadLetter>,
    delivered: u64,
}

/// Producer half of a [`ChannelBroker`]. Cloneable.
#[derive(Debug, Clone)]
pub struct ChannelProducer {
    sender: mpsc::Sender<Message>,
}

impl ChannelBroker {
    /// Create a broker buffering up to `capacity` messages, and its producer.
    pub fn new(capacity: usize) -> (Self, ChannelProducer) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let broker = Self {
            receiver,
            consumers: HashMap::new(),
            dead_letters: Vec::new(),
            delivered: 0,
        };
        (broker, ChannelProducer { sender })
    }

    /// Messages accepted by their handler so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn dead_letters(&self) -> &[DeadLetter] {
        &self.dead_letters
    }

    pub fn take_dead_letters(&mut self) -> Vec<DeadLetter> {
        std::mem::take(&mut self.dead_letters)
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.consumers.keys().map(String::as_str)
    }

    async fn dispatch(&mut self, message: Message) {
        let Some(config) = self.consumers.get(&message.topic) else {
            warn!(topic = %message.topic, "no consumer registered for topic");
            self.dead_letters.push(DeadLetter {
                error: format!("no consumer registered for topic {}", message.topic),
                message,
            });
            return;
        };

        let handler = Arc::clone(&config.handler);
        match handler(message.key.clone(), message.value.clone()).await {
            Ok(()) => {
                self.delivered += 1;
                debug!(topic = %message.topic, "message handled");
            }
            Err(err) => {
                warn!(topic = %message.topic, error = %err, "message rejected");
                self.dead_letters.push(DeadLetter {
                    message,
                    error: err.to_string(),
                });
            }
        }
    }
}

impl fmt::Debug for ChannelBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelBroker")
            .field("consumers", &self.consumers)
            .field("dead_letters", &self.dead_letters.len())
            .field("delivered", &self.delivered)
            .finish()
    }
}

impl BrokerConsumer for ChannelBroker {
    fn register_consumer(&mut self, config: TopicConfig) {
        info!(
            topic = %config.topic,
            group_id = %config.group_id,
            brokers = %config.brokers.join(","),
            "consumer registered"
        );
        self.consumers.insert(config.topic.clone(), config);
    }

    async fn run(&mut self, cancel: CancellationToken) -> ServiceResult<()> {
        if self.consumers.is_empty() {
            return Err(ServiceError::Broker("no consumer registered".to_string()));
        }

        info!("broker consumer started");
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("broker consumer cancelled");
                    break;
                }
                message = self.receiver.recv() => message,
            };

            match next {
                Some(message) => self.dispatch(message).await,
                None => {
                    info!("all producers closed, broker consumer stopping");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn close(&mut self) -> ServiceResult<()> {
        self.receiver.close();
        let mut dropped = 0usize;
        while self.receiver.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!(dropped, "undelivered messages discarded on close");
        }
        Ok(())
    }
}

impl ChannelProducer {
    /// Publish an already-encoded value.
    pub async fn send_raw(
        &self,
        topic: impl Into<String>,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> ServiceResult<()> {
        let message = Message {
            topic: topic.into(),
            key: key.into(),
            value: value.into(),
        };
        self.sender
            .send(message)
            .await
            .map_err(|_| ServiceError::Broker("broker is closed".to_string()))
    }
}

impl BrokerProducer for ChannelProducer {
    async fn produce_content<T>(&self, topic: &str, key: &str, content: &T) -> ServiceResult<()>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_vec(content)
            .map_err(|e| ServiceError::Broker(format!("encoding message for {topic}: {e}")))?;
        self.send_raw(topic.to_string(), key.to_string(), value).await
    }

    async fn close(self) -> ServiceResult<()> {
        drop(self.sender);
        Ok(())
    }
}
