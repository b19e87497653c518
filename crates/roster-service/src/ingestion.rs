use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use roster_core::constants::{DEFAULT_BROKER_ADDRESS, DEFAULT_CONSUMER_GROUP, SUBJECT_CREATE_TOPIC};
use roster_storage::{EntityStore, Record};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span};

use crate::broker::{BrokerConsumer, Handler, TopicConfig};
use crate::error::ServiceResult;
use crate::service::RecordService;

/// Bridges a creation topic to [`RecordService::create`].
///
/// Each message value is decoded as one JSON record. A value that does not
/// decode is rejected without touching the store; a store failure (such as a
/// duplicate id on redelivery) rejects the message with that error. Nothing
/// is retried here.
pub struct CreationConsumer<S> {
    service: Arc<RecordService<S>>,
    brokers: Vec<String>,
    topic: String,
    group_id: String,
}

impl<S> CreationConsumer<S>
where
    S: EntityStore + 'static,
    S::Record: DeserializeOwned,
{
    /// Consumer on the subject creation topic with default broker settings.
    pub fn new(service: Arc<RecordService<S>>) -> Self {
        Self {
            service,
            brokers: vec![DEFAULT_BROKER_ADDRESS.to_string()],
            topic: SUBJECT_CREATE_TOPIC.to_string(),
            group_id: DEFAULT_CONSUMER_GROUP.to_string(),
        }
    }

    pub fn brokers(mut self, brokers: Vec<String>) -> Self {
        self.brokers = brokers;
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    pub fn topic_name(&self) -> &str {
        &self.topic
    }

    /// Subscription that feeds decoded records into the service.
    pub fn topic_config(&self) -> TopicConfig {
        let service = Arc::clone(&self.service);
        let topic = self.topic.clone();

        let handler: Handler = Arc::new(move |_key: Bytes, value: Bytes| {
            let service = Arc::clone(&service);
            let span = info_span!("ingest", topic = %topic);
            async move { handle_creation(&service, &value).await.map(|_| ()) }
                .instrument(span)
                .boxed()
        });

        TopicConfig {
            brokers: self.brokers.clone(),
            topic: self.topic.clone(),
            group_id: self.group_id.clone(),
            handler,
        }
    }

    pub fn subscribe<B: BrokerConsumer>(&self, broker: &mut B) {
        broker.register_consumer(self.topic_config());
    }

    /// Subscribe and consume until `cancel` fires or the broker runs dry.
    pub async fn run<B: BrokerConsumer>(
        &self,
        broker: &mut B,
        cancel: CancellationToken,
    ) -> ServiceResult<()> {
        self.subscribe(broker);
        info!(topic = %self.topic, group_id = %self.group_id, "creation consumer running");
        broker.run(cancel).await
    }
}

/// Decode one message value and create the record it carries. Returns the id.
pub async fn handle_creation<S>(service: &RecordService<S>, value: &[u8]) -> ServiceResult<String>
where
    S: EntityStore,
    S::Record: DeserializeOwned,
{
    let record: S::Record = serde_json::from_slice(value)?;
    let id = service.create(record).await?;
    info!(kind = <S::Record as Record>::KIND, %id, "record ingested");
    Ok(id)
}
