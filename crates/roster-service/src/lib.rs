//! Application layer of the roster record service.
//!
//! - [`RecordService`] - timeout-bounded, traced facade over an entity store
//! - [`broker`] - topic consumer/producer contracts and the in-process [`ChannelBroker`]
//! - [`CreationConsumer`] - turns creation messages into [`RecordService::create`] calls
//! - [`presentation`] - wire views with string timestamps and public image URLs

pub mod broker;
pub mod error;
pub mod ingestion;
pub mod presentation;
pub mod service;

pub use broker::{
    BrokerConsumer, BrokerProducer, ChannelBroker, ChannelProducer, DeadLetter, Handler, Message,
    TopicConfig,
};
pub use error::{ServiceError, ServiceResult};
pub use ingestion::{CreationConsumer, handle_creation};
pub use presentation::{ObjectStorage, StaffView, SubjectView};
pub use service::RecordService;
