pub mod adapter;
pub mod client;
pub mod codec;
pub mod messages;

pub use adapter::{BrokerAdapter, RequestPacer};
pub use client::{BrokerClient, BrokerEvent};
pub use codec::PayloadType;
