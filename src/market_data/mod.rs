//! Market-data ingress: wire codec, per-symbol dispatch, synthetic feed.

pub mod feed;
pub mod gateway;
pub mod protocol;
mod tests;

pub use feed::SyntheticFeed;
pub use gateway::{GatewayStats, MarketDataGateway};
pub use protocol::{
    IncrementalUpdate, Message, MessageHeader, MessageType, ParseError, SnapshotLevel,
    SnapshotUpdate,
};
