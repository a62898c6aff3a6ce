//! Core primitives: value types, lock-free queues, object pool, history
//! ring and the engine clock.

pub mod clock;
pub mod pool;
pub mod queue;
pub mod ring;
pub mod types;

pub use clock::{Clock, ClockError};
pub use pool::{ObjectPool, PoolRef};
pub use queue::{MpmcQueue, MpscQueue, PriorityQueue, PushError, SpscQueue, NUM_PRIORITIES};
pub use ring::HistoryBuffer;
