//! Block production and transaction pooling

pub mod mempool;
pub mod producer;

pub use mempool::{Mempool, MempoolEntry, MempoolError};
pub use producer::{BlockProducer, ResetError, DEFAULT_BLOCK_TIME_STEP, MAX_GENERATE_BLOCKS};
