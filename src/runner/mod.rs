//! Contract runner
//!
//! The operations a client drives the local node with:
//!
//! - [`codec`]: typed argument values to contract bytes and back
//! - [`builder`]: deploy, call and terminate transactions, committed
//!   through the pool
//! - [`estimate`]: dry runs against a disposable state view
//! - [`reader`]: storage reads, readonly calls, map scans, stakes, events
//!   and receipts
//!
//! Everything hangs off [`Runner`], which owns the chain, the default
//! signer with the local keys, and the block producer.

pub mod builder;
pub mod codec;
pub mod context;
pub mod error;
pub mod estimate;
pub mod reader;

pub use builder::{
    BuildMode, BuiltTransaction, CallRequest, DeployRequest, TerminateRequest, DEFAULT_MAX_FEE,
};
pub use codec::{
    build_argument_vector, decode, encode, DecodedValue, Format, FormatError, TypedValue,
    MAX_ARGUMENT_POSITION,
};
pub use context::{HeadInfo, Runner, RunnerContext};
pub use error::{RunnerError, RunnerResult};
pub use reader::{IterateMapRequest, MapItem, MapPage, ReadonlyCallRequest, StakeInfo};
