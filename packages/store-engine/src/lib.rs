//! The keyed asynchronous state-orchestration engine shared by every
//! feature slice of the client store.
//!
//! A slice owns its state inside a [`SliceCell`]. Input changes recompute a
//! composite [`ActiveKey`] and commit optimistically; async results carry
//! the key they were issued under and are only committed while that key is
//! still current. Per-key result maps are [`BoundedCache`]s that collapse
//! past a configurable threshold, and mutating on-chain actions run through
//! the [`StepRunner`] approval/action pipeline.

pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod pipeline;
pub mod slice;
pub mod status;

pub use cache::BoundedCache;
pub use config::EngineConfig;
pub use error::StepError;
pub use key::ActiveKey;
pub use pipeline::{is_current, CompleteMode, StepGate, StepOutcome, StepRunner};
pub use slice::{Commit, FormState, HasStatus, Keyed, SliceCell, SliceState};
pub use status::{FormStatus, Step};
