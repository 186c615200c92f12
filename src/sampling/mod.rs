//! # Channel Throughput Sampling
//!
//! Per-channel events-per-second derived from the newest record's sequence
//! number. Each channel keeps a cursor (the sequence seen on the previous tick);
//! the rate is the cursor delta over the sampling period. A channel whose reads
//! fail is quarantined for the rest of the process lifetime.

pub mod cursor;
pub mod sampler;
pub mod sanitizer;

pub use cursor::{ChannelCursor, ChannelCursorStore};
pub use sampler::{events_per_second, ChannelSample, RateSampler, SampleReport};
pub use sanitizer::sanitize_instance_name;
