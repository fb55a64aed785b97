//! # stream-playback
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Realtime-safe playback sink for pull-style audio pipelines.
//!
//! `stream-playback` bridges a pipeline that produces fixed-size buffers at
//! its own pace to a hardware output stream whose callback runs on a
//! deadline-bound driver thread. The pipeline's `write` blocks to apply
//! backpressure; the hardware callback never blocks, never allocates, and
//! plays silence when the pipeline is late.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stream_playback::{devices, DeviceSink, SignalBuffer, SignalProperties, Sink, SinkAllocator};
//!
//! // Pick a device from the listing, or use DeviceDescriptor::default_output()
//! let speakers = devices()?.output.remove(0);
//!
//! let mut sink = DeviceSink::cpal(speakers)
//!     .on_event(|e| tracing::warn!(?e, "playback event"))
//!     .allocate(512, SignalProperties::new(2, 44100))?;
//!
//! for buffer in pipeline_output {
//!     sink.write(&buffer)?;   // blocks while the previous buffer is queued
//! }
//! sink.flush()?;              // stop → close → terminate, all failures composed
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **Pipeline thread**: converts each buffer into a pooled device buffer and
//!   hands it over through a single-slot exchange, waiting while it is occupied
//! - **Handoff slot + buffer pool**: lock-free SPSC rings; buffers are moved,
//!   never copied or freed on the audio thread
//! - **Audio thread**: takes the next buffer if there is one, otherwise pads
//!   with silence and counts an underrun
//!
//! Device identity is a value ([`DeviceDescriptor`]) resolved to a live handle
//! each time a stream opens, and the native subsystem's global
//! initialize/terminate pair is reference counted by one [`Subsystem`] owner.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

pub mod backend;
pub mod bridge;
mod config;
mod device;
mod error;
mod event;
pub mod format;
mod lifecycle;
mod signal;
pub mod sink;

pub use backend::{
    AudioBackend, CallbackInfo, MockBackend, MockOperation, MockStreamController,
};
#[cfg(feature = "cpal-backend")]
pub use backend::CpalBackend;
pub use bridge::SinkStats;
pub use config::{LatencyPreference, SinkOptions, StreamConfig, MIN_POOL_BUFFERS};
pub use device::{DeviceDescriptor, DeviceList, DeviceRegistry, ResolvedDevice};
#[cfg(feature = "cpal-backend")]
pub use device::{default_output_device, devices};
pub use error::{BackendError, PlaybackError};
pub use event::{event_callback, EventCallback, PlaybackEvent};
pub use lifecycle::{StreamLifecycle, StreamState, Subsystem};
pub use signal::{SignalBuffer, SignalProperties};
pub use sink::{DeviceSink, PlaybackSink, Sink, SinkAllocator};
