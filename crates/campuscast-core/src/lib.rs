//! CampusCast Core - Adaptive HLS Playback Controller
//!
//! This crate provides the playback core of the CampusCast player:
//! - Stream source resolution against the content backend
//! - Engine adaptation (native HLS or a software engine) with error classification
//! - Manual/automatic quality switching without interrupting playback
//! - Transport controls, click/keyboard/fullscreen coordination
//! - Periodic bandwidth and buffer telemetry
//! - An imperative handle and a view model for the control surface
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        CampusCast Core                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐        ┌──────────────┐                       │
//! │  │    Source    │───────►│    Engine    │◄──── RawEngineEvent   │
//! │  │   Resolver   │        │   Adapter    │                       │
//! │  └──────────────┘        └──────┬───────┘                       │
//! │                                 │ EngineEvent                   │
//! │                          ┌──────┴───────┐  ┌──────────────┐     │
//! │                          │   Quality    │  │    Stats     │     │
//! │                          │   Control    │  │   Sampler    │     │
//! │                          └──────┬───────┘  └──────┬───────┘     │
//! │                                 │                 │             │
//! │  ┌──────────────┐        ┌──────┴───────┐         │             │
//! │  │    Input     │───────►│  HlsPlayer   │◄────────┘             │
//! │  │ Coordinator  │        │  (handle)    │────► PlayerView       │
//! │  └──────┬───────┘        └──────┬───────┘────► PlayerObserver   │
//! │         │                       │                               │
//! │         └──────►  Transport  ◄──┘                               │
//! │                      │                                          │
//! │                 MediaElement                                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod media;
pub mod player;
pub mod quality;
pub mod sim;
pub mod source;
pub mod stats;
pub mod task;
pub mod transport;
pub mod types;
pub mod view;

pub use config::{EngineConfig, InputTimings, PlayerOptions, Preload, SwitchTuning};
pub use engine::{
    EngineAdapter, EngineErrorData, EngineErrorDetails, EngineErrorType, EngineEvent, EngineFactory,
    EngineLevel, HlsEngine, RawEngineEvent,
};
pub use error::{Error, PlaybackErrorKind, Result};
pub use input::{ClickTarget, Focus, FullscreenHost, InputAction, InputCoordinator, Key};
pub use media::{MediaElement, MediaEvent};
pub use player::{HlsPlayer, PlayerObserver};
pub use quality::{QualityController, SwitchOutcome};
pub use source::{HttpSourceResolver, ResolvedSource, SourceResolver, TranscodeStatus};
pub use stats::StatsSampler;
pub use transport::Transport;
pub use types::*;
pub use view::{PlayerView, QualityMenu};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "CampusCast Core initialized");
}
