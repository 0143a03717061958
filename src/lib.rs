// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client
//
//! # bosch-mode2
//!
//! Client engine for Bosch intrusion panels (B/G series, Solution, AMAX)
//! speaking the Mode 2 automation protocol over TLS.
//!
//! The [`Controller`] opens the session, negotiates capabilities, discovers
//! areas, points and outputs, then keeps its tables current either from
//! pushed notifications or by polling. Changes are published as
//! [`PanelEvent`]s on a broadcast channel.
//!
//! ## Quick Start
//!
//! ```no_run
//! use bosch_mode2::{ArmingType, Controller, PanelConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PanelConfig::builder()
//!         .host("192.168.1.20")
//!         .passcode("0123456789")
//!         .build();
//!
//!     let controller = Controller::new(config);
//!     let mut events = controller.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     controller.connect().await?;
//!     controller.begin_operation().await?;
//!     controller.arm_areas(&[1], ArmingType::MasterDelayArm).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     controller.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod capabilities;
pub mod comm;
pub mod config;
pub mod constants;
pub mod devices;
pub mod error;
pub mod event;
pub mod notification;
pub mod panel;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod version;

// Re-exports for convenience
pub use capabilities::{Capabilities, Feature, FeatureMask, PanelType};
pub use config::{ArmingType, PanelConfig, PanelConfigBuilder, UserType};
pub use devices::{AlarmCategory, AlarmLevel, Area, AreaStatus, Output, Point, PointStatus};
pub use error::{ErrorKind, NackReason, PanelError, Result};
pub use event::{EventReceiver, PanelEvent};
pub use panel::Controller;
pub use session::Capacities;
pub use version::{FirmwareVersion, ProtocolVersion};
