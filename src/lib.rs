//! Rust library for controlling Sony BRAVIA televisions
//!
//! This library provides an async API for discovering and controlling BRAVIA
//! televisions over their network control surface. It supports:
//!
//! - Discovery via SSDP search on the local network
//! - Remote-control commands by name or literal IRCC code
//! - Power, volume, and mute control
//! - Application listing and launching
//! - Content listing and selection
//! - Playback status queries
//!
//! Authorization uses the television's pre-shared key, which is attached to
//! every request. Requests are never retried; every failure is surfaced to
//! the caller with its cause (transport, HTTP status, device error, or
//! malformed body) so callers can decide how to react.
//!
//! # Quick Start
//!
//! ```no_run
//! use bravia_control::{discover, BraviaClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Scan the local network for televisions
//!     let devices = discover(Duration::from_secs(3)).await?;
//!
//!     if let Some(device) = devices.first() {
//!         println!("Found {} at {}", device.friendly_name, device.host);
//!
//!         let tv = BraviaClient::new(&device.host, "0000")?;
//!         println!("Device: {}", tv.get_device_info().await?);
//!
//!         // Remote-control commands accept names or literal IRCC codes
//!         tv.send_commands(["Hdmi1", "VolumeUp"]).await?;
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Direct Connection
//!
//! If you know the IP address of a television, you can skip discovery:
//!
//! ```no_run
//! use bravia_control::{BraviaClient, PlaybackInfo};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tv = BraviaClient::new("192.168.1.42", "0000")?;
//!
//!     match tv.get_playback_info().await? {
//!         PlaybackInfo::Content(info) => println!("Playing: {:?}", info.title),
//!         PlaybackInfo::Unavailable(status) => println!("{}", status),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **Discovery**: one-shot SSDP scan yielding device connection coordinates
//! - **Client**: the public operation surface with per-instance code and
//!   version caches
//! - **Transport**: the two request encodings (legacy SOAP submission for
//!   IRCC codes, structured JSON calls for everything else)
//! - **Protocol**: wire structures, service namespaces, envelope building
//! - **Types**: domain types and data structures

mod client;
mod codes;
mod discovery;
mod error;
mod protocol;
mod transport;
mod types;

// Public exports
pub use client::{BraviaClient, BraviaClientBuilder};
pub use discovery::discover;
pub use error::{BraviaError, Result};
pub use protocol::Service;
pub use types::{
    AppInfo, CommandCode, ContentItem, DiscoveredDevice, InterfaceInformation, PlaybackInfo,
    PlayingContentInfo, VolumeInformation,
};
