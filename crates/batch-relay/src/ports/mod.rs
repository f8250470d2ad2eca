//! # Ports Layer (Middle Hexagon)
//!
//! Trait definitions for the relay engine; the interfaces between the domain
//! and the outside world.
//!
//! - **Driving Ports (Inbound)**: [`inbound::RelayApi`]
//! - **Driven Ports (Outbound)**: [`outbound::RegistryGateway`],
//!   [`outbound::CallDispatcher`], [`outbound::WorldJournal`]
//!
//! No concrete implementations in this module.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
