//! # Adapters Layer (Outer Hexagon)
//!
//! Concrete implementations of the outbound ports. The in-memory world backs
//! tests and local runs; production adapters would translate the same ports
//! to real registries and a real transactional store.

pub mod world;

pub use world::*;
