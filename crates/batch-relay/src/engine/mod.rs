//! # Execution Cores
//!
//! The two batch engines and the exclusion primitive that wraps them:
//!
//! | Component | Location | Purpose |
//! |-----------|----------|---------|
//! | Transfer engine | `engine/transfer.rs` | validated batched item transfers |
//! | Multicall engine | `engine/multicall.rs` | delegated-call batches, three failure policies |
//! | Exclusion guard | `engine/guard.rs` | reentrancy exclusion for mutating entry points |

pub mod guard;
pub mod multicall;
pub mod transfer;

pub use guard::*;
pub use multicall::*;
pub use transfer::*;
