//! Cross-module engine flows.

pub mod flows;
