//! Domain types for the image-generation control panel.
//!
//! Everything in this crate is synchronous and free of I/O: generation
//! modes and the field-visibility projection, job request construction,
//! progress arithmetic, and the mask editor bitmap. The network-facing
//! job lifecycle lives in `atelier-client`.

pub mod error;
pub mod mask;
pub mod mode;
pub mod preset;
pub mod progress;
pub mod protocol;
pub mod request;
pub mod types;
pub mod visibility;
