//! Client side of the image-generation panel.
//!
//! Talks to the panel backend over HTTP (uploads, job submission, result
//! polling) and listens to its push channel for advisory progress. The
//! [`controller::JobController`] ties these together into the per-job
//! lifecycle: upload, submit, poll, finish.

pub mod api;
pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod messages;
pub mod poll;
pub mod progress;
pub mod push;
pub mod upload;
