//! Headless control panel.
//!
//! Drives [`atelier_client::controller::JobController`] from command-line
//! arguments: one submission, an optional result download, and an
//! optional mask pass over the result.

pub mod args;
pub mod panel;
