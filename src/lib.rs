#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod flow;
pub mod tracker;
