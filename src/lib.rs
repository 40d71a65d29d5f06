pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod copier;
pub mod error;
pub mod metadata;
pub mod ui;

pub use error::{CopierError, CopierResult};
