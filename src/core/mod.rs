//! Core resolution types and the pipeline orchestrator

pub mod config;
pub mod request;
pub mod resolver;
pub mod stream;
pub mod token;

pub use config::*;
pub use request::*;
pub use resolver::*;
pub use stream::*;
pub use token::*;
