#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod agent;
pub mod candidate;
pub mod error;
pub mod mdns;
pub mod network_type;
pub mod rand;
pub mod state;

pub use error::{Error, Result};
