#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod client;
pub mod error;
pub mod proto;

pub use error::{Error, Result};
