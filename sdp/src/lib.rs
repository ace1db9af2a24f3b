#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod description;
pub mod error;
pub mod util;

pub use description::media::MediaDescription;
pub use description::session::SessionDescription;
pub use error::{Error, Result};
