#![doc = include_str!("../README.md")]

mod dispatch;
mod error;
mod outcome;
mod results;
mod token;
mod work;

pub use crate::dispatch::*;
pub use crate::error::*;
pub use crate::outcome::*;
pub use crate::results::*;
pub use crate::token::*;
pub use crate::work::*;
