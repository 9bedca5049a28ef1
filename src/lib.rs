#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod config;
pub mod gateway;
pub mod identity;
pub mod providers;
pub mod relay;
pub mod security;
pub mod transform;
pub mod util;
pub mod webhook;

pub use config::Config;
