pub mod async_helpers;

pub use async_helpers::{check_cancelled, run_bounded};
