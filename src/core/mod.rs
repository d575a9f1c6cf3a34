pub mod config;

pub use config::{DataType, ProcessorSettings};
