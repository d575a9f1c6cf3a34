//! Format parsers turning raw messages into the structured input model that
//! templates render against.

pub mod ccda;
pub mod hl7v2;

pub use ccda::CcdaParser;
pub use hl7v2::{EncodingCharacters, Hl7v2Parser};

use serde_json::Value;

use crate::core::DataType;
use crate::error::Result;

/// Parses one wire format into a JSON model.
pub trait InputParser: Send + Sync + 'static {
    fn data_type(&self) -> DataType;

    fn parse(&self, data: &str) -> Result<Value>;
}
