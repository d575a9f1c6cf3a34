//! # OctoFHIR FHIR Converter
//!
//! Template-driven conversion of HL7v2 messages and C-CDA documents to FHIR
//! JSON.
//!
//! ## Features
//!
//! - **Template Providers**: Directory-backed templates with lazy loading and caching, or in-memory collections
//! - **Bounded Execution**: Optional per-processor render time limit
//! - **Cancellation**: Per-call cancellation that always wins over a timeout
//! - **Structured Errors**: Every failure carries a machine-readable error code
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use octofhir_fhir_converter::*;
//!
//! # async fn example() -> ConvertResult<()> {
//! let provider = DirectoryTemplateProvider::new("data/Templates/Hl7v2");
//! let processor = Hl7v2Processor::new(ProcessorSettings::new().with_time_out(5000));
//!
//! let message = std::fs::read_to_string("message.hl7").unwrap_or_default();
//! let bundle = processor
//!     .convert(&message, Some("ORU_R01"), Some(&provider), None)
//!     .await?;
//! println!("{bundle}");
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod engine;
pub mod error;
pub mod parser;
pub mod postprocess;
pub mod processor;
pub mod provider;
pub mod utils;

pub use crate::core::{DataType, ProcessorSettings};
pub use engine::TemplateEngine;
pub use error::Result;
pub use error::{ConvertError, ConvertResult, ErrorCode, FhirConverterError};
pub use parser::{CcdaParser, Hl7v2Parser, InputParser};
pub use processor::{CcdaProcessor, FhirConverter, Hl7v2Processor, Processor};
pub use provider::{
    CollectionTemplateProvider, DirectoryTemplateProvider, ResolvedTemplates, TemplateProvider,
};

pub use handlebars::Template;
pub use tokio_util::sync::CancellationToken;
