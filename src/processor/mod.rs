//! Conversion orchestration.
//!
//! A [`Processor`] binds one input format to one set of settings. Each call to
//! [`FhirConverter::convert`] validates its arguments, resolves the root
//! template, parses the input and then runs rendering plus post-processing as
//! a single bounded unit of work.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::{DataType, ProcessorSettings};
use crate::engine::TemplateEngine;
use crate::error::{ConvertResult, ErrorCode, FhirConverterError, Result};
use crate::parser::{CcdaParser, Hl7v2Parser, InputParser};
use crate::postprocess;
use crate::provider::TemplateProvider;
use crate::utils::{check_cancelled, run_bounded};

/// Converts one input format to FHIR JSON.
#[async_trait]
pub trait FhirConverter: Send + Sync {
    /// The format this converter accepts.
    fn data_type(&self) -> DataType;

    /// Convert `data` by rendering `root_template` from `template_provider`.
    ///
    /// Failures surface as structured errors, except cancellation which is
    /// reported as [`crate::ConvertError::Cancelled`] whenever the token has
    /// fired, even if the conversion also ran out of time.
    async fn convert(
        &self,
        data: &str,
        root_template: Option<&str>,
        template_provider: Option<&dyn TemplateProvider>,
        cancel: Option<&CancellationToken>,
    ) -> ConvertResult<String>;
}

/// Template-driven converter for the input format parsed by `P`.
#[derive(Debug, Clone)]
pub struct Processor<P> {
    parser: P,
    settings: ProcessorSettings,
    engine: Arc<TemplateEngine>,
}

pub type Hl7v2Processor = Processor<Hl7v2Parser>;

pub type CcdaProcessor = Processor<CcdaParser>;

impl<P: InputParser + Default> Processor<P> {
    /// Create a processor; `None` settings mean no render bound.
    pub fn new(settings: impl Into<Option<ProcessorSettings>>) -> Self {
        Self::with_engine(settings, Arc::new(TemplateEngine::new()))
    }

    /// Create a processor rendering with a caller-configured engine.
    pub fn with_engine(
        settings: impl Into<Option<ProcessorSettings>>,
        engine: Arc<TemplateEngine>,
    ) -> Self {
        Self {
            parser: P::default(),
            settings: settings.into().unwrap_or_default(),
            engine,
        }
    }
}

impl<P: InputParser + Default> Default for Processor<P> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<P: InputParser> Processor<P> {
    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    pub fn engine(&self) -> &Arc<TemplateEngine> {
        &self.engine
    }

    /// Parse raw input into the model templates render against.
    pub fn parse(&self, data: &str) -> Result<serde_json::Value> {
        self.parser.parse(data)
    }
}

#[async_trait]
impl<P: InputParser> FhirConverter for Processor<P> {
    fn data_type(&self) -> DataType {
        self.parser.data_type()
    }

    async fn convert(
        &self,
        data: &str,
        root_template: Option<&str>,
        template_provider: Option<&dyn TemplateProvider>,
        cancel: Option<&CancellationToken>,
    ) -> ConvertResult<String> {
        check_cancelled(cancel)?;

        let provider = template_provider.ok_or_else(|| {
            FhirConverterError::new(
                ErrorCode::NullTemplateProvider,
                "Template provider must not be null",
            )
        })?;

        let root_template = root_template
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                FhirConverterError::new(
                    ErrorCode::NullOrEmptyRootTemplate,
                    "Root template name must not be null or empty",
                )
            })?;

        let templates = provider.resolve(root_template).await?;
        check_cancelled(cancel)?;

        let model = self.parser.parse(data)?;
        check_cancelled(cancel)?;

        let started = Instant::now();
        let engine = Arc::clone(&self.engine);
        let result = run_bounded(
            move || {
                let rendered = engine.render(&templates, &model)?;
                postprocess::process(&rendered)
            },
            self.settings.timeout(),
            cancel,
        )
        .await;

        match &result {
            Ok(_) => tracing::debug!(
                data_type = %self.data_type(),
                root_template,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Conversion completed"
            ),
            Err(err) if err.is_cancelled() => {
                tracing::warn!(root_template, "Conversion cancelled")
            }
            Err(err) => tracing::warn!(
                data_type = %self.data_type(),
                root_template,
                error = %err,
                "Conversion failed"
            ),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::CollectionTemplateProvider;

    const MESSAGE: &str = "MSH|^~\\&|LAB|HOSP|EHR|HOSP|20210314153000||ORU^R01|MSG1|P|2.5.1\rPID|1||12345||Doe^John";

    fn provider() -> CollectionTemplateProvider {
        CollectionTemplateProvider::from_sources([(
            "Root",
            r#"{"resourceType": "Patient", "id": "{{PID.[0].fields.[3].value}}", "name": [{"family": "{{PID.[0].fields.[5].components.[1]}}"}],}"#,
        )])
        .unwrap()
    }

    #[tokio::test]
    async fn test_convert_renders_and_postprocesses() {
        let processor = Hl7v2Processor::new(None);
        let provider = provider();

        let output = processor
            .convert(MESSAGE, Some("Root"), Some(&provider), None)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["id"], "12345");
        assert_eq!(value["name"][0]["family"], "Doe");
    }

    #[tokio::test]
    async fn test_argument_checks_precede_parsing() {
        let processor = Hl7v2Processor::default();
        let provider = provider();

        let err = processor.convert("", Some("Root"), None, None).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NullTemplateProvider));

        let err = processor
            .convert("", Some(""), Some(&provider), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NullOrEmptyRootTemplate));

        // Only an empty name is rejected up front; blank names go to the provider
        let err = processor
            .convert("", Some("  "), Some(&provider), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::TemplateNotFound));

        let err = processor
            .convert("", Some("Missing"), Some(&provider), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::TemplateNotFound));

        let err = processor
            .convert("", Some("Root"), Some(&provider), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NullOrEmptyInput));
    }

    #[tokio::test]
    async fn test_settings_default_to_unbounded() {
        assert_eq!(Hl7v2Processor::new(None).settings().timeout(), None);
        assert_eq!(
            CcdaProcessor::new(ProcessorSettings::new().with_time_out(-1))
                .settings()
                .timeout(),
            None
        );
        assert_eq!(CcdaProcessor::default().data_type(), DataType::Ccda);
        assert_eq!(Hl7v2Processor::default().data_type(), DataType::Hl7v2);
    }
}
