use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext};
use octofhir_fhir_converter::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[allow(dead_code)]
pub fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data")
}

#[allow(dead_code)]
pub fn template_dir(data_type: DataType) -> PathBuf {
    data_dir()
        .join("Templates")
        .join(data_type.template_directory_name())
}

#[allow(dead_code)]
pub fn test_template_dir() -> PathBuf {
    data_dir().join("TestTemplates")
}

#[allow(dead_code)]
pub fn hl7v2_sample() -> String {
    read_sample("Hl7v2", "LRI_2.0-NG_CBC_Typ_Message.hl7")
}

#[allow(dead_code)]
pub fn ccda_sample() -> String {
    read_sample("Ccda", "CCD.ccda")
}

fn read_sample(dir: &str, file: &str) -> String {
    let path = data_dir().join("SampleData").join(dir).join(file);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read sample {}: {e}", path.display()))
}

#[allow(dead_code)]
pub fn boxed<C: FhirConverter + 'static>(converter: C) -> Box<dyn FhirConverter> {
    Box::new(converter)
}

/// Each supported format with its sample input and conventional root template.
#[allow(dead_code)]
pub fn sample_cases() -> Vec<(Box<dyn FhirConverter>, DataType, String, &'static str)> {
    vec![
        (
            boxed(Hl7v2Processor::new(None)),
            DataType::Hl7v2,
            hl7v2_sample(),
            "ORU_R01",
        ),
        (
            boxed(CcdaProcessor::new(None)),
            DataType::Ccda,
            ccda_sample(),
            "CCD",
        ),
    ]
}

#[allow(dead_code)]
pub fn template_collection() -> CollectionTemplateProvider {
    let template = Template::compile(r#"{"a":"b"}"#).unwrap();
    CollectionTemplateProvider::new(vec![HashMap::from([(
        "TemplateName".to_string(),
        template,
    )])])
}

/// `{{pause ms}}` blocks the rendering thread for `ms` milliseconds.
fn pause_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    _: &mut dyn Output,
) -> HelperResult {
    let millis = h.param(0).and_then(|v| v.value().as_u64()).unwrap_or(0);
    std::thread::sleep(Duration::from_millis(millis));
    Ok(())
}

#[allow(dead_code)]
pub fn slow_engine() -> Arc<TemplateEngine> {
    let mut engine = TemplateEngine::new();
    engine.register_helper("pause", pause_helper);
    Arc::new(engine)
}
