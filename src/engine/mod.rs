//! Template executor backed by Handlebars.
//!
//! Templates are compiled once (by a provider) and rendered against the
//! structured input model of a message. Output escaping is disabled because
//! templates emit JSON, not HTML.

pub mod helpers;

use handlebars::{Handlebars, HelperDef, Template};
use serde_json::Value;

use crate::error::{ErrorCode, FhirConverterError, Result};
use crate::provider::ResolvedTemplates;

/// Renders resolved template sets.
///
/// The engine owns the helper registry. It is built once, optionally extended
/// with [`TemplateEngine::register_helper`], and then shared behind an `Arc`
/// by processors; rendering never mutates it.
#[derive(Clone)]
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        helpers::register_builtin_helpers(&mut handlebars);

        Self { handlebars }
    }

    /// Parse template source into a compiled template.
    pub fn compile(name: &str, source: &str) -> Result<Template> {
        Template::compile(source).map_err(|e| {
            FhirConverterError::with_source(
                ErrorCode::TemplateSyntaxError,
                format!("Failed to parse template '{name}': {e}"),
                e,
            )
        })
    }

    /// Register a custom helper function
    pub fn register_helper<F>(&mut self, name: &str, helper: F)
    where
        F: HelperDef + Send + Sync + 'static,
    {
        self.handlebars.register_helper(name, Box::new(helper));
    }

    /// Render the root template of `templates` against `data`.
    ///
    /// Every template of the set is registered so that partials referenced by
    /// the root resolve by name.
    pub fn render(&self, templates: &ResolvedTemplates, data: &Value) -> Result<String> {
        let mut registry = self.handlebars.clone();
        for (name, template) in templates.iter() {
            registry.register_template(name, Template::clone(template));
        }

        let root = templates.root_name();
        registry.render(root, data).map_err(|e| {
            FhirConverterError::with_source(
                ErrorCode::TemplateRenderingError,
                format!("Failed to render template '{root}': {e}"),
                e,
            )
        })
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handlebars::{Context, Helper, Output, RenderContext};
    use serde_json::json;
    use std::sync::Arc;

    fn resolved(root: &str, sources: &[(&str, &str)]) -> ResolvedTemplates {
        let mut templates: Option<ResolvedTemplates> = None;
        for (name, source) in sources {
            let template = Arc::new(TemplateEngine::compile(name, source).unwrap());
            match templates.as_mut() {
                Some(set) => {
                    set.insert(*name, template);
                }
                None => templates = Some(ResolvedTemplates::new(root, template)),
            }
        }
        templates.unwrap()
    }

    #[test]
    fn test_render_with_partial() {
        let engine = TemplateEngine::new();
        let templates = resolved(
            "Root",
            &[
                ("Root", r#"{"name": "{{> Name}}"}"#),
                ("Name", "{{patient.family}}"),
            ],
        );

        let output = engine
            .render(&templates, &json!({"patient": {"family": "O'Brien & Sons"}}))
            .unwrap();

        assert_eq!(output, r#"{"name": "O'Brien & Sons"}"#);
    }

    #[test]
    fn test_compile_error_is_syntax_error() {
        let err = TemplateEngine::compile("Broken", "{{#if x}}oops{{/each}}").unwrap_err();
        assert_eq!(err.code, ErrorCode::TemplateSyntaxError);
    }

    #[test]
    fn test_missing_partial_is_rendering_error() {
        let engine = TemplateEngine::new();
        let templates = resolved("Root", &[("Root", "{{> Missing}}")]);

        let err = engine.render(&templates, &json!({})).unwrap_err();
        assert_eq!(err.code, ErrorCode::TemplateRenderingError);
    }

    #[test]
    fn test_custom_helper() {
        fn shout(
            h: &Helper,
            _: &Handlebars,
            _: &Context,
            _: &mut RenderContext,
            out: &mut dyn Output,
        ) -> handlebars::HelperResult {
            let param = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
            out.write(&format!("{param}!"))?;
            Ok(())
        }

        let mut engine = TemplateEngine::new();
        engine.register_helper("shout", shout);
        let templates = resolved("Root", &[("Root", "{{shout word}}")]);

        let output = engine.render(&templates, &json!({"word": "hey"})).unwrap();
        assert_eq!(output, "hey!");
    }
}
