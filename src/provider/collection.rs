//! Collection-backed template provider over pre-parsed templates.

use async_trait::async_trait;
use handlebars::Template;
use std::collections::HashMap;
use std::sync::Arc;

use super::{ResolvedTemplates, TemplateProvider};
use crate::engine::TemplateEngine;
use crate::error::{FhirConverterError, Result};

/// Resolves templates by exact name from in-memory collections.
///
/// Collections are layered: when a name appears in several of them the first
/// collection wins. No filesystem access and no include discovery happen; a
/// resolved set simply carries every template the caller supplied.
#[derive(Debug, Clone, Default)]
pub struct CollectionTemplateProvider {
    layers: Arc<Vec<HashMap<String, Arc<Template>>>>,
}

impl CollectionTemplateProvider {
    pub fn new(collections: Vec<HashMap<String, Template>>) -> Self {
        let layers = collections
            .into_iter()
            .map(|collection| {
                collection
                    .into_iter()
                    .map(|(name, template)| (name, Arc::new(template)))
                    .collect()
            })
            .collect();

        Self {
            layers: Arc::new(layers),
        }
    }

    /// Compile template sources into a single-layer provider.
    pub fn from_sources<I, N, S>(sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: AsRef<str>,
    {
        let mut collection = HashMap::new();
        for (name, source) in sources {
            let name = name.into();
            let template = TemplateEngine::compile(&name, source.as_ref())?;
            collection.insert(name, template);
        }
        Ok(Self::new(vec![collection]))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Template>> {
        self.layers.iter().find_map(|layer| layer.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

#[async_trait]
impl TemplateProvider for CollectionTemplateProvider {
    async fn resolve(&self, root_template: &str) -> Result<ResolvedTemplates> {
        let root = self
            .get(root_template)
            .ok_or_else(|| FhirConverterError::template_not_found(root_template))?;

        let mut resolved = ResolvedTemplates::new(root_template, Arc::clone(root));
        for layer in self.layers.iter() {
            for (name, template) in layer {
                resolved.insert(name.as_str(), Arc::clone(template));
            }
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn template(source: &str) -> Template {
        Template::compile(source).unwrap()
    }

    #[tokio::test]
    async fn test_first_layer_wins() {
        let provider = CollectionTemplateProvider::new(vec![
            HashMap::from([("Shared".to_string(), template("first"))]),
            HashMap::from([
                ("Shared".to_string(), template("second")),
                ("Extra".to_string(), template("extra")),
            ]),
        ]);

        let resolved = provider.resolve("Shared").await.unwrap();
        assert_eq!(resolved.len(), 2);
        assert!(Arc::ptr_eq(
            resolved.get("Shared").unwrap(),
            provider.get("Shared").unwrap()
        ));
        assert!(resolved.contains("Extra"));
    }

    #[tokio::test]
    async fn test_exact_key_lookup() {
        let provider =
            CollectionTemplateProvider::from_sources([("TemplateName", r#"{"a":"b"}"#)]).unwrap();

        assert!(provider.resolve("TemplateName").await.is_ok());

        let err = provider.resolve("templatename").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TemplateNotFound);
    }

    #[test]
    fn test_from_sources_reports_syntax_errors() {
        let err = CollectionTemplateProvider::from_sources([("Bad", "{{#if x}}{{/each}}")])
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TemplateSyntaxError);
    }
}
