//! Template providers resolve a root template name to the compiled set of
//! templates needed to render it.

pub mod collection;
pub mod directory;

pub use collection::CollectionTemplateProvider;
pub use directory::DirectoryTemplateProvider;

use async_trait::async_trait;
use handlebars::Template;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::error::Result;

/// File extension of templates stored on disk.
pub const TEMPLATE_EXTENSION: &str = "hbs";

static PARTIAL_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\{~?\s*#?>\s*["']?([A-Za-z0-9_./\-]+)"#)
        .expect("partial reference pattern is valid")
});

/// Source of compiled templates.
///
/// Implementations must be safe for concurrent lookups; processors only read
/// from a provider and may share one across many conversions.
#[async_trait]
pub trait TemplateProvider: Send + Sync {
    /// Resolve `root_template` together with every template it includes.
    ///
    /// Fails with `TemplateNotFound` when the root, or a template it
    /// includes, cannot be found.
    async fn resolve(&self, root_template: &str) -> Result<ResolvedTemplates>;
}

/// A root template plus the templates it can include, keyed by name.
#[derive(Debug, Clone)]
pub struct ResolvedTemplates {
    root: String,
    templates: HashMap<String, Arc<Template>>,
}

impl ResolvedTemplates {
    pub fn new(root: impl Into<String>, template: Arc<Template>) -> Self {
        let root = root.into();
        let mut templates = HashMap::new();
        templates.insert(root.clone(), template);
        Self { root, templates }
    }

    pub fn root_name(&self) -> &str {
        &self.root
    }

    pub fn root(&self) -> &Template {
        &self.templates[&self.root]
    }

    /// Add a template unless one with the same name is already present.
    /// Returns whether it was added.
    pub fn insert(&mut self, name: impl Into<String>, template: Arc<Template>) -> bool {
        let name = name.into();
        if self.templates.contains_key(&name) {
            return false;
        }
        self.templates.insert(name, template);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Template>> {
        self.templates.get(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Template>)> {
        self.templates.iter().map(|(name, template)| (name.as_str(), template))
    }
}

/// Names of the partials referenced by template `source`, in order of first
/// appearance and without duplicates.
pub fn referenced_partials(source: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for captures in PARTIAL_REFERENCE.captures_iter(source) {
        let name = &captures[1];
        if !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referenced_partials() {
        let source = r#"
            {"entry": [
                {{> Patient}}
                {{#each OBX}}{{> Resource/Observation obx=this}},{{/each}}
                {{~> Patient}}
                {{#> Layout}}inner{{/Layout}}
            ]}
        "#;

        assert_eq!(
            referenced_partials(source),
            vec!["Patient", "Resource/Observation", "Layout"]
        );
    }

    #[test]
    fn test_referenced_partials_ignores_plain_expressions() {
        assert!(referenced_partials("{{name}} {{#if x}}{{/if}} a > b").is_empty());
    }

    #[test]
    fn test_resolved_templates_keep_first_insert() {
        let first = Arc::new(Template::compile("first").unwrap());
        let second = Arc::new(Template::compile("second").unwrap());
        let mut set = ResolvedTemplates::new("Root", Arc::clone(&first));

        assert!(!set.insert("Root", second));
        assert_eq!(set.len(), 1);
        assert!(Arc::ptr_eq(set.get("Root").unwrap(), &first));
        assert_eq!(set.root_name(), "Root");
    }
}
