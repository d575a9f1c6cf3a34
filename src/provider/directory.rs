//! Directory-backed template provider.
//!
//! Layout convention: a root template `NAME` is stored as `NAME.hbs`, an
//! included template `dir/NAME` as `dir/_NAME.hbs` (falling back to
//! `dir/NAME.hbs`). Files are read lazily and compiled templates are cached
//! for the lifetime of the provider.

use async_trait::async_trait;
use handlebars::Template;
use std::collections::{HashSet, VecDeque};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use super::{ResolvedTemplates, TEMPLATE_EXTENSION, TemplateProvider, referenced_partials};
use crate::engine::TemplateEngine;
use crate::error::{ErrorCode, FhirConverterError, Result};

#[derive(Debug, Clone)]
struct CachedTemplate {
    template: Arc<Template>,
    includes: Arc<Vec<String>>,
}

/// Loads templates from a directory tree.
#[derive(Debug, Clone)]
pub struct DirectoryTemplateProvider {
    root_dir: PathBuf,
    /// Compiled templates keyed by the file they were loaded from
    cache: Arc<papaya::HashMap<PathBuf, CachedTemplate>>,
}

impl DirectoryTemplateProvider {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            cache: Arc::new(papaya::HashMap::new()),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Number of compiled templates currently cached.
    pub fn cached_templates(&self) -> usize {
        self.cache.pin().len()
    }

    pub fn clear_cache(&self) {
        self.cache.pin().clear();
    }

    /// Candidate files for a template name, most specific first.
    fn candidate_paths(&self, name: &str, include: bool) -> Vec<PathBuf> {
        let relative = Path::new(name);
        let is_safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        let Some(file_name) = relative.file_name().and_then(|f| f.to_str()) else {
            return Vec::new();
        };
        if !is_safe {
            return Vec::new();
        }

        let parent = self
            .root_dir
            .join(relative.parent().unwrap_or_else(|| Path::new("")));
        let plain = parent.join(format!("{file_name}.{TEMPLATE_EXTENSION}"));

        if include {
            vec![
                parent.join(format!("_{file_name}.{TEMPLATE_EXTENSION}")),
                plain,
            ]
        } else {
            vec![plain]
        }
    }

    fn cached(&self, path: &Path) -> Option<CachedTemplate> {
        self.cache.pin().get(path).cloned()
    }

    async fn load(&self, name: &str, include: bool) -> Result<Option<CachedTemplate>> {
        for path in self.candidate_paths(name, include) {
            if let Some(cached) = self.cached(&path) {
                return Ok(Some(cached));
            }

            let source = match fs::read_to_string(&path).await {
                Ok(source) => source,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(FhirConverterError::with_source(
                        ErrorCode::TemplateLoadingError,
                        format!("Failed to read template '{name}' from {}", path.display()),
                        e,
                    ));
                }
            };

            let template = TemplateEngine::compile(name, &source)?;
            let cached = CachedTemplate {
                template: Arc::new(template),
                includes: Arc::new(referenced_partials(&source)),
            };
            tracing::debug!(template = name, path = %path.display(), "Loaded template");

            self.cache.pin().insert(path, cached.clone());
            return Ok(Some(cached));
        }

        Ok(None)
    }
}

#[async_trait]
impl TemplateProvider for DirectoryTemplateProvider {
    async fn resolve(&self, root_template: &str) -> Result<ResolvedTemplates> {
        let root = self
            .load(root_template, false)
            .await?
            .ok_or_else(|| FhirConverterError::template_not_found(root_template))?;

        let mut resolved = ResolvedTemplates::new(root_template, root.template);
        let mut visited: HashSet<String> = HashSet::from([root_template.to_string()]);
        let mut pending: VecDeque<(String, String)> = root
            .includes
            .iter()
            .map(|include| (include.clone(), root_template.to_string()))
            .collect();

        while let Some((name, parent)) = pending.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }

            let included = self.load(&name, true).await?.ok_or_else(|| {
                FhirConverterError::new(
                    ErrorCode::TemplateNotFound,
                    format!("Template '{name}' included from '{parent}' not found"),
                )
            })?;

            pending.extend(
                included
                    .includes
                    .iter()
                    .map(|include| (include.clone(), name.clone())),
            );
            resolved.insert(name, included.template);
        }

        tracing::debug!(
            root_template,
            templates = resolved.len(),
            "Resolved templates from directory"
        );
        Ok(resolved)
    }
}
