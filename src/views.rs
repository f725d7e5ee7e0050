//! Optional HTML rendering of view-models.
//!
//! A view named `articulos/show` renders `<templates_dir>/articulos/show.html` with
//! minijinja. Without a templates directory, or when the file does not exist, the
//! server returns the view-model itself as JSON.

use minijinja::Environment;
use serde_json::Value;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("failed to read template {template}: {source}")]
    Io {
        template: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render template {template}: {source}")]
    Render {
        template: String,
        #[source]
        source: minijinja::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Views {
    base_dir: Option<PathBuf>,
}

impl Views {
    #[must_use]
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self { base_dir }
    }

    fn map_name(&self, name: &str) -> Option<PathBuf> {
        let mut pb = self.base_dir.clone()?;
        for comp in Path::new(name.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        pb.set_extension("html");
        Some(pb)
    }

    /// True when `name` resolves to a template file.
    #[must_use]
    pub fn has_template(&self, name: &str) -> bool {
        self.map_name(name).is_some_and(|p| p.is_file())
    }

    /// Render `name` with `ctx`, or `Ok(None)` when there is no such template.
    pub fn render(&self, name: &str, ctx: &Value) -> Result<Option<String>, ViewError> {
        let Some(path) = self.map_name(name).filter(|p| p.is_file()) else {
            return Ok(None);
        };
        let source = fs::read_to_string(&path).map_err(|source| ViewError::Io {
            template: name.to_string(),
            source,
        })?;
        let render_err = |source| ViewError::Render {
            template: name.to_string(),
            source,
        };
        let mut env = Environment::new();
        env.add_template(name, &source).map_err(render_err)?;
        let rendered = env
            .get_template(name)
            .and_then(|tmpl| tmpl.render(ctx))
            .map_err(render_err)?;
        Ok(Some(rendered))
    }
}
