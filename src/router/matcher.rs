use crate::error::RouteError;
use regex::Regex;
use std::sync::Arc;

use super::ParamVec;

/// A compiled `{placeholder}` pattern.
///
/// Each placeholder becomes a `([^/]+)` capture; literal segments are escaped and kept
/// verbatim. The regex is anchored at both ends so `/articulos/{id}` never matches
/// `/articulos/1/comentarios`.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    pattern: Arc<str>,
    regex: Regex,
    param_names: Vec<Arc<str>>,
    shape: String,
}

impl PathMatcher {
    /// Compile `pattern`, rejecting empty or repeated placeholder names.
    pub fn compile(pattern: &str) -> Result<Self, RouteError> {
        let (source, param_names, shape) = path_to_regex(pattern)?;
        let regex = Regex::new(&source).map_err(|source| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: Arc::from(pattern),
            regex,
            param_names,
            shape,
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &Arc<str> {
        &self.pattern
    }

    /// Placeholder names in the order they appear in the pattern.
    #[must_use]
    pub fn param_names(&self) -> &[Arc<str>] {
        &self.param_names
    }

    /// The pattern with every placeholder replaced by `{}`.
    ///
    /// Two patterns with the same shape match exactly the same paths.
    #[must_use]
    pub fn shape(&self) -> &str {
        &self.shape
    }

    /// Extract parameters from `path`, or `None` when the path has a different shape.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<ParamVec> {
        let caps = self.regex.captures(path)?;
        let mut params = ParamVec::new();
        for (i, name) in self.param_names.iter().enumerate() {
            let value = caps.get(i + 1)?.as_str();
            params.push((Arc::clone(name), value.to_string()));
        }
        Some(params)
    }
}

/// True when `pattern` contains at least one `{name}` segment.
#[must_use]
pub fn has_placeholders(pattern: &str) -> bool {
    pattern.split('/').any(is_placeholder)
}

fn is_placeholder(segment: &str) -> bool {
    segment.len() >= 2 && segment.starts_with('{') && segment.ends_with('}')
}

/// Build the anchored regex source, the ordered parameter names and the shape key.
pub(crate) fn path_to_regex(path: &str) -> Result<(String, Vec<Arc<str>>, String), RouteError> {
    if path == "/" {
        return Ok(("^/$".to_string(), Vec::new(), "/".to_string()));
    }

    let mut source = String::with_capacity(path.len() + 8);
    let mut shape = String::with_capacity(path.len());
    let mut param_names: Vec<Arc<str>> = Vec::with_capacity(path.matches('{').count());
    source.push('^');

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        source.push('/');
        shape.push('/');
        if is_placeholder(segment) {
            let name = &segment[1..segment.len() - 1];
            if name.is_empty() {
                return Err(RouteError::EmptyParam {
                    pattern: path.to_string(),
                });
            }
            if param_names.iter().any(|n| n.as_ref() == name) {
                return Err(RouteError::DuplicateParam {
                    pattern: path.to_string(),
                    name: name.to_string(),
                });
            }
            source.push_str("([^/]+)");
            shape.push_str("{}");
            param_names.push(Arc::from(name));
        } else {
            source.push_str(&regex::escape(segment));
            shape.push_str(segment);
        }
    }

    source.push('$');
    Ok((source, param_names, shape))
}
