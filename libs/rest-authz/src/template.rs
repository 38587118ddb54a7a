//! Path templates and the single-segment route matcher built from them.
//!
//! Schema templates use `{name}` variable segments. They are rewritten into
//! the internal `:name` route syntax, which is then compiled into a
//! [`matchit::Router`] holding exactly one route.

use crate::config_error::PathTemplateError;
use std::borrow::Cow;

/// Characters with a special meaning in route patterns; none of them may
/// appear in a literal segment.
const RESERVED: &[char] = &['*', '(', ')', '?', '+', '!', '[', ']', '{', '}', ':', '\\'];

fn is_template_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '{' | '}')
}

fn is_capture_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}

/// Rewrite a schema path template into the internal route syntax.
///
/// `/pets/{petId}/sale` becomes `/pets/:petId/sale`.
///
/// # Errors
/// Returns [`PathTemplateError`] if a segment contains anything outside
/// `[A-Za-z0-9_-{}]`, or if a brace does not wrap the whole segment.
pub fn convert_path_template(template: &str) -> Result<String, PathTemplateError> {
    if template.is_empty() {
        return Err(PathTemplateError::new(template, "template is empty"));
    }

    let mut converted = Vec::new();
    for segment in template.split('/') {
        if !segment.chars().all(is_template_char) {
            return Err(PathTemplateError::new(
                template,
                format!("segment `{segment}` may only contain letters, digits, `-`, `_` and `{{name}}` variables"),
            ));
        }

        if segment.contains(['{', '}']) {
            let name = segment
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
                .filter(|name| is_capture_name(name))
                .ok_or_else(|| {
                    PathTemplateError::new(
                        template,
                        format!("segment `{segment}` must be a whole `{{name}}` variable"),
                    )
                })?;
            converted.push(Cow::Owned(format!(":{name}")));
        } else {
            converted.push(Cow::Borrowed(segment));
        }
    }

    Ok(converted.join("/"))
}

/// Drop any `?query` suffix from a raw request target.
#[must_use]
pub fn strip_query(raw_path: &str) -> &str {
    raw_path.split_once('?').map_or(raw_path, |(path, _)| path)
}

/// Captured `(name, value)` pairs in template order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for PathParams {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture,
}

/// Matcher for one route in the internal `:name` syntax.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    route: String,
    segments: Vec<Segment>,
    router: matchit::Router<()>,
}

impl RouteMatcher {
    /// Compile a route written in the internal `:name` syntax.
    ///
    /// # Errors
    /// Returns [`PathTemplateError`] for unnamed or malformed captures and for
    /// literal segments carrying pattern characters such as `*`.
    pub fn compile(route: &str) -> Result<Self, PathTemplateError> {
        let mut segments = Vec::new();
        let mut pattern = Vec::new();

        for segment in route.split('/') {
            if let Some(name) = segment.strip_prefix(':') {
                if !is_capture_name(name) {
                    return Err(PathTemplateError::new(
                        route,
                        format!("capture `{segment}` needs a name made of letters, digits, `-` or `_`"),
                    ));
                }
                segments.push(Segment::Capture);
                pattern.push(format!("{{{name}}}"));
            } else {
                if let Some(c) = segment.chars().find(|c| RESERVED.contains(c)) {
                    return Err(PathTemplateError::new(
                        route,
                        format!("unsupported pattern character `{c}` in segment `{segment}`"),
                    ));
                }
                segments.push(Segment::Literal(segment.to_owned()));
                pattern.push(segment.to_owned());
            }
        }

        let mut router = matchit::Router::new();
        router
            .insert(pattern.join("/"), ())
            .map_err(|e| PathTemplateError::new(route, e.to_string()))?;

        Ok(Self {
            route: route.to_owned(),
            segments,
            router,
        })
    }

    /// Compile a schema `{name}` template, or a route already in `:name` form.
    ///
    /// # Errors
    /// Returns [`PathTemplateError`] if the template fails either syntax.
    pub fn from_template(template: &str) -> Result<Self, PathTemplateError> {
        if template.contains(['{', '}']) {
            Self::compile(&convert_path_template(template)?)
        } else {
            Self::compile(template)
        }
    }

    /// The route in internal syntax.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Match a request path (without query), tolerating one trailing slash.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let matched = self.router.at(path).ok().or_else(|| {
            path.strip_suffix('/')
                .filter(|trimmed| !trimmed.is_empty())
                .and_then(|trimmed| self.router.at(trimmed).ok())
        })?;

        Some(
            matched
                .params
                .iter()
                .map(|(name, raw)| {
                    let value = urlencoding::decode(raw)
                        .map_or_else(|_| raw.to_owned(), Cow::into_owned);
                    (name.to_owned(), value)
                })
                .collect(),
        )
    }

    /// Whether some concrete path is matched by both routes.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let (ours, theirs) = (self.significant_segments(), other.significant_segments());
        ours.len() == theirs.len()
            && ours.iter().zip(theirs).all(|pair| match pair {
                (Segment::Literal(a), Segment::Literal(b)) => a == b,
                // Captures never match an empty segment.
                (Segment::Literal(literal), Segment::Capture)
                | (Segment::Capture, Segment::Literal(literal)) => !literal.is_empty(),
                (Segment::Capture, Segment::Capture) => true,
            })
    }

    /// Segments with one trailing empty segment dropped, mirroring the
    /// trailing-slash tolerance of [`Self::matches`].
    fn significant_segments(&self) -> &[Segment] {
        match self.segments.split_last() {
            Some((Segment::Literal(last), rest)) if last.is_empty() && !rest.is_empty() => rest,
            _ => &self.segments,
        }
    }
}
