use crate::config_error::PathTemplateError;
use crate::template::{PathParams, RouteMatcher, convert_path_template, strip_query};
use crate::types::HttpVerb;
use std::collections::HashMap;

/// A schema action bound to one verb and one path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDefinition {
    pub action_id: String,
    pub path_template: String,
    pub verb: HttpVerb,
}

/// An [`ActionDefinition`] with its compiled path matcher.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    definition: ActionDefinition,
    matcher: RouteMatcher,
}

impl CompiledMatcher {
    /// # Errors
    /// Returns [`PathTemplateError`] if the definition's template is invalid.
    pub fn compile(definition: ActionDefinition) -> Result<Self, PathTemplateError> {
        let route = convert_path_template(&definition.path_template)?;
        let matcher = RouteMatcher::compile(&route)?;
        Ok(Self {
            definition,
            matcher,
        })
    }

    #[must_use]
    pub fn definition(&self) -> &ActionDefinition {
        &self.definition
    }

    /// The template in internal `:name` syntax.
    #[must_use]
    pub fn route(&self) -> &str {
        self.matcher.route()
    }

    #[must_use]
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        self.matcher.matches(path)
    }
}

/// Outcome of resolving a request against the verb table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched {
        action: ActionDefinition,
        params: PathParams,
    },
    NotFound,
    /// Every matching action id, in declaration order.
    Ambiguous(Vec<String>),
}

/// Two actions of the same verb whose templates can match a common path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    pub verb: HttpVerb,
    pub first: ActionDefinition,
    pub second: ActionDefinition,
}

/// Per-verb lists of compiled matchers, read-only once built.
#[derive(Debug, Clone, Default)]
pub struct VerbTable {
    buckets: HashMap<HttpVerb, Vec<CompiledMatcher>>,
}

impl VerbTable {
    /// Compile definitions, keeping declaration order within each verb.
    ///
    /// # Errors
    /// Returns the first [`PathTemplateError`] encountered.
    pub fn compile<I>(definitions: I) -> Result<Self, PathTemplateError>
    where
        I: IntoIterator<Item = ActionDefinition>,
    {
        let mut buckets: HashMap<HttpVerb, Vec<CompiledMatcher>> = HashMap::new();
        for definition in definitions {
            let verb = definition.verb;
            buckets
                .entry(verb)
                .or_default()
                .push(CompiledMatcher::compile(definition)?);
        }
        Ok(Self { buckets })
    }

    #[must_use]
    pub fn actions(&self, verb: HttpVerb) -> &[CompiledMatcher] {
        self.buckets.get(&verb).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a request target to exactly one action.
    ///
    /// Every matcher for `verb` is evaluated; more than one hit is reported
    /// as [`MatchOutcome::Ambiguous`] and never narrowed down.
    #[must_use]
    pub fn resolve(&self, verb: HttpVerb, raw_path: &str) -> MatchOutcome {
        let path = strip_query(raw_path);
        let mut hits: Vec<(&CompiledMatcher, PathParams)> = self
            .actions(verb)
            .iter()
            .filter_map(|matcher| matcher.matches(path).map(|params| (matcher, params)))
            .collect();

        match hits.len() {
            0 => MatchOutcome::NotFound,
            1 => {
                let (matcher, params) = hits.remove(0);
                MatchOutcome::Matched {
                    action: matcher.definition.clone(),
                    params,
                }
            }
            _ => MatchOutcome::Ambiguous(
                hits.iter()
                    .map(|(matcher, _)| matcher.definition.action_id.clone())
                    .collect(),
            ),
        }
    }

    /// Statically detect template pairs that share a concrete path.
    #[must_use]
    pub fn overlaps(&self) -> Vec<Overlap> {
        let mut found = Vec::new();
        for verb in HttpVerb::ALL {
            let actions = self.actions(verb);
            for (i, first) in actions.iter().enumerate() {
                for second in &actions[i + 1..] {
                    if first.matcher.overlaps(&second.matcher) {
                        found.push(Overlap {
                            verb,
                            first: first.definition.clone(),
                            second: second.definition.clone(),
                        });
                    }
                }
            }
        }
        found
    }
}

/// Resolve `raw_path` for `verb` against `table`.
#[must_use]
pub fn resolve(table: &VerbTable, verb: HttpVerb, raw_path: &str) -> MatchOutcome {
    table.resolve(verb, raw_path)
}
