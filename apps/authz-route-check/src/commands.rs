use anyhow::{Context as _, Result};
use http::Method;
use rest_authz::context::auto_context;
use rest_authz::{
    ActionSchema, AuthzConfig, BypassMatcher, Context, HttpVerb, MatchOutcome, PathParams,
};
use serde_json::Value;
use std::io::Write;

/// Load the layered configuration and compile the schema it names.
///
/// `schema_override` replaces the configured `schema_path`.
///
/// # Errors
/// Fails when the configuration is invalid or the schema cannot be read or compiled.
pub fn load(
    config_path: Option<&std::path::Path>,
    schema_override: Option<&std::path::Path>,
) -> Result<(AuthzConfig, ActionSchema)> {
    let mut config = AuthzConfig::load(config_path)?;
    if let Some(path) = schema_override {
        config.schema_path = Some(path.to_path_buf());
    }

    let raw = config.read_schema()?;
    let schema = ActionSchema::compile(&raw).with_context(|| {
        format!(
            "invalid action schema {}",
            config
                .schema_path
                .as_deref()
                .unwrap_or_else(|| std::path::Path::new("-"))
                .display()
        )
    })?;
    tracing::info!(
        namespace = schema.namespace(),
        actions = schema.table().len(),
        "schema compiled"
    );
    Ok((config, schema))
}

/// Print the per-verb action table, the bypass rules and any overlapping
/// templates. Returns the number of overlaps found.
///
/// # Errors
/// Fails only when writing to `out` fails.
pub fn check(config: &AuthzConfig, schema: &ActionSchema, out: &mut impl Write) -> Result<usize> {
    writeln!(out, "namespace: {}", schema.namespace())?;
    for verb in HttpVerb::ALL {
        let actions = schema.table().actions(verb);
        if actions.is_empty() {
            continue;
        }
        writeln!(out, "{verb}:")?;
        for matcher in actions {
            let definition = matcher.definition();
            writeln!(
                out,
                "  {:<24} {} -> {}",
                definition.action_id,
                definition.path_template,
                matcher.route()
            )?;
        }
    }

    writeln!(out, "skipped endpoints: {}", config.skipped_endpoints.len())?;
    for rule in &config.skipped_endpoints {
        writeln!(out, "  {} {}", rule.http_verb, rule.path)?;
    }

    let overlaps = schema.table().overlaps();
    if overlaps.is_empty() {
        writeln!(out, "overlaps: none")?;
    } else {
        writeln!(out, "overlaps: {}", overlaps.len())?;
        for overlap in &overlaps {
            writeln!(
                out,
                "  {}: {} ({}) <> {} ({})",
                overlap.verb,
                overlap.first.action_id,
                overlap.first.path_template,
                overlap.second.action_id,
                overlap.second.path_template
            )?;
        }
    }
    Ok(overlaps.len())
}

/// How the enforcement point would treat a request in generic mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Bypassed,
    /// The method is not one enforcement applies to.
    Passthrough,
    Matched {
        action: String,
        params: PathParams,
        context: Context,
    },
    Ambiguous(Vec<String>),
    NotFound,
}

/// Resolve `method` and `target` the way generic enforcement would, without
/// consulting a principal or a decision engine.
///
/// # Errors
/// Fails on an invalid method or request target, or a bypass rule that
/// does not compile.
pub fn resolve(
    config: &AuthzConfig,
    schema: &ActionSchema,
    method: &str,
    target: &str,
) -> Result<Resolution> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid method {method:?}"))?;
    let (parts, ()) = http::Request::builder()
        .method(method)
        .uri(target)
        .body(())
        .with_context(|| format!("invalid request target {target:?}"))?
        .into_parts();
    let raw_path = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path(), http::uri::PathAndQuery::as_str);

    let bypass = BypassMatcher::compile(&config.skipped_endpoints)?;
    if bypass.is_bypassed(parts.method.as_str(), raw_path) {
        return Ok(Resolution::Bypassed);
    }

    let Some(verb) = HttpVerb::from_method(&parts.method) else {
        return Ok(Resolution::Passthrough);
    };

    let resolution = match schema.table().resolve(verb, raw_path) {
        MatchOutcome::Matched { action, params } => {
            let context = auto_context(&parts, &params);
            Resolution::Matched {
                action: action.action_id,
                params,
                context,
            }
        }
        MatchOutcome::Ambiguous(actions) => Resolution::Ambiguous(actions),
        MatchOutcome::NotFound => Resolution::NotFound,
    };
    tracing::debug!(%verb, path = raw_path, ?resolution, "request resolved");
    Ok(resolution)
}

/// Human-readable report of a [`Resolution`].
///
/// # Errors
/// Fails when writing to `out` fails.
pub fn print_resolution(resolution: &Resolution, out: &mut impl Write) -> Result<()> {
    match resolution {
        Resolution::Bypassed => writeln!(out, "bypassed: skipped endpoint")?,
        Resolution::Passthrough => writeln!(out, "passthrough: method is not enforced")?,
        Resolution::Matched {
            action,
            params,
            context,
        } => {
            writeln!(out, "matched: {action}")?;
            for (name, value) in params.iter() {
                writeln!(out, "  {name} = {value}")?;
            }
            writeln!(out, "context:")?;
            writeln!(
                out,
                "{}",
                serde_json::to_string_pretty(&Value::Object(context.clone()))?
            )?;
        }
        Resolution::Ambiguous(actions) => writeln!(out, "ambiguous: {}", actions.join(", "))?,
        Resolution::NotFound => writeln!(out, "not found")?,
    }
    Ok(())
}

/// Print the effective configuration as YAML.
///
/// # Errors
/// Fails when serialization or writing fails.
pub fn print_config(config: &AuthzConfig, out: &mut impl Write) -> Result<()> {
    write!(out, "{}", serde_yaml::to_string(config)?)?;
    Ok(())
}
