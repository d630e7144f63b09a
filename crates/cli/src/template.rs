//! Key template commands.

use anyhow::Context;
use dynamodel_core::template::KeyValues;
use dynamodel_core::KeyTemplate;

use crate::prelude::*;

/// Key template commands.
#[derive(Debug, clap::Parser)]
pub struct TemplateCommand {
    #[command(subcommand)]
    pub action: TemplateAction,
}

#[derive(Debug, clap::Subcommand)]
pub enum TemplateAction {
    /// Render a key from a template and field values.
    Render(RenderCommand),

    /// Extract field values from a rendered key.
    Match(MatchCommand),
}

/// Render a key from a template.
#[derive(Debug, clap::Parser)]
#[command(long_about = "Render a key from a template and field values.

Every placeholder in the template must be given a value.

Example:
  dynamodel template render 'CUSTOMER#{customer}#ORDER#{order}' \\
    --value customer=c1 --value order=o9")]
pub struct RenderCommand {
    /// Key template, e.g. `user:{id}`.
    pub pattern: String,

    /// Field value as `name=value`. Repeatable.
    #[arg(long = "value", short = 'v', value_name = "NAME=VALUE", value_parser = parse_pair)]
    pub values: Vec<(String, String)>,
}

/// Match a key against a template.
#[derive(Debug, clap::Parser)]
pub struct MatchCommand {
    /// Key template, e.g. `user:{id}`.
    pub pattern: String,

    /// Rendered key to match.
    pub key: String,
}

pub fn run(cmd: TemplateCommand, global: &crate::Global) -> anyhow::Result<()> {
    match cmd.action {
        TemplateAction::Render(render) => {
            let key = render_key(&render.pattern, render.values)?;
            if global.is_verbose() {
                aprintln!("{} {}", p_b("Template:"), render.pattern);
            }
            aprintln!("{key}");
        }
        TemplateAction::Match(matching) => {
            match match_key(&matching.pattern, &matching.key)? {
                Some(values) => {
                    for (name, value) in &values {
                        aprintln!("{}={}", p_c(name), value);
                    }
                }
                None => aprintln!("{}", p_r("no match")),
            }
        }
    }
    Ok(())
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got {raw:?}")),
    }
}

fn render_key(pattern: &str, values: Vec<(String, String)>) -> anyhow::Result<String> {
    let template = KeyTemplate::compile(pattern)
        .with_context(|| format!("invalid template {pattern:?}"))?;
    let values: KeyValues = values.into_iter().collect();
    tracing::debug!(pattern = %pattern, fields = values.len(), "Rendering key");
    Ok(template.render(&values)?)
}

fn match_key(pattern: &str, key: &str) -> anyhow::Result<Option<KeyValues>> {
    let template = KeyTemplate::compile(pattern)
        .with_context(|| format!("invalid template {pattern:?}"))?;
    Ok(template.matches(key))
}
