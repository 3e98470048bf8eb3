use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value as Json;
use tracing::debug;

use crate::cache::ImplementationCache;
use crate::config::SynthConfig;
use crate::dispatch::{AiFunction, Args};
use crate::lexer::tokenize;
use crate::manifest::Manifest;
use crate::parser::parse;
use crate::prompt::compose_prompt;
use crate::runtime::{materialize, Environment, Value};
use crate::stub::{introspect, render_signature, FunctionStub};
use crate::synth::{reassemble, strip_code_fence, Synthesizer};
use crate::utils::errors::{emit_diagnostics, Diagnostic};
use crate::utils::logger;

#[derive(Parser, Debug)]
#[command(
    name = "conjure",
    version,
    about = "Synthesize function bodies for typed stubs"
)]
pub struct ConjureCli {
    #[arg(long, global = true)]
    /// Dump the token stream of the assembled source.
    dump_tokens: bool,

    #[arg(long, global = true)]
    /// Dump the parsed AST of the assembled source.
    dump_ast: bool,

    #[arg(long, global = true)]
    /// Override AI_IMPLEMENT_RETRY_LIMIT.
    retry_limit: Option<u32>,

    #[arg(long, global = true)]
    /// Override the completion model.
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Prints the prompt composed for each stub of a manifest.
    Prompt {
        manifest: PathBuf,
        #[arg(long)]
        stub: Option<String>,
    },
    /// Materializes a hand-written body against a stub without calling the model.
    Check {
        manifest: PathBuf,
        #[arg(long)]
        stub: String,
        body: PathBuf,
    },
    /// Synthesizes a stub and calls it once.
    Run {
        manifest: PathBuf,
        #[arg(long)]
        stub: String,
        /// Positional arguments as a JSON array.
        #[arg(long)]
        args: Option<String>,
        /// Keyword arguments as a JSON object.
        #[arg(long)]
        kwargs: Option<String>,
    },
}

impl ConjureCli {
    pub fn command(&self) -> &Command {
        &self.command
    }
}

pub fn run() -> Result<()> {
    logger::init_logging();
    let cli = ConjureCli::parse();
    match &cli.command {
        Command::Prompt { manifest, stub } => handle_prompt(manifest, stub.as_deref()),
        Command::Check {
            manifest,
            stub,
            body,
        } => handle_check(&cli, manifest, stub, body),
        Command::Run {
            manifest,
            stub,
            args,
            kwargs,
        } => handle_run(&cli, manifest, stub, args.as_deref(), kwargs.as_deref()),
    }
}

fn handle_prompt(path: &Path, only: Option<&str>) -> Result<()> {
    let manifest = Manifest::load(path)?;
    let stubs: Vec<&FunctionStub> = match only {
        Some(name) => vec![find_stub(&manifest, name)?],
        None => manifest.stubs().iter().collect(),
    };
    for (index, stub) in stubs.into_iter().enumerate() {
        if index > 0 {
            println!("{}", "=".repeat(50));
        }
        println!("{} {}", "prompt".bold(), stub.name().cyan());
        println!("{}", compose_prompt(stub)?);
    }
    Ok(())
}

fn handle_check(cli: &ConjureCli, path: &Path, name: &str, body_path: &Path) -> Result<()> {
    let manifest = Manifest::load(path)?;
    let stub = find_stub(&manifest, name)?;
    let signature = introspect(stub)?;
    let raw = fs::read_to_string(body_path)
        .with_context(|| format!("failed to read {}", body_path.display()))?;
    let body = strip_code_fence(&raw);
    let source = reassemble(stub.name(), &render_signature(stub), stub.docstring(), &body);
    let source_id = body_path.display().to_string();

    if cli.dump_tokens || cli.dump_ast {
        dump_source(cli, &source)?;
    }

    let env = Environment::with_records(signature.records.iter().cloned());
    let config = SynthConfig::from_env()?;
    match materialize(&source, stub.name(), env, config.limits) {
        Ok(function) => {
            debug!(function = function.name(), "check passed");
            println!("{} {}", "ok".green().bold(), stub.name());
            Ok(())
        }
        Err(err) => {
            let diagnostics: Vec<Diagnostic> = err.diagnostics(&source_id);
            emit_diagnostics(&diagnostics, &source);
            bail!("{err}");
        }
    }
}

fn dump_source(cli: &ConjureCli, source: &str) -> Result<()> {
    let tokens = match tokenize(source) {
        Ok(tokens) => tokens,
        Err(_) => return Ok(()),
    };
    if cli.dump_tokens {
        println!("{}", "== Tokens ==".bold());
        for token in &tokens {
            println!("{:?} @ {:?}", token.kind, token.span);
        }
    }
    if cli.dump_ast {
        if let Ok(program) = parse(&tokens) {
            println!("{}", "== AST ==".bold());
            println!("{program:#?}");
        }
    }
    Ok(())
}

fn handle_run(
    cli: &ConjureCli,
    path: &Path,
    name: &str,
    args: Option<&str>,
    kwargs: Option<&str>,
) -> Result<()> {
    let manifest = Manifest::load(path)?;
    let stub = find_stub(&manifest, name)?;
    let signature = introspect(stub)?;
    let call_args = build_args(&signature.params, args, kwargs)?;

    let mut config = SynthConfig::from_env()?;
    if let Some(limit) = cli.retry_limit {
        config = config.with_retry_limit(limit)?;
    }
    if let Some(model) = &cli.model {
        config = config.with_model(model.clone());
    }

    let function = AiFunction::new(
        stub.clone(),
        Synthesizer::openai(config),
        Arc::new(ImplementationCache::new()),
    );
    let implementation = function.implementation()?;
    if cli.dump_tokens || cli.dump_ast {
        dump_source(cli, &implementation.source)?;
    }
    println!("{}", "== Source ==".bold());
    print!("{}", implementation.source);

    let result = function.call(call_args)?;
    println!("{} {}", "result".green().bold(), result.repr());
    if let Some(stats) = function.stats() {
        println!(
            "{} {} attempt(s) with {} in {:.2?}",
            "synthesized".dimmed(),
            stats.attempts,
            stats.model,
            stats.elapsed
        );
    }
    Ok(())
}

fn find_stub<'m>(manifest: &'m Manifest, name: &str) -> Result<&'m FunctionStub> {
    match manifest.stub(name) {
        Some(stub) => Ok(stub),
        None => {
            let known: Vec<&str> = manifest.stubs().iter().map(FunctionStub::name).collect();
            bail!(
                "manifest {} has no stub `{name}` (available: {})",
                manifest.path(),
                known.join(", ")
            )
        }
    }
}

/// Converts JSON call arguments, shaping each one by its parameter's declared type.
fn build_args(
    params: &[crate::stub::ParamInfo],
    args: Option<&str>,
    kwargs: Option<&str>,
) -> Result<Args> {
    let mut call_args = Args::new();

    if let Some(text) = args {
        let values: Vec<Json> =
            serde_json::from_str(text).context("--args must be a JSON array")?;
        for (index, json) in values.iter().enumerate() {
            let value = match params.get(index) {
                Some(param) => Value::from_json_typed(json, &param.ty)?,
                None => Value::from_json(json),
            };
            call_args = call_args.arg(value);
        }
    }

    if let Some(text) = kwargs {
        let values: serde_json::Map<String, Json> =
            serde_json::from_str(text).context("--kwargs must be a JSON object")?;
        for (key, json) in &values {
            let value = match params.iter().find(|param| &param.name == key) {
                Some(param) => Value::from_json_typed(json, &param.ty)?,
                None => Value::from_json(json),
            };
            call_args = call_args.kwarg(key.clone(), value);
        }
    }

    Ok(call_args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeRef;
    use crate::stub::ParamInfo;

    fn param(name: &str, ty: TypeRef) -> ParamInfo {
        ParamInfo {
            name: name.to_string(),
            type_name: ty.to_string(),
            ty,
            description: None,
            schema: None,
            default: None,
        }
    }

    #[test]
    fn json_arguments_follow_parameter_types() {
        let params = [param("x", TypeRef::Float), param("n", TypeRef::Int)];
        let args = build_args(&params, Some("[2]"), Some(r#"{"n": 3, "extra": "a"}"#))
            .expect("args");
        assert_eq!(args.positional, vec![Value::Float(2.0)]);
        assert_eq!(args.keyword[0], ("n".to_string(), Value::Int(3)));
        assert_eq!(args.keyword[1], ("extra".to_string(), Value::str("a")));
    }

    #[test]
    fn malformed_json_arguments_are_rejected() {
        assert!(build_args(&[], Some("{"), None).is_err());
        assert!(build_args(&[], None, Some("[1]")).is_err());
    }
}
