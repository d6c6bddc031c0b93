//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::assets::{AssetDescriptor, AssetManifest, RenderStage, default_manifest};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "anteprima";
const DEFAULT_ASSET_ROOT: &str = "assets";
const DEFAULT_HARD_BREAKS: bool = true;

/// Command-line arguments for the Anteprima binary.
#[derive(Debug, Parser)]
#[command(name = "anteprima", version, about = "Anteprima live Markdown preview")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "ANTEPRIMA_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Render a Markdown document once and print the result.
    Render(RenderCommandArgs),
    /// Run one asset provisioning pass and report per-asset outcomes.
    Provision(ProvisionArgs),
}

#[derive(Debug, Args, Clone, Default)]
pub struct RenderCommandArgs {
    #[command(flatten)]
    pub overrides: SharedOverrides,

    /// Markdown file to render; the built-in welcome document when omitted.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: Option<PathBuf>,

    /// Write the output here instead of standard output.
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Emit a standalone HTML page instead of the bare fragment.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub standalone: bool,

    /// Skip the provisioning pass and trust whatever assets are on disk.
    #[arg(long = "no-provision", action = clap::ArgAction::SetTrue)]
    pub no_provision: bool,
}

#[derive(Debug, Args, Clone, Default)]
pub struct ProvisionArgs {
    #[command(flatten)]
    pub overrides: SharedOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SharedOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the local asset root directory.
    #[arg(long = "assets-root", value_name = "PATH")]
    pub assets_root: Option<PathBuf>,

    /// Treat single newlines as hard line breaks when rendering.
    #[arg(
        long = "render-hard-breaks",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub render_hard_breaks: Option<bool>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub assets: AssetSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct AssetSettings {
    pub root: PathBuf,
    pub manifest: AssetManifest,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub hard_breaks: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("ANTEPRIMA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Render(args)) => raw.apply_overrides(&args.overrides),
        Some(Command::Provision(args)) => raw.apply_overrides(&args.overrides),
        None => {}
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for
/// downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    assets: RawAssetSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &SharedOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(root) = overrides.assets_root.as_ref() {
            self.assets.root = Some(root.clone());
        }
        if let Some(hard_breaks) = overrides.render_hard_breaks {
            self.render.hard_breaks = Some(hard_breaks);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            assets,
            render,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            assets: build_asset_settings(assets)?,
            render: build_render_settings(render),
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_asset_settings(assets: RawAssetSettings) -> Result<AssetSettings, LoadError> {
    let root = assets
        .root
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSET_ROOT));
    if root.as_os_str().is_empty() {
        return Err(LoadError::invalid("assets.root", "path must not be empty"));
    }

    let manifest = match assets.manifest {
        None => default_manifest(),
        Some(raw_entries) => {
            let mut descriptors = Vec::with_capacity(raw_entries.len());
            for entry in raw_entries {
                let source = Url::parse(&entry.remote_source).map_err(|err| {
                    LoadError::invalid(
                        "assets.manifest",
                        format!("invalid remote source `{}`: {err}", entry.remote_source),
                    )
                })?;

                let stage = match entry.stage.as_deref() {
                    None => None,
                    Some("highlighting") => Some(RenderStage::Highlighting),
                    Some("math") => Some(RenderStage::Math),
                    Some(other) => {
                        return Err(LoadError::invalid(
                            "assets.manifest",
                            format!("unknown stage `{other}` (expected highlighting|math)"),
                        ));
                    }
                };

                let descriptor =
                    AssetDescriptor::new(entry.name, entry.local_path, source, stage)
                        .map_err(|err| LoadError::invalid("assets.manifest", err.to_string()))?;
                descriptors.push(descriptor);
            }

            AssetManifest::new(descriptors)
                .map_err(|err| LoadError::invalid("assets.manifest", err.to_string()))?
        }
    };

    Ok(AssetSettings { root, manifest })
}

fn build_render_settings(render: RawRenderSettings) -> RenderSettings {
    RenderSettings {
        hard_breaks: render.hard_breaks.unwrap_or(DEFAULT_HARD_BREAKS),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAssetSettings {
    root: Option<PathBuf>,
    manifest: Option<Vec<RawAssetDescriptor>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawAssetDescriptor {
    name: String,
    local_path: PathBuf,
    remote_source: String,
    stage: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    hard_breaks: Option<bool>,
}
