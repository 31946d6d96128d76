use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use preview::{ShaderDialect, ShaderLanguage, SurfaceSize};

#[derive(Parser, Debug)]
#[command(
    name = "shaderlab",
    author,
    version,
    about = "Translate shaders with an LLM and preview the result live",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file to load instead of `<config dir>/shaderlab.toml`.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Completion service API key; can also be supplied via the `SHADERLAB_API_KEY` env var.
    #[arg(long, global = true, env = "SHADERLAB_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Override the chat completion endpoint URL.
    #[arg(long, global = true, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Override the completion model name.
    #[arg(long, global = true, value_name = "MODEL")]
    pub model: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Port a shader to another shading language.
    Translate(TranslateArgs),
    /// Ask for a faster equivalent of a shader in the same language.
    Optimize(OptimizeArgs),
    /// Print a prose explanation of what a shader does.
    Analyze(AnalyzeArgs),
    /// Print a GLSL fragment shader the way the preview compiles it.
    Format(FormatArgs),
    /// Open a live preview window for a GLSL fragment shader.
    Preview(PreviewArgs),
    /// Inspect configuration paths and the effective configuration.
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub struct TranslateArgs {
    /// Shader source file.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Source language (`glsl`, `hlsl`, `wgsl`, `msl`); inferred from the file extension when omitted.
    #[arg(long, value_name = "LANG", value_parser = parse_language)]
    pub from: Option<ShaderLanguage>,

    /// Target language.
    #[arg(long, value_name = "LANG", value_parser = parse_language)]
    pub to: ShaderLanguage,

    /// Write the translated shader here instead of stdout.
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Open the result in the preview window (GLSL targets only).
    #[arg(long)]
    pub preview: bool,
}

#[derive(Args, Debug)]
pub struct OptimizeArgs {
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Source language; inferred from the file extension when omitted.
    #[arg(long, value_name = "LANG", value_parser = parse_language)]
    pub language: Option<ShaderLanguage>,

    /// Write the optimized shader here instead of stdout.
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Source language; inferred from the file extension when omitted.
    #[arg(long, value_name = "LANG", value_parser = parse_language)]
    pub language: Option<ShaderLanguage>,
}

#[derive(Args, Debug)]
pub struct FormatArgs {
    /// GLSL fragment shader file.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Version pragma to prepend: `es300` or `core330`.
    #[arg(long, value_name = "DIALECT", value_parser = parse_dialect)]
    pub dialect: Option<ShaderDialect>,
}

#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// GLSL fragment shader file.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Reload the shader whenever the file changes.
    #[arg(long)]
    pub watch: bool,

    /// Initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<SurfaceSize>,

    /// Preferred GLSL dialect: `es300` or `core330`.
    #[arg(long, value_name = "DIALECT", value_parser = parse_dialect)]
    pub dialect: Option<ShaderDialect>,
}

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the resolved configuration directory and file.
    Where,
    /// Print the effective configuration as TOML.
    Show,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_language(value: &str) -> Result<ShaderLanguage, String> {
    value.parse()
}

pub fn parse_dialect(value: &str) -> Result<ShaderDialect, String> {
    value.parse()
}

pub fn parse_size(value: &str) -> Result<SurfaceSize, String> {
    let trimmed = value.trim();
    let (w, h) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{trimmed}'; expected WIDTHxHEIGHT"))?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width in '{trimmed}'"))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height in '{trimmed}'"))?;
    if width == 0 || height == 0 {
        return Err("size must be greater than zero".into());
    }
    Ok(SurfaceSize::new(width, height))
}
