use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use crossbeam_channel::Receiver;
use labconfig::LabConfig;
use preview::window::{run_window, WindowOptions};
use preview::{format, ShaderDialect, ShaderLanguage, ShaderSourceText, SurfaceSize};
use tracing_subscriber::EnvFilter;
use translate::{Translation, TranslationClient};

use crate::cli::{
    AnalyzeArgs, Cli, Command, ConfigAction, FormatArgs, GlobalArgs, OptimizeArgs, PreviewArgs,
    TranslateArgs,
};
use crate::paths::AppPaths;
use crate::session::Session;
use crate::settings::{self, completion_config, load_config};
use crate::watch::FileWatcher;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    let paths = AppPaths::discover(cli.global.config.clone())?;
    tracing::debug!(
        config_dir = %paths.config_dir().display(),
        config_file = %paths.config_file().display(),
        "resolved shaderlab paths"
    );

    match cli.command {
        Command::Translate(args) => run_translate(&cli.global, &paths, args),
        Command::Optimize(args) => run_optimize(&cli.global, &paths, args),
        Command::Analyze(args) => run_analyze(&cli.global, &paths, args),
        Command::Format(args) => run_format(&paths, args),
        Command::Preview(args) => run_preview(&paths, args),
        Command::Config(cmd) => match cmd.action {
            ConfigAction::Where => run_config_where(&paths),
            ConfigAction::Show => run_config_show(&paths),
        },
    }
}

fn run_translate(global: &GlobalArgs, paths: &AppPaths, args: TranslateArgs) -> Result<()> {
    let config = load_config(paths)?;
    let source = read_source(&args.input, args.from)?;
    if source.language() == args.to {
        tracing::warn!(language = %args.to, "source and target languages are the same");
    }

    let mut session = Session::new(install_client(global, &config)?);
    let translation = session
        .translate(&source, args.to)
        .with_context(|| format!("failed to translate {}", args.input.display()))?
        .clone();
    emit(&translation, args.output.as_deref())?;

    if args.preview {
        if args.to != ShaderLanguage::Glsl {
            tracing::warn!(language = %args.to, "preview only renders GLSL; skipping");
            return Ok(());
        }
        let title = format!("shaderlab - {} ({})", file_label(&args.input), args.to);
        open_preview(&config, title, None, None, translation.code, None)?;
    }
    Ok(())
}

fn run_optimize(global: &GlobalArgs, paths: &AppPaths, args: OptimizeArgs) -> Result<()> {
    let config = load_config(paths)?;
    let source = read_source(&args.input, args.language)?;

    let mut session = Session::new(install_client(global, &config)?);
    let translation = session
        .optimize(&source)
        .with_context(|| format!("failed to optimize {}", args.input.display()))?;
    emit(translation, args.output.as_deref())
}

fn run_analyze(global: &GlobalArgs, paths: &AppPaths, args: AnalyzeArgs) -> Result<()> {
    let config = load_config(paths)?;
    let source = read_source(&args.input, args.language)?;

    let mut session = Session::new(install_client(global, &config)?);
    let analysis = session
        .analyze(&source)
        .with_context(|| format!("failed to analyze {}", args.input.display()))?;
    println!("{analysis}");
    Ok(())
}

fn run_format(paths: &AppPaths, args: FormatArgs) -> Result<()> {
    let config = load_config(paths)?;
    let source = read_glsl(&args.input)?;
    let dialect = args
        .dialect
        .unwrap_or_else(|| settings::dialect(config.preview.dialect));

    let formatted = format::normalize_with(source.text(), dialect);
    io::stdout()
        .lock()
        .write_all(formatted.as_bytes())
        .context("failed to write formatted shader")?;
    Ok(())
}

fn run_preview(paths: &AppPaths, args: PreviewArgs) -> Result<()> {
    let config = load_config(paths)?;
    let source = read_glsl(&args.input)?;

    let watcher = if args.watch {
        Some(FileWatcher::spawn(
            args.input.clone(),
            ShaderLanguage::Glsl,
            source.text().to_string(),
            config.preview.watch_interval,
        )?)
    } else {
        None
    };

    let title = format!("shaderlab - {}", file_label(&args.input));
    let updates = watcher.as_ref().map(FileWatcher::updates);
    open_preview(&config, title, args.size, args.dialect, source, updates)
}

fn run_config_where(paths: &AppPaths) -> Result<()> {
    let file = paths.config_file();
    println!("Configuration paths:");
    println!("  config dir:  {}", paths.config_dir().display());
    println!(
        "  config file: {} ({})",
        file.display(),
        if file.exists() { "present" } else { "missing" }
    );
    Ok(())
}

fn run_config_show(paths: &AppPaths) -> Result<()> {
    let config = load_config(paths)?;
    let rendered = config
        .to_toml_string()
        .context("failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}

fn install_client(global: &GlobalArgs, config: &LabConfig) -> Result<&'static TranslationClient> {
    let completion = completion_config(global, config)?;
    tracing::debug!(
        endpoint = %completion.endpoint,
        model = %completion.model,
        timeout = ?completion.timeout,
        "configured completion client"
    );
    translate::global::install(completion).context("failed to construct translation client")
}

fn open_preview(
    config: &LabConfig,
    title: String,
    size: Option<SurfaceSize>,
    dialect: Option<ShaderDialect>,
    source: ShaderSourceText,
    updates: Option<Receiver<ShaderSourceText>>,
) -> Result<()> {
    let options = WindowOptions {
        title,
        size: size.unwrap_or(SurfaceSize::new(config.preview.width, config.preview.height)),
        vsync: config.preview.vsync,
        dialect: dialect.unwrap_or_else(|| settings::dialect(config.preview.dialect)),
    };
    tracing::info!(
        width = options.size.width,
        height = options.size.height,
        dialect = %options.dialect,
        "opening preview window (space toggles, escape closes)"
    );
    run_window(options, source, updates)
}

/// Reads `path`, taking the language from `language` or the file extension.
fn read_source(path: &Path, language: Option<ShaderLanguage>) -> Result<ShaderSourceText> {
    let language = match language.or_else(|| language_from_path(path)) {
        Some(language) => language,
        None => bail!(
            "cannot tell the shader language of {}; pass it explicitly",
            path.display()
        ),
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read shader at {}", path.display()))?;
    Ok(ShaderSourceText::new(language, text))
}

/// Reads a shader the preview can render. Unknown extensions are taken as GLSL.
fn read_glsl(path: &Path) -> Result<ShaderSourceText> {
    if let Some(language) = language_from_path(path) {
        if language != ShaderLanguage::Glsl {
            bail!(
                "{} looks like {}; only GLSL can be previewed",
                path.display(),
                language.display_name()
            );
        }
    }
    read_source(path, Some(ShaderLanguage::Glsl))
}

fn language_from_path(path: &Path) -> Option<ShaderLanguage> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(ShaderLanguage::from_extension)
}

fn emit(translation: &Translation, output: Option<&Path>) -> Result<()> {
    let code = translation.code.text();
    match output {
        Some(path) => {
            fs::write(path, code)
                .with_context(|| format!("failed to write shader to {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote shader");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(code.as_bytes())
                .context("failed to write shader")?;
            if !code.ends_with('\n') {
                writeln!(stdout).context("failed to write shader")?;
            }
        }
    }
    if !translation.explanation.is_empty() {
        eprintln!("\n{}", translation.explanation);
    }
    Ok(())
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn language_comes_from_extension() {
        assert_eq!(
            language_from_path(Path::new("fx/bloom.hlsl")),
            Some(ShaderLanguage::Hlsl)
        );
        assert_eq!(
            language_from_path(Path::new("fx/bloom.metal")),
            Some(ShaderLanguage::Msl)
        );
        assert_eq!(language_from_path(Path::new("fx/bloom.txt")), None);
        assert_eq!(language_from_path(Path::new("fx/bloom")), None);
    }

    #[test]
    fn read_source_requires_a_language() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("shader.txt");
        fs::write(&path, "void main() {}").unwrap();

        assert!(read_source(&path, None).is_err());
        let source = read_source(&path, Some(ShaderLanguage::Wgsl)).unwrap();
        assert_eq!(source.language(), ShaderLanguage::Wgsl);
    }

    #[test]
    fn read_glsl_rejects_other_languages() {
        let root = TempDir::new().unwrap();
        let hlsl = root.path().join("shader.hlsl");
        let plain = root.path().join("shader.frag");
        fs::write(&hlsl, "float4 main() : SV_Target { return 1; }").unwrap();
        fs::write(&plain, "void main() {}").unwrap();

        assert!(read_glsl(&hlsl).is_err());
        assert_eq!(read_glsl(&plain).unwrap().language(), ShaderLanguage::Glsl);
    }

    #[test]
    fn emit_writes_code_to_output_file() {
        let root = TempDir::new().unwrap();
        let out = root.path().join("out.wgsl");
        let translation = Translation {
            code: ShaderSourceText::new(ShaderLanguage::Wgsl, "@fragment fn main() {}"),
            explanation: String::new(),
        };

        emit(&translation, Some(&out)).unwrap();
        assert_eq!(fs::read_to_string(out).unwrap(), "@fragment fn main() {}");
    }
}
