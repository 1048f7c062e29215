// ============================================================================
// PixelSides CLI — headless editing via command-line arguments
// ============================================================================
//
// Usage examples:
//   pixelsides -i photo.png --script edits.rhai -o result.png
//   pixelsides -i "shots/*.png" --script stamp.rhai --output-dir out/
//   pixelsides --width 32 --height 32 --script sprite.rhai -o sprite.png
//
// Every input becomes the backdrop (a setup command) of its own editor; the
// script then runs through the same gesture API the interactive editor uses.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use rhai::AST;

use crate::canvas::parse_color;
use crate::io::{SaveFormat, encode_and_write, load_image};
use crate::ops::scripting::{Palette, compile_script, run_script};
use crate::plugins::{Backdrop, PluginRegistry};
use crate::project::Project;
use crate::settings::EditorSettings;
use crate::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PixelSides headless pixel editor.
#[derive(Parser, Debug)]
#[command(
    name = "pixelsides",
    about = "PixelSides headless pixel editor",
    long_about = "Apply Rhai edit scripts (pencil, eraser, line, rect, ellipse, fill, paste,\n\
                  undo, redo) to images without opening an editor window.\n\n\
                  Example:\n  \
                  pixelsides -i photo.png --script edits.rhai -o result.png\n  \
                  pixelsides --width 32 --height 32 --script sprite.rhai -o sprite.png"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    /// Without inputs a single blank canvas is edited.
    #[arg(short, long, num_args = 1..)]
    pub input: Vec<String>,

    /// Rhai edit script to run on each canvas.
    #[arg(short, long, value_name = "SCRIPT")]
    pub script: Option<PathBuf>,

    /// Output file path. Only valid for a single canvas.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, bmp, tga, ico, tiff.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Blank canvas width (overrides the settings file).
    #[arg(long)]
    pub width: Option<u32>,

    /// Blank canvas height (overrides the settings file).
    #[arg(long)]
    pub height: Option<u32>,

    /// Colour used for `primary` in scripts.
    #[arg(long, value_name = "COLOR")]
    pub primary: Option<String>,

    /// Colour used for `secondary` in scripts.
    #[arg(long, value_name = "COLOR")]
    pub secondary: Option<String>,

    /// Settings file to use instead of the per-user one.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Print per-file timing and mirror the session log to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Where a canvas comes from.
enum Source<'a> {
    File(&'a Path),
    Blank { width: u32, height: u32 },
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all canvases succeeded, `1` = one or more failed.
pub fn run(args: CliArgs) -> ExitCode {
    let mut settings = match &args.settings {
        Some(path) => EditorSettings::load_from(path),
        None => EditorSettings::load(),
    };
    if let Err(e) = apply_overrides(&mut settings, &args) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }
    let palette = Palette::from(&settings);

    let inputs = resolve_inputs(&args.input);
    if !args.input.is_empty() && inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let format = match parse_format(args.format.as_deref(), args.output.as_deref()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Script is compiled once, up front, so a typo fails before any file is written
    let (script, base_dir) = match &args.script {
        Some(path) => match load_script(path) {
            Ok(ast) => {
                let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
                (Some(ast), base)
            }
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => (None, PathBuf::from(".")),
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let jobs: Vec<(Source, Option<PathBuf>)> = if inputs.is_empty() {
        let source = Source::Blank {
            width: settings.canvas_width,
            height: settings.canvas_height,
        };
        let output = args.output.clone().or_else(|| {
            args.output_dir
                .as_ref()
                .map(|d| d.join(format!("untitled.{}", format.extension())))
        });
        vec![(source, output)]
    } else {
        inputs
            .iter()
            .map(|input| {
                let output = build_output_path(
                    input,
                    args.output.as_deref(),
                    args.output_dir.as_deref(),
                    format,
                );
                (Source::File(input.as_path()), output)
            })
            .collect()
    };

    let total = jobs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, (source, output)) in jobs.into_iter().enumerate() {
        let label = match &source {
            Source::File(path) => path.display().to_string(),
            Source::Blank { width, height } => format!("<blank {}x{}>", width, height),
        };
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, label);
        }

        let Some(output) = output else {
            eprintln!("  error: cannot determine output path for {} (use --output).", label);
            any_failure = true;
            continue;
        };

        let file_start = Instant::now();
        match run_one(source, &output, script.as_ref(), &palette, &base_dir, format, args.quality) {
            Ok(title) => {
                log_info!("{} -> {}", title, output.display());
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("{}: {}", label, e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-canvas pipeline
// ============================================================================

/// Load, edit, save. Returns the project's display title.
fn run_one(
    source: Source,
    output: &Path,
    script: Option<&AST>,
    palette: &Palette,
    base_dir: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<String, String> {
    // -- Step 1: Canvas ----------------------------------------------------
    let mut project = match source {
        Source::Blank { width, height } => Project::new_untitled(1, width, height),
        Source::File(path) => {
            let image = load_image(path).map_err(|e| format!("load failed: {}", e))?;
            let mut project = Project::new_untitled(1, image.width(), image.height());
            project.path = Some(path.to_path_buf());
            project.update_name_from_path();

            let mut plugins = PluginRegistry::new();
            plugins
                .register(Box::new(Backdrop::new(image)))
                .map_err(|e| e.to_string())?;
            plugins
                .install_all(&mut project.editor)
                .map_err(|e| e.to_string())?;
            project
        }
    };

    // -- Step 2: Script ----------------------------------------------------
    if let Some(ast) = script {
        let printed = project
            .edit(|editor| run_script(editor, ast, palette, base_dir))
            .map_err(|e| format!("script error: {}", e))?;
        for line in printed {
            println!("  {}", line);
        }
    }

    // -- Step 3: Save ------------------------------------------------------
    encode_and_write(project.editor.surface().image(), output, format, quality)
        .map_err(|e| format!("save failed: {}", e))?;
    let title = project.display_title();
    project.mark_clean();
    Ok(title)
}

// ============================================================================
// Helpers
// ============================================================================

fn apply_overrides(settings: &mut EditorSettings, args: &CliArgs) -> Result<(), String> {
    if let Some(w) = args.width {
        settings.canvas_width = w.max(1);
    }
    if let Some(h) = args.height {
        settings.canvas_height = h.max(1);
    }
    if let Some(c) = &args.primary {
        settings.primary_color = parse_color(c).map_err(|e| format!("--primary: {}", e))?;
    }
    if let Some(c) = &args.secondary {
        settings.secondary_color = parse_color(c).map_err(|e| format!("--secondary: {}", e))?;
    }
    Ok(())
}

fn load_script(path: &Path) -> Result<AST, String> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read script '{}': {}", path.display(), e))?;
    compile_script(&source).map_err(|e| format!("{}: {}", path.display(), e))
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// `--format` wins; otherwise the output extension; otherwise PNG.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> Result<SaveFormat, String> {
    if let Some(f) = format_arg {
        return SaveFormat::from_extension(f).ok_or_else(|| format!("unknown format '{}'", f));
    }
    match output {
        Some(out) => SaveFormat::from_path(out).map_err(|e| e.to_string()),
        None => Ok(SaveFormat::Png),
    }
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: same directory as input, same stem, new extension
///    (appends `_out` to stem if it would collide with the input path)
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: SaveFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));

    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}
