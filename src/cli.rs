// ============================================================================
// ColoringFE CLI — headless coloring of line-art templates
// ============================================================================
//
// Usage examples:
//   ColoringFE --input cat.png --auto-color --seed 7 --output cat_colored.png
//   ColoringFE -i pages/*.png --auto-color --output-dir colored/ --format jpeg
//   ColoringFE -i cat.png --brush texture --intensity 0.8 --size 6 --color "#ff8800" \
//              --stroke "10,10 60,40 120,40" --fill 200,200 -o cat.cfe
//   ColoringFE -i session.cfe --auto-color -o flat.png
//
// No GUI is opened in CLI mode. Each input is processed on the current thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use eframe::egui::Pos2;

use crate::canvas::RasterSurface;
use crate::components::tools::{BrushKind, DrawMode, FillStrategy};
use crate::error::{ColoringError, Result};
use crate::io::{SaveFormat, encode_and_write, load_cfe, load_image_sync, save_cfe};
use crate::ops::color::parse_color;
use crate::project::ColoringSession;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// ColoringFE headless coloring-page processor.
#[derive(Parser, Debug)]
#[command(
    name = "ColoringFE",
    about = "ColoringFE headless coloring-page processor",
    long_about = "Load line-art templates, auto-color them and/or paint scripted strokes\n\
                  and fills, then export PNG, JPEG or a .cfe session file.\n\n\
                  Example:\n  \
                  ColoringFE --input cat.png --auto-color --output cat_colored.png\n  \
                  ColoringFE -i pages/*.png --auto-color --output-dir colored/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "pages/*.jpg").
    /// `.cfe` session files keep their brush settings.
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, cfe.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Run the region auto-color pass before any strokes.
    #[arg(long)]
    pub auto_color: bool,

    /// Seed for brush jitter and palette picks (random when omitted).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Brush: standard, smart-color, texture, blend, shade, pattern, smart-adjust, guided-coloring.
    #[arg(long, value_name = "KIND")]
    pub brush: Option<String>,

    /// Brush intensity, 0.0–1.0.
    #[arg(long)]
    pub intensity: Option<f32>,

    /// Brush size in pixels.
    #[arg(long)]
    pub size: Option<f32>,

    /// Brush color as #RRGGBB or r,g,b.
    #[arg(long)]
    pub color: Option<String>,

    /// A stroke as space-separated points, e.g. "10,10 40,25 80,25". Repeatable.
    #[arg(long, value_name = "POINTS")]
    pub stroke: Vec<String>,

    /// Fill click at x,y. Repeatable.
    #[arg(long, value_name = "X,Y")]
    pub fill: Vec<String>,

    /// Flood whole regions instead of stamping a disc for --fill.
    #[arg(long)]
    pub region_fill: bool,

    /// Surface width (defaults to the template's width).
    #[arg(long)]
    pub width: Option<u32>,

    /// Surface height (defaults to the template's height).
    #[arg(long)]
    pub height: Option<u32>,

    /// Print per-file timing and debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
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

    let save_format = parse_format(args.format.as_deref(), args.output.as_deref());

    // Validate the painting script once, before touching any file
    let plan = match PaintPlan::from_args(&args) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            save_format,
        ) else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, &plan, save_format, args.quality) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log::error!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

/// Everything the command line asked to paint, parsed up front.
#[derive(Debug, Default)]
struct PaintPlan {
    width: Option<u32>,
    height: Option<u32>,
    seed: Option<u64>,
    brush: Option<BrushKind>,
    intensity: Option<f32>,
    size: Option<f32>,
    color: Option<[u8; 3]>,
    auto_color: bool,
    strokes: Vec<Vec<Pos2>>,
    fills: Vec<Pos2>,
    region_fill: bool,
}

impl PaintPlan {
    fn from_args(args: &CliArgs) -> Result<Self> {
        let brush = match &args.brush {
            Some(b) => Some(
                BrushKind::from_key(b)
                    .ok_or_else(|| ColoringError::InvalidArgument(format!("unknown brush '{}'", b)))?,
            ),
            None => None,
        };
        let color = match &args.color {
            Some(c) => Some(
                parse_color(c)
                    .ok_or_else(|| ColoringError::InvalidArgument(format!("bad color '{}'", c)))?,
            ),
            None => None,
        };
        let strokes = args
            .stroke
            .iter()
            .map(|s| parse_stroke(s))
            .collect::<Result<Vec<_>>>()?;
        let fills = args
            .fill
            .iter()
            .map(|s| parse_point(s))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            width: args.width,
            height: args.height,
            seed: args.seed,
            brush,
            intensity: args.intensity,
            size: args.size,
            color,
            auto_color: args.auto_color,
            strokes,
            fills,
            region_fill: args.region_fill,
        })
    }
}

fn run_one(
    input: &Path,
    output: &Path,
    plan: &PaintPlan,
    format: SaveFormat,
    quality: u8,
) -> Result<()> {
    // -- Step 1: Load ----------------------------------------------------
    let is_session = SaveFormat::from_path(input) == Some(SaveFormat::Cfe);
    let (surface, tools) = if is_session {
        let (surface, tools) = load_cfe(input)?;
        (surface, Some(tools))
    } else {
        let template = load_image_sync(input)?;
        let width = plan.width.unwrap_or(template.width());
        let height = plan.height.unwrap_or(template.height());
        let mut surface = RasterSurface::new(width, height);
        surface.draw_template(&template);
        (surface, None)
    };

    let name = input
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Untitled".to_string());
    let mut session = ColoringSession::from_surface(surface, &name);
    if let Some(seed) = plan.seed {
        session = session.with_seed(seed);
    }
    if let Some(tools) = tools {
        session.tools = tools;
    }

    if let Some(b) = plan.brush {
        session.tools.brush = b;
    }
    if let Some(i) = plan.intensity {
        session.tools.intensity = i.clamp(0.0, 1.0);
    }
    if let Some(s) = plan.size {
        session.tools.size = s;
    }
    if let Some(c) = plan.color {
        session.tools.set_rgb(c);
    }

    // -- Step 2: Paint ---------------------------------------------------
    if plan.auto_color {
        let report = session.auto_color();
        log::info!("{}: auto-colored {} regions", name, report.regions.len());
    }

    session.tools.mode = DrawMode::Draw;
    for points in &plan.strokes {
        let Some((first, rest)) = points.split_first() else { continue };
        session.pointer_down(*first);
        for p in rest {
            session.pointer_move(*p);
        }
        session.pointer_up();
    }

    if !plan.fills.is_empty() {
        session.tools.mode = DrawMode::Fill;
        if plan.region_fill {
            session.tools.fill_strategy = FillStrategy::Region;
        }
        for p in &plan.fills {
            if !session.click(*p) {
                log::warn!("{}: fill at ({}, {}) changed nothing", name, p.x, p.y);
            }
        }
    }

    // -- Step 3: Save ----------------------------------------------------
    match format {
        SaveFormat::Cfe => save_cfe(session.surface(), &session.tools, output)?,
        _ => encode_and_write(session.surface().pixels(), output, format, quality)?,
    }

    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// `"x,y"` → point.
pub fn parse_point(s: &str) -> Result<Pos2> {
    let bad = || ColoringError::InvalidArgument(format!("expected x,y but got '{}'", s));
    let (x, y) = s.trim().split_once(',').ok_or_else(bad)?;
    let x: f32 = x.trim().parse().map_err(|_| bad())?;
    let y: f32 = y.trim().parse().map_err(|_| bad())?;
    Ok(Pos2::new(x, y))
}

/// `"x,y x,y ..."` → points. At least one point is required.
pub fn parse_stroke(s: &str) -> Result<Vec<Pos2>> {
    let points = s
        .split_whitespace()
        .map(parse_point)
        .collect::<Result<Vec<_>>>()?;
    if points.is_empty() {
        return Err(ColoringError::InvalidArgument("empty stroke".into()));
    }
    Ok(points)
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

/// Choose the [`SaveFormat`] from the `--format` string or infer it from the
/// output file extension. Defaults to PNG when neither is known.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> SaveFormat {
    if let Some(f) = format_arg {
        return SaveFormat::from_extension(f).unwrap_or_default();
    }
    output.and_then(SaveFormat::from_path).unwrap_or_default()
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: same directory as input, `<stem>_colored.<ext>`
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
    Some(parent.join(format!("{}_colored.{}", stem, ext)))
}
