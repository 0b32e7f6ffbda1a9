// ============================================================================
// StickerFE CLI — headless batch export via command-line arguments
// ============================================================================
//
// Usage examples:
//   stickerfe --input comp.stkr --output sticker.png
//   stickerfe -i comp.stkr -o out.jpg --quality 85
//   stickerfe -i "saved/*.stkr" --output-dir exports/ --format png
//
// No GUI is opened in CLI mode.  Each project file is composited on the
// current thread and written straight to disk.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;

use crate::assets::ImageStore;
use crate::io::{self, ExportFormat};
use crate::ops::compose;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// StickerFE headless exporter.
///
/// Render saved compositions to raster images without opening the GUI.
#[derive(Parser, Debug)]
#[command(
    name = "stickerfe",
    about = "StickerFE headless composition exporter",
    long_about = "Render .stkr composition files to PNG or JPEG without opening\n\
                  the GUI.\n\n\
                  Example:\n  \
                  stickerfe --input comp.stkr --output sticker.png\n  \
                  stickerfe -i \"saved/*.stkr\" --output-dir exports/ --format png"
)]
pub struct CliArgs {
    /// Input .stkr project file(s).  Glob patterns accepted (e.g. "*.stkr").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path.  Only valid for single-file input.
    /// For batch input use --output-dir instead.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch export.
    /// Files are written here with the original stem and the target format's extension.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png or jpeg.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100, default 90).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process
    /// arguments.  Used by `main()` to route before creating a window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

/// Run the headless exporter.  Returns the process exit code: 0 on full
/// success, 1 when any input failed.
pub fn run(args: CliArgs) -> i32 {
    let inputs = expand_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("stickerfe: no input files matched");
        return 1;
    }
    if args.output.is_some() && inputs.len() > 1 {
        eprintln!("stickerfe: --output is only valid for a single input; use --output-dir");
        return 1;
    }

    let forced_format = match &args.format {
        Some(name) => match ExportFormat::from_extension(name) {
            Some(f) => Some(f),
            None => {
                eprintln!("stickerfe: unknown format {:?} (expected png or jpeg)", name);
                return 1;
            }
        },
        None => None,
    };

    let mut failures = 0;
    for input in &inputs {
        let started = Instant::now();
        match export_one(input, &args, forced_format) {
            Ok(out_path) => {
                if args.verbose {
                    println!(
                        "{} -> {} ({} ms)",
                        input.display(),
                        out_path.display(),
                        started.elapsed().as_millis()
                    );
                }
            }
            Err(e) => {
                eprintln!("{}: {}", input.display(), e);
                failures += 1;
            }
        }
    }

    if failures == 0 { 0 } else { 1 }
}

/// Expand glob patterns into concrete paths.  Literal paths that exist pass
/// through untouched.
fn expand_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut inputs = Vec::new();
    for pattern in patterns {
        let literal = Path::new(pattern);
        if literal.exists() {
            inputs.push(literal.to_path_buf());
            continue;
        }
        match glob::glob(pattern) {
            Ok(matches) => {
                let before = inputs.len();
                inputs.extend(matches.flatten());
                if inputs.len() == before {
                    eprintln!("stickerfe: no files match {:?}", pattern);
                }
            }
            Err(e) => eprintln!("stickerfe: bad pattern {:?}: {}", pattern, e),
        }
    }
    inputs
}

fn export_one(
    input: &Path,
    args: &CliArgs,
    forced_format: Option<ExportFormat>,
) -> Result<PathBuf, String> {
    let surface = io::load_project(input)?;

    let out_path = resolve_output_path(input, args, forced_format);
    let format = forced_format
        .or_else(|| ExportFormat::from_path(&out_path))
        .unwrap_or_default();

    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }
    }

    let mut store = ImageStore::default();
    let img = compose::render(&surface, &mut store);
    io::encode_and_write(&out_path, &img, format, args.quality)?;
    Ok(out_path)
}

/// Pick the output path: explicit --output, else --output-dir (or the
/// input's directory) with the input stem and the format's extension.
fn resolve_output_path(input: &Path, args: &CliArgs, forced_format: Option<ExportFormat>) -> PathBuf {
    if let Some(out) = &args.output {
        return out.clone();
    }
    let dir = args
        .output_dir
        .clone()
        .or_else(|| input.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "composition".to_string());
    let ext = forced_format.unwrap_or_default().extension();
    dir.join(format!("{}.{}", stem, ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(input: &[&str]) -> CliArgs {
        CliArgs {
            input: input.iter().map(|s| s.to_string()).collect(),
            output: None,
            output_dir: None,
            format: None,
            quality: 90,
            verbose: false,
        }
    }

    #[test]
    fn output_path_defaults_beside_the_input() {
        let a = args(&["x"]);
        let out = resolve_output_path(Path::new("saved/comp.stkr"), &a, None);
        assert_eq!(out, PathBuf::from("saved/comp.png"));
    }

    #[test]
    fn output_dir_and_format_shape_the_path() {
        let mut a = args(&["x"]);
        a.output_dir = Some(PathBuf::from("exports"));
        let out = resolve_output_path(
            Path::new("saved/comp.stkr"),
            &a,
            Some(ExportFormat::Jpeg),
        );
        assert_eq!(out, PathBuf::from("exports/comp.jpg"));
    }

    #[test]
    fn explicit_output_wins() {
        let mut a = args(&["x"]);
        a.output = Some(PathBuf::from("final.png"));
        let out = resolve_output_path(Path::new("comp.stkr"), &a, None);
        assert_eq!(out, PathBuf::from("final.png"));
    }

    #[test]
    fn end_to_end_export_of_a_saved_project() {
        use crate::surface::{ImageRef, PlacedElement, SurfaceState};

        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("comp.stkr");
        let out_path = dir.path().join("comp.png");

        let mut surface = SurfaceState::new(240, 240);
        surface.base.image = Some(ImageRef::Builtin("character.berry".into()));
        surface.elements.push(PlacedElement::new(
            ImageRef::Builtin("part.star".into()),
            70.0,
            70.0,
        ));
        io::save_project(&project_path, &surface).unwrap();

        let mut a = args(&[project_path.to_str().unwrap()]);
        a.output = Some(out_path.clone());
        assert_eq!(run(a), 0);

        let exported = image::open(&out_path).unwrap().to_rgba8();
        assert_eq!((exported.width(), exported.height()), (240, 240));
    }
}
