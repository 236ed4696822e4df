// ============================================================================
// LayerFE CLI — headless flattening via command-line arguments
// ============================================================================
//
// Usage examples:
//   layerfe --scene poster/scene.json --output poster.png
//   layerfe -i background.png overlay.png -o stacked.png
//   layerfe -i "shots/*.png" -o contact.png --config my.cfg
//
// A scene manifest places every layer explicitly; plain inputs are stacked at
// the origin at their native pixel size, first input at the bottom.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{ArgGroup, Parser};
use egui::pos2;

use crate::canvas::LayerPatch;
use crate::error::{ComposeError, ComposeResult};
use crate::io::{self, SceneLayer, SceneManifest};
use crate::ops::ai::PrecomputedMaskService;
use crate::project::Project;
use crate::settings::AppSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// LayerFE headless compositor.
#[derive(Parser, Debug)]
#[command(
    name = "layerfe",
    about = "Flatten layered compositions to PNG",
    long_about = "Composite image layers (position, rotation, scale, opacity, blend mode,\n\
                  color correction, background masks) and write the flattened result.\n\n\
                  Example:\n  \
                  layerfe --scene scene.json --output out.png\n  \
                  layerfe -i \"layers/*.png\" -o out.png"
)]
#[command(group(ArgGroup::new("source").required(true).args(["input", "scene"])))]
pub struct CliArgs {
    /// Input image(s), stacked in order. Glob patterns accepted (e.g. "*.png").
    #[arg(short, long, num_args = 1..)]
    pub input: Vec<String>,

    /// JSON scene manifest describing every layer.
    #[arg(short, long, value_name = "SCENE.json")]
    pub scene: Option<PathBuf>,

    /// Output PNG path. Defaults to the configured export file name.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Settings file to use instead of the per-user one.
    #[arg(short, long, value_name = "FILE.cfg")]
    pub config: Option<PathBuf>,

    /// Print per-layer progress and timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Settings named by `--config`, or the per-user file.
    pub fn load_settings(&self) -> AppSettings {
        match &self.config {
            Some(path) => AppSettings::load_from(path),
            None => AppSettings::load(),
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run one flatten job and return an OS exit code.
/// `0` = output written, `1` = anything failed.
pub fn run(args: CliArgs, settings: AppSettings) -> ExitCode {
    let start = Instant::now();
    match execute(&args, settings) {
        Ok(output) => {
            log::info!("cli: wrote {}", output.display());
            if args.verbose {
                println!(
                    "  → {} ({:.0}ms)",
                    output.display(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            log::error!("cli: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Build the project from the arguments, flatten it and write the PNG.
/// Returns the path written.
fn execute(args: &CliArgs, settings: AppSettings) -> ComposeResult<PathBuf> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.export_file_name));

    let mut project = Project::new_untitled(settings);
    match &args.scene {
        Some(scene) => load_scene(&mut project, scene, args.verbose)?,
        None => load_inputs(&mut project, &args.input, args.verbose)?,
    }
    write_output(&project, &output)?;
    Ok(output)
}

fn write_output(project: &Project, output: &Path) -> ComposeResult<()> {
    let png = project.export_png()?;
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    io::write_bytes(output, &png)
}

// ============================================================================
// Layer loading
// ============================================================================

fn load_inputs(project: &mut Project, patterns: &[String], verbose: bool) -> ComposeResult<()> {
    let inputs = resolve_inputs(patterns);
    if inputs.is_empty() {
        return Err(ComposeError::Scene("no input files matched the given pattern(s)".into()));
    }
    let total = inputs.len();
    for (idx, path) in inputs.iter().enumerate() {
        if verbose {
            println!("[{}/{}] {}", idx + 1, total, path.display());
        }
        let bytes = io::read_bytes(path)?;
        project.import_image_native(Some(io::layer_name_for(path)), bytes, pos2(0.0, 0.0))?;
    }
    Ok(())
}

fn load_scene(project: &mut Project, path: &Path, verbose: bool) -> ComposeResult<()> {
    let scene = SceneManifest::load(path)?;
    if scene.layers.is_empty() {
        return Err(ComposeError::Scene(format!("'{}' lists no layers", path.display())));
    }
    let total = scene.layers.len();
    for (idx, layer) in scene.layers.iter().enumerate() {
        if verbose {
            println!("[{}/{}] {}", idx + 1, total, layer.image.display());
        }
        add_scene_layer(project, layer, idx as i64)?;
    }
    Ok(())
}

fn add_scene_layer(project: &mut Project, entry: &SceneLayer, default_z: i64) -> ComposeResult<()> {
    let bytes = io::read_bytes(&entry.image)?;
    let name = entry.name.clone().unwrap_or_else(|| io::layer_name_for(&entry.image));
    let position = pos2(entry.x, entry.y);
    let id = match entry.width {
        Some(width) => project.import_image(Some(name), bytes, position, width)?,
        None => project.import_image_native(Some(name), bytes, position)?,
    };

    project.update_layer(
        id,
        &LayerPatch {
            rotation: Some(entry.rotation),
            scale: Some(entry.scale),
            opacity: Some(entry.opacity),
            blend_mode: Some(entry.blend_mode),
            visible: Some(entry.visible),
            locked: Some(entry.locked),
            z_index: Some(entry.z_index.unwrap_or(default_z)),
            color_correction: Some(entry.color_correction),
            ..Default::default()
        },
    );

    if let Some(mask) = &entry.mask {
        let service = PrecomputedMaskService::from_file(mask)?;
        pollster::block_on(project.toggle_background_removal(&service, id))?;
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand each pattern in order, keeping the first occurrence of every path.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    patterns
        .iter()
        .flat_map(|pattern| expand_pattern(pattern))
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

/// Glob matches for `pattern`. A pattern that matches nothing still counts
/// when it names an existing file, so names like `shot[1].png` work.
fn expand_pattern(pattern: &str) -> Vec<PathBuf> {
    let matches: Vec<PathBuf> = match glob::glob(pattern) {
        Ok(paths) => paths.filter_map(Result::ok).collect(),
        Err(e) => {
            log::debug!("cli: '{}' is not a glob ({}), trying it as a path", pattern, e);
            Vec::new()
        }
    };
    if !matches.is_empty() {
        return matches;
    }
    let literal = PathBuf::from(pattern);
    if literal.is_file() {
        return vec![literal];
    }
    log::warn!("cli: input '{}' matched no files", pattern);
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("layerfe-cli-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path, w: u32, h: u32, px: [u8; 4]) {
        let bytes = io::encode_png(&RgbaImage::from_pixel(w, h, Rgba(px))).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn args_require_a_source() {
        assert!(CliArgs::try_parse_from(["layerfe", "-o", "x.png"]).is_err());
        let args = CliArgs::try_parse_from(["layerfe", "-i", "a.png", "b.png", "-o", "x.png"]).unwrap();
        assert_eq!(args.input, vec!["a.png", "b.png"]);
        let args = CliArgs::try_parse_from(["layerfe", "--scene", "s.json"]).unwrap();
        assert_eq!(args.scene, Some(PathBuf::from("s.json")));
    }

    #[test]
    fn glob_inputs_are_sorted_and_deduplicated() {
        let dir = temp_dir();
        write_png(&dir.join("b.png"), 1, 1, [0; 4]);
        write_png(&dir.join("a.png"), 1, 1, [0; 4]);
        let pattern = dir.join("*.png").to_string_lossy().into_owned();
        let literal = dir.join("a.png").to_string_lossy().into_owned();
        let found = resolve_inputs(&[literal, pattern]);
        assert_eq!(found, vec![dir.join("a.png"), dir.join("b.png")]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bracketed_file_name_is_taken_literally() {
        let dir = temp_dir();
        let name = dir.join("shot[1].png");
        write_png(&name, 1, 1, [0; 4]);
        let found = resolve_inputs(&[name.to_string_lossy().into_owned()]);
        assert_eq!(found, vec![name]);
        assert!(resolve_inputs(&[dir.join("none-*.png").to_string_lossy().into_owned()]).is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn scene_run_writes_flattened_png() {
        let dir = temp_dir();
        write_png(&dir.join("bg.png"), 4, 4, [255, 0, 0, 255]);
        write_png(&dir.join("fg.png"), 2, 2, [0, 0, 255, 255]);
        write_png(&dir.join("fg_mask.png"), 2, 2, [0, 0, 0, 255]);
        std::fs::write(
            dir.join("scene.json"),
            r#"{ "layers": [
                { "image": "fg.png", "x": 1, "y": 1, "zIndex": 2, "mask": "fg_mask.png" },
                { "image": "bg.png", "zIndex": 1 }
            ] }"#,
        )
        .unwrap();

        let out = dir.join("nested").join("out.png");
        let args = CliArgs::try_parse_from([
            "layerfe".to_string(),
            "--scene".to_string(),
            dir.join("scene.json").to_string_lossy().into_owned(),
            "-o".to_string(),
            out.to_string_lossy().into_owned(),
        ])
        .unwrap();
        assert_eq!(execute(&args, AppSettings::default()).unwrap(), out);

        // The masked foreground is fully transparent, so red shows everywhere.
        let img = io::decode_image(&std::fs::read(&out).unwrap()).unwrap();
        assert_eq!(img.dimensions(), (4, 4));
        assert!(img.pixels().all(|p| *p == Rgba([255, 0, 0, 255])));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_inputs_fail() {
        let dir = temp_dir();
        let args = CliArgs::try_parse_from([
            "layerfe".to_string(),
            "-i".to_string(),
            dir.join("nothing-*.png").to_string_lossy().into_owned(),
            "-o".to_string(),
            dir.join("out.png").to_string_lossy().into_owned(),
        ])
        .unwrap();
        assert!(execute(&args, AppSettings::default()).is_err());
        assert!(!dir.join("out.png").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
