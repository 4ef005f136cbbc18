//! lamina CLI - run compiled block programs from the command line.
//!
//! `run` interprets a program JSON, drains any debounced reslice, and
//! optionally writes the wire and layer artifacts to disk. `info`
//! pretty-prints the command tree without executing it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lamina_engine::{Interpreter, MeshSource, SceneObject, SceneSink};
use lamina_ir::{Command, Program};
use lamina_math::Point3;
use lamina_wire::wire_trace;

#[derive(Parser)]
#[command(name = "lamina")]
#[command(about = "Run compiled lamina block programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interpret a program and print a scene summary
    Run {
        /// Path to the program JSON
        program: PathBuf,
        /// Directory to write wire CSVs and layer SVGs into
        #[arg(long)]
        out: Option<PathBuf>,
        /// How long to wait before draining debounced reslices (ms)
        #[arg(long, default_value_t = 400)]
        tick_ms: u64,
    },
    /// Display the command tree of a program without running it
    Info {
        /// Path to the program JSON
        program: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            program,
            out,
            tick_ms,
        } => run_program(&program, out.as_deref(), tick_ms),
        Commands::Info { program } => show_info(&program),
    }
}

/// Filesystem mesh source: asset paths resolve relative to the
/// program file's directory.
struct FsSource {
    base: PathBuf,
}

impl MeshSource for FsSource {
    fn load(&self, path: &str) -> std::io::Result<Vec<u8>> {
        fs::read(self.base.join(path))
    }
}

/// Scene sink that keeps per-object triangle counts for the end-of-run
/// summary instead of rendering anything.
#[derive(Default)]
struct SummaryScene {
    objects: std::collections::BTreeMap<String, usize>,
    lines: std::collections::BTreeMap<String, usize>,
    removed: usize,
    framed: Option<(Point3, f64)>,
}

impl SceneSink for SummaryScene {
    fn add_object(&mut self, id: &str, object: &SceneObject) {
        self.objects
            .insert(id.to_string(), object.mesh.num_triangles());
    }

    fn add_lines(&mut self, id: &str, rings: &[Vec<Point3>]) {
        self.lines.insert(id.to_string(), rings.len());
    }

    fn remove_object(&mut self, id: &str) {
        if self.objects.remove(id).is_some() || self.lines.remove(id).is_some() {
            self.removed += 1;
        }
    }

    fn clear(&mut self) {
        self.removed += self.objects.len() + self.lines.len();
        self.objects.clear();
        self.lines.clear();
    }

    fn frame(&mut self, center: Point3, size: f64) {
        self.framed = Some((center, size));
    }
}

fn load_program(path: &Path) -> Result<Program> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Program::from_json(&json).with_context(|| format!("parsing {}", path.display()))
}

fn run_program(path: &Path, out: Option<&Path>, tick_ms: u64) -> Result<()> {
    let program = load_program(path)?;
    let base = path.parent().unwrap_or(Path::new(".")).to_path_buf();
    let mut engine = Interpreter::new(SummaryScene::default(), FsSource { base });

    engine.run(&program);

    // Let any debounced transform edits settle, then drain the reslice.
    std::thread::sleep(Duration::from_millis(tick_ms));
    if engine.tick(Instant::now()) {
        println!("Resliced stacked layers after transform edits");
    }

    if let Some(dir) = out {
        write_artifacts(&engine, dir)?;
    }

    print_summary(&engine);
    Ok(())
}

fn write_artifacts(
    engine: &Interpreter<SummaryScene, FsSource>,
    dir: &Path,
) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    // One CSV per wire: an ordered point list, two decimal places.
    for group in engine.wire_groups() {
        for (i, wire) in group.wires.iter().enumerate() {
            let mut csv = String::from("x,y,z\n");
            for [x, y, z] in wire_trace(wire) {
                csv.push_str(&format!("{x},{y},{z}\n"));
            }
            let file = dir.join(format!("{}-wire-{i}.csv", group.id));
            fs::write(&file, csv).with_context(|| format!("writing {}", file.display()))?;
            println!("Wrote {}", file.display());
        }
    }

    for outline in engine.layer_exports() {
        let file = dir.join(format!("layer-{}.svg", outline.layer_index));
        fs::write(&file, outline_svg(&outline.points))
            .with_context(|| format!("writing {}", file.display()))?;
        println!("Wrote {}", file.display());
    }

    Ok(())
}

/// Minimal SVG wrapper around one outline polygon. The points arrive
/// already shifted to the export canvas origin.
fn outline_svg(points: &[(f64, f64)]) -> String {
    let max_x = points.iter().map(|p| p.0).fold(0.0, f64::max);
    let max_y = points.iter().map(|p| p.1).fold(0.0, f64::max);
    let coords: Vec<String> = points.iter().map(|(x, y)| format!("{x},{y}")).collect();
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}mm\" height=\"{}mm\" \
         viewBox=\"0 0 {} {}\">\n  <polygon points=\"{}\" fill=\"none\" stroke=\"black\" \
         stroke-width=\"0.2\"/>\n</svg>\n",
        max_x + 10.0,
        max_y + 10.0,
        max_x + 10.0,
        max_y + 10.0,
        coords.join(" ")
    )
}

fn print_summary(engine: &Interpreter<SummaryScene, FsSource>) {
    let scene = engine.scene();
    println!(
        "Scene: {} object(s)",
        scene.objects.len() + scene.lines.len()
    );
    for (id, triangles) in &scene.objects {
        println!("  {id}: {triangles} triangle(s)");
    }
    for (id, rings) in &scene.lines {
        println!("  {id}: {rings} line ring(s)");
    }
    if let Some((center, size)) = &scene.framed {
        println!(
            "Camera framed at ({:.1}, {:.1}, {:.1}), size {:.1}",
            center.x, center.y, center.z, size
        );
    }
    if !engine.wire_groups().is_empty() {
        let wires: usize = engine.wire_groups().iter().map(|g| g.wires.len()).sum();
        println!(
            "Wires: {} group(s), {} wire(s)",
            engine.wire_groups().len(),
            wires
        );
    }
    if !engine.layers().is_empty() {
        println!("Stacked layers: {}", engine.layers().len());
    }
    for control in engine.controls() {
        println!("Control: {}", control.id());
    }
}

fn show_info(path: &Path) -> Result<()> {
    let program = load_program(path)?;
    println!("lamina program: {}", path.display());
    println!("  Version: {}", program.version);
    println!("  Top-level commands: {}", program.commands.len());
    println!();
    for command in &program.commands {
        print_tree(command, 1);
    }
    Ok(())
}

fn print_tree(command: &Command, depth: usize) {
    println!("{}{}", "  ".repeat(depth), command.op.kind());
    for child in &command.children {
        print_tree(child, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lamina_ir::Op;

    #[test]
    fn artifacts_write_one_csv_per_wire() {
        let source = FsSource {
            base: PathBuf::from("."),
        };
        let mut engine = Interpreter::new(SummaryScene::default(), source);
        engine.process(&Command::new(Op::CreateCube { size: 20.0 }));
        engine.process(&Command::new(Op::GenerateWireMesh {
            h_count: 2,
            v_count: 1,
            thickness: 1.0,
            use_tubes: false,
        }));
        assert_eq!(engine.wire_groups().len(), 1);
        let group_id = engine.wire_groups()[0].id.clone();

        let dir = std::env::temp_dir().join(format!("lamina-cli-{}", std::process::id()));
        write_artifacts(&engine, &dir).unwrap();
        for i in 0..3 {
            let file = dir.join(format!("{group_id}-wire-{i}.csv"));
            let text = fs::read_to_string(&file).unwrap();
            assert!(text.starts_with("x,y,z\n"));
            assert!(text.lines().count() > 4);
        }
        fs::remove_dir_all(&dir).unwrap();
    }
}
