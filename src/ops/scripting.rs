// ============================================================================
// EDIT SCRIPTS — Rhai-based headless editing
// ============================================================================
//
// Scripts are sandboxed Rhai programs driving the editor through the same
// gesture calls an interactive front-end makes:
//
//   pencil(color, path)              eraser(path)
//   line(color, path)                line(color, x0, y0, x1, y1)
//   rect(...)  ellipse(...)          same overloads as line
//   fill(color, x, y)                paste(file)  paste(file, x, y)
//   undo() -> bool  redo() -> bool   replay()
//   width()  height()  get_pixel(x, y) -> [r, g, b, a]
//   executed_count()  undone_count()
//
// A `path` is an array of `[x, y]` points. The first point anchors the
// gesture, every later one is a drag update. A `color` is a CSS colour
// string or one of "primary" / "secondary".

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rhai::{AST, Array, Dynamic, Engine, EvalAltResult, ImmutableString, Position as RhaiPos};

use crate::canvas::{Color, Position, parse_color};
use crate::components::commands::Command;
use crate::editor::{Editor, EditorError};
use crate::io::load_image;
use crate::log_info;
use crate::settings::EditorSettings;

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ScriptError {
    fn new(message: String, pos: RhaiPos) -> Self {
        // Rhai appends " (line N, position M)"; the location is kept separately
        let message = match message.split_once(" (line ") {
            Some((head, _)) => head.to_string(),
            None => message,
        };
        Self {
            message,
            line: pos.line().filter(|&l| l > 0),
            column: pos.position().filter(|&c| c > 0),
        }
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let (Some(line), Some(col)) = (self.line, self.column) {
            write!(f, "Line {}, Col {}: {}", line, col, self.message)
        } else if let Some(line) = self.line {
            write!(f, "Line {}: {}", line, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ScriptError {}

impl From<&EvalAltResult> for ScriptError {
    fn from(err: &EvalAltResult) -> Self {
        Self::new(err.to_string(), err.position())
    }
}

// ============================================================================
// Palette
// ============================================================================

/// Colours that `primary`, `secondary` and the eraser resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub primary: Color,
    pub secondary: Color,
    pub eraser: Color,
}

impl Palette {
    /// A palette name or any colour [`parse_color`] accepts.
    pub fn resolve(&self, name: &str) -> Result<Color, String> {
        match name.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(self.primary),
            "secondary" => Ok(self.secondary),
            _ => parse_color(name).map_err(|e| e.to_string()),
        }
    }
}

impl From<&EditorSettings> for Palette {
    fn from(settings: &EditorSettings) -> Self {
        Self {
            primary: settings.primary_color,
            secondary: settings.secondary_color,
            eraser: settings.eraser_color,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::from(&EditorSettings::default())
    }
}

// ============================================================================
// Script context — shared between the engine and host functions
// ============================================================================

struct ScriptContext {
    editor: Editor,
    palette: Palette,
    /// Relative `paste` paths resolve against this directory.
    base_dir: PathBuf,
    console_output: Vec<String>,
}

type SharedContext = Arc<Mutex<ScriptContext>>;

type HostResult<T> = Result<T, Box<EvalAltResult>>;

fn lock(ctx: &SharedContext) -> MutexGuard<'_, ScriptContext> {
    ctx.lock().unwrap_or_else(|e| e.into_inner())
}

fn host_err(message: impl AsRef<str>) -> Box<EvalAltResult> {
    message.as_ref().into()
}

// ============================================================================
// Engine construction
// ============================================================================

fn create_engine(ctx: SharedContext) -> Engine {
    let mut engine = Engine::new();

    // ── Sandbox limits ──
    engine.set_max_operations(50_000_000);
    engine.set_max_call_levels(64);
    engine.set_max_expr_depths(64, 64);
    engine.set_max_string_size(10_000);
    engine.set_max_array_size(100_000);
    engine.set_max_map_size(1_000);

    let c = ctx.clone();
    engine.on_print(move |msg| {
        log_info!("script: {}", msg);
        lock(&c).console_output.push(msg.to_string());
    });

    register_canvas_api(&mut engine, ctx.clone());
    register_gesture_api(&mut engine, ctx.clone());
    register_history_api(&mut engine, ctx);

    engine
}

// ============================================================================
// Canvas info API
// ============================================================================

fn register_canvas_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("width", move || -> i64 { lock(&c).editor.surface().width() as i64 });

    let c = ctx.clone();
    engine.register_fn("height", move || -> i64 { lock(&c).editor.surface().height() as i64 });

    // get_pixel(x, y) -> [r, g, b, a], transparent black off-canvas
    let c = ctx;
    engine.register_fn("get_pixel", move |x: i64, y: i64| -> HostResult<Array> {
        let pos = to_position(x, y)?;
        let color = lock(&c).editor.pick_color(pos);
        Ok(color.0.iter().map(|&v| Dynamic::from(v as i64)).collect())
    });
}

// ============================================================================
// Drawing API
// ============================================================================

fn register_gesture_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("pencil", move |color: ImmutableString, path: Array| -> HostResult<()> {
        let mut lock = lock(&c);
        let color = lock.palette.resolve(&color).map_err(host_err)?;
        let (start, drag) = to_path(&path)?;
        gesture(&mut lock.editor, Command::pencil(color, start), &drag)
    });

    let c = ctx.clone();
    engine.register_fn("eraser", move |path: Array| -> HostResult<()> {
        let mut lock = lock(&c);
        let color = lock.palette.eraser;
        let (start, drag) = to_path(&path)?;
        gesture(&mut lock.editor, Command::eraser(color, start), &drag)
    });

    let shapes: [(&str, fn(Color, Position, Position) -> Command); 3] = [
        ("line", Command::line),
        ("rect", Command::rectangle),
        ("ellipse", Command::ellipse),
    ];
    for (name, make) in shapes {
        let c = ctx.clone();
        engine.register_fn(name, move |color: ImmutableString, path: Array| -> HostResult<()> {
            let mut lock = lock(&c);
            let color = lock.palette.resolve(&color).map_err(host_err)?;
            let (anchor, drag) = to_path(&path)?;
            if drag.is_empty() {
                return Err(host_err(format!("{} needs at least two points", name)));
            }
            gesture(&mut lock.editor, make(color, anchor, anchor), &drag)
        });

        let c = ctx.clone();
        engine.register_fn(
            name,
            move |color: ImmutableString, x0: i64, y0: i64, x1: i64, y1: i64| -> HostResult<()> {
                let mut lock = lock(&c);
                let color = lock.palette.resolve(&color).map_err(host_err)?;
                let anchor = to_position(x0, y0)?;
                let end = to_position(x1, y1)?;
                gesture(&mut lock.editor, make(color, anchor, anchor), &[end])
            },
        );
    }

    let c = ctx.clone();
    engine.register_fn("fill", move |color: ImmutableString, x: i64, y: i64| -> HostResult<()> {
        let mut lock = lock(&c);
        let color = lock.palette.resolve(&color).map_err(host_err)?;
        let seed = to_position(x, y)?;
        lock.editor
            .execute_and_record(Command::flood_fill(color, seed))
            .map_err(editor_err)
    });

    let c = ctx.clone();
    engine.register_fn("paste", move |file: ImmutableString| -> HostResult<()> {
        paste(&c, &file, Position::new(0, 0))
    });

    let c = ctx;
    engine.register_fn("paste", move |file: ImmutableString, x: i64, y: i64| -> HostResult<()> {
        paste(&c, &file, to_position(x, y)?)
    });
}

fn paste(ctx: &SharedContext, file: &str, offset: Position) -> HostResult<()> {
    let mut lock = lock(ctx);
    let path = Path::new(file);
    let full = if path.is_absolute() {
        path.to_path_buf()
    } else {
        lock.base_dir.join(path)
    };
    // Decoded up front so the recorded command never waits on I/O
    let image = load_image(&full).map_err(|e| host_err(format!("{}: {}", full.display(), e)))?;
    lock.editor
        .execute_and_record(Command::paste_at(image, offset))
        .map_err(editor_err)
}

// ============================================================================
// History API
// ============================================================================

fn register_history_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("undo", move || -> bool { lock(&c).editor.undo() });

    let c = ctx.clone();
    engine.register_fn("redo", move || -> bool { lock(&c).editor.redo() });

    let c = ctx.clone();
    engine.register_fn("replay", move || lock(&c).editor.replay_commands());

    let c = ctx.clone();
    engine.register_fn("executed_count", move || -> i64 { lock(&c).editor.executed_len() as i64 });

    let c = ctx;
    engine.register_fn("undone_count", move || -> i64 { lock(&c).editor.undone_len() as i64 });
}

// ============================================================================
// Argument conversion
// ============================================================================

fn to_position(x: i64, y: i64) -> HostResult<Position> {
    let coord = |v: i64| {
        i32::try_from(v).map_err(|_| host_err(format!("coordinate {} is out of range", v)))
    };
    Ok(Position::new(coord(x)?, coord(y)?))
}

fn to_point(value: &Dynamic) -> HostResult<Position> {
    let invalid = || host_err(format!("expected a point [x, y], got {}", value));
    let pair = value.clone().try_cast::<Array>().ok_or_else(invalid)?;
    match pair.as_slice() {
        [x, y] => {
            let x = x.as_int().map_err(|_| invalid())?;
            let y = y.as_int().map_err(|_| invalid())?;
            to_position(x, y)
        }
        _ => Err(invalid()),
    }
}

/// Split a point array into its anchor and the drag updates after it.
fn to_path(points: &Array) -> HostResult<(Position, Vec<Position>)> {
    let (first, rest) = points
        .split_first()
        .ok_or_else(|| host_err("a path needs at least one point"))?;
    let drag = rest.iter().map(to_point).collect::<HostResult<Vec<_>>>()?;
    Ok((to_point(first)?, drag))
}

fn editor_err(e: EditorError) -> Box<EvalAltResult> {
    host_err(e.to_string())
}

fn gesture(editor: &mut Editor, command: Command, drag: &[Position]) -> HostResult<()> {
    editor.begin(command).map_err(editor_err)?;
    for &pos in drag {
        editor.grow(pos).map_err(editor_err)?;
    }
    editor.commit().map_err(editor_err)
}

// ============================================================================
// Public execution API
// ============================================================================

/// Compile a script without running it.
pub fn compile_script(source: &str) -> Result<AST, ScriptError> {
    let engine = Engine::new();
    engine
        .compile(source)
        .map_err(|e| ScriptError::new(e.to_string(), e.position()))
}

/// Run a compiled script against `editor` on the calling thread.
///
/// Relative `paste` paths resolve against `base_dir`. Returns the lines the
/// script printed. Commands completed before an error stay in the history.
pub fn run_script(
    editor: &mut Editor,
    ast: &AST,
    palette: &Palette,
    base_dir: &Path,
) -> Result<Vec<String>, ScriptError> {
    let ctx = Arc::new(Mutex::new(ScriptContext {
        editor: std::mem::replace(editor, Editor::new(0, 0)),
        palette: *palette,
        base_dir: base_dir.to_path_buf(),
        console_output: Vec::new(),
    }));

    let engine = create_engine(ctx.clone());
    let result = engine.run_ast(ast);

    let mut lock = lock(&ctx);
    *editor = std::mem::replace(&mut lock.editor, Editor::new(0, 0));
    result.map_err(|e| ScriptError::from(&*e))?;
    Ok(std::mem::take(&mut lock.console_output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn run(editor: &mut Editor, source: &str) -> Result<Vec<String>, ScriptError> {
        let ast = compile_script(source)?;
        run_script(editor, &ast, &Palette::default(), Path::new("."))
    }

    #[test]
    fn syntax_errors_carry_line_and_column() {
        let err = compile_script("pencil(\"#f00\", [[0, 0]]);\nline(\"#fff\", [[0, 0]];").unwrap_err();
        assert_eq!(err.line, Some(2));
        assert!(err.column.is_some());
        assert!(!err.message.contains("(line "));
        assert!(err.to_string().starts_with("Line 2, Col "));
    }

    #[test]
    fn running_a_script_drives_the_history() {
        let mut editor = Editor::new(8, 8);
        run(
            &mut editor,
            "rect(\"#f00\", [[0, 0], [9, 9], [4, 4]]);\nfill(\"#00f\", 8, 8);\nundo();",
        )
        .unwrap();
        assert_eq!(editor.executed_len(), 1);
        assert_eq!(editor.undone_len(), 1);
        // Only the final drag corner counts
        assert_eq!(editor.surface().opaque_pixel_count(), 16);
    }

    #[test]
    fn palette_names_resolve() {
        let palette = Palette::default();
        let mut editor = Editor::new(1, 1);
        run(&mut editor, "pencil(\"secondary\", [[0, 0]]);").unwrap();
        assert_eq!(editor.pick_color(Position::new(0, 0)), palette.secondary);
        run(&mut editor, "eraser([[0, 0]]);").unwrap();
        assert_eq!(editor.pick_color(Position::new(0, 0)), Rgba([0, 0, 0, 0]));
        assert_eq!(editor.executed_len(), 2);
    }

    #[test]
    fn shape_overloads_take_corners_or_paths() {
        let mut editor = Editor::new(4, 2);
        run(&mut editor, "line(\"primary\", 0, 0, 3, 0);\nline(\"#0f0\", [[0, 1], [3, 1]]);")
            .unwrap();
        for x in 0..4 {
            assert_eq!(editor.pick_color(Position::new(x, 0)), Palette::default().primary);
            assert_eq!(editor.pick_color(Position::new(x, 1)), Rgba([0, 255, 0, 255]));
        }
        let err = run(&mut editor, "ellipse(\"#fff\", [[1, 1]]);").unwrap_err();
        assert!(err.message.contains("at least two points"));
    }

    #[test]
    fn scripts_can_loop_and_read_back() {
        let mut editor = Editor::new(4, 3);
        let printed = run(
            &mut editor,
            r##"
            for x in 0..width() {
                pencil("#f00", [[x, 0]]);
            }
            let px = get_pixel(0, 0);
            if px[0] == 255 && px[3] == 255 {
                fill("#00f", 0, height() - 1);
            }
            print(`${executed_count()} / ${undone_count()}`);
            "##,
        )
        .unwrap();
        assert_eq!(editor.executed_len(), 5);
        assert_eq!(editor.pick_color(Position::new(3, 2)), Rgba([0, 0, 255, 255]));
        assert_eq!(printed, vec!["5 / 0".to_string()]);
    }

    #[test]
    fn runtime_errors_report_their_line_and_keep_earlier_edits() {
        let mut editor = Editor::new(3, 3);
        let err = run(&mut editor, "fill(\"#fff\", 0, 0);\nfill(\"not-a-colour\", 1, 1);").unwrap_err();
        assert_eq!(err.line, Some(2));
        assert_eq!(editor.surface().width(), 3);
        assert_eq!(editor.executed_len(), 1);
    }

    #[test]
    fn bad_points_are_rejected() {
        let mut editor = Editor::new(2, 2);
        assert!(run(&mut editor, "pencil(\"#fff\", [[0, 0, 0]]);").is_err());
        assert!(run(&mut editor, "pencil(\"#fff\", [\"0,0\"]);").is_err());
        assert!(run(&mut editor, "pencil(\"#fff\", []);").is_err());
        assert!(run(&mut editor, "fill(\"#fff\", 9999999999, 0);").is_err());
        assert_eq!(editor.executed_len(), 0);
    }

    #[test]
    fn missing_paste_source_reports_its_line() {
        let ast = compile_script("\npaste(\"nowhere.png\");").unwrap();
        let mut editor = Editor::new(2, 2);
        let err = run_script(&mut editor, &ast, &Palette::default(), Path::new("/no/such/dir"))
            .unwrap_err();
        assert_eq!(err.line, Some(2));
        assert!(err.message.contains("nowhere.png"));
        assert_eq!(editor.executed_len(), 0);
    }
}
