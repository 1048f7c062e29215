use image::RgbaImage;

use crate::canvas::{Color, Position, Snapshot, Surface};
use crate::components::commands::Command;
use crate::components::history::History;
use crate::{log_info, log_warn};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorError {
    /// `begin` (or a one-shot execute) while a gesture is still live.
    GestureInProgress,
    /// `grow` / `commit` / `cancel` with no gesture to act on.
    NoActiveGesture,
    /// Setup commands are only accepted before the first edit.
    SetupAfterEdits,
}

impl std::fmt::Display for EditorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditorError::GestureInProgress => write!(f, "a gesture is already in progress"),
            EditorError::NoActiveGesture => write!(f, "no gesture is in progress"),
            EditorError::SetupAfterEdits => {
                write!(f, "setup commands must be added before any edit")
            }
        }
    }
}

impl std::error::Error for EditorError {}

// ============================================================================
// EDITOR — surface + history + the live gesture
// ============================================================================

/// Callback fired with the surface whenever a tainting command was applied.
pub type CanvasObserver = Box<dyn FnMut(&Surface) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    Idle,
    GestureActive,
}

/// A command being grown, plus the surface as it was at `begin`.
struct Gesture {
    command: Command,
    snapshot: Snapshot,
}

/// One editable canvas and its history.
///
/// Every mutation goes through a [`Command`]. Undo and redo rebuild the
/// surface from scratch, so the surface after any history operation equals
/// a replay of setup followed by the executed stack.
pub struct Editor {
    surface: Surface,
    history: History,
    gesture: Option<Gesture>,
    observers: Vec<CanvasObserver>,
}

impl Editor {
    /// Fully transparent `width × height` canvas with an empty history.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: Surface::new(width, height),
            history: History::new(),
            gesture: None,
            observers: Vec::new(),
        }
    }

    /// Canvas sized to `image`, which becomes the first setup command.
    pub fn from_image(image: RgbaImage) -> Self {
        let mut editor = Self::new(image.width(), image.height());
        editor.install_setup(Command::paste(image));
        editor
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn state(&self) -> EditorState {
        if self.gesture.is_some() {
            EditorState::GestureActive
        } else {
            EditorState::Idle
        }
    }

    /// The command currently being grown, if any.
    pub fn gesture_command(&self) -> Option<&Command> {
        self.gesture.as_ref().map(|g| &g.command)
    }

    pub fn on_canvas_change(&mut self, observer: impl FnMut(&Surface) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Eye dropper. Transparent black off-canvas.
    pub fn pick_color(&self, pos: Position) -> Color {
        self.surface.get_pixel(pos)
    }

    pub fn executed_len(&self) -> usize {
        self.history.executed_len()
    }

    pub fn undone_len(&self) -> usize {
        self.history.undone_len()
    }

    // ---- one-shot commands --------------------------------------------------

    /// Apply `command` now and replay it on every future reset. Only valid
    /// before the first edit and outside a gesture.
    pub fn add_setup_command(&mut self, command: Command) -> Result<(), EditorError> {
        self.ensure_idle()?;
        if self.history.executed_len() > 0 || self.history.undone_len() > 0 {
            return Err(EditorError::SetupAfterEdits);
        }
        self.install_setup(command);
        Ok(())
    }

    /// Apply `command` and notify observers when it taints the canvas.
    /// Does not touch the history.
    pub fn execute_command(&mut self, command: &Command) -> Result<(), EditorError> {
        self.ensure_idle()?;
        self.apply_command(command);
        Ok(())
    }

    /// Append an already-applied command to the history.
    pub fn record_command(&mut self, command: Command) -> Result<(), EditorError> {
        self.ensure_idle()?;
        self.push_executed(command);
        Ok(())
    }

    /// Apply and record in one step.
    pub fn execute_and_record(&mut self, command: Command) -> Result<(), EditorError> {
        self.ensure_idle()?;
        self.apply_command(&command);
        self.push_executed(command);
        Ok(())
    }

    /// The surface has a single writer while a gesture is live.
    fn ensure_idle(&self) -> Result<(), EditorError> {
        match self.gesture {
            Some(_) => Err(EditorError::GestureInProgress),
            None => Ok(()),
        }
    }

    fn install_setup(&mut self, command: Command) {
        self.apply_command(&command);
        log_info!("Setup {}", command.description());
        self.history.push_setup(command);
    }

    fn apply_command(&mut self, command: &Command) {
        command.apply(&mut self.surface);
        notify(&mut self.observers, command, &self.surface);
    }

    fn push_executed(&mut self, command: Command) {
        log_info!("Recorded {}", command.description());
        self.history.record(command);
    }

    // ---- gestures -----------------------------------------------------------

    /// Start growing `command`. Strokes preview their start pixel right away;
    /// two-point shapes paint nothing until the first `grow`.
    pub fn begin(&mut self, mut command: Command) -> Result<(), EditorError> {
        self.ensure_idle()?;
        let snapshot = self.surface.save();
        if command.begin_preview(&mut self.surface) {
            notify(&mut self.observers, &command, &self.surface);
        }
        self.gesture = Some(Gesture { command, snapshot });
        Ok(())
    }

    /// Advance the live gesture to `pos` and refresh its preview.
    pub fn grow(&mut self, pos: Position) -> Result<(), EditorError> {
        let Editor {
            surface,
            gesture,
            observers,
            ..
        } = self;
        let gesture = gesture.as_mut().ok_or(EditorError::NoActiveGesture)?;
        gesture.command.grow(surface, &gesture.snapshot, pos);
        notify(observers, &gesture.command, surface);
        Ok(())
    }

    /// Finish the live gesture and record it.
    ///
    /// The preview is replaced with a full apply over the begin-snapshot, so
    /// the committed surface is exactly what a replay would produce.
    pub fn commit(&mut self) -> Result<(), EditorError> {
        let Gesture { command, snapshot } =
            self.gesture.take().ok_or(EditorError::NoActiveGesture)?;
        self.surface.restore(&snapshot);
        self.apply_command(&command);
        self.push_executed(command);
        Ok(())
    }

    /// Drop the live gesture without recording it and roll back its preview.
    pub fn cancel(&mut self) -> Result<(), EditorError> {
        let gesture = self.gesture.take().ok_or(EditorError::NoActiveGesture)?;
        self.surface.restore(&gesture.snapshot);
        for observer in &mut self.observers {
            observer(&self.surface);
        }
        log_info!("Cancelled {}", gesture.command.description());
        Ok(())
    }

    /// A live gesture is abandoned before any history operation.
    fn abandon_gesture(&mut self) {
        if let Some(gesture) = self.gesture.take() {
            log_warn!("Abandoning {} for a history operation", gesture.command.description());
            self.surface.restore(&gesture.snapshot);
        }
    }

    // ---- history ------------------------------------------------------------

    /// Undo the newest command. `false` when there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        self.abandon_gesture();
        match self.history.undo() {
            Some(description) => {
                log_info!("Undo: {}", description);
                self.replay_commands();
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        self.abandon_gesture();
        match self.history.redo() {
            Some(description) => {
                log_info!("Redo: {}", description);
                self.replay_commands();
                true
            }
            None => false,
        }
    }

    /// Undo `count` commands with a single replay. Returns how many were undone.
    pub fn undo_to(&mut self, count: usize) -> usize {
        self.abandon_gesture();
        let moved = self.history.undo_to(count);
        if moved > 0 {
            log_info!("Undo x{}", moved);
            self.replay_commands();
        }
        moved
    }

    /// Clear the surface and re-apply setup, then executed, in order.
    pub fn replay_commands(&mut self) {
        let Editor {
            surface,
            history,
            observers,
            ..
        } = self;
        history.replay(surface, |command, surface| notify(observers, command, surface));
        log_info!(
            "Replayed {} setup + {} executed commands",
            history.setup_commands().len(),
            history.executed_len()
        );
    }
}

fn notify(observers: &mut [CanvasObserver], command: &Command, surface: &Surface) {
    if observers.is_empty() || !command.taint().evaluate(surface) {
        return;
    }
    for observer in observers {
        observer(surface);
    }
}
