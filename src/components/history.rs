use crate::canvas::Surface;
use crate::components::commands::Command;

// ============================================================================
// HISTORY — setup / executed / undone stacks with full replay
// ============================================================================

/// Undo/redo history.
///
/// Undo and redo only move commands between the stacks; the surface is
/// rebuilt from scratch by [`History::replay`]. No pruning: dropping the
/// oldest executed command would change every later replay.
#[derive(Default)]
pub struct History {
    /// Replayed first on every reset, fixed once the editor is initialized.
    setup: Vec<Command>,
    executed: Vec<Command>,
    undone: Vec<Command>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_setup(&mut self, command: Command) {
        self.setup.push(command);
    }

    /// Append a committed command and drop the redo branch.
    pub fn record(&mut self, command: Command) {
        self.undone.clear();
        self.executed.push(command);
    }

    /// Move the newest executed command onto the undone stack.
    /// Returns its description, `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<String> {
        let command = self.executed.pop()?;
        let description = command.description();
        self.undone.push(command);
        Some(description)
    }

    pub fn redo(&mut self) -> Option<String> {
        let command = self.undone.pop()?;
        let description = command.description();
        self.executed.push(command);
        Some(description)
    }

    /// Undo `count` commands (stopping early when empty). Returns how many
    /// were actually moved.
    pub fn undo_to(&mut self, count: usize) -> usize {
        let mut moved = 0;
        while moved < count && self.undo().is_some() {
            moved += 1;
        }
        moved
    }

    pub fn can_undo(&self) -> bool {
        !self.executed.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.executed.last().map(Command::description)
    }

    pub fn redo_description(&self) -> Option<String> {
        self.undone.last().map(Command::description)
    }

    /// Get all undo descriptions (most recent first)
    pub fn undo_history(&self) -> Vec<String> {
        self.executed.iter().rev().map(Command::description).collect()
    }

    pub fn setup_commands(&self) -> &[Command] {
        &self.setup
    }

    pub fn executed_commands(&self) -> &[Command] {
        &self.executed
    }

    pub fn undone_commands(&self) -> &[Command] {
        &self.undone
    }

    pub fn executed_len(&self) -> usize {
        self.executed.len()
    }

    pub fn undone_len(&self) -> usize {
        self.undone.len()
    }

    /// Clear `surface`, then apply every setup command followed by every
    /// executed command, in order. `on_apply` sees each command together
    /// with the surface right after it was applied.
    pub fn replay(&self, surface: &mut Surface, mut on_apply: impl FnMut(&Command, &Surface)) {
        surface.clear();
        for command in self.setup.iter().chain(&self.executed) {
            command.apply(surface);
            on_apply(command, surface);
        }
    }

    /// Forget executed and undone commands; setup is kept.
    pub fn clear(&mut self) {
        self.executed.clear();
        self.undone.clear();
    }
}
