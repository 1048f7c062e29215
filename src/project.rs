use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::editor::Editor;
use crate::io::{ImageIoError, load_image};

/// Single open document.
pub struct Project {
    pub id: Uuid,
    pub editor: Editor,
    /// `None` for untitled canvases.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,

    /// Display name (derived from path or "Untitled-X")
    pub name: String,
}

impl Project {
    pub fn new_untitled(untitled_counter: usize, width: u32, height: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            editor: Editor::new(width, height),
            path: None,
            is_dirty: false,
            name: format!("Untitled-{}", untitled_counter),
        }
    }

    /// Open `path` as a canvas whose pixels are the editor's first setup
    /// command.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ImageIoError> {
        let path = path.as_ref().to_path_buf();
        let image = load_image(&path)?;
        let mut project = Self {
            id: Uuid::new_v4(),
            editor: Editor::from_image(image),
            path: Some(path),
            is_dirty: false,
            name: String::new(),
        };
        project.update_name_from_path();
        Ok(project)
    }

    /// Run `f` against the editor and mark the document dirty.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut Editor) -> R) -> R {
        self.mark_dirty();
        f(&mut self.editor)
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    pub fn update_name_from_path(&mut self) {
        if let Some(ref path) = self.path {
            self.name = path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Unknown".to_string());
        }
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}
