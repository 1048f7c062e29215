//! PixelSides: the pixel core of a raster editor.
//!
//! A [`Surface`](canvas::Surface) holds one flat RGBA raster. Every edit is a
//! [`Command`](components::commands::Command) applied through an
//! [`Editor`](editor::Editor), whose history rebuilds the surface by full
//! replay on undo and redo.

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod editor;
pub mod io;
pub mod ops;
pub mod plugins;
pub mod project;
pub mod settings;

pub use canvas::{Color, Position, Surface};
pub use components::commands::{Command, Taint};
pub use components::history::History;
pub use editor::{Editor, EditorError, EditorState};
