use image::RgbaImage;
use std::sync::Arc;

use crate::canvas::{Color, PaintMode, PaintState, Position, Snapshot, Surface};
use crate::ops::fill::flood_region;
use crate::ops::shapes::{EllipseGeometry, bresenham_ellipse, line_efla, rect_spans};

// ============================================================================
// TAINT — does applying a command visibly change the canvas?
// ============================================================================

/// Gate for "canvas changed" notifications, evaluated after apply.
#[derive(Clone, Copy, Debug, Default)]
pub enum Taint {
    #[default]
    Always,
    Never,
    /// Predicate over the post-apply surface.
    When(fn(&Surface) -> bool),
}

impl Taint {
    pub fn evaluate(&self, surface: &Surface) -> bool {
        match self {
            Taint::Always => true,
            Taint::Never => false,
            Taint::When(predicate) => predicate(surface),
        }
    }
}

// ============================================================================
// PER-VARIANT PARAMETERS
// ============================================================================

/// Pencil or eraser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrokeKind {
    Pencil,
    Eraser,
}

/// Freehand stroke: an ordered, growing list of logged positions.
#[derive(Clone, Debug)]
pub struct Stroke {
    pub kind: StrokeKind,
    pub color: Color,
    positions: Vec<Position>,
    /// Last position painted by the incremental preview.
    cursor: Position,
}

impl Stroke {
    pub fn new(kind: StrokeKind, color: Color, start: Position) -> Self {
        Self {
            kind,
            color,
            positions: vec![start],
            cursor: start,
        }
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Append `pos` unless it repeats the last logged position.
    pub fn log_position(&mut self, pos: Position) -> bool {
        if self.positions.last() == Some(&pos) {
            return false;
        }
        self.positions.push(pos);
        true
    }

    fn paint_state(&self) -> PaintState {
        let mode = match self.kind {
            StrokeKind::Pencil => PaintMode::SourceOver,
            StrokeKind::Eraser => PaintMode::DestinationOut,
        };
        PaintState::new(self.color, mode)
    }

    fn apply(&self, surface: &mut Surface) {
        let mut surface = surface.configure(self.paint_state());
        let Some(&first) = self.positions.first() else {
            return;
        };
        let mut previous = first;
        for &pos in &self.positions {
            paint_step(&mut surface, previous, pos);
            previous = pos;
        }
    }

    fn apply_incremental(&mut self, surface: &mut Surface, pos: Position) {
        let mut surface = surface.configure(self.paint_state());
        paint_step(&mut surface, self.cursor, pos);
        self.cursor = pos;
    }
}

/// One pixel when standing still, otherwise a line bridging the gap between
/// sparsely sampled positions.
fn paint_step(surface: &mut Surface, from: Position, to: Position) {
    if from == to {
        surface.paint_pixel(to);
    } else {
        line_efla(from, to, |p| surface.paint_pixel(p));
    }
}

/// Two-corner shape parameters; only `end` moves during a drag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub color: Color,
    pub start: Position,
    pub end: Position,
}

impl Segment {
    pub fn new(color: Color, start: Position, end: Position) -> Self {
        Self { color, start, end }
    }

    pub fn update_position(&mut self, pos: Position) {
        self.end = pos;
    }

    fn paint_state(&self) -> PaintState {
        PaintState::new(self.color, PaintMode::SourceOver)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fill {
    pub color: Color,
    pub seed: Position,
}

/// Decoded image blitted with replace semantics.
#[derive(Clone, Debug)]
pub struct Paste {
    pub image: Arc<RgbaImage>,
    pub offset: Position,
}

// ============================================================================
// COMMAND
// ============================================================================

/// Closed set of edit operations.
#[derive(Clone, Debug)]
pub enum Action {
    Stroke(Stroke),
    Line(Segment),
    Rectangle(Segment),
    Ellipse(Segment),
    FloodFill(Fill),
    Paste(Paste),
}

/// A reversible, replayable edit: an [`Action`] plus its [`Taint`].
///
/// Commands grow only while their gesture is live (`log_position`,
/// `update_position`); once recorded in the history they are never mutated.
#[derive(Clone, Debug)]
pub struct Command {
    action: Action,
    taint: Taint,
}

impl Command {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            taint: Taint::Always,
        }
    }

    pub fn pencil(color: Color, start: Position) -> Self {
        Self::new(Action::Stroke(Stroke::new(StrokeKind::Pencil, color, start)))
    }

    pub fn eraser(color: Color, start: Position) -> Self {
        Self::new(Action::Stroke(Stroke::new(StrokeKind::Eraser, color, start)))
    }

    pub fn line(color: Color, start: Position, end: Position) -> Self {
        Self::new(Action::Line(Segment::new(color, start, end)))
    }

    pub fn rectangle(color: Color, start: Position, end: Position) -> Self {
        Self::new(Action::Rectangle(Segment::new(color, start, end)))
    }

    pub fn ellipse(color: Color, start: Position, end: Position) -> Self {
        Self::new(Action::Ellipse(Segment::new(color, start, end)))
    }

    pub fn flood_fill(color: Color, seed: Position) -> Self {
        Self::new(Action::FloodFill(Fill { color, seed }))
    }

    /// Paste at the top-left corner.
    pub fn paste(image: RgbaImage) -> Self {
        Self::paste_at(image, Position::new(0, 0))
    }

    pub fn paste_at(image: RgbaImage, offset: Position) -> Self {
        Self::new(Action::Paste(Paste {
            image: Arc::new(image),
            offset,
        }))
    }

    pub fn with_taint(mut self, taint: Taint) -> Self {
        self.taint = taint;
        self
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn taint(&self) -> Taint {
        self.taint
    }

    pub fn name(&self) -> &'static str {
        match &self.action {
            Action::Stroke(s) => match s.kind {
                StrokeKind::Pencil => "pencil",
                StrokeKind::Eraser => "eraser",
            },
            Action::Line(_) => "line",
            Action::Rectangle(_) => "rectangle",
            Action::Ellipse(_) => "ellipse",
            Action::FloodFill(_) => "bucket",
            Action::Paste(_) => "paste",
        }
    }

    /// Short human-readable label for history listings.
    pub fn description(&self) -> String {
        match &self.action {
            Action::Stroke(s) => {
                let label = match s.kind {
                    StrokeKind::Pencil => "Pencil",
                    StrokeKind::Eraser => "Eraser",
                };
                format!("{} ({} points)", label, s.positions.len())
            }
            Action::Line(seg) => format!("Line {} → {}", seg.start, seg.end),
            Action::Rectangle(seg) => format!("Rectangle {} → {}", seg.start, seg.end),
            Action::Ellipse(seg) => format!("Ellipse {} → {}", seg.start, seg.end),
            Action::FloodFill(f) => format!("Fill at {}", f.seed),
            Action::Paste(p) => format!("Paste {}×{}", p.image.width(), p.image.height()),
        }
    }

    /// Whether the command can grow during a gesture.
    pub fn is_interactive(&self) -> bool {
        !matches!(self.action, Action::FloodFill(_) | Action::Paste(_))
    }

    /// Perform the full effect on `surface`.
    pub fn apply(&self, surface: &mut Surface) {
        match &self.action {
            Action::Stroke(stroke) => stroke.apply(surface),
            Action::Line(seg) => {
                let mut surface = surface.configure(seg.paint_state());
                line_efla(seg.start, seg.end, |p| surface.paint_pixel(p));
            }
            Action::Rectangle(seg) => {
                let mut surface = surface.configure(seg.paint_state());
                rect_spans(seg.start, seg.end, |y, x0, x1| surface.paint_span(y, x0, x1));
            }
            Action::Ellipse(seg) => {
                let geometry = EllipseGeometry::from_corners(seg.start, seg.end);
                let mut surface = surface.configure(seg.paint_state());
                bresenham_ellipse(geometry.center, geometry.rx, geometry.ry, |y, x0, x1| {
                    surface.paint_span(y, x0, x1)
                });
            }
            Action::FloodFill(fill) => {
                // Region is computed on the unpainted surface first
                let region = flood_region(surface.image(), fill.seed);
                let mut surface =
                    surface.configure(PaintState::new(fill.color, PaintMode::SourceOver));
                for pos in region {
                    surface.paint_pixel(pos);
                }
            }
            Action::Paste(paste) => surface.blit(&paste.image, paste.offset),
        }
    }

    /// Log a stroke position. Returns `false` for duplicates and for
    /// non-stroke commands.
    pub fn log_position(&mut self, pos: Position) -> bool {
        match &mut self.action {
            Action::Stroke(stroke) => stroke.log_position(pos),
            _ => false,
        }
    }

    /// Move the second corner of a two-point shape. Returns `false` for
    /// commands without one.
    pub fn update_position(&mut self, pos: Position) -> bool {
        match &mut self.action {
            Action::Line(seg) | Action::Rectangle(seg) | Action::Ellipse(seg) => {
                seg.update_position(pos);
                true
            }
            _ => false,
        }
    }

    /// Paint only the delta from the stroke cursor to `pos`.
    pub fn apply_incremental(&mut self, surface: &mut Surface, pos: Position) {
        if let Action::Stroke(stroke) = &mut self.action {
            stroke.apply_incremental(surface, pos);
        }
    }

    /// Paint what a gesture shows before it first grows: a stroke's start
    /// pixel. Returns `false` when nothing was painted.
    pub fn begin_preview(&mut self, surface: &mut Surface) -> bool {
        match &mut self.action {
            Action::Stroke(stroke) => {
                let start = stroke.cursor;
                stroke.apply_incremental(surface, start);
                true
            }
            _ => false,
        }
    }

    /// Advance a live gesture to `pos` and refresh its preview.
    ///
    /// Strokes log the position and paint the delta on top of the current
    /// preview; two-point shapes roll the surface back to `base` and redraw
    /// with the moved corner. Non-interactive commands ignore growth.
    pub fn grow(&mut self, surface: &mut Surface, base: &Snapshot, pos: Position) {
        match self.action {
            Action::Stroke(_) => {
                if self.log_position(pos) {
                    self.apply_incremental(surface, pos);
                }
            }
            Action::Line(_) | Action::Rectangle(_) | Action::Ellipse(_) => {
                surface.restore(base);
                self.update_position(pos);
                self.apply(surface);
            }
            Action::FloodFill(_) | Action::Paste(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::TRANSPARENT;
    use image::Rgba;

    const RED: Color = Rgba([255, 0, 0, 255]);
    const BLUE: Color = Rgba([0, 0, 255, 255]);

    fn p(x: i32, y: i32) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn log_position_rejects_duplicates() {
        let mut cmd = Command::pencil(RED, p(1, 1));
        assert!(!cmd.log_position(p(1, 1)));
        assert!(cmd.log_position(p(2, 1)));
        assert!(!cmd.log_position(p(2, 1)));
        let Action::Stroke(stroke) = cmd.action() else {
            panic!("expected a stroke");
        };
        assert_eq!(stroke.positions(), &[p(1, 1), p(2, 1)]);
    }

    #[test]
    fn stroke_bridges_sparse_positions() {
        let mut cmd = Command::pencil(RED, p(0, 0));
        cmd.log_position(p(4, 0));
        let mut s = Surface::new(6, 2);
        cmd.apply(&mut s);
        for x in 0..=4 {
            assert_eq!(s.get_pixel(p(x, 0)), RED);
        }
        assert_eq!(s.get_pixel(p(5, 0)), TRANSPARENT);
        assert_eq!(s.opaque_pixel_count(), 5);
    }

    #[test]
    fn single_position_stroke_paints_one_pixel() {
        let cmd = Command::pencil(RED, p(2, 2));
        let mut s = Surface::new(4, 4);
        cmd.apply(&mut s);
        assert_eq!(s.opaque_pixel_count(), 1);
        assert_eq!(s.get_pixel(p(2, 2)), RED);
    }

    #[test]
    fn incremental_preview_matches_full_apply_for_opaque_strokes() {
        let mut live = Command::pencil(RED, p(0, 0));
        let mut preview = Surface::new(10, 10);
        let base = preview.save();
        for pos in [p(3, 1), p(3, 1), p(7, 7), p(2, 9)] {
            live.grow(&mut preview, &base, pos);
        }
        let mut full = Surface::new(10, 10);
        live.apply(&mut full);
        assert_eq!(preview.diff_count(&full), 0);
    }

    #[test]
    fn begin_preview_marks_only_stroke_starts() {
        let mut s = Surface::new(4, 4);
        let mut pencil = Command::pencil(RED, p(3, 0));
        assert!(pencil.begin_preview(&mut s));
        assert_eq!(s.get_pixel(p(3, 0)), RED);
        assert_eq!(s.opaque_pixel_count(), 1);

        let mut line = Command::line(BLUE, p(0, 0), p(3, 3));
        assert!(!line.begin_preview(&mut s));
        assert_eq!(s.opaque_pixel_count(), 1);
    }

    #[test]
    fn eraser_clears_to_transparent_black() {
        let mut s = Surface::new(5, 1);
        s.fill(BLUE);
        let mut cmd = Command::eraser(Rgba([0, 0, 0, 255]), p(1, 0));
        cmd.log_position(p(3, 0));
        cmd.apply(&mut s);
        assert_eq!(s.get_pixel(p(0, 0)), BLUE);
        for x in 1..=3 {
            assert_eq!(s.get_pixel(p(x, 0)), TRANSPARENT);
        }
        assert_eq!(s.get_pixel(p(4, 0)), BLUE);
    }

    #[test]
    fn apply_restores_paint_state() {
        let mut s = Surface::new(3, 3);
        let before = s.paint_state();
        Command::eraser(RED, p(0, 0)).apply(&mut s);
        Command::ellipse(RED, p(0, 0), p(2, 2)).apply(&mut s);
        Command::flood_fill(RED, p(1, 1)).apply(&mut s);
        assert_eq!(s.paint_state(), before);
    }

    #[test]
    fn two_point_drag_only_keeps_latest_corner() {
        let mut cmd = Command::line(RED, p(0, 0), p(0, 0));
        let mut s = Surface::new(8, 8);
        let base = s.save();
        cmd.grow(&mut s, &base, p(7, 0));
        cmd.grow(&mut s, &base, p(0, 7));
        assert_eq!(s.get_pixel(p(7, 0)), TRANSPARENT);
        assert_eq!(s.get_pixel(p(0, 7)), RED);
        assert_eq!(s.opaque_pixel_count(), 8);
    }

    #[test]
    fn rectangle_fills_half_open_box() {
        let mut s = Surface::new(6, 6);
        Command::rectangle(RED, p(1, 1), p(4, 3)).apply(&mut s);
        assert_eq!(s.opaque_pixel_count(), 3 * 2);
        assert_eq!(s.get_pixel(p(3, 2)), RED);
        assert_eq!(s.get_pixel(p(4, 3)), TRANSPARENT);
    }

    #[test]
    fn ellipse_from_drag_is_filled() {
        let mut s = Surface::new(11, 11);
        Command::ellipse(RED, p(0, 0), p(10, 10)).apply(&mut s);
        assert_eq!(s.get_pixel(p(5, 5)), RED);
        assert_eq!(s.get_pixel(p(0, 5)), RED);
        assert_eq!(s.get_pixel(p(5, 0)), RED);
        assert_eq!(s.get_pixel(p(0, 0)), TRANSPARENT);
    }

    #[test]
    fn flood_fill_replaces_region() {
        let mut s = Surface::new(10, 10);
        s.fill(BLUE);
        Command::flood_fill(RED, p(5, 5)).apply(&mut s);
        assert_eq!(s.diff_count(&{
            let mut red = Surface::new(10, 10);
            red.fill(RED);
            red
        }), 0);
    }

    #[test]
    fn flood_fill_same_colour_terminates() {
        let mut s = Surface::new(16, 16);
        s.fill(RED);
        Command::flood_fill(RED, p(0, 0)).apply(&mut s);
        assert_eq!(s.opaque_pixel_count(), 256);
    }

    #[test]
    fn paste_blits_at_offset() {
        let img = RgbaImage::from_pixel(2, 2, RED);
        let mut s = Surface::new(4, 4);
        Command::paste_at(img, p(3, 3)).apply(&mut s);
        assert_eq!(s.opaque_pixel_count(), 1);
        assert_eq!(s.get_pixel(p(3, 3)), RED);
    }

    #[test]
    fn non_interactive_commands_ignore_growth() {
        let mut cmd = Command::flood_fill(RED, p(0, 0));
        let mut s = Surface::new(2, 2);
        let base = s.save();
        cmd.grow(&mut s, &base, p(1, 1));
        assert!(!cmd.is_interactive());
        assert!(!cmd.update_position(p(1, 1)));
        assert!(!cmd.log_position(p(1, 1)));
        assert_eq!(s.opaque_pixel_count(), 0);
    }

    #[test]
    fn taint_predicates() {
        let s = Surface::new(1, 1);
        assert!(Taint::default().evaluate(&s));
        assert!(!Taint::Never.evaluate(&s));
        assert!(!Taint::When(|s| s.opaque_pixel_count() > 0).evaluate(&s));
    }

    #[test]
    fn names_and_descriptions() {
        assert_eq!(Command::eraser(RED, p(0, 0)).name(), "eraser");
        assert_eq!(Command::flood_fill(RED, p(0, 0)).name(), "bucket");
        assert_eq!(
            Command::line(RED, p(0, 0), p(3, 4)).description(),
            "Line 0,0 → 3,4"
        );
    }
}
