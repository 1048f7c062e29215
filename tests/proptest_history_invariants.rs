//! Property-based invariant tests for the editor history.
//!
//! 1. Undo after a commit restores the exact pre-commit surface
//! 2. Redo after that undo restores the exact post-commit surface
//! 3. Replaying twice without edits is bit-identical
//! 4. A commit after an undo empties the redo stack
//! 5. After any operation sequence the surface equals a fresh replay of the
//!    executed stack

use image::Rgba;
use pixelsides::{Color, Command, Editor, Position};
use proptest::prelude::*;

const SIZE: u32 = 16;

// ── Strategies ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Gesture {
    Pencil(Color, Vec<(i32, i32)>),
    Eraser(Vec<(i32, i32)>),
    Line(Color, (i32, i32), Vec<(i32, i32)>),
    Rect(Color, (i32, i32), Vec<(i32, i32)>),
    Ellipse(Color, (i32, i32), Vec<(i32, i32)>),
    Fill(Color, (i32, i32)),
}

#[derive(Debug, Clone)]
enum Op {
    Draw(Gesture),
    Undo,
    Redo,
    Replay,
}

// Slightly past the edges so clipping is exercised
fn point() -> impl Strategy<Value = (i32, i32)> {
    (-3i32..SIZE as i32 + 3, -3i32..SIZE as i32 + 3)
}

fn color() -> impl Strategy<Value = Color> {
    prop_oneof![
        any::<[u8; 3]>().prop_map(|[r, g, b]| Rgba([r, g, b, 255])),
        any::<[u8; 4]>().prop_map(Rgba),
    ]
}

fn gesture_strategy() -> impl Strategy<Value = Gesture> {
    let drag = || prop::collection::vec(point(), 1..6);
    prop_oneof![
        (color(), drag()).prop_map(|(c, pts)| Gesture::Pencil(c, pts)),
        drag().prop_map(Gesture::Eraser),
        (color(), point(), drag()).prop_map(|(c, a, pts)| Gesture::Line(c, a, pts)),
        (color(), point(), drag()).prop_map(|(c, a, pts)| Gesture::Rect(c, a, pts)),
        (color(), point(), drag()).prop_map(|(c, a, pts)| Gesture::Ellipse(c, a, pts)),
        (color(), point()).prop_map(|(c, p)| Gesture::Fill(c, p)),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => gesture_strategy().prop_map(Op::Draw),
        2 => Just(Op::Undo),
        1 => Just(Op::Redo),
        1 => Just(Op::Replay),
    ]
}

fn pos((x, y): (i32, i32)) -> Position {
    Position::new(x, y)
}

/// Run one gesture through begin / grow / commit (or a one-shot fill).
fn draw(editor: &mut Editor, gesture: &Gesture) {
    let (command, drag): (Command, &[(i32, i32)]) = match gesture {
        Gesture::Pencil(c, pts) => (Command::pencil(*c, pos(pts[0])), &pts[1..]),
        Gesture::Eraser(pts) => (Command::eraser(Rgba([0, 0, 0, 255]), pos(pts[0])), &pts[1..]),
        Gesture::Line(c, a, pts) => (Command::line(*c, pos(*a), pos(*a)), &pts[..]),
        Gesture::Rect(c, a, pts) => (Command::rectangle(*c, pos(*a), pos(*a)), &pts[..]),
        Gesture::Ellipse(c, a, pts) => (Command::ellipse(*c, pos(*a), pos(*a)), &pts[..]),
        Gesture::Fill(c, p) => {
            editor.execute_and_record(Command::flood_fill(*c, pos(*p))).unwrap();
            return;
        }
    };
    editor.begin(command).unwrap();
    for &p in drag {
        editor.grow(pos(p)).unwrap();
    }
    editor.commit().unwrap();
}

fn apply_ops(editor: &mut Editor, ops: &[Op]) {
    for op in ops {
        match op {
            Op::Draw(g) => draw(editor, g),
            Op::Undo => {
                editor.undo();
            }
            Op::Redo => {
                editor.redo();
            }
            Op::Replay => editor.replay_commands(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 1 + 2. Undo / redo round-trip
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn undo_then_redo_round_trips(
        prefix in prop::collection::vec(op_strategy(), 0..12),
        last in gesture_strategy(),
    ) {
        let mut editor = Editor::new(SIZE, SIZE);
        apply_ops(&mut editor, &prefix);

        let before = editor.surface().clone();
        draw(&mut editor, &last);
        let after = editor.surface().clone();

        prop_assert!(editor.undo());
        prop_assert_eq!(editor.surface().diff_count(&before), 0);
        prop_assert!(editor.redo());
        prop_assert_eq!(editor.surface().diff_count(&after), 0);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 3. Replay idempotence
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn replay_twice_is_identical(ops in prop::collection::vec(op_strategy(), 0..16)) {
        let mut editor = Editor::new(SIZE, SIZE);
        apply_ops(&mut editor, &ops);

        editor.replay_commands();
        let first = editor.surface().clone();
        editor.replay_commands();
        prop_assert_eq!(editor.surface().diff_count(&first), 0);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 4. Redo branch invalidation
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn commit_after_undo_drops_redo(
        ops in prop::collection::vec(op_strategy(), 1..12),
        next in gesture_strategy(),
    ) {
        let mut editor = Editor::new(SIZE, SIZE);
        apply_ops(&mut editor, &ops);
        editor.undo();
        draw(&mut editor, &next);

        prop_assert_eq!(editor.undone_len(), 0);
        prop_assert!(!editor.redo());
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 5. Surface always equals a fresh replay of the executed stack
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn surface_matches_fresh_replay(ops in prop::collection::vec(op_strategy(), 0..20)) {
        let mut editor = Editor::new(SIZE, SIZE);
        apply_ops(&mut editor, &ops);

        let mut fresh = Editor::new(SIZE, SIZE);
        for command in editor.history().executed_commands() {
            fresh.execute_and_record(command.clone()).unwrap();
        }
        prop_assert_eq!(editor.surface().diff_count(fresh.surface()), 0);
        prop_assert_eq!(editor.executed_len(), fresh.executed_len());
    }
}
