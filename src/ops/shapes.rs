// ============================================================================
// SHAPE RASTERIZERS — integer line, filled ellipse, filled rectangle
// ============================================================================
//
// Pure functions: they emit pixel coordinates (or horizontal spans) through a
// callback and never touch a surface themselves. Coordinates may fall outside
// any canvas; clipping is the consumer's job.

use crate::canvas::Position;

/// Rasterize the segment `start → end` (both endpoints inclusive) with the
/// EFLA variant of Bresenham.
///
/// The major axis advances in unit steps; the minor coordinate is
/// `floor(minor_start + i·slope + 0.5)`, i.e. ties round towards +∞ on both
/// sides of the origin. `end` is always plotted last, so a zero-length
/// segment yields exactly one pixel.
pub fn line_efla(start: Position, end: Position, mut plot: impl FnMut(Position)) {
    // i64 deltas: the difference of two i32 values always fits
    let mut short_len = end.y as i64 - start.y as i64;
    let mut long_len = end.x as i64 - start.x as i64;

    let y_longer = short_len.abs() > long_len.abs();
    if y_longer {
        std::mem::swap(&mut short_len, &mut long_len);
    }

    let step: i64 = if long_len < 0 { -1 } else { 1 };
    let slope = if long_len == 0 {
        0.0
    } else {
        short_len as f64 / long_len as f64
    };

    let (x0, y0) = (start.x as i64, start.y as i64);
    let mut i: i64 = 0;
    while i != long_len {
        let minor = (i as f64 * slope + 0.5).floor() as i64;
        let (x, y) = if y_longer {
            (x0 + minor, y0 + i)
        } else {
            (x0 + i, y0 + minor)
        };
        plot(Position::new(x as i32, y as i32));
        i += step;
    }
    plot(end);
}

/// Collect the pixels of [`line_efla`] in plotting order.
pub fn line_points(start: Position, end: Position) -> Vec<Position> {
    let mut points = Vec::new();
    line_efla(start, end, |p| points.push(p));
    points
}

/// Filled rectangle over the half-open box spanned by two corners, emitted as
/// inclusive row spans `(y, x_min, x_max)`. Corners sharing a row or column
/// produce nothing.
pub fn rect_spans(start: Position, end: Position, mut span: impl FnMut(i32, i32, i32)) {
    let (x_min, x_max) = (start.x.min(end.x), start.x.max(end.x));
    let (y_min, y_max) = (start.y.min(end.y), start.y.max(end.y));
    if x_min == x_max || y_min == y_max {
        return;
    }
    for y in y_min..y_max {
        span(y, x_min, x_max - 1);
    }
}

/// Centre and semi-axes of the ellipse inscribed in a drag rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EllipseGeometry {
    pub center: Position,
    pub rx: i32,
    pub ry: i32,
}

impl EllipseGeometry {
    /// `rx = ⌊|Δx|/2⌋`, `ry = ⌊|Δy|/2⌋`, centre offset from `start` by one
    /// radius towards `end` on each axis.
    pub fn from_corners(start: Position, end: Position) -> Self {
        let dx = end.x as i64 - start.x as i64;
        let dy = end.y as i64 - start.y as i64;
        let rx = dx.abs() / 2;
        let ry = dy.abs() / 2;
        let cx = start.x as i64 + dx.signum() * rx;
        let cy = start.y as i64 + dy.signum() * ry;
        Self {
            center: Position::new(cx as i32, cy as i32),
            rx: rx as i32,
            ry: ry as i32,
        }
    }
}

/// Filled ellipse via the two-region midpoint algorithm, emitted as inclusive
/// row spans `(y, x_min, x_max)`, one per row.
///
/// The first-quadrant boundary is walked from `(0, ry)`: region 1 steps x and
/// conditionally y until the tangent slope reaches −1, region 2 steps y and
/// conditionally x. Each quadrant row is flushed with its widest `x` as soon
/// as the walk leaves it, as the mirrored pair `cy − y` then `cy + y` (the
/// centre row once). Decision variables are kept ×4 in `i128` so the
/// half-integer terms stay exact. Memory use is constant in the radii.
pub fn bresenham_ellipse(center: Position, rx: i32, ry: i32, mut span: impl FnMut(i32, i32, i32)) {
    if rx < 0 || ry < 0 {
        return;
    }
    let (cx, cy) = (center.x as i64, center.y as i64);
    let mut rows = RowWidths {
        current: None,
        emit: |dy: i128, hw: i128| {
            let (dy, hw) = (dy as i64, hw as i64);
            let (x0, x1) = (clamp_i32(cx - hw), clamp_i32(cx + hw));
            span(clamp_i32(cy - dy), x0, x1);
            if dy != 0 {
                span(clamp_i32(cy + dy), x0, x1);
            }
        },
    };
    walk_quadrant(rx as i128, ry as i128, &mut rows);
    rows.finish();
}

/// Tracks the quadrant row being walked and its widest `x`. The walk never
/// revisits a row, so a row is complete once `y` changes.
struct RowWidths<F: FnMut(i128, i128)> {
    current: Option<(i128, i128)>,
    emit: F,
}

impl<F: FnMut(i128, i128)> RowWidths<F> {
    fn plot(&mut self, x: i128, y: i128) {
        match self.current {
            Some((row, widest)) if row == y => self.current = Some((y, widest.max(x))),
            Some((row, widest)) => {
                (self.emit)(row, widest);
                self.current = Some((y, x));
            }
            None => self.current = Some((y, x)),
        }
    }

    fn finish(&mut self) {
        if let Some((row, widest)) = self.current.take() {
            (self.emit)(row, widest);
        }
    }
}

fn walk_quadrant<F: FnMut(i128, i128)>(a: i128, b: i128, rows: &mut RowWidths<F>) {
    // Flat ellipse: region 2 would only ever reach the centre pixel
    if b == 0 {
        rows.plot(a, 0);
        return;
    }

    let a2 = a * a;
    let b2 = b * b;
    let mut x: i128 = 0;
    let mut y: i128 = b;
    let mut dx: i128 = 0; // 2b²x
    let mut dy: i128 = 2 * a2 * y; // 2a²y

    // Region 1: p1 = b² − a²b + a²/4, scaled by 4
    let mut p1 = 4 * b2 - 4 * a2 * b + a2;
    while dx < dy {
        rows.plot(x, y);
        x += 1;
        dx += 2 * b2;
        if p1 < 0 {
            p1 += 4 * (dx + b2);
        } else {
            y -= 1;
            dy -= 2 * a2;
            p1 += 4 * (dx - dy + b2);
        }
    }

    // Region 2: p2 = b²(x + ½)² + a²(y − 1)² − a²b², scaled by 4
    let mut p2 = b2 * (2 * x + 1) * (2 * x + 1) + 4 * a2 * (y - 1) * (y - 1) - 4 * a2 * b2;
    while y >= 0 {
        rows.plot(x, y);
        y -= 1;
        dy -= 2 * a2;
        if p2 > 0 {
            p2 += 4 * (a2 - dy);
        } else {
            x += 1;
            dx += 2 * b2;
            p2 += 4 * (dx - dy + a2);
        }
    }
}

#[inline]
fn clamp_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
