// ============================================================================
// FLOOD FILL — 4-connected, exact colour match, explicit work stack
// ============================================================================

use image::RgbaImage;

use crate::canvas::Position;

/// Collect the 4-connected region of pixels whose colour exactly equals the
/// seed's, reading only from `pixels` (the state before any painting).
///
/// Uses a DFS `Vec` stack and a dense `width*height` visited bitmap, so stack
/// depth and lookup cost are independent of the region's shape. Neighbours are
/// explored up, right, down, left. A seed outside the image yields nothing.
pub fn flood_region(pixels: &RgbaImage, seed: Position) -> Vec<Position> {
    let (w, h) = pixels.dimensions();
    if seed.x < 0 || seed.y < 0 || seed.x as u32 >= w || seed.y as u32 >= h {
        return Vec::new();
    }

    let wu = w as usize;
    let raw = pixels.as_raw();

    #[inline(always)]
    fn pix(raw: &[u8], idx: usize) -> [u8; 4] {
        let o = idx * 4;
        [raw[o], raw[o + 1], raw[o + 2], raw[o + 3]]
    }

    let seed_idx = seed.y as usize * wu + seed.x as usize;
    let target = pix(raw, seed_idx);

    let mut visited = vec![false; wu * h as usize];
    let mut region = Vec::new();
    let mut stack: Vec<usize> = Vec::with_capacity(1024);
    visited[seed_idx] = true;
    stack.push(seed_idx);

    while let Some(idx) = stack.pop() {
        let x = (idx % wu) as u32;
        let y = (idx / wu) as u32;
        region.push(Position::new(x as i32, y as i32));

        // Pushed in reverse so the pop order is up, right, down, left
        let mut neighbours: [Option<usize>; 4] = [None; 4];
        if y > 0 {
            neighbours[0] = Some(idx - wu);
        }
        if x + 1 < w {
            neighbours[1] = Some(idx + 1);
        }
        if y + 1 < h {
            neighbours[2] = Some(idx + wu);
        }
        if x > 0 {
            neighbours[3] = Some(idx - 1);
        }

        for ni in neighbours.into_iter().rev().flatten() {
            if !visited[ni] && pix(raw, ni) == target {
                visited[ni] = true;
                stack.push(ni);
            }
        }
    }

    region
}

/// Run [`flood_region`] and hand every pixel of the region to `plot`.
pub fn flood_fill(pixels: &RgbaImage, seed: Position, mut plot: impl FnMut(Position)) {
    for pos in flood_region(pixels, seed) {
        plot(pos);
    }
}
