use image::GrayImage;

/// Displacement of one block between two foreground images.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockMotion {
    /// Block position on the block grid.
    pub col: u32,
    pub row: u32,
    /// Displacement, in pixels.
    pub dx: i32,
    pub dy: i32,
}

/// Exhaustive-search block matcher.
///
/// The previous image is split into square blocks of `block_size` pixels. For every block with
/// enough foreground energy, the matcher searches a `±search_radius` window of the current image
/// for the position with the lowest sum of absolute differences. Only blocks that actually moved
/// are reported.
#[derive(Clone, Debug)]
pub struct BlockMatcher {
    block_size: u32,
    search_radius: u32,
    energy_floor: f32,
}

impl BlockMatcher {
    pub fn new(block_size: u32, search_radius: u32, energy_floor: f32) -> Self {
        Self {
            block_size: block_size.max(1),
            search_radius,
            energy_floor,
        }
    }

    /// Number of whole blocks that fit in each dimension of an image.
    pub fn grid(&self, width: u32, height: u32) -> (u32, u32) {
        (width / self.block_size, height / self.block_size)
    }

    #[inline]
    fn sad(
        &self,
        prev: &[u8],
        curr: &[u8],
        width: usize,
        (x0, y0): (usize, usize),
        (x1, y1): (usize, usize),
    ) -> u32 {
        let bs = self.block_size as usize;
        let mut total = 0;
        for j in 0..bs {
            let a = &prev[(y0 + j) * width + x0..][..bs];
            let b = &curr[(y1 + j) * width + x1..][..bs];
            total += a
                .iter()
                .zip(b)
                .map(|(&p, &c)| (p as i32 - c as i32).unsigned_abs())
                .sum::<u32>();
        }
        total
    }

    // Mean pixel intensity of a block.
    fn energy(&self, img: &[u8], width: usize, (x0, y0): (usize, usize)) -> f32 {
        let bs = self.block_size as usize;
        let sum: u32 = (0..bs)
            .map(|j| {
                img[(y0 + j) * width + x0..][..bs]
                    .iter()
                    .map(|&p| p as u32)
                    .sum::<u32>()
            })
            .sum();
        sum as f32 / (bs * bs) as f32
    }

    /// Estimates the displacement of every moving block from `prev` to `curr`.
    pub fn match_blocks(&self, prev: &GrayImage, curr: &GrayImage) -> Vec<BlockMotion> {
        debug_assert_eq!(prev.dimensions(), curr.dimensions());

        let (width, height) = prev.dimensions();
        let (cols, rows) = self.grid(width, height);
        let (prev, curr) = (prev.as_raw(), curr.as_raw());
        let (w, bs, r) = (
            width as usize,
            self.block_size as i64,
            self.search_radius as i64,
        );
        let (max_x, max_y) = (width as i64 - bs, height as i64 - bs);

        let mut motions = Vec::new();
        for row in 0..rows {
            for col in 0..cols {
                let (x0, y0) = ((col as i64) * bs, (row as i64) * bs);
                let origin = (x0 as usize, y0 as usize);
                if self.energy(prev, w, origin) < self.energy_floor {
                    continue;
                }

                let mut best = self.sad(prev, curr, w, origin, origin);
                let mut best_d = (0i64, 0i64);
                if best == 0 {
                    continue;
                }

                for dy in -r..=r {
                    for dx in -r..=r {
                        let (x1, y1) = (x0 + dx, y0 + dy);
                        if x1 < 0 || y1 < 0 || x1 > max_x || y1 > max_y {
                            continue;
                        }
                        let sad = self.sad(prev, curr, w, origin, (x1 as usize, y1 as usize));
                        // Ties go to the shorter displacement.
                        let shorter = dx * dx + dy * dy < best_d.0 * best_d.0 + best_d.1 * best_d.1;
                        if sad < best || (sad == best && shorter) {
                            best = sad;
                            best_d = (dx, dy);
                        }
                    }
                }

                if best_d != (0, 0) {
                    motions.push(BlockMotion {
                        col,
                        row,
                        dx: best_d.0 as i32,
                        dy: best_d.1 as i32,
                    });
                }
            }
        }

        motions
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn texture(x: u32, y: u32) -> u8 {
        (60 + (x * x * 7 + y * y * 13 + x * y * 5) % 170) as u8
    }

    // A 4x4 textured patch on a black 32x32 canvas, with its top-left corner at `(px, py)`.
    fn patch_at(px: u32, py: u32) -> GrayImage {
        GrayImage::from_fn(32, 32, |x, y| {
            if (px..px + 4).contains(&x) && (py..py + 4).contains(&y) {
                image::Luma([texture(x - px, y - py)])
            } else {
                image::Luma([0])
            }
        })
    }

    #[test]
    fn test_finds_displacement() {
        let matcher = BlockMatcher::new(4, 4, 8.0);
        let motions = matcher.match_blocks(&patch_at(8, 8), &patch_at(10, 9));
        assert_eq!(
            motions,
            vec![BlockMotion {
                col: 2,
                row: 2,
                dx: 2,
                dy: 1
            }]
        );
    }

    #[test]
    fn test_static_and_empty_blocks_are_ignored() {
        let matcher = BlockMatcher::new(4, 4, 8.0);
        let img = patch_at(12, 16);
        assert!(matcher.match_blocks(&img, &img).is_empty());
        assert!(matcher
            .match_blocks(&GrayImage::new(32, 32), &img)
            .is_empty());
    }

    #[test]
    fn test_search_stays_in_bounds() {
        let matcher = BlockMatcher::new(4, 4, 8.0);
        assert_eq!(matcher.grid(30, 18), (7, 4));
        let motions = matcher.match_blocks(&patch_at(0, 0), &patch_at(3, 0));
        assert_eq!(motions.len(), 1);
        assert_eq!((motions[0].dx, motions[0].dy), (3, 0));
    }
}
