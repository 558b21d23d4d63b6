use std::collections::HashMap;

use super::block::BlockMotion;

/// A coherent group of moving blocks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cluster {
    pub size: usize,
    pub mean_dx: f64,
    pub mean_dy: f64,
}

impl Cluster {
    /// Euclidean length of the mean displacement.
    pub fn magnitude(&self) -> f64 {
        self.mean_dx.hypot(self.mean_dy)
    }
}

fn distance(a: &BlockMotion, b: &BlockMotion) -> f32 {
    ((a.dx - b.dx) as f32).hypot((a.dy - b.dy) as f32)
}

/// Groups block motions into clusters.
///
/// Two blocks belong to the same cluster when they touch on the block grid (including diagonally)
/// and their displacements are at most `tolerance` pixels apart. Clusters with fewer than
/// `min_size` blocks are dropped as noise.
pub fn cluster(motions: &[BlockMotion], tolerance: f32, min_size: usize) -> Vec<Cluster> {
    let index: HashMap<(u32, u32), usize> = motions
        .iter()
        .enumerate()
        .map(|(i, m)| ((m.col, m.row), i))
        .collect();

    let mut visited = vec![false; motions.len()];
    let mut clusters = Vec::new();
    let mut stack = Vec::new();

    for seed in 0..motions.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        stack.push(seed);

        let (mut size, mut sum_dx, mut sum_dy) = (0usize, 0i64, 0i64);
        while let Some(i) = stack.pop() {
            let m = &motions[i];
            size += 1;
            sum_dx += m.dx as i64;
            sum_dy += m.dy as i64;

            for ny in m.row.saturating_sub(1)..=m.row + 1 {
                for nx in m.col.saturating_sub(1)..=m.col + 1 {
                    if let Some(&j) = index.get(&(nx, ny)) {
                        if !visited[j] && distance(m, &motions[j]) <= tolerance {
                            visited[j] = true;
                            stack.push(j);
                        }
                    }
                }
            }
        }

        if size >= min_size {
            clusters.push(Cluster {
                size,
                mean_dx: sum_dx as f64 / size as f64,
                mean_dy: sum_dy as f64 / size as f64,
            });
        }
    }

    clusters
}

#[cfg(test)]
mod test {
    use super::*;

    fn motion(col: u32, row: u32, dx: i32, dy: i32) -> BlockMotion {
        BlockMotion { col, row, dx, dy }
    }

    #[test]
    fn test_adjacent_blocks_form_cluster() {
        let motions = [
            motion(3, 3, 2, 0),
            motion(4, 4, 2, 1),
            motion(5, 4, 3, 1),
            // Isolated block.
            motion(10, 1, -4, 4),
        ];
        let clusters = cluster(&motions, 1.5, 2);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size, 3);
        assert!((clusters[0].mean_dx - 7.0 / 3.0).abs() < 1e-9);
        assert!((clusters[0].mean_dy - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_dissimilar_neighbours_split() {
        let motions = [
            motion(0, 0, 4, 0),
            motion(1, 0, 4, 0),
            motion(2, 0, -4, 0),
            motion(3, 0, -4, 0),
        ];
        let clusters = cluster(&motions, 1.5, 2);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].magnitude(), 4.0);
        assert_eq!(clusters[1].mean_dx, -4.0);
    }

    #[test]
    fn test_no_motion_no_clusters() {
        assert!(cluster(&[], 1.5, 1).is_empty());
        assert_eq!(cluster(&[motion(0, 0, 3, 4)], 1.5, 1)[0].magnitude(), 5.0);
    }
}
