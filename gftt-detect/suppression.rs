use gftt_core::Point2f;

/// Uniform bucket grid of accepted points, rebuilt per call
#[derive(Debug)]
pub struct SpatialGrid {
    cells: Vec<Vec<Point2f>>,
    cell_size: usize,
    grid_width: usize,
    grid_height: usize,
}

impl SpatialGrid {
    /// Grid covering a `width x height` image with square cells of `cell_size`
    pub fn new(width: usize, height: usize, cell_size: usize) -> Self {
        let cell_size = cell_size.max(1);
        let grid_width = width.div_ceil(cell_size).max(1);
        let grid_height = height.div_ceil(cell_size).max(1);
        Self {
            cells: vec![Vec::new(); grid_width * grid_height],
            cell_size,
            grid_width,
            grid_height,
        }
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.grid_width, self.grid_height)
    }

    #[inline]
    fn cell_of(&self, p: &Point2f) -> (usize, usize) {
        let cx = (p.x / self.cell_size as f32) as usize;
        let cy = (p.y / self.cell_size as f32) as usize;
        (cx.min(self.grid_width - 1), cy.min(self.grid_height - 1))
    }

    /// Whether any stored point in the 3x3 cell neighbourhood of `p` lies
    /// strictly closer than `sqrt(min_dist_sq)`
    pub fn has_neighbor_within(&self, p: &Point2f, min_dist_sq: f32) -> bool {
        let (cx, cy) = self.cell_of(p);
        let x1 = cx.saturating_sub(1);
        let y1 = cy.saturating_sub(1);
        let x2 = (cx + 1).min(self.grid_width - 1);
        let y2 = (cy + 1).min(self.grid_height - 1);

        for yy in y1..=y2 {
            for xx in x1..=x2 {
                let bucket = &self.cells[yy * self.grid_width + xx];
                if bucket.iter().any(|q| p.distance_sq(q) < min_dist_sq) {
                    return true;
                }
            }
        }
        false
    }

    pub fn insert(&mut self, p: Point2f) {
        let (cx, cy) = self.cell_of(&p);
        self.cells[cy * self.grid_width + cx].push(p);
    }
}

/// Greedy minimum-distance suppression over score-sorted candidates.
///
/// Walks `sorted` front to back and keeps a point only if no previously kept
/// point is closer than `min_distance`. Stops once `max_corners` points are
/// kept when `max_corners > 0`.
pub fn suppress(sorted: &[Point2f], min_distance: f64, max_corners: usize, width: usize, height: usize) -> Vec<Point2f> {
    let cell_size = min_distance.round().max(1.0) as usize;
    let min_dist_sq = (min_distance * min_distance) as f32;
    let mut grid = SpatialGrid::new(width, height, cell_size);
    let mut kept = Vec::with_capacity(if max_corners > 0 { max_corners.min(sorted.len()) } else { sorted.len() });

    for &p in sorted {
        if grid.has_neighbor_within(&p, min_dist_sq) {
            continue;
        }
        grid.insert(p);
        kept.push(p);
        if max_corners > 0 && kept.len() == max_corners {
            break;
        }
    }

    log::debug!(
        "suppression: {} -> {} points (min_distance={}, grid {:?})",
        sorted.len(),
        kept.len(),
        min_distance,
        grid.dimensions()
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_grid_dimensions_round_up() {
        let g = SpatialGrid::new(100, 45, 10);
        assert_eq!(g.dimensions(), (10, 5));
        let g = SpatialGrid::new(101, 41, 10);
        assert_eq!(g.dimensions(), (11, 5));
    }

    #[test]
    fn test_higher_score_wins() {
        let sorted = [Point2f::new(10.0, 10.0), Point2f::new(12.0, 10.0), Point2f::new(20.0, 10.0)];
        let kept = suppress(&sorted, 5.0, 0, 64, 64);
        assert_eq!(kept, vec![Point2f::new(10.0, 10.0), Point2f::new(20.0, 10.0)]);
    }

    #[test]
    fn test_exact_min_distance_is_kept() {
        let sorted = [Point2f::new(10.0, 10.0), Point2f::new(13.0, 14.0)];
        let kept = suppress(&sorted, 5.0, 0, 32, 32);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_neighbour_in_adjacent_cell_is_found() {
        // cell size 4: (7,7) and (8,8) sit in different cells
        let sorted = [Point2f::new(7.0, 7.0), Point2f::new(8.0, 8.0)];
        let kept = suppress(&sorted, 4.0, 0, 16, 16);
        assert_eq!(kept, vec![Point2f::new(7.0, 7.0)]);
    }

    #[test]
    fn test_max_corners_stops_early() {
        let sorted: Vec<Point2f> = (0..10).map(|i| Point2f::new(i as f32 * 10.0, 5.0)).collect();
        let kept = suppress(&sorted, 2.0, 3, 100, 10);
        assert_eq!(kept, sorted[..3].to_vec());
    }

    #[test]
    fn test_points_on_last_row_and_column() {
        let sorted = [Point2f::new(9.0, 9.0), Point2f::new(0.0, 0.0)];
        let kept = suppress(&sorted, 3.0, 0, 10, 10);
        assert_eq!(kept.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_kept_points_respect_min_distance(
            raw in prop::collection::vec((0u32..64, 0u32..48), 0..300),
            min_distance in 1.0f64..12.0,
            max_corners in 0usize..50,
        ) {
            let sorted: Vec<Point2f> = raw.iter().map(|&(x, y)| Point2f::new(x as f32, y as f32)).collect();
            let kept = suppress(&sorted, min_distance, max_corners, 64, 48);

            if max_corners > 0 {
                prop_assert!(kept.len() <= max_corners);
            }
            let md2 = (min_distance * min_distance) as f32;
            for i in 0..kept.len() {
                for j in (i + 1)..kept.len() {
                    prop_assert!(kept[i].distance_sq(&kept[j]) >= md2);
                }
            }
        }

        #[test]
        fn prop_matches_brute_force(
            raw in prop::collection::vec((0u32..40, 0u32..40), 0..200),
            min_distance in 1.0f64..8.0,
        ) {
            let sorted: Vec<Point2f> = raw.iter().map(|&(x, y)| Point2f::new(x as f32, y as f32)).collect();
            let md2 = (min_distance * min_distance) as f32;
            let mut expected: Vec<Point2f> = Vec::new();
            for p in &sorted {
                if expected.iter().all(|q| p.distance_sq(q) >= md2) {
                    expected.push(*p);
                }
            }
            prop_assert_eq!(suppress(&sorted, min_distance, 0, 40, 40), expected);
        }
    }
}
