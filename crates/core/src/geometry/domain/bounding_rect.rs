use super::landmark_set::LandmarkSet;

/// Axis-aligned pixel box. Invariant: `min_x <= max_x`, `min_y <= max_y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingRect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl BoundingRect {
    /// Tight min/max box around every landmark, in one pass.
    pub fn enclosing(landmarks: &LandmarkSet) -> Self {
        let (ax, ay) = landmarks.anchor();
        let mut rect = BoundingRect {
            min_x: ax,
            min_y: ay,
            max_x: ax,
            max_y: ay,
        };
        for &(x, y) in &landmarks.points()[1..] {
            rect.min_x = rect.min_x.min(x);
            rect.min_y = rect.min_y.min(y);
            rect.max_x = rect.max_x.max(x);
            rect.max_y = rect.max_y.max(y);
        }
        rect
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    pub fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i32 {
        self.max_y - self.min_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(points: &[(i32, i32)]) -> LandmarkSet {
        LandmarkSet::new(points.to_vec()).unwrap()
    }

    #[test]
    fn test_square_of_points() {
        let rect = BoundingRect::enclosing(&set(&[(10, 10), (20, 10), (20, 20), (10, 20)]));
        assert_eq!(
            rect,
            BoundingRect {
                min_x: 10,
                min_y: 10,
                max_x: 20,
                max_y: 20
            }
        );
        assert_eq!(rect.width(), 10);
        assert_eq!(rect.height(), 10);
    }

    #[test]
    fn test_single_point_is_zero_sized() {
        let rect = BoundingRect::enclosing(&set(&[(7, 3)]));
        assert_eq!((rect.min_x, rect.max_x, rect.min_y, rect.max_y), (7, 7, 3, 3));
        assert!(rect.contains(7, 3));
    }

    #[test]
    fn test_is_tight_not_padded() {
        let rect = BoundingRect::enclosing(&set(&[(5, 40), (30, 2), (12, 17)]));
        assert_eq!(rect.min_x, 5);
        assert_eq!(rect.max_x, 30);
        assert_eq!(rect.min_y, 2);
        assert_eq!(rect.max_y, 40);
        assert!(!rect.contains(4, 20));
        assert!(!rect.contains(31, 20));
    }

    #[test]
    fn test_contains_every_landmark_and_keeps_order_invariant() {
        // Deterministic pseudo-random scatter
        let mut seed: u32 = 17;
        let points: Vec<(i32, i32)> = (0..468)
            .map(|_| {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let x = ((seed >> 8) % 640) as i32;
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let y = ((seed >> 8) % 480) as i32;
                (x, y)
            })
            .collect();
        let landmarks = set(&points);
        let rect = BoundingRect::enclosing(&landmarks);
        assert!(rect.min_x <= rect.max_x);
        assert!(rect.min_y <= rect.max_y);
        for &(x, y) in landmarks.points() {
            assert!(rect.contains(x, y), "({x}, {y}) outside {rect:?}");
        }
    }
}
