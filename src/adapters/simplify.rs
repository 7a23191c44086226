//! # Shortcut Simplifier
//!
//! Greedy shortcutting over an [`Oracle`]: from each kept waypoint, jump to
//! the farthest later waypoint reachable by a single valid motion. The
//! endpoints never move. When the termination callback fires, the rest of
//! the path is kept as is.

use ndarray::Axis;

use crate::core::VertexMatrix;
use crate::ports::{Oracle, PathSimplifier, PlannerError, PlannerResult};

/// Path simplifier that drops redundant waypoints
#[derive(Debug)]
pub struct ShortcutSimplifier<'o, O: ?Sized> {
    oracle: &'o O,
}

impl<'o, O: Oracle + ?Sized> ShortcutSimplifier<'o, O> {
    pub fn new(oracle: &'o O) -> Self {
        Self { oracle }
    }
}

impl<O: Oracle + ?Sized> PathSimplifier for ShortcutSimplifier<'_, O> {
    fn simplify(
        &self,
        path: VertexMatrix,
        terminate: &mut dyn FnMut() -> bool,
    ) -> PlannerResult<VertexMatrix> {
        let n = path.nrows();
        if n < 3 {
            return Ok(path);
        }

        let rows: Vec<Vec<f64>> = path.rows().into_iter().map(|r| r.to_vec()).collect();
        let mut keep = vec![0usize];
        let mut i = 0;
        while i + 1 < n {
            if terminate() {
                keep.extend(i + 1..n);
                break;
            }
            let mut next = i + 1;
            for j in (i + 2..n).rev() {
                let ok = self
                    .oracle
                    .check_motion(&rows[i], &rows[j])
                    .map_err(|e| PlannerError::Failed(e.to_string()))?;
                if ok {
                    next = j;
                    break;
                }
            }
            keep.push(next);
            i = next;
        }

        Ok(path.select(Axis(0), &keep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::space::BoxSpace;
    use ndarray::array;

    #[test]
    fn test_shortcut_free_space_keeps_endpoints() {
        let space = BoxSpace::unit(2).unwrap();
        let path = array![[0.1, 0.1], [0.2, 0.5], [0.4, 0.2], [0.9, 0.9]];

        let out = ShortcutSimplifier::new(&space)
            .simplify(path, &mut || false)
            .unwrap();

        assert_eq!(out, array![[0.1, 0.1], [0.9, 0.9]]);
    }

    #[test]
    fn test_shortcut_respects_obstacles() {
        // Wall at x in [0.45, 0.55] below y = 0.9
        let space = BoxSpace::unit(2)
            .unwrap()
            .with_validity(|s| !(s[0] >= 0.45 && s[0] <= 0.55 && s[1] < 0.9))
            .with_resolution(0.002);
        let path = array![
            [0.1, 0.1],
            [0.2, 0.3],
            [0.3, 0.95],
            [0.7, 0.95],
            [0.8, 0.3],
            [0.9, 0.1]
        ];

        let out = ShortcutSimplifier::new(&space)
            .simplify(path, &mut || false)
            .unwrap();

        assert_eq!(out.nrows(), 4);
        assert_eq!(out.row(0).to_vec(), vec![0.1, 0.1]);
        assert_eq!(out.row(3).to_vec(), vec![0.9, 0.1]);
        for w in 0..out.nrows() - 1 {
            let a = out.row(w).to_vec();
            let b = out.row(w + 1).to_vec();
            assert!(space.check_motion(&a, &b).unwrap());
        }
    }

    #[test]
    fn test_shortcut_stops_when_told() {
        let space = BoxSpace::unit(2).unwrap();
        let path = array![[0.1, 0.1], [0.2, 0.2], [0.3, 0.3], [0.4, 0.4]];

        let out = ShortcutSimplifier::new(&space)
            .simplify(path.clone(), &mut || true)
            .unwrap();

        assert_eq!(out, path);
    }
}
