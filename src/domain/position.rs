//! Sparse integer positions for ordering cards within a column and columns
//! within a board.
//!
//! Siblings are displayed in ascending position order. A moved item gets a
//! value between its new neighbours, so nothing else has to be rewritten.
//! When two neighbours are adjacent integers there is no such value; callers
//! then renumber the list with [`PositionAllocator::renumber`].

use crate::config::ReorderConfig;
use crate::error::Result;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("no integer position left at index {index}")]
    Exhausted { index: usize },

    #[error("insert index {index} is past the end of a list of {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Allocates positions with a fixed step between appended items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionAllocator {
    step: i64,
    initial: i64,
}

impl Default for PositionAllocator {
    fn default() -> Self {
        let config = ReorderConfig::default();
        Self {
            step: config.position_step,
            initial: config.default_position,
        }
    }
}

impl PositionAllocator {
    /// Builds an allocator from a config, rejecting steps that could not
    /// keep renumbered positions apart
    pub fn new(config: &ReorderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            step: config.position_step,
            initial: config.default_position,
        })
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    /// Position for an item landing at `index` among `positions`.
    ///
    /// `positions` are the destination siblings in display order, with the
    /// moved item already removed. An index past the end is treated as the
    /// tail. The value is not checked against its neighbours; see
    /// [`try_allocate`](Self::try_allocate).
    pub fn allocate(&self, positions: &[i64], index: usize) -> i64 {
        let len = positions.len();
        match (positions.first(), positions.last()) {
            (Some(&first), Some(&last)) => {
                if index == 0 {
                    first.saturating_sub(self.step).max(0)
                } else if index >= len {
                    last.saturating_add(self.step)
                } else {
                    midpoint(positions[index - 1], positions[index])
                }
            }
            _ => self.initial,
        }
    }

    /// Like [`allocate`](Self::allocate), but fails when the result would not
    /// sort strictly between its neighbours.
    pub fn try_allocate(
        &self,
        positions: &[i64],
        index: usize,
    ) -> std::result::Result<i64, PositionError> {
        let len = positions.len();
        if index > len {
            return Err(PositionError::IndexOutOfRange { index, len });
        }

        let value = self.allocate(positions, index);
        let after_before = index == 0 || positions[index - 1] < value;
        let before_after = index == len || value < positions[index];

        if after_before && before_after {
            Ok(value)
        } else {
            Err(PositionError::Exhausted { index })
        }
    }

    /// Position after every existing sibling
    pub fn append(&self, positions: impl IntoIterator<Item = i64>) -> i64 {
        positions
            .into_iter()
            .max()
            .map(|max| max.saturating_add(self.step))
            .unwrap_or(self.initial)
    }

    /// Evenly spaced positions for a list of `len` items
    pub fn renumber(&self, len: usize) -> Vec<i64> {
        (1..=len as i64).map(|i| i * self.step).collect()
    }
}

/// Position for an item landing at `index`, using the default step of 1000
pub fn allocate(positions: &[i64], index: usize) -> i64 {
    PositionAllocator::default().allocate(positions, index)
}

fn midpoint(a: i64, b: i64) -> i64 {
    ((a as i128 + b as i128).div_euclid(2)) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KanbanError;

    #[test]
    fn test_empty_list_uses_default() {
        assert_eq!(allocate(&[], 0), 1000);
        assert_eq!(allocate(&[], 5), 1000);
    }

    #[test]
    fn test_head_insert() {
        assert_eq!(allocate(&[3000, 4000], 0), 2000);
        assert_eq!(allocate(&[400, 4000], 0), 0);
    }

    #[test]
    fn test_tail_insert() {
        assert_eq!(allocate(&[1000, 2000], 2), 3000);
        assert_eq!(allocate(&[1000, 2000], 9), 3000);
    }

    #[test]
    fn test_midpoint_insert() {
        assert_eq!(allocate(&[2000, 3000], 1), 2500);
        assert_eq!(allocate(&[1000, 1003], 1), 1001);
    }

    #[test]
    fn test_midpoint_strictly_between() {
        let allocator = PositionAllocator::default();
        for (a, b) in [(0, 2), (5, 9), (-7, 3), (1000, 1002), (10, 1_000_000)] {
            let v = allocator.try_allocate(&[a, b], 1).unwrap();
            assert!(a < v && v < b, "{} < {} < {}", a, v, b);
        }
    }

    #[test]
    fn test_midpoint_floors() {
        assert_eq!(allocate(&[-3, 0], 1), -2);
        assert_eq!(allocate(&[1, 4], 1), 2);
    }

    #[test]
    fn test_adjacent_neighbours_are_exhausted() {
        let allocator = PositionAllocator::default();
        assert_eq!(
            allocator.try_allocate(&[1000, 1001], 1),
            Err(PositionError::Exhausted { index: 1 })
        );
        assert_eq!(
            allocator.try_allocate(&[1000, 1000], 1),
            Err(PositionError::Exhausted { index: 1 })
        );
    }

    #[test]
    fn test_head_at_zero_is_exhausted() {
        let allocator = PositionAllocator::default();
        assert_eq!(
            allocator.try_allocate(&[0, 1000], 0),
            Err(PositionError::Exhausted { index: 0 })
        );
        assert_eq!(allocator.try_allocate(&[1, 1000], 0), Ok(0));
    }

    #[test]
    fn test_index_out_of_range() {
        let allocator = PositionAllocator::default();
        assert_eq!(
            allocator.try_allocate(&[1000], 2),
            Err(PositionError::IndexOutOfRange { index: 2, len: 1 })
        );
    }

    #[test]
    fn test_repeated_halving_eventually_exhausts() {
        let allocator = PositionAllocator::default();
        let mut upper = 2000;
        let mut steps = 0;
        while let Ok(v) = allocator.try_allocate(&[1000, upper], 1) {
            upper = v;
            steps += 1;
        }
        assert_eq!(upper, 1001);
        assert!(steps >= 9);
    }

    #[test]
    fn test_append_and_renumber() {
        let allocator = PositionAllocator::new(&ReorderConfig {
            position_step: 10,
            default_position: 5,
        })
        .unwrap();
        assert_eq!(allocator.append([]), 5);
        assert_eq!(allocator.append([30, 10, 20]), 40);
        assert_eq!(allocator.renumber(3), vec![10, 20, 30]);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = PositionAllocator::new(&ReorderConfig {
            position_step: 0,
            default_position: 1000,
        });
        assert!(matches!(result, Err(KanbanError::ConfigError(_))));
    }
}
