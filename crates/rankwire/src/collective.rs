//! Collectives over a rooted binary tree.
//!
//! Every collective is built from the same two halves: `collect` folds
//! contributions up the tree toward the root, `distribute` fans a buffer
//! back down. Both carry a rolling status word at the tail of every
//! payload, so an error observed anywhere reaches every participant and
//! all ranks return the same dominant outcome.

use rankwire_frame::tag;

use crate::error::{combine, decode_status, encode_status, CommError, Result, STATUS_SIZE};
use crate::world::World;

/// Children per node of the collective tree.
const FANOUT: usize = 2;

/// Elementwise reduction operator over byte arrays.
///
/// Arithmetic is byte-wise modulo 256; values are never promoted to wider
/// types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Max,
    Min,
    Sum,
    Prod,
}

impl ReduceOp {
    fn fold(self, acc: &mut [u8], other: &[u8]) {
        for (a, b) in acc.iter_mut().zip(other) {
            *a = match self {
                ReduceOp::Max => (*a).max(*b),
                ReduceOp::Min => (*a).min(*b),
                ReduceOp::Sum => a.wrapping_add(*b),
                ReduceOp::Prod => a.wrapping_mul(*b),
            };
        }
    }
}

/// Folding over nothing; used by status-only collects.
const SYNC_OP: ReduceOp = ReduceOp::Max;

/// This rank's place in the tree rooted at `root`.
///
/// Logical positions form a 1-based binary heap after rotating the ranks
/// so the root lands at position 1: rank `r` sits at
/// `((size + r - root) % size) + 1`, its parent at half its position, its
/// children at double (positions past `size` do not exist).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tree {
    pub(crate) parent: Option<usize>,
    pub(crate) children: [Option<usize>; FANOUT],
}

impl Tree {
    pub(crate) fn new(rank: usize, root: usize, size: usize) -> Self {
        let position = (size + rank - root) % size + 1;

        let parent = if position == 1 {
            None
        } else {
            Some((position / FANOUT + root - 1) % size)
        };

        let mut children = [None; FANOUT];
        for (slot, child) in children.iter_mut().enumerate() {
            let child_position = position * FANOUT + slot;
            if child_position <= size {
                *child = Some((child_position + root - 1) % size);
            }
        }

        Self { parent, children }
    }
}

impl World {
    /// Wait until every rank has entered the barrier.
    ///
    /// Either all ranks return `Ok`, or all return the same dominant
    /// error.
    pub fn barrier(&mut self) -> Result<()> {
        let tree = Tree::new(self.rank(), 0, self.size());
        let status = self.collect(&tree, &[], None, SYNC_OP);
        self.distribute(&tree, &mut [], status)
    }

    /// Replicate `root`'s `data` into every rank's `data`.
    ///
    /// All ranks must call with the same `root` and equally sized
    /// buffers. On any non-success outcome, `data` is left untouched at
    /// non-root ranks and all ranks return the same dominant error.
    pub fn broadcast(&mut self, data: &mut [u8], root: usize) -> Result<()> {
        if root >= self.size() {
            return Err(CommError::NoSuchRank);
        }
        let tree = Tree::new(self.rank(), root, self.size());
        let status = self.collect(&tree, &[], None, SYNC_OP);
        self.distribute(&tree, data, status)
    }

    /// Fold every rank's `contribution` elementwise under `op`, leaving
    /// the result in `root`'s `result` buffer.
    ///
    /// All ranks must call with the same `root`, `op` and contribution
    /// size. `result` is written only at the root and is meaningful only
    /// when the call succeeds; other ranks may pass `None`.
    pub fn reduce(
        &mut self,
        contribution: &[u8],
        result: Option<&mut [u8]>,
        op: ReduceOp,
        root: usize,
    ) -> Result<()> {
        if root >= self.size() {
            return Err(CommError::NoSuchRank);
        }
        let tree = Tree::new(self.rank(), root, self.size());
        let result = if self.rank() == root { result } else { None };
        let status = self.collect(&tree, contribution, result, op);
        self.distribute(&tree, &mut [], status)
    }

    /// The up-tree half: receive each child's buffer, fold its status and
    /// payload into ours, then pass the combination to the parent.
    fn collect(
        &mut self,
        tree: &Tree,
        contribution: &[u8],
        result: Option<&mut [u8]>,
        op: ReduceOp,
    ) -> Result<()> {
        let count = contribution.len();

        let mut buf = vec![0u8; count + STATUS_SIZE];
        buf[..count].copy_from_slice(contribution);
        let mut child_buf = vec![0u8; count + STATUS_SIZE];
        let mut status: Result<()> = Ok(());

        for child in tree.children.iter().flatten() {
            let transfer = self.retrieve(*child, tag::GROUP, &mut child_buf);
            status = combine(status, transfer);
            if transfer.is_ok() {
                status = combine(status, decode_status(&child_buf[count..]));
                op.fold(&mut buf[..count], &child_buf[..count]);
            }
        }

        if let Some(result) = result {
            result.copy_from_slice(&buf[..count]);
        }

        if let Some(parent) = tree.parent {
            buf[count..].copy_from_slice(&encode_status(status));
            status = combine(status, self.send_frame(parent, tag::GROUP, &buf));
        }

        status
    }

    /// The down-tree half: take the buffer from the parent (or seed it at
    /// the root), forward it to every child, and commit the payload only
    /// if the final status is success.
    fn distribute(&mut self, tree: &Tree, data: &mut [u8], initial: Result<()>) -> Result<()> {
        let count = data.len();

        let mut buf = vec![0u8; count + STATUS_SIZE];
        let mut status = match tree.parent {
            None => {
                buf[..count].copy_from_slice(data);
                initial
            }
            Some(parent) => match self.retrieve(parent, tag::GROUP, &mut buf) {
                // The parent's status already folds everything above us.
                Ok(()) => decode_status(&buf[count..]),
                Err(err) => combine(initial, Err(err)),
            },
        };

        for child in tree.children.iter().flatten() {
            buf[count..].copy_from_slice(&encode_status(status));
            status = combine(status, self.send_frame(*child, tag::GROUP, &buf));
        }

        if tree.parent.is_some() && status.is_ok() {
            data.copy_from_slice(&buf[..count]);
        }

        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_wise_operators() {
        let mut acc = [1u8, 200, 7, 0];

        let mut max = acc;
        ReduceOp::Max.fold(&mut max, &[2, 100, 7, 1]);
        assert_eq!(max, [2, 200, 7, 1]);

        let mut min = acc;
        ReduceOp::Min.fold(&mut min, &[2, 100, 7, 1]);
        assert_eq!(min, [1, 100, 7, 0]);

        ReduceOp::Sum.fold(&mut acc, &[255, 100, 1, 3]);
        assert_eq!(acc, [0, 44, 8, 3], "sum wraps modulo 256");

        let mut prod = [16u8, 3];
        ReduceOp::Prod.fold(&mut prod, &[32, 5]);
        assert_eq!(prod, [0, 15], "product wraps modulo 256");
    }

    #[test]
    fn folding_an_empty_slice_is_a_no_op() {
        let mut acc: [u8; 0] = [];
        SYNC_OP.fold(&mut acc, &[]);
    }

    #[test]
    fn tree_rooted_at_zero() {
        // size 7: positions are ranks + 1.
        assert_eq!(
            Tree::new(0, 0, 7),
            Tree {
                parent: None,
                children: [Some(1), Some(2)],
            }
        );
        assert_eq!(
            Tree::new(1, 0, 7),
            Tree {
                parent: Some(0),
                children: [Some(3), Some(4)],
            }
        );
        assert_eq!(
            Tree::new(2, 0, 7),
            Tree {
                parent: Some(0),
                children: [Some(5), Some(6)],
            }
        );
        assert_eq!(
            Tree::new(6, 0, 7),
            Tree {
                parent: Some(2),
                children: [None, None],
            }
        );
    }

    #[test]
    fn tree_rotates_around_the_root() {
        // size 4, root 2: 2 -> {3, 0}, 3 -> {1}.
        assert_eq!(
            Tree::new(2, 2, 4),
            Tree {
                parent: None,
                children: [Some(3), Some(0)],
            }
        );
        assert_eq!(
            Tree::new(3, 2, 4),
            Tree {
                parent: Some(2),
                children: [Some(1), None],
            }
        );
        assert_eq!(
            Tree::new(0, 2, 4),
            Tree {
                parent: Some(2),
                children: [None, None],
            }
        );
        assert_eq!(
            Tree::new(1, 2, 4),
            Tree {
                parent: Some(3),
                children: [None, None],
            }
        );
    }

    #[test]
    fn every_rank_has_a_path_to_the_root() {
        for size in 1..=16 {
            for root in 0..size {
                let mut reached = vec![false; size];
                for rank in 0..size {
                    let mut at = rank;
                    for _ in 0..size {
                        if at == root {
                            break;
                        }
                        at = Tree::new(at, root, size)
                            .parent
                            .expect("non-root rank must have a parent");
                    }
                    assert_eq!(at, root, "rank {rank} is disconnected");
                    reached[rank] = true;
                }
                assert!(reached.iter().all(|r| *r));
            }
        }
    }

    #[test]
    fn parent_and_child_views_agree() {
        for size in 1..=16 {
            for root in 0..size {
                for rank in 0..size {
                    for child in Tree::new(rank, root, size).children.iter().flatten() {
                        assert_eq!(
                            Tree::new(*child, root, size).parent,
                            Some(rank),
                            "size {size} root {root}: {child} is a child of {rank}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn single_rank_tree_is_just_the_root() {
        assert_eq!(
            Tree::new(0, 0, 1),
            Tree {
                parent: None,
                children: [None, None],
            }
        );
    }
}
