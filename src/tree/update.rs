//! Point updates: the insertion walk for `add`, the subtraction walk for
//! `remove`
//!
//! Both walks stage their effects before touching the store: `add` collects
//! its ancestor bumps and resolves the splice read-only, `remove` verifies
//! the whole path first. A call that fails therefore leaves the tree exactly
//! as it was.

use tracing::trace;

use super::addressing::{ancestor_at, common_ancestor};
use super::{CumulativeTree, Node, TreeError};

/// Outcome of the insertion walk at the target's canonical slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Splice {
    /// The target node is already wired; only values change.
    Existing,
    /// The target becomes a fresh leaf under `parent`.
    Leaf { parent: u64 },
    /// The subtree rooted at `displaced` is re-parented under the common
    /// ancestor `junction`, which takes its place under `parent`.
    Reparent {
        parent: u64,
        junction: u64,
        displaced: u64,
    },
}

/// Latest staged record for `key`, falling back to the live store.
fn staged(tree: &CumulativeTree, writes: &[(u64, Node)], key: u64) -> Node {
    writes
        .iter()
        .rev()
        .find(|(k, _)| *k == key)
        .map(|(_, n)| *n)
        .unwrap_or_else(|| tree.node(key))
}

fn checked_bump(node: u64, value: u128, delta: u128) -> Result<u128, TreeError> {
    value
        .checked_add(delta)
        .ok_or(TreeError::Overflow { node, delta })
}

impl CumulativeTree {
    /// Apply `delta` at `x`, materializing the key's canonical slot (and a
    /// fresh ancestor, when an unrelated subtree already hangs there) on
    /// first contact.
    ///
    /// Every materialized ancestor whose interval covers `x` absorbs the
    /// delta as well, which is what keeps `prefix_sum` answers consistent.
    pub fn add(&mut self, x: u64, delta: u128) -> Result<(), TreeError> {
        self.ensure_operable(x)?;

        // Read-only walk down the canonical path. `child` is the pointer
        // inherited from the last materialized ancestor `p`; canonical
        // addresses that nothing materialized are passed through.
        let mut bumps: Vec<u64> = Vec::new();
        let mut p: u64 = 0;
        let mut child = self.root_key();
        let mut i = self.nbits() - 1;
        let splice = loop {
            let cx = ancestor_at(x, i);
            if cx == x {
                break if child == x {
                    Splice::Existing
                } else if child == 0 {
                    Splice::Leaf { parent: p }
                } else {
                    let junction = common_ancestor(x, child, self.nbits())?;
                    if junction == child {
                        // A materialized ancestor of `x` would have been
                        // consumed by the walk before its slot was reached.
                        return Err(TreeError::Internal(format!(
                            "node {child} resurfaced as the junction while inserting {x}"
                        )));
                    }
                    Splice::Reparent {
                        parent: p,
                        junction,
                        displaced: child,
                    }
                };
            }
            if cx == child {
                // Materialized ancestor sitting on the canonical path.
                let node = self.node(cx);
                if x < cx {
                    bumps.push(cx);
                    child = node.left;
                } else {
                    child = node.right;
                }
                p = cx;
            }
            // cx == x fires at i == height(x), so the walk always breaks
            // before the depth counter runs out.
            if i == 0 {
                return Err(TreeError::Internal(format!(
                    "insertion walk for {x} overran its canonical path"
                )));
            }
            i -= 1;
        };

        // Stage every write, then commit. Later entries win, so a parent
        // that also absorbed the delta keeps its bump when it is re-linked.
        let mut writes: Vec<(u64, Node)> = Vec::new();
        for &k in &bumps {
            let mut node = self.node(k);
            node.value = checked_bump(k, node.value, delta)?;
            writes.push((k, node));
        }

        match splice {
            Splice::Existing => {
                let mut node = staged(self, &writes, x);
                node.value = checked_bump(x, node.value, delta)?;
                writes.push((x, node));
            }
            Splice::Leaf { parent } => {
                writes.push((
                    x,
                    Node {
                        left: 0,
                        right: 0,
                        value: delta,
                    },
                ));
                let mut pn = staged(self, &writes, parent);
                if x < parent {
                    pn.left = x;
                } else {
                    pn.right = x;
                }
                writes.push((parent, pn));
            }
            Splice::Reparent {
                parent,
                junction,
                displaced,
            } => {
                trace!(key = x, junction, displaced, "splicing ancestor node");
                let mut jn = Node::default();
                if displaced < junction {
                    // The displaced subtree lands on the junction's left,
                    // inside the junction's own interval: the cumulative
                    // contribution along its right spine moves up to the
                    // junction so prefix sums through it stay intact.
                    jn.left = displaced;
                    jn.value = self.right_spine_sum(displaced, junction)?;
                } else {
                    jn.right = displaced;
                }
                if x < junction {
                    jn.left = x;
                    jn.value = checked_bump(junction, jn.value, delta)?;
                } else if x > junction {
                    jn.right = x;
                }
                if junction == x {
                    // Inserting a key directly above its own materialized
                    // descendant: the junction is the target itself.
                    jn.value = checked_bump(x, jn.value, delta)?;
                    writes.push((junction, jn));
                } else {
                    writes.push((junction, jn));
                    writes.push((
                        x,
                        Node {
                            left: 0,
                            right: 0,
                            value: delta,
                        },
                    ));
                }
                let mut pn = staged(self, &writes, parent);
                if x < parent {
                    pn.left = junction;
                } else {
                    pn.right = junction;
                }
                writes.push((parent, pn));
            }
        }

        for (k, n) in writes {
            self.put(k, n);
        }
        Ok(())
    }

    /// Subtract `delta` at `x`, touching exactly the ancestor set whose
    /// values include `x`'s contribution.
    ///
    /// Removal never creates nodes. Removing more than was added — or
    /// removing at a key whose path was never materialized — fails without
    /// mutating anything, rather than wrapping below zero.
    pub fn remove(&mut self, x: u64, delta: u128) -> Result<(), TreeError> {
        self.ensure_operable(x)?;

        // Verify the whole path before subtracting anywhere.
        let mut touched: Vec<u64> = Vec::new();
        let mut cur = self.root_key();
        loop {
            if cur == 0 {
                return Err(TreeError::KeyNeverAdded { key: x });
            }
            let node = self.node(cur);
            if x <= cur {
                if node.value < delta {
                    return Err(TreeError::Underflow {
                        key: x,
                        node: cur,
                        delta,
                    });
                }
                touched.push(cur);
                if x == cur {
                    break;
                }
                cur = node.left;
            } else {
                cur = node.right;
            }
        }

        for k in touched {
            let mut node = self.node(k);
            node.value -= delta;
            self.put(k, node);
        }
        Ok(())
    }

    /// Sum of `value` along the right spine of the subtree rooted at
    /// `start`: the cumulative contribution a re-parented subtree hands to
    /// its new ancestor.
    fn right_spine_sum(&self, start: u64, junction: u64) -> Result<u128, TreeError> {
        let mut total: u128 = 0;
        let mut cur = start;
        while cur != 0 {
            let node = self.node(cur);
            total = total
                .checked_add(node.value)
                .ok_or(TreeError::Overflow {
                    node: junction,
                    delta: node.value,
                })?;
            cur = node.right;
        }
        Ok(total)
    }
}
