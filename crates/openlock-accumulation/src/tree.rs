//! Accumulation tree for a single denomination.
//!
//! An AVL tree keyed by lock duration. Every node carries the amount stored
//! at its own key plus the sum over its whole subtree, so:
//! - `increase` / `decrease` touch one root-to-leaf path: O(log n)
//! - `suffix_sum(d)` ("amount locked for at least `d`") walks one path: O(log n)
//!
//! A key whose amount drops to zero is removed, so the shape of the tree
//! depends only on the set of live `(duration, amount)` entries.

use std::cmp::Ordering;
use std::time::Duration;

use openlock_types::{Denom, LockupError, Result};
use rust_decimal::Decimal;

type Link = Option<Box<Node>>;

#[derive(Debug, Clone)]
struct Node {
    key: Duration,
    amount: Decimal,
    /// `amount` plus both subtrees.
    sum: Decimal,
    height: u32,
    left: Link,
    right: Link,
}

impl Node {
    fn leaf(key: Duration, amount: Decimal) -> Box<Self> {
        Box::new(Self {
            key,
            amount,
            sum: amount,
            height: 1,
            left: None,
            right: None,
        })
    }
}

fn height(link: &Link) -> u32 {
    link.as_ref().map_or(0, |n| n.height)
}

fn sum(link: &Link) -> Decimal {
    link.as_ref().map_or(Decimal::ZERO, |n| n.sum)
}

fn refresh(node: &mut Node) {
    node.height = 1 + height(&node.left).max(height(&node.right));
    node.sum = node.amount + sum(&node.left) + sum(&node.right);
}

fn rotate_right(mut node: Box<Node>) -> Box<Node> {
    let Some(mut pivot) = node.left.take() else {
        return node;
    };
    node.left = pivot.right.take();
    refresh(&mut node);
    pivot.right = Some(node);
    refresh(&mut pivot);
    pivot
}

fn rotate_left(mut node: Box<Node>) -> Box<Node> {
    let Some(mut pivot) = node.right.take() else {
        return node;
    };
    node.right = pivot.left.take();
    refresh(&mut node);
    pivot.left = Some(node);
    refresh(&mut pivot);
    pivot
}

fn rebalance(mut node: Box<Node>) -> Box<Node> {
    refresh(&mut node);
    let (lh, rh) = (height(&node.left), height(&node.right));
    if lh > rh + 1 {
        if let Some(left) = node.left.take() {
            node.left = Some(if height(&left.right) > height(&left.left) {
                rotate_left(left)
            } else {
                left
            });
        }
        rotate_right(node)
    } else if rh > lh + 1 {
        if let Some(right) = node.right.take() {
            node.right = Some(if height(&right.left) > height(&right.right) {
                rotate_right(right)
            } else {
                right
            });
        }
        rotate_left(node)
    } else {
        node
    }
}

/// Set the amount at `key`, inserting the key if absent.
fn upsert(link: Link, key: Duration, amount: Decimal) -> Box<Node> {
    let Some(mut node) = link else {
        return Node::leaf(key, amount);
    };
    match key.cmp(&node.key) {
        Ordering::Less => node.left = Some(upsert(node.left.take(), key, amount)),
        Ordering::Greater => node.right = Some(upsert(node.right.take(), key, amount)),
        Ordering::Equal => node.amount = amount,
    }
    rebalance(node)
}

/// Detach the minimum node of a subtree. Returns `(rest, min)`.
fn take_min(mut node: Box<Node>) -> (Link, Box<Node>) {
    match node.left.take() {
        None => {
            let rest = node.right.take();
            (rest, node)
        }
        Some(left) => {
            let (rest, min) = take_min(left);
            node.left = rest;
            (Some(rebalance(node)), min)
        }
    }
}

fn remove(link: Link, key: Duration) -> Link {
    let mut node = link?;
    match key.cmp(&node.key) {
        Ordering::Less => node.left = remove(node.left.take(), key),
        Ordering::Greater => node.right = remove(node.right.take(), key),
        Ordering::Equal => match (node.left.take(), node.right.take()) {
            (None, None) => return None,
            (Some(child), None) | (None, Some(child)) => return Some(child),
            (Some(left), Some(right)) => {
                let (rest, mut successor) = take_min(right);
                successor.left = Some(left);
                successor.right = rest;
                node = successor;
            }
        },
    }
    Some(rebalance(node))
}

/// Duration-keyed running totals for one denomination.
#[derive(Debug, Clone)]
pub struct AccumulationTree {
    denom: Denom,
    root: Link,
    len: usize,
}

impl AccumulationTree {
    /// Create an empty tree for `denom`.
    #[must_use]
    pub fn new(denom: impl Into<Denom>) -> Self {
        Self {
            denom: denom.into(),
            root: None,
            len: 0,
        }
    }

    /// The denomination this tree accumulates.
    #[must_use]
    pub fn denom(&self) -> &str {
        &self.denom
    }

    /// Number of distinct durations with a non-zero amount.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Amount stored at exactly `key`.
    #[must_use]
    pub fn get(&self, key: Duration) -> Decimal {
        let mut cur = self.root.as_deref();
        while let Some(node) = cur {
            cur = match key.cmp(&node.key) {
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
                Ordering::Equal => return node.amount,
            };
        }
        Decimal::ZERO
    }

    /// Sum over every key.
    #[must_use]
    pub fn total(&self) -> Decimal {
        sum(&self.root)
    }

    /// Sum over keys `>= key`.
    #[must_use]
    pub fn suffix_sum(&self, key: Duration) -> Decimal {
        let mut acc = Decimal::ZERO;
        let mut cur = self.root.as_deref();
        while let Some(node) = cur {
            if node.key >= key {
                acc += node.amount + sum(&node.right);
                cur = node.left.as_deref();
            } else {
                cur = node.right.as_deref();
            }
        }
        acc
    }

    /// Sum over keys `< key`.
    #[must_use]
    pub fn prefix_sum(&self, key: Duration) -> Decimal {
        self.total() - self.suffix_sum(key)
    }

    /// Sum over keys in `[from, to)`. Zero when `from >= to`.
    #[must_use]
    pub fn range_sum(&self, from: Duration, to: Duration) -> Decimal {
        if from >= to {
            return Decimal::ZERO;
        }
        self.suffix_sum(from) - self.suffix_sum(to)
    }

    /// Add `amount` at `key`.
    ///
    /// # Errors
    /// - `AmountOverflow` if the tree total would not fit
    /// - `Internal` for a negative amount
    pub fn increase(&mut self, key: Duration, amount: Decimal) -> Result<()> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(LockupError::Internal(format!(
                "negative accumulation increase {amount} for {}",
                self.denom
            )));
        }
        if amount.is_zero() {
            return Ok(());
        }
        if self.total().checked_add(amount).is_none() {
            return Err(LockupError::AmountOverflow {
                denom: self.denom.clone(),
            });
        }
        let current = self.get(key);
        if current.is_zero() {
            self.len += 1;
        }
        self.root = Some(upsert(self.root.take(), key, current + amount));
        Ok(())
    }

    /// Remove `amount` from `key`; the key disappears when it reaches zero.
    ///
    /// # Errors
    /// `AccumulationUnderflow` if `amount` exceeds what is stored at `key`.
    /// The tree is unchanged in that case.
    pub fn decrease(&mut self, key: Duration, amount: Decimal) -> Result<()> {
        let current = self.get(key);
        if amount.is_sign_negative() || amount > current {
            return Err(LockupError::AccumulationUnderflow {
                denom: self.denom.clone(),
                duration: key,
                stored: current,
                requested: amount,
            });
        }
        if amount.is_zero() {
            return Ok(());
        }
        let rest = current - amount;
        if rest.is_zero() {
            self.root = remove(self.root.take(), key);
            self.len -= 1;
        } else {
            self.root = Some(upsert(self.root.take(), key, rest));
        }
        Ok(())
    }

    /// Entries in ascending duration order.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self.root.as_deref())
    }
}

/// In-order iterator over `(duration, amount)` entries.
pub struct Iter<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iter<'a> {
    fn new(root: Option<&'a Node>) -> Self {
        let mut iter = Self { stack: Vec::new() };
        iter.push_left(root);
        iter
    }

    fn push_left(&mut self, mut cur: Option<&'a Node>) {
        while let Some(node) = cur {
            self.stack.push(node);
            cur = node.left.as_deref();
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = (Duration, Decimal);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        Some((node.key, node.amount))
    }
}

#[cfg(test)]
impl AccumulationTree {
    /// Check ordering, AVL balance and cached sums/heights of every node.
    fn assert_well_formed(&self) {
        fn walk(link: &Link, lo: Option<Duration>, hi: Option<Duration>) -> (u32, Decimal) {
            let Some(node) = link else {
                return (0, Decimal::ZERO);
            };
            assert!(lo.is_none_or(|lo| node.key > lo), "order violated");
            assert!(hi.is_none_or(|hi| node.key < hi), "order violated");
            assert!(node.amount > Decimal::ZERO, "zero entry kept");
            let (lh, ls) = walk(&node.left, lo, Some(node.key));
            let (rh, rs) = walk(&node.right, Some(node.key), hi);
            assert!(lh.abs_diff(rh) <= 1, "unbalanced at {:?}", node.key);
            assert_eq!(node.height, 1 + lh.max(rh));
            assert_eq!(node.sum, node.amount + ls + rs);
            (node.height, node.sum)
        }
        walk(&self.root, None, None);
        assert_eq!(self.iter().count(), self.len);
    }

    fn depth(&self) -> u32 {
        height(&self.root)
    }
}
