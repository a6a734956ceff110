//! # Tree Node Model
//!
//! Expressions and plans are both immutable trees with a fixed number of children per
//! variant (zero, one, two or three). This module defines the contract they share.
//!
//! ## Contract
//!
//! - `children()` returns the ordered children.
//! - `with_children(new)` returns a *new* node with the same payload and the given
//!   children. Passing the wrong number of children is an `ArityMismatch`.
//! - `child(i)` fails with `IndexOutOfRange` outside `[0, arity)`.
//!
//! Nodes are never mutated in place. A rewrite always builds a replacement.
//!
//! ## Arity Views
//!
//! `as_unary()`, `as_binary()` and `as_ternary()` return thin borrowed views when the
//! node has exactly that many children. Their `first()/second()/third()` accessors are
//! defined purely through `child(i)`; the views hold nothing but the borrowed node.

use crate::error::{Result, RewriteError};

/// An immutable node with a fixed-arity, ordered list of children of its own kind.
pub trait TreeNode: Sized + Clone {
    /// Short variant name used in diagnostics and errors.
    fn node_name(&self) -> &'static str;

    fn children(&self) -> Vec<&Self>;

    /// Rebuild this node over `children`, keeping the payload.
    fn with_children(&self, children: Vec<Self>) -> Result<Self>;

    fn arity(&self) -> usize {
        self.children().len()
    }

    fn child(&self, index: usize) -> Result<&Self> {
        let children = self.children();
        let arity = children.len();
        children
            .into_iter()
            .nth(index)
            .ok_or_else(|| RewriteError::IndexOutOfRange {
                node: self.node_name().to_string(),
                index,
                arity,
            })
    }

    fn as_unary(&self) -> Option<UnaryView<'_, Self>> {
        (self.arity() == 1).then_some(UnaryView { node: self })
    }

    fn as_binary(&self) -> Option<BinaryView<'_, Self>> {
        (self.arity() == 2).then_some(BinaryView { node: self })
    }

    fn as_ternary(&self) -> Option<TernaryView<'_, Self>> {
        (self.arity() == 3).then_some(TernaryView { node: self })
    }

    /// Visit this node and all descendants in pre-order.
    fn foreach<F: FnMut(&Self)>(&self, f: &mut F) {
        f(self);
        for child in self.children() {
            child.foreach(f);
        }
    }

    /// True if `pred` holds for this node or any descendant.
    fn any<F: Fn(&Self) -> bool>(&self, pred: &F) -> bool {
        pred(self) || self.children().into_iter().any(|c| c.any(pred))
    }

    /// Pre-order collection of every node for which `f` returns `Some`.
    fn collect<'a, T, F>(&'a self, mut f: F) -> Vec<T>
    where
        F: FnMut(&'a Self) -> Option<T>,
    {
        let mut out = Vec::new();
        self.collect_into(&mut f, &mut out);
        out
    }

    #[doc(hidden)]
    fn collect_into<'a, T, F>(&'a self, f: &mut F, out: &mut Vec<T>)
    where
        F: FnMut(&'a Self) -> Option<T>,
    {
        if let Some(v) = f(self) {
            out.push(v);
        }
        for child in self.children() {
            child.collect_into(f, out);
        }
    }
}

/// Fail with `ArityMismatch` unless `actual == expected`.
pub fn check_arity<N: TreeNode>(node: &N, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(RewriteError::ArityMismatch {
            node: node.node_name().to_string(),
            expected,
            actual,
        })
    }
}

/// View of a node with exactly one child.
#[derive(Debug, Clone, Copy)]
pub struct UnaryView<'a, N> {
    node: &'a N,
}

impl<'a, N: TreeNode> UnaryView<'a, N> {
    pub fn node(&self) -> &'a N {
        self.node
    }

    pub fn first(&self) -> Result<&'a N> {
        self.node.child(0)
    }
}

/// View of a node with exactly two children.
#[derive(Debug, Clone, Copy)]
pub struct BinaryView<'a, N> {
    node: &'a N,
}

impl<'a, N: TreeNode> BinaryView<'a, N> {
    pub fn node(&self) -> &'a N {
        self.node
    }

    pub fn first(&self) -> Result<&'a N> {
        self.node.child(0)
    }

    pub fn second(&self) -> Result<&'a N> {
        self.node.child(1)
    }
}

/// View of a node with exactly three children.
#[derive(Debug, Clone, Copy)]
pub struct TernaryView<'a, N> {
    node: &'a N,
}

impl<'a, N: TreeNode> TernaryView<'a, N> {
    pub fn node(&self) -> &'a N {
        self.node
    }

    pub fn first(&self) -> Result<&'a N> {
        self.node.child(0)
    }

    pub fn second(&self) -> Result<&'a N> {
        self.node.child(1)
    }

    pub fn third(&self) -> Result<&'a N> {
        self.node.child(2)
    }
}
