//! Flat reply list -> reply forest.
//!
//! Replies arrive flat and oldest first. [`build_tree`] links every reply to
//! its parent in one pass over an arena, keeping input order among siblings.
//! A reply whose parent is not in the input (deleted, or on another page) is
//! promoted to a root instead of being dropped.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{Id, Reply};

#[derive(Debug, Clone, PartialEq)]
struct Slot {
    reply: Reply,
    children: Vec<usize>,
}

/// Arena-backed forest of replies. Children are index lists into the arena.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReplyForest {
    nodes: Vec<Slot>,
    roots: Vec<usize>,
    index: HashMap<Id, usize>,
}

/// Nested, owned form of one forest node. Serializes as the reply's own
/// fields plus a `children` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyNode {
    #[serde(flatten)]
    pub reply: Reply,
    pub children: Vec<ReplyNode>,
}

/// Builds the forest in O(n). Never fails and never reorders.
///
/// Parent links are followed through the lookup only, each reply is placed
/// exactly once, so malformed links (even cycles) cannot make this loop.
/// Replies caught in a cycle simply never hang off a root.
pub fn build_tree<I>(replies: I) -> ReplyForest
where
    I: IntoIterator<Item = Reply>,
{
    let mut nodes: Vec<Slot> = replies
        .into_iter()
        .map(|reply| Slot { reply, children: Vec::new() })
        .collect();

    let mut index = HashMap::with_capacity(nodes.len());
    for (pos, slot) in nodes.iter().enumerate() {
        // first occurrence owns a duplicated id
        index.entry(slot.reply.reply_id).or_insert(pos);
    }

    let mut roots = Vec::new();
    for pos in 0..nodes.len() {
        let parent = nodes[pos]
            .reply
            .parent_reply_id
            .and_then(|p| index.get(&p).copied());
        match parent {
            Some(parent) => nodes[parent].children.push(pos),
            None => roots.push(pos),
        }
    }

    ReplyForest { nodes, roots, index }
}

impl ReplyForest {
    /// Number of replies held, reachable from a root or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, reply_id: Id) -> Option<&Reply> {
        self.index.get(&reply_id).map(|&pos| &self.nodes[pos].reply)
    }

    pub fn roots(&self) -> impl Iterator<Item = &Reply> + '_ {
        self.roots.iter().map(move |&pos| &self.nodes[pos].reply)
    }

    /// Children of `reply_id` in input order; empty for unknown ids.
    pub fn children(&self, reply_id: Id) -> impl Iterator<Item = &Reply> + '_ {
        let kids: &[usize] = match self.index.get(&reply_id) {
            Some(&pos) => &self.nodes[pos].children,
            None => &[],
        };
        kids.iter().map(move |&pos| &self.nodes[pos].reply)
    }

    pub fn root_ids(&self) -> Vec<Id> {
        self.roots().map(|r| r.reply_id).collect()
    }

    pub fn child_ids(&self, reply_id: Id) -> Vec<Id> {
        self.children(reply_id).map(|r| r.reply_id).collect()
    }

    /// Arena positions in depth-first pre-order, with depth (roots at 0).
    fn preorder(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, usize)> = self.roots.iter().rev().map(|&p| (p, 0)).collect();
        while let Some((pos, depth)) = stack.pop() {
            out.push((pos, depth));
            for &child in self.nodes[pos].children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }

    /// Visits every reply reachable from a root, parents before children,
    /// siblings in input order. Iterative, so depth is not bounded by the
    /// call stack.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&Reply, usize),
    {
        for (pos, depth) in self.preorder() {
            visit(&self.nodes[pos].reply, depth);
        }
    }

    /// Bottom-up fold: `render` receives a reply and the already rendered
    /// children, and the rendered roots come back in order.
    pub fn fold<T, F>(&self, mut render: F) -> Vec<T>
    where
        F: FnMut(&Reply, Vec<T>) -> T,
    {
        let mut built: Vec<Option<T>> = (0..self.nodes.len()).map(|_| None).collect();
        // reverse pre-order puts every child ahead of its parent
        for (pos, _) in self.preorder().into_iter().rev() {
            let children = self.nodes[pos]
                .children
                .iter()
                .filter_map(|&c| built[c].take())
                .collect();
            built[pos] = Some(render(&self.nodes[pos].reply, children));
        }
        self.roots.iter().filter_map(|&r| built[r].take()).collect()
    }

    pub fn to_nested(&self) -> Vec<ReplyNode> {
        self.fold(|reply, children| ReplyNode { reply: reply.clone(), children })
    }
}
