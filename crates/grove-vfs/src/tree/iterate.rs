//! Resumable depth-first iteration.
//!
//! The hierarchical query mode walks one place's subtree in depth-first,
//! name-sorted order. Pagination resumes from a cursor naming the last
//! emitted node (its type plus name path), without re-walking subtrees that
//! were already delivered: for a directory cursor the walk continues with
//! its first child, for a file cursor with the next sibling.

use super::arena::NodeId;
use super::forest::Forest;
use crate::types::EntryKind;

/// Resumption point inside one place's walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreePosition {
    pub kind: EntryKind,
    /// Name path of the last emitted node, relative to the place.
    pub path: Vec<String>,
}

/// Visitor verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Continue,
    /// Enough matches; stop the whole iteration.
    Stop,
}

impl Forest {
    /// Walks `place`'s subtree depth-first in name order, starting after
    /// `resume` when given. The place itself is not visited. Returns true
    /// when the visitor stopped the walk early.
    pub fn iterate<F>(&self, place: NodeId, resume: Option<&TreePosition>, visit: &mut F) -> bool
    where
        F: FnMut(NodeId, &[String]) -> Walk,
    {
        // Stack of (directory, index of next child to visit).
        let mut stack: Vec<(NodeId, usize)> = Vec::new();
        let mut path: Vec<String> = Vec::new();

        match resume {
            None => stack.push((place, 0)),
            Some(cursor) => {
                // Rebuild the ancestor frames along the cursor path. A
                // cursor that no longer resolves (entry deleted between
                // pages) degrades to resuming at the nearest surviving
                // ancestor position.
                let mut dir = place;
                let mut ok = true;
                for (depth, segment) in cursor.path.iter().enumerate() {
                    let children = match self.node(dir).and_then(|n| n.as_dir()) {
                        Some(d) => &d.children,
                        None => {
                            ok = false;
                            break;
                        }
                    };
                    // First child >= segment; exact match resumes past it,
                    // a miss resumes at the successor.
                    let pos = children.partition_point(|&c| {
                        self.node(c)
                            .map(|n| n.name.as_str() < segment.as_str())
                            .unwrap_or(false)
                    });
                    let exact = children
                        .get(pos)
                        .and_then(|&c| self.node(c))
                        .map(|n| n.name.as_str() == segment.as_str())
                        .unwrap_or(false);
                    let last = depth + 1 == cursor.path.len();
                    if !exact {
                        stack.push((dir, pos));
                        ok = false;
                        break;
                    }
                    if last && cursor.kind == EntryKind::Directory {
                        // The directory itself was emitted; descend into it.
                        stack.push((dir, pos + 1));
                        path.push(segment.clone());
                        stack.push((children[pos], 0));
                    } else if last {
                        stack.push((dir, pos + 1));
                    } else {
                        stack.push((dir, pos + 1));
                        path.push(segment.clone());
                        dir = children[pos];
                    }
                }
                if stack.is_empty() && !ok {
                    path.clear();
                    stack.push((place, 0));
                }
                // Invariant: `path` names the directory on top of the stack.
                path.truncate(stack.len().saturating_sub(1));
            }
        }

        while let Some(&mut (dir, ref mut next)) = stack.last_mut() {
            let child = self
                .node(dir)
                .and_then(|n| n.as_dir())
                .and_then(|d| d.children.get(*next).copied());
            match child {
                None => {
                    stack.pop();
                    path.pop();
                }
                Some(child) => {
                    *next += 1;
                    let Some(node) = self.node(child) else {
                        continue;
                    };
                    path.push(node.name.clone());
                    let verdict = visit(child, &path);
                    if verdict == Walk::Stop {
                        return true;
                    }
                    if node.is_dir() {
                        stack.push((child, 0));
                    } else {
                        path.pop();
                    }
                }
            }
        }
        false
    }
}
