//! Balanced `/Pages` tree over the document's page dictionaries

use crate::object::{Array, Dict};
use crate::pool::{ObjectHandle, ObjectPool};
use crate::Result;

/// Maximum number of kids per `/Pages` node
pub const NODE_SIZE: usize = 8;

/// Fold `pages` into a tree of `/Pages` nodes and return the root
///
/// The tree is built bottom up. A node left alone at the end of a round is
/// carried into the next round instead of getting a one-kid parent. Every
/// kid gets a `/Parent` entry. Returns `None` when there are no pages.
pub fn generate_page_tree(
    pool: &mut ObjectPool,
    pages: Vec<ObjectHandle>,
) -> Result<Option<ObjectHandle>> {
    let total = pages.len();
    if total == 0 {
        return Ok(None);
    }

    let mut current = pages;
    let mut capacity = NODE_SIZE;
    loop {
        let mut next = Vec::with_capacity(current.len() / NODE_SIZE + 1);
        let mut i = 0;
        while i < current.len() {
            if i > 0 && i + 1 == current.len() {
                next.push(current[i]);
                break;
            }

            let node = pool.add(Dict::with_type("Pages"));
            let mut kids = Array::with_capacity(NODE_SIZE);
            let end = (i + NODE_SIZE).min(current.len());
            for &kid in &current[i..end] {
                pool.dict_mut(kid)?.insert_ref("Parent", node);
                kids.append_ref(kid);
            }
            i = end;

            // only the last node of a round can be short of a full subtree
            let count = if i == current.len() {
                (total - 1) % capacity + 1
            } else {
                capacity
            };
            let dict = pool.dict_mut(node)?;
            dict.insert_int("Count", count as i32);
            dict.insert_object("Kids", kids);
            next.push(node);
        }

        current = next;
        capacity = capacity.saturating_mul(NODE_SIZE);
        if current.len() <= 1 {
            break;
        }
    }
    log::debug!("built page tree for {total} pages");
    Ok(current.first().copied())
}
