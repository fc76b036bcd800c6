//! Adaptive Huffman stage
//!
//! The tree is kept in a doubly linked list ordered by descending weight,
//! with a sentinel node at index 0. Every internal node stores only its low
//! child; the high child is the list predecessor of the low child. Decoding
//! walks from the first list entry (the root) reading one bit per level,
//! least-significant bit first.
//!
//! Two symbols beyond the byte range drive the stream: `0x100` ends it and
//! `0x101` introduces a literal byte that is not yet in the tree. With weight
//! table 0 the tree adapts after every emitted byte; with a preset table only
//! newly introduced literals move.
//!
//! Tables 1 through 8 are preset distributions that are not carried here, so
//! streams naming them are rejected rather than decoded against a guess.

use super::Codec;
use super::bits::BitReader;
use super::error::{CodecError, CodecResult};

const NIL: usize = usize::MAX;
const HEAD: usize = 0;
const SYMBOL_END: u16 = 0x100;
const SYMBOL_NEW: u16 = 0x101;
const LEAF_COUNT: usize = 0x102;

/// Weight table 0: every byte starts at weight 10 and the tree adapts as it
/// goes
const WEIGHT_TABLE_0: [u8; 256] = [0x0A; 256];

/// Highest weight table id a stream may name
const MAX_WEIGHT_TABLE: u8 = 8;

#[derive(Debug, Clone, Copy)]
struct Node {
    value: u16,
    weight: u32,
    parent: usize,
    child_lo: usize,
    prev: usize,
    next: usize,
}

impl Node {
    const fn new(value: u16, weight: u32) -> Self {
        Self {
            value,
            weight,
            parent: NIL,
            child_lo: NIL,
            prev: NIL,
            next: NIL,
        }
    }
}

struct HuffmanTree {
    nodes: Vec<Node>,
    leaves: [usize; LEAF_COUNT],
    adaptive: bool,
}

impl HuffmanTree {
    fn from_weights(weights: &[u8; 256], adaptive: bool) -> Self {
        let mut head = Node::new(0, 0);
        head.prev = HEAD;
        head.next = HEAD;

        let mut tree = Self {
            nodes: vec![head],
            leaves: [NIL; LEAF_COUNT],
            adaptive,
        };

        for (value, &weight) in weights.iter().enumerate() {
            if weight != 0 {
                let node = tree.push(value as u16, u32::from(weight));
                let at = tree.find_higher_or_equal(tree.last(), u32::from(weight));
                tree.link_after(node, at);
                tree.leaves[value] = node;
            }
        }

        for value in [SYMBOL_END, SYMBOL_NEW] {
            let node = tree.push(value, 1);
            tree.link_after(node, tree.last());
            tree.leaves[usize::from(value)] = node;
        }

        tree.combine();
        tree
    }

    /// Pair nodes from the tail upward until a single root remains
    fn combine(&mut self) {
        let mut child_lo = self.last();
        while child_lo != HEAD {
            let child_hi = self.nodes[child_lo].prev;
            if child_hi == HEAD {
                break;
            }

            let weight = self.nodes[child_lo].weight + self.nodes[child_hi].weight;
            let parent = self.push(0, weight);
            self.nodes[parent].child_lo = child_lo;
            self.nodes[child_lo].parent = parent;
            self.nodes[child_hi].parent = parent;

            let at = self.find_higher_or_equal(self.nodes[child_hi].prev, weight);
            self.link_after(parent, at);

            child_lo = self.nodes[child_hi].prev;
        }
    }

    fn push(&mut self, value: u16, weight: u32) -> usize {
        self.nodes.push(Node::new(value, weight));
        self.nodes.len() - 1
    }

    #[inline]
    fn first(&self) -> usize {
        self.nodes[HEAD].next
    }

    #[inline]
    fn last(&self) -> usize {
        self.nodes[HEAD].prev
    }

    fn link_after(&mut self, node: usize, at: usize) {
        let next = self.nodes[at].next;
        self.nodes[node].prev = at;
        self.nodes[node].next = next;
        self.nodes[next].prev = node;
        self.nodes[at].next = node;
    }

    fn unlink(&mut self, node: usize) {
        let Node { prev, next, .. } = self.nodes[node];
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }

    /// Nearest node at or before `from` whose weight is at least `weight`
    fn find_higher_or_equal(&self, mut from: usize, weight: u32) -> usize {
        while from != HEAD {
            if self.nodes[from].weight >= weight {
                return from;
            }
            from = self.nodes[from].prev;
        }
        HEAD
    }

    fn decode_symbol(&self, bits: &mut BitReader<'_>) -> Option<u16> {
        let mut node = self.first();
        while self.nodes[node].child_lo != NIL {
            let lo = self.nodes[node].child_lo;
            node = if bits.bit()? == 1 {
                self.nodes[lo].prev
            } else {
                lo
            };
        }
        Some(self.nodes[node].value)
    }

    /// Increment `node` and its ancestors, swapping each with the leader of
    /// its old weight class to keep the list ordered
    fn increment(&mut self, mut node: usize) {
        while node != NIL {
            self.nodes[node].weight += 1;
            let weight = self.nodes[node].weight;

            let higher = self.find_higher_or_equal(self.nodes[node].prev, weight);
            let leader = self.nodes[higher].next;
            if leader != node {
                self.swap(node, leader);
            }

            node = self.nodes[node].parent;
        }
    }

    /// Exchange list positions and parents of `node` and `leader`, where
    /// `leader` precedes `node` in the list
    fn swap(&mut self, node: usize, leader: usize) {
        let node_prev = self.nodes[node].prev;
        if node_prev == leader {
            self.unlink(node);
            let at = self.nodes[leader].prev;
            self.link_after(node, at);
        } else {
            let leader_prev = self.nodes[leader].prev;
            self.unlink(node);
            self.unlink(leader);
            self.link_after(leader, node_prev);
            self.link_after(node, leader_prev);
        }

        let node_parent = self.nodes[node].parent;
        let leader_parent = self.nodes[leader].parent;
        let node_was_lo = node_parent != NIL && self.nodes[node_parent].child_lo == node;
        let leader_was_lo = leader_parent != NIL && self.nodes[leader_parent].child_lo == leader;
        if node_was_lo {
            self.nodes[node_parent].child_lo = leader;
        }
        if leader_was_lo {
            self.nodes[leader_parent].child_lo = node;
        }
        self.nodes[node].parent = leader_parent;
        self.nodes[leader].parent = node_parent;
    }

    /// Split the lightest leaf into itself plus a new zero-weight leaf
    fn insert_literal(&mut self, value: u8) -> CodecResult<()> {
        if self.leaves[usize::from(value)] != NIL {
            return Err(CodecError::decode(
                Codec::Huffman,
                format!("literal 0x{value:02X} is already in the tree"),
            ));
        }

        let last = self.last();
        if self.nodes[last].child_lo != NIL {
            return Err(CodecError::decode(Codec::Huffman, "tree tail is not a leaf"));
        }

        let Node {
            value: old_value,
            weight: old_weight,
            ..
        } = self.nodes[last];

        let child_hi = self.push(old_value, old_weight);
        self.link_after(child_hi, last);
        self.leaves[usize::from(old_value)] = child_hi;

        let child_lo = self.push(u16::from(value), 0);
        self.link_after(child_lo, child_hi);
        self.leaves[usize::from(value)] = child_lo;

        self.nodes[last].child_lo = child_lo;
        self.nodes[child_hi].parent = last;
        self.nodes[child_lo].parent = last;

        self.increment(child_lo);
        Ok(())
    }
}

fn weight_table(id: u8) -> CodecResult<&'static [u8; 256]> {
    match id {
        0 => Ok(&WEIGHT_TABLE_0),
        1..=MAX_WEIGHT_TABLE => Err(CodecError::decode(
            Codec::Huffman,
            format!("preset weight table {id} is not supported"),
        )),
        other => Err(CodecError::decode(
            Codec::Huffman,
            format!("invalid weight table {other}"),
        )),
    }
}

/// Decode a Huffman stream into at most `limit` bytes
pub fn decode(data: &[u8], limit: usize) -> CodecResult<Vec<u8>> {
    let Some((&table_id, stream)) = data.split_first() else {
        return Err(CodecError::decode(Codec::Huffman, "missing weight table byte"));
    };

    let tree = HuffmanTree::from_weights(weight_table(table_id)?, table_id == 0);
    decode_stream(tree, stream, limit)
}

fn decode_stream(mut tree: HuffmanTree, stream: &[u8], limit: usize) -> CodecResult<Vec<u8>> {
    let mut bits = BitReader::new(stream);
    let mut out = Vec::with_capacity(limit);

    while out.len() < limit {
        let symbol = tree.decode_symbol(&mut bits).ok_or_else(|| {
            CodecError::decode(Codec::Huffman, "stream ended without end-of-stream symbol")
        })?;

        let value = match symbol {
            SYMBOL_END => break,
            SYMBOL_NEW => {
                let value = bits.bits(8).ok_or_else(|| {
                    CodecError::decode(Codec::Huffman, "stream ended inside a new literal")
                })? as u8;
                tree.insert_literal(value)?;
                if !tree.adaptive {
                    tree.increment(tree.leaves[usize::from(value)]);
                }
                value
            }
            other => other as u8,
        };

        out.push(value);
        if tree.adaptive {
            tree.increment(tree.leaves[usize::from(value)]);
        }
    }

    Ok(out)
}
