use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::buffer::{BufferPoolManager, WritePageGuard};
use crate::common::{PageId, RecordId, Result, HEADER_PAGE_ID, INVALID_PAGE_ID};
use crate::storage::page::{HeaderPage, HeaderPageMut};

use super::iterator::BPlusTreeIter;
use super::key::{GenericKey, KeyComparator};
use super::node::{
    self, internal_capacity, leaf_capacity, InternalMut, InternalRef, LeafMut, LeafRef, NodeKind,
    NodeRef,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOp {
    Insert,
    Delete,
}

/// Per-operation scratch state for a write descent: the root-id latch
/// sentinel, the write-latched ancestor path, and pages queued for deletion
/// once every latch is released.
struct Context<'a> {
    root_latch: Option<RwLockWriteGuard<'a, PageId>>,
    write_set: Vec<WritePageGuard>,
    deleted: Vec<PageId>,
}

impl<'a> Context<'a> {
    fn new(root_latch: RwLockWriteGuard<'a, PageId>) -> Self {
        Self {
            root_latch: Some(root_latch),
            write_set: Vec::new(),
            deleted: Vec::new(),
        }
    }

    fn root_id(&self) -> PageId {
        self.root_latch
            .as_deref()
            .copied()
            .unwrap_or(INVALID_PAGE_ID)
    }

    fn set_root(&mut self, page_id: PageId) {
        debug_assert!(self.root_latch.is_some());
        if let Some(latch) = self.root_latch.as_mut() {
            **latch = page_id;
        }
    }

    /// Releases every ancestor latch held so far, including the root-id
    /// latch sentinel. Called when the just-latched child is safe.
    fn release_ancestors(&mut self) {
        self.write_set.clear();
        self.root_latch = None;
    }
}

/// Persistent B+ tree index whose nodes live in buffer-pool frames.
///
/// Concurrency follows the crab-latching protocol: readers hand-over-hand
/// read latches down the tree; writers keep ancestors write-latched until a
/// child is proven safe for the operation. `root_page_id` doubles as the
/// root-id latch and its storage.
pub struct BPlusTree<const N: usize, C: KeyComparator> {
    index_name: String,
    root_page_id: RwLock<PageId>,
    bpm: Arc<BufferPoolManager>,
    comparator: C,
    leaf_max_size: usize,
    internal_max_size: usize,
}

impl<const N: usize, C: KeyComparator> BPlusTree<N, C> {
    /// Opens (or registers) the named index. The root page id is read from
    /// the header page; an unknown name starts as an empty tree. Passing 0
    /// for a max size selects the page capacity for that node kind.
    pub fn new(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        let index_name = index_name.into();
        let leaf_max_size = if leaf_max_size == 0 {
            leaf_capacity::<N>()
        } else {
            leaf_max_size
        };
        let internal_max_size = if internal_max_size == 0 {
            internal_capacity::<N>()
        } else {
            internal_max_size
        };
        assert!(
            (3..=leaf_capacity::<N>()).contains(&leaf_max_size),
            "leaf_max_size out of range"
        );
        // A fanout below 4 lets a split produce a one-child internal node,
        // whose children then have no sibling to borrow from or merge with.
        assert!(
            (4..=internal_capacity::<N>()).contains(&internal_max_size),
            "internal_max_size out of range"
        );

        let root_page_id = {
            let guard = bpm.fetch_read_page(HEADER_PAGE_ID)?;
            let header = HeaderPage::new(guard.data());
            header.find_record(&index_name).unwrap_or(INVALID_PAGE_ID)
        };

        Ok(Self {
            index_name,
            root_page_id: RwLock::new(root_page_id),
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self.root_page_id.read() == INVALID_PAGE_ID
    }

    pub fn root_page_id(&self) -> PageId {
        *self.root_page_id.read()
    }

    /// Point lookup: returns the RID stored under the key.
    pub fn get_value(&self, key: &GenericKey<N>) -> Result<Option<RecordId>> {
        let root_latch = self.root_page_id.read();
        let root_id = *root_latch;
        if root_id == INVALID_PAGE_ID {
            return Ok(None);
        }

        let mut guard = self.bpm.fetch_read_page(root_id)?;
        drop(root_latch);

        loop {
            let child = {
                let node = NodeRef::new(guard.data());
                if node.is_leaf() {
                    let leaf = LeafRef::<N>::new(guard.data());
                    return Ok(leaf.lookup(key, &self.comparator));
                }
                InternalRef::<N>::new(guard.data()).lookup(key, &self.comparator)
            };
            // The child latch is taken before the parent guard is replaced
            guard = self.bpm.fetch_read_page(child)?;
        }
    }

    /// Inserts a unique key. Returns false when the key already exists.
    pub fn insert(&self, key: &GenericKey<N>, value: RecordId) -> Result<bool> {
        let mut ctx = Context::new(self.root_page_id.write());
        let root_id = ctx.root_id();
        if root_id == INVALID_PAGE_ID {
            self.start_new_tree(&mut ctx, key, value)?;
            return Ok(true);
        }

        self.find_leaf_write(&mut ctx, root_id, key, WriteOp::Insert)?;

        let new_size = {
            let leaf_guard = ctx.write_set.last_mut().expect("leaf must be latched");
            let duplicate = {
                let leaf = LeafRef::<N>::new(leaf_guard.data());
                leaf.lookup(key, &self.comparator).is_some()
            };
            if duplicate {
                return Ok(false);
            }
            let mut leaf = LeafMut::<N>::new(leaf_guard.data_mut());
            leaf.insert(key, value, &self.comparator)
        };

        if new_size == self.leaf_max_size {
            self.split_leaf(&mut ctx)?;
        }
        Ok(true)
    }

    /// Removes a key. A missing key is a no-op.
    pub fn remove(&self, key: &GenericKey<N>) -> Result<()> {
        let mut ctx = Context::new(self.root_page_id.write());
        let root_id = ctx.root_id();
        if root_id == INVALID_PAGE_ID {
            return Ok(());
        }

        self.find_leaf_write(&mut ctx, root_id, key, WriteOp::Delete)?;

        let underflow = {
            let leaf_guard = ctx.write_set.last_mut().expect("leaf must be latched");
            let (index, found) = {
                let leaf = LeafRef::<N>::new(leaf_guard.data());
                let index = leaf.key_index(key, &self.comparator);
                let found = index < leaf.size()
                    && self
                        .comparator
                        .compare(leaf.key_at(index).as_bytes(), key.as_bytes())
                        == Ordering::Equal;
                (index, found)
            };
            if !found {
                return Ok(());
            }

            let mut leaf = LeafMut::<N>::new(leaf_guard.data_mut());
            leaf.remove_at(index);
            if leaf.parent_page_id() == INVALID_PAGE_ID {
                leaf.size() == 0
            } else {
                leaf.size() < leaf.min_size()
            }
        };

        if underflow {
            self.coalesce_or_redistribute(&mut ctx)?;
        }

        // Queued pages are deleted only after every latch is back
        let deleted = std::mem::take(&mut ctx.deleted);
        drop(ctx);
        for page_id in deleted {
            self.bpm.delete_page(page_id)?;
        }
        Ok(())
    }

    /// Loads whitespace-separated 64-bit keys from a file and inserts each.
    pub fn insert_from_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = std::fs::read_to_string(path)?;
        for token in contents.split_whitespace() {
            if let Ok(key) = token.parse::<i64>() {
                self.insert(&GenericKey::from_i64(key), RecordId::from_i64(key))?;
            }
        }
        Ok(())
    }

    /// Loads whitespace-separated 64-bit keys from a file and removes each.
    pub fn remove_from_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = std::fs::read_to_string(path)?;
        for token in contents.split_whitespace() {
            if let Ok(key) = token.parse::<i64>() {
                self.remove(&GenericKey::from_i64(key))?;
            }
        }
        Ok(())
    }

    /// Renders the tree structure for debugging and structural assertions.
    pub fn debug_dump(&self) -> Result<String> {
        let mut out = String::new();
        let root_id = *self.root_page_id.read();
        if root_id == INVALID_PAGE_ID {
            out.push_str("(empty)\n");
            return Ok(out);
        }
        self.dump_node(root_id, 0, &mut out)?;
        Ok(out)
    }

    fn dump_node(&self, page_id: PageId, depth: usize, out: &mut String) -> Result<()> {
        let (line, children) = {
            let guard = self.bpm.fetch_read_page(page_id)?;
            let node = NodeRef::new(guard.data());
            if node.is_leaf() {
                let leaf = LeafRef::<N>::new(guard.data());
                let keys: Vec<String> = (0..leaf.size())
                    .map(|i| leaf.key_at(i).to_i64().to_string())
                    .collect();
                (
                    format!("leaf {} [{}]", page_id.as_u32(), keys.join(",")),
                    Vec::new(),
                )
            } else {
                let internal = InternalRef::<N>::new(guard.data());
                let keys: Vec<String> = (1..internal.size())
                    .map(|i| internal.key_at(i).to_i64().to_string())
                    .collect();
                let children: Vec<PageId> =
                    (0..internal.size()).map(|i| internal.child_at(i)).collect();
                (
                    format!("internal {} <{}>", page_id.as_u32(), keys.join(",")),
                    children,
                )
            }
        };

        out.push_str(&"  ".repeat(depth));
        out.push_str(&line);
        out.push('\n');
        for child in children {
            self.dump_node(child, depth + 1, out)?;
        }
        Ok(())
    }

    /// Allocates the first leaf and makes it the root.
    fn start_new_tree(
        &self,
        ctx: &mut Context<'_>,
        key: &GenericKey<N>,
        value: RecordId,
    ) -> Result<()> {
        let mut guard = self.bpm.new_page()?;
        let page_id = guard.page_id();

        let mut leaf = LeafMut::<N>::new(guard.data_mut());
        leaf.init(page_id, INVALID_PAGE_ID, self.leaf_max_size);
        leaf.insert(key, value, &self.comparator);

        ctx.set_root(page_id);
        self.set_root_record(page_id)?;
        Ok(())
    }

    /// Write descent: latches each child, releasing every held ancestor as
    /// soon as the child is proven safe for the operation. On return the
    /// write set ends with the target leaf.
    fn find_leaf_write(
        &self,
        ctx: &mut Context<'_>,
        root_id: PageId,
        key: &GenericKey<N>,
        op: WriteOp,
    ) -> Result<()> {
        let root_guard = self.bpm.fetch_write_page(root_id)?;
        if self.is_safe(root_guard.data(), op) {
            ctx.release_ancestors();
        }
        ctx.write_set.push(root_guard);

        loop {
            let child = {
                let current = ctx.write_set.last().expect("descent path is non-empty");
                let node = NodeRef::new(current.data());
                if node.is_leaf() {
                    return Ok(());
                }
                InternalRef::<N>::new(current.data()).lookup(key, &self.comparator)
            };

            let child_guard = self.bpm.fetch_write_page(child)?;
            if self.is_safe(child_guard.data(), op) {
                ctx.release_ancestors();
            }
            ctx.write_set.push(child_guard);
        }
    }

    /// A node is safe when the pending operation cannot propagate a
    /// structural change above it.
    fn is_safe(&self, data: &[u8], op: WriteOp) -> bool {
        let node = NodeRef::new(data);
        match op {
            WriteOp::Insert => node.size() < node.max_size() - 1,
            WriteOp::Delete => {
                if node.is_root() {
                    // The root is safe as long as removing one entry cannot
                    // change root_page_id itself.
                    if node.is_leaf() {
                        node.size() > 1
                    } else {
                        node.size() > 2
                    }
                } else {
                    node.size() > node.min_size()
                }
            }
        }
    }

    /// Splits the leaf at the end of the write set: the upper half moves to
    /// a fresh right sibling, the chain is spliced, and the sibling's first
    /// key is propagated into the parent.
    fn split_leaf(&self, ctx: &mut Context<'_>) -> Result<()> {
        let mut new_guard = self.bpm.new_page()?;
        let new_page_id = new_guard.page_id();

        let (separator, old_page_id, old_next) = {
            let leaf_guard = ctx.write_set.last_mut().expect("leaf must be latched");
            let mut leaf = LeafMut::<N>::new(leaf_guard.data_mut());
            let mut new_leaf = LeafMut::<N>::new(new_guard.data_mut());
            new_leaf.init(new_page_id, leaf.parent_page_id(), self.leaf_max_size);
            leaf.move_half_to(&mut new_leaf);

            let old_next = leaf.next_page_id();
            new_leaf.set_next_page_id(old_next);
            new_leaf.set_prev_page_id(leaf.page_id());
            leaf.set_next_page_id(new_page_id);

            (new_leaf.key_at(0), leaf.page_id(), old_next)
        };

        if old_next != INVALID_PAGE_ID {
            let mut next_guard = self.bpm.fetch_write_page(old_next)?;
            LeafMut::<N>::new(next_guard.data_mut()).set_prev_page_id(new_page_id);
        }

        self.insert_into_parent(ctx, old_page_id, separator, new_guard)
    }

    /// Splits the internal node at the end of the write set, reparenting the
    /// children that moved to the new sibling.
    fn split_internal(&self, ctx: &mut Context<'_>) -> Result<()> {
        let mut new_guard = self.bpm.new_page()?;
        let new_page_id = new_guard.page_id();

        let (separator, old_page_id, moved_children) = {
            let node_guard = ctx.write_set.last_mut().expect("node must be latched");
            let mut node = InternalMut::<N>::new(node_guard.data_mut());
            let mut new_node = InternalMut::<N>::new(new_guard.data_mut());
            new_node.init(new_page_id, node.parent_page_id(), self.internal_max_size);
            let moved = node.move_half_to(&mut new_node);
            (new_node.key_at(0), node.page_id(), moved)
        };

        for child in moved_children {
            let mut child_guard = self.bpm.fetch_write_page(child)?;
            node::set_parent_page_id(child_guard.data_mut(), new_page_id);
        }

        self.insert_into_parent(ctx, old_page_id, separator, new_guard)
    }

    /// Propagates a split: the old node at the end of the write set gained a
    /// right sibling (`new_guard`), separated by `key`.
    fn insert_into_parent(
        &self,
        ctx: &mut Context<'_>,
        old_page_id: PageId,
        key: GenericKey<N>,
        mut new_guard: WritePageGuard,
    ) -> Result<()> {
        let old_is_root = {
            let old_guard = ctx.write_set.last().expect("old node must be latched");
            NodeRef::new(old_guard.data()).is_root()
        };

        if old_is_root {
            let mut root_guard = self.bpm.new_page()?;
            let root_page_id = root_guard.page_id();
            {
                let mut root = InternalMut::<N>::new(root_guard.data_mut());
                root.init(root_page_id, INVALID_PAGE_ID, self.internal_max_size);
                root.populate_new_root(old_page_id, &key, new_guard.page_id());
            }
            {
                let old_guard = ctx.write_set.last_mut().expect("old node must be latched");
                node::set_parent_page_id(old_guard.data_mut(), root_page_id);
            }
            node::set_parent_page_id(new_guard.data_mut(), root_page_id);

            ctx.set_root(root_page_id);
            self.set_root_record(root_page_id)?;
            return Ok(());
        }

        let new_page_id = new_guard.page_id();
        drop(new_guard);
        let old_guard = ctx.write_set.pop().expect("old node must be latched");
        drop(old_guard);

        let new_size = {
            let parent_guard = ctx.write_set.last_mut().expect("parent must be latched");
            let mut parent = InternalMut::<N>::new(parent_guard.data_mut());
            parent.insert_node_after(old_page_id, &key, new_page_id)
        };

        if new_size == self.internal_max_size {
            self.split_internal(ctx)?;
        }
        Ok(())
    }

    /// Fixes the underflowing node at the end of the write set: borrow from
    /// a sibling when one can spare an entry, merge otherwise, recursing
    /// when the merge underflows the parent.
    fn coalesce_or_redistribute(&self, ctx: &mut Context<'_>) -> Result<()> {
        let mut node_guard = ctx.write_set.pop().expect("underflow node must be latched");
        if NodeRef::new(node_guard.data()).is_root() {
            return self.adjust_root(ctx, node_guard);
        }

        let node_page_id = node_guard.page_id();
        let (node_index, parent_size) = {
            let parent_guard = ctx.write_set.last().expect("parent must be latched");
            let parent = InternalRef::<N>::new(parent_guard.data());
            let index = parent
                .value_index(node_page_id)
                .expect("node missing from parent");
            (index, parent.size())
        };

        let mut left_guard: Option<WritePageGuard> = None;
        if node_index > 0 {
            let left_page_id = {
                let parent_guard = ctx.write_set.last().expect("parent must be latched");
                InternalRef::<N>::new(parent_guard.data()).child_at(node_index - 1)
            };
            let mut guard = self.bpm.fetch_write_page(left_page_id)?;
            let can_lend = {
                let left = NodeRef::new(guard.data());
                left.size() > left.min_size()
            };
            if can_lend {
                return self.redistribute_from_left(ctx, &mut guard, &mut node_guard, node_index);
            }
            left_guard = Some(guard);
        }

        let mut right_guard: Option<WritePageGuard> = None;
        if node_index + 1 < parent_size {
            let right_page_id = {
                let parent_guard = ctx.write_set.last().expect("parent must be latched");
                InternalRef::<N>::new(parent_guard.data()).child_at(node_index + 1)
            };
            let mut guard = self.bpm.fetch_write_page(right_page_id)?;
            let can_lend = {
                let right = NodeRef::new(guard.data());
                right.size() > right.min_size()
            };
            if can_lend {
                drop(left_guard);
                return self.redistribute_from_right(ctx, &mut guard, &mut node_guard, node_index);
            }
            right_guard = Some(guard);
        }

        // Neither sibling can spare an entry: merge right-into-left.
        if let Some(left) = left_guard {
            drop(right_guard);
            self.coalesce(ctx, left, node_guard, node_index)
        } else {
            let right = right_guard.expect("a non-root node has at least one sibling");
            self.coalesce(ctx, node_guard, right, node_index + 1)
        }
    }

    /// Moves the left sibling's last entry into the node and refreshes the
    /// parent separator at the node's slot.
    fn redistribute_from_left(
        &self,
        ctx: &mut Context<'_>,
        left_guard: &mut WritePageGuard,
        node_guard: &mut WritePageGuard,
        node_index: usize,
    ) -> Result<()> {
        let node_page_id = node_guard.page_id();

        match NodeRef::new(node_guard.data()).kind()? {
            NodeKind::Leaf => {
                let mut left = LeafMut::<N>::new(left_guard.data_mut());
                let mut node = LeafMut::<N>::new(node_guard.data_mut());
                left.move_last_to_front_of(&mut node);

                let new_separator = node.key_at(0);
                let parent_guard = ctx.write_set.last_mut().expect("parent must be latched");
                let mut parent = InternalMut::<N>::new(parent_guard.data_mut());
                parent.set_key_at(node_index, &new_separator);
                Ok(())
            }
            NodeKind::Internal => {
                let (middle, lifted) = {
                    let parent_guard = ctx.write_set.last().expect("parent must be latched");
                    let parent = InternalRef::<N>::new(parent_guard.data());
                    let left = InternalRef::<N>::new(left_guard.data());
                    (parent.key_at(node_index), left.key_at(left.size() - 1))
                };

                let moved_child = {
                    let mut left = InternalMut::<N>::new(left_guard.data_mut());
                    let mut node = InternalMut::<N>::new(node_guard.data_mut());
                    left.move_last_to_front_of(&mut node, &middle)
                };
                {
                    let parent_guard = ctx.write_set.last_mut().expect("parent must be latched");
                    let mut parent = InternalMut::<N>::new(parent_guard.data_mut());
                    parent.set_key_at(node_index, &lifted);
                }

                let mut child_guard = self.bpm.fetch_write_page(moved_child)?;
                node::set_parent_page_id(child_guard.data_mut(), node_page_id);
                Ok(())
            }
        }
    }

    /// Moves the right sibling's first entry into the node and refreshes the
    /// parent separator at the sibling's slot.
    fn redistribute_from_right(
        &self,
        ctx: &mut Context<'_>,
        right_guard: &mut WritePageGuard,
        node_guard: &mut WritePageGuard,
        node_index: usize,
    ) -> Result<()> {
        let node_page_id = node_guard.page_id();

        match NodeRef::new(node_guard.data()).kind()? {
            NodeKind::Leaf => {
                let mut right = LeafMut::<N>::new(right_guard.data_mut());
                let mut node = LeafMut::<N>::new(node_guard.data_mut());
                right.move_first_to_end_of(&mut node);

                let new_separator = right.key_at(0);
                let parent_guard = ctx.write_set.last_mut().expect("parent must be latched");
                let mut parent = InternalMut::<N>::new(parent_guard.data_mut());
                parent.set_key_at(node_index + 1, &new_separator);
                Ok(())
            }
            NodeKind::Internal => {
                let (middle, lifted) = {
                    let parent_guard = ctx.write_set.last().expect("parent must be latched");
                    let parent = InternalRef::<N>::new(parent_guard.data());
                    let right = InternalRef::<N>::new(right_guard.data());
                    (parent.key_at(node_index + 1), right.key_at(1))
                };

                let moved_child = {
                    let mut right = InternalMut::<N>::new(right_guard.data_mut());
                    let mut node = InternalMut::<N>::new(node_guard.data_mut());
                    right.move_first_to_end_of(&mut node, &middle)
                };
                {
                    let parent_guard = ctx.write_set.last_mut().expect("parent must be latched");
                    let mut parent = InternalMut::<N>::new(parent_guard.data_mut());
                    parent.set_key_at(node_index + 1, &lifted);
                }

                let mut child_guard = self.bpm.fetch_write_page(moved_child)?;
                node::set_parent_page_id(child_guard.data_mut(), node_page_id);
                Ok(())
            }
        }
    }

    /// Merges the right node into the left, drops the parent's separator
    /// entry for the right node, queues the right page for deletion, and
    /// recurses when the parent underflows.
    fn coalesce(
        &self,
        ctx: &mut Context<'_>,
        mut left_guard: WritePageGuard,
        mut right_guard: WritePageGuard,
        right_index: usize,
    ) -> Result<()> {
        let left_page_id = left_guard.page_id();
        let right_page_id = right_guard.page_id();

        match NodeRef::new(left_guard.data()).kind()? {
            NodeKind::Leaf => {
                let new_next = {
                    let mut left = LeafMut::<N>::new(left_guard.data_mut());
                    let mut right = LeafMut::<N>::new(right_guard.data_mut());
                    right.move_all_to(&mut left);
                    left.next_page_id()
                };
                if new_next != INVALID_PAGE_ID {
                    let mut next_guard = self.bpm.fetch_write_page(new_next)?;
                    LeafMut::<N>::new(next_guard.data_mut()).set_prev_page_id(left_page_id);
                }
            }
            NodeKind::Internal => {
                let middle = {
                    let parent_guard = ctx.write_set.last().expect("parent must be latched");
                    InternalRef::<N>::new(parent_guard.data()).key_at(right_index)
                };
                let moved_children = {
                    let mut left = InternalMut::<N>::new(left_guard.data_mut());
                    let mut right = InternalMut::<N>::new(right_guard.data_mut());
                    right.move_all_to(&mut left, &middle)
                };
                for child in moved_children {
                    let mut child_guard = self.bpm.fetch_write_page(child)?;
                    node::set_parent_page_id(child_guard.data_mut(), left_page_id);
                }
            }
        }

        {
            let parent_guard = ctx.write_set.last_mut().expect("parent must be latched");
            let mut parent = InternalMut::<N>::new(parent_guard.data_mut());
            parent.remove_at(right_index);
        }

        drop(left_guard);
        drop(right_guard);
        ctx.deleted.push(right_page_id);

        let (parent_is_root, parent_size, parent_min) = {
            let parent_guard = ctx.write_set.last().expect("parent must be latched");
            let parent = NodeRef::new(parent_guard.data());
            (parent.is_root(), parent.size(), parent.min_size())
        };

        if parent_is_root {
            if parent_size == 1 {
                return self.coalesce_or_redistribute(ctx);
            }
        } else if parent_size < parent_min {
            return self.coalesce_or_redistribute(ctx);
        }
        Ok(())
    }

    /// Handles root underflow: an internal root with a single child hands
    /// the root over to that child; a leaf root with no entries empties the
    /// tree. Anything else leaves the root alone.
    fn adjust_root(&self, ctx: &mut Context<'_>, old_root_guard: WritePageGuard) -> Result<()> {
        let old_page_id = old_root_guard.page_id();

        enum RootChange {
            Promote(PageId),
            Empty,
            Keep,
        }

        let change = {
            let node = NodeRef::new(old_root_guard.data());
            if !node.is_leaf() && node.size() == 1 {
                RootChange::Promote(InternalRef::<N>::new(old_root_guard.data()).child_at(0))
            } else if node.is_leaf() && node.size() == 0 {
                RootChange::Empty
            } else {
                RootChange::Keep
            }
        };

        match change {
            RootChange::Promote(child_page_id) => {
                {
                    let mut child_guard = self.bpm.fetch_write_page(child_page_id)?;
                    node::set_parent_page_id(child_guard.data_mut(), INVALID_PAGE_ID);
                }
                ctx.set_root(child_page_id);
                self.set_root_record(child_page_id)?;
                drop(old_root_guard);
                ctx.deleted.push(old_page_id);
            }
            RootChange::Empty => {
                ctx.set_root(INVALID_PAGE_ID);
                self.set_root_record(INVALID_PAGE_ID)?;
                drop(old_root_guard);
                ctx.deleted.push(old_page_id);
            }
            RootChange::Keep => {}
        }
        Ok(())
    }

    /// Persists the root change in the header page (page 0).
    fn set_root_record(&self, root_page_id: PageId) -> Result<()> {
        let mut guard = self.bpm.fetch_write_page(HEADER_PAGE_ID)?;
        let mut header = HeaderPageMut::new(guard.data_mut());
        if header.find_record(&self.index_name).is_some() {
            header.update_record(&self.index_name, root_page_id)
        } else {
            header.insert_record(&self.index_name, root_page_id)
        }
    }

    /// Iterator positioned at the first entry of the leftmost leaf.
    pub fn iter(&self) -> Result<BPlusTreeIter<N>> {
        let root_latch = self.root_page_id.read();
        let root_id = *root_latch;
        if root_id == INVALID_PAGE_ID {
            return Ok(BPlusTreeIter::end(Arc::clone(&self.bpm)));
        }

        let mut guard = self.bpm.fetch_read_page(root_id)?;
        drop(root_latch);

        loop {
            let child = {
                let node = NodeRef::new(guard.data());
                if node.is_leaf() {
                    break;
                }
                InternalRef::<N>::new(guard.data()).child_at(0)
            };
            guard = self.bpm.fetch_read_page(child)?;
        }

        Ok(BPlusTreeIter::new(Arc::clone(&self.bpm), guard, 0))
    }

    /// Iterator positioned at the first entry whose key is >= `key`.
    pub fn iter_from(&self, key: &GenericKey<N>) -> Result<BPlusTreeIter<N>> {
        let root_latch = self.root_page_id.read();
        let root_id = *root_latch;
        if root_id == INVALID_PAGE_ID {
            return Ok(BPlusTreeIter::end(Arc::clone(&self.bpm)));
        }

        let mut guard = self.bpm.fetch_read_page(root_id)?;
        drop(root_latch);

        loop {
            let child = {
                let node = NodeRef::new(guard.data());
                if node.is_leaf() {
                    break;
                }
                InternalRef::<N>::new(guard.data()).lookup(key, &self.comparator)
            };
            guard = self.bpm.fetch_read_page(child)?;
        }

        let index = LeafRef::<N>::new(guard.data()).key_index(key, &self.comparator);
        Ok(BPlusTreeIter::new(Arc::clone(&self.bpm), guard, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::key::GenericComparator;
    use crate::storage::disk::DiskManager;
    use tempfile::NamedTempFile;

    type TestTree = BPlusTree<8, GenericComparator<8>>;

    fn key(v: i64) -> GenericKey<8> {
        GenericKey::from_i64(v)
    }

    fn rid(v: i64) -> RecordId {
        RecordId::from_i64(v)
    }

    fn create_tree(
        pool_size: usize,
        leaf_max: usize,
        internal_max: usize,
    ) -> (TestTree, Arc<BufferPoolManager>, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(pool_size, dm));
        let tree = TestTree::new(
            "test_index",
            Arc::clone(&bpm),
            GenericComparator::<8>,
            leaf_max,
            internal_max,
        )
        .unwrap();
        (tree, bpm, temp_file)
    }

    #[test]
    fn test_btree_empty() {
        let (tree, _bpm, _temp) = create_tree(10, 4, 4);
        assert!(tree.is_empty());
        assert_eq!(tree.get_value(&key(1)).unwrap(), None);
    }

    #[test]
    fn test_btree_insert_and_get() {
        let (tree, _bpm, _temp) = create_tree(10, 4, 4);

        assert!(tree.insert(&key(10), rid(10)).unwrap());
        assert!(tree.insert(&key(20), rid(20)).unwrap());

        assert!(!tree.is_empty());
        assert_eq!(tree.get_value(&key(10)).unwrap(), Some(rid(10)));
        assert_eq!(tree.get_value(&key(20)).unwrap(), Some(rid(20)));
        assert_eq!(tree.get_value(&key(15)).unwrap(), None);
    }

    #[test]
    fn test_btree_duplicate_insert() {
        let (tree, _bpm, _temp) = create_tree(10, 4, 4);

        assert!(tree.insert(&key(10), rid(10)).unwrap());
        assert!(!tree.insert(&key(10), rid(99)).unwrap());
        assert_eq!(tree.get_value(&key(10)).unwrap(), Some(rid(10)));
    }

    #[test]
    fn test_btree_remove_is_idempotent() {
        let (tree, _bpm, _temp) = create_tree(10, 4, 4);

        tree.insert(&key(10), rid(10)).unwrap();
        tree.remove(&key(10)).unwrap();
        assert_eq!(tree.get_value(&key(10)).unwrap(), None);
        // Removing again is a no-op
        tree.remove(&key(10)).unwrap();
        assert_eq!(tree.get_value(&key(10)).unwrap(), None);
    }

    #[test]
    fn test_btree_empties_back_to_invalid_root() {
        let (tree, _bpm, _temp) = create_tree(10, 4, 4);

        tree.insert(&key(1), rid(1)).unwrap();
        assert!(!tree.is_empty());
        tree.remove(&key(1)).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.root_page_id(), INVALID_PAGE_ID);

        // The tree still works after being emptied
        tree.insert(&key(2), rid(2)).unwrap();
        assert_eq!(tree.get_value(&key(2)).unwrap(), Some(rid(2)));
    }
}
