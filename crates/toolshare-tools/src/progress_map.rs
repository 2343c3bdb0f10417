use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use toolshare_core::{DurableStoreExt, NotificationOptions, ToolId};
use uuid::Uuid;

use crate::context::{ToolContext, decode_payload};
use crate::error::{Result, ToolError};

pub const PROGRESS_KEY: &str = "progress_tree";
pub const ROOT_ID: &str = "root";

const TOOL: ToolId = ToolId::Map;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub children: Vec<ProgressNode>,
}

impl ProgressNode {
    pub fn root() -> Self {
        Self {
            id: ROOT_ID.to_string(),
            name: "Goal".to_string(),
            done: false,
            children: Vec::new(),
        }
    }

    pub fn find(&self, id: &str) -> Option<&ProgressNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut ProgressNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }

    /// Detach the descendant `id` together with its subtree.
    fn remove_descendant(&mut self, id: &str) -> Option<ProgressNode> {
        if let Some(pos) = self.children.iter().position(|child| child.id == id) {
            return Some(self.children.remove(pos));
        }
        self.children
            .iter_mut()
            .find_map(|child| child.remove_descendant(id))
    }

    /// Depth-first `(depth, node)` pairs, this node first.
    pub fn walk(&self) -> Vec<(usize, &ProgressNode)> {
        let mut out = Vec::new();
        self.walk_into(0, &mut out);
        out
    }

    fn walk_into<'a>(&'a self, depth: usize, out: &mut Vec<(usize, &'a ProgressNode)>) {
        out.push((depth, self));
        for child in &self.children {
            child.walk_into(depth + 1, out);
        }
    }
}

impl Default for ProgressNode {
    fn default() -> Self {
        Self::root()
    }
}

#[derive(Deserialize)]
struct UpdatePayload {
    tree: ProgressNode,
}

/// A tree of goals with done flags. Every change replaces the whole tree in
/// storage and on the bus.
#[derive(Debug)]
pub struct ProgressMapTool {
    ctx: ToolContext,
    tree: Arc<Mutex<ProgressNode>>,
}

impl ProgressMapTool {
    pub fn new(ctx: ToolContext) -> Self {
        let tree = Arc::new(Mutex::new(ctx.load_or_default::<ProgressNode>(TOOL, PROGRESS_KEY)));

        let remote = Arc::clone(&tree);
        ctx.bus.subscribe(TOOL, move |action: &str, payload: &Value| {
            apply_remote(&remote, action, payload);
        });

        Self { ctx, tree }
    }

    pub fn tree(&self) -> ProgressNode {
        self.tree
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Add a node named `name` under `parent_id`, returning the new id.
    pub async fn add_child(&self, parent_id: &str, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ToolError::invalid_input(TOOL, "node name is empty"));
        }

        let id = Uuid::now_v7().to_string();
        let mut next = self.tree();
        next.find_mut(parent_id)
            .ok_or_else(|| ToolError::not_found(TOOL, parent_id))?
            .children
            .push(ProgressNode {
                id: id.clone(),
                name: name.to_string(),
                done: false,
                children: Vec::new(),
            });

        self.commit(next).await?;
        Ok(id)
    }

    pub async fn set_done(&self, id: &str, done: bool) -> Result<()> {
        let mut next = self.tree();
        next.find_mut(id)
            .ok_or_else(|| ToolError::not_found(TOOL, id))?
            .done = done;
        self.commit(next).await
    }

    /// Remove `id` and everything below it. The root stays.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let mut next = self.tree();
        if next.id == id {
            return Err(ToolError::invalid_input(TOOL, "the root node cannot be removed"));
        }
        next.remove_descendant(id)
            .ok_or_else(|| ToolError::not_found(TOOL, id))?;
        self.commit(next).await
    }

    async fn commit(&self, next: ProgressNode) -> Result<()> {
        self.ctx.store.write_as(PROGRESS_KEY, &next)?;
        *self.tree.lock().unwrap_or_else(PoisonError::into_inner) = next.clone();

        self.ctx.publish(TOOL, "update", json!({ "tree": next }));
        self.ctx
            .announce("Map updated", NotificationOptions::default())
            .await;
        Ok(())
    }
}

fn apply_remote(tree: &Mutex<ProgressNode>, action: &str, payload: &Value) {
    if action != "update" {
        tracing::debug!(action, "Ignoring unknown map action");
        return;
    }
    if let Some(UpdatePayload { tree: remote }) = decode_payload(TOOL, action, payload) {
        *tree.lock().unwrap_or_else(PoisonError::into_inner) = remote;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolshare_core::test_utils::recording_gateway;
    use toolshare_core::{Bus, DurableStore, InMemoryStore, Origin};

    fn progress_map(store: Arc<InMemoryStore>) -> ProgressMapTool {
        let origin = Origin::default();
        let (bus, _listener) = Bus::connect(&origin);
        let (gateway, _) = recording_gateway();
        ProgressMapTool::new(ToolContext::new(bus, store, gateway))
    }

    #[test]
    fn missing_fields_take_defaults() {
        let node: ProgressNode =
            serde_json::from_value(json!({ "id": "root", "name": "Goal" })).unwrap();
        assert_eq!(node, ProgressNode::root());
    }

    #[tokio::test]
    async fn add_nested_children_and_mark_done() {
        let store = Arc::new(InMemoryStore::new());
        let map = progress_map(store.clone());

        let chapter = map.add_child(ROOT_ID, "Chapter 1").await.unwrap();
        let section = map.add_child(&chapter, "Section 1.1").await.unwrap();
        map.set_done(&section, true).await.unwrap();

        let tree = map.tree();
        assert!(tree.find(&section).unwrap().done);
        assert_eq!(
            tree.walk()
                .into_iter()
                .map(|(depth, node)| (depth, node.name.as_str()))
                .collect::<Vec<_>>(),
            vec![(0, "Goal"), (1, "Chapter 1"), (2, "Section 1.1")]
        );

        let stored: ProgressNode = store.read_as(PROGRESS_KEY).unwrap().unwrap();
        assert_eq!(stored, tree);
    }

    #[tokio::test]
    async fn new_ids_sort_by_creation() {
        let map = progress_map(Arc::new(InMemoryStore::new()));

        let first = map.add_child(ROOT_ID, "a").await.unwrap();
        let second = map.add_child(ROOT_ID, "b").await.unwrap();

        assert!(first < second);
    }

    #[tokio::test]
    async fn unknown_parent_and_root_removal_are_rejected() {
        let map = progress_map(Arc::new(InMemoryStore::new()));

        assert!(matches!(
            map.add_child("missing", "x").await,
            Err(ToolError::NotFound { .. })
        ));
        assert!(matches!(
            map.remove(ROOT_ID).await,
            Err(ToolError::InvalidInput { .. })
        ));
        assert_eq!(map.tree(), ProgressNode::root());
    }

    #[tokio::test]
    async fn remove_drops_the_subtree() {
        let map = progress_map(Arc::new(InMemoryStore::new()));
        let chapter = map.add_child(ROOT_ID, "Chapter").await.unwrap();
        let section = map.add_child(&chapter, "Section").await.unwrap();

        map.remove(&chapter).await.unwrap();

        let tree = map.tree();
        assert!(tree.find(&chapter).is_none());
        assert!(tree.find(&section).is_none());
    }

    #[tokio::test]
    async fn unreadable_tree_falls_back_to_root() {
        let store = Arc::new(InMemoryStore::new());
        store.write(PROGRESS_KEY, &json!(["not", "a", "tree"])).unwrap();

        assert_eq!(progress_map(store).tree(), ProgressNode::root());
    }
}
