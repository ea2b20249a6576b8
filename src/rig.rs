//! The scene's transform hierarchy that the controllers pose.
//!
//! Each node has a name, an optional parent and a transform relative to that parent. Nodes are
//! stored in an arena and addressed by [`NodeId`]; name lookup is a convenience for configuration,
//! which refers to joints by name.
//!
//! Several controllers write into the same hierarchy. To keep them from fighting over a transform,
//! every transform that is written continuously has a single owner, registered with [`Rig::claim`].

use std::collections::{HashMap, VecDeque};

use generational_arena::{Arena, Index};
use na::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};

use crate::error::{Result, TeleopError};

pub type NodeId = Index;

#[derive(Debug)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    local: Isometry3<f32>,
}

#[derive(Debug)]
pub struct Rig {
    nodes: Arena<Node>,
    root: NodeId,
    owners: HashMap<NodeId, String>,
}

impl Rig {
    /// Create a rig that consists of only a root node at the origin.
    pub fn new(root_name: &str) -> Self {
        let mut nodes = Arena::new();
        let root = nodes.insert(Node {
            name: root_name.to_string(),
            parent: None,
            children: vec![],
            local: Isometry3::identity(),
        });

        Rig {
            nodes,
            root,
            owners: HashMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Attach a new node under `parent`, with the given transform relative to it.
    pub fn add_child(&mut self, parent: NodeId, name: &str, local: Isometry3<f32>) -> NodeId {
        let id = self.nodes.insert(Node {
            name: name.to_string(),
            parent: Some(parent),
            children: vec![],
            local,
        });
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(id);
        }
        id
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id).map(|n| n.name.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id)?.parent
    }

    /// Find a node by name anywhere in the rig.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.find_in(self.root, name)
    }

    /// Find a node by name within the subtree rooted at `subtree`, nearest nodes first.
    pub fn find_in(&self, subtree: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(subtree)
            .into_iter()
            .find(|id| self.nodes[*id].name == name)
    }

    /// Like [`Rig::find`], but failing with [`TeleopError::MissingTarget`].
    pub fn require(&self, name: &str) -> Result<NodeId> {
        self.find(name)
            .ok_or_else(|| TeleopError::MissingTarget(name.to_string()))
    }

    /// All nodes of the subtree rooted at `subtree`, itself included, in breadth-first order.
    pub fn descendants(&self, subtree: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut queue = VecDeque::new();
        if self.nodes.contains(subtree) {
            queue.push_back(subtree);
        }
        while let Some(id) = queue.pop_front() {
            out.push(id);
            queue.extend(self.nodes[id].children.iter().cloned());
        }
        out
    }

    /// Whether `node` lies in the subtree rooted at `ancestor` (a node is its own ancestor).
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    //region Local transforms

    pub fn local_rotation(&self, id: NodeId) -> Option<UnitQuaternion<f32>> {
        self.nodes.get(id).map(|n| n.local.rotation)
    }

    pub fn set_local_rotation(&mut self, id: NodeId, rotation: UnitQuaternion<f32>) {
        if let Some(n) = self.nodes.get_mut(id) {
            n.local.rotation = rotation;
        }
    }

    pub fn local_position(&self, id: NodeId) -> Option<Vector3<f32>> {
        self.nodes.get(id).map(|n| n.local.translation.vector)
    }

    pub fn set_local_position(&mut self, id: NodeId, position: Vector3<f32>) {
        if let Some(n) = self.nodes.get_mut(id) {
            n.local.translation = Translation3::from(position);
        }
    }

    //endregion

    //region Global transforms

    /// The transform of a node relative to the rig's origin.
    pub fn global_transform(&self, id: NodeId) -> Option<Isometry3<f32>> {
        let node = self.nodes.get(id)?;
        match node.parent {
            Some(parent) => Some(self.global_transform(parent)? * node.local),
            None => Some(node.local),
        }
    }

    pub fn global_position(&self, id: NodeId) -> Option<Point3<f32>> {
        self.global_transform(id)
            .map(|iso| Point3::from(iso.translation.vector))
    }

    pub fn global_rotation(&self, id: NodeId) -> Option<UnitQuaternion<f32>> {
        self.global_transform(id).map(|iso| iso.rotation)
    }

    fn parent_transform(&self, id: NodeId) -> Isometry3<f32> {
        self.parent(id)
            .and_then(|p| self.global_transform(p))
            .unwrap_or_else(Isometry3::identity)
    }

    /// Rotate a node so that its global rotation becomes `rotation`, keeping its local position.
    pub fn set_global_rotation(&mut self, id: NodeId, rotation: UnitQuaternion<f32>) {
        let parent = self.parent_transform(id);
        self.set_local_rotation(id, parent.rotation.inverse() * rotation);
    }

    /// Move a node so that its global position becomes `position`, keeping its local rotation.
    pub fn set_global_position(&mut self, id: NodeId, position: Point3<f32>) {
        let parent = self.parent_transform(id);
        self.set_local_position(id, parent.inverse_transform_point(&position).coords);
    }

    //endregion

    //region Ownership

    /// Register `owner` as the single writer of a node.
    ///
    /// Claiming a node again under the same owner is fine; claiming a node someone else owns
    /// fails with [`TeleopError::OwnershipConflict`].
    pub fn claim(&mut self, id: NodeId, owner: &str) -> Result<()> {
        let name = self
            .name(id)
            .ok_or_else(|| TeleopError::MissingTarget(format!("{:?}", id)))?
            .to_string();

        match self.owners.get(&id) {
            Some(current) if current != owner => Err(TeleopError::OwnershipConflict {
                node: name,
                owner: current.clone(),
            }),
            _ => {
                self.owners.insert(id, owner.to_string());
                Ok(())
            }
        }
    }

    /// Claim every node in `ids` for `owner`, or none of them if any is owned by someone else.
    pub fn claim_all(&mut self, ids: &[NodeId], owner: &str) -> Result<()> {
        let before = self.owners.clone();
        for id in ids {
            if let Err(e) = self.claim(*id, owner) {
                self.owners = before;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Drop every claim held by `owner`.
    pub fn release_all(&mut self, owner: &str) {
        self.owners.retain(|_, o| o != owner);
    }

    pub fn owner(&self, id: NodeId) -> Option<&str> {
        self.owners.get(&id).map(String::as_str)
    }

    //endregion
}
