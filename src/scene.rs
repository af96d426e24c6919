//! Render-side attach/detach contract. The renderer itself lives elsewhere.

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_chunk::ChunkMeshCPU;

/// Scene graph operations the streaming pipeline needs. Objects are named by
/// their chunk `rep`. Only the owning thread calls these.
pub trait Scene {
    fn attach(&mut self, mesh: Arc<ChunkMeshCPU>);
    fn detach(&mut self, name: &str) -> Option<Arc<ChunkMeshCPU>>;
    fn get_by_name(&self, name: &str) -> Option<&Arc<ChunkMeshCPU>>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory scene used by the headless binary and by tests.
#[derive(Default, Debug)]
pub struct SceneGraph {
    objects: BTreeMap<String, Arc<ChunkMeshCPU>>,
    attaches: u64,
    detaches: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total attach and detach calls so far.
    pub fn churn(&self) -> (u64, u64) {
        (self.attaches, self.detaches)
    }

    pub fn quad_count(&self) -> usize {
        self.objects.values().map(|m| m.quad_count()).sum()
    }
}

impl Scene for SceneGraph {
    fn attach(&mut self, mesh: Arc<ChunkMeshCPU>) {
        self.attaches += 1;
        if self.objects.insert(mesh.name.clone(), mesh).is_some() {
            log::debug!(target: "scene", "attach replaced an object with the same name");
        }
    }

    fn detach(&mut self, name: &str) -> Option<Arc<ChunkMeshCPU>> {
        let removed = self.objects.remove(name);
        if removed.is_some() {
            self.detaches += 1;
        }
        removed
    }

    fn get_by_name(&self, name: &str) -> Option<&Arc<ChunkMeshCPU>> {
        self.objects.get(name)
    }

    fn len(&self) -> usize {
        self.objects.len()
    }
}
