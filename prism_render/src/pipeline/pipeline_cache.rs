/// Process-lifetime pipeline cache keyed by content hash
///
/// Entries are never evicted: a pipeline lives as long as the graphics context.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::pipeline::Pipeline;

pub struct PipelineCache {
    pipelines: FxHashMap<u64, Arc<Pipeline>>,
    next_id: u32,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self {
            pipelines: FxHashMap::default(),
            next_id: 1,
        }
    }

    /// Cached pipeline for a hash
    pub fn get(&self, hash: u64) -> Option<Arc<Pipeline>> {
        self.pipelines.get(&hash).cloned()
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.pipelines.contains_key(&hash)
    }

    /// Id the next inserted pipeline receives
    pub(crate) fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Insert a pipeline built with `next_id()`
    pub(crate) fn insert(&mut self, pipeline: Arc<Pipeline>) -> Arc<Pipeline> {
        debug_assert_eq!(pipeline.id(), self.next_id);
        debug_assert!(!self.pipelines.contains_key(&pipeline.hash()));
        self.next_id += 1;
        self.pipelines.insert(pipeline.hash(), pipeline.clone());
        pipeline
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

impl Default for PipelineCache {
    fn default() -> Self {
        Self::new()
    }
}
