#[derive(Debug, Clone, Copy)]
pub struct BufferPoolConfig {
    pub num_frames: usize,
    /// K of the LRU-K replacement policy.
    pub lru_k: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        BufferPoolConfig {
            num_frames: 256,
            lru_k: 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BTreeConfig {
    pub leaf_max_size: u32,
    pub internal_max_size: u32,
}

impl Default for BTreeConfig {
    fn default() -> Self {
        BTreeConfig {
            leaf_max_size: 10,
            internal_max_size: 10,
        }
    }
}

/// Cap on skip list tower height. See Pugh's paper for the branching factor.
pub const SKIP_LIST_MAX_HEIGHT: usize = 14;
pub const SKIP_LIST_BRANCHING_FACTOR: u32 = 4;
