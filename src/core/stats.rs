// Copyright @yucwang 2026

use crate::math::constants::Float;

// Depths beyond the last bucket are counted together.
pub const DEPTH_BUCKETS: usize = 5;

/// Acceptance stages of the sample reuse test, in evaluation order.
pub const ACCEPT_STAGES: [&str; 6] = ["pass", "quick", "geometry", "normal", "in-front", "epsilon"];

#[derive(Debug, Clone, Default)]
pub struct RadiosityStats {
    pub query_count: [u64; DEPTH_BUCKETS],
    pub query_weight: [Float; DEPTH_BUCKETS],
    pub samples_taken: [u64; DEPTH_BUCKETS],
    pub reuse_count: u64,
    pub top_level_reuse_count: u64,
    pub final_reuse_count: u64,
    pub gather_count: u64,
    pub top_level_gather_count: u64,
    pub final_gather_count: u64,
    pub ray_count: u64,
    pub top_level_ray_count: u64,
    pub final_ray_count: u64,
    pub unsaved_count: u64,
    pub octree_nodes: u64,
    pub octree_lookups: u64,
    pub octree_accepts: [u64; 6],
}

pub fn depth_bucket(depth: usize) -> usize {
    depth.min(DEPTH_BUCKETS - 1)
}

impl RadiosityStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: &RadiosityStats) {
        for i in 0..DEPTH_BUCKETS {
            self.query_count[i] += other.query_count[i];
            self.query_weight[i] += other.query_weight[i];
            self.samples_taken[i] += other.samples_taken[i];
        }
        self.reuse_count += other.reuse_count;
        self.top_level_reuse_count += other.top_level_reuse_count;
        self.final_reuse_count += other.final_reuse_count;
        self.gather_count += other.gather_count;
        self.top_level_gather_count += other.top_level_gather_count;
        self.final_gather_count += other.final_gather_count;
        self.ray_count += other.ray_count;
        self.top_level_ray_count += other.top_level_ray_count;
        self.final_ray_count += other.final_ray_count;
        self.unsaved_count += other.unsaved_count;
        self.octree_nodes += other.octree_nodes;
        self.octree_lookups += other.octree_lookups;
        for i in 0..self.octree_accepts.len() {
            self.octree_accepts[i] += other.octree_accepts[i];
        }
    }

    pub fn total_queries(&self) -> u64 {
        self.query_count.iter().sum()
    }

    pub fn log_summary(&self, label: &str) {
        log::info!("{}: {} queries, {} reused, {} gathered ({} rays), {} samples not stored.",
                   label, self.total_queries(), self.reuse_count, self.gather_count,
                   self.ray_count, self.unsaved_count);
        for depth in 0..DEPTH_BUCKETS {
            if self.query_count[depth] == 0 {
                continue;
            }
            let avg_weight = self.query_weight[depth] / self.query_count[depth] as Float;
            log::info!("  depth {}{}: {} queries (avg. weight {:.3}), {} samples taken.",
                       depth, if depth == DEPTH_BUCKETS - 1 { "+" } else { "" },
                       self.query_count[depth], avg_weight, self.samples_taken[depth]);
        }
        if self.octree_lookups > 0 {
            let accepts: Vec<String> = ACCEPT_STAGES.iter()
                .zip(self.octree_accepts.iter())
                .map(|(name, count)| format!("{} {}", name, count))
                .collect();
            log::debug!("  octree: {} nodes, {} blocks looked at, accepted by stage: {}.",
                        self.octree_nodes, self.octree_lookups, accepts.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_adds_counters() {
        let mut a = RadiosityStats::new();
        a.query_count[0] = 2;
        a.octree_accepts[3] = 1;
        let mut b = RadiosityStats::new();
        b.query_count[0] = 3;
        b.query_count[4] = 1;
        b.octree_accepts[3] = 4;
        a.merge(&b);
        assert_eq!(a.query_count[0], 5);
        assert_eq!(a.total_queries(), 6);
        assert_eq!(a.octree_accepts[3], 5);
    }

    #[test]
    fn test_depth_bucket_saturates() {
        assert_eq!(depth_bucket(0), 0);
        assert_eq!(depth_bucket(3), 3);
        assert_eq!(depth_bucket(12), DEPTH_BUCKETS - 1);
    }
}
