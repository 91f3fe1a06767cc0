// Copyright @yucwang 2026

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::core::stats::RadiosityStats;
use crate::math::constants::{Float, Vector3f};
use crate::math::spectrum::RGBSpectrum;

use super::block::{BlockPool, SampleBlock, PASS_FINAL};
use super::cache_file::{self, CacheFileError, CacheRecord};
use super::octree::{BlockId, Octree};
use super::settings::{RadiosityRecursionSettings, SceneRadiositySettings};

const RAD_EPSILON: Float = 0.001;
const AVG_NEAR_EPSILON: Float = 1.0e-6;
const BRILLIANCE_EPSILON: Float = 1.0e-5;
const IN_FRONT_LIMIT: Float = -0.05;

/// Where and for what a cached sample is wanted.
#[derive(Debug, Clone, Copy)]
pub struct ReuseQuery<'q> {
    pub point: &'q Vector3f,
    pub normal: &'q Vector3f,
    pub brilliance: Float,
    pub error_bound: Float,
    pub bounce_depth: usize,
    pub pass: u8,
    pub tile_id: u32,
}

/// Running weighted average over accepted blocks.
struct Gather<'q> {
    query: ReuseQuery<'q>,
    weights: Float,
    weighted_illuminance: RGBSpectrum,
    lookups: u64,
    accepts: [u64; 6],
}

impl<'q> Gather<'q> {
    fn new(query: ReuseQuery<'q>) -> Self {
        Self {
            query,
            weights: 0.0,
            weighted_illuminance: RGBSpectrum::black(),
            lookups: 0,
            accepts: [0; 6],
        }
    }

    fn average_near_block(&mut self, block: &SampleBlock) {
        let q = &self.query;
        self.lookups += 1;

        // Samples from other tiles of a pass still in progress would make the
        // result depend on thread scheduling.
        if block.pass == q.pass && block.tile_id != q.tile_id {
            return;
        }
        if (block.brilliance - q.brilliance).abs() > BRILLIANCE_EPSILON {
            return;
        }
        self.accepts[0] += 1;

        let delta = q.point - block.point;
        let square_dist = delta.norm_squared();
        let quickcheck_rad = block.harmonic_mean_distance * q.error_bound;
        if square_dist >= quickcheck_rad * quickcheck_rad {
            return;
        }
        self.accepts[1] += 1;

        let dist = square_dist.sqrt();
        let mut ri = block.harmonic_mean_distance;
        let delta_unit = if dist > AVG_NEAR_EPSILON {
            let unit = delta / dist;
            // Shrink the radius of influence towards the nearest surface seen
            // while sampling.
            let cos_diff_from_nearest = block.to_nearest_surface.dot(&unit);
            if cos_diff_from_nearest > 0.0 {
                ri = cos_diff_from_nearest * block.nearest_distance + (1.0 - cos_diff_from_nearest) * ri;
            }
            Some(unit)
        } else {
            None
        };

        if dist >= ri * q.error_bound {
            return;
        }
        self.accepts[2] += 1;

        let error_reuse = dist / ri + 2.0 * (1.0 - q.normal.dot(&block.normal)).abs().sqrt();
        if error_reuse >= q.error_bound {
            return;
        }
        self.accepts[3] += 1;

        let mut in_front = 1.0;
        if let Some(unit) = delta_unit {
            let half = q.normal + block.normal;
            let half_len = half.norm();
            if half_len > 0.0 {
                in_front = unit.dot(&half) / half_len;
            }
        }
        if in_front <= IN_FRONT_LIMIT {
            return;
        }
        self.accepts[4] += 1;

        let t = error_reuse / q.error_bound;
        let mut weight = if q.pass != PASS_FINAL || block.bounce_depth > 0 {
            1.0 - t
        } else if t < 0.5 {
            // Smooth falloff for final-trace top-level queries.
            1.0 - (t * 2.0) * (t * 2.0) / 2.0
        } else {
            ((1.0 - t) * 2.0) * ((1.0 - t) * 2.0) / 2.0
        };

        if in_front <= 0.0 {
            weight *= 1.0 - in_front / IN_FRONT_LIMIT;
        }

        if weight > RAD_EPSILON {
            self.accepts[5] += 1;
            weight *= block.quality;
            self.weighted_illuminance += block.illuminance * weight;
            self.weights += weight;
        }
    }
}

/// Irradiance cache shared by all render threads.
pub struct RadiosityCache {
    octree: Octree,
    recursion_settings: Vec<RadiosityRecursionSettings>,
    block_count: AtomicUsize,
    block_pools: Mutex<Vec<BlockPool>>,
    autosave: Mutex<Option<BufWriter<File>>>,
}

impl RadiosityCache {
    pub fn new(settings: &SceneRadiositySettings) -> Self {
        Self {
            octree: Octree::new(),
            recursion_settings: settings.recursion_settings(),
            block_count: AtomicUsize::new(0),
            block_pools: Mutex::new(Vec::new()),
            autosave: Mutex::new(None),
        }
    }

    pub fn recursion_settings(&self) -> &[RadiosityRecursionSettings] {
        &self.recursion_settings
    }

    /// Weighted average of the cached samples usable at the query point.
    /// Returns the total weight (zero on a miss) and the average irradiance,
    /// black on a miss.
    pub fn find_reusable_block(&self, query: ReuseQuery<'_>, stats: &mut RadiosityStats) -> (Float, RGBSpectrum) {
        if query.bounce_depth > u8::MAX as usize {
            return (0.0, RGBSpectrum::black());
        }

        let mut gather = Gather::new(query);
        self.octree.dist_traverse(query.point, query.bounce_depth as u8,
                                  &mut |block: &SampleBlock| gather.average_near_block(block));

        stats.octree_lookups += gather.lookups;
        for (total, count) in stats.octree_accepts.iter_mut().zip(gather.accepts.iter()) {
            *total += count;
        }

        if gather.weights > 0.0 {
            (gather.weights, gather.weighted_illuminance / gather.weights)
        } else {
            (0.0, RGBSpectrum::black())
        }
    }

    /// Files `block` in the octree and journals it in `pool` for autosave.
    pub fn add_block(&self, pool: &mut BlockPool, stats: &mut RadiosityStats, block: SampleBlock) {
        let rec = match self.recursion_settings.get(block.bounce_depth as usize) {
            Some(rec) => rec,
            None => {
                log::warn!("Dropping radiosity sample with bounce depth {} beyond the recursion limit.",
                           block.bounce_depth);
                return;
            }
        };

        let id = BlockId::index_sphere(&block.point, block.harmonic_mean_distance * rec.octree_address_factor);
        pool.record(&block);
        stats.octree_nodes += self.octree.insert(id, block);
        self.block_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn acquire_block_pool(&self) -> BlockPool {
        self.block_pools.lock().unwrap_or_else(PoisonError::into_inner).pop().unwrap_or_default()
    }

    /// Writes the pool's unsaved blocks to the autosave file, if one is open,
    /// and puts the pool back on the free-list.
    pub fn release_block_pool(&self, mut pool: BlockPool) {
        {
            let mut autosave = self.autosave.lock().unwrap_or_else(PoisonError::into_inner);
            if autosave.is_some() && pool.unsaved_len() > 0 {
                log::debug!("Saving {} radiosity samples, {} recorded by this pool so far.",
                            pool.unsaved_len(), pool.total());
            }
            let result = match autosave.as_mut() {
                Some(writer) => pool.save(Some(&mut *writer as &mut dyn Write)).and_then(|_| writer.flush()),
                None => pool.save(None),
            };
            if let Err(e) = result {
                log::warn!("Failed to write radiosity samples to the cache file: {}", e);
            }
        }

        self.block_pools.lock().unwrap_or_else(PoisonError::into_inner).push(pool);
    }

    /// Opens `path` to receive every block released from now on.
    pub fn init_autosave<P: AsRef<Path>>(&self, path: P, append: bool) -> io::Result<()> {
        let file = if append {
            OpenOptions::new().create(true).append(true).open(path.as_ref())?
        } else {
            File::create(path.as_ref())?
        };
        log::info!("Saving radiosity samples to: {}.", path.as_ref().display());
        *self.autosave.lock().unwrap_or_else(PoisonError::into_inner) = Some(BufWriter::new(file));
        Ok(())
    }

    /// Loads samples from a cache file. Returns the number of samples added.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<usize, CacheFileError> {
        let file = File::open(path.as_ref())?;
        let records = cache_file::read_records(BufReader::new(file))?;

        let mut pool = self.acquire_block_pool();
        let mut stats = RadiosityStats::new();
        let mut loaded = 0;
        let mut skipped = 0;
        for record in records {
            match record {
                CacheRecord::Brightness(brightness) => {
                    log::debug!("Radiosity cache was written with brightness {}.", brightness);
                }
                CacheRecord::PreviewDone => {
                    log::debug!("Radiosity cache contains a completed pretrace.");
                }
                CacheRecord::Block(block) => {
                    if (block.bounce_depth as usize) < self.recursion_settings.len() {
                        self.add_block(&mut pool, &mut stats, block);
                        loaded += 1;
                    } else {
                        skipped += 1;
                    }
                }
            }
        }
        self.release_block_pool(pool);

        if skipped > 0 {
            log::warn!("Skipped {} radiosity samples deeper than the recursion limit.", skipped);
        }
        if loaded > 0 {
            log::info!("Reloaded {} values from radiosity cache file {}.", loaded, path.as_ref().display());
        } else {
            log::warn!("Unable to read any values from the radiosity cache file {}.", path.as_ref().display());
        }
        Ok(loaded)
    }

    /// Writes every cached block to `out`.
    pub fn save_all<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        let mut result = Ok(());
        self.octree.traverse_all(&mut |block: &SampleBlock| {
            if result.is_ok() {
                result = cache_file::write_block(&mut *out, block);
            }
        });
        result
    }

    pub fn for_each_block<F: FnMut(&SampleBlock)>(&self, mut f: F) {
        self.octree.traverse_all(&mut f);
    }

    pub fn block_count(&self) -> usize {
        self.block_count.load(Ordering::Relaxed)
    }

    pub fn node_count(&self) -> usize {
        self.octree.node_count()
    }

    pub fn root_id(&self) -> Option<BlockId> {
        self.octree.root_id()
    }
}
