// Copyright @yucwang 2026

use crate::core::stats::{depth_bucket, RadiosityStats};
use crate::core::ticket::TraceTicket;
use crate::core::tracer::{AmbientProvider, RenderAbort, SampleTracer};
use crate::math::constants::{Float, Vector3f, BOUND_HUGE};
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;

use super::block::{BlockPool, SampleBlock, PASS_FINAL, PASS_FIRST};
use super::cache::{RadiosityCache, ReuseQuery};
use super::directions::SampleDirectionGenerator;
use super::settings::{RadiosityRecursionSettings, SceneRadiositySettings};

// Queries with a weight below this get a looser error bound.
const WEIGHT_ERROR_BOUND_OFFSET: Float = 0.25;
const SIMILAR_EPSILON: Float = 1.0e-10;
// A nearest hit closer than this fraction of the maximum reuse distance
// suggests two surfaces hit at once; such samples are not stored.
const MIN_NEAREST_FRACTION: Float = 1.0e-4;

/// Raw sums collected while shooting the sample rays of one gather.
struct SampleSums {
    colour: RGBSpectrum,
    quality: Float,
    inverse_distance: Float,
    smallest_distance: Float,
    to_nearest: Vector3f,
    ok_count: usize,
    ok_count_raw: usize,
}

/// Per-thread radiosity state. Borrows the shared cache and tracer; owns the
/// direction generators and the block pool of the tile in progress.
pub struct RadiosityFunction<'a> {
    cache: &'a RadiosityCache,
    tracer: &'a dyn SampleTracer,
    settings: &'a SceneRadiositySettings,
    recursion_settings: &'a [RadiosityRecursionSettings],
    generators: Vec<SampleDirectionGenerator>,
    pool: Option<BlockPool>,
    camera_position: Vector3f,
    error_bound: Float,
    is_final_trace: bool,
    pretrace_step: u8,
    tile_id: u32,
    top_level_query_count: u64,
    top_level_reuse: Float,
    stats: RadiosityStats,
}

impl<'a> RadiosityFunction<'a> {
    pub fn new(cache: &'a RadiosityCache,
               tracer: &'a dyn SampleTracer,
               settings: &'a SceneRadiositySettings,
               camera_position: Vector3f,
               is_final_trace: bool) -> Self {
        let recursion_settings = cache.recursion_settings();
        let generators = (0..recursion_settings.len())
            .map(|_| SampleDirectionGenerator::new(settings.direction_pool_size))
            .collect();
        let error_bound = if is_final_trace {
            settings.error_bound
        } else {
            settings.error_bound * settings.low_error_factor
        };

        Self {
            cache,
            tracer,
            settings,
            recursion_settings,
            generators,
            pool: None,
            camera_position,
            error_bound,
            is_final_trace,
            pretrace_step: if is_final_trace { PASS_FINAL } else { PASS_FIRST },
            tile_id: 0,
            top_level_query_count: 0,
            top_level_reuse: 0.0,
            stats: RadiosityStats::new(),
        }
    }

    pub fn is_final_trace(&self) -> bool {
        self.is_final_trace
    }

    /// Starts a tile: restarts the direction sequences and takes a block pool.
    pub fn before_tile(&mut self, tile_id: u32, pass: u8) {
        if self.is_final_trace && pass != PASS_FINAL {
            log::warn!("Final trace tile {} started with pretrace pass id {}.", tile_id, pass);
        }
        self.pretrace_step = pass;
        self.tile_id = tile_id;

        for generator in self.generators.iter_mut() {
            generator.reset(self.settings.direction_pool_size, tile_id);
        }

        if let Some(pool) = self.pool.take() {
            self.cache.release_block_pool(pool);
        }
        self.pool = Some(self.cache.acquire_block_pool());
    }

    /// Finishes a tile, handing its samples over to the autosave file.
    pub fn after_tile(&mut self) {
        if let Some(pool) = self.pool.take() {
            self.cache.release_block_pool(pool);
        }
    }

    /// Top-level query count and accumulated `reuse * 4` since the last reset.
    pub fn top_level_stats(&self) -> (u64, Float) {
        (self.top_level_query_count, self.top_level_reuse)
    }

    pub fn reset_top_level_stats(&mut self) {
        self.top_level_query_count = 0;
        self.top_level_reuse = 0.0;
    }

    pub fn stats(&self) -> &RadiosityStats {
        &self.stats
    }

    pub fn take_stats(&mut self) -> RadiosityStats {
        std::mem::take(&mut self.stats)
    }

    /// Shoots fresh sample rays at `point` and files the result in the cache.
    /// Returns the irradiance and the quality it was computed with.
    fn gather_light(&mut self,
                    point: &Vector3f,
                    raw_normal: &Vector3f,
                    layer_normal: &Vector3f,
                    brilliance: Float,
                    ticket: &mut TraceTicket) -> Result<(RGBSpectrum, Float), RenderAbort> {
        let depth = ticket.radiosity_recursion_depth;
        let table = self.recursion_settings;
        let rec = &table[depth];

        let to_eye = (self.camera_position - point).norm();
        let reuse_dist_min = to_eye * rec.min_reuse_factor;
        let maximum_distance = if rec.max_reuse_factor.is_infinite() {
            Float::INFINITY
        } else {
            to_eye * rec.max_reuse_factor
        };

        let saved_max_trace_level = ticket.max_allowed_trace_level;
        let saved_trace_level = ticket.trace_level;
        let saved_adc_bailout = ticket.adc_bailout;
        let saved_quality = ticket.radiosity_quality;

        // Secondary rays start fresh, whatever the history of the ray that
        // got us here.
        ticket.trace_level = rec.trace_level;
        ticket.max_allowed_trace_level = ticket.max_allowed_trace_level.max(ticket.trace_level + 1);
        ticket.adc_bailout = self.settings.adc_bailout;

        let sums = self.shoot_samples(point, raw_normal, layer_normal, brilliance, rec, ticket);

        ticket.max_allowed_trace_level = saved_max_trace_level;
        ticket.trace_level = saved_trace_level;
        ticket.adc_bailout = saved_adc_bailout;

        let sums = match sums {
            Ok(sums) => sums,
            Err(abort) => {
                ticket.radiosity_quality = saved_quality;
                return Err(abort);
            }
        };

        self.stats.ray_count += sums.ok_count as u64;
        if depth == 0 {
            self.stats.top_level_ray_count += sums.ok_count as u64;
        }
        if self.is_final_trace {
            self.stats.final_ray_count += sums.ok_count as u64;
        }

        if sums.ok_count == 0 {
            log::debug!("No usable sample direction at {:?}.", point);
            ticket.radiosity_quality = saved_quality;
            return Ok((RGBSpectrum::black(), 0.0));
        }

        let illuminance = if sums.quality == 0.0 {
            sums.colour
        } else {
            sums.colour / sums.quality
        };
        let quality = sums.quality / sums.ok_count as Float;

        if sums.smallest_distance > maximum_distance * MIN_NEAREST_FRACTION {
            let mean_distance = (sums.ok_count as Float / sums.inverse_distance)
                .max(reuse_dist_min)
                .min(maximum_distance);

            let file_under_raw = sums.ok_count_raw > sums.ok_count - sums.ok_count_raw;
            let block = SampleBlock {
                point: *point,
                normal: if file_under_raw { *raw_normal } else { *layer_normal },
                brilliance,
                to_nearest_surface: sums.to_nearest,
                illuminance,
                harmonic_mean_distance: mean_distance,
                nearest_distance: sums.smallest_distance,
                quality,
                bounce_depth: depth as u8,
                pass: self.pretrace_step,
                tile_id: self.tile_id,
            };

            let cache = self.cache;
            let pool = self.pool.get_or_insert_with(|| cache.acquire_block_pool());
            cache.add_block(pool, &mut self.stats, block);
        } else {
            self.stats.unsaved_count += 1;
        }

        ticket.radiosity_quality = saved_quality.max(quality);
        Ok((illuminance, quality))
    }

    fn shoot_samples(&mut self,
                     point: &Vector3f,
                     raw_normal: &Vector3f,
                     layer_normal: &Vector3f,
                     brilliance: Float,
                     rec: &RadiosityRecursionSettings,
                     ticket: &mut TraceTicket) -> Result<SampleSums, RenderAbort> {
        let depth = ticket.radiosity_recursion_depth;
        let tracer = self.tracer;
        let max_sample = self.settings.max_sample;

        let mut sums = SampleSums {
            colour: RGBSpectrum::black(),
            quality: 0.0,
            inverse_distance: 0.0,
            smallest_distance: BOUND_HUGE,
            to_nearest: Vector3f::zeros(),
            ok_count: 0,
            ok_count_raw: 0,
        };

        let weight = (ticket.adc_bailout + SIMILAR_EPSILON).max(rec.weight);

        // An unperturbed normal makes the raw normal the better frame right away.
        let mut use_raw_normal = (raw_normal - layer_normal).abs().sum() < SIMILAR_EPSILON;
        let sample_count = self.generators[depth].init_sequence(
            rec.rays_per_sample, raw_normal, layer_normal, use_raw_normal, brilliance);

        for i in 0..sample_count {
            let mut direction = self.generators[depth].next_direction();
            if direction.is_none() && !use_raw_normal {
                use_raw_normal = true;
                self.generators[depth].init_sequence(sample_count, raw_normal, layer_normal, true, brilliance);
                direction = self.generators[depth].next_direction();
            }
            let direction = match direction {
                Some(direction) => direction,
                None => break,
            };

            sums.ok_count += 1;
            if use_raw_normal {
                sums.ok_count_raw += 1;
            }

            ticket.radiosity_quality = 1.0;
            ticket.radiosity_importance_queried = if sample_count > 1 {
                i as Float / (sample_count - 1) as Float
            } else {
                0.0
            };
            let alpha_background = ticket.alpha_background;
            ticket.alpha_background = false;
            ticket.radiosity_recursion_depth += 1;

            let ray = Ray3f::spawn(*point, direction);
            let traced = tracer.trace_ray(&ray, ticket, weight, self);

            ticket.radiosity_recursion_depth -= 1;
            ticket.alpha_background = alpha_background;
            let traced = traced?;

            if ticket.radiosity_importance_found >= ticket.radiosity_importance_queried {
                let mut quality = ticket.radiosity_quality;
                if ticket.radiosity_importance_found < 1.0 {
                    let last_i = (ticket.radiosity_importance_found * (sample_count - 1) as Float).floor();
                    quality *= sample_count as Float / (last_i + 1.0);
                }

                // Clamp very bright samples to keep splotches down.
                let mut colour = traced.colour;
                let max_ill = colour.max_component();
                if max_sample > 0.0 && max_ill > max_sample {
                    colour *= max_sample / max_ill;
                }

                sums.quality += quality;
                sums.colour += colour * quality;
            }

            if traced.distance < sums.smallest_distance {
                sums.smallest_distance = traced.distance;
                sums.to_nearest = direction;
            }
            sums.inverse_distance += 1.0 / traced.distance;
        }

        ticket.radiosity_importance_queried = -1.0;
        Ok(sums)
    }
}

impl<'a> AmbientProvider for RadiosityFunction<'a> {
    fn compute_ambient(&mut self,
                       point: &Vector3f,
                       raw_normal: &Vector3f,
                       layer_normal: &Vector3f,
                       brilliance: Float,
                       weight: Float,
                       ticket: &mut TraceTicket) -> Result<RGBSpectrum, RenderAbort> {
        let depth = ticket.radiosity_recursion_depth;
        let table = self.recursion_settings;
        let rec = match table.get(depth) {
            Some(rec) => rec,
            None => return Ok(RGBSpectrum::black()),
        };
        let bucket = depth_bucket(depth);

        self.stats.query_count[bucket] += 1;
        self.stats.query_weight[bucket] += weight;

        let mut temp_error_bound = self.error_bound;
        if weight < WEIGHT_ERROR_BOUND_OFFSET {
            temp_error_bound += WEIGHT_ERROR_BOUND_OFFSET - weight;
        }

        let brilliance = if self.settings.brilliance { brilliance } else { 1.0 };
        let effective_normal = if self.settings.normal { *layer_normal } else { *raw_normal };

        let query = ReuseQuery {
            point,
            normal: &effective_normal,
            brilliance,
            error_bound: temp_error_bound * rec.error_bound_factor,
            bounce_depth: depth,
            pass: self.pretrace_step,
            tile_id: self.tile_id,
        };
        let (mut reuse, mut ambient) = self.cache.find_reusable_block(query, &mut self.stats);

        if depth == 0 {
            self.top_level_query_count += 1;
            self.top_level_reuse += reuse * 4.0;
        }

        let reuse_count = rec.reuse_count as Float;
        let final_reuse = self.is_final_trace && !self.settings.always_sample && reuse > 0.0;
        if reuse * 4.0 >= reuse_count || final_reuse {
            self.stats.reuse_count += 1;
            if depth == 0 {
                self.stats.top_level_reuse_count += 1;
            }
            if self.is_final_trace {
                self.stats.final_reuse_count += 1;
            }
        } else {
            let (gathered, quality) = self.gather_light(point, raw_normal, &effective_normal, brilliance, ticket)?;

            // Blend with whatever was found nearby rather than discarding it.
            ambient = if reuse > 0.0 {
                (ambient * reuse + gathered * quality) / (reuse + quality)
            } else {
                gathered
            };
            reuse += quality;

            self.stats.gather_count += 1;
            self.stats.samples_taken[bucket] += 1;
            if depth == 0 {
                self.stats.top_level_gather_count += 1;
            }
            if self.is_final_trace {
                self.stats.final_gather_count += 1;
            }
        }

        ticket.radiosity_quality = (4.0 * reuse / reuse_count).min(ticket.radiosity_quality);

        let gray = self.settings.gray_threshold;
        ambient = ambient * (1.0 - gray) + RGBSpectrum::splat(gray * ambient.greyscale());
        Ok(ambient * self.settings.brightness)
    }

    fn check_radiosity_trace_level(&self, ticket: &TraceTicket) -> bool {
        ticket.radiosity_recursion_depth < self.settings.recursion_limit
    }
}

impl<'a> Drop for RadiosityFunction<'a> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            self.cache.release_block_pool(pool);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tracer::TraceResult;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Every ray hits a surface facing back along the ray at a fixed distance.
    struct MockTracer {
        colour: RGBSpectrum,
        distance: Float,
        importance: Float,
        recurse: bool,
        abort_after: Option<usize>,
        calls: AtomicUsize,
        levels: Mutex<Vec<(u32, u32, usize)>>,
    }

    impl MockTracer {
        fn new(colour: RGBSpectrum, distance: Float) -> Self {
            Self {
                colour,
                distance,
                importance: 1.0,
                recurse: false,
                abort_after: None,
                calls: AtomicUsize::new(0),
                levels: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SampleTracer for MockTracer {
        fn trace_ray(&self,
                     ray: &Ray3f,
                     ticket: &mut TraceTicket,
                     _weight: Float,
                     ambient: &mut dyn AmbientProvider) -> Result<TraceResult, RenderAbort> {
            let calls = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.abort_after.map_or(false, |n| calls >= n) {
                return Err(RenderAbort);
            }
            self.levels.lock().unwrap().push((ticket.trace_level,
                                              ticket.max_allowed_trace_level,
                                              ticket.radiosity_recursion_depth));
            if ticket.radiosity_importance_queried >= 0.0 {
                ticket.radiosity_importance_found = self.importance;
            }

            let mut colour = self.colour;
            if self.recurse && ambient.check_radiosity_trace_level(ticket) {
                let hit = ray.at(self.distance);
                let normal = -ray.dir();
                let saved = ticket.radiosity_importance_queried;
                ticket.radiosity_importance_queried = -1.0;
                colour += ambient.compute_ambient(&hit, &normal, &normal, 1.0, 1.0, ticket)? * 0.5;
                ticket.radiosity_importance_queried = saved;
            }
            Ok(TraceResult { colour, distance: self.distance })
        }
    }

    fn up() -> Vector3f {
        Vector3f::new(0.0, 1.0, 0.0)
    }

    fn camera() -> Vector3f {
        Vector3f::new(0.0, 0.0, 10.0)
    }

    fn blocks_of(cache: &RadiosityCache) -> Vec<SampleBlock> {
        let mut blocks = Vec::new();
        cache.for_each_block(|b| blocks.push(b.clone()));
        blocks
    }

    #[test]
    fn test_recursion_limit() {
        let settings = SceneRadiositySettings { recursion_limit: 2, ..Default::default() };
        let cache = RadiosityCache::new(&settings);
        let tracer = MockTracer::new(RGBSpectrum::black(), 1.0);
        let function = RadiosityFunction::new(&cache, &tracer, &settings, camera(), true);

        let mut ticket = TraceTicket::default();
        ticket.radiosity_recursion_depth = 2;
        assert!(!function.check_radiosity_trace_level(&ticket));
        ticket.radiosity_recursion_depth = 1;
        assert!(function.check_radiosity_trace_level(&ticket));
    }

    #[test]
    fn test_gather_on_empty_cache_stores_sample() {
        let settings = SceneRadiositySettings::default();
        let cache = RadiosityCache::new(&settings);
        let tracer = MockTracer::new(RGBSpectrum::splat(0.5), 2.0);
        let mut function = RadiosityFunction::new(&cache, &tracer, &settings, camera(), true);
        function.before_tile(0, PASS_FINAL);

        let mut ticket = TraceTicket::new(7, 0.02);
        ticket.trace_level = 3;
        let p = Vector3f::zeros();
        let colour = function.compute_ambient(&p, &up(), &up(), 1.0, 1.0, &mut ticket).expect("no abort");

        assert_relative_eq!(colour.r(), 0.5, epsilon = 1e-9);
        assert_eq!(tracer.calls(), 35);
        for (level, max_level, depth) in tracer.levels.lock().unwrap().iter() {
            assert_eq!(*level, 1);
            assert_eq!(*max_level, 7);
            assert_eq!(*depth, 1);
        }

        assert_eq!(ticket.trace_level, 3);
        assert_eq!(ticket.max_allowed_trace_level, 7);
        assert_eq!(ticket.adc_bailout, 0.02);
        assert_eq!(ticket.radiosity_recursion_depth, 0);
        assert!(ticket.alpha_background);

        let blocks = blocks_of(&cache);
        assert_eq!(blocks.len(), 1);
        assert_relative_eq!(blocks[0].harmonic_mean_distance, 2.0, epsilon = 1e-9);
        assert_eq!(blocks[0].nearest_distance, 2.0);
        assert_eq!(blocks[0].quality, 1.0);
        assert_eq!(blocks[0].pass, PASS_FINAL);
        assert!((blocks[0].to_nearest_surface.norm() - 1.0).abs() < 1e-9);

        let stats = function.stats();
        assert_eq!(stats.gather_count, 1);
        assert_eq!(stats.ray_count, 35);
        assert_eq!(function.top_level_stats(), (1, 0.0));

        // A second query nearby reuses the stored sample.
        let q = Vector3f::new(0.05, 0.0, 0.0);
        let again = function.compute_ambient(&q, &up(), &up(), 1.0, 1.0, &mut ticket).expect("no abort");
        assert_eq!(tracer.calls(), 35);
        assert_relative_eq!(again.g(), 0.5, epsilon = 1e-9);
        assert_eq!(function.stats().final_reuse_count, 1);

        function.reset_top_level_stats();
        assert_eq!(function.top_level_stats(), (0, 0.0));
    }

    #[test]
    fn test_pretrace_needs_enough_samples() {
        let settings = SceneRadiositySettings::default();
        let cache = RadiosityCache::new(&settings);
        let tracer = MockTracer::new(RGBSpectrum::splat(0.25), 2.0);
        let mut function = RadiosityFunction::new(&cache, &tracer, &settings, camera(), false);
        function.before_tile(4, PASS_FIRST);

        let mut ticket = TraceTicket::default();
        let p = Vector3f::zeros();
        function.compute_ambient(&p, &up(), &up(), 1.0, 1.0, &mut ticket).expect("no abort");
        function.compute_ambient(&p, &up(), &up(), 1.0, 1.0, &mut ticket).expect("no abort");

        // One sample is not enough for reuse during pretrace (nearest_count 5).
        assert_eq!(tracer.calls(), 70);
        assert_eq!(cache.block_count(), 2);
        assert!(blocks_of(&cache).iter().all(|b| b.pass == PASS_FIRST && b.tile_id == 4));
        function.after_tile();
    }

    #[test]
    fn test_partial_reuse_is_blended() {
        let settings = SceneRadiositySettings::default();
        let cache = RadiosityCache::new(&settings);
        let p = Vector3f::zeros();
        let mut ticket = TraceTicket::default();

        let dim = MockTracer::new(RGBSpectrum::splat(0.25), 2.0);
        {
            let mut function = RadiosityFunction::new(&cache, &dim, &settings, camera(), false);
            function.before_tile(4, PASS_FIRST);
            function.compute_ambient(&p, &up(), &up(), 1.0, 1.0, &mut ticket).expect("no abort");
            function.after_tile();
        }

        // The stored sample has weight 1, short of the 5 needed for reuse, so
        // a fresh gather of quality 1 is averaged with it.
        let bright = MockTracer::new(RGBSpectrum::splat(1.0), 2.0);
        let mut function = RadiosityFunction::new(&cache, &bright, &settings, camera(), false);
        function.before_tile(4, PASS_FIRST);
        let colour = function.compute_ambient(&p, &up(), &up(), 1.0, 1.0, &mut ticket).expect("no abort");

        assert_eq!(bright.calls(), 35);
        assert_eq!(function.top_level_stats(), (1, 4.0));
        assert_relative_eq!(colour.r(), (0.25 * 1.0 + 1.0 * 1.0) / 2.0, epsilon = 1e-9);
        assert_relative_eq!(colour.b(), 0.625, epsilon = 1e-9);
        assert_eq!(cache.block_count(), 2);
    }

    #[test]
    fn test_max_sample_clamps_bright_rays() {
        let settings = SceneRadiositySettings { max_sample: 1.0, ..Default::default() };
        let cache = RadiosityCache::new(&settings);
        let tracer = MockTracer::new(RGBSpectrum::new(10.0, 5.0, 0.0), 2.0);
        let mut function = RadiosityFunction::new(&cache, &tracer, &settings, camera(), true);
        function.before_tile(0, PASS_FINAL);

        let mut ticket = TraceTicket::default();
        let colour = function.compute_ambient(&Vector3f::zeros(), &up(), &up(), 1.0, 1.0, &mut ticket)
            .expect("no abort");
        assert_relative_eq!(colour.r(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(colour.g(), 0.5, epsilon = 1e-9);
        assert_relative_eq!(colour.b(), 0.0, epsilon = 1e-9);

        let blocks = blocks_of(&cache);
        assert_eq!(blocks.len(), 1);
        assert_relative_eq!(blocks[0].illuminance.r(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_perturbed_normal_falls_back_to_raw() {
        let settings = SceneRadiositySettings { normal: true, ..Default::default() };
        let cache = RadiosityCache::new(&settings);
        let tracer = MockTracer::new(RGBSpectrum::splat(0.5), 2.0);
        let mut function = RadiosityFunction::new(&cache, &tracer, &settings, camera(), true);
        function.before_tile(0, PASS_FINAL);

        // Every direction around the flipped layer normal lies below the raw
        // surface, so the whole sequence is drawn around the raw normal.
        let layer = Vector3f::new(0.0, -1.0, 0.0);
        let mut ticket = TraceTicket::default();
        let colour = function.compute_ambient(&Vector3f::zeros(), &up(), &layer, 1.0, 1.0, &mut ticket)
            .expect("no abort");
        assert_relative_eq!(colour.g(), 0.5, epsilon = 1e-9);
        assert_eq!(tracer.calls(), 35);

        let blocks = blocks_of(&cache);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].normal, up());
    }

    #[test]
    fn test_importance_discounts_samples() {
        let settings = SceneRadiositySettings::default();
        let cache = RadiosityCache::new(&settings);
        let mut tracer = MockTracer::new(RGBSpectrum::new(0.2, 0.4, 0.6), 2.0);
        tracer.importance = 0.5;
        let mut function = RadiosityFunction::new(&cache, &tracer, &settings, camera(), true);
        function.before_tile(0, PASS_FINAL);

        let mut ticket = TraceTicket::default();
        let colour = function.compute_ambient(&Vector3f::zeros(), &up(), &up(), 1.0, 1.0, &mut ticket)
            .expect("no abort");
        assert_relative_eq!(colour.b(), 0.6, epsilon = 1e-9);

        let blocks = blocks_of(&cache);
        assert_eq!(blocks.len(), 1);
        // 18 of 35 samples used, each scaled up by 35/18.
        assert_relative_eq!(blocks[0].quality, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_misses_store_sample_at_maximum_distance() {
        let settings = SceneRadiositySettings::default();
        let cache = RadiosityCache::new(&settings);
        let tracer = MockTracer::new(RGBSpectrum::splat(1.0), Float::INFINITY);
        let mut function = RadiosityFunction::new(&cache, &tracer, &settings, camera(), true);
        function.before_tile(0, PASS_FINAL);

        let mut ticket = TraceTicket::default();
        function.compute_ambient(&Vector3f::zeros(), &up(), &up(), 1.0, 1.0, &mut ticket).expect("no abort");
        let blocks = blocks_of(&cache);
        assert_eq!(blocks.len(), 1);
        assert_relative_eq!(blocks[0].harmonic_mean_distance, 10.0 * 0.2, epsilon = 1e-9);
        assert_eq!(blocks[0].to_nearest_surface, Vector3f::zeros());
    }

    #[test]
    fn test_recursive_gather_fills_deeper_levels() {
        let settings = SceneRadiositySettings::default();
        let cache = RadiosityCache::new(&settings);
        let mut tracer = MockTracer::new(RGBSpectrum::splat(0.3), 1.0);
        tracer.recurse = true;
        let mut function = RadiosityFunction::new(&cache, &tracer, &settings, camera(), true);
        function.before_tile(0, PASS_FINAL);

        let mut ticket = TraceTicket::default();
        function.compute_ambient(&Vector3f::zeros(), &up(), &up(), 1.0, 1.0, &mut ticket).expect("no abort");

        let blocks = blocks_of(&cache);
        assert!(blocks.iter().any(|b| b.bounce_depth == 1));
        assert!(blocks.iter().all(|b| b.bounce_depth < 2));
        assert!(tracer.calls() > 35);
        assert!(tracer.levels.lock().unwrap().iter().all(|(_, _, depth)| *depth <= 2));
        assert!(function.stats().query_count[1] > 0);
    }

    #[test]
    fn test_abort_restores_ticket() {
        let settings = SceneRadiositySettings::default();
        let cache = RadiosityCache::new(&settings);
        let mut tracer = MockTracer::new(RGBSpectrum::splat(0.3), 1.0);
        tracer.abort_after = Some(10);
        {
            let mut function = RadiosityFunction::new(&cache, &tracer, &settings, camera(), true);
            function.before_tile(0, PASS_FINAL);

            let mut ticket = TraceTicket::new(5, 0.1);
            ticket.trace_level = 2;
            let result = function.compute_ambient(&Vector3f::zeros(), &up(), &up(), 1.0, 1.0, &mut ticket);
            assert_eq!(result, Err(RenderAbort));
            assert_eq!(ticket.trace_level, 2);
            assert_eq!(ticket.max_allowed_trace_level, 5);
            assert_eq!(ticket.adc_bailout, 0.1);
            assert_eq!(ticket.radiosity_recursion_depth, 0);
            assert_eq!(ticket.radiosity_quality, 1.0);
        }
        assert_eq!(cache.block_count(), 0);
        // The pool held by the dropped function went back to the free-list.
        let _pool = cache.acquire_block_pool();
    }

    #[test]
    fn test_gray_threshold_and_brightness() {
        let settings = SceneRadiositySettings { gray_threshold: 1.0, brightness: 2.0, ..Default::default() };
        let cache = RadiosityCache::new(&settings);
        let tracer = MockTracer::new(RGBSpectrum::new(1.0, 0.0, 0.0), 2.0);
        let mut function = RadiosityFunction::new(&cache, &tracer, &settings, camera(), true);
        function.before_tile(0, PASS_FINAL);

        let mut ticket = TraceTicket::default();
        let colour = function.compute_ambient(&Vector3f::zeros(), &up(), &up(), 1.0, 1.0, &mut ticket)
            .expect("no abort");
        let grey = RGBSpectrum::new(1.0, 0.0, 0.0).greyscale() * 2.0;
        assert_relative_eq!(colour.r(), grey, epsilon = 1e-9);
        assert_relative_eq!(colour.g(), grey, epsilon = 1e-9);
    }
}
