// Copyright @yucwang 2021

use crate::core::rng::LcgRng;
use crate::core::scene::Scene;
use crate::core::sensor::Sensor;
use crate::core::stats::RadiosityStats;
use crate::core::ticket::TraceTicket;
use crate::core::tracer::{AbortFlag, AmbientProvider, NoRadiosity, RenderAbort, SampleTracer};
use crate::integrators::diffuse::DiffuseTracer;
use crate::math::bitmap::Bitmap;
use crate::math::constants::{Float, Vector2f};
use crate::math::spectrum::RGBSpectrum;
use crate::radiosity::block::{PASS_FINAL, PASS_FIRST, PASS_MAX};
use crate::radiosity::{RadiosityCache, RadiosityFunction, SceneRadiositySettings};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

pub use super::renderer::Renderer;

// Fudge used when counting pretrace steps so an exact power of two does not
// add a step.
const STEP_EPSILON: Float = 1.0e-10;
// Below this many traced pixels a tile always gets another pretrace pass.
const MIN_PRETRACE_PIXELS: usize = 9;
// Sub-blocks are only split while each part keeps this many pixels per side
// at the next pass.
const MIN_SUB_BLOCK_PIXELS: usize = 4;

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub width: usize,
    pub height: usize,
    pub tile_size: usize,
    /// Worker count; 0 picks the available parallelism.
    pub threads: usize,
    pub seed: u64,
    pub max_trace_level: u32,
    pub adc_bailout: Float,
    pub radiosity: bool,
    /// Give every tile its own id so that tiles of one pass never reuse each
    /// other's samples. Makes the result independent of thread scheduling.
    pub high_reproducibility: bool,
    pub load_cache: Option<PathBuf>,
    pub save_cache: Option<PathBuf>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            tile_size: 32,
            threads: 0,
            seed: 0,
            max_trace_level: 5,
            adc_bailout: 1.0 / 255.0,
            radiosity: true,
            high_reproducibility: false,
            load_cache: None,
            save_cache: None,
        }
    }
}

/// One pretrace pass: a pass id and the pixel spacing to trace at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PretracePass {
    pub pass: u8,
    pub spacing: Float,
}

/// Pretrace schedule for an image of the given size. Spacing starts at
/// `pretrace_start * max(width, height)` and halves down to
/// `pretrace_end * max(width, height)`, but never below one pixel.
pub fn pretrace_schedule(settings: &SceneRadiositySettings, width: usize, height: usize) -> Vec<PretracePass> {
    let max_extent = width.max(height) as Float;
    let mut start_size = max_extent * settings.pretrace_start;
    let mut end_size = max_extent * settings.pretrace_end;
    if end_size < 1.0 {
        log::warn!("Radiosity pretrace_end too low for {}x{}, stopping pretrace at 1 pixel.", width, height);
        end_size = 1.0;
    }
    if start_size < end_size {
        return Vec::new();
    }

    let max_steps = (PASS_MAX - PASS_FIRST - 1) as usize;
    let mut steps = ((start_size / end_size).log2() + (1.0 - STEP_EPSILON)).floor() as usize + 1;
    if steps > max_steps {
        log::warn!("Too many radiosity pretrace steps, starting pretrace late.");
        steps = max_steps;
        start_size = end_size * (2.0 as Float).powi(steps as i32);
    }

    (0..steps)
        .map(|step| PretracePass {
            pass: PASS_FIRST + step as u8,
            spacing: (start_size * (0.5 as Float).powi(step as i32)).max(end_size),
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Tile {
    index: usize,
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
}

/// A tile still in pretrace. It is cut into a `blocks_x` by `blocks_y` grid
/// and only the sub-blocks that have not converged are traced again.
#[derive(Debug, Clone)]
struct PretraceTile {
    tile: Tile,
    blocks_x: usize,
    blocks_y: usize,
    incomplete: VecDeque<(usize, usize)>,
}

impl PretraceTile {
    fn new(tile: Tile) -> Self {
        Self { tile, blocks_x: 1, blocks_y: 1, incomplete: VecDeque::from(vec![(0, 0)]) }
    }
}

/// How many parts each unfinished sub-block splits into along x and y for the
/// next pass, given `extent` pixels across the tile and `blocks` sub-blocks
/// along that axis. Only adaptive pretrace splits.
fn sub_block_divisions(extent: usize, blocks: usize, next_spacing: Float, adaptive: bool) -> usize {
    if !adaptive {
        return 1;
    }
    let next_pixels = (extent as Float / next_spacing).ceil();
    ((next_pixels / (blocks * MIN_SUB_BLOCK_PIXELS) as Float).floor() as usize).max(1)
}

/// Tiled renderer with radiosity pretrace. Each pretrace pass traces a
/// jittered grid of pixels only to fill the sample cache; the final pass
/// traces every pixel and reuses what the pretrace left behind.
pub struct RadiosityRenderer {
    settings: SceneRadiositySettings,
    options: RenderOptions,
    abort: AbortFlag,
}

impl RadiosityRenderer {
    pub fn new(mut settings: SceneRadiositySettings, options: RenderOptions) -> Self {
        settings.validate();
        Self { settings, options, abort: AbortFlag::new() }
    }

    pub fn settings(&self) -> &SceneRadiositySettings {
        &self.settings
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Lets another thread stop the render.
    pub fn abort_flag(&self) -> &AbortFlag {
        &self.abort
    }

    fn thread_count(&self) -> usize {
        if self.options.threads > 0 {
            self.options.threads
        } else {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        }
    }

    fn tiles(&self) -> Vec<Tile> {
        let size = self.options.tile_size.max(1);
        let (width, height) = (self.options.width, self.options.height);
        let tiles_x = (width + size - 1) / size;
        let tiles_y = (height + size - 1) / size;
        (0..tiles_x * tiles_y)
            .map(|index| {
                let x0 = (index % tiles_x) * size;
                let y0 = (index / tiles_x) * size;
                Tile { index, x0, y0, x1: (x0 + size).min(width), y1: (y0 + size).min(height) }
            })
            .collect()
    }

    fn tile_id(&self, tile: &Tile) -> u32 {
        if self.options.high_reproducibility { tile.index as u32 } else { 0 }
    }

    fn ticket(&self) -> TraceTicket {
        TraceTicket::new(self.options.max_trace_level, self.options.adc_bailout)
    }

    fn progress_bar(&self, len: usize, label: String) -> ProgressBar {
        let progress = ProgressBar::new(len as u64);
        progress.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] {msg} {bar:40.cyan/blue} {pos}/{len} tiles")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress.set_message(label);
        progress
    }

    fn film_position(&self, x: Float, y: Float) -> Vector2f {
        let (width, height) = (self.options.width as Float, self.options.height as Float);
        Vector2f::new(((x + 0.5) / width).clamp(0.0, 1.0), ((y + 0.5) / height).clamp(0.0, 1.0))
    }

    /// Sets up persistence. With the same file for loading and saving, new
    /// samples are appended to it; with different files, the loaded samples
    /// are copied into the new one.
    fn open_cache(&self, cache: &RadiosityCache) {
        let load = self.options.load_cache.as_ref();
        let save = self.options.save_cache.as_ref();
        let same_file = matches!((load, save), (Some(l), Some(s)) if l == s);

        if !same_file {
            if let Some(path) = save {
                if let Err(err) = cache.init_autosave(path, false) {
                    log::warn!("Cannot write radiosity cache {}: {}", path.display(), err);
                }
            }
        }
        if let Some(path) = load {
            if let Err(err) = cache.load(path) {
                log::warn!("Cannot load radiosity cache {}: {}", path.display(), err);
            }
        }
        if same_file {
            if let Some(path) = save {
                if let Err(err) = cache.init_autosave(path, true) {
                    log::warn!("Cannot append to radiosity cache {}: {}", path.display(), err);
                }
            }
        }
    }

    /// Traces the pretrace grid of every unfinished sub-block of `state` at
    /// the pass spacing. Sub-blocks that want another pass go back on the
    /// queue, split up for `next_spacing`.
    fn pretrace_tile(&self,
                     tracer: &dyn SampleTracer,
                     sensor: &dyn Sensor,
                     radiosity: &mut RadiosityFunction,
                     state: &mut PretraceTile,
                     pass: &PretracePass,
                     next_spacing: Float) -> Result<(), RenderAbort> {
        let tile = state.tile;
        let spacing = pass.spacing;
        let mut rng = LcgRng::new(self.options.seed
            .wrapping_add(pass.pass as u64 * 17)
            .wrapping_add(tile.index as u64 * 13));
        let jitter = (spacing / 2.0).min(1.0);
        let offset = (spacing - 1.0) / 2.0;
        let start_x = ((tile.x0 as Float - 0.5) / spacing).ceil() * spacing;
        let start_y = ((tile.y0 as Float - 0.5) / spacing).ceil() * spacing;

        let coverage = self.settings.nearest_count_apt;
        let (tile_width, tile_height) = (tile.x1 - tile.x0, tile.y1 - tile.y0);
        let divide_x = sub_block_divisions(tile_width, state.blocks_x, next_spacing, coverage != 0);
        let divide_y = sub_block_divisions(tile_height, state.blocks_y, next_spacing, coverage != 0);
        let block_width = tile_width as Float / state.blocks_x as Float;
        let block_height = tile_height as Float / state.blocks_y as Float;

        for _ in 0..state.incomplete.len() {
            let (sub_x, sub_y) = match state.incomplete.pop_front() {
                Some(sub) => sub,
                None => break,
            };
            let sub_x0 = tile.x0 as Float + block_width * sub_x as Float;
            let sub_y0 = tile.y0 as Float + block_height * sub_y as Float;
            let (sub_x1, sub_y1) = (sub_x0 + block_width, sub_y0 + block_height);

            radiosity.reset_top_level_stats();
            let mut pixel_count = 0;
            let mut y = start_y;
            while y < sub_y1 {
                if y >= sub_y0 {
                    let mut x = start_x;
                    while x < sub_x1 {
                        if x >= sub_x0 {
                            let film = self.film_position(x + offset + jitter * rng.next_signed(),
                                                          y + offset + jitter * rng.next_signed());
                            let ray = sensor.sample_ray(&film);
                            let mut ticket = self.ticket();
                            tracer.trace_ray(&ray, &mut ticket, 1.0, &mut *radiosity)?;
                            pixel_count += 1;
                        }
                        x += spacing;
                    }
                }
                y += spacing;
            }

            let (query_count, reuse) = radiosity.top_level_stats();
            let again = if pixel_count < MIN_PRETRACE_PIXELS {
                true
            } else if query_count == 0 {
                false
            } else {
                !(coverage != 0 && reuse / query_count as Float >= coverage as Float)
            };

            if again {
                for dy in 0..divide_y {
                    for dx in 0..divide_x {
                        state.incomplete.push_back((sub_x * divide_x + dx, sub_y * divide_y + dy));
                    }
                }
            }
        }

        state.blocks_x *= divide_x;
        state.blocks_y *= divide_y;
        Ok(())
    }

    fn final_tile(&self,
                  tracer: &dyn SampleTracer,
                  sensor: &dyn Sensor,
                  ambient: &mut dyn AmbientProvider,
                  tile: &Tile) -> Result<Vec<RGBSpectrum>, RenderAbort> {
        let mut block = Vec::with_capacity((tile.x1 - tile.x0) * (tile.y1 - tile.y0));
        for y in tile.y0..tile.y1 {
            for x in tile.x0..tile.x1 {
                let ray = sensor.sample_ray(&self.film_position(x as Float, y as Float));
                let mut ticket = self.ticket();
                block.push(tracer.trace_ray(&ray, &mut ticket, 1.0, &mut *ambient)?.colour);
            }
        }
        Ok(block)
    }

    /// Runs one pretrace pass over `active` tiles and returns the tiles with
    /// sub-blocks left for another pass.
    fn run_pretrace_pass(&self,
                         cache: &RadiosityCache,
                         tracer: &dyn SampleTracer,
                         sensor: &dyn Sensor,
                         active: &[PretraceTile],
                         pass: &PretracePass,
                         next_spacing: Float) -> Result<Vec<PretraceTile>, RenderAbort> {
        let progress = self.progress_bar(active.len(),
                                         format!("pretrace {} ({:.1}px)", pass.pass - PASS_FIRST + 1, pass.spacing));
        let next_tile = Arc::new(AtomicUsize::new(0));
        let again = Mutex::new(Vec::new());
        let mut stats = RadiosityStats::new();
        let mut result = Ok(());

        thread::scope(|scope| {
            let handles: Vec<_> = (0..self.thread_count()).map(|_| {
                let next_tile = Arc::clone(&next_tile);
                let again = &again;
                let progress = &progress;
                scope.spawn(move || {
                    let mut radiosity = RadiosityFunction::new(cache, tracer, &self.settings, sensor.position(), false);
                    let mut outcome = Ok(());
                    loop {
                        let index = next_tile.fetch_add(1, Ordering::Relaxed);
                        let mut state = match active.get(index) {
                            Some(state) => state.clone(),
                            None => break,
                        };
                        radiosity.before_tile(self.tile_id(&state.tile), pass.pass);
                        let traced = self.pretrace_tile(tracer, sensor, &mut radiosity, &mut state, pass, next_spacing);
                        radiosity.after_tile();
                        match traced {
                            Ok(()) if !state.incomplete.is_empty() => again.lock()
                                .unwrap_or_else(std::sync::PoisonError::into_inner)
                                .push(state),
                            Ok(()) => {}
                            Err(abort) => {
                                outcome = Err(abort);
                                break;
                            }
                        }
                        progress.inc(1);
                    }
                    (radiosity.take_stats(), outcome)
                })
            }).collect();

            for handle in handles {
                match handle.join() {
                    Ok((worker_stats, outcome)) => {
                        stats.merge(&worker_stats);
                        if outcome.is_err() {
                            result = outcome;
                        }
                    }
                    Err(_) => log::warn!("A pretrace worker panicked."),
                }
            }
        });
        progress.finish_and_clear();
        stats.log_summary(&format!("Radiosity pretrace pass {}", pass.pass - PASS_FIRST + 1));
        result?;

        let mut again = again.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner);
        again.sort_by_key(|state| state.tile.index);
        Ok(again)
    }

    fn run_final_pass(&self,
                      cache: &RadiosityCache,
                      tracer: &dyn SampleTracer,
                      sensor: &dyn Sensor,
                      tiles: &[Tile],
                      flat_ambient: RGBSpectrum) -> Result<Bitmap, RenderAbort> {
        let (width, height) = (self.options.width, self.options.height);
        let progress = self.progress_bar(tiles.len(), String::from("render"));
        let next_tile = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel::<(Tile, Vec<RGBSpectrum>)>();
        let mut bitmap = Bitmap::new(width, height);
        let mut stats = RadiosityStats::new();
        let mut result = Ok(());

        thread::scope(|scope| {
            let handles: Vec<_> = (0..self.thread_count()).map(|_| {
                let next_tile = Arc::clone(&next_tile);
                let tx = tx.clone();
                scope.spawn(move || {
                    let mut radiosity = RadiosityFunction::new(cache, tracer, &self.settings, sensor.position(), true);
                    let mut flat = NoRadiosity::new(flat_ambient);
                    let mut outcome = Ok(());
                    loop {
                        let index = next_tile.fetch_add(1, Ordering::Relaxed);
                        let tile = match tiles.get(index) {
                            Some(tile) => *tile,
                            None => break,
                        };
                        let traced = if self.options.radiosity {
                            radiosity.before_tile(self.tile_id(&tile), PASS_FINAL);
                            let traced = self.final_tile(tracer, sensor, &mut radiosity, &tile);
                            radiosity.after_tile();
                            traced
                        } else {
                            self.final_tile(tracer, sensor, &mut flat, &tile)
                        };
                        match traced {
                            Ok(block) => {
                                if tx.send((tile, block)).is_err() {
                                    break;
                                }
                            }
                            Err(abort) => {
                                outcome = Err(abort);
                                break;
                            }
                        }
                    }
                    (radiosity.take_stats(), outcome)
                })
            }).collect();

            drop(tx);
            for (tile, block) in rx.iter() {
                let tile_width = tile.x1 - tile.x0;
                for (i, colour) in block.into_iter().enumerate() {
                    bitmap[(tile.x0 + i % tile_width, tile.y0 + i / tile_width)] = colour;
                }
                progress.inc(1);
            }

            for handle in handles {
                match handle.join() {
                    Ok((worker_stats, outcome)) => {
                        stats.merge(&worker_stats);
                        if outcome.is_err() {
                            result = outcome;
                        }
                    }
                    Err(_) => log::warn!("A render worker panicked."),
                }
            }
        });
        progress.finish_and_clear();
        if self.options.radiosity {
            stats.log_summary("Radiosity final pass");
        }
        result.map(|_| bitmap)
    }
}

impl Renderer for RadiosityRenderer {
    fn render(&self, scene: &Scene, sensor: &dyn Sensor) -> Result<Bitmap, RenderAbort> {
        let (width, height) = (self.options.width, self.options.height);
        if width == 0 || height == 0 {
            return Ok(Bitmap::new(0, 0));
        }

        let tracer = DiffuseTracer::new(scene, &self.abort, self.settings.default_importance);
        let cache = RadiosityCache::new(&self.settings);
        let tiles = self.tiles();

        if self.options.radiosity {
            self.open_cache(&cache);
            let schedule = pretrace_schedule(&self.settings, width, height);
            let mut active: Vec<PretraceTile> = tiles.iter().copied().map(PretraceTile::new).collect();
            for (step, pass) in schedule.iter().enumerate() {
                if active.is_empty() {
                    break;
                }
                let next_spacing = schedule.get(step + 1).map_or(pass.spacing, |next| next.spacing);
                active = self.run_pretrace_pass(&cache, &tracer, sensor, &active, pass, next_spacing)?;
            }
            log::info!("Radiosity pretrace done: {} samples in {} octree nodes.",
                       cache.block_count(), cache.node_count());
        }

        let bitmap = self.run_final_pass(&cache, &tracer, sensor, &tiles, scene.ambient_light())?;
        if self.options.radiosity {
            log::info!("Radiosity cache holds {} samples.", cache.block_count());
        }
        Ok(bitmap)
    }
}
