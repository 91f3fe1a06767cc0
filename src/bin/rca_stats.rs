use ambience::math::constants::Float;
use ambience::radiosity::block::SampleBlock;
use ambience::radiosity::cache_file::{read_records, CacheRecord};
use console::style;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

#[derive(Debug)]
struct DepthSummary {
    count: usize,
    min: [Float; 3],
    max: [Float; 3],
    sum: [Float; 3],
    hmd_min: Float,
    hmd_max: Float,
    low_quality: usize,
}

impl DepthSummary {
    fn new() -> Self {
        Self {
            count: 0,
            min: [Float::INFINITY; 3],
            max: [Float::NEG_INFINITY; 3],
            sum: [0.0; 3],
            hmd_min: Float::INFINITY,
            hmd_max: Float::NEG_INFINITY,
            low_quality: 0,
        }
    }

    fn add(&mut self, block: &SampleBlock) {
        self.count += 1;
        for c in 0..3 {
            let v = block.illuminance[c];
            self.min[c] = self.min[c].min(v);
            self.max[c] = self.max[c].max(v);
            self.sum[c] += v;
        }
        self.hmd_min = self.hmd_min.min(block.harmonic_mean_distance);
        self.hmd_max = self.hmd_max.max(block.harmonic_mean_distance);
        if block.quality < 1.0 {
            self.low_quality += 1;
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <cache.rca> [--rewrite <out.rca>]", args[0]);
        std::process::exit(1);
    }

    let path = &args[1];
    let file = File::open(path).unwrap_or_else(|e| panic!("failed to open {}: {}", path, e));
    let records = read_records(BufReader::new(file)).unwrap_or_else(|e| panic!("failed to read {}: {}", path, e));

    let mut depths: Vec<DepthSummary> = Vec::new();
    let mut blocks: Vec<&SampleBlock> = Vec::new();
    let mut preview_done = false;
    for record in &records {
        match record {
            CacheRecord::Brightness(b) => println!("Legacy brightness: {}", b),
            CacheRecord::PreviewDone => preview_done = true,
            CacheRecord::Block(block) => {
                let depth = block.bounce_depth as usize;
                while depths.len() <= depth {
                    depths.push(DepthSummary::new());
                }
                depths[depth].add(block);
                blocks.push(block);
            }
        }
    }

    println!("{} {} ({} samples{})",
             style("Cache").bold(), path, blocks.len(),
             if preview_done { ", preview complete" } else { "" });
    for (depth, summary) in depths.iter().enumerate() {
        if summary.count == 0 {
            continue;
        }
        let n = summary.count as Float;
        println!("{} {} samples, {} below full quality",
                 style(format!("depth {}:", depth)).cyan(), summary.count, summary.low_quality);
        println!("  Min RGB:  {:.6}, {:.6}, {:.6}", summary.min[0], summary.min[1], summary.min[2]);
        println!("  Max RGB:  {:.6}, {:.6}, {:.6}", summary.max[0], summary.max[1], summary.max[2]);
        println!("  Mean RGB: {:.6}, {:.6}, {:.6}", summary.sum[0] / n, summary.sum[1] / n, summary.sum[2] / n);
        println!("  Harmonic mean distance: {:.6} .. {:.6}", summary.hmd_min, summary.hmd_max);
    }

    if let (Some(flag), Some(out_path)) = (args.get(2), args.get(3)) {
        if flag == "--rewrite" {
            let out = File::create(out_path).unwrap_or_else(|e| panic!("failed to create {}: {}", out_path, e));
            let mut out = BufWriter::new(out);
            for block in &blocks {
                ambience::radiosity::cache_file::write_block(&mut out, block)
                    .unwrap_or_else(|e| panic!("failed to write {}: {}", out_path, e));
            }
            out.flush().unwrap_or_else(|e| panic!("failed to write {}: {}", out_path, e));
            println!("{} {} samples to {}", style("Rewrote").green(), blocks.len(), out_path);
        }
    }
}
