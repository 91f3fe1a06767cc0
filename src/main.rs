// Copyright 2020 TwoCookingMice

use ambience::io::exr_utils;
use ambience::radiosity::settings::load_settings;
use ambience::radiosity::SceneRadiositySettings;
use ambience::renderers::radiosity::{RadiosityRenderer, RenderOptions, Renderer};
use ambience::scenes::cornell::cornell_box;
use ambience::math::constants::Float;

use std::env;
use std::path::PathBuf;

fn main() {
    env::set_var("RUST_LOG", "info");
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <output.exr> [--settings radiosity.xml] [--width N] [--height N] [--tile N] \
                   [--threads N] [--seed N] [--count N] [--recursion-limit N] [--load-cache file.rca] \
                   [--save-cache file.rca] [--reproducible] [--no-radiosity] [--reference ref.exr]", args[0]);
        std::process::exit(1);
    }

    let output_path = &args[1];
    let mut options = RenderOptions::default();
    let mut settings_path: Option<String> = None;
    let mut count_override: Option<usize> = None;
    let mut recursion_override: Option<usize> = None;
    let mut reference_path: Option<String> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--settings" => {
                i += 1;
                settings_path = args.get(i).cloned();
            }
            "--width" => {
                i += 1;
                options.width = args.get(i).and_then(|v| v.parse::<usize>().ok()).unwrap_or(options.width);
            }
            "--height" => {
                i += 1;
                options.height = args.get(i).and_then(|v| v.parse::<usize>().ok()).unwrap_or(options.height);
            }
            "--tile" => {
                i += 1;
                options.tile_size = args.get(i).and_then(|v| v.parse::<usize>().ok()).unwrap_or(options.tile_size);
            }
            "--threads" => {
                i += 1;
                options.threads = args.get(i).and_then(|v| v.parse::<usize>().ok()).unwrap_or(0);
            }
            "--seed" => {
                i += 1;
                options.seed = args.get(i).and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
            }
            "--count" => {
                i += 1;
                count_override = args.get(i).and_then(|v| v.parse::<usize>().ok());
            }
            "--recursion-limit" => {
                i += 1;
                recursion_override = args.get(i).and_then(|v| v.parse::<usize>().ok());
            }
            "--load-cache" => {
                i += 1;
                options.load_cache = args.get(i).map(PathBuf::from);
            }
            "--save-cache" => {
                i += 1;
                options.save_cache = args.get(i).map(PathBuf::from);
            }
            "--reference" => {
                i += 1;
                reference_path = args.get(i).cloned();
            }
            "--reproducible" => options.high_reproducibility = true,
            "--no-radiosity" => options.radiosity = false,
            other => log::warn!("Ignoring unknown argument {}.", other),
        }
        i += 1;
    }

    let mut settings = match settings_path {
        Some(path) => match load_settings(&path) {
            Ok(settings) => settings,
            Err(err) => {
                eprintln!("Failed to load radiosity settings {}: {}", path, err);
                std::process::exit(1);
            }
        },
        None => SceneRadiositySettings::default(),
    };
    if let Some(count) = count_override {
        settings.count = count;
    }
    if let Some(limit) = recursion_override {
        settings.recursion_limit = limit;
    }

    let aspect = options.width as Float / options.height.max(1) as Float;
    let (scene, camera) = cornell_box(aspect);
    let renderer = RadiosityRenderer::new(settings, options);

    let image = match renderer.render(&scene, &camera) {
        Ok(image) => image,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };
    if let Err(err) = exr_utils::write_exr_to_file(&image, output_path) {
        eprintln!("EXR written error: {}.", err);
        std::process::exit(1);
    }

    if let Some(path) = reference_path {
        match exr_utils::read_exr_from_file(&path) {
            Ok(reference) => match image.rms_difference(&reference) {
                Some(rms) => log::info!("RMS difference to {}: {:.6}.", path, rms),
                None => log::warn!("Reference image {} has a different size, skipping comparison.", path),
            },
            Err(err) => log::warn!("Failed to read reference image {}: {}.", path, err),
        }
    }
}
