/* Copyright 2020 @TwoCookingMice */

use crate::math::bitmap::Bitmap;
use crate::math::constants::Float;
use crate::math::spectrum::RGBSpectrum;

use exr::prelude::*;

struct Pixels {
    width: usize,
    height: usize,
    data: Vec<(f32, f32, f32)>,
}

/// Reads the first RGB(A) layer of an EXR file into a bitmap. Alpha is dropped.
pub fn read_exr_from_file(file_path: &str) -> std::result::Result<Bitmap, exr::error::Error> {
    log::info!("Starting reading OpenEXR image from: {}.", file_path);

    let image = read()
        .no_deep_data()
        .largest_resolution_level()
        .rgba_channels(
            |resolution, _| Pixels {
                width: resolution.width(),
                height: resolution.height(),
                data: vec![(0.0, 0.0, 0.0); resolution.width() * resolution.height()],
            },
            |image: &mut Pixels, position, (r, g, b, _a): (f32, f32, f32, f32)| {
                let idx = position.y() * image.width + position.x();
                image.data[idx] = (r, g, b);
            },
        )
        .first_valid_layer()
        .all_attributes()
        .from_file(file_path)?;

    let pixels = image.layer_data.channel_data.pixels;
    let mut bitmap = Bitmap::new(pixels.width, pixels.height);
    for y in 0..pixels.height {
        for x in 0..pixels.width {
            let (r, g, b) = pixels.data[y * pixels.width + x];
            bitmap[(x, y)] = RGBSpectrum::new(r as Float, g as Float, b as Float);
        }
    }

    log::info!("OpenEXR loaded, width = {}, height = {}.", pixels.width, pixels.height);
    Ok(bitmap)
}

// Write EXR Image to file
pub fn write_exr_to_file(bitmap: &Bitmap, file_path: &str) -> std::result::Result<(), exr::error::Error> {
    log::info!("Starting writing openexr images: {}.", file_path);

    let width = bitmap.width();
    let image = bitmap.raw_copy();
    write_rgb_file(file_path, width, bitmap.height(), |x, y| image[y * width + x])?;

    log::info!("EXR written to: {}.", file_path);
    Ok(())
}
