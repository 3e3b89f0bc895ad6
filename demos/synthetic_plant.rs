//! Builds a synthetic tray image (two seedlings and a white size marker),
//! runs the seedling configuration over it and prints the result block.
//!
//! cargo run --example synthetic_plant

use image::{Rgb, RgbImage};
use phenoscan::output::render_block;
use phenoscan::{Pipeline, PipelineConfig};

const SEEDLINGS: &str = include_str!("configs/seedlings.json");

fn draw_disc(image: &mut RgbImage, cx: i32, cy: i32, r: i32, color: Rgb<u8>) {
    for y in (cy - r)..=(cy + r) {
        for x in (cx - r)..=(cx + r) {
            if (x - cx).pow(2) + (y - cy).pow(2) <= r * r {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    flexi_logger::Logger::try_with_str("info")?.start()?;

    let mut image = RgbImage::from_pixel(480, 360, Rgb([92, 64, 51]));
    // 20x20 px marker, 1 cm²
    for y in 10..30 {
        for x in 10..30 {
            image.put_pixel(x, y, Rgb([250, 250, 250]));
        }
    }
    draw_disc(&mut image, 150, 180, 40, Rgb([60, 170, 50]));
    draw_disc(&mut image, 320, 160, 25, Rgb([80, 190, 60]));
    // chlorotic spot inside the first seedling
    draw_disc(&mut image, 140, 175, 8, Rgb([200, 200, 70]));

    let config = PipelineConfig::from_json_str(SEEDLINGS)?;
    let output = Pipeline::new(config)?.with_verbose(true).run(&image, "synthetic.png")?;

    println!("{} object(s) kept", output.objects.len());
    print!("{}", String::from_utf8_lossy(&render_block(&output.image_id, &output.records)?));
    Ok(())
}
