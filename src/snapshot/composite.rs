//! Visual snapshots: each batch is tiled into a grid panel, and the input,
//! prediction and target panels are stacked top to bottom.

use std::path::{Path, PathBuf};

use crate::error::{Result, SolverError};
use crate::math::image_batch::ImageBatch;

/// An 8-bit RGB raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl Panel {
    fn blank(width: usize, height: usize) -> Panel {
        Panel { width, height, pixels: vec![0; width * height * 3] }
    }

    pub fn rgb_at(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SolverError::invalid_input("cannot write an empty snapshot"));
        }
        let img = image::RgbImage::from_raw(self.width as u32, self.height as u32, self.pixels.clone())
            .ok_or_else(|| SolverError::invalid_input("snapshot buffer does not match its dimensions"))?;
        img.save(path)?;
        Ok(())
    }
}

/// Maps a [0, 1] pixel value onto 0..=255, clamping out-of-range values.
pub fn to_display(v: f64) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Tiles the images of `batch` into a near-square grid.
/// Single-channel images are rendered grey; extra channels beyond three are ignored.
pub fn panelize(batch: &ImageBatch) -> Panel {
    if batch.is_empty() {
        return Panel::blank(0, 0);
    }
    let cols = (batch.n as f64).sqrt().ceil() as usize;
    let rows = batch.n.div_ceil(cols);
    let (h, w) = (batch.height, batch.width);
    let mut panel = Panel::blank(cols * w, rows * h);

    for i in 0..batch.n {
        let (gy, gx) = (i / cols, i % cols);
        for y in 0..h {
            for x in 0..w {
                let out = ((gy * h + y) * panel.width + gx * w + x) * 3;
                for c in 0..3 {
                    let src = if batch.channels >= 3 { c } else { 0 };
                    panel.pixels[out + c] = to_display(batch.at(i, src, y, x));
                }
            }
        }
    }
    panel
}

/// Stacks panels vertically, left-aligned, padding narrower panels with black.
pub fn stack(panels: &[Panel]) -> Panel {
    let width = panels.iter().map(|p| p.width).max().unwrap_or(0);
    let height = panels.iter().map(|p| p.height).sum();
    let mut out = Panel::blank(width, height);
    let mut top = 0;
    for panel in panels {
        for y in 0..panel.height {
            let src = &panel.pixels[y * panel.width * 3..(y + 1) * panel.width * 3];
            let dst_start = (top + y) * width * 3;
            out.pixels[dst_start..dst_start + src.len()].copy_from_slice(src);
        }
        top += panel.height;
    }
    out
}

/// Input, prediction and target panels, stacked.
pub fn composite(inputs: &ImageBatch, prediction: &ImageBatch, targets: &ImageBatch) -> Panel {
    stack(&[panelize(inputs), panelize(prediction), panelize(targets)])
}

/// `model<id>_ep<epoch>_b<batch>.png`
pub fn training_snapshot_path(dir: &Path, experiment_id: &str, epoch: usize, batch: usize) -> PathBuf {
    dir.join(format!("model{}_ep{}_b{}.png", experiment_id, epoch, batch))
}

/// `val_model<id>_ep<epoch>_b<batch>.png`
pub fn validation_snapshot_path(dir: &Path, experiment_id: &str, epoch: usize, batch: usize) -> PathBuf {
    dir.join(format!("val_model{}_ep{}_b{}.png", experiment_id, epoch, batch))
}

/// Renders and writes one composite; returns the image dimensions.
pub fn write_composite(
    path: &Path,
    inputs: &ImageBatch,
    prediction: &ImageBatch,
    targets: &ImageBatch,
) -> Result<(usize, usize)> {
    let panel = composite(inputs, prediction, targets);
    panel.save_png(path)?;
    Ok((panel.width, panel.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_range_is_clamped() {
        assert_eq!(to_display(-0.3), 0);
        assert_eq!(to_display(0.5), 128);
        assert_eq!(to_display(1.7), 255);
        assert_eq!(to_display(f64::NAN), 0);
    }

    #[test]
    fn test_panelize_grid_layout() {
        // five 2x3 grey images -> 3 columns x 2 rows
        let data = (0..5).flat_map(|i| vec![i as f64 / 4.0; 6]).collect();
        let batch = ImageBatch::from_vec(5, 1, 2, 3, data).unwrap();
        let panel = panelize(&batch);
        assert_eq!((panel.width, panel.height), (9, 4));
        assert_eq!(panel.rgb_at(4, 0), [64, 64, 64]);
        assert_eq!(panel.rgb_at(1, 2), [191, 191, 191]);
        assert_eq!(panel.rgb_at(3, 3), [255, 255, 255]);
        // unused sixth cell stays black
        assert_eq!(panel.rgb_at(8, 3), [0, 0, 0]);
    }

    #[test]
    fn test_composite_stacks_three_panels() {
        let a = ImageBatch::from_vec(1, 3, 2, 2, vec![0.0; 12]).unwrap();
        let b = ImageBatch::from_vec(1, 3, 2, 2, vec![1.0; 12]).unwrap();
        let panel = composite(&a, &b, &a);
        assert_eq!((panel.width, panel.height), (2, 6));
        assert_eq!(panel.rgb_at(1, 3), [255, 255, 255]);
        assert_eq!(panel.rgb_at(1, 5), [0, 0, 0]);
    }

    #[test]
    fn test_write_composite_and_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = training_snapshot_path(dir.path(), "0", 3, 100);
        assert!(path.ends_with("model0_ep3_b100.png"));
        assert!(validation_snapshot_path(dir.path(), "1", 0, 2).ends_with("val_model1_ep0_b2.png"));

        let batch = ImageBatch::from_vec(2, 3, 2, 2, vec![0.25; 24]).unwrap();
        assert_eq!(write_composite(&path, &batch, &batch, &batch).unwrap(), (4, 6));
        let back = image::open(&path).unwrap().to_rgb8();
        assert_eq!(back.dimensions(), (4, 6));
    }
}
