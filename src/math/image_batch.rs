use crate::error::{Result, SolverError};
use crate::math::matrix::Matrix;

/// A batch of images in NCHW layout with `f64` pixels, nominally in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBatch {
    pub n: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f64>,
}

impl ImageBatch {
    pub fn zeros(n: usize, channels: usize, height: usize, width: usize) -> ImageBatch {
        ImageBatch { n, channels, height, width, data: vec![0.0; n * channels * height * width] }
    }

    pub fn from_vec(
        n: usize,
        channels: usize,
        height: usize,
        width: usize,
        data: Vec<f64>,
    ) -> Result<ImageBatch> {
        let expected = n * channels * height * width;
        if data.len() != expected {
            return Err(SolverError::invalid_input(format!(
                "image buffer has {} values, expected {}x{}x{}x{} = {}",
                data.len(), n, channels, height, width, expected
            )));
        }
        Ok(ImageBatch { n, channels, height, width, data })
    }

    /// Concatenates batches along N. All parts must share C, H and W.
    pub fn concat(parts: &[&ImageBatch]) -> Result<ImageBatch> {
        let first = parts
            .first()
            .ok_or_else(|| SolverError::invalid_input("cannot concatenate zero batches"))?;
        let mut data = Vec::with_capacity(parts.iter().map(|p| p.data.len()).sum());
        let mut n = 0;
        for part in parts {
            if part.image_shape() != first.image_shape() {
                return Err(SolverError::invalid_input(format!(
                    "image shape {:?} does not match {:?}",
                    part.image_shape(),
                    first.image_shape()
                )));
            }
            data.extend_from_slice(&part.data);
            n += part.n;
        }
        Ok(ImageBatch { n, channels: first.channels, height: first.height, width: first.width, data })
    }

    /// `(channels, height, width)` of each image in the batch.
    pub fn image_shape(&self) -> (usize, usize, usize) {
        (self.channels, self.height, self.width)
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    fn image_len(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Pixel values of image `i`, CHW.
    pub fn image(&self, i: usize) -> &[f64] {
        let len = self.image_len();
        &self.data[i * len..(i + 1) * len]
    }

    #[inline]
    pub fn at(&self, i: usize, c: usize, y: usize, x: usize) -> f64 {
        self.data[((i * self.channels + c) * self.height + y) * self.width + x]
    }

    /// Center crop of every image to at most `height`×`width`.
    pub fn crop(&self, height: usize, width: usize) -> ImageBatch {
        let h = height.min(self.height);
        let w = width.min(self.width);
        if h == self.height && w == self.width {
            return self.clone();
        }
        let top = (self.height - h) / 2;
        let left = (self.width - w) / 2;

        let mut data = Vec::with_capacity(self.n * self.channels * h * w);
        for i in 0..self.n {
            for c in 0..self.channels {
                for y in top..top + h {
                    let start = ((i * self.channels + c) * self.height + y) * self.width + left;
                    data.extend_from_slice(&self.data[start..start + w]);
                }
            }
        }
        ImageBatch { n: self.n, channels: self.channels, height: h, width: w, data }
    }

    /// One row per pixel, one column per channel: `(n*h*w, c)`.
    pub fn to_pixel_matrix(&self) -> Matrix {
        let plane = self.height * self.width;
        let mut m = Matrix::zeros(self.n * plane, self.channels);
        for i in 0..self.n {
            for c in 0..self.channels {
                let src = &self.data[(i * self.channels + c) * plane..(i * self.channels + c + 1) * plane];
                for (p, &v) in src.iter().enumerate() {
                    m.set(i * plane + p, c, v);
                }
            }
        }
        m
    }

    /// Inverse of [`ImageBatch::to_pixel_matrix`]; channels come from `m.cols`.
    pub fn from_pixel_matrix(n: usize, height: usize, width: usize, m: &Matrix) -> Result<ImageBatch> {
        let plane = height * width;
        if m.rows != n * plane {
            return Err(SolverError::invalid_input(format!(
                "pixel matrix has {} rows, expected {}",
                m.rows,
                n * plane
            )));
        }
        let channels = m.cols;
        let mut data = vec![0.0; n * channels * plane];
        for i in 0..n {
            for p in 0..plane {
                let row = m.row(i * plane + p);
                for (c, &v) in row.iter().enumerate() {
                    data[(i * channels + c) * plane + p] = v;
                }
            }
        }
        Ok(ImageBatch { n, channels, height, width, data })
    }

    /// `(min, mean, max)` over every pixel value; zeros for an empty batch.
    pub fn value_range(&self) -> (f64, f64, f64) {
        if self.data.is_empty() {
            return (0.0, 0.0, 0.0);
        }
        let (min, max, sum) = self.data.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(lo, hi, s), &v| (lo.min(v), hi.max(v), s + v),
        );
        (min, sum / self.data.len() as f64, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize, c: usize, h: usize, w: usize) -> ImageBatch {
        let data = (0..n * c * h * w).map(|v| v as f64).collect();
        ImageBatch::from_vec(n, c, h, w, data).unwrap()
    }

    #[test]
    fn test_center_crop_takes_middle_window() {
        let b = ramp(1, 1, 4, 4);
        let cropped = b.crop(2, 2);
        assert_eq!(cropped.image_shape(), (1, 2, 2));
        assert_eq!(cropped.data, vec![5.0, 6.0, 9.0, 10.0]);
    }

    #[test]
    fn test_crop_larger_than_image_is_identity() {
        let b = ramp(2, 3, 3, 3);
        assert_eq!(b.crop(8, 8), b);
        assert_eq!(b.crop(1, 8).image_shape(), (3, 1, 3));
    }

    #[test]
    fn test_pixel_matrix_layout() {
        let b = ramp(2, 3, 2, 2);
        let m = b.to_pixel_matrix();
        assert_eq!((m.rows, m.cols), (8, 3));
        // image 1, pixel 0 has channel values at offsets 12, 16, 20
        assert_eq!(m.row(4), &[12.0, 16.0, 20.0]);
        let back = ImageBatch::from_pixel_matrix(2, 2, 2, &m).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn test_concat_rejects_mismatched_shapes() {
        let a = ramp(1, 3, 2, 2);
        let b = ramp(1, 3, 4, 4);
        assert!(ImageBatch::concat(&[&a, &b]).is_err());
        let joined = ImageBatch::concat(&[&a, &a]).unwrap();
        assert_eq!(joined.len(), 2);
    }

    #[test]
    fn test_value_range() {
        let b = ImageBatch::from_vec(1, 1, 1, 4, vec![-1.0, 0.0, 1.0, 4.0]).unwrap();
        assert_eq!(b.value_range(), (-1.0, 1.0, 4.0));
    }
}
