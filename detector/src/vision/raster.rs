use image::GrayImage;

/// Single-channel `f32` raster used by the gradient-based routines.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl FloatImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn from_gray(image: &GrayImage) -> Self {
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            data: image.as_raw().iter().map(|&v| v as f32).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    /// Pixel lookup with coordinates clamped to the border.
    #[inline]
    pub fn get_clamped(&self, x: isize, y: isize) -> f32 {
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        self.get(x, y)
    }

    /// Bilinear interpolation with edge clamping.
    pub fn sample(&self, x: f64, y: f64) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = (x - x0) as f32;
        let fy = (y - y0) as f32;
        let (ix, iy) = (x0 as isize, y0 as isize);

        let top = self.get_clamped(ix, iy) * (1.0 - fx) + self.get_clamped(ix + 1, iy) * fx;
        let bottom =
            self.get_clamped(ix, iy + 1) * (1.0 - fx) + self.get_clamped(ix + 1, iy + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Half-resolution copy, smoothed with a 5-tap binomial kernel first.
    pub fn pyr_down(&self) -> FloatImage {
        const KERNEL: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

        let mut horizontal = FloatImage::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let mut acc = 0.0;
                for (k, w) in KERNEL.iter().enumerate() {
                    acc += w * self.get_clamped(x as isize + k as isize - 2, y as isize);
                }
                horizontal.set(x, y, acc);
            }
        }

        let width = self.width.div_ceil(2);
        let height = self.height.div_ceil(2);
        let mut out = FloatImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let sx = (2 * x) as isize;
                let sy = (2 * y) as isize;
                let mut acc = 0.0;
                for (k, w) in KERNEL.iter().enumerate() {
                    acc += w * horizontal.get_clamped(sx, sy + k as isize - 2);
                }
                out.set(x, y, acc);
            }
        }
        out
    }

    /// Scharr derivatives `(d/dx, d/dy)` in intensity units per pixel.
    pub fn scharr_gradients(&self) -> (FloatImage, FloatImage) {
        let mut gx = FloatImage::new(self.width, self.height);
        let mut gy = FloatImage::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let (x, y) = (x as isize, y as isize);
                let p = |dx: isize, dy: isize| self.get_clamped(x + dx, y + dy);
                let dx = 3.0 * (p(1, -1) - p(-1, -1))
                    + 10.0 * (p(1, 0) - p(-1, 0))
                    + 3.0 * (p(1, 1) - p(-1, 1));
                let dy = 3.0 * (p(-1, 1) - p(-1, -1))
                    + 10.0 * (p(0, 1) - p(0, -1))
                    + 3.0 * (p(1, 1) - p(1, -1));
                gx.set(x as usize, y as usize, dx / 32.0);
                gy.set(x as usize, y as usize, dy / 32.0);
            }
        }
        (gx, gy)
    }

    /// Sobel derivatives, unnormalised.
    pub fn sobel_gradients(&self) -> (FloatImage, FloatImage) {
        let mut gx = FloatImage::new(self.width, self.height);
        let mut gy = FloatImage::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let (x, y) = (x as isize, y as isize);
                let p = |dx: isize, dy: isize| self.get_clamped(x + dx, y + dy);
                let dx = (p(1, -1) - p(-1, -1)) + 2.0 * (p(1, 0) - p(-1, 0)) + (p(1, 1) - p(-1, 1));
                let dy = (p(-1, 1) - p(-1, -1)) + 2.0 * (p(0, 1) - p(0, -1)) + (p(1, 1) - p(1, -1));
                gx.set(x as usize, y as usize, dx);
                gy.set(x as usize, y as usize, dy);
            }
        }
        (gx, gy)
    }
}
