/// RGBA color with `f32` channels in `0..=1`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ColorRgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorRgba {
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque gray with all three channels set to `v`.
    #[inline]
    pub const fn gray(v: f32) -> Self {
        Self::new(v, v, v, 1.0)
    }

    #[inline]
    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }
}

impl From<ColorRgba> for wgpu::Color {
    #[inline]
    fn from(c: ColorRgba) -> Self {
        c.to_wgpu()
    }
}
