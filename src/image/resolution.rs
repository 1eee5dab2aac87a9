use std::fmt;

/// Pixel dimensions of a frame, a window or a network input.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// `800x600`, the output size of the face detection wrapper.
    pub const SVGA: Self = Self::new(800, 600);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn num_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Reduced `width:height` ratio, or `None` for an empty resolution.
    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        AspectRatio::new(self.width, self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A `width:height` ratio stored in lowest terms.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct AspectRatio {
    num: u32,
    den: u32,
}

impl AspectRatio {
    /// Every network input in this crate is square.
    pub const SQUARE: Self = Self { num: 1, den: 1 };

    /// Returns `None` if either side is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let div = gcd(width, height);
        Some(Self {
            num: width / div,
            den: height / div,
        })
    }

    #[inline]
    pub fn as_f32(&self) -> f32 {
        self.num as f32 / self.den as f32
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.num, self.den)
    }
}

const fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}
