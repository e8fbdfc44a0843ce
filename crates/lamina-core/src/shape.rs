use std::fmt;

// BlobShape — The (num, channels, height, width) partition of a blob
//
// Every blob in lamina is 4-D. The shape decides:
//   1. How many elements the blob holds (the product of all four axes)
//   2. The row-major offset of element (n, c, h, w)
//
// Layers recompute their top shapes from bottom shapes and their parameters
// each time the driver calls `reshape`.

/// Four-axis shape of a blob: `[num, channels, height, width]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlobShape {
    pub num: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl BlobShape {
    pub const fn new(num: usize, channels: usize, height: usize, width: usize) -> Self {
        BlobShape {
            num,
            channels,
            height,
            width,
        }
    }

    /// The shape of a scalar blob, used for loss outputs.
    pub const fn scalar() -> Self {
        BlobShape::new(1, 1, 1, 1)
    }

    /// Total number of elements.
    pub fn count(&self) -> usize {
        self.num * self.channels * self.height * self.width
    }

    /// Number of elements in one (n, c) spatial plane.
    pub fn spatial_dim(&self) -> usize {
        self.height * self.width
    }

    /// Number of elements per sample (`channels * height * width`).
    pub fn sample_dim(&self) -> usize {
        self.channels * self.spatial_dim()
    }

    /// Row-major offset of element `(n, c, h, w)`.
    ///
    /// For shape [2, 3, 4, 5] the strides are [60, 20, 5, 1].
    pub fn offset(&self, n: usize, c: usize, h: usize, w: usize) -> usize {
        ((n * self.channels + c) * self.height + h) * self.width + w
    }

    /// The axes as an array, outermost first.
    pub fn dims(&self) -> [usize; 4] {
        [self.num, self.channels, self.height, self.width]
    }
}

impl fmt::Display for BlobShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.num, self.channels, self.height, self.width
        )
    }
}

// Convenient From implementations
// These let you write: Blob::new((2, 3, 1, 1)) instead of BlobShape::new(2, 3, 1, 1)

impl From<(usize, usize, usize, usize)> for BlobShape {
    fn from((n, c, h, w): (usize, usize, usize, usize)) -> Self {
        BlobShape::new(n, c, h, w)
    }
}

impl From<[usize; 4]> for BlobShape {
    fn from([n, c, h, w]: [usize; 4]) -> Self {
        BlobShape::new(n, c, h, w)
    }
}
