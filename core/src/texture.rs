//! CPU-side texture data helpers.
//!
//! Pixel formats shared between CPU and GPU code, plus the image transforms
//! applied while loading textures: RGB to RGBA expansion, vertical flips and
//! cube-map face extraction from a cross layout.

/// Pixel format of CPU image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// 8-bit RGB.
    Rgb8,
    /// 8-bit RGBA.
    #[default]
    Rgba8,
    /// 16-bit float RGBA.
    Rgba16Float,
}

impl TextureFormat {
    /// Bytes used by one pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
            Self::Rgba16Float => 8,
        }
    }

    /// Number of color channels.
    pub const fn channels(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 | Self::Rgba16Float => 4,
        }
    }

    /// Format matching an 8-bit image with the given channel count.
    pub const fn from_channels(channels: usize) -> Option<Self> {
        match channels {
            3 => Some(Self::Rgb8),
            4 => Some(Self::Rgba8),
            _ => None,
        }
    }
}

/// Addressing mode for texture coordinates outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureWrap {
    #[default]
    Repeat,
    Clamp,
}

/// Cube-map face, in upload order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    /// All faces in layer order.
    pub const ALL: [CubeFace; 6] = [
        Self::PositiveX,
        Self::NegativeX,
        Self::PositiveY,
        Self::NegativeY,
        Self::PositiveZ,
        Self::NegativeZ,
    ];
}

/// Expand tightly packed RGB8 pixels to RGBA8 with opaque alpha.
pub fn expand_rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for pixel in rgb.chunks_exact(3) {
        rgba.extend_from_slice(pixel);
        rgba.push(u8::MAX);
    }
    rgba
}

/// Flip rows of an image in place.
pub fn flip_vertical(data: &mut [u8], width: usize, height: usize, bytes_per_pixel: usize) {
    let row = width * bytes_per_pixel;
    if row == 0 || data.len() < row * height {
        return;
    }
    for y in 0..height / 2 {
        let (top, bottom) = data.split_at_mut((height - 1 - y) * row);
        top[y * row..(y + 1) * row].swap_with_slice(&mut bottom[..row]);
    }
}

/// Orientation of a cube cross image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossLayout {
    /// Four faces wide, three tall.
    Horizontal,
    /// Three faces wide, four tall.
    Vertical,
}

impl CrossLayout {
    /// Detect the layout from image dimensions.
    pub fn detect(width: usize, height: usize) -> Option<Self> {
        if width > height && width % 4 == 0 && height % 3 == 0 && width / 4 == height / 3 {
            Some(Self::Horizontal)
        } else if height > width && width % 3 == 0 && height % 4 == 0 && width / 3 == height / 4 {
            Some(Self::Vertical)
        } else {
            None
        }
    }

    fn grid(self) -> (usize, usize) {
        match self {
            Self::Horizontal => (4, 3),
            Self::Vertical => (3, 4),
        }
    }

    // Cross cells sit in the middle column or the middle row.
    fn is_face_cell(self, cell_x: usize, cell_y: usize) -> bool {
        cell_x == 1 || cell_y == 1
    }

    // Scan-order cell index for each face in `CubeFace::ALL` order.
    fn face_cells(self) -> [usize; 6] {
        match self {
            Self::Horizontal => [3, 1, 0, 5, 2, 4],
            Self::Vertical => [3, 1, 0, 4, 2, 5],
        }
    }
}

/// Cube faces cut out of a cross image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubeFaces {
    /// Edge length of each square face in pixels.
    pub size: usize,
    /// Face pixels in `CubeFace::ALL` order.
    pub faces: [Vec<u8>; 6],
}

/// Cut the six faces out of a horizontal or vertical cross image.
///
/// Returns `None` when the dimensions do not describe a cross or `data` is
/// smaller than the image.
pub fn extract_cube_faces(
    data: &[u8],
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
) -> Option<CubeFaces> {
    let layout = CrossLayout::detect(width, height)?;
    if data.len() < width * height * bytes_per_pixel {
        return None;
    }

    let (columns, rows) = layout.grid();
    let size = width / columns;
    let face_row = size * bytes_per_pixel;

    let mut cells = Vec::with_capacity(6);
    for cell_y in 0..rows {
        for cell_x in 0..columns {
            if !layout.is_face_cell(cell_x, cell_y) {
                continue;
            }
            let mut face = Vec::with_capacity(face_row * size);
            for y in 0..size {
                let start = ((cell_y * size + y) * width + cell_x * size) * bytes_per_pixel;
                face.extend_from_slice(&data[start..start + face_row]);
            }
            cells.push(face);
        }
    }

    let order = layout.face_cells();
    let faces = order.map(|cell| std::mem::take(&mut cells[cell]));
    Some(CubeFaces { size, faces })
}
