/// Braille Unicode canvas for high-resolution terminal graphics.
/// Each character cell represents a 2x4 pixel grid (8 dots).
/// Unicode Braille patterns: U+2800 to U+28FF
pub struct BrailleCanvas {
    width: usize,  // Characters
    height: usize, // Characters
    pixels: Vec<Vec<u8>>, // Bit patterns per char
    /// Last tint stamped into each cell, if any
    tints: Vec<Vec<Option<[u8; 3]>>>,
}

impl BrailleCanvas {
    /// Create a new canvas with the given character dimensions.
    /// Effective pixel resolution: width*2 x height*4
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![vec![0u8; width]; height],
            tints: vec![vec![None; width]; height],
        }
    }

    pub fn pixel_width(&self) -> usize {
        self.width * 2
    }

    pub fn pixel_height(&self) -> usize {
        self.height * 4
    }

    /// Blank every cell
    pub fn clear(&mut self) {
        for row in &mut self.pixels {
            row.fill(0);
        }
        for row in &mut self.tints {
            row.fill(None);
        }
    }

    /// Set a pixel at the given coordinates.
    /// Braille dot layout per character:
    /// ```text
    /// (0,0) (1,0)   bits: 0x01 0x08
    /// (0,1) (1,1)   bits: 0x02 0x10
    /// (0,2) (1,2)   bits: 0x04 0x20
    /// (0,3) (1,3)   bits: 0x40 0x80
    /// ```
    pub fn set_pixel(&mut self, x: usize, y: usize) {
        let cx = x / 2;
        let cy = y / 4;

        if cx >= self.width || cy >= self.height {
            return;
        }

        let bit = match (x % 2, y % 4) {
            (0, 0) => 0x01,
            (1, 0) => 0x08,
            (0, 1) => 0x02,
            (1, 1) => 0x10,
            (0, 2) => 0x04,
            (1, 2) => 0x20,
            (0, 3) => 0x40,
            (1, 3) => 0x80,
            _ => 0,
        };

        self.pixels[cy][cx] |= bit;
    }

    /// Set a pixel using signed coordinates (ignores negative values)
    pub fn set_pixel_signed(&mut self, x: i32, y: i32) {
        if x >= 0 && y >= 0 {
            self.set_pixel(x as usize, y as usize);
        }
    }

    /// Set a pixel and tint its whole cell. Cells hold one color, so the
    /// last tint stamped wins.
    pub fn set_pixel_tinted(&mut self, x: i32, y: i32, tint: [u8; 3]) {
        if x < 0 || y < 0 {
            return;
        }
        let (cx, cy) = (x as usize / 2, y as usize / 4);
        if cx >= self.width || cy >= self.height {
            return;
        }
        self.set_pixel(x as usize, y as usize);
        self.tints[cy][cx] = Some(tint);
    }

    /// Character and tint of a cell, `None` when blank or out of range
    pub fn cell(&self, cx: usize, cy: usize) -> Option<(char, Option<[u8; 3]>)> {
        let bits = *self.pixels.get(cy)?.get(cx)?;
        if bits == 0 {
            return None;
        }
        let ch = char::from_u32(0x2800 + bits as u32).unwrap_or(' ');
        Some((ch, self.tints[cy][cx]))
    }

    /// Convert the canvas to a string of Braille characters
    #[cfg(test)]
    pub fn to_string(&self) -> String {
        self.rows().collect::<Vec<_>>().join("\n")
    }

    /// Get a specific row as a string (for line-by-line rendering)
    pub fn row_to_string(&self, row: usize) -> String {
        if row >= self.height {
            return String::new();
        }
        self.pixels[row]
            .iter()
            .map(|&b| char::from_u32(0x2800 + b as u32).unwrap_or(' '))
            .collect()
    }

    /// Get all rows as an iterator of strings
    pub fn rows(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.height).map(|i| self.row_to_string(i))
    }
}
