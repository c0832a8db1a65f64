/// Exponent used by LED drivers when no other curve is configured
pub const DEFAULT_GAMMA: f64 = 2.5;

/// 256-entry channel lookup, built once and read for every pixel of every frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GammaTable {
    table: [u8; 256],
}

impl GammaTable {
    /// Build the table for the default 2.5 exponent
    pub fn build() -> Self {
        Self::with_exponent(DEFAULT_GAMMA)
    }

    /// Build the table for `round(255 * (i / 255) ^ exponent)`.
    ///
    /// Non-finite or non-positive exponents fall back to the identity curve.
    pub fn with_exponent(exponent: f64) -> Self {
        if !exponent.is_finite() || exponent <= 0.0 {
            return Self::linear();
        }

        let mut table = [0u8; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let corrected = (i as f64 / 255.0).powf(exponent) * 255.0;
            *entry = corrected.round().clamp(0.0, 255.0) as u8;
        }

        GammaTable { table }
    }

    /// Pass-through table (no correction)
    pub fn linear() -> Self {
        let mut table = [0u8; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = i as u8;
        }
        GammaTable { table }
    }

    #[inline]
    pub fn correct(&self, value: u8) -> u8 {
        self.table[value as usize]
    }

    /// Split a packed 0xRRGGBB pixel (alpha ignored) and correct each channel
    #[inline]
    pub fn correct_rgb(&self, pixel: u32) -> [u8; 3] {
        [
            self.correct((pixel >> 16) as u8),
            self.correct((pixel >> 8) as u8),
            self.correct(pixel as u8),
        ]
    }

    pub fn as_slice(&self) -> &[u8; 256] {
        &self.table
    }
}

impl Default for GammaTable {
    fn default() -> Self {
        Self::build()
    }
}
