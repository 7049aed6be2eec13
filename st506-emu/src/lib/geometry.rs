//! Drive geometry. Tracks are stored as raw MFM bit streams exactly as the
//! host would read them off a platter, so a track is much larger than the
//! sum of its sectors' data areas.

/// Size of a dirty-tracking block and of a storage chunk.
pub const BLOCK_SIZE: usize = 512;

// MFM track layout of the emulated drive.
pub const DATA_RATE: u32 = 7_500_000;       // bits per second
pub const MARK_LBYTES: usize = 50;          // gap/mark before each index pulse
pub const HEADER_LBYTES: usize = 100;       // sector ID field and gaps
pub const DATA_LBYTES: usize = 512;         // sector data field
pub const SECTORS_PER_PULSE: usize = 2;
pub const PULSES_PER_TRACK: usize = 17;

// Each logical byte is 16 MFM bits.
const MARK_BITS: usize = MARK_LBYTES * 8 * 2;
const SECTOR_BITS: usize = (HEADER_LBYTES + DATA_LBYTES) * 8 * 2;
const PULSE_BITS: usize = MARK_BITS + SECTOR_BITS * SECTORS_PER_PULSE;
const TRACK_BITS: usize = PULSE_BITS * PULSES_PER_TRACK;

/// Raw bytes in one track of the production geometry.
pub const TRACK_BYTES: usize = TRACK_BITS / 8;

/// Cylinder/head layout of an emulated drive, plus everything derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    cylinders: u32,
    heads: u32,
    track_bytes: usize,
}

impl Geometry {
    /// The drive this emulator is built for: 615 cylinders, 2 heads,
    /// 34 sectors per track.
    pub const ST506: Geometry = Geometry::new(615, 2, TRACK_BYTES);

    /// Construct a geometry. Panics (at compile time, for constants) if any
    /// dimension is zero.
    pub const fn new(cylinders: u32, heads: u32, track_bytes: usize) -> Self {
        assert!(cylinders > 0 && heads > 0 && track_bytes > 0);
        Geometry { cylinders, heads, track_bytes }
    }

    pub const fn cylinders(&self) -> u32 {
        self.cylinders
    }

    pub const fn heads(&self) -> u32 {
        self.heads
    }

    pub const fn track_bytes(&self) -> usize {
        self.track_bytes
    }

    /// Bytes of one cylinder: every head's track, head-major.
    pub const fn cylinder_bytes(&self) -> usize {
        self.track_bytes * self.heads as usize
    }

    /// Number of dirty-tracking blocks covering a cylinder. The last block
    /// may be partial.
    pub const fn cylinder_blocks(&self) -> usize {
        (self.cylinder_bytes() - 1) / BLOCK_SIZE + 1
    }

    /// Number of blocks attributed to each head when deciding whether to
    /// coalesce that head's writes.
    pub const fn track_blocks(&self) -> usize {
        self.cylinder_blocks() / self.heads as usize
    }

    /// Exact size of a valid image file.
    pub const fn image_bytes(&self) -> u64 {
        self.cylinder_bytes() as u64 * self.cylinders as u64
    }

    /// Byte offset of a cylinder within the image.
    pub const fn cylinder_offset(&self, cylinder: u32) -> u64 {
        cylinder as u64 * self.cylinder_bytes() as u64
    }

    /// Byte offset of a head's track within a cylinder buffer.
    pub const fn track_offset(&self, head: u32) -> usize {
        head as usize * self.track_bytes
    }

    pub const fn clamp_cylinder(&self, cylinder: u32) -> u32 {
        if cylinder >= self.cylinders { self.cylinders - 1 } else { cylinder }
    }

    pub const fn clamp_head(&self, head: u32) -> u32 {
        if head >= self.heads { self.heads - 1 } else { head }
    }
}

/// Sectors per track of the production geometry.
pub const SECTORS_PER_TRACK: usize = SECTORS_PER_PULSE * PULSES_PER_TRACK;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_sizes() {
        let g = Geometry::ST506;
        assert_eq!(TRACK_BYTES, 43_316);
        assert_eq!(g.cylinder_bytes(), 86_632);
        assert_eq!(g.cylinder_blocks(), 170);
        assert_eq!(g.track_blocks(), 85);
        assert_eq!(g.image_bytes(), 53_278_680);
        assert_eq!(SECTORS_PER_TRACK, 34);
    }

    #[test]
    fn test_offsets() {
        let g = Geometry::new(4, 2, 4096);
        assert_eq!(g.cylinder_offset(0), 0);
        assert_eq!(g.cylinder_offset(3), 3 * 8192);
        assert_eq!(g.track_offset(1), 4096);
        assert_eq!(g.cylinder_blocks(), 16);
        assert_eq!(g.track_blocks(), 8);
    }

    #[test]
    fn test_partial_last_block() {
        let g = Geometry::new(1, 1, 513);
        assert_eq!(g.cylinder_blocks(), 2);
    }

    #[test]
    fn test_clamping() {
        let g = Geometry::ST506;
        assert_eq!(g.clamp_cylinder(0), 0);
        assert_eq!(g.clamp_cylinder(614), 614);
        assert_eq!(g.clamp_cylinder(615), 614);
        assert_eq!(g.clamp_cylinder(u32::MAX), 614);
        assert_eq!(g.clamp_head(1), 1);
        assert_eq!(g.clamp_head(7), 1);
    }
}
