/// Quality values above this are clamped before projection.
pub const MAX_QUALITY_VALUE: u8 = 100;

/// Sentinel for alignment columns with no quality datum.
pub const MISSING_QUALITY_VALUE: u8 = 255;

/// Sentinel for alignment columns with no frame-count datum.
pub const MISSING_FRAME_COUNT: u16 = u16::MAX;

/// Sentinel for alignment columns with no pulse-position datum.
pub const MISSING_PULSE_POSITION: u32 = u32::MAX;

/// Sentinel for alignment columns with no tag datum.
pub const MISSING_TAG: u8 = b'-';

/// Gap character in the archive's gapped query columns.
pub const GAP: u8 = b'-';

/// Read type recorded in the compare archive.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadType {
    Standard,
    /// De-novo consensus alignments; only the per-base quality and tag
    /// metrics may be loaded into these.
    Ccs,
}

/// Element type of a metric's alignment-space column buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ElementType {
    /// Unsigned 8-bit quality value.
    Qv,
    /// Unsigned 16-bit frame count.
    Frames,
    /// Unsigned 32-bit pulse position or frame offset.
    Pulses,
    /// 8-bit tag character.
    Tag,
    /// 32-bit float.
    Float,
}

/// A typed, dense column-indexed buffer in alignment space.
#[derive(Clone, Debug)]
pub enum ColumnValues {
    Qv(Vec<u8>),
    Frames(Vec<u16>),
    Pulses(Vec<u32>),
    Tag(Vec<u8>),
    Float(Vec<f32>),
}

impl ColumnValues {
    /// A buffer of `len` cells, every cell holding the sentinel for the
    /// element type.
    pub fn sentinel_filled(element: ElementType, len: usize) -> ColumnValues {
        match element {
            ElementType::Qv => ColumnValues::Qv(vec![MISSING_QUALITY_VALUE; len]),
            ElementType::Frames => ColumnValues::Frames(vec![MISSING_FRAME_COUNT; len]),
            ElementType::Pulses => ColumnValues::Pulses(vec![MISSING_PULSE_POSITION; len]),
            ElementType::Tag => ColumnValues::Tag(vec![MISSING_TAG; len]),
            ElementType::Float => ColumnValues::Float(vec![f32::NAN; len]),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            ColumnValues::Qv(_) => ElementType::Qv,
            ColumnValues::Frames(_) => ElementType::Frames,
            ColumnValues::Pulses(_) => ElementType::Pulses,
            ColumnValues::Tag(_) => ElementType::Tag,
            ColumnValues::Float(_) => ElementType::Float,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Qv(v) => v.len(),
            ColumnValues::Frames(v) => v.len(),
            ColumnValues::Pulses(v) => v.len(),
            ColumnValues::Tag(v) => v.len(),
            ColumnValues::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Little-endian serialization of the cell values. Floats are
    /// emitted by bit pattern, so NaN cells round-trip exactly.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            ColumnValues::Qv(v) | ColumnValues::Tag(v) => v.clone(),
            ColumnValues::Frames(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            ColumnValues::Pulses(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            ColumnValues::Float(v) => v.iter().flat_map(|x| x.to_bits().to_le_bytes()).collect(),
        }
    }

    /// Bitwise equality; unlike `==` on floats this treats NaN cells
    /// with identical bit patterns as equal.
    pub fn bits_eq(&self, other: &ColumnValues) -> bool {
        self.element_type() == other.element_type() && self.to_le_bytes() == other.to_le_bytes()
    }
}
