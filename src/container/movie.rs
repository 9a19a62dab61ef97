use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use memmap2::Mmap;

use crate::container::codec::{Decoder, Encoder};
use crate::core::error::{LoadError, Result};
use crate::core::source::{
    BaseField, FieldValues, MemMovie, MovieSource, PulseField, ReadRecord, SourceField,
};

pub const MOVIE_MAGIC: [u8; 4] = *b"PLSM";
const MOVIE_VERSION: u8 = 1;

const FIELD_ORDER: [SourceField; 16] = [
    SourceField::Base(BaseField::Basecall),
    SourceField::Base(BaseField::QualityValue),
    SourceField::Base(BaseField::InsertionQV),
    SourceField::Base(BaseField::MergeQV),
    SourceField::Base(BaseField::DeletionQV),
    SourceField::Base(BaseField::SubstitutionQV),
    SourceField::Base(BaseField::DeletionTag),
    SourceField::Base(BaseField::SubstitutionTag),
    SourceField::Base(BaseField::PreBaseFrames),
    SourceField::Base(BaseField::WidthInFrames),
    SourceField::Base(BaseField::PulseIndex),
    SourceField::Pulse(PulseField::StartFrame),
    SourceField::Pulse(PulseField::WidthInFrames),
    SourceField::Pulse(PulseField::MidSignal),
    SourceField::Pulse(PulseField::MeanSignal),
    SourceField::Pulse(PulseField::ClassifierQV),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Scalar {
    U8,
    U16,
    U32,
    F32,
}

impl Scalar {
    fn code(self) -> u8 {
        match self {
            Scalar::U8 => 0,
            Scalar::U16 => 1,
            Scalar::U32 => 2,
            Scalar::F32 => 3,
        }
    }

    fn size(self) -> usize {
        match self {
            Scalar::U8 => 1,
            Scalar::U16 => 2,
            Scalar::U32 | Scalar::F32 => 4,
        }
    }
}

fn scalar_of(field: SourceField) -> Scalar {
    match field {
        SourceField::Base(BaseField::PreBaseFrames)
        | SourceField::Base(BaseField::WidthInFrames)
        | SourceField::Pulse(PulseField::WidthInFrames)
        | SourceField::Pulse(PulseField::MidSignal)
        | SourceField::Pulse(PulseField::MeanSignal) => Scalar::U16,
        SourceField::Base(BaseField::PulseIndex) | SourceField::Pulse(PulseField::StartFrame) => {
            Scalar::U32
        }
        SourceField::Pulse(PulseField::ClassifierQV) => Scalar::F32,
        SourceField::Base(_) => Scalar::U8,
    }
}

fn field_from_code(code: u8) -> Option<SourceField> {
    FIELD_ORDER.get(code as usize).copied()
}

enum MovieBytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl MovieBytes {
    fn bytes(&self) -> &[u8] {
        match self {
            MovieBytes::Mapped(map) => map,
            MovieBytes::Owned(buf) => buf,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct DirEntry {
    field: SourceField,
    count: usize,
    offset: usize,
}

/// A movie file: memory-mapped header plus a directory of raw
/// little-endian field arrays, decoded on demand so that the writer
/// loop controls which fields are resident.
pub struct FileMovie {
    data: MovieBytes,
    name: String,
    frame_rate: f32,
    when_started: Option<String>,
    hole_numbers: Vec<u32>,
    read_starts: Vec<u64>,
    pulse_starts: Option<Vec<u64>>,
    directory: Vec<DirEntry>,
}

impl FileMovie {
    /// Opens a movie file, inflating it first when it is gzip
    /// compressed.
    pub fn open(path: &Path) -> Result<FileMovie> {
        let file = File::open(path)?;
        // SAFETY: read-only file mapping.
        let map = unsafe { Mmap::map(&file) }?;
        let data = if map.len() >= 2 && map[0] == 0x1f && map[1] == 0x8b {
            let mut inflated = Vec::new();
            MultiGzDecoder::new(&map[..]).read_to_end(&mut inflated)?;
            MovieBytes::Owned(inflated)
        } else {
            MovieBytes::Mapped(map)
        };
        let (name, frame_rate, when_started, hole_numbers, read_starts, pulse_starts, directory) =
            parse_header(data.bytes())?;
        Ok(FileMovie {
            data,
            name,
            frame_rate,
            when_started,
            hole_numbers,
            read_starts,
            pulse_starts,
            directory,
        })
    }

    fn entry(&self, field: SourceField) -> Option<&DirEntry> {
        self.directory.iter().find(|e| e.field == field)
    }

    fn decode(&self, entry: &DirEntry, start: usize, count: usize) -> Result<FieldValues> {
        let scalar = scalar_of(entry.field);
        let offset = entry.offset + start * scalar.size();
        let mut dec = Decoder::at(self.data.bytes(), offset);
        let values = match scalar {
            Scalar::U8 => FieldValues::U8(dec.array_u8(count)?),
            Scalar::U16 => FieldValues::U16(dec.array_u16(count)?),
            Scalar::U32 => FieldValues::U32(dec.array_u32(count)?),
            Scalar::F32 => FieldValues::F32(dec.array_f32(count)?),
        };
        Ok(values)
    }

    fn base_span(&self, read_index: usize) -> (usize, usize) {
        let start = self.read_starts[read_index] as usize;
        let end = self.read_starts[read_index + 1] as usize;
        (start, end - start)
    }

    fn pulse_span(&self, read_index: usize) -> Option<(usize, usize)> {
        let starts = self.pulse_starts.as_ref()?;
        let start = starts[read_index] as usize;
        let end = starts[read_index + 1] as usize;
        Some((start, end - start))
    }
}

type Header = (
    String,
    f32,
    Option<String>,
    Vec<u32>,
    Vec<u64>,
    Option<Vec<u64>>,
    Vec<DirEntry>,
);

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

/// Read slices must be contiguous and ordered: start positions begin at
/// zero and never decrease.
fn check_starts(starts: &[u64]) -> Result<()> {
    let ordered = starts.first() == Some(&0) && starts.windows(2).all(|w| w[0] <= w[1]);
    if !ordered {
        return Err(LoadError::Io(invalid("start positions are not ordered")));
    }
    Ok(())
}

fn parse_header(buf: &[u8]) -> Result<Header> {
    let mut dec = Decoder::new(buf);
    dec.magic(&MOVIE_MAGIC)?;
    if dec.u8()? != MOVIE_VERSION {
        return Err(LoadError::Io(invalid("unsupported movie container version")));
    }
    let name = dec.string()?;
    let frame_rate = dec.f32()?;
    let when_started = if dec.u8()? != 0 {
        Some(dec.string()?)
    } else {
        None
    };
    let num_reads = dec.u32()? as usize;
    let hole_numbers = dec.array_u32(num_reads)?;
    let read_starts = dec.array_u64(num_reads + 1)?;
    check_starts(&read_starts)?;
    let pulse_starts = if dec.u8()? != 0 {
        let starts = dec.array_u64(num_reads + 1)?;
        check_starts(&starts)?;
        Some(starts)
    } else {
        None
    };
    let total_bases = read_starts.last().copied().unwrap_or(0) as usize;
    let total_pulses = pulse_starts
        .as_ref()
        .and_then(|p| p.last().copied())
        .unwrap_or(0) as usize;

    let field_count = dec.u8()? as usize;
    let mut directory = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        let field = field_from_code(dec.u8()?)
            .ok_or_else(|| LoadError::Io(invalid("unknown field in movie directory")))?;
        let scalar = dec.u8()?;
        if scalar != scalar_of(field).code() {
            return Err(LoadError::Io(invalid("field element type mismatch")));
        }
        let count = dec.u64()? as usize;
        let offset = dec.u64()? as usize;
        let expected = match field {
            SourceField::Base(_) => total_bases,
            SourceField::Pulse(_) => total_pulses,
        };
        if count != expected {
            return Err(LoadError::Io(invalid("field length does not match layout")));
        }
        let end = count
            .checked_mul(scalar_of(field).size())
            .and_then(|n| offset.checked_add(n))
            .ok_or_else(|| LoadError::Io(invalid("field range overflows")))?;
        if end > buf.len() {
            return Err(LoadError::Io(invalid("field range exceeds file size")));
        }
        directory.push(DirEntry {
            field,
            count,
            offset,
        });
    }
    Ok((
        name,
        frame_rate,
        when_started,
        hole_numbers,
        read_starts,
        pulse_starts,
        directory,
    ))
}

impl MovieSource for FileMovie {
    fn movie_name(&self) -> &str {
        &self.name
    }

    fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    fn when_started(&self) -> Option<&str> {
        self.when_started.as_deref()
    }

    fn hole_numbers(&self) -> &[u32] {
        &self.hole_numbers
    }

    fn read_starts(&self) -> &[u64] {
        &self.read_starts
    }

    fn pulse_starts(&self) -> Option<&[u64]> {
        self.pulse_starts.as_deref()
    }

    fn has_field(&self, field: SourceField) -> bool {
        self.entry(field).is_some()
    }

    fn load_field(&self, field: SourceField) -> Result<FieldValues> {
        let entry = self
            .entry(field)
            .ok_or(LoadError::MissingField(field.name()))?;
        self.decode(entry, 0, entry.count)
    }

    fn read_record(&self, read_index: usize) -> Result<ReadRecord> {
        let mut record = ReadRecord::default();
        let (base_start, base_len) = self.base_span(read_index);
        let pulse_span = self.pulse_span(read_index);
        for entry in &self.directory {
            let (start, len) = match entry.field {
                SourceField::Base(_) => (base_start, base_len),
                SourceField::Pulse(_) => match pulse_span {
                    Some(span) => span,
                    None => continue,
                },
            };
            let values = self.decode(entry, start, len)?;
            match (entry.field, values) {
                (SourceField::Base(BaseField::Basecall), FieldValues::U8(v)) => {
                    record.bases = Some(v)
                }
                (SourceField::Base(BaseField::QualityValue), FieldValues::U8(v)) => {
                    record.quality_value = Some(v)
                }
                (SourceField::Base(BaseField::InsertionQV), FieldValues::U8(v)) => {
                    record.insertion_qv = Some(v)
                }
                (SourceField::Base(BaseField::MergeQV), FieldValues::U8(v)) => {
                    record.merge_qv = Some(v)
                }
                (SourceField::Base(BaseField::DeletionQV), FieldValues::U8(v)) => {
                    record.deletion_qv = Some(v)
                }
                (SourceField::Base(BaseField::SubstitutionQV), FieldValues::U8(v)) => {
                    record.substitution_qv = Some(v)
                }
                (SourceField::Base(BaseField::DeletionTag), FieldValues::U8(v)) => {
                    record.deletion_tag = Some(v)
                }
                (SourceField::Base(BaseField::SubstitutionTag), FieldValues::U8(v)) => {
                    record.substitution_tag = Some(v)
                }
                (SourceField::Base(BaseField::PreBaseFrames), FieldValues::U16(v)) => {
                    record.pre_base_frames = Some(v)
                }
                (SourceField::Base(BaseField::WidthInFrames), FieldValues::U16(v)) => {
                    record.bas_width_in_frames = Some(v)
                }
                (SourceField::Base(BaseField::PulseIndex), FieldValues::U32(v)) => {
                    record.pulse_index = Some(v)
                }
                (SourceField::Pulse(PulseField::StartFrame), FieldValues::U32(v)) => {
                    record.pls_start_frame = Some(v)
                }
                (SourceField::Pulse(PulseField::WidthInFrames), FieldValues::U16(v)) => {
                    record.pls_width_in_frames = Some(v)
                }
                (SourceField::Pulse(PulseField::MidSignal), FieldValues::U16(v)) => {
                    record.mid_signal = Some(v)
                }
                (SourceField::Pulse(PulseField::MeanSignal), FieldValues::U16(v)) => {
                    record.mean_signal = Some(v)
                }
                (SourceField::Pulse(PulseField::ClassifierQV), FieldValues::F32(v)) => {
                    record.classifier_qv = Some(v)
                }
                _ => return Err(LoadError::ElementTypeMismatch(entry.field.name())),
            }
        }
        Ok(record)
    }
}

/// Serializes an in-memory movie to the flat container layout.
pub fn write(path: &Path, movie: &MemMovie) -> Result<()> {
    let present: Vec<(u8, SourceField)> = FIELD_ORDER
        .into_iter()
        .enumerate()
        .filter(|&(_, f)| movie.has_field(f))
        .map(|(code, f)| (code as u8, f))
        .collect();

    let num_reads = movie.hole_numbers.len();
    let mut header_len = 4 + 1; // magic + version
    header_len += 2 + movie.name.len();
    header_len += 4; // frame rate
    header_len += 1 + movie.when_started.as_ref().map_or(0, |s| 2 + s.len());
    header_len += 4 + 4 * num_reads; // read count + hole numbers
    header_len += 8 * (num_reads + 1); // read starts
    header_len += 1 + movie.pulse_starts.as_ref().map_or(0, |_| 8 * (num_reads + 1));
    header_len += 1 + 18 * present.len(); // directory

    let mut enc = Encoder::new();
    enc.magic(&MOVIE_MAGIC);
    enc.u8(MOVIE_VERSION);
    enc.string(&movie.name);
    enc.f32(movie.frame_rate);
    match &movie.when_started {
        Some(value) => {
            enc.u8(1);
            enc.string(value);
        }
        None => enc.u8(0),
    }
    enc.u32(num_reads as u32);
    enc.array_u32(&movie.hole_numbers);
    enc.array_u64(&movie.read_starts);
    match &movie.pulse_starts {
        Some(starts) => {
            enc.u8(1);
            enc.array_u64(starts);
        }
        None => enc.u8(0),
    }

    enc.u8(present.len() as u8);
    let mut offset = header_len;
    for &(code, field) in &present {
        let count = match field {
            SourceField::Base(_) => movie.total_bases() as usize,
            SourceField::Pulse(_) => movie.total_pulses() as usize,
        };
        enc.u8(code);
        enc.u8(scalar_of(field).code());
        enc.u64(count as u64);
        enc.u64(offset as u64);
        offset += count * scalar_of(field).size();
    }
    debug_assert_eq!(enc.position(), header_len);

    for &(_, field) in &present {
        match movie.load_field(field)? {
            FieldValues::U8(v) => enc.array_u8(&v),
            FieldValues::U16(v) => enc.array_u16(&v),
            FieldValues::U32(v) => enc.array_u32(&v),
            FieldValues::F32(v) => enc.array_f32(&v),
        }
    }

    std::fs::write(path, enc.into_inner())?;
    Ok(())
}
