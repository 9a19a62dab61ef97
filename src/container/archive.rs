use std::io;
use std::path::Path;

use crate::container::codec::{Decoder, Encoder};
use crate::core::archive::{AlignmentRecord, CompareArchive, MemArchive, MovieInfo, ReadGroup, RefGroup};
use crate::core::error::{LoadError, Result};
use crate::core::metrics::Metric;
use crate::core::model::{ColumnValues, ElementType, ReadType};

pub const ARCHIVE_MAGIC: [u8; 4] = *b"PLSC";
const ARCHIVE_VERSION: u8 = 1;

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

fn decode_columns(dec: &mut Decoder<'_>, element: ElementType, len: usize) -> Result<ColumnValues> {
    let values = match element {
        ElementType::Qv => ColumnValues::Qv(dec.array_u8(len)?),
        ElementType::Tag => ColumnValues::Tag(dec.array_u8(len)?),
        ElementType::Frames => ColumnValues::Frames(dec.array_u16(len)?),
        ElementType::Pulses => ColumnValues::Pulses(dec.array_u32(len)?),
        ElementType::Float => ColumnValues::Float(dec.array_f32(len)?),
    };
    Ok(values)
}

fn encode_columns(enc: &mut Encoder, values: &ColumnValues) {
    match values {
        ColumnValues::Qv(v) | ColumnValues::Tag(v) => enc.array_u8(v),
        ColumnValues::Frames(v) => enc.array_u16(v),
        ColumnValues::Pulses(v) => enc.array_u32(v),
        ColumnValues::Float(v) => enc.array_f32(v),
    }
}

/// Reads a compare archive into memory.
pub fn read(path: &Path) -> Result<MemArchive> {
    let buf = std::fs::read(path)?;
    let mut dec = Decoder::new(&buf);
    dec.magic(&ARCHIVE_MAGIC)?;
    if dec.u8()? != ARCHIVE_VERSION {
        return Err(LoadError::Io(invalid(
            "unsupported archive container version",
        )));
    }
    let read_type = match dec.u8()? {
        0 => ReadType::Standard,
        1 => ReadType::Ccs,
        _ => return Err(LoadError::Io(invalid("unknown read type"))),
    };

    let movie_count = dec.u16()? as usize;
    let mut movies = Vec::with_capacity(movie_count);
    for _ in 0..movie_count {
        let id = dec.u32()?;
        let name = dec.string()?;
        let frame_rate = if dec.u8()? != 0 { Some(dec.f32()?) } else { None };
        let when_started = if dec.u8()? != 0 {
            Some(dec.string()?)
        } else {
            None
        };
        movies.push(MovieInfo {
            id,
            name,
            frame_rate,
            when_started,
        });
    }

    let ref_group_count = dec.u16()? as usize;
    let mut ref_groups = Vec::with_capacity(ref_group_count);
    for _ in 0..ref_group_count {
        let id = dec.u32()?;
        let read_group_count = dec.u16()? as usize;
        let mut read_groups = Vec::with_capacity(read_group_count);
        for _ in 0..read_group_count {
            let aln_group_id = dec.u32()?;
            let name = dec.string()?;
            let column_len = dec.u64()? as usize;
            let columns = dec.array_u8(column_len)?;
            let metric_count = dec.u8()? as usize;
            let mut metrics = std::collections::BTreeMap::new();
            for _ in 0..metric_count {
                let metric_name = dec.string()?;
                let metric = Metric::parse(&metric_name)
                    .ok_or_else(|| LoadError::Io(invalid("unknown metric in archive")))?;
                let element = metric
                    .element_type()
                    .ok_or_else(|| LoadError::Io(invalid("metric has no column type")))?;
                metrics.insert(metric, decode_columns(&mut dec, element, column_len)?);
            }
            read_groups.push(ReadGroup {
                aln_group_id,
                name,
                columns,
                metrics,
            });
        }
        ref_groups.push(RefGroup { id, read_groups });
    }

    let alignment_count = dec.u32()? as usize;
    let mut alignments = Vec::with_capacity(alignment_count);
    for _ in 0..alignment_count {
        alignments.push(AlignmentRecord {
            alignment_id: dec.u32()?,
            movie_id: dec.u32()?,
            ref_group_id: dec.u32()?,
            aln_group_id: dec.u32()?,
            hole_number: dec.u32()?,
            offset_begin: dec.u64()? as usize,
            offset_end: dec.u64()? as usize,
            query_start: dec.u64()? as usize,
            query_end: dec.u64()? as usize,
        });
    }

    Ok(MemArchive::from_parts(
        read_type, movies, ref_groups, alignments,
    ))
}

/// Writes a compare archive back to disk. Serialization is
/// deterministic, so reloading and rewriting an unchanged archive
/// reproduces the same bytes.
pub fn write(path: &Path, archive: &MemArchive) -> Result<()> {
    let mut enc = Encoder::new();
    enc.magic(&ARCHIVE_MAGIC);
    enc.u8(ARCHIVE_VERSION);
    enc.u8(match archive.read_type() {
        ReadType::Standard => 0,
        ReadType::Ccs => 1,
    });

    enc.u16(archive.movies().len() as u16);
    for movie in archive.movies() {
        enc.u32(movie.id);
        enc.string(&movie.name);
        match movie.frame_rate {
            Some(rate) => {
                enc.u8(1);
                enc.f32(rate);
            }
            None => enc.u8(0),
        }
        match &movie.when_started {
            Some(value) => {
                enc.u8(1);
                enc.string(value);
            }
            None => enc.u8(0),
        }
    }

    enc.u16(archive.ref_groups().len() as u16);
    for group in archive.ref_groups() {
        enc.u32(group.id);
        enc.u16(group.read_groups.len() as u16);
        for rg in &group.read_groups {
            enc.u32(rg.aln_group_id);
            enc.string(&rg.name);
            enc.u64(rg.columns.len() as u64);
            enc.array_u8(&rg.columns);
            enc.u8(rg.metrics.len() as u8);
            for (metric, values) in &rg.metrics {
                enc.string(metric.name());
                encode_columns(&mut enc, values);
            }
        }
    }

    enc.u32(archive.alignments().len() as u32);
    for record in archive.alignments() {
        enc.u32(record.alignment_id);
        enc.u32(record.movie_id);
        enc.u32(record.ref_group_id);
        enc.u32(record.aln_group_id);
        enc.u32(record.hole_number);
        enc.u64(record.offset_begin as u64);
        enc.u64(record.offset_end as u64);
        enc.u64(record.query_start as u64);
        enc.u64(record.query_end as u64);
    }

    std::fs::write(path, enc.into_inner())?;
    Ok(())
}
