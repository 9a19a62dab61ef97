use crate::core::error::{LoadError, Result};
use crate::core::model::GAP;

/// Maps each ungapped base of an aligned query to its column in the
/// gapped alignment. `map.len()` equals the ungapped length, and every
/// value is less than `aligned.len()`.
pub fn base_to_alignment_map(aligned: &[u8]) -> Vec<usize> {
    let mut map = Vec::with_capacity(aligned.len());
    for (column, &ch) in aligned.iter().enumerate() {
        if ch != GAP {
            map.push(column);
        }
    }
    map
}

/// The aligned query with gap columns removed.
pub fn remove_gaps(aligned: &[u8]) -> Vec<u8> {
    aligned.iter().copied().filter(|&ch| ch != GAP).collect()
}

/// Maps each base of a read to the pulse that produced it:
/// `map[i] = pulse_origin + pulse_index[i]`.
///
/// `pulse_index` is the read's slice of the per-base pulse-index field;
/// `pulse_origin` is the read's start in pulse space (zero when pulse
/// fields are already read-local). Every entry is checked against
/// `pulses_len`.
pub fn base_to_pulse_map(
    pulse_origin: usize,
    pulse_index: &[u32],
    pulses_len: usize,
) -> Result<Vec<usize>> {
    let mut map = Vec::with_capacity(pulse_index.len());
    for &pi in pulse_index {
        let index = pulse_origin + pi as usize;
        if index >= pulses_len {
            return Err(LoadError::PulseIndexOutOfRange {
                index,
                len: pulses_len,
            });
        }
        map.push(index);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gapped_alignment_maps_around_gaps() {
        let map = base_to_alignment_map(b"AC-GT");
        assert_eq!(map, vec![0, 1, 3, 4]);
        assert_eq!(remove_gaps(b"AC-GT"), b"ACGT");
    }

    #[test]
    fn ungapped_alignment_maps_identically() {
        let map = base_to_alignment_map(b"ACGT");
        assert_eq!(map, vec![0, 1, 2, 3]);
    }

    #[test]
    fn pulse_map_offsets_by_origin() {
        let map = base_to_pulse_map(10, &[0, 2, 3], 20).unwrap();
        assert_eq!(map, vec![10, 12, 13]);
    }

    #[test]
    fn pulse_map_rejects_out_of_range_indices() {
        let err = base_to_pulse_map(10, &[0, 2, 12], 20).unwrap_err();
        assert!(matches!(
            err,
            LoadError::PulseIndexOutOfRange { index: 22, len: 20 }
        ));
    }
}
