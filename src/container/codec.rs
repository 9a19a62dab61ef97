use std::io;

fn eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of container")
}

/// Little-endian decoder over a borrowed buffer.
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Decoder<'a> {
        Decoder { buf, pos: 0 }
    }

    pub fn at(buf: &'a [u8], pos: usize) -> Decoder<'a> {
        Decoder { buf, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> io::Result<&'a [u8]> {
        let slice = self.buf.get(self.pos..self.pos + n).ok_or_else(eof)?;
        self.pos += n;
        Ok(slice)
    }

    pub fn magic(&mut self, expected: &[u8; 4]) -> io::Result<()> {
        let got = self.take(4)?;
        if got != expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "bad container magic",
            ));
        }
        Ok(())
    }

    pub fn u8(&mut self) -> io::Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> io::Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> io::Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64(&mut self) -> io::Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn f32(&mut self) -> io::Result<f32> {
        Ok(f32::from_bits(self.u32()?))
    }

    /// Length-prefixed UTF-8 string (u16 length).
    pub fn string(&mut self) -> io::Result<String> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn array_u8(&mut self, n: usize) -> io::Result<Vec<u8>> {
        Ok(self.take(n)?.to_vec())
    }

    pub fn array_u16(&mut self, n: usize) -> io::Result<Vec<u16>> {
        let bytes = self.take(n.checked_mul(2).ok_or_else(eof)?)?;
        Ok(bytes
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect())
    }

    pub fn array_u32(&mut self, n: usize) -> io::Result<Vec<u32>> {
        let bytes = self.take(n.checked_mul(4).ok_or_else(eof)?)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    pub fn array_u64(&mut self, n: usize) -> io::Result<Vec<u64>> {
        let bytes = self.take(n.checked_mul(8).ok_or_else(eof)?)?;
        Ok(bytes
            .chunks_exact(8)
            .map(|b| u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect())
    }

    pub fn array_f32(&mut self, n: usize) -> io::Result<Vec<f32>> {
        Ok(self
            .array_u32(n)?
            .into_iter()
            .map(f32::from_bits)
            .collect())
    }
}

/// Little-endian encoder into an owned buffer.
#[derive(Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Encoder {
        Encoder::default()
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn magic(&mut self, magic: &[u8; 4]) {
        self.buf.extend_from_slice(magic);
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn f32(&mut self, v: f32) {
        self.u32(v.to_bits());
    }

    pub fn string(&mut self, s: &str) {
        debug_assert!(s.len() <= u16::MAX as usize);
        self.u16(s.len() as u16);
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub fn array_u8(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    pub fn array_u16(&mut self, v: &[u16]) {
        for &x in v {
            self.u16(x);
        }
    }

    pub fn array_u32(&mut self, v: &[u32]) {
        for &x in v {
            self.u32(x);
        }
    }

    pub fn array_u64(&mut self, v: &[u64]) {
        for &x in v {
            self.u64(x);
        }
    }

    pub fn array_f32(&mut self, v: &[f32]) {
        for &x in v {
            self.f32(x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_round_trip() {
        let mut enc = Encoder::new();
        enc.magic(b"PLSM");
        enc.u8(3);
        enc.u16(700);
        enc.u32(70_000);
        enc.u64(1 << 40);
        enc.f32(75.0);
        enc.string("movie");
        let buf = enc.into_inner();

        let mut dec = Decoder::new(&buf);
        dec.magic(b"PLSM").unwrap();
        assert_eq!(dec.u8().unwrap(), 3);
        assert_eq!(dec.u16().unwrap(), 700);
        assert_eq!(dec.u32().unwrap(), 70_000);
        assert_eq!(dec.u64().unwrap(), 1 << 40);
        assert_eq!(dec.f32().unwrap(), 75.0);
        assert_eq!(dec.string().unwrap(), "movie");
    }

    #[test]
    fn arrays_round_trip() {
        let mut enc = Encoder::new();
        enc.array_u16(&[1, 2, 65535]);
        enc.array_f32(&[f32::NAN, 0.5]);
        let buf = enc.into_inner();

        let mut dec = Decoder::new(&buf);
        assert_eq!(dec.array_u16(3).unwrap(), vec![1, 2, 65535]);
        let floats = dec.array_f32(2).unwrap();
        assert!(floats[0].is_nan());
        assert_eq!(floats[1], 0.5);
    }

    #[test]
    fn truncated_input_reports_eof() {
        let mut dec = Decoder::new(&[1, 2]);
        assert_eq!(
            dec.u32().unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn wrong_magic_is_invalid_data() {
        let mut dec = Decoder::new(b"XXXX....");
        assert_eq!(
            dec.magic(b"PLSM").unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );
    }
}
