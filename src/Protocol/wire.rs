// Native-endian reader and writer for the records exchanged through the queue.
// Both processes run the same binary on the same host, so no byte swapping.

use std::mem::size_of;

use crate::error::{IpcError, Result};

pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos == self.buf.len()
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(IpcError::Truncated {
                needed: n,
                offset: self.pos,
                available: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut raw = [0u8; N];
        raw.copy_from_slice(self.read_bytes(N)?);
        Ok(raw)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_ne_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_ne_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_ne_bytes(self.read_array()?))
    }

    /// A `long` that must not be negative (lengths, indices).
    pub fn read_count(&mut self, what: &'static str) -> Result<usize> {
        let value = self.read_i64()?;
        usize::try_from(value).map_err(|_| IpcError::NegativeField { what, value })
    }

    /// Length-prefixed run of `long`s.
    pub fn read_i64_run(&mut self) -> Result<Vec<i64>> {
        let len = self.read_run_len(size_of::<i64>())?;
        (0..len).map(|_| self.read_i64()).collect()
    }

    /// Length-prefixed run of doubles.
    pub fn read_f64_run(&mut self) -> Result<Vec<f64>> {
        let len = self.read_run_len(size_of::<f64>())?;
        (0..len).map(|_| self.read_f64()).collect()
    }

    /// Length-prefixed byte string.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_count("string length")?;
        Ok(String::from_utf8_lossy(self.read_bytes(len)?).into_owned())
    }

    // Checks the whole run fits before anything gets allocated for it.
    fn read_run_len(&mut self, elem: usize) -> Result<usize> {
        let len = self.read_count("array length")?;
        match len.checked_mul(elem) {
            Some(bytes) if bytes <= self.remaining() => Ok(len),
            _ => Err(IpcError::Truncated {
                needed: len.saturating_mul(elem),
                offset: self.pos,
                available: self.remaining(),
            }),
        }
    }
}

#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_i32(&mut self, value: i32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_ne_bytes());
        self
    }

    pub fn put_i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_ne_bytes());
        self
    }

    pub fn put_f64(&mut self, value: f64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_ne_bytes());
        self
    }

    pub fn put_len(&mut self, len: usize) -> &mut Self {
        self.put_i64(len as i64)
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn put_i64_run(&mut self, values: &[i64]) -> &mut Self {
        self.put_len(values.len());
        for &v in values {
            self.put_i64(v);
        }
        self
    }

    pub fn put_f64_run(&mut self, values: &[f64]) -> &mut Self {
        self.put_len(values.len());
        for &v in values {
            self.put_f64(v);
        }
        self
    }

    pub fn put_string(&mut self, text: &str) -> &mut Self {
        self.put_len(text.len());
        self.put_bytes(text.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}
