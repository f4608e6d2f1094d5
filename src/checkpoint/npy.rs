//! Minimal NPY v1.0 codec for little-endian `f64` and `i64` arrays.

use std::io::{Read, Write};

use crate::error::{Result, SolverError};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
/// Magic, two version bytes and the u16 header length.
const PREAMBLE_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum NpyData {
    F64(Vec<f64>),
    I64(Vec<i64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub data: NpyData,
}

impl NpyArray {
    pub fn f64(shape: Vec<usize>, values: Vec<f64>) -> NpyArray {
        NpyArray { shape, data: NpyData::F64(values) }
    }

    pub fn scalar_i64(value: i64) -> NpyArray {
        NpyArray { shape: vec![], data: NpyData::I64(vec![value]) }
    }

    pub fn into_f64(self) -> Result<Vec<f64>> {
        match self.data {
            NpyData::F64(v) => Ok(v),
            NpyData::I64(_) => Err(SolverError::checkpoint("expected a float64 array")),
        }
    }

    pub fn into_scalar_i64(self) -> Result<i64> {
        match self.data {
            NpyData::I64(v) if self.shape.is_empty() && v.len() == 1 => Ok(v[0]),
            _ => Err(SolverError::checkpoint("expected an int64 scalar")),
        }
    }

    fn descr(&self) -> &'static str {
        match self.data {
            NpyData::F64(_) => "<f8",
            NpyData::I64(_) => "<i8",
        }
    }

    fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({},)", n),
        dims => format!(
            "({})",
            dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    }
}

pub fn write_npy<W: Write>(w: &mut W, array: &NpyArray) -> Result<()> {
    let count = array.element_count();
    let len = match &array.data {
        NpyData::F64(v) => v.len(),
        NpyData::I64(v) => v.len(),
    };
    if count != len {
        return Err(SolverError::checkpoint(format!(
            "shape {:?} holds {} values, got {}",
            array.shape, count, len
        )));
    }

    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        array.descr(),
        shape_literal(&array.shape)
    );
    // Pad with spaces so data starts on a 64-byte boundary; header ends in '\n'.
    let unpadded = PREAMBLE_LEN + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    w.write_all(MAGIC)?;
    w.write_all(&[1, 0])?;
    w.write_all(&(header.len() as u16).to_le_bytes())?;
    w.write_all(header.as_bytes())?;
    match &array.data {
        NpyData::F64(values) => {
            for v in values {
                w.write_all(&v.to_le_bytes())?;
            }
        }
        NpyData::I64(values) => {
            for v in values {
                w.write_all(&v.to_le_bytes())?;
            }
        }
    }
    Ok(())
}

/// Value of `'key': <value>` inside the header dict, up to the terminator.
fn header_field<'a>(header: &'a str, key: &str, open: char, close: char) -> Result<&'a str> {
    let missing = || SolverError::checkpoint(format!("npy header lacks '{}'", key));
    let start = header.find(&format!("'{}':", key)).ok_or_else(missing)?;
    let rest = &header[start..];
    let open_at = rest.find(open).ok_or_else(missing)? + open.len_utf8();
    let close_at = rest[open_at..].find(close).ok_or_else(missing)? + open_at;
    Ok(&rest[open_at..close_at])
}

pub fn read_npy<R: Read>(r: &mut R) -> Result<NpyArray> {
    let mut preamble = [0u8; PREAMBLE_LEN];
    r.read_exact(&mut preamble)?;
    if &preamble[..6] != MAGIC {
        return Err(SolverError::checkpoint("not an npy array"));
    }
    if preamble[6] != 1 {
        return Err(SolverError::checkpoint(format!("unsupported npy version {}", preamble[6])));
    }
    let header_len = u16::from_le_bytes([preamble[8], preamble[9]]) as usize;
    let mut header = vec![0u8; header_len];
    r.read_exact(&mut header)?;
    let header = String::from_utf8(header)
        .map_err(|_| SolverError::checkpoint("npy header is not valid text"))?;

    if header.contains("'fortran_order': True") {
        return Err(SolverError::checkpoint("fortran-ordered arrays are not supported"));
    }
    // descr sits between the quotes after the key
    let descr = header_field(&header, "descr", ' ', ',')?.trim().trim_matches('\'');
    let shape: Vec<usize> = header_field(&header, "shape", '(', ')')?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|_| SolverError::checkpoint(format!("bad shape entry '{}'", s))))
        .collect::<Result<_>>()?;

    let count: usize = shape.iter().product();
    let mut raw = vec![0u8; count * 8];
    r.read_exact(&mut raw)?;
    let words = raw.chunks_exact(8).map(|c| {
        let mut b = [0u8; 8];
        b.copy_from_slice(c);
        b
    });
    let data = match descr {
        "<f8" => NpyData::F64(words.map(f64::from_le_bytes).collect()),
        "<i8" => NpyData::I64(words.map(i64::from_le_bytes).collect()),
        other => return Err(SolverError::checkpoint(format!("unsupported dtype '{}'", other))),
    };
    Ok(NpyArray { shape, data })
}
