//! Decoder for `.hl7vector` uploads, which carry a NumPy `.npy` array.
use ndarray::{Array2, ShapeBuilder};
use crate::ecg::EcgError;
const MAGIC: &[u8; 6] = b"\x93NUMPY";
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScalarKind {
    Int,
    UInt,
    Float,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Dtype {
    kind: ScalarKind,
    size: usize,
    big_endian: bool,
}
#[derive(Clone, Debug, PartialEq, Eq)]
struct NpyHeader {
    dtype: Dtype,
    fortran_order: bool,
    shape: Vec<usize>,
}
/// Decodes an `.npy` payload into a `[rows, cols]` matrix of `f64`.
///
/// Arrays that are not two-dimensional cannot be a `[12, N]` waveform and
/// are reported as a lead-count violation.
pub fn decode_hl7vector(bytes: &[u8]) -> Result<Array2<f64>, EcgError> {
    let (header, data) = split_header(bytes)?;
    let header = parse_header(header)?;
    let [rows, cols] = header.shape[..] else {
        return Err(EcgError::LeadCount {
            actual: header.shape.first().copied().unwrap_or(0),
        });
    };
    let needed = rows
        .checked_mul(cols)
        .and_then(|count| count.checked_mul(header.dtype.size))
        .ok_or_else(|| EcgError::Vector(format!("shape {:?} overflows", header.shape)))?;
    if data.len() < needed {
        return Err(EcgError::Vector(format!(
            "payload holds {} bytes, shape {:?} needs {}",
            data.len(),
            header.shape,
            needed
        )));
    }
    let values: Vec<f64> = data[..needed]
        .chunks_exact(header.dtype.size)
        .map(|chunk| read_scalar(chunk, header.dtype))
        .collect();
    let shape = (rows, cols).set_f(header.fortran_order);
    Array2::from_shape_vec(shape, values).map_err(|e| EcgError::Vector(e.to_string()))
}
fn split_header(bytes: &[u8]) -> Result<(&str, &[u8]), EcgError> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(EcgError::Vector("missing NUMPY magic".into()));
    }
    let major = bytes[6];
    let (len, start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            let raw = bytes
                .get(8..12)
                .ok_or_else(|| EcgError::Vector("truncated header length".into()))?;
            (u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize, 12)
        }
        other => return Err(EcgError::Vector(format!("unsupported format version {other}"))),
    };
    let end = start + len;
    let raw = bytes
        .get(start..end)
        .ok_or_else(|| EcgError::Vector("truncated header".into()))?;
    let header =
        std::str::from_utf8(raw).map_err(|_| EcgError::Vector("header is not text".into()))?;
    Ok((header, &bytes[end..]))
}
fn parse_header(header: &str) -> Result<NpyHeader, EcgError> {
    let descr = dict_value(header, "descr")?;
    let descr = descr.trim_matches(|c| c == '\'' || c == '"');
    let fortran_order = match dict_value(header, "fortran_order")? {
        "True" => true,
        "False" => false,
        other => return Err(EcgError::Vector(format!("bad fortran_order {other}"))),
    };
    let shape = dict_value(header, "shape")?
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| {
            dim.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| EcgError::Vector(format!("bad shape dimension {dim}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(NpyHeader {
        dtype: parse_descr(descr)?,
        fortran_order,
        shape,
    })
}
/// Raw text of the value stored under `key` in the header's dict literal.
fn dict_value<'a>(header: &'a str, key: &str) -> Result<&'a str, EcgError> {
    let missing = || EcgError::Vector(format!("header has no '{key}' entry"));
    let needle_single = format!("'{key}'");
    let needle_double = format!("\"{key}\"");
    let at = header
        .find(&needle_single)
        .map(|i| i + needle_single.len())
        .or_else(|| header.find(&needle_double).map(|i| i + needle_double.len()))
        .ok_or_else(missing)?;
    let rest = header[at..].trim_start();
    let rest = rest.strip_prefix(':').ok_or_else(missing)?.trim_start();
    let end = if rest.starts_with('(') {
        rest.find(')').map(|i| i + 1)
    } else if let Some(quote) = rest.chars().next().filter(|c| *c == '\'' || *c == '"') {
        rest[1..].find(quote).map(|i| i + 2)
    } else {
        rest.find(|c| c == ',' || c == '}')
    };
    let end = end.ok_or_else(|| EcgError::Vector(format!("unterminated '{key}' entry")))?;
    Ok(rest[..end].trim())
}
fn parse_descr(descr: &str) -> Result<Dtype, EcgError> {
    let unsupported = || EcgError::Vector(format!("unsupported dtype {descr}"));
    let mut chars = descr.chars();
    let (big_endian, body) = match chars.next() {
        Some('<') | Some('|') | Some('=') => (false, chars.as_str()),
        Some('>') => (true, chars.as_str()),
        _ => (false, descr),
    };
    // 按字符切分, 非 ASCII 的类型码不能在字节 1 处切
    let kind_len = body.chars().next().map_or(0, char::len_utf8);
    let (kind, size) = body.split_at(kind_len);
    let size: usize = size.parse().map_err(|_| unsupported())?;
    let kind = match (kind, size) {
        ("i", 1 | 2 | 4 | 8) => ScalarKind::Int,
        ("u", 1 | 2 | 4 | 8) => ScalarKind::UInt,
        ("f", 4 | 8) => ScalarKind::Float,
        _ => return Err(unsupported()),
    };
    Ok(Dtype {
        kind,
        size,
        big_endian,
    })
}
fn read_scalar(chunk: &[u8], dtype: Dtype) -> f64 {
    let mut raw = [0u8; 8];
    raw[..dtype.size].copy_from_slice(chunk);
    if dtype.big_endian {
        raw[..dtype.size].reverse();
    }
    match (dtype.kind, dtype.size) {
        (ScalarKind::Float, 4) => f64::from(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
        (ScalarKind::Float, _) => f64::from_le_bytes(raw),
        (ScalarKind::Int, 1) => f64::from(raw[0] as i8),
        (ScalarKind::Int, 2) => f64::from(i16::from_le_bytes([raw[0], raw[1]])),
        (ScalarKind::Int, 4) => f64::from(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
        (ScalarKind::Int, _) => i64::from_le_bytes(raw) as f64,
        (ScalarKind::UInt, 1) => f64::from(raw[0]),
        (ScalarKind::UInt, 2) => f64::from(u16::from_le_bytes([raw[0], raw[1]])),
        (ScalarKind::UInt, 4) => f64::from(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
        (ScalarKind::UInt, _) => u64::from_le_bytes(raw) as f64,
    }
}
/// Little-endian `f8`, C-order `.npy` encoding, as `numpy.save` writes it.
#[cfg(test)]
pub(crate) fn encode_npy(array: &Array2<f64>) -> Vec<u8> {
    let (rows, cols) = array.dim();
    let mut header =
        format!("{{'descr': '<f8', 'fortran_order': False, 'shape': ({rows}, {cols}), }}");
    while (10 + header.len() + 1) % 64 != 0 {
        header.push(' ');
    }
    header.push('\n');
    let mut out = Vec::with_capacity(10 + header.len() + rows * cols * 8);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for value in array.iter() {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    pub(crate) fn npy_with_header(version: u8, header: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&[version, 0]);
        if version == 1 {
            out.extend_from_slice(&(header.len() as u16).to_le_bytes());
        } else {
            out.extend_from_slice(&(header.len() as u32).to_le_bytes());
        }
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(payload);
        out
    }
    #[test]
    fn decodes_numpy_save_output() {
        let array = Array2::from_shape_fn((12, 5), |(r, c)| r as f64 * 10.0 + c as f64 * 0.5);
        let decoded = decode_hl7vector(&encode_npy(&array)).unwrap();
        assert_eq!(decoded, array);
    }
    #[test]
    fn honours_fortran_order() {
        let payload: Vec<u8> = [1i16, 2, 3, 4, 5, 6]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let header = "{'descr': '<i2', 'fortran_order': True, 'shape': (2, 3), }\n";
        let decoded = decode_hl7vector(&npy_with_header(1, header, &payload)).unwrap();
        assert_eq!(decoded.row(0).to_vec(), vec![1.0, 3.0, 5.0]);
        assert_eq!(decoded.row(1).to_vec(), vec![2.0, 4.0, 6.0]);
    }
    #[test]
    fn decodes_big_endian_floats_in_version_two() {
        let payload: Vec<u8> = [0.5f32, -1.25].iter().flat_map(|v| v.to_be_bytes()).collect();
        let header = "{'descr': '>f4', 'fortran_order': False, 'shape': (1, 2), }\n";
        let decoded = decode_hl7vector(&npy_with_header(2, header, &payload)).unwrap();
        assert_eq!(decoded.row(0).to_vec(), vec![0.5, -1.25]);
    }
    #[test]
    fn non_matrix_shapes_report_lead_count() {
        let header = "{'descr': '<f8', 'fortran_order': False, 'shape': (12,), }\n";
        let err = decode_hl7vector(&npy_with_header(1, header, &[0u8; 96])).unwrap_err();
        assert!(matches!(err, EcgError::LeadCount { actual: 12 }));
    }
    #[test]
    fn rejects_truncated_payload() {
        let header = "{'descr': '<f8', 'fortran_order': False, 'shape': (12, 500), }\n";
        let err = decode_hl7vector(&npy_with_header(1, header, &[0u8; 16])).unwrap_err();
        assert!(matches!(err, EcgError::Vector(_)));
    }
    #[test]
    fn rejects_foreign_bytes_and_dtypes() {
        assert!(matches!(
            decode_hl7vector(b"I,II,III\n0,0,0\n"),
            Err(EcgError::Vector(_))
        ));
        let header = "{'descr': '<c16', 'fortran_order': False, 'shape': (1, 1), }\n";
        assert!(matches!(
            decode_hl7vector(&npy_with_header(1, header, &[0u8; 16])),
            Err(EcgError::Vector(_))
        ));
        let header = "{'descr': '|O', 'fortran_order': False, 'shape': (1, 1), }\n";
        assert!(decode_hl7vector(&npy_with_header(1, header, &[0u8; 8])).is_err());
    }
    #[test]
    fn multibyte_dtype_codes_are_rejected() {
        for descr in ["<é8", "é8", ">ü4", "<"] {
            let header = format!("{{'descr': '{descr}', 'fortran_order': False, 'shape': (1, 1), }}\n");
            assert!(
                matches!(
                    decode_hl7vector(&npy_with_header(1, &header, &[0u8; 8])),
                    Err(EcgError::Vector(_))
                ),
                "{descr}"
            );
        }
    }
    #[test]
    fn header_values_are_extracted() {
        let header = "{'descr': '<u2', 'fortran_order': False, 'shape': (12, 2500), }";
        let parsed = parse_header(header).unwrap();
        assert_eq!(parsed.shape, vec![12, 2500]);
        assert!(!parsed.fortran_order);
        assert_eq!(
            parsed.dtype,
            Dtype {
                kind: ScalarKind::UInt,
                size: 2,
                big_endian: false
            }
        );
    }
}
