//! PNG: signature followed by length/type/data/CRC chunks, all big-endian.

use crate::cursor::{Cursor, DecodeError, Endianness, ReadKind};
use crate::decoder::Decoder;
use crate::format::Value;

pub const NAME: &str = "png";
pub const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

const IEND: [u8; 4] = *b"IEND";

pub struct PngDecoder;

impl Decoder for PngDecoder {
    fn name(&self) -> &str { NAME }

    fn can_detect(&self) -> bool { true }

    fn detect(&self, cursor: &mut Cursor<'_>) -> Result<bool, DecodeError> {
        Ok(cursor.len() >= SIGNATURE.len() as u64 && cursor.read_bytes(8)? == SIGNATURE)
    }

    fn decode(&self, cursor: &mut Cursor<'_>) -> Result<(), DecodeError> {
        cursor.set_endianness(Endianness::Big);
        cursor.read_marked(ReadKind::Bytes(8), "PNG signature")?;
        while !cursor.is_eof() {
            if decode_chunk(cursor)? == IEND {
                break;
            }
        }
        let rest = cursor.remaining();
        if rest > 0 {
            cursor.take(rest)?.mark("trailing data");
        }
        Ok(())
    }
}

/// Decode one chunk and return its type.
fn decode_chunk(c: &mut Cursor<'_>) -> Result<[u8; 4], DecodeError> {
    let start = c.position() as i64;
    let len = c.read_marked(ReadKind::U32, "chunk length: %u")?;
    let kind = c.read_marked(ReadKind::Bytes(4), "chunk type: %s")?;

    let mut data = c.take(len.as_u64().unwrap_or_default())?;
    match kind.as_bytes().unwrap_or_default() {
        b"IHDR" => decode_ihdr(&mut data)?,
        b"tEXt" => decode_text(&mut data)?,
        _ => {
            data.mark("chunk data");
        }
    }

    // The CRC covers the type and the data, not the length.
    let expected = crc32fast::hash(c.subrange(start + 5, c.position() as i64).as_bytes());
    c.read_filtered(ReadKind::U32, "CRC: %#010x (%s)", |v| {
        let status = if v.as_u64() == Some(expected as u64) {
            "ok".to_owned()
        } else {
            format!("expected {expected:#010x}")
        };
        vec![v.clone(), Value::from(status)]
    })?;

    let id = kind.as_bytes().and_then(|b| b.try_into().ok()).unwrap_or_default();
    c.subrange(start + 1, c.position() as i64).mark_fmt("%s chunk", &[kind])?;
    Ok(id)
}

fn decode_ihdr(c: &mut Cursor<'_>) -> Result<(), DecodeError> {
    c.read_marked(ReadKind::U32, "width: %u")?;
    c.read_marked(ReadKind::U32, "height: %u")?;
    c.read_marked(ReadKind::U8, "bit depth: %u")?;
    c.read_filtered(ReadKind::U8, "color type: %s", |v| {
        let name = match v.as_u64() {
            Some(0) => "grayscale",
            Some(2) => "truecolor",
            Some(3) => "indexed",
            Some(4) => "grayscale with alpha",
            Some(6) => "truecolor with alpha",
            _ => return Vec::new(),
        };
        vec![Value::from(name)]
    })?;
    c.read_marked(ReadKind::U8, "compression method: %u")?;
    c.read_marked(ReadKind::U8, "filter method: %u")?;
    c.read_filtered(ReadKind::U8, "interlace method: %s", |v| match v.as_u64() {
        Some(0) => vec![Value::from("none")],
        Some(1) => vec![Value::from("Adam7")],
        _ => Vec::new(),
    })?;
    Ok(())
}

fn decode_text(c: &mut Cursor<'_>) -> Result<(), DecodeError> {
    c.read_marked(ReadKind::CString, "keyword: %s")?;
    let rest = c.remaining();
    if rest > 0 {
        c.read_marked(ReadKind::Bytes(rest), "text: %s")?;
    }
    Ok(())
}
