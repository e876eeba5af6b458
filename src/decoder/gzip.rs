//! gzip members (RFC 1952): fixed header, optional fields selected by the
//! flag byte, the deflate stream and the CRC32/ISIZE trailer.

use chrono::{DateTime, Utc};

use crate::cursor::{Cursor, DecodeError, Endianness, ReadKind};
use crate::decoder::Decoder;
use crate::format::Value;

pub const NAME: &str = "gzip";
pub const MAGIC: [u8; 2] = [0x1f, 0x8b];
const METHOD_DEFLATE: u8 = 8;

const FHCRC:    u64 = 1 << 1;
const FEXTRA:   u64 = 1 << 2;
const FNAME:    u64 = 1 << 3;
const FCOMMENT: u64 = 1 << 4;

const TRAILER_LEN: u64 = 8;

pub struct GzipDecoder;

impl Decoder for GzipDecoder {
    fn name(&self) -> &str { NAME }

    fn can_detect(&self) -> bool { true }

    fn detect(&self, cursor: &mut Cursor<'_>) -> Result<bool, DecodeError> {
        if cursor.len() < 3 {
            return Ok(false);
        }
        Ok(cursor.read_bytes(2)? == MAGIC && cursor.u8()? == METHOD_DEFLATE)
    }

    fn decode(&self, c: &mut Cursor<'_>) -> Result<(), DecodeError> {
        c.set_endianness(Endianness::Little);
        c.read_marked(ReadKind::Bytes(2), "gzip magic")?;
        c.read_filtered(ReadKind::U8, "compression method: %s", |v| {
            match v.as_u64() {
                Some(m) if m == METHOD_DEFLATE as u64 => vec![Value::from("deflate")],
                _ => Vec::new(),
            }
        })?;
        let flags = c.read_marked(ReadKind::U8, "flags: %#04x")?.as_u64().unwrap_or_default();
        c.read_filtered(ReadKind::U32, "modification time: %s", |v| {
            vec![Value::from(mtime(v.as_u64().unwrap_or_default()))]
        })?;
        c.read_marked(ReadKind::U8, "extra flags: %u")?;
        c.read_filtered(ReadKind::U8, "operating system: %s", |v| {
            vec![Value::from(operating_system(v.as_u64().unwrap_or_default()))]
        })?;

        if flags & FEXTRA != 0 {
            let xlen = c.read_marked(ReadKind::U16, "extra field length: %u")?;
            c.take(xlen.as_u64().unwrap_or_default())?.mark("extra field");
        }
        if flags & FNAME != 0 {
            c.read_marked(ReadKind::CString, "file name: %s")?;
        }
        if flags & FCOMMENT != 0 {
            c.read_marked(ReadKind::CString, "comment: %s")?;
        }
        if flags & FHCRC != 0 {
            c.read_marked(ReadKind::U16, "header CRC16: %#06x")?;
        }

        let rest = c.remaining();
        if rest < TRAILER_LEN {
            if rest > 0 {
                c.take(rest)?.mark("truncated member");
            }
            return Ok(());
        }
        if rest > TRAILER_LEN {
            c.take(rest - TRAILER_LEN)?.mark("deflate stream");
        }
        c.read_marked(ReadKind::U32, "CRC32: %#010x")?;
        c.read_marked(ReadKind::U32, "uncompressed size: %u (mod 2^32)")?;
        Ok(())
    }
}

fn mtime(secs: u64) -> String {
    if secs == 0 {
        return "not set".to_owned();
    }
    DateTime::<Utc>::from_timestamp(secs as i64, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn operating_system(id: u64) -> String {
    let name = match id {
        0  => "FAT",
        1  => "Amiga",
        2  => "VMS",
        3  => "Unix",
        4  => "VM/CMS",
        5  => "Atari TOS",
        6  => "HPFS",
        7  => "Macintosh",
        8  => "Z-System",
        9  => "CP/M",
        10 => "TOPS-20",
        11 => "NTFS",
        12 => "QDOS",
        13 => "Acorn RISCOS",
        255 => "unknown",
        _ => return format!("reserved ({id})"),
    };
    name.to_owned()
}
