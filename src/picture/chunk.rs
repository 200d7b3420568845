//! Chunked picture serialization used by the thumbnail cache.
//!
//! A chunk is `[id: u32 LE][len: u32 LE][payload]`. A picture is one `PICT`
//! chunk whose payload holds a `PROP` chunk (width, height, format tag) and a
//! `PIXL` chunk with the raw RGBA8 bytes. Unknown chunks are skipped.

use super::Picture;
use crate::error::{Error, Result};

const fn fourcc(tag: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*tag)
}

const ID_PICT: u32 = fourcc(b"PICT");
const ID_PROP: u32 = fourcc(b"PROP");
const ID_PIXL: u32 = fourcc(b"PIXL");

/// Pixel layout tag stored in `PROP`. Only RGBA8 is written.
const FORMAT_RGBA8: u32 = 1;

const HEADER_LEN: usize = 8;

fn write_chunk(out: &mut Vec<u8>, id: u32, payload: &[u8]) {
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
}

/// Iterates `(id, payload)` pairs over a chunk sequence.
struct Chunks<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<(u32, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }
        if self.data.len() < HEADER_LEN {
            self.data = &[];
            return Some(Err(Error::Cache("truncated chunk header".into())));
        }
        let id = read_u32(self.data, 0);
        let len = read_u32(self.data, 4) as usize;
        let rest = &self.data[HEADER_LEN..];
        if rest.len() < len {
            self.data = &[];
            return Some(Err(Error::Cache(format!(
                "chunk payload truncated: need {len} bytes, have {}",
                rest.len()
            ))));
        }
        let (payload, tail) = rest.split_at(len);
        self.data = tail;
        Some(Ok((id, payload)))
    }
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

impl Picture {
    pub fn to_chunks(&self) -> Vec<u8> {
        let mut prop = Vec::with_capacity(12);
        prop.extend_from_slice(&self.width.to_le_bytes());
        prop.extend_from_slice(&self.height.to_le_bytes());
        prop.extend_from_slice(&FORMAT_RGBA8.to_le_bytes());

        let mut body = Vec::with_capacity(2 * HEADER_LEN + prop.len() + self.mem_size_bytes());
        write_chunk(&mut body, ID_PROP, &prop);
        write_chunk(&mut body, ID_PIXL, self.as_bytes());

        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        write_chunk(&mut out, ID_PICT, &body);
        out
    }

    pub fn from_chunks(data: &[u8]) -> Result<Picture> {
        let mut pict = None;
        for chunk in (Chunks { data }) {
            let (id, payload) = chunk?;
            if id == ID_PICT {
                pict = Some(payload);
                break;
            }
        }
        let pict = pict.ok_or_else(|| Error::Cache("no PICT chunk".into()))?;

        let mut dims = None;
        let mut pixels = None;
        for chunk in (Chunks { data: pict }) {
            let (id, payload) = chunk?;
            match id {
                ID_PROP => {
                    if payload.len() < 12 {
                        return Err(Error::Cache("PROP chunk too short".into()));
                    }
                    let format = read_u32(payload, 8);
                    if format != FORMAT_RGBA8 {
                        return Err(Error::Cache(format!("unknown pixel format tag {format}")));
                    }
                    dims = Some((read_u32(payload, 0), read_u32(payload, 4)));
                }
                ID_PIXL => pixels = Some(payload),
                _ => {}
            }
        }

        let (width, height) = dims.ok_or_else(|| Error::Cache("missing PROP chunk".into()))?;
        let pixels = pixels.ok_or_else(|| Error::Cache("missing PIXL chunk".into()))?;
        Picture::from_rgba8(width, height, pixels)
            .map_err(|e| Error::Cache(format!("inconsistent picture: {e}")))
    }
}
