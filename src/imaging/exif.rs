//! Minimal EXIF (TIFF IFD) reader and editor.
//!
//! Works on the raw TIFF-structured EXIF block as stored in a JPEG APP1
//! segment (after the `Exif\0\0` prefix), a PNG `eXIf` chunk, or a WebP
//! `EXIF` chunk. Supports exactly what re-encoding needs:
//!
//! - Orientation (IFD0 tag 0x0112): read, and reset to 1 once applied to pixels
//! - GPSInfo (IFD0 tag 0x8825): detect and strip
//! - Thumbnail (IFD1, tags 0x0103 / 0x0201 / 0x0202): embed a JPEG preview,
//!   replacing any preview already present
//!
//! Edits are done in place so that every offset elsewhere in the block stays
//! valid: stripped GPS data is zeroed rather than removed, and the preview is
//! appended at the end. The only bytes ever cut off are trailing ones no IFD
//! reaches. Malformed input is returned unchanged.

const TAG_ORIENTATION: u16 = 0x0112;
const TAG_GPS_IFD: u16 = 0x8825;
const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_INTEROP_IFD: u16 = 0xA005;
const TAG_COMPRESSION: u16 = 0x0103;
const TAG_JPEG_OFFSET: u16 = 0x0201;
const TAG_JPEG_LENGTH: u16 = 0x0202;

const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;

/// JPEG compression value for IFD1 thumbnails.
const COMPRESSION_JPEG: u32 = 6;

/// Largest EXIF block that fits a JPEG APP1 segment: 65535 minus the length
/// field (2) and the `Exif\0\0` prefix (6).
pub const MAX_EXIF_LEN: usize = 65_527;

const IFD_ENTRY_LEN: usize = 12;

#[derive(Debug, Clone, Copy)]
struct ByteOrder {
    big_endian: bool,
}

impl ByteOrder {
    fn u16(self, data: &[u8], offset: usize) -> Option<u16> {
        let bytes: [u8; 2] = data.get(offset..offset + 2)?.try_into().ok()?;
        Some(if self.big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        })
    }

    fn u32(self, data: &[u8], offset: usize) -> Option<u32> {
        let bytes: [u8; 4] = data.get(offset..offset + 4)?.try_into().ok()?;
        Some(if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }

    fn u16_bytes(self, value: u16) -> [u8; 2] {
        if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    fn u32_bytes(self, value: u32) -> [u8; 4] {
        if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }
}

/// One 12-byte IFD entry.
#[derive(Debug, Clone, Copy)]
struct Entry {
    /// Position of the entry itself within the block.
    position: usize,
    tag: u16,
    typ: u16,
    count: u32,
    /// Raw value/offset field.
    value: u32,
}

impl Entry {
    fn byte_len(&self) -> usize {
        // TIFF type sizes: count is number of values, not bytes.
        let size = match self.typ {
            1 | 2 | 6 | 7 => 1,   // BYTE, ASCII, SBYTE, UNDEFINED
            3 | 8 => 2,           // SHORT, SSHORT
            4 | 9 | 11 | 13 => 4, // LONG, SLONG, FLOAT, IFD
            5 | 10 | 12 => 8,     // RATIONAL, SRATIONAL, DOUBLE
            _ => 1,
        };
        (self.count as usize).saturating_mul(size)
    }

    /// Values of 4 bytes or fewer live inside the entry.
    fn is_inline(&self) -> bool {
        self.byte_len() <= 4
    }
}

/// A parsed IFD: its entries and where its next-IFD pointer lives.
struct Ifd {
    offset: usize,
    entries: Vec<Entry>,
    next_pointer: usize,
}

impl Ifd {
    fn find(&self, tag: u16) -> Option<Entry> {
        self.entries.iter().copied().find(|e| e.tag == tag)
    }

    /// Byte range covered by the entry count, entries and next pointer.
    fn span(&self) -> std::ops::Range<usize> {
        self.offset..self.next_pointer + 4
    }
}

/// Check the TIFF header; returns byte order and IFD0 offset.
fn parse_header(data: &[u8]) -> Option<(ByteOrder, usize)> {
    let big_endian = match data.get(0..2)? {
        b"MM" => true,
        b"II" => false,
        _ => return None,
    };
    let order = ByteOrder { big_endian };
    // Verify TIFF magic (42)
    if order.u16(data, 2)? != 42 {
        return None;
    }
    Some((order, order.u32(data, 4)? as usize))
}

fn read_ifd(order: ByteOrder, data: &[u8], offset: usize) -> Option<Ifd> {
    if offset < 8 {
        return None;
    }
    let entry_count = order.u16(data, offset)? as usize;
    let entries_start = offset + 2;
    let next_pointer = entries_start + entry_count * IFD_ENTRY_LEN;
    if next_pointer + 4 > data.len() {
        return None;
    }

    let entries = (0..entry_count)
        .map(|i| {
            let position = entries_start + i * IFD_ENTRY_LEN;
            Some(Entry {
                position,
                tag: order.u16(data, position)?,
                typ: order.u16(data, position + 2)?,
                count: order.u32(data, position + 4)?,
                value: order.u32(data, position + 8)?,
            })
        })
        .collect::<Option<Vec<_>>>()?;

    Some(Ifd {
        offset,
        entries,
        next_pointer,
    })
}

fn read_ifd0(data: &[u8]) -> Option<(ByteOrder, Ifd)> {
    let (order, ifd0) = parse_header(data)?;
    Some((order, read_ifd(order, data, ifd0)?))
}

/// End of the furthest byte reachable from IFD0 through its sub-IFDs (Exif,
/// GPS, Interop), ignoring the IFD1 chain.
fn referenced_end(order: ByteOrder, data: &[u8], ifd0: &Ifd) -> usize {
    let mut end = 0;
    let mut pending = vec![ifd0.offset];
    let mut visited = Vec::new();

    while let Some(offset) = pending.pop() {
        // Cyclic or absurdly nested pointers
        if visited.contains(&offset) || visited.len() > 8 {
            continue;
        }
        visited.push(offset);
        let Some(ifd) = read_ifd(order, data, offset) else {
            continue;
        };
        end = end.max(ifd.span().end);
        for entry in &ifd.entries {
            if matches!(entry.tag, TAG_EXIF_IFD | TAG_GPS_IFD | TAG_INTEROP_IFD) {
                pending.push(entry.value as usize);
            } else if !entry.is_inline() {
                end = end.max((entry.value as usize).saturating_add(entry.byte_len()));
            }
        }
    }
    end
}

/// Read the EXIF orientation (1–8). Out-of-range values are ignored.
pub fn read_orientation(exif: &[u8]) -> Option<u16> {
    let (order, ifd0) = read_ifd0(exif)?;
    let entry = ifd0.find(TAG_ORIENTATION)?;
    if entry.typ != TYPE_SHORT {
        return None;
    }
    order
        .u16(exif, entry.position + 8)
        .filter(|v| (1..=8).contains(v))
}

/// True if IFD0 points at a GPS IFD.
pub fn has_gps(exif: &[u8]) -> bool {
    read_ifd0(exif).is_some_and(|(_, ifd0)| ifd0.find(TAG_GPS_IFD).is_some())
}

/// Remove GPS information, leaving every other tag untouched.
///
/// The GPS IFD and its out-of-line values are zeroed and the GPSInfo pointer
/// is removed from IFD0. The block keeps its length.
pub fn strip_gps(exif: &[u8]) -> Vec<u8> {
    let mut out = exif.to_vec();
    let Some((order, ifd0)) = read_ifd0(exif) else {
        return out;
    };
    let Some(pointer) = ifd0.find(TAG_GPS_IFD) else {
        return out;
    };

    if let Some(gps) = read_ifd(order, exif, pointer.value as usize) {
        let ifd0_span = ifd0.span();
        let overlaps = |start: usize, end: usize| start < ifd0_span.end && ifd0_span.start < end;

        for entry in gps.entries.iter().filter(|e| !e.is_inline()) {
            let start = entry.value as usize;
            let end = start.saturating_add(entry.byte_len());
            if end <= out.len() && !overlaps(start, end) {
                out[start..end].fill(0);
            }
        }
        let span = gps.span();
        if !overlaps(span.start, span.end) {
            out[span].fill(0);
        }
    }

    // Shift the remaining entries and the next-IFD pointer over the removed one.
    let removed = pointer.position;
    let tail_end = ifd0.next_pointer + 4;
    out.copy_within(removed + IFD_ENTRY_LEN..tail_end, removed);
    out[tail_end - IFD_ENTRY_LEN..tail_end].fill(0);
    let count = order.u16_bytes((ifd0.entries.len() - 1) as u16);
    out[ifd0.offset..ifd0.offset + 2].copy_from_slice(&count);

    out
}

/// Set the orientation tag to 1 (upright), if present.
///
/// Used after the stored orientation has been applied to the pixels, so
/// viewers don't rotate the image a second time.
pub fn reset_orientation(exif: &[u8]) -> Vec<u8> {
    let mut out = exif.to_vec();
    let Some((order, ifd0)) = read_ifd0(exif) else {
        return out;
    };
    if let Some(entry) = ifd0.find(TAG_ORIENTATION).filter(|e| e.typ == TYPE_SHORT) {
        let field = entry.position + 8;
        out[field..field + 2].copy_from_slice(&order.u16_bytes(1));
        out[field + 2..field + 4].fill(0);
    }
    out
}

/// An EXIF block with an empty IFD0 (big-endian).
pub fn empty_exif() -> Vec<u8> {
    let mut out = b"MM\x00\x2A".to_vec();
    out.extend_from_slice(&8u32.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());
    out
}

/// Unlink the IFD1 chain (and with it any embedded preview).
///
/// When IFD1 lies past everything IFD0 still references, the unreferenced
/// tail is truncated; otherwise only the link is cleared.
pub fn remove_thumbnail(exif: &[u8]) -> Vec<u8> {
    let mut out = exif.to_vec();
    let Some((order, ifd0)) = read_ifd0(exif) else {
        return out;
    };
    let ifd1_offset = match order.u32(exif, ifd0.next_pointer) {
        Some(0) | None => return out,
        Some(offset) => offset as usize,
    };

    out[ifd0.next_pointer..ifd0.next_pointer + 4].fill(0);
    let keep = referenced_end(order, exif, &ifd0);
    if ifd1_offset >= keep {
        out.truncate(keep);
    }
    out
}

/// Attach a JPEG preview as IFD1.
///
/// Starts from `exif` (or an empty block when absent or malformed), drops any
/// existing IFD1, appends a new one describing `thumbnail_jpeg`, and links it
/// from IFD0. Returns `None` if the result would not fit in a JPEG APP1
/// segment.
pub fn embed_thumbnail(exif: Option<&[u8]>, thumbnail_jpeg: &[u8]) -> Option<Vec<u8>> {
    let mut out = match exif {
        Some(data) if read_ifd0(data).is_some() => remove_thumbnail(data),
        _ => empty_exif(),
    };
    let (order, ifd0) = read_ifd0(&out)?;

    // IFD offsets must be word-aligned
    if out.len() % 2 == 1 {
        out.push(0);
    }
    let ifd1 = out.len();
    let entries: u16 = 3;
    let thumb_offset = ifd1 + 2 + entries as usize * IFD_ENTRY_LEN + 4;

    if thumb_offset + thumbnail_jpeg.len() > MAX_EXIF_LEN {
        return None;
    }

    out.extend_from_slice(&order.u16_bytes(entries));
    push_entry(&mut out, order, TAG_COMPRESSION, TYPE_SHORT, COMPRESSION_JPEG);
    push_entry(&mut out, order, TAG_JPEG_OFFSET, TYPE_LONG, thumb_offset as u32);
    push_entry(&mut out, order, TAG_JPEG_LENGTH, TYPE_LONG, thumbnail_jpeg.len() as u32);
    out.extend_from_slice(&order.u32_bytes(0));
    out.extend_from_slice(thumbnail_jpeg);

    let next = ifd0.next_pointer;
    out[next..next + 4].copy_from_slice(&order.u32_bytes(ifd1 as u32));
    Some(out)
}

/// Append a single-value SHORT or LONG entry.
fn push_entry(out: &mut Vec<u8>, order: ByteOrder, tag: u16, typ: u16, value: u32) {
    out.extend_from_slice(&order.u16_bytes(tag));
    out.extend_from_slice(&order.u16_bytes(typ));
    out.extend_from_slice(&order.u32_bytes(1));
    if typ == TYPE_SHORT {
        // Left-justified in the value field regardless of byte order
        out.extend_from_slice(&order.u16_bytes(value as u16));
        out.extend_from_slice(&[0, 0]);
    } else {
        out.extend_from_slice(&order.u32_bytes(value));
    }
}

/// Return the embedded IFD1 JPEG preview, if any.
pub fn read_thumbnail(exif: &[u8]) -> Option<&[u8]> {
    let (order, ifd0) = read_ifd0(exif)?;
    let ifd1_offset = order.u32(exif, ifd0.next_pointer)? as usize;
    let ifd1 = read_ifd(order, exif, ifd1_offset)?;
    let offset = ifd1.find(TAG_JPEG_OFFSET)?;
    let length = ifd1.find(TAG_JPEG_LENGTH)?;
    let start = offset.value as usize;
    exif.get(start..start.checked_add(length.value as usize)?)
}
