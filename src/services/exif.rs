//! Minimal EXIF transplant between JPEG files.
//!
//! Only a handful of descriptive tags survive processing: orientation,
//! capture time, camera make and model, and the GPS position. Everything
//! else in the source APP1 segment (maker notes, thumbnails, the Exif
//! sub-IFD) is dropped. The subset is rewritten as a fresh little-endian
//! TIFF structure and inserted right after the destination's SOI marker.

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use thiserror::Error;

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP1: u8 = 0xE1;
const EXIF_HEADER: &[u8] = b"Exif\0\0";
const GPS_IFD_POINTER: u16 = 0x8825;
const TYPE_LONG: u16 = 4;

/// IFD0 tags copied to the output: Make, Model, Orientation, DateTime.
pub const IFD0_TAGS: [u16; 4] = [0x010F, 0x0110, 0x0112, 0x0132];
/// GPS tags copied to the output: latitude and longitude with their refs.
pub const GPS_TAGS: [u16; 4] = [0x0001, 0x0002, 0x0003, 0x0004];

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Not a JPEG stream")]
    NotJpeg,

    #[error("No EXIF segment found")]
    NoExif,

    #[error("Invalid TIFF header")]
    BadHeader,

    #[error("EXIF data truncated at offset {0}")]
    Truncated(usize),

    #[error("EXIF subset too large for an APP1 segment ({0} bytes)")]
    TooLarge(usize),

    #[error("Failed to encode EXIF: {0}")]
    Encode(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn u16(self, buf: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(buf),
            Endian::Big => BigEndian::read_u16(buf),
        }
    }

    fn u32(self, buf: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(buf),
            Endian::Big => BigEndian::read_u32(buf),
        }
    }

    fn u64(self, buf: &[u8]) -> u64 {
        match self {
            Endian::Little => LittleEndian::read_u64(buf),
            Endian::Big => BigEndian::read_u64(buf),
        }
    }
}

/// One IFD entry with its value bytes already in little-endian order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExifEntry {
    pub tag: u16,
    pub kind: u16,
    pub count: u32,
    pub value: Vec<u8>,
}

impl ExifEntry {
    fn stored_len(&self) -> usize {
        if self.value.len() > 4 {
            self.value.len() + self.value.len() % 2
        } else {
            0
        }
    }
}

/// Byte width of one component and of the unit that gets byte-swapped.
fn type_layout(kind: u16) -> Option<(usize, usize)> {
    match kind {
        1 | 2 | 6 | 7 => Some((1, 1)),
        3 | 8 => Some((2, 2)),
        4 | 9 | 11 => Some((4, 4)),
        5 | 10 => Some((8, 4)),
        12 => Some((8, 8)),
        _ => None,
    }
}

/// The preserved tags of one image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifSubset {
    pub ifd0: Vec<ExifEntry>,
    pub gps: Vec<ExifEntry>,
}

impl ExifSubset {
    pub fn is_empty(&self) -> bool {
        self.ifd0.is_empty() && self.gps.is_empty()
    }

    pub fn get(&self, tag: u16) -> Option<&ExifEntry> {
        self.ifd0.iter().find(|entry| entry.tag == tag)
    }

    pub fn get_gps(&self, tag: u16) -> Option<&ExifEntry> {
        self.gps.iter().find(|entry| entry.tag == tag)
    }

    /// Extract the subset from a JPEG file's bytes.
    pub fn from_jpeg(jpeg: &[u8]) -> Result<Self, MetadataError> {
        let tiff = find_exif_payload(jpeg)?;
        Self::parse(tiff)
    }

    /// Parse a TIFF structure (the APP1 payload after `Exif\0\0`) in either
    /// byte order.
    pub fn parse(tiff: &[u8]) -> Result<Self, MetadataError> {
        let header = slice(tiff, 0, 8).map_err(|_| MetadataError::BadHeader)?;
        let endian = match &header[0..2] {
            b"II" => Endian::Little,
            b"MM" => Endian::Big,
            _ => return Err(MetadataError::BadHeader),
        };
        if endian.u16(&header[2..4]) != 42 {
            return Err(MetadataError::BadHeader);
        }
        let ifd0_offset = endian.u32(&header[4..8]) as usize;

        let mut subset = ExifSubset::default();
        let mut gps_offset = None;
        for entry in read_ifd(tiff, ifd0_offset, endian)? {
            if entry.tag == GPS_IFD_POINTER && entry.value.len() == 4 {
                gps_offset = Some(LittleEndian::read_u32(&entry.value) as usize);
            } else if IFD0_TAGS.contains(&entry.tag) {
                subset.ifd0.push(entry);
            }
        }
        if let Some(offset) = gps_offset {
            subset.gps = read_ifd(tiff, offset, endian)?
                .into_iter()
                .filter(|entry| GPS_TAGS.contains(&entry.tag))
                .collect();
        }
        subset.ifd0.sort_by_key(|entry| entry.tag);
        subset.gps.sort_by_key(|entry| entry.tag);
        Ok(subset)
    }

    /// Encode as a little-endian TIFF structure.
    pub fn to_tiff(&self) -> Result<Vec<u8>, MetadataError> {
        let mut ifd0 = self.ifd0.clone();
        let gps_start = if self.gps.is_empty() {
            None
        } else {
            // Placeholder first so the IFD0 size accounts for the pointer
            ifd0.push(ExifEntry {
                tag: GPS_IFD_POINTER,
                kind: TYPE_LONG,
                count: 1,
                value: vec![0; 4],
            });
            let start = 8 + ifd_len(&ifd0);
            if let Some(pointer) = ifd0.last_mut() {
                pointer.value = (start as u32).to_le_bytes().to_vec();
            }
            Some(start)
        };
        ifd0.sort_by_key(|entry| entry.tag);

        let mut out = Vec::new();
        out.extend_from_slice(b"II");
        out.write_u16::<LittleEndian>(42)?;
        out.write_u32::<LittleEndian>(8)?;
        write_ifd(&mut out, &ifd0)?;
        if let Some(start) = gps_start {
            debug_assert_eq!(out.len(), start);
            write_ifd(&mut out, &self.gps)?;
        }
        Ok(out)
    }

    /// Encode as a complete APP1 segment including the marker.
    pub fn to_app1(&self) -> Result<Vec<u8>, MetadataError> {
        let tiff = self.to_tiff()?;
        let length = 2 + EXIF_HEADER.len() + tiff.len();
        if length > usize::from(u16::MAX) {
            return Err(MetadataError::TooLarge(length));
        }
        let mut segment = Vec::with_capacity(length + 2);
        segment.extend_from_slice(&[0xFF, APP1]);
        segment.write_u16::<BigEndian>(length as u16)?;
        segment.extend_from_slice(EXIF_HEADER);
        segment.extend_from_slice(&tiff);
        Ok(segment)
    }
}

/// Copy the preserved tags of `source` into `dest`, both JPEG byte streams.
///
/// Returns the new destination bytes. Fails when the source has no usable
/// EXIF data; callers treat any failure as "no metadata".
pub fn transplant(source: &[u8], dest: &[u8]) -> Result<Vec<u8>, MetadataError> {
    let subset = ExifSubset::from_jpeg(source)?;
    if subset.is_empty() {
        return Err(MetadataError::NoExif);
    }
    insert_app1(dest, &subset.to_app1()?)
}

/// Insert an APP1 segment immediately after SOI.
pub fn insert_app1(jpeg: &[u8], segment: &[u8]) -> Result<Vec<u8>, MetadataError> {
    if !jpeg.starts_with(&SOI) {
        return Err(MetadataError::NotJpeg);
    }
    let mut out = Vec::with_capacity(jpeg.len() + segment.len());
    out.extend_from_slice(&SOI);
    out.extend_from_slice(segment);
    out.extend_from_slice(&jpeg[2..]);
    Ok(out)
}

/// Locate the TIFF payload of the first `Exif` APP1 segment.
pub fn find_exif_payload(data: &[u8]) -> Result<&[u8], MetadataError> {
    if !data.starts_with(&SOI) {
        return Err(MetadataError::NotJpeg);
    }

    let mut pos = 2usize;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        while pos < data.len() && data[pos] == 0xFF {
            pos += 1;
        }
        if pos >= data.len() {
            break;
        }

        let marker = data[pos];
        pos += 1;

        // Metadata segments all precede the scan
        if marker == 0xD9 || marker == 0xDA {
            break;
        }
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            continue;
        }

        if pos + 2 > data.len() {
            break;
        }
        let seg_len = BigEndian::read_u16(&data[pos..pos + 2]) as usize;
        pos += 2;
        if seg_len < 2 || pos + seg_len - 2 > data.len() {
            break;
        }
        let segment = &data[pos..pos + seg_len - 2];
        if marker == APP1 && segment.starts_with(EXIF_HEADER) {
            return Ok(&segment[EXIF_HEADER.len()..]);
        }
        pos += seg_len - 2;
    }
    Err(MetadataError::NoExif)
}

fn slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8], MetadataError> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or(MetadataError::Truncated(offset))
}

fn read_ifd(tiff: &[u8], offset: usize, endian: Endian) -> Result<Vec<ExifEntry>, MetadataError> {
    let count = endian.u16(slice(tiff, offset, 2)?) as usize;
    let mut entries = Vec::with_capacity(count);

    for index in 0..count {
        let raw = slice(tiff, offset + 2 + index * 12, 12)?;
        let tag = endian.u16(&raw[0..2]);
        let kind = endian.u16(&raw[2..4]);
        let components = endian.u32(&raw[4..8]);

        // Unknown types are skipped rather than failing the whole IFD
        let Some((width, unit)) = type_layout(kind) else {
            continue;
        };
        let Some(len) = (components as usize).checked_mul(width) else {
            continue;
        };
        let bytes = if len <= 4 {
            &raw[8..8 + len]
        } else {
            slice(tiff, endian.u32(&raw[8..12]) as usize, len)?
        };

        entries.push(ExifEntry {
            tag,
            kind,
            count: components,
            value: to_little_endian(bytes, unit, endian),
        });
    }
    Ok(entries)
}

fn to_little_endian(bytes: &[u8], unit: usize, endian: Endian) -> Vec<u8> {
    if unit == 1 || endian == Endian::Little {
        return bytes.to_vec();
    }
    let mut out = vec![0u8; bytes.len()];
    for (src, dst) in bytes.chunks_exact(unit).zip(out.chunks_exact_mut(unit)) {
        match unit {
            2 => LittleEndian::write_u16(dst, endian.u16(src)),
            4 => LittleEndian::write_u32(dst, endian.u32(src)),
            _ => LittleEndian::write_u64(dst, endian.u64(src)),
        }
    }
    out
}

fn ifd_len(entries: &[ExifEntry]) -> usize {
    2 + entries.len() * 12 + 4 + entries.iter().map(ExifEntry::stored_len).sum::<usize>()
}

/// Append an IFD at the current end of `out`, followed by its value area.
fn write_ifd(out: &mut Vec<u8>, entries: &[ExifEntry]) -> Result<(), MetadataError> {
    let start = out.len();
    let mut data_offset = start + 2 + entries.len() * 12 + 4;

    out.write_u16::<LittleEndian>(entries.len() as u16)?;
    for entry in entries {
        out.write_u16::<LittleEndian>(entry.tag)?;
        out.write_u16::<LittleEndian>(entry.kind)?;
        out.write_u32::<LittleEndian>(entry.count)?;
        if entry.value.len() > 4 {
            out.write_u32::<LittleEndian>(data_offset as u32)?;
            data_offset += entry.stored_len();
        } else {
            let mut inline = [0u8; 4];
            inline[..entry.value.len()].copy_from_slice(&entry.value);
            out.extend_from_slice(&inline);
        }
    }
    // No next IFD
    out.write_u32::<LittleEndian>(0)?;

    for entry in entries.iter().filter(|entry| entry.value.len() > 4) {
        out.extend_from_slice(&entry.value);
        if entry.value.len() % 2 == 1 {
            out.push(0);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Build a big-endian TIFF with the given IFD0 and optional GPS IFD.
    /// Entries are `(tag, type, count, value bytes already big-endian)`.
    fn big_endian_tiff(ifd0: &[(u16, u16, u32, Vec<u8>)], gps: &[(u16, u16, u32, Vec<u8>)]) -> Vec<u8> {
        fn ifd(base: usize, entries: &[(u16, u16, u32, Vec<u8>)], extra: Option<u32>) -> Vec<u8> {
            let n = entries.len() + usize::from(extra.is_some());
            let mut head = Vec::new();
            let mut data = Vec::new();
            let data_start = base + 2 + n * 12 + 4;
            head.write_u16::<BigEndian>(n as u16).unwrap();
            for (tag, kind, count, value) in entries {
                head.write_u16::<BigEndian>(*tag).unwrap();
                head.write_u16::<BigEndian>(*kind).unwrap();
                head.write_u32::<BigEndian>(*count).unwrap();
                if value.len() > 4 {
                    head.write_u32::<BigEndian>((data_start + data.len()) as u32)
                        .unwrap();
                    data.extend_from_slice(value);
                } else {
                    let mut inline = [0u8; 4];
                    inline[..value.len()].copy_from_slice(value);
                    head.extend_from_slice(&inline);
                }
            }
            if let Some(pointer) = extra {
                head.write_u16::<BigEndian>(GPS_IFD_POINTER).unwrap();
                head.write_u16::<BigEndian>(TYPE_LONG).unwrap();
                head.write_u32::<BigEndian>(1).unwrap();
                head.write_u32::<BigEndian>(pointer).unwrap();
            }
            head.write_u32::<BigEndian>(0).unwrap();
            head.extend_from_slice(&data);
            head
        }

        let sized = ifd(8, ifd0, Some(0));
        let gps_offset = 8 + sized.len();
        let mut out = b"MM\x00\x2A\x00\x00\x00\x08".to_vec();
        if gps.is_empty() {
            out.extend(ifd(8, ifd0, None));
        } else {
            out.extend(ifd(8, ifd0, Some(gps_offset as u32)));
            out.extend(ifd(gps_offset, gps, None));
        }
        out
    }

    fn rational_be(values: &[(u32, u32)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (num, den) in values {
            out.write_u32::<BigEndian>(*num).unwrap();
            out.write_u32::<BigEndian>(*den).unwrap();
        }
        out
    }

    fn camera_tiff() -> Vec<u8> {
        big_endian_tiff(
            &[
                (0x010F, 2, 6, b"Canon\0".to_vec()),
                (0x0110, 2, 4, b"R5\0\0".to_vec()),
                (0x0112, 3, 1, vec![0x00, 0x06]),
                (0x0132, 2, 20, b"2024:05:01 10:20:30\0".to_vec()),
                // Software, not preserved
                (0x0131, 2, 5, b"Test\0".to_vec()),
            ],
            &[
                (0x0001, 2, 2, b"N\0".to_vec()),
                (0x0002, 5, 3, rational_be(&[(52, 1), (31, 1), (1234, 100)])),
                (0x0003, 2, 2, b"E\0".to_vec()),
                (0x0004, 5, 3, rational_be(&[(13, 1), (24, 1), (5678, 100)])),
                // Altitude, not preserved
                (0x0006, 5, 1, rational_be(&[(35, 1)])),
            ],
        )
    }

    fn jpeg_with_app1(tiff: &[u8]) -> Vec<u8> {
        let mut app1 = vec![0xFF, APP1];
        app1.write_u16::<BigEndian>((2 + 6 + tiff.len()) as u16)
            .unwrap();
        app1.extend_from_slice(EXIF_HEADER);
        app1.extend_from_slice(tiff);

        let mut jpeg = SOI.to_vec();
        // JFIF APP0 before the EXIF segment
        jpeg.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x07, b'J', b'F', b'I', b'F', 0x00]);
        jpeg.extend(app1);
        jpeg.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x12, 0x34, 0xFF, 0xD9]);
        jpeg
    }

    #[test]
    fn test_parse_big_endian_keeps_only_preserved_tags() {
        let subset = ExifSubset::parse(&camera_tiff()).unwrap();

        let tags: Vec<u16> = subset.ifd0.iter().map(|e| e.tag).collect();
        assert_eq!(tags, vec![0x010F, 0x0110, 0x0112, 0x0132]);
        let gps: Vec<u16> = subset.gps.iter().map(|e| e.tag).collect();
        assert_eq!(gps, vec![1, 2, 3, 4]);

        assert_eq!(subset.get(0x010F).unwrap().value, b"Canon\0".to_vec());
        // SHORT converted to little-endian
        assert_eq!(subset.get(0x0112).unwrap().value, vec![0x06, 0x00]);
        let lat = &subset.get_gps(0x0002).unwrap().value;
        assert_eq!(LittleEndian::read_u32(&lat[0..4]), 52);
        assert_eq!(LittleEndian::read_u32(&lat[16..20]), 1234);
        assert_eq!(LittleEndian::read_u32(&lat[20..24]), 100);
    }

    #[test]
    fn test_little_endian_output_reparses_identically() {
        let subset = ExifSubset::parse(&camera_tiff()).unwrap();
        let tiff = subset.to_tiff().unwrap();

        assert_eq!(&tiff[0..2], b"II");
        assert_eq!(ExifSubset::parse(&tiff).unwrap(), subset);
    }

    #[test]
    fn test_subset_without_gps_has_no_pointer() {
        let tiff = big_endian_tiff(&[(0x0112, 3, 1, vec![0x00, 0x03])], &[]);
        let subset = ExifSubset::parse(&tiff).unwrap();
        let out = subset.to_tiff().unwrap();

        // One entry: count + 12 bytes + next pointer
        assert_eq!(out.len(), 8 + 2 + 12 + 4);
        assert!(ExifSubset::parse(&out).unwrap().gps.is_empty());
    }

    #[test]
    fn test_find_payload_skips_app0() {
        let tiff = camera_tiff();
        let jpeg = jpeg_with_app1(&tiff);
        assert_eq!(find_exif_payload(&jpeg).unwrap(), tiff.as_slice());
    }

    #[test]
    fn test_find_payload_errors() {
        assert!(matches!(
            find_exif_payload(b"\x89PNG\r\n"),
            Err(MetadataError::NotJpeg)
        ));
        let bare = [0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02, 0xFF, 0xD9];
        assert!(matches!(
            find_exif_payload(&bare),
            Err(MetadataError::NoExif)
        ));
    }

    #[test]
    fn test_transplant_inserts_after_soi() {
        let source = jpeg_with_app1(&camera_tiff());
        let dest = [0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02, 0xAA, 0xFF, 0xD9];

        let out = transplant(&source, &dest).unwrap();

        assert_eq!(&out[0..4], &[0xFF, 0xD8, 0xFF, APP1]);
        assert!(out.ends_with(&dest[2..]));
        let subset = ExifSubset::from_jpeg(&out).unwrap();
        assert_eq!(subset.get(0x0112).unwrap().value, vec![0x06, 0x00]);
        assert_eq!(subset.gps.len(), 4);
    }

    #[test]
    fn test_transplant_without_source_exif_fails() {
        let source = [0xFF, 0xD8, 0xFF, 0xD9];
        let dest = [0xFF, 0xD8, 0xFF, 0xD9];
        assert!(transplant(&source, &dest).is_err());
    }

    #[test]
    fn test_truncated_tiff() {
        let mut tiff = camera_tiff();
        tiff.truncate(20);
        assert!(matches!(
            ExifSubset::parse(&tiff),
            Err(MetadataError::Truncated(_))
        ));
    }

    #[test]
    fn test_bad_header() {
        assert!(matches!(
            ExifSubset::parse(b"XX\x00\x2A\x00\x00\x00\x08"),
            Err(MetadataError::BadHeader)
        ));
        assert!(matches!(
            ExifSubset::parse(b"II"),
            Err(MetadataError::BadHeader)
        ));
    }
}
