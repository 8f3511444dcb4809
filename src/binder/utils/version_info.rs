//! Version resource of portable executables.
//!
//! A file is versioned when its `RT_VERSION` resource carries a
//! `VS_FIXEDFILEINFO`. The language is the first `Translation` entry of the
//! resource, falling back to the language the resource is filed under.

use crate::binder::{Result, error::ErrorExt};
use std::path::Path;
use tokio::io::AsyncReadExt;

const RT_VERSION: u32 = 16;
const FIXED_FILE_INFO_SIGNATURE: u32 = 0xFEEF_04BD;
const SUBDIRECTORY: u32 = 0x8000_0000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionInfo {
    /// Dotted `major.minor.build.revision` file version.
    pub version: String,
    /// Decimal LCID.
    pub language: Option<String>,
}

/// Reads the version resource of `path`.
///
/// Files without the `MZ` signature are not opened past their first two
/// bytes. Anything that is not a PE image with a version resource yields
/// `None`.
pub async fn read_version_info(path: &Path) -> Result<Option<VersionInfo>> {
    let mut file = tokio::fs::File::open(path)
        .await
        .fs_context("opening file for version information", path)?;
    let mut magic = [0u8; 2];
    match file.read_exact(&mut magic).await {
        Ok(_) if &magic == b"MZ" => {}
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e).fs_context("reading file for version information", path),
    }

    let content = tokio::fs::read(path)
        .await
        .fs_context("reading file for version information", path)?;
    Ok(parse_version_info(&content))
}

/// Extracts the version information from a PE image in memory.
pub fn parse_version_info(image: &[u8]) -> Option<VersionInfo> {
    let pe = match goblin::Object::parse(image) {
        Ok(goblin::Object::PE(pe)) => pe,
        Ok(_) => return None,
        Err(e) => {
            log::debug!("Not reading version information: {e}");
            return None;
        }
    };
    let sections: Vec<Section> = pe
        .sections
        .iter()
        .map(|s| Section {
            virtual_address: s.virtual_address,
            virtual_size: s.virtual_size.max(s.size_of_raw_data),
            raw_offset: s.pointer_to_raw_data,
        })
        .collect();
    let resources = pe
        .sections
        .iter()
        .find(|s| s.name().is_ok_and(|name| name == ".rsrc"))?;
    let root = usize::try_from(resources.pointer_to_raw_data).ok()?;

    let (resource_language, rva, size) = version_resource(image, root)?;
    let offset = file_offset(&sections, rva)?;
    let blob = image.get(offset..offset.checked_add(usize::try_from(size).ok()?)?)?;

    let mut info = parse_version_resource(blob)?;
    if info.language.is_none() && resource_language != 0 {
        info.language = Some(resource_language.to_string());
    }
    Some(info)
}

/// Parses a `VS_VERSIONINFO` block.
pub fn parse_version_resource(blob: &[u8]) -> Option<VersionInfo> {
    let root = Block::parse(blob)?;
    if root.key != "VS_VERSION_INFO" {
        return None;
    }
    let fixed = root.value;
    if read_u32(fixed, 0)? != FIXED_FILE_INFO_SIGNATURE {
        return None;
    }
    let (most, least) = (read_u32(fixed, 8)?, read_u32(fixed, 12)?);
    let version = format!(
        "{}.{}.{}.{}",
        most >> 16,
        most & 0xFFFF,
        least >> 16,
        least & 0xFFFF
    );

    let language = root
        .children()
        .filter(|child| child.key == "VarFileInfo")
        .flat_map(|child| child.children())
        .find(|var| var.key == "Translation")
        .and_then(|var| read_u16(var.value, 0))
        .map(|lcid| lcid.to_string());

    Some(VersionInfo { version, language })
}

struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_offset: u32,
}

fn file_offset(sections: &[Section], rva: u32) -> Option<usize> {
    let section = sections.iter().find(|s| {
        rva >= s.virtual_address && rva - s.virtual_address < s.virtual_size
    })?;
    let offset = (rva - section.virtual_address).checked_add(section.raw_offset)?;
    usize::try_from(offset).ok()
}

/// Walks type, name and language levels to the first version resource.
/// Returns its language id, data RVA and size.
fn version_resource(image: &[u8], root: usize) -> Option<(u32, u32, u32)> {
    let names = subdirectory(image, root, root, Some(RT_VERSION))?;
    let languages = subdirectory(image, root, names, None)?;
    let (language, entry) = directory_entry(image, languages, None)?;
    if entry & SUBDIRECTORY != 0 {
        return None;
    }
    let data = root.checked_add(usize::try_from(entry).ok()?)?;
    Some((language, read_u32(image, data)?, read_u32(image, data + 4)?))
}

fn subdirectory(image: &[u8], root: usize, directory: usize, id: Option<u32>) -> Option<usize> {
    let (_, entry) = directory_entry(image, directory, id)?;
    if entry & SUBDIRECTORY == 0 {
        return None;
    }
    root.checked_add(usize::try_from(entry & !SUBDIRECTORY).ok()?)
}

/// Finds the entry with `id` (or the first entry) in a resource directory.
fn directory_entry(image: &[u8], directory: usize, id: Option<u32>) -> Option<(u32, u32)> {
    let named = usize::from(read_u16(image, directory + 12)?);
    let ids = usize::from(read_u16(image, directory + 14)?);
    (0..named + ids)
        .map(|i| directory + 16 + i * 8)
        .filter_map(|entry| Some((read_u32(image, entry)?, read_u32(image, entry + 4)?)))
        .find(|(name, _)| id.is_none_or(|id| *name == id))
}

/// One node of the version resource tree.
struct Block<'a> {
    key: String,
    value: &'a [u8],
    children: &'a [u8],
}

impl<'a> Block<'a> {
    /// Parses the block at the start of `data`.
    fn parse(data: &'a [u8]) -> Option<Self> {
        let length = usize::from(read_u16(data, 0)?);
        let value_length = usize::from(read_u16(data, 2)?);
        let text = read_u16(data, 4)? == 1;
        let data = data.get(..length)?;

        let units: Vec<u16> = data
            .get(6..)?
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|unit| *unit != 0)
            .collect();
        let key = String::from_utf16_lossy(&units);

        let value_start = align(6 + (units.len() + 1) * 2);
        let value_end = value_start + if text { value_length * 2 } else { value_length };
        let value = data.get(value_start..value_end.min(length)).unwrap_or_default();
        let children = data.get(align(value_end).min(length)..).unwrap_or_default();
        Some(Self {
            key,
            value,
            children,
        })
    }

    fn children(&self) -> impl Iterator<Item = Block<'a>> + use<'a> {
        let mut rest = self.children;
        std::iter::from_fn(move || {
            let length = usize::from(read_u16(rest, 0)?);
            if length == 0 {
                return None;
            }
            let block = Block::parse(rest)?;
            rest = rest.get(align(length).min(rest.len())..).unwrap_or_default();
            Some(block)
        })
    }
}

fn align(offset: usize) -> usize {
    (offset + 3) & !3
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Builders for small PE images carrying a version resource.
#[cfg(test)]
pub(crate) mod fixture {
    fn push_u16(out: &mut Vec<u8>, value: u16) {
        out.extend_from_slice(&value.to_le_bytes());
    }

    fn push_u32(out: &mut Vec<u8>, value: u32) {
        out.extend_from_slice(&value.to_le_bytes());
    }

    fn pad(out: &mut Vec<u8>) {
        while out.len() % 4 != 0 {
            out.push(0);
        }
    }

    fn block(key: &str, value: &[u8], children: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        push_u16(&mut out, 0);
        push_u16(&mut out, u16::try_from(value.len()).expect("value length"));
        push_u16(&mut out, 0);
        for unit in key.encode_utf16().chain([0]) {
            push_u16(&mut out, unit);
        }
        pad(&mut out);
        out.extend_from_slice(value);
        pad(&mut out);
        out.extend_from_slice(children);
        let length = u16::try_from(out.len()).expect("block length");
        out[..2].copy_from_slice(&length.to_le_bytes());
        out
    }

    /// A `VS_VERSIONINFO` block for `version` with an optional translation.
    pub fn version_resource(version: [u16; 4], translation: Option<u16>) -> Vec<u8> {
        let mut fixed = Vec::new();
        push_u32(&mut fixed, 0xFEEF_04BD);
        push_u32(&mut fixed, 0x0001_0000);
        for _ in 0..2 {
            push_u32(&mut fixed, (u32::from(version[0]) << 16) | u32::from(version[1]));
            push_u32(&mut fixed, (u32::from(version[2]) << 16) | u32::from(version[3]));
        }
        fixed.resize(52, 0);

        let children = match translation {
            Some(lcid) => {
                let mut value = Vec::new();
                push_u16(&mut value, lcid);
                push_u16(&mut value, 1200);
                block("VarFileInfo", &[], &block("Translation", &value, &[]))
            }
            None => Vec::new(),
        };
        block("VS_VERSION_INFO", &fixed, &children)
    }

    /// A 32-bit PE image whose `.rsrc` section holds `resource` filed under
    /// `language`.
    pub fn pe_image(resource: &[u8], language: u32) -> Vec<u8> {
        const RAW: usize = 0x200;
        const RVA: u32 = 0x1000;

        let mut rsrc = Vec::new();
        let directory = |out: &mut Vec<u8>, id: u32, target: u32| {
            out.extend_from_slice(&[0; 14]);
            push_u16(out, 1);
            push_u32(out, id);
            push_u32(out, target);
        };
        directory(&mut rsrc, 16, 0x8000_0000 | 0x18);
        directory(&mut rsrc, 1, 0x8000_0000 | 0x30);
        directory(&mut rsrc, language, 0x48);
        push_u32(&mut rsrc, RVA + 0x58);
        push_u32(&mut rsrc, u32::try_from(resource.len()).expect("resource length"));
        push_u32(&mut rsrc, 0);
        push_u32(&mut rsrc, 0);
        rsrc.extend_from_slice(resource);
        let raw_size = rsrc.len().div_ceil(RAW) * RAW;

        let mut image = vec![0u8; RAW];
        image[..2].copy_from_slice(b"MZ");
        image[0x3c..0x40].copy_from_slice(&0x80u32.to_le_bytes());

        let mut headers = Vec::new();
        headers.extend_from_slice(b"PE\0\0");
        push_u16(&mut headers, 0x014c);
        push_u16(&mut headers, 1);
        push_u32(&mut headers, 0);
        push_u32(&mut headers, 0);
        push_u32(&mut headers, 0);
        push_u16(&mut headers, 224);
        push_u16(&mut headers, 0x0102);

        let mut optional = vec![0u8; 224];
        optional[..2].copy_from_slice(&0x010bu16.to_le_bytes());
        optional[28..32].copy_from_slice(&0x0040_0000u32.to_le_bytes());
        optional[32..36].copy_from_slice(&0x1000u32.to_le_bytes());
        optional[36..40].copy_from_slice(&0x200u32.to_le_bytes());
        optional[40..42].copy_from_slice(&4u16.to_le_bytes());
        optional[48..50].copy_from_slice(&4u16.to_le_bytes());
        optional[56..60].copy_from_slice(&0x2000u32.to_le_bytes());
        optional[60..64].copy_from_slice(&0x200u32.to_le_bytes());
        optional[68..70].copy_from_slice(&2u16.to_le_bytes());
        optional[92..96].copy_from_slice(&16u32.to_le_bytes());
        headers.extend_from_slice(&optional);

        headers.extend_from_slice(b".rsrc\0\0\0");
        push_u32(&mut headers, u32::try_from(rsrc.len()).expect("section size"));
        push_u32(&mut headers, RVA);
        push_u32(&mut headers, u32::try_from(raw_size).expect("raw size"));
        push_u32(&mut headers, u32::try_from(RAW).expect("raw offset"));
        headers.extend_from_slice(&[0; 12]);
        push_u32(&mut headers, 0x4000_0040);

        image[0x80..0x80 + headers.len()].copy_from_slice(&headers);
        rsrc.resize(raw_size, 0);
        image.extend_from_slice(&rsrc);
        image
    }
}

#[cfg(test)]
mod tests {
    use super::{fixture::*, *};
    use super::fixture::version_resource;

    #[test]
    fn fixed_file_info_gives_the_version() {
        let info = parse_version_resource(&version_resource([10, 2, 300, 4], Some(1033)))
            .expect("version resource");
        assert_eq!(
            info,
            VersionInfo {
                version: "10.2.300.4".to_string(),
                language: Some("1033".to_string()),
            }
        );
    }

    #[test]
    fn resource_language_fills_a_missing_translation() {
        let image = pe_image(&version_resource([1, 0, 0, 0], None), 1031);
        let info = parse_version_info(&image).expect("version info");
        assert_eq!(info.version, "1.0.0.0");
        assert_eq!(info.language.as_deref(), Some("1031"));
    }

    #[test]
    fn translation_wins_over_the_resource_language() {
        let image = pe_image(&version_resource([2, 5, 0, 1], Some(1033)), 0);
        let info = parse_version_info(&image).expect("version info");
        assert_eq!(info.version, "2.5.0.1");
        assert_eq!(info.language.as_deref(), Some("1033"));
    }

    #[test]
    fn other_resources_are_not_versions() {
        assert!(parse_version_resource(&[0; 8]).is_none());
        assert!(parse_version_info(b"MZ not really").is_none());
    }

    #[tokio::test]
    async fn text_files_are_not_parsed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let text = dir.path().join("readme.txt");
        std::fs::write(&text, b"read me").expect("write");
        let empty = dir.path().join("empty");
        std::fs::write(&empty, b"").expect("write");
        let image = dir.path().join("app.exe");
        std::fs::write(&image, pe_image(&version_resource([3, 1, 0, 0], Some(1033)), 1033))
            .expect("write");

        assert_eq!(read_version_info(&text).await.expect("read"), None);
        assert_eq!(read_version_info(&empty).await.expect("read"), None);
        assert_eq!(
            read_version_info(&image).await.expect("read").map(|i| i.version),
            Some("3.1.0.0".to_string())
        );
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(read_version_info(&dir.path().join("gone.exe")).await.is_err());
    }
}
