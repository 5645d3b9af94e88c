//! The document package: an ordered set of named parts held in memory.

use std::fs::{self, File};
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{DocxError, Result};
use crate::xml::XmlDocument;

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const SETTINGS_PART: &str = "word/settings.xml";

/// All parts of a package in archive order.
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: Vec<(String, Vec<u8>)>,
}

impl Package {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every entry of a package file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::read_from(file)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from(Cursor::new(bytes))
    }

    pub fn read_from<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            parts.push((name, data));
        }
        debug!("Read package with {} parts", parts.len());
        Ok(Self { parts })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|(n, _)| n == name)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(n, _)| n.as_str())
    }

    /// Replace a part in place, or append it when new.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = data,
            None => self.parts.push((name.to_string(), data)),
        }
    }

    /// Parse a part as XML; `None` when the part does not exist.
    pub fn xml_part(&self, name: &str) -> Result<Option<XmlDocument>> {
        self.part(name)
            .map(|bytes| XmlDocument::parse(name, bytes))
            .transpose()
    }

    /// Parse a part that the caller cannot do without.
    pub fn required_xml_part(&self, name: &str) -> Result<XmlDocument> {
        self.xml_part(name)?
            .ok_or_else(|| DocxError::MissingPart(name.to_string()))
    }

    pub fn set_xml_part(&mut self, name: &str, doc: &XmlDocument) -> Result<()> {
        let bytes = doc.to_bytes()?;
        self.set_part(name, bytes);
        Ok(())
    }

    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in &self.parts {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(data)?;
        }
        Ok(zip.finish()?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.write_to(Cursor::new(Vec::new()))?.into_inner())
    }

    /// Write to `<path>.tmp` and rename over `path`, so a failed run never
    /// leaves a half-written package behind.
    pub fn save_atomic(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let temp_path = Path::new(&tmp_name).to_path_buf();

        let file = File::create(&temp_path)?;
        if let Err(e) = self.write_to(file) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        debug!("Saved package to {}", path.display());
        Ok(())
    }
}
