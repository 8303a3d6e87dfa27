//! EPUB 3 container assembly.
//!
//! Files are generated first, each tagged with the folder it belongs to, and
//! only then packed. The archive always starts with an uncompressed
//! `mimetype` entry; every other entry lands under its folder.
use chrono::{DateTime, Utc};
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, Result};

pub mod xhtml;

use xhtml::{escape_attr, escape_text};

pub const MIMETYPE: &str = "application/epub+zip";
const PACKAGE_DOCUMENT: &str = "content.opf";
const LANGUAGE: &str = "en";

/// Folders inside the archive. Anything but `mimetype` lives in one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folder {
    Meta,
    Package,
    Styles,
    Text,
    Images,
}

impl Folder {
    pub fn path(self) -> &'static str {
        match self {
            Folder::Meta => "META-INF",
            Folder::Package => "OEBPS",
            Folder::Styles => "OEBPS/styles",
            Folder::Text => "OEBPS/text",
            Folder::Images => "OEBPS/images",
        }
    }

    /// Path relative to the package document.
    fn href_prefix(self) -> &'static str {
        match self {
            Folder::Meta => "../META-INF/",
            Folder::Package => "",
            Folder::Styles => "styles/",
            Folder::Text => "text/",
            Folder::Images => "images/",
        }
    }

    pub const ALL: [Folder; 5] = [
        Folder::Meta,
        Folder::Package,
        Folder::Styles,
        Folder::Text,
        Folder::Images,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub html_body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cover {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookMetadata {
    pub id: String,
    pub title: String,
    pub publisher: String,
    pub author: String,
    pub modified: DateTime<Utc>,
    pub cover: Option<Cover>,
}

#[derive(Debug, Clone)]
pub struct Book {
    pub metadata: BookMetadata,
    pub stylesheet: String,
    pub sections: Vec<Section>,
}

/// A file produced by generation, not yet packed.
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    pub folder: Folder,
    pub name: String,
    pub id: String,
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

impl GeneratedFile {
    fn new(folder: Folder, name: impl Into<String>, id: &str, media_type: &'static str, body: String) -> Self {
        Self {
            folder,
            name: name.into(),
            id: id.to_string(),
            media_type,
            bytes: body.into_bytes(),
        }
    }

    pub fn archive_path(&self) -> String {
        format!("{}/{}", self.folder.path(), self.name)
    }

    fn href(&self) -> String {
        format!("{}{}", self.folder.href_prefix(), self.name)
    }
}

impl Book {
    /// Generate and pack the book into EPUB bytes.
    pub fn assemble(&self) -> Result<Vec<u8>> {
        let files = self.generate()?;
        debug!(files = files.len(), sections = self.sections.len(), "packing epub");
        pack(&files)
    }

    /// Every file of the book except `mimetype`, in packing order.
    pub fn generate(&self) -> Result<Vec<GeneratedFile>> {
        if self.sections.is_empty() {
            return Err(Error::Assembly("a book needs at least one section".into()));
        }

        let mut content = Vec::new();
        content.push(GeneratedFile::new(
            Folder::Styles,
            "style.css",
            "style",
            "text/css",
            self.stylesheet.clone(),
        ));
        if let Some(cover) = &self.metadata.cover {
            let ext = cover_extension(&cover.media_type)?;
            content.push(GeneratedFile {
                folder: Folder::Images,
                name: format!("cover.{ext}"),
                id: "cover-image".into(),
                media_type: cover_media_type(ext),
                bytes: cover.bytes.clone(),
            });
        }

        let mut pages = Vec::with_capacity(self.sections.len());
        for (index, section) in self.sections.iter().enumerate() {
            let id = format!("article-{:04}", index + 1);
            pages.push(GeneratedFile::new(
                Folder::Text,
                format!("{id}.xhtml"),
                &id,
                "application/xhtml+xml",
                render_page(section),
            ));
        }

        let nav = GeneratedFile::new(
            Folder::Package,
            "nav.xhtml",
            "nav",
            "application/xhtml+xml",
            render_nav(&self.metadata, &self.sections, &pages),
        );
        let ncx = GeneratedFile::new(
            Folder::Package,
            "toc.ncx",
            "ncx",
            "application/x-dtbncx+xml",
            render_ncx(&self.metadata, &self.sections, &pages),
        );
        let opf = GeneratedFile::new(
            Folder::Package,
            PACKAGE_DOCUMENT,
            "opf",
            "application/oebps-package+xml",
            render_opf(&self.metadata, &nav, &ncx, &content, &pages),
        );
        let container = GeneratedFile::new(
            Folder::Meta,
            "container.xml",
            "container",
            "application/xml",
            render_container(&opf),
        );

        let mut files = vec![container, opf, nav, ncx];
        files.extend(content);
        files.extend(pages);
        Ok(files)
    }
}

/// Zip `files` behind a stored `mimetype` entry.
pub fn pack(files: &[GeneratedFile]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file("mimetype", stored)?;
    zip.write_all(MIMETYPE.as_bytes())
        .map_err(|err| Error::Assembly(err.to_string()))?;

    for file in files {
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(file.archive_path(), deflated)?;
        zip.write_all(&file.bytes)
            .map_err(|err| Error::Assembly(err.to_string()))?;
    }

    Ok(zip.finish()?.into_inner())
}

fn cover_extension(media_type: &str) -> Result<&'static str> {
    match media_type {
        "image/jpeg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/gif" => Ok("gif"),
        "image/svg+xml" => Ok("svg"),
        other => Err(Error::Assembly(format!("unsupported cover type {other}"))),
    }
}

fn cover_media_type(ext: &str) -> &'static str {
    match ext {
        "jpg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "image/svg+xml",
    }
}

fn render_container(opf: &GeneratedFile) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{}" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#,
        opf.archive_path()
    )
}

fn render_opf(
    meta: &BookMetadata,
    nav: &GeneratedFile,
    ncx: &GeneratedFile,
    content: &[GeneratedFile],
    pages: &[GeneratedFile],
) -> String {
    let mut manifest = String::new();
    manifest.push_str(&format!(
        "    <item id=\"{}\" href=\"{}\" media-type=\"{}\" properties=\"nav\"/>\n",
        nav.id,
        nav.href(),
        nav.media_type
    ));
    for file in std::iter::once(ncx).chain(content).chain(pages) {
        let properties = if file.id == "cover-image" {
            " properties=\"cover-image\""
        } else {
            ""
        };
        manifest.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"{}/>\n",
            file.id,
            escape_attr(&file.href()),
            file.media_type,
            properties
        ));
    }

    let spine: String = pages
        .iter()
        .map(|page| format!("    <itemref idref=\"{}\"/>\n", page.id))
        .collect();

    let cover_meta = if meta.cover.is_some() {
        "    <meta name=\"cover\" content=\"cover-image\"/>\n"
    } else {
        ""
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="book-id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">{id}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:creator>{author}</dc:creator>
    <dc:publisher>{publisher}</dc:publisher>
    <dc:language>{lang}</dc:language>
    <meta property="dcterms:modified">{modified}</meta>
{cover_meta}  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="{ncx_id}">
{spine}  </spine>
</package>
"#,
        id = escape_text(&meta.id),
        title = escape_text(&meta.title),
        author = escape_text(&meta.author),
        publisher = escape_text(&meta.publisher),
        lang = LANGUAGE,
        modified = meta.modified.format("%Y-%m-%dT%H:%M:%SZ"),
        ncx_id = ncx.id,
    )
}

fn render_nav(meta: &BookMetadata, sections: &[Section], pages: &[GeneratedFile]) -> String {
    let items: String = sections
        .iter()
        .zip(pages)
        .map(|(section, page)| {
            format!(
                "      <li><a href=\"{}\">{}</a></li>\n",
                escape_attr(&page.href()),
                escape_text(&section.title)
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
</head>
<body>
  <nav epub:type="toc" id="toc">
    <h1>{title}</h1>
    <ol>
{items}    </ol>
  </nav>
</body>
</html>
"#,
        lang = LANGUAGE,
        title = escape_text(&meta.title),
    )
}

fn render_ncx(meta: &BookMetadata, sections: &[Section], pages: &[GeneratedFile]) -> String {
    let points: String = sections
        .iter()
        .zip(pages)
        .enumerate()
        .map(|(index, (section, page))| {
            format!(
                r#"    <navPoint id="nav-{order}" playOrder="{order}">
      <navLabel><text>{title}</text></navLabel>
      <content src="{src}"/>
    </navPoint>
"#,
                order = index + 1,
                title = escape_text(&section.title),
                src = escape_attr(&page.href()),
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{id}"/>
    <meta name="dtb:depth" content="1"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle><text>{title}</text></docTitle>
  <navMap>
{points}  </navMap>
</ncx>
"#,
        id = escape_attr(&meta.id),
        title = escape_text(&meta.title),
    )
}

fn render_page(section: &Section) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" lang="{lang}">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
  <link rel="stylesheet" type="text/css" href="../styles/style.css"/>
</head>
<body>
{body}
</body>
</html>
"#,
        lang = LANGUAGE,
        title = escape_text(&section.title),
        body = xhtml::to_xhtml(&section.html_body),
    )
}
