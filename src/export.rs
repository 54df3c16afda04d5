//! Spreadsheet export of the idea catalog.
//!
//! Produces a single-sheet `.xlsx` workbook (sheet `Avoid Data`) with one
//! row per idea. The workbook is written directly as Office Open XML parts
//! in a zip archive; cells use inline strings, so no shared-string table is
//! needed.

use anyhow::Result;
use ideavoid_core::models::Idea;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const FILE_NAME: &str = "avoid_data.xlsx";
pub const SHEET_NAME: &str = "Avoid Data";

/// Header label and column width (in characters).
const COLUMNS: &[(&str, u32)] = &[
    ("Name", 30),
    ("Description", 60),
    ("Tags", 40),
    ("Pain Points", 60),
    ("Category", 15),
    ("Saturation Level", 15),
    ("Competitor Count", 15),
    ("Market Type", 15),
    ("TAM", 15),
    ("Validation Status", 15),
    ("Last Verified", 15),
];

const SHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

enum Cell {
    Text(String),
    Number(usize),
    Empty,
}

/// Strips a leading bullet (twice, for `- • item`) and upper-cases the
/// first letter.
pub fn format_pain_point(pain_point: &str) -> String {
    let mut text = pain_point.trim();
    for _ in 0..2 {
        if let Some(rest) = text.strip_prefix(['•', '-', '*']) {
            text = rest.trim_start();
        }
    }
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn row_for(idea: &Idea) -> Vec<Cell> {
    let text = |s: &str| {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    };
    let saturation = idea.saturation.as_ref();
    let pain_points = idea
        .pain_points
        .iter()
        .map(|p| format_pain_point(p))
        .collect::<Vec<_>>()
        .join("; ");

    vec![
        text(&idea.name),
        text(&idea.description),
        text(&idea.tags.join("; ")),
        text(&pain_points),
        text(idea.category.as_deref().unwrap_or("")),
        text(saturation.map(|s| s.level.as_str()).unwrap_or("")),
        match saturation.map(|s| s.competitor_count) {
            Some(n) if n > 0 => Cell::Number(n),
            _ => Cell::Empty,
        },
        text(saturation.map(|s| s.market_type.as_str()).unwrap_or("")),
        text(saturation.map(|s| s.tam.as_str()).unwrap_or("")),
        text(idea.validation.as_ref().map(|v| v.status.as_str()).unwrap_or("")),
        text(
            &saturation
                .map(|s| s.last_verified.to_rfc3339())
                .unwrap_or_default(),
        ),
    ]
}

/// `0 -> A`, `25 -> Z`, `26 -> AA`.
fn column_letter(mut index: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// XML 1.0 forbids most control characters, even escaped.
fn xml_safe(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

fn write_cell<W: Write>(w: &mut Writer<W>, reference: &str, cell: &Cell) -> Result<()> {
    match cell {
        Cell::Empty => {}
        Cell::Number(n) => {
            w.write_event(Event::Start(
                BytesStart::new("c").with_attributes([("r", reference)]),
            ))?;
            w.write_event(Event::Start(BytesStart::new("v")))?;
            w.write_event(Event::Text(BytesText::new(&n.to_string())))?;
            w.write_event(Event::End(BytesEnd::new("v")))?;
            w.write_event(Event::End(BytesEnd::new("c")))?;
        }
        Cell::Text(s) => {
            w.write_event(Event::Start(
                BytesStart::new("c").with_attributes([("r", reference), ("t", "inlineStr")]),
            ))?;
            w.write_event(Event::Start(BytesStart::new("is")))?;
            w.write_event(Event::Start(
                BytesStart::new("t").with_attributes([("xml:space", "preserve")]),
            ))?;
            w.write_event(Event::Text(BytesText::new(&xml_safe(s))))?;
            w.write_event(Event::End(BytesEnd::new("t")))?;
            w.write_event(Event::End(BytesEnd::new("is")))?;
            w.write_event(Event::End(BytesEnd::new("c")))?;
        }
    }
    Ok(())
}

fn write_row<W: Write>(w: &mut Writer<W>, row_number: usize, cells: &[Cell]) -> Result<()> {
    let r = row_number.to_string();
    w.write_event(Event::Start(
        BytesStart::new("row").with_attributes([("r", r.as_str())]),
    ))?;
    for (col, cell) in cells.iter().enumerate() {
        let reference = format!("{}{}", column_letter(col), row_number);
        write_cell(w, &reference, cell)?;
    }
    w.write_event(Event::End(BytesEnd::new("row")))?;
    Ok(())
}

fn sheet_xml(ideas: &[Idea]) -> Result<Vec<u8>> {
    let mut w = Writer::new(Vec::new());
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    w.write_event(Event::Start(
        BytesStart::new("worksheet").with_attributes([("xmlns", SHEET_NS), ("xmlns:r", REL_NS)]),
    ))?;

    w.write_event(Event::Start(BytesStart::new("cols")))?;
    for (i, (_, width)) in COLUMNS.iter().enumerate() {
        let n = (i + 1).to_string();
        let width = width.to_string();
        w.write_event(Event::Empty(BytesStart::new("col").with_attributes([
            ("min", n.as_str()),
            ("max", n.as_str()),
            ("width", width.as_str()),
            ("customWidth", "1"),
        ])))?;
    }
    w.write_event(Event::End(BytesEnd::new("cols")))?;

    w.write_event(Event::Start(BytesStart::new("sheetData")))?;
    let header: Vec<Cell> = COLUMNS
        .iter()
        .map(|(label, _)| Cell::Text(label.to_string()))
        .collect();
    write_row(&mut w, 1, &header)?;
    for (i, idea) in ideas.iter().enumerate() {
        write_row(&mut w, i + 2, &row_for(idea))?;
    }
    w.write_event(Event::End(BytesEnd::new("sheetData")))?;
    w.write_event(Event::End(BytesEnd::new("worksheet")))?;

    Ok(w.into_inner())
}

fn workbook_xml() -> Result<Vec<u8>> {
    let mut w = Writer::new(Vec::new());
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    w.write_event(Event::Start(
        BytesStart::new("workbook").with_attributes([("xmlns", SHEET_NS), ("xmlns:r", REL_NS)]),
    ))?;
    w.write_event(Event::Start(BytesStart::new("sheets")))?;
    w.write_event(Event::Empty(BytesStart::new("sheet").with_attributes([
        ("name", SHEET_NAME),
        ("sheetId", "1"),
        ("r:id", "rId1"),
    ])))?;
    w.write_event(Event::End(BytesEnd::new("sheets")))?;
    w.write_event(Event::End(BytesEnd::new("workbook")))?;
    Ok(w.into_inner())
}

/// Builds the workbook in memory.
pub fn build_workbook(ideas: &[Idea]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, Vec<u8>); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.as_bytes().to_vec()),
        ("_rels/.rels", ROOT_RELS_XML.as_bytes().to_vec()),
        ("xl/workbook.xml", workbook_xml()?),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML.as_bytes().to_vec()),
        ("xl/worksheets/sheet1.xml", sheet_xml(ideas)?),
    ];
    for (name, bytes) in parts {
        zip.start_file(name, options)?;
        zip.write_all(&bytes)?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Writes the workbook to `output`, creating parent directories.
pub fn write_workbook(ideas: &[Idea], output: &Path) -> Result<()> {
    let bytes = build_workbook(ideas)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, bytes)?;
    eprintln!("Exported {} ideas to {}", ideas.len(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ideavoid_core::saturation::from_competitor_count;
    use std::io::Read;

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    /// Text of every `<t>` and `<v>` element, in document order.
    fn cell_texts(xml: &str) -> Vec<String> {
        let mut reader = quick_xml::Reader::from_str(xml);
        let mut out = Vec::new();
        let mut inside = false;
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) if matches!(e.name().as_ref(), b"t" | b"v") => inside = true,
                Event::End(e) if matches!(e.name().as_ref(), b"t" | b"v") => inside = false,
                Event::Text(t) if inside => out.push(t.unescape().unwrap().into_owned()),
                Event::Eof => break,
                _ => {}
            }
        }
        out
    }

    #[test]
    fn test_format_pain_point() {
        assert_eq!(format_pain_point("- slow onboarding"), "Slow onboarding");
        assert_eq!(format_pain_point("• - nested bullet"), "Nested bullet");
        assert_eq!(format_pain_point("  * émigré"), "Émigré");
        assert_eq!(format_pain_point(""), "");
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(10), "K");
        assert_eq!(column_letter(26), "AA");
    }

    #[test]
    fn test_workbook_contents() {
        let mut idea = Idea::new(
            "Meal <Planner> & Co",
            "Plan meals",
            vec!["food".into(), "family".into()],
        );
        idea.pain_points = vec!["- too slow".into(), "costly".into()];
        idea.saturation = Some(from_competitor_count(12, Utc::now()));
        let plain = Idea::new("Bare", "", vec![]);

        let bytes = build_workbook(&[idea, plain]).unwrap();

        let workbook = read_part(&bytes, "xl/workbook.xml");
        assert!(workbook.contains(r#"name="Avoid Data""#));

        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"width="60""#));
        let texts = cell_texts(&sheet);
        assert_eq!(texts[0], "Name");
        assert_eq!(texts[10], "Last Verified");
        assert_eq!(texts[11], "Meal <Planner> & Co");
        assert_eq!(texts[12], "Plan meals");
        assert_eq!(texts[13], "food; family");
        assert_eq!(texts[14], "Too slow; Costly");
        assert_eq!(texts[15], "medium");
        assert_eq!(texts[16], "12");
        assert_eq!(texts[17], "blue ocean");
        assert_eq!(texts[18], "$50M+");
        // Second idea only has a name.
        assert_eq!(texts.last().map(String::as_str), Some("Bare"));
    }

    #[test]
    fn test_control_characters_are_stripped() {
        assert_eq!(xml_safe("a\u{0}b\tc\u{1b}"), "ab\tc");
    }
}
