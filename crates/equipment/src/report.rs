//! Report rendering.
//!
//! A [`ReportDocument`] is assembled completely from an aggregate snapshot and
//! the dataset's records before any PDF bytes are produced.

use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

use crate::{AggregateSnapshot, Averages, Dataset, Error, MeasurementRecord, Result, REPORT_SAMPLE_LIMIT};

/// Printed in place of an average that does not exist.
pub const NO_DATA: &str = "no data";

const PAGE_WIDTH: f32 = 612.0; // US Letter
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 54.0;
const ROW_HEIGHT: f32 = 18.0;
const CELL_PAD: f32 = 4.0;

const FONT_REGULAR: &str = "F1";
const FONT_BOLD: &str = "F2";

const SUMMARY: usize = 0;
const DISTRIBUTION: usize = 1;
const SAMPLE: usize = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct ReportSection {
    pub heading: String,
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
    widths: Vec<f32>,
    font_size: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReportDocument {
    title: String,
    averages: Averages,
    sections: Vec<ReportSection>,
    footer: String,
}

/// Finished report, ready to download.
#[derive(Clone, Debug)]
pub struct ReportArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub fn format_metric(value: f64) -> String {
    format!("{value:.2}")
}

fn format_average(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) if unit.is_empty() => format_metric(v),
        Some(v) => format!("{} {unit}", format_metric(v)),
        None => NO_DATA.to_string(),
    }
}

/// `report_<name>_<YYYYMMDD>.pdf`, safe to drop into a Content-Disposition header.
pub fn report_file_name(dataset_name: &str, generated_at: DateTime<Utc>) -> String {
    let name: String = dataset_name
        .chars()
        .map(|c| match c {
            '"' | '\\' | '/' | ';' => '_',
            c if c.is_control() || !c.is_ascii() => '_',
            c => c,
        })
        .collect();
    format!("report_{name}_{}.pdf", generated_at.format("%Y%m%d"))
}

impl ReportDocument {
    pub fn build(
        dataset: &Dataset,
        snapshot: &AggregateSnapshot,
        records: &[MeasurementRecord],
        generated_at: DateTime<Utc>,
    ) -> Self {
        let avg = &snapshot.averages;
        let summary = ReportSection {
            heading: "Summary Statistics".into(),
            header: None,
            rows: vec![
                vec!["Total Equipment".into(), snapshot.count.to_string()],
                vec!["Average Flowrate".into(), format_average(avg.flowrate, "")],
                vec!["Average Pressure".into(), format_average(avg.pressure, "Pa")],
                vec!["Average Temperature".into(), format_average(avg.temperature, "°C")],
            ],
            widths: vec![200.0, 200.0],
            font_size: 11.0,
        };

        let distribution = ReportSection {
            heading: "Equipment Distribution by Type".into(),
            header: Some(vec!["Type".into(), "Count".into()]),
            rows: snapshot
                .distribution_sorted()
                .into_iter()
                .map(|t| vec![t.eq_type, t.count.to_string()])
                .collect(),
            widths: vec![200.0, 200.0],
            font_size: 11.0,
        };

        let sample = ReportSection {
            heading: format!("Sample Equipment Data (First {REPORT_SAMPLE_LIMIT})"),
            header: Some(
                ["Name", "Type", "Flowrate", "Pressure", "Temperature"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
            rows: records
                .iter()
                .take(REPORT_SAMPLE_LIMIT)
                .map(|r| {
                    vec![
                        r.name.clone(),
                        r.eq_type.clone(),
                        format_metric(r.flowrate),
                        format_metric(r.pressure),
                        format_metric(r.temperature),
                    ]
                })
                .collect(),
            widths: vec![120.0, 80.0, 80.0, 80.0, 100.0],
            font_size: 8.0,
        };

        Self {
            title: format!("Equipment Analysis Report: {}", dataset.name),
            averages: snapshot.averages,
            sections: vec![summary, distribution, sample],
            footer: format!("Generated on: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC")),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The unformatted averages behind the summary table.
    pub fn averages(&self) -> Averages {
        self.averages
    }

    pub fn footer(&self) -> &str {
        &self.footer
    }

    pub fn sections(&self) -> &[ReportSection] {
        &self.sections
    }

    pub fn summary(&self) -> &ReportSection {
        &self.sections[SUMMARY]
    }

    pub fn distribution(&self) -> &ReportSection {
        &self.sections[DISTRIBUTION]
    }

    pub fn sample(&self) -> &ReportSection {
        &self.sections[SAMPLE]
    }

    /// Lays the document out on Letter pages and serializes it to PDF.
    pub fn to_pdf(&self) -> Result<Vec<u8>> {
        let mut layout = Layout::new();
        layout.paragraph(FONT_BOLD, 18.0, &self.title);
        layout.gap(12.0);

        for section in &self.sections {
            layout.paragraph(FONT_BOLD, 13.0, &section.heading);
            layout.gap(4.0);
            layout.table(section);
            layout.gap(20.0);
        }
        layout.paragraph(FONT_REGULAR, 10.0, &self.footer);

        write_pdf(layout.finish())
    }
}

fn write_pdf(pages: Vec<Vec<Operation>>) -> Result<Vec<u8>> {
    let render_err = |e: &dyn std::fmt::Display| Error::Render(e.to_string());

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            FONT_REGULAR => regular,
            FONT_BOLD => bold,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let encoded = content.encode().map_err(|e| render_err(&e))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(PAGE_WIDTH),
                Object::Real(PAGE_HEIGHT),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| render_err(&e))?;
    Ok(out)
}

/// Top-down cursor over a sequence of pages.
struct Layout {
    pages: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    y: f32,
}

impl Layout {
    fn new() -> Self {
        Self { pages: vec![], ops: vec![], y: PAGE_HEIGHT - MARGIN }
    }

    fn break_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.ops));
        self.y = PAGE_HEIGHT - MARGIN;
    }

    /// Starts a new page unless `height` still fits on this one.
    fn reserve(&mut self, height: f32) -> bool {
        if self.y - height < MARGIN && !self.ops.is_empty() {
            self.break_page();
            return true;
        }
        false
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn paragraph(&mut self, font: &str, size: f32, text: &str) {
        self.reserve(size * 1.4);
        self.y -= size;
        self.text(font, size, MARGIN, self.y, 0.0, text);
        self.y -= size * 0.4;
    }

    fn table(&mut self, section: &ReportSection) {
        if let Some(header) = &section.header {
            self.reserve(ROW_HEIGHT);
            self.row(section, header, FONT_BOLD, true);
        }
        for cells in &section.rows {
            // repeat the header on continuation pages
            if self.reserve(ROW_HEIGHT) {
                if let Some(header) = &section.header {
                    self.row(section, header, FONT_BOLD, true);
                }
            }
            self.row(section, cells, FONT_REGULAR, false);
        }
    }

    fn row(&mut self, section: &ReportSection, cells: &[String], font: &str, header: bool) {
        self.y -= ROW_HEIGHT;
        let mut x = MARGIN;

        for (cell, width) in cells.iter().zip(&section.widths) {
            let rect = vec![
                Object::Real(x),
                Object::Real(self.y),
                Object::Real(*width),
                Object::Real(ROW_HEIGHT),
            ];
            if header {
                self.ops.push(Operation::new("g", vec![Object::Real(0.5)]));
                self.ops.push(Operation::new("re", rect.clone()));
                self.ops.push(Operation::new("f", vec![]));
            }
            self.ops.push(Operation::new("G", vec![Object::Real(0.0)]));
            self.ops.push(Operation::new("w", vec![Object::Real(0.75)]));
            self.ops.push(Operation::new("re", rect));
            self.ops.push(Operation::new("S", vec![]));

            let fitted = fit(cell, *width, section.font_size);
            let gray = if header { 1.0 } else { 0.0 };
            let baseline = self.y + (ROW_HEIGHT - section.font_size) / 2.0 + 1.0;
            self.text(font, section.font_size, x + CELL_PAD, baseline, gray, &fitted);

            x += width;
        }
    }

    fn text(&mut self, font: &str, size: f32, x: f32, y: f32, gray: f32, text: &str) {
        self.ops.push(Operation::new("g", vec![Object::Real(gray)]));
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), Object::Real(size)]));
        self.ops.push(Operation::new("Td", vec![Object::Real(x), Object::Real(y)]));
        self.ops.push(Operation::new("Tj", vec![Object::String(win_ansi(text), StringFormat::Literal)]));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        if !self.ops.is_empty() || self.pages.is_empty() {
            self.break_page();
        }
        self.pages
    }
}

/// Shortens `text` to roughly fit a cell; Helvetica averages about 0.55 em per glyph.
fn fit(text: &str, width: f32, size: f32) -> String {
    let max = ((width - 2.0 * CELL_PAD) / (size * 0.55)).max(4.0) as usize;
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max - 3).collect();
    out.push_str("...");
    out
}

/// Encodes text for the standard fonts' WinAnsiEncoding.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7e | 0xa0..=0xff => c as u8,
            _ => match c {
                '€' => 0x80,
                '‘' => 0x91,
                '’' => 0x92,
                '“' => 0x93,
                '”' => 0x94,
                '•' => 0x95,
                '–' => 0x96,
                '—' => 0x97,
                _ => b'?',
            },
        })
        .collect()
}
