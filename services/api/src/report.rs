//! services/api/src/report.rs
//!
//! PDF rendering for the tax summary report and the document-desk history
//! export. Pages are A4, text is set in the standard Helvetica fonts so no
//! font files are embedded, and content streams are left uncompressed.

use bizdesk_core::summary::TaxSummary;
use chrono::{DateTime, NaiveDate, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::error::ApiError;

pub const TAX_REPORT_PREFIX: &str = "Business_Tax_Summary";
pub const HISTORY_REPORT_PREFIX: &str = "document_analysis";
pub const DEFAULT_HISTORY_TITLE: &str = "Document Analysis Report";

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
/// Rough Helvetica advance width as a fraction of the font size.
const AVG_CHAR_WIDTH: f32 = 0.5;

/// `<prefix>_<YYYYMMDD>.pdf`
pub fn report_filename(prefix: &str, date: NaiveDate) -> String {
    format!("{}_{}.pdf", prefix, date.format("%Y%m%d"))
}

/// Rand amounts with thousands separators and two decimals, e.g. `R1,234.56`.
pub fn format_rand(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("R{sign}{grouped}.{cents}")
}

/// Greedy word wrap on whitespace. Explicit newlines are kept and words longer
/// than a line are split across lines.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut line_len = 0;
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if line_len > 0 {
                    lines.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                lines.push(word.drain(..max_chars).collect());
            }
            if word.is_empty() {
                continue;
            }
            let needed = if line_len == 0 { word.len() } else { line_len + 1 + word.len() };
            if needed > max_chars {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            if line_len > 0 {
                line.push(' ');
                line_len += 1;
            }
            line.extend(word.iter());
            line_len += word.len();
        }
        lines.push(line);
    }
    lines
}

//=========================================================================================
// Page Layout
//=========================================================================================

#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Center,
    Right,
}

/// WinAnsi covers Latin-1; anything outside it prints as `?`.
fn win_ansi(text: &str) -> Object {
    let bytes = text
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect();
    Object::String(bytes, StringFormat::Literal)
}

fn estimated_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_CHAR_WIDTH
}

/// Collects pages of drawing operations, top to bottom.
struct PdfBuilder {
    pages: Vec<Vec<Operation>>,
    cursor: f32,
}

impl PdfBuilder {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            cursor: PAGE_HEIGHT - MARGIN,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.cursor = PAGE_HEIGHT - MARGIN;
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        if self.pages.is_empty() {
            self.pages.push(Vec::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// Writes one line at the cursor and moves the cursor down by `advance`.
    fn line(&mut self, text: &str, font: Font, size: f32, align: Align, advance: f32) {
        let x = match align {
            Align::Left => MARGIN,
            Align::Center => ((PAGE_WIDTH - estimated_width(text, size)) / 2.0).max(MARGIN),
            Align::Right => (PAGE_WIDTH - MARGIN - estimated_width(text, size)).max(MARGIN),
        };
        let y = self.cursor - size;
        self.ops().extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.resource_name().into(), size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![win_ansi(text)]),
            Operation::new("ET", vec![]),
        ]);
        self.cursor -= advance;
    }

    /// Like `line`, but starts a new page first when the line would not fit.
    fn flowing_line(&mut self, text: &str, font: Font, size: f32, advance: f32) {
        if self.cursor - advance < MARGIN {
            self.new_page();
        }
        self.line(text, font, size, Align::Left, advance);
    }

    fn rule(&mut self) {
        let y = self.cursor;
        self.ops().extend([
            Operation::new("m", vec![MARGIN.into(), y.into()]),
            Operation::new("l", vec![(PAGE_WIDTH - MARGIN).into(), y.into()]),
            Operation::new("S", vec![]),
        ]);
        self.cursor -= 6.0;
    }

    fn skip(&mut self, amount: f32) {
        self.cursor -= amount;
    }

    fn finish(self) -> Result<Vec<u8>, ApiError> {
        let mut doc = Document::with_version("1.5");
        let pages_id: ObjectId = doc.new_object_id();
        let regular_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular_id,
                "F2" => bold_id,
            },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(self.pages.len());
        for operations in self.pages {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
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
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out)?;
        Ok(out)
    }
}

//=========================================================================================
// Reports
//=========================================================================================

/// Three pages: cover, financial summary, deductions by category.
pub fn render_tax_report(
    business_name: &str,
    summary: &TaxSummary,
    generated_on: NaiveDate,
) -> Result<Vec<u8>, ApiError> {
    let mut pdf = PdfBuilder::new();

    pdf.new_page();
    pdf.skip(20.0);
    pdf.line("Business Tax Report & Analysis", Font::Bold, 24.0, Align::Center, 40.0);
    pdf.line(
        &format!("Generated on: {}", generated_on.format("%Y-%m-%d")),
        Font::Regular,
        12.0,
        Align::Center,
        20.0,
    );
    pdf.line(
        &format!("Business Name: {}", business_name),
        Font::Regular,
        12.0,
        Align::Center,
        20.0,
    );

    pdf.new_page();
    pdf.line("Financial Summary", Font::Bold, 16.0, Align::Left, 30.0);
    for (label, amount) in [
        ("Gross Revenue", summary.gross_revenue),
        ("Total Expenses", summary.total_expenses),
        ("Taxable Income", summary.taxable_income),
        ("Estimated Tax", summary.estimated_tax),
    ] {
        pdf.line(
            &format!("{}: {}", label, format_rand(amount)),
            Font::Regular,
            12.0,
            Align::Left,
            18.0,
        );
    }

    pdf.new_page();
    pdf.line("Deductions Summary", Font::Bold, 16.0, Align::Left, 30.0);
    for (category, amount) in &summary.deductions {
        pdf.flowing_line(
            &format!("{}: {}", category.label(), format_rand(*amount)),
            Font::Regular,
            12.0,
            18.0,
        );
    }

    pdf.finish()
}

/// The conversation history under the organization's name, wrapped and
/// paginated as it fills pages.
pub fn render_history_report(
    organization: Option<&str>,
    entries: &[String],
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, ApiError> {
    let title = organization
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_HISTORY_TITLE);
    let body_size = 12.0;
    let max_chars = ((PAGE_WIDTH - 2.0 * MARGIN) / (body_size * AVG_CHAR_WIDTH)) as usize;

    let mut pdf = PdfBuilder::new();
    pdf.new_page();
    pdf.line(title, Font::Bold, 16.0, Align::Center, 24.0);
    pdf.rule();
    pdf.line(
        &format!("Generated on: {}", generated_at.format("%Y-%m-%d %H:%M")),
        Font::Regular,
        10.0,
        Align::Right,
        24.0,
    );

    for entry in entries {
        for line in wrap_text(entry, max_chars) {
            pdf.flowing_line(&line, Font::Regular, body_size, 16.0);
        }
        pdf.skip(10.0);
    }

    pdf.finish()
}
