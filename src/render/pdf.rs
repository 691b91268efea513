use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::{info, warn};

use super::{PdfRenderer, RenderError};
use crate::models::PlotKind;

pub const REPORT_TITLE: &str = "Relatório de Análise de Síndrome Respiratória Aguda Grave (SRAG)";
pub const PLOTS_HEADING: &str = "Gráficos de Evolução";

// A4 in points.
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
const BODY_SIZE: f32 = 11.0;
const LEADING: f32 = 15.0;
const BODY_WRAP: usize = 92;
const TITLE_WRAP: usize = 62;

/// PDF report writer built on lopdf with the standard Helvetica fonts.
#[derive(Debug, Default)]
pub struct LopdfRenderer;

impl PdfRenderer for LopdfRenderer {
    fn render(
        &self,
        report_text: &str,
        plots: &BTreeMap<PlotKind, PathBuf>,
        output: &Path,
    ) -> Result<PathBuf, RenderError> {
        let generated_at = Local::now().format("%d/%m/%Y %H:%M:%S").to_string();
        let mut doc = build_document(report_text, plots, &generated_at)?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        doc.compress();
        doc.save(output)?;

        info!(path = %output.display(), "PDF report written");
        Ok(output.to_path_buf())
    }
}

/// Text pages followed by one plots page when any plot file exists.
pub fn build_document(
    report_text: &str,
    plots: &BTreeMap<PlotKind, PathBuf>,
    generated_at: &str,
) -> Result<Document, RenderError> {
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

    let mut layout = TextLayout::default();
    for line in wrap_text(REPORT_TITLE, TITLE_WRAP) {
        layout.line(&line, Font::Bold, 14.0, 18.0);
    }
    layout.line(&format!("Gerado em: {}", generated_at), Font::Regular, 9.0, LEADING);
    layout.gap(LEADING);

    for raw in report_text.lines() {
        let (text, font) = strip_markdown(raw);
        if text.is_empty() {
            layout.gap(LEADING / 2.0);
            continue;
        }
        for line in wrap_text(&text, BODY_WRAP) {
            layout.line(&line, font, BODY_SIZE, LEADING);
        }
    }

    let existing_plots: Vec<&PathBuf> = plots
        .values()
        .filter(|path| {
            let exists = path.exists();
            if !exists {
                warn!(path = %path.display(), "Plot file missing, leaving it out of the PDF");
            }
            exists
        })
        .collect();

    let mut pages = layout.finish();
    let plots_page = if existing_plots.is_empty() {
        None
    } else {
        let mut heading = TextLayout::default();
        heading.line(PLOTS_HEADING, Font::Bold, 14.0, 18.0);
        pages.extend(heading.finish());
        Some(pages.len() - 1)
    };

    let mut page_ids: Vec<ObjectId> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    "F1" => regular,
                    "F2" => bold,
                },
            },
        });
        page_ids.push(page_id);
    }

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
        "Count" => page_ids.len() as i64,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(index) = plots_page {
        let page_id = page_ids[index];
        let width = PAGE_WIDTH - 2.0 * MARGIN;
        let mut top = PAGE_HEIGHT - MARGIN - 30.0;
        for path in existing_plots {
            let image = lopdf::xobject::image(path)?;
            let height = image_height(&image, width);
            top -= height;
            doc.insert_image(page_id, image, (MARGIN, top), (width, height))?;
            top -= 20.0;
        }
    }

    Ok(doc)
}

/// Scaled height preserving the image's aspect ratio.
fn image_height(image: &Stream, width: f32) -> f32 {
    let dimension = |key: &[u8]| image.dict.get(key).and_then(Object::as_i64).ok();
    match (dimension(b"Width"), dimension(b"Height")) {
        (Some(w), Some(h)) if w > 0 => width * h as f32 / w as f32,
        _ => width / 2.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(&self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Top-down line placement with automatic page breaks.
struct TextLayout {
    pages: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    y: f32,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            current: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }
}

impl TextLayout {
    fn line(&mut self, text: &str, font: Font, size: f32, leading: f32) {
        if self.y - leading < MARGIN {
            self.break_page();
        }
        self.y -= leading;
        self.current.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.resource().into(), size.into()]),
            Operation::new("Td", vec![MARGIN.into(), self.y.into()]),
            Operation::new("Tj", vec![Object::string_literal(encode_win_ansi(text))]),
            Operation::new("ET", vec![]),
        ]);
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn break_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.current));
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

/// Drop markdown emphasis; headings and bold-only lines use the bold face.
fn strip_markdown(line: &str) -> (String, Font) {
    let trimmed = line.trim();
    let heading = trimmed.trim_start_matches('#');
    let is_heading = heading.len() != trimmed.len();
    let bold_only = trimmed.starts_with("**") && trimmed.ends_with("**") && trimmed.len() > 4;

    let plain = heading.trim().replace("**", "").replace('`', "");
    let text = match plain.strip_prefix("- ").or_else(|| plain.strip_prefix("* ")) {
        Some(rest) => format!("• {}", rest),
        None => plain.clone(),
    };

    let font = if is_heading || bold_only { Font::Bold } else { Font::Regular };
    (text, font)
}

/// Greedy word wrap on character count.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Encode for the standard fonts' WinAnsiEncoding; unmappable characters become '?'.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '€' => 0x80,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            c if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) => c as u8,
            _ => b'?',
        })
        .collect()
}
