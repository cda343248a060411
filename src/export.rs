//! Prescription PDF export.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use printpdf::*;

use crate::models::Prescription;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("PDF font error: {0}")]
    Font(String),
    #[error("PDF save error: {0}")]
    Save(String),
    #[error("Invalid export filename: {0}")]
    InvalidFilename(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

const TOP: f32 = 280.0;
const BOTTOM: f32 = 20.0;

/// Write position on the current page. A new page is opened just before a
/// line that would fall below the margin.
struct Cursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
    pages: usize,
}

impl<'a> Cursor<'a> {
    fn new(doc: &'a PdfDocumentReference, layer: PdfLayerReference) -> Self {
        Self {
            doc,
            layer,
            y: TOP,
            pages: 1,
        }
    }

    fn advance(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn text(&mut self, text: &str, size: f32, x: f32, font: &IndirectFontRef, step: f32) {
        if self.y < BOTTOM {
            let (page, layer) = self.doc.add_page(Mm(210.0), Mm(297.0), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = TOP;
            self.pages += 1;
        }
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
        self.advance(step);
    }

    fn wrapped(&mut self, text: &str, size: f32, x: f32, font: &IndirectFontRef, width: usize) {
        for line in wrap_text(text, width) {
            self.text(&line, size, x, font, 4.5);
        }
    }
}

/// Render a prescription as an A4 PDF. Returns PDF bytes.
pub fn prescription_pdf(prescription: &Prescription) -> Result<Vec<u8>, ExportError> {
    let title = format!("Prescription - {}", prescription.patient_name);
    let (doc, page1, layer1) = PdfDocument::new(&title, Mm(210.0), Mm(297.0), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ExportError::Font(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ExportError::Font(e.to_string()))?;

    let mut cur = Cursor::new(&doc, doc.get_page(page1).get_layer(layer1));

    cur.text("PRESCRIPTION", 16.0, 20.0, &bold, 8.0);
    cur.text(&format!("Doctor: {}", prescription.doctor_name), 10.0, 20.0, &font, 5.0);
    cur.text(
        &format!(
            "Patient: {} <{}>",
            prescription.patient_name, prescription.patient_email
        ),
        10.0,
        20.0,
        &font,
        5.0,
    );
    if let Some(date) = &prescription.created_at {
        cur.text(&format!("Date: {date}"), 10.0, 20.0, &font, 5.0);
    }
    cur.advance(4.0);

    cur.text("DIAGNOSIS:", 11.0, 20.0, &bold, 6.0);
    cur.wrapped(&prescription.diagnosis, 10.0, 25.0, &font, 80);
    cur.advance(3.0);

    if !prescription.symptoms.trim().is_empty() {
        cur.text("SYMPTOMS:", 11.0, 20.0, &bold, 6.0);
        cur.wrapped(&prescription.symptoms, 10.0, 25.0, &font, 80);
        cur.advance(3.0);
    }

    cur.text("MEDICATIONS:", 11.0, 20.0, &bold, 6.0);
    for (i, med) in prescription.medications.iter().enumerate() {
        let line = format!(
            "{}. {} {}, {}, for {}",
            i + 1,
            med.name,
            med.dosage,
            med.frequency,
            med.duration
        );
        cur.wrapped(&line, 10.0, 25.0, &font, 80);
        if let Some(instructions) = med.instructions.as_deref().filter(|s| !s.trim().is_empty()) {
            cur.wrapped(instructions, 9.0, 30.0, &font, 75);
        }
        cur.advance(1.5);
    }
    cur.advance(3.0);

    if !prescription.advice.trim().is_empty() {
        cur.text("ADVICE:", 11.0, 20.0, &bold, 6.0);
        cur.wrapped(&prescription.advice, 10.0, 25.0, &font, 80);
        cur.advance(3.0);
    }

    if let Some(follow_up) = &prescription.follow_up {
        cur.text(&format!("Follow-up: {follow_up}"), 10.0, 20.0, &bold, 6.0);
    }

    tracing::debug!(pages = cur.pages, "Prescription rendered");
    drop(cur);
    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ExportError::Save(e.to_string()))?;
    buf.into_inner()
        .map_err(|e| ExportError::Save(e.to_string()))
}

/// File name for a prescription export, e.g. `prescription-P1.pdf`.
pub fn default_filename(prescription: &Prescription) -> String {
    let id: String = prescription
        .id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    format!("prescription-{id}.pdf")
}

/// Save PDF bytes under `dir/exports/`.
pub fn save_pdf(pdf_bytes: &[u8], filename: &str, dir: &Path) -> Result<PathBuf, ExportError> {
    let name = Path::new(filename);
    if filename.is_empty() || name.file_name() != Some(name.as_os_str()) {
        return Err(ExportError::InvalidFilename(filename.to_string()));
    }

    let exports_dir = dir.join("exports");
    std::fs::create_dir_all(&exports_dir)?;
    let path = exports_dir.join(name);
    std::fs::write(&path, pdf_bytes)?;
    tracing::info!(path = %path.display(), bytes = pdf_bytes.len(), "Prescription exported");
    Ok(path)
}

/// Greedy word wrap on character count.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.len() + word.len() + 1 > max_chars && !current.is_empty() {
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
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
