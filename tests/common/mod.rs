#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lopdf::{dictionary, Document, Object, Stream};

use fillmeup_server::perception::{CommandError, CommandOutput, CommandRunner};
use fillmeup_server::template::{TemplateDocument, TextRun};

pub const PAGE_HEIGHT: f32 = 792.0;

/// A Letter-sized PDF with one page per content string.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for content in pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save fixture");
    out
}

pub fn blank_pdf() -> Vec<u8> {
    pdf_with_pages(&["BT /F1 12 Tf 72 760 Td (Registration form) Tj ET"])
}

/// Template whose first page prints "Male" and "Female" side by side at
/// authoring y 100 (baseline 680 in rendering space).
pub fn gender_pdf() -> Vec<u8> {
    pdf_with_pages(&["BT /F1 11 Tf 100 680 Td (Male) Tj 80 0 Td (Female) Tj ET"])
}

pub fn texts_on_page(path: &Path, page: u32) -> Vec<TextRun> {
    let bytes = std::fs::read(path).expect("read output");
    TemplateDocument::load(&bytes)
        .expect("load output")
        .text_runs(page)
        .expect("text runs")
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

pub fn raw_rows(rows: &[&[&str]]) -> Vec<Vec<Option<String>>> {
    rows.iter()
        .map(|row| row.iter().map(|cell| Some(cell.to_string())).collect())
        .collect()
}

/// Records every invocation and answers OCR with canned TSV.
pub struct StubRunner {
    pub calls: Mutex<Vec<(String, Vec<String>)>>,
    tsv: Option<String>,
}

impl StubRunner {
    pub fn with_tsv(tsv: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            tsv: Some(tsv.to_string()),
        })
    }

    /// Every command exits with status 1.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            tsv: None,
        })
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .map(|(program, _)| program.clone())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for StubRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError> {
        self.calls
            .lock()
            .expect("calls")
            .push((program.to_string(), args.to_vec()));

        match &self.tsv {
            None => Err(CommandError::Exit {
                program: program.to_string(),
                code: 1,
                stderr: "stubbed failure".to_string(),
            }),
            Some(tsv) if program == "tesseract" => Ok(CommandOutput {
                stdout: tsv.clone().into_bytes(),
                stderr: Vec::new(),
            }),
            Some(_) => Ok(CommandOutput::default()),
        }
    }
}

/// Tesseract TSV with a single word box.
pub fn tsv_word(text: &str, left: u32, top: u32, width: u32, height: u32) -> String {
    format!(
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
         5\t1\t1\t1\t1\t1\t{left}\t{top}\t{width}\t{height}\t95.0\t{text}\n"
    )
}
