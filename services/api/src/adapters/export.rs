//! services/api/src/adapters/export.rs
//!
//! This module contains the export assembler: it combines finalized
//! chapters into a single Markdown document. PDF and EPUB rendering belong
//! to external renderers behind the same port; requesting them from this
//! adapter yields a typed unsupported-format error.

use autopen_core::domain::{Chapter, Ebook};
use autopen_core::ports::{ExportAssembler, ExportError, ExportFormat};

/// An assembler that renders the ebook as a Markdown document.
#[derive(Clone, Default)]
pub struct MarkdownAssembler;

impl MarkdownAssembler {
    pub fn new() -> Self {
        Self
    }

    fn render(&self, ebook: &Ebook, chapters: &[Chapter]) -> String {
        let mut chapters: Vec<&Chapter> = chapters.iter().collect();
        chapters.sort_by_key(|c| c.order_index);

        let mut doc = format!("# {}\n\n{}\n", ebook.title, ebook.description);
        for chapter in chapters {
            doc.push_str(&format!("\n## {}\n\n", chapter.title));
            if let Some(content) = &chapter.content {
                doc.push_str(content);
                if !content.ends_with('\n') {
                    doc.push('\n');
                }
            }
        }
        doc
    }
}

impl ExportAssembler for MarkdownAssembler {
    fn assemble(
        &self,
        ebook: &Ebook,
        chapters: &[Chapter],
        format: ExportFormat,
    ) -> Result<Vec<u8>, ExportError> {
        match format {
            ExportFormat::Markdown => Ok(self.render(ebook, chapters).into_bytes()),
            ExportFormat::Pdf | ExportFormat::Epub => {
                Err(ExportError::UnsupportedFormat(format))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use autopen_core::domain::{ChapterStatus, EbookStatus};
    use uuid::Uuid;

    fn ebook() -> Ebook {
        Ebook {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            title: "My Guide".to_string(),
            description: "A short guide".to_string(),
            status: EbookStatus::Complete,
            cover_image_url: None,
        }
    }

    fn chapter(ebook_id: Uuid, title: &str, order_index: u32, content: &str) -> Chapter {
        Chapter {
            id: Uuid::new_v4(),
            ebook_id,
            title: title.to_string(),
            order_index,
            content: Some(content.to_string()),
            status: ChapterStatus::Generated,
        }
    }

    #[test]
    fn chapters_render_in_order_index_order() {
        let ebook = ebook();
        // Deliberately out of order, with a gap from a deleted chapter.
        let chapters = vec![
            chapter(ebook.id, "Conclusion", 3, "the end"),
            chapter(ebook.id, "Introduction", 0, "the start"),
        ];

        let bytes = MarkdownAssembler::new()
            .assemble(&ebook, &chapters, ExportFormat::Markdown)
            .unwrap();
        let doc = String::from_utf8(bytes).unwrap();

        let intro = doc.find("## Introduction").unwrap();
        let conclusion = doc.find("## Conclusion").unwrap();
        assert!(intro < conclusion);
        assert!(doc.starts_with("# My Guide"));
    }

    #[test]
    fn binary_formats_are_not_rendered_here() {
        let ebook = ebook();
        let result = MarkdownAssembler::new().assemble(&ebook, &[], ExportFormat::Pdf);
        assert_matches!(result, Err(ExportError::UnsupportedFormat(ExportFormat::Pdf)));
    }
}
