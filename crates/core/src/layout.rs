use crate::models::{metadata_str, Document, ElementCategory, LayoutElement, PAGE_NUMBER_KEY};

pub trait LayoutParser: Send + Sync {
    fn parse(&self, document: &Document) -> Vec<LayoutElement>;
}

#[derive(Debug, Clone, Copy)]
pub struct TextLayoutParser {
    pub max_title_chars: usize,
}

impl Default for TextLayoutParser {
    fn default() -> Self {
        Self {
            max_title_chars: 80,
        }
    }
}

impl LayoutParser for TextLayoutParser {
    fn parse(&self, document: &Document) -> Vec<LayoutElement> {
        let file_path = document.file_path().to_string();
        let page = page_of(document);

        let mut elements = Vec::new();
        let mut block: Vec<&str> = Vec::new();
        let mut block_start = 0u32;

        for (line_no, line) in document.text.lines().enumerate() {
            if line.trim().is_empty() {
                if !block.is_empty() {
                    elements.push(self.element(&block, &file_path, page, block_start));
                    block.clear();
                }
                continue;
            }
            if is_heading(line) {
                if !block.is_empty() {
                    elements.push(self.element(&block, &file_path, page, block_start));
                    block.clear();
                }
                elements.push(self.element(&[line], &file_path, page, line_no as u32));
                continue;
            }
            if block.is_empty() {
                block_start = line_no as u32;
            }
            block.push(line);
        }

        if !block.is_empty() {
            elements.push(self.element(&block, &file_path, page, block_start));
        }

        elements
    }
}

impl TextLayoutParser {
    fn element(&self, lines: &[&str], file_path: &str, page: u32, position: u32) -> LayoutElement {
        let category = self.classify(lines);
        let text = match category {
            ElementCategory::Title => lines[0].trim().trim_start_matches('#').trim().to_string(),
            ElementCategory::Table | ElementCategory::ListItem => lines
                .iter()
                .map(|line| line.trim_end())
                .collect::<Vec<_>>()
                .join("\n"),
            ElementCategory::NarrativeText => lines
                .iter()
                .map(|line| line.trim())
                .collect::<Vec<_>>()
                .join(" "),
        };

        LayoutElement {
            text,
            category,
            file_path: file_path.to_string(),
            page,
            position,
        }
    }

    fn classify(&self, lines: &[&str]) -> ElementCategory {
        if lines.len() == 1 && self.is_title(lines[0].trim()) {
            return ElementCategory::Title;
        }
        if lines.iter().all(|line| is_table_row(line)) {
            return ElementCategory::Table;
        }
        if lines.iter().all(|line| is_list_line(line.trim_start())) {
            return ElementCategory::ListItem;
        }
        ElementCategory::NarrativeText
    }

    fn is_title(&self, line: &str) -> bool {
        if is_heading(line) {
            return true;
        }
        if line.chars().count() > self.max_title_chars || line.ends_with('.') {
            return false;
        }
        let mut letters = line.chars().filter(|c| c.is_alphabetic()).peekable();
        letters.peek().is_some() && letters.all(|c| c.is_uppercase())
    }
}

fn is_heading(line: &str) -> bool {
    let trimmed = line.trim_start();
    let marks = trimmed.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&marks) && trimmed[marks..].starts_with(' ')
}

fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.matches('|').count() >= 2 || trimmed.contains('\t')
}

fn is_list_line(line: &str) -> bool {
    if line.starts_with("- ") || line.starts_with("* ") || line.starts_with("• ") {
        return true;
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with(". ")
}

fn page_of(document: &Document) -> u32 {
    metadata_str(&document.metadata, PAGE_NUMBER_KEY)
        .or_else(|| metadata_str(&document.metadata, "page_label"))
        .and_then(|label| label.trim().parse().ok())
        .unwrap_or(1)
}
