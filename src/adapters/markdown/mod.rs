use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};

pub const DEFAULT_TITLE: &str = "Product Requirements Document";
pub const DEFAULT_FILE_NAME: &str = "product-requirements-document.md";
const FILE_NAME_SUFFIX: &str = "requirements-document.md";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: usize,
    pub text: String,
}

/// Headings in document order, inline markup flattened to text.
pub fn outline(markdown: &str) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut current: Option<(HeadingLevel, String)> = None;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some((level, String::new()));
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, buffer)) = current.as_mut() {
                    buffer.push_str(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some((_, buffer)) = current.as_mut() {
                    buffer.push(' ');
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, text)) = current.take() {
                    let text = text.trim().to_string();
                    if !text.is_empty() {
                        headings.push(Heading {
                            level: level as usize,
                            text,
                        });
                    }
                }
            }
            _ => {}
        }
    }

    headings
}

/// First level-one heading, else the generic document title.
pub fn document_title(markdown: &str) -> String {
    outline(markdown)
        .into_iter()
        .find(|heading| heading.level == 1)
        .map(|heading| heading.text)
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// `<app-slug>-requirements-document.md`, or the generic name when the app
/// name has nothing usable in it.
pub fn download_file_name(app_name: &str) -> String {
    let slug = slugify(app_name);
    if slug.is_empty() {
        return DEFAULT_FILE_NAME.to_string();
    }
    format!("{slug}-{FILE_NAME_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRD: &str = "# TaskFlow PRD\n\nIntro text.\n\n## 1. Executive Summary\n\nSummary.\n\n### Goals for `v1`\n\n- ship\n\n## 2. Product Overview\n";

    #[test]
    fn test_outline_lists_headings_in_order() {
        let headings = outline(PRD);
        let rendered = headings
            .iter()
            .map(|h| format!("{}:{}", h.level, h.text))
            .collect::<Vec<_>>();
        assert_eq!(
            rendered,
            vec![
                "1:TaskFlow PRD",
                "2:1. Executive Summary",
                "3:Goals for v1",
                "2:2. Product Overview",
            ]
        );
    }

    #[test]
    fn test_title_is_first_h1() {
        assert_eq!(document_title(PRD), "TaskFlow PRD");
        assert_eq!(
            document_title("## Only a section\n\ntext"),
            "Product Requirements Document"
        );
        assert_eq!(document_title(""), DEFAULT_TITLE);
    }

    #[test]
    fn test_thematic_breaks_keep_the_title() {
        let md = "---\n# TaskFlow PRD\n\nIntro\n\n---\n\n## 1. Executive Summary\n";
        assert_eq!(document_title(md), "TaskFlow PRD");
        let levels = outline(md).iter().map(|h| h.level).collect::<Vec<_>>();
        assert_eq!(levels, vec![1, 2]);

        let crlf = "# TaskFlow PRD\r\n\r\n## Goals\r\n";
        assert_eq!(document_title(crlf), "TaskFlow PRD");
        assert_eq!(outline(crlf).len(), 2);
    }

    #[test]
    fn test_download_file_name() {
        assert_eq!(
            download_file_name("TaskFlow Pro!"),
            "taskflow-pro-requirements-document.md"
        );
        assert_eq!(download_file_name("  --  "), "product-requirements-document.md");
        assert_eq!(slugify("Café  Menu 2"), "café-menu-2");
    }
}
