use once_cell::sync::Lazy;
use regex::Regex;

use super::normalize;
use crate::page::{ElementId, Page};

/// "<value> - change status"
static CHANGE_STATUS_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.+?)\s*-\s*change status$").unwrap());

/// "status: <value>"
static STATUS_PREFIX_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*status:\s*(.+?)\s*$").unwrap());

/// Reads the status of a row control, most structured source first
///
/// 1. the status attribute parsed as "<value> - change status" or "status: <value>"
/// 2. the text of the first nested element matching a status text selector
/// 3. the control's own text
///
/// Unexpected shapes fall through to the next step; nothing here fails.
#[derive(Debug, Clone)]
pub struct StatusExtractor {
    attribute: String,
    nested_selectors: Vec<String>,
}

impl StatusExtractor {
    pub fn new(attribute: &str, nested_selectors: &[String]) -> Self {
        Self {
            attribute: attribute.to_string(),
            nested_selectors: nested_selectors.to_vec(),
        }
    }

    /// Extract the normalized status of `element` (empty when nothing is readable)
    pub fn read(&self, page: &dyn Page, element: ElementId) -> String {
        let from_label = page
            .attribute(element, &self.attribute)
            .map(|label| parse_status_label(&label))
            .unwrap_or_default();
        if !from_label.is_empty() {
            return from_label;
        }

        let node = self
            .nested_selectors
            .iter()
            .find_map(|sel| page.query_within(element, sel))
            .unwrap_or(element);
        normalize(page.text_content(node).as_deref())
    }
}

/// Parse a structured status label, returning the normalized value or empty
pub fn parse_status_label(label: &str) -> String {
    let captured = CHANGE_STATUS_LABEL
        .captures(label)
        .or_else(|| STATUS_PREFIX_LABEL.captures(label))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());
    normalize(captured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{ElementSpec, SimulatedPage};

    fn extractor() -> StatusExtractor {
        StatusExtractor::new(
            "aria-label",
            &[
                r#"[data-testid*="status"]"#.to_string(),
                "span,div".to_string(),
            ],
        )
    }

    #[test]
    fn test_parse_change_status_label() {
        assert_eq!(parse_status_label("Done - Change status"), "done");
        assert_eq!(parse_status_label("In Progress -change status"), "in progress");
    }

    #[test]
    fn test_parse_status_prefix_label() {
        assert_eq!(parse_status_label("Status: Dev Complete"), "dev complete");
        assert_eq!(parse_status_label("  status:done  "), "done");
    }

    #[test]
    fn test_parse_unrecognized_label() {
        assert_eq!(parse_status_label("Open menu"), "");
        assert_eq!(parse_status_label(""), "");
    }

    #[test]
    fn test_read_prefers_label() {
        let page = SimulatedPage::new("/");
        let btn = page.append(
            page.body(),
            ElementSpec::new()
                .attr("aria-label", "Done - Change status")
                .text("In Progress"),
        );
        assert_eq!(extractor().read(&page, btn), "done");
    }

    #[test]
    fn test_read_falls_back_to_status_testid() {
        let page = SimulatedPage::new("/");
        let btn = page.append(
            page.body(),
            ElementSpec::new().attr("aria-label", "Change status"),
        );
        page.append(btn, ElementSpec::new().matching("div").text("icon"));
        page.append(
            btn,
            ElementSpec::new()
                .matching(r#"[data-testid*="status"]"#)
                .text(" Dev Complete "),
        );
        assert_eq!(extractor().read(&page, btn), "dev complete");
    }

    #[test]
    fn test_read_falls_back_to_first_span() {
        let page = SimulatedPage::new("/");
        let btn = page.append(page.body(), ElementSpec::new().text("ignored? "));
        page.append(btn, ElementSpec::new().matching("span").text("To Do"));
        assert_eq!(extractor().read(&page, btn), "to do");
    }

    #[test]
    fn test_read_falls_back_to_own_text() {
        let page = SimulatedPage::new("/");
        let btn = page.append(page.body(), ElementSpec::new().text("  QA  "));
        assert_eq!(extractor().read(&page, btn), "qa");
    }

    #[test]
    fn test_read_missing_element_is_empty() {
        let page = SimulatedPage::new("/");
        assert_eq!(extractor().read(&page, ElementId(999)), "");
    }
}
