//! services/tracker/src/web/pages.rs
//!
//! HTML pages served after a tracked request succeeds.
//!
//! The pages directory holds one `clicked.<template>.html` per campaign
//! template and a shared `phished.html`. Pages may use the `{target_id}`,
//! `{pool_id}`, `{group}` and `{template}` placeholders, e.g. to build the
//! `/submit?t=…&p=…` form action.

use crate::templating::fill;
use phishing_core::domain::TrackingContext;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

const CLICKED_PREFIX: &str = "clicked.";
const PAGE_SUFFIX: &str = ".html";
const PHISHED_PAGE: &str = "phished.html";

#[derive(Debug, Clone, Default)]
pub struct Pages {
    clicked: HashMap<String, String>,
    phished: String,
}

impl Pages {
    pub fn new(clicked: HashMap<String, String>, phished: impl Into<String>) -> Self {
        Self {
            clicked,
            phished: phished.into(),
        }
    }

    /// Loads every page from `dir`. A missing `phished.html` is an error.
    pub fn load(dir: &Path) -> std::io::Result<Self> {
        let mut clicked = HashMap::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let template = name
                .strip_prefix(CLICKED_PREFIX)
                .and_then(|rest| rest.strip_suffix(PAGE_SUFFIX));
            if let Some(template) = template {
                clicked.insert(template.to_string(), std::fs::read_to_string(entry.path())?);
            }
        }
        let phished = std::fs::read_to_string(dir.join(PHISHED_PAGE))?;

        info!(
            "Loaded {} clicked page(s) and the phished page from {}",
            clicked.len(),
            dir.display()
        );
        Ok(Self { clicked, phished })
    }

    /// The page for the pool's template, or `None` when no page exists for it.
    pub fn clicked(&self, context: &TrackingContext) -> Option<String> {
        self.clicked
            .get(&context.template)
            .map(|page| render(page, context))
    }

    pub fn phished(&self, context: &TrackingContext) -> String {
        render(&self.phished, context)
    }
}

fn render(page: &str, context: &TrackingContext) -> String {
    fill(
        page,
        &[
            ("target_id", context.target_id.as_str()),
            ("pool_id", context.pool_id.as_str()),
            ("group", context.group.as_str()),
            ("template", context.template.as_str()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(template: &str) -> TrackingContext {
        TrackingContext {
            target_id: "tid".to_string(),
            pool_id: "pid".to_string(),
            group: "sales".to_string(),
            template: template.to_string(),
        }
    }

    #[test]
    fn clicked_page_is_selected_by_template() {
        let pages = Pages::new(
            HashMap::from([
                ("bank".to_string(), "bank {target_id}/{pool_id}".to_string()),
                ("it".to_string(), "it {group}".to_string()),
            ]),
            "gotcha {template}",
        );

        assert_eq!(pages.clicked(&context("bank")).as_deref(), Some("bank tid/pid"));
        assert_eq!(pages.clicked(&context("it")).as_deref(), Some("it sales"));
        assert_eq!(pages.clicked(&context("other")), None);
        assert_eq!(pages.phished(&context("it")), "gotcha it");
    }

    #[test]
    fn load_reads_the_pages_directory() {
        let dir = std::env::temp_dir().join(format!("tracker-pages-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("clicked.bank.html"), "bank").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.join("phished.html"), "landing").unwrap();

        let pages = Pages::load(&dir).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(pages.clicked(&context("bank")).as_deref(), Some("bank"));
        assert_eq!(pages.clicked.len(), 1);
        assert_eq!(pages.phished(&context("bank")), "landing");
    }
}
