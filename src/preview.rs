use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::client::PreviewResult;
use crate::error::PreviewError;

/// Which preview document to show.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewSelector {
    Global,
    /// Position in the preview's list of unit documents.
    Individual(usize),
}

impl fmt::Display for PreviewSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviewSelector::Global => write!(f, "global"),
            PreviewSelector::Individual(index) => write!(f, "individual-{}", index),
        }
    }
}

impl FromStr for PreviewSelector {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "global" {
            return Ok(PreviewSelector::Global);
        }
        s.strip_prefix("individual-")
            .and_then(|index| index.parse().ok())
            .map(PreviewSelector::Individual)
            .ok_or_else(|| PreviewError::NotFound(s.to_string()))
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PreviewTab {
    pub target: String,
    pub label: String,
}

/// Keeps the latest preview and hands out its documents by selector.
#[derive(Clone, Debug, Default)]
pub struct PreviewPresenter {
    current: Option<PreviewResult>,
}

impl PreviewPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, result: PreviewResult) {
        self.current = Some(result);
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn has_preview(&self) -> bool {
        self.current.is_some()
    }

    /// Document content for `selector`. Missing previews, unknown positions and
    /// empty documents are all `NotFound`.
    pub fn content_for(&self, selector: PreviewSelector) -> Result<&str, PreviewError> {
        let not_found = || PreviewError::NotFound(selector.to_string());
        let preview = self.current.as_ref().ok_or_else(not_found)?;
        let content = match selector {
            PreviewSelector::Global => preview.global.as_str(),
            PreviewSelector::Individual(index) => preview
                .individuals
                .get(index)
                .map(|doc| doc.content.as_str())
                .ok_or_else(not_found)?,
        };
        if content.trim().is_empty() {
            return Err(not_found());
        }
        Ok(content)
    }

    /// The global tab followed by one tab per unit, in service order.
    pub fn tabs(&self) -> Vec<PreviewTab> {
        let Some(preview) = &self.current else {
            return Vec::new();
        };
        let mut tabs = vec![PreviewTab {
            target: PreviewSelector::Global.to_string(),
            label: "Global report".to_string(),
        }];
        tabs.extend(preview.individuals.iter().enumerate().map(|(index, doc)| {
            PreviewTab {
                target: PreviewSelector::Individual(index).to_string(),
                label: format!("Unit {}", doc.unit),
            }
        }));
        tabs
    }
}
