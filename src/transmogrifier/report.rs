//! Check results and change descriptions

use serde::Serialize;
use std::fmt;

// =============================================================================
// Check Result
// =============================================================================

/// Problems found while checking whether a change can be made
///
/// Warnings are informational; any error blocks the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl CheckResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Append another result's warnings and errors to this one
    pub fn absorb(&mut self, other: CheckResult) {
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (heading, lines) in [("Warnings", &self.warnings), ("Errors", &self.errors)] {
            if lines.is_empty() {
                continue;
            }
            writeln!(f, "{}:", heading)?;
            for line in lines {
                writeln!(f, "* {}", line)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Change Description
// =============================================================================

/// One entry of a change description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChangeItem {
    Leaf(String),
    Nested(ChangeDescription),
}

/// Human-readable summary of what a change will do, as a bullet tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub items: Vec<ChangeItem>,
}

impl ChangeDescription {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            items: Vec::new(),
        }
    }

    pub fn untitled() -> Self {
        Self::default()
    }

    pub fn item(&mut self, text: impl Into<String>) -> &mut Self {
        self.items.push(ChangeItem::Leaf(text.into()));
        self
    }

    pub fn nested(&mut self, description: ChangeDescription) -> &mut Self {
        self.items.push(ChangeItem::Nested(description));
        self
    }

    pub fn with_item(mut self, text: impl Into<String>) -> Self {
        self.item(text);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn fmt_items(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        for item in &self.items {
            match item {
                ChangeItem::Leaf(text) => writeln!(f, "{:indent$}* {}", "", text, indent = indent)?,
                ChangeItem::Nested(d) => match &d.title {
                    Some(title) => {
                        writeln!(f, "{:indent$}* {}", "", title, indent = indent)?;
                        d.fmt_items(f, indent + 2)?;
                    }
                    None => d.fmt_items(f, indent)?,
                },
            }
        }
        Ok(())
    }
}

impl fmt::Display for ChangeDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(title) = &self.title {
            writeln!(f, "{}", title)?;
        }
        self.fmt_items(f, 0)
    }
}
