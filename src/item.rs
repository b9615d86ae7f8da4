//! Batch input items.

use crate::pipeline::classify::{classify, extension_of, ConversionStrategy};
use std::fmt;

/// One file submitted for conversion.
///
/// Items are moved into the dispatcher and consumed exactly once; nothing
/// keeps a reference to the raw bytes after the item's conversion finishes.
#[derive(Clone, PartialEq, Eq)]
pub struct InputItem {
    name: String,
    content: Vec<u8>,
    extension: String,
}

impl InputItem {
    /// Create an item from its original filename and raw bytes.
    ///
    /// The declared extension is derived from `name` (lower-cased, including
    /// the leading dot, empty when the name has none).
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let extension = extension_of(&name);
        Self {
            name,
            content: content.into(),
            extension,
        }
    }

    /// The original filename as submitted.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Lower-cased extension including the dot (e.g. `".docx"`), or `""`.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn strategy(&self) -> ConversionStrategy {
        classify(&self.name)
    }

    /// Split the item into its name and bytes.
    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.name, self.content)
    }
}

impl fmt::Debug for InputItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputItem")
            .field("name", &self.name)
            .field("extension", &self.extension)
            .field("len", &self.content.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        let item = InputItem::new("Report.DOCX", b"x".to_vec());
        assert_eq!(item.extension(), ".docx");
        assert_eq!(item.strategy(), ConversionStrategy::Document);
    }

    #[test]
    fn extension_ignores_directories() {
        assert_eq!(InputItem::new("dir.v2/readme", b"".to_vec()).extension(), "");
        assert_eq!(InputItem::new("a/b/c.Txt", b"".to_vec()).extension(), ".txt");
    }

    #[test]
    fn missing_extension_is_empty() {
        assert_eq!(InputItem::new("Makefile", b"".to_vec()).extension(), "");
    }

    #[test]
    fn debug_hides_content() {
        let item = InputItem::new("a.txt", vec![0u8; 1024]);
        let dbg = format!("{item:?}");
        assert!(dbg.contains("len: 1024"), "got: {dbg}");
    }
}
