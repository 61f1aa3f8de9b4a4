use scanbridge_core::constants::{TAG_ARG_INT, TAG_CMD_ARGS, TAG_IN_ARGS, TAG_SCANNER_ID};
use std::fmt::Write as _;

/// Builder for driver request documents with a fluent API
///
/// Produces the `inArgs` XML body expected by the driver command channel.
/// Only integer values are ever written, so no escaping is required.
///
/// # Example
/// ```
/// use scanbridge_protocol::InArgsBuilder;
///
/// let xml = InArgsBuilder::new()
///     .scanner_id(1)
///     .arg_int(3)
///     .build();
///
/// assert_eq!(
///     xml,
///     "<inArgs><scannerID>1</scannerID><cmdArgs><arg-int>3</arg-int></cmdArgs></inArgs>"
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct InArgsBuilder {
    scanner_id: Option<u32>,
    args: Vec<String>,
}

impl InArgsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address the request to a single device
    pub fn scanner_id(mut self, scanner_id: u32) -> Self {
        self.scanner_id = Some(scanner_id);
        self
    }

    /// Append an integer argument to `cmdArgs`
    pub fn arg_int(mut self, value: impl Into<i64>) -> Self {
        self.args.push(value.into().to_string());
        self
    }

    /// Append a comma-separated list of integers as a single argument
    pub fn arg_int_list(mut self, values: &[u16]) -> Self {
        let joined = values
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.args.push(joined);
        self
    }

    /// Render the document
    pub fn build(self) -> String {
        let mut xml = String::with_capacity(64 + self.args.len() * 24);
        let _ = write!(xml, "<{TAG_IN_ARGS}>");

        if let Some(id) = self.scanner_id {
            let _ = write!(xml, "<{TAG_SCANNER_ID}>{id}</{TAG_SCANNER_ID}>");
        }

        if !self.args.is_empty() {
            let _ = write!(xml, "<{TAG_CMD_ARGS}>");
            for arg in &self.args {
                let _ = write!(xml, "<{TAG_ARG_INT}>{arg}</{TAG_ARG_INT}>");
            }
            let _ = write!(xml, "</{TAG_CMD_ARGS}>");
        }

        let _ = write!(xml, "</{TAG_IN_ARGS}>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document() {
        assert_eq!(InArgsBuilder::new().build(), "<inArgs></inArgs>");
    }

    #[test]
    fn test_scanner_id_only() {
        let xml = InArgsBuilder::new().scanner_id(7).build();
        assert_eq!(xml, "<inArgs><scannerID>7</scannerID></inArgs>");
    }

    #[test]
    fn test_arg_list() {
        let xml = InArgsBuilder::new()
            .arg_int(2)
            .arg_int_list(&[1, 16])
            .build();
        assert_eq!(
            xml,
            "<inArgs><cmdArgs><arg-int>2</arg-int><arg-int>1,16</arg-int></cmdArgs></inArgs>"
        );
    }

    #[test]
    fn test_output_is_well_formed() {
        let xml = InArgsBuilder::new().scanner_id(1).arg_int(3).build();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert!(doc.root_element().has_tag_name("inArgs"));
    }
}
