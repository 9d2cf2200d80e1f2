// crates/mbccb-rs-xml/src/error.rs

use alloc::string::String;
use core::fmt;
use core::str::Utf8Error;
use mbccb_rs::MbccbError;
use quick_xml::events::attributes::AttrError;

/// Errors that can occur while reading a document into an element tree.
#[derive(Debug)]
pub enum XmlError {
    /// An error from the underlying `quick-xml` reader (malformed markup,
    /// mismatched end tags, bad escapes).
    Syntax(quick_xml::Error),

    /// A malformed or duplicated attribute.
    Attribute(AttrError),

    /// A tag or attribute name that is not valid UTF-8.
    Encoding(Utf8Error),

    /// The document has no element at all.
    MissingRoot,

    /// A second top-level element follows the root.
    MultipleRoots { tag: String },

    /// The input ended while `open` was still open.
    UnexpectedEof { open: String },
}

impl From<quick_xml::Error> for XmlError {
    fn from(e: quick_xml::Error) -> Self {
        XmlError::Syntax(e)
    }
}

impl From<AttrError> for XmlError {
    fn from(e: AttrError) -> Self {
        XmlError::Attribute(e)
    }
}

impl From<Utf8Error> for XmlError {
    fn from(e: Utf8Error) -> Self {
        XmlError::Encoding(e)
    }
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmlError::Syntax(e) => write!(f, "XML syntax error: {}", e),
            XmlError::Attribute(e) => write!(f, "XML attribute error: {}", e),
            XmlError::Encoding(e) => write!(f, "Invalid UTF-8 in name: {}", e),
            XmlError::MissingRoot => write!(f, "Document has no root element"),
            XmlError::MultipleRoots { tag } => {
                write!(f, "Unexpected element <{}> after the root element", tag)
            }
            XmlError::UnexpectedEof { open } => {
                write!(f, "Unexpected end of input inside <{}>", open)
            }
        }
    }
}

/// Either stage of compiling XML text failed.
#[derive(Debug)]
pub enum CompileError {
    /// The text is not a well-formed document.
    Xml(XmlError),
    /// The document was read but rejected by the compiler.
    Compile(MbccbError),
}

impl From<XmlError> for CompileError {
    fn from(e: XmlError) -> Self {
        CompileError::Xml(e)
    }
}

impl From<MbccbError> for CompileError {
    fn from(e: MbccbError) -> Self {
        CompileError::Compile(e)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Xml(e) => write!(f, "{}", e),
            CompileError::Compile(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::XmlError;
    use alloc::string::ToString;

    #[test]
    fn test_from_xml_error() {
        let xml_err = quick_xml::Error::Syntax(quick_xml::errors::SyntaxError::UnclosedTag);
        let err: XmlError = xml_err.into();
        assert!(matches!(err, XmlError::Syntax(_)));
        assert!(err.to_string().starts_with("XML syntax error"));
    }

    #[test]
    fn test_from_attr_error() {
        let attr_err = quick_xml::events::attributes::AttrError::Duplicated(10, 2);
        let err: XmlError = attr_err.into();
        assert!(matches!(err, XmlError::Attribute(_)));
    }

    #[test]
    fn test_from_utf8_error() {
        let bytes = [0x66u8, 0xff];
        let utf8_err = core::str::from_utf8(&bytes).unwrap_err();
        let err: XmlError = utf8_err.into();
        assert!(matches!(err, XmlError::Encoding(_)));
    }

    #[test]
    fn test_display_structure_errors() {
        assert_eq!(
            XmlError::MissingRoot.to_string(),
            "Document has no root element"
        );
        let err = XmlError::UnexpectedEof {
            open: "commands".to_string(),
        };
        assert_eq!(err.to_string(), "Unexpected end of input inside <commands>");
    }
}
