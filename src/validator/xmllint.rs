//! XSD validation through libxml2's `xmllint`.
//!
//! Both the document and the schema are parsed with [`super::xml`] first.
//! Only well-formed input reaches `xmllint --noout --schema`, whose exit
//! status decides the result: `3` means the document does not conform,
//! `4`/`5` mean the schema could not be used.

use super::xml;
use super::{SchemaValidator, SchemaViolation, ValidatorError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Runs the `xmllint` executable.
#[derive(Debug, Clone)]
pub struct XmllintValidator {
    program: PathBuf,
}

impl Default for XmllintValidator {
    fn default() -> Self {
        Self::new("xmllint")
    }
}

impl XmllintValidator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl SchemaValidator for XmllintValidator {
    fn name(&self) -> &str {
        "xmllint"
    }

    async fn validate(&self, document: &Path, schema: &Path) -> Result<(), ValidatorError> {
        let doc_path = document.to_path_buf();
        let schema_path = schema.to_path_buf();
        let (doc_tree, schema_tree) = tokio::task::spawn_blocking(move || {
            (xml::parse_file(&doc_path), xml::parse_file(&schema_path))
        })
        .await
        .map_err(|e| ValidatorError::Other(format!("XML parse task panicked: {}", e)))?;

        let doc_tree = doc_tree.map_err(|detail| ValidatorError::Malformed {
            path: document.to_path_buf(),
            detail,
        })?;
        let schema_tree = schema_tree.map_err(|detail| ValidatorError::SchemaUnreadable {
            path: schema.to_path_buf(),
            detail,
        })?;
        if !schema_tree.is_xsd() {
            return Err(ValidatorError::SchemaUnreadable {
                path: schema.to_path_buf(),
                detail: format!("root element '{}' is not an XML Schema", schema_tree.root),
            });
        }
        debug!(
            "Validating <{}> ({} elements) against {}",
            doc_tree.root,
            doc_tree.elements,
            schema.display()
        );

        let output = Command::new(&self.program)
            .arg("--noout")
            .arg("--schema")
            .arg(schema)
            .arg(document)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ValidatorError::Unavailable {
                program: self.program.clone(),
                detail: e.to_string(),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        match output.status.code() {
            Some(0) => Ok(()),
            Some(3) => Err(ValidatorError::Invalid {
                violations: parse_violations(&stderr),
            }),
            Some(4) | Some(5) => Err(ValidatorError::SchemaUnreadable {
                path: schema.to_path_buf(),
                detail: stderr.trim().to_string(),
            }),
            code => Err(ValidatorError::Other(format!(
                "xmllint exited with {:?}: {}",
                code,
                stderr.trim()
            ))),
        }
    }
}

static RE_VIOLATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^.+?:(\d+): (?:element [^:]+: )?(?:Schemas validity error : )?(.+)$").unwrap()
});

/// Turn xmllint's stderr into one violation per diagnostic line.
pub fn parse_violations(stderr: &str) -> Vec<SchemaViolation> {
    stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| !l.ends_with("fails to validate") && !l.ends_with("validates"))
        .map(|l| match RE_VIOLATION.captures(l) {
            Some(caps) => SchemaViolation {
                line: caps[1].parse().ok(),
                message: caps[2].to_string(),
            },
            None => SchemaViolation {
                line: None,
                message: l.to_string(),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_xmllint_diagnostics() {
        let stderr = "\
/tmp/ws/paper.xml:3: element p: Schemas validity error : Element '{http://www.tei-c.org/ns/1.0}p': This element is not expected.
/tmp/ws/paper.xml:7: element publicationStmt: Schemas validity error : Element 'publicationStmt': Missing child element(s).
/tmp/ws/paper.xml fails to validate
";
        let v = parse_violations(stderr);
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].line, Some(3));
        assert_eq!(
            v[0].message,
            "Element '{http://www.tei-c.org/ns/1.0}p': This element is not expected."
        );
        assert_eq!(v[1].line, Some(7));
        assert!(v[1].message.starts_with("Element 'publicationStmt'"));
    }

    #[test]
    fn keeps_unrecognised_lines_verbatim() {
        let v = parse_violations("warning: failed to load external entity\n");
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].line, None);
        assert_eq!(v[0].message, "warning: failed to load external entity");
    }

    #[tokio::test]
    async fn malformed_document_is_reported_before_running_xmllint() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("doc.xml");
        let schema = dir.path().join("schema.xsd");
        std::fs::write(&doc, "<TEI><text></TEI>").unwrap();
        std::fs::write(
            &schema,
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"/>"#,
        )
        .unwrap();

        let validator = XmllintValidator::new("/definitely/not/xmllint");
        let err = validator.validate(&doc, &schema).await.unwrap_err();
        assert!(matches!(err, ValidatorError::Malformed { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn non_xsd_schema_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("doc.xml");
        let schema = dir.path().join("schema.xsd");
        std::fs::write(&doc, "<TEI/>").unwrap();
        std::fs::write(&schema, "<grammar/>").unwrap();

        let validator = XmllintValidator::default();
        let err = validator.validate(&doc, &schema).await.unwrap_err();
        assert!(matches!(err, ValidatorError::SchemaUnreadable { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn missing_xmllint_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("doc.xml");
        let schema = dir.path().join("schema.xsd");
        std::fs::write(&doc, "<TEI/>").unwrap();
        std::fs::write(
            &schema,
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"/>"#,
        )
        .unwrap();

        let validator = XmllintValidator::new("/definitely/not/xmllint");
        let err = validator.validate(&doc, &schema).await.unwrap_err();
        assert!(matches!(err, ValidatorError::Unavailable { .. }), "got: {err}");
    }
}
