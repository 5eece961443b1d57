//! Built-in export formats: `ddi` (DDI Codebook 2.5 XML) and `dataverse_json`

use std::fmt::Write as _;

use super::document::VersionDocument;
use crate::core::error::ExportError;
use crate::core::traits::ExportRenderer;

pub const DDI_FORMAT: &str = "ddi";
pub const JSON_FORMAT: &str = "dataverse_json";

#[derive(Debug, Default, Clone, Copy)]
pub struct StandardExportRenderer;

impl StandardExportRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn supports(&self, format: &str) -> bool {
        matches!(format, DDI_FORMAT | JSON_FORMAT)
    }
}

impl ExportRenderer for StandardExportRenderer {
    fn render(&self, document: &VersionDocument, format: &str) -> Result<Vec<u8>, ExportError> {
        match format {
            DDI_FORMAT => render_ddi(document)
                .map(String::into_bytes)
                .map_err(|e| ExportError::Render {
                    format: format.to_string(),
                    message: e.to_string(),
                }),
            JSON_FORMAT => Ok(serde_json::to_vec_pretty(document)?),
            other => Err(ExportError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

fn render_ddi(document: &VersionDocument) -> Result<String, std::fmt::Error> {
    let mut xml = String::new();
    let title = escape_xml(document.title.as_deref().unwrap_or_default());
    let pid = escape_xml(&document.persistent_id);
    let agency = escape_xml(&document.protocol.to_uppercase());
    let version = &document.version;

    writeln!(xml, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(xml, r#"<codeBook xmlns="ddi:codebook:2_5" version="2.5">"#)?;
    writeln!(xml, "  <docDscr><citation>")?;
    writeln!(xml, "    <titlStmt><titl>{}</titl><IDNo agency=\"{}\">{}</IDNo></titlStmt>", title, agency, pid)?;
    let date = version
        .release_time
        .map(|t| format!(" date=\"{}\"", t.format("%Y-%m-%d")))
        .unwrap_or_default();
    writeln!(
        xml,
        "    <verStmt><version{} type=\"{:?}\">{}.{}</version></verStmt>",
        date, version.state, version.major, version.minor
    )?;
    writeln!(xml, "  </citation></docDscr>")?;

    writeln!(xml, "  <stdyDscr>")?;
    writeln!(xml, "    <citation><titlStmt><titl>{}</titl></titlStmt></citation>", title)?;
    if !document.subjects.is_empty() {
        writeln!(xml, "    <stdyInfo><subject>")?;
        for subject in &document.subjects {
            writeln!(xml, "      <keyword>{}</keyword>", escape_xml(subject))?;
        }
        writeln!(xml, "    </subject></stdyInfo>")?;
    }
    let access = if document.file_access_request { "Request" } else { "Public" };
    writeln!(xml, "    <dataAccs><setAvail><avlStatus>{}</avlStatus></setAvail></dataAccs>", access)?;
    writeln!(xml, "  </stdyDscr>")?;

    for file in &document.files {
        writeln!(
            xml,
            "  <fileDscr ID=\"f{}\"><fileTxt><fileName>{}</fileName></fileTxt>{}</fileDscr>",
            file.id,
            escape_xml(&file.label),
            if file.restricted { "<notes>restricted</notes>" } else { "" }
        )?;
    }

    writeln!(xml, "</codeBook>")?;
    Ok(xml)
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
