//! Report descriptors handed to the Emissary's report generator.

use serde::Serialize;

/// Prefix shared by every report this process asks the Emissary to write.
pub const REPORT_PREFIX: &str = "report_appScannerId-";

/// Arguments for one remote report generation call.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportDescriptor {
    /// Template theme name the build user selects by.
    #[serde(skip)]
    pub name: String,
    pub title: String,
    pub template: String,
    pub theme: String,
    pub description: String,
    pub contexts: String,
    pub sites: String,
    pub sections: String,
    pub included_confidences: String,
    pub included_risks: String,
    pub report_file_name: String,
    pub report_file_name_pattern: String,
    pub report_dir: String,
    pub display: bool,
}

/// One entry of the report catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportKind {
    pub name: &'static str,
    pub template: &'static str,
    /// File name infix, e.g. `traditional`.
    pub label: &'static str,
    pub extension: &'static str,
}

/// Every report template the Standard reporting strategy can produce.
pub const REPORT_CATALOGUE: &[ReportKind] = &[
    ReportKind {
        name: "traditionalJson",
        template: "traditional-json",
        label: "traditional",
        extension: "json",
    },
    ReportKind {
        name: "traditionalHtml",
        template: "traditional-html",
        label: "traditional",
        extension: "html",
    },
    ReportKind {
        name: "traditionalMd",
        template: "traditional-md",
        label: "traditional",
        extension: "md",
    },
    ReportKind {
        name: "traditionalXml",
        template: "traditional-xml",
        label: "traditional",
        extension: "xml",
    },
    ReportKind {
        name: "sarifJson",
        template: "sarif-json",
        label: "sarif",
        extension: "json",
    },
];

/// Prefix of every report file belonging to one Test Session.
pub fn session_report_prefix(test_session_id: &str) -> String {
    format!("{REPORT_PREFIX}{test_session_id}_")
}

impl ReportKind {
    /// Build the generation arguments for this template.
    pub fn descriptor(
        &self,
        test_session_id: &str,
        context_name: &str,
        base_url: &str,
        report_dir: &str,
        now_as_file_name: &str,
    ) -> ReportDescriptor {
        ReportDescriptor {
            name: self.name.to_string(),
            title: "AppScanner Report".to_string(),
            template: self.template.to_string(),
            theme: String::new(),
            description: format!("Automated application scan of Test Session {test_session_id}"),
            contexts: context_name.to_string(),
            sites: base_url.to_string(),
            sections: String::new(),
            included_confidences: "Low|Medium|High|Confirmed".to_string(),
            included_risks: "Informational|Low|Medium|High".to_string(),
            report_file_name: format!(
                "{}{}_{}.{}",
                session_report_prefix(test_session_id),
                self.label,
                now_as_file_name,
                self.extension
            ),
            report_file_name_pattern: String::new(),
            report_dir: report_dir.to_string(),
            display: false,
        }
    }
}
