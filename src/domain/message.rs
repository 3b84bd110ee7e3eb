use serde::Serialize;

/// One email handed over for scanning. The body is kept as raw bytes since
/// mailbox and upload collaborators do not guarantee a valid encoding.
#[derive(Debug, Clone, Default)]
pub struct EmailScan {
    pub subject: String,
    pub sender: String,
    pub body: Vec<u8>,
    /// Links already extracted by the caller. `None` means extract from the body.
    pub links: Option<Vec<String>>,
}

impl EmailScan {
    pub fn new(subject: impl Into<String>, sender: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            subject: subject.into(),
            sender: sender.into(),
            body: body.into(),
            links: None,
        }
    }

    pub fn with_links(mut self, links: Vec<String>) -> Self {
        self.links = Some(links);
        self
    }
}

/// Outcome of a prediction call as handed back to the routing layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub label: bool,
    pub confidence: f64,
    pub findings: Vec<String>,
    pub quarantined: bool,
}
