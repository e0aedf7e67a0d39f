//! Message composition — pure transform from a validated submission to the
//! outbound email. No I/O; identical inputs always compose identical output.

use crate::submission::attachment::StagedAttachment;
use crate::submission::fields::FieldMap;

/// Subject-line stand-in when the display-name field is absent.
pub const FALLBACK_APPLICANT: &str = "Unknown Applicant";

/// The field whose value names the applicant in the subject line.
const DISPLAY_NAME_FIELD: &str = "fullName";

/// A complete outbound message. Immutable once built; the attachment moves in
/// so that discard-after-dispatch is a move, not a bookkeeping flag.
#[derive(Debug)]
pub struct ComposedMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachment: Option<StagedAttachment>,
}

impl ComposedMessage {
    /// Take back the staged attachment for cleanup once dispatch has settled.
    pub fn into_attachment(self) -> Option<StagedAttachment> {
        self.attachment
    }
}

/// Compose the notification email for one submission.
///
/// Every field renders as a label/value line in arrival order, so new form
/// fields show up without composer changes. The attachment keeps the
/// uploader's original file name.
pub fn compose(
    fields: &FieldMap,
    attachment: Option<StagedAttachment>,
    from: &str,
    to: &str,
) -> ComposedMessage {
    let applicant = fields
        .get(DISPLAY_NAME_FIELD)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(FALLBACK_APPLICANT);

    let mut html_body = String::from("<h2>New Job Application Received</h2>\n");
    for (name, value) in fields.iter() {
        html_body.push_str(&format!(
            "<p><strong>{}:</strong> {}</p>\n",
            escape_html(&field_label(name)),
            escape_html(value),
        ));
    }

    ComposedMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("New Candidate: {applicant}"),
        html_body,
        attachment,
    }
}

/// Mechanical label derivation: capitalize the first letter of the field key.
fn field_label(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Escape user-supplied text for safe HTML interpolation.
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
