//! Template Renderer - Personalizes template content per recipient

use mailcast_storage::models::EmailContact;

/// Placeholder replaced by the recipient's display name
pub const NAME_PLACEHOLDER: &str = "{{name}}";

/// Template renderer for personalizing email content
///
/// The name is inserted verbatim. HTML in a contact name is not escaped,
/// so contact data must be trusted.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render a template for one recipient
    pub fn render(&self, content: &str, contact: &EmailContact) -> String {
        content.replace(NAME_PLACEHOLDER, &contact.name)
    }
}
