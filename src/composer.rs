use crate::attachment::{Attachment, AttachmentError};
use crate::prompt::PromptPart;

/// What the user is about to send: typed text plus at most one attachment.
#[derive(Debug, Default)]
pub struct Composer {
    text: String,
    attachment: Option<Attachment>,
}

/// A validated outgoing message. Encoding the attachment is deferred to
/// [`Outgoing::into_parts`] so it can run off the UI thread.
#[derive(Debug)]
pub struct Outgoing {
    pub text: String,
    pub attachment: Option<Attachment>,
}

impl Outgoing {
    pub fn attachment_name(&self) -> Option<&str> {
        self.attachment.as_ref().map(Attachment::name)
    }

    /// Builds the prompt parts: the attachment first, then the typed text.
    pub fn into_parts(self) -> Result<Vec<PromptPart>, AttachmentError> {
        let mut parts = Vec::with_capacity(2);
        if let Some(attachment) = &self.attachment {
            parts.push(attachment.to_prompt_part()?);
        }
        if !self.text.is_empty() {
            parts.push(PromptPart::text(self.text));
        }
        Ok(parts)
    }
}

impl Composer {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: String) {
        self.text = text;
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    /// Stages an attachment, returning the one it replaced.
    pub fn attach(&mut self, attachment: Attachment) -> Option<Attachment> {
        self.attachment.replace(attachment)
    }

    pub fn remove_attachment(&mut self) -> Option<Attachment> {
        self.attachment.take()
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachment.is_none()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.attachment = None;
    }

    /// Hands over the trimmed text and the attachment, leaving the composer
    /// empty. Returns `None` when there is nothing to send.
    pub fn take(&mut self) -> Option<Outgoing> {
        if self.is_empty() {
            return None;
        }

        let text = self.text.trim().to_string();
        self.text.clear();
        Some(Outgoing {
            text,
            attachment: self.attachment.take(),
        })
    }
}
