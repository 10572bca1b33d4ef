use std::future::Future;
use std::pin::Pin;

use crate::attachment::{self, Attachment, AttachmentSource};
use crate::composer::Composer;
use crate::config::CodePlacement;
use crate::dispatch::{ChatSession, DispatchError, Dispatcher, Generation};
use crate::reveal::{Playback, PlaybackEvent};
use crate::segment::Reply;
use crate::transcript::{CopyTicket, EntryId, Role, Transcript};

pub type ReplyFuture = Pin<Box<dyn Future<Output = Result<String, DispatchError>> + Send>>;

/// Typing this quits the application.
const EXIT_COMMAND: &str = "exit";

pub enum Submission {
    /// The request is in flight; drive `future` and hand its result to
    /// [`CommandBar::on_reply`].
    Sent {
        generation: Generation,
        future: ReplyFuture,
    },
    Quit,
    /// Nothing was sent.
    Ignored,
}

/// One overlay session: what is being typed, what has been shown, and the
/// request currently in flight.
pub struct CommandBar<S> {
    composer: Composer,
    transcript: Transcript,
    dispatcher: Dispatcher<S>,
    playback: Option<Playback>,
    open_bubble: Option<EntryId>,
    placement: CodePlacement,
}

impl<S: ChatSession> CommandBar<S> {
    pub fn new(dispatcher: Dispatcher<S>, placement: CodePlacement) -> Self {
        CommandBar {
            composer: Composer::default(),
            transcript: Transcript::default(),
            dispatcher,
            playback: None,
            open_bubble: None,
            placement,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn input(&self) -> &str {
        self.composer.text()
    }

    pub fn set_input(&mut self, text: String) {
        self.composer.set_text(text);
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.composer.attachment()
    }

    pub fn remove_attachment(&mut self) {
        if let Some(removed) = self.composer.remove_attachment() {
            tracing::debug!("Removed attachment {}", removed.name());
        }
    }

    /// True from dispatch until the reply has been fully revealed or failed.
    #[cfg(test)]
    pub fn is_processing(&self) -> bool {
        self.dispatcher.is_processing()
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.dispatcher.is_processing() && self.playback.is_none()
    }

    pub fn is_revealing(&self) -> bool {
        self.playback.is_some()
    }

    pub fn attach(&mut self, source: AttachmentSource) -> bool {
        match attachment::handle_file(source) {
            Ok(attachment) => {
                tracing::info!("Attached {}", attachment.name());
                if let Some(previous) = self.composer.attach(attachment) {
                    tracing::debug!("Replaced attachment {}", previous.name());
                }
                true
            }
            Err(e) => {
                tracing::warn!("Attachment rejected: {}", e);
                self.transcript.append_notice(e.to_string());
                false
            }
        }
    }

    /// Attaches the clipboard image, if the clipboard holds one.
    pub fn paste_image(&mut self) -> bool {
        match attachment::read_clipboard_image() {
            Ok(Some(pixels)) => self.attach(AttachmentSource::Pixels(pixels)),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Clipboard read failed: {}", e);
                self.transcript.append_notice(e.to_string());
                false
            }
        }
    }

    pub fn submit(&mut self) -> Submission {
        if self.composer.text().trim().eq_ignore_ascii_case(EXIT_COMMAND) {
            return Submission::Quit;
        }
        if self.dispatcher.is_processing() || self.composer.is_empty() {
            return Submission::Ignored;
        }

        let Some(outgoing) = self.composer.take() else {
            return Submission::Ignored;
        };

        self.transcript
            .append_user_message(&outgoing.text, outgoing.attachment_name());

        let prepare = move || {
            outgoing.into_parts().map_err(|e| {
                tracing::warn!("Could not prepare attachment: {}", e);
                DispatchError::Prepare(e.to_string())
            })
        };

        match self.dispatcher.submit(prepare) {
            Ok(dispatch) => {
                tracing::info!("Request #{} sent", dispatch.generation);
                Submission::Sent {
                    generation: dispatch.generation,
                    future: Box::pin(dispatch.future),
                }
            }
            Err(e) => {
                self.transcript.append_notice(format!("Error: {}", e));
                Submission::Ignored
            }
        }
    }

    /// Handles a completed request. Returns false for stale completions.
    pub fn on_reply(&mut self, generation: Generation, result: Result<String, DispatchError>) -> bool {
        if !self.dispatcher.is_current(generation) || !self.dispatcher.is_processing() {
            tracing::debug!("Dropping stale reply for request #{}", generation);
            return false;
        }

        match result {
            Ok(raw) => {
                tracing::info!("Request #{} answered ({} bytes)", generation, raw.len());
                let reply = Reply::parse(&raw);
                if reply.segments.is_empty() {
                    self.transcript.append_notice("The model returned an empty reply.");
                    self.dispatcher.finish();
                    return true;
                }

                let (playback, events) = Playback::start(&reply, self.placement);
                self.open_bubble = None;
                self.apply(events);
                if playback.is_done() {
                    self.finish_cycle();
                } else {
                    self.playback = Some(playback);
                }
            }
            Err(e) => {
                tracing::warn!("Request #{} failed: {}", generation, e);
                self.transcript.append_notice(format!("Error: {}", e));
                self.dispatcher.finish();
            }
        }
        true
    }

    /// Advances the progressive reveal by one step. Returns true when the
    /// transcript changed.
    pub fn tick(&mut self) -> bool {
        let Some(playback) = self.playback.as_mut() else {
            return false;
        };

        let events = playback.tick();
        let done = playback.is_done();
        let changed = !events.is_empty();
        self.apply(events);

        if done {
            self.finish_cycle();
        }
        changed
    }

    pub fn cancel(&mut self) {
        if self.is_awaiting_reply() {
            self.dispatcher.cancel();
        }
    }

    /// Starts a new session: new conversation, empty transcript, no attachment.
    pub fn reset(&mut self, session: S) {
        self.dispatcher.reset(session);
        self.transcript.clear();
        self.composer.clear();
        self.playback = None;
        self.open_bubble = None;
    }

    pub fn copy_code(&mut self, id: EntryId) -> Option<(String, CopyTicket)> {
        self.transcript.copy_code(id)
    }

    pub fn clear_copy_ack(&mut self, id: EntryId, ticket: CopyTicket) {
        self.transcript.clear_copy_ack(id, ticket);
    }

    fn apply(&mut self, events: Vec<PlaybackEvent>) {
        for event in events {
            match event {
                PlaybackEvent::BubbleOpened => self.open_bubble = None,
                PlaybackEvent::BubbleUpdated(markdown) => match self.open_bubble {
                    Some(id) => {
                        self.transcript.update_bubble(id, &markdown);
                    }
                    None => {
                        self.open_bubble = Some(self.transcript.append_bubble(&markdown, Role::Ai));
                    }
                },
                PlaybackEvent::CodeBlock(code) => {
                    self.transcript
                        .append_code_block(code.language.as_deref(), &code.source);
                }
            }
        }
    }

    fn finish_cycle(&mut self) {
        tracing::debug!("Reveal of request #{} complete", self.dispatcher.generation());
        self.playback = None;
        self.open_bubble = None;
        self.dispatcher.finish();
    }
}
