//! Language switching and phrase translation
//!
//! Switching language never touches the audio cycle. The displayed phrase
//! is translated in place and a short lock window opens during which phrases
//! coming from newly promoted bundles are held back, so a translation and a
//! bundle change do not fight over the text. When the window closes the
//! last held phrase is shown.

use crate::pipeline::PipelineMsg;
use std::time::Duration;
use sublime_common::Language;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A phrase to display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseUpdate {
    pub bundle_id: Option<String>,
    pub text: String,
    pub language: Language,
}

/// A translation to run on the content service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub seq: u64,
    pub bundle_id: Option<String>,
    pub text: String,
    pub target: Language,
}

/// What to do with a bundle's phrase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhraseDecision {
    /// Show now, translating afterwards when the bundle is in another language
    Show {
        update: PhraseUpdate,
        translate: Option<TranslationRequest>,
    },
    /// Held until the lock window closes
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhraseLock {
    Unlocked,
    Locked { deferred: Option<PhraseUpdate> },
}

pub struct TranslationAdapter {
    language: Language,
    lock: PhraseLock,
    lock_window: Duration,
    lock_generation: u64,
    lock_task: Option<JoinHandle<()>>,
    request_seq: u64,
    mailbox: mpsc::UnboundedSender<PipelineMsg>,
}

impl TranslationAdapter {
    pub fn new(
        language: Language,
        lock_window: Duration,
        mailbox: mpsc::UnboundedSender<PipelineMsg>,
    ) -> Self {
        Self {
            language,
            lock: PhraseLock::Unlocked,
            lock_window,
            lock_generation: 0,
            lock_task: None,
            request_seq: 0,
            mailbox,
        }
    }

    /// Active language, used for fetches and display
    pub fn language(&self) -> Language {
        self.language
    }

    pub fn lock_state(&self) -> &PhraseLock {
        &self.lock
    }

    /// Switch language and translate the displayed bundle phrase
    ///
    /// `displayed` is the current bundle's id and original phrase.
    pub fn set_language(
        &mut self,
        language: Language,
        displayed: Option<(String, String)>,
    ) -> Option<TranslationRequest> {
        self.language = language;
        self.arm_lock();

        displayed.map(|(bundle_id, text)| self.request(Some(bundle_id), text))
    }

    /// Route the phrase of a newly promoted bundle
    pub fn on_bundle_phrase(&mut self, update: PhraseUpdate) -> PhraseDecision {
        if let PhraseLock::Locked { deferred } = &mut self.lock {
            debug!(bundle_id = ?update.bundle_id, "Phrase deferred during language lock");
            *deferred = Some(update);
            return PhraseDecision::Deferred;
        }
        self.decide(update)
    }

    /// Lock window elapsed; returns the held phrase, if any
    pub fn on_lock_expired(&mut self, generation: u64) -> Option<PhraseDecision> {
        if generation != self.lock_generation {
            return None;
        }
        self.lock_task = None;
        match std::mem::replace(&mut self.lock, PhraseLock::Unlocked) {
            PhraseLock::Locked {
                deferred: Some(update),
            } => Some(self.decide(update)),
            _ => None,
        }
    }

    /// Accept a translation only if it is still wanted
    pub fn on_translation_completed(
        &self,
        request: &TranslationRequest,
        result: crate::error::Result<String>,
        current_bundle_id: Option<&str>,
    ) -> Option<PhraseUpdate> {
        if request.seq != self.request_seq
            || request.target != self.language
            || request.bundle_id.as_deref() != current_bundle_id
        {
            debug!(seq = request.seq, "Stale translation discarded");
            return None;
        }

        match result {
            Ok(text) if !text.trim().is_empty() => Some(PhraseUpdate {
                bundle_id: request.bundle_id.clone(),
                text: text.trim().to_string(),
                language: request.target,
            }),
            Ok(_) => {
                warn!("Translation returned empty text; phrase unchanged");
                None
            }
            Err(e) => {
                warn!("Translation failed; phrase unchanged: {}", e);
                None
            }
        }
    }

    pub fn teardown(&mut self) {
        if let Some(task) = self.lock_task.take() {
            task.abort();
        }
        self.lock_generation += 1;
        self.lock = PhraseLock::Unlocked;
    }

    fn decide(&mut self, update: PhraseUpdate) -> PhraseDecision {
        let translate = (update.language != self.language)
            .then(|| self.request(update.bundle_id.clone(), update.text.clone()));
        PhraseDecision::Show { update, translate }
    }

    fn request(&mut self, bundle_id: Option<String>, text: String) -> TranslationRequest {
        self.request_seq += 1;
        TranslationRequest {
            seq: self.request_seq,
            bundle_id,
            text,
            target: self.language,
        }
    }

    fn arm_lock(&mut self) {
        if let Some(task) = self.lock_task.take() {
            task.abort();
        }
        self.lock_generation += 1;
        // Keep a phrase already held by an earlier window
        let deferred = match std::mem::replace(&mut self.lock, PhraseLock::Unlocked) {
            PhraseLock::Locked { deferred } => deferred,
            PhraseLock::Unlocked => None,
        };
        self.lock = PhraseLock::Locked { deferred };

        let generation = self.lock_generation;
        let window = self.lock_window;
        let mailbox = self.mailbox.clone();
        self.lock_task = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let _ = mailbox.send(PipelineMsg::LanguageLockExpired { generation });
        }));
    }
}
