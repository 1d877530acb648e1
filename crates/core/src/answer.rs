use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Locks a mutex whose contents are plain data, recovering from poisoning.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The candidate's in-progress answer.
///
/// Written by direct text edits from the presentation layer and by the
/// speech input adapter's final transcripts. Cloning shares the buffer.
#[derive(Debug, Clone, Default)]
pub struct AnswerBuffer {
    text: Arc<Mutex<String>>,
}

impl AnswerBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole buffer, as a text edit does.
    pub fn set(&self, text: impl Into<String>) {
        *lock(&self.text) = text.into();
    }

    /// Appends a finalized transcript, separated from existing text by one space.
    pub fn append_transcript(&self, transcript: &str) {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return;
        }
        let mut text = lock(&self.text);
        if !text.is_empty() && !text.ends_with(char::is_whitespace) {
            text.push(' ');
        }
        text.push_str(transcript);
    }

    pub fn clear(&self) {
        lock(&self.text).clear();
    }

    pub fn snapshot(&self) -> String {
        lock(&self.text).clone()
    }

    /// True when the buffer holds nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        lock(&self.text).trim().is_empty()
    }
}
