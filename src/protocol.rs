//! Correlation primitives: a [`Request`] carries a fresh tag and outgoing
//! words; a [`Response`] accumulates sentences for that tag until a
//! terminating `!done` or `!trap` arrives.
//!
//! [`Response`] is shared between the [`crate::connection`] reader task
//! (which feeds it sentences) and whichever caller is awaiting it, so its
//! mutable state lives behind an internal lock; every method therefore
//! takes `&self`.

use crate::codec::{to_api_attribute_words, Sentence};
use crate::errors::{ProtocolError, ResponseError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// A freshly minted request: an opaque tag and the words the caller wants
/// sent, before the `.tag` api-attribute and terminator are appended.
#[derive(Debug, Clone)]
pub struct Request {
    pub tag: String,
    pub words: Vec<String>,
}

impl Request {
    pub fn new(words: Vec<String>) -> Self {
        Request {
            tag: format!("{:032x}", rand::random::<u128>()),
            words,
        }
    }

    /// Assembles the full wire sentence: user words, `.tag=<tag>`, and the
    /// empty terminator word.
    pub fn sentence_words(&self) -> Result<Vec<String>, ProtocolError> {
        let mut words = self.words.clone();
        words.extend(to_api_attribute_words(vec![(".tag", self.tag.as_str())])?);
        words.push(String::new());
        Ok(words)
    }
}

/// The terminal status of a [`Response`]. `InProgress` responses have not
/// yet seen their `!done`/`!trap` sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    InProgress,
    Success,
    Error,
}

struct Inner {
    sentences: Vec<Sentence>,
    status: ResponseStatus,
    saw_trap: bool,
}

/// Accumulates sentences for one [`Request`] until terminated.
///
/// A response transitions to a terminal status (`Success` or `Error`) at
/// most once; further updates after that point are a programming error.
/// Safe to share behind an `Arc` - the reader task updates it, the
/// original caller awaits it.
pub struct Response {
    pub tag: String,
    inner: Mutex<Inner>,
    completion: Notify,
    complete: AtomicBool,
}

impl Response {
    pub fn new(tag: String) -> Self {
        Response {
            tag,
            inner: Mutex::new(Inner {
                sentences: Vec::new(),
                status: ResponseStatus::InProgress,
                saw_trap: false,
            }),
            completion: Notify::new(),
            complete: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> ResponseStatus {
        self.inner.lock().unwrap().status
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    /// Blocks until the response reaches a terminal status, or `timeout`
    /// elapses. A timeout does not alter the response's state.
    pub async fn wait_until_complete(&self, timeout: Option<Duration>) -> Result<(), Elapsed> {
        if self.is_complete() {
            return Ok(());
        }
        // A `Notified` only enrolls itself on the waiter list once polled,
        // not on creation - `enable()` registers it immediately, before the
        // fast-path re-check below, so a completion delivered between the
        // two checks (which calls `notify_waiters`, waking only already
        // registered waiters) is not missed.
        let notified = self.completion.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_complete() {
            return Ok(());
        }
        match timeout {
            None => {
                notified.await;
                Ok(())
            }
            Some(d) => tokio::time::timeout(d, notified).await.map_err(|_| Elapsed),
        }
    }

    /// Folds a newly-read sentence into this response. `!trap` forces the
    /// eventual status to `Error` regardless of a later `!done`; `!done`
    /// with no prior trap yields `Success` and signals completion.
    ///
    /// # Panics
    /// Panics if the response is already complete - the reader loop must
    /// never deliver a sentence for a tag it has already retired.
    pub fn update_with_sentence(&self, sentence: Sentence) {
        assert!(!self.is_complete(), "response is already complete");

        let is_done = sentence.r#type == "!done";
        let mut inner = self.inner.lock().unwrap();
        if sentence.r#type == "!trap" {
            inner.saw_trap = true;
        }
        inner.sentences.push(sentence);

        if is_done {
            inner.status = if inner.saw_trap {
                ResponseStatus::Error
            } else {
                ResponseStatus::Success
            };
            drop(inner);
            self.complete.store(true, Ordering::SeqCst);
            self.completion.notify_waiters();
        }
    }

    /// "Cancels" an in-progress response by injecting a synthetic `!trap`
    /// sentence with message `"response cancelled"`, then the `!done` that
    /// drives it to a terminal `Error` status. Does not touch the device -
    /// this is purely a client-side teardown mechanism.
    pub fn cancel(&self) {
        let mut trap = Sentence::new("!trap");
        trap.attributes.insert("message".to_string(), "response cancelled".to_string());
        self.update_with_sentence(trap);
        self.update_with_sentence(Sentence::new("!done"));
    }

    /// Returns an error if this completed response's status is `Error`.
    pub fn raise_for_error(&self) -> Result<(), ResponseError> {
        let status = {
            let inner = self.inner.lock().unwrap();
            assert!(self.is_complete(), "response in progress");
            inner.status
        };
        if status != ResponseStatus::Error {
            return Ok(());
        }
        Err(ResponseError {
            messages: self.get_error_data_messages(),
        })
    }

    /// All `!re` sentence attribute maps, valid only once `Success`.
    pub fn get_data(&self) -> Vec<HashMap<String, String>> {
        self.get_re_sentences().into_iter().map(|s| s.attributes).collect()
    }

    /// All `!re` sentences in full (attributes and api-attributes such as
    /// `.id`), valid only once `Success`.
    pub fn get_re_sentences(&self) -> Vec<Sentence> {
        let inner = self.inner.lock().unwrap();
        assert!(self.is_complete(), "response in progress");
        assert_eq!(inner.status, ResponseStatus::Success, "response not success");
        inner.sentences.iter().filter(|s| s.r#type == "!re").cloned().collect()
    }

    /// All `!trap` sentence attribute maps, valid only once `Error`.
    pub fn get_error_data(&self) -> Vec<HashMap<String, String>> {
        let inner = self.inner.lock().unwrap();
        assert!(self.is_complete(), "response in progress");
        assert_eq!(inner.status, ResponseStatus::Error, "response not error");
        inner
            .sentences
            .iter()
            .filter(|s| s.r#type == "!trap")
            .map(|s| s.attributes.clone())
            .collect()
    }

    fn get_error_data_messages(&self) -> Vec<String> {
        self.get_error_data()
            .into_iter()
            .map(|attrs| {
                attrs
                    .get("message")
                    .cloned()
                    .unwrap_or_else(|| "unknown error".to_string())
            })
            .collect()
    }
}

/// Returned by [`Response::wait_until_complete`] when the timeout elapses
/// before completion.
#[derive(Debug)]
pub struct Elapsed;
