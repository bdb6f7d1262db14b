//! Link navigation used by annotation widgets

use flume::Sender;
use log::{debug, warn};

use crate::engine::LinkTarget;

/// Resolves and follows link annotations
pub trait LinkService {
    /// Value for the widget's `href` attribute
    fn href(&self, target: &LinkTarget) -> String {
        match target {
            LinkTarget::Page(page) => format!("#page={page}"),
            LinkTarget::Uri(uri) => uri.clone(),
        }
    }

    fn navigate(&self, target: &LinkTarget);
}

/// Builds hrefs but ignores navigation
#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleLinkService;

impl LinkService for SimpleLinkService {
    fn navigate(&self, target: &LinkTarget) {
        debug!("Ignoring navigation to {target:?}");
    }
}

/// Requests emitted by link navigation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkRequest {
    GoToPage(usize),
    OpenUri(String),
}

impl From<&LinkTarget> for LinkRequest {
    fn from(target: &LinkTarget) -> Self {
        match target {
            LinkTarget::Page(page) => Self::GoToPage(*page),
            LinkTarget::Uri(uri) => Self::OpenUri(uri.clone()),
        }
    }
}

/// Turns navigation into queued requests for the bootstrap loop
///
/// `T` is the queue's message type, so the service can feed a queue that
/// carries other requests as well.
#[derive(Clone, Debug)]
pub struct QueueLinkService<T = LinkRequest> {
    tx: Sender<T>,
}

impl<T> QueueLinkService<T> {
    #[must_use]
    pub fn new(tx: Sender<T>) -> Self {
        Self { tx }
    }
}

impl<T: From<LinkRequest>> LinkService for QueueLinkService<T> {
    fn navigate(&self, target: &LinkTarget) {
        let request = LinkRequest::from(target);
        debug!("Queueing link request {request:?}");
        if self.tx.send(T::from(request)).is_err() {
            warn!("Link request dropped, receiver is gone");
        }
    }
}
