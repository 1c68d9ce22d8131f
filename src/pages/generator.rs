//! The admin page generating personalized invitation links

use super::feed::{LiveList, SharedList};
use super::notice::{CONFIRM_CLEAR_LINKS, CONFIRM_CLEAR_MESSAGES, Clipboard, Confirm, Notice};
use crate::core::link::build_invitation_link;
use crate::core::model::{GuestInvitation, NewGuestInvitation, RsvpMessage};
use crate::core::row::{Row, RowChange};
use crate::core::service::Backend;
use anyhow::Result;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How long a row shows its "copied" marker
pub const COPIED_FOR: Duration = Duration::from_secs(2);

/// Where the template preview navigates
pub const TEMPLATE_URL: &str = "/";

struct Mounted {
    backend: Backend,
    feed_task: JoinHandle<()>,
}

/// State of the link generator
///
/// Actions take `&mut self`, so a second generate cannot start while one is
/// in flight.
pub struct GeneratorPage {
    site_url: String,
    /// The "Nama Tamu" input
    pub guest_name: String,
    copied: Option<(i64, Instant)>,
    links: SharedList<GuestInvitation>,
    mounted: Option<Mounted>,
}

impl GeneratorPage {
    /// Generator building links on `site_url`
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
            guest_name: String::new(),
            copied: None,
            links: SharedList::new(LiveList::new()),
            mounted: None,
        }
    }

    /// Load every link and follow `guest_invitations`
    pub async fn mount(&mut self, backend: Backend) -> Result<()> {
        if self.mounted.is_some() {
            return Ok(());
        }

        match backend.invitations.select(None).await {
            Ok(rows) => self.links.replace_all(rows).await,
            Err(e) => tracing::error!(error = %e, "Error loading guest invitations"),
        }

        let subscription = backend.invitations.subscribe().await?;
        let feed_task = self
            .links
            .follow(subscription, backend.invitations.clone(), None);

        self.mounted = Some(Mounted { backend, feed_task });
        Ok(())
    }

    /// Release the subscription
    pub fn teardown(&mut self) {
        if let Some(mounted) = self.mounted.take() {
            mounted.feed_task.abort();
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    fn backend(&self) -> Option<&Backend> {
        let backend = self.mounted.as_ref().map(|m| &m.backend);
        if backend.is_none() {
            tracing::warn!("generator action before the page was mounted");
        }
        backend
    }

    /// Create a link for the name in [`guest_name`](Self::guest_name)
    ///
    /// The stored row is added to the list right away; its echo on the
    /// change feed is recognized by id and ignored, and so is the local
    /// insert when the feed already reported the row deleted. The input is
    /// cleared on success.
    pub async fn generate(&mut self) -> Option<Notice> {
        let name = self.guest_name.trim().to_string();
        if name.is_empty() {
            return Some(Notice::MissingGuestName);
        }

        let link = match build_invitation_link(&self.site_url, &name) {
            Ok(link) => link,
            Err(e) => {
                tracing::error!(error = %e, "Error generating link");
                return Some(Notice::LinkBuildFailed);
            }
        };

        let backend = self.backend()?.clone();
        let draft = NewGuestInvitation {
            guest_name: name,
            link,
        };

        match backend.invitations.insert(draft).await {
            Ok(row) => {
                tracing::info!(id = row.id, guest_name = %row.guest_name, "invitation link created");
                self.links.apply(RowChange::Inserted(row)).await;
                self.guest_name.clear();
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Error saving guest invitation");
                Some(Notice::InvitationSaveFailed)
            }
        }
    }

    /// Copy the link of row `id` and mark it as copied at `now`
    pub async fn copy(
        &mut self,
        id: i64,
        clipboard: &mut impl Clipboard,
        now: Instant,
    ) -> Option<Notice> {
        let link = self.link_of(id).await?;

        match clipboard.set_text(&link) {
            Ok(()) => {
                self.copied = Some((id, now));
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to copy");
                Some(Notice::CopyFailed)
            }
        }
    }

    /// Whether row `id` still shows its "copied" marker at `now`
    pub fn is_copied(&self, id: i64, now: Instant) -> bool {
        self.copied
            .is_some_and(|(copied, at)| copied == id && now.saturating_duration_since(at) < COPIED_FOR)
    }

    /// URL to open in a new browsing context for row `id`
    pub async fn preview_url(&self, id: i64) -> Option<String> {
        self.link_of(id).await
    }

    pub fn template_url(&self) -> &'static str {
        TEMPLATE_URL
    }

    /// Delete row `id`
    ///
    /// The row stays listed when the store rejects the delete.
    pub async fn delete(&mut self, id: i64) -> Option<Notice> {
        let backend = self.backend()?.clone();

        match backend.invitations.delete(id).await {
            Ok(()) => {
                self.links.apply(RowChange::Deleted(id)).await;
                None
            }
            Err(e) => {
                tracing::error!(id = id, error = %e, "Error deleting guest invitation");
                Some(Notice::InvitationDeleteFailed)
            }
        }
    }

    /// Delete every generated link after confirmation
    pub async fn clear_all_links(&mut self, confirm: &mut impl Confirm) -> Option<Notice> {
        if !confirm.confirm(CONFIRM_CLEAR_LINKS) {
            return None;
        }
        let backend = self.backend()?.clone();

        match backend
            .invitations
            .delete_all_except(GuestInvitation::sentinel())
            .await
        {
            Ok(removed) => {
                // The list empties as the delete events arrive on the feed
                tracing::info!(removed = removed, "all invitation links cleared");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Error clearing all links");
                Some(Notice::ClearLinksFailed)
            }
        }
    }

    /// Delete every RSVP message after confirmation
    pub async fn clear_all_messages(&mut self, confirm: &mut impl Confirm) -> Option<Notice> {
        if !confirm.confirm(CONFIRM_CLEAR_MESSAGES) {
            return None;
        }
        let backend = self.backend()?.clone();

        match backend
            .messages
            .delete_all_except(RsvpMessage::sentinel())
            .await
        {
            Ok(removed) => {
                tracing::info!(removed = removed, "all RSVP messages cleared");
                Some(Notice::MessagesCleared)
            }
            Err(e) => {
                tracing::error!(error = %e, "Error clearing all messages");
                Some(Notice::ClearMessagesFailed)
            }
        }
    }

    /// The generated links, newest first
    pub async fn links(&self) -> Vec<GuestInvitation> {
        self.links.snapshot().await
    }

    pub async fn link_count(&self) -> usize {
        self.links.read().await.len()
    }

    /// Receiver notified whenever the list changes
    pub fn watch_links(&self) -> watch::Receiver<u64> {
        self.links.watch()
    }

    async fn link_of(&self, id: i64) -> Option<String> {
        self.links.read().await.get(id).map(|row| row.link.clone())
    }
}

impl Drop for GeneratorPage {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::EventBus;
    use crate::pages::notice::MemoryClipboard;

    async fn wait_for_links(page: &GeneratorPage, count: usize) {
        let mut revision = page.watch_links();
        tokio::time::timeout(Duration::from_secs(2), async {
            while page.link_count().await != count {
                revision.changed().await.unwrap();
            }
        })
        .await
        .expect("links never reached the expected count");
    }

    async fn mounted() -> (GeneratorPage, Backend) {
        let backend = Backend::in_memory(EventBus::new(64));
        let mut page = GeneratorPage::new("https://nikah.example.com");
        page.mount(backend.clone()).await.unwrap();
        (page, backend)
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected_without_insert() {
        let (mut page, backend) = mounted().await;
        page.guest_name = "   ".into();

        assert_eq!(page.generate().await, Some(Notice::MissingGuestName));
        assert!(backend.invitations.select(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_is_listed_once() {
        let (mut page, _backend) = mounted().await;

        page.guest_name = " Bapak/Ibu Sari ".into();
        assert_eq!(page.generate().await, None);
        assert!(page.guest_name.is_empty());

        let links = page.links().await;
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].guest_name, "Bapak/Ibu Sari");
        assert_eq!(
            links[0].link,
            "https://nikah.example.com?guest=Bapak%2FIbu%20Sari"
        );

        // Let the echoed insert arrive; it must not duplicate the row
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(page.link_count().await, 1);
    }

    #[tokio::test]
    async fn test_bad_site_url_reports_build_failure() {
        let backend = Backend::in_memory(EventBus::new(16));
        let mut page = GeneratorPage::new("not a url");
        page.mount(backend).await.unwrap();

        page.guest_name = "Sari".into();
        assert_eq!(page.generate().await, Some(Notice::LinkBuildFailed));
        assert_eq!(page.guest_name, "Sari");
    }

    #[tokio::test]
    async fn test_copy_marker_expires() {
        let (mut page, _backend) = mounted().await;
        page.guest_name = "Sari".into();
        page.generate().await;
        let id = page.links().await[0].id;

        let mut clipboard = MemoryClipboard::new();
        let now = Instant::now();
        assert_eq!(page.copy(id, &mut clipboard, now).await, None);
        assert_eq!(
            clipboard.contents().as_deref(),
            Some("https://nikah.example.com?guest=Sari")
        );
        assert!(page.is_copied(id, now + Duration::from_millis(1999)));
        assert!(!page.is_copied(id, now + COPIED_FOR));
        assert!(!page.is_copied(id + 1, now));
    }

    #[tokio::test]
    async fn test_copy_failure() {
        let (mut page, _backend) = mounted().await;
        page.guest_name = "Sari".into();
        page.generate().await;
        let id = page.links().await[0].id;

        let mut clipboard = MemoryClipboard::unavailable();
        let now = Instant::now();
        assert_eq!(
            page.copy(id, &mut clipboard, now).await,
            Some(Notice::CopyFailed)
        );
        assert!(!page.is_copied(id, now));
    }

    #[tokio::test]
    async fn test_clear_requires_confirmation() {
        let (mut page, backend) = mounted().await;
        page.guest_name = "Sari".into();
        page.generate().await;

        assert_eq!(page.clear_all_links(&mut false).await, None);
        assert_eq!(backend.invitations.select(None).await.unwrap().len(), 1);

        assert_eq!(page.clear_all_links(&mut true).await, None);
        assert!(backend.invitations.select(None).await.unwrap().is_empty());
        wait_for_links(&page, 0).await;
    }

    #[tokio::test]
    async fn test_clear_messages_reports_success() {
        let (mut page, _backend) = mounted().await;
        let mut asked = Vec::new();
        let mut confirm = |prompt: &str| {
            asked.push(prompt.to_string());
            true
        };

        assert_eq!(
            page.clear_all_messages(&mut confirm).await,
            Some(Notice::MessagesCleared)
        );
        assert_eq!(asked, vec![CONFIRM_CLEAR_MESSAGES.to_string()]);
    }

    #[tokio::test]
    async fn test_preview_and_delete() {
        let (mut page, backend) = mounted().await;
        page.guest_name = "Sari".into();
        page.generate().await;
        let id = page.links().await[0].id;

        assert_eq!(
            page.preview_url(id).await.as_deref(),
            Some("https://nikah.example.com?guest=Sari")
        );
        assert_eq!(page.delete(id).await, None);
        assert!(page.preview_url(id).await.is_none());
        assert!(backend.invitations.select(None).await.unwrap().is_empty());
    }

    #[test]
    fn test_template_url() {
        assert_eq!(GeneratorPage::new("http://localhost:3000").template_url(), "/");
    }
}
