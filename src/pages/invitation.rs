//! The guest-facing invitation page
//!
//! Lifecycle: [`InvitationPage::new`] resolves the personalization from the
//! page URL, [`mount`](InvitationPage::mount) loads the feed, subscribes to
//! `rsvp_messages` and starts the countdown, [`teardown`](InvitationPage::teardown)
//! releases both.

use super::countdown::{Countdown, TimeLeft};
use super::feed::{LiveList, SharedList};
use super::lightbox::Lightbox;
use super::notice::Notice;
use super::rsvp::{FEED_LIMIT, RsvpForm, RsvpStats, visible};
use crate::config::{AudioConfig, WeddingConfig};
use crate::core::link::guest_name_from_url;
use crate::core::model::{DEFAULT_GUEST_NAME, RsvpMessage};
use crate::core::service::Backend;
use anyhow::Result;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Countdown refresh period
pub const TICK: Duration = Duration::from_secs(1);

/// Hint under the read-only name field of a personalized invitation
pub const PERSONALIZED_HINT: &str = "Nama dari link undangan personal";

/// Hint under the read-only name field of a generic invitation
pub const GENERIC_HINT: &str = "Tamu umum";

/// Background music controls
#[derive(Debug, Clone, PartialEq)]
pub struct AudioState {
    pub src: String,
    pub looped: bool,
    playing: bool,
    muted: bool,
    volume: f32,
}

impl AudioState {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            src: config.src.clone(),
            looped: config.looped,
            playing: false,
            muted: false,
            volume: config.volume.clamp(0.0, 1.0),
        }
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn toggle_play(&mut self) {
        self.playing = !self.playing;
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    /// Set the volume; zero mutes, anything else unmutes
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.muted = self.volume == 0.0;
    }

    /// Whether sound is actually coming out
    pub fn is_audible(&self) -> bool {
        self.playing && !self.muted
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Volume as shown on the slider
    pub fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.volume }
    }
}

struct Mounted {
    backend: Backend,
    feed_task: JoinHandle<()>,
    countdown: Countdown,
}

/// State of one open invitation page
pub struct InvitationPage {
    wedding: WeddingConfig,
    personalized: bool,
    opened: bool,
    pub audio: AudioState,
    pub form: RsvpForm,
    pub lightbox: Lightbox,
    feed: SharedList<RsvpMessage>,
    mounted: Option<Mounted>,
}

impl InvitationPage {
    /// Page for `page_url`, personalized by its `guest` parameter
    pub fn new(wedding: WeddingConfig, page_url: &str) -> Self {
        let guest = guest_name_from_url(page_url);
        let personalized = guest.is_some();
        let name = guest.unwrap_or_else(|| DEFAULT_GUEST_NAME.to_string());

        Self {
            audio: AudioState::new(&wedding.audio),
            lightbox: Lightbox::new(wedding.gallery.clone()),
            form: RsvpForm::new(name),
            feed: SharedList::new(LiveList::bounded(FEED_LIMIT)),
            personalized,
            opened: false,
            mounted: None,
            wedding,
        }
    }

    pub fn guest_name(&self) -> &str {
        &self.form.name
    }

    pub fn is_personalized(&self) -> bool {
        self.personalized
    }

    pub fn name_hint(&self) -> &'static str {
        if self.personalized {
            PERSONALIZED_HINT
        } else {
            GENERIC_HINT
        }
    }

    pub fn wedding(&self) -> &WeddingConfig {
        &self.wedding
    }

    /// Open the cover and start the music; returns false if already open
    pub fn open(&mut self) -> bool {
        if self.opened {
            return false;
        }
        self.opened = true;
        self.audio.play();
        true
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// Load the newest messages, follow the feed and start the countdown
    ///
    /// A failed initial load is logged and leaves the feed empty; the
    /// subscription still delivers new messages.
    pub async fn mount(&mut self, backend: Backend) -> Result<()> {
        if self.mounted.is_some() {
            return Ok(());
        }

        match backend.messages.select(Some(FEED_LIMIT)).await {
            Ok(rows) => self.feed.replace_all(rows).await,
            Err(e) => tracing::error!(error = %e, "Error loading messages"),
        }

        let subscription = backend.messages.subscribe().await?;
        let feed_task =
            self.feed
                .follow(subscription, backend.messages.clone(), Some(FEED_LIMIT));
        let countdown = Countdown::start(self.wedding.target, TICK);

        self.mounted = Some(Mounted {
            backend,
            feed_task,
            countdown,
        });
        Ok(())
    }

    /// Release the subscription and stop the countdown
    pub fn teardown(&mut self) {
        if let Some(mut mounted) = self.mounted.take() {
            mounted.feed_task.abort();
            mounted.countdown.stop();
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    /// Submit the RSVP form
    ///
    /// Returns `None` when there was nothing to submit. On success the form
    /// is cleared except for the name; on failure it is kept as typed. The
    /// new message reaches the feed through the subscription.
    pub async fn submit(&mut self) -> Option<Notice> {
        let draft = self.form.submission()?;

        let Some(mounted) = self.mounted.as_ref() else {
            tracing::warn!("RSVP submitted before the page was mounted");
            return None;
        };

        match mounted.backend.messages.insert(draft).await {
            Ok(row) => {
                tracing::info!(id = %row.id, attendance = %row.attendance, "RSVP saved");
                self.form.reset_after_submit();
                Some(Notice::RsvpThanks)
            }
            Err(e) => {
                tracing::error!(error = %e, "Error saving message");
                Some(Notice::RsvpFailed(e.to_string()))
            }
        }
    }

    /// Remaining time, zero when not mounted
    pub fn time_left(&self) -> TimeLeft {
        self.mounted
            .as_ref()
            .map(|m| m.countdown.current())
            .unwrap_or_default()
    }

    /// Receiver of countdown ticks, while mounted
    pub fn watch_countdown(&self) -> Option<watch::Receiver<TimeLeft>> {
        self.mounted.as_ref().map(|m| m.countdown.watch())
    }

    /// Receiver notified whenever the feed changes
    pub fn watch_feed(&self) -> watch::Receiver<u64> {
        self.feed.watch()
    }

    /// The cached feed, newest first
    pub async fn messages(&self) -> Vec<RsvpMessage> {
        self.feed.snapshot().await
    }

    /// The part of the feed that is rendered
    pub async fn visible_messages(&self) -> Vec<RsvpMessage> {
        visible(self.feed.read().await.rows()).to_vec()
    }

    pub async fn stats(&self) -> RsvpStats {
        RsvpStats::from_messages(self.feed.read().await.rows())
    }
}

impl Drop for InvitationPage {
    fn drop(&mut self) {
        self.teardown();
    }
}
