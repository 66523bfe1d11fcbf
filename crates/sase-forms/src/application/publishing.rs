//! Publish toggling and public slug resolution

use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::responses::owned_form;
use crate::domain::aggregates::FormWithQuestions;
use crate::domain::value_objects::{generate_slug, FormId, OwnerId};
use crate::ports::outbound::FormStore;
use crate::{FormsError, Result};

pub const DEFAULT_SLUG_LENGTH: usize = 8;
pub const DEFAULT_SLUG_ATTEMPTS: u32 = 5;

type SlugSource = Arc<dyn Fn(usize) -> String + Send + Sync>;

/// How public slugs are minted.
#[derive(Clone)]
pub struct SlugPolicy {
    pub length: usize,
    pub max_attempts: u32,
    source: SlugSource,
}

impl SlugPolicy {
    pub fn new(length: usize, max_attempts: u32) -> Self {
        Self { length, max_attempts: max_attempts.max(1), source: Arc::new(generate_slug) }
    }

    /// Replaces the random generator, mostly for tests.
    pub fn with_source(mut self, source: impl Fn(usize) -> String + Send + Sync + 'static) -> Self {
        self.source = Arc::new(source);
        self
    }

    fn mint(&self) -> String {
        (self.source)(self.length)
    }
}

impl Default for SlugPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SLUG_LENGTH, DEFAULT_SLUG_ATTEMPTS)
    }
}

impl fmt::Debug for SlugPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlugPolicy")
            .field("length", &self.length)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

pub struct PublishingService {
    store: Arc<dyn FormStore>,
    policy: SlugPolicy,
}

impl PublishingService {
    pub fn new(store: Arc<dyn FormStore>, policy: SlugPolicy) -> Self {
        Self { store, policy }
    }

    /// Sets the published flag. A slug is minted the first time a form is
    /// published and kept for good afterwards, including across unpublish.
    pub async fn set_published(
        &self,
        owner_id: &OwnerId,
        form_id: &FormId,
        published: bool,
    ) -> Result<Option<String>> {
        let mut form = owned_form(self.store.as_ref(), owner_id, form_id).await?;

        if published && form.slug.is_none() {
            form.slug = Some(self.claim_new_slug(form_id).await?);
        }
        form.is_published = published;
        self.store.update_form(&form).await?;

        info!(form_id = %form.id, published, slug = form.slug.as_deref().unwrap_or(""), "publish state changed");
        Ok(form.slug)
    }

    /// Resolves a slug for the public page. Unpublished or inactive forms are
    /// indistinguishable from unknown slugs.
    pub async fn find_published(&self, slug: &str) -> Result<FormWithQuestions> {
        let form = self
            .store
            .find_form_by_slug(slug)
            .await?
            .filter(|f| f.is_available())
            .ok_or(FormsError::FormNotFound)?;
        let questions = self.store.list_questions(&form.id).await?;
        Ok(FormWithQuestions { form, questions })
    }

    async fn claim_new_slug(&self, form_id: &FormId) -> Result<String> {
        for attempt in 1..=self.policy.max_attempts {
            let candidate = self.policy.mint();
            if self.store.claim_slug(form_id, &candidate).await? {
                return Ok(candidate);
            }
            warn!(form_id = %form_id, attempt, "slug collision");
        }
        Err(FormsError::SlugExhausted(self.policy.max_attempts))
    }
}
