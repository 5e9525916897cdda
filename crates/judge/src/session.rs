//! Per-session caches owned by an explicitly passed context.
//!
//! A [`SessionContext`] is created when the application starts, shared
//! via `Arc`, and emptied with [`SessionContext::clear`]. It holds:
//!
//! - language details, keyed by `(flavor, id)`;
//! - the language catalog listed per flavor;
//! - the bundled-dependency payload, fetched at most once.

use std::collections::{HashMap, HashSet};

use codepad_core::language::{
    Flavor, Language, LanguageOption, LanguageRef, MULTI_FILE_PROGRAM_LANGUAGE_ID,
};
use tokio::sync::{Mutex, RwLock};

use crate::api::{ExecutionApi, JudgeApiError};

#[derive(Default)]
pub struct SessionContext {
    languages: RwLock<HashMap<LanguageRef, Language>>,
    catalogs: RwLock<HashMap<Flavor, Vec<Language>>>,
    /// Held across the download so concurrent callers share one fetch.
    bundled_files: Mutex<Option<String>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every cached value.
    pub async fn clear(&self) {
        self.languages.write().await.clear();
        self.catalogs.write().await.clear();
        *self.bundled_files.lock().await = None;
        tracing::debug!("Session caches cleared");
    }

    /// Language details, fetched once per `(flavor, id)`.
    pub async fn language(
        &self,
        api: &dyn ExecutionApi,
        language: LanguageRef,
    ) -> Result<Language, JudgeApiError> {
        if let Some(cached) = self.languages.read().await.get(&language) {
            return Ok(cached.clone());
        }

        let fetched = api
            .get_language(language.flavor, language.language_id)
            .await?;
        self.languages
            .write()
            .await
            .insert(language, fetched.clone());
        Ok(fetched)
    }

    /// Whether `language` appears in the catalog of its flavor.
    ///
    /// Returns `None` when that catalog has not been loaded this session.
    pub async fn is_known(&self, language: LanguageRef) -> Option<bool> {
        self.catalogs
            .read()
            .await
            .get(&language.flavor)
            .map(|entries| entries.iter().any(|l| l.id == language.language_id))
    }

    /// List both flavors and merge them into one selectable catalog.
    ///
    /// Standard entries come first; an extra entry is added only when no
    /// entry with the same name exists yet. Multi-file programs are left
    /// out. The result is sorted by name. A flavor that fails to list is
    /// skipped; the call fails only if every flavor fails.
    pub async fn load_catalog(
        &self,
        api: &dyn ExecutionApi,
    ) -> Result<Vec<LanguageOption>, JudgeApiError> {
        let mut options: Vec<LanguageOption> = Vec::new();
        let mut names: HashSet<String> = HashSet::new();
        let mut last_error = None;
        let mut loaded_any = false;

        for flavor in Flavor::ALL {
            let entries = match api.list_languages(flavor).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(flavor = %flavor, error = %e, "Failed to list languages");
                    last_error = Some(e);
                    continue;
                }
            };
            loaded_any = true;

            for entry in &entries {
                if entry.id == MULTI_FILE_PROGRAM_LANGUAGE_ID || names.contains(&entry.name) {
                    continue;
                }
                names.insert(entry.name.clone());
                options.push(LanguageOption {
                    flavor,
                    id: entry.id,
                    name: entry.name.clone(),
                });
            }

            tracing::debug!(flavor = %flavor, count = entries.len(), "Language catalog loaded");
            self.catalogs.write().await.insert(flavor, entries);
        }

        match last_error {
            Some(e) if !loaded_any => Err(e),
            _ => {
                options.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(options)
            }
        }
    }

    /// The bundled-dependency payload, downloaded on first use.
    ///
    /// A failed download is not cached; the next call tries again.
    pub async fn bundled_files(&self, api: &dyn ExecutionApi) -> Result<String, JudgeApiError> {
        let mut slot = self.bundled_files.lock().await;
        if let Some(payload) = slot.as_ref() {
            tracing::debug!("Using cached bundled files");
            return Ok(payload.clone());
        }

        tracing::info!("Fetching bundled files");
        let payload = api.fetch_bundled_files().await?;
        *slot = Some(payload.clone());
        Ok(payload)
    }
}
