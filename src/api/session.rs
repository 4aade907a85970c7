//! Session bookkeeping: the story list and the current-story guard.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use super::models::StoryHead;

/// Shared marker for the story the user is currently viewing.
///
/// Asynchronous work (background loads, polling sessions) captures the
/// story id it was started for and compares against this guard before
/// applying results. Anything that no longer matches is stale and must be
/// dropped, never applied.
#[derive(Debug, Clone, Default)]
pub struct CurrentStory(Arc<RwLock<Option<String>>>);

impl CurrentStory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, story_id: impl Into<String>) {
        *self.0.write() = Some(story_id.into());
    }

    pub fn clear(&self) {
        *self.0.write() = None;
    }

    pub fn get(&self) -> Option<String> {
        self.0.read().clone()
    }

    pub fn matches(&self, story_id: &str) -> bool {
        self.0.read().as_deref() == Some(story_id)
    }
}

/// The user's stories in sidebar order: most recently touched first.
#[derive(Debug, Default)]
pub struct SessionStore {
    stories: IndexMap<String, StoryHead>,
    current: CurrentStory,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store sharing an existing guard, so pollers and loaders
    /// observe selection changes made here.
    pub fn with_current(current: CurrentStory) -> Self {
        Self {
            stories: IndexMap::new(),
            current,
        }
    }

    pub fn current(&self) -> CurrentStory {
        self.current.clone()
    }

    /// Replace the list with a fresh fetch, preserving the given order.
    /// Clears the selection if the selected story is gone.
    pub fn hydrate(&mut self, stories: Vec<StoryHead>) {
        self.stories = stories
            .into_iter()
            .map(|story| (story.story_id.clone(), story))
            .collect();
        if let Some(selected) = self.current.get() {
            if !self.stories.contains_key(&selected) {
                debug!(story_id = %selected, "selected story gone after refresh");
                self.current.clear();
            }
        }
    }

    /// Insert or update a story and move it to the front of the list.
    pub fn upsert(&mut self, story: StoryHead) {
        self.stories
            .shift_insert(0, story.story_id.clone(), story);
    }

    pub fn rename(&mut self, story_id: &str, story_name: &str) -> bool {
        match self.stories.get_mut(story_id) {
            Some(story) => {
                story.story_name = story_name.to_string();
                true
            }
            None => false,
        }
    }

    /// Remove a story, clearing the selection if it was selected.
    pub fn remove(&mut self, story_id: &str) -> Option<StoryHead> {
        let removed = self.stories.shift_remove(story_id);
        if removed.is_some() && self.current.matches(story_id) {
            self.current.clear();
        }
        removed
    }

    /// Select a story; returns false when it is not in the list.
    pub fn select(&mut self, story_id: &str) -> bool {
        if self.stories.contains_key(story_id) {
            self.current.set(story_id);
            true
        } else {
            false
        }
    }

    pub fn get(&self, story_id: &str) -> Option<&StoryHead> {
        self.stories.get(story_id)
    }

    pub fn stories(&self) -> impl Iterator<Item = &StoryHead> {
        self.stories.values()
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }
}
