//! Data contracts for the story backend.
//!
//! Field names serialize in camelCase, exactly as the backend's JSON. Types
//! here mirror the backend's OpenAPI models, trimmed to the story editing
//! flow.

use serde::{Deserialize, Serialize};

use super::ApiError;

/// Generation state of a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StoryState {
    Pending,
    Completed,
}

/// An image attached to a story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub image_id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// Per-story generation settings. All fields optional; the backend fills
/// defaults for anything unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_model_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawing_style_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_blind_option_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regenerate_image: Option<bool>,
}

/// Full story payload returned by detail fetches and edit commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryDetailsResponse {
    pub story_id: String,
    pub story_name: String,
    pub story_text: String,
    pub state: StoryState,
    #[serde(default)]
    pub story_images: Vec<ImageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub settings: StorySettings,
}

impl StoryDetailsResponse {
    /// URL of the story's first image, the one the canvas loads.
    pub fn primary_image_url(&self) -> Option<&str> {
        self.story_images.first().map(|image| image.url.as_str())
    }

    pub fn is_completed(&self) -> bool {
        self.state == StoryState::Completed
    }
}

/// Story list entry (sidebar view).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryHead {
    pub story_id: String,
    pub story_name: String,
    pub last_edited: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStoriesResponse {
    #[serde(default)]
    pub stories: Vec<StoryHead>,
}

/// One selectable value for a story setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingOption {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSettingsResponse {
    #[serde(default)]
    pub available_image_models: Vec<SettingOption>,
    #[serde(default)]
    pub available_drawing_styles: Vec<SettingOption>,
    #[serde(default)]
    pub color_blind_options: Vec<SettingOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNewStoryRequest {
    pub user_id: String,
    pub story_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStoryNameRequest {
    pub user_id: String,
    pub story_id: String,
    pub story_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteStoryRequest {
    pub user_id: String,
    pub story_id: String,
}

/// Regenerate the story's images from edited text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateImagesByTextRequest {
    pub user_id: String,
    pub story_id: String,
    pub updated_text: String,
}

/// Commit sketch edits and regenerate the story text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTextByImagesRequest {
    pub user_id: String,
    pub story_id: String,
    pub image_operations: Vec<ImageOperation>,
}

/// What happened to a story image during an edit session.
///
/// - `nochange`: only the text changed, keep the image.
/// - `sketchFromScratch`: a sketch drawn with no background image.
/// - `sketchOnImage`: a sketch drawn on top of an existing image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ImageOperation {
    #[serde(rename_all = "camelCase")]
    Nochange {
        image_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SketchFromScratch {
        /// Strokes-only canvas export as a base64 data URL.
        canvas_data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SketchOnImage {
        image_id: String,
        canvas_data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
    },
}

impl ImageOperation {
    /// Classify the canvas outcome for a commit. `canvas_data` is the
    /// strokes-only export, `image_id` the existing image if one was shown.
    /// A session with neither marks nor a background has nothing to commit.
    pub fn determine(
        has_marks: bool,
        has_background: bool,
        canvas_data: &str,
        image_id: Option<&str>,
    ) -> Result<Self, ApiError> {
        let image_id = image_id.unwrap_or("1");
        match (has_marks, has_background) {
            (false, true) => Ok(Self::Nochange {
                image_id: image_id.to_string(),
                alt: None,
            }),
            (true, false) => Ok(Self::SketchFromScratch {
                canvas_data: canvas_data.to_string(),
                alt: None,
            }),
            (true, true) => Ok(Self::SketchOnImage {
                image_id: image_id.to_string(),
                canvas_data: canvas_data.to_string(),
                alt: None,
            }),
            (false, false) => Err(ApiError::InvalidState(
                "no drawings and no background image".into(),
            )),
        }
    }
}
