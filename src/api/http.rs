//! HTTP client for the story backend's `/items` routes.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::models::{
    AvailableSettingsResponse, CreateNewStoryRequest, DeleteStoryRequest, SetStoryNameRequest,
    StoryDetailsResponse, UpdateImagesByTextRequest, UpdateTextByImagesRequest,
    UserStoriesResponse,
};
use super::ApiError;

/// Remote story operations the editing flow consumes. A trait seam so the
/// poller and higher-level flows can run against scripted fakes in tests.
#[async_trait]
pub trait StoryApi: Send + Sync {
    async fn get_story_by_id(
        &self,
        user_id: &str,
        story_id: &str,
    ) -> Result<StoryDetailsResponse, ApiError>;

    async fn get_user_stories(&self, user_id: &str) -> Result<UserStoriesResponse, ApiError>;

    async fn create_new_story(
        &self,
        request: &CreateNewStoryRequest,
    ) -> Result<StoryDetailsResponse, ApiError>;

    async fn set_story_name(&self, request: &SetStoryNameRequest) -> Result<(), ApiError>;

    async fn delete_story(&self, request: &DeleteStoryRequest) -> Result<(), ApiError>;

    /// Commit sketch edits; the backend regenerates the story text and
    /// returns the story in `PENDING` state.
    async fn update_text_by_images(
        &self,
        request: &UpdateTextByImagesRequest,
    ) -> Result<StoryDetailsResponse, ApiError>;

    /// Commit text edits; the backend regenerates the images.
    async fn update_images_by_text(
        &self,
        request: &UpdateImagesByTextRequest,
    ) -> Result<StoryDetailsResponse, ApiError>;

    async fn get_available_settings(&self) -> Result<AvailableSettingsResponse, ApiError>;
}

/// reqwest-backed [`StoryApi`].
#[derive(Debug, Clone)]
pub struct HttpStoryApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpStoryApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        debug!(path, "GET");
        let response = self.client.get(self.url(path)).query(query).send().await?;
        Self::decode(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        debug!(path, "POST");
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        Ok(response.json::<T>().await?)
    }

    async fn expect_success(response: reqwest::Response) -> Result<(), ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl StoryApi for HttpStoryApi {
    async fn get_story_by_id(
        &self,
        user_id: &str,
        story_id: &str,
    ) -> Result<StoryDetailsResponse, ApiError> {
        self.get_json(
            "/items/getStoryById",
            &[("userId", user_id), ("storyId", story_id)],
        )
        .await
    }

    async fn get_user_stories(&self, user_id: &str) -> Result<UserStoriesResponse, ApiError> {
        self.get_json("/items/getUserStories", &[("userId", user_id)])
            .await
    }

    async fn create_new_story(
        &self,
        request: &CreateNewStoryRequest,
    ) -> Result<StoryDetailsResponse, ApiError> {
        self.post_json("/items/createNewStory", request).await
    }

    async fn set_story_name(&self, request: &SetStoryNameRequest) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url("/items/setStoryName"))
            .json(request)
            .send()
            .await?;
        Self::expect_success(response).await
    }

    async fn delete_story(&self, request: &DeleteStoryRequest) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url("/items/deleteStory"))
            .json(request)
            .send()
            .await?;
        Self::expect_success(response).await
    }

    async fn update_text_by_images(
        &self,
        request: &UpdateTextByImagesRequest,
    ) -> Result<StoryDetailsResponse, ApiError> {
        self.post_json("/items/updateTextByImages", request).await
    }

    async fn update_images_by_text(
        &self,
        request: &UpdateImagesByTextRequest,
    ) -> Result<StoryDetailsResponse, ApiError> {
        self.post_json("/items/updateImagesByText", request).await
    }

    async fn get_available_settings(&self) -> Result<AvailableSettingsResponse, ApiError> {
        self.get_json("/items/getAvailableSettings", &[]).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};

    use super::*;
    use crate::api::models::{ImageOperation, StoryState};

    fn sample_story(story_id: &str, state: StoryState) -> StoryDetailsResponse {
        StoryDetailsResponse {
            story_id: story_id.to_string(),
            story_name: "The Fox".into(),
            story_text: "Once upon a time...".into(),
            state,
            story_images: Vec::new(),
            audio_url: None,
            settings: Default::default(),
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn get_story_by_id_passes_query_params() {
        let app = Router::new().route(
            "/items/getStoryById",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params["userId"], "u-1");
                assert_eq!(params["storyId"], "s-1");
                Json(sample_story(&params["storyId"], StoryState::Completed))
            }),
        );
        let api = HttpStoryApi::new(serve(app).await);

        let story = api.get_story_by_id("u-1", "s-1").await.unwrap();
        assert_eq!(story.story_id, "s-1");
        assert!(story.is_completed());
    }

    #[tokio::test]
    async fn update_text_by_images_posts_operations() {
        let app = Router::new().route(
            "/items/updateTextByImages",
            post(|Json(request): Json<UpdateTextByImagesRequest>| async move {
                assert_eq!(request.image_operations.len(), 1);
                assert!(matches!(
                    request.image_operations[0],
                    ImageOperation::SketchOnImage { .. }
                ));
                Json(sample_story(&request.story_id, StoryState::Pending))
            }),
        );
        let api = HttpStoryApi::new(serve(app).await);

        let request = UpdateTextByImagesRequest {
            user_id: "u-1".into(),
            story_id: "s-1".into(),
            image_operations: vec![ImageOperation::SketchOnImage {
                image_id: "7".into(),
                canvas_data: "data:image/png;base64,AAAA".into(),
                alt: None,
            }],
        };
        let story = api.update_text_by_images(&request).await.unwrap();
        assert_eq!(story.state, StoryState::Pending);
    }

    #[tokio::test]
    async fn delete_story_uses_delete_verb() {
        let app = Router::new().route(
            "/items/deleteStory",
            delete(|Json(request): Json<DeleteStoryRequest>| async move {
                assert_eq!(request.story_id, "s-9");
                StatusCode::OK
            }),
        );
        let api = HttpStoryApi::new(serve(app).await);

        let request = DeleteStoryRequest {
            user_id: "u-1".into(),
            story_id: "s-9".into(),
        };
        api.delete_story(&request).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_maps_to_status_error() {
        let app = Router::new().route(
            "/items/getStoryById",
            get(|| async { StatusCode::NOT_FOUND }),
        );
        let api = HttpStoryApi::new(serve(app).await);

        let err = api.get_story_by_id("u-1", "missing").await.unwrap_err();
        assert!(matches!(err, ApiError::Status(404)));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = HttpStoryApi::new("http://backend/");
        assert_eq!(api.url("/items/getUserStories"), "http://backend/items/getUserStories");
    }
}
