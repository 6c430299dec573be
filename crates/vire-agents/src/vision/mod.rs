//! Image handles and the captioning collaborator
//!
//! Images are never decoded in-process. An [`ImageRef`] is a path that the
//! vision service resolves on its side.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tools::http::HttpEndpoint;
use crate::tools::ToolError;

/// Default address of the local vision service
pub const DEFAULT_VISION_BASE_URL: &str = "http://127.0.0.1:8000";

/// Opaque handle to an input image
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(PathBuf);

impl ImageRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Path as sent over the wire
    pub fn as_wire(&self) -> String {
        self.0.to_string_lossy().into_owned()
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<&str> for ImageRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for ImageRef {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

/// Produces a textual description of an image
#[async_trait]
pub trait Captioner: Send + Sync {
    async fn caption(&self, image: &ImageRef) -> Result<String, ToolError>;

    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct CaptionRequest {
    image_path: String,
}

#[derive(Deserialize)]
struct CaptionResponse {
    caption: String,
}

/// Captioner backed by the vision service's `/caption` route
#[derive(Debug, Clone)]
pub struct HttpCaptioner {
    endpoint: HttpEndpoint,
}

impl HttpCaptioner {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            endpoint: HttpEndpoint::new(base_url),
        }
    }

    pub fn with_endpoint(endpoint: HttpEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl Captioner for HttpCaptioner {
    async fn caption(&self, image: &ImageRef) -> Result<String, ToolError> {
        let request = CaptionRequest {
            image_path: image.as_wire(),
        };
        let response: CaptionResponse = self.endpoint.post_json("/caption", &request).await?;
        let caption = response.caption.trim().to_string();
        if caption.is_empty() {
            return Err(ToolError::InvalidResponse("empty caption".to_string()));
        }
        debug!(image = %image, caption = %caption, "Image captioned");
        Ok(caption)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Captioner returning fixed text, for offline runs and tests
#[derive(Debug, Clone)]
pub struct StaticCaptioner {
    caption: String,
}

impl StaticCaptioner {
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
        }
    }
}

#[async_trait]
impl Captioner for StaticCaptioner {
    async fn caption(&self, _image: &ImageRef) -> Result<String, ToolError> {
        Ok(self.caption.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}
