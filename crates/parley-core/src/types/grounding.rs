use serde::{Deserialize, Serialize};

/// Citation set attached to a search-grounded reply
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

/// One supporting source
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroundingChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<WebSource>,
}

/// Web page cited by the model
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebSource {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

impl GroundingMetadata {
    /// Build metadata from `(uri, title)` pairs
    pub fn from_web<I, U, T>(sources: I) -> Self
    where
        I: IntoIterator<Item = (U, T)>,
        U: Into<String>,
        T: Into<String>,
    {
        Self {
            grounding_chunks: sources
                .into_iter()
                .map(|(uri, title)| GroundingChunk {
                    web: Some(WebSource {
                        uri: uri.into(),
                        title: title.into(),
                    }),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.grounding_chunks.is_empty()
    }

    /// Web citations in order, skipping chunks without a web source
    pub fn web_sources(&self) -> impl Iterator<Item = &WebSource> {
        self.grounding_chunks.iter().filter_map(|c| c.web.as_ref())
    }
}
