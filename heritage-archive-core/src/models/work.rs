use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Name given to works saved without one.
pub const UNTITLED_WORK: &str = "Untitled work";

/// A representative work attached to a practitioner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub technique: String,
    /// Production cycle, free text (e.g. "3 days").
    #[serde(default)]
    pub cycle: String,
    #[serde(default)]
    pub dimensions: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub concept: String,
    #[serde(default)]
    pub social_significance: String,
}

impl WorkRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Self::fresh_id(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_technique(mut self, technique: impl Into<String>) -> Self {
        self.technique = technique.into();
        self
    }

    pub fn with_cycle(mut self, cycle: impl Into<String>) -> Self {
        self.cycle = cycle.into();
        self
    }

    pub fn with_dimensions(mut self, dimensions: impl Into<String>) -> Self {
        self.dimensions = dimensions.into();
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn with_video(mut self, video_url: impl Into<String>) -> Self {
        self.video_url = Some(video_url.into());
        self
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = price.into();
        self
    }

    pub fn with_concept(mut self, concept: impl Into<String>) -> Self {
        self.concept = concept.into();
        self
    }

    pub fn with_social_significance(mut self, text: impl Into<String>) -> Self {
        self.social_significance = text.into();
        self
    }

    /// Generates an identifier for a newly saved work.
    pub fn fresh_id() -> String {
        format!("w-{}", Uuid::new_v4())
    }

    /// Placeholder image used when a work is saved without any.
    pub fn placeholder_image(id: &str) -> String {
        format!("https://picsum.photos/seed/{}/800/600", urlencoding::encode(id))
    }

    /// Returns true if the id was assigned by an unsaved form rather than
    /// by a previous save.
    fn has_provisional_id(&self) -> bool {
        let id = self.id.trim();
        id.is_empty() || id.starts_with("new")
    }

    /// Applies the save-time invariants: a stable id, a non-empty name and
    /// at least one image.
    pub fn normalized(mut self) -> Self {
        if self.has_provisional_id() {
            self.id = Self::fresh_id();
        }

        let name = self.name.trim();
        self.name = if name.is_empty() {
            UNTITLED_WORK.to_string()
        } else {
            name.to_string()
        };

        self.images.retain(|image| !image.trim().is_empty());
        if self.images.is_empty() {
            self.images.push(Self::placeholder_image(&self.id));
        }

        if self.video_url.as_deref().is_some_and(|v| v.trim().is_empty()) {
            self.video_url = None;
        }

        self
    }

    pub fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(query) || self.technique.to_lowercase().contains(query)
    }
}

impl fmt::Display for WorkRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.technique.is_empty() {
            write!(f, " ({})", self.technique)?;
        }
        write!(f, " [{}]", self.id)
    }
}
