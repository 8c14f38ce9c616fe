use serde::{Deserialize, Serialize};

/// One indexed image: its slot in the flat index, its vector and its caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub image_id: String,
    pub position: usize,
    pub vector: Vec<f32>,
    pub caption: Option<String>,
}

/// Raw index hit: a position and its squared Euclidean distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// A resolved search result, in rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedImage {
    pub image_id: String,
    pub caption: Option<String>,
    pub distance: f32,
}
