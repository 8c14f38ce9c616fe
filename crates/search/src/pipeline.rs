use crate::error::{Result, SearchError};
use imgfind_vector_store::{
    ImageCatalog, Neighbor, RetrievedImage, SharedCatalog, TextEmbedder, VectorStoreError,
};
use std::time::Duration;

pub const DEFAULT_TOP_N: usize = 3;
const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolves a query embedding into ranked images.
///
/// Each run walks `Idle → QueryEmbedded → Searched → Resolved → Done` while holding one
/// read lock on the catalog, so it never sees an ingest half-applied.
#[derive(Debug, Clone)]
pub struct RetrievalPipeline {
    catalog: SharedCatalog,
    top_n: usize,
    provider_timeout: Duration,
}

impl RetrievalPipeline {
    #[must_use]
    pub fn new(catalog: SharedCatalog, top_n: usize) -> Self {
        Self {
            catalog,
            top_n,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn top_n(&self) -> usize {
        self.top_n
    }

    /// Rank images against a pre-computed query vector.
    pub async fn run(&self, query: Vec<f32>) -> Result<Vec<RetrievedImage>> {
        let catalog = self.catalog.read().await;
        let results = Idle::new(&catalog)
            .accept(query)
            .search(self.top_n)?
            .resolve()?
            .finish();
        log::debug!("Retrieved {} images", results.len());
        Ok(results)
    }

    /// Embed `query` with `embedder`, then rank images against it.
    ///
    /// The provider is called before the catalog lock is taken, and only when its
    /// declared dimension matches the catalog.
    pub async fn search_text(
        &self,
        embedder: &dyn TextEmbedder,
        query: &str,
    ) -> Result<Vec<RetrievedImage>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        log::debug!("Searching for: '{}' (top_n: {})", query, self.top_n);

        let expected = self.catalog.dimension().await;
        if embedder.dimension() != expected {
            return Err(VectorStoreError::DimensionMismatch {
                expected,
                actual: embedder.dimension(),
            }
            .into());
        }

        let vector = match tokio::time::timeout(self.provider_timeout, embedder.embed_text(query))
            .await
        {
            Ok(Ok(vector)) => vector,
            Ok(Err(err @ VectorStoreError::ProviderFailure { .. })) => return Err(err.into()),
            Ok(Err(err)) => return Err(VectorStoreError::provider(query, err).into()),
            Err(_) => {
                return Err(VectorStoreError::provider(
                    query,
                    format!("timed out after {:?}", self.provider_timeout),
                )
                .into())
            }
        };
        self.run(vector).await
    }
}

/// Pipeline start: nothing but the catalog.
pub struct Idle<'a> {
    catalog: &'a ImageCatalog,
}

/// A query vector is in hand.
pub struct QueryEmbedded<'a> {
    catalog: &'a ImageCatalog,
    vector: Vec<f32>,
}

/// The index returned ranked positions.
pub struct Searched<'a> {
    catalog: &'a ImageCatalog,
    hits: Vec<Neighbor>,
}

/// Positions were translated into image ids and captions.
pub struct Resolved {
    results: Vec<RetrievedImage>,
}

impl<'a> Idle<'a> {
    #[must_use]
    pub const fn new(catalog: &'a ImageCatalog) -> Self {
        Self { catalog }
    }

    #[must_use]
    pub fn accept(self, vector: Vec<f32>) -> QueryEmbedded<'a> {
        QueryEmbedded {
            catalog: self.catalog,
            vector,
        }
    }
}

impl<'a> QueryEmbedded<'a> {
    pub fn search(self, top_n: usize) -> Result<Searched<'a>> {
        let hits = self.catalog.search(&self.vector, top_n)?;
        Ok(Searched {
            catalog: self.catalog,
            hits,
        })
    }
}

impl Searched<'_> {
    #[must_use]
    pub fn hits(&self) -> &[Neighbor] {
        &self.hits
    }

    /// Look up every hit by position, keeping rank order.
    ///
    /// A missing position means the index and record store drifted apart; that is
    /// reported, never skipped.
    pub fn resolve(self) -> Result<Resolved> {
        let results = self
            .hits
            .iter()
            .map(|hit| {
                let record = self.catalog.lookup_by_position(hit.position)?;
                Ok(RetrievedImage {
                    image_id: record.image_id.clone(),
                    caption: record.caption.clone(),
                    distance: hit.distance,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Resolved { results })
    }
}

impl Resolved {
    #[must_use]
    pub fn finish(self) -> Vec<RetrievedImage> {
        self.results
    }
}
