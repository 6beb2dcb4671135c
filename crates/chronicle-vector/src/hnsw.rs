//! Persistent HNSW index using usearch.
//!
//! Keys are global positions. Vectors are stored as F32 under the squared-L2
//! metric so `reconstruct` returns exactly what was appended, and reported
//! distances are converted back to plain Euclidean.
//!
//! Parameters tuned for quality over speed:
//! - M = 16 (connections per layer)
//! - ef_construction = 200 (build-time quality)
//! - ef_search = 100 (search-time quality)

use std::path::PathBuf;

use chronicle_embeddings::Embedding;
use chrono::Utc;
use tracing::{debug, info, warn};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::VectorError;
use crate::index::{IndexStats, SearchHit, VectorIndex};

/// File name of the persisted index inside `HnswConfig::index_path`
pub const INDEX_FILE: &str = "events.usearch";

/// HNSW index configuration
#[derive(Debug, Clone)]
pub struct HnswConfig {
    /// Embedding dimension (must match model)
    pub dimension: usize,
    /// Number of connections per layer (M parameter)
    pub connectivity: usize,
    /// Build-time search depth (ef_construction)
    pub expansion_add: usize,
    /// Query-time search depth (ef_search)
    pub expansion_search: usize,
    /// Directory holding the index file
    pub index_path: PathBuf,
    /// Capacity reserved for a fresh index
    pub initial_capacity: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            dimension: 384, // all-MiniLM-L6-v2
            connectivity: 16,
            expansion_add: 200,
            expansion_search: 100,
            index_path: PathBuf::from("./vector-index"),
            initial_capacity: 1024,
        }
    }
}

impl HnswConfig {
    pub fn new(dimension: usize, index_path: impl Into<PathBuf>) -> Self {
        Self {
            dimension,
            index_path: index_path.into(),
            ..Default::default()
        }
    }

    pub fn with_connectivity(mut self, m: usize) -> Self {
        self.connectivity = m;
        self
    }

    pub fn with_expansion(mut self, ef_add: usize, ef_search: usize) -> Self {
        self.expansion_add = ef_add;
        self.expansion_search = ef_search;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn index_file(&self) -> PathBuf {
        self.index_path.join(INDEX_FILE)
    }

    fn options(&self) -> IndexOptions {
        IndexOptions {
            dimensions: self.dimension,
            metric: MetricKind::L2sq,
            quantization: ScalarKind::F32,
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.expansion_search,
            multi: false, // One vector per position
        }
    }
}

/// Append-only positional index persisted to a single usearch file.
pub struct HnswIndex {
    index: Index,
    config: HnswConfig,
}

impl HnswIndex {
    /// Load the persisted index, or start empty.
    ///
    /// A file that can't be loaded (corrupt, wrong dimension, gaps in the
    /// position sequence) is moved aside and replaced by an empty index.
    /// Only failing to create the empty index is an error.
    pub fn open_or_create(config: HnswConfig) -> Result<Self, VectorError> {
        std::fs::create_dir_all(&config.index_path)?;
        let index_file = config.index_file();

        if index_file.exists() {
            match Self::load(&config) {
                Ok(index) => {
                    info!(
                        path = ?index_file,
                        vectors = index.size(),
                        dim = config.dimension,
                        "Opened existing vector index"
                    );
                    return Ok(Self { index, config });
                }
                Err(e) => {
                    warn!(
                        path = ?index_file,
                        error = %e,
                        "Failed to load vector index, starting with an empty index"
                    );
                    quarantine(&index_file);
                }
            }
        }

        info!(path = ?index_file, dim = config.dimension, "Creating new vector index");
        let index = Self::create_empty(&config)?;
        Ok(Self { index, config })
    }

    fn create_empty(config: &HnswConfig) -> Result<Index, VectorError> {
        let index = Index::new(&config.options()).map_err(|e| VectorError::Index(e.to_string()))?;
        index
            .reserve(config.initial_capacity)
            .map_err(|e| VectorError::Index(e.to_string()))?;
        Ok(index)
    }

    fn load(config: &HnswConfig) -> Result<Index, VectorError> {
        let index_file = config.index_file();
        let path_str = index_file
            .to_str()
            .ok_or_else(|| VectorError::Persistence("Invalid path encoding".to_string()))?;

        let index = Index::new(&config.options()).map_err(|e| VectorError::Index(e.to_string()))?;
        index
            .load(path_str)
            .map_err(|e| VectorError::Persistence(format!("Failed to load: {}", e)))?;

        if index.dimensions() != config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: config.dimension,
                actual: index.dimensions(),
            });
        }

        let size = index.size() as u64;
        if let Some(missing) = (0..size).find(|position| !index.contains(*position)) {
            return Err(VectorError::Persistence(format!(
                "position {} missing from index of {} vectors",
                missing, size
            )));
        }

        Ok(index)
    }

    pub fn index_file(&self) -> PathBuf {
        self.config.index_file()
    }

    /// Write the index to a temp file, then rename over the previous one.
    pub fn persist(&self) -> Result<(), VectorError> {
        let path = self.index_file();
        let tmp = path.with_extension("usearch.tmp");
        let tmp_str = tmp
            .to_str()
            .ok_or_else(|| VectorError::Persistence("Invalid path encoding".to_string()))?;

        self.index
            .save(tmp_str)
            .map_err(|e| VectorError::Persistence(format!("Failed to save: {}", e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| VectorError::Persistence(format!("Failed to replace index: {}", e)))?;

        debug!(path = ?path, vectors = self.index.size(), "Saved vector index");
        Ok(())
    }

    /// Grow capacity (doubling) so `additional` more vectors fit.
    fn reserve_for(&self, additional: usize) -> Result<(), VectorError> {
        let needed = self.index.size() + additional;
        let capacity = self.index.capacity();
        if needed > capacity {
            let target = needed.max(capacity.saturating_mul(2));
            self.index
                .reserve(target)
                .map_err(|e| VectorError::Index(e.to_string()))?;
            debug!(from = capacity, to = target, "Grew vector index capacity");
        }
        Ok(())
    }
}

/// Move an unreadable index file aside so the next save doesn't destroy it.
fn quarantine(path: &std::path::Path) {
    let aside = path.with_extension(format!("corrupt-{}", Utc::now().timestamp_millis()));
    match std::fs::rename(path, &aside) {
        Ok(()) => warn!(moved_to = ?aside, "Preserved unreadable vector index"),
        Err(e) => warn!(error = %e, "Could not move unreadable vector index aside"),
    }
}

impl VectorIndex for HnswIndex {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn len(&self) -> usize {
        self.index.size()
    }

    fn append(&mut self, vectors: &[Embedding]) -> Result<Vec<u64>, VectorError> {
        for vector in vectors {
            if vector.dimension() != self.config.dimension {
                return Err(VectorError::DimensionMismatch {
                    expected: self.config.dimension,
                    actual: vector.dimension(),
                });
            }
        }
        if vectors.is_empty() {
            return Ok(Vec::new());
        }

        self.reserve_for(vectors.len())?;

        let start = self.index.size() as u64;
        let mut positions = Vec::with_capacity(vectors.len());
        for (offset, vector) in vectors.iter().enumerate() {
            let position = start + offset as u64;
            self.index
                .add(position, vector.values.as_slice())
                .map_err(|e| VectorError::Index(e.to_string()))?;
            positions.push(position);
        }

        self.persist()?;

        debug!(start = start, count = positions.len(), "Appended vectors");
        Ok(positions)
    }

    fn reconstruct(&self, position: u64) -> Result<Embedding, VectorError> {
        let out_of_range = VectorError::OutOfRange {
            position,
            len: self.len(),
        };
        if position >= self.len() as u64 {
            return Err(out_of_range);
        }

        let mut values = vec![0.0f32; self.config.dimension];
        let found = self
            .index
            .get(position, values.as_mut_slice())
            .map_err(|e| VectorError::Index(e.to_string()))?;
        if found == 0 {
            return Err(out_of_range);
        }
        Ok(Embedding::from_raw(values))
    }

    fn search_all(&self, query: &Embedding, top_k: usize) -> Result<Vec<SearchHit>, VectorError> {
        self.check_query(query)?;

        let k = top_k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let matches = self
            .index
            .search(query.values.as_slice(), k)
            .map_err(|e| VectorError::Index(e.to_string()))?;

        let mut hits: Vec<SearchHit> = matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .map(|(&position, &dist_sq)| SearchHit::new(position, dist_sq.max(0.0).sqrt()))
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });

        debug!(k = k, found = hits.len(), "Search complete");
        Ok(hits)
    }

    fn stats(&self) -> IndexStats {
        let size_bytes = std::fs::metadata(self.index_file())
            .map(|m| m.len())
            .unwrap_or(0);

        IndexStats {
            vector_count: self.index.size(),
            dimension: self.config.dimension,
            size_bytes,
            available: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_types::EventRange;
    use tempfile::TempDir;

    fn random_embedding(dim: usize) -> Embedding {
        use rand::Rng;
        let mut rng = rand::rng();
        let values: Vec<f32> = (0..dim).map(|_| rng.random()).collect();
        Embedding::from_raw(values)
    }

    #[test]
    fn test_create_index() {
        let temp = TempDir::new().unwrap();
        let config = HnswConfig::new(384, temp.path());
        let index = HnswIndex::open_or_create(config).unwrap();
        assert_eq!(index.dimension(), 384);
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_append_assigns_positions_and_persists() {
        let temp = TempDir::new().unwrap();
        let config = HnswConfig::new(16, temp.path()).with_capacity(4);
        let mut index = HnswIndex::open_or_create(config).unwrap();

        let first: Vec<Embedding> = (0..3).map(|_| random_embedding(16)).collect();
        let second: Vec<Embedding> = (0..5).map(|_| random_embedding(16)).collect();

        assert_eq!(index.append(&first).unwrap(), vec![0, 1, 2]);
        assert_eq!(index.append(&second).unwrap(), vec![3, 4, 5, 6, 7]);
        assert_eq!(index.len(), 8);
        assert!(index.index_file().exists());
    }

    #[test]
    fn test_reconstruct_round_trip() {
        let temp = TempDir::new().unwrap();
        let mut index = HnswIndex::open_or_create(HnswConfig::new(32, temp.path())).unwrap();

        index.append(&[random_embedding(32)]).unwrap();
        let v = random_embedding(32);
        let position = index.append(&[v.clone()]).unwrap()[0];

        assert_eq!(position, 1);
        assert_eq!(index.reconstruct(position).unwrap(), v);
    }

    #[test]
    fn test_reconstruct_unassigned_position() {
        let temp = TempDir::new().unwrap();
        let mut index = HnswIndex::open_or_create(HnswConfig::new(8, temp.path())).unwrap();
        index.append(&[random_embedding(8)]).unwrap();

        assert!(matches!(
            index.reconstruct(1),
            Err(VectorError::OutOfRange { position: 1, len: 1 })
        ));
    }

    #[test]
    fn test_search_all_sorted_ascending() {
        let temp = TempDir::new().unwrap();
        let config = HnswConfig::new(64, temp.path()).with_capacity(100);
        let mut index = HnswIndex::open_or_create(config).unwrap();

        let vectors: Vec<Embedding> = (0..10).map(|_| random_embedding(64)).collect();
        index.append(&vectors).unwrap();

        let results = index.search(&random_embedding(64), None, 5).unwrap();
        assert_eq!(results.len(), 5);
        for pair in results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_scoped_search_is_exact_and_contained() {
        let temp = TempDir::new().unwrap();
        let mut index = HnswIndex::open_or_create(HnswConfig::new(8, temp.path())).unwrap();

        let query = random_embedding(8);
        // Foreign vectors identical to the query
        index.append(&vec![query.clone(); 20]).unwrap();
        let own: Vec<Embedding> = (0..4).map(|_| random_embedding(8)).collect();
        let own_positions = index.append(&own).unwrap();
        index.append(&vec![query.clone(); 20]).unwrap();

        let range = EventRange::new(own_positions[0], own_positions[3]).unwrap();
        let hits = index.search(&query, Some(range), 10).unwrap();

        assert_eq!(hits.len(), 4);
        assert!(hits.iter().all(|h| range.contains(h.position)));

        let best = hits[0];
        let expected = query.l2_distance(&index.reconstruct(best.position).unwrap());
        assert!((best.distance - expected).abs() < 1e-5);
    }

    #[test]
    fn test_save_and_reload_keeps_positions() {
        let temp = TempDir::new().unwrap();
        let config = HnswConfig::new(16, temp.path()).with_capacity(100);
        let v = random_embedding(16);

        {
            let mut index = HnswIndex::open_or_create(config.clone()).unwrap();
            index
                .append(&(0..4).map(|_| random_embedding(16)).collect::<Vec<_>>())
                .unwrap();
            index.append(&[v.clone()]).unwrap();
        }

        let mut index = HnswIndex::open_or_create(config).unwrap();
        assert_eq!(index.len(), 5);
        assert_eq!(index.reconstruct(4).unwrap(), v);
        assert_eq!(index.append(&[random_embedding(16)]).unwrap(), vec![5]);
    }

    #[test]
    fn test_dimension_mismatch_on_append() {
        let temp = TempDir::new().unwrap();
        let mut index = HnswIndex::open_or_create(HnswConfig::new(64, temp.path())).unwrap();

        let result = index.append(&[random_embedding(64), random_embedding(32)]);
        assert!(matches!(result, Err(VectorError::DimensionMismatch { .. })));
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_wrong_dimension_file_falls_back_to_empty() {
        let temp = TempDir::new().unwrap();
        {
            let mut index = HnswIndex::open_or_create(HnswConfig::new(32, temp.path())).unwrap();
            index.append(&[random_embedding(32)]).unwrap();
        }

        let index = HnswIndex::open_or_create(HnswConfig::new(64, temp.path())).unwrap();
        assert_eq!(index.len(), 0);
        assert_eq!(index.dimension(), 64);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_empty() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(INDEX_FILE), b"definitely not an index").unwrap();

        let mut index = HnswIndex::open_or_create(HnswConfig::new(8, temp.path())).unwrap();
        assert_eq!(index.len(), 0);
        assert_eq!(index.append(&[random_embedding(8)]).unwrap(), vec![0]);

        let preserved = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().contains("corrupt-"));
        assert!(preserved);
    }
}
