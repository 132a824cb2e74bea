use crate::error::{BenchError, Result};
use crate::model::{Document, Query, Split};
use crate::retrieval::EmbeddingSet;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: usize,
    pub num_queries: usize,
    pub num_train: usize,
    pub num_test: usize,
    pub seed: u64,
    pub created_at: String,
    pub version: u32,
}

/// Layout of a prepared-benchmark snapshot directory.
pub struct SnapshotPaths {
    pub root: PathBuf,
}

impl SnapshotPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn documents(&self) -> PathBuf { self.root.join("documents.bin") }
    fn queries(&self) -> PathBuf { self.root.join("queries.bin") }
    fn split(&self) -> PathBuf { self.root.join("split.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = File::create(path).map_err(|e| BenchError::io(path, e))?;
    f.write_all(bytes).map_err(|e| BenchError::io(path, e))
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut f = File::open(path).map_err(|e| BenchError::io(path, e))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf).map_err(|e| BenchError::io(path, e))?;
    Ok(buf)
}

fn ensure_root(paths: &SnapshotPaths) -> Result<()> {
    create_dir_all(&paths.root).map_err(|e| BenchError::io(&paths.root, e))
}

pub fn save_documents(paths: &SnapshotPaths, docs: &[Document]) -> Result<()> {
    ensure_root(paths)?;
    write_bytes(&paths.documents(), &bincode::serialize(docs)?)
}

pub fn load_documents(paths: &SnapshotPaths) -> Result<Vec<Document>> {
    Ok(bincode::deserialize(&read_bytes(&paths.documents())?)?)
}

pub fn save_queries(paths: &SnapshotPaths, queries: &[Query]) -> Result<()> {
    ensure_root(paths)?;
    write_bytes(&paths.queries(), &bincode::serialize(queries)?)
}

pub fn load_queries(paths: &SnapshotPaths) -> Result<Vec<Query>> {
    Ok(bincode::deserialize(&read_bytes(&paths.queries())?)?)
}

pub fn save_split(paths: &SnapshotPaths, split: &Split) -> Result<()> {
    ensure_root(paths)?;
    write_bytes(&paths.split(), &bincode::serialize(split)?)
}

pub fn load_split(paths: &SnapshotPaths) -> Result<Split> {
    Ok(bincode::deserialize(&read_bytes(&paths.split())?)?)
}

pub fn save_meta(paths: &SnapshotPaths, meta: &MetaFile) -> Result<()> {
    ensure_root(paths)?;
    write_bytes(&paths.meta(), serde_json::to_string_pretty(meta)?.as_bytes())
}

pub fn load_meta(paths: &SnapshotPaths) -> Result<MetaFile> {
    let bytes = read_bytes(&paths.meta())?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

#[derive(Serialize, Deserialize)]
struct EmbeddingRecord {
    id: String,
    embedding: Vec<f32>,
}

/// Read `{"id": ..., "embedding": [...]}` lines. Blank lines are skipped,
/// an unparsable line is fatal.
pub fn load_embeddings(path: &Path) -> Result<EmbeddingSet> {
    let f = File::open(path).map_err(|e| BenchError::io(path, e))?;
    let mut set = EmbeddingSet::new();
    for (i, line) in BufReader::new(f).lines().enumerate() {
        let line = line.map_err(|e| BenchError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: EmbeddingRecord = serde_json::from_str(&line)
            .map_err(|_| BenchError::Malformed { kind: "embedding record", path: path.to_path_buf(), line: i + 1 })?;
        set.push(record.id, record.embedding);
    }
    tracing::info!(path = %path.display(), vectors = set.len(), "embeddings loaded");
    Ok(set)
}

pub fn save_embeddings(path: &Path, set: &EmbeddingSet) -> Result<()> {
    let f = File::create(path).map_err(|e| BenchError::io(path, e))?;
    let mut w = BufWriter::new(f);
    for (id, v) in set.ids.iter().zip(&set.vectors) {
        let line = serde_json::to_string(&EmbeddingRecord { id: id.clone(), embedding: v.clone() })?;
        writeln!(w, "{line}").map_err(|e| BenchError::io(path, e))?;
    }
    w.flush().map_err(|e| BenchError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn snapshot_survives_reload() {
        let dir = tempdir().unwrap();
        let paths = SnapshotPaths::new(dir.path().join("snap"));
        let doc = Document { doc_no: "FT1".into(), text: Some("body".into()), ..Default::default() };
        let mut q = Query::new("301", "oil spills");
        q.add_relevant_doc("FT1");
        let split = Split { train: vec![], test: vec![q.clone()] };

        save_documents(&paths, &[doc.clone()]).unwrap();
        save_queries(&paths, &[q.clone()]).unwrap();
        save_split(&paths, &split).unwrap();

        assert_eq!(load_documents(&paths).unwrap(), vec![doc]);
        assert_eq!(load_queries(&paths).unwrap(), vec![q]);
        assert_eq!(load_split(&paths).unwrap(), split);
    }

    #[test]
    fn meta_is_json_with_timestamp() {
        let dir = tempdir().unwrap();
        let paths = SnapshotPaths::new(dir.path());
        let meta = MetaFile {
            num_docs: 3,
            num_queries: 2,
            num_train: 1,
            num_test: 1,
            seed: 42,
            created_at: now_rfc3339(),
            version: SNAPSHOT_VERSION,
        };
        save_meta(&paths, &meta).unwrap();
        let raw = std::fs::read_to_string(dir.path().join("meta.json")).unwrap();
        assert!(raw.contains("\"seed\": 42"));
        assert_eq!(load_meta(&paths).unwrap(), meta);
        assert!(meta.created_at.contains('T'));
    }

    #[test]
    fn embeddings_jsonl_roundtrip_and_bad_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("e.jsonl");
        let mut set = EmbeddingSet::new();
        set.push("a", vec![1.0, 0.5]);
        set.push("b", vec![0.0, 2.0]);
        save_embeddings(&path, &set).unwrap();
        assert_eq!(load_embeddings(&path).unwrap(), set);

        std::fs::write(&path, "{\"id\":\"a\",\"embedding\":[1.0]}\n\nnot json\n").unwrap();
        match load_embeddings(&path) {
            Err(BenchError::Malformed { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
