//! RDF export sink.
//!
//! In export mode the commit pipeline writes each batch's edges as triple
//! lines to a file instead of mutating a store. The sink is shared by all
//! committers, so writes are serialized behind an async mutex.

use std::path::Path;

use samgraph_core::{rdf, MutateStats, MutationRequest};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

use crate::error::Result;

pub struct RdfSink {
    writer: Mutex<BufWriter<File>>,
}

impl RdfSink {
    pub async fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).await?;
        Ok(RdfSink {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Append one batch as triple lines.
    pub async fn write(&self, req: &MutationRequest) -> Result<MutateStats> {
        let mut lines = String::new();
        for nq in &req.set {
            lines.push_str(&rdf::render_line(nq));
            lines.push('\n');
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(lines.as_bytes()).await?;
        Ok(MutateStats {
            edges: req.set.len(),
            created_nodes: 0,
        })
    }

    /// Flush buffered lines to disk; called once after the pipeline drains.
    pub async fn finish(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use samgraph_core::{NQuad, Value};

    #[tokio::test]
    async fn writes_one_line_per_edge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.rdf");
        let sink = RdfSink::create(&path).await.unwrap();

        let req = MutationRequest {
            query: String::new(),
            set: vec![
                NQuad::value("_:p", "product.name", Value::str("Widget")),
                NQuad::link("_:p", "product.equipment", "_:e"),
            ],
        };
        let stats = sink.write(&req).await.unwrap();
        assert_eq!(stats.edges, 2);
        sink.finish().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("product.name"));
        assert!(lines[1].contains("<_:e>"));
    }
}
