//! Serialization of a manifest tree into an output sink.

use pipekit_core::{Error, Result};
use std::collections::BTreeMap;
use std::io::Write;
use tracing::info;

use crate::tree::ManifestTree;

/// Destination for encoded documents.
pub trait ManifestSink {
    fn write(&mut self, path: &str, document: &str) -> Result<()>;
}

/// Writes every document to a stream, each followed by `---`.
pub struct StreamSink<W: Write> {
    writer: W,
}

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ManifestSink for StreamSink<W> {
    fn write(&mut self, path: &str, document: &str) -> Result<()> {
        self.writer
            .write_all(document.as_bytes())
            .and_then(|_| self.writer.write_all(b"---\n"))
            .map_err(|e| Error::Write {
                path: path.to_string(),
                message: e.to_string(),
            })
    }
}

/// Collects documents in memory, keyed by path.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub documents: BTreeMap<String, String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ManifestSink for MemorySink {
    fn write(&mut self, path: &str, document: &str) -> Result<()> {
        self.documents.insert(path.to_string(), document.to_string());
        Ok(())
    }
}

/// Encode every resource in path order, then hand them to `sink`.
///
/// Nothing is written unless every document encodes. Returns the number of
/// documents written.
pub fn serialize_tree<S: ManifestSink + ?Sized>(tree: &ManifestTree, sink: &mut S) -> Result<usize> {
    let documents = tree
        .iter()
        .map(|(path, resource)| {
            resource
                .to_yaml()
                .map(|doc| (path, doc))
                .map_err(|e| Error::Serialization {
                    path: path.to_string(),
                    message: e.to_string(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    for (path, document) in &documents {
        sink.write(path, document)?;
    }

    info!(documents = documents.len(), "Wrote manifests");
    Ok(documents.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipekit_resources::objects::namespace;
    use std::io;

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn tree() -> ManifestTree {
        let mut tree = ManifestTree::new();
        tree.insert("b.yaml", namespace("b"));
        tree.insert("a.yaml", namespace("a"));
        tree
    }

    #[test]
    fn test_stream_sink() {
        let mut sink = StreamSink::new(Vec::new());
        let count = serialize_tree(&tree(), &mut sink).unwrap();
        assert_eq!(count, 2);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            out,
            "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: a\n---\n\
             apiVersion: v1\nkind: Namespace\nmetadata:\n  name: b\n---\n"
        );
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySink::new();
        serialize_tree(&tree(), &mut sink).unwrap();
        assert_eq!(sink.documents.len(), 2);
        assert!(sink.documents["a.yaml"].contains("name: a"));
    }

    #[test]
    fn test_write_failure() {
        let mut sink = StreamSink::new(FailingWriter);
        let err = serialize_tree(&tree(), &mut sink).unwrap_err();
        assert!(matches!(err, Error::Write { path, .. } if path == "a.yaml"));
    }

    #[test]
    fn test_empty_tree() {
        let mut sink = MemorySink::new();
        assert_eq!(serialize_tree(&ManifestTree::new(), &mut sink).unwrap(), 0);
    }
}
