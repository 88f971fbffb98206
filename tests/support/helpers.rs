//! Test helper functions for integration tests
//!
//! Procedural helpers (not rstest fixtures) that lay out small TREC-style
//! inputs on disk.

use std::path::{Path, PathBuf};

pub const CORPUS: &str = "\
p1\tWisdom tooth extraction usually takes about an hour and recovery lasts a few days.
p2\tA marathon is a long-distance race of 42.195 kilometres.
p3\tHypothetical document embeddings average generated passages with the query.
p4\tThe Manhattan Project produced the first nuclear weapons during World War II.
";

pub const TOPICS: &str = "\
q1\thow long does wisdom tooth extraction take
q2\thow long is a marathon
q3\twhat was the manhattan project
";

/// q3 has no judgments and must not be retrieved.
pub const QRELS: &str = "\
q1 0 p1 2
q1 0 p2 0
q2 0 p2 3
";

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Writes corpus, topics and qrels; returns their paths in that order.
pub fn write_collection(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
    (
        write_file(dir, "collection.tsv", CORPUS),
        write_file(dir, "topics.tsv", TOPICS),
        write_file(dir, "qrels.txt", QRELS),
    )
}

/// Parses a run file into `(qid, doc_id, rank, score)` rows.
pub fn read_run(path: &Path) -> Vec<(String, String, usize, f32)> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| {
            let fields = line.split(' ').collect::<Vec<_>>();
            assert_eq!(fields.len(), 6, "malformed run line: {line}");
            assert_eq!(fields[1], "Q0");
            assert_eq!(fields[5], "rank");
            (
                fields[0].to_string(),
                fields[2].to_string(),
                fields[3].parse().unwrap(),
                fields[4].parse().unwrap(),
            )
        })
        .collect()
}
