//! Loading passages, topics and relevance judgments from disk

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub qid: String,
    pub query: String,
}

/// Query ids that have at least one judgment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Qrels {
    judged: HashSet<String>,
}

impl Qrels {
    pub fn contains(&self, qid: &str) -> bool {
        self.judged.contains(qid)
    }

    pub fn len(&self) -> usize {
        self.judged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.judged.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct JsonPassage {
    id: String,
    #[serde(alias = "text")]
    contents: String,
}

/// Reads a passage collection.
///
/// `.jsonl`/`.json` files hold one `{"id": .., "contents": ..}` object per
/// line; anything else is read as `id<TAB>text`.
pub fn load_passages(path: &Path) -> Result<Vec<Passage>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus: {}", path.display()))?;
    let jsonl = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jsonl") || e.eq_ignore_ascii_case("json"));

    let mut passages = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let passage = if jsonl {
            let p: JsonPassage = serde_json::from_str(line).with_context(|| {
                format!("Invalid JSON passage at {}:{}", path.display(), lineno + 1)
            })?;
            Passage {
                id: p.id,
                text: p.contents,
            }
        } else {
            let (id, text) = split_tab(line)
                .ok_or_else(|| anyhow!("Expected id<TAB>text at {}:{}", path.display(), lineno + 1))?;
            Passage {
                id: id.to_string(),
                text: text.to_string(),
            }
        };
        passages.push(passage);
    }

    tracing::debug!(path = %path.display(), passages = passages.len(), "Loaded corpus");
    Ok(passages)
}

/// Reads `qid<TAB>query` topics, keeping file order.
pub fn load_topics(path: &Path) -> Result<Vec<Topic>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read topics: {}", path.display()))?;

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(lineno, line)| {
            let (qid, query) = split_tab(line).ok_or_else(|| {
                anyhow!("Expected qid<TAB>query at {}:{}", path.display(), lineno + 1)
            })?;
            Ok(Topic {
                qid: qid.to_string(),
                query: query.trim().to_string(),
            })
        })
        .collect()
}

/// Reads TREC qrels (`qid iter docid rel`, whitespace separated).
pub fn load_qrels(path: &Path) -> Result<Qrels> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read qrels: {}", path.display()))?;

    let mut judged = HashSet::new();
    for (lineno, line) in raw.lines().enumerate() {
        let fields = line.split_whitespace().collect::<Vec<_>>();
        match fields.as_slice() {
            [] => continue,
            [qid, _, _, _] => {
                judged.insert((*qid).to_string());
            }
            _ => {
                return Err(anyhow!(
                    "Expected `qid iter docid rel` at {}:{}",
                    path.display(),
                    lineno + 1
                ))
            }
        }
    }
    Ok(Qrels { judged })
}

/// Topics without judgments cannot be scored, so they are not retrieved.
pub fn judged_topics(topics: Vec<Topic>, qrels: &Qrels) -> Vec<Topic> {
    let total = topics.len();
    let kept = topics
        .into_iter()
        .filter(|t| qrels.contains(&t.qid))
        .collect::<Vec<_>>();
    if kept.len() < total {
        tracing::info!(total, judged = kept.len(), "Skipping topics without qrels");
    }
    kept
}

fn split_tab(line: &str) -> Option<(&str, &str)> {
    let (id, rest) = line.split_once('\t')?;
    let id = id.trim();
    if id.is_empty() {
        return None;
    }
    Some((id, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_tsv_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "collection.tsv",
            "0\tThe presence of communication amid scientific minds.\n\n1\tManhattan Project\twas a research effort.\n",
        );

        let passages = load_passages(&path).unwrap();
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].id, "0");
        // Only the first tab separates id from text.
        assert_eq!(passages[1].text, "Manhattan Project\twas a research effort.");
    }

    #[test]
    fn loads_jsonl_corpus_with_either_text_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "corpus.jsonl",
            "{\"id\": \"d1\", \"contents\": \"alpha\"}\n{\"id\": \"d2\", \"text\": \"beta\"}\n",
        );

        let passages = load_passages(&path).unwrap();
        assert_eq!(
            passages,
            vec![
                Passage { id: "d1".into(), text: "alpha".into() },
                Passage { id: "d2".into(), text: "beta".into() },
            ]
        );
    }

    #[test]
    fn malformed_lines_report_their_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "collection.tsv", "0\tok\nno tab here\n");
        let err = load_passages(&path).unwrap_err().to_string();
        assert!(err.ends_with(":2"), "{err}");
    }

    #[test]
    fn topics_keep_file_order_and_are_filtered_by_qrels() {
        let dir = tempfile::tempdir().unwrap();
        let topics = write_file(
            dir.path(),
            "topics.tsv",
            "1037798\twho is robert gray\n104861\tcost of interior concrete flooring \n1063750\twhy did the us volunterilay enter ww1\n",
        );
        let qrels = write_file(
            dir.path(),
            "qrels.txt",
            "104861 0 1017759 0\n104861 0 1082489 2\n1063750 Q0 1040000 1\n",
        );

        let topics = load_topics(&topics).unwrap();
        let qrels = load_qrels(&qrels).unwrap();
        assert_eq!(qrels.len(), 2);

        let kept = judged_topics(topics, &qrels);
        let ids = kept.iter().map(|t| t.qid.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["104861", "1063750"]);
        assert_eq!(kept[0].query, "cost of interior concrete flooring");
    }

    #[test]
    fn qrels_reject_short_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "qrels.txt", "1 0 d1\n");
        assert!(load_qrels(&path).is_err());
    }
}
