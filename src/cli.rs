//! CLI argument parsing and help text

use anyhow::{anyhow, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Embed `HYDE_CORPUS_PATH` into the LanceDB table.
    Index,
    /// Batch retrieval over the configured topics, then evaluation.
    Run,
    /// One ad-hoc query, printed to stdout.
    Search { query: String },
}

/// Only the first argument counts; later ones may be query words.
pub fn wants_help(args: &[String]) -> bool {
    matches!(
        args.get(1).map(String::as_str),
        Some("-h" | "--help" | "help")
    )
}

pub fn wants_version(args: &[String]) -> bool {
    matches!(
        args.get(1).map(String::as_str),
        Some("-V" | "--version" | "version")
    )
}

/// `args[0]` is the binary name. No subcommand means `run`.
pub fn parse_command(args: &[String]) -> Result<Command> {
    let mut rest = args.iter().skip(1);
    match rest.next().map(String::as_str) {
        None | Some("run") => Ok(Command::Run),
        Some("index") => Ok(Command::Index),
        Some("search") => {
            let query = rest.map(String::as_str).collect::<Vec<_>>().join(" ");
            let query = query.trim();
            if query.is_empty() {
                return Err(anyhow!("search needs a query, e.g. `hyde-retrieval search how long is a marathon`"));
            }
            Ok(Command::Search {
                query: query.to_string(),
            })
        }
        Some(other) => Err(anyhow!("Unknown command '{other}' (try --help)")),
    }
}

pub fn print_help() {
    println!("hyde-retrieval");
    println!();
    println!("Dense passage retrieval with Hypothetical Document Embeddings (HyDE).");
    println!();
    println!("Usage:");
    println!("  hyde-retrieval index              embed HYDE_CORPUS_PATH into the vector table");
    println!("  hyde-retrieval run                retrieve every judged topic, write run files, evaluate");
    println!("  hyde-retrieval search <query...>  show prompt, hypotheses and top 10 hits for one query");
    println!("  hyde-retrieval --help");
    println!("  hyde-retrieval --version");
    println!();
    println!("Inputs:");
    println!("  HYDE_TOPICS_PATH=topics.tsv            qid<TAB>query (required by run)");
    println!("  HYDE_QRELS_PATH=qrels.txt              TREC qrels (required by run)");
    println!("  HYDE_CORPUS_PATH=collection.tsv        id<TAB>text or JSONL {{\"id\",\"contents\"}}");
    println!("  HYDE_TOPICS_NAME=dl19-passage          label used in output file names");
    println!("  HYDE_RUN_DIR=./runs");
    println!();
    println!("Index (defaults shown):");
    println!("  HYDE_INDEX_BACKEND=lancedb|flat        (flat embeds the corpus in memory on every start)");
    println!("  VECTOR_DB_PATH=./.hyde/vectors");
    println!("  VECTOR_TABLE=passages");
    println!("  EMBEDDINGS_BACKEND=fastembed|hash      (default: fastembed)");
    println!("  EMBEDDINGS_MODEL_REPO=org/repo         (default: BAAI/bge-base-en-v1.5)");
    println!("  EMBEDDINGS_MODEL_DIR=./.hyde/embeddings-cache");
    println!("  EMBEDDINGS_DEVICE=cpu|metal");
    println!("  EMBEDDING_BATCH_SIZE=32");
    println!("  HASH_EMBEDDING_DIM=64");
    println!();
    println!("Generator:");
    println!("  HYDE_LLM_BACKEND=openai|cohere|ollama|mock   (default: ollama)");
    println!("  HYDE_LLM_MODEL=llama3.1");
    println!("  HYDE_LLM_BASE_URL=http://localhost:11434     (backend default if unset)");
    println!("  HYDE_API_KEY=...                             (openai, cohere)");
    println!("  HYDE_MAX_TOKENS=512  HYDE_TEMPERATURE=0.7  HYDE_TOP_P=1.0  HYDE_STOP=a,b");
    println!("  HYDE_WAIT_TILL_SUCCESS=false  HYDE_MAX_ATTEMPTS=N  HYDE_RETRY_BACKOFF_MS=1000");
    println!();
    println!("Run:");
    println!("  HYDE_VARIANT=single|multi|both         (default: both)");
    println!("  HYDE_TASK=\"web search\"                 primary task style");
    println!("  HYDE_SECONDARY_TASK=...                optional, single variant only");
    println!("  HYDE_HYPOTHESIS_COUNT=8  HYDE_TOP_K=1000  HYDE_IMPROVE_QUERY=false");
    println!("  HYDE_EVAL_ENABLED=true  TREC_EVAL_COMMAND=trec_eval");
    println!("  HYDE_EVAL_METRICS=map,ndcg_cut.10,recall.1000");
    println!("  LOG_DIR=/path                          also log to <LOG_DIR>/hyde-retrieval.log");
    println!();
    println!("Task styles:");
    println!("  web search, web search expert, web search novice, web search intermediate,");
    println!("  scifact, arguana, trec-covid, fiqa, dbpedia-entity, trec-news");
}

pub fn print_version() {
    println!("{}", env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("bin")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn wants_help_and_version_detect_common_flags() {
        assert!(wants_help(&args(&["--help"])));
        assert!(wants_help(&args(&["-h"])));
        assert!(wants_version(&args(&["--version"])));
        assert!(wants_version(&args(&["-V"])));
        assert!(!wants_help(&args(&[])));
        assert!(!wants_version(&args(&[])));
    }

    #[test_case(&["search", "how", "to", "get", "help", "with", "taxes"] ; "help as a query word")]
    #[test_case(&["search", "git", "version", "control"] ; "version as a query word")]
    #[test_case(&["search", "--help"] ; "flag after search")]
    fn query_words_are_not_flags(input: &[&str]) {
        let args = args(input);
        assert!(!wants_help(&args));
        assert!(!wants_version(&args));
        assert!(matches!(parse_command(&args), Ok(Command::Search { .. })));
    }

    #[test_case(&[], Command::Run ; "default is run")]
    #[test_case(&["run"], Command::Run ; "explicit run")]
    #[test_case(&["index"], Command::Index ; "index")]
    #[test_case(&["search", "how", "long", "is", "a", "marathon"],
        Command::Search { query: "how long is a marathon".to_string() } ; "search joins words")]
    fn parses_commands(input: &[&str], expected: Command) {
        assert_eq!(parse_command(&args(input)).unwrap(), expected);
    }

    #[test]
    fn search_without_query_is_an_error() {
        assert!(parse_command(&args(&["search"])).is_err());
        assert!(parse_command(&args(&["search", "  "])).is_err());
    }

    #[test]
    fn unknown_command_is_an_error() {
        let err = parse_command(&args(&["serve"])).unwrap_err().to_string();
        assert!(err.contains("serve"));
    }
}
