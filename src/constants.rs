// Lexicon
/// Reserved lemma id for purely numeric surfaces, ported from the
/// `number_lemma_id` default in the original Python lexicon.
pub const NUMBER_SENTINEL_LEMMA_ID: u32 = 9999;

// Barrels
/// Barrels `0..HOT_BARREL_ID` are cold (bulk-built); `HOT_BARREL_ID` is hot.
pub const HOT_BARREL_ID: u32 = 10;
pub const DOC_ID_BYTES: usize = 20;

// Forward index
pub const MAX_BODY_LEMMAS: usize = 5_000;
pub const MAX_TITLE_CHARS: usize = 500;
pub const MAX_ABSTRACT_CHARS: usize = 1_000;

// Autocomplete
pub const PREFIX2_LIMIT: usize = 100;
pub const PREFIX3_LIMIT: usize = 50;
pub const AUTOCOMPLETE_K: usize = 5;

// N-gram (phrase autocomplete)
pub const NGRAM_MIN_FREQ: u32 = 5;
pub const NGRAM_MAX_TOTAL: usize = 50_000;
pub const NGRAM_MAX_PER_PREFIX: usize = 10;

// Query engine defaults
pub const DEFAULT_TOP_K: usize = 20;
pub const DEFAULT_ALPHA: f32 = 1.0;
pub const DEFAULT_BETA: f32 = 1.0;
pub const DEFAULT_GAMMA: f32 = 0.0;
pub const DEFAULT_SEMANTIC_NEIGHBORS: usize = 8;
pub const DEFAULT_SEMANTIC_THRESHOLD: f32 = 0.6;
pub const SIMILAR_WORDS_K: usize = 10;

// Document authority scores
pub const EMPTY_DOC_SCORE: f32 = 0.1;

// Persisted file names, relative to the indexes root.
pub const LEXICON_FILE: &str = "lexicon.json";
pub const LEXICON_BIN_FILE: &str = "embeddings/lexicon.bin";
pub const BARREL_LOOKUP_FILE: &str = "barrel_lookup.json";
pub const FORWARD_INDEX_FILE: &str = "forward_index.txt";
pub const DOC_METADATA_FILE: &str = "document_metadata.json";
pub const EMBEDDINGS_BIN_FILE: &str = "embeddings/embeddings.bin";
pub const VOCAB_FILE: &str = "embeddings/vocab.json";
pub const AUTOCOMPLETE_FILE: &str = "embeddings/autocomplete.json";
pub const NGRAM_AUTOCOMPLETE_FILE: &str = "ngram_autocomplete.json";
pub const DOC_SCORES_FILE: &str = "doc_scores.json";
pub const CONFIG_FILE: &str = "config.json";
