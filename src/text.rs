use std::sync::OnceLock;

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").unwrap())
}

pub fn make_stemmer() -> Stemmer {
    Stemmer::create(Algorithm::English)
}

/// General English stopwords, ported from the donor, plus the
/// scientific-corpus additions used by the original n-gram builder
/// (citation/markup noise: `et`, `al`, `fig`, `eg`, `ie`, ...).
pub fn is_stop_word(w: &str) -> bool {
    matches!(
        w,
        "a" | "an" | "the" | "and" | "or" | "but" | "if" | "then" | "else"
        | "when" | "while" | "where" | "why" | "how" | "of" | "to" | "in"
        | "on" | "at" | "by" | "for" | "with" | "about" | "from" | "into"
        | "over" | "after" | "before" | "does" | "between" | "through"
        | "during" | "without" | "within" | "is" | "are" | "was" | "were"
        | "be" | "been" | "being" | "do" | "will" | "did" | "doing" | "have"
        | "has" | "had" | "having" | "can" | "could" | "should" | "would"
        | "may" | "might" | "must" | "such" | "shall" | "as" | "it" | "its"
        | "this" | "that" | "these" | "those" | "he" | "she" | "they"
        | "them" | "their" | "there" | "here" | "we" | "you" | "your"
        | "i" | "me" | "my" | "our" | "us" | "not" | "no" | "use" | "than"
        | "too" | "very" | "also" | "just" | "only" | "even" | "more" | "most"
        | "some" | "any" | "each" | "other" | "used" | "across" | "among"
        | "et" | "al" | "etc" | "ie" | "eg" | "vs" | "fig" | "table" | "ref"
        | "including" | "include" | "well" | "however" | "thus" | "therefore"
        | "although" | "since" | "whereas" | "moreover" | "furthermore"
    )
}

/// Split `text` into `(surface, lemma)` pairs. Strips URLs, lowercases,
/// splits on whitespace/non-alphanumeric runs, drops non-alphabetic,
/// too-short, and stopword tokens, then stems survivors for the lemma.
pub fn tokenize(text: &str, stemmer: &Stemmer) -> Vec<(String, String)> {
    let stripped = url_pattern().replace_all(text, " ");
    stripped
        .split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() >= 2 && w.chars().all(|c| c.is_ascii_alphabetic()))
        .filter(|w| !is_stop_word(w))
        .map(|w| {
            let lemma = stemmer.stem(&w).into_owned();
            (w, lemma)
        })
        .collect()
}

/// Convenience wrapper returning only the lemma half, used wherever callers
/// don't need the surface form (e.g. query expansion).
pub fn tokenize_lemmas(text: &str, stemmer: &Stemmer) -> Vec<String> {
    tokenize(text, stemmer).into_iter().map(|(_, l)| l).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_lowercase_alphabetic_and_long_enough() {
        let stemmer = make_stemmer();
        for (surface, _) in tokenize("The Quick BROWN Fox 42 a I", &stemmer) {
            assert!(surface.len() >= 2);
            assert!(surface.chars().all(|c| c.is_ascii_lowercase()));
            assert!(!is_stop_word(&surface));
        }
    }

    #[test]
    fn drops_numeric_and_short_and_stopwords() {
        let stemmer = make_stemmer();
        let tokens = tokenize("covid-19 vaccine trial a 42 is", &stemmer);
        let surfaces: Vec<_> = tokens.iter().map(|(s, _)| s.as_str()).collect();
        assert!(surfaces.contains(&"covid"));
        assert!(surfaces.contains(&"vaccine"));
        assert!(surfaces.contains(&"trial"));
        assert!(!surfaces.contains(&"19"));
        assert!(!surfaces.contains(&"a"));
        assert!(!surfaces.contains(&"is"));
    }

    #[test]
    fn strips_urls() {
        let stemmer = make_stemmer();
        let tokens = tokenize("see https://example.com/paper for details", &stemmer);
        assert!(tokens.iter().all(|(s, _)| !s.contains("http")));
    }

    #[test]
    fn is_pure_same_input_same_output() {
        let stemmer = make_stemmer();
        let a = tokenize("Vaccines and pandemics", &stemmer);
        let b = tokenize("Vaccines and pandemics", &stemmer);
        assert_eq!(a, b);
    }
}
