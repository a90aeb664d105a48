//! The demo's contributors.

use std::collections::BTreeSet;

use async_trait::async_trait;
use quill::prelude::*;

use crate::query::WordQuery;

/// The prefix a place matched on, for its provider.
pub const PREFIX: BindingKey<String> = BindingKey::new("matchedPrefix");

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "else", "enum", "fn", "for", "if",
    "impl", "let", "loop", "match", "mod", "move", "pub", "return", "static", "struct", "trait",
    "type", "unsafe", "use", "where", "while",
];

const TYPES: &[&str] = &[
    "Arc", "BTreeMap", "Box", "Cell", "Cow", "HashMap", "HashSet", "Option", "Rc", "RefCell",
    "Result", "String", "Vec", "VecDeque",
];

/// Matches when the partial word is non-empty, binding it under [`PREFIX`].
fn typing_a_word() -> impl Place<WordQuery> {
    try_place_fn(|ctx: &WordQuery, mb: &mut MatchBindings| {
        let prefix = ctx.prefix();
        if prefix.is_empty() {
            return Err(NoMatch.into());
        }
        mb.insert(&PREFIX, prefix.to_string());
        Ok(true)
    })
}

fn bound_prefix(mb: &MatchBindings) -> Result<&str, BoxError> {
    mb.get(&PREFIX)
        .map(String::as_str)
        .ok_or_else(|| "prefix was not bound".into())
}

// ─── Keywords ───────────────────────────────────────────────────────────────

/// Language keywords, first on the basic channel when a line starts.
pub struct Keywords;

impl Registrant<WordQuery, String> for Keywords {
    fn name(&self) -> &str {
        "keywords"
    }

    fn channels(&self) -> Option<Vec<Channel>> {
        Some(vec![Channel::BASIC])
    }

    fn register_providers(
        &self,
        registrar: &mut Registrar<'_, WordQuery, String>,
    ) -> Result<(), BoxError> {
        let line_start = place_fn(|ctx: &WordQuery, _: &mut MatchBindings| ctx.at_line_start());

        registrar
            .extend_basic(typing_a_word().and(line_start))
            .at_priority(100.0)
            .with_provider(
                provider_fn(
                    |_: &WordQuery, mb: &MatchBindings, out: &mut ResultCollector<String>| {
                        let prefix = bound_prefix(mb)?;
                        out.offer_all(
                            KEYWORDS
                                .iter()
                                .filter(|kw| kw.starts_with(prefix))
                                .map(|kw| kw.to_string()),
                        );
                        Ok(())
                    },
                )
                .named("keywords"),
            );
        Ok(())
    }
}

// ─── Dictionary ─────────────────────────────────────────────────────────────

/// Words from a fixed vocabulary, on the basic channel.
pub struct Dictionary {
    words: BTreeSet<String>,
}

impl Dictionary {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
        }
    }
}

struct DictionaryLookup {
    words: Vec<String>,
}

#[async_trait]
impl Provider<WordQuery, String> for DictionaryLookup {
    async fn provide(
        &self,
        _ctx: &WordQuery,
        bindings: &MatchBindings,
        collector: &mut ResultCollector<String>,
    ) -> Result<(), BoxError> {
        let prefix = bound_prefix(bindings)?;
        // Sorted, so the matches form one contiguous run.
        let start = self.words.partition_point(|w| w.as_str() < prefix);
        for word in self.words[start..]
            .iter()
            .take_while(|w| w.starts_with(prefix))
        {
            if word != prefix && !collector.offer(word.clone()) {
                break;
            }
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "dictionary_lookup"
    }
}

impl Registrant<WordQuery, String> for Dictionary {
    fn name(&self) -> &str {
        "dictionary"
    }

    fn register_providers(
        &self,
        registrar: &mut Registrar<'_, WordQuery, String>,
    ) -> Result<(), BoxError> {
        if self.words.is_empty() {
            return Err("dictionary is empty".into());
        }
        registrar
            .extend_basic(typing_a_word())
            .at_priority(10.0)
            .with_provider(DictionaryLookup {
                words: self.words.iter().cloned().collect(),
            });
        Ok(())
    }
}

// ─── Buffer words ───────────────────────────────────────────────────────────

/// Words already present in the text, on the smart channel.
pub struct BufferWords;

impl Registrant<WordQuery, String> for BufferWords {
    fn name(&self) -> &str {
        "buffer_words"
    }

    fn register_providers(
        &self,
        registrar: &mut Registrar<'_, WordQuery, String>,
    ) -> Result<(), BoxError> {
        registrar
            .extend_smart(typing_a_word())
            .at_priority(50.0)
            .with_provider(
                provider_fn(
                    |ctx: &WordQuery, mb: &MatchBindings, out: &mut ResultCollector<String>| {
                        let prefix = bound_prefix(mb)?;
                        let mut seen = BTreeSet::new();
                        for word in ctx.words().filter(|w| w.starts_with(prefix) && *w != prefix) {
                            if seen.insert(word) && !out.offer(word.to_string()) {
                                break;
                            }
                        }
                        Ok(())
                    },
                )
                .named("buffer_words"),
            );
        Ok(())
    }
}

// ─── Type names ─────────────────────────────────────────────────────────────

/// Standard type names, on the class-name channel.
pub struct TypeNames;

impl Registrant<WordQuery, String> for TypeNames {
    fn name(&self) -> &str {
        "type_names"
    }

    fn channels(&self) -> Option<Vec<Channel>> {
        Some(vec![Channel::CLASS_NAME])
    }

    fn register_providers(
        &self,
        registrar: &mut Registrar<'_, WordQuery, String>,
    ) -> Result<(), BoxError> {
        let capitalized = place_fn(|ctx: &WordQuery, _: &mut MatchBindings| {
            ctx.prefix().starts_with(char::is_uppercase)
        });

        registrar
            .extend_class_name(typing_a_word().and(capitalized))
            .with_provider(
                provider_fn(
                    |_: &WordQuery, mb: &MatchBindings, out: &mut ResultCollector<String>| {
                        let prefix = bound_prefix(mb)?;
                        out.offer_all(
                            TYPES
                                .iter()
                                .filter(|t| t.starts_with(prefix))
                                .map(|t| t.to_string()),
                        );
                        Ok(())
                    },
                )
                .named("std_types"),
            );
        Ok(())
    }
}
