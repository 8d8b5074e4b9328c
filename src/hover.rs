/// Hover documentation.
///
/// Locally bound variables get no hover.  A built-in shows its signature
/// followed by the static built-in documentation; anything else shows the
/// source of every rule clause it may refer to.
use crate::cache::FileCache;
use crate::definition::{DefinitionResolver, local_binding};
use crate::syntax::Term;
use crate::syntax::builtins::{self, BUILTIN_DETAIL};

/// One block of hover content and the language to highlight it as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub language: String,
}

impl Document {
    fn new(content: impl Into<String>, language: &str) -> Self {
        Self {
            content: content.into(),
            language: language.to_string(),
        }
    }
}

pub struct HoverResolver<'c> {
    cache: &'c FileCache,
}

impl<'c> HoverResolver<'c> {
    pub fn new(cache: &'c FileCache) -> Self {
        Self { cache }
    }

    pub fn resolve(&self, term: &Term) -> Vec<Document> {
        let Some(module) = self.cache.module(&term.location.file) else {
            return Vec::new();
        };
        if local_binding(&module, term).is_some() {
            return Vec::new();
        }

        let name = term.to_string();
        if let Some(builtin) = builtins::callable().find(|b| b.name == name) {
            return vec![
                Document::new(builtin.signature(), "rego"),
                Document::new(BUILTIN_DETAIL, "markdown"),
            ];
        }

        DefinitionResolver::new(self.cache)
            .defining_rules(&module, term)
            .iter()
            .map(|found| Document::new(found.text(), "rego"))
            .collect()
    }
}
