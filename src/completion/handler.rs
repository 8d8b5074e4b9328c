/// Completion request handling.
///
/// `handle_completion` runs the [`CompletionResolver`] at the cursor and
/// turns its items into protocol items.  The primary edit replaces
/// whatever was typed between the item's anchor and the cursor; function
/// items carry tab stops when both the client and the configuration allow
/// snippets.
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;

use crate::Backend;
use crate::completion::{CompletionItem as Candidate, CompletionKind, CompletionResolver};
use crate::util::LineIndex;

impl Backend {
    pub(crate) async fn handle_completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let position = params.text_document_position;
        let Some(cursor) = self.cursor_location(&position.text_document.uri, position.position) else {
            return Ok(None);
        };

        let candidates = CompletionResolver::new(&self.cache).resolve(&cursor);
        if candidates.is_empty() {
            return Ok(None);
        }

        let text = self
            .cache
            .get(&cursor.file)
            .map(|policy| policy.raw_text)
            .unwrap_or_default();
        let index = LineIndex::new(&text);
        let snippets = *self.snippet_support.lock() && self.config.read().completion.snippets;

        let items = candidates
            .into_iter()
            .map(|candidate| to_lsp_item(candidate, &index, position.position, snippets))
            .collect();
        Ok(Some(CompletionResponse::Array(items)))
    }
}

fn lsp_kind(kind: CompletionKind) -> CompletionItemKind {
    match kind {
        CompletionKind::Variable => CompletionItemKind::VARIABLE,
        CompletionKind::Package | CompletionKind::Import => CompletionItemKind::MODULE,
        CompletionKind::Function | CompletionKind::BuiltinFunction => CompletionItemKind::FUNCTION,
    }
}

fn to_lsp_item(candidate: Candidate, index: &LineIndex, cursor: Position, snippets: bool) -> CompletionItem {
    let snippet = candidate.snippet.clone().filter(|_| snippets);
    let format = if snippet.is_some() {
        InsertTextFormat::SNIPPET
    } else {
        InsertTextFormat::PLAIN_TEXT
    };

    let text_edit = candidate.edit().map(|edit| {
        let start = index.position_at(edit.row, edit.col);
        let end = if cursor.line == start.line && cursor.character >= start.character {
            cursor
        } else {
            start
        };
        let new_text = snippet.clone().unwrap_or_else(|| edit.text.clone());
        CompletionTextEdit::Edit(TextEdit::new(Range::new(start, end), new_text))
    });

    let additional: Vec<TextEdit> = candidate
        .extra_edits
        .iter()
        .map(|edit| {
            let at = index.position_at(edit.row, edit.col);
            TextEdit::new(Range::new(at, at), edit.text.clone())
        })
        .collect();

    CompletionItem {
        label: candidate.label,
        kind: Some(lsp_kind(candidate.kind)),
        detail: candidate.detail,
        insert_text_format: Some(format),
        text_edit,
        additional_text_edits: (!additional.is_empty()).then_some(additional),
        ..CompletionItem::default()
    }
}
