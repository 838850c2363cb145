//! Command payload to argument vector.
//!
//! ```text
//! /ban@relay_bot "bob smith" -d 3   → ["/ban", "bob smith", "-d", "3"]
//! ```
//!
//! Words split on whitespace. Single quotes are literal; inside double quotes
//! `\"` and `\\` are escapes. A `@bot` mention on the command word is dropped
//! so that group chats and private chats parse the same.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Single,
    Double,
}

/// Splits `payload` into words, honouring quotes.
///
/// An unterminated quote runs to the end of the payload.
pub fn split_words(payload: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut word: Option<String> = None;
    let mut quote: Option<Quote> = None;
    let mut chars = payload.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (None, c) if c.is_whitespace() => words.extend(word.take()),
            (None, '\'') => {
                word.get_or_insert_default();
                quote = Some(Quote::Single);
            }
            (None, '"') => {
                word.get_or_insert_default();
                quote = Some(Quote::Double);
            }
            (Some(Quote::Single), '\'') | (Some(Quote::Double), '"') => quote = None,
            (Some(Quote::Double), '\\') => {
                let word = word.get_or_insert_default();
                match chars.next() {
                    Some(escaped @ ('"' | '\\')) => word.push(escaped),
                    Some(other) => {
                        word.push('\\');
                        word.push(other);
                    }
                    None => word.push('\\'),
                }
            }
            (_, c) => word.get_or_insert_default().push(c),
        }
    }
    words.extend(word);
    words
}

/// The argument vector clap sees for a command payload.
///
/// The first word keeps its `/` and loses any `@bot` suffix.
pub fn command_argv(payload: &str) -> Vec<String> {
    let mut argv = split_words(payload);
    if let Some(command) = argv.first_mut()
        && command.starts_with('/')
        && let Some(at) = command.find('@')
    {
        command.truncate(at);
    }
    argv
}
