// src/docker/command.rs

//! Splitting configured command strings into argument vectors.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("Command `{command}` is invalid: it contains an unbalanced {quote} quote.")]
    UnbalancedQuote { command: String, quote: &'static str },

    #[error("Command `{0}` is invalid: it ends with a dangling backslash.")]
    DanglingEscape(String),
}

/// Split `command` into arguments the way a POSIX shell would for simple
/// words: whitespace separates arguments, single quotes are literal, double
/// quotes allow `\"` and `\\` escapes, and a backslash outside quotes escapes
/// the next character.
pub fn split_command(command: &str) -> Result<Vec<String>, CommandParseError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(inner) => current.push(inner),
                        None => {
                            return Err(CommandParseError::UnbalancedQuote {
                                command: command.to_string(),
                                quote: "single",
                            });
                        }
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('"' | '\\' | '$' | '`')) => current.push(escaped),
                            Some(other) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => {
                                return Err(CommandParseError::UnbalancedQuote {
                                    command: command.to_string(),
                                    quote: "double",
                                });
                            }
                        },
                        Some(inner) => current.push(inner),
                        None => {
                            return Err(CommandParseError::UnbalancedQuote {
                                command: command.to_string(),
                                quote: "double",
                            });
                        }
                    }
                }
            }
            '\\' => match chars.next() {
                Some(escaped) => {
                    in_word = true;
                    current.push(escaped);
                }
                None => return Err(CommandParseError::DanglingEscape(command.to_string())),
            },
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }

    if in_word {
        args.push(current);
    }

    Ok(args)
}
