// Magic line options
// The line after %%sqlflow carries per-call options as key=value pairs,
// --key=value or --key value; values may be quoted, e.g. database="my db"

use crate::config::ExecuteOptions;
use crate::error::{Result, SqlCellError};

/// A token parsed from the magic line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A plain (possibly quoted) word.
    Word(String),
    /// A `key=value` pair.
    KeyValue { key: String, value: String },
    /// A `--flag` with no inline value.
    LongFlag(String),
}

/// Splits a magic line into tokens.
///
/// Quoted strings keep their whitespace and support backslash escapes.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let long_flag = if c == '-' {
            let mut dashes = 0;
            while chars.peek() == Some(&'-') {
                chars.next();
                dashes += 1;
            }
            if dashes != 2 {
                return Err(SqlCellError::config(format!(
                    "unexpected option syntax near '{}'",
                    input.trim()
                )));
            }
            true
        } else {
            false
        };

        let word = collect_word(&mut chars)?;
        match word.split_once('=') {
            Some((key, value)) if !key.is_empty() => tokens.push(Token::KeyValue {
                key: key.to_string(),
                value: value.to_string(),
            }),
            _ if long_flag => tokens.push(Token::LongFlag(word)),
            _ => tokens.push(Token::Word(word)),
        }
    }

    Ok(tokens)
}

/// Reads one whitespace-delimited word, honouring quotes anywhere inside it.
fn collect_word(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<String> {
    let mut word = String::new();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => break,
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut closed = false;
                while let Some(inner) = chars.next() {
                    if inner == '\\' {
                        if let Some(escaped) = chars.next() {
                            word.push(escaped);
                        }
                    } else if inner == quote {
                        closed = true;
                        break;
                    } else {
                        word.push(inner);
                    }
                }
                if !closed {
                    return Err(SqlCellError::config("unterminated quote in magic line"));
                }
            }
            _ => {
                word.push(c);
                chars.next();
            }
        }
    }

    Ok(word)
}

/// Builds [`ExecuteOptions`] from the magic line. An empty line gives the defaults.
pub fn parse_line(line: &str) -> Result<ExecuteOptions> {
    let mut options = ExecuteOptions::default();
    let mut tokens = tokenize(line)?.into_iter();

    while let Some(token) = tokens.next() {
        match token {
            Token::KeyValue { key, value } => options.set(&key, &value)?,
            Token::LongFlag(key) => match tokens.next() {
                Some(Token::Word(value)) => options.set(&key, &value)?,
                _ => {
                    return Err(SqlCellError::config(format!(
                        "option '--{}' expects a value",
                        key
                    )))
                }
            },
            Token::Word(word) => {
                return Err(SqlCellError::config(format!(
                    "unexpected argument '{}'",
                    word
                )))
            }
        }
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_line_gives_defaults() {
        assert_eq!(parse_line("").unwrap(), ExecuteOptions::default());
        assert_eq!(parse_line("   ").unwrap(), ExecuteOptions::default());
    }

    #[test]
    fn test_tokenize_forms() {
        let tokens = tokenize(r#"database="e2e 1" --max_rows 5 --db=x plain"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::KeyValue {
                    key: "database".into(),
                    value: "e2e 1".into()
                },
                Token::LongFlag("max_rows".into()),
                Token::Word("5".into()),
                Token::KeyValue {
                    key: "db".into(),
                    value: "x".into()
                },
                Token::Word("plain".into()),
            ]
        );
    }

    #[test]
    fn test_parse_line_options() {
        let options = parse_line("database=e2e_1 --max_rows 10").unwrap();
        assert_eq!(
            options,
            ExecuteOptions::default().with_database("e2e_1").with_max_rows(10)
        );
    }

    #[test]
    fn test_parse_line_errors() {
        assert!(parse_line("verbose").is_err());
        assert!(parse_line("colour=red").is_err());
        assert!(parse_line("--max_rows").is_err());
        assert!(parse_line("-x").is_err());
        assert!(parse_line("database='unterminated").is_err());
    }
}
