//! nom grammar for `[@tags] [:prefix] <command> [params...] [:trailing]`.

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::ErrorKind,
    sequence::preceded,
    IResult,
};
use smallvec::SmallVec;

use crate::error::MessageParseError;

/// RFC 2812 parameter limit.
const MAX_PARAMS: usize = 15;

fn parse_tags(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), take_until(" "))(input)
}

fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// 1*letter or 3digit.
fn parse_command(input: &str) -> IResult<&str, &str> {
    let (rest, cmd) = take_while1(|c: char| c.is_ascii_alphanumeric())(input)?;

    let letters = cmd.chars().all(|c| c.is_ascii_alphabetic());
    let numeric = cmd.len() == 3 && cmd.chars().all(|c| c.is_ascii_digit());
    if !(letters || numeric) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::AlphaNumeric,
        )));
    }
    // the command must be followed by a separator or the end of line
    match rest.as_bytes().first() {
        None | Some(b' ') | Some(b'\r') | Some(b'\n') => Ok((rest, cmd)),
        Some(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::AlphaNumeric,
        ))),
    }
}

fn parse_params(input: &str) -> (&str, SmallVec<[&str; MAX_PARAMS]>) {
    let mut params: SmallVec<[&str; MAX_PARAMS]> = SmallVec::new();
    let mut rest = input;

    while rest.starts_with(' ') {
        if params.len() >= MAX_PARAMS {
            break;
        }
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() || rest.starts_with(['\r', '\n']) {
            break;
        }

        if let Some(trailing) = rest.strip_prefix(':') {
            let end = trailing.find(['\r', '\n']).unwrap_or(trailing.len());
            params.push(&trailing[..end]);
            rest = &trailing[end..];
            break;
        }

        let end = rest.find([' ', '\r', '\n']).unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }

    (rest, params)
}

fn parse_message(input: &str) -> IResult<&str, ParsedMessage<'_>> {
    let (input, tags) = opt(parse_tags)(input)?;
    let (input, _) = space0(input)?;
    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, _) = space0(input)?;
    let (input, command) = parse_command(input)?;
    let (rest, params) = parse_params(input);

    Ok((
        rest,
        ParsedMessage {
            tags,
            prefix,
            command,
            params,
        },
    ))
}

/// Borrowed intermediate form produced by the grammar.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedMessage<'a> {
    pub tags: Option<&'a str>,
    pub prefix: Option<&'a str>,
    pub command: &'a str,
    pub params: SmallVec<[&'a str; MAX_PARAMS]>,
}

impl<'a> ParsedMessage<'a> {
    pub(crate) fn parse(input: &'a str) -> Result<Self, MessageParseError> {
        if input.trim().is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }
        match parse_message(input) {
            Ok((_, msg)) => Ok(msg),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                if e.code == ErrorKind::AlphaNumeric || e.code == ErrorKind::TakeWhile1 {
                    Err(MessageParseError::InvalidCommand)
                } else {
                    Err(MessageParseError::ParseContext {
                        position: input.len() - e.input.len(),
                    })
                }
            }
            Err(nom::Err::Incomplete(_)) => Err(MessageParseError::ParseContext {
                position: input.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_sections() {
        let msg = ParsedMessage::parse("@a=b;c :nick!u@h PRIVMSG #chan :hello there\r\n").unwrap();
        assert_eq!(msg.tags, Some("a=b;c"));
        assert_eq!(msg.prefix, Some("nick!u@h"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params.as_slice(), &["#chan", "hello there"]);
    }

    #[test]
    fn collapses_repeated_spaces() {
        let msg = ParsedMessage::parse("JOIN   #a,#b").unwrap();
        assert_eq!(msg.params.as_slice(), &["#a,#b"]);
    }

    #[test]
    fn rejects_mixed_command() {
        assert_eq!(
            ParsedMessage::parse("PR1VMSG #x :y"),
            Err(MessageParseError::InvalidCommand)
        );
        assert_eq!(ParsedMessage::parse("   "), Err(MessageParseError::EmptyMessage));
    }

    #[test]
    fn numeric_command() {
        let msg = ParsedMessage::parse(":tmi.twitch.tv 001 bot :Welcome, GLHF!").unwrap();
        assert_eq!(msg.command, "001");
        assert_eq!(msg.params.as_slice(), &["bot", "Welcome, GLHF!"]);
    }
}
