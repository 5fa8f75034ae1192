//! Response line parser.
//!
//! Only the responses the client acts on are decoded: status responses,
//! `SEARCH`, `EXISTS` and `RECENT`. Everything else is kept as raw text.

use crate::{Error, Result};

/// Status of a status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `OK`
    Ok,
    /// `NO`
    No,
    /// `BAD`
    Bad,
    /// `PREAUTH`
    PreAuth,
    /// `BYE`
    Bye,
}

impl Status {
    fn from_atom(atom: &str) -> Option<Self> {
        match atom.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }
}

/// Untagged (`* ...`) response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK|NO|BAD|PREAUTH|BYE text`
    Status {
        /// Response status.
        status: Status,
        /// Remaining text, including any `[CODE]`.
        text: String,
    },
    /// `* SEARCH 1 2 3`
    Search(Vec<u32>),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n RECENT`
    Recent(u32),
    /// Anything else, as received.
    Other(String),
}

/// One complete server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Tagged completion of a command.
    Tagged {
        /// Command tag.
        tag: String,
        /// Completion status.
        status: Status,
        /// Human-readable text.
        text: String,
    },
    /// Untagged data.
    Untagged(UntaggedResponse),
    /// `+ ...` continuation request.
    Continuation(String),
}

impl Response {
    /// Parses a response as read by [`crate::FramedStream::read_response`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for lines that are not valid IMAP responses.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let line = String::from_utf8_lossy(bytes);
        let line = line.trim_end_matches(['\r', '\n']);

        let (head, rest) = split_atom(line);
        match head {
            "" => Err(Error::Parse("empty response".to_string())),
            "+" => Ok(Self::Continuation(rest.to_string())),
            "*" => parse_untagged(rest).map(Self::Untagged),
            tag => {
                let (status, text) = split_atom(rest);
                let status = Status::from_atom(status).ok_or_else(|| {
                    Error::Parse(format!("tagged response without status: {line}"))
                })?;
                Ok(Self::Tagged {
                    tag: tag.to_string(),
                    status,
                    text: text.to_string(),
                })
            }
        }
    }
}

fn parse_untagged(rest: &str) -> Result<UntaggedResponse> {
    let (first, tail) = split_atom(rest);

    if let Some(status) = Status::from_atom(first) {
        return Ok(UntaggedResponse::Status {
            status,
            text: tail.to_string(),
        });
    }

    if first.eq_ignore_ascii_case("SEARCH") {
        // CONDSTORE servers may append "(MODSEQ n)"; it carries no ids.
        let ids = tail
            .split_ascii_whitespace()
            .take_while(|token| !token.starts_with('('))
            .map(|token| {
                token
                    .parse::<u32>()
                    .map_err(|_| Error::Parse(format!("invalid SEARCH id: {token}")))
            })
            .collect::<Result<Vec<_>>>()?;
        return Ok(UntaggedResponse::Search(ids));
    }

    if let Ok(n) = first.parse::<u32>() {
        let (keyword, _) = split_atom(tail);
        if keyword.eq_ignore_ascii_case("EXISTS") {
            return Ok(UntaggedResponse::Exists(n));
        }
        if keyword.eq_ignore_ascii_case("RECENT") {
            return Ok(UntaggedResponse::Recent(n));
        }
    }

    Ok(UntaggedResponse::Other(rest.to_string()))
}

/// Splits off the first space-delimited atom.
fn split_atom(s: &str) -> (&str, &str) {
    s.split_once(' ').unwrap_or((s, ""))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_ok() {
        let response = Response::parse(b"A0001 OK [READ-WRITE] SELECT completed\r\n").unwrap();
        assert_eq!(
            response,
            Response::Tagged {
                tag: "A0001".to_string(),
                status: Status::Ok,
                text: "[READ-WRITE] SELECT completed".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_tagged_no() {
        let response = Response::parse(b"A0003 NO search failed\r\n").unwrap();
        assert!(matches!(
            response,
            Response::Tagged {
                status: Status::No,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_search() {
        let response = Response::parse(b"* SEARCH 2 84 882\r\n").unwrap();
        assert_eq!(
            response,
            Response::Untagged(UntaggedResponse::Search(vec![2, 84, 882]))
        );
    }

    #[test]
    fn test_parse_empty_search() {
        let response = Response::parse(b"* SEARCH\r\n").unwrap();
        assert_eq!(response, Response::Untagged(UntaggedResponse::Search(vec![])));
    }

    #[test]
    fn test_parse_search_with_modseq() {
        let response = Response::parse(b"* SEARCH 4 7 (MODSEQ 917162500)\r\n").unwrap();
        assert_eq!(
            response,
            Response::Untagged(UntaggedResponse::Search(vec![4, 7]))
        );
    }

    #[test]
    fn test_parse_invalid_search_id() {
        assert!(matches!(
            Response::parse(b"* SEARCH 1 x\r\n"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_parse_exists_and_recent() {
        assert_eq!(
            Response::parse(b"* 23 EXISTS\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Exists(23))
        );
        assert_eq!(
            Response::parse(b"* 1 RECENT\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Recent(1))
        );
    }

    #[test]
    fn test_parse_greeting_and_bye() {
        assert!(matches!(
            Response::parse(b"* OK [CAPABILITY IMAP4rev1] ready\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Ok,
                ..
            })
        ));
        assert!(matches!(
            Response::parse(b"* BYE shutting down\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Bye,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_other_and_continuation() {
        assert_eq!(
            Response::parse(b"* FLAGS (\\Seen \\Answered)\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Other(
                "FLAGS (\\Seen \\Answered)".to_string()
            ))
        );
        assert_eq!(
            Response::parse(b"+ go ahead\r\n").unwrap(),
            Response::Continuation("go ahead".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Response::parse(b"\r\n").is_err());
        assert!(Response::parse(b"A0001 MAYBE\r\n").is_err());
    }
}
