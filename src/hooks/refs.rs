//! Decoding of the ref updates git hands to server-side hooks.
//!
//! pre-receive and post-receive read `<old> SP <new> SP <ref> LF` lines from
//! stdin; update receives the same three values as arguments.

use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const BRANCH_PREFIX: &str = "refs/heads/";
const MAX_DIAGNOSTIC_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedRef {
    pub old_sha: String,
    pub new_sha: String,
    pub ref_name: String,
}

impl UpdatedRef {
    /// Branch name for `refs/heads/*` refs.
    #[must_use]
    pub fn branch(&self) -> Option<&str> {
        self.ref_name.strip_prefix(BRANCH_PREFIX)
    }

    #[must_use]
    pub fn is_create(&self) -> bool {
        is_zero_sha(&self.old_sha)
    }

    #[must_use]
    pub fn is_delete(&self) -> bool {
        is_zero_sha(&self.new_sha)
    }
}

fn is_zero_sha(sha: &str) -> bool {
    !sha.is_empty() && sha.bytes().all(|b| b == b'0')
}

/// Reads ref updates until end of input.
///
/// Any line that does not split into exactly three space separated fields
/// aborts parsing; no partial result is returned. A last line that is not
/// terminated by a newline is parsed like any other line.
pub fn parse_updated_refs<R: BufRead>(mut reader: R) -> Result<Vec<UpdatedRef>> {
    let mut refs = Vec::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }

        if line.last() == Some(&b'\n') {
            line.pop();
        }

        refs.push(parse_line(&line)?);
    }

    Ok(refs)
}

/// Parses a single line without its terminating newline.
pub fn parse_line(line: &[u8]) -> Result<UpdatedRef> {
    let text = std::str::from_utf8(line).map_err(|_| {
        Error::ProtocolParse(format!("line is not valid UTF-8: {}", diagnostic(line)))
    })?;

    let fields: Vec<&str> = text.split(' ').collect();
    let [old_sha, new_sha, ref_name] = fields.as_slice() else {
        return Err(Error::ProtocolParse(format!(
            "expected '<old-value> <new-value> <ref-name>', got {} field(s): {}",
            fields.len(),
            diagnostic(line)
        )));
    };

    Ok(UpdatedRef {
        old_sha: (*old_sha).to_string(),
        new_sha: (*new_sha).to_string(),
        ref_name: (*ref_name).to_string(),
    })
}

/// Decodes the update hook arguments `<ref-name> <old-value> <new-value>`.
pub fn parse_update_args<S: AsRef<str>>(args: &[S]) -> Result<UpdatedRef> {
    let [ref_name, old_sha, new_sha] = args else {
        return Err(Error::ProtocolParse(format!(
            "update hook expects 3 arguments, got {}",
            args.len()
        )));
    };

    Ok(UpdatedRef {
        old_sha: old_sha.as_ref().to_string(),
        new_sha: new_sha.as_ref().to_string(),
        ref_name: ref_name.as_ref().to_string(),
    })
}

fn diagnostic(raw: &[u8]) -> String {
    let escaped = String::from_utf8_lossy(raw).escape_debug().to_string();
    if escaped.chars().count() <= MAX_DIAGNOSTIC_LEN {
        return format!("\"{escaped}\"");
    }
    let truncated: String = escaped.chars().take(MAX_DIAGNOSTIC_LEN).collect();
    format!("\"{truncated}...\"")
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, Read};

    use super::*;

    const OLD: &str = "0000000000000000000000000000000000000000";
    const NEW: &str = "1234567890abcdef1234567890abcdef12345678";

    #[test]
    fn test_parses_lines_in_order() {
        let input = format!(
            "{OLD} {NEW} refs/heads/main\n{NEW} {OLD} refs/heads/old\n{NEW} {NEW} refs/tags/v1\n"
        );
        let refs = parse_updated_refs(Cursor::new(input)).unwrap();

        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].old_sha, OLD);
        assert_eq!(refs[0].new_sha, NEW);
        assert_eq!(refs[0].ref_name, "refs/heads/main");
        assert_eq!(refs[1].ref_name, "refs/heads/old");
        assert_eq!(refs[2].ref_name, "refs/tags/v1");
    }

    #[test]
    fn test_empty_input_yields_no_refs() {
        assert!(parse_updated_refs(Cursor::new("")).unwrap().is_empty());
    }

    #[test]
    fn test_final_line_without_newline_is_kept() {
        let input = format!("{OLD} {NEW} refs/heads/main\n{NEW} {OLD} refs/heads/last");
        let refs = parse_updated_refs(Cursor::new(input)).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].ref_name, "refs/heads/last");
    }

    #[test]
    fn test_fields_are_not_trimmed() {
        let input = format!("{OLD} {NEW} refs/heads/main\r\n");
        let refs = parse_updated_refs(Cursor::new(input)).unwrap();
        assert_eq!(refs[0].ref_name, "refs/heads/main\r");
    }

    #[test]
    fn test_wrong_field_count_is_fatal() {
        for bad in [
            String::new(),
            format!("{OLD}"),
            format!("{OLD} {NEW}"),
            format!("{OLD} {NEW} refs/heads/a b"),
            format!("{OLD}  {NEW} refs/heads/main"),
        ] {
            let input = format!("{OLD} {NEW} refs/heads/ok\n{bad}\n{OLD} {NEW} refs/heads/after\n");
            let result = parse_updated_refs(Cursor::new(input));
            assert!(
                matches!(result, Err(Error::ProtocolParse(_))),
                "expected parse error for {bad:?}"
            );
        }
    }

    #[test]
    fn test_error_reports_offending_line() {
        let err = parse_updated_refs(Cursor::new("garbage\tline\n")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("garbage\\tline"), "{message}");
    }

    #[test]
    fn test_invalid_utf8_is_fatal() {
        let input: &[u8] = b"\xff\xfe aa refs/heads/main\n";
        assert!(matches!(
            parse_updated_refs(input),
            Err(Error::ProtocolParse(_))
        ));
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_read_error_is_surfaced() {
        let reader = io::BufReader::new(FailingReader);
        assert!(matches!(parse_updated_refs(reader), Err(Error::Io(_))));
    }

    #[test]
    fn test_update_args() {
        let parsed = parse_update_args(&["refs/heads/main", OLD, NEW]).unwrap();
        assert_eq!(parsed.ref_name, "refs/heads/main");
        assert_eq!(parsed.old_sha, OLD);
        assert_eq!(parsed.new_sha, NEW);
        assert!(parsed.is_create());
        assert!(!parsed.is_delete());

        assert!(matches!(
            parse_update_args(&["refs/heads/main", OLD]),
            Err(Error::ProtocolParse(_))
        ));
    }

    #[test]
    fn test_branch() {
        let r = UpdatedRef {
            old_sha: OLD.to_string(),
            new_sha: NEW.to_string(),
            ref_name: "refs/heads/feature/x".to_string(),
        };
        assert_eq!(r.branch(), Some("feature/x"));

        let tag = UpdatedRef {
            ref_name: "refs/tags/v1".to_string(),
            ..r
        };
        assert_eq!(tag.branch(), None);
    }
}
