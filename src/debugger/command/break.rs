//! Argument grammar for the `break` command: a hex address, a
//! `file:line` pair, or a bare function name.

use crate::debugger::command::parse_hex;
use crate::debugger::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakTarget {
    Address(u64),
    Source(String, u64),
    Function(String),
}

pub(super) fn parse(args: &[&str]) -> Result<BreakTarget, Error> {
    let location = args
        .first()
        .ok_or_else(|| Error::BadCommand("break needs a location".into()))?;

    if location.starts_with("0x") {
        return parse_hex(location).map(BreakTarget::Address);
    }

    if let Some((file, line)) = location.split_once(':') {
        let line = line
            .parse::<u64>()
            .map_err(|_| Error::BadCommand(format!("invalid line number: {line}")))?;
        return Ok(BreakTarget::Source(file.to_string(), line));
    }

    Ok(BreakTarget::Function(location.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_hex_address() {
        assert_eq!(parse(&["0x1149"]).unwrap(), BreakTarget::Address(0x1149));
    }

    #[test]
    fn parses_a_file_line_location() {
        assert_eq!(
            parse(&["hello.c:11"]).unwrap(),
            BreakTarget::Source("hello.c".to_string(), 11)
        );
    }

    #[test]
    fn parses_a_bare_function_name() {
        assert_eq!(
            parse(&["greet"]).unwrap(),
            BreakTarget::Function("greet".to_string())
        );
    }

    #[test]
    fn missing_location_is_bad_command() {
        assert!(matches!(parse(&[]), Err(Error::BadCommand(_))));
    }

    #[test]
    fn malformed_line_number_is_bad_command() {
        assert!(matches!(parse(&["hello.c:abc"]), Err(Error::BadCommand(_))));
    }
}
