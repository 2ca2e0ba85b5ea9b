//! Argument grammar for the `symbol` command: a bare symbol name.

use crate::debugger::error::Error;

pub(super) fn parse(args: &[&str]) -> Result<String, Error> {
    args.first()
        .map(|s| (*s).to_string())
        .ok_or_else(|| Error::BadCommand("symbol needs a name".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_name() {
        assert_eq!(parse(&["main"]).unwrap(), "main");
    }

    #[test]
    fn missing_name_is_bad_command() {
        assert!(matches!(parse(&[]), Err(Error::BadCommand(_))));
    }
}
