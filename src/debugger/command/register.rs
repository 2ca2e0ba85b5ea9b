//! Argument grammar for the `register` command: `dump`, `read <name>`,
//! `write <name> 0x<hex>`. The sub-keyword is resolved by the same
//! prefix-matching rule as the top-level command.

use crate::debugger::command::{match_prefix, parse_hex};
use crate::debugger::error::Error;

const SUB_KEYWORDS: &[&str] = &["dump", "read", "write"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterCommand {
    Dump,
    Read(String),
    Write(String, u64),
}

pub(super) fn parse(args: &[&str]) -> Result<RegisterCommand, Error> {
    let Some(&first) = args.first() else {
        return Err(Error::BadCommand(
            "usage: register dump | register read <name> | register write <name> 0x<hex>".into(),
        ));
    };
    let sub = match_prefix(first, SUB_KEYWORDS).ok_or_else(|| {
        Error::BadCommand(format!("unknown register sub-command: {first}"))
    })?;

    match (sub, &args[1..]) {
        ("dump", []) => Ok(RegisterCommand::Dump),
        ("read", [name]) => Ok(RegisterCommand::Read((*name).to_string())),
        ("write", [name, value]) => {
            Ok(RegisterCommand::Write((*name).to_string(), parse_hex(value)?))
        }
        _ => Err(Error::BadCommand(
            "usage: register dump | register read <name> | register write <name> 0x<hex>".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dump() {
        assert_eq!(parse(&["dump"]).unwrap(), RegisterCommand::Dump);
    }

    #[test]
    fn parses_read() {
        assert_eq!(
            parse(&["read", "rip"]).unwrap(),
            RegisterCommand::Read("rip".to_string())
        );
    }

    #[test]
    fn parses_write() {
        assert_eq!(
            parse(&["write", "rax", "0x2a"]).unwrap(),
            RegisterCommand::Write("rax".to_string(), 0x2a)
        );
    }

    #[test]
    fn wrong_arity_is_bad_command() {
        assert!(matches!(parse(&["read"]), Err(Error::BadCommand(_))));
        assert!(matches!(parse(&[]), Err(Error::BadCommand(_))));
    }

    #[test]
    fn sub_keyword_accepts_an_unambiguous_prefix() {
        assert_eq!(parse(&["d"]).unwrap(), RegisterCommand::Dump);
        assert_eq!(
            parse(&["r", "rip"]).unwrap(),
            RegisterCommand::Read("rip".to_string())
        );
        assert_eq!(
            parse(&["w", "rax", "0x2a"]).unwrap(),
            RegisterCommand::Write("rax".to_string(), 0x2a)
        );
    }

    #[test]
    fn unknown_sub_keyword_is_bad_command() {
        assert!(matches!(parse(&["frob"]), Err(Error::BadCommand(_))));
    }
}
