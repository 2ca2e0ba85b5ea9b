//! Argument grammar for the `memory` command: `read 0x<hex>`,
//! `write 0x<hex> 0x<hex>`. The sub-keyword is resolved by the same
//! prefix-matching rule as the top-level command.

use crate::debugger::command::{match_prefix, parse_hex};
use crate::debugger::error::Error;

const SUB_KEYWORDS: &[&str] = &["read", "write"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryCommand {
    Read(u64),
    Write(u64, u64),
}

pub(super) fn parse(args: &[&str]) -> Result<MemoryCommand, Error> {
    let Some(&first) = args.first() else {
        return Err(Error::BadCommand(
            "usage: memory read 0x<hex> | memory write 0x<hex> 0x<hex>".into(),
        ));
    };
    let sub = match_prefix(first, SUB_KEYWORDS)
        .ok_or_else(|| Error::BadCommand(format!("unknown memory sub-command: {first}")))?;

    match (sub, &args[1..]) {
        ("read", [addr]) => Ok(MemoryCommand::Read(parse_hex(addr)?)),
        ("write", [addr, value]) => Ok(MemoryCommand::Write(parse_hex(addr)?, parse_hex(value)?)),
        _ => Err(Error::BadCommand(
            "usage: memory read 0x<hex> | memory write 0x<hex> 0x<hex>".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_read() {
        assert_eq!(parse(&["read", "0x1000"]).unwrap(), MemoryCommand::Read(0x1000));
    }

    #[test]
    fn parses_write() {
        assert_eq!(
            parse(&["write", "0x1000", "0x2a"]).unwrap(),
            MemoryCommand::Write(0x1000, 0x2a)
        );
    }

    #[test]
    fn wrong_arity_is_bad_command() {
        assert!(matches!(parse(&["read"]), Err(Error::BadCommand(_))));
        assert!(matches!(parse(&["write", "0x1"]), Err(Error::BadCommand(_))));
    }

    #[test]
    fn sub_keyword_accepts_an_unambiguous_prefix() {
        assert_eq!(parse(&["r", "0x1000"]).unwrap(), MemoryCommand::Read(0x1000));
        assert_eq!(
            parse(&["w", "0x1000", "0x2a"]).unwrap(),
            MemoryCommand::Write(0x1000, 0x2a)
        );
    }

    #[test]
    fn unknown_sub_keyword_is_bad_command() {
        assert!(matches!(parse(&["frob"]), Err(Error::BadCommand(_))));
    }
}
