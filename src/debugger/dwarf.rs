//! DWARF-based address/source/symbol resolver.
//!
//! The ELF image is memory-mapped once at startup and kept alive for the
//! debugger's lifetime; [`DwarfContext::new`] eagerly flattens every
//! compilation unit's DIE tree and line table into plain owned data so
//! that lookups never need to borrow back into `gimli`'s reader types,
//! and so unit tests can construct fixtures without a real ELF file.

use crate::debugger::address::{GlobalAddress, RelocatedAddress};
use crate::debugger::error::Error;
use fallible_iterator::FallibleIterator;
use gimli::{
    DW_AT_high_pc, DW_AT_low_pc, DW_AT_name, DW_TAG_subprogram, DwTag, Range, Reader,
    RunTimeEndian,
};
use itertools::Itertools;
use object::{Object, ObjectSection, ObjectSymbol, ObjectSymbolTable, SymbolKind};
use std::borrow::Cow;
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::ops::Deref;
use std::rc::Rc;

pub type EndianRcSlice = gimli::EndianRcSlice<RunTimeEndian>;

#[derive(Debug, Clone, PartialEq)]
struct LineRow {
    address: u64,
    file_index: u64,
    line: u64,
    column: u64,
    is_stmt: bool,
}

#[derive(Debug, Clone)]
pub struct Die {
    tag: DwTag,
    pub name: Option<String>,
    pub low_pc: Option<u64>,
    pub high_pc: Option<u64>,
}

impl Die {
    pub fn is_subprogram(&self) -> bool {
        self.tag == DW_TAG_subprogram
    }
}

struct DieRange {
    range: Range,
    die_idx: usize,
}

/// One compilation unit, flattened: no lifetime tied to `gimli::Unit`.
struct ParsedUnit {
    comp_name: Option<String>,
    files: Vec<String>,
    ranges: Vec<Range>,
    lines: Vec<LineRow>,
    dies: Vec<Die>,
    die_ranges: Vec<DieRange>,
}

impl ParsedUnit {
    fn get_place(&self, line_pos: usize) -> Option<Place<'_>> {
        let line = self.lines.get(line_pos)?;
        Some(Place {
            file: self.files.get(line.file_index as usize).map(|s| s.as_str())?,
            address: GlobalAddress::from(line.address as usize),
            line_number: line.line,
            column_number: line.column,
            pos_in_unit: line_pos,
            is_stmt: line.is_stmt,
            unit: self,
        })
    }
}

/// A resolved source location: one row of a unit's line table.
pub struct Place<'a> {
    pub file: &'a str,
    pub address: GlobalAddress,
    pub line_number: u64,
    pub column_number: u64,
    pub is_stmt: bool,
    pos_in_unit: usize,
    unit: &'a ParsedUnit,
}

impl<'a> Place<'a> {
    /// The next row in this unit's line table, in address order.
    pub fn next(&self) -> Option<Place<'a>> {
        self.unit.get_place(self.pos_in_unit + 1)
    }
}

impl<'a> PartialEq for Place<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.file == other.file
            && self.address == other.address
            && self.line_number == other.line_number
            && self.pos_in_unit == other.pos_in_unit
            && self.column_number == other.column_number
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKindView {
    NoType,
    Object,
    Func,
    Section,
    File,
}

impl std::fmt::Display for SymbolKindView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SymbolKindView::NoType => "notype",
            SymbolKindView::Object => "object",
            SymbolKindView::Func => "func",
            SymbolKindView::Section => "section",
            SymbolKindView::File => "file",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKindView,
    pub addr: GlobalAddress,
}

struct SymbolTab(HashMap<String, Vec<Symbol>>);

impl Deref for SymbolTab {
    type Target = HashMap<String, Vec<Symbol>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl SymbolTab {
    fn new<'data: 'file, 'file, OBJ: Object<'data, 'file>>(object_file: &'data OBJ) -> Self {
        fn view_of(kind: SymbolKind) -> SymbolKindView {
            match kind {
                SymbolKind::Text => SymbolKindView::Func,
                SymbolKind::Data => SymbolKindView::Object,
                SymbolKind::Section => SymbolKindView::Section,
                SymbolKind::File => SymbolKindView::File,
                _ => SymbolKindView::NoType,
            }
        }

        let mut symbols: HashMap<String, Vec<Symbol>> = HashMap::new();
        let tables = object_file
            .symbol_table()
            .into_iter()
            .chain(object_file.dynamic_symbol_table());
        for table in tables {
            for symbol in table.symbols() {
                let Ok(name) = symbol.name() else { continue };
                symbols.entry(name.to_string()).or_default().push(Symbol {
                    name: name.to_string(),
                    kind: view_of(symbol.kind()),
                    addr: GlobalAddress::from(symbol.address() as usize),
                });
            }
        }
        SymbolTab(symbols)
    }
}

pub struct DwarfContext {
    units: Vec<ParsedUnit>,
    symbol_table: SymbolTab,
}

impl DwarfContext {
    pub fn new<'a: 'b, 'b, OBJ: Object<'a, 'b>>(obj_file: &'a OBJ) -> Result<Self, Error> {
        let endian = if obj_file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };

        fn load_section<'a: 'b, 'b, OBJ, Endian>(
            id: gimli::SectionId,
            file: &'a OBJ,
            endian: Endian,
        ) -> gimli::Result<gimli::EndianRcSlice<Endian>>
        where
            OBJ: object::Object<'a, 'b>,
            Endian: gimli::Endianity,
        {
            let data = file
                .section_by_name(id.name())
                .and_then(|section| section.uncompressed_data().ok())
                .unwrap_or(Cow::Borrowed(&[]));
            Ok(gimli::EndianRcSlice::new(Rc::from(&*data), endian))
        }

        let dwarf = gimli::Dwarf::load(|id| load_section(id, obj_file, endian))?;
        let units = Self::parse(&dwarf)?;
        let symbol_table = SymbolTab::new(obj_file);

        Ok(Self {
            units,
            symbol_table,
        })
    }

    fn parse(dwarf: &gimli::Dwarf<EndianRcSlice>) -> Result<Vec<ParsedUnit>, Error> {
        let mut units = vec![];
        let mut headers = dwarf.units();
        while let Some(header) = headers.next()? {
            let unit = dwarf.unit(header)?;

            let mut lines = vec![];
            let mut files = vec![];
            if let Some(ref lp) = unit.line_program {
                let mut rows = lp.clone().rows();
                lines = parse_lines(&mut rows)?;
                files = parse_files(dwarf, &unit, &rows)?;
            }
            lines.sort_by_key(|l| l.address);

            let mut ranges = dwarf.unit_ranges(&unit)?.collect::<Vec<_>>()?;
            ranges.sort_by_key(|r| r.begin);

            let mut dies = vec![];
            let mut die_ranges = vec![];
            let mut cursor = unit.entries();
            while let Some((_, die)) = cursor.next_dfs()? {
                let low_pc = match die.attr(DW_AT_low_pc)? {
                    Some(attr) => match attr.value() {
                        gimli::AttributeValue::Addr(v) => Some(v),
                        gimli::AttributeValue::DebugAddrIndex(idx) => {
                            Some(dwarf.address(&unit, idx)?)
                        }
                        _ => None,
                    },
                    None => None,
                };
                let high_pc = match die.attr(DW_AT_high_pc)? {
                    Some(attr) => match attr.value() {
                        gimli::AttributeValue::Addr(v) => Some(v),
                        gimli::AttributeValue::DebugAddrIndex(idx) => {
                            Some(dwarf.address(&unit, idx)?)
                        }
                        gimli::AttributeValue::Udata(v) => Some(low_pc.unwrap_or(0) + v),
                        _ => None,
                    },
                    None => None,
                };
                let name = die
                    .attr(DW_AT_name)?
                    .and_then(|attr| dwarf.attr_string(&unit, attr.value()).ok())
                    .map(|s| s.to_string_lossy().map(|s| s.to_string()))
                    .transpose()?;

                dies.push(Die {
                    tag: die.tag(),
                    name,
                    low_pc,
                    high_pc,
                });

                dwarf.die_ranges(&unit, die)?.for_each(|r| {
                    die_ranges.push(DieRange {
                        range: r,
                        die_idx: dies.len() - 1,
                    });
                    Ok(())
                })?;
            }
            // `die_ranges` is left in DFS insertion order (not sorted by
            // address): `function_at`'s tie-break on overlapping ranges
            // depends on encountering DIEs in traversal order.

            let comp_name = unit
                .name
                .as_ref()
                .and_then(|name| name.to_string_lossy().ok().map(|s| s.to_string()));

            let parsed = ParsedUnit {
                comp_name,
                files,
                ranges,
                lines,
                dies,
                die_ranges,
            };

            debug_assert!(parsed
                .ranges
                .iter()
                .tuple_windows()
                .all(|(r1, r2)| r1.begin <= r2.begin));

            units.push(parsed);
        }
        Ok(units)
    }

    fn find_unit(&self, pc: u64) -> Option<&ParsedUnit> {
        self.units.iter().find(|unit| {
            unit.ranges
                .iter()
                .any(|range| range.begin <= pc && pc < range.end)
        })
    }

    /// PC (DWARF space) → enclosing `subprogram` DIE. First match in
    /// iteration order wins on overlapping (inlined) ranges.
    pub fn function_at(&self, pc: GlobalAddress) -> Result<&Die, Error> {
        let pc = pc.as_u64();
        let unit = self.find_unit(pc).ok_or(Error::NoFunction(pc.into()))?;

        unit.die_ranges
            .iter()
            .find(|dr| {
                unit.dies[dr.die_idx].is_subprogram()
                    && dr.range.begin <= pc
                    && pc < dr.range.end
            })
            .map(|dr| &unit.dies[dr.die_idx])
            .ok_or(Error::NoFunction(pc.into()))
    }

    /// PC (DWARF space) → the line-table row that covers it.
    pub fn line_at(&self, pc: GlobalAddress) -> Result<Place<'_>, Error> {
        let raw = pc.as_u64();
        let unit = self.find_unit(raw).ok_or(Error::NoLineEntry(raw.into()))?;

        let pos = match unit.lines.binary_search_by_key(&raw, |l| l.address) {
            Ok(p) => p,
            Err(0) => return Err(Error::NoLineEntry(raw.into())),
            Err(p) => p - 1,
        };
        unit.get_place(pos).ok_or(Error::NoLineEntry(raw.into()))
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Die> {
        self.units
            .iter()
            .flat_map(|unit| unit.dies.iter())
            .find(|die| die.is_subprogram() && die.name.as_deref() == Some(name))
    }

    /// Every address, in runtime space, where `name` is defined, past its
    /// prologue. Computed from the *resolved* function's own `low_pc` —
    /// never from whatever function happens to be executing.
    pub fn resolve_function(&self, name: &str, load_bias: usize) -> Vec<RelocatedAddress> {
        self.units
            .iter()
            .flat_map(|unit| unit.dies.iter())
            .filter(|die| die.is_subprogram() && die.name.as_deref() == Some(name))
            .filter_map(|die| die.low_pc)
            .filter_map(|low_pc| {
                let entry_line = self.line_at(GlobalAddress::from(low_pc as usize)).ok()?;
                let post_prologue = entry_line.next().unwrap_or(entry_line);
                Some(post_prologue.address.to_runtime(load_bias))
            })
            .collect()
    }

    /// Every `is_stmt` address at `line` in every unit whose name ends
    /// with `filename` (suffix match, so callers may pass a basename).
    pub fn resolve_source(
        &self,
        filename: &str,
        line: u64,
        load_bias: usize,
    ) -> Vec<RelocatedAddress> {
        self.units
            .iter()
            .filter(|unit| {
                unit.comp_name
                    .as_deref()
                    .map(|name| name.ends_with(filename))
                    .unwrap_or(false)
            })
            .flat_map(|unit| {
                unit.lines
                    .iter()
                    .filter(|l| l.is_stmt && l.line == line)
                    .map(|l| GlobalAddress::from(l.address as usize).to_runtime(load_bias))
            })
            .collect()
    }

    /// Exact-name lookup across `symtab` and `dynsym`.
    pub fn lookup_symbol(&self, name: &str) -> Vec<&Symbol> {
        self.symbol_table
            .get(name)
            .map(|symbols| symbols.iter().collect())
            .unwrap_or_default()
    }
}

fn parse_lines<R, Offset>(
    rows: &mut gimli::LineRows<R, gimli::IncompleteLineProgram<R, Offset>, Offset>,
) -> gimli::Result<Vec<LineRow>>
where
    R: gimli::Reader<Offset = Offset>,
    Offset: gimli::ReaderOffset,
{
    let mut lines = vec![];
    while let Some((_, row)) = rows.next_row()? {
        let column = match row.column() {
            gimli::ColumnType::LeftEdge => 0,
            gimli::ColumnType::Column(x) => x.get(),
        };
        lines.push(LineRow {
            address: row.address(),
            file_index: row.file_index(),
            line: row.line().map(NonZeroU64::get).unwrap_or(0),
            column,
            is_stmt: row.is_stmt(),
        });
    }
    Ok(lines)
}

fn parse_files<R, Offset>(
    dwarf: &gimli::Dwarf<R>,
    unit: &gimli::Unit<R>,
    rows: &gimli::LineRows<R, gimli::IncompleteLineProgram<R, Offset>, Offset>,
) -> gimli::Result<Vec<String>>
where
    R: gimli::Reader<Offset = Offset>,
    Offset: gimli::ReaderOffset,
{
    let mut files = vec![];
    let header = rows.header();
    match header.file(0) {
        Some(file) => files.push(render_file_path(unit, file, header, dwarf)?),
        None => files.push(String::new()),
    }
    let mut index = 1;
    while let Some(file) = header.file(index) {
        files.push(render_file_path(unit, file, header, dwarf)?);
        index += 1;
    }
    Ok(files)
}

fn render_file_path<R: Reader>(
    dw_unit: &gimli::Unit<R>,
    file: &gimli::FileEntry<R, R::Offset>,
    header: &gimli::LineProgramHeader<R, R::Offset>,
    sections: &gimli::Dwarf<R>,
) -> Result<String, gimli::Error> {
    let mut path = if let Some(ref comp_dir) = dw_unit.comp_dir {
        comp_dir.to_string_lossy()?.into_owned()
    } else {
        String::new()
    };

    if file.directory_index() != 0 {
        if let Some(directory) = file.directory(header) {
            path_push(
                &mut path,
                sections
                    .attr_string(dw_unit, directory)?
                    .to_string_lossy()?
                    .as_ref(),
            );
        }
    }

    path_push(
        &mut path,
        sections
            .attr_string(dw_unit, file.path_name())?
            .to_string_lossy()?
            .as_ref(),
    );

    Ok(path)
}

fn path_push(path: &mut String, p: &str) {
    if p.starts_with('/') {
        *path = p.to_string();
    } else {
        if !path.is_empty() && !path.ends_with('/') {
            path.push('/');
        }
        *path += p;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(comp_name: &str, lines: Vec<LineRow>, dies: Vec<Die>) -> ParsedUnit {
        let ranges = dies
            .iter()
            .filter_map(|d| Some(Range { begin: d.low_pc?, end: d.high_pc? }))
            .collect::<Vec<_>>();
        let die_ranges = dies
            .iter()
            .enumerate()
            .filter_map(|(idx, d)| {
                Some(DieRange {
                    range: Range { begin: d.low_pc?, end: d.high_pc? },
                    die_idx: idx,
                })
            })
            .collect();
        ParsedUnit {
            comp_name: Some(comp_name.to_string()),
            files: vec!["hello.c".to_string()],
            ranges,
            lines,
            dies,
            die_ranges,
        }
    }

    fn ctx_with(units: Vec<ParsedUnit>) -> DwarfContext {
        DwarfContext {
            units,
            symbol_table: SymbolTab(HashMap::new()),
        }
    }

    fn line(address: u64, line_no: u64, is_stmt: bool) -> LineRow {
        LineRow {
            address,
            file_index: 0,
            line: line_no,
            column: 0,
            is_stmt,
        }
    }

    #[test]
    fn function_at_finds_the_enclosing_subprogram() {
        let die = Die {
            tag: DW_TAG_subprogram,
            name: Some("main".to_string()),
            low_pc: Some(0x1000),
            high_pc: Some(0x1100),
        };
        let ctx = ctx_with(vec![unit("hello.c", vec![], vec![die])]);
        let found = ctx.function_at(GlobalAddress::from(0x1050usize)).unwrap();
        assert_eq!(found.name.as_deref(), Some("main"));
    }

    #[test]
    fn function_at_outside_any_range_is_no_function() {
        let die = Die {
            tag: DW_TAG_subprogram,
            name: Some("main".to_string()),
            low_pc: Some(0x1000),
            high_pc: Some(0x1100),
        };
        let ctx = ctx_with(vec![unit("hello.c", vec![], vec![die])]);
        assert!(matches!(
            ctx.function_at(GlobalAddress::from(0x2000usize)),
            Err(Error::NoFunction(_))
        ));
    }

    #[test]
    fn resolve_function_skips_the_prologue_line() {
        let die = Die {
            tag: DW_TAG_subprogram,
            name: Some("greet".to_string()),
            low_pc: Some(0x1160),
            high_pc: Some(0x1180),
        };
        let lines = vec![line(0x1160, 10, true), line(0x1165, 11, true)];
        let ctx = ctx_with(vec![unit("hello.c", lines, vec![die])]);
        let addrs = ctx.resolve_function("greet", 0);
        assert_eq!(addrs, vec![0x1165usize.into()]);
    }

    #[test]
    fn resolve_function_applies_the_load_bias() {
        let die = Die {
            tag: DW_TAG_subprogram,
            name: Some("greet".to_string()),
            low_pc: Some(0x1160),
            high_pc: Some(0x1180),
        };
        let lines = vec![line(0x1160, 10, true), line(0x1165, 11, true)];
        let ctx = ctx_with(vec![unit("hello.c", lines, vec![die])]);
        let addrs = ctx.resolve_function("greet", 0x5000);
        assert_eq!(addrs, vec![0x6165usize.into()]);
    }

    #[test]
    fn resolve_function_unknown_name_is_empty() {
        let ctx = ctx_with(vec![unit("hello.c", vec![], vec![])]);
        assert!(ctx.resolve_function("nope", 0).is_empty());
    }

    #[test]
    fn resolve_source_matches_by_filename_suffix() {
        let lines = vec![line(0x1149, 5, true), line(0x1160, 11, true)];
        let ctx = ctx_with(vec![unit("/build/hello.c", lines, vec![])]);
        let addrs = ctx.resolve_source("hello.c", 11, 0);
        assert_eq!(addrs, vec![0x1160usize.into()]);
    }

    #[test]
    fn resolve_source_ignores_non_stmt_rows() {
        let lines = vec![line(0x1149, 5, false)];
        let ctx = ctx_with(vec![unit("hello.c", lines, vec![])]);
        assert!(ctx.resolve_source("hello.c", 5, 0).is_empty());
    }

    #[test]
    fn resolve_source_collects_from_every_matching_unit() {
        let lines_a = vec![line(0x1149, 11, true)];
        let lines_b = vec![line(0x2149, 11, true)];
        let ctx = ctx_with(vec![
            unit("/a/hello.c", lines_a, vec![]),
            unit("/b/hello.c", lines_b, vec![]),
        ]);
        let mut addrs = ctx.resolve_source("hello.c", 11, 0);
        addrs.sort();
        assert_eq!(addrs, vec![0x1149usize.into(), 0x2149usize.into()]);
    }
}
