//! Call-site extraction.
//!
//! Finds two families of tenant-sensitive operations in a file:
//! - structured calls `<root>.<entity>.<verb>(`, with the verb mapped to an
//!   `OperationKind` through a fixed table;
//! - raw-query escape hatches such as `` db.$queryRaw`...` `` or
//!   `rawQuery(...)`.
//!
//! Exempt entities are dropped here. No scope judgment happens in this
//! module.

use crate::exempt::ExemptionSet;
use crate::models::{CallSite, Location, OperationKind, ScanTarget, OPERATION_VERBS};
use crate::utils::LineIndex;
use regex::Regex;

const SNIPPET_MAX: usize = 200;
/// Member access between chain segments: `.`, `?.`, `!.` or `!?.`.
const MEMBER_DOT: &str = r"\s*!?\s*\??\.\s*";
/// Entity name for raw queries whose table could not be determined.
pub const RAW_ENTITY: &str = "raw";

pub struct Extractor {
    structured: Regex,
    raw: Option<Regex>,
    table: Regex,
}

impl Extractor {
    pub fn new(roots: &[String], raw_methods: &[String]) -> Result<Self, regex::Error> {
        let mut verbs: Vec<&str> = OPERATION_VERBS.to_vec();
        // Longest first so prefixes never shadow a longer verb.
        verbs.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let roots_alt = alternation(roots.iter().map(String::as_str));
        let dot = MEMBER_DOT;
        let structured = Regex::new(&format!(
            r"\b(?P<root>{roots_alt}){dot}(?P<entity>[A-Za-z_]\w*){dot}(?P<verb>{})\s*(?:\?\.\s*)?\(",
            verbs.join("|")
        ))?;
        let raw = if raw_methods.is_empty() {
            None
        } else {
            let mut methods: Vec<&str> = raw_methods.iter().map(String::as_str).collect();
            methods.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
            Some(Regex::new(&format!(
                r"(?:\b(?P<root>{roots_alt}){dot})?(?P<verb>{})\s*(?:<[^>\n]*>)?\s*(?:\?\.\s*)?[(`]",
                alternation(methods.into_iter())
            ))?)
        };
        let table = Regex::new(r#"(?i)\b(?:from|into|update|join)\s+["'`]?(?P<table>[A-Za-z_]\w*)"#)?;
        Ok(Self {
            structured,
            raw,
            table,
        })
    }

    /// Extract every non-exempt call site from `target`, ordered by offset.
    ///
    /// `lookahead` bounds how many lines after a raw call are searched for
    /// its argument text.
    pub fn extract(
        &self,
        target: &ScanTarget,
        exempt: &ExemptionSet,
        lookahead: usize,
    ) -> Vec<CallSite> {
        let text = target.source.as_str();
        let lines = LineIndex::new(text);
        let mut sites = Vec::new();

        for caps in self.structured.captures_iter(text) {
            let (Some(whole), Some(entity), Some(verb)) =
                (caps.get(0), caps.name("entity"), caps.name("verb"))
            else {
                continue;
            };
            let Some(kind) = OperationKind::from_verb(verb.as_str()) else {
                continue;
            };
            if exempt.is_exempt(entity.as_str()) {
                tracing::trace!(file = %target.display, entity = entity.as_str(), "exempt entity");
                continue;
            }
            sites.push(make_site(
                target,
                &lines,
                whole.start(),
                entity.as_str().to_string(),
                kind,
                verb.as_str(),
            ));
        }

        if let Some(raw) = self.raw.as_ref() {
            for caps in raw.captures_iter(text) {
                let (Some(whole), Some(verb)) = (caps.get(0), caps.name("verb")) else {
                    continue;
                };
                if caps.name("root").is_none() && continues_identifier(text, verb.start()) {
                    continue;
                }
                let open = whole.end() - 1;
                let line = lines.line_of(whole.start());
                let limit = lines.line_start(line + lookahead + 1).max(open + 1);
                let args = &text[open..balanced_end(text.as_bytes(), open, limit)];
                let tables: Vec<&str> = self
                    .table
                    .captures_iter(args)
                    .filter_map(|c| c.name("table"))
                    .map(|m| m.as_str())
                    .collect();
                let entity = tables.iter().find(|t| !exempt.is_exempt(t));
                if entity.is_none() && !tables.is_empty() {
                    tracing::trace!(file = %target.display, tables = ?tables, "raw query on exempt tables only");
                    continue;
                }
                sites.push(make_site(
                    target,
                    &lines,
                    whole.start(),
                    entity.map_or_else(|| RAW_ENTITY.to_string(), |t| t.to_string()),
                    OperationKind::RawQuery,
                    verb.as_str(),
                ));
            }
        }

        sites.sort_by_key(|s| s.offset);
        sites
    }
}

fn make_site(
    target: &ScanTarget,
    lines: &LineIndex<'_>,
    offset: usize,
    entity_name: String,
    operation_kind: OperationKind,
    method: &str,
) -> CallSite {
    let line = lines.line_of(offset);
    CallSite {
        entity_name,
        operation_kind,
        method: method.to_string(),
        location: Location {
            file: target.display.clone(),
            line,
            column: lines.column_of(offset),
        },
        source_snippet: truncate(lines.line_text(line).trim(), SNIPPET_MAX),
        offset,
    }
}

fn alternation<'a>(words: impl Iterator<Item = &'a str>) -> String {
    let parts: Vec<String> = words
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    if parts.is_empty() {
        "[^\\s\\S]".to_string()
    } else {
        parts.join("|")
    }
}

/// True when the byte before `at` belongs to an identifier, i.e. the match
/// is the tail of a longer name.
fn continues_identifier(text: &str, at: usize) -> bool {
    text[..at]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// End (exclusive) of the bracketed or template expression opening at
/// `open`, or `limit` when it does not close in time. Quotes and `${}`
/// substitutions are honoured; comments are not.
fn balanced_end(bytes: &[u8], open: usize, limit: usize) -> usize {
    let limit = limit.min(bytes.len());
    let mut stack: Vec<u8> = Vec::new();
    let mut i = open;
    while i < limit {
        let b = bytes[i];
        match stack.last().copied() {
            Some(q @ (b'\'' | b'"')) => {
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == q {
                    stack.pop();
                }
            }
            Some(b'`') => {
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == b'`' {
                    stack.pop();
                } else if b == b'$' && bytes.get(i + 1) == Some(&b'{') {
                    stack.push(b'}');
                    i += 2;
                    continue;
                }
            }
            _ => match b {
                b'(' => stack.push(b')'),
                b'[' => stack.push(b']'),
                b'{' => stack.push(b'}'),
                b'\'' | b'"' | b'`' => stack.push(b),
                b')' | b']' | b'}' => {
                    if stack.last() == Some(&b) {
                        stack.pop();
                    } else {
                        return i + 1;
                    }
                }
                _ => {}
            },
        }
        if stack.is_empty() {
            return i + 1;
        }
        i += 1;
    }
    limit
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_RAW_METHODS, DEFAULT_ROOTS};
    use std::path::Path;

    fn extractor() -> Extractor {
        let roots: Vec<String> = DEFAULT_ROOTS.iter().map(|s| s.to_string()).collect();
        let raw: Vec<String> = DEFAULT_RAW_METHODS.iter().map(|s| s.to_string()).collect();
        Extractor::new(&roots, &raw).unwrap()
    }

    fn target(src: &str) -> ScanTarget {
        ScanTarget::from_source(Path::new("/r/src/a.ts"), Path::new("/r"), src.to_string())
    }

    fn extract(src: &str) -> Vec<CallSite> {
        extractor().extract(&target(src), &ExemptionSet::defaults(), 12)
    }

    #[test]
    fn test_structured_call_fields() {
        let sites = extract("const a = 1;\n  const s = await db.student.findMany({ where: { id } });\n");
        assert_eq!(sites.len(), 1);
        let s = &sites[0];
        assert_eq!(s.entity_name, "student");
        assert_eq!(s.operation_kind, OperationKind::ReadMany);
        assert_eq!(s.method, "findMany");
        assert_eq!(s.location.file, "src/a.ts");
        assert_eq!(s.location.line, 2);
        assert_eq!(s.location.column, 19);
        assert_eq!(
            s.source_snippet,
            "const s = await db.student.findMany({ where: { id } });"
        );
    }

    #[test]
    fn test_verb_table_drives_kind() {
        let src = "prisma.grade.create({})\nprisma.grade.updateMany({})\nprisma.grade.findFirstOrThrow({})\nprisma.grade.deleteMany({})\nprisma.grade.groupBy({})\n";
        let kinds: Vec<_> = extract(src).into_iter().map(|s| s.operation_kind).collect();
        assert_eq!(
            kinds,
            vec![
                OperationKind::Write,
                OperationKind::WriteMany,
                OperationKind::Read,
                OperationKind::DeleteMany,
                OperationKind::Aggregate,
            ]
        );
    }

    #[test]
    fn test_multiple_calls_on_one_line() {
        let src = "await Promise.all([db.student.count(), db.guardian.findMany()]);\n";
        let sites = extract(src);
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].entity_name, "student");
        assert_eq!(sites[1].entity_name, "guardian");
        assert_eq!(sites[0].location.line, sites[1].location.line);
        assert!(sites[0].location.column < sites[1].location.column);
    }

    #[test]
    fn test_chain_split_across_lines_and_member_root() {
        let src = "return this.prisma.student\n  .findUnique({ where: { id } })\n";
        let sites = extract(src);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].location.line, 1);
        assert_eq!(sites[0].operation_kind, OperationKind::Read);
    }

    #[test]
    fn test_exempt_entities_are_dropped() {
        let src = "db.session.findMany()\ndb.Session.delete({})\ndb.student.findMany()\n";
        let sites = extract(src);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].entity_name, "student");
    }

    #[test]
    fn test_unknown_roots_and_verbs_ignored() {
        let src = "api.student.findMany()\ndb.student.include()\nmydb.student.findMany()\n";
        assert!(extract(src).is_empty());
    }

    #[test]
    fn test_raw_query_tagged_template() {
        let src = "const rows = await prisma.$queryRaw`\n  SELECT * FROM \"Student\" WHERE id = ${id}\n`;\n";
        let sites = extract(src);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].operation_kind, OperationKind::RawQuery);
        assert_eq!(sites[0].method, "$queryRaw");
        assert_eq!(sites[0].entity_name, "Student");
    }

    #[test]
    fn test_raw_query_call_forms() {
        let src = "await db.$executeRawUnsafe('DELETE FROM grades')\nconst r = rawQuery(sql)\nmyrawQuery(x)\nprisma.$queryRaw<Row[]>`SELECT 1`\n";
        let sites = extract(src);
        let methods: Vec<_> = sites.iter().map(|s| s.method.as_str()).collect();
        assert_eq!(methods, vec!["$executeRawUnsafe", "rawQuery", "$queryRaw"]);
        assert_eq!(sites[0].entity_name, "grades");
        assert_eq!(sites[1].entity_name, RAW_ENTITY);
        assert_eq!(sites[2].entity_name, RAW_ENTITY);
    }

    #[test]
    fn test_raw_query_on_exempt_table_dropped() {
        let src = "await db.$queryRaw`SELECT * FROM session WHERE token = ${t}`\n";
        assert!(extract(src).is_empty());
    }

    #[test]
    fn test_raw_query_joining_exempt_and_tenant_tables() {
        let src = "await prisma.$queryRaw`SELECT s.* FROM session x JOIN student s ON s.userId = x.userId WHERE x.token = ${t}`\n";
        let sites = extract(src);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].entity_name, "student");
        let exempt_only = "await prisma.$queryRaw`SELECT * FROM session JOIN account ON true`\n";
        assert!(extract(exempt_only).is_empty());
    }

    #[test]
    fn test_optional_chain_and_non_null_members() {
        let src = "db.student?.findMany({ where: { id } })\nthis.db!.grade.findFirst({})\ntx?.guardian!.count()\ndb.student.findMany?.({})\ndb?.$queryRaw`SELECT 1`\n";
        let sites = extract(src);
        let found: Vec<_> = sites
            .iter()
            .map(|s| (s.location.line, s.entity_name.as_str(), s.method.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                (1, "student", "findMany"),
                (2, "grade", "findFirst"),
                (3, "guardian", "count"),
                (4, "student", "findMany"),
                (5, RAW_ENTITY, "$queryRaw"),
            ]
        );
    }

    #[test]
    fn test_balanced_end_handles_nesting_and_strings() {
        let s = "(a, { b: ')' }, `x ${f(1)} )`) tail";
        let end = balanced_end(s.as_bytes(), 0, s.len());
        assert_eq!(&s[..end], "(a, { b: ')' }, `x ${f(1)} )`)");
        let open = "(never closes";
        assert_eq!(balanced_end(open.as_bytes(), 0, open.len()), open.len());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("ééé", 3), "é...");
    }
}
