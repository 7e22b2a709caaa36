//! Compile a smart playlist rule tree into a parameterized SQLite query.
//!
//! Compilation is pure: the only inputs besides the rules are the current
//! time and the modulus for random ordering, both carried in
//! [`CompileContext`].

use rand::Rng;
use rusqlite::types::Value;
use tracing::warn;

use crate::model::Timestamp;
use crate::smart::rules::{
    Condition, LimitField, Operator, Rule, RuleSet, Smart, SmartLimit,
};

/// Predicate used for rules whose field has no column.
const INVALID_PREDICATE: &str = "0 = 1";
/// Predicate used for rules that could not be decoded.
const PASS_PREDICATE: &str = "1 = 1";

/// Inputs that make compilation deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileContext {
    pub now: Timestamp,
    pub random_modulus: i64,
}

impl CompileContext {
    /// A context for one read, with a fresh random ordering.
    #[must_use]
    pub fn new(now: Timestamp) -> Self {
        Self {
            now,
            random_modulus: rand::thread_rng().gen_range(1..=0xff_ffff),
        }
    }

    #[must_use]
    pub const fn with_modulus(now: Timestamp, random_modulus: i64) -> Self {
        Self {
            now,
            random_modulus,
        }
    }
}

/// A `LEFT OUTER JOIN` against `playlist_track` for one playlist rule.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub alias: String,
    /// Playlist the join is restricted to, stored in its database form.
    pub playlist_id: Option<i64>,
}

impl JoinSpec {
    #[must_use]
    pub fn sql(&self) -> String {
        let a = &self.alias;
        let mut s = format!("LEFT OUTER JOIN playlist_track {a} ON track.id = {a}.track_id");
        if self.playlist_id.is_some() {
            s.push_str(&format!(" AND {a}.playlist_id = ?"));
        }
        s
    }
}

/// Alias for the join at `index`: `pta`, `ptb`, ... `ptz`, `ptaa`, `ptab`, ...
#[must_use]
pub fn join_alias(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        n -= 1;
        #[allow(clippy::cast_possible_truncation)]
        letters.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    letters.reverse();
    format!("pt{}", String::from_utf8_lossy(&letters))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledQuery {
    /// Parenthesized WHERE fragment for the rule tree.
    pub where_sql: String,
    /// Arguments for the `?` placeholders in `where_sql`.
    pub where_args: Vec<Value>,
    pub joins: Vec<JoinSpec>,
    /// Set when any playlist join may repeat a track row.
    pub distinct: bool,
    /// `ORDER BY` expression without the keyword.
    pub order_by: Option<String>,
    pub limit: Option<u64>,
    /// Byte budget applied to the result after it is read.
    pub max_size: Option<u64>,
    /// Millisecond budget applied to the result after it is read.
    pub max_time: Option<u64>,
    pub warnings: Vec<String>,
}

impl CompiledQuery {
    /// Full track query. Only tracks with a file are selected.
    #[must_use]
    pub fn select_sql(&self) -> String {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str("track.* FROM track");
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.sql());
        }
        sql.push_str(" WHERE track.location IS NOT NULL AND ");
        sql.push_str(&self.where_sql);
        if let Some(order) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        sql
    }

    /// Bound parameters in placeholder order: join arguments, then WHERE.
    #[must_use]
    pub fn params(&self) -> Vec<Value> {
        self.joins
            .iter()
            .filter_map(|j| j.playlist_id.map(Value::Integer))
            .chain(self.where_args.iter().cloned())
            .collect()
    }

    #[must_use]
    pub fn budget(&self) -> Budget {
        Budget::new(self.max_size, self.max_time)
    }
}

/// Running size and duration allowance for a limited smart playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    size: i64,
    time: i64,
}

impl Budget {
    #[must_use]
    pub fn new(max_size: Option<u64>, max_time: Option<u64>) -> Self {
        let cap = |v: Option<u64>| v.map_or(i64::MAX, |n| i64::try_from(n).unwrap_or(i64::MAX));
        Self {
            size: cap(max_size),
            time: cap(max_time),
        }
    }

    /// Charge one row. Returns false, leaving the budget untouched, if the
    /// row would take either allowance below zero.
    pub fn admit(&mut self, size: Option<i64>, time: Option<i64>) -> bool {
        let size_left = self.size.saturating_sub(size.unwrap_or(0));
        let time_left = self.time.saturating_sub(time.unwrap_or(0));
        if size_left < 0 || time_left < 0 {
            return false;
        }
        self.size = size_left;
        self.time = time_left;
        true
    }
}

/// Compile a rule set on its own, without ordering or limits.
#[must_use]
pub fn compile_ruleset(ruleset: &RuleSet, ctx: &CompileContext) -> CompiledQuery {
    let mut compiler = Compiler::new(ctx);
    let where_sql = compiler.ruleset(ruleset);
    compiler.finish(where_sql)
}

/// Compile a full smart playlist definition.
#[must_use]
pub fn compile_smart(smart: &Smart, ctx: &CompileContext) -> CompiledQuery {
    let mut query = compile_ruleset(&smart.ruleset, ctx);
    if let Some(limit) = &smart.limit {
        query.order_by = Some(order_by(limit, ctx));
        query.limit = limit.max_items();
        query.max_size = limit.max_size();
        query.max_time = limit.max_time();
    }
    query
}

fn order_by(limit: &SmartLimit, ctx: &CompileContext) -> String {
    let column = match limit.field {
        // "Lowest rating" is rating in reverse.
        LimitField::LowestRating => {
            return if limit.descending {
                "track.rating".to_string()
            } else {
                "track.rating DESC".to_string()
            };
        }
        LimitField::Name => "track.sort_name".to_string(),
        LimitField::Album => "track.sort_album".to_string(),
        LimitField::Artist => "track.sort_artist".to_string(),
        LimitField::Genre => "track.sort_genre".to_string(),
        LimitField::DateAdded => "track.date_added".to_string(),
        LimitField::PlayCount => "track.play_count".to_string(),
        LimitField::PlayDate => "track.play_date".to_string(),
        LimitField::Rating => "track.rating".to_string(),
        // Neither has a meaningful direction.
        LimitField::Random => return format!("track.id % {}", ctx.random_modulus),
        LimitField::Other(_) => return "track.id".to_string(),
    };
    if limit.descending {
        format!("{column} DESC")
    } else {
        column
    }
}

struct Compiler<'a> {
    ctx: &'a CompileContext,
    args: Vec<Value>,
    joins: Vec<JoinSpec>,
    warnings: Vec<String>,
}

impl<'a> Compiler<'a> {
    fn new(ctx: &'a CompileContext) -> Self {
        Self {
            ctx,
            args: Vec::new(),
            joins: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn finish(self, where_sql: String) -> CompiledQuery {
        CompiledQuery {
            where_sql,
            where_args: self.args,
            distinct: !self.joins.is_empty(),
            joins: self.joins,
            warnings: self.warnings,
            ..CompiledQuery::default()
        }
    }

    fn ruleset(&mut self, ruleset: &RuleSet) -> String {
        if ruleset.rules.is_empty() {
            return format!("({PASS_PREDICATE})");
        }
        let sep = format!(" {} ", ruleset.conjunction.as_sql());
        let parts: Vec<String> = ruleset.rules.iter().map(|r| self.rule(r)).collect();
        format!("({})", parts.join(&sep))
    }

    fn rule(&mut self, rule: &Rule) -> String {
        match rule {
            Rule::Ruleset(nested) => self.ruleset(nested),
            Rule::String(c) => self.string_rule(c),
            Rule::Int(c) => self.int_rule(c),
            Rule::Boolean(c) => self.boolean_rule(c),
            Rule::Date(c) => self.date_rule(c),
            Rule::MediaKind(c) => self.media_kind_rule(c),
            Rule::Playlist(c) => self.playlist_rule(c),
            Rule::Unknown(_) => PASS_PREDICATE.to_string(),
        }
    }

    fn column<V>(&mut self, c: &Condition<V>) -> Option<&'static str> {
        let column = c.field.column();
        if column.is_none() {
            warn!(field = %c.field, "no column for smart playlist field");
            self.warnings
                .push(format!("field {} has no column; rule never matches", c.field));
        }
        column
    }

    fn null_check(column: &str, negated: bool) -> String {
        if negated {
            format!("{column} IS NOT NULL")
        } else {
            format!("{column} IS NULL")
        }
    }

    fn string_rule(&mut self, c: &Condition<Vec<String>>) -> String {
        let Some(col) = self.column(c) else {
            return INVALID_PREDICATE.to_string();
        };
        let negated = c.sign.is_negated();
        let Some(first) = c.value.first() else {
            self.args.push(Value::Text(String::new()));
            return if negated {
                format!("({col} IS NOT NULL AND {col} != ?)")
            } else {
                format!("({col} IS NULL OR {col} = ?)")
            };
        };
        let pattern = match c.op {
            Operator::Contains => Some(format!("%{first}%")),
            Operator::StartsWith => Some(format!("{first}%")),
            Operator::EndsWith => Some(format!("%{first}")),
            _ => None,
        };
        if let Some(pattern) = pattern {
            self.args.push(Value::Text(pattern));
            let like = if negated { "NOT LIKE" } else { "LIKE" };
            return format!("{col} {like} ?");
        }
        self.compare(col, c.op, negated, &c.value)
    }

    fn int_rule(&mut self, c: &Condition<Vec<i64>>) -> String {
        let Some(col) = self.column(c) else {
            return INVALID_PREDICATE.to_string();
        };
        if c.value.is_empty() {
            return Self::null_check(col, c.sign.is_negated());
        }
        self.compare(col, c.op, c.sign.is_negated(), &c.value)
    }

    fn date_rule(&mut self, c: &Condition<Vec<Timestamp>>) -> String {
        let Some(col) = self.column(c) else {
            return INVALID_PREDICATE.to_string();
        };
        let negated = c.sign.is_negated();
        let Some(first) = c.value.first() else {
            return Self::null_check(col, negated);
        };
        if c.op == Operator::Within {
            let since = self.ctx.now.add_millis(first.millis());
            self.args.push(Value::Integer(since.millis()));
            return if negated {
                format!("{col} < ?")
            } else {
                format!("{col} >= ?")
            };
        }
        let millis: Vec<i64> = c.value.iter().map(|t| t.millis()).collect();
        self.compare(col, c.op, negated, &millis)
    }

    fn boolean_rule(&mut self, c: &Condition<Option<bool>>) -> String {
        let Some(col) = self.column(c) else {
            return INVALID_PREDICATE.to_string();
        };
        let negated = c.sign.is_negated();
        match c.value {
            None => Self::null_check(col, negated),
            Some(b) => {
                self.args.push(Value::Integer(i64::from(b)));
                if negated {
                    format!("{col} != ?")
                } else {
                    format!("{col} = ?")
                }
            }
        }
    }

    fn media_kind_rule(&mut self, c: &Condition<Option<crate::model::MediaKind>>) -> String {
        let col = "track.media_kind";
        let negated = c.sign.is_negated();
        let Some(kind) = c.value else {
            return Self::null_check(col, negated);
        };
        self.args.push(Value::Integer(i64::from(kind.bits())));
        match (c.op, negated) {
            (Operator::Bitwise, false) => format!("({col} & ?) != 0"),
            (Operator::Bitwise, true) => format!("({col} & ?) = 0"),
            (_, false) => format!("{col} = ?"),
            (_, true) => format!("{col} != ?"),
        }
    }

    fn playlist_rule(&mut self, c: &Condition<Option<crate::model::PersistentId>>) -> String {
        let alias = join_alias(self.joins.len());
        let column = format!("{alias}.playlist_id");
        let negated = c.sign.is_negated();
        self.joins.push(JoinSpec {
            alias,
            playlist_id: c.value.map(crate::model::PersistentId::to_db),
        });
        // With a playlist id the join only matches members of that playlist,
        // so membership is a non-null join column. Without one it matches
        // any playlist and the test flips to "in no playlist".
        let in_playlist = c.value.is_some() != negated;
        if in_playlist {
            format!("{column} IS NOT NULL")
        } else {
            format!("{column} IS NULL")
        }
    }

    fn compare<T>(&mut self, col: &str, op: Operator, negated: bool, values: &[T]) -> String
    where
        T: Clone + PartialOrd + Default + Into<Value>,
    {
        let first = values.first().cloned().unwrap_or_default();
        match op {
            Operator::GreaterThan => {
                self.args.push(first.into());
                format!("{col} {} ?", if negated { "<=" } else { ">" })
            }
            Operator::LessThan => {
                self.args.push(first.into());
                format!("{col} {} ?", if negated { ">=" } else { "<" })
            }
            Operator::Between => {
                let second = values.get(1).cloned().unwrap_or_default();
                let (lo, hi) = if first > second {
                    (second, first)
                } else {
                    (first, second)
                };
                self.args.push(lo.into());
                self.args.push(hi.into());
                if negated {
                    format!("({col} < ? OR {col} > ?)")
                } else {
                    format!("({col} >= ? AND {col} <= ?)")
                }
            }
            _ => {
                self.args.push(first.into());
                format!("{col} {} ?", if negated { "!=" } else { "=" })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MediaKind, PersistentId};
    use crate::smart::rules::{Conjunction, Field, LimitCap, LogicSign, UnknownRule};
    use rusqlite::{params_from_iter, Connection};

    const NOW: Timestamp = Timestamp(1_700_000_000_000);

    fn ctx() -> CompileContext {
        CompileContext::with_modulus(NOW, 7)
    }

    fn db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE track (
                id INTEGER PRIMARY KEY, name TEXT, genre TEXT, rating INTEGER,
                date_added INTEGER, media_kind INTEGER, loved INTEGER, location TEXT
            );
            CREATE TABLE playlist_track (playlist_id INTEGER, track_id INTEGER, position INTEGER);
            INSERT INTO track VALUES (1, 'a', 'Rock', 4, 0, 1, 1, '/1');
            INSERT INTO track VALUES (2, 'b', 'Pop Rock', 5, 0, 32, 0, '/2');
            INSERT INTO track VALUES (3, 'c', 'Jazz', 10, 0, 2, NULL, '/3');
            INSERT INTO track VALUES (4, 'd', NULL, 11, 0, 3, NULL, '/4');
            INSERT INTO track VALUES (5, 'e', '', NULL, 0, 1, NULL, '/5');
            INSERT INTO playlist_track VALUES (100, 1, 0), (100, 2, 1), (200, 3, 0), (200, 1, 1);",
        )
        .unwrap();
        conn
    }

    fn matching(conn: &Connection, rules: Vec<Rule>, conjunction: Conjunction) -> Vec<i64> {
        let q = compile_ruleset(&RuleSet::new(conjunction, rules), &ctx());
        let mut sql = q.select_sql().replacen("track.*", "track.id", 1);
        sql.push_str(" ORDER BY track.id");
        let mut stmt = conn.prepare(&sql).unwrap();
        stmt.query_map(params_from_iter(q.params()), |r| r.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<i64>>>()
            .unwrap()
    }

    fn one(conn: &Connection, rule: Rule) -> Vec<i64> {
        matching(conn, vec![rule], Conjunction::And)
    }

    fn int(op: Operator, sign: LogicSign, values: Vec<i64>) -> Rule {
        Rule::Int(Condition::new(Field::Rating, sign, op, values))
    }

    fn string(op: Operator, sign: LogicSign, value: &str) -> Rule {
        Rule::String(Condition::new(Field::Genre, sign, op, vec![value.to_string()]))
    }

    #[test]
    fn test_genre_is_rock() {
        let rule = string(Operator::Is, LogicSign::StrPos, "Rock");
        let q = compile_ruleset(&RuleSet::new(Conjunction::And, vec![rule]), &ctx());
        assert_eq!(q.where_sql, "(track.genre = ?)");
        assert_eq!(q.where_args, vec![Value::Text("Rock".into())]);
        assert!(q.joins.is_empty());
        assert!(!q.distinct);
    }

    #[test]
    fn test_int_operator_matrix() {
        let conn = db();
        let pos = LogicSign::Pos;
        let neg = LogicSign::Neg;
        assert_eq!(one(&conn, int(Operator::Between, pos, vec![10, 5])), vec![2, 3]);
        assert_eq!(one(&conn, int(Operator::Between, pos, vec![5, 10])), vec![2, 3]);
        assert_eq!(one(&conn, int(Operator::Between, neg, vec![5, 10])), vec![1, 4]);
        assert_eq!(one(&conn, int(Operator::GreaterThan, pos, vec![5])), vec![3, 4]);
        assert_eq!(one(&conn, int(Operator::GreaterThan, neg, vec![5])), vec![1, 2]);
        assert_eq!(one(&conn, int(Operator::LessThan, pos, vec![10])), vec![1, 2]);
        assert_eq!(one(&conn, int(Operator::LessThan, neg, vec![10])), vec![3, 4]);
        assert_eq!(one(&conn, int(Operator::Is, pos, vec![5])), vec![2]);
        assert_eq!(one(&conn, int(Operator::Is, neg, vec![5])), vec![1, 3, 4]);
        assert_eq!(one(&conn, int(Operator::Is, pos, vec![])), vec![5]);
        assert_eq!(one(&conn, int(Operator::Is, neg, vec![])), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_string_operator_matrix() {
        let conn = db();
        let pos = LogicSign::StrPos;
        let neg = LogicSign::StrNeg;
        assert_eq!(one(&conn, string(Operator::Contains, pos, "Rock")), vec![1, 2]);
        assert_eq!(one(&conn, string(Operator::Contains, neg, "Rock")), vec![3, 5]);
        assert_eq!(one(&conn, string(Operator::StartsWith, pos, "Pop")), vec![2]);
        assert_eq!(one(&conn, string(Operator::EndsWith, pos, "zz")), vec![3]);
        assert_eq!(one(&conn, string(Operator::Is, neg, "Rock")), vec![2, 3, 5]);
        let empty = Rule::String(Condition::new(Field::Genre, pos, Operator::Is, Vec::new()));
        assert_eq!(one(&conn, empty), vec![4, 5]);
        let not_empty = Rule::String(Condition::new(Field::Genre, neg, Operator::Is, Vec::new()));
        assert_eq!(one(&conn, not_empty), vec![1, 2, 3]);
    }

    #[test]
    fn test_negated_prefix_and_suffix() {
        let conn = db();
        let neg = LogicSign::StrNeg;
        // NULL genres match neither LIKE nor NOT LIKE.
        assert_eq!(one(&conn, string(Operator::StartsWith, neg, "Pop")), vec![1, 3, 5]);
        assert_eq!(one(&conn, string(Operator::EndsWith, neg, "zz")), vec![1, 2, 5]);
        assert_eq!(one(&conn, string(Operator::EndsWith, neg, "Rock")), vec![3, 5]);
    }

    #[test]
    fn test_date_comparisons() {
        let conn = db();
        conn.execute_batch("UPDATE track SET date_added = id * 1000;").unwrap();
        let date = |op, sign, values: &[i64]| {
            Rule::Date(Condition::new(
                Field::DateAdded,
                sign,
                op,
                values.iter().copied().map(Timestamp).collect(),
            ))
        };
        let pos = LogicSign::Pos;
        let neg = LogicSign::Neg;
        assert_eq!(one(&conn, date(Operator::Between, pos, &[4000, 2000])), vec![2, 3, 4]);
        assert_eq!(one(&conn, date(Operator::Between, neg, &[2000, 4000])), vec![1, 5]);
        assert_eq!(one(&conn, date(Operator::GreaterThan, pos, &[3000])), vec![4, 5]);
        assert_eq!(one(&conn, date(Operator::GreaterThan, neg, &[3000])), vec![1, 2, 3]);
        assert_eq!(one(&conn, date(Operator::LessThan, pos, &[3000])), vec![1, 2]);
        assert_eq!(one(&conn, date(Operator::LessThan, neg, &[3000])), vec![3, 4, 5]);
        assert_eq!(one(&conn, date(Operator::Is, pos, &[])), Vec::<i64>::new());
    }

    #[test]
    fn test_boolean_and_media_kind() {
        let conn = db();
        let loved = |sign, value| Rule::Boolean(Condition::new(Field::Loved, sign, Operator::Is, value));
        assert_eq!(one(&conn, loved(LogicSign::Pos, Some(true))), vec![1]);
        assert_eq!(one(&conn, loved(LogicSign::Pos, None)), vec![3, 4, 5]);
        assert_eq!(one(&conn, loved(LogicSign::Neg, None)), vec![1, 2]);

        let kind = |sign, op| Rule::MediaKind(Condition::new(Field::MediaKind, sign, op, Some(MediaKind::MOVIE)));
        assert_eq!(one(&conn, kind(LogicSign::Pos, Operator::Bitwise)), vec![3, 4]);
        assert_eq!(one(&conn, kind(LogicSign::Neg, Operator::Bitwise)), vec![1, 2, 5]);
        assert_eq!(one(&conn, kind(LogicSign::Pos, Operator::Is)), vec![3]);
    }

    #[test]
    fn test_within_uses_context_time() {
        let conn = db();
        conn.execute_batch(&format!(
            "UPDATE track SET date_added = {} WHERE id IN (1, 2);
             UPDATE track SET date_added = {} WHERE id IN (3, 4, 5);",
            NOW.millis() - 1000,
            NOW.millis() - 10 * 86_400_000
        ))
        .unwrap();
        let within = |sign| {
            Rule::Date(Condition::new(
                Field::DateAdded,
                sign,
                Operator::Within,
                vec![Timestamp(-7 * 86_400_000)],
            ))
        };
        assert_eq!(one(&conn, within(LogicSign::Pos)), vec![1, 2]);
        assert_eq!(one(&conn, within(LogicSign::Neg)), vec![3, 4, 5]);
    }

    #[test]
    fn test_playlist_joins_under_or() {
        let conn = db();
        let member = |id: u64, sign| {
            Rule::Playlist(Condition::new(
                Field::PlaylistPersistentId,
                sign,
                Operator::Is,
                Some(PersistentId(id)),
            ))
        };
        let rules = vec![member(100, LogicSign::Pos), member(200, LogicSign::Pos)];
        assert_eq!(matching(&conn, rules.clone(), Conjunction::Or), vec![1, 2, 3]);
        assert_eq!(matching(&conn, rules, Conjunction::And), vec![1]);
        assert_eq!(
            matching(&conn, vec![member(100, LogicSign::Neg)], Conjunction::And),
            vec![3, 4, 5]
        );

        let q = compile_ruleset(
            &RuleSet::new(Conjunction::Or, vec![member(100, LogicSign::Pos), member(200, LogicSign::Pos)]),
            &ctx(),
        );
        assert!(q.distinct);
        assert_eq!(q.joins[0].alias, "pta");
        assert_eq!(q.joins[1].alias, "ptb");
        assert_eq!(q.params(), vec![Value::Integer(100), Value::Integer(200)]);
    }

    #[test]
    fn test_negated_playlist_under_or() {
        let conn = db();
        let member = |id: u64, sign| {
            Rule::Playlist(Condition::new(
                Field::PlaylistPersistentId,
                sign,
                Operator::Is,
                Some(PersistentId(id)),
            ))
        };
        let rules = vec![member(100, LogicSign::Neg), member(200, LogicSign::Pos)];
        let q = compile_ruleset(&RuleSet::new(Conjunction::Or, rules.clone()), &ctx());
        assert_eq!(q.where_sql, "(pta.playlist_id IS NULL OR ptb.playlist_id IS NOT NULL)");
        assert_eq!(q.joins.len(), 2);
        assert!(q.distinct);

        assert_eq!(matching(&conn, rules.clone(), Conjunction::Or), vec![1, 3, 4, 5]);
        assert_eq!(matching(&conn, rules, Conjunction::And), vec![3]);
    }

    #[test]
    fn test_playlist_without_id() {
        let conn = db();
        let any = Rule::Playlist(Condition::new(
            Field::PlaylistPersistentId,
            LogicSign::Pos,
            Operator::Is,
            None,
        ));
        assert_eq!(one(&conn, any), vec![4, 5]);
    }

    #[test]
    fn test_nested_ruleset_and_unknown() {
        let conn = db();
        let nested = Rule::Ruleset(RuleSet::new(
            Conjunction::Or,
            vec![
                string(Operator::Is, LogicSign::StrPos, "Jazz"),
                int(Operator::Is, LogicSign::Pos, vec![4]),
            ],
        ));
        let unknown = Rule::Unknown(UnknownRule {
            field: Field::CloudStatus,
            sign: LogicSign::Pos,
            op: Operator::Is,
        });
        assert_eq!(matching(&conn, vec![nested, unknown], Conjunction::And), vec![1, 3]);
    }

    #[test]
    fn test_field_without_column_never_matches() {
        let conn = db();
        let rule = Rule::String(Condition::new(
            Field::Description,
            LogicSign::StrPos,
            Operator::Contains,
            vec!["x".into()],
        ));
        let q = compile_ruleset(&RuleSet::new(Conjunction::And, vec![rule.clone()]), &ctx());
        assert_eq!(q.where_sql, "(0 = 1)");
        assert_eq!(q.warnings.len(), 1);
        assert!(one(&conn, rule).is_empty());
    }

    #[test]
    fn test_join_alias_sequence() {
        assert_eq!(join_alias(0), "pta");
        assert_eq!(join_alias(25), "ptz");
        assert_eq!(join_alias(26), "ptaa");
        assert_eq!(join_alias(27), "ptab");
        assert_eq!(join_alias(52), "ptba");
    }

    #[test]
    fn test_limit_order_and_sql() {
        let smart = Smart {
            ruleset: RuleSet::new(Conjunction::And, vec![int(Operator::GreaterThan, LogicSign::Pos, vec![1])]),
            limit: Some(SmartLimit {
                cap: LimitCap::Items(25),
                field: LimitField::Rating,
                descending: true,
            }),
            ..Default::default()
        };
        let q = compile_smart(&smart, &ctx());
        assert_eq!(
            q.select_sql(),
            "SELECT track.* FROM track WHERE track.location IS NOT NULL AND (track.rating > ?) ORDER BY track.rating DESC LIMIT 25"
        );

        let mut random = smart.clone();
        random.limit = Some(SmartLimit {
            cap: LimitCap::Size(1000),
            field: LimitField::Random,
            descending: false,
        });
        let q = compile_smart(&random, &ctx());
        assert_eq!(q.order_by.as_deref(), Some("track.id % 7"));
        assert_eq!(q.limit, None);
        assert_eq!(q.max_size, Some(1000));

        for field in [LimitField::Random, LimitField::Other(0x99)] {
            let mut descending = random.clone();
            descending.limit = Some(SmartLimit {
                cap: LimitCap::Items(5),
                field,
                descending: true,
            });
            let order = compile_smart(&descending, &ctx()).order_by.unwrap();
            assert!(!order.ends_with("DESC"), "{order}");
        }

        let mut lowest = smart;
        lowest.limit = Some(SmartLimit {
            cap: LimitCap::Items(1),
            field: LimitField::LowestRating,
            descending: false,
        });
        assert_eq!(
            compile_smart(&lowest, &ctx()).order_by.as_deref(),
            Some("track.rating DESC")
        );
    }

    #[test]
    fn test_budget_stops_before_overflow() {
        let mut budget = Budget::new(Some(100), None);
        assert!(budget.admit(Some(60), Some(5)));
        assert!(budget.admit(Some(40), None));
        assert!(!budget.admit(Some(1), None));

        let mut by_time = Budget::new(None, Some(10));
        assert!(!by_time.admit(None, Some(11)));
        assert!(by_time.admit(None, Some(10)));
    }
}
