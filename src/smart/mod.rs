//! Smart playlist definitions.
//!
//! - [`rules`]: the typed rule tree and its JSON form
//! - [`codec`]: the binary info/criteria format used by the library file
//! - [`compile`]: translation of a rule tree into a SQLite query

pub mod codec;
pub mod compile;
pub mod rules;

pub use codec::{decode_smart, encode_smart, from_blob, to_blob, DecodeError, SmartInfo};
pub use compile::{compile_ruleset, compile_smart, Budget, CompileContext, CompiledQuery, JoinSpec};
pub use rules::{
    Condition, Conjunction, Field, LimitCap, LimitField, LogicSign, Operator, Rule, RuleSet, Smart,
    SmartLimit, UnknownRule,
};
