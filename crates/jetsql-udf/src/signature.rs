//! Argument signatures and the type-indexed lookup table.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use jetsql_ir::{display_types, LogicalType};

use crate::UdfError;

/// One overload's argument signature.
///
/// `variadic` marks the last declared position as matching zero or more
/// trailing actual arguments. Positions in `always_list` are forced to list
/// semantics regardless of the declared element type (aggregate inputs);
/// list-wrapping at such positions is implicit at the call site, not a
/// separate overload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    arg_types: Vec<LogicalType>,
    variadic: bool,
    always_list: BTreeSet<usize>,
}

impl Signature {
    pub fn new(arg_types: Vec<LogicalType>) -> Self {
        Self { arg_types, variadic: false, always_list: BTreeSet::new() }
    }

    pub fn variadic(arg_types: Vec<LogicalType>) -> Self {
        Self { arg_types, variadic: true, always_list: BTreeSet::new() }
    }

    pub fn with_always_list(mut self, idx: usize) -> Self {
        self.always_list.insert(idx);
        self
    }

    pub fn arg_types(&self) -> &[LogicalType] {
        &self.arg_types
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn always_list(&self) -> &BTreeSet<usize> {
        &self.always_list
    }

    /// Number of declared positions (the variadic tail counts as one).
    pub fn arity(&self) -> usize {
        self.arg_types.len()
    }

    /// Duplicate detection is structural over the type sequence plus the
    /// variadic marker; the list flags do not create distinct overloads.
    fn same_key(&self, other: &Signature) -> bool {
        self.variadic == other.variadic && self.arg_types == other.arg_types
    }

    /// Only unflagged, non-variadic signatures participate in the exact
    /// fast path; a flagged position changes the position's semantics even
    /// when the spelled types coincide.
    fn is_exact_key(&self) -> bool {
        !self.variadic && self.always_list.is_empty()
    }

    fn position_matches(&self, idx: usize, declared: &LogicalType, actual: &LogicalType) -> bool {
        if self.always_list.contains(&idx) {
            list_coerce_matches(declared, actual)
        } else {
            declared == actual
        }
    }

    /// Whether this signature matches the actual argument types, allowing
    /// variadic tails and flagged list coercion. Exact equality is handled
    /// separately by the table.
    pub(crate) fn matches(&self, actual: &[LogicalType]) -> bool {
        if self.variadic {
            let Some(fixed) = self.arg_types.len().checked_sub(1) else {
                return actual.is_empty();
            };
            if actual.len() < fixed {
                return false;
            }
            let prefix_ok = (0..fixed)
                .all(|i| self.position_matches(i, &self.arg_types[i], &actual[i]));
            prefix_ok
                && actual[fixed..]
                    .iter()
                    .all(|a| self.position_matches(fixed, &self.arg_types[fixed], a))
        } else {
            self.arg_types.len() == actual.len()
                && (0..actual.len())
                    .all(|i| self.position_matches(i, &self.arg_types[i], &actual[i]))
        }
    }
}

/// A flagged position accepts the declared type, its element type, or the
/// list of a scalar declared type: both sides are compared element-wise.
fn list_coerce_matches(declared: &LogicalType, actual: &LogicalType) -> bool {
    let d = declared.element().unwrap_or(declared);
    let a = actual.element().unwrap_or(actual);
    d == a
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, ty) in self.arg_types.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{ty}")?;
            if self.variadic && i + 1 == self.arg_types.len() {
                write!(f, "...")?;
            }
        }
        write!(f, ")")
    }
}

/// Argument-type-indexed mapping from [`Signature`] to a registered value,
/// one-to-one, with best-match lookup.
#[derive(Debug, Clone, Default)]
pub struct SignatureTable<T> {
    entries: Vec<(Signature, T)>,
    exact: HashMap<Vec<LogicalType>, usize>,
}

impl<T> SignatureTable<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new(), exact: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Signature, &T)> {
        self.entries.iter().map(|(s, v)| (s, v))
    }

    /// Register one signature. Duplicates are rejected without mutating the
    /// table, so the first registration stays retrievable.
    pub fn insert(&mut self, name: &str, sig: Signature, value: T) -> Result<(), UdfError> {
        if self.entries.iter().any(|(s, _)| s.same_key(&sig)) {
            return Err(UdfError::DuplicateSignature {
                name: name.to_string(),
                signature: sig.to_string(),
            });
        }
        if sig.is_exact_key() {
            self.exact.insert(sig.arg_types.clone(), self.entries.len());
        }
        self.entries.push((sig, value));
        Ok(())
    }

    /// Best-match lookup.
    ///
    /// An exact arity+type match wins immediately. Otherwise variadic and
    /// list-coerced signatures are scanned; a single survivor is returned,
    /// several survivors are an ambiguity error, never a silent pick.
    pub fn lookup(&self, name: &str, actual: &[LogicalType]) -> Result<&T, UdfError> {
        if let Some(&idx) = self.exact.get(actual) {
            return Ok(&self.entries[idx].1);
        }

        let candidates: Vec<&(Signature, T)> = self
            .entries
            .iter()
            .filter(|(s, _)| !s.is_exact_key() && s.matches(actual))
            .collect();

        match candidates.as_slice() {
            [single] => Ok(&single.1),
            [] => Err(UdfError::NoMatchingSignature {
                name: name.to_string(),
                actual: display_types(actual),
                registered: self.render_signatures(),
            }),
            many => Err(UdfError::AmbiguousSignature {
                name: name.to_string(),
                actual: display_types(actual),
                candidates: many
                    .iter()
                    .map(|(s, _)| s.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    fn render_signatures(&self) -> String {
        self.entries
            .iter()
            .map(|(s, _)| s.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LogicalType::*;

    #[test]
    fn test_exact_match_wins() {
        let mut table = SignatureTable::new();
        table.insert("f", Signature::new(vec![Int32, Int32]), 1).unwrap();
        table.insert("f", Signature::variadic(vec![Int32, Str]), 2).unwrap();

        assert_eq!(*table.lookup("f", &[Int32, Int32]).unwrap(), 1);
    }

    #[test]
    fn test_variadic_matching_matrix() {
        let mut table = SignatureTable::new();
        table.insert("f", Signature::variadic(vec![Int32, Str]), 7).unwrap();

        // zero, one and two trailing arguments
        assert_eq!(*table.lookup("f", &[Int32]).unwrap(), 7);
        assert_eq!(*table.lookup("f", &[Int32, Str]).unwrap(), 7);
        assert_eq!(*table.lookup("f", &[Int32, Str, Str]).unwrap(), 7);

        // wrong order does not match
        assert!(matches!(
            table.lookup("f", &[Str, Int32]),
            Err(UdfError::NoMatchingSignature { .. })
        ));
        // wrong tail type does not match
        assert!(matches!(
            table.lookup("f", &[Int32, Str, Int32]),
            Err(UdfError::NoMatchingSignature { .. })
        ));
    }

    #[test]
    fn test_variadic_list_tail() {
        let mut table = SignatureTable::new();
        table
            .insert("f", Signature::variadic(vec![LogicalType::list_of(Int32)]), 1)
            .unwrap();
        assert_eq!(
            *table
                .lookup("f", &[LogicalType::list_of(Int32), LogicalType::list_of(Int32)])
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_duplicate_rejected_first_kept() {
        let mut table = SignatureTable::new();
        table.insert("f", Signature::new(vec![Int64]), 1).unwrap();
        let err = table.insert("f", Signature::new(vec![Int64]), 2).unwrap_err();
        assert!(matches!(err, UdfError::DuplicateSignature { .. }));
        assert_eq!(*table.lookup("f", &[Int64]).unwrap(), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_list_coercion_on_flagged_position() {
        let mut table = SignatureTable::new();
        let sig = Signature::new(vec![LogicalType::list_of(Double)]).with_always_list(0);
        table.insert("sum", sig, 3).unwrap();

        // explicit list and implicitly wrapped scalar both match
        assert_eq!(*table.lookup("sum", &[LogicalType::list_of(Double)]).unwrap(), 3);
        assert_eq!(*table.lookup("sum", &[Double]).unwrap(), 3);
        assert!(table.lookup("sum", &[Int32]).is_err());
    }

    #[test]
    fn test_two_coerced_candidates_are_ambiguous() {
        let mut table = SignatureTable::new();
        table
            .insert(
                "f",
                Signature::new(vec![Int32, LogicalType::list_of(Int32)]).with_always_list(1),
                1,
            )
            .unwrap();
        table
            .insert("f", Signature::new(vec![Int32, Int32]).with_always_list(1), 2)
            .unwrap();

        let err = table.lookup("f", &[Int32, Int32]).unwrap_err();
        assert!(matches!(err, UdfError::AmbiguousSignature { .. }));
    }

    #[test]
    fn test_no_match_lists_registered() {
        let mut table = SignatureTable::new();
        table.insert("f", Signature::new(vec![Int32]), 1).unwrap();
        let err = table.lookup("f", &[Str]).unwrap_err();
        match err {
            UdfError::NoMatchingSignature { registered, .. } => {
                assert!(registered.contains("int32"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_signature_display() {
        let sig = Signature::variadic(vec![Int32, Str]);
        assert_eq!(sig.to_string(), "(int32, string...)");
    }
}
