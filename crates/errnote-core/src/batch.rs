//! Aggregating independent failures into one error value.
//!
//! [`batch`] joins zero or more optional errors: nothing left yields no
//! error, a single survivor is returned as itself, and two or more become
//! a [`Batch`]. [`unbatch`] recovers the member sequence.

use std::fmt;

use crate::error::Error;

/// An ordered aggregate of two or more independent failures.
#[derive(Debug)]
pub struct Batch {
    errors: Vec<Error>,
}

impl Batch {
    /// The member errors, in join order.
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch of {} errors:", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            write!(f, "\n  [{i}] {err}")?;
        }
        Ok(())
    }
}

/// Joins errors, dropping the absent ones. Zero survivors collapse to
/// `None`, one survivor is returned unwrapped, two or more form a
/// [`Batch`].
pub fn batch(errors: impl IntoIterator<Item = Option<Error>>) -> Option<Error> {
    let mut survivors: Vec<Error> = errors.into_iter().flatten().collect();
    match survivors.len() {
        0 => None,
        1 => Some(survivors.remove(0)),
        _ => Some(Error::Batch(Batch { errors: survivors })),
    }
}

/// The member sequence when `err` is in fact a batch.
pub fn unbatch(err: &Error) -> Option<&[Error]> {
    match err {
        Error::Batch(b) => Some(b.errors()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_none() {
        assert!(batch([]).is_none());
        assert!(batch([None, None]).is_none());
    }

    #[test]
    fn single_survivor_is_returned_unwrapped() {
        let joined = batch([None, Some(Error::msg("only")), None]).unwrap();
        assert!(matches!(joined, Error::Opaque(_)));
        assert_eq!(joined.to_string(), "only");
    }

    #[test]
    fn two_or_more_survivors_form_a_batch() {
        let joined = batch([
            Some(Error::msg("first")),
            None,
            Some(Error::msg("second")),
        ])
        .unwrap();
        let members = unbatch(&joined).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].to_string(), "first");
        assert_eq!(members[1].to_string(), "second");
    }

    #[test]
    fn unbatch_rejects_non_batches() {
        assert!(unbatch(&Error::msg("alone")).is_none());
    }

    #[test]
    fn display_is_header_plus_indexed_lines() {
        let joined = batch([Some(Error::msg("a")), Some(Error::msg("b"))]).unwrap();
        assert_eq!(joined.to_string(), "batch of 2 errors:\n  [0] a\n  [1] b");
    }

    #[test]
    fn batch_json_is_array_of_members() {
        let joined = batch([Some(Error::msg("a")), Some(Error::msg("b"))]).unwrap();
        let value = serde_json::to_value(&joined).unwrap();
        assert_eq!(value, serde_json::json!(["a", "b"]));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // unbatch(batch(xs)) sees exactly the non-nil subset, in order.
            #[test]
            fn round_trip_preserves_non_nil_subset(
                members in proptest::collection::vec(
                    proptest::option::of("[a-z]{1,8}"),
                    0..8,
                )
            ) {
                let expected: Vec<String> =
                    members.iter().flatten().cloned().collect();
                let joined = batch(
                    members
                        .iter()
                        .map(|m| m.as_ref().map(|text| Error::msg(text))),
                );
                match expected.len() {
                    0 => prop_assert!(joined.is_none()),
                    1 => {
                        let err = joined.unwrap();
                        prop_assert!(unbatch(&err).is_none());
                        prop_assert_eq!(err.to_string(), expected[0].clone());
                    }
                    n => {
                        let err = joined.unwrap();
                        let got = unbatch(&err).unwrap();
                        prop_assert_eq!(got.len(), n);
                        for (g, e) in got.iter().zip(&expected) {
                            prop_assert_eq!(&g.to_string(), e);
                        }
                    }
                }
            }
        }
    }
}
