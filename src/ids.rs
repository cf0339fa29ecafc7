//! Newtype IDs for type-safe identification of stored entities.
//!
//! Using newtypes prevents accidentally mixing up different kinds of IDs
//! (e.g., passing a label-type ID where an example ID is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Creates a new ID from the raw storage value.
            #[inline]
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the underlying storage value.
            #[inline]
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

id_newtype!(
    /// A unique identifier for a project.
    ProjectId
);

id_newtype!(
    /// A unique identifier for an example (one unit of annotatable content).
    ExampleId
);

id_newtype!(
    /// A unique identifier for a label type within a project.
    LabelTypeId
);

id_newtype!(
    /// A unique identifier for a project member.
    UserId
);

id_newtype!(
    /// A unique identifier for a background ingestion job.
    JobId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_do_not_compare_across_kinds() {
        // Compile-time property: these are distinct types. At runtime we
        // just check the accessors and formatting.
        let example = ExampleId::new(7);
        assert_eq!(example.as_i64(), 7);
        assert_eq!(format!("{}", example), "7");
        assert_eq!(format!("{:?}", example), "ExampleId(7)");
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = LabelTypeId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let back: LabelTypeId = serde_json::from_str("42").unwrap();
        assert_eq!(back, id);
    }
}
