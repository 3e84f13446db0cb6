use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! newtype_string {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Return the inner string as a str slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    PoolId,
    "Identifier of the user pool the directory queries run against."
);
newtype_string!(
    SubjectId,
    "Stable directory key (`sub`) of an identity, distinct from its username."
);
newtype_string!(Username, "Directory-assigned handle of an identity.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_from_str() {
        let pool = PoolId::from("us-east-1_AbCdEf");
        assert_eq!(pool.as_str(), "us-east-1_AbCdEf");
        assert_eq!(&*pool, "us-east-1_AbCdEf");
    }

    #[test]
    fn newtype_display() {
        let subject = SubjectId::from("u-1".to_string());
        assert_eq!(subject.to_string(), "u-1");
    }

    #[test]
    fn newtype_serializes_transparently() {
        let username = Username::new("alice");
        let json = serde_json::to_string(&username).unwrap();
        assert_eq!(json, "\"alice\"");
    }
}
