use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use crate::spatial::Located;

/// Upstream identifiers arrive as JSON numbers or strings depending on the source.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Integer(i64),
}

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(from = "RawId")]
        pub struct $name(String);

        impl $name {
            pub fn new(str: &str) -> Self {
                Self(str.trim().trim_matches('"').trim().to_owned())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<RawId> for $name {
            fn from(raw: RawId) -> Self {
                match raw {
                    RawId::Text(s) => Self::new(&s),
                    RawId::Integer(n) => Self(n.to_string()),
                }
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(StopId);
string_id!(RouteId);

/// A stop that transit routes call at, as seen by the route matcher.
pub trait ServedStop: Located {
    fn id(&self) -> &StopId;

    fn name(&self) -> &str;

    fn route_ids(&self) -> BTreeSet<&RouteId>;

    /// Stops reachable from here on `route`, when the source data records them.
    fn destinations(&self, _route: &RouteId) -> Option<&[StopId]> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_normalise_quotes_and_whitespace() {
        assert_eq!(StopId::new(" \"87\" "), StopId::new("87"));
        assert_eq!(RouteId::from("A").as_str(), "A");
    }

    #[test]
    fn test_ids_deserialise_from_numbers_and_strings() {
        let ids: Vec<StopId> = serde_json::from_str(r#"[87, "88", " 89 "]"#).unwrap();
        assert_eq!(ids, vec![StopId::new("87"), StopId::new("88"), StopId::new("89")]);

        let out = serde_json::to_string(&ids[0]).unwrap();
        assert_eq!(out, r#""87""#);
    }
}
