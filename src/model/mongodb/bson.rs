use std::fmt::{Display, Formatter};
use std::{ops::Deref, str::FromStr};

use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};

/// A unique document identifier, stored natively as a MongoDB `ObjectId`.
///
/// Outside the database (API bodies, URIs) IDs travel as 24-character hex
/// strings; see [`serde_hex`] and [`serde_hex_seq`].
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(ObjectId);

impl Id {
    /// Generate a fresh ID. `ObjectId`s generated by one process sort in creation order.
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    /// A filter document matching this ID.
    pub fn as_doc(&self) -> Document {
        doc! { "_id": self.0 }
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Id {
    type Target = ObjectId;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

impl FromStr for Id {
    type Err = mongodb::bson::oid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse::<ObjectId>()?))
    }
}

impl From<ObjectId> for Id {
    fn from(id: ObjectId) -> Self {
        Self(id)
    }
}

impl From<Id> for Bson {
    fn from(id: Id) -> Self {
        Bson::ObjectId(id.0)
    }
}

impl<'a> FromParam<'a> for Id {
    type Error = mongodb::bson::oid::Error;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse::<Id>()
    }
}

impl UriDisplay<Path> for Id {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(self.to_string())
    }
}

impl_from_uri_param_identity!([Path] Id);

/// De/serialize a single [`Id`] as a hex string.
pub mod serde_hex {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::Id;

    pub fn serialize<S: Serializer>(id: &Id, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&id.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Id, D::Error> {
        let hex = String::deserialize(deserializer)?;
        hex.parse().map_err(D::Error::custom)
    }
}

/// De/serialize a sequence of [`Id`]s as hex strings, preserving order.
pub mod serde_hex_seq {
    use serde::{de::Error, ser::SerializeSeq, Deserialize, Deserializer, Serializer};

    use super::Id;

    pub fn serialize<'a, S, I>(ids: I, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        I: IntoIterator<Item = &'a Id>,
    {
        let mut seq = serializer.serialize_seq(None)?;
        for id in ids {
            seq.serialize_element(&id.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Id>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .into_iter()
            .map(|hex| hex.parse().map_err(D::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "serde_hex")]
        id: Id,
        #[serde(with = "serde_hex_seq")]
        others: Vec<Id>,
    }

    #[test]
    fn ids_travel_as_hex() {
        let wrapper = Wrapper {
            id: Id::new(),
            others: vec![Id::new(), Id::new()],
        };
        let json = serde_json::to_value(&wrapper).unwrap();
        assert_eq!(json["id"], wrapper.id.to_string());
        assert_eq!(json["others"][1], wrapper.others[1].to_string());
        assert_eq!(wrapper, serde_json::from_value(json).unwrap());
    }

    #[test]
    fn malformed_hex_is_rejected() {
        assert!("not-an-object-id".parse::<Id>().is_err());
        let result = serde_json::from_str::<Wrapper>(r#"{"id": "1234", "others": []}"#);
        assert!(result.is_err());
    }

    #[test]
    fn fresh_ids_sort_in_creation_order() {
        let first = Id::new();
        let second = Id::new();
        assert!(first < second);
    }
}
