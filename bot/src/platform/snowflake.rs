//! Serde helpers for Discord snowflakes.
//!
//! Discord sends ids as JSON strings so JavaScript clients don't lose
//! precision. The relay may send either form, so both are accepted.

use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Raw {
    Str(String),
    Num(u64),
}

fn parse<E: serde::de::Error>(raw: Raw) -> Result<u64, E> {
    match raw {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s
            .parse()
            .map_err(|_| E::custom(format!("invalid snowflake: {s:?}"))),
    }
}

pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    parse(Raw::deserialize(d)?)
}

pub fn serialize<S: Serializer>(id: &u64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&id.to_string())
}

pub mod option {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{Raw, parse};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        match Option::<Raw>::deserialize(d)? {
            Some(raw) => parse(raw).map(Some),
            None => Ok(None),
        }
    }

    pub fn serialize<S: Serializer>(id: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => s.serialize_str(&id.to_string()),
            None => s.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ids {
        #[serde(with = "super")]
        id: u64,
        #[serde(default, with = "super::option")]
        guild_id: Option<u64>,
    }

    #[test]
    fn test_accepts_string_and_number() {
        let a: Ids = serde_json::from_str(r#"{"id":"175928847299117063"}"#).unwrap();
        assert_eq!(a.id, 175928847299117063);
        assert_eq!(a.guild_id, None);

        let b: Ids = serde_json::from_str(r#"{"id":7,"guild_id":"9"}"#).unwrap();
        assert_eq!(b.id, 7);
        assert_eq!(b.guild_id, Some(9));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_str::<Ids>(r#"{"id":"abc"}"#).is_err());
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_value(Ids {
            id: 12,
            guild_id: None,
        })
        .unwrap();
        assert_eq!(json["id"], "12");
        assert!(json["guild_id"].is_null());
    }
}
