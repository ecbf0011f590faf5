// Code generated by aliasgen. DO NOT EDIT.

use super::*;
impl ::serde::Serialize for Session {
    fn serialize<S>(&self, serializer: S) -> ::core::result::Result<S::Ok, S::Error>
    where
        S: ::serde::Serializer,
    {
        #[derive(::serde::Serialize)]
        #[serde(remote = "Session")]
        #[allow(dead_code)]
        struct Alias {
            id: u64,
            #[serde(rename = "userName")]
            user_name: String,
            #[serde(skip)]
            ttl: Duration,
        }
        #[derive(::serde::Serialize)]
        struct Wire<'a> {
            #[serde(flatten, with = "Alias")]
            alias: &'a Session,
            #[serde(rename = "ttlSecs")]
            alias_ttl: u64,
        }
        ::serde::Serialize::serialize(
            &Wire {
                alias: self,
                alias_ttl: self.ttl.as_secs(),
            },
            serializer,
        )
    }
}
impl<'de> ::serde::Deserialize<'de> for Session {
    fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
    where
        D: ::serde::Deserializer<'de>,
    {
        #[derive(::serde::Deserialize)]
        #[serde(remote = "Session")]
        #[allow(dead_code)]
        struct Alias {
            id: u64,
            #[serde(rename = "userName")]
            user_name: String,
            #[serde(skip)]
            ttl: Duration,
        }
        #[derive(::serde::Deserialize)]
        struct Wire {
            #[serde(flatten, with = "Alias")]
            alias: Session,
            #[serde(rename = "ttlSecs")]
            alias_ttl: u64,
        }
        let wire = <Wire as ::serde::Deserialize>::deserialize(deserializer)?;
        let mut v = wire.alias;
        v.ttl = Duration::from_secs(wire.alias_ttl);
        ::core::result::Result::Ok(v)
    }
}
