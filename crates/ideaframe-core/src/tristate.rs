//! A three-state optional field for PATCH payloads.
//!
//! `Option<Option<T>>` and friends collapse "key missing" and "key is null"
//! unless every use site remembers extra serde attributes. [`TriState`] makes
//! the three wire states explicit, and keeps a fourth for strings that are
//! present but do not parse so that the rejection can name the field.

use std::{fmt, marker::PhantomData, str::FromStr};

use serde::{
  Deserialize, Deserializer, Serialize, Serializer,
  de::{self, Visitor},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriState<T> {
  /// The key was not present in the payload: leave the field untouched.
  Absent,
  /// The key was present with JSON `null`: clear the field.
  Null,
  /// The key was present with a well-formed value: set the field.
  Value(T),
  /// The key was present with a string that does not parse as `T`.
  Invalid(String),
}

impl<T> Default for TriState<T> {
  fn default() -> Self { Self::Absent }
}

impl<T> TriState<T> {
  pub fn is_absent(&self) -> bool { matches!(self, Self::Absent) }

  pub fn is_present(&self) -> bool { !self.is_absent() }

  pub fn is_null(&self) -> bool { matches!(self, Self::Null) }

  /// `false` only for [`TriState::Invalid`]. An absent field is vacuously
  /// valid.
  pub fn is_valid(&self) -> bool { !matches!(self, Self::Invalid(_)) }

  pub fn value(&self) -> Option<&T> {
    match self {
      Self::Value(v) => Some(v),
      _ => None,
    }
  }
}

impl<'de, T> Deserialize<'de> for TriState<T>
where
  T: FromStr,
{
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    deserializer.deserialize_any(TriStateVisitor(PhantomData))
  }
}

struct TriStateVisitor<T>(PhantomData<T>);

impl<'de, T> Visitor<'de> for TriStateVisitor<T>
where
  T: FromStr,
{
  type Value = TriState<T>;

  fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str("null or a string")
  }

  fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
    Ok(TriState::Null)
  }

  fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
    Ok(TriState::Null)
  }

  fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E> {
    Ok(match s.parse::<T>() {
      Ok(v) => TriState::Value(v),
      Err(_) => TriState::Invalid(s.to_owned()),
    })
  }
}

impl<T> Serialize for TriState<T>
where
  T: fmt::Display,
{
  /// Pair with `#[serde(skip_serializing_if = "TriState::is_absent")]`;
  /// an absent field serialises as `null` otherwise.
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    match self {
      Self::Absent | Self::Null => serializer.serialize_none(),
      Self::Value(v) => serializer.collect_str(v),
      Self::Invalid(raw) => serializer.serialize_str(raw),
    }
  }
}
