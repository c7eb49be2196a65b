//! Package identity — the thin envelope that release events hang off.
//!
//! A package row holds only identity attributes; everything that changes
//! over time (versions, repository placement) lives in the release log.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── PackageKind ─────────────────────────────────────────────────────────────

/// The packaging format a package is distributed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
  Deb,
  Rpm,
  Snap,
  Docker,
}

impl PackageKind {
  /// The discriminant string stored in the `kind` column.
  /// Must match the `rename_all = "lowercase"` serde tags above.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Deb => "deb",
      Self::Rpm => "rpm",
      Self::Snap => "snap",
      Self::Docker => "docker",
    }
  }
}

impl FromStr for PackageKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "deb" => Ok(Self::Deb),
      "rpm" => Ok(Self::Rpm),
      "snap" => Ok(Self::Snap),
      "docker" => Ok(Self::Docker),
      other => Err(Error::Malformed(format!("unknown package kind: {other:?}"))),
    }
  }
}

impl fmt::Display for PackageKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── PackageContents ─────────────────────────────────────────────────────────

/// What a package carries: sources, translations, or a binary build.
///
/// Binary packages always name their architecture; the textual form is
/// `binary-<arch>` (e.g. `binary-amd64`), and a bare `binary` is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PackageContents {
  Source,
  Translation,
  Binary { arch: String },
}

impl fmt::Display for PackageContents {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Source => f.write_str("source"),
      Self::Translation => f.write_str("translation"),
      Self::Binary { arch } => write!(f, "binary-{arch}"),
    }
  }
}

impl FromStr for PackageContents {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "source" => Ok(Self::Source),
      "translation" => Ok(Self::Translation),
      other => match other.strip_prefix("binary-") {
        Some(arch) if !arch.is_empty() => {
          Ok(Self::Binary { arch: arch.to_owned() })
        }
        _ => Err(Error::Malformed(format!("unknown package contents: {other:?}"))),
      },
    }
  }
}

impl TryFrom<String> for PackageContents {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<PackageContents> for String {
  fn from(c: PackageContents) -> Self { c.to_string() }
}

// ─── Package ─────────────────────────────────────────────────────────────────

/// A distributable unit tracked by the inventory. Immutable once created;
/// renames are out of scope. `(name, kind, contents)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
  pub package_id: i64,
  pub name:       String,
  pub kind:       PackageKind,
  pub contents:   PackageContents,
}

/// Input to [`crate::store::InventoryStore::add_package`].
/// The id is always assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPackage {
  pub name:     String,
  pub kind:     PackageKind,
  pub contents: PackageContents,
}
