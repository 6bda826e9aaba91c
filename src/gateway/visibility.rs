// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Visibility tiers and the read-access decision for module data records.
//!
//! ## Decision Table
//!
//! | module key | visibility      | viewer   | viewer is owner | readable |
//! |------------|-----------------|----------|-----------------|----------|
//! | valid      | any             | -        | -               | yes      |
//! | none       | `public`        | -        | -               | yes      |
//! | none       | `authenticated` | present  | -               | yes      |
//! | none       | `authenticated` | absent   | -               | no       |
//! | none       | `private`       | -        | yes             | yes      |
//! | none       | `private`       | -        | no              | no       |
//! | none       | `admin`         | -        | -               | no       |
//!
//! A caller holding a valid module key is the module's own backend and reads
//! every tier, `admin` included. A browser session without a module key never
//! reads `admin` rows, not even its own.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Visibility tier attached to a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Readable by anyone, signed in or not.
    Public,
    /// Readable by any signed-in viewer.
    Authenticated,
    /// Readable only by the owning user.
    #[default]
    Private,
    /// Module-internal bookkeeping; never readable without a module key.
    Admin,
}

impl Visibility {
    /// Parse a tier name (case-insensitive, surrounding whitespace ignored).
    pub fn parse(s: &str) -> Option<Visibility> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Some(Visibility::Public),
            "authenticated" => Some(Visibility::Authenticated),
            "private" => Some(Visibility::Private),
            "admin" => Some(Visibility::Admin),
            _ => None,
        }
    }

    /// Coerce caller input to a tier. Anything unrecognised, or no value at
    /// all, is `Private`.
    pub fn coerce(raw: Option<&str>) -> Visibility {
        raw.and_then(Visibility::parse).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Authenticated => "authenticated",
            Visibility::Private => "private",
            Visibility::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadAccess<'a> {
    /// The request carried a valid key for the module that owns the data.
    Module,
    /// No module key; `viewer` is the signed-in end user, if any.
    Session { viewer: Option<&'a str> },
}

impl<'a> ReadAccess<'a> {
    pub fn new(module_authorized: bool, viewer: Option<&'a str>) -> Self {
        if module_authorized {
            ReadAccess::Module
        } else {
            ReadAccess::Session { viewer }
        }
    }

    /// Decide whether a record with `visibility` owned by `owner` is readable.
    pub fn can_read(&self, visibility: Visibility, owner: &str) -> bool {
        let viewer = match self {
            ReadAccess::Module => return true,
            ReadAccess::Session { viewer } => *viewer,
        };

        match visibility {
            Visibility::Public => true,
            Visibility::Authenticated => viewer.is_some(),
            Visibility::Private => viewer == Some(owner),
            Visibility::Admin => false,
        }
    }
}

/// Free-function form of [`ReadAccess::can_read`].
pub fn is_readable(
    module_authorized: bool,
    viewer: Option<&str>,
    visibility: Visibility,
    owner: &str,
) -> bool {
    ReadAccess::new(module_authorized, viewer).can_read(visibility, owner)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Visibility; 4] = [
        Visibility::Public,
        Visibility::Authenticated,
        Visibility::Private,
        Visibility::Admin,
    ];

    /// Expected outcome written out row by row from the table in the module docs.
    fn expected(
        module_authorized: bool,
        visibility: Visibility,
        viewer_present: bool,
        viewer_is_owner: bool,
    ) -> bool {
        if module_authorized {
            return true;
        }
        match visibility {
            Visibility::Public => true,
            Visibility::Authenticated => viewer_present,
            Visibility::Private => viewer_present && viewer_is_owner,
            Visibility::Admin => false,
        }
    }

    #[test]
    fn decision_table_holds_for_every_combination() {
        let owner = "user_owner";
        for module_authorized in [true, false] {
            for visibility in ALL {
                for viewer_present in [true, false] {
                    for viewer_is_owner in [true, false] {
                        let viewer = match (viewer_present, viewer_is_owner) {
                            (false, _) => None,
                            (true, true) => Some(owner),
                            (true, false) => Some("user_other"),
                        };
                        assert_eq!(
                            is_readable(module_authorized, viewer, visibility, owner),
                            expected(module_authorized, visibility, viewer_present, viewer_is_owner),
                            "module={module_authorized} vis={visibility} viewer={viewer:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn module_key_reads_admin_rows_even_anonymously() {
        assert!(ReadAccess::Module.can_read(Visibility::Admin, "u1"));
        assert!(ReadAccess::new(true, None).can_read(Visibility::Private, "u1"));
    }

    #[test]
    fn owner_session_never_reads_admin_rows() {
        let access = ReadAccess::Session { viewer: Some("u1") };
        assert!(!access.can_read(Visibility::Admin, "u1"));
        assert!(access.can_read(Visibility::Private, "u1"));
    }

    #[test]
    fn coerce_defaults_to_private() {
        assert_eq!(Visibility::coerce(None), Visibility::Private);
        assert_eq!(Visibility::coerce(Some("everyone")), Visibility::Private);
        assert_eq!(Visibility::coerce(Some("")), Visibility::Private);
        assert_eq!(Visibility::coerce(Some(" Public ")), Visibility::Public);
        assert_eq!(Visibility::coerce(Some("ADMIN")), Visibility::Admin);
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&Visibility::Authenticated).unwrap();
        assert_eq!(json, r#""authenticated""#);
    }
}
