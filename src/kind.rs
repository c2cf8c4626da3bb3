//! Closed kind taxonomies for declarations.
//!
//! Every declaration is classified twice: by the role its name plays in the
//! program ([`ObjKind`]) and by the shape of its type ([`TypKind`]). Both are
//! single bits so that a query can match a set of kinds with one test:
//!
//! ```text
//! kind & mask == kind      (mask 0 or ANY matches everything)
//! ```

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

macro_rules! kind_enum {
    (
        $(#[$meta:meta])*
        $name:ident / $set:ident { $($variant:ident = $bit:expr),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
        #[repr(u32)]
        pub enum $name {
            $($variant = 1 << $bit),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn bits(self) -> u32 {
                self as u32
            }

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            /// Reports whether this kind is contained in `mask`.
            pub fn is_in(self, mask: impl Into<$set>) -> bool {
                mask.into().matches(self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|k| k.name().eq_ignore_ascii_case(s))
                    .ok_or_else(|| format!("unknown {} {s:?}", stringify!($name)))
            }
        }

        /// A set of kinds. The empty set and [`Self::ANY`] both match every kind.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $set(pub u32);

        impl $set {
            pub const ANY: $set = $set(u32::MAX);
            pub const NONE: $set = $set(0);

            pub fn matches(self, kind: $name) -> bool {
                if self.0 == 0 || self.0 == u32::MAX {
                    return true;
                }
                kind.bits() & self.0 == kind.bits()
            }

            pub fn is_any(self) -> bool {
                self.0 == 0 || self.0 == u32::MAX
            }

            /// Parses a comma separated list such as `Fun,Var`. `*` and the
            /// empty string mean any.
            pub fn parse_list(s: &str) -> Result<Self, String> {
                let s = s.trim();
                if s.is_empty() || s == "*" {
                    return Ok($set::ANY);
                }
                let mut out = $set(0);
                for part in s.split(',') {
                    out = out | part.parse::<$name>()?;
                }
                Ok(out)
            }
        }

        impl From<$name> for $set {
            fn from(k: $name) -> Self {
                $set(k.bits())
            }
        }

        impl BitOr for $name {
            type Output = $set;

            fn bitor(self, rhs: $name) -> $set {
                $set(self.bits() | rhs.bits())
            }
        }

        impl BitOr<$name> for $set {
            type Output = $set;

            fn bitor(self, rhs: $name) -> $set {
                $set(self.0 | rhs.bits())
            }
        }

        impl BitOr for $set {
            type Output = $set;

            fn bitor(self, rhs: $set) -> $set {
                $set(self.0 | rhs.0)
            }
        }

        impl fmt::Display for $set {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_any() {
                    return f.write_str("*");
                }
                let names: Vec<&str> = $name::ALL
                    .iter()
                    .filter(|k| self.0 & k.bits() != 0)
                    .map(|k| k.name())
                    .collect();
                f.write_str(&names.join(","))
            }
        }
    };
}

kind_enum! {
    /// What a declared name stands for.
    ObjKind / ObjKinds {
        Bad = 0,
        Pkg = 1,
        Con = 2,
        Typ = 3,
        Var = 4,
        Fun = 5,
        Lbl = 6,
        Bui = 7,
        Nil = 8,
    }
}

kind_enum! {
    /// Shape of a declaration's type. Named types report the shape of their
    /// underlying type through the facade.
    TypKind / TypKinds {
        Invalid = 0,
        Basic = 1,
        Array = 2,
        Slice = 3,
        Struct = 4,
        Pointer = 5,
        Tuple = 6,
        Signature = 7,
        Interface = 8,
        Map = 9,
        Chan = 10,
        Named = 11,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_kind_matches_itself_only() {
        let mask: ObjKinds = ObjKind::Fun.into();
        assert!(mask.matches(ObjKind::Fun));
        assert!(!mask.matches(ObjKind::Var));
    }

    #[test]
    fn combined_mask_matches_each_member() {
        let mask = ObjKind::Fun | ObjKind::Var;
        assert!(mask.matches(ObjKind::Fun));
        assert!(mask.matches(ObjKind::Var));
        assert!(!mask.matches(ObjKind::Typ));

        let tmask = TypKind::Signature | TypKind::Struct | TypKind::Map;
        assert!(tmask.matches(TypKind::Map));
        assert!(!tmask.matches(TypKind::Named));
    }

    #[test]
    fn zero_and_all_bits_match_everything() {
        for k in ObjKind::ALL {
            assert!(ObjKinds::NONE.matches(*k), "empty mask must match {k}");
            assert!(ObjKinds::ANY.matches(*k), "ANY must match {k}");
        }
        for k in TypKind::ALL {
            assert!(TypKinds(0).matches(*k));
            assert!(TypKinds::ANY.matches(*k));
        }
    }

    #[test]
    fn parse_list_and_display() {
        let m = ObjKinds::parse_list("fun, Var").unwrap();
        assert_eq!(m, ObjKind::Fun | ObjKind::Var);
        assert_eq!(m.to_string(), "Var,Fun");
        assert_eq!(ObjKinds::parse_list("*").unwrap(), ObjKinds::ANY);
        assert!(TypKinds::parse_list("Struct,Nope").is_err());
        assert_eq!("chan".parse::<TypKind>().unwrap(), TypKind::Chan);
    }
}
