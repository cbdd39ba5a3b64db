use std::fmt;

/// The flat type universe of the language.
///
/// Types have no user-defined composition; they only exist to prevent stack
/// shape and intrinsic argument mismatches.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GofraType {
    Integer,
    Pointer,
    Boolean,
    Void,
    /// Wildcard used by intrinsic signatures. Accepts any concrete type
    /// without constraining it. Never produced by the parser.
    Any,
}

pub static TYPE_NAMES: phf::Map<&'static str, GofraType> = phf::phf_map! {
    "int" => GofraType::Integer,
    "ptr" => GofraType::Pointer,
    "bool" => GofraType::Boolean,
    "void" => GofraType::Void,
};

impl GofraType {
    pub fn from_name(name: &str) -> Option<GofraType> {
        TYPE_NAMES.get(name).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            GofraType::Integer => "int",
            GofraType::Pointer => "ptr",
            GofraType::Boolean => "bool",
            GofraType::Void => "void",
            GofraType::Any => "any",
        }
    }

    /// Whether a value of type `actual` may be used where `self` is expected.
    pub fn accepts(self, actual: GofraType) -> bool {
        self == GofraType::Any || self == actual
    }
}

impl fmt::Display for GofraType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Formats a type stack bottom to top, as in `[int, ptr]`.
pub struct DisplayStack<'a>(pub &'a [GofraType]);

impl fmt::Display for DisplayStack<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, ty) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{ty}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_accepts_everything() {
        for ty in [
            GofraType::Integer,
            GofraType::Pointer,
            GofraType::Boolean,
            GofraType::Void,
        ] {
            assert!(GofraType::Any.accepts(ty));
            assert!(ty.accepts(ty));
            assert!(!ty.accepts(GofraType::Any));
        }
        assert!(!GofraType::Integer.accepts(GofraType::Pointer));
        assert!(!GofraType::Boolean.accepts(GofraType::Integer));
    }

    #[test]
    fn names_round_trip() {
        for (name, ty) in TYPE_NAMES.entries() {
            assert_eq!(ty.name(), *name);
            assert_eq!(GofraType::from_name(name), Some(*ty));
        }
        assert_eq!(GofraType::from_name("any"), None);
    }

    #[test]
    fn display_stack() {
        let stack = [GofraType::Integer, GofraType::Pointer];
        assert_eq!(DisplayStack(&stack).to_string(), "[int, ptr]");
        assert_eq!(DisplayStack(&[]).to_string(), "[]");
    }
}
