use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Integer,
    Real,
    Boolean,
    String,
}

impl ScalarType {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Integer => "integer",
            ScalarType::Real => "real",
            ScalarType::Boolean => "boolean",
            ScalarType::String => "string",
        }
    }
}

impl Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Static type of a declaration or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Scalar(ScalarType),
    Array(ScalarType),
}

impl Type {
    pub const INTEGER: Type = Type::Scalar(ScalarType::Integer);
    pub const REAL: Type = Type::Scalar(ScalarType::Real);
    pub const BOOLEAN: Type = Type::Scalar(ScalarType::Boolean);
    pub const STRING: Type = Type::Scalar(ScalarType::String);

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Scalar(ScalarType::Integer | ScalarType::Real))
    }

    pub fn is_integer(&self) -> bool {
        *self == Type::INTEGER
    }

    pub fn is_real(&self) -> bool {
        *self == Type::REAL
    }

    pub fn is_boolean(&self) -> bool {
        *self == Type::BOOLEAN
    }

    pub fn is_string(&self) -> bool {
        *self == Type::STRING
    }

    pub fn element(&self) -> Option<ScalarType> {
        match self {
            Type::Array(elem) => Some(*elem),
            Type::Scalar(_) => None,
        }
    }
}

impl From<ScalarType> for Type {
    fn from(value: ScalarType) -> Self {
        Type::Scalar(value)
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Scalar(ty) => write!(f, "{ty}"),
            Type::Array(elem) => write!(f, "array of {elem}"),
        }
    }
}

/// Whether a value of type `value` may be stored where `target` is expected.
///
/// Identical types are compatible and an integer widens to real. Nothing
/// else converts implicitly.
pub fn assignable(target: Type, value: Type) -> bool {
    target == value || (target.is_real() && value.is_integer())
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::widening(Type::REAL, Type::INTEGER, true)]
    #[case::narrowing(Type::INTEGER, Type::REAL, false)]
    #[case::string_from_integer(Type::STRING, Type::INTEGER, false)]
    #[case::integer_from_string(Type::INTEGER, Type::STRING, false)]
    #[case::boolean_from_integer(Type::BOOLEAN, Type::INTEGER, false)]
    #[case::arrays(
        Type::Array(ScalarType::Integer),
        Type::Array(ScalarType::Integer),
        true
    )]
    #[case::array_elements_do_not_widen(
        Type::Array(ScalarType::Real),
        Type::Array(ScalarType::Integer),
        false
    )]
    fn test_assignable(#[case] target: Type, #[case] value: Type, #[case] expected: bool) {
        assert_eq!(assignable(target, value), expected);
    }

    #[rstest]
    fn test_assignable_is_reflexive_for_scalars(
        #[values(Type::INTEGER, Type::REAL, Type::BOOLEAN, Type::STRING)] ty: Type,
    ) {
        assert!(assignable(ty, ty));
    }

    #[rstest]
    #[case(Type::INTEGER, "integer")]
    #[case(Type::Array(ScalarType::Real), "array of real")]
    fn test_display(#[case] ty: Type, #[case] expected: &str) {
        assert_eq!(ty.to_string(), expected);
    }
}
