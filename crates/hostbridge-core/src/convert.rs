//! Conversion traits between Rust values and [`Dynamic`] slots.
//!
//! - [`FromDynamic`]: extract a Rust value from a slot
//! - [`IntoDynamic`]: convert a Rust value into a slot
//!
//! Implemented for integers, `bool`, `String`/`&str`, `()`,
//! [`ObjectHandle`] and `Option<ObjectHandle>` (null handle as `None`).

use crate::error::ConversionError;
use crate::runtime::{Dynamic, ObjectHandle};

/// Extract a value from a Dynamic slot.
pub trait FromDynamic: Sized {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError>;
}

/// Convert a value into a Dynamic slot.
pub trait IntoDynamic {
    fn into_dynamic(self) -> Dynamic;
}

fn mismatch(expected: &'static str, slot: &Dynamic) -> ConversionError {
    ConversionError::TypeMismatch {
        expected,
        actual: slot.type_name(),
    }
}

macro_rules! impl_dynamic_int {
    ($($ty:ty),*) => {
        $(
            impl FromDynamic for $ty {
                fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
                    match slot {
                        Dynamic::Int(v) => <$ty>::try_from(*v).map_err(|_| {
                            ConversionError::IntegerOverflow {
                                value: *v,
                                target_type: stringify!($ty),
                            }
                        }),
                        _ => Err(mismatch("int", slot)),
                    }
                }
            }

            impl IntoDynamic for $ty {
                fn into_dynamic(self) -> Dynamic {
                    Dynamic::Int(self as i64)
                }
            }
        )*
    };
}

impl_dynamic_int!(i8, i16, i32, i64, u8, u16, u32, usize);

// u64 reinterprets the bits so the full range survives a round trip.
impl FromDynamic for u64 {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Int(v) => Ok(*v as u64),
            _ => Err(mismatch("int", slot)),
        }
    }
}

impl IntoDynamic for u64 {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Int(self as i64)
    }
}

impl FromDynamic for bool {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Bool(v) => Ok(*v),
            _ => Err(mismatch("bool", slot)),
        }
    }
}

impl IntoDynamic for bool {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Bool(self)
    }
}

impl FromDynamic for String {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::String(s) => Ok(s.clone()),
            _ => Err(mismatch("string", slot)),
        }
    }
}

impl IntoDynamic for String {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::String(self)
    }
}

impl IntoDynamic for &str {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::String(self.to_owned())
    }
}

impl FromDynamic for () {
    fn from_dynamic(_slot: &Dynamic) -> Result<Self, ConversionError> {
        // A void read discards whatever the callee returned.
        Ok(())
    }
}

impl IntoDynamic for () {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Void
    }
}

impl FromDynamic for ObjectHandle {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Object(handle) => Ok(*handle),
            Dynamic::NullHandle => Err(ConversionError::NullHandle {
                target_type: "object",
            }),
            _ => Err(mismatch("object", slot)),
        }
    }
}

impl IntoDynamic for ObjectHandle {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Object(self)
    }
}

impl FromDynamic for Option<ObjectHandle> {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Object(handle) => Ok(Some(*handle)),
            Dynamic::NullHandle | Dynamic::Void => Ok(None),
            _ => Err(mismatch("object", slot)),
        }
    }
}

impl IntoDynamic for Option<ObjectHandle> {
    fn into_dynamic(self) -> Dynamic {
        match self {
            Some(handle) => Dynamic::Object(handle),
            None => Dynamic::NullHandle,
        }
    }
}

impl IntoDynamic for Dynamic {
    fn into_dynamic(self) -> Dynamic {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TypeHash;

    #[test]
    fn from_dynamic_narrowing() {
        assert_eq!(i8::from_dynamic(&Dynamic::Int(-128)).unwrap(), -128i8);
        assert!(i8::from_dynamic(&Dynamic::Int(128)).is_err());
        assert!(u8::from_dynamic(&Dynamic::Int(-1)).is_err());
        assert_eq!(u32::from_dynamic(&Dynamic::Int(4294967295)).unwrap(), u32::MAX);
        assert!(usize::from_dynamic(&Dynamic::Int(-5)).is_err());
    }

    #[test]
    fn u64_keeps_full_range() {
        let slot = u64::MAX.into_dynamic();
        assert_eq!(u64::from_dynamic(&slot).unwrap(), u64::MAX);
    }

    #[test]
    fn bool_and_string() {
        assert!(bool::from_dynamic(&true.into_dynamic()).unwrap());
        assert!(bool::from_dynamic(&Dynamic::Int(1)).is_err());
        assert_eq!(
            String::from_dynamic(&"hello".into_dynamic()).unwrap(),
            "hello"
        );
    }

    #[test]
    fn unit_discards_any_value() {
        assert!(<()>::from_dynamic(&Dynamic::Int(9)).is_ok());
        assert!(().into_dynamic().is_void());
    }

    #[test]
    fn handles_and_null() {
        let handle = ObjectHandle::new(3, 1, TypeHash::from_name("Scene"));
        assert_eq!(ObjectHandle::from_dynamic(&handle.into_dynamic()).unwrap(), handle);
        assert!(matches!(
            ObjectHandle::from_dynamic(&Dynamic::NullHandle),
            Err(ConversionError::NullHandle { .. })
        ));
        assert_eq!(
            Option::<ObjectHandle>::from_dynamic(&Dynamic::NullHandle).unwrap(),
            None
        );
        assert_eq!(None::<ObjectHandle>.into_dynamic(), Dynamic::NullHandle);
    }
}
