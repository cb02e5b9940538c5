use crate::{Archive, ArchiveError, ArchiveExt};

/// A value that knows how to serialize itself as one named archive field.
pub trait ArchiveValue {
    fn serialize_value(
        &mut self,
        archive: &mut dyn Archive,
        name: &str,
    ) -> Result<(), ArchiveError>;
}

/// Read or write `value` under `name`.
pub fn serialize_value<T: ArchiveValue + ?Sized>(
    archive: &mut dyn Archive,
    name: &str,
    value: &mut T,
) -> Result<(), ArchiveError> {
    value.serialize_value(archive, name)
}

impl ArchiveValue for bool {
    fn serialize_value(
        &mut self,
        archive: &mut dyn Archive,
        name: &str,
    ) -> Result<(), ArchiveError> {
        archive.serialize_bool(name, self)
    }
}

macro_rules! impl_via_wide {
    ($method:ident, $wide:ty => $($ty:ty),*) => {$(
        impl ArchiveValue for $ty {
            fn serialize_value(
                &mut self,
                archive: &mut dyn Archive,
                name: &str,
            ) -> Result<(), ArchiveError> {
                let mut wide = <$wide>::from(*self);
                archive.$method(name, &mut wide)?;
                *self = <$ty>::try_from(wide).map_err(|_| ArchiveError::OutOfRange {
                    name: name.to_owned(),
                })?;
                Ok(())
            }
        }
    )*};
}

impl_via_wide!(serialize_u64, u64 => u8, u16, u32, u64);
impl_via_wide!(serialize_i64, i64 => i8, i16, i32, i64);

impl ArchiveValue for f64 {
    fn serialize_value(
        &mut self,
        archive: &mut dyn Archive,
        name: &str,
    ) -> Result<(), ArchiveError> {
        archive.serialize_f64(name, self)
    }
}

impl ArchiveValue for f32 {
    fn serialize_value(
        &mut self,
        archive: &mut dyn Archive,
        name: &str,
    ) -> Result<(), ArchiveError> {
        let mut wide = f64::from(*self);
        archive.serialize_f64(name, &mut wide)?;
        *self = wide as f32;
        Ok(())
    }
}

impl ArchiveValue for String {
    fn serialize_value(
        &mut self,
        archive: &mut dyn Archive,
        name: &str,
    ) -> Result<(), ArchiveError> {
        archive.serialize_string(name, self)
    }
}

impl ArchiveValue for Vec<u8> {
    fn serialize_value(
        &mut self,
        archive: &mut dyn Archive,
        name: &str,
    ) -> Result<(), ArchiveError> {
        archive.serialize_bytes(name, self)
    }
}

impl<T: ArchiveValue, const N: usize> ArchiveValue for [T; N] {
    fn serialize_value(
        &mut self,
        archive: &mut dyn Archive,
        name: &str,
    ) -> Result<(), ArchiveError> {
        archive.array_block(name, N, |archive, len| {
            if len != N {
                return Err(ArchiveError::ArraySizeMismatch {
                    name: name.to_owned(),
                    expected: N,
                    actual: len,
                });
            }
            for element in self.iter_mut() {
                element.serialize_value(archive, "element")?;
            }
            Ok(())
        })
    }
}
