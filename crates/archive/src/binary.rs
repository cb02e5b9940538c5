use ciborium::Value;
use ciborium::value::Integer;

use crate::{Archive, ArchiveError};

enum OutputFrame {
    Map {
        name: String,
        entries: Vec<(Value, Value)>,
    },
    List {
        name: String,
        items: Vec<Value>,
        expected: Option<usize>,
    },
}

/// Writes a CBOR document. Unordered blocks become maps keyed by field name;
/// ordered and array blocks become arrays.
#[derive(Default)]
pub struct BinaryOutputArchive {
    stack: Vec<OutputFrame>,
    root: Option<Value>,
}

impl BinaryOutputArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close any open blocks and return the finished value tree.
    pub fn into_value(mut self) -> Result<Value, ArchiveError> {
        self.unwind_to(0);
        self.root.ok_or(ArchiveError::Empty)
    }

    /// Close any open blocks and encode the document.
    pub fn finish(self) -> Result<Vec<u8>, ArchiveError> {
        let value = self.into_value()?;
        let mut buf = Vec::new();
        ciborium::into_writer(&value, &mut buf)
            .map_err(|e| ArchiveError::CborEncode(e.to_string()))?;
        Ok(buf)
    }

    fn push_value(&mut self, name: &str, value: Value) -> Result<(), ArchiveError> {
        match self.stack.last_mut() {
            Some(OutputFrame::Map { entries, .. }) => {
                entries.push((Value::Text(name.to_owned()), value));
                Ok(())
            }
            Some(OutputFrame::List { items, .. }) => {
                items.push(value);
                Ok(())
            }
            None if self.root.is_none() => {
                self.root = Some(value);
                Ok(())
            }
            None => Err(ArchiveError::RootAlreadyWritten),
        }
    }
}

impl Archive for BinaryOutputArchive {
    fn is_input(&self) -> bool {
        false
    }

    fn depth(&self) -> usize {
        self.stack.len()
    }

    fn unwind_to(&mut self, depth: usize) {
        while self.stack.len() > depth {
            if let Some(OutputFrame::List { expected, .. }) = self.stack.last_mut() {
                *expected = None;
            }
            // Closing a partially written frame only fails when the root slot
            // is taken, in which case the frame is dropped.
            let _ = self.end_block();
        }
    }

    fn begin_ordered_block(&mut self, name: &str) -> Result<(), ArchiveError> {
        self.stack.push(OutputFrame::List {
            name: name.to_owned(),
            items: Vec::new(),
            expected: None,
        });
        Ok(())
    }

    fn begin_unordered_block(&mut self, name: &str) -> Result<(), ArchiveError> {
        self.stack.push(OutputFrame::Map {
            name: name.to_owned(),
            entries: Vec::new(),
        });
        Ok(())
    }

    fn begin_array_block(&mut self, name: &str, size: usize) -> Result<usize, ArchiveError> {
        self.stack.push(OutputFrame::List {
            name: name.to_owned(),
            items: Vec::with_capacity(size),
            expected: Some(size),
        });
        Ok(size)
    }

    fn end_block(&mut self) -> Result<(), ArchiveError> {
        let (name, value) = match self.stack.pop().ok_or(ArchiveError::NoOpenBlock)? {
            OutputFrame::Map { name, entries } => (name, Value::Map(entries)),
            OutputFrame::List {
                name,
                items,
                expected,
            } => {
                match expected {
                    Some(expected) if expected != items.len() => {
                        return Err(ArchiveError::ArraySizeMismatch {
                            name,
                            expected,
                            actual: items.len(),
                        });
                    }
                    _ => {}
                }
                (name, Value::Array(items))
            }
        };
        self.push_value(&name, value)
    }

    fn serialize_bool(&mut self, name: &str, value: &mut bool) -> Result<(), ArchiveError> {
        self.push_value(name, Value::Bool(*value))
    }

    fn serialize_u64(&mut self, name: &str, value: &mut u64) -> Result<(), ArchiveError> {
        self.push_value(name, Value::Integer(Integer::from(*value)))
    }

    fn serialize_i64(&mut self, name: &str, value: &mut i64) -> Result<(), ArchiveError> {
        self.push_value(name, Value::Integer(Integer::from(*value)))
    }

    fn serialize_f64(&mut self, name: &str, value: &mut f64) -> Result<(), ArchiveError> {
        self.push_value(name, Value::Float(*value))
    }

    fn serialize_string(&mut self, name: &str, value: &mut String) -> Result<(), ArchiveError> {
        self.push_value(name, Value::Text(value.clone()))
    }

    fn serialize_bytes(&mut self, name: &str, value: &mut Vec<u8>) -> Result<(), ArchiveError> {
        self.push_value(name, Value::Bytes(value.clone()))
    }
}

enum InputFrame {
    Map(Vec<(Value, Value)>),
    List(std::vec::IntoIter<Value>),
}

/// Reads a CBOR document written by [`BinaryOutputArchive`].
///
/// Map fields are looked up by name, so unread or unknown fields are ignored.
pub struct BinaryInputArchive {
    stack: Vec<InputFrame>,
    root: Option<Value>,
}

impl BinaryInputArchive {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArchiveError> {
        let value: Value =
            ciborium::from_reader(bytes).map_err(|e| ArchiveError::CborDecode(e.to_string()))?;
        Ok(Self::from_value(value))
    }

    pub fn from_value(value: Value) -> Self {
        Self {
            stack: Vec::new(),
            root: Some(value),
        }
    }

    fn take_value(&mut self, name: &str) -> Result<Value, ArchiveError> {
        match self.stack.last_mut() {
            Some(InputFrame::Map(entries)) => {
                let pos = entries
                    .iter()
                    .position(|(key, _)| key.as_text() == Some(name))
                    .ok_or_else(|| ArchiveError::MissingField(name.to_owned()))?;
                Ok(entries.swap_remove(pos).1)
            }
            Some(InputFrame::List(items)) => items
                .next()
                .ok_or_else(|| ArchiveError::EndOfBlock(name.to_owned())),
            None => self
                .root
                .take()
                .ok_or_else(|| ArchiveError::MissingField(name.to_owned())),
        }
    }

    fn take_integer(&mut self, name: &str) -> Result<Integer, ArchiveError> {
        match self.take_value(name)? {
            Value::Integer(integer) => Ok(integer),
            _ => Err(mismatch(name, "integer")),
        }
    }

    fn take_array(&mut self, name: &str) -> Result<Vec<Value>, ArchiveError> {
        match self.take_value(name)? {
            Value::Array(items) => Ok(items),
            _ => Err(mismatch(name, "array")),
        }
    }
}

fn mismatch(name: &str, expected: &'static str) -> ArchiveError {
    ArchiveError::TypeMismatch {
        name: name.to_owned(),
        expected,
    }
}

impl Archive for BinaryInputArchive {
    fn is_input(&self) -> bool {
        true
    }

    fn depth(&self) -> usize {
        self.stack.len()
    }

    fn unwind_to(&mut self, depth: usize) {
        self.stack.truncate(depth);
    }

    fn begin_ordered_block(&mut self, name: &str) -> Result<(), ArchiveError> {
        let items = self.take_array(name)?;
        self.stack.push(InputFrame::List(items.into_iter()));
        Ok(())
    }

    fn begin_unordered_block(&mut self, name: &str) -> Result<(), ArchiveError> {
        match self.take_value(name)? {
            Value::Map(entries) => {
                self.stack.push(InputFrame::Map(entries));
                Ok(())
            }
            _ => Err(mismatch(name, "map")),
        }
    }

    fn begin_array_block(&mut self, name: &str, _size: usize) -> Result<usize, ArchiveError> {
        let items = self.take_array(name)?;
        let len = items.len();
        self.stack.push(InputFrame::List(items.into_iter()));
        Ok(len)
    }

    fn end_block(&mut self) -> Result<(), ArchiveError> {
        self.stack.pop().map(drop).ok_or(ArchiveError::NoOpenBlock)
    }

    fn serialize_bool(&mut self, name: &str, value: &mut bool) -> Result<(), ArchiveError> {
        match self.take_value(name)? {
            Value::Bool(b) => {
                *value = b;
                Ok(())
            }
            _ => Err(mismatch(name, "bool")),
        }
    }

    fn serialize_u64(&mut self, name: &str, value: &mut u64) -> Result<(), ArchiveError> {
        let integer = self.take_integer(name)?;
        *value = u64::try_from(integer).map_err(|_| ArchiveError::OutOfRange {
            name: name.to_owned(),
        })?;
        Ok(())
    }

    fn serialize_i64(&mut self, name: &str, value: &mut i64) -> Result<(), ArchiveError> {
        let integer = self.take_integer(name)?;
        *value = i64::try_from(integer).map_err(|_| ArchiveError::OutOfRange {
            name: name.to_owned(),
        })?;
        Ok(())
    }

    fn serialize_f64(&mut self, name: &str, value: &mut f64) -> Result<(), ArchiveError> {
        match self.take_value(name)? {
            Value::Float(f) => *value = f,
            Value::Integer(integer) => *value = i128::from(integer) as f64,
            _ => return Err(mismatch(name, "float")),
        }
        Ok(())
    }

    fn serialize_string(&mut self, name: &str, value: &mut String) -> Result<(), ArchiveError> {
        match self.take_value(name)? {
            Value::Text(text) => {
                *value = text;
                Ok(())
            }
            _ => Err(mismatch(name, "string")),
        }
    }

    fn serialize_bytes(&mut self, name: &str, value: &mut Vec<u8>) -> Result<(), ArchiveError> {
        match self.take_value(name)? {
            Value::Bytes(bytes) => {
                *value = bytes;
                Ok(())
            }
            _ => Err(mismatch(name, "byte string")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArchiveExt, serialize_value};

    fn write_sample() -> Vec<u8> {
        let mut out = BinaryOutputArchive::new();
        out.unordered_block("root", |a| {
            serialize_value(a, "count", &mut 3u32)?;
            serialize_value(a, "label", &mut String::from("crate"))?;
            a.array_block("values", 3, |a, _| {
                for mut v in [1.5f64, -2.0, 8.25] {
                    serialize_value(a, "value", &mut v)?;
                }
                Ok(())
            })
        })
        .unwrap();
        out.finish().unwrap()
    }

    #[test]
    fn nested_blocks_roundtrip() {
        let bytes = write_sample();
        let mut input = BinaryInputArchive::from_bytes(&bytes).unwrap();
        let mut count = 0u32;
        let mut label = String::new();
        let mut values = Vec::new();
        input
            .unordered_block("root", |a| {
                // Field order does not matter in unordered blocks.
                serialize_value(a, "label", &mut label)?;
                serialize_value(a, "count", &mut count)?;
                a.array_block("values", 0, |a, len| {
                    for _ in 0..len {
                        let mut v = 0.0f64;
                        serialize_value(a, "value", &mut v)?;
                        values.push(v);
                    }
                    Ok(())
                })
            })
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(label, "crate");
        assert_eq!(values, vec![1.5, -2.0, 8.25]);
    }

    #[test]
    fn missing_field_is_reported() {
        let bytes = write_sample();
        let mut input = BinaryInputArchive::from_bytes(&bytes).unwrap();
        let err = input
            .unordered_block("root", |a| serialize_value(a, "absent", &mut 0u32))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::MissingField(name) if name == "absent"));
    }

    #[test]
    fn extra_fields_are_ignored() {
        let bytes = write_sample();
        let mut input = BinaryInputArchive::from_bytes(&bytes).unwrap();
        let mut count = 0u32;
        input
            .unordered_block("root", |a| serialize_value(a, "count", &mut count))
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(input.depth(), 0);
    }

    #[test]
    fn safe_block_failure_does_not_leak() {
        let mut out = BinaryOutputArchive::new();
        out.array_block("items", 2, |a, _| {
            a.unordered_block("item", |a| serialize_value(a, "text", &mut String::from("x")))?;
            a.unordered_block("item", |a| serialize_value(a, "n", &mut 42u64))
        })
        .unwrap();
        let bytes = out.finish().unwrap();

        let mut input = BinaryInputArchive::from_bytes(&bytes).unwrap();
        let mut read = None;
        input
            .array_block("items", 0, |a, len| {
                assert_eq!(len, 2);
                // First element has no "n": the error stays inside the block.
                a.safe_unordered_block("item", |a| serialize_value(a, "n", &mut 0u64));
                a.safe_unordered_block("item", |a| {
                    let mut n = 0u64;
                    serialize_value(a, "n", &mut n)?;
                    read = Some(n);
                    Ok(())
                });
                Ok(())
            })
            .unwrap();
        assert_eq!(read, Some(42));
    }

    #[test]
    fn narrowing_out_of_range_fails() {
        let mut out = BinaryOutputArchive::new();
        out.unordered_block("root", |a| serialize_value(a, "big", &mut 300u64))
            .unwrap();
        let mut input = BinaryInputArchive::from_value(out.into_value().unwrap());
        let err = input
            .unordered_block("root", |a| serialize_value(a, "big", &mut 0u8))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::OutOfRange { .. }));
    }

    #[test]
    fn array_count_must_match_on_output() {
        let mut out = BinaryOutputArchive::new();
        let err = out
            .array_block("short", 2, |a, _| serialize_value(a, "only", &mut 1u8))
            .unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::ArraySizeMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn fixed_array_value_checks_length() {
        let mut out = BinaryOutputArchive::new();
        out.unordered_block("root", |a| serialize_value(a, "v", &mut [1.0f32, 2.0]))
            .unwrap();
        let mut input = BinaryInputArchive::from_value(out.into_value().unwrap());
        let mut three = [0.0f32; 3];
        let err = input
            .unordered_block("root", |a| serialize_value(a, "v", &mut three))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::ArraySizeMismatch { .. }));
    }

    #[test]
    fn type_mismatch_and_garbage_input() {
        let mut out = BinaryOutputArchive::new();
        out.unordered_block("root", |a| serialize_value(a, "flag", &mut true))
            .unwrap();
        let mut input = BinaryInputArchive::from_value(out.into_value().unwrap());
        let err = input
            .unordered_block("root", |a| serialize_value(a, "flag", &mut String::new()))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::TypeMismatch { .. }));

        assert!(matches!(
            BinaryInputArchive::from_bytes(&[0xff, 0x00]),
            Err(ArchiveError::CborDecode(_))
        ));
    }
}
