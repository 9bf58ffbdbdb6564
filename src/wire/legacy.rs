//! Tagged enum envelope carrying the heap state for pre-off-heap peers.
//!
//! Old members serialize the heap state as their single-flag event enum,
//! either as a compact grid enum (class name + value name strings) or as
//! a generic java object stream. Both variants are decoded here; only
//! the compact variant is ever written.

use crate::types::MemoryState;
use crate::wire::{read_utf, write_utf, Error};
use byteordered::byteorder::{ReadBytesExt, WriteBytesExt};
use byteordered::{ByteOrdered, Endian};

/// Tag byte for the compact grid-serialized enum variant
pub(crate) const GEMFIRE_ENUM: u8 = 141;
/// Tag byte for the generic java object stream variant
pub(crate) const SERIALIZABLE: u8 = 44;

/// Fully qualified name old members use to identify the heap state enum
pub(crate) const MEMORY_EVENT_TYPE_CLASS: &str =
    "com.gemstone.gemfire.internal.cache.control.MemoryEventType";
pub(crate) const ENUM_PARENT_CLASS: &str = "java.lang.Enum";

pub(crate) const TC_ENUM: u8 = 0x7e;
pub(crate) const TC_CLASSDESC: u8 = 0x72;
pub(crate) const TC_ENDBLOCK: u8 = 0x78;
pub(crate) const TC_NULL: u8 = 0x70;
pub(crate) const TC_STRING: u8 = 0x74;

pub(crate) fn read_heap_state<T, E>(r: &mut ByteOrdered<T, E>) -> Result<MemoryState, Error>
where
    T: ReadBytesExt,
    E: Endian + Copy,
{
    let tag = r.read_u8()?;
    let value_name = match tag {
        GEMFIRE_ENUM => {
            let class_name = read_utf(r)?;
            if class_name != MEMORY_EVENT_TYPE_CLASS {
                return Err(Error::EnvelopeClassName(class_name));
            }
            read_utf(r)?
        }
        SERIALIZABLE => read_object_stream_enum(r)?,
        other => return Err(Error::EnvelopeTag(other)),
    };
    Ok(MemoryState::from_legacy_event_name(&value_name))
}

pub(crate) fn write_heap_state<T, E>(
    w: &mut ByteOrdered<T, E>,
    state: MemoryState,
) -> Result<(), Error>
where
    T: WriteBytesExt,
    E: Endian + Copy,
{
    w.write_u8(GEMFIRE_ENUM)?;
    write_utf(w, MEMORY_EVENT_TYPE_CLASS)?;
    write_utf(w, state.legacy_event_name())
}

/// Object stream envelope: magic, version, the enum class descriptor,
/// its parent descriptor, then the value name string
fn read_object_stream_enum<T, E>(r: &mut ByteOrdered<T, E>) -> Result<String, Error>
where
    T: ReadBytesExt,
    E: Endian + Copy,
{
    let _stream_magic = r.read_u16()?;
    let _stream_version = r.read_u16()?;
    expect_marker(r, TC_ENUM)?;
    read_class_descriptor(r, MEMORY_EVENT_TYPE_CLASS)?;
    read_class_descriptor(r, ENUM_PARENT_CLASS)?;
    expect_marker(r, TC_NULL)?;
    expect_marker(r, TC_STRING)?;
    read_utf(r)
}

fn read_class_descriptor<T, E>(r: &mut ByteOrdered<T, E>, expected_name: &str) -> Result<(), Error>
where
    T: ReadBytesExt,
    E: Endian + Copy,
{
    expect_marker(r, TC_CLASSDESC)?;
    let class_name = read_utf(r)?;
    if class_name != expected_name {
        return Err(Error::EnvelopeClassName(class_name));
    }
    let _serial_version_id = r.read_i64()?;
    let _flags = r.read_u8()?;
    let mut fields = r.read_u16()?;
    while fields != 0 {
        let _type_tag = r.read_u8()?;
        let _field_name = read_utf(r)?;
        fields -= 1;
    }
    expect_marker(r, TC_ENDBLOCK)
}

fn expect_marker<T, E>(r: &mut ByteOrdered<T, E>, expected: u8) -> Result<(), Error>
where
    T: ReadBytesExt,
    E: Endian,
{
    let found = r.read_u8()?;
    if found != expected {
        return Err(Error::ObjectStreamMarker { expected, found });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn write_test_utf(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(&(s.len() as u16).to_be_bytes());
        out.extend_from_slice(s.as_bytes());
    }

    fn write_test_class_descriptor(out: &mut Vec<u8>, name: &str, field_names: &[&str]) {
        out.push(TC_CLASSDESC);
        write_test_utf(out, name);
        out.extend_from_slice(&0x1234_5678_9abc_def0_u64.to_be_bytes());
        out.push(0x12); // flags
        out.extend_from_slice(&(field_names.len() as u16).to_be_bytes());
        for field_name in field_names {
            out.push(b'I');
            write_test_utf(out, field_name);
        }
        out.push(TC_ENDBLOCK);
    }

    fn object_stream_envelope(value_name: &str) -> Vec<u8> {
        let mut out = vec![SERIALIZABLE];
        out.extend_from_slice(&0xaced_u16.to_be_bytes());
        out.extend_from_slice(&5_u16.to_be_bytes());
        out.push(TC_ENUM);
        write_test_class_descriptor(&mut out, MEMORY_EVENT_TYPE_CLASS, &["a", "b"]);
        write_test_class_descriptor(&mut out, ENUM_PARENT_CLASS, &[]);
        out.push(TC_NULL);
        out.push(TC_STRING);
        write_test_utf(&mut out, value_name);
        out
    }

    fn decode(bytes: &[u8]) -> Result<MemoryState, Error> {
        let mut r = ByteOrdered::new(Cursor::new(bytes), byteordered::Endianness::Big);
        read_heap_state(&mut r)
    }

    #[test]
    fn grid_enum_round_trip() {
        for state in enum_iterator::all::<MemoryState>() {
            let mut out = Vec::new();
            let mut w = ByteOrdered::new(&mut out, byteordered::Endianness::Big);
            write_heap_state(&mut w, state).unwrap();
            let decoded = decode(&out).unwrap();
            assert_eq!(
                decoded,
                MemoryState::from_legacy_event_name(state.legacy_event_name())
            );
        }
    }

    #[test]
    fn object_stream_envelope_decodes() {
        assert_eq!(
            decode(&object_stream_envelope("CRITICAL_UP")).unwrap(),
            MemoryState::Critical
        );
        assert_eq!(
            decode(&object_stream_envelope("CRITICAL_DISABLED")).unwrap(),
            MemoryState::CriticalDisabled
        );
        assert_eq!(
            decode(&object_stream_envelope("CRITICAL_DOWN")).unwrap(),
            MemoryState::Normal
        );
        assert_eq!(
            decode(&object_stream_envelope("EVICT_MORE")).unwrap(),
            MemoryState::Normal
        );
    }

    #[test]
    fn unexpected_tag_byte_is_an_error() {
        let err = decode(&[0x42]).unwrap_err();
        assert!(matches!(err, Error::EnvelopeTag(0x42)));
    }

    #[test]
    fn wrong_enum_class_is_an_error() {
        let mut out = vec![GEMFIRE_ENUM];
        write_test_utf(&mut out, "com.example.NotTheEnum");
        write_test_utf(&mut out, "CRITICAL_UP");
        let err = decode(&out).unwrap_err();
        assert!(matches!(err, Error::EnvelopeClassName(name) if name == "com.example.NotTheEnum"));
    }

    #[test]
    fn corrupt_object_stream_marker_is_an_error() {
        let mut bytes = object_stream_envelope("CRITICAL_UP");
        // Clobber the enum marker that follows the tag, magic, and version
        bytes[5] = 0x00;
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::ObjectStreamMarker {
                expected: TC_ENUM,
                found: 0x00
            }
        ));
    }
}
