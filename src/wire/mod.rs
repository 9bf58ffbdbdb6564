//! Profile exchange wire protocol (current and legacy formats)

pub use error::Error;
pub use message::ProfileMessage;

pub mod error;
pub(crate) mod legacy;
pub mod message;

use byteordered::byteorder::{ReadBytesExt, WriteBytesExt};
use byteordered::{ByteOrdered, Endian};
use std::io::{Read, Write};

/// Length-prefixed UTF-8 string (u16 length, then the bytes)
pub(crate) fn read_utf<T, E>(r: &mut ByteOrdered<T, E>) -> Result<String, Error>
where
    T: ReadBytesExt,
    E: Endian + Copy,
{
    let len = usize::from(r.read_u16()?);
    let mut buf = vec![0; len];
    r.read_exact(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

pub(crate) fn write_utf<T, E>(w: &mut ByteOrdered<T, E>, s: &str) -> Result<(), Error>
where
    T: WriteBytesExt,
    E: Endian + Copy,
{
    w.write_u16(s.len() as u16)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

pub(crate) fn read_bool<T, E>(r: &mut ByteOrdered<T, E>) -> Result<bool, Error>
where
    T: ReadBytesExt,
    E: Endian,
{
    Ok(r.read_u8()? != 0)
}

pub(crate) fn write_bool<T, E>(w: &mut ByteOrdered<T, E>, b: bool) -> Result<(), Error>
where
    T: WriteBytesExt,
    E: Endian,
{
    w.write_u8(u8::from(b))?;
    Ok(())
}
