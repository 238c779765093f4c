//! Codec des comptes : varint base-128, groupes little-endian, 1 à 5 octets.

use jsbon_core::{ByteReader, ByteWriter};

use crate::error::{Error, Result};

/// Taille maximale d’un varint u32 sur le fil.
const MAX_LEN: usize = 5;

/// Écrit un compte. Refuse tout ce qui ne tient pas sur u32.
pub(crate) fn write_count(w: &mut ByteWriter, value: usize) -> Result<()> {
    let v = u32::try_from(value).map_err(|_| Error::InvalidCount(value as u64))?;
    write_u32(w, v);
    Ok(())
}

/// Écrit un u32 en varint : bit haut = continuation, 7 bits utiles par octet.
pub(crate) fn write_u32(w: &mut ByteWriter, mut value: u32) {
    while value >= 0x80 {
        w.write_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    w.write_u8(value as u8);
}

/// Lit un compte varint.
///
/// Un varint de plus de 5 octets, ou dont le cinquième octet déborde de
/// 32 bits, est un flux corrompu.
pub(crate) fn read_count(r: &mut ByteReader<'_>) -> Result<u32> {
    let mut value: u32 = 0;
    let mut shift = 0u32;
    for _ in 0..MAX_LEN {
        let byte = r.read_u8()?;
        let low = u32::from(byte & 0x7F);
        if shift == 28 && low > 0x0F {
            return Err(Error::InvalidData("varint overflows 32 bits"));
        }
        value |= low << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
    Err(Error::InvalidData("varint longer than 5 bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode(value: u32) -> Vec<u8> {
        let mut w = ByteWriter::new();
        write_u32(&mut w, value);
        w.into_vec()
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(1), vec![0x01]);
        assert_eq!(encode(0x7F), vec![0x7F]);
        assert_eq!(encode(0x80), vec![0x80, 0x01]);
        assert_eq!(encode(300), vec![0xAC, 0x02]);
        assert_eq!(encode(0x3FFF), vec![0xFF, 0x7F]);
        assert_eq!(encode(0x4000), vec![0x80, 0x80, 0x01]);
        assert_eq!(encode(u32::MAX), vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
    }

    #[test]
    fn rejects_overlong() {
        let mut r = ByteReader::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]);
        assert!(matches!(read_count(&mut r), Err(Error::InvalidData(_))));
    }

    #[test]
    fn rejects_32bit_overflow() {
        // 5e octet = 0x10 : bit 32 ou plus.
        let mut r = ByteReader::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0x10]);
        assert!(matches!(read_count(&mut r), Err(Error::InvalidData(_))));
    }

    #[test]
    fn rejects_truncated() {
        let mut r = ByteReader::new(&[0x80, 0x80]);
        assert!(matches!(read_count(&mut r), Err(Error::Truncated { .. })));
    }

    #[test]
    fn count_above_u32_is_invalid() {
        if usize::BITS > 32 {
            let mut w = ByteWriter::new();
            let too_big = u32::MAX as usize + 1;
            assert!(matches!(write_count(&mut w, too_big), Err(Error::InvalidCount(_))));
        }
    }

    proptest! {
        #[test]
        fn roundtrip_any_u32(value in any::<u32>()) {
            let bytes = encode(value);
            prop_assert!(bytes.len() <= 5);
            let mut r = ByteReader::new(&bytes);
            prop_assert_eq!(read_count(&mut r).unwrap(), value);
            prop_assert_eq!(r.remaining(), 0);
        }
    }
}
