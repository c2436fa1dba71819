//! Wii common keys and ticket title-key unwrapping.

use aes::{
    cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit},
    Aes128,
};

use crate::{error::Error, structs::Ticket};

type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Which common key a ticket's `common_key_index` selects. Only the two keys
/// `original_source/lib/DiscWii.cpp`'s `COMMON_KEYS` table carries are known
/// here; any other index is a [`Error::CryptoMismatch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WiiCommonKeyKind {
    Normal,
    Korean,
}

impl WiiCommonKeyKind {
    pub fn from_index(index: u8) -> Result<Self, Error> {
        match index {
            0 => Ok(WiiCommonKeyKind::Normal),
            1 => Ok(WiiCommonKeyKind::Korean),
            other => Err(Error::crypto_mismatch(format!(
                "unknown common key index {other}"
            ))),
        }
    }

    /// Returns the 16-byte AES key for this kind.
    ///
    /// These are the publicly known Wii common keys (leaked in 2008 and widely
    /// published since); there is no secret to protect by omitting them, only
    /// Nintendo's original title-key wrapping to undo.
    pub fn key(self) -> [u8; 16] {
        match self {
            WiiCommonKeyKind::Normal => [
                0xeb, 0xe4, 0x2a, 0x22, 0x5e, 0x85, 0x93, 0xe4, 0x48, 0xd9, 0xc5, 0x45, 0x73, 0x81,
                0xaa, 0xf7,
            ],
            WiiCommonKeyKind::Korean => [
                0x63, 0xb8, 0x2b, 0xb4, 0xf4, 0x61, 0x4e, 0x2e, 0x13, 0xf2, 0xfe, 0xfb, 0xba, 0x4c,
                0x9b, 0x7e,
            ],
        }
    }
}

/// Unwraps a ticket's encrypted title key, decrypting it with the common key
/// it names, IV'd with the title ID zero-padded to 16 bytes.
pub fn decrypt_title_key(ticket: &Ticket) -> Result<[u8; 16], Error> {
    let kind = WiiCommonKeyKind::from_index(ticket.common_key_index)?;
    let key = kind.key();
    let mut iv = [0u8; 16];
    iv[..8].copy_from_slice(&ticket.title_id.to_be_bytes());
    let mut title_key = ticket.title_key;
    Aes128CbcDec::new(key.as_ref().into(), iv.as_ref().into())
        .decrypt_padded_mut::<NoPadding>(&mut title_key)
        .map_err(|e| Error::crypto_mismatch(format!("title key decryption failed: {e}")))?;
    Ok(title_key)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_unknown_common_key_index() {
        assert!(WiiCommonKeyKind::from_index(2).is_err());
    }

    #[test]
    fn known_common_key_indices_resolve() {
        assert_eq!(WiiCommonKeyKind::from_index(0).unwrap(), WiiCommonKeyKind::Normal);
        assert_eq!(WiiCommonKeyKind::from_index(1).unwrap(), WiiCommonKeyKind::Korean);
    }
}
