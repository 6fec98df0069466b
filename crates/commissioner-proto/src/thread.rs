//! Thread operational dataset inspection.
//!
//! The dataset is a flat sequence of `type(1) | length(1) | value(length)`
//! elements. The commissioner only needs the extended PAN id, which is the
//! network id used by `ConnectNetwork` and `RemoveNetwork`.

use crate::errors::{ProtocolError, Result};

/// TLV type of the extended PAN id.
pub const EXTENDED_PAN_ID_TLV: u8 = 2;

/// Length of the extended PAN id.
pub const EXTENDED_PAN_ID_LEN: usize = 8;

/// Extract the extended PAN id from an operational dataset.
pub fn extended_pan_id(dataset: &[u8]) -> Result<[u8; EXTENDED_PAN_ID_LEN]> {
    let mut offset = 0;
    while offset < dataset.len() {
        let header = dataset
            .get(offset..offset + 2)
            .ok_or(ProtocolError::Truncated { offset, needed: offset + 2 - dataset.len() })?;
        let (tlv, len) = (header[0], usize::from(header[1]));
        let start = offset + 2;
        let value = dataset.get(start..start + len).ok_or(ProtocolError::Truncated {
            offset,
            needed: start + len - dataset.len(),
        })?;

        if tlv == EXTENDED_PAN_ID_TLV {
            return value.try_into().map_err(|_| ProtocolError::InvalidLength {
                tlv,
                expected: EXTENDED_PAN_ID_LEN,
                actual: len,
            });
        }
        offset = start + len;
    }
    Err(ProtocolError::MissingTlv(EXTENDED_PAN_ID_TLV))
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn finds_extended_pan_id_after_other_elements() {
        // channel (0), pan id (1), extended pan id (2)
        let dataset = hex!("000300000f 01021234 0208dead00beef00cafe");
        assert_eq!(extended_pan_id(&dataset), Ok(hex!("dead00beef00cafe")));
    }

    #[test]
    fn missing_extended_pan_id() {
        let dataset = hex!("000300000f");
        assert_eq!(extended_pan_id(&dataset), Err(ProtocolError::MissingTlv(2)));
    }

    #[test]
    fn wrong_length_is_rejected() {
        let dataset = hex!("0204deadbeef");
        assert!(matches!(
            extended_pan_id(&dataset),
            Err(ProtocolError::InvalidLength { tlv: 2, expected: 8, actual: 4 })
        ));
    }

    #[test]
    fn truncated_value_is_rejected() {
        let dataset = hex!("0208dead");
        assert!(matches!(extended_pan_id(&dataset), Err(ProtocolError::Truncated { .. })));
    }
}
