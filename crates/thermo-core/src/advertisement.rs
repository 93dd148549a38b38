//! Advertising data parsing.
//!
//! Advertising payloads are a sequence of AD structures, each laid out as
//! `[length][type][payload; length - 1]`. A zero length byte is an empty
//! structure and the walk moves on to the next byte. Structures that claim
//! to run past the end of the buffer end the walk; nothing outside the
//! buffer is ever read.

use thermo_types::uuids::{
    AD_TYPE_COMPLETE_NAME, AD_TYPE_COMPLETE_UUID16, AD_TYPE_INCOMPLETE_UUID16,
    AD_TYPE_SHORTENED_NAME,
};

/// Iterator over the AD structures of an advertising payload.
///
/// Yields `(ad_type, payload)` pairs.
#[derive(Debug, Clone)]
pub struct AdStructures<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> AdStructures<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let len = usize::from(*self.data.get(self.offset)?);
            if len == 0 {
                self.offset += 1;
                continue;
            }
            let end = self.offset + len;
            if end >= self.data.len() {
                self.offset = self.data.len();
                return None;
            }

            let ad_type = self.data[self.offset + 1];
            let payload = &self.data[self.offset + 2..=end];
            self.offset = end + 1;
            return Some((ad_type, payload));
        }
    }
}

/// Whether the payload advertises `uuid` as its first 16-bit service UUID.
///
/// Only the leading UUID of each complete or incomplete 16-bit UUID list is
/// compared, matching how thermometers advertise their primary service.
pub fn contains_service_uuid(data: &[u8], uuid: u16) -> bool {
    let target = uuid.to_le_bytes();
    AdStructures::new(data).any(|(ad_type, payload)| {
        matches!(ad_type, AD_TYPE_INCOMPLETE_UUID16 | AD_TYPE_COMPLETE_UUID16)
            && payload.starts_with(&target)
    })
}

/// Advertised local name, preferring the complete name over a shortened one.
pub fn local_name(data: &[u8]) -> Option<String> {
    let mut shortened = None;
    for (ad_type, payload) in AdStructures::new(data) {
        match ad_type {
            AD_TYPE_COMPLETE_NAME => return Some(String::from_utf8_lossy(payload).into_owned()),
            AD_TYPE_SHORTENED_NAME if shortened.is_none() => {
                shortened = Some(String::from_utf8_lossy(payload).into_owned());
            }
            _ => {}
        }
    }
    shortened
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use thermo_types::uuids::HEALTH_THERMOMETER_SERVICE;

    const FLAGS: [u8; 3] = [0x02, 0x01, 0x06];

    fn thermometer_adv() -> Vec<u8> {
        let mut data = FLAGS.to_vec();
        data.extend_from_slice(&[0x03, 0x03, 0x09, 0x18]);
        data.extend_from_slice(&[0x06, 0x09, b'T', b'h', b'e', b'r', b'm']);
        data
    }

    #[test]
    fn test_finds_complete_uuid_list() {
        assert!(contains_service_uuid(&thermometer_adv(), HEALTH_THERMOMETER_SERVICE));
    }

    #[test]
    fn test_finds_incomplete_uuid_list() {
        let data = [0x05, 0x02, 0x09, 0x18, 0x0F, 0x18];
        assert!(contains_service_uuid(&data, 0x1809));
    }

    #[test]
    fn test_only_leading_uuid_is_compared() {
        let data = [0x05, 0x03, 0x0F, 0x18, 0x09, 0x18];
        assert!(!contains_service_uuid(&data, 0x1809));
        assert!(contains_service_uuid(&data, 0x180F));
    }

    #[test]
    fn test_other_ad_types_ignored() {
        // Service data carrying the same bytes does not count
        let data = [0x05, 0x16, 0x09, 0x18, 0x00, 0x00];
        assert!(!contains_service_uuid(&data, 0x1809));
    }

    #[test]
    fn test_empty_buffer() {
        assert!(!contains_service_uuid(&[], 0x1809));
        assert_eq!(AdStructures::new(&[]).count(), 0);
        assert_eq!(local_name(&[]), None);
    }

    #[test]
    fn test_zero_length_is_skipped() {
        let data = [0x00, 0x03, 0x03, 0x09, 0x18];
        assert!(contains_service_uuid(&data, 0x1809));
    }

    #[test]
    fn test_zero_padding_between_structures() {
        let data = [0x02, 0x01, 0x06, 0x00, 0x00, 0x03, 0x03, 0x09, 0x18, 0x00];
        let types: Vec<u8> = AdStructures::new(&data).map(|(t, _)| t).collect();
        assert_eq!(types, vec![0x01, 0x03]);
        assert!(contains_service_uuid(&data, 0x1809));
    }

    #[test]
    fn test_all_padding() {
        assert_eq!(AdStructures::new(&[0x00; 31]).count(), 0);
    }

    #[test]
    fn test_overrunning_structure_not_read() {
        // Declares 9 bytes but only 3 follow
        let data = [0x09, 0x03, 0x09, 0x18];
        assert!(!contains_service_uuid(&data, 0x1809));
        assert_eq!(AdStructures::new(&data).count(), 0);
    }

    #[test]
    fn test_structure_too_short_for_uuid() {
        let data = [0x02, 0x03, 0x09];
        assert!(!contains_service_uuid(&data, 0x1809));
    }

    #[test]
    fn test_structures_iterated_in_order() {
        let data = thermometer_adv();
        let types: Vec<u8> = AdStructures::new(&data).map(|(t, _)| t).collect();
        assert_eq!(types, vec![0x01, 0x03, 0x09]);
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(&thermometer_adv()).as_deref(), Some("Therm"));

        let shortened = [0x03, 0x08, b'T', b'h'];
        assert_eq!(local_name(&shortened).as_deref(), Some("Th"));

        let both = [0x03, 0x08, b'T', b'h', 0x04, 0x09, b'T', b'h', b'x'];
        assert_eq!(local_name(&both).as_deref(), Some("Thx"));
    }

    proptest! {
        #[test]
        fn prop_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64), uuid in any::<u16>()) {
            let _ = contains_service_uuid(&data, uuid);
            let _ = local_name(&data);
            for (_, payload) in AdStructures::new(&data) {
                prop_assert!(payload.len() < data.len());
            }
        }

        #[test]
        fn prop_uuid_structure_is_found(
            prefix in proptest::collection::vec((1u8..8, 0x10u8..0xFF), 0..4),
            uuid in any::<u16>(),
            complete in any::<bool>(),
        ) {
            let mut data = Vec::new();
            for (len, ad_type) in prefix {
                data.push(len);
                data.push(ad_type);
                data.extend(std::iter::repeat_n(0xAA, usize::from(len) - 1));
            }
            let ad_type = if complete { AD_TYPE_COMPLETE_UUID16 } else { AD_TYPE_INCOMPLETE_UUID16 };
            data.push(3);
            data.push(ad_type);
            data.extend_from_slice(&uuid.to_le_bytes());
            prop_assert!(contains_service_uuid(&data, uuid));
        }
    }
}
