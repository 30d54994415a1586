//! Typed identifiers for the provider resources volsnap touches.

use crate::define_id;

define_id!(InstanceId, "instance");
define_id!(VolumeId, "volume");
define_id!(SnapshotId, "snapshot");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IdError;
    use proptest::prelude::*;

    #[test]
    fn test_volume_id_parse() {
        let id: VolumeId = "vol-0123456789abcdef0".parse().unwrap();
        assert_eq!(id.as_str(), "vol-0123456789abcdef0");
        assert_eq!(id.to_string(), "vol-0123456789abcdef0");
    }

    #[test]
    fn test_id_empty() {
        let result: Result<SnapshotId, _> = "".parse();
        let err = result.unwrap_err();
        assert!(err.is_empty());
        assert_eq!(err.kind(), "snapshot");
    }

    #[test]
    fn test_id_rejects_whitespace() {
        let result: Result<InstanceId, _> = "i-0abc def".parse();
        assert!(matches!(
            result.unwrap_err(),
            IdError::InvalidCharacter { found: ' ', .. }
        ));

        let result: Result<VolumeId, _> = "vol-1\n".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_id_serde_is_plain_string() {
        let id = SnapshotId::parse("snap-0f00").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"snap-0f00\"");

        let parsed: SnapshotId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_id_deserialize_rejects_empty() {
        let result: Result<VolumeId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_ids_order_lexically() {
        let mut ids = vec![
            VolumeId::parse("vol-c").unwrap(),
            VolumeId::parse("vol-a").unwrap(),
            VolumeId::parse("vol-b").unwrap(),
        ];
        ids.sort();
        let raw: Vec<_> = ids.iter().map(VolumeId::as_str).collect();
        assert_eq!(raw, vec!["vol-a", "vol-b", "vol-c"]);
    }

    proptest! {
        #[test]
        fn prop_visible_ascii_is_accepted(s in "[!-~]{1,64}") {
            let id = VolumeId::parse(&s).unwrap();
            prop_assert_eq!(id.as_str(), s.as_str());
        }

        #[test]
        fn prop_embedded_space_is_rejected(a in "[a-z0-9-]{1,16}", b in "[a-z0-9-]{1,16}") {
            let s = format!("{a} {b}");
            prop_assert!(SnapshotId::parse(&s).is_err());
        }
    }
}
