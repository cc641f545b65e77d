//! URI parser (component B): `scheme://[bucket]/object_key` splitting with
//! default-bucket substitution, ported from `ParseS3Uri`/`FallbackToDefaultBucket`.

use crate::error::DriverError;

/// A parsed `(bucket, object)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub bucket: String,
    pub object: String,
}

/// Split `uri` into `(bucket, object)`, substituting `default_bucket` when
/// the URI's bucket slice is empty.
///
/// Does not normalize `.`, `..`, or repeated `/` in the object part — the
/// object slice is returned verbatim, matching the original driver.
pub fn parse(uri: &str, scheme: &str, default_bucket: Option<&str>) -> Result<ParsedName, DriverError> {
    let prefix = format!("{scheme}://");
    let rest = uri
        .strip_prefix(prefix.as_str())
        .ok_or_else(|| DriverError::InvalidArgument(format!("invalid URI (expected {prefix} prefix): {uri}")))?;

    let slash = rest
        .find('/')
        .ok_or_else(|| DriverError::InvalidArgument(format!("missing object in URI: {uri}")))?;

    let bucket_slice = &rest[..slash];
    let object = &rest[slash + 1..];

    let bucket = if bucket_slice.is_empty() {
        default_bucket
            .filter(|b| !b.is_empty())
            .ok_or_else(|| DriverError::InvalidArgument(format!("no bucket in URI and no default bucket configured: {uri}")))?
            .to_string()
    } else {
        bucket_slice.to_string()
    };

    if object.is_empty() {
        return Err(DriverError::InvalidArgument(format!(
            "empty object key in URI: {uri}"
        )));
    }

    Ok(ParsedName {
        bucket,
        object: object.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_explicit_bucket() {
        let parsed = parse("s3://my-bucket/path/to/object.txt", "s3", None).unwrap();
        assert_eq!(parsed.bucket, "my-bucket");
        assert_eq!(parsed.object, "path/to/object.txt");
    }

    #[test]
    fn falls_back_to_default_bucket() {
        let parsed = parse("s3:///path/to/object.txt", "s3", Some("default")).unwrap();
        assert_eq!(parsed.bucket, "default");
        assert_eq!(parsed.object, "path/to/object.txt");
    }

    #[test]
    fn missing_bucket_without_default_is_invalid_argument() {
        let err = parse("s3:///x", "s3", None).unwrap_err();
        assert!(matches!(err, DriverError::InvalidArgument(_)));
    }

    #[test]
    fn missing_prefix_is_invalid_argument() {
        let err = parse("noprefix", "s3", Some("default")).unwrap_err();
        assert!(matches!(err, DriverError::InvalidArgument(_)));
    }

    #[test]
    fn missing_slash_after_prefix_is_invalid_argument() {
        let err = parse("s3://bucket-no-slash", "s3", None).unwrap_err();
        assert!(matches!(err, DriverError::InvalidArgument(_)));
    }

    #[test]
    fn does_not_normalize_object_path() {
        let parsed = parse("s3://bucket//a/../b", "s3", None).unwrap();
        assert_eq!(parsed.object, "/a/../b");
    }

    proptest::proptest! {
        #[test]
        fn round_trips_for_non_empty_bucket_and_object(
            b in "[a-z0-9][a-z0-9.-]{0,20}",
            o in "[a-zA-Z0-9/_.-]{1,40}",
        ) {
            if !o.starts_with('/') {
                let uri = format!("s3://{b}/{o}");
                let parsed = parse(&uri, "s3", None).unwrap();
                proptest::prop_assert_eq!(parsed.bucket, b);
                proptest::prop_assert_eq!(parsed.object, o);
            }
        }
    }
}
