//! Bucket hashing for the directory index.

use crate::codepage::Codepage;
use crate::error::Result;

/// Number of buckets in every FL4 directory index
pub const BUCKET_COUNT: usize = 512;

/// Modulus of the bucket hash. Buckets 509 to 511 are never used.
const MODULUS: u32 = 509;

/// Fold `name` into a bucket index in `0..509`.
///
/// `name` must already be the upper-cased, encoded file name.
///
/// ```
/// assert_eq!(aaru_fl4::hash::bucket_hash(b"A"), 65);
/// ```
pub fn bucket_hash(name: &[u8]) -> usize {
    name.iter()
        .fold(0u32, |acc, &byte| ((acc << 8) + byte as u32) % MODULUS) as usize
}

/// Bucket used for the entry called `name`.
///
/// Only the file name takes part in the hash, so `data\a.txt` and `A.TXT`
/// land in the same bucket.
pub fn bucket_for_name(name: &str, codepage: Codepage) -> Result<usize> {
    let upper = upper_case(file_name(name));
    Ok(bucket_hash(&codepage.encode(&upper)?))
}

/// Upper-case one character at a time. Characters whose upper case form
/// is longer than one character (`ß`, ligatures) stay as they are, the way
/// the games hash them.
fn upper_case(name: &str) -> String {
    name.chars()
        .map(|c| {
            let mut upper = c.to_uppercase();
            match (upper.next(), upper.next()) {
                (Some(single), None) => single,
                _ => c,
            }
        })
        .collect()
}

/// Last component of a relative entry name, accepting either separator.
pub fn file_name(name: &str) -> &str {
    name.rsplit(['\\', '/']).next().unwrap_or(name)
}

/// Extension of an entry name including the leading dot, if there is one.
pub fn extension(name: &str) -> Option<&str> {
    let file = file_name(name);
    match file.rfind('.') {
        Some(dot) if dot + 1 < file.len() => Some(&file[dot..]),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{bucket_for_name, bucket_hash, extension, file_name, upper_case};
    use crate::codepage::Codepage;
    use crate::error::Result;

    #[test]
    fn hash_single_byte() {
        assert_eq!(bucket_hash(b"A"), 65);
        assert_eq!(bucket_hash(b""), 0);
    }

    #[test]
    fn hash_known_names() {
        assert_eq!(bucket_hash(b"A.TXT"), 94);
        assert_eq!(bucket_hash(b"HELLO.BM2"), 282);
        assert_eq!(bucket_hash(b"WORLD.TXT"), 84);
    }

    #[test]
    fn hash_stays_in_range() {
        let mut name = Vec::new();
        for byte in (0..=255u8).cycle().take(2048) {
            name.push(byte);
            assert!(bucket_hash(&name) < 509);
        }
        assert!(bucket_hash(&[0xFF; 255]) < 509);
    }

    #[test]
    fn hash_uses_upper_case_file_name() -> Result<()> {
        let expected = bucket_hash(b"A.TXT");
        assert_eq!(bucket_for_name("a.txt", Codepage::UTF_8)?, expected);
        assert_eq!(bucket_for_name("data\\sub\\A.txt", Codepage::UTF_8)?, expected);
        assert_eq!(bucket_for_name("data/a.TXT", Codepage::UTF_8)?, expected);
        Ok(())
    }

    #[test]
    fn upper_case_keeps_length() -> Result<()> {
        assert_eq!(upper_case("straße.txt"), "STRAßE.TXT");
        assert_eq!(upper_case("ﬁle.bm2"), "ﬁLE.BM2");
        assert_eq!(upper_case("émile.txt"), "ÉMILE.TXT");
        assert_eq!(
            bucket_for_name("straße.txt", Codepage::UTF_8)?,
            bucket_hash("STRAßE.TXT".as_bytes())
        );
        Ok(())
    }

    #[test]
    fn split_names() {
        assert_eq!(file_name("a\\b\\c.bm2"), "c.bm2");
        assert_eq!(file_name("a/b.txt"), "b.txt");
        assert_eq!(file_name("plain"), "plain");
        assert_eq!(extension("a\\b\\c.bm2"), Some(".bm2"));
        assert_eq!(extension("dir.d\\noext"), None);
        assert_eq!(extension("trailing."), None);
        assert_eq!(extension(".BM2"), Some(".BM2"));
    }
}
