//! Merkle commitment over an ordered list of transaction hashes
//!
//! Nodes are hex strings; a parent is `sha256_hex(left + right)` over the
//! concatenated hex text. Odd levels pair the last hash with itself.

use super::hash::sha256_hex;

fn combine(left: &str, right: &str) -> String {
    let mut data = String::with_capacity(left.len() + right.len());
    data.push_str(left);
    data.push_str(right);
    sha256_hex(data.as_bytes())
}

/// Calculate the merkle root from a list of hashes.
///
/// The caller's slice is never modified. A single hash is its own root and an
/// empty list commits to the hash of the empty string.
pub fn calculate_merkle_root(hashes: &[String]) -> String {
    if hashes.is_empty() {
        return sha256_hex(b"");
    }

    if hashes.len() == 1 {
        return hashes[0].clone();
    }

    let mut current_level: Vec<String> = hashes.to_vec();

    while current_level.len() > 1 {
        current_level = current_level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => combine(left, right),
                [last] => combine(last, last),
                _ => unreachable!("chunks(2) yields one or two items"),
            })
            .collect();
    }

    current_level.remove(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merkle_root_single() {
        let hashes = strings(&["tx1"]);
        assert_eq!(calculate_merkle_root(&hashes), "tx1");
    }

    #[test]
    fn test_merkle_root_two() {
        let hashes = strings(&["hello", "world"]);
        assert_eq!(
            calculate_merkle_root(&hashes),
            sha256_hex(b"helloworld")
        );
    }

    #[test]
    fn test_merkle_root_four() {
        let hashes = strings(&["hello", "world", "foo", "bar"]);
        let left = sha256_hex(b"helloworld");
        let right = sha256_hex(b"foobar");
        let expected = sha256_hex(format!("{}{}", left, right).as_bytes());
        assert_eq!(calculate_merkle_root(&hashes), expected);
    }

    #[test]
    fn test_merkle_root_odd_duplicates_last() {
        let hashes = strings(&["a", "b", "c"]);
        let left = sha256_hex(b"ab");
        let right = sha256_hex(b"cc");
        let expected = sha256_hex(format!("{}{}", left, right).as_bytes());
        assert_eq!(calculate_merkle_root(&hashes), expected);
    }

    #[test]
    fn test_merkle_root_leaves_input_untouched() {
        let hashes = strings(&["a", "b", "c"]);
        let before = hashes.clone();
        calculate_merkle_root(&hashes);
        assert_eq!(hashes, before);
    }

    #[test]
    fn test_empty_merkle_root() {
        assert_eq!(calculate_merkle_root(&[]), sha256_hex(b""));
    }
}
