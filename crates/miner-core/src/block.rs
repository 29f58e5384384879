//! Block template data model and the 80-byte header codec.

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;
use crate::hash::{double_sha256, reverse_bytes};

/// Size of a serialized block header in bytes.
pub const BLOCK_HEADER_SIZE: usize = 80;

/// Offset of the nonce inside a serialized header.
pub const NONCE_OFFSET: usize = 76;

/// Chain-tip metadata a block is mined on top of.
///
/// Hash fields are display-order hex strings. A template is immutable once
/// finalized for an epoch; the next refresh replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockTemplate {
    pub version: i32,
    pub previous_block_hash: String,
    pub merkle_root: String,
    pub timestamp: u32,
    /// Compact target as hex (`0x1d00ffff` or `1d00ffff`) or decimal.
    pub bits: String,
    pub height: i32,
    pub difficulty: f64,
    /// Only set on a solved template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u32>,
}

impl BlockTemplate {
    /// Copy of this template carrying a winning nonce.
    pub fn with_nonce(&self, nonce: u32) -> Self {
        BlockTemplate {
            nonce: Some(nonce),
            ..self.clone()
        }
    }
}

/// A block header with every field parsed into its wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    /// Previous block hash (internal byte order).
    pub prev_block_hash: [u8; 32],
    /// Merkle root (internal byte order).
    pub merkle_root: [u8; 32],
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    /// Parse and validate the header fields of a template.
    ///
    /// Fails if either hash is not 32 bytes of hex or `bits` does not parse.
    pub fn from_template(template: &BlockTemplate) -> Result<Self, TemplateError> {
        Ok(BlockHeader {
            version: template.version,
            prev_block_hash: parse_hash_hex("previousBlockHash", &template.previous_block_hash)?,
            merkle_root: parse_hash_hex("merkleRoot", &template.merkle_root)?,
            timestamp: template.timestamp,
            bits: parse_bits(&template.bits)?,
            nonce: template.nonce.unwrap_or(0),
        })
    }

    /// Serialize the block header to 80 bytes.
    pub fn serialize(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut header = [0u8; BLOCK_HEADER_SIZE];
        header[..NONCE_OFFSET].copy_from_slice(&self.serialize_without_nonce());
        header[NONCE_OFFSET..].copy_from_slice(&self.nonce.to_le_bytes());
        header
    }

    /// Serialize everything but the nonce (76 bytes).
    ///
    /// Workers hash the same prefix many times and only patch the nonce.
    pub fn serialize_without_nonce(&self) -> [u8; NONCE_OFFSET] {
        let mut header = [0u8; NONCE_OFFSET];

        header[0..4].copy_from_slice(&self.version.to_le_bytes());
        header[4..36].copy_from_slice(&self.prev_block_hash);
        header[36..68].copy_from_slice(&self.merkle_root);
        header[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        header[72..76].copy_from_slice(&self.bits.to_le_bytes());

        header
    }

    /// Decode a serialized header.
    pub fn deserialize(bytes: &[u8; BLOCK_HEADER_SIZE]) -> Self {
        let word = |offset: usize| -> [u8; 4] {
            let mut out = [0u8; 4];
            out.copy_from_slice(&bytes[offset..offset + 4]);
            out
        };

        let mut prev_block_hash = [0u8; 32];
        prev_block_hash.copy_from_slice(&bytes[4..36]);
        let mut merkle_root = [0u8; 32];
        merkle_root.copy_from_slice(&bytes[36..68]);

        BlockHeader {
            version: i32::from_le_bytes(word(0)),
            prev_block_hash,
            merkle_root,
            timestamp: u32::from_le_bytes(word(68)),
            bits: u32::from_le_bytes(word(72)),
            nonce: u32::from_le_bytes(word(NONCE_OFFSET)),
        }
    }

    /// Compute the header hash (double SHA256).
    pub fn hash(&self) -> [u8; 32] {
        double_sha256(&self.serialize())
    }

    /// Previous block hash in display order.
    pub fn prev_block_hash_hex(&self) -> String {
        hex::encode(reverse_bytes(&self.prev_block_hash))
    }

    /// Merkle root in display order.
    pub fn merkle_root_hex(&self) -> String {
        hex::encode(reverse_bytes(&self.merkle_root))
    }
}

/// Decode a display-order hash into internal byte order.
pub fn parse_hash_hex(field: &'static str, value: &str) -> Result<[u8; 32], TemplateError> {
    let bytes = hex::decode(value).map_err(|_| TemplateError::InvalidHex {
        field,
        value: value.to_string(),
    })?;

    if bytes.len() != 32 {
        return Err(TemplateError::InvalidHashLength {
            field,
            len: bytes.len(),
        });
    }

    let mut hash = [0u8; 32];
    for (i, byte) in bytes.iter().rev().enumerate() {
        hash[i] = *byte;
    }
    Ok(hash)
}

/// Parse the compact `bits` field.
///
/// Accepted encodings, checked in order:
/// - `0x`-prefixed hex (`0x1d00ffff`)
/// - all decimal digits (`486604799`)
/// - bare hex (`1d00ffff`)
///
/// A bare string made only of digits is therefore read as decimal.
pub fn parse_bits(bits: &str) -> Result<u32, TemplateError> {
    let trimmed = bits.trim();
    let invalid = || TemplateError::InvalidBits(bits.to_string());

    if let Some(digits) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        return u32::from_str_radix(digits, 16).map_err(|_| invalid());
    }

    if trimmed.is_empty() {
        return Err(invalid());
    }

    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed.parse::<u32>().map_err(|_| invalid());
    }

    if !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    u32::from_str_radix(trimmed, 16).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn sample_template() -> BlockTemplate {
        BlockTemplate {
            version: 0x2000_0000,
            previous_block_hash:
                "00000000000000000002a7c4c1e48d76c5a37902165a270156b7a8d72728a054".to_string(),
            merkle_root: "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
                .to_string(),
            timestamp: 1_700_000_000,
            bits: "0x17034219".to_string(),
            height: 875_000,
            difficulty: 1.0,
            nonce: None,
        }
    }

    #[test]
    fn test_block_header_serialization() {
        let mut header = BlockHeader {
            version: 0x2000_0000,
            prev_block_hash: [0x12; 32],
            merkle_root: [0x34; 32],
            timestamp: 1_700_000_000,
            bits: 0x1703_4219,
            nonce: 0,
        };
        header.nonce = 0xDEAD_BEEF;

        let serialized = header.serialize();

        assert_eq!(serialized.len(), 80);
        assert_eq!(&serialized[0..4], &[0x00, 0x00, 0x00, 0x20]);
        assert_eq!(&serialized[4..36], &[0x12; 32]);
        assert_eq!(&serialized[36..68], &[0x34; 32]);
        assert_eq!(&serialized[68..72], &1_700_000_000u32.to_le_bytes());
        assert_eq!(&serialized[72..76], &[0x19, 0x42, 0x03, 0x17]);
        assert_eq!(&serialized[76..80], &[0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn test_hash_fields_are_reversed() {
        let template = sample_template();
        let header = BlockHeader::from_template(&template).unwrap();
        let serialized = header.serialize();

        let display = hex::decode(&template.previous_block_hash).unwrap();
        let in_header: Vec<u8> = serialized[4..36].iter().rev().copied().collect();
        assert_eq!(in_header, display);

        // Display order starts with zeros, so the header field ends with them.
        assert_eq!(&serialized[27..36], &[0u8; 9]);
    }

    #[test]
    fn test_header_round_trip() {
        let template = sample_template().with_nonce(0x0102_0304);
        let header = BlockHeader::from_template(&template).unwrap();
        let decoded = BlockHeader::deserialize(&header.serialize());

        assert_eq!(decoded, header);
        assert_eq!(decoded.version, template.version);
        assert_eq!(decoded.prev_block_hash_hex(), template.previous_block_hash);
        assert_eq!(decoded.merkle_root_hex(), template.merkle_root);
        assert_eq!(decoded.timestamp, template.timestamp);
        assert_eq!(decoded.bits, 0x1703_4219);
        assert_eq!(decoded.nonce, 0x0102_0304);
    }

    #[test]
    fn test_prefix_matches_full_header() {
        let header = BlockHeader::from_template(&sample_template()).unwrap();
        assert_eq!(&header.serialize()[..NONCE_OFFSET], &header.serialize_without_nonce());
    }

    #[test]
    fn test_negative_version_encoding() {
        let header = BlockHeader {
            version: -1,
            prev_block_hash: [0; 32],
            merkle_root: [0; 32],
            timestamp: 0,
            bits: 0,
            nonce: 0,
        };
        assert_eq!(&header.serialize()[0..4], &[0xFF; 4]);
        assert_eq!(BlockHeader::deserialize(&header.serialize()).version, -1);
    }

    #[test_case("0x1d00ffff", 0x1d00ffff ; "prefixed hex")]
    #[test_case("0X1D00FFFF", 0x1d00ffff ; "uppercase prefix")]
    #[test_case("1d00ffff", 0x1d00ffff ; "bare hex")]
    #[test_case("486604799", 0x1d00ffff ; "decimal")]
    #[test_case(" 17034219 ", 17_034_219 ; "digits read as decimal")]
    fn test_parse_bits(input: &str, expected: u32) {
        assert_eq!(parse_bits(input).unwrap(), expected);
    }

    #[test_case("" ; "empty")]
    #[test_case("0x" ; "bare prefix")]
    #[test_case("zz00ffff" ; "not hex")]
    #[test_case("1d00ffff00" ; "too wide")]
    #[test_case("99999999999" ; "decimal overflow")]
    #[test_case("+1d00ff" ; "sign")]
    fn test_parse_bits_rejects(input: &str) {
        assert!(matches!(parse_bits(input), Err(TemplateError::InvalidBits(_))));
    }

    #[test]
    fn test_from_template_rejects_bad_hashes() {
        let mut template = sample_template();
        template.previous_block_hash = "xyz".to_string();
        assert!(matches!(
            BlockHeader::from_template(&template),
            Err(TemplateError::InvalidHex { field: "previousBlockHash", .. })
        ));

        let mut template = sample_template();
        template.merkle_root = "abcd".to_string();
        assert_eq!(
            BlockHeader::from_template(&template),
            Err(TemplateError::InvalidHashLength {
                field: "merkleRoot",
                len: 2
            })
        );
    }

    #[test]
    fn test_template_json_field_names() {
        let json = serde_json::to_value(sample_template().with_nonce(7)).unwrap();
        assert_eq!(json["previousBlockHash"], sample_template().previous_block_hash);
        assert_eq!(json["merkleRoot"], sample_template().merkle_root);
        assert_eq!(json["nonce"], 7);

        let unsolved = serde_json::to_value(sample_template()).unwrap();
        assert!(unsolved.get("nonce").is_none());
    }
}
