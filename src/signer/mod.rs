//! EVM transaction construction and raw signing through the signing service
//!
//! No private key ever exists locally. The flow serializes a legacy
//! (EIP-155) transaction, has the service sign its digest, then reassembles
//! the signed transaction from the returned `{r, s, v}`.

mod raw;

pub use raw::{RawSigner, SignOptions};

use crate::error::{Result, TransferError};
use crate::service::MessageSignature;
use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::rlp::{Encodable, Header};

/// Transaction parameters supplied by the caller
///
/// Chain id is resolved by [`RawSigner`]. Nonce and gas price are fetched
/// for every attempt unless pinned; a resumed attempt must pin both.
#[derive(Debug, Clone, PartialEq)]
pub struct TxRequest {
    /// Recipient or contract address
    pub to: Address,
    /// Transaction value in wei
    pub value: U256,
    /// Encoded calldata
    pub data: Bytes,
    pub gas_limit: u64,
    /// Gas price in wei; fetched from the node when `None`
    pub gas_price: Option<u128>,
    /// Nonce; the pending nonce of the vault address when `None`
    pub nonce: Option<u64>,
}

impl TxRequest {
    pub fn new(to: Address, gas_limit: u64) -> Self {
        Self {
            to,
            value: U256::ZERO,
            data: Bytes::new(),
            gas_limit,
            gas_price: None,
            nonce: None,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }
}

/// Fully resolved legacy transaction awaiting a signature
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl UnsignedTransaction {
    fn fields_length(&self) -> usize {
        self.nonce.length()
            + self.gas_price.length()
            + self.gas_limit.length()
            + self.to.length()
            + self.value.length()
            + self.data.length()
    }

    fn encode_fields(&self, out: &mut Vec<u8>) {
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.data.encode(out);
    }

    /// RLP list of the six fields followed by `v`, `r`, `s`
    fn encode_with(&self, v: u128, r: U256, s: U256) -> Vec<u8> {
        let payload_length = self.fields_length() + v.length() + r.length() + s.length();
        let mut out = Vec::with_capacity(payload_length + 4);
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        self.encode_fields(&mut out);
        v.encode(&mut out);
        r.encode(&mut out);
        s.encode(&mut out);
        out
    }

    /// EIP-155 signing payload: `rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0])`
    pub fn signing_payload(&self) -> Vec<u8> {
        self.encode_with(self.chain_id as u128, U256::ZERO, U256::ZERO)
    }

    /// Digest the signing service must sign
    pub fn signing_hash(&self) -> B256 {
        keccak256(self.signing_payload())
    }

    /// Attach a signature returned by the signing service
    pub fn into_signed(self, signature: &MessageSignature) -> Result<SignedTransaction> {
        let r = parse_scalar(&signature.r, "r")?;
        let s = parse_scalar(&signature.s, "s")?;
        let v = eip155_v(self.chain_id, signature.v)?;

        let raw = Bytes::from(self.encode_with(v, r, s));
        let hash = keccak256(&raw);

        Ok(SignedTransaction {
            transaction: self,
            v,
            r,
            s,
            raw,
            hash,
        })
    }
}

/// Legacy transaction with its EIP-155 signature, ready to broadcast
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTransaction {
    pub transaction: UnsignedTransaction,
    pub v: u128,
    pub r: U256,
    pub s: U256,
    /// RLP-encoded signed transaction
    pub raw: Bytes,
    /// Transaction hash (keccak256 of `raw`)
    pub hash: B256,
}

impl SignedTransaction {
    /// `0x`-prefixed hex of the raw transaction
    pub fn to_hex(&self) -> String {
        alloy::hex::encode_prefixed(&self.raw)
    }
}

/// `v = chainId * 2 + (recoveryId + 35)`; a 27/28 recovery id is normalized first
pub fn eip155_v(chain_id: u64, recovery_id: u8) -> Result<u128> {
    let parity = match recovery_id {
        0 | 1 => recovery_id,
        27 | 28 => recovery_id - 27,
        other => {
            return Err(TransferError::Encoding(format!(
                "Invalid signature recovery id {}",
                other
            )))
        }
    };
    Ok(chain_id as u128 * 2 + (parity as u128 + 35))
}

fn parse_scalar(hex: &str, name: &str) -> Result<U256> {
    let digits = hex.trim().trim_start_matches("0x");
    if digits.is_empty() || digits.len() > 64 {
        return Err(TransferError::Encoding(format!(
            "Invalid signature component {}: '{}'",
            name, hex
        )));
    }
    U256::from_str_radix(digits, 16).map_err(|e| {
        TransferError::Encoding(format!("Invalid signature component {}: {}", name, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::consensus::{SignableTransaction, TxLegacy};
    use alloy::primitives::{address, TxKind};
    use alloy::rlp::Decodable;

    fn sample() -> UnsignedTransaction {
        UnsignedTransaction {
            chain_id: 1,
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: address!("0x3535353535353535353535353535353535353535"),
            value: U256::from(1_000_000_000_000_000_000u128),
            data: Bytes::new(),
        }
    }

    #[test]
    fn test_signing_hash_matches_eip155_reference() {
        // EIP-155 example transaction
        let tx = sample();
        assert_eq!(
            alloy::hex::encode(tx.signing_payload()),
            "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080"
        );
        assert_eq!(
            tx.signing_hash().to_string(),
            "0xdaf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_signing_hash_matches_alloy_legacy() {
        let tx = UnsignedTransaction {
            chain_id: 42161,
            data: Bytes::from(vec![0xa9, 0x05, 0x9c, 0xbb]),
            ..sample()
        };
        let legacy = TxLegacy {
            chain_id: Some(tx.chain_id),
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            to: TxKind::Call(tx.to),
            value: tx.value,
            input: tx.data.clone(),
        };
        assert_eq!(tx.signing_hash(), legacy.signature_hash());
    }

    #[test]
    fn test_into_signed_encodes_eip155_v() {
        let signature = MessageSignature {
            r: "28ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276".into(),
            s: "67cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83".into(),
            v: 0,
            full_sig: None,
        };
        let signed = sample().into_signed(&signature).unwrap();
        assert_eq!(signed.v, 37);
        assert_eq!(
            signed.to_hex(),
            "0xf86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
        assert_eq!(signed.hash, keccak256(&signed.raw));
    }

    #[test]
    fn test_signed_round_trips_through_rlp() {
        let signature = MessageSignature {
            r: "0x01".into(),
            s: "02".into(),
            v: 1,
            full_sig: None,
        };
        let tx = UnsignedTransaction {
            chain_id: 11155111,
            ..sample()
        };
        let signed = tx.clone().into_signed(&signature).unwrap();

        let buf = &mut &signed.raw[..];
        let header = Header::decode(buf).unwrap();
        assert!(header.list);
        assert_eq!(u64::decode(buf).unwrap(), tx.nonce);
        assert_eq!(u128::decode(buf).unwrap(), tx.gas_price);
        assert_eq!(u64::decode(buf).unwrap(), tx.gas_limit);
        assert_eq!(Address::decode(buf).unwrap(), tx.to);
        assert_eq!(U256::decode(buf).unwrap(), tx.value);
        assert_eq!(Bytes::decode(buf).unwrap(), tx.data);
        assert_eq!(u128::decode(buf).unwrap(), 11155111u128 * 2 + 36);
        assert_eq!(U256::decode(buf).unwrap(), U256::from(1));
        assert_eq!(U256::decode(buf).unwrap(), U256::from(2));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_eip155_v() {
        assert_eq!(eip155_v(1, 0).unwrap(), 37);
        assert_eq!(eip155_v(1, 1).unwrap(), 38);
        assert_eq!(eip155_v(1, 28).unwrap(), 38);
        assert_eq!(eip155_v(42161, 1).unwrap(), 42161 * 2 + 36);
        assert!(eip155_v(1, 5).is_err());
    }

    #[test]
    fn test_bad_signature_components() {
        let mut signature = MessageSignature {
            r: "zz".into(),
            s: "01".into(),
            v: 0,
            full_sig: None,
        };
        assert!(matches!(
            sample().into_signed(&signature),
            Err(TransferError::Encoding(_))
        ));
        signature.r = "".into();
        assert!(matches!(
            sample().into_signed(&signature),
            Err(TransferError::Encoding(_))
        ));
    }
}
