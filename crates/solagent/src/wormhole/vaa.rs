use eyre::Context as _;
use std::fmt;

/// Token bridge payload kinds, keyed by the payload's first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaaKind {
    Transfer,
    AttestMeta,
    TransferWithPayload,
}

impl VaaKind {
    pub const fn payload_id(self) -> u8 {
        match self {
            Self::Transfer => 1,
            Self::AttestMeta => 2,
            Self::TransferWithPayload => 3,
        }
    }

    pub const fn from_payload_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Transfer),
            2 => Some(Self::AttestMeta),
            3 => Some(Self::TransferWithPayload),
            _ => None,
        }
    }
}

impl fmt::Display for VaaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transfer => "TokenBridge:Transfer",
            Self::AttestMeta => "TokenBridge:AttestMeta",
            Self::TransferWithPayload => "TokenBridge:TransferWithPayload",
        })
    }
}

#[derive(Debug, Clone)]
pub struct VaaSig {
    pub guardian_index: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

#[derive(Debug, Clone)]
pub struct ParsedVaa {
    pub version: u8,
    pub guardian_set_index: u32,
    pub signatures: Vec<VaaSig>,
    pub timestamp: u32,
    pub nonce: u32,
    pub emitter_chain: u16,
    pub emitter_address: [u8; 32],
    pub sequence: u64,
    pub consistency_level: u8,
    pub payload: Vec<u8>,
}

/// A guardian-signed VAA: raw bytes as submitted on-chain plus the decoded envelope.
#[derive(Debug, Clone)]
pub struct SignedVaa {
    pub bytes: Vec<u8>,
    pub parsed: ParsedVaa,
    pub kind: Option<VaaKind>,
}

impl SignedVaa {
    pub fn decode(bytes: Vec<u8>) -> eyre::Result<Self> {
        let parsed = parse_vaa(&bytes)?;
        let kind = parsed
            .payload
            .first()
            .copied()
            .and_then(VaaKind::from_payload_id);
        Ok(Self {
            bytes,
            parsed,
            kind,
        })
    }
}

fn read_array<const N: usize>(b: &[u8], i: &mut usize, what: &'static str) -> eyre::Result<[u8; N]> {
    let end = i.checked_add(N).ok_or_else(|| eyre::eyre!("{what}: offset overflow"))?;
    let v: [u8; N] = b
        .get(*i..end)
        .ok_or_else(|| eyre::eyre!("{what}: unexpected eof"))?
        .try_into()
        .with_context(|| format!("{what} slice conversion"))?;
    *i = end;
    Ok(v)
}

fn read_u8(b: &[u8], i: &mut usize, what: &'static str) -> eyre::Result<u8> {
    let [v] = read_array::<1>(b, i, what)?;
    Ok(v)
}

fn read_u16_be(b: &[u8], i: &mut usize, what: &'static str) -> eyre::Result<u16> {
    read_array(b, i, what).map(u16::from_be_bytes)
}

fn read_u32_be(b: &[u8], i: &mut usize, what: &'static str) -> eyre::Result<u32> {
    read_array(b, i, what).map(u32::from_be_bytes)
}

fn read_u64_be(b: &[u8], i: &mut usize, what: &'static str) -> eyre::Result<u64> {
    read_array(b, i, what).map(u64::from_be_bytes)
}

pub fn parse_vaa(vaa: &[u8]) -> eyre::Result<ParsedVaa> {
    let mut i = 0_usize;
    let version = read_u8(vaa, &mut i, "version")?;
    if version != 1 {
        eyre::bail!("unsupported vaa version {version}");
    }
    let guardian_set_index = read_u32_be(vaa, &mut i, "guardian_set_index")?;
    let sig_count = read_u8(vaa, &mut i, "sig_count")?;

    let mut signatures = Vec::with_capacity(usize::from(sig_count));
    for _ in 0..sig_count {
        signatures.push(VaaSig {
            guardian_index: read_u8(vaa, &mut i, "sig index")?,
            r: read_array(vaa, &mut i, "sig r")?,
            s: read_array(vaa, &mut i, "sig s")?,
            v: read_u8(vaa, &mut i, "sig v")?,
        });
    }

    let timestamp = read_u32_be(vaa, &mut i, "timestamp")?;
    let nonce = read_u32_be(vaa, &mut i, "nonce")?;
    let emitter_chain = read_u16_be(vaa, &mut i, "emitter_chain")?;
    let emitter_address = read_array(vaa, &mut i, "emitter_address")?;
    let sequence = read_u64_be(vaa, &mut i, "sequence")?;
    let consistency_level = read_u8(vaa, &mut i, "consistency_level")?;
    let payload = vaa.get(i..).unwrap_or_default().to_vec();

    Ok(ParsedVaa {
        version,
        guardian_set_index,
        signatures,
        timestamp,
        nonce,
        emitter_chain,
        emitter_address,
        sequence,
        consistency_level,
        payload,
    })
}

/// Token bridge transfer payload (id 1), the fields needed to route a redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPayload {
    /// Amount normalized to at most 8 decimals.
    pub amount: [u8; 32],
    pub token_address: [u8; 32],
    pub token_chain: u16,
    pub to: [u8; 32],
    pub to_chain: u16,
}

// 1 | amount[32] | token_address[32] | token_chain[2] | to[32] | to_chain[2] | fee[32]
pub fn parse_transfer_payload(payload: &[u8]) -> eyre::Result<TransferPayload> {
    let mut i = 0_usize;
    let id = read_u8(payload, &mut i, "payload id")?;
    if id != VaaKind::Transfer.payload_id() && id != VaaKind::TransferWithPayload.payload_id() {
        eyre::bail!("unexpected transfer payload id {id}");
    }
    Ok(TransferPayload {
        amount: read_array(payload, &mut i, "amount")?,
        token_address: read_array(payload, &mut i, "token_address")?,
        token_chain: read_u16_be(payload, &mut i, "token_chain")?,
        to: read_array(payload, &mut i, "to")?,
        to_chain: read_u16_be(payload, &mut i, "to_chain")?,
    })
}

/// Token bridge asset metadata payload (id 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMeta {
    pub token_address: [u8; 32],
    pub token_chain: u16,
    pub decimals: u8,
    pub symbol: String,
    pub name: String,
}

fn padded_string(b: &[u8; 32]) -> String {
    let end = b.iter().position(|c| *c == 0).unwrap_or(b.len());
    String::from_utf8_lossy(b.get(..end).unwrap_or_default()).into_owned()
}

// 2 | token_address[32] | token_chain[2] | decimals[1] | symbol[32] | name[32]
pub fn parse_asset_meta(payload: &[u8]) -> eyre::Result<AssetMeta> {
    let mut i = 0_usize;
    let id = read_u8(payload, &mut i, "payload id")?;
    if id != VaaKind::AttestMeta.payload_id() {
        eyre::bail!("unexpected attestation payload id {id}");
    }
    let token_address = read_array(payload, &mut i, "token_address")?;
    let token_chain = read_u16_be(payload, &mut i, "token_chain")?;
    let decimals = read_u8(payload, &mut i, "decimals")?;
    let symbol = read_array::<32>(payload, &mut i, "symbol")?;
    let name = read_array::<32>(payload, &mut i, "name")?;
    Ok(AssetMeta {
        token_address,
        token_chain,
        decimals,
        symbol: padded_string(&symbol),
        name: padded_string(&name),
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn decodes_envelope_and_kind() -> eyre::Result<()> {
        let payload = attest_meta_payload([5; 32], 6, "USDC");
        let bytes = vaa_bytes(1, [9; 32], 77, &payload);
        let vaa = SignedVaa::decode(bytes)?;
        assert_eq!(vaa.kind, Some(VaaKind::AttestMeta));
        assert_eq!(vaa.parsed.guardian_set_index, 3);
        assert_eq!(vaa.parsed.signatures.len(), 1);
        assert_eq!(vaa.parsed.emitter_chain, 1);
        assert_eq!(vaa.parsed.sequence, 77);
        let meta = parse_asset_meta(&vaa.parsed.payload)?;
        assert_eq!(meta.decimals, 6);
        assert_eq!(meta.symbol, "USDC");
        Ok(())
    }

    #[test]
    fn truncated_vaa_is_rejected() {
        let bytes = vaa_bytes(1, [9; 32], 1, &[]);
        let cut = bytes.get(..40).unwrap_or_default();
        assert!(parse_vaa(cut).is_err());
        assert!(parse_vaa(&[]).is_err());
        assert!(parse_vaa(&[2, 0, 0, 0, 0, 0]).is_err(), "version 2 is not v1");
    }

    #[test]
    fn transfer_payload_routes_to_destination() -> eyre::Result<()> {
        let mut to = [0_u8; 32];
        if let Some(b) = to.get_mut(31) {
            *b = 0xee;
        }
        let p = transfer_payload([1; 32], to, 10004);
        let t = parse_transfer_payload(&p)?;
        assert_eq!(t.to_chain, 10004);
        assert_eq!(t.token_chain, 1);
        assert_eq!(t.to, to);
        assert!(parse_transfer_payload(&attest_meta_payload([0; 32], 6, "X")).is_err());
        Ok(())
    }

    #[test]
    fn kind_names_follow_sdk_tags() {
        assert_eq!(VaaKind::AttestMeta.to_string(), "TokenBridge:AttestMeta");
        assert_eq!(VaaKind::from_payload_id(1), Some(VaaKind::Transfer));
        assert_eq!(VaaKind::from_payload_id(9), None);
    }
}
