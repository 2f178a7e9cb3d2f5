//! Solana side of the Wormhole token bridge: account derivations, instruction encoding and
//! the attest / transfer transactions.

use super::WormholeMessageId;
use crate::chains::{solana::SolanaChain, Chain, SolanaWormholePrograms};
use crate::errors::BridgeError;
use borsh::{BorshDeserialize, BorshSerialize};
use eyre::Context as _;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    program_pack::Pack as _,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer as _,
};
use solana_system_interface::instruction as system_instruction;
use spl_associated_token_account::get_associated_token_address;

const METAPLEX_PROGRAM: &str = "metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s";
const SEQUENCE_LOG_PREFIX: &str = "Program log: Sequence: ";

fn pda(program_id: &Pubkey, seeds: &[&[u8]]) -> Pubkey {
    let (pk, _) = Pubkey::find_program_address(seeds, program_id);
    pk
}

pub fn core_bridge_bridge_state(core_bridge: &Pubkey) -> Pubkey {
    pda(core_bridge, &[b"Bridge"])
}

pub fn core_bridge_fee_collector(core_bridge: &Pubkey) -> Pubkey {
    pda(core_bridge, &[b"fee_collector"])
}

pub fn core_bridge_sequence(core_bridge: &Pubkey, emitter: &Pubkey) -> Pubkey {
    pda(core_bridge, &[b"Sequence", emitter.as_ref()])
}

pub fn token_bridge_config(token_bridge: &Pubkey) -> Pubkey {
    pda(token_bridge, &[b"config"])
}

pub fn token_bridge_emitter(token_bridge: &Pubkey) -> Pubkey {
    pda(token_bridge, &[b"emitter"])
}

pub fn token_bridge_authority_signer(token_bridge: &Pubkey) -> Pubkey {
    pda(token_bridge, &[b"authority_signer"])
}

pub fn token_bridge_custody_signer(token_bridge: &Pubkey) -> Pubkey {
    pda(token_bridge, &[b"custody_signer"])
}

pub fn token_bridge_custody(token_bridge: &Pubkey, mint: &Pubkey) -> Pubkey {
    pda(token_bridge, &[mint.as_ref()])
}

pub fn token_bridge_wrapped_mint(
    token_bridge: &Pubkey,
    token_chain: u16,
    token_address: [u8; 32],
) -> Pubkey {
    pda(
        token_bridge,
        &[b"wrapped", &token_chain.to_be_bytes(), &token_address],
    )
}

pub fn token_bridge_wrapped_meta(token_bridge: &Pubkey, mint: &Pubkey) -> Pubkey {
    pda(token_bridge, &[b"meta", mint.as_ref()])
}

fn spl_metadata(mint: &Pubkey) -> eyre::Result<Pubkey> {
    let metaplex = SolanaChain::parse_pubkey(METAPLEX_PROGRAM)?;
    Ok(pda(&metaplex, &[b"metadata", metaplex.as_ref(), mint.as_ref()]))
}

#[repr(u8)]
enum TokenBridgeIx {
    AttestToken = 1,
    TransferWrapped = 4,
    TransferNative = 5,
}

#[derive(Default, BorshSerialize, BorshDeserialize)]
struct AttestTokenData {
    pub nonce: u32,
}

#[derive(Default, BorshSerialize, BorshDeserialize)]
struct TransferData {
    pub nonce: u32,
    pub amount: u64,
    pub fee: u64,
    pub target_address: [u8; 32],
    pub target_chain: u16,
}

#[derive(Debug, Default, BorshSerialize, BorshDeserialize, Clone, PartialEq, Eq)]
pub struct WrappedMeta {
    pub chain: u16,
    pub token_address: [u8; 32],
    pub original_decimals: u8,
}

/// Core bridge `Bridge` account; `fee` is the per-message fee in lamports.
#[derive(Default, BorshSerialize, BorshDeserialize)]
struct BridgeData {
    pub guardian_set_index: u32,
    pub last_lamports: u64,
    pub guardian_set_expiration_time: u32,
    pub fee: u64,
}

fn borsh_ix<T: BorshSerialize>(tag: u8, data: &T) -> eyre::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(1);
    out.push(tag);
    out.extend_from_slice(&borsh::to_vec(data)?);
    Ok(out)
}

fn message_fee_from_bridge_data(data: &[u8]) -> eyre::Result<u64> {
    let mut d = data;
    let b = BridgeData::deserialize(&mut d).context("borsh decode bridge state")?;
    Ok(b.fee)
}

/// Sequences logged by the core bridge's `post_message`.
pub fn parse_sequence_logs(logs: &[String]) -> Vec<u64> {
    logs.iter()
        .filter_map(|l| l.strip_prefix(SEQUENCE_LOG_PREFIX))
        .filter_map(|s| s.trim().parse::<u64>().ok())
        .collect()
}

fn random_nonce() -> u32 {
    rand::random::<u32>()
}

pub struct AttestIxParams {
    pub payer: Pubkey,
    pub mint: Pubkey,
    pub message: Pubkey,
    pub nonce: u32,
}

pub struct TransferIxParams {
    pub payer: Pubkey,
    pub from: Pubkey,
    pub mint: Pubkey,
    pub message: Pubkey,
    pub amount: u64,
    pub recipient: [u8; 32],
    pub target_chain: u16,
    pub nonce: u32,
}

/// The Solana token bridge deployment for one network.
#[derive(Debug, Clone)]
pub struct SolanaTokenBridge {
    pub rpc: SolanaChain,
    pub programs: SolanaWormholePrograms,
}

impl SolanaTokenBridge {
    pub const fn new(rpc: SolanaChain, programs: SolanaWormholePrograms) -> Self {
        Self { rpc, programs }
    }

    pub fn emitter(&self) -> Pubkey {
        token_bridge_emitter(&self.programs.token_bridge)
    }

    pub fn build_attest_ix(&self, p: &AttestIxParams) -> eyre::Result<Instruction> {
        let tb = &self.programs.token_bridge;
        let core = &self.programs.core_bridge;
        let emitter = token_bridge_emitter(tb);
        Ok(Instruction {
            program_id: *tb,
            accounts: vec![
                AccountMeta::new(p.payer, true),
                AccountMeta::new(token_bridge_config(tb), false),
                AccountMeta::new_readonly(p.mint, false),
                AccountMeta::new_readonly(token_bridge_wrapped_meta(tb, &p.mint), false),
                AccountMeta::new_readonly(spl_metadata(&p.mint)?, false),
                AccountMeta::new(core_bridge_bridge_state(core), false),
                AccountMeta::new(p.message, true),
                AccountMeta::new_readonly(emitter, false),
                AccountMeta::new(core_bridge_sequence(core, &emitter), false),
                AccountMeta::new(core_bridge_fee_collector(core), false),
                AccountMeta::new_readonly(solana_sdk::sysvar::clock::id(), false),
                AccountMeta::new_readonly(solana_sdk::sysvar::rent::id(), false),
                AccountMeta::new_readonly(solana_system_interface::program::id(), false),
                AccountMeta::new_readonly(*core, false),
            ],
            data: borsh_ix(
                TokenBridgeIx::AttestToken as u8,
                &AttestTokenData { nonce: p.nonce },
            )
            .context("encode attest_token")?,
        })
    }

    pub fn build_transfer_ix(
        &self,
        p: &TransferIxParams,
        wrapped_meta: Option<&WrappedMeta>,
    ) -> eyre::Result<Instruction> {
        let tb = &self.programs.token_bridge;
        let core = &self.programs.core_bridge;
        let config = token_bridge_config(tb);
        let authority_signer = token_bridge_authority_signer(tb);
        let emitter = token_bridge_emitter(tb);
        let bridge_state = core_bridge_bridge_state(core);
        let seq = core_bridge_sequence(core, &emitter);
        let fee_collector = core_bridge_fee_collector(core);
        let data = TransferData {
            nonce: p.nonce,
            amount: p.amount,
            fee: 0,
            target_address: p.recipient,
            target_chain: p.target_chain,
        };

        let (head, tag) = if let Some(meta) = wrapped_meta {
            let wrapped_mint = token_bridge_wrapped_mint(tb, meta.chain, meta.token_address);
            (
                vec![
                    AccountMeta::new(p.payer, true),
                    AccountMeta::new_readonly(config, false),
                    AccountMeta::new(p.from, false),
                    AccountMeta::new_readonly(p.payer, true),
                    AccountMeta::new(wrapped_mint, false),
                    AccountMeta::new_readonly(token_bridge_wrapped_meta(tb, &wrapped_mint), false),
                    AccountMeta::new_readonly(authority_signer, false),
                ],
                TokenBridgeIx::TransferWrapped,
            )
        } else {
            (
                vec![
                    AccountMeta::new(p.payer, true),
                    AccountMeta::new_readonly(config, false),
                    AccountMeta::new(p.from, false),
                    AccountMeta::new(p.mint, false),
                    AccountMeta::new(token_bridge_custody(tb, &p.mint), false),
                    AccountMeta::new_readonly(authority_signer, false),
                    AccountMeta::new_readonly(token_bridge_custody_signer(tb), false),
                ],
                TokenBridgeIx::TransferNative,
            )
        };
        let mut accounts = head;
        accounts.extend([
            AccountMeta::new(bridge_state, false),
            AccountMeta::new(p.message, true),
            AccountMeta::new_readonly(emitter, false),
            AccountMeta::new(seq, false),
            AccountMeta::new(fee_collector, false),
            AccountMeta::new_readonly(solana_sdk::sysvar::clock::id(), false),
            AccountMeta::new_readonly(solana_sdk::sysvar::rent::id(), false),
            AccountMeta::new_readonly(solana_system_interface::program::id(), false),
            AccountMeta::new_readonly(*core, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ]);
        Ok(Instruction {
            program_id: *tb,
            accounts,
            data: borsh_ix(tag as u8, &data).context("encode transfer")?,
        })
    }

    /// The core bridge message fee, as a transfer to the fee collector. `None` when free.
    async fn message_fee_ix(&self, payer: &Pubkey) -> eyre::Result<Option<Instruction>> {
        let core = &self.programs.core_bridge;
        let acc = self
            .rpc
            .get_account(&core_bridge_bridge_state(core))
            .await
            .context("read core bridge state")?;
        let fee = message_fee_from_bridge_data(&acc.data)?;
        if fee == 0 {
            return Ok(None);
        }
        tracing::debug!(fee, "paying wormhole message fee");
        Ok(Some(system_instruction::transfer(
            payer,
            &core_bridge_fee_collector(core),
            fee,
        )))
    }

    pub async fn attest(&self, payer: &Keypair, mint: &Pubkey) -> eyre::Result<Signature> {
        let message = Keypair::new();
        let mut ixs = vec![];
        if let Some(fee_ix) = self.message_fee_ix(&payer.pubkey()).await? {
            ixs.push(fee_ix);
        }
        ixs.push(self.build_attest_ix(&AttestIxParams {
            payer: payer.pubkey(),
            mint: *mint,
            message: message.pubkey(),
            nonce: random_nonce(),
        })?);
        self.rpc
            .sign_and_send_instructions_multi(payer, &[&message], ixs)
            .await
    }

    /// Messages posted by this token bridge's emitter in transaction `sig`.
    pub async fn message_ids(&self, sig: &Signature) -> eyre::Result<Vec<WormholeMessageId>> {
        let logs = self.rpc.get_transaction_logs(sig).await?;
        let emitter = self.emitter().to_bytes();
        Ok(parse_sequence_logs(&logs)
            .into_iter()
            .map(|sequence| WormholeMessageId {
                chain: Chain::Solana,
                emitter,
                sequence,
            })
            .collect())
    }

    /// Metadata for a mint the token bridge created, `None` for mints native to Solana.
    pub async fn wrapped_meta(&self, mint: &Pubkey) -> eyre::Result<Option<WrappedMeta>> {
        let tb = self.programs.token_bridge;
        let acc = self
            .rpc
            .get_account_optional(&token_bridge_wrapped_meta(&tb, mint))
            .await?;
        match acc {
            Some(a) if a.owner == tb => {
                let mut d: &[u8] = a.data.as_slice();
                Ok(Some(
                    WrappedMeta::deserialize(&mut d).context("borsh decode wrapped meta")?,
                ))
            }
            _ => Ok(None),
        }
    }

    /// The Solana mint wrapping a foreign token, if the token bridge created one.
    pub async fn wrapped_mint(
        &self,
        token_chain: u16,
        token_address: [u8; 32],
    ) -> eyre::Result<Option<Pubkey>> {
        let mint = token_bridge_wrapped_mint(&self.programs.token_bridge, token_chain, token_address);
        Ok(self
            .rpc
            .get_account_optional(&mint)
            .await?
            .map(|_| mint))
    }

    /// Lock (or burn, for wrapped mints) `amount` of `mint` and post the transfer message.
    /// `mint = None` moves native SOL through a temporary wrapped-SOL account.
    pub async fn transfer(
        &self,
        payer: &Keypair,
        mint: Option<&Pubkey>,
        amount: u64,
        recipient: [u8; 32],
        target_chain: u16,
    ) -> eyre::Result<Signature> {
        let owner = payer.pubkey();
        let authority_signer = token_bridge_authority_signer(&self.programs.token_bridge);
        let message = Keypair::new();
        let fee_ix = self.message_fee_ix(&owner).await?;

        let Some(mint) = mint else {
            let temp = Keypair::new();
            let native_mint = spl_token::native_mint::id();
            let rent = self
                .rpc
                .get_minimum_balance_for_rent_exemption(spl_token::state::Account::LEN)
                .await?;
            let len = u64::try_from(spl_token::state::Account::LEN)
                .context("token account length")?;
            let mut ixs = vec![
                system_instruction::create_account(
                    &owner,
                    &temp.pubkey(),
                    rent.checked_add(amount)
                        .ok_or_else(|| eyre::eyre!("lamports overflow"))?,
                    len,
                    &spl_token::id(),
                ),
                spl_token::instruction::initialize_account3(
                    &spl_token::id(),
                    &temp.pubkey(),
                    &native_mint,
                    &owner,
                )
                .context("initialize wrapped sol account")?,
                spl_token::instruction::approve(
                    &spl_token::id(),
                    &temp.pubkey(),
                    &authority_signer,
                    &owner,
                    &[],
                    amount,
                )
                .context("approve bridge authority")?,
            ];
            ixs.extend(fee_ix);
            ixs.push(self.build_transfer_ix(
                &TransferIxParams {
                    payer: owner,
                    from: temp.pubkey(),
                    mint: native_mint,
                    message: message.pubkey(),
                    amount,
                    recipient,
                    target_chain,
                    nonce: random_nonce(),
                },
                None,
            )?);
            ixs.push(
                spl_token::instruction::close_account(
                    &spl_token::id(),
                    &temp.pubkey(),
                    &owner,
                    &owner,
                    &[],
                )
                .context("close wrapped sol account")?,
            );
            return self
                .rpc
                .sign_and_send_instructions_multi(payer, &[&message, &temp], ixs)
                .await;
        };

        let from = get_associated_token_address(&owner, mint);
        if self.rpc.get_account_optional(&from).await?.is_none() {
            return Err(BridgeError::InvalidRequest(format!(
                "source token account {from} does not exist; receive {mint} first"
            ))
            .into());
        }
        let wrapped_meta = self.wrapped_meta(mint).await?;
        let mut ixs = vec![spl_token::instruction::approve(
            &spl_token::id(),
            &from,
            &authority_signer,
            &owner,
            &[],
            amount,
        )
        .context("approve bridge authority")?];
        ixs.extend(fee_ix);
        ixs.push(self.build_transfer_ix(
            &TransferIxParams {
                payer: owner,
                from,
                mint: *mint,
                message: message.pubkey(),
                amount,
                recipient,
                target_chain,
                nonce: random_nonce(),
            },
            wrapped_meta.as_ref(),
        )?);
        ixs.push(
            spl_token::instruction::revoke(&spl_token::id(), &from, &owner, &[])
                .context("revoke bridge authority")?,
        );
        self.rpc
            .sign_and_send_instructions_multi(payer, &[&message], ixs)
            .await
    }
}
